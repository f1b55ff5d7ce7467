use actorflow::mock::{MockSink, MockSource, SourceHandle};
use actorflow::sinks::{LogSink, Null};
use actorflow::{
    Actor, ActorContext, ActorState, ConnectPolicy, Director, DirectorConfig, Event, EventKind,
    FlowError, FlowResult, LogLevel, Payload,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(2);

async fn eventually(condition: impl Fn() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

fn logged(logs: &MockSink, needle: &str) -> bool {
    logs.events()
        .iter()
        .filter_map(Event::log_record)
        .any(|record| record.message.contains(needle))
}

// =============================================================================
// TEST ACTORS
// =============================================================================

/// Forwards every event unchanged.
struct Relay;

#[async_trait]
impl Actor for Relay {
    async fn consume(&self, ctx: &ActorContext, event: Event, _origin: &str) -> FlowResult<()> {
        ctx.send_event(event).await
    }
}

/// Fails on events tagged `fail`, panics on events tagged `panic`.
struct Flaky;

#[async_trait]
impl Actor for Flaky {
    async fn consume(&self, ctx: &ActorContext, event: Event, _origin: &str) -> FlowResult<()> {
        if event.get("panic").is_some() {
            panic!("flaky actor panicked");
        }
        if event.get("fail").is_some() {
            return Err(FlowError::UnprocessableEventData("refused".into()));
        }
        ctx.send_event(event).await
    }
}

/// Accepts JSON only.
struct JsonOnly;

#[async_trait]
impl Actor for JsonOnly {
    fn input_kinds(&self) -> &[EventKind] {
        &[EventKind::Json]
    }

    fn output_kinds(&self) -> &[EventKind] {
        &[EventKind::Json]
    }

    async fn consume(&self, ctx: &ActorContext, event: Event, _origin: &str) -> FlowResult<()> {
        ctx.send_event(event).await
    }
}

/// Declares JSON output but tries to emit plain events.
struct WrongOutput;

#[async_trait]
impl Actor for WrongOutput {
    fn output_kinds(&self) -> &[EventKind] {
        &[EventKind::Json]
    }

    async fn consume(&self, ctx: &ActorContext, _event: Event, _origin: &str) -> FlowResult<()> {
        ctx.send_event(Event::new(EventKind::Plain)).await
    }
}

/// Sends everything to one named outbound queue.
struct Router {
    target: &'static str,
}

#[async_trait]
impl Actor for Router {
    async fn consume(&self, ctx: &ActorContext, event: Event, _origin: &str) -> FlowResult<()> {
        ctx.send_event_to(event, &[self.target]).await
    }
}

/// Logs each event it sees through its own logger.
struct Talker;

#[async_trait]
impl Actor for Talker {
    async fn consume(&self, ctx: &ActorContext, event: Event, _origin: &str) -> FlowResult<()> {
        ctx.logger().info("heard something", Some(&event));
        Ok(())
    }
}

/// Emits a fresh event on a fixed interval until stopped.
struct Ticker;

#[async_trait]
impl Actor for Ticker {
    async fn pre_hook(&self, ctx: &ActorContext) -> FlowResult<()> {
        let ticker = ctx.clone();
        ctx.spawn(async move {
            while ticker.sleep(Duration::from_millis(20)).await {
                if ticker.send_event(Event::new(EventKind::Plain)).await.is_err() {
                    break;
                }
            }
        });
        Ok(())
    }

    async fn consume(&self, _ctx: &ActorContext, _event: Event, _origin: &str) -> FlowResult<()> {
        Ok(())
    }
}

/// Appends its name to a shared journal when its post-hook runs.
struct Recorder {
    name: &'static str,
    journal: Arc<Mutex<Vec<&'static str>>>,
}

#[async_trait]
impl Actor for Recorder {
    async fn post_hook(&self, _ctx: &ActorContext) -> FlowResult<()> {
        self.journal.lock().push(self.name);
        Ok(())
    }

    async fn consume(&self, _ctx: &ActorContext, _event: Event, _origin: &str) -> FlowResult<()> {
        Ok(())
    }
}

/// Passes every event it receives on to its own error partition.
struct Reroute;

#[async_trait]
impl Actor for Reroute {
    async fn consume(&self, ctx: &ActorContext, event: Event, _origin: &str) -> FlowResult<()> {
        ctx.send_error(event).await
    }
}

struct BrokenStart;

#[async_trait]
impl Actor for BrokenStart {
    async fn pre_hook(&self, _ctx: &ActorContext) -> FlowResult<()> {
        Err(FlowError::SetupError("missing credentials".into()))
    }

    async fn consume(&self, _ctx: &ActorContext, _event: Event, _origin: &str) -> FlowResult<()> {
        Ok(())
    }
}

/// `source -> middle -> sink`, with a recording log sink.
async fn pipeline(middle: impl Actor) -> (Director, SourceHandle, Arc<MockSink>, Arc<MockSink>) {
    let mut director = Director::default();
    let (source, input) = MockSource::new();
    let sink = MockSink::new();
    let logs = MockSink::new();

    director.register_log_actor(logs.clone()).unwrap();
    let source = director.register_actor("source", source).unwrap();
    let middle = director.register_actor("middle", middle).unwrap();
    let out = director.register_actor("sink", sink.clone()).unwrap();
    director.connect_queue(&source, &middle).unwrap();
    director.connect_queue(&middle, &out).unwrap();
    director.start().await.unwrap();

    (director, input, sink, logs)
}

fn tagged(tag: &str) -> Event {
    let mut event = Event::new(EventKind::Plain);
    event.set(tag, json!(true)).unwrap();
    event
}

// =============================================================================
// FAILURE CONTAINMENT
// =============================================================================

#[tokio::test]
async fn test_consume_error_does_not_stop_the_loop() {
    let (mut director, input, sink, logs) = pipeline(Flaky).await;

    input.send(tagged("fail")).await.unwrap();
    let e4 = Event::new(EventKind::Plain);
    input.send(e4.clone()).await.unwrap();

    assert!(sink.wait_for(1, WAIT).await);
    assert_eq!(sink.events()[0].event_id(), e4.event_id());
    assert!(eventually(|| logged(&logs, "refused")).await);
    assert_eq!(director.actor_state("middle"), Some(ActorState::Running));
    director.stop().await;
}

#[tokio::test]
async fn test_panic_is_contained_and_logged() {
    let (mut director, input, sink, logs) = pipeline(Flaky).await;

    let doomed = tagged("panic");
    input.send(doomed.clone()).await.unwrap();
    let survivor = Event::new(EventKind::Plain);
    input.send(survivor.clone()).await.unwrap();

    assert!(sink.wait_for(1, WAIT).await);
    assert_eq!(sink.events()[0].event_id(), survivor.event_id());
    assert!(eventually(|| logged(&logs, "Panic while consuming")).await);

    let record = logs
        .events()
        .iter()
        .filter_map(Event::log_record)
        .find(|record| record.message.contains("Panic"))
        .unwrap();
    assert_eq!(record.level, LogLevel::Error);
    assert_eq!(record.origin_actor, "middle");
    assert_eq!(record.id.as_deref(), Some(doomed.meta_id()));
    director.stop().await;
}

// =============================================================================
// INPUT & OUTPUT VALIDATION
// =============================================================================

#[tokio::test]
async fn test_rejected_input_goes_to_the_error_sink() {
    let mut director = Director::default();
    let errors = MockSink::new();
    errors.expect_event().of_kind(EventKind::Xml).from("validator").faulted().once();
    director.register_error_actor(errors.clone()).unwrap();

    let (source, input) = MockSource::new();
    let source = director.register_actor("source", source).unwrap();
    let validator = director.register_actor("validator", JsonOnly).unwrap();
    director.connect_queue(&source, &validator).unwrap();
    director.start().await.unwrap();

    input.send(Event::with_data(EventKind::Xml, "<a/>").unwrap()).await.unwrap();

    assert!(errors.wait(WAIT).await);
    errors.verify();
    assert!(matches!(errors.events()[0].error(), Some(FlowError::InvalidActorInput(_))));
    director.stop().await;
}

#[tokio::test]
async fn test_widening_input_is_converted() {
    let (mut director, input, sink, _logs) = pipeline(JsonOnly).await;

    let event = Event::with_data(EventKind::Plain, r#"{"a":1}"#).unwrap();
    input.send(event.clone()).await.unwrap();

    assert!(sink.wait_for(1, WAIT).await);
    let received = &sink.events()[0];
    assert_eq!(received.kind(), EventKind::Json);
    assert_eq!(received.event_id(), event.event_id());
    assert_eq!(received.data(), &Payload::Json(json!({ "a": 1 })));
    director.stop().await;
}

#[tokio::test]
async fn test_undeclared_output_is_refused() {
    let (mut director, input, sink, logs) = pipeline(WrongOutput).await;

    input.send(Event::new(EventKind::Plain)).await.unwrap();

    assert!(eventually(|| logged(&logs, "Invalid actor output")).await);
    assert_eq!(sink.received(), 0);
    director.stop().await;
}

// =============================================================================
// WIRING
// =============================================================================

#[tokio::test]
async fn test_fan_out_delivers_to_every_destination() {
    let mut director = Director::default();
    let (source, input) = MockSource::new();
    let left = MockSink::new();
    let right = MockSink::new();

    let source = director.register_actor("source", source).unwrap();
    let l = director.register_actor("left", left.clone()).unwrap();
    let r = director.register_actor("right", right.clone()).unwrap();
    director.connect_queue(&source, [&l, &r]).unwrap();
    director.start().await.unwrap();

    let event = Event::new(EventKind::Plain);
    input.send(event.clone()).await.unwrap();

    assert!(left.wait_for(1, WAIT).await);
    assert!(right.wait_for(1, WAIT).await);
    assert_eq!(left.events()[0].event_id(), event.event_id());
    assert_eq!(right.events()[0].event_id(), event.event_id());
    assert_eq!(left.origins(), vec!["source".to_string()]);
    director.stop().await;
}

#[tokio::test]
async fn test_send_event_to_targets_named_queues() {
    let mut director = Director::default();
    let (source, input) = MockSource::new();
    let left = MockSink::new();
    let right = MockSink::new();

    let source = director.register_actor("source", source).unwrap();
    let router = director.register_actor("router", Router { target: "right" }).unwrap();
    let l = director.register_actor("left", left.clone()).unwrap();
    let r = director.register_actor("right", right.clone()).unwrap();
    director.connect_queue(&source, &router).unwrap();
    director.connect_queue(&router, [&l, &r]).unwrap();
    director.start().await.unwrap();

    input.send(Event::new(EventKind::Plain)).await.unwrap();

    assert!(right.wait_for(1, WAIT).await);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(left.received(), 0);
    director.stop().await;
}

#[tokio::test]
async fn test_send_event_to_unknown_queue_fails() {
    let (mut director, input, sink, logs) = pipeline(Router { target: "nowhere" }).await;

    input.send(Event::new(EventKind::Plain)).await.unwrap();

    assert!(eventually(|| logged(&logs, "no outbound queue named 'nowhere'")).await);
    assert_eq!(sink.received(), 0);
    director.stop().await;
}

#[tokio::test]
async fn test_explicit_error_wiring_wins_over_default() {
    let mut director = Director::default();
    let default_errors = MockSink::new();
    director.register_error_actor(default_errors.clone()).unwrap();

    let (source, input) = MockSource::new();
    let custom_errors = MockSink::new();
    let source = director.register_actor("source", source).unwrap();
    let validator = director.register_actor("validator", JsonOnly).unwrap();
    let custom = director.register_actor("custom_errors", custom_errors.clone()).unwrap();
    director.connect_queue(&source, &validator).unwrap();
    director.connect_error_queue(&validator, &custom).unwrap();
    director.start().await.unwrap();

    input.send(Event::new(EventKind::Xml)).await.unwrap();

    assert!(custom_errors.wait_for(1, WAIT).await);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(default_errors.received(), 0);
    director.stop().await;
}

#[tokio::test]
async fn test_connecting_an_occupied_slot_fails() {
    let mut director = Director::default();
    let a = director.register_actor("a", Relay).unwrap();
    let b = director.register_actor("b", Relay).unwrap();

    director.connect_queue(&a, &b).unwrap();
    assert!(matches!(director.connect_queue(&a, &b), Err(FlowError::QueueConnected(_))));

    let check = ConnectPolicy { check_existing: true };
    director.connect_queue_with(&a, &b, check).unwrap();

    // A second slot on the same source may target a different inbox.
    director.connect_queue((&a, "audit"), (&b, "audit")).unwrap();
}

#[tokio::test]
async fn test_registration_rules() {
    let mut director = Director::default();
    director.register_actor("a", Relay).unwrap();

    assert!(matches!(director.register_actor("a", Relay), Err(FlowError::SetupError(_))));
    assert!(matches!(director.register_actor("default_log", Relay), Err(FlowError::SetupError(_))));
    assert!(matches!(director.register_actor("default_error", Relay), Err(FlowError::SetupError(_))));
    assert!(matches!(director.register_actor("", Relay), Err(FlowError::SetupError(_))));

    assert!(director.actor("a").is_some());
    assert!(director.actor("default_log").is_some());
    assert!(director.actor("missing").is_none());

    director.start().await.unwrap();
    assert!(matches!(director.register_actor("late", Relay), Err(FlowError::SetupError(_))));
    director.stop().await;
}

// =============================================================================
// LIFECYCLE
// =============================================================================

#[tokio::test]
async fn test_stop_order_ends_with_the_log_sink() {
    let journal = Arc::new(Mutex::new(Vec::new()));
    let recorder = |name| Recorder {
        name,
        journal: journal.clone(),
    };

    let mut director = Director::default();
    director.register_log_actor(recorder("log")).unwrap();
    director.register_error_actor(recorder("error")).unwrap();
    director.register_actor("first", recorder("first")).unwrap();
    director.register_actor("second", recorder("second")).unwrap();

    director.start().await.unwrap();
    for name in ["first", "second", "default_log", "default_error"] {
        assert_eq!(director.actor_state(name), Some(ActorState::Running), "{name}");
    }

    director.stop().await;
    assert_eq!(*journal.lock(), vec!["first", "second", "error", "log"]);
    for name in ["first", "second", "default_log", "default_error"] {
        assert_eq!(director.actor_state(name), Some(ActorState::Stopped), "{name}");
    }
}

#[tokio::test]
async fn test_failed_start_rolls_back() {
    let journal = Arc::new(Mutex::new(Vec::new()));
    let mut director = Director::default();
    director
        .register_actor(
            "first",
            Recorder {
                name: "first",
                journal: journal.clone(),
            },
        )
        .unwrap();
    director.register_actor("broken", BrokenStart).unwrap();

    let result = director.start().await;

    assert!(matches!(result, Err(FlowError::ActorInitFailure(msg)) if msg.contains("missing credentials")));
    assert_eq!(director.actor_state("first"), Some(ActorState::Stopped));
    assert_eq!(director.actor_state("broken"), Some(ActorState::Stopped));
    assert_eq!(*journal.lock(), vec!["first"]);
}

#[tokio::test]
async fn test_background_tasks_stop_with_the_actor() {
    let mut director = Director::default();
    let sink = MockSink::new();
    let ticker = director.register_actor("ticker", Ticker).unwrap();
    let out = director.register_actor("sink", sink.clone()).unwrap();
    director.connect_queue(&ticker, &out).unwrap();
    director.start().await.unwrap();

    assert!(sink.wait_for(3, WAIT).await);
    tokio::time::timeout(WAIT, director.stop())
        .await
        .expect("stop should not hang on a sleeping task");
    assert_eq!(director.actor_state("ticker"), Some(ActorState::Stopped));
}

#[tokio::test]
async fn test_run_until_handle_stops() {
    let mut director = Director::default();
    let (source, input) = MockSource::new();
    let sink = MockSink::new();
    let source = director.register_actor("source", source).unwrap();
    let out = director.register_actor("sink", sink.clone()).unwrap();
    director.connect_queue(&source, &out).unwrap();

    let handle = director.handle();
    let running = tokio::spawn(async move { director.run().await.map(|()| director) });

    // The source buffers until its forwarder starts.
    input.send(Event::new(EventKind::Plain)).await.unwrap();
    assert!(sink.wait_for(1, WAIT).await);

    handle.stop();
    let director = tokio::time::timeout(WAIT, running).await.unwrap().unwrap().unwrap();
    assert_eq!(director.actor_state("sink"), Some(ActorState::Stopped));
}

// =============================================================================
// LOGGING
// =============================================================================

#[tokio::test]
async fn test_actor_logs_reach_the_log_sink() {
    let (mut director, input, _sink, logs) = pipeline(Talker).await;

    let event = Event::new(EventKind::Plain).with_meta_id("trace-7");
    input.send(event).await.unwrap();

    assert!(eventually(|| logged(&logs, "heard something")).await);
    let record = logs
        .events()
        .iter()
        .filter_map(Event::log_record)
        .find(|record| record.message == "heard something")
        .unwrap();
    assert_eq!(record.level, LogLevel::Info);
    assert_eq!(record.origin_actor, "middle");
    assert_eq!(record.id.as_deref(), Some("trace-7"));
    director.stop().await;
}

#[tokio::test]
async fn test_default_sinks_render_rejections() {
    let mut director = Director::default();
    let log_sink = Arc::new(LogSink::new());
    director.register_log_actor(log_sink.clone()).unwrap();

    let (source, input) = MockSource::new();
    let source = director.register_actor("source", source).unwrap();
    let validator = director.register_actor("validator", JsonOnly).unwrap();
    director.connect_queue(&source, &validator).unwrap();
    director.start().await.unwrap();

    input.send(Event::new(EventKind::Xml)).await.unwrap();

    // One record from the rejection, one from the error sink reporting it.
    assert!(eventually(|| log_sink.rendered() >= 2).await);
    director.stop().await;
}

#[tokio::test]
async fn test_null_error_sink_swallows_faults() {
    let mut director = Director::default();
    let logs = MockSink::new();
    director.register_log_actor(logs.clone()).unwrap();
    director.register_error_actor(Null).unwrap();

    let (source, input) = MockSource::new();
    let source = director.register_actor("source", source).unwrap();
    let validator = director.register_actor("validator", JsonOnly).unwrap();
    director.connect_queue(&source, &validator).unwrap();
    director.start().await.unwrap();

    input.send(Event::new(EventKind::Xml)).await.unwrap();

    assert!(eventually(|| logged(&logs, "Invalid actor input")).await);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!logged(&logs, "Error event from"));
    director.stop().await;
}

#[tokio::test]
async fn test_send_error_without_error_queue_drops_with_warning() {
    let mut director = Director::default();
    let logs = MockSink::new();
    director.register_log_actor(logs.clone()).unwrap();
    // Sinks get no default error wiring, so this actor has nowhere to route.
    director.register_error_actor(Reroute).unwrap();

    let (source, input) = MockSource::new();
    let witness = MockSink::new();
    let source = director.register_actor("source", source).unwrap();
    let validator = director.register_actor("validator", JsonOnly).unwrap();
    let out = director.register_actor("sink", witness.clone()).unwrap();
    director.connect_queue(&source, &validator).unwrap();
    director.connect_queue(&validator, &out).unwrap();
    director.start().await.unwrap();

    input.send(Event::new(EventKind::Xml)).await.unwrap();

    assert!(eventually(|| logged(&logs, "No error queue connected")).await);
    let warning = logs
        .events()
        .iter()
        .filter_map(Event::log_record)
        .find(|record| record.message.contains("No error queue connected"))
        .unwrap();
    assert_eq!(warning.level, LogLevel::Warning);
    assert_eq!(warning.origin_actor, "default_error");

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(witness.received(), 0);
    assert!(logs.events().iter().all(|event| event.kind() == EventKind::Log));
    director.stop().await;
}

#[tokio::test]
async fn test_sink_wait_times_out_without_events() {
    let sink = MockSink::new();
    assert!(!sink.wait_for(1, Duration::from_millis(50)).await);
    assert!(sink.wait_for(0, Duration::from_millis(50)).await);
}

// =============================================================================
// CONFIGURATION
// =============================================================================

#[test]
fn test_config_from_toml() {
    let config = DirectorConfig::from_toml_str("name = \"ingest\"\nqueue_size = 8\n").unwrap();
    assert_eq!(config.name, "ingest");
    assert_eq!(config.queue_size, 8);
    assert_eq!(config.log_actor_name, "default_log");

    assert_eq!(DirectorConfig::from_toml_str("").unwrap(), DirectorConfig::default());
    assert!(matches!(DirectorConfig::from_toml_str("queue_size = 0"), Err(FlowError::SetupError(_))));
    assert!(matches!(
        DirectorConfig::from_toml_str("log_actor_name = \"x\"\nerror_actor_name = \"x\""),
        Err(FlowError::SetupError(_))
    ));
    assert!(matches!(DirectorConfig::from_toml_str("queue_size = \"big\""), Err(FlowError::SetupError(_))));
}

#[tokio::test]
async fn test_start_rejects_shared_sink_names() {
    let config = DirectorConfig {
        error_actor_name: "default_log".to_string(),
        ..DirectorConfig::default()
    };
    let mut director = Director::new(config);
    director.register_actor("a", Relay).unwrap();

    assert!(matches!(director.start().await, Err(FlowError::SetupError(_))));
    assert_eq!(director.actor_state("a"), Some(ActorState::Initialized));
}

#[tokio::test]
async fn test_configured_sink_names_are_reserved() {
    let config = DirectorConfig::from_toml_str("log_actor_name = \"audit\"").unwrap();
    let mut director = Director::new(config);
    assert_eq!(director.log_actor().name(), "audit");
    assert!(matches!(director.register_actor("audit", Relay), Err(FlowError::SetupError(_))));
    director.register_actor("default_log", Relay).unwrap();
}
