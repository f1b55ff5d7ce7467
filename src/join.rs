//! # Event Join
//!
//! [`EventJoin`] reassembles one logical event from the branches of a fan-out.
//! Events are correlated by `event_id` (clones sent down different branches
//! keep it). The first report for an id opens a [`MatchedEvent`] expecting
//! every inbound queue connected at that moment; once each has reported, the
//! payloads are merged and the last-arriving event is sent on with the merged
//! payload.
//!
//! ## Merging
//!
//! The format of the completing event decides the merge:
//!
//! | format | result |
//! |---|---|
//! | plain | `Payload::List` of inbox payloads, in inbox registration order |
//! | JSON  | union of inbox objects, see [`merge_json`] |
//! | XML   | inbox roots as children of a new element named by the join key |
//!
//! ## Purging
//!
//! A branch that never delivers would leave its partial state behind forever.
//! With a purge interval set, a background task wakes every `interval / 2`
//! and drops every correlation older than `interval`, whatever its progress.
//! A later report for a purged id opens a fresh correlation.

use crate::actor::{Actor, ActorContext};
use crate::error::{FlowError, FlowResult};
use crate::event::{DataFormat, Event, EventKind, Payload, XmlElement};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::slice;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

// =============================================================================
// MATCHED EVENT
// =============================================================================

/// Correlation state for one `event_id`.
#[derive(Debug, Clone)]
pub struct MatchedEvent {
    inboxes: Vec<(String, Option<Payload>)>,
    created: Instant,
}

impl MatchedEvent {
    pub fn new<I, S>(inboxes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inboxes: inboxes.into_iter().map(|name| (name.into(), None)).collect(),
            created: Instant::now(),
        }
    }

    pub fn created(&self) -> Instant {
        self.created
    }

    /// Records the payload reported by `inbox`.
    pub fn report(&mut self, inbox: &str, payload: Payload) -> FlowResult<()> {
        let slot = self
            .inboxes
            .iter_mut()
            .find(|(name, _)| name == inbox)
            .map(|(_, slot)| slot)
            .ok_or_else(|| {
                FlowError::ResourceNotFound(format!("Inbox '{inbox}' is not expected by this join"))
            })?;
        if slot.is_some() {
            return Err(FlowError::ResourceConflict(format!(
                "Inbox '{inbox}' already reported for event. Ignoring"
            )));
        }
        *slot = Some(payload);
        Ok(())
    }

    pub fn all_reported(&self) -> bool {
        self.inboxes.iter().all(|(_, payload)| payload.is_some())
    }

    pub fn reported(&self) -> usize {
        self.inboxes.iter().filter(|(_, payload)| payload.is_some()).count()
    }

    /// Merges the reported payloads according to `format`.
    pub fn joined(&self, format: DataFormat, key: &str) -> FlowResult<Payload> {
        let reported = self
            .inboxes
            .iter()
            .filter_map(|(name, payload)| payload.as_ref().map(|p| (name.as_str(), p)));

        match format {
            DataFormat::Plain => Ok(Payload::List(reported.map(|(_, p)| p.clone()).collect())),
            DataFormat::Json => {
                let mut merged = Map::new();
                for (inbox, payload) in reported {
                    match payload.to_value() {
                        Value::Object(object) => {
                            for (key, value) in object {
                                merge_entry(&mut merged, key, value);
                            }
                        }
                        other => merge_entry(&mut merged, inbox.to_string(), other),
                    }
                }
                Ok(Payload::Json(Value::Object(merged)))
            }
            DataFormat::Xml => {
                let mut root = XmlElement::new(key);
                for (inbox, payload) in reported {
                    match payload {
                        Payload::Xml(element) => root.push(element.clone()),
                        other => {
                            return Err(FlowError::UnprocessableEventData(format!(
                                "Inbox '{inbox}' reported {} where XML was expected",
                                other.type_name()
                            )))
                        }
                    }
                }
                Ok(Payload::Xml(root))
            }
        }
    }
}

fn merge_entry(target: &mut Map<String, Value>, key: String, value: Value) {
    match target.remove(&key) {
        Some(existing) => {
            target.insert(key, merge_json(existing, value));
        }
        None => {
            target.insert(key, value);
        }
    }
}

/// Merges `incoming` into `existing` when two inboxes report the same key.
///
/// Objects merge recursively, arrays concatenate, an array absorbs a scalar
/// (appended, or prepended when the array arrives second), and any other pair
/// becomes `[existing, incoming]`.
pub fn merge_json(existing: Value, incoming: Value) -> Value {
    match (existing, incoming) {
        (Value::Object(mut left), Value::Object(right)) => {
            for (key, value) in right {
                merge_entry(&mut left, key, value);
            }
            Value::Object(left)
        }
        (Value::Array(mut left), Value::Array(right)) => {
            left.extend(right);
            Value::Array(left)
        }
        (Value::Array(mut left), value) => {
            left.push(value);
            Value::Array(left)
        }
        (value, Value::Array(mut right)) => {
            right.insert(0, value);
            Value::Array(right)
        }
        (left, right) => Value::Array(vec![left, right]),
    }
}

// =============================================================================
// THE JOIN ACTOR
// =============================================================================

/// Joins events arriving on every inbound queue by `event_id`.
///
/// # Example
/// ```ignore
/// let join = director.register_actor(
///     "join",
///     EventJoin::json().with_purge_interval(Duration::from_secs(30)),
/// )?;
/// director.connect_queue(&left, &join)?;
/// director.connect_queue(&right, &join)?;
/// ```
pub struct EventJoin {
    kind: EventKind,
    key: Option<String>,
    purge_interval: Option<Duration>,
    events: Arc<Mutex<HashMap<String, MatchedEvent>>>,
}

impl EventJoin {
    /// A join accepting any kind; the completing event's format picks the merge.
    pub fn new() -> Self {
        Self::for_kind(EventKind::Plain)
    }

    pub fn json() -> Self {
        Self::for_kind(EventKind::Json)
    }

    pub fn xml() -> Self {
        Self::for_kind(EventKind::Xml)
    }

    fn for_kind(kind: EventKind) -> Self {
        Self {
            kind,
            key: None,
            purge_interval: None,
            events: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Root element name for XML merges. Defaults to the actor's name.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Enables purging of correlations older than `interval`. Zero disables it.
    pub fn with_purge_interval(mut self, interval: Duration) -> Self {
        self.purge_interval = (!interval.is_zero()).then_some(interval);
        self
    }

    /// Number of correlations waiting for more inboxes.
    pub fn pending(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_pending(&self, event_id: &str) -> bool {
        self.events.lock().contains_key(event_id)
    }

    /// How many inboxes have reported for `event_id`, if it is pending.
    pub fn reported(&self, event_id: &str) -> Option<usize> {
        self.events.lock().get(event_id).map(MatchedEvent::reported)
    }
}

impl Default for EventJoin {
    fn default() -> Self {
        Self::new()
    }
}

fn purge_expired(events: &Mutex<HashMap<String, MatchedEvent>>, interval: Duration) -> usize {
    let now = Instant::now();
    let mut events = events.lock();
    let before = events.len();
    events.retain(|_, matched| matched.created + interval > now);
    before - events.len()
}

#[async_trait]
impl Actor for EventJoin {
    fn input_kinds(&self) -> &[EventKind] {
        slice::from_ref(&self.kind)
    }

    fn output_kinds(&self) -> &[EventKind] {
        slice::from_ref(&self.kind)
    }

    async fn pre_hook(&self, ctx: &ActorContext) -> FlowResult<()> {
        let Some(interval) = self.purge_interval else {
            return Ok(());
        };
        let events = self.events.clone();
        let purger = ctx.clone();
        ctx.spawn(async move {
            while purger.sleep(interval / 2).await {
                let purged = purge_expired(&events, interval);
                if purged > 0 {
                    purger
                        .logger()
                        .debug(&format!("Purged {purged} unmatched event(s)"), None);
                }
            }
        });
        Ok(())
    }

    async fn consume(&self, ctx: &ActorContext, event: Event, origin: &str) -> FlowResult<()> {
        let completed = {
            let mut events = self.events.lock();
            let matched = events
                .entry(event.event_id().to_string())
                .or_insert_with(|| MatchedEvent::new(ctx.pool().inbound_names()));
            matched.report(origin, event.data().clone())?;
            if matched.all_reported() {
                events.remove(event.event_id())
            } else {
                None
            }
        };

        let Some(matched) = completed else {
            debug!(actor = ctx.name(), event_id = event.event_id(), origin, "Partial join");
            return Ok(());
        };

        let key = self.key.as_deref().unwrap_or_else(|| ctx.name());
        let merged = matched.joined(event.kind().format(), key)?;
        let mut event = event;
        event.set_data(merged)?;
        ctx.send_event(event).await
    }
}
