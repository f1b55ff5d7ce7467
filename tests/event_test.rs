use actorflow::event::http::RequestUrl;
use actorflow::event::payload::{json_to_xml, xml_to_json};
use actorflow::event::status::fault_status;
use actorflow::{Event, EventKind, FlowError, HttpEnvironment, Payload, XmlElement};
use pretty_assertions::assert_eq;
use serde_json::json;

// =============================================================================
// IDENTITY
// =============================================================================

#[test]
fn test_event_id_cannot_be_reassigned() {
    let mut event = Event::new(EventKind::Plain);
    let original = event.event_id().to_string();

    let result = event.set("event_id", json!("forged"));

    assert!(matches!(result, Err(FlowError::InvalidEventDataModification(_))));
    assert_eq!(event.event_id(), original);
}

#[test]
fn test_meta_id_defaults_to_event_id_and_propagates() {
    let parent = Event::new(EventKind::Json);
    assert_eq!(parent.meta_id(), parent.event_id());

    let child = parent.derive(EventKind::Plain);
    assert_ne!(child.event_id(), parent.event_id());
    assert_eq!(child.meta_id(), parent.meta_id());
}

#[test]
fn test_clones_keep_their_identity() {
    let event = Event::with_data(EventKind::Plain, "payload").unwrap();
    let copy = event.clone();
    assert_eq!(copy.event_id(), event.event_id());
}

#[test]
fn test_attribute_api_routes_known_fields() {
    let mut event = Event::new(EventKind::Plain);
    event.set("service", json!("billing")).unwrap();
    event.set("meta_id", json!("corr-1")).unwrap();
    event.set("retries", json!(3)).unwrap();

    assert_eq!(event.service(), "billing");
    assert_eq!(event.meta_id(), "corr-1");
    assert_eq!(event.get("retries"), Some(json!(3)));
    assert_eq!(event.get("missing"), None);
    assert!(event.set("meta_id", json!(7)).is_err());
}

// =============================================================================
// CONVERSION
// =============================================================================

#[test]
fn test_plain_to_xml_recoerces_payload() {
    let event = Event::with_data(EventKind::Plain, "<order id=\"7\"><qty>2</qty></order>").unwrap();

    let converted = event.convert(EventKind::Xml, false).unwrap();

    assert_eq!(converted.kind(), EventKind::Xml);
    assert_eq!(converted.event_id(), event.event_id());
    let root = converted.data().as_xml().unwrap();
    assert_eq!(root.name, "order");
    assert_eq!(root.attribute("id"), Some("7"));
    assert_eq!(root.child("qty").and_then(|q| q.text.as_deref()), Some("2"));
}

#[test]
fn test_xml_to_json_requires_force() {
    let event = Event::with_data(EventKind::Xml, "<a>1</a>").unwrap();

    let result = event.convert(EventKind::Json, false);
    assert!(matches!(result, Err(FlowError::InvalidEventConversion(_))));

    let forced = event.convert(EventKind::Json, true).unwrap();
    assert_eq!(forced.data(), &Payload::Json(json!({ "a": "1" })));
}

#[test]
fn test_narrowing_conversion_is_rejected() {
    let event = Event::new(EventKind::JsonHttp);
    let result = event.convert(EventKind::Json, false);
    assert!(matches!(result, Err(FlowError::InvalidEventConversion(msg)) if msg.contains("Narrowing")));
}

#[test]
fn test_unrelated_kinds_combine_when_formats_agree() {
    let xml = Event::new(EventKind::Xml);
    let combined = xml.convert(EventKind::Http, false).unwrap();
    assert_eq!(combined.kind(), EventKind::XmlHttp);
    assert!(combined.environment().is_some());

    assert_eq!(EventKind::Json.conversion_target(EventKind::JsonHttp).unwrap(), EventKind::JsonHttp);
    assert!(EventKind::Log.conversion_target(EventKind::Json).is_err());
}

#[test]
fn test_lattice() {
    assert!(EventKind::XmlHttp.descends_from(EventKind::Xml));
    assert!(EventKind::XmlHttp.descends_from(EventKind::Http));
    assert!(EventKind::Log.descends_from(EventKind::Plain));
    assert!(!EventKind::Json.descends_from(EventKind::Xml));
    for kind in EventKind::ALL {
        assert!(kind.descends_from(EventKind::Plain));
        assert!(kind.descends_from(kind));
    }
}

// =============================================================================
// PAYLOAD TABLES
// =============================================================================

#[test]
fn test_json_table() {
    let event = Event::with_data(EventKind::Json, r#"{"name":"widget","tags":["a","b"]}"#).unwrap();
    assert_eq!(event.data_string(), r#"{"name":"widget","tags":["a","b"]}"#);

    assert_eq!(Event::new(EventKind::Json).data(), &Payload::Json(json!({})));
    assert!(matches!(
        Event::with_data(EventKind::Json, "{not json"),
        Err(FlowError::InvalidEventDataModification(_))
    ));
    assert!(matches!(
        Event::with_data(EventKind::Json, json!(42)),
        Err(FlowError::InvalidEventDataModification(_))
    ));
    assert!(Event::with_data(EventKind::Json, vec![Payload::from("x")]).is_err());
}

#[test]
fn test_json_text_must_be_an_object_or_array() {
    assert!(matches!(
        Event::with_data(EventKind::Json, "42"),
        Err(FlowError::InvalidEventDataModification(_))
    ));
    assert!(Event::with_data(EventKind::Json, r#""just a string""#).is_err());

    let mut event = Event::with_data(EventKind::Json, "[1, 2]").unwrap();
    event.set_data(event.data().clone()).unwrap();
    let widened = event.convert(EventKind::JsonHttp, false).unwrap();
    assert_eq!(widened.data(), &Payload::Json(json!([1, 2])));
}

#[test]
fn test_xml_table() {
    let empty = Event::new(EventKind::Xml);
    assert_eq!(empty.data_string(), "<root/>");

    assert!(matches!(
        Event::with_data(EventKind::Xml, "<open>"),
        Err(FlowError::InvalidEventDataModification(_))
    ));

    let from_json = Event::with_data(EventKind::Xml, json!({ "item": { "@sku": "A1", "qty": 2 } })).unwrap();
    assert_eq!(from_json.data_string(), r#"<item sku="A1"><qty>2</qty></item>"#);
}

#[test]
fn test_plain_accepts_anything() {
    let list = Payload::List(vec![Payload::from("a"), Payload::Json(json!({ "b": 1 }))]);
    let event = Event::with_data(EventKind::Plain, list.clone()).unwrap();
    assert_eq!(event.data(), &list);
}

#[test]
fn test_xml_json_mapping() {
    let xml = XmlElement::parse(r#"<order id="1"><line>a</line><line>b</line><note/></order>"#).unwrap();
    assert_eq!(
        xml_to_json(&xml),
        json!({ "order": { "@id": "1", "line": ["a", "b"], "note": null } })
    );

    let envelope = json_to_xml(&json!({ "a": 1, "b": 2 })).unwrap();
    assert_eq!(envelope.name, "jsonified_envelope");
    assert_eq!(xml_to_json(&envelope), json!({ "a": "1", "b": "2" }));

    assert!(json_to_xml(&json!({ "1bad": true })).is_err());
}

// =============================================================================
// FAULTS & HTTP
// =============================================================================

#[test]
fn test_fault_status_table() {
    assert_eq!(fault_status(None).status, 200);
    assert_eq!(fault_status(Some(&FlowError::ResourceNotFound("x".into()))).status, 404);
    assert_eq!(fault_status(Some(&FlowError::MalformedEventData("x".into()))).status, 400);
    assert_eq!(fault_status(Some(&FlowError::EventRateExceeded("x".into()))).status, 429);
    assert_eq!(fault_status(Some(&FlowError::QueueFull("x".into()))).status, 500);

    let unauthorized = fault_status(Some(&FlowError::UnauthorizedEvent("x".into())));
    assert_eq!(unauthorized.status, 401);
    assert_eq!(unauthorized.headers[0].0, "WWW-Authenticate");
}

#[test]
fn test_fault_sets_http_status_and_headers() {
    let event = Event::new(EventKind::JsonHttp)
        .apply_fault(Some(FlowError::UnauthorizedEvent("who are you".into())));

    assert_eq!(event.status(), Some(401));
    let env = event.environment().unwrap();
    assert_eq!(
        env.response.headers.get("WWW-Authenticate").map(String::as_str),
        Some("Basic realm=\"Compysition Server\"")
    );
    assert_eq!(event.error_string().unwrap(), r#"[{"message":"who are you"}]"#);
}

#[test]
fn test_fault_on_plain_event_has_no_status() {
    let event = Event::new(EventKind::Plain).apply_fault(Some(FlowError::ResourceGone("old".into())));
    assert_eq!(event.status(), None);
    assert_eq!(event.error(), Some(&FlowError::ResourceGone("old".into())));
}

#[test]
fn test_xml_error_body() {
    let event = Event::new(EventKind::Xml).apply_fault(Some(FlowError::ResourceConflict("taken".into())));
    assert_eq!(
        event.error_string().unwrap(),
        "<errors><error><message>taken</message></error></errors>"
    );
}

#[test]
fn test_status_must_be_known() {
    let mut event = Event::new(EventKind::Http);
    event.set_status(Some(404)).unwrap();
    assert_eq!(event.status(), Some(404));

    assert!(matches!(event.set_status(Some(299)), Err(FlowError::InvalidEventModification(_))));
    event.set_status(None).unwrap();
    assert_eq!(event.status(), Some(200));

    assert!(Event::new(EventKind::Plain).set_status(Some(200)).is_err());
}

#[test]
fn test_service_defaults_to_routed_queue() {
    let mut env = HttpEnvironment::default();
    env.request.url = RequestUrl {
        path_args: [("queue".to_string(), "orders".to_string())].into(),
        ..RequestUrl::default()
    };

    let mut event = Event::new(EventKind::Http);
    assert_eq!(event.service(), "default");
    event.set_environment(env).unwrap();
    assert_eq!(event.service(), "orders");

    event.set_service(Some("billing".into()));
    assert_eq!(event.service(), "billing");
    event.set_service(None);
    assert_eq!(event.service(), "orders");

    assert!(Event::new(EventKind::Json).set_environment(HttpEnvironment::default()).is_err());
}

// =============================================================================
// WIRE FORM
// =============================================================================

#[test]
fn test_wire_round_trip_keeps_every_field() {
    let mut event = Event::with_data(EventKind::JsonHttp, json!({ "sku": "A1" }))
        .unwrap()
        .with_service("inventory")
        .apply_fault(Some(FlowError::ResourceNotFound("A1".into())));
    event.set("attempt", json!(2)).unwrap();

    let decoded = Event::from_wire(&event.to_wire().unwrap()).unwrap();
    assert_eq!(decoded, event);
}

#[test]
fn test_wire_round_trip_for_log_events() {
    let record = actorflow::LogRecord::new(actorflow::LogLevel::Warning, "enrich", "slow").with_id("m-1");
    let event = Event::log(record.clone());

    let decoded = Event::from_wire(&event.to_wire().unwrap()).unwrap();
    assert_eq!(decoded.log_record(), Some(record));
}

#[test]
fn test_corrupt_wire_input_is_malformed() {
    assert!(matches!(Event::from_wire(b"\x00garbage"), Err(FlowError::MalformedEventData(_))));

    let mut value: serde_json::Value =
        serde_json::from_slice(&Event::new(EventKind::Json).to_wire().unwrap()).unwrap();
    value["data"] = json!("{broken");
    let bytes = serde_json::to_vec(&value).unwrap();
    assert!(matches!(Event::from_wire(&bytes), Err(FlowError::MalformedEventData(_))));

    let mut value: serde_json::Value =
        serde_json::from_slice(&Event::new(EventKind::JsonHttp).to_wire().unwrap()).unwrap();
    value["environment"]["response"]["status"] = json!(999);
    let bytes = serde_json::to_vec(&value).unwrap();
    assert!(matches!(Event::from_wire(&bytes), Err(FlowError::MalformedEventData(msg)) if msg.contains("999")));

    value["environment"]["response"]["status"] = json!(404);
    let bytes = serde_json::to_vec(&value).unwrap();
    assert_eq!(Event::from_wire(&bytes).unwrap().status(), Some(404));
}
