//! Serialized form of an event for actors that ship events across a process boundary.
//!
//! Every field except the payload is carried verbatim; the payload travels as
//! its string form and is re-coerced through the kind's conversion table on
//! the receiving side.

use super::http::status_reason;
use super::{Event, EventKind, HttpEnvironment, Payload};
use crate::error::{FlowError, FlowResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Serialize, Deserialize)]
struct WireEvent {
    kind: EventKind,
    event_id: String,
    meta_id: String,
    service: String,
    created: DateTime<Utc>,
    error: Option<FlowError>,
    environment: Option<HttpEnvironment>,
    #[serde(default)]
    attributes: Map<String, Value>,
    data: Option<String>,
}

impl Event {
    pub fn to_wire(&self) -> FlowResult<Vec<u8>> {
        let data = match &self.data {
            Payload::Empty => None,
            _ => Some(self.data_string()),
        };
        let wire = WireEvent {
            kind: self.kind,
            event_id: self.event_id.clone(),
            meta_id: self.meta_id.clone(),
            service: self.service.clone(),
            created: self.created,
            error: self.error.clone(),
            environment: self.environment.clone(),
            attributes: self.attributes.clone(),
            data,
        };
        serde_json::to_vec(&wire).map_err(|e| FlowError::Internal(format!("event encoding failed: {e}")))
    }

    /// Rebuilds an event from [`Event::to_wire`] output.
    ///
    /// Corrupt or incompatible input, including an unknown response status,
    /// fails with [`FlowError::MalformedEventData`].
    ///
    /// Plain-format payloads come back as [`Payload::Text`]: a list or JSON
    /// value carried by a plain event is restored as its string form, not as
    /// the original structure.
    pub fn from_wire(bytes: &[u8]) -> FlowResult<Event> {
        let wire: WireEvent = serde_json::from_slice(bytes)
            .map_err(|e| FlowError::MalformedEventData(format!("corrupt event blob: {e}")))?;

        if wire.environment.is_some() != wire.kind.is_http() {
            return Err(FlowError::MalformedEventData(format!(
                "environment does not match event kind {}",
                wire.kind
            )));
        }

        if let Some(status) = wire.environment.as_ref().map(HttpEnvironment::status) {
            if status_reason(status).is_none() {
                return Err(FlowError::MalformedEventData(format!(
                    "unknown response status {status}"
                )));
            }
        }

        let data = match wire.data {
            Some(text) if wire.kind == EventKind::Log => Payload::Json(serde_json::from_str(&text)?),
            Some(text) => Payload::Text(text),
            None => Payload::Empty,
        }
        .coerce(wire.kind)
        .map_err(|e| FlowError::MalformedEventData(format!("incompatible payload: {e}")))?;

        Ok(Event {
            kind: wire.kind,
            event_id: wire.event_id,
            meta_id: wire.meta_id,
            service: wire.service,
            data,
            error: wire.error,
            created: wire.created,
            environment: wire.environment,
            attributes: wire.attributes,
        })
    }
}
