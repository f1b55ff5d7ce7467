//! # Events
//!
//! The [`Event`] is the envelope that flows through the actor graph. It has an
//! immutable identity (`event_id`), a correlation id (`meta_id`) that derived
//! events inherit, a routing tag (`service`), a payload and an optional fault.
//!
//! ## Kinds
//!
//! Instead of a class hierarchy, every event carries an [`EventKind`] chosen at
//! construction. The kind selects the conversion table used whenever the
//! payload is set, the string form of payload and fault, and (in
//! [`crate::join`]) how payloads are merged.
//!
//! ## Faults
//!
//! Attaching a fault is an explicit state transition: [`Event::apply_fault`]
//! consumes the event and returns the new state, updating the HTTP status and
//! headers of HTTP-bearing kinds through [`status::fault_status`].

pub mod http;
pub mod kind;
pub mod payload;
pub mod status;
mod wire;
pub mod xml;

pub use http::HttpEnvironment;
pub use kind::{DataFormat, EventKind};
pub use payload::Payload;
pub use xml::XmlElement;

use crate::error::{FlowError, FlowResult};
use crate::logger::LogRecord;
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use uuid::Uuid;

pub const DEFAULT_SERVICE: &str = "default";

/// The message envelope flowing between actors.
///
/// Cloning an event keeps its `event_id`: clones sent down different branches
/// of the graph remain correlated, which is what [`crate::join::EventJoin`]
/// relies on.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    kind: EventKind,
    event_id: String,
    meta_id: String,
    service: String,
    data: Payload,
    error: Option<FlowError>,
    created: DateTime<Utc>,
    environment: Option<HttpEnvironment>,
    attributes: Map<String, Value>,
}

impl Event {
    /// Creates an empty event of the given kind with a fresh identifier.
    pub fn new(kind: EventKind) -> Self {
        let event_id = Uuid::new_v4().simple().to_string();
        Self {
            kind,
            meta_id: event_id.clone(),
            event_id,
            service: DEFAULT_SERVICE.to_string(),
            data: Payload::empty_for(kind.format()),
            error: None,
            created: Utc::now(),
            environment: kind.is_http().then(HttpEnvironment::default),
            attributes: Map::new(),
        }
    }

    /// Creates an event and sets its payload through the kind's conversion table.
    pub fn with_data(kind: EventKind, data: impl Into<Payload>) -> FlowResult<Self> {
        let mut event = Self::new(kind);
        event.set_data(data)?;
        Ok(event)
    }

    /// Creates a log event. The related event's `meta_id` is recorded as the log id.
    pub fn log(record: LogRecord) -> Self {
        let mut event = Self::new(EventKind::Log);
        event.data = Payload::Json(serde_json::to_value(&record).unwrap_or(Value::Null));
        event
    }

    /// A new event of `kind` that shares this event's `meta_id` and service.
    pub fn derive(&self, kind: EventKind) -> Self {
        let mut event = Self::new(kind);
        event.meta_id = self.meta_id.clone();
        event.service = self.service.clone();
        event
    }

    pub fn with_meta_id(mut self, meta_id: impl Into<String>) -> Self {
        self.meta_id = meta_id.into();
        self
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = service.into();
        self
    }

    // --- accessors ---

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    pub fn meta_id(&self) -> &str {
        &self.meta_id
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn data(&self) -> &Payload {
        &self.data
    }

    pub fn into_data(self) -> Payload {
        self.data
    }

    pub fn error(&self) -> Option<&FlowError> {
        self.error.as_ref()
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    pub fn environment(&self) -> Option<&HttpEnvironment> {
        self.environment.as_ref()
    }

    pub fn environment_mut(&mut self) -> Option<&mut HttpEnvironment> {
        self.environment.as_mut()
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    /// Parses the payload of a log event.
    pub fn log_record(&self) -> Option<LogRecord> {
        if self.kind != EventKind::Log {
            return None;
        }
        let value = self.data.as_json()?.clone();
        serde_json::from_value(value).ok()
    }

    // --- mutation ---

    pub fn set_meta_id(&mut self, meta_id: impl Into<String>) {
        self.meta_id = meta_id.into();
    }

    /// Sets the service; `None` falls back to the routed HTTP queue or the default service.
    pub fn set_service(&mut self, service: Option<String>) {
        self.service = service
            .or_else(|| {
                self.environment
                    .as_ref()
                    .and_then(|env| env.routed_service())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| DEFAULT_SERVICE.to_string());
    }

    /// Replaces the payload, passing it through this kind's conversion table.
    pub fn set_data(&mut self, data: impl Into<Payload>) -> FlowResult<()> {
        self.data = data.into().coerce(self.kind)?;
        Ok(())
    }

    /// Installs an HTTP environment on an HTTP-bearing event.
    pub fn set_environment(&mut self, environment: HttpEnvironment) -> FlowResult<()> {
        if !self.kind.is_http() {
            return Err(FlowError::InvalidEventModification(format!(
                "{} does not carry an HTTP environment",
                self.kind
            )));
        }
        let routed = environment.routed_service().map(str::to_string);
        self.environment = Some(environment);
        if self.service == DEFAULT_SERVICE {
            if let Some(service) = routed {
                self.service = service;
            }
        }
        Ok(())
    }

    pub fn status(&self) -> Option<u16> {
        self.environment.as_ref().map(HttpEnvironment::status)
    }

    pub fn set_status(&mut self, status: Option<u16>) -> FlowResult<()> {
        match self.environment.as_mut() {
            Some(env) => env.set_status(status),
            None => Err(FlowError::InvalidEventModification(format!(
                "{} has no response status",
                self.kind
            ))),
        }
    }

    /// Generic attribute write, used by actors that edit events by name.
    ///
    /// `event_id` can never be reassigned; `meta_id`, `service` and `data` go
    /// through their typed setters; anything else lands in the attribute bag.
    pub fn set(&mut self, key: &str, value: Value) -> FlowResult<()> {
        match key {
            "event_id" => Err(FlowError::InvalidEventDataModification(
                "Cannot alter event_id once it has been set. A new event must be created".into(),
            )),
            "meta_id" => match value {
                Value::String(meta_id) => {
                    self.meta_id = meta_id;
                    Ok(())
                }
                other => Err(FlowError::InvalidEventModification(format!(
                    "meta_id must be a string, got {other}"
                ))),
            },
            "service" => match value {
                Value::Null => {
                    self.set_service(None);
                    Ok(())
                }
                Value::String(service) => {
                    self.set_service(Some(service));
                    Ok(())
                }
                other => Err(FlowError::InvalidEventModification(format!(
                    "service must be a string, got {other}"
                ))),
            },
            "data" => self.set_data(value),
            _ => {
                self.attributes.insert(key.to_string(), value);
                Ok(())
            }
        }
    }

    /// Generic attribute read, the counterpart of [`Event::set`].
    pub fn get(&self, key: &str) -> Option<Value> {
        match key {
            "event_id" => Some(Value::String(self.event_id.clone())),
            "meta_id" => Some(Value::String(self.meta_id.clone())),
            "service" => Some(Value::String(self.service.clone())),
            "data" => Some(self.data.to_value()),
            _ => self.attributes.get(key).cloned(),
        }
    }

    /// Attaches (or clears) a fault and returns the resulting event.
    ///
    /// For HTTP-bearing kinds a fault also sets the response status and any
    /// headers the fault requires.
    pub fn apply_fault(mut self, fault: Option<FlowError>) -> Self {
        if let (Some(fault), Some(env)) = (fault.as_ref(), self.environment.as_mut()) {
            let mapped = status::fault_status(Some(fault));
            if let Err(e) = env.set_status(Some(mapped.status)) {
                tracing::warn!(event_id = %self.event_id, error = %e, "Fault status not applied");
            }
            env.update_headers(mapped.headers.iter().copied());
        }
        self.error = fault;
        self
    }

    /// Converts the event to another kind, re-coercing the payload.
    ///
    /// Only conversions that add capabilities are allowed unless `force` is
    /// set; see [`EventKind::conversion_target`].
    pub fn convert(&self, target: EventKind, force: bool) -> FlowResult<Event> {
        let kind = if force {
            target
        } else {
            self.kind.conversion_target(target)?
        };
        let data = self.data.clone().coerce(kind)?;
        let environment = if kind.is_http() {
            Some(self.environment.clone().unwrap_or_default())
        } else {
            None
        };
        Ok(Event {
            kind,
            data,
            environment,
            ..self.clone()
        })
    }

    // --- string forms ---

    /// The payload rendered in the kind's string form.
    pub fn data_string(&self) -> String {
        match (&self.data, self.kind.format()) {
            (Payload::Json(value), DataFormat::Json) => value.to_string(),
            (Payload::Xml(element), DataFormat::Xml) => element.to_xml_string(),
            (data, _) => data.to_string(),
        }
    }

    /// Structured form of the attached fault, one entry per message.
    pub fn format_error(&self) -> Option<Vec<Value>> {
        self.error
            .as_ref()
            .map(|err| vec![json!({ "message": err.message() })])
    }

    /// The attached fault rendered as an error body in the kind's string form.
    pub fn error_string(&self) -> Option<String> {
        let errors = self.format_error()?;
        match self.kind.format() {
            DataFormat::Xml => {
                let mut root = XmlElement::new("errors");
                for error in &errors {
                    let message = error
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or_default();
                    root.push(
                        XmlElement::new("error")
                            .with_child(XmlElement::new("message").with_text(message)),
                    );
                }
                Some(root.to_xml_string())
            }
            _ => Some(Value::Array(errors).to_string()),
        }
    }
}
