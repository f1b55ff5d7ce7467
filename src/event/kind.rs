//! Event kinds and the conversion lattice between them.
//!
//! Every kind is a pair of capabilities: a payload format (plain, XML, JSON)
//! and whether the event carries an HTTP environment. A kind *descends from*
//! another when it has every capability of the other, so `XmlHttp` descends
//! from `Xml`, `Http` and `Plain`. Conversion is only allowed towards kinds
//! that add capabilities.

use crate::error::{FlowError, FlowResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Payload format carried by an event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataFormat {
    Plain,
    Xml,
    Json,
}

/// The closed set of event variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Plain,
    Log,
    Http,
    Xml,
    XmlHttp,
    Json,
    JsonHttp,
}

impl EventKind {
    pub const ALL: [EventKind; 7] = [
        EventKind::Plain,
        EventKind::Log,
        EventKind::Http,
        EventKind::Xml,
        EventKind::XmlHttp,
        EventKind::Json,
        EventKind::JsonHttp,
    ];

    pub fn format(self) -> DataFormat {
        match self {
            EventKind::Plain | EventKind::Log | EventKind::Http => DataFormat::Plain,
            EventKind::Xml | EventKind::XmlHttp => DataFormat::Xml,
            EventKind::Json | EventKind::JsonHttp => DataFormat::Json,
        }
    }

    pub fn is_http(self) -> bool {
        matches!(
            self,
            EventKind::Http | EventKind::XmlHttp | EventKind::JsonHttp
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            EventKind::Plain => "Event",
            EventKind::Log => "LogEvent",
            EventKind::Http => "HttpEvent",
            EventKind::Xml => "XMLEvent",
            EventKind::XmlHttp => "XMLHttpEvent",
            EventKind::Json => "JSONEvent",
            EventKind::JsonHttp => "JSONHttpEvent",
        }
    }

    /// Builds the non-log kind with the given capabilities.
    pub fn from_parts(format: DataFormat, http: bool) -> EventKind {
        match (format, http) {
            (DataFormat::Plain, false) => EventKind::Plain,
            (DataFormat::Plain, true) => EventKind::Http,
            (DataFormat::Xml, false) => EventKind::Xml,
            (DataFormat::Xml, true) => EventKind::XmlHttp,
            (DataFormat::Json, false) => EventKind::Json,
            (DataFormat::Json, true) => EventKind::JsonHttp,
        }
    }

    /// Returns true when `self` carries every capability of `ancestor`.
    pub fn descends_from(self, ancestor: EventKind) -> bool {
        if self == ancestor || ancestor == EventKind::Plain {
            return true;
        }
        if self == EventKind::Log || ancestor == EventKind::Log {
            return false;
        }
        let format_ok = ancestor.format() == DataFormat::Plain || ancestor.format() == self.format();
        let http_ok = !ancestor.is_http() || self.is_http();
        format_ok && http_ok
    }

    /// Resolves the kind an event of kind `self` becomes when converted to `target`.
    ///
    /// Unrelated kinds are combined when their formats do not clash, so an
    /// `Xml` event converted to `Http` becomes `XmlHttp`.
    pub fn conversion_target(self, target: EventKind) -> FlowResult<EventKind> {
        if target.descends_from(self) {
            return Ok(target);
        }
        if self.descends_from(target) {
            return Err(FlowError::InvalidEventConversion(format!(
                "Narrowing event conversion attempted, this is not allowed <Attempted {self} -> {target}>"
            )));
        }
        if self == EventKind::Log || target == EventKind::Log {
            return Err(unrelated(self, target));
        }
        let format = match (self.format(), target.format()) {
            (current, DataFormat::Plain) => current,
            (DataFormat::Plain, wanted) => wanted,
            (current, wanted) if current == wanted => current,
            _ => return Err(unrelated(self, target)),
        };
        Ok(EventKind::from_parts(format, self.is_http() || target.is_http()))
    }
}

fn unrelated(from: EventKind, to: EventKind) -> FlowError {
    FlowError::InvalidEventConversion(format!(
        "Unrelated event conversion attempted <Attempted {from} -> {to}>"
    ))
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
