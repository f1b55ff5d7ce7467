//! Event payloads and the per-format conversion tables.
//!
//! Setting an event's data always goes through [`Payload::coerce`], keyed by
//! the incoming payload variant. A variant a format does not accept fails with
//! [`FlowError::InvalidEventDataModification`]; so does malformed text.

use super::kind::{DataFormat, EventKind};
use super::xml::{is_valid_name, XmlElement};
use crate::error::{FlowError, FlowResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Root name used when a JSON document has no single root key.
pub const JSON_ENVELOPE: &str = "jsonified_envelope";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Payload {
    #[default]
    Empty,
    Text(String),
    Json(Value),
    Xml(XmlElement),
    List(Vec<Payload>),
}

impl Payload {
    pub fn type_name(&self) -> &'static str {
        match self {
            Payload::Empty => "empty",
            Payload::Text(_) => "text",
            Payload::Json(Value::Object(_)) => "object",
            Payload::Json(Value::Array(_)) => "array",
            Payload::Json(_) => "json scalar",
            Payload::Xml(_) => "xml element",
            Payload::List(_) => "list",
        }
    }

    /// The payload a freshly created event of the given format carries.
    pub fn empty_for(format: DataFormat) -> Payload {
        match format {
            DataFormat::Plain => Payload::Empty,
            DataFormat::Json => Payload::Json(Value::Object(Map::new())),
            DataFormat::Xml => Payload::Xml(XmlElement::new("root")),
        }
    }

    /// Runs the conversion table of `kind` over this payload.
    pub fn coerce(self, kind: EventKind) -> FlowResult<Payload> {
        match kind.format() {
            DataFormat::Plain => Ok(self),
            DataFormat::Json => self.into_json(kind),
            DataFormat::Xml => self.into_xml(kind),
        }
    }

    fn into_json(self, kind: EventKind) -> FlowResult<Payload> {
        match self {
            Payload::Empty => Ok(Payload::empty_for(DataFormat::Json)),
            Payload::Text(text) => {
                let value: Value = serde_json::from_str(&text)
                    .map_err(|e| FlowError::InvalidEventDataModification(format!("Malformed data: {e}")))?;
                Payload::Json(value).into_json(kind)
            }
            Payload::Json(value) if value.is_object() || value.is_array() => Ok(Payload::Json(value)),
            Payload::Xml(element) => Ok(Payload::Json(xml_to_json(&element))),
            other => Err(invalid_type(&other, kind)),
        }
    }

    fn into_xml(self, kind: EventKind) -> FlowResult<Payload> {
        match self {
            Payload::Empty => Ok(Payload::empty_for(DataFormat::Xml)),
            Payload::Text(text) => XmlElement::parse(&text).map(Payload::Xml),
            Payload::Xml(element) => Ok(Payload::Xml(element)),
            Payload::Json(value) => json_to_xml(&value).map(Payload::Xml),
            other => Err(invalid_type(&other, kind)),
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Payload::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_xml(&self) -> Option<&XmlElement> {
        match self {
            Payload::Xml(element) => Some(element),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Renders the payload as a JSON value for the attribute API.
    pub fn to_value(&self) -> Value {
        match self {
            Payload::Empty => Value::Null,
            Payload::Text(text) => Value::String(text.clone()),
            Payload::Json(value) => value.clone(),
            Payload::Xml(element) => Value::String(element.to_xml_string()),
            Payload::List(items) => Value::Array(items.iter().map(Payload::to_value).collect()),
        }
    }
}

fn invalid_type(payload: &Payload, kind: EventKind) -> FlowError {
    FlowError::InvalidEventDataModification(format!(
        "Data of type '{}' was not valid for event type {}",
        payload.type_name(),
        kind
    ))
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Empty => Ok(()),
            Payload::Text(text) => f.write_str(text),
            Payload::Json(value) => write!(f, "{value}"),
            Payload::Xml(element) => write!(f, "{element}"),
            Payload::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Payload::Empty,
            Value::String(text) => Payload::Text(text),
            other => Payload::Json(other),
        }
    }
}

impl From<XmlElement> for Payload {
    fn from(element: XmlElement) -> Self {
        Payload::Xml(element)
    }
}

impl From<Vec<Payload>> for Payload {
    fn from(items: Vec<Payload>) -> Self {
        Payload::List(items)
    }
}

// =============================================================================
// XML <-> JSON mapping
// =============================================================================

/// Maps an element to `{name: value}`.
///
/// Leaf elements become their text (or null), attributes become `@name` keys,
/// text next to attributes or children becomes `#text`, and repeated child
/// names collapse into arrays. A `jsonified_envelope` root is unwrapped.
pub fn xml_to_json(root: &XmlElement) -> Value {
    let value = element_value(root);
    if root.name == JSON_ENVELOPE {
        return value;
    }
    let mut map = Map::new();
    map.insert(root.name.clone(), value);
    Value::Object(map)
}

fn element_value(element: &XmlElement) -> Value {
    if element.attributes.is_empty() && element.children.is_empty() {
        return element
            .text
            .clone()
            .map(Value::String)
            .unwrap_or(Value::Null);
    }

    let mut map = Map::new();
    for (key, value) in &element.attributes {
        map.insert(format!("@{key}"), Value::String(value.clone()));
    }
    for child in &element.children {
        let value = element_value(child);
        match map.get_mut(&child.name) {
            Some(Value::Array(repeated)) => repeated.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                map.insert(child.name.clone(), value);
            }
        }
    }
    if let Some(text) = &element.text {
        map.insert("#text".to_string(), Value::String(text.clone()));
    }
    Value::Object(map)
}

/// Inverse of [`xml_to_json`].
///
/// A single-key object whose value is not an array becomes that element;
/// everything else is wrapped in a `jsonified_envelope` root.
pub fn json_to_xml(value: &Value) -> FlowResult<XmlElement> {
    if let Value::Object(map) = value {
        if map.len() == 1 {
            if let Some((name, inner)) = map.iter().next() {
                if !inner.is_array() {
                    return build_element(name, inner);
                }
            }
        }
    }
    build_element(JSON_ENVELOPE, value)
}

fn build_element(name: &str, value: &Value) -> FlowResult<XmlElement> {
    if !is_valid_name(name) {
        return Err(FlowError::InvalidEventDataModification(format!(
            "Malformed data: '{name}' is not a valid element name"
        )));
    }
    let mut element = XmlElement::new(name);
    match value {
        Value::Null => {}
        Value::Bool(_) | Value::Number(_) => element.text = Some(value.to_string()),
        Value::String(text) => element.text = Some(text.clone()),
        Value::Array(items) => {
            for item in items {
                element.push(build_element(name, item)?);
            }
        }
        Value::Object(map) => {
            for (key, child) in map {
                if let Some(attribute) = key.strip_prefix('@') {
                    let text = match child {
                        Value::String(text) => text.clone(),
                        other => other.to_string(),
                    };
                    element.attributes.push((attribute.to_string(), text));
                } else if key == "#text" {
                    element.text = Some(match child {
                        Value::String(text) => text.clone(),
                        other => other.to_string(),
                    });
                } else if let Value::Array(items) = child {
                    for item in items {
                        element.push(build_element(key, item)?);
                    }
                } else {
                    element.push(build_element(key, child)?);
                }
            }
        }
    }
    Ok(element)
}
