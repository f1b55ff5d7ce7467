//! Minimal owned XML element tree used as the payload of XML events.

use crate::error::{FlowError, FlowResult};
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event as XmlEvent};
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write};

/// An XML element with attributes, text content and child elements.
///
/// Mixed content is flattened: all text directly inside the element is
/// concatenated into `text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: Option<String>,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            text: None,
            children: Vec::new(),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(child);
        self
    }

    pub fn push(&mut self, child: XmlElement) {
        self.children.push(child);
    }

    /// First direct child with the given name.
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Parses a document containing exactly one root element.
    pub fn parse(input: &str) -> FlowResult<Self> {
        let mut reader = Reader::from_str(input);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            match reader.read_event().map_err(malformed)? {
                XmlEvent::Start(start) => stack.push(element_from_start(&start)?),
                XmlEvent::Empty(start) => {
                    let element = element_from_start(&start)?;
                    attach(&mut stack, &mut root, element)?;
                }
                XmlEvent::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| malformed("unexpected closing tag"))?;
                    attach(&mut stack, &mut root, element)?;
                }
                XmlEvent::Text(text) => {
                    let text = text.unescape().map_err(malformed)?;
                    append_text(&mut stack, &text)?;
                }
                XmlEvent::CData(data) => {
                    let text = String::from_utf8_lossy(&data.into_inner()).into_owned();
                    append_text(&mut stack, &text)?;
                }
                XmlEvent::Eof => break,
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(malformed(format!("unclosed element <{}>", open.name)));
        }
        root.ok_or_else(|| malformed("document has no root element"))
    }

    pub fn to_xml_string(&self) -> String {
        let mut out = String::new();
        self.write_into(&mut out);
        out
    }

    fn write_into(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attributes {
            let _ = write!(out, " {}=\"{}\"", key, escape(value.as_str()));
        }
        if self.text.is_none() && self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        if let Some(text) = &self.text {
            out.push_str(&escape(text.as_str()));
        }
        for child in &self.children {
            child.write_into(out);
        }
        let _ = write!(out, "</{}>", self.name);
    }
}

impl fmt::Display for XmlElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_xml_string())
    }
}

/// Checks that `name` can be used as an element name.
pub(crate) fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':'))
}

fn element_from_start(start: &BytesStart<'_>) -> FlowResult<XmlElement> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut element = XmlElement::new(name);
    for attribute in start.attributes() {
        let attribute = attribute.map_err(malformed)?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute.unescape_value().map_err(malformed)?.into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> FlowResult<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_some() => return Err(malformed("multiple root elements")),
        None => *root = Some(element),
    }
    Ok(())
}

fn append_text(stack: &mut [XmlElement], text: &str) -> FlowResult<()> {
    match stack.last_mut() {
        Some(current) => {
            current.text.get_or_insert_with(String::new).push_str(text);
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err(malformed("text outside of the root element")),
    }
}

fn malformed(err: impl fmt::Display) -> FlowError {
    FlowError::InvalidEventDataModification(format!("Malformed data: {err}"))
}
