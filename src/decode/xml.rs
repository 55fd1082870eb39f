//! Typed XML tree
//!
//! A small owned representation of an XML document built with quick-xml.
//! Names keep their namespace prefix; lookups go by local name.

use crate::error::{Error, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

/// A node in the document tree
#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    /// Element with attributes and children
    Element(XmlElement),
    /// Character data, entities already resolved
    Text(String),
}

/// An element with its qualified name, attributes in document order and children
#[derive(Debug, Clone, PartialEq, Default)]
pub struct XmlElement {
    /// Qualified name, e.g. `d:Amount`
    pub name: String,
    /// Attributes as (qualified name, unescaped value)
    pub attributes: Vec<(String, String)>,
    /// Child nodes in document order
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    /// Create an empty element
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Name without the namespace prefix
    pub fn local_name(&self) -> &str {
        local_name(&self.name)
    }

    /// Attribute value by local name; namespace declarations are skipped
    pub fn attribute(&self, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .filter(|(name, _)| !is_namespace_declaration(name))
            .find(|(name, _)| local_name(name) == local)
            .map(|(_, value)| value.as_str())
    }

    /// Check whether the element carries attributes other than namespace declarations
    pub fn has_attributes(&self) -> bool {
        self.attributes
            .iter()
            .any(|(name, _)| !is_namespace_declaration(name))
    }

    /// Child elements, skipping text
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(e) => Some(e),
            XmlNode::Text(_) => None,
        })
    }

    /// Child elements with the given local name
    pub fn elements_named<'a>(&'a self, local: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.elements().filter(move |e| e.local_name() == local)
    }

    /// First child element with the given local name
    pub fn child(&self, local: &str) -> Option<&XmlElement> {
        self.elements().find(|e| e.local_name() == local)
    }

    /// Text content with surrounding whitespace removed; `None` when blank
    pub fn text(&self) -> Option<String> {
        let mut text = String::new();
        for node in &self.children {
            if let XmlNode::Text(t) = node {
                text.push_str(t);
            }
        }
        let trimmed = text.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}

/// Part of a qualified name after the last `:`
pub fn local_name(qualified: &str) -> &str {
    qualified.rsplit(':').next().unwrap_or(qualified)
}

fn is_namespace_declaration(name: &str) -> bool {
    name == "xmlns" || name.starts_with("xmlns:")
}

/// Parse a document and return its root element
pub fn parse_document(text: &str) -> Result<XmlElement> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().check_end_names = true;

    // Open elements; the finished root lands in `root`
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| xml_error(&reader, e.to_string()))?;

        match event {
            Event::Start(start) => {
                stack.push(open_element(&reader, &start)?);
            }
            Event::Empty(start) => {
                let element = open_element(&reader, &start)?;
                close_element(element, &mut stack, &mut root, &reader)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| xml_error(&reader, "unexpected closing tag"))?;
                close_element(element, &mut stack, &mut root, &reader)?;
            }
            Event::Text(text) => {
                if let Some(parent) = stack.last_mut() {
                    let value = text
                        .unescape()
                        .map_err(|e| xml_error(&reader, e.to_string()))?;
                    parent.children.push(XmlNode::Text(value.into_owned()));
                }
            }
            Event::CData(data) => {
                if let Some(parent) = stack.last_mut() {
                    let value = String::from_utf8_lossy(&data.into_inner()).into_owned();
                    parent.children.push(XmlNode::Text(value));
                }
            }
            Event::Eof => break,
            // Declaration, comments, processing instructions, doctype
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(Error::unparsable_feed(format!(
            "unexpected end of document inside <{}>",
            open.name
        )));
    }
    root.ok_or_else(|| Error::unparsable_feed("document has no root element"))
}

fn open_element(reader: &Reader<&[u8]>, start: &BytesStart<'_>) -> Result<XmlElement> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attributes = Vec::new();

    for attr in start.attributes() {
        let attr = attr.map_err(|e| xml_error(reader, e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| xml_error(reader, e.to_string()))?
            .into_owned();
        attributes.push((key, value));
    }

    Ok(XmlElement {
        name,
        attributes,
        children: Vec::new(),
    })
}

fn close_element(
    element: XmlElement,
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    reader: &Reader<&[u8]>,
) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(XmlNode::Element(element)),
        None if root.is_none() => *root = Some(element),
        None => return Err(xml_error(reader, "multiple root elements")),
    }
    Ok(())
}

fn xml_error(reader: &Reader<&[u8]>, message: impl std::fmt::Display) -> Error {
    Error::unparsable_feed(format!(
        "{message} at byte {}",
        reader.buffer_position()
    ))
}
