//! Atom feed parsing
//!
//! Two complementary attempts are made on every payload:
//!
//! 1. **Recovery**: decode lossily, drop characters that are illegal in
//!    XML 1.0 (stray control bytes the upstream sometimes emits) and escape
//!    every `&` that does not start a predefined entity or a valid character
//!    reference, then parse. Free-text fields such as `AT&T` or `&nbsp;`
//!    come through as literal text.
//! 2. **Fallback**: strip a UTF-8 byte-order mark, decode strictly and parse
//!    the text unchanged.
//!
//! The payload is unparsable only when both attempts fail.

use super::xml::{parse_document, XmlElement};
use crate::error::{Error, Result};
use tracing::debug;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Parses raw response bodies into [`Feed`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct FeedParser;

impl FeedParser {
    /// Parse a raw feed payload
    pub fn parse(raw: &[u8]) -> Result<Feed> {
        let recovered = recover_document(raw);
        let recovery_error = match parse_document(&recovered) {
            Ok(root) => return Ok(Feed::new(root)),
            Err(e) => e,
        };
        debug!("Recovery parse failed ({recovery_error}), retrying as UTF-8 with BOM");

        let fallback = std::str::from_utf8(raw.strip_prefix(UTF8_BOM).unwrap_or(raw))
            .map_err(|e| Error::unparsable_feed(format!("invalid UTF-8: {e}")))
            .and_then(parse_document);

        match fallback {
            Ok(root) => Ok(Feed::new(root)),
            Err(fallback_error) => Err(Error::unparsable_feed(format!(
                "recovery parse: {recovery_error}; BOM fallback: {fallback_error}"
            ))),
        }
    }
}

/// Lossy decode without a leading BOM, with characters outside the XML 1.0
/// `Char` production removed and stray ampersands escaped
fn recover_document(raw: &[u8]) -> String {
    let cleaned: String = String::from_utf8_lossy(raw)
        .trim_start_matches('\u{FEFF}')
        .chars()
        .filter(|c| is_xml_char(*c))
        .collect();
    escape_stray_ampersands(&cleaned)
}

/// Escape `&` outside CDATA sections and comments unless it starts a
/// reference the XML parser can resolve
fn escape_stray_ampersands(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(pos) = rest.find(['&', '<']) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if tail.starts_with('<') {
            let end = verbatim_section_len(tail).unwrap_or(1);
            out.push_str(&tail[..end]);
            rest = &tail[end..];
            continue;
        }

        match reference_len(tail) {
            Some(len) => {
                out.push_str(&tail[..len]);
                rest = &tail[len..];
            }
            None => {
                out.push_str("&amp;");
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

/// Length of a CDATA section or comment at the start of `tail`; an
/// unterminated one runs to the end
fn verbatim_section_len(tail: &str) -> Option<usize> {
    [("<![CDATA[", "]]>"), ("<!--", "-->")]
        .into_iter()
        .find(|(open, _)| tail.starts_with(open))
        .map(|(open, close)| {
            tail[open.len()..]
                .find(close)
                .map_or(tail.len(), |i| open.len() + i + close.len())
        })
}

/// Length of the entity or character reference at the start of `tail`
fn reference_len(tail: &str) -> Option<usize> {
    let end = tail.find(';')?;
    let body = &tail[1..end];

    let valid = if let Some(hex) = body.strip_prefix("#x") {
        !hex.is_empty()
            && hex.chars().all(|c| c.is_ascii_hexdigit())
            && valid_code_point(u32::from_str_radix(hex, 16).ok())
    } else if let Some(dec) = body.strip_prefix('#') {
        !dec.is_empty()
            && dec.chars().all(|c| c.is_ascii_digit())
            && valid_code_point(dec.parse().ok())
    } else {
        matches!(body, "amp" | "lt" | "gt" | "quot" | "apos")
    };

    valid.then_some(end + 1)
}

fn valid_code_point(value: Option<u32>) -> bool {
    value.and_then(char::from_u32).is_some_and(is_xml_char)
}

fn is_xml_char(c: char) -> bool {
    matches!(c,
        '\u{9}' | '\u{A}' | '\u{D}'
        | '\u{20}'..='\u{D7FF}'
        | '\u{E000}'..='\u{FFFD}'
        | '\u{10000}'..='\u{10FFFF}')
}

/// A parsed feed document
#[derive(Debug, Clone, PartialEq)]
pub struct Feed {
    root: XmlElement,
}

impl Feed {
    /// Wrap a parsed root element
    pub fn new(root: XmlElement) -> Self {
        if root.local_name() != "feed" {
            debug!(root = %root.name, "Document root is not a feed; no entries or links");
        }
        Self { root }
    }

    /// Root element of the document
    pub fn root(&self) -> &XmlElement {
        &self.root
    }

    fn is_feed(&self) -> bool {
        self.root.local_name() == "feed"
    }

    /// Entries in document order; a single entry yields one item
    pub fn entries(&self) -> Vec<Entry<'_>> {
        if !self.is_feed() {
            return Vec::new();
        }
        self.root
            .elements_named("entry")
            .map(|element| Entry { element })
            .collect()
    }

    /// Feed-level links, keeping the single-versus-many shape
    pub fn links(&self) -> LinkSet {
        if !self.is_feed() {
            return LinkSet::None;
        }
        let mut links: Vec<Link> = self.root.elements_named("link").map(Link::from).collect();
        match links.len() {
            0 => LinkSet::None,
            1 => LinkSet::Single(links.remove(0)),
            _ => LinkSet::Many(links),
        }
    }
}

/// One `entry` element of a feed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Entry<'a> {
    element: &'a XmlElement,
}

impl<'a> Entry<'a> {
    /// Wrap an `entry` element
    pub fn new(element: &'a XmlElement) -> Self {
        Self { element }
    }

    /// The underlying element
    pub fn element(&self) -> &'a XmlElement {
        self.element
    }

    /// The `content/properties` element holding the typed fields
    pub fn properties(&self) -> Option<&'a XmlElement> {
        self.element.child("content")?.child("properties")
    }
}

/// A feed `link` element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    /// Link relation (`self`, `next`, ...)
    pub rel: String,
    /// Target URL
    pub href: String,
}

impl From<&XmlElement> for Link {
    fn from(element: &XmlElement) -> Self {
        Self {
            rel: element.attribute("rel").unwrap_or_default().to_string(),
            href: element.attribute("href").unwrap_or_default().to_string(),
        }
    }
}

/// The `link` children of a feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkSet {
    /// No links
    None,
    /// Exactly one link element
    Single(Link),
    /// Two or more link elements
    Many(Vec<Link>),
}
