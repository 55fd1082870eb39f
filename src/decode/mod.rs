//! Response decoder module
//!
//! Turns the upstream's Atom/XML payloads into a typed tree.
//!
//! # Overview
//!
//! [`FeedParser`] builds an [`XmlElement`] tree with quick-xml and wraps it in
//! a [`Feed`], whose accessors expose entries and pagination links.

mod feed;
mod xml;

pub use feed::{Entry, Feed, FeedParser, Link, LinkSet};
pub use xml::{local_name, parse_document, XmlElement, XmlNode};
