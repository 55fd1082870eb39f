//! OData property coercion
//!
//! Coercion rules, in priority order, for each element below
//! `content/properties`:
//!
//! 1. no attributes and text: the text as a string
//! 2. no attributes and no text, or `m:null="true"`: null
//! 3. `m:type="Edm.Boolean"`: `true`/`false`, anything else null
//! 4. type containing `Int`: base-10 integer, else `MalformedField`
//! 5. type containing `Double`: float, else `MalformedField`
//! 6. otherwise the text, or null when there is none
//!
//! The type hint alone decides the coercion; the shape of the text does not.

use super::types::{FieldValue, NormalizedRecord};
use crate::decode::{Entry, XmlElement};
use crate::error::{Error, Result};
use crate::schema::{FieldType, StreamDefinition};

/// OData boolean type name
pub const EDM_BOOLEAN: &str = "Edm.Boolean";

/// Field name for a namespaced property key: the fixed two-character
/// prefix (`d:`) is dropped
pub fn field_name(qualified: &str) -> &str {
    match qualified.as_bytes().get(1) {
        Some(b':') => &qualified[2..],
        _ => crate::decode::local_name(qualified),
    }
}

/// Turn one feed entry into a record holding the fields present in the entry
pub fn normalize(entry: &Entry<'_>) -> Result<NormalizedRecord> {
    let properties = entry.properties().ok_or_else(|| {
        Error::malformed_field("content", "", "entry has no content/properties element")
    })?;

    properties
        .elements()
        .map(|element| -> Result<(String, FieldValue)> {
            Ok((field_name(&element.name).to_string(), coerce(element)?))
        })
        .collect()
}

/// Coerce one property element
pub fn coerce(element: &XmlElement) -> Result<FieldValue> {
    let text = element.text();

    if !element.has_attributes() {
        return Ok(text.map_or(FieldValue::Null, FieldValue::String));
    }

    if element.attribute("null") == Some("true") {
        return Ok(FieldValue::Null);
    }

    let odata_type = element.attribute("type").unwrap_or_default();
    let name = field_name(&element.name);

    if odata_type == EDM_BOOLEAN {
        return Ok(match text.as_deref() {
            Some("true") => FieldValue::Boolean(true),
            Some("false") => FieldValue::Boolean(false),
            _ => FieldValue::Null,
        });
    }

    if odata_type.contains("Int") {
        let raw = text.unwrap_or_default();
        return raw
            .parse::<i64>()
            .map(FieldValue::Integer)
            .map_err(|e| Error::malformed_field(name, raw, format!("{odata_type}: {e}")));
    }

    if odata_type.contains("Double") {
        let raw = text.unwrap_or_default();
        return raw
            .parse::<f64>()
            .map(FieldValue::Float)
            .map_err(|e| Error::malformed_field(name, raw, format!("{odata_type}: {e}")));
    }

    Ok(text.map_or(FieldValue::Null, FieldValue::String))
}

/// Shape a record to the stream's declared fields.
///
/// Every declared field is present (missing ones are null), undeclared fields
/// are dropped, and strings in `DateTime` fields become timestamps when they
/// parse.
pub fn reconcile(mut record: NormalizedRecord, stream: &StreamDefinition) -> NormalizedRecord {
    stream
        .fields
        .iter()
        .map(|field| {
            let value = record.remove(field.name).unwrap_or(FieldValue::Null);
            let value = match (field.field_type, value) {
                (FieldType::DateTime, FieldValue::String(s)) => {
                    match super::types::parse_timestamp(&s) {
                        Some(ts) => FieldValue::Timestamp(ts),
                        None => FieldValue::String(s),
                    }
                }
                (_, value) => value,
            };
            (field.name.to_string(), value)
        })
        .collect()
}
