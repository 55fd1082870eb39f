//! Tests for normalize module

use super::*;
use crate::decode::{parse_document, FeedParser};
use crate::error::Error;
use crate::schema::find_stream;
use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use serde_json::json;
use test_case::test_case;

fn coerce_xml(xml: &str) -> crate::error::Result<FieldValue> {
    coerce(&parse_document(xml).unwrap())
}

const ENTRY: &str = r#"<feed xmlns="http://www.w3.org/2005/Atom" xmlns:d="urn:d" xmlns:m="urn:m">
  <entry>
    <content type="application/xml">
      <m:properties>
        <d:Timestamp m:type="Edm.Int64">4021</d:Timestamp>
        <d:ID m:type="Edm.Guid">9f2c</d:ID>
        <d:DeletedDate m:type="Edm.DateTime">2024-03-01T10:15:00</d:DeletedDate>
        <d:DeletedBy m:type="Edm.Guid" m:null="true" />
        <d:EntityKey>abc</d:EntityKey>
        <d:Unexpected>dropped</d:Unexpected>
      </m:properties>
    </content>
  </entry>
</feed>"#;

// ============================================================================
// Coercion
// ============================================================================

#[test_case(r#"<d:Name>abc</d:Name>"#, FieldValue::String("abc".into()) ; "bare string")]
#[test_case(r#"<d:Name/>"#, FieldValue::Null ; "bare empty")]
#[test_case(r#"<d:Name m:null="true"/>"#, FieldValue::Null ; "null flag")]
#[test_case(r#"<d:Flag m:type="Edm.Int32" m:null="true"/>"#, FieldValue::Null ; "null flag wins over type")]
#[test_case(r#"<d:Flag m:type="Edm.Boolean">true</d:Flag>"#, FieldValue::Boolean(true) ; "boolean true")]
#[test_case(r#"<d:Flag m:type="Edm.Boolean">false</d:Flag>"#, FieldValue::Boolean(false) ; "boolean false")]
#[test_case(r#"<d:Flag m:type="Edm.Boolean">yes</d:Flag>"#, FieldValue::Null ; "boolean other")]
#[test_case(r#"<d:Count m:type="Edm.Int32">42</d:Count>"#, FieldValue::Integer(42) ; "int32")]
#[test_case(r#"<d:Count m:type="Edm.Int64">-9000000000</d:Count>"#, FieldValue::Integer(-9_000_000_000) ; "int64")]
#[test_case(r#"<d:Amount m:type="Edm.Double">12.5</d:Amount>"#, FieldValue::Float(12.5) ; "double")]
#[test_case(r#"<d:Amount m:type="Edm.Decimal">12.50</d:Amount>"#, FieldValue::String("12.50".into()) ; "decimal stays text")]
#[test_case(r#"<d:ID m:type="Edm.Guid">9f2c</d:ID>"#, FieldValue::String("9f2c".into()) ; "guid text")]
#[test_case(r#"<d:ID m:type="Edm.Guid"/>"#, FieldValue::Null ; "typed without text")]
fn test_coerce(xml: &str, expected: FieldValue) {
    assert_eq!(coerce_xml(xml).unwrap(), expected);
}

#[test_case(r#"<d:Count m:type="Edm.Int32">4x2</d:Count>"# ; "bad integer")]
#[test_case(r#"<d:Count m:type="Edm.Int16"/>"# ; "integer without text")]
#[test_case(r#"<d:Amount m:type="Edm.Double">n/a</d:Amount>"# ; "bad double")]
fn test_coerce_malformed(xml: &str) {
    let err = coerce_xml(xml).unwrap_err();
    assert!(err.is_record_level());
    match err {
        Error::MalformedField { field, .. } => assert!(field == "Count" || field == "Amount"),
        other => panic!("expected MalformedField, got {other:?}"),
    }
}

#[test]
fn test_field_name_strips_prefix() {
    assert_eq!(field_name("d:AmountDC"), "AmountDC");
    assert_eq!(field_name("AmountDC"), "AmountDC");
    assert_eq!(field_name("ns:AmountDC"), "AmountDC");
}

// ============================================================================
// Entry normalization
// ============================================================================

#[test]
fn test_normalize_entry() {
    let feed = FeedParser::parse(ENTRY.as_bytes()).unwrap();
    let record = normalize(&feed.entries()[0]).unwrap();

    assert_eq!(record.len(), 6);
    assert_eq!(record.get("Timestamp"), Some(&FieldValue::Integer(4021)));
    assert_eq!(record.get("DeletedBy"), Some(&FieldValue::Null));
    assert_eq!(
        record.get("DeletedDate"),
        Some(&FieldValue::String("2024-03-01T10:15:00".into()))
    );
}

#[test]
fn test_normalize_is_deterministic() {
    let feed = FeedParser::parse(ENTRY.as_bytes()).unwrap();
    let first = serde_json::to_string(&normalize(&feed.entries()[0]).unwrap()).unwrap();
    let second = serde_json::to_string(&normalize(&feed.entries()[0]).unwrap()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_normalize_entry_without_properties() {
    let feed = FeedParser::parse(b"<feed><entry><id>1</id></entry></feed>").unwrap();
    let err = normalize(&feed.entries()[0]).unwrap_err();
    assert!(err.is_record_level());
}

#[test]
fn test_reconcile_to_declared_fields() {
    let feed = FeedParser::parse(ENTRY.as_bytes()).unwrap();
    let stream = find_stream("deleted").unwrap();
    let record = reconcile(normalize(&feed.entries()[0]).unwrap(), stream);

    assert_eq!(
        serde_json::to_value(&record).unwrap(),
        json!({
            "Timestamp": 4021,
            "DeletedBy": null,
            "DeletedDate": "2024-03-01T10:15:00",
            "Division": null,
            "EntityKey": "abc",
            "EntityType": null,
            "ID": "9f2c"
        })
    );
    assert_eq!(
        record.get("DeletedDate"),
        Some(&FieldValue::Timestamp(
            NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(10, 15, 0)
                .unwrap()
        ))
    );
    assert!(record.get("Unexpected").is_none());
}

#[test]
fn test_reconcile_keeps_unparsable_datetime_text() {
    let mut record = NormalizedRecord::new();
    record.insert("DeletedDate", FieldValue::String("yesterday".into()));
    let record = reconcile(record, find_stream("deleted").unwrap());
    assert_eq!(
        record.get("DeletedDate"),
        Some(&FieldValue::String("yesterday".into()))
    );
}

// ============================================================================
// Values
// ============================================================================

#[test]
fn test_field_value_json() {
    assert_eq!(FieldValue::Float(f64::NAN).to_json(), json!(null));
    assert_eq!(FieldValue::Float(1.25).to_json(), json!(1.25));
    let ts = parse_timestamp("2024-03-01T10:15:00.250").unwrap();
    assert_eq!(FieldValue::Timestamp(ts).to_json(), json!("2024-03-01T10:15:00.250"));
}

#[test]
fn test_parse_timestamp_variants() {
    let expected = NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(10, 0, 0)
        .unwrap();
    assert_eq!(parse_timestamp("2024-03-01T10:00:00"), Some(expected));
    assert_eq!(parse_timestamp("2024-03-01T12:00:00+02:00"), Some(expected));
    assert_eq!(parse_timestamp("2024-03-01"), None);
}

#[test]
fn test_as_timestamp_and_integer() {
    assert_eq!(FieldValue::Integer(7).as_i64(), Some(7));
    assert_eq!(FieldValue::String("7".into()).as_i64(), None);
    assert!(FieldValue::String("2024-03-01T10:00:00".into())
        .as_timestamp()
        .is_some());
    assert!(FieldValue::Null.is_null());
}
