//! Tests for engine module

use super::*;
use crate::auth::{Authenticator, OAuthConfig, ObjectTokenStore, TokenSet, TokenStore};
use crate::http::{HttpClient, HttpClientConfig, RetryPolicy};
use crate::normalize::FieldValue;
use crate::schema::{find_stream, Replication, StreamDefinition};
use crate::state::ReplicationCursor;
use crate::types::{ErrorStrategy, LogLevel};
use chrono::{NaiveDate, NaiveDateTime, Utc};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use test_case::test_case;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DELETED_PATH: &str = "/api/v1/17/sync/Deleted";

async fn fetcher(server: &MockServer) -> StreamFetcher {
    let store = Arc::new(ObjectTokenStore::in_memory());
    store
        .save(&TokenSet::new("access-1", "refresh-1", Utc::now()))
        .await
        .unwrap();
    let oauth = OAuthConfig::new(format!("{}/oauth2/token", server.uri()), "id", "secret")
        .with_retry(RetryPolicy::none());
    let auth = Arc::new(Authenticator::load(oauth, store).await.unwrap());

    let config = HttpClientConfig::builder()
        .base_url(format!("{}/api/v1", server.uri()))
        .timeout(Duration::from_secs(5))
        .retry(RetryPolicy::none())
        .no_rate_limit()
        .build();
    StreamFetcher::new(Arc::new(HttpClient::new(config, auth).unwrap()))
}

/// Deleted-stream entry with the given row version
fn entry(timestamp: i64) -> String {
    format!(
        r#"<entry><content type="application/xml"><m:properties>
<d:Timestamp m:type="Edm.Int64">{timestamp}</d:Timestamp>
<d:ID m:type="Edm.Guid">id-{timestamp}</d:ID>
<d:EntityType m:type="Edm.Int16">20</d:EntityType>
</m:properties></content></entry>"#
    )
}

fn feed(entries: &[String], next: Option<&str>) -> String {
    let links = match next {
        Some(token) => format!(
            r#"<link rel="self" href="Deleted"/><link rel="next" href="https://host/api/v1/17/sync/Deleted?$select=ID&amp;$skiptoken={token}"/>"#
        ),
        None => r#"<link rel="self" href="Deleted"/>"#.to_string(),
    };
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:d="http://schemas.microsoft.com/ado/2007/08/dataservices" xmlns:m="http://schemas.microsoft.com/ado/2007/08/dataservices/metadata">
<title type="text">Deleted</title>{links}{}</feed>"#,
        entries.concat()
    )
}

fn atom(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "application/atom+xml")
}

/// Run one stream and keep every message it emits, even when it fails
async fn sync_collect(
    engine: &mut SyncEngine,
    stream: &StreamDefinition,
) -> (Vec<Message>, Result<()>) {
    let mut messages = Vec::new();
    let result = engine
        .sync_stream(stream, |message| {
            messages.push(message.clone());
            Ok(())
        })
        .await;
    (messages, result)
}

fn at(day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 2, day)
        .unwrap()
        .and_hms_opt(6, 30, 0)
        .unwrap()
}

// ============================================================================
// Filter Tests
// ============================================================================

#[test_case(Replication::RowVersion, None, None, Some("Timestamp gt 1") ; "row version from start")]
#[test_case(Replication::RowVersion, Some(ReplicationCursor::RowVersion(1)), None, Some("Timestamp gt 1") ; "row version sentinel unsuffixed")]
#[test_case(Replication::RowVersion, Some(ReplicationCursor::RowVersion(4021)), None, Some("Timestamp gt 4021L") ; "row version suffixed")]
#[test_case(Replication::RowVersion, None, Some(at(1)), Some("Timestamp gt 1") ; "row version ignores start date")]
#[test_case(Replication::Modified, None, Some(at(1)), Some("Modified gt datetime'2024-02-01T06:30:00'") ; "modified from start date")]
#[test_case(Replication::Modified, Some(ReplicationCursor::Modified(at(9))), Some(at(1)), Some("Modified gt datetime'2024-02-09T06:30:00'") ; "modified cursor wins")]
#[test_case(Replication::Modified, None, None, None ; "modified without bound")]
#[test_case(Replication::None, Some(ReplicationCursor::RowVersion(9)), Some(at(1)), None ; "full refetch")]
fn test_build_filter(
    replication: Replication,
    cursor: Option<ReplicationCursor>,
    start_date: Option<NaiveDateTime>,
    expected: Option<&str>,
) {
    assert_eq!(
        build_filter(replication, cursor, start_date).as_deref(),
        expected
    );
}

#[test]
fn test_record_cursor() {
    let mut record = crate::normalize::NormalizedRecord::new();
    record.insert("Timestamp", FieldValue::Integer(77));
    record.insert("Modified", FieldValue::Timestamp(at(3)));

    assert_eq!(
        record_cursor(Replication::RowVersion, &record),
        Some(ReplicationCursor::RowVersion(77))
    );
    assert_eq!(
        record_cursor(Replication::Modified, &record),
        Some(ReplicationCursor::Modified(at(3)))
    );
    assert_eq!(record_cursor(Replication::None, &record), None);
}

#[tokio::test]
async fn test_query_params_order() {
    let server = MockServer::start().await;
    let fetcher = fetcher(&server).await;
    let stream = find_stream("deleted").unwrap();

    let params = fetcher.query_params(stream, Some(ReplicationCursor::RowVersion(9)), Some("AAAAA"));
    assert_eq!(
        params,
        vec![
            ("$select".to_string(), stream.select()),
            ("$filter".to_string(), "Timestamp gt 9L".to_string()),
            ("$skiptoken".to_string(), "AAAAA".to_string()),
        ]
    );

    let regular = find_stream("sales_entries").unwrap();
    let params = fetcher.query_params(regular, None, None);
    assert_eq!(params.len(), 1);
}

// ============================================================================
// Fetcher Tests
// ============================================================================

#[tokio::test]
async fn test_fetch_partition_follows_next_links() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(DELETED_PATH))
        .and(query_param("$filter", "Timestamp gt 1"))
        .and(query_param_is_missing("$skiptoken"))
        .respond_with(atom(feed(&[entry(5), entry(30), entry(12)], Some("P2"))))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(DELETED_PATH))
        .and(query_param("$filter", "Timestamp gt 1"))
        .and(query_param("$skiptoken", "P2"))
        .respond_with(atom(feed(&[entry(18), entry(2)], None)))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = fetcher(&server).await;
    let output = fetcher
        .fetch_partition(find_stream("deleted").unwrap(), "17", None)
        .await
        .unwrap();

    assert_eq!(output.division, "17");
    assert_eq!(output.pages, 2);
    assert_eq!(output.skipped, 0);
    assert_eq!(output.cursor, Some(ReplicationCursor::RowVersion(30)));

    let order: Vec<_> = output
        .records
        .iter()
        .map(|r| r.get("Timestamp").and_then(FieldValue::as_i64).unwrap())
        .collect();
    assert_eq!(order, vec![5, 30, 12, 18, 2]);

    let first = output.records[0].to_json();
    assert_eq!(first["ID"], json!("id-5"));
    assert_eq!(first["EntityType"], json!(20));
    assert_eq!(first["DeletedBy"], json!(null));
}

#[tokio::test]
async fn test_fetch_partition_keeps_cursor_without_records() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DELETED_PATH))
        .and(query_param("$filter", "Timestamp gt 500L"))
        .respond_with(atom(feed(&[], None)))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = fetcher(&server).await;
    let output = fetcher
        .fetch_partition(
            find_stream("deleted").unwrap(),
            "17",
            Some(ReplicationCursor::RowVersion(500)),
        )
        .await
        .unwrap();

    assert!(output.records.is_empty());
    assert_eq!(output.cursor, Some(ReplicationCursor::RowVersion(500)));
}

#[tokio::test]
async fn test_fetch_partition_cursor_never_moves_back() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DELETED_PATH))
        .respond_with(atom(feed(&[entry(40)], None)))
        .mount(&server)
        .await;

    let fetcher = fetcher(&server).await;
    let output = fetcher
        .fetch_partition(
            find_stream("deleted").unwrap(),
            "17",
            Some(ReplicationCursor::RowVersion(90)),
        )
        .await
        .unwrap();

    assert_eq!(output.records.len(), 1);
    assert_eq!(output.cursor, Some(ReplicationCursor::RowVersion(90)));
}

#[tokio::test]
async fn test_fetch_partition_modified_window() {
    let server = MockServer::start().await;
    let entry = r#"<entry><content type="application/xml"><m:properties>
<d:EntryID m:type="Edm.Guid">e-1</d:EntryID>
<d:Modified m:type="Edm.DateTime">2024-02-10T08:00:00</d:Modified>
</m:properties></content></entry>"#;
    Mock::given(method("GET"))
        .and(path("/api/v1/17/salesentry/SalesEntries"))
        .and(query_param("$filter", "Modified gt datetime'2024-02-01T06:30:00'"))
        .respond_with(atom(feed(&[entry.to_string()], None)))
        .expect(1)
        .mount(&server)
        .await;

    let stream = StreamDefinition {
        replication: Replication::Modified,
        ..*find_stream("sales_entries").unwrap()
    };
    let fetcher = fetcher(&server).await.with_start_date(Some(at(1)));
    let output = fetcher.fetch_partition(&stream, "17", None).await.unwrap();

    let expected = NaiveDate::from_ymd_opt(2024, 2, 10)
        .unwrap()
        .and_hms_opt(8, 0, 0)
        .unwrap();
    assert_eq!(output.cursor, Some(ReplicationCursor::Modified(expected)));
}

#[tokio::test]
async fn test_fetch_partition_regular_stream_has_no_cursor() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/17/salesentry/SalesEntries"))
        .and(query_param_is_missing("$filter"))
        .respond_with(atom(feed(&[], None)))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = fetcher(&server).await.with_start_date(Some(at(1)));
    let output = fetcher
        .fetch_partition(find_stream("sales_entries").unwrap(), "17", None)
        .await
        .unwrap();
    assert_eq!(output.cursor, None);
    assert_eq!(output.pages, 1);
}

#[tokio::test]
async fn test_malformed_record_fails_by_default() {
    let server = MockServer::start().await;
    let bad = r#"<entry><content><m:properties><d:Timestamp m:type="Edm.Int64">x1</d:Timestamp></m:properties></content></entry>"#;
    Mock::given(method("GET"))
        .and(path(DELETED_PATH))
        .respond_with(atom(feed(&[entry(1), bad.to_string()], None)))
        .mount(&server)
        .await;

    let fetcher = fetcher(&server).await;
    let err = fetcher
        .fetch_partition(find_stream("deleted").unwrap(), "17", None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MalformedField { ref field, .. } if field == "Timestamp"));
}

#[tokio::test]
async fn test_malformed_record_skipped_when_configured() {
    let server = MockServer::start().await;
    let bad = r#"<entry><content><m:properties><d:Timestamp m:type="Edm.Int64">x1</d:Timestamp></m:properties></content></entry>"#;
    Mock::given(method("GET"))
        .and(path(DELETED_PATH))
        .respond_with(atom(feed(&[entry(1), bad.to_string(), entry(3)], None)))
        .mount(&server)
        .await;

    let fetcher = fetcher(&server)
        .await
        .with_field_errors(ErrorStrategy::Skip);
    let output = fetcher
        .fetch_partition(find_stream("deleted").unwrap(), "17", None)
        .await
        .unwrap();
    assert_eq!(output.records.len(), 2);
    assert_eq!(output.skipped, 1);
    assert_eq!(output.cursor, Some(ReplicationCursor::RowVersion(3)));
}

#[tokio::test]
async fn test_unparsable_feed_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DELETED_PATH))
        .respond_with(atom("<feed><entry>".to_string()))
        .mount(&server)
        .await;

    let fetcher = fetcher(&server).await;
    let err = fetcher
        .fetch_partition(find_stream("deleted").unwrap(), "17", None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnparsableFeed { .. }));
}

#[tokio::test]
async fn test_shutdown_between_pages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DELETED_PATH))
        .and(query_param_is_missing("$skiptoken"))
        .respond_with(atom(feed(&[entry(1)], Some("P2"))))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(DELETED_PATH))
        .and(query_param("$skiptoken", "P2"))
        .respond_with(atom(feed(&[entry(2)], None)))
        .expect(0)
        .mount(&server)
        .await;

    let shutdown = Arc::new(AtomicBool::new(false));
    let fetcher = fetcher(&server).await.with_shutdown(Arc::clone(&shutdown));
    shutdown.store(true, Ordering::SeqCst);

    let err = fetcher
        .fetch_partition(find_stream("deleted").unwrap(), "17", None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Interrupted { ref division, .. } if division == "17"));
}

// ============================================================================
// Engine Tests
// ============================================================================

#[tokio::test]
async fn test_sync_engine_divisions_in_order() {
    let server = MockServer::start().await;
    for (division, timestamps) in [("1", vec![3, 9]), ("2", vec![4])] {
        let entries: Vec<String> = timestamps.into_iter().map(entry).collect();
        Mock::given(method("GET"))
            .and(path(format!("/api/v1/{division}/sync/Deleted")))
            .respond_with(atom(feed(&entries, None)))
            .expect(1)
            .mount(&server)
            .await;
    }

    let state = StateManager::in_memory();
    let mut engine = SyncEngine::new(fetcher(&server).await, state.clone()).with_config(
        SyncConfig::new()
            .with_divisions(["1", "2"])
            .with_partition_concurrency(2),
    );

    let (messages, result) = sync_collect(&mut engine, find_stream("deleted").unwrap()).await;
    result.unwrap();

    let kinds: Vec<&str> = messages
        .iter()
        .filter(|m| !m.is_log())
        .map(|m| match m {
            Message::Schema { .. } => "schema",
            Message::Record { .. } => "record",
            Message::State { .. } => "state",
            Message::Log { .. } => "log",
        })
        .collect();
    assert_eq!(
        kinds,
        vec!["schema", "record", "record", "state", "record", "state"]
    );

    assert_eq!(
        state.get_partition_cursor("deleted", "1").await,
        Some(ReplicationCursor::RowVersion(9))
    );
    assert_eq!(
        state.get_partition_cursor("deleted", "2").await,
        Some(ReplicationCursor::RowVersion(4))
    );

    let last_state = messages.iter().rev().find(|m| m.is_state()).unwrap();
    assert_eq!(
        last_state.to_singer().unwrap()["value"]["streams"]["deleted"]["partitions"]["2"],
        json!({"cursor": {"row_version": 4}})
    );

    let stats = engine.stats();
    assert_eq!(stats.records_synced, 3);
    assert_eq!(stats.pages_fetched, 2);
    assert_eq!(stats.partitions_synced, 2);
    assert_eq!(stats.streams_synced, 1);
}

#[tokio::test]
async fn test_sync_engine_resumes_from_state() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DELETED_PATH))
        .and(query_param("$filter", "Timestamp gt 250L"))
        .respond_with(atom(feed(&[entry(300)], None)))
        .expect(1)
        .mount(&server)
        .await;

    let state = StateManager::from_json(
        r#"{"streams":{"deleted":{"partitions":{"17":{"cursor":{"row_version":250}}}}}}"#,
    )
    .unwrap();
    let mut engine = SyncEngine::new(fetcher(&server).await, state)
        .with_config(SyncConfig::new().with_divisions(["17"]));

    sync_collect(&mut engine, find_stream("deleted").unwrap())
        .await
        .1
        .unwrap();
    assert_eq!(
        engine.state().get_partition_cursor("deleted", "17").await,
        Some(ReplicationCursor::RowVersion(300))
    );
}

#[tokio::test]
async fn test_sync_engine_failure_keeps_state() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DELETED_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let state = StateManager::in_memory();
    let mut engine = SyncEngine::new(fetcher(&server).await, state.clone())
        .with_config(SyncConfig::new().with_divisions(["17"]));

    let err = sync_collect(&mut engine, find_stream("deleted").unwrap())
        .await
        .1
        .unwrap_err();
    assert!(matches!(err, Error::UpstreamRequest { status: 500, .. }));
    assert_eq!(engine.stats().errors, 1);
    assert!(state.get_partition_cursor("deleted", "17").await.is_none());
}

#[tokio::test]
async fn test_failed_division_keeps_earlier_output_and_cursor() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/1/sync/Deleted"))
        .respond_with(atom(feed(&[entry(3), entry(9)], None)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/2/sync/Deleted"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let state_path = dir.path().join("state.json");
    let mut engine = SyncEngine::new(fetcher(&server).await, StateManager::new(&state_path))
        .with_config(SyncConfig::new().with_divisions(["1", "2"]));

    let mut records = Vec::new();
    let err = engine
        .sync_streams(&[find_stream("deleted").unwrap()], |message| {
            if let Message::Record { record, .. } = message {
                records.push(record.get("Timestamp").and_then(FieldValue::as_i64));
            }
            Ok(())
        })
        .await
        .unwrap_err();

    assert!(matches!(err, Error::UpstreamRequest { status: 500, .. }));
    assert_eq!(records, vec![Some(3), Some(9)]);

    let saved = StateManager::from_file(&state_path).unwrap();
    assert_eq!(
        saved.get_partition_cursor("deleted", "1").await,
        Some(ReplicationCursor::RowVersion(9))
    );
    assert!(saved.get_partition_cursor("deleted", "2").await.is_none());
}

#[tokio::test]
async fn test_emit_failure_does_not_advance_cursor() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DELETED_PATH))
        .respond_with(atom(feed(&[entry(5)], None)))
        .mount(&server)
        .await;

    let state = StateManager::in_memory();
    let mut engine = SyncEngine::new(fetcher(&server).await, state.clone())
        .with_config(SyncConfig::new().with_divisions(["17"]));

    let err = engine
        .sync_stream(find_stream("deleted").unwrap(), |message| {
            if message.is_record() {
                return Err(Error::Other("stdout closed".to_string()));
            }
            Ok(())
        })
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Other(_)));
    assert!(state.get_partition_cursor("deleted", "17").await.is_none());
}

#[tokio::test]
async fn test_sync_engine_skips_divisions_after_shutdown() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(atom(feed(&[], None)))
        .expect(0)
        .mount(&server)
        .await;

    let fetcher = fetcher(&server).await;
    fetcher.shutdown_flag().store(true, Ordering::SeqCst);
    let mut engine = SyncEngine::new(fetcher, StateManager::in_memory())
        .with_config(SyncConfig::new().with_divisions(["17"]));

    let err = sync_collect(&mut engine, find_stream("deleted").unwrap())
        .await
        .1
        .unwrap_err();
    assert!(matches!(err, Error::Interrupted { .. }));
}

#[tokio::test]
async fn test_sync_streams_emits_singer_lines() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DELETED_PATH))
        .respond_with(atom(feed(&[entry(7)], None)))
        .mount(&server)
        .await;

    let mut engine = SyncEngine::new(fetcher(&server).await, StateManager::in_memory())
        .with_config(SyncConfig::new().with_divisions(["17"]));

    let mut lines = Vec::new();
    engine
        .sync_streams(&[find_stream("deleted").unwrap()], |message| {
            if let Some(line) = message.to_singer_line()? {
                lines.push(line);
            }
            Ok(())
        })
        .await
        .unwrap();

    assert_eq!(lines.len(), 3);
    let record: serde_json::Value = serde_json::from_str(&lines[1]).unwrap();
    assert_eq!(record["type"], json!("RECORD"));
    assert_eq!(record["stream"], json!("deleted"));
    assert_eq!(record["record"]["Timestamp"], json!(7));
}

// ============================================================================
// Message Tests
// ============================================================================

#[test]
fn test_schema_message_for_sync_stream() {
    let message = Message::schema(find_stream("deleted").unwrap());
    let singer = message.to_singer().unwrap();
    assert_eq!(singer["type"], json!("SCHEMA"));
    assert_eq!(singer["key_properties"], json!(["ID"]));
    assert_eq!(singer["bookmark_properties"], json!(["Timestamp"]));
    assert!(singer["schema"]["properties"]["Timestamp"].is_object());
}

#[test]
fn test_schema_message_for_regular_stream() {
    let singer = Message::schema(find_stream("sales_entries").unwrap())
        .to_singer()
        .unwrap();
    assert!(singer.get("bookmark_properties").is_none());
}

#[test]
fn test_log_message_has_no_singer_line() {
    let message = Message::warn("careful");
    assert!(message.is_log());
    assert!(message.to_singer_line().unwrap().is_none());
    assert_eq!(
        message,
        Message::Log {
            level: LogLevel::Warn,
            message: "careful".to_string()
        }
    );
}

#[test]
fn test_sync_config_builder() {
    let config = SyncConfig::new()
        .with_divisions(vec!["1".to_string(), "2".to_string()])
        .with_partition_concurrency(0);
    assert_eq!(config.divisions, vec!["1", "2"]);
    assert_eq!(config.partition_concurrency, 1);
}

#[test]
fn test_sync_stats_add_partition() {
    let mut stats = SyncStats::new();
    stats.add_partition(&PartitionOutput {
        division: "1".to_string(),
        records: vec![crate::normalize::NormalizedRecord::new()],
        pages: 3,
        skipped: 2,
        cursor: None,
    });
    stats.add_error();
    assert_eq!(stats.records_synced, 1);
    assert_eq!(stats.records_skipped, 2);
    assert_eq!(stats.pages_fetched, 3);
    assert_eq!(stats.partitions_synced, 1);
    assert_eq!(stats.errors, 1);
}
