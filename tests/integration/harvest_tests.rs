//! Integration tests for the harvester
//!
//! These tests use wiremock to serve continuation pages and run full
//! sessions against a SQLite database on disk.

use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use thread_harvest::config::{ClientConfig, HarvestConfig};
use thread_harvest::harvest::HtmlFallback;
use thread_harvest::model::Continuation;
use thread_harvest::storage::{open_storage, DurableSink, SessionStatus};
use thread_harvest::transport::{build_http_client, ClientContext, HttpClient, RetryPolicy};
use thread_harvest::{ContinuationToken, HarvestReport, Harvester, SeedRequest};
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const NEXT_PATH: &str = "/youtubei/v1/next";

fn client_config() -> ClientConfig {
    ClientConfig {
        client_name: "WEB".to_string(),
        client_version: "2.20240101".to_string(),
        hl: "en".to_string(),
        gl: "US".to_string(),
    }
}

fn marker(token: &str) -> Value {
    json!({"continuationItemRenderer": {"continuationEndpoint": {
        "clickTrackingParams": format!("track-{}", token),
        "continuationCommand": {"token": token}
    }}})
}

fn thread(id: &str, reply_token: Option<&str>) -> Value {
    let mut thread = json!({
        "comment": {"commentRenderer": {
            "commentId": id,
            "authorText": {"simpleText": format!("@author-{}", id)},
            "contentText": {"runs": [{"text": "comment "}, {"text": id}]},
            "voteCount": {"simpleText": "4"}
        }}
    });
    if let Some(token) = reply_token {
        thread["replies"] = json!({"commentRepliesRenderer": {"contents": [marker(token)]}});
    }
    json!({ "commentThreadRenderer": thread })
}

fn reply(id: &str) -> Value {
    json!({"commentRenderer": {
        "commentId": id,
        "authorText": {"simpleText": "@replier"},
        "contentText": {"simpleText": format!("reply {}", id)}
    }})
}

fn page(action: &str, items: Vec<Value>) -> Value {
    let mut block = Map::new();
    block.insert(action.to_string(), json!({ "continuationItems": items }));
    json!({ "onResponseReceivedEndpoints": [Value::Object(block)] })
}

async fn mount_page(server: &MockServer, token: &str, body: Value, expected: u64) {
    Mock::given(method("POST"))
        .and(path(NEXT_PATH))
        .and(body_partial_json(json!({ "continuation": token })))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(expected)
        .mount(server)
        .await;
}

/// Harvester against the mock server with a fast retry policy
fn harvester(server: &MockServer, dir: &TempDir) -> Harvester {
    let mut config = HarvestConfig::with_endpoint(format!("{}{}", server.uri(), NEXT_PATH));
    config.api_key = Some("test-key".to_string());

    let store = open_storage(&dir.path().join("harvest.db")).expect("open storage");
    let client = HttpClient::new(build_http_client(&client_config()).expect("http client"));

    Harvester::new(
        config,
        Arc::new(client),
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(5),
        },
        DurableSink::new(store),
    )
    .expect("harvester")
}

fn seed(session_id: &str, token: &str) -> SeedRequest {
    SeedRequest::new(session_id, Continuation::new(ContinuationToken::new(token)))
        .with_context(ClientContext::from_config(&client_config()))
}

fn ids(report: &HarvestReport) -> Vec<&str> {
    let mut ids: Vec<&str> = report.records.iter().map(|r| r.id.as_str()).collect();
    ids.sort_unstable();
    ids
}

#[tokio::test]
async fn test_full_session_with_replies() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_page(
        &server,
        "T0",
        page(
            "reloadContinuationItemsCommand",
            vec![thread("c1", Some("R1")), marker("T1")],
        ),
        1,
    )
    .await;
    mount_page(
        &server,
        "T1",
        page("appendContinuationItemsAction", vec![thread("c2", None)]),
        1,
    )
    .await;
    mount_page(
        &server,
        "R1",
        page("appendContinuationItemsAction", vec![reply("r1")]),
        1,
    )
    .await;

    let harvester = harvester(&server, &dir);
    let report = harvester.harvest(seed("s1", "T0")).await.unwrap();

    assert_eq!(ids(&report), vec!["c1", "c2", "r1"]);
    assert_eq!(report.main_fetches, 2);
    assert_eq!(report.reply_fetches, 1);
    assert_eq!(report.main_count, 2);
    assert_eq!(report.reply_count, 1);

    let c1 = report.records.iter().find(|r| r.id == "c1").unwrap();
    assert_eq!(c1.text, "comment c1");
    assert_eq!(c1.likes, "4");

    let counts = harvester.sink().counts().await.unwrap();
    assert_eq!(counts.total(), 3);
}

#[tokio::test]
async fn test_two_roots_then_empty_page() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_page(
        &server,
        "T0",
        page(
            "reloadContinuationItemsCommand",
            vec![thread("c1", Some("R1")), thread("c2", None), marker("T1")],
        ),
        1,
    )
    .await;
    mount_page(
        &server,
        "T1",
        page("appendContinuationItemsAction", Vec::new()),
        1,
    )
    .await;
    mount_page(
        &server,
        "R1",
        page("appendContinuationItemsAction", vec![reply("r1")]),
        1,
    )
    .await;

    let harvester = harvester(&server, &dir);
    let report = harvester.harvest(seed("s1", "T0")).await.unwrap();

    assert_eq!(ids(&report), vec!["c1", "c2", "r1"]);
    assert_eq!(report.main_fetches, 2);
    assert_eq!(report.reply_fetches, 1);
    assert!(!report.used_fallback);

    let counts = harvester.sink().counts().await.unwrap();
    assert_eq!(counts.main, 2);
    assert_eq!(counts.replies, 1);
}

#[tokio::test]
async fn test_requests_carry_key_context_and_tracking() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("POST"))
        .and(path(NEXT_PATH))
        .and(query_param("key", "test-key"))
        .and(body_partial_json(json!({
            "context": {"client": {"clientName": "WEB", "hl": "en"}},
            "continuation": "T0"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            "reloadContinuationItemsCommand",
            vec![thread("c1", None), marker("T1")],
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(NEXT_PATH))
        .and(body_partial_json(json!({
            "continuation": "T1",
            "clickTracking": {"clickTrackingParams": "track-T1"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let report = harvester(&server, &dir)
        .harvest(seed("s1", "T0"))
        .await
        .unwrap();

    assert_eq!(ids(&report), vec!["c1"]);
    assert_eq!(report.main_fetches, 2);
}

#[tokio::test]
async fn test_transient_failure_is_retried() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("POST"))
        .and(path(NEXT_PATH))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    mount_page(
        &server,
        "T0",
        page("reloadContinuationItemsCommand", vec![thread("c1", None)]),
        1,
    )
    .await;

    let report = harvester(&server, &dir)
        .harvest(seed("s1", "T0"))
        .await
        .unwrap();

    assert_eq!(ids(&report), vec!["c1"]);
    assert!(!report.used_fallback);
}

#[tokio::test]
async fn test_entity_payload_resolves_view_model() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    let body = json!({
        "onResponseReceivedEndpoints": [{
            "reloadContinuationItemsCommand": {"continuationItems": [
                {"commentThreadRenderer": {
                    "commentViewModel": {"commentViewModel": {"commentKey": "KEY-1"}}
                }}
            ]}
        }],
        "frameworkUpdates": {"entityBatchUpdate": {"mutations": [
            {"entityKey": "KEY-1", "payload": {"commentEntityPayload": {
                "properties": {
                    "commentId": "Ugz-entity",
                    "content": {"content": "resolved from entity"},
                    "publishedTime": "1 hour ago"
                },
                "author": {"displayName": "@creator", "isCreator": true},
                "toolbar": {"likeCountNotliked": "12"}
            }}},
            {"entityKey": "TOOLBAR", "payload": {"engagementToolbarStateEntityPayload": {}}}
        ]}}
    });
    mount_page(&server, "T0", body, 1).await;

    let report = harvester(&server, &dir)
        .harvest(seed("s1", "T0"))
        .await
        .unwrap();

    assert_eq!(report.records.len(), 1);
    let record = &report.records[0];
    assert_eq!(record.id, "Ugz-entity");
    assert_eq!(record.author, "@creator");
    assert_eq!(record.text, "resolved from entity");
    assert_eq!(record.published, "1 hour ago");
    assert_eq!(record.likes, "12");
    assert!(record.is_owner);
}

#[tokio::test]
async fn test_duplicate_reply_tokens_fetched_once() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_page(
        &server,
        "T0",
        page(
            "reloadContinuationItemsCommand",
            vec![thread("c1", Some("R1")), marker("T1")],
        ),
        1,
    )
    .await;
    mount_page(
        &server,
        "T1",
        page("appendContinuationItemsAction", vec![thread("c1", Some("R1"))]),
        1,
    )
    .await;
    mount_page(
        &server,
        "R1",
        page("appendContinuationItemsAction", vec![reply("r1")]),
        1,
    )
    .await;

    let report = harvester(&server, &dir)
        .harvest(seed("s1", "T0"))
        .await
        .unwrap();

    assert_eq!(report.reply_fetches, 1);
    assert_eq!(ids(&report), vec!["c1", "r1"]);
}

#[tokio::test]
async fn test_empty_harvest_uses_fallback() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("POST"))
        .and(path(NEXT_PATH))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let html = r#"<html><body>
        <ytd-comment-thread-renderer>
          <ytd-comment-renderer id="comment">
            <a id="author-text" href="/@dom">@dom</a>
            <span id="content-text">scraped</span>
          </ytd-comment-renderer>
        </ytd-comment-thread-renderer>
    </body></html>"#;

    let harvester = harvester(&server, &dir).with_fallback(HtmlFallback::new(html));
    let report = harvester.harvest(seed("s1", "T0")).await.unwrap();

    assert!(report.used_fallback);
    assert_eq!(report.records.len(), 1);
    assert_eq!(report.records[0].text, "scraped");
    assert!(report.records[0].id.starts_with("synthetic-"));

    let stored = harvester.sink().read_all().await.unwrap();
    assert_eq!(stored.len(), 1);

    let session = harvester
        .sink()
        .with_store(|store| store.get_session("s1"))
        .await
        .unwrap();
    assert_eq!(session.status, SessionStatus::Degraded);
}

#[tokio::test]
async fn test_partial_harvest_skips_fallback() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_page(
        &server,
        "T0",
        page(
            "reloadContinuationItemsCommand",
            vec![thread("c1", None), marker("T1")],
        ),
        1,
    )
    .await;
    Mock::given(method("POST"))
        .and(path(NEXT_PATH))
        .and(body_partial_json(json!({ "continuation": "T1" })))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let html = r#"<ytd-comment-thread-renderer><div id="comment">
        <span id="content-text">should not appear</span></div></ytd-comment-thread-renderer>"#;
    let report = harvester(&server, &dir)
        .with_fallback(HtmlFallback::new(html))
        .harvest(seed("s1", "T0"))
        .await
        .unwrap();

    assert!(!report.used_fallback);
    assert_eq!(ids(&report), vec!["c1"]);
}

#[tokio::test]
async fn test_malformed_body_ends_pagination() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_page(
        &server,
        "T0",
        page(
            "reloadContinuationItemsCommand",
            vec![thread("c1", None), marker("T1")],
        ),
        1,
    )
    .await;
    mount_page(
        &server,
        "T1",
        json!({"onResponseReceivedEndpoints": {"not": "an array"}}),
        1,
    )
    .await;

    let report = harvester(&server, &dir)
        .harvest(seed("s1", "T0"))
        .await
        .unwrap();

    assert_eq!(report.main_fetches, 2);
    assert_eq!(ids(&report), vec!["c1"]);
}
