use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use logsift::query::UnknownFieldPolicy;
use logsift::server::{AppState, router};
use logsift::settings::Settings;
use logsift::sql::Dialect;
use logsift::store::{NewDatasetEntry, Store};
use serde_json::{Value, json};
use tower::ServiceExt;

fn setup(settings: Settings) -> Router {
    let store = Store::open_in_memory().expect("store");
    store
        .add_dataset_entry(&NewDatasetEntry {
            id: "e1".to_string(),
            dataset_id: "d1".to_string(),
            messages: json!([{"role": "user", "content": "hello"}]),
            output: None,
            outdated: false,
            created_at: Utc::now(),
        })
        .expect("entry");
    router(AppState::new(store, settings))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    let request = match body {
        Some(body) => request.body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .expect("request");
    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn report(app: &Router, id: &str, env: &str, status_code: i64) {
    let body = json!({
        "id": id,
        "model": "gpt-4",
        "response": {
            "reqPayload": {"prompt": "ping"},
            "respPayload": {"text": "pong"},
            "statusCode": status_code
        },
        "tags": {"env": env, "retries": 3}
    });
    let (status, _) = send(app, "POST", "/v1/projects/p1/report", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn reports_and_queries_logged_calls() {
    let app = setup(Settings::default());
    report(&app, "a1", "prod", 200).await;
    report(&app, "a2", "dev", 200).await;

    let body = json!({"filters": [{"field": "env", "comparator": "=", "value": "prod"}]});
    let (status, value) = send(&app, "POST", "/v1/projects/p1/logs/query", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["status"], "ok");
    assert_eq!(value["ids"], json!(["a1"]));

    // non-string tag values are stored as their JSON text
    let body = json!({"filters": [{"field": "retries", "comparator": "=", "value": "3"}]});
    let (_, value) = send(&app, "POST", "/v1/projects/p1/logs/count", Some(body)).await;
    assert_eq!(value["count"], 2);
}

#[tokio::test]
async fn unknown_comparator_is_a_bad_request() {
    let app = setup(Settings::default());
    let body = json!({
        "filters": [{"field": "model", "comparator": "STARTS_WITH", "value": "gpt"}]
    });
    let (status, value) = send(&app, "POST", "/v1/projects/p1/logs/query", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(value["status"], "error");
    assert!(value["error"].as_str().unwrap_or_default().contains("STARTS_WITH"));
}

#[tokio::test]
async fn duplicate_report_is_a_conflict() {
    let app = setup(Settings::default());
    report(&app, "a1", "prod", 200).await;
    let body = json!({"id": "a1"});
    let (status, value) = send(&app, "POST", "/v1/projects/p1/report", Some(body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(value["status"], "error");
    assert!(value["error"].as_str().unwrap_or_default().contains("a1"));
}

#[tokio::test]
async fn selection_override_over_http() {
    let app = setup(Settings::default());
    report(&app, "a1", "prod", 200).await;
    report(&app, "a2", "prod", 500).await;
    report(&app, "a3", "prod", 200).await;

    let body = json!({"selection": {"defaultToSelected": true, "deselectedIds": ["a3"]}});
    let (_, value) = send(&app, "POST", "/v1/projects/p1/logs/query", Some(body)).await;
    assert_eq!(value["ids"], json!(["a1"]));

    let body = json!({"selection": {"defaultToSelected": false, "selectedIds": []}});
    let (_, value) = send(&app, "POST", "/v1/projects/p1/logs/count", Some(body)).await;
    assert_eq!(value["count"], 0);
}

#[tokio::test]
async fn updates_tags_and_lists_names() {
    let app = setup(Settings::default());
    report(&app, "a1", "prod", 200).await;
    report(&app, "a2", "dev", 200).await;

    let body = json!({
        "filters": [{"field": "env", "comparator": "!=", "value": "dev"}],
        "tags": {"reviewed": "yes", "retries": null}
    });
    let uri = "/v1/projects/p1/logs/update-tags";
    let (status, value) = send(&app, "POST", uri, Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["matchedLogs"], 1);

    let (_, value) = send(&app, "GET", "/v1/projects/p1/tags", None).await;
    assert_eq!(value["tags"], json!(["env", "retries", "reviewed"]));

    let body = json!({
        "filters": [{"field": "retries", "comparator": "NOT_CONTAINS", "value": "3"}]
    });
    let (_, value) = send(&app, "POST", "/v1/projects/p1/logs/query", Some(body)).await;
    assert_eq!(value["ids"], json!(["a1"]));
}

#[tokio::test]
async fn explain_renders_in_the_configured_dialect() {
    let mut settings = Settings::default();
    settings.compiler.dialect = Dialect::Postgres;
    let app = setup(settings);
    let body = json!({
        "filters": [{"field": "env", "comparator": "CONTAINS", "value": "zq"}],
        "limit": 5
    });
    let (status, value) = send(&app, "POST", "/v1/projects/p1/logs/explain", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["dialect"], "postgres");
    assert_eq!(value["tagJoins"], 1);
    let sql = value["sql"].as_str().unwrap_or_default();
    assert!(sql.contains("lct0.\"value\" LIKE $3"));
    assert!(!sql.contains("zq"));
    assert_eq!(value["params"], json!(["env", "p1", "%zq%", 5, 0]));
}

#[tokio::test]
async fn strict_policy_rejects_unseen_tags() {
    let mut settings = Settings::default();
    settings.compiler.unknown_fields = UnknownFieldPolicy::Reject;
    let app = setup(settings);
    report(&app, "a1", "prod", 200).await;

    let body = json!({"filters": [{"field": "evn", "comparator": "=", "value": "prod"}]});
    let (status, value) = send(&app, "POST", "/v1/projects/p1/logs/query", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(value["error"].as_str().unwrap_or_default().contains("evn"));

    let body = json!({"filters": [{"field": "env", "comparator": "=", "value": "prod"}]});
    let (status, value) = send(&app, "POST", "/v1/projects/p1/logs/query", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["ids"], json!(["a1"]));
}

#[tokio::test]
async fn queries_dataset_entries() {
    let app = setup(Settings::default());
    let body = json!({"filters": [{"field": "Input", "comparator": "CONTAINS", "value": "hello"}]});
    let (status, value) = send(&app, "POST", "/v1/datasets/d1/entries/query", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["ids"], json!(["e1"]));
}
