use chrono::Utc;
use logsift::filter::FilterCriterion;
use logsift::query::{Projection, compile_filters};
use logsift::sql::Dialect;
use logsift::store::{NewLoggedCall, NewModelResponse, Store};
use logsift::subject::LoggedCalls;
use serde_json::json;

#[test]
fn file_store_survives_reopen() {
    let path = std::env::temp_dir().join("logsift_persistence_test.db");
    let path = path.to_str().expect("utf-8 temp path").to_string();
    // Ensure clean start
    let _ = std::fs::remove_file(&path);
    {
        let mut store = Store::open(&path).expect("store");
        let call = NewLoggedCall {
            id: "keep".to_string(),
            model: Some("gpt-4".to_string()),
            requested_at: Utc::now(),
            response: Some(NewModelResponse {
                req_payload: json!({"prompt": "ping"}),
                resp_payload: Some(json!({"text": "pong"})),
                status_code: Some(200),
                error_message: None,
            }),
            tags: [("env".to_string(), Some("prod".to_string()))].into_iter().collect(),
        };
        store.record_logged_call("p1", &call).expect("recorded");
    }
    // Reopening runs the schema again on existing tables
    let store = Store::open(&path).expect("reopened");
    let filters = [
        FilterCriterion::equals("env", "prod"),
        FilterCriterion::contains("Response", "pong"),
    ];
    let query = compile_filters::<LoggedCalls>(&filters, "p1").unwrap();
    let ids = store
        .fetch_ids(&query.render(Dialect::Sqlite, Projection::Ids))
        .expect("query ok");
    assert_eq!(ids, vec!["keep"]);
    drop(store);
    // Clean up
    let _ = std::fs::remove_file(&path);
}
