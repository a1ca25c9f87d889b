use std::collections::BTreeSet;

use chrono::{Duration, TimeZone, Utc};
use logsift::filter::{FilterCriterion, SelectionOverride};
use logsift::query::{Projection, compile_filters_with_selection};
use logsift::sql::Dialect;
use logsift::store::{NewDatasetEntry, NewLoggedCall, NewModelResponse, Store};
use logsift::subject::{DatasetEntries, LoggedCalls};
use serde_json::json;

fn setup() -> Store {
    let mut store = Store::open_in_memory().unwrap();
    let start = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    // id1..id6; id3 failed, id6 never got a response
    for i in 1..=6 {
        let response = match i {
            6 => None,
            3 => Some(500),
            _ => Some(200),
        };
        let call = NewLoggedCall {
            id: format!("id{i}"),
            model: Some("gpt-4".to_string()),
            requested_at: start + Duration::minutes(i),
            response: response.map(|status| NewModelResponse {
                req_payload: json!({"n": i}),
                resp_payload: Some(json!({"ok": status == 200})),
                status_code: Some(status),
                error_message: None,
            }),
            tags: [("env".to_string(), Some(if i % 2 == 0 { "prod" } else { "dev" }.to_string()))]
                .into_iter()
                .collect(),
        };
        store.record_logged_call("p1", &call).unwrap();
    }
    store
}

fn ids(
    store: &Store,
    filters: &[FilterCriterion],
    selection: &SelectionOverride,
) -> BTreeSet<String> {
    let query = compile_filters_with_selection::<LoggedCalls>(filters, "p1", selection)
        .expect("compile ok");
    store
        .fetch_ids(&query.render(Dialect::Sqlite, Projection::Ids))
        .expect("query ok")
        .into_iter()
        .collect()
}

fn set(ids: &[&str]) -> BTreeSet<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

#[test]
fn empty_inclusion_selects_nothing() {
    let store = setup();
    let selection = SelectionOverride::only(Vec::<String>::new());
    assert!(ids(&store, &[], &selection).is_empty());
    let compiled = compile_filters_with_selection::<LoggedCalls>(&[], "p1", &selection)
        .unwrap()
        .render(Dialect::Postgres, Projection::Ids);
    assert!(compiled.sql.contains("1 = 0"));
}

#[test]
fn exclusion_keeps_only_successful_calls() {
    let store = setup();
    let selection = SelectionOverride::all_except(["id5"]);
    assert_eq!(ids(&store, &[], &selection), set(&["id1", "id2", "id4"]));
}

#[test]
fn empty_exclusion_still_requires_success() {
    let store = setup();
    let selection = SelectionOverride::all_except(Vec::<String>::new());
    assert_eq!(ids(&store, &[], &selection), set(&["id1", "id2", "id4", "id5"]));
}

#[test]
fn inclusion_ignores_failed_and_pending_calls() {
    let store = setup();
    let selection = SelectionOverride::only(["id2", "id3", "id6"]);
    assert_eq!(ids(&store, &[], &selection), set(&["id2"]));
}

#[test]
fn governing_set_follows_default_to_selected() {
    let store = setup();
    let selection = SelectionOverride {
        default_to_selected: false,
        selected_ids: set(&["id1"]),
        // ignored while inclusion governs
        deselected_ids: set(&["id1"]),
    };
    assert_eq!(ids(&store, &[], &selection), set(&["id1"]));
}

#[test]
fn selection_narrows_the_filtered_set() {
    let store = setup();
    let filters = [FilterCriterion::equals("env", "prod")];
    let selection = SelectionOverride::all_except(["id4"]);
    assert_eq!(ids(&store, &filters, &selection), set(&["id2"]));
    let selection = SelectionOverride::only(["id1"]);
    assert!(ids(&store, &filters, &selection).is_empty());
}

#[test]
fn dataset_selection_has_no_status_constraint() {
    let store = Store::open_in_memory().unwrap();
    for id in ["e1", "e2"] {
        store
            .add_dataset_entry(&NewDatasetEntry {
                id: id.to_string(),
                dataset_id: "d1".to_string(),
                messages: json!([{"role": "user", "content": id}]),
                output: None,
                outdated: false,
                created_at: Utc::now(),
            })
            .unwrap();
    }
    let selection = SelectionOverride::only(["e2"]);
    let query = compile_filters_with_selection::<DatasetEntries>(&[], "d1", &selection).unwrap();
    let compiled = query.render(Dialect::Sqlite, Projection::Ids);
    assert!(!compiled.sql.contains("statusCode"));
    assert_eq!(store.fetch_ids(&compiled).unwrap(), vec!["e2".to_string()]);
}
