use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::error::{LogsiftError, Result};
use crate::filter::{FilterCriterion, SelectionOverride};
use crate::query::{
    CompileOptions, FilteredQuery, Projection, UnknownFieldPolicy, compile_filters_with,
};
use crate::settings::Settings;
use crate::sql::{Dialect, SqlValue};
use crate::store::{NewLoggedCall, NewModelResponse, Store};
use crate::subject::{DatasetEntries, LoggedCalls, Subject};

/// Shared by all handlers; the store is used from blocking threads only.
#[derive(Clone)]
pub struct AppState {
    store: Arc<Mutex<Store>>,
    settings: Arc<Settings>,
}

impl AppState {
    pub fn new(store: Store, settings: Settings) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            settings: Arc::new(settings),
        }
    }
    fn page(&self, limit: Option<u64>, offset: Option<u64>) -> Projection {
        let max = self.settings.server.max_page_size;
        Projection::Page {
            limit: limit.unwrap_or(max).min(max),
            offset: offset.unwrap_or(0),
        }
    }
}

#[derive(Deserialize)]
pub struct FilterRequest {
    #[serde(default)]
    pub filters: Vec<FilterCriterion>,
    #[serde(default)]
    pub selection: Option<SelectionOverride>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: Option<u64>,
}

#[derive(Deserialize)]
pub struct UpdateTagsRequest {
    pub filters: Vec<FilterCriterion>,
    pub tags: BTreeMap<String, Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    pub id: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "Utc::now")]
    pub requested_at: DateTime<Utc>,
    #[serde(default)]
    pub response: Option<NewModelResponse>,
    #[serde(default)]
    pub tags: BTreeMap<String, Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdsResponse {
    pub status: String,
    pub elapsed_ms: f64,
    pub ids: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountResponse {
    pub status: String,
    pub count: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTagsResponse {
    pub status: String,
    pub matched_logs: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplainResponse {
    pub status: String,
    pub dialect: Dialect,
    pub sql: String,
    pub params: Vec<SqlValue>,
    pub tag_joins: usize,
}

#[derive(Serialize)]
pub struct TagsResponse {
    pub status: String,
    pub tags: Vec<String>,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub status: String,
    pub error: String,
}

/// Validation failures map to 400, conflicts to 409, everything else to 500.
pub struct ApiError(LogsiftError);

impl From<LogsiftError> for ApiError {
    fn from(e: LogsiftError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            e if e.is_validation() => StatusCode::BAD_REQUEST,
            LogsiftError::Conflict(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let msg = format!("{}", self.0);
        warn!(%msg, code = %status.as_u16(), "request error");
        let body = ErrorResponse {
            status: "error".into(),
            error: msg,
        };
        (status, Json(body)).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers(Any);
    Router::new()
        .route("/v1/projects/:project_id/logs/query", post(query_logs))
        .route("/v1/projects/:project_id/logs/count", post(count_logs))
        .route("/v1/projects/:project_id/logs/explain", post(explain_logs))
        .route("/v1/projects/:project_id/logs/update-tags", post(update_log_tags))
        .route("/v1/projects/:project_id/report", post(report))
        .route("/v1/projects/:project_id/tags", get(tag_names))
        .route("/v1/datasets/:dataset_id/entries/query", post(query_dataset_entries))
        .layer(cors)
        .with_state(state)
}

// We run store work in a blocking thread since rusqlite is synchronous.
async fn blocking<T, F>(state: &AppState, work: F) -> std::result::Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&mut Store, &Settings) -> Result<T> + Send + 'static,
{
    let store = Arc::clone(&state.store);
    let settings = Arc::clone(&state.settings);
    let outcome = tokio::task::spawn_blocking(move || {
        let mut store = store
            .lock()
            .map_err(|e| LogsiftError::Lock(e.to_string()))?;
        work(&mut *store, &settings)
    })
    .await
    .map_err(|e| {
        warn!(error = %e, "Join error");
        LogsiftError::Execution(e.to_string())
    })?;
    Ok(outcome?)
}

/// Compiles against the configured policy. The strict policy needs the
/// scope's tag names, which is the only store access before compilation.
fn compile<S: Subject>(
    store: &Store,
    settings: &Settings,
    scope_id: &str,
    filters: &[FilterCriterion],
    selection: Option<&SelectionOverride>,
) -> Result<FilteredQuery> {
    let mut options: CompileOptions = settings.compiler.options();
    if options.unknown_fields == UnknownFieldPolicy::Reject && S::TAGS.is_some() {
        options.known_tags = store.tag_names(scope_id)?;
    }
    compile_filters_with::<S>(filters, scope_id, selection, &options)
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

/// Tag values arrive as any JSON scalar; `null` means "no value".
fn tag_value(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text),
        other => Some(other.to_string()),
    }
}

async fn query_logs(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(req): Json<FilterRequest>,
) -> std::result::Result<Json<IdsResponse>, ApiError> {
    let started = Instant::now();
    let page = state.page(req.limit, req.offset);
    let ids = blocking(&state, move |store, settings| {
        let query = compile::<LoggedCalls>(
            store,
            settings,
            &project_id,
            &req.filters,
            req.selection.as_ref(),
        )?;
        store.fetch_ids(&query.render(Dialect::Sqlite, page))
    })
    .await?;
    let elapsed_ms = elapsed_ms(started);
    info!(ms = elapsed_ms, rows = ids.len(), "logs query complete");
    Ok(Json(IdsResponse {
        status: "ok".into(),
        elapsed_ms,
        ids,
    }))
}

async fn count_logs(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(req): Json<FilterRequest>,
) -> std::result::Result<Json<CountResponse>, ApiError> {
    let started = Instant::now();
    let count = blocking(&state, move |store, settings| {
        let query = compile::<LoggedCalls>(
            store,
            settings,
            &project_id,
            &req.filters,
            req.selection.as_ref(),
        )?;
        store.count(&query.render(Dialect::Sqlite, Projection::Count))
    })
    .await?;
    info!(ms = elapsed_ms(started), count, "logs count complete");
    Ok(Json(CountResponse {
        status: "ok".into(),
        count,
    }))
}

async fn explain_logs(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(req): Json<FilterRequest>,
) -> std::result::Result<Json<ExplainResponse>, ApiError> {
    let page = state.page(req.limit, req.offset);
    let compiled = blocking(&state, move |store, settings| {
        let query = compile::<LoggedCalls>(
            store,
            settings,
            &project_id,
            &req.filters,
            req.selection.as_ref(),
        )?;
        Ok(query.render(settings.compiler.dialect, page))
    })
    .await?;
    Ok(Json(ExplainResponse {
        status: "ok".into(),
        dialect: compiled.dialect,
        sql: compiled.sql,
        params: compiled.params,
        tag_joins: compiled.tag_joins,
    }))
}

async fn update_log_tags(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(req): Json<UpdateTagsRequest>,
) -> std::result::Result<Json<UpdateTagsResponse>, ApiError> {
    let started = Instant::now();
    let tags: BTreeMap<String, Option<String>> = req
        .tags
        .into_iter()
        .map(|(name, value)| (name, tag_value(value)))
        .collect();
    let matched_logs = blocking(&state, move |store, settings| {
        let query = compile::<LoggedCalls>(store, settings, &project_id, &req.filters, None)?;
        store.update_tags(&query.render(Dialect::Sqlite, Projection::Ids), &tags)
    })
    .await?;
    info!(ms = elapsed_ms(started), matched_logs, "tags updated");
    Ok(Json(UpdateTagsResponse {
        status: "ok".into(),
        matched_logs,
    }))
}

async fn report(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(req): Json<ReportRequest>,
) -> std::result::Result<Json<StatusResponse>, ApiError> {
    let call = NewLoggedCall {
        id: req.id,
        model: req.model,
        requested_at: req.requested_at,
        response: req.response,
        tags: req
            .tags
            .into_iter()
            .map(|(name, value)| (name, tag_value(value)))
            .collect(),
    };
    blocking(&state, move |store, _| store.record_logged_call(&project_id, &call)).await?;
    Ok(Json(StatusResponse {
        status: "ok".into(),
    }))
}

async fn tag_names(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> std::result::Result<Json<TagsResponse>, ApiError> {
    let tags = blocking(&state, move |store, _| store.tag_names(&project_id)).await?;
    Ok(Json(TagsResponse {
        status: "ok".into(),
        tags: tags.into_iter().collect(),
    }))
}

async fn query_dataset_entries(
    State(state): State<AppState>,
    Path(dataset_id): Path<String>,
    Json(req): Json<FilterRequest>,
) -> std::result::Result<Json<IdsResponse>, ApiError> {
    let started = Instant::now();
    let page = state.page(req.limit, req.offset);
    let ids = blocking(&state, move |store, settings| {
        let query = compile::<DatasetEntries>(
            store,
            settings,
            &dataset_id,
            &req.filters,
            req.selection.as_ref(),
        )?;
        store.fetch_ids(&query.render(Dialect::Sqlite, page))
    })
    .await?;
    let elapsed_ms = elapsed_ms(started);
    info!(ms = elapsed_ms, rows = ids.len(), "dataset entries query complete");
    Ok(Json(IdsResponse {
        status: "ok".into(),
        elapsed_ms,
        ids,
    }))
}
