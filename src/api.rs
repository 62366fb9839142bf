// 🌐 HTTP Surface - REST API with Axum
// GET/POST /records (also mounted under /api, the deployed path)

use crate::entry::NewEntry;
use crate::error::RecordError;
use crate::recorder::{Limit, Recorder};
use crate::store::TabularStore;
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

pub type SharedRecorder = Arc<Recorder<Arc<dyn TabularStore>>>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    recorder: SharedRecorder,
}

// ============================================================================
// RESPONSE BODIES
// ============================================================================

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

#[derive(Debug, Serialize)]
struct MessageBody {
    message: &'static str,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    backend: &'static str,
    version: &'static str,
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    name: Option<String>,
    limit: Option<String>,
}

fn error_body(status: StatusCode, error: impl Into<String>, details: Option<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: error.into(),
            details,
        }),
    )
        .into_response()
}

/// Map every recorder outcome onto a distinct status
fn record_error_response(err: RecordError) -> Response {
    match err {
        RecordError::Validation { .. } => error_body(StatusCode::BAD_REQUEST, err.to_string(), None),
        RecordError::Duplicate { .. } => error_body(StatusCode::CONFLICT, err.to_string(), None),
        RecordError::Read(cause) => {
            error!(error = %cause, "store read failed");
            error_body(
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to read records",
                Some(cause.to_string()),
            )
        }
        RecordError::Write(cause) => {
            error!(error = %cause, "store write failed");
            error_body(
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to write record",
                Some(cause.to_string()),
            )
        }
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        backend: state.recorder.store().backend_name(),
        version: crate::VERSION,
    })
}

/// GET /records?name=<category>&limit=<n|all> - Most recent entries
async fn list_records(State(state): State<AppState>, Query(query): Query<ListQuery>) -> Response {
    let limit = match query
        .limit
        .as_deref()
        .filter(|raw| !raw.is_empty())
        .map(str::parse::<Limit>)
        .transpose()
    {
        Ok(limit) => limit,
        Err(message) => return error_body(StatusCode::BAD_REQUEST, message, None),
    };

    match state.recorder.list_recent(query.name.as_deref(), limit).await {
        Ok(entries) => (StatusCode::OK, Json(entries)).into_response(),
        Err(err) => record_error_response(err),
    }
}

/// POST /records - Record one entry unless its (date, time) already exists
async fn create_record(
    State(state): State<AppState>,
    payload: Result<Json<NewEntry>, JsonRejection>,
) -> Response {
    let Json(input) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            return error_body(
                StatusCode::BAD_REQUEST,
                "malformed record",
                Some(rejection.body_text()),
            )
        }
    };

    match state.recorder.record_entry(input).await {
        Ok(()) => (StatusCode::OK, Json(MessageBody { message: "recorded" })).into_response(),
        Err(err) => record_error_response(err),
    }
}

// ============================================================================
// Router
// ============================================================================

pub fn router(recorder: SharedRecorder) -> Router {
    let state = AppState { recorder };

    let records = Router::new().route("/records", get(list_records).post(create_record));
    let api_routes = records.clone().route("/health", get(health_check));

    Router::new()
        .merge(records)
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
