//! REST API used by the phone app and simple dashboards.
//!
//! ```text
//! POST /api/hr            {code, bpm, zone}  → {success: true}
//! GET  /api/hr/current    ?code=             → {data: Reading | null}
//! GET  /api/hr/history    ?code=&seconds=10  → {data: {readings: [...]}}
//! GET  /api/hr/stats      ?code=&seconds=60  → {data: Stats | null}
//! ```
//!
//! Unknown codes are not errors here: they produce `null` or an empty list.
//! Every validation failure is a 400 with `{error: <message>}`.

use crate::server::ServerState;
use crate::store::{HeartRateStats, Reading};
use crate::validation::{self, ValidationError};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Default window for `/hr/history`.
pub const DEFAULT_HISTORY_SECS: u32 = 10;

/// Default window for `/hr/stats`.
pub const DEFAULT_STATS_SECS: u32 = 60;

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Response from the ingest endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct IngestResponse {
    pub success: bool,
}

/// Envelope for every read endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct DataResponse<T> {
    pub data: T,
}

/// Payload of `/hr/history`.
#[derive(Debug, Serialize, Deserialize)]
pub struct History {
    pub readings: Vec<Reading>,
}

/// Query parameters shared by the read endpoints.
///
/// Kept as raw strings so bad values get our own validation messages. A query
/// string that cannot be parsed at all is reported by [`query_params`].
#[derive(Debug, Default, Deserialize)]
pub struct ReadingQuery {
    pub code: Option<String>,
    pub seconds: Option<String>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

fn bad_request(err: ValidationError) -> ApiError {
    tracing::debug!("rejected request: {err}");
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

fn query_params(
    query: Result<Query<ReadingQuery>, QueryRejection>,
) -> Result<ReadingQuery, ApiError> {
    query
        .map(|Query(query)| query)
        .map_err(|_| bad_request(ValidationError::MalformedQuery))
}

/// Build the REST routes. Mounted under `/api` by the server.
pub fn router() -> Router<Arc<ServerState>> {
    Router::new()
        .route("/hr", post(submit_reading))
        .route("/hr/current", get(current))
        .route("/hr/history", get(history))
        .route("/hr/stats", get(stats))
}

/// POST /api/hr
async fn submit_reading(
    State(state): State<Arc<ServerState>>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> ApiResult<IngestResponse> {
    let Json(body) = body.map_err(|_| bad_request(ValidationError::MalformedBody))?;
    let reading = validation::reading(&body).map_err(bad_request)?;

    state.store.insert(&reading.code, reading.bpm, reading.zone);

    Ok(Json(IngestResponse { success: true }))
}

/// GET /api/hr/current
async fn current(
    State(state): State<Arc<ServerState>>,
    query: Result<Query<ReadingQuery>, QueryRejection>,
) -> ApiResult<DataResponse<Option<Reading>>> {
    let query = query_params(query)?;
    let code = validation::pairing_code(query.code.as_deref()).map_err(bad_request)?;

    Ok(Json(DataResponse {
        data: state.store.latest(code),
    }))
}

/// GET /api/hr/history
async fn history(
    State(state): State<Arc<ServerState>>,
    query: Result<Query<ReadingQuery>, QueryRejection>,
) -> ApiResult<DataResponse<History>> {
    let query = query_params(query)?;
    let code = validation::pairing_code(query.code.as_deref()).map_err(bad_request)?;
    let seconds = validation::window_param(query.seconds.as_deref(), DEFAULT_HISTORY_SECS)
        .map_err(bad_request)?;

    Ok(Json(DataResponse {
        data: History {
            readings: state.store.range(code, seconds),
        },
    }))
}

/// GET /api/hr/stats
async fn stats(
    State(state): State<Arc<ServerState>>,
    query: Result<Query<ReadingQuery>, QueryRejection>,
) -> ApiResult<DataResponse<Option<HeartRateStats>>> {
    let query = query_params(query)?;
    let code = validation::pairing_code(query.code.as_deref()).map_err(bad_request)?;
    let seconds = validation::window_param(query.seconds.as_deref(), DEFAULT_STATS_SECS)
        .map_err(bad_request)?;

    Ok(Json(DataResponse {
        data: state.store.stats(code, seconds),
    }))
}
