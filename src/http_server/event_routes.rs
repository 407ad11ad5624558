//! Event HTTP Routes
//!
//! Detector ingestion, event reads, report submission and revision
//! history.

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::{Engine, Submission};
use crate::errors::EngineError;
use crate::events::EventPage;
use crate::ledger::RevisionHistory;
use crate::model::{Event, NewEvent, NewReason};

use super::errors::{api_error, blocking, rejected, ApiResult};

/// Header carrying the caller's user id, set by the upstream auth layer
pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    pub event: NewEvent,
    pub reasons: Vec<NewReason>,
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct ListEventsQuery {
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

pub fn event_routes(engine: Arc<Engine>) -> Router {
    Router::new()
        .route("/events", post(ingest_handler).get(list_events_handler))
        .route("/events/:id", get(get_event_handler))
        .route("/events/:id/revision-history", get(revision_history_handler))
        .route(
            "/events/:id/reasons/:reason_id/reports",
            post(submit_report_handler),
        )
        .with_state(engine)
}

pub(crate) fn user_id_from(headers: &HeaderMap) -> Result<Uuid, EngineError> {
    let raw = headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| EngineError::invalid_input(format!("missing {} header", USER_ID_HEADER)))?;
    Uuid::parse_str(raw.trim())
        .map_err(|_| EngineError::invalid_input(format!("{} is not a UUID", USER_ID_HEADER)))
}

async fn ingest_handler(
    State(engine): State<Arc<Engine>>,
    payload: Result<Json<IngestRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<IngestResponse>)> {
    let Json(request) = payload.map_err(rejected)?;
    let id = blocking(&engine, move |e| e.ingest_event(request.event, request.reasons)).await?;
    Ok((StatusCode::CREATED, Json(IngestResponse { id })))
}

async fn list_events_handler(
    State(engine): State<Arc<Engine>>,
    query: Result<Query<ListEventsQuery>, QueryRejection>,
) -> ApiResult<Json<EventPage>> {
    let Query(query) = query.map_err(rejected)?;
    blocking(&engine, move |e| e.list_events(query.cursor.as_deref(), query.limit))
        .await
        .map(Json)
}

async fn get_event_handler(
    State(engine): State<Arc<Engine>>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<Event>> {
    let Path(id) = id.map_err(rejected)?;
    blocking(&engine, move |e| e.get_event(id)).await.map(Json)
}

/// 404 with `reason_revision_history_not_found` is the "no disputes yet" state
async fn revision_history_handler(
    State(engine): State<Arc<Engine>>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<RevisionHistory>> {
    let Path(id) = id.map_err(rejected)?;
    blocking(&engine, move |e| e.get_revision_history(id))
        .await
        .map(Json)
}

async fn submit_report_handler(
    State(engine): State<Arc<Engine>>,
    headers: HeaderMap,
    ids: Result<Path<(Uuid, Uuid)>, PathRejection>,
) -> ApiResult<(StatusCode, Json<Submission>)> {
    let Path((event_id, reason_id)) = ids.map_err(rejected)?;
    let user_id = user_id_from(&headers).map_err(api_error)?;
    let submission =
        blocking(&engine, move |e| e.submit_report(event_id, reason_id, user_id)).await?;
    Ok((StatusCode::CREATED, Json(submission)))
}
