//! Report HTTP Routes
//!
//! Report reads and the reviewer-facing `advance` endpoint.

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::{Advanced, Engine, RevisionInput};
use crate::ledger::{ReasonReport, ReportStatus};

use super::errors::{blocking, rejected, ApiResult};

#[derive(Debug, Deserialize)]
pub struct AdvanceRequest {
    pub to: ReportStatus,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub revision: Option<RevisionInput>,
}

pub fn report_routes(engine: Arc<Engine>) -> Router {
    Router::new()
        .route("/reports/:id", get(get_report_handler))
        .route("/reports/:id/advance", post(advance_handler))
        .route("/users/:user_id/reports", get(user_reports_handler))
        .with_state(engine)
}

async fn get_report_handler(
    State(engine): State<Arc<Engine>>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<ReasonReport>> {
    let Path(id) = id.map_err(rejected)?;
    blocking(&engine, move |e| e.get_report(id)).await.map(Json)
}

async fn advance_handler(
    State(engine): State<Arc<Engine>>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<AdvanceRequest>, JsonRejection>,
) -> ApiResult<Json<Advanced>> {
    let Path(id) = id.map_err(rejected)?;
    let Json(request) = payload.map_err(rejected)?;
    blocking(&engine, move |e| {
        e.advance(id, request.to, request.note, request.revision)
    })
    .await
    .map(Json)
}

async fn user_reports_handler(
    State(engine): State<Arc<Engine>>,
    user_id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<Vec<ReasonReport>>> {
    let Path(user_id) = user_id.map_err(rejected)?;
    blocking(&engine, move |e| e.list_reports_for_user(user_id))
        .await
        .map(Json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ReasonScoring;

    #[test]
    fn test_advance_request_with_signal_revision() {
        let request: AdvanceRequest = serde_json::from_str(
            r#"{
                "to": "resolved",
                "revision": {
                    "expected_confidence": 0.82,
                    "revision_reason": "wrong filing",
                    "scoring": {"kind": "signals", "signals": {"relevance": 0.2}}
                }
            }"#,
        )
        .unwrap();
        assert_eq!(request.to, ReportStatus::Resolved);
        assert!(request.note.is_none());
        let revision = request.revision.unwrap();
        assert!(matches!(revision.scoring, ReasonScoring::Signals { .. }));
    }
}
