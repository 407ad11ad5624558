//! Engine errors as HTTP responses
//!
//! Extractor rejections (bad JSON, bad path or query) go through the same
//! `ErrorBody` as engine failures, as `invalid_input`.

use std::fmt::Display;
use std::sync::Arc;

use axum::{http::StatusCode, Json};

use crate::engine::Engine;
use crate::errors::{EngineError, EngineResult, ErrorBody};

/// Rejection returned by every handler
pub type ApiError = (StatusCode, Json<ErrorBody>);

pub type ApiResult<T> = Result<T, ApiError>;

pub fn api_error(error: EngineError) -> ApiError {
    let status =
        StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(error.to_body()))
}

/// Body for a request axum could not extract
pub fn rejected(rejection: impl Display) -> ApiError {
    api_error(EngineError::invalid_input(rejection.to_string()))
}

/// Run an engine call on the blocking pool; commits may fsync
pub(crate) async fn blocking<T, F>(engine: &Arc<Engine>, call: F) -> ApiResult<T>
where
    F: FnOnce(&Engine) -> EngineResult<T> + Send + 'static,
    T: Send + 'static,
{
    let engine = Arc::clone(engine);
    tokio::task::spawn_blocking(move || call(&engine))
        .await
        .map_err(|e| api_error(EngineError::unavailable(format!("engine task failed: {}", e))))?
        .map_err(api_error)
}
