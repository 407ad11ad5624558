//! # HTTP Server Module
//!
//! Axum binding of the engine.
//!
//! # Endpoints
//!
//! - `/health`, `/metrics`
//! - `/events`, `/events/:id`, `/events/:id/revision-history`
//! - `/events/:id/reasons/:reason_id/reports`
//! - `/reports/:id`, `/reports/:id/advance`, `/users/:user_id/reports`

pub mod errors;
pub mod event_routes;
pub mod observability_routes;
pub mod report_routes;
pub mod server;

pub use errors::{api_error, rejected, ApiError, ApiResult};
pub use event_routes::USER_ID_HEADER;
pub use server::HttpServer;
