//! # HTTP Server
//!
//! Combines the engine routers behind the configured CORS policy.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::config::HttpConfig;
use crate::engine::Engine;
use crate::observability::{LogEvent, Logger};

use super::event_routes::event_routes;
use super::observability_routes::observability_routes;
use super::report_routes::report_routes;

pub struct HttpServer {
    bind: SocketAddr,
    router: Router,
}

impl HttpServer {
    pub fn new(engine: Arc<Engine>, config: &HttpConfig) -> Self {
        Self {
            bind: config.bind,
            router: Self::build_router(engine, config),
        }
    }

    fn build_router(engine: Arc<Engine>, config: &HttpConfig) -> Router {
        let router = Router::new()
            .merge(observability_routes(Arc::clone(&engine)))
            .merge(event_routes(Arc::clone(&engine)))
            .merge(report_routes(engine));

        match cors_layer(config) {
            Some(cors) => router.layer(cors),
            None => router,
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        self.bind
    }

    /// The assembled router, for in-process requests
    pub fn router(self) -> Router {
        self.router
    }

    /// Serve until `shutdown` resolves
    pub async fn start<F>(self, shutdown: F) -> Result<(), std::io::Error>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.bind).await?;
        let bound = listener.local_addr()?.to_string();
        Logger::info(LogEvent::ServerStart, &[("addr", bound.as_str())]);

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        Ok(())
    }
}

/// `None` when no cross-origin caller is configured
fn cors_layer(config: &HttpConfig) -> Option<CorsLayer> {
    if config.cors_origins.is_empty() {
        return None;
    }
    let origin = if config.allows_any_origin() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(config.cors_origins.iter().filter_map(|o| o.parse().ok()))
    };
    Some(
        CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(Any)
            .allow_headers(Any),
    )
}
