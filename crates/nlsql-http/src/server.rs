//! HTTP server implementation — the `/query`, `/databases`, and
//! consolidated-schema endpoints from §6, built on axum.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::app::App;
use crate::config::ServerConfig;
use crate::error::{Result, ServerError};
use crate::routes;

/// Graceful-shutdown drain deadline (§6 "Exit behavior").
const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(30);

pub struct Server {
    config: ServerConfig,
    app: Arc<App>,
}

impl Server {
    pub fn new(config: ServerConfig, app: Arc<App>) -> Self {
        Self { config, app }
    }

    fn build_router(&self) -> Router {
        let mut router = Router::new()
            .route("/query", post(routes::query_handler))
            .route("/databases", get(routes::list_databases_handler))
            .route("/databases/:id/schema", get(routes::get_schema_handler))
            .route("/databases/extract-all-schemas", post(routes::extract_all_schemas_handler))
            .route("/databases/merged-schema", get(routes::merged_schema_handler))
            .route("/health", get(routes::health_handler))
            .with_state(self.app.clone());

        if self.config.tracing_enabled {
            router = router.layer(TraceLayer::new_for_http());
        }
        if self.config.cors_enabled {
            router = router.layer(CorsLayer::permissive());
        }

        router
    }

    /// Bind and serve, draining in-flight requests up to
    /// [`SHUTDOWN_DEADLINE`] on `ctrl_c`/SIGTERM before cancelling (§6).
    pub async fn serve(self) -> Result<()> {
        let app = self.build_router();

        let listener = TcpListener::bind(self.config.bind_addr)
            .await
            .map_err(|e| ServerError::BindError(e.to_string()))?;

        info!(addr = %self.config.bind_addr, "nlsql HTTP server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ServerError::BindError(e.to_string()))?;

        info!(deadline_secs = SHUTDOWN_DEADLINE.as_secs(), "drained in-flight requests, shutting down");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
