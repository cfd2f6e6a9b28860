//! nlsql HTTP server binary.

use std::sync::Arc;

use nlsql_core::telemetry;
use nlsql_http::{App, Server, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing(false, tracing::Level::INFO);

    tracing::info!("nlsql HTTP server v{}", env!("CARGO_PKG_VERSION"));

    let app = Arc::new(App::from_env().await?);
    let config = ServerConfig::from_env();

    Server::new(config, app).serve().await?;
    Ok(())
}
