//! nlsql command-line interface.
//!
//! Wraps the same `App` composition root the HTTP server uses, so
//! `nlsql query "..."` exercises the exact Orchestrator path a `POST
//! /query` request would, without going over the network.

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;

use nlsql_core::{telemetry, Mode, Request};
use nlsql_http::{App, Server, ServerConfig};

#[derive(Parser)]
#[command(name = "nlsql")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Natural-language-to-SQL multi-agent query pipeline", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (`/query`, `/databases`, ...)
    Serve,

    /// Run a single natural-language query through the pipeline and print
    /// the resulting envelope as JSON
    Query {
        /// The natural-language utterance
        utterance: String,

        /// Target backend id; omitted selects the registry default
        #[arg(short, long)]
        backend_id: Option<String>,

        /// Orchestrator mode: route, coordinate, or collaborate
        #[arg(short, long, default_value = "coordinate")]
        mode: String,
    },

    /// List configured backends
    Databases,

    /// Print a single backend's cached schema snapshot
    Schema {
        /// Backend id
        id: String,
    },

    /// Print the merged schema across every cached backend
    MergedSchema,

    /// Consolidate every backend's live schema into the metastore
    ExtractSchemas,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    telemetry::init_tracing(cli.json, level);

    let app = Arc::new(App::from_env().await?);

    match cli.command {
        Commands::Serve => {
            let config = ServerConfig::from_env();
            Server::new(config, app).serve().await?;
        }
        Commands::Query { utterance, backend_id, mode } => {
            let mode = parse_mode(&mode);
            let request = Request::new(utterance, backend_id, mode)?;
            let envelope = app.orchestrator.handle(request).await;
            println!("{}", serde_json::to_string_pretty(&envelope)?);
        }
        Commands::Databases => {
            let databases: Vec<_> = app
                .registry
                .list()
                .into_iter()
                .map(|b| serde_json::json!({
                    "id": b.id,
                    "name": b.display_name,
                    "type": b.dialect.to_string(),
                    "readonly": b.read_only,
                    "enabled": b.enabled,
                }))
                .collect();
            println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "databases": databases }))?);
        }
        Commands::Schema { id } => {
            let snapshot = app.orchestrator.schema_snapshot(&id).await?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        Commands::MergedSchema => {
            let tables = app.orchestrator.merged_schema().await;
            println!("{}", serde_json::to_string_pretty(&tables)?);
        }
        Commands::ExtractSchemas => {
            let backends: Vec<_> = app.registry.list().into_iter().cloned().collect();
            let mut snapshots = Vec::with_capacity(backends.len());
            for backend in &backends {
                snapshots.push(app.orchestrator.schema_snapshot(&backend.id).await?);
            }
            app.metastore.consolidate(&backends, &snapshots).await?;
            println!("consolidated {} backend(s)", backends.len());
        }
    }

    Ok(())
}

fn parse_mode(s: &str) -> Mode {
    match s.to_ascii_lowercase().as_str() {
        "route" => Mode::Route,
        "collaborate" => Mode::Collaborate,
        _ => Mode::Coordinate,
    }
}
