//! nlsql-http: the axum HTTP surface over the query pipeline — `/query`,
//! `/databases`, and the consolidated-schema endpoints from §6.
//!
//! Authentication, request routing beyond this router, and configuration
//! loading for anything outside `nlsql_core::Config`/[`config::ServerConfig`]
//! are out of scope (§1).

pub mod app;
pub mod config;
pub mod error;
pub mod routes;
pub mod server;

pub use app::App;
pub use config::ServerConfig;
pub use error::ServerError;
pub use server::Server;
