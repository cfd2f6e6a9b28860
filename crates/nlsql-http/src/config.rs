//! HTTP server configuration, loaded once at startup.

use std::net::SocketAddr;

/// Server-level configuration, distinct from [`nlsql_core::Config`]'s
/// backend/provider configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub cors_enabled: bool,
    pub tracing_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".parse().expect("valid default bind address"),
            cors_enabled: true,
            tracing_enabled: true,
        }
    }
}

impl ServerConfig {
    /// Load from `HTTP_BIND_ADDR` (default `0.0.0.0:8080`); CORS and
    /// request tracing are on by default and off only via
    /// `HTTP_CORS_ENABLED=false` / `HTTP_TRACING_ENABLED=false`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("HTTP_BIND_ADDR") {
            match addr.parse() {
                Ok(parsed) => config.bind_addr = parsed,
                Err(e) => tracing::error!(error = %e, addr = %addr, "invalid HTTP_BIND_ADDR, using default"),
            }
        }

        if let Ok(flag) = std::env::var("HTTP_CORS_ENABLED") {
            config.cors_enabled = flag.eq_ignore_ascii_case("true");
        }
        if let Ok(flag) = std::env::var("HTTP_TRACING_ENABLED") {
            config.tracing_enabled = flag.eq_ignore_ascii_case("true");
        }

        config
    }
}
