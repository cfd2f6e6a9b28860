//! Startup configuration loading.
//!
//! Loaded once at process start into a plain struct and passed by handle —
//! no global mutable configuration state, matching the composition-root
//! convention used throughout this codebase.

use serde::Deserialize;

use crate::domain::backend::{Backend, Dialect};

/// One backend entry as it appears in the `DATABASE_CONFIG` JSON override.
#[derive(Debug, Deserialize)]
struct BackendConfigJson {
    id: String,
    name: String,
    connection_string: String,
    #[serde(rename = "type")]
    db_type: Option<String>,
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default)]
    readonly: bool,
}

fn default_true() -> bool {
    true
}

/// Process-wide configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub backends: Vec<Backend>,
    pub openai_api_key: Option<String>,
    pub google_api_key: Option<String>,
    pub cache_backend_url: Option<String>,
}

impl Config {
    /// Load configuration from environment variables, per the external
    /// interfaces section: `DATABASE_URL`, `DATABASE_<n>_*`, and an
    /// optional `DATABASE_CONFIG` JSON array extending/overriding them.
    pub fn from_env() -> Self {
        let mut backends = Vec::new();

        if let Ok(url) = std::env::var("DATABASE_URL") {
            backends.push(Backend {
                id: "default".to_string(),
                display_name: "Default Database".to_string(),
                dialect: Dialect::detect(&url),
                connection_descriptor: url,
                enabled: true,
                read_only: false,
            });
        }

        let mut index = 1u32;
        loop {
            let Ok(url) = std::env::var(format!("DATABASE_{index}_URL")) else {
                break;
            };
            let name = std::env::var(format!("DATABASE_{index}_NAME"))
                .unwrap_or_else(|_| format!("Database {index}"));
            let dialect = std::env::var(format!("DATABASE_{index}_TYPE"))
                .ok()
                .map(|t| parse_dialect(&t))
                .unwrap_or_else(|| Dialect::detect(&url));
            let enabled = std::env::var(format!("DATABASE_{index}_ENABLED"))
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(true);
            let read_only = std::env::var(format!("DATABASE_{index}_READONLY"))
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(false);

            backends.push(Backend {
                id: format!("db_{index}"),
                display_name: name,
                dialect,
                connection_descriptor: url,
                enabled,
                read_only,
            });
            index += 1;
        }

        if let Ok(json) = std::env::var("DATABASE_CONFIG") {
            match serde_json::from_str::<Vec<BackendConfigJson>>(&json) {
                Ok(entries) => {
                    for entry in entries {
                        if backends.iter().any(|b| b.id == entry.id) {
                            continue;
                        }
                        let dialect = entry
                            .db_type
                            .as_deref()
                            .map(parse_dialect)
                            .unwrap_or_else(|| Dialect::detect(&entry.connection_string));
                        backends.push(Backend {
                            id: entry.id,
                            display_name: entry.name,
                            dialect,
                            connection_descriptor: entry.connection_string,
                            enabled: entry.enabled,
                            read_only: entry.readonly,
                        });
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to parse DATABASE_CONFIG JSON");
                }
            }
        }

        if backends.is_empty() {
            tracing::warn!("no database configurations found");
        } else {
            tracing::info!(count = backends.len(), "loaded database configurations");
        }

        Self {
            backends,
            openai_api_key: std::env::var("OPENAI_API_KEY").ok(),
            google_api_key: std::env::var("GOOGLE_API_KEY").ok(),
            cache_backend_url: std::env::var("CACHE_BACKEND_URL").ok(),
        }
    }

    /// Whether at least one LLM-dependent provider credential is configured.
    pub fn llm_available(&self) -> bool {
        self.openai_api_key.is_some() || self.google_api_key.is_some()
    }
}

fn parse_dialect(s: &str) -> Dialect {
    match s.to_ascii_lowercase().as_str() {
        "postgres" | "postgresql" => Dialect::Postgres,
        "mysql" => Dialect::Mysql,
        "sqlite" => Dialect::Sqlite,
        "mssql" => Dialect::Mssql,
        "oracle" => Dialect::Oracle,
        _ => Dialect::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-global; serialize tests that touch them.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_db_env() {
        std::env::remove_var("DATABASE_URL");
        std::env::remove_var("DATABASE_CONFIG");
        for i in 1..5 {
            std::env::remove_var(format!("DATABASE_{i}_URL"));
            std::env::remove_var(format!("DATABASE_{i}_NAME"));
            std::env::remove_var(format!("DATABASE_{i}_TYPE"));
            std::env::remove_var(format!("DATABASE_{i}_ENABLED"));
            std::env::remove_var(format!("DATABASE_{i}_READONLY"));
        }
    }

    #[test]
    fn test_default_backend_from_database_url() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_db_env();
        std::env::set_var("DATABASE_URL", "postgresql://localhost/app");
        let config = Config::from_env();
        assert_eq!(config.backends.len(), 1);
        assert_eq!(config.backends[0].id, "default");
        assert_eq!(config.backends[0].dialect, Dialect::Postgres);
        clear_db_env();
    }

    #[test]
    fn test_numbered_backend_readonly_flag() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_db_env();
        std::env::set_var("DATABASE_1_URL", "mysql://localhost/reporting");
        std::env::set_var("DATABASE_1_READONLY", "true");
        let config = Config::from_env();
        let backend = config.backends.iter().find(|b| b.id == "db_1").unwrap();
        assert!(backend.read_only);
        assert_eq!(backend.dialect, Dialect::Mysql);
        clear_db_env();
    }

    #[test]
    fn test_database_config_json_skips_duplicate_ids() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_db_env();
        std::env::set_var("DATABASE_URL", "postgresql://localhost/app");
        std::env::set_var(
            "DATABASE_CONFIG",
            r#"[{"id":"default","name":"dup","connection_string":"x"},{"id":"db_extra","name":"Extra","connection_string":"sqlite://x.db"}]"#,
        );
        let config = Config::from_env();
        assert_eq!(config.backends.len(), 2);
        assert!(config.backends.iter().any(|b| b.id == "db_extra"));
        clear_db_env();
    }

    #[test]
    fn test_llm_available_false_without_keys() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("OPENAI_API_KEY");
        std::env::remove_var("GOOGLE_API_KEY");
        let config = Config::from_env();
        assert!(!config.llm_available());
    }
}
