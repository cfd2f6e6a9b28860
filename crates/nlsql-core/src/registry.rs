//! C1 Database Registry: the set of configured backends and lookup/selection
//! over them.

use crate::config::Config;
use crate::domain::Backend;
use crate::error::{NlSqlError, Result};

/// Holds the backends loaded at startup. Immutable after construction —
/// reconfiguring backends means restarting the process, matching the
/// original's "configuration loaded once at boot" model.
#[derive(Debug, Clone)]
pub struct Registry {
    backends: Vec<Backend>,
}

impl Registry {
    pub fn new(backends: Vec<Backend>) -> Self {
        Self { backends }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.backends.clone())
    }

    /// All enabled backends, in configuration order.
    pub fn list(&self) -> Vec<&Backend> {
        self.backends.iter().filter(|b| b.enabled).collect()
    }

    pub fn get(&self, id: &str) -> Result<&Backend> {
        self.backends
            .iter()
            .find(|b| b.id == id && b.enabled)
            .ok_or_else(|| NlSqlError::BackendNotFound(id.to_string()))
    }

    /// Select a backend for a request: the named one if given, else the
    /// registry's sole backend, else `"default"` if present, else the first
    /// enabled backend. Returns `BackendNotFound` if nothing qualifies.
    pub fn select(&self, requested_id: Option<&str>) -> Result<&Backend> {
        if let Some(id) = requested_id {
            return self.get(id);
        }
        let enabled = self.list();
        if enabled.len() == 1 {
            return Ok(enabled[0]);
        }
        if let Some(default) = enabled.iter().find(|b| b.id == "default") {
            return Ok(default);
        }
        enabled
            .first()
            .copied()
            .ok_or_else(|| NlSqlError::BackendNotFound("<none configured>".to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.list().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Dialect;

    fn backend(id: &str, enabled: bool) -> Backend {
        Backend {
            id: id.to_string(),
            display_name: id.to_string(),
            dialect: Dialect::Postgres,
            connection_descriptor: format!("postgresql://{id}"),
            enabled,
            read_only: false,
        }
    }

    #[test]
    fn test_get_missing_backend_errors() {
        let registry = Registry::new(vec![backend("default", true)]);
        assert!(matches!(registry.get("nope"), Err(NlSqlError::BackendNotFound(_))));
    }

    #[test]
    fn test_select_sole_backend_when_unnamed() {
        let registry = Registry::new(vec![backend("db_1", true)]);
        let selected = registry.select(None).unwrap();
        assert_eq!(selected.id, "db_1");
    }

    #[test]
    fn test_select_prefers_default_among_many() {
        let registry = Registry::new(vec![backend("db_1", true), backend("default", true)]);
        let selected = registry.select(None).unwrap();
        assert_eq!(selected.id, "default");
    }

    #[test]
    fn test_select_ignores_disabled_backends() {
        let registry = Registry::new(vec![backend("db_1", false), backend("db_2", true)]);
        let selected = registry.select(None).unwrap();
        assert_eq!(selected.id, "db_2");
    }

    #[test]
    fn test_select_named_backend() {
        let registry = Registry::new(vec![backend("db_1", true), backend("db_2", true)]);
        let selected = registry.select(Some("db_2")).unwrap();
        assert_eq!(selected.id, "db_2");
    }
}
