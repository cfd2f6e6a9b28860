pub mod databases;
pub mod health;
pub mod query;

pub use databases::{extract_all_schemas_handler, get_schema_handler, list_databases_handler, merged_schema_handler};
pub use health::health_handler;
pub use query::query_handler;
