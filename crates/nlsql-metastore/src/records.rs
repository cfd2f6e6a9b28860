//! SurrealDB record shapes for the five consolidated-metadata tables in
//! §6: `database_metadata`, `table_metadata`, `column_metadata`,
//! `primary_key_metadata`, `foreign_key_metadata`. These are an
//! out-of-band view written by `POST /databases/extract-all-schemas`; the
//! live Schema Cache remains authoritative for request-time schema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod surreal_datetime {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};
    use surrealdb::sql::Datetime as SurrealDatetime;

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let sd = SurrealDatetime::from(*date);
        serde::Serialize::serialize(&sd, serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let sd = SurrealDatetime::deserialize(deserializer)?;
        Ok(DateTime::from(sd))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseMetadataRecord {
    pub id: Option<surrealdb::sql::Thing>,
    pub db_id: String,
    pub db_name: String,
    pub db_type: String,
    #[serde(with = "surreal_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "surreal_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl DatabaseMetadataRecord {
    pub fn new(db_id: impl Into<String>, db_name: impl Into<String>, db_type: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            db_id: db_id.into(),
            db_name: db_name.into(),
            db_type: db_type.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableMetadataRecord {
    pub id: Option<surrealdb::sql::Thing>,
    pub db_id: String,
    pub table_name: String,
    #[serde(with = "surreal_datetime")]
    pub created_at: DateTime<Utc>,
}

impl TableMetadataRecord {
    pub fn new(db_id: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            id: None,
            db_id: db_id.into(),
            table_name: table_name.into(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMetadataRecord {
    pub id: Option<surrealdb::sql::Thing>,
    pub db_id: String,
    pub table_name: String,
    pub column_name: String,
    pub data_type: String,
    pub is_nullable: bool,
    pub column_default: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrimaryKeyMetadataRecord {
    pub id: Option<surrealdb::sql::Thing>,
    pub db_id: String,
    pub table_name: String,
    pub column_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKeyMetadataRecord {
    pub id: Option<surrealdb::sql::Thing>,
    pub db_id: String,
    pub table_name: String,
    pub column_name: String,
    pub referenced_table: String,
    pub referenced_column: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_metadata_record_stamps_both_timestamps() {
        let record = DatabaseMetadataRecord::new("default", "Default Database", "postgres");
        assert_eq!(record.created_at, record.updated_at);
        assert_eq!(record.db_type, "postgres");
    }
}
