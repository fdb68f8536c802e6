pub mod manager;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod repository;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::config::{DatabaseConfig, StoreBackend};
use crate::filter::{Filter, FilterError};

pub use manager::{DatabaseError, DatabaseManager};
pub use memory::MemoryStore;
pub use postgres::PgDocumentStore;
pub use repository::{Model, Repository};

/// A stored record: a JSON object whose `id` is a UUID string
pub type Document = Map<String, Value>;

/// Collections held by the record store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    Students,
    VaccinationDrives,
}

impl Collection {
    pub const ALL: [Collection; 3] = [Collection::Users, Collection::Students, Collection::VaccinationDrives];

    pub fn name(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Students => "students",
            Collection::VaccinationDrives => "vaccination_drives",
        }
    }

    /// Top-level fields that must be unique within the collection
    pub fn unique_keys(&self) -> &'static [&'static str] {
        match self {
            Collection::Users => &["username"],
            Collection::Students => &["student_id"],
            Collection::VaccinationDrives => &[],
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate value for unique key '{key}' in {collection}")]
    Duplicate { collection: Collection, key: String },

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error("invalid document in {collection}: {message}")]
    InvalidDocument { collection: Collection, message: String },

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Collection-level document operations consumed by the services.
///
/// `update_one` applies a shallow merge of `patch` to the first document
/// matching `filter` and is atomic with respect to that match, so putting a
/// precondition in the filter gives compare-and-swap.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find(
        &self,
        collection: Collection,
        filter: &Filter,
        projection: Option<&[&str]>,
    ) -> Result<Vec<Document>, StoreError>;

    async fn find_one(&self, collection: Collection, filter: &Filter) -> Result<Option<Document>, StoreError>;

    /// Keeps a valid UUID `id` already present in the document, otherwise assigns one
    async fn insert_one(&self, collection: Collection, document: Document) -> Result<Uuid, StoreError>;

    /// Returns the matched count (0 or 1)
    async fn update_one(&self, collection: Collection, filter: &Filter, patch: Document) -> Result<u64, StoreError>;

    /// Returns the deleted count (0 or 1)
    async fn delete_one(&self, collection: Collection, filter: &Filter) -> Result<u64, StoreError>;

    async fn count_documents(&self, collection: Collection, filter: &Filter) -> Result<u64, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;

    /// Release connections on shutdown
    async fn close(&self) {}
}

/// Take the document id, or mint one
pub(crate) fn take_or_assign_id(document: &mut Document) -> Uuid {
    document
        .remove("id")
        .and_then(|v| v.as_str().and_then(|s| Uuid::parse_str(s).ok()))
        .unwrap_or_else(Uuid::new_v4)
}

/// Keep only the projected fields (plus `id`)
pub(crate) fn project(mut document: Document, projection: Option<&[&str]>) -> Document {
    if let Some(fields) = projection {
        document.retain(|key, _| key == "id" || fields.contains(&key.as_str()));
    }
    document
}

/// Open the configured record store
pub async fn open_store(config: &DatabaseConfig) -> Result<Arc<dyn DocumentStore>, DatabaseError> {
    match config.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory record store; data is lost on shutdown");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Postgres => {
            let pool = DatabaseManager::connect(config).await?;
            DatabaseManager::ensure_schema(&pool).await?;
            Ok(Arc::new(PgDocumentStore::new(pool)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keeps_valid_ids_and_replaces_others() {
        let id = Uuid::new_v4();
        let mut doc = json!({"id": id.to_string(), "a": 1}).as_object().cloned().unwrap();
        assert_eq!(take_or_assign_id(&mut doc), id);
        assert!(!doc.contains_key("id"));

        let mut doc = json!({"id": "nope"}).as_object().cloned().unwrap();
        assert_ne!(take_or_assign_id(&mut doc).to_string(), "nope");
    }

    #[test]
    fn projection_always_keeps_id() {
        let doc = json!({"id": "x", "a": 1, "b": 2}).as_object().cloned().unwrap();
        let projected = project(doc, Some(&["b"]));
        assert_eq!(Value::Object(projected), json!({"id": "x", "b": 2}));
    }
}
