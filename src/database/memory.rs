use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{project, take_or_assign_id, Collection, Document, DocumentStore, StoreError};
use crate::filter::Filter;

/// Process-local record store. Every operation holds the collection lock for
/// its whole duration, which makes `update_one` a true compare-and-swap.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<Collection, Vec<Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_unique(
        collection: Collection,
        documents: &[Document],
        candidate: &Document,
        skip_id: Option<&str>,
    ) -> Result<(), StoreError> {
        for key in collection.unique_keys() {
            let Some(value) = candidate.get(*key).filter(|v| !v.is_null()) else {
                continue;
            };
            let clash = documents.iter().any(|doc| {
                doc.get(*key) == Some(value) && doc.get("id").and_then(Value::as_str) != skip_id
            });
            if clash {
                return Err(StoreError::Duplicate {
                    collection,
                    key: key.to_string(),
                });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find(
        &self,
        collection: Collection,
        filter: &Filter,
        projection: Option<&[&str]>,
    ) -> Result<Vec<Document>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .map(|docs| {
                docs.iter()
                    .filter(|doc| filter.matches(doc))
                    .map(|doc| project(doc.clone(), projection))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn find_one(&self, collection: Collection, filter: &Filter) -> Result<Option<Document>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .and_then(|docs| docs.iter().find(|doc| filter.matches(doc)).cloned()))
    }

    async fn insert_one(&self, collection: Collection, mut document: Document) -> Result<Uuid, StoreError> {
        let id = take_or_assign_id(&mut document);
        document.insert("id".to_string(), Value::String(id.to_string()));

        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection).or_default();
        if docs.iter().any(|doc| doc.get("id") == document.get("id")) {
            return Err(StoreError::Duplicate {
                collection,
                key: "id".to_string(),
            });
        }
        Self::check_unique(collection, docs, &document, None)?;
        docs.push(document);
        Ok(id)
    }

    async fn update_one(&self, collection: Collection, filter: &Filter, mut patch: Document) -> Result<u64, StoreError> {
        patch.remove("id");

        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(&collection) else {
            return Ok(0);
        };
        let Some(index) = docs.iter().position(|doc| filter.matches(doc)) else {
            return Ok(0);
        };

        let mut merged = docs[index].clone();
        merged.extend(patch);
        let id = merged.get("id").and_then(Value::as_str).map(str::to_string);
        Self::check_unique(collection, docs, &merged, id.as_deref())?;
        docs[index] = merged;
        Ok(1)
    }

    async fn delete_one(&self, collection: Collection, filter: &Filter) -> Result<u64, StoreError> {
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(&collection) else {
            return Ok(0);
        };
        match docs.iter().position(|doc| filter.matches(doc)) {
            Some(index) => {
                docs.remove(index);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn count_documents(&self, collection: Collection, filter: &Filter) -> Result<u64, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .map(|docs| docs.iter().filter(|doc| filter.matches(doc)).count() as u64)
            .unwrap_or(0))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
