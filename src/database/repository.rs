use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::{Collection, Document, DocumentStore, StoreError};
use crate::filter::Filter;

/// A typed document living in one collection
pub trait Model: Serialize + DeserializeOwned + Send + Sync {
    const COLLECTION: Collection;
}

/// Typed access to one collection of the record store
pub struct Repository<T> {
    store: Arc<dyn DocumentStore>,
    _phantom: PhantomData<T>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _phantom: PhantomData,
        }
    }
}

impl<T: Model> Repository<T> {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            _phantom: PhantomData,
        }
    }

    pub async fn select_any(&self, filter: &Filter) -> Result<Vec<T>, StoreError> {
        self.store
            .find(T::COLLECTION, filter, None)
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }

    /// Fetch only `fields` and decode them into a narrower view type
    pub async fn select_projected<P: DeserializeOwned>(
        &self,
        filter: &Filter,
        fields: &[&str],
    ) -> Result<Vec<P>, StoreError> {
        self.store
            .find(T::COLLECTION, filter, Some(fields))
            .await?
            .into_iter()
            .map(|doc| decode_as::<P>(T::COLLECTION, doc))
            .collect()
    }

    pub async fn select_one(&self, filter: &Filter) -> Result<Option<T>, StoreError> {
        self.store
            .find_one(T::COLLECTION, filter)
            .await?
            .map(decode)
            .transpose()
    }

    pub async fn count(&self, filter: &Filter) -> Result<u64, StoreError> {
        self.store.count_documents(T::COLLECTION, filter).await
    }

    pub async fn insert(&self, record: &T) -> Result<Uuid, StoreError> {
        let document = encode(T::COLLECTION, record)?;
        self.store.insert_one(T::COLLECTION, document).await
    }

    /// Merge the serialized `patch` into the first match; returns the matched count
    pub async fn update(&self, filter: &Filter, patch: &impl Serialize) -> Result<u64, StoreError> {
        let document = encode(T::COLLECTION, patch)?;
        self.store.update_one(T::COLLECTION, filter, document).await
    }

    pub async fn delete(&self, filter: &Filter) -> Result<u64, StoreError> {
        self.store.delete_one(T::COLLECTION, filter).await
    }
}

fn decode<T: Model>(document: Document) -> Result<T, StoreError> {
    decode_as(T::COLLECTION, document)
}

fn decode_as<P: DeserializeOwned>(collection: Collection, document: Document) -> Result<P, StoreError> {
    serde_json::from_value(Value::Object(document)).map_err(|e| StoreError::InvalidDocument {
        collection,
        message: e.to_string(),
    })
}

fn encode(collection: Collection, value: &impl Serialize) -> Result<Document, StoreError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(StoreError::InvalidDocument {
            collection,
            message: format!("expected object, found {}", other),
        }),
        Err(e) => Err(StoreError::InvalidDocument {
            collection,
            message: e.to_string(),
        }),
    }
}
