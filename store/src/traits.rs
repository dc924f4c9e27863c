use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::{Collection, StoreError};

/// Keyed JSON documents grouped into collections. `save` is an upsert.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn list_ids(&self, collection: Collection) -> Result<Vec<String>, StoreError>;
    async fn load(&self, collection: Collection, id: &str) -> Result<Option<Value>, StoreError>;
    async fn save(&self, collection: Collection, id: &str, document: &Value) -> Result<(), StoreError>;
}

pub async fn load_typed<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: Collection,
    id: &str,
) -> Result<Option<T>, StoreError> {
    match store.load(collection, id).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

pub async fn save_typed<T: Serialize + Sync + ?Sized>(
    store: &dyn DocumentStore,
    collection: Collection,
    id: &str,
    document: &T,
) -> Result<(), StoreError> {
    let value = serde_json::to_value(document)?;
    store.save(collection, id, &value).await
}
