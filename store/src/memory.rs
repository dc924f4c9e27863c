use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::{collection::validate_id, Collection, DocumentStore, StoreError};

/// In-process store for tests and throwaway runs. Saves can be made to fail
/// on demand.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: RwLock<HashMap<(Collection, String), Value>>,
    failing: AtomicBool,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Successful saves so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list_ids(&self, collection: Collection) -> Result<Vec<String>, StoreError> {
        let documents = self.documents.read().await;
        let mut ids: Vec<String> = documents
            .keys()
            .filter(|(c, _)| *c == collection)
            .map(|(_, id)| id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn load(&self, collection: Collection, id: &str) -> Result<Option<Value>, StoreError> {
        let documents = self.documents.read().await;
        Ok(documents.get(&(collection, id.to_string())).cloned())
    }

    async fn save(&self, collection: Collection, id: &str, document: &Value) -> Result<(), StoreError> {
        validate_id(id)?;
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!("refusing to save {collection}/{id}")));
        }
        self.documents
            .write()
            .await
            .insert((collection, id.to_string()), document.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
