pub mod collection;
pub mod config;
pub mod error;
pub mod file;
pub mod memory;
pub mod retry;
pub mod sqlite;
pub mod traits;

pub use collection::Collection;
pub use config::{StoreConfig, StoreLocation};
pub use error::StoreError;
pub use file::FileStore;
pub use memory::MemoryStore;
pub use retry::retry_with_backoff;
pub use sqlite::SqliteStore;
pub use traits::{load_typed, save_typed, DocumentStore};

// NoopStore for when persistence is not needed
pub struct NoopStore;

#[async_trait::async_trait]
impl DocumentStore for NoopStore {
    async fn list_ids(&self, _collection: Collection) -> Result<Vec<String>, StoreError> {
        Ok(Vec::new())
    }

    async fn load(
        &self,
        _collection: Collection,
        _id: &str,
    ) -> Result<Option<serde_json::Value>, StoreError> {
        Ok(None)
    }

    async fn save(
        &self,
        _collection: Collection,
        _id: &str,
        _document: &serde_json::Value,
    ) -> Result<(), StoreError> {
        Ok(())
    }
}
