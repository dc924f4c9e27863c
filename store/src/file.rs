use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs;
use uuid::Uuid;

use crate::{collection::validate_id, Collection, DocumentStore, StoreError};

/// One pretty-printed JSON file per document at `<root>/<collection>/<id>.json`.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collection_dir(&self, collection: Collection) -> PathBuf {
        self.root.join(collection.as_str())
    }

    fn document_path(&self, collection: Collection, id: &str) -> Result<PathBuf, StoreError> {
        validate_id(id)?;
        Ok(self.collection_dir(collection).join(format!("{id}.json")))
    }
}

#[async_trait]
impl DocumentStore for FileStore {
    async fn list_ids(&self, collection: Collection) -> Result<Vec<String>, StoreError> {
        let dir = self.collection_dir(collection);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    async fn load(&self, collection: Collection, id: &str) -> Result<Option<Value>, StoreError> {
        let path = self.document_path(collection, id)?;
        match fs::read_to_string(&path).await {
            Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, collection: Collection, id: &str, document: &Value) -> Result<(), StoreError> {
        let path = self.document_path(collection, id)?;
        fs::create_dir_all(self.collection_dir(collection)).await?;
        let contents = serde_json::to_string_pretty(document)?;
        // write-then-rename so a crash never leaves a half-written document
        let scratch = path.with_extension(format!("{}.tmp", Uuid::new_v4()));
        fs::write(&scratch, contents).await?;
        fs::rename(&scratch, &path).await?;
        tracing::debug!("Saved {collection}/{id} to {}", path.display());
        Ok(())
    }
}
