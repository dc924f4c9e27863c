use store::{load_typed, Collection, DocumentStore, StoreError};
use types::{Catalog, Mode, Target, Theme};

use crate::EngineError;

/// Reads every theme, race mode and target set from `store`. Documents that
/// fail to parse or validate are logged and skipped.
pub async fn load_catalog(store: &dyn DocumentStore) -> Result<Catalog, EngineError> {
    let mut catalog = Catalog::new();

    for id in store.list_ids(Collection::Theme).await? {
        if let Some(theme) = load_document::<Theme>(store, Collection::Theme, &id).await {
            if let Err(err) = catalog.add_theme(theme) {
                log::warn!("Skipping theme {id}: {err}");
            }
        }
    }

    for id in store.list_ids(Collection::Mode).await? {
        if let Some(mode) = load_document::<Mode>(store, Collection::Mode, &id).await {
            if let Err(err) = catalog.add_mode(mode) {
                log::warn!("Skipping race mode {id}: {err}");
            }
        }
    }

    for id in store.list_ids(Collection::Target).await? {
        if let Some(targets) = load_document::<Vec<Target>>(store, Collection::Target, &id).await {
            catalog.add_targets(id, targets);
        }
    }

    log::info!(
        "Catalog loaded: themes [{}], modes [{}]",
        catalog.theme_ids().collect::<Vec<_>>().join(", "),
        catalog.mode_ids().collect::<Vec<_>>().join(", ")
    );
    Ok(catalog)
}

async fn load_document<T: serde::de::DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: Collection,
    id: &str,
) -> Option<T> {
    match load_typed::<T>(store, collection, id).await {
        Ok(found) => found,
        Err(StoreError::Serialization(err)) => {
            log::warn!("Skipping malformed {collection}/{id}: {err}");
            None
        }
        Err(err) => {
            log::warn!("Could not read {collection}/{id}: {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use store::MemoryStore;

    use super::*;

    #[tokio::test]
    async fn loads_valid_documents_and_skips_the_rest() {
        let store = MemoryStore::new();
        store
            .save(
                Collection::Theme,
                "heist",
                &json!({
                    "id": "heist",
                    "good": [{"message": "{} got away", "bonus": 10}],
                    "bad": [{"message": "{} got caught", "result": "Apprehended"}]
                }),
            )
            .await
            .unwrap();
        store
            .save(Collection::Theme, "empty", &json!({"id": "empty", "good": [], "bad": []}))
            .await
            .unwrap();
        store
            .save(Collection::Mode, "broken", &json!({"id": 3}))
            .await
            .unwrap();
        store
            .save(
                Collection::Mode,
                "clash",
                &json!({
                    "id": "clash",
                    "beginning": "|",
                    "ending": "🏁",
                    "characters": [{"emoji": "🐢", "movement": "slow"}]
                }),
            )
            .await
            .unwrap();
        store
            .save(
                Collection::Target,
                "heist",
                &json!([{"name": "Bank", "crew_size": 4, "success": 30, "vault": 100, "vault_max": 100}]),
            )
            .await
            .unwrap();

        let catalog = load_catalog(&store).await.unwrap();
        assert!(catalog.theme("heist").is_ok());
        assert!(catalog.theme("empty").is_err());
        assert!(catalog.mode("clash").is_ok());
        assert!(catalog.mode("broken").is_err());
        assert_eq!(catalog.target_set("heist").unwrap().len(), 1);
    }
}
