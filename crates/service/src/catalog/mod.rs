//! Catalog of WMS stores keyed by `(workspace, name)`.
//!
//! The REST resource only talks to the [`Catalog`] trait; backends decide how
//! entries are kept. Both backends hold one [`WorkspaceEntry`] per workspace
//! and mutate it under a per-workspace (memory) or per-catalog (file) lock, so
//! the read-merge-write of an update is never interleaved with another writer
//! of the same key.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use configs::{CatalogBackend, CatalogConfig};
use models::{Layer, Store, StoreKey, StorePatch};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::ServiceError;

pub mod file;
pub mod memory;

pub use file::FileCatalog;
pub use memory::MemoryCatalog;

#[async_trait]
pub trait Catalog: Send + Sync {
    async fn workspace_exists(&self, workspace: &str) -> Result<bool, ServiceError>;
    /// Create an empty workspace; returns false when it already existed.
    async fn add_workspace(&self, workspace: &str) -> Result<bool, ServiceError>;
    /// Stores of a workspace in insertion order.
    async fn list_stores(&self, workspace: &str) -> Result<Vec<Store>, ServiceError>;
    async fn get_store(&self, key: &StoreKey) -> Result<Option<Store>, ServiceError>;
    /// Insert a new store; `Conflict` when the key is taken.
    async fn add_store(&self, store: Store) -> Result<(), ServiceError>;
    /// Merge `patch` onto the stored entity atomically and return the result.
    async fn update_store(&self, key: &StoreKey, patch: &StorePatch) -> Result<Store, ServiceError>;
    /// Remove a store. With dependent layers this fails with `NotEmpty`
    /// unless `recurse` is set, in which case the layers go too.
    async fn remove_store(&self, key: &StoreKey, recurse: bool) -> Result<bool, ServiceError>;
    async fn list_layers(&self, key: &StoreKey) -> Result<Vec<Layer>, ServiceError>;
    async fn add_layer(&self, key: &StoreKey, layer: Layer) -> Result<(), ServiceError>;
}

/// Everything a workspace owns.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceEntry {
    #[serde(default)]
    pub stores: Vec<Store>,
    /// store name -> layers published from it
    #[serde(default)]
    pub layers: BTreeMap<String, Vec<Layer>>,
}

impl WorkspaceEntry {
    pub fn find(&self, name: &str) -> Option<&Store> {
        self.stores.iter().find(|s| s.name == name)
    }

    pub fn insert(&mut self, store: Store) -> Result<(), ServiceError> {
        if self.find(&store.name).is_some() {
            return Err(ServiceError::Conflict(format!(
                "Store '{}' already exists in workspace '{}'",
                store.name, store.workspace
            )));
        }
        self.stores.push(store);
        Ok(())
    }

    pub fn update(&mut self, key: &StoreKey, patch: &StorePatch, now: DateTime<Utc>) -> Result<Store, ServiceError> {
        let slot = self
            .stores
            .iter_mut()
            .find(|s| s.name == key.name)
            .ok_or_else(|| ServiceError::no_such_store(key))?;
        let merged = patch.apply_to(slot, now)?;
        *slot = merged.clone();
        Ok(merged)
    }

    pub fn remove(&mut self, key: &StoreKey, recurse: bool) -> Result<bool, ServiceError> {
        let Some(idx) = self.stores.iter().position(|s| s.name == key.name) else {
            return Ok(false);
        };
        let dependents = self.layers.get(&key.name).map(Vec::len).unwrap_or(0);
        if dependents > 0 && !recurse {
            return Err(ServiceError::NotEmpty(format!(
                "Store '{}' not empty: {} dependent layer(s), use recurse=true to remove them",
                key.name, dependents
            )));
        }
        self.stores.remove(idx);
        self.layers.remove(&key.name);
        Ok(true)
    }

    pub fn layers_of(&self, key: &StoreKey) -> Result<Vec<Layer>, ServiceError> {
        if self.find(&key.name).is_none() {
            return Err(ServiceError::no_such_store(key));
        }
        Ok(self.layers.get(&key.name).cloned().unwrap_or_default())
    }

    pub fn add_layer(&mut self, key: &StoreKey, layer: Layer) -> Result<(), ServiceError> {
        if self.find(&key.name).is_none() {
            return Err(ServiceError::no_such_store(key));
        }
        let layers = self.layers.entry(key.name.clone()).or_default();
        if layers.iter().any(|l| l.name == layer.name) {
            return Err(ServiceError::Conflict(format!("Layer '{}' already exists", layer.name)));
        }
        layers.push(layer);
        Ok(())
    }
}

/// Open the backend selected in config and make sure the seed workspaces exist.
pub async fn open(cfg: &CatalogConfig) -> Result<Arc<dyn Catalog>, ServiceError> {
    let catalog: Arc<dyn Catalog> = match cfg.backend {
        CatalogBackend::Memory => Arc::new(MemoryCatalog::new()),
        CatalogBackend::File => Arc::new(FileCatalog::open(&cfg.path).await?),
    };
    for ws in &cfg.workspaces {
        if catalog.add_workspace(ws).await? {
            info!(workspace = %ws, "seeded workspace");
        }
    }
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use configs::StoreDefaults;

    fn store(name: &str) -> Store {
        StorePatch {
            name: Some(name.into()),
            capabilities_url: Some("http://somehost/wms?".into()),
            ..Default::default()
        }
        .into_new_store("sf", &StoreDefaults::default(), Utc::now())
        .unwrap()
    }

    #[test]
    fn entry_rejects_duplicates_and_keeps_order() {
        let mut entry = WorkspaceEntry::default();
        entry.insert(store("b")).unwrap();
        entry.insert(store("a")).unwrap();
        assert!(matches!(entry.insert(store("a")), Err(ServiceError::Conflict(_))));
        let names: Vec<_> = entry.stores.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["b", "a"]);
    }

    #[test]
    fn entry_guards_dependent_layers() {
        let mut entry = WorkspaceEntry::default();
        entry.insert(store("demo")).unwrap();
        let key = StoreKey::new("sf", "demo");
        entry.add_layer(&key, Layer::new("states")).unwrap();
        assert!(matches!(entry.remove(&key, false), Err(ServiceError::NotEmpty(_))));
        assert!(entry.find("demo").is_some());
        assert!(entry.remove(&key, true).unwrap());
        assert!(entry.layers.is_empty());
        assert!(!entry.remove(&key, true).unwrap());
    }

    #[tokio::test]
    async fn open_memory_seeds_workspaces() -> Result<(), anyhow::Error> {
        let cfg = CatalogConfig {
            backend: CatalogBackend::Memory,
            workspaces: vec!["sf".into(), "topp".into()],
            ..Default::default()
        };
        let catalog = open(&cfg).await?;
        assert!(catalog.workspace_exists("sf").await?);
        assert!(catalog.workspace_exists("topp").await?);
        assert!(!catalog.workspace_exists("gs").await?);
        Ok(())
    }
}
