use async_trait::async_trait;
use chrono::Utc;
use dashmap::{mapref::entry::Entry, DashMap};
use models::{Layer, Store, StoreKey, StorePatch};

use super::{Catalog, WorkspaceEntry};
use crate::errors::ServiceError;

/// In-process catalog. Each workspace lives in its own `DashMap` entry, so
/// writers of one workspace are serialized by the shard lock while other
/// workspaces proceed independently.
#[derive(Default)]
pub struct MemoryCatalog {
    workspaces: DashMap<String, WorkspaceEntry>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience for tests and seeding: a catalog with the given workspaces.
    pub fn with_workspaces<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let catalog = Self::new();
        for name in names {
            catalog.workspaces.entry(name.into()).or_default();
        }
        catalog
    }

    fn with_entry_mut<R>(
        &self,
        workspace: &str,
        f: impl FnOnce(&mut WorkspaceEntry) -> Result<R, ServiceError>,
    ) -> Result<R, ServiceError> {
        let mut entry = self
            .workspaces
            .get_mut(workspace)
            .ok_or_else(|| ServiceError::no_such_workspace(workspace))?;
        f(entry.value_mut())
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn workspace_exists(&self, workspace: &str) -> Result<bool, ServiceError> {
        Ok(self.workspaces.contains_key(workspace))
    }

    async fn add_workspace(&self, workspace: &str) -> Result<bool, ServiceError> {
        match self.workspaces.entry(workspace.to_string()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(WorkspaceEntry::default());
                Ok(true)
            }
        }
    }

    async fn list_stores(&self, workspace: &str) -> Result<Vec<Store>, ServiceError> {
        self.workspaces
            .get(workspace)
            .map(|e| e.stores.clone())
            .ok_or_else(|| ServiceError::no_such_workspace(workspace))
    }

    async fn get_store(&self, key: &StoreKey) -> Result<Option<Store>, ServiceError> {
        Ok(self
            .workspaces
            .get(&key.workspace)
            .and_then(|e| e.find(&key.name).cloned()))
    }

    async fn add_store(&self, store: Store) -> Result<(), ServiceError> {
        let workspace = store.workspace.clone();
        self.with_entry_mut(&workspace, |e| e.insert(store))
    }

    async fn update_store(&self, key: &StoreKey, patch: &StorePatch) -> Result<Store, ServiceError> {
        self.with_entry_mut(&key.workspace, |e| e.update(key, patch, Utc::now()))
            .map_err(|e| match e {
                ServiceError::NotFound(_) => ServiceError::no_such_store(key),
                other => other,
            })
    }

    async fn remove_store(&self, key: &StoreKey, recurse: bool) -> Result<bool, ServiceError> {
        match self.workspaces.get_mut(&key.workspace) {
            Some(mut entry) => entry.remove(key, recurse),
            None => Ok(false),
        }
    }

    async fn list_layers(&self, key: &StoreKey) -> Result<Vec<Layer>, ServiceError> {
        self.workspaces
            .get(&key.workspace)
            .ok_or_else(|| ServiceError::no_such_store(key))?
            .layers_of(key)
    }

    async fn add_layer(&self, key: &StoreKey, layer: Layer) -> Result<(), ServiceError> {
        self.with_entry_mut(&key.workspace, |e| e.add_layer(key, layer))
    }
}
