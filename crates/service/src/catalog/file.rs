use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use models::{Layer, Store, StoreKey, StorePatch};
use tracing::debug;

use super::{Catalog, WorkspaceEntry};
use crate::errors::ServiceError;
use crate::storage::json_map_store::JsonMapStore;

/// 文件存储：以 JSON 文件持久化整个目录（workspace -> stores + layers）
///
/// Every mutation holds the store's write lock until the file is rewritten.
#[derive(Clone)]
pub struct FileCatalog {
    store: Arc<JsonMapStore<String, WorkspaceEntry>>,
}

impl FileCatalog {
    /// 初始化存储，若文件不存在则创建空文件
    pub async fn open(path: &Path) -> Result<Self, ServiceError> {
        let store = JsonMapStore::<String, WorkspaceEntry>::new(path.to_path_buf()).await?;
        debug!(path = %path.display(), "file catalog opened");
        Ok(Self { store })
    }

    async fn mutate<R>(
        &self,
        workspace: &str,
        f: impl FnOnce(&mut WorkspaceEntry) -> Result<R, ServiceError>,
    ) -> Result<R, ServiceError> {
        self.store
            .update_map(|map| {
                let entry = map
                    .get_mut(workspace)
                    .ok_or_else(|| ServiceError::no_such_workspace(workspace))?;
                f(entry)
            })
            .await
    }
}

#[async_trait]
impl Catalog for FileCatalog {
    async fn workspace_exists(&self, workspace: &str) -> Result<bool, ServiceError> {
        Ok(self.store.read_map(|m| m.contains_key(workspace)).await)
    }

    async fn add_workspace(&self, workspace: &str) -> Result<bool, ServiceError> {
        if self.workspace_exists(workspace).await? {
            return Ok(false);
        }
        self.store
            .update_map(|map| {
                if map.contains_key(workspace) {
                    return Ok(false);
                }
                map.insert(workspace.to_string(), WorkspaceEntry::default());
                Ok(true)
            })
            .await
    }

    async fn list_stores(&self, workspace: &str) -> Result<Vec<Store>, ServiceError> {
        self.store
            .get(&workspace.to_string())
            .await
            .map(|e| e.stores)
            .ok_or_else(|| ServiceError::no_such_workspace(workspace))
    }

    async fn get_store(&self, key: &StoreKey) -> Result<Option<Store>, ServiceError> {
        Ok(self
            .store
            .read_map(|m| m.get(&key.workspace).and_then(|e| e.find(&key.name).cloned()))
            .await)
    }

    async fn add_store(&self, store: Store) -> Result<(), ServiceError> {
        let workspace = store.workspace.clone();
        self.mutate(&workspace, |e| e.insert(store)).await
    }

    async fn update_store(&self, key: &StoreKey, patch: &StorePatch) -> Result<Store, ServiceError> {
        let now = Utc::now();
        self.mutate(&key.workspace, |e| e.update(key, patch, now))
            .await
            .map_err(|e| match e {
                ServiceError::NotFound(_) => ServiceError::no_such_store(key),
                other => other,
            })
    }

    async fn remove_store(&self, key: &StoreKey, recurse: bool) -> Result<bool, ServiceError> {
        if self.get_store(key).await?.is_none() {
            return Ok(false);
        }
        self.mutate(&key.workspace, |e| e.remove(key, recurse))
            .await
            .or_else(|e| match e {
                ServiceError::NotFound(_) => Ok(false),
                other => Err(other),
            })
    }

    async fn list_layers(&self, key: &StoreKey) -> Result<Vec<Layer>, ServiceError> {
        self.store
            .read_map(|m| match m.get(&key.workspace) {
                Some(e) => e.layers_of(key),
                None => Err(ServiceError::no_such_store(key)),
            })
            .await
    }

    async fn add_layer(&self, key: &StoreKey, layer: Layer) -> Result<(), ServiceError> {
        self.mutate(&key.workspace, |e| e.add_layer(key, layer)).await
    }
}
