use std::{collections::BTreeMap, path::PathBuf, sync::Arc};
use tokio::{fs, sync::RwLock};

use crate::errors::ServiceError;

/// Generic JSON file-backed ordered map store.
///
/// Persists a `BTreeMap<K, V>` to a JSON file. Every mutation runs under the
/// write lock and is written to disk before the lock is released, so a
/// read-modify-write through [`JsonMapStore::update_map`] is atomic with
/// respect to other writers of the same store.
pub struct JsonMapStore<K, V> {
    inner: RwLock<BTreeMap<K, V>>,
    file_path: PathBuf,
}

impl<K, V> JsonMapStore<K, V>
where
    K: Ord + serde::Serialize + serde::de::DeserializeOwned + Clone,
    V: serde::Serialize + serde::de::DeserializeOwned + Clone,
{
    /// Initialize the store from a path. Creates the file with an empty map if missing.
    pub async fn new<P: Into<PathBuf>>(path: P) -> Result<Arc<Self>, ServiceError> {
        let file_path = path.into();
        if let Some(parent) = file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|e| ServiceError::Db(e.to_string()))?;
        }

        let map: BTreeMap<K, V> = match fs::read(&file_path).await {
            Ok(bytes) if bytes.is_empty() => BTreeMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                ServiceError::Db(format!("corrupt catalog file {}: {e}", file_path.display()))
            })?,
            Err(_) => {
                let empty: BTreeMap<K, V> = BTreeMap::new();
                write_json(&file_path, &empty).await?;
                empty
            }
        };

        Ok(Arc::new(Self { inner: RwLock::new(map), file_path }))
    }

    /// Get value by key.
    pub async fn get(&self, key: &K) -> Option<V> {
        let map = self.inner.read().await;
        map.get(key).cloned()
    }

    /// Borrow the map read-only and compute a value from it.
    pub async fn read_map<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&BTreeMap<K, V>) -> R,
    {
        let map = self.inner.read().await;
        f(&map)
    }

    /// Apply a mutation to a working copy of the map and persist it.
    ///
    /// The in-memory map is only replaced when both the closure and the file
    /// write succeed, so a failed mutation leaves no trace.
    pub async fn update_map<F, R>(&self, f: F) -> Result<R, ServiceError>
    where
        F: FnOnce(&mut BTreeMap<K, V>) -> Result<R, ServiceError>,
    {
        let mut map = self.inner.write().await;
        let mut working = map.clone();
        let out = f(&mut working)?;
        write_json(&self.file_path, &working).await?;
        *map = working;
        Ok(out)
    }
}

/// Write through a sibling temp file and rename, so readers never see a torn file.
async fn write_json<T: serde::Serialize>(path: &PathBuf, value: &T) -> Result<(), ServiceError> {
    let data = serde_json::to_vec_pretty(value).map_err(|e| ServiceError::Db(e.to_string()))?;
    let mut tmp = path.clone().into_os_string();
    tmp.push(".tmp");
    fs::write(&tmp, data).await.map_err(|e| ServiceError::Db(e.to_string()))?;
    fs::rename(&tmp, path).await.map_err(|e| ServiceError::Db(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn json_map_store_crud_persists() -> Result<(), anyhow::Error> {
        let tmp = std::env::temp_dir().join(format!("json_map_store_{}.json", uuid::Uuid::new_v4()));
        let store = JsonMapStore::<String, String>::new(&tmp).await?;

        // initially empty
        assert_eq!(store.read_map(|m| m.len()).await, 0);

        store
            .update_map(|m| {
                m.insert("a".into(), "1".into());
                m.insert("b".into(), "2".into());
                Ok(())
            })
            .await?;
        assert_eq!(store.get(&"a".into()).await.as_deref(), Some("1"));
        assert_eq!(store.read_map(|m| m.len()).await, 2);

        // a failing mutation must not leak partial changes
        let res: Result<(), ServiceError> = store
            .update_map(|m| {
                m.insert("c".into(), "3".into());
                Err(ServiceError::Validation("boom".into()))
            })
            .await;
        assert!(res.is_err());
        assert!(store.get(&"c".into()).await.is_none());

        let removed = store.update_map(|m| Ok(m.remove("b").is_some())).await?;
        assert!(removed);

        let reloaded = JsonMapStore::<String, String>::new(&tmp).await?;
        let entries = reloaded.read_map(|m| m.clone().into_iter().collect::<Vec<_>>()).await;
        assert_eq!(entries, vec![("a".to_string(), "1".to_string())]);

        let _ = tokio::fs::remove_file(&tmp).await;
        Ok(())
    }

    #[tokio::test]
    async fn corrupt_file_is_reported() -> Result<(), anyhow::Error> {
        let tmp = std::env::temp_dir().join(format!("json_map_store_bad_{}.json", uuid::Uuid::new_v4()));
        tokio::fs::write(&tmp, b"{not json").await?;
        let res = JsonMapStore::<String, String>::new(&tmp).await;
        assert!(matches!(res, Err(ServiceError::Db(_))));
        let _ = tokio::fs::remove_file(&tmp).await;
        Ok(())
    }
}
