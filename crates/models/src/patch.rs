//! Presence-tracked store changes decoded from a request body.
//!
//! `None` means the field was absent from the request and must be left alone.
//! Nullable text fields use a nested option: `Some(None)` clears the value.

use chrono::{DateTime, Utc};
use configs::StoreDefaults;

use crate::errors::ModelError;
use crate::store::{validate_capabilities_url, validate_name, validate_pool_settings, Store, StoreKey};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StorePatch {
    pub name: Option<String>,
    pub workspace: Option<String>,
    pub description: Option<Option<String>>,
    pub capabilities_url: Option<String>,
    pub enabled: Option<bool>,
    pub user: Option<Option<String>>,
    pub password: Option<Option<String>>,
    pub max_connections: Option<i32>,
    pub read_timeout: Option<i32>,
    pub connect_timeout: Option<i32>,
    pub use_connection_pooling: Option<bool>,
}

impl StorePatch {
    /// Reject a patch that would rename the store or move it to another workspace.
    ///
    /// Repeating the current name or workspace is not a change.
    pub fn check_identity(&self, key: &StoreKey) -> Result<(), ModelError> {
        if let Some(name) = &self.name {
            if name != &key.name {
                return Err(ModelError::Immutable("Can't change the name of a store.".into()));
            }
        }
        if let Some(ws) = &self.workspace {
            if ws != &key.workspace {
                return Err(ModelError::Immutable("Can't change the workspace of a store.".into()));
            }
        }
        Ok(())
    }

    /// Merge the present fields onto a copy of `current`.
    pub fn apply_to(&self, current: &Store, now: DateTime<Utc>) -> Result<Store, ModelError> {
        self.check_identity(&current.key())?;
        let mut next = current.clone();
        if let Some(v) = &self.description {
            next.description = non_blank(v.clone());
        }
        if let Some(url) = &self.capabilities_url {
            validate_capabilities_url(url)?;
            next.capabilities_url = url.trim().to_string();
        }
        if let Some(v) = self.enabled {
            next.enabled = v;
        }
        if let Some(v) = &self.user {
            next.user = non_blank(v.clone());
        }
        if let Some(v) = &self.password {
            next.password = v.clone();
        }
        if let Some(v) = self.max_connections {
            next.max_connections = v;
        }
        if let Some(v) = self.read_timeout {
            next.read_timeout = v;
        }
        if let Some(v) = self.connect_timeout {
            next.connect_timeout = v;
        }
        if let Some(v) = self.use_connection_pooling {
            next.use_connection_pooling = v;
        }
        validate_pool_settings(&next)?;
        next.date_modified = Some(now);
        Ok(next)
    }

    /// Build a brand new store in `workspace`; absent settings fall back to `defaults`.
    pub fn into_new_store(
        self,
        workspace: &str,
        defaults: &StoreDefaults,
        now: DateTime<Utc>,
    ) -> Result<Store, ModelError> {
        let name = self
            .name
            .ok_or_else(|| ModelError::Validation("Store name is required".into()))?;
        validate_name("name", &name)?;
        let capabilities_url = self
            .capabilities_url
            .ok_or_else(|| ModelError::Validation("capabilitiesURL is required".into()))?;
        validate_capabilities_url(&capabilities_url)?;

        let store = Store {
            workspace: workspace.to_string(),
            name,
            description: self.description.flatten().and_then(|d| non_blank(Some(d))),
            capabilities_url: capabilities_url.trim().to_string(),
            enabled: self.enabled.unwrap_or(true),
            user: self.user.flatten().and_then(|u| non_blank(Some(u))),
            password: self.password.flatten(),
            max_connections: self.max_connections.unwrap_or(defaults.max_connections),
            read_timeout: self.read_timeout.unwrap_or(defaults.read_timeout),
            connect_timeout: self.connect_timeout.unwrap_or(defaults.connect_timeout),
            use_connection_pooling: self
                .use_connection_pooling
                .unwrap_or(defaults.use_connection_pooling),
            date_created: now,
            date_modified: None,
        };
        validate_pool_settings(&store)?;
        Ok(store)
    }
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.trim().is_empty())
}
