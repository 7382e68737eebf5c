use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::ModelError;

/// Store type reported in every representation.
pub const WMS_STORE_TYPE: &str = "WMS";

/// Identity of a store: `(workspace, name)`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StoreKey {
    pub workspace: String,
    pub name: String,
}

impl StoreKey {
    pub fn new(workspace: impl Into<String>, name: impl Into<String>) -> Self {
        Self { workspace: workspace.into(), name: name.into() }
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.workspace, self.name)
    }
}

/// A WMS store: connection settings for a remote map service, scoped to a workspace.
///
/// `workspace` and `name` never change after creation; everything else is
/// mutated through [`crate::patch::StorePatch`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Store {
    pub workspace: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub capabilities_url: String,
    pub enabled: bool,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    pub max_connections: i32,
    pub read_timeout: i32,
    pub connect_timeout: i32,
    pub use_connection_pooling: bool,
    pub date_created: DateTime<Utc>,
    #[serde(default)]
    pub date_modified: Option<DateTime<Utc>>,
}

impl Store {
    pub fn key(&self) -> StoreKey {
        StoreKey::new(self.workspace.clone(), self.name.clone())
    }

    pub fn store_type(&self) -> &'static str {
        WMS_STORE_TYPE
    }
}

/// A layer published from a store. Only enumerated by the REST resource.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layer {
    pub name: String,
    #[serde(default)]
    pub native_name: Option<String>,
}

impl Layer {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), native_name: None }
    }
}

const RESERVED_SUFFIXES: [&str; 4] = ["xml", "json", "html", "htm"];

pub fn validate_name(field: &str, value: &str) -> Result<(), ModelError> {
    if value.trim().is_empty() {
        return Err(ModelError::Validation(format!("{field} must not be empty")));
    }
    if value.contains('/') {
        return Err(ModelError::Validation(format!("{field} must not contain '/'")));
    }
    // 资源路径里的 .xml/.json/.html 后缀会被当作格式扩展名
    if let Some((_, ext)) = value.rsplit_once('.') {
        if RESERVED_SUFFIXES.iter().any(|r| ext.eq_ignore_ascii_case(r)) {
            return Err(ModelError::Validation(format!(
                "{field} must not end with .{ext}, it is read as a format extension"
            )));
        }
    }
    Ok(())
}

pub fn validate_capabilities_url(u: &str) -> Result<(), ModelError> {
    let trimmed = u.trim();
    if trimmed.is_empty() {
        return Err(ModelError::Validation("capabilitiesURL must not be empty".into()));
    }
    let lower = trimmed.to_ascii_lowercase();
    if !(lower.starts_with("http://") || lower.starts_with("https://")) {
        return Err(ModelError::Validation("capabilitiesURL must start with http(s)".into()));
    }
    Ok(())
}

pub fn validate_pool_settings(store: &Store) -> Result<(), ModelError> {
    if store.max_connections < 0 {
        return Err(ModelError::Validation("maxConnections must be non-negative".into()));
    }
    if store.read_timeout < 0 || store.connect_timeout < 0 {
        return Err(ModelError::Validation("timeouts must be non-negative".into()));
    }
    Ok(())
}
