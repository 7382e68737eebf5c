//! REST resource logic for WMS stores.
//!
//! [`StoreResource`] turns a parsed request (verb, target, decoded body, query
//! flags) into a [`StoreOutcome`] or a [`StoreError`]. It owns no state besides
//! the injected catalog; HTTP concerns such as status codes and bodies are
//! derived from these two types by the server crate.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use configs::StoreDefaults;
use models::{Layer, ModelError, Store, StoreKey, StorePatch};
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::catalog::Catalog;
use crate::errors::ServiceError;

/// HTTP verbs the resource understands; anything else is rejected up front.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verb {
    Get,
    Post,
    Put,
    Delete,
    Other(&'static str),
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Delete => "DELETE",
            Verb::Other(m) => *m,
        }
    }

    pub fn carries_body(&self) -> bool {
        matches!(self, Verb::Post | Verb::Put)
    }
}

/// What the request path addresses.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    /// `/workspaces/{ws}/wmsstores`
    Collection { workspace: String },
    /// `/workspaces/{ws}/wmsstores/{name}`
    Item(StoreKey),
}

impl Target {
    pub fn allowed(&self) -> &'static [&'static str] {
        match self {
            Target::Collection { .. } => &["GET", "POST"],
            Target::Item(_) => &["GET", "PUT", "DELETE"],
        }
    }

    pub fn allows(&self, verb: Verb) -> bool {
        self.allowed().contains(&verb.as_str())
    }

    pub fn workspace(&self) -> &str {
        match self {
            Target::Collection { workspace } => workspace,
            Target::Item(key) => &key.workspace,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Collection { workspace } => write!(f, "/workspaces/{workspace}/wmsstores"),
            Target::Item(key) => write!(f, "/workspaces/{}/wmsstores/{}", key.workspace, key.name),
        }
    }
}

/// Request-scoped query flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueryFlags {
    /// Answer a missing store with a bare 404 instead of an error message.
    pub quiet_on_not_found: bool,
    /// Delete dependent layers together with the store.
    pub recurse: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum StoreOutcome {
    Collection { workspace: String, stores: Vec<Store> },
    Found { store: Store, layers: Vec<Layer> },
    Created(StoreKey),
    Updated(StoreKey),
    Deleted(StoreKey),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("{message}")]
    NotFound { message: String, quiet: bool },
    #[error("{0}")]
    Forbidden(String),
    #[error("{method} not supported on {target}")]
    MethodNotSupported { method: &'static str, target: String, allow: &'static [&'static str] },
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("catalog failure: {0}")]
    Catalog(String),
}

impl StoreError {
    pub fn no_such_store(key: &StoreKey, quiet: bool) -> Self {
        StoreError::NotFound { message: format!("No such wms store: {key}"), quiet }
    }
}

impl From<ServiceError> for StoreError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::NotFound(message) => StoreError::NotFound { message, quiet: false },
            ServiceError::Conflict(msg) => StoreError::Conflict(msg),
            ServiceError::NotEmpty(msg) => StoreError::Forbidden(msg),
            ServiceError::Validation(msg) => StoreError::Validation(msg),
            ServiceError::Model(ModelError::Validation(msg)) => StoreError::Validation(msg),
            ServiceError::Model(ModelError::Immutable(msg)) => StoreError::Forbidden(msg),
            ServiceError::Db(msg) => StoreError::Catalog(msg),
        }
    }
}

impl From<ModelError> for StoreError {
    fn from(e: ModelError) -> Self {
        ServiceError::Model(e).into()
    }
}

/// Handler for the `wmsstores` resource.
pub struct StoreResource {
    catalog: Arc<dyn Catalog>,
    defaults: StoreDefaults,
}

impl StoreResource {
    pub fn new(catalog: Arc<dyn Catalog>, defaults: StoreDefaults) -> Self {
        Self { catalog, defaults }
    }

    pub fn catalog(&self) -> &Arc<dyn Catalog> {
        &self.catalog
    }

    /// Single entry point used by the HTTP layer.
    ///
    /// Verb/target combinations outside [`Target::allowed`] fail with
    /// `MethodNotSupported` before the body is looked at.
    pub async fn handle(
        &self,
        verb: Verb,
        target: Target,
        body: Option<StorePatch>,
        flags: QueryFlags,
    ) -> Result<StoreOutcome, StoreError> {
        Self::check_method(verb, &target)?;
        match (verb, target) {
            (Verb::Get, Target::Collection { workspace }) => self.list(&workspace).await,
            (Verb::Post, Target::Collection { workspace }) => {
                self.create(&workspace, require_body(body)?).await
            }
            (Verb::Get, Target::Item(key)) => self.get(&key, flags.quiet_on_not_found).await,
            (Verb::Put, Target::Item(key)) => self.update(&key, require_body(body)?).await,
            (Verb::Delete, Target::Item(key)) => self.delete(&key, flags.recurse).await,
            (verb, target) => Err(method_not_supported(verb, &target)),
        }
    }

    pub fn check_method(verb: Verb, target: &Target) -> Result<(), StoreError> {
        if target.allows(verb) {
            Ok(())
        } else {
            warn!(method = verb.as_str(), %target, "method not supported");
            Err(method_not_supported(verb, target))
        }
    }

    /// 列出工作区下所有 store
    #[instrument(skip(self))]
    pub async fn list(&self, workspace: &str) -> Result<StoreOutcome, StoreError> {
        let stores = self.catalog.list_stores(workspace).await.map_err(catalog_err)?;
        debug!(count = stores.len(), "listed wms stores");
        Ok(StoreOutcome::Collection { workspace: workspace.to_string(), stores })
    }

    #[instrument(skip(self), fields(store = %key))]
    pub async fn get(&self, key: &StoreKey, quiet_on_not_found: bool) -> Result<StoreOutcome, StoreError> {
        match self.catalog.get_store(key).await.map_err(catalog_err)? {
            Some(store) => {
                let layers = self.catalog.list_layers(key).await.map_err(catalog_err)?;
                Ok(StoreOutcome::Found { store, layers })
            }
            None => {
                debug!(quiet = quiet_on_not_found, "wms store not found");
                Err(StoreError::no_such_store(key, quiet_on_not_found))
            }
        }
    }

    #[instrument(skip(self, body))]
    pub async fn create(&self, workspace: &str, body: StorePatch) -> Result<StoreOutcome, StoreError> {
        if !self.catalog.workspace_exists(workspace).await.map_err(catalog_err)? {
            return Err(ServiceError::no_such_workspace(workspace).into());
        }
        if let Some(ws) = &body.workspace {
            if ws != workspace {
                warn!(expected = %workspace, given = %ws, "create rejected: workspace mismatch");
                return Err(StoreError::Forbidden(format!(
                    "Expected workspace {workspace} but client specified {ws}"
                )));
            }
        }
        let store = body.into_new_store(workspace, &self.defaults, Utc::now())?;
        let key = store.key();
        self.catalog.add_store(store).await.map_err(catalog_err)?;
        info!(store = %key, "created wms store");
        Ok(StoreOutcome::Created(key))
    }

    /// Non-destructive partial update; identity fields are compared against
    /// the path before the catalog sees any write.
    #[instrument(skip(self, body), fields(store = %key))]
    pub async fn update(&self, key: &StoreKey, body: StorePatch) -> Result<StoreOutcome, StoreError> {
        if self.catalog.get_store(key).await.map_err(catalog_err)?.is_none() {
            return Err(StoreError::no_such_store(key, false));
        }
        if let Err(e) = body.check_identity(key) {
            warn!(reason = %e, "update rejected");
            return Err(e.into());
        }
        self.catalog.update_store(key, &body).await.map_err(catalog_err)?;
        info!("updated wms store");
        Ok(StoreOutcome::Updated(key.clone()))
    }

    #[instrument(skip(self), fields(store = %key))]
    pub async fn delete(&self, key: &StoreKey, recurse: bool) -> Result<StoreOutcome, StoreError> {
        match self.catalog.remove_store(key, recurse).await.map_err(catalog_err)? {
            true => {
                info!(recurse, "deleted wms store");
                Ok(StoreOutcome::Deleted(key.clone()))
            }
            false => Err(StoreError::no_such_store(key, false)),
        }
    }
}

fn require_body(body: Option<StorePatch>) -> Result<StorePatch, StoreError> {
    body.ok_or_else(|| StoreError::Validation("request body is required".into()))
}

fn method_not_supported(verb: Verb, target: &Target) -> StoreError {
    StoreError::MethodNotSupported {
        method: verb.as_str(),
        target: target.to_string(),
        allow: target.allowed(),
    }
}

fn catalog_err(e: ServiceError) -> StoreError {
    if let ServiceError::Db(msg) = &e {
        error!(err = %msg, "catalog call failed");
    }
    e.into()
}
