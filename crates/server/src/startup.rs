use std::{net::SocketAddr, sync::Arc};

use axum::Router;
use configs::AppConfig;
use service::{catalog, Catalog, StoreResource};
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::errors::StartupError;
use crate::openapi;
use crate::representation::Links;
use crate::routes::{self, AppState};

fn build_cors() -> CorsLayer {
    CorsLayer::very_permissive()
}

fn bind_addr(cfg: &AppConfig) -> Result<SocketAddr, StartupError> {
    let raw = format!("{}:{}", cfg.server.host, cfg.server.port);
    raw.parse()
        .map_err(|e| StartupError::InvalidConfig(format!("server address {raw}: {e}")))
}

/// Wire a catalog into the full application router.
pub fn build_app(catalog: Arc<dyn Catalog>, cfg: &AppConfig) -> Router {
    let stores = Arc::new(StoreResource::new(catalog, cfg.store_defaults));
    let links = Arc::new(Links::new(cfg.rest.public_url.as_deref(), &cfg.rest.base_path));
    let api_doc = Arc::new(openapi::document(&cfg.rest.base_path));
    routes::build_router(AppState { stores, links, api_doc }, &cfg.rest.base_path, build_cors())
}

/// Public entry: open the catalog, build the app and run the HTTP server
pub async fn run(cfg: AppConfig) -> Result<(), StartupError> {
    if cfg.catalog.backend == configs::CatalogBackend::File {
        common::env::ensure_data_dir(&cfg.catalog.path).await?;
    }
    let catalog = catalog::open(&cfg.catalog).await?;
    info!(
        backend = ?cfg.catalog.backend,
        path = %cfg.catalog.path.display(),
        workspaces = cfg.catalog.workspaces.len(),
        "catalog opened"
    );

    let app = build_app(catalog, &cfg);

    let addr = bind_addr(&cfg)?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| StartupError::Bind { addr: addr.to_string(), source })?;
    info!(%addr, base_path = %cfg.rest.base_path, "catalog REST server listening");
    axum::serve(listener, app).await.map_err(anyhow::Error::from)?;
    Ok(())
}
