use std::net::SocketAddr;
use std::sync::Arc;

use configs::{AppConfig, CatalogBackend};
use reqwest::StatusCode as HttpStatusCode;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use uuid::Uuid;

struct TestApp {
    base_url: String,
    catalog_path: std::path::PathBuf,
}

async fn start_server(catalog_path: std::path::PathBuf) -> anyhow::Result<TestApp> {
    let mut cfg = AppConfig::default();
    cfg.catalog.backend = CatalogBackend::File;
    cfg.catalog.path = catalog_path.clone();
    cfg.catalog.workspaces = vec!["sf".into()];
    cfg.normalize_and_validate()?;

    let catalog = service::catalog::open(&cfg.catalog).await?;
    let app = server::build_app(Arc::clone(&catalog), &cfg);

    let listener = TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0)).await?;
    let addr: SocketAddr = listener.local_addr()?;
    let base_url = format!("http://{}:{}", addr.ip(), addr.port());

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            eprintln!("server error: {}", e);
        }
    });

    Ok(TestApp { base_url, catalog_path })
}

#[tokio::test]
async fn file_backed_lifecycle_over_http() -> anyhow::Result<()> {
    let path = std::env::temp_dir().join(format!("catalog_e2e_{}", Uuid::new_v4())).join("catalog.json");
    let app = start_server(path.clone()).await?;
    let client = reqwest::Client::new();
    let stores = format!("{}/rest/workspaces/sf/wmsstores", app.base_url);

    let res = client
        .post(&stores)
        .json(&json!({"wmsStore": {"name": "demo", "capabilitiesURL": "http://demo.opengeo.org/geoserver/wms?"}}))
        .send()
        .await?;
    assert_eq!(res.status(), HttpStatusCode::CREATED);
    assert!(res.headers()["location"].to_str()?.ends_with("/workspaces/sf/wmsstores/demo"));

    let res = client
        .put(format!("{stores}/demo"))
        .json(&json!({"wmsStore": {"enabled": false}}))
        .send()
        .await?;
    assert_eq!(res.status(), HttpStatusCode::OK);

    let body: Value = client.get(format!("{stores}/demo.json")).send().await?.json().await?;
    assert_eq!(body["wmsStore"]["enabled"], false);
    assert_eq!(body["wmsStore"]["maxConnections"], 6);

    // a second server over the same file sees the persisted state
    let again = start_server(app.catalog_path.clone()).await?;
    let res = client
        .get(format!("{}/rest/workspaces/sf/wmsstores/demo.xml", again.base_url))
        .send()
        .await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    assert!(res.text().await?.contains("<enabled>false</enabled>"));

    let res = client.delete(format!("{stores}/demo")).send().await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    let res = client.delete(format!("{stores}/demo")).send().await?;
    assert_eq!(res.status(), HttpStatusCode::NOT_FOUND);

    if let Some(dir) = path.parent() {
        let _ = tokio::fs::remove_dir_all(dir).await;
    }
    Ok(())
}
