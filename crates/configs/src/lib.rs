use std::path::PathBuf;

use anyhow::anyhow;
use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub rest: RestConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub store_defaults: StoreDefaults,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub worker_threads: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".into(), port: 8080, worker_threads: Some(4) }
    }
}

/// Where the REST resources are mounted and how `Location` headers are built.
#[derive(Debug, Clone, Deserialize)]
pub struct RestConfig {
    #[serde(default = "default_base_path")]
    pub base_path: String,
    /// Absolute prefix such as `http://localhost:8080`; relative locations when absent.
    #[serde(default)]
    pub public_url: Option<String>,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self { base_path: default_base_path(), public_url: None }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CatalogBackend {
    #[default]
    File,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    #[serde(default)]
    pub backend: CatalogBackend,
    #[serde(default = "default_catalog_path")]
    pub path: PathBuf,
    /// Workspaces created on startup when missing.
    #[serde(default = "default_workspaces")]
    pub workspaces: Vec<String>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            backend: CatalogBackend::default(),
            path: default_catalog_path(),
            workspaces: default_workspaces(),
        }
    }
}

/// Connection pool settings applied to stores created without them.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct StoreDefaults {
    #[serde(default = "default_max_connections")]
    pub max_connections: i32,
    #[serde(default = "default_read_timeout")]
    pub read_timeout: i32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: i32,
    #[serde(default = "default_use_connection_pooling")]
    pub use_connection_pooling: bool,
}

impl Default for StoreDefaults {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            read_timeout: default_read_timeout(),
            connect_timeout: default_connect_timeout(),
            use_connection_pooling: default_use_connection_pooling(),
        }
    }
}

fn default_base_path() -> String { "/rest".into() }
fn default_catalog_path() -> PathBuf { PathBuf::from("data/catalog.json") }
fn default_workspaces() -> Vec<String> { vec!["sf".into()] }
fn default_max_connections() -> i32 { 6 }
fn default_read_timeout() -> i32 { 60 }
fn default_connect_timeout() -> i32 { 30 }
fn default_use_connection_pooling() -> bool { true }

pub fn load_default() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    load_from_file(&path)
}

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    parse(&content)
}

pub fn parse(content: &str) -> Result<AppConfig> {
    let cfg: AppConfig = toml::from_str(content)?;
    Ok(cfg)
}

impl AppConfig {
    pub fn load_and_validate() -> Result<Self> {
        let mut cfg = load_default()?;
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    /// Config file if readable, otherwise defaults overlaid with environment variables.
    pub fn load_or_env() -> Result<Self> {
        let mut cfg = match load_default() {
            Ok(cfg) => cfg,
            Err(_) => AppConfig::from_env(),
        };
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    pub fn from_env() -> Self {
        let mut cfg = AppConfig::default();
        if let Ok(host) = std::env::var("SERVER_HOST") {
            cfg.server.host = host;
        }
        if let Some(port) = std::env::var("SERVER_PORT").ok().and_then(|p| p.parse::<u16>().ok()) {
            cfg.server.port = port;
        }
        if let Some(w) = std::env::var("TOKIO_WORKER_THREADS").ok().and_then(|v| v.parse::<usize>().ok()) {
            cfg.server.worker_threads = Some(w);
        }
        if let Ok(path) = std::env::var("CATALOG_PATH") {
            cfg.catalog.path = PathBuf::from(path);
        }
        cfg
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.server.normalize()?;
        self.rest.normalize()?;
        self.catalog.validate()?;
        self.store_defaults.validate()?;
        Ok(())
    }
}

impl ServerConfig {
    fn normalize(&mut self) -> Result<()> {
        if self.host.trim().is_empty() {
            self.host = "127.0.0.1".to_string();
        }
        if self.port == 0 {
            return Err(anyhow!("server.port must be within 1..=65535"));
        }
        match self.worker_threads {
            Some(0) | None => self.worker_threads = Some(4),
            Some(_) => {}
        }
        Ok(())
    }
}

impl RestConfig {
    fn normalize(&mut self) -> Result<()> {
        let trimmed = self.base_path.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            self.base_path = String::new();
        } else if trimmed.starts_with('/') {
            self.base_path = trimmed.to_string();
        } else {
            return Err(anyhow!("rest.base_path must start with '/'"));
        }
        if let Some(url) = &self.public_url {
            let lower = url.to_lowercase();
            if !(lower.starts_with("http://") || lower.starts_with("https://")) {
                return Err(anyhow!("rest.public_url must start with http(s)"));
            }
            self.public_url = Some(url.trim_end_matches('/').to_string());
        }
        Ok(())
    }
}

impl CatalogConfig {
    fn validate(&self) -> Result<()> {
        if self.backend == CatalogBackend::File && self.path.as_os_str().is_empty() {
            return Err(anyhow!("catalog.path is empty; set it in config.toml or CATALOG_PATH"));
        }
        if self.workspaces.iter().any(|w| w.trim().is_empty()) {
            return Err(anyhow!("catalog.workspaces must not contain blank names"));
        }
        Ok(())
    }
}

impl StoreDefaults {
    fn validate(&self) -> Result<()> {
        if self.max_connections < 1 {
            return Err(anyhow!("store_defaults.max_connections must be >= 1"));
        }
        if self.read_timeout < 0 || self.connect_timeout < 0 {
            return Err(anyhow!("store_defaults timeouts must be non-negative seconds"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let mut cfg = parse("").unwrap();
        cfg.normalize_and_validate().unwrap();
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.rest.base_path, "/rest");
        assert_eq!(cfg.catalog.backend, CatalogBackend::File);
        assert_eq!(cfg.catalog.workspaces, vec!["sf".to_string()]);
        assert_eq!(cfg.store_defaults, StoreDefaults::default());
        assert_eq!(cfg.store_defaults.max_connections, 6);
    }

    #[test]
    fn sections_are_parsed() {
        let mut cfg = parse(
            r#"
            [server]
            host = "0.0.0.0"
            port = 9090
            worker_threads = 0

            [rest]
            base_path = "/geoserver/rest/"
            public_url = "http://localhost:9090/"

            [catalog]
            backend = "memory"
            workspaces = ["sf", "topp"]

            [store_defaults]
            max_connections = 10
            "#,
        )
        .unwrap();
        cfg.normalize_and_validate().unwrap();
        assert_eq!(cfg.server.worker_threads, Some(4));
        assert_eq!(cfg.rest.base_path, "/geoserver/rest");
        assert_eq!(cfg.rest.public_url.as_deref(), Some("http://localhost:9090"));
        assert_eq!(cfg.catalog.backend, CatalogBackend::Memory);
        assert_eq!(cfg.catalog.workspaces.len(), 2);
        assert_eq!(cfg.store_defaults.max_connections, 10);
        assert_eq!(cfg.store_defaults.read_timeout, 60);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut cfg = parse("[rest]\nbase_path = \"rest\"\n").unwrap();
        assert!(cfg.normalize_and_validate().is_err());

        let mut cfg = parse("[store_defaults]\nmax_connections = 0\n").unwrap();
        assert!(cfg.normalize_and_validate().is_err());

        let mut cfg = parse("[catalog]\nworkspaces = [\" \"]\n").unwrap();
        assert!(cfg.normalize_and_validate().is_err());
    }
}
