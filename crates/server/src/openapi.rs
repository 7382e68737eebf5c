use serde::Serialize;
use utoipa::OpenApi;
use utoipa::ToSchema;

#[derive(ToSchema)]
pub struct HealthResponse { pub status: String }

#[derive(Serialize, ToSchema)]
pub struct WorkspaceRefDoc { pub name: String, pub href: String }

/// Store representation; XML uses the same element names under `<wmsStore>`.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WmsStoreDoc {
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub store_type: String,
    pub enabled: bool,
    pub workspace: WorkspaceRefDoc,
    #[serde(rename = "capabilitiesURL")]
    pub capabilities_url: String,
    pub user: Option<String>,
    pub max_connections: i32,
    pub read_timeout: i32,
    pub connect_timeout: i32,
    pub use_connection_pooling: bool,
    pub date_created: String,
    pub date_modified: Option<String>,
}

/// Request body for create and update; every field is optional on update.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WmsStoreInputDoc {
    pub name: Option<String>,
    pub workspace: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "capabilitiesURL")]
    pub capabilities_url: Option<String>,
    pub enabled: Option<bool>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub max_connections: Option<i32>,
    pub read_timeout: Option<i32>,
    pub connect_timeout: Option<i32>,
    pub use_connection_pooling: Option<bool>,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health,
        crate::routes::list_stores,
        crate::routes::create_store,
        crate::routes::get_store,
        crate::routes::update_store,
        crate::routes::delete_store,
    ),
    components(
        schemas(
            HealthResponse,
            WorkspaceRefDoc,
            WmsStoreDoc,
            WmsStoreInputDoc,
        )
    ),
    tags(
        (name = "health"),
        (name = "wmsstores")
    )
)]
pub struct ApiDoc;

/// The document with store paths placed under the configured REST base path.
pub fn document(base_path: &str) -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    let paths = std::mem::take(&mut doc.paths.paths);
    doc.paths.paths = paths
        .into_iter()
        .map(|(path, item)| {
            if path.starts_with("/workspaces/") {
                (format!("{base_path}{path}"), item)
            } else {
                (path, item)
            }
        })
        .collect();
    doc
}
