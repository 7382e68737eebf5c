use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, Method, Uri},
    response::{IntoResponse, Response},
    routing::{get, MethodRouter},
    Json, Router,
};
use models::StoreKey;
use service::{QueryFlags, StoreError, StoreResource, Target, Verb};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{warn, Level};

use common::types::Health;

use crate::observability;
use crate::openapi::{WmsStoreDoc, WmsStoreInputDoc};
use crate::representation::{self, split_extension, Format, Links};
use crate::response::ResponseDescriptor;

#[derive(Clone)]
pub struct AppState {
    pub stores: Arc<StoreResource>,
    pub links: Arc<Links>,
    pub api_doc: Arc<utoipa::openapi::OpenApi>,
}

/// Raw query parameters; never rejected, so a bad flag can't mask 404/405.
type Params = HashMap<String, String>;

/// Boolean request parameter: `true`, `on`, `yes` or `1` in any case, or the
/// bare key, mean true. Anything else is false.
fn flag(params: &Params, key: &str) -> bool {
    match params.get(key).map(|v| v.trim()) {
        None => false,
        Some("") => true,
        Some(v) => ["true", "on", "yes", "1"].iter().any(|t| v.eq_ignore_ascii_case(t)),
    }
}

fn flags_of(params: &Params) -> QueryFlags {
    QueryFlags {
        quiet_on_not_found: flag(params, "quietOnNotFound"),
        recurse: flag(params, "recurse"),
    }
}

#[utoipa::path(get, path = "/health", tag = "health", responses((status = 200, description = "OK")))]
pub async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

async fn metrics() -> (axum::http::StatusCode, String) {
    observability::encode_metrics()
}

async fn openapi_json(State(state): State<AppState>) -> Json<utoipa::openapi::OpenApi> {
    Json(state.api_doc.as_ref().clone())
}

fn verb_of(method: &Method) -> Verb {
    match method.as_str() {
        "GET" | "HEAD" => Verb::Get,
        "POST" => Verb::Post,
        "PUT" => Verb::Put,
        "DELETE" => Verb::Delete,
        "PATCH" => Verb::Other("PATCH"),
        "OPTIONS" => Verb::Other("OPTIONS"),
        "TRACE" => Verb::Other("TRACE"),
        _ => Verb::Other("UNKNOWN"),
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: header::HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Format extension of the last path segment, e.g. `wmsstores.json`.
fn collection_extension(uri: &Uri) -> Option<Format> {
    let last = uri.path().rsplit('/').next().unwrap_or_default();
    split_extension(last).1
}

#[utoipa::path(get, path = "/workspaces/{workspace}/wmsstores", tag = "wmsstores",
    params(("workspace" = String, Path, description = "Workspace name")),
    responses((status = 200, description = "Stores of the workspace"), (status = 404, description = "No such workspace")))]
pub async fn list_stores(
    State(state): State<AppState>,
    Path(workspace): Path<String>,
    Query(params): Query<Params>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let target = Target::Collection { workspace };
    dispatch(&state, Verb::Get, target, collection_extension(&uri), &params, &headers, &[]).await
}

#[utoipa::path(post, path = "/workspaces/{workspace}/wmsstores", tag = "wmsstores",
    params(("workspace" = String, Path, description = "Workspace name")),
    request_body = WmsStoreInputDoc,
    responses(
        (status = 201, description = "Created; Location points at the new store"),
        (status = 400, description = "Missing name/capabilitiesURL or unreadable body"),
        (status = 403, description = "Body names another workspace"),
        (status = 404, description = "No such workspace"),
        (status = 409, description = "Store already exists")
    ))]
pub async fn create_store(
    State(state): State<AppState>,
    Path(workspace): Path<String>,
    Query(params): Query<Params>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let target = Target::Collection { workspace };
    dispatch(&state, Verb::Post, target, collection_extension(&uri), &params, &headers, &body).await
}

/// PUT, DELETE and anything else on the collection.
async fn collection_fallback(
    State(state): State<AppState>,
    Path(workspace): Path<String>,
    Query(params): Query<Params>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let target = Target::Collection { workspace };
    dispatch(&state, verb_of(&method), target, collection_extension(&uri), &params, &headers, &[]).await
}

fn item_target(workspace: String, segment: &str) -> (Target, Option<Format>) {
    let (name, ext) = split_extension(segment);
    (Target::Item(StoreKey::new(workspace, name)), ext)
}

#[utoipa::path(get, path = "/workspaces/{workspace}/wmsstores/{store}", tag = "wmsstores",
    params(
        ("workspace" = String, Path, description = "Workspace name"),
        ("store" = String, Path, description = "Store name, optionally suffixed with .xml or .json"),
        ("quietOnNotFound" = Option<bool>, Query, description = "Empty 404 body when the store is missing")
    ),
    responses((status = 200, description = "Store representation", body = WmsStoreDoc), (status = 404, description = "No such wms store")))]
pub async fn get_store(
    State(state): State<AppState>,
    Path((workspace, segment)): Path<(String, String)>,
    Query(params): Query<Params>,
    headers: HeaderMap,
) -> Response {
    let (target, ext) = item_target(workspace, &segment);
    dispatch(&state, Verb::Get, target, ext, &params, &headers, &[]).await
}

#[utoipa::path(put, path = "/workspaces/{workspace}/wmsstores/{store}", tag = "wmsstores",
    params(
        ("workspace" = String, Path, description = "Workspace name"),
        ("store" = String, Path, description = "Store name")
    ),
    request_body = WmsStoreInputDoc,
    responses(
        (status = 200, description = "Updated; absent fields are left untouched"),
        (status = 403, description = "Attempt to rename or move the store"),
        (status = 404, description = "No such wms store")
    ))]
pub async fn update_store(
    State(state): State<AppState>,
    Path((workspace, segment)): Path<(String, String)>,
    Query(params): Query<Params>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let (target, ext) = item_target(workspace, &segment);
    dispatch(&state, Verb::Put, target, ext, &params, &headers, &body).await
}

#[utoipa::path(delete, path = "/workspaces/{workspace}/wmsstores/{store}", tag = "wmsstores",
    params(
        ("workspace" = String, Path, description = "Workspace name"),
        ("store" = String, Path, description = "Store name"),
        ("recurse" = Option<bool>, Query, description = "Also delete dependent layers")
    ),
    responses(
        (status = 200, description = "Deleted"),
        (status = 403, description = "Store has layers and recurse is not set"),
        (status = 404, description = "No such wms store")
    ))]
pub async fn delete_store(
    State(state): State<AppState>,
    Path((workspace, segment)): Path<(String, String)>,
    Query(params): Query<Params>,
    headers: HeaderMap,
) -> Response {
    let (target, ext) = item_target(workspace, &segment);
    dispatch(&state, Verb::Delete, target, ext, &params, &headers, &[]).await
}

/// POST and anything else on a single store.
async fn item_fallback(
    State(state): State<AppState>,
    Path((workspace, segment)): Path<(String, String)>,
    Query(params): Query<Params>,
    method: Method,
    headers: HeaderMap,
) -> Response {
    let (target, ext) = item_target(workspace, &segment);
    dispatch(&state, verb_of(&method), target, ext, &params, &headers, &[]).await
}

async fn dispatch(
    state: &AppState,
    verb: Verb,
    target: Target,
    ext: Option<Format>,
    params: &Params,
    headers: &HeaderMap,
    body: &[u8],
) -> Response {
    let started = Instant::now();
    let format = Format::negotiate(ext, header_str(headers, header::ACCEPT));

    // 只有允许的方法才解析请求体，405 优先于 400
    let patch = if verb.carries_body() && target.allows(verb) {
        let body_format = Format::of_content_type(header_str(headers, header::CONTENT_TYPE));
        match representation::decode_store(body_format, body) {
            Ok(p) => Ok(Some(p)),
            Err(e) => {
                warn!(error = %e, %target, "rejecting request body");
                Err(StoreError::Validation(e.to_string()))
            }
        }
    } else {
        Ok(None)
    };

    let result = match patch {
        Ok(patch) => state.stores.handle(verb, target.clone(), patch, flags_of(params)).await,
        Err(e) => Err(e),
    };
    let resp = ResponseDescriptor::build(result, format, &state.links);
    observability::observe(verb, &target, resp.status, started.elapsed());
    resp.into_response()
}

fn store_routes() -> Router<AppState> {
    let collection: MethodRouter<AppState> = get(list_stores).post(create_store).fallback(collection_fallback);
    Router::new()
        .route("/workspaces/:workspace/wmsstores", collection.clone())
        .route("/workspaces/:workspace/wmsstores.xml", collection.clone())
        .route("/workspaces/:workspace/wmsstores.json", collection.clone())
        .route("/workspaces/:workspace/wmsstores.html", collection)
        .route(
            "/workspaces/:workspace/wmsstores/:store",
            get(get_store).put(update_store).delete(delete_store).fallback(item_fallback),
        )
}

/// Build the application router: the REST resources under `base_path`,
/// plus health, metrics and the OpenAPI document at the root.
pub fn build_router(state: AppState, base_path: &str, cors: CorsLayer) -> Router {
    let public = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/api-docs/openapi.json", get(openapi_json));

    let rest = if base_path.is_empty() {
        store_routes()
    } else {
        Router::new().nest(base_path, store_routes())
    };

    public
        .merge(rest)
        .with_state(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                // 每次请求创建 span，包含方法和路径等
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO).include_headers(false))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                // 响应返回时打点，包含状态码与耗时
                .on_response(DefaultOnResponse::new().level(Level::INFO).include_headers(false))
                .on_failure(DefaultOnFailure::new().level(Level::ERROR)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn flags_parse_leniently() {
        for raw in ["true", "TRUE", "on", "Yes", "1", ""] {
            assert!(flags_of(&params(&[("quietOnNotFound", raw)])).quiet_on_not_found, "{raw:?}");
        }
        for raw in ["false", "0", "maybe"] {
            assert!(!flags_of(&params(&[("recurse", raw)])).recurse, "{raw:?}");
        }
        assert_eq!(flags_of(&params(&[])), QueryFlags::default());
    }
}
