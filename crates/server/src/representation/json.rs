use models::{Layer, Store, StorePatch};
use serde::{Deserialize, Deserializer};
use serde_json::{json, Map, Value};

use super::{CodecError, Format, Links, COLLECTION_ELEMENT, LAYER_COLLECTION_ELEMENT, LAYER_ELEMENT, STORE_ELEMENT};

/// Incoming store object; every field optional so absence is visible.
#[derive(Debug, Default, Deserialize)]
struct StoreBody {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    workspace: Option<WorkspaceField>,
    #[serde(default, deserialize_with = "present")]
    description: Option<Option<String>>,
    #[serde(default, rename = "capabilitiesURL")]
    capabilities_url: Option<String>,
    #[serde(default)]
    enabled: Option<bool>,
    #[serde(default, deserialize_with = "present")]
    user: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    password: Option<Option<String>>,
    #[serde(default, rename = "maxConnections")]
    max_connections: Option<i32>,
    #[serde(default, rename = "readTimeout")]
    read_timeout: Option<i32>,
    #[serde(default, rename = "connectTimeout")]
    connect_timeout: Option<i32>,
    #[serde(default, rename = "useConnectionPooling")]
    use_connection_pooling: Option<bool>,
}

/// `"workspace": "sf"` or `"workspace": {"name": "sf"}`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WorkspaceField {
    Name(String),
    Ref { name: String },
}

/// Distinguishes an explicit `null` (`Some(None)`) from a missing key (`None`).
fn present<'de, D, T>(d: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(d).map(Some)
}

pub fn decode_store(body: &[u8]) -> Result<StorePatch, CodecError> {
    let malformed = |e: serde_json::Error| CodecError::Malformed { format: "json", detail: e.to_string() };
    let value: Value = serde_json::from_slice(body).map_err(malformed)?;
    let inner = match value {
        Value::Object(mut obj) if obj.contains_key(STORE_ELEMENT) => obj.remove(STORE_ELEMENT).unwrap_or(Value::Null),
        other => other,
    };
    if !inner.is_object() {
        return Err(CodecError::Malformed { format: "json", detail: format!("expected a {STORE_ELEMENT} object") });
    }
    let body: StoreBody = serde_json::from_value(inner).map_err(malformed)?;
    Ok(StorePatch {
        name: body.name,
        workspace: body.workspace.map(|w| match w {
            WorkspaceField::Name(name) | WorkspaceField::Ref { name } => name,
        }),
        description: body.description,
        capabilities_url: body.capabilities_url,
        enabled: body.enabled,
        user: body.user,
        password: body.password,
        max_connections: body.max_connections,
        read_timeout: body.read_timeout,
        connect_timeout: body.connect_timeout,
        use_connection_pooling: body.use_connection_pooling,
    })
}

pub fn encode_store(store: &Store, layers: &[Layer], links: &Links) -> Result<Vec<u8>, CodecError> {
    let mut obj = Map::new();
    obj.insert("name".into(), json!(store.name));
    if let Some(d) = &store.description {
        obj.insert("description".into(), json!(d));
    }
    obj.insert("type".into(), json!(store.store_type()));
    obj.insert("enabled".into(), json!(store.enabled));
    obj.insert(
        "workspace".into(),
        json!({"name": store.workspace, "href": links.workspace(&store.workspace, Format::Json)}),
    );
    obj.insert("capabilitiesURL".into(), json!(store.capabilities_url));
    if let Some(u) = &store.user {
        obj.insert("user".into(), json!(u));
    }
    obj.insert("maxConnections".into(), json!(store.max_connections));
    obj.insert("readTimeout".into(), json!(store.read_timeout));
    obj.insert("connectTimeout".into(), json!(store.connect_timeout));
    obj.insert("useConnectionPooling".into(), json!(store.use_connection_pooling));
    obj.insert("dateCreated".into(), json!(store.date_created.to_rfc3339()));
    if let Some(m) = &store.date_modified {
        obj.insert("dateModified".into(), json!(m.to_rfc3339()));
    }
    if !layers.is_empty() {
        let items: Vec<Value> = layers
            .iter()
            .map(|l| json!({"name": l.name, "href": links.layer(&store.workspace, &store.name, &l.name, Format::Json)}))
            .collect();
        obj.insert(LAYER_COLLECTION_ELEMENT.into(), json!({ LAYER_ELEMENT: items }));
    }
    to_vec(&json!({ STORE_ELEMENT: Value::Object(obj) }))
}

/// An empty collection renders as `{"wmsStores": ""}`.
pub fn encode_collection(_workspace: &str, stores: &[Store], links: &Links) -> Result<Vec<u8>, CodecError> {
    if stores.is_empty() {
        return to_vec(&json!({ COLLECTION_ELEMENT: "" }));
    }
    let items: Vec<Value> = stores
        .iter()
        .map(|s| json!({"name": s.name, "href": links.store_with_format(&s.workspace, &s.name, Format::Json)}))
        .collect();
    to_vec(&json!({ COLLECTION_ELEMENT: { STORE_ELEMENT: items } }))
}

fn to_vec(v: &Value) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(v).map_err(|e| CodecError::Encode(e.to_string()))
}
