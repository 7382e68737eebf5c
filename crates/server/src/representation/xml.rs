use std::collections::HashMap;

use models::{Layer, Store, StorePatch};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use super::{
    parse_bool, parse_int, CodecError, Format, Links, COLLECTION_ELEMENT, LAYER_COLLECTION_ELEMENT, LAYER_ELEMENT,
    STORE_ELEMENT,
};

const ATOM_NS: &str = "http://www.w3.org/2005/Atom";

fn malformed(detail: impl ToString) -> CodecError {
    CodecError::Malformed { format: "xml", detail: detail.to_string() }
}

fn leaf_path(stack: &[(String, bool)]) -> String {
    stack.iter().skip(1).map(|(n, _)| n.as_str()).collect::<Vec<_>>().join("/")
}

/// Flattened leaf values of a `<wmsStore>` document keyed by their path below
/// the root, e.g. `name`, `workspace`, `workspace/name`. Elements without any
/// content are recorded with an empty value.
fn read_leaves(body: &[u8]) -> Result<HashMap<String, String>, CodecError> {
    let text = std::str::from_utf8(body).map_err(malformed)?;
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    // (element name, saw text or child)
    let mut stack: Vec<(String, bool)> = Vec::new();
    let mut leaves = HashMap::new();
    let mut saw_root = false;

    loop {
        match reader.read_event().map_err(malformed)? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if stack.is_empty() {
                    if saw_root || name != STORE_ELEMENT {
                        return Err(malformed(format!("expected root element <{STORE_ELEMENT}>, found <{name}>")));
                    }
                    saw_root = true;
                }
                if let Some(parent) = stack.last_mut() {
                    parent.1 = true;
                }
                stack.push((name, false));
            }
            Event::Empty(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if stack.is_empty() {
                    if name != STORE_ELEMENT {
                        return Err(malformed(format!("expected root element <{STORE_ELEMENT}>, found <{name}>")));
                    }
                    saw_root = true;
                    continue;
                }
                if let Some(parent) = stack.last_mut() {
                    parent.1 = true;
                }
                stack.push((name, false));
                leaves.insert(leaf_path(&stack), String::new());
                stack.pop();
            }
            Event::Text(t) => {
                let value = t.unescape().map_err(malformed)?.into_owned();
                if let Some(top) = stack.last_mut() {
                    top.1 = true;
                }
                if stack.len() > 1 {
                    leaves.insert(leaf_path(&stack), value);
                }
            }
            Event::CData(c) => {
                let value = String::from_utf8(c.into_inner().into_owned()).map_err(malformed)?;
                if let Some(top) = stack.last_mut() {
                    top.1 = true;
                }
                if stack.len() > 1 {
                    leaves.insert(leaf_path(&stack), value);
                }
            }
            Event::End(_) => {
                if let Some((_, had_content)) = stack.last() {
                    if !had_content && stack.len() > 1 {
                        leaves.insert(leaf_path(&stack), String::new());
                    }
                }
                stack.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }
    if !saw_root {
        return Err(malformed(format!("missing <{STORE_ELEMENT}> element")));
    }
    if !stack.is_empty() {
        return Err(malformed("unexpected end of document"));
    }
    Ok(leaves)
}

pub fn decode_store(body: &[u8]) -> Result<StorePatch, CodecError> {
    let mut leaves = read_leaves(body)?;
    let mut take = |key: &str| leaves.remove(key);

    let nullable = |v: Option<String>| v.map(|s| if s.trim().is_empty() { None } else { Some(s) });

    let name = take("name");
    let workspace = take("workspace/name").or_else(|| take("workspace"));
    let description = nullable(take("description"));
    let capabilities_url = take("capabilitiesURL");
    let enabled = take("enabled").map(|v| parse_bool("enabled", &v)).transpose()?;
    let user = nullable(take("user"));
    let password = take("password").map(|s| if s.is_empty() { None } else { Some(s) });
    let max_connections = take("maxConnections").map(|v| parse_int("maxConnections", &v)).transpose()?;
    let read_timeout = take("readTimeout").map(|v| parse_int("readTimeout", &v)).transpose()?;
    let connect_timeout = take("connectTimeout").map(|v| parse_int("connectTimeout", &v)).transpose()?;
    let use_connection_pooling = take("useConnectionPooling")
        .map(|v| parse_bool("useConnectionPooling", &v))
        .transpose()?;

    Ok(StorePatch {
        name,
        workspace,
        description,
        capabilities_url,
        enabled,
        user,
        password,
        max_connections,
        read_timeout,
        connect_timeout,
        use_connection_pooling,
    })
}

struct XmlOut {
    w: Writer<Vec<u8>>,
}

impl XmlOut {
    fn new() -> Self {
        Self { w: Writer::new(Vec::new()) }
    }

    fn event(&mut self, e: Event<'_>) -> Result<(), CodecError> {
        self.w.write_event(e).map_err(|e| CodecError::Encode(e.to_string()))
    }

    fn open(&mut self, tag: &str) -> Result<(), CodecError> {
        self.event(Event::Start(BytesStart::new(tag)))
    }

    fn close(&mut self, tag: &str) -> Result<(), CodecError> {
        self.event(Event::End(BytesEnd::new(tag)))
    }

    fn leaf(&mut self, tag: &str, text: &str) -> Result<(), CodecError> {
        self.open(tag)?;
        self.event(Event::Text(BytesText::new(text)))?;
        self.close(tag)
    }

    fn atom_link(&mut self, href: &str) -> Result<(), CodecError> {
        let link = BytesStart::new("atom:link").with_attributes([
            ("xmlns:atom", ATOM_NS),
            ("rel", "alternate"),
            ("href", href),
            ("type", "application/xml"),
        ]);
        self.event(Event::Empty(link))
    }

    fn finish(self) -> Vec<u8> {
        self.w.into_inner()
    }
}

pub fn encode_store(store: &Store, layers: &[Layer], links: &Links) -> Result<Vec<u8>, CodecError> {
    let mut out = XmlOut::new();
    out.open(STORE_ELEMENT)?;
    out.leaf("name", &store.name)?;
    if let Some(d) = &store.description {
        out.leaf("description", d)?;
    }
    out.leaf("type", store.store_type())?;
    out.leaf("enabled", &store.enabled.to_string())?;
    out.open("workspace")?;
    out.leaf("name", &store.workspace)?;
    out.atom_link(&links.workspace(&store.workspace, Format::Xml))?;
    out.close("workspace")?;
    out.leaf("capabilitiesURL", &store.capabilities_url)?;
    if let Some(u) = &store.user {
        out.leaf("user", u)?;
    }
    out.leaf("maxConnections", &store.max_connections.to_string())?;
    out.leaf("readTimeout", &store.read_timeout.to_string())?;
    out.leaf("connectTimeout", &store.connect_timeout.to_string())?;
    out.leaf("useConnectionPooling", &store.use_connection_pooling.to_string())?;
    out.leaf("dateCreated", &store.date_created.to_rfc3339())?;
    if let Some(m) = &store.date_modified {
        out.leaf("dateModified", &m.to_rfc3339())?;
    }
    if !layers.is_empty() {
        out.open(LAYER_COLLECTION_ELEMENT)?;
        for layer in layers {
            out.open(LAYER_ELEMENT)?;
            out.leaf("name", &layer.name)?;
            out.atom_link(&links.layer(&store.workspace, &store.name, &layer.name, Format::Xml))?;
            out.close(LAYER_ELEMENT)?;
        }
        out.close(LAYER_COLLECTION_ELEMENT)?;
    }
    out.close(STORE_ELEMENT)?;
    Ok(out.finish())
}

pub fn encode_collection(_workspace: &str, stores: &[Store], links: &Links) -> Result<Vec<u8>, CodecError> {
    let mut out = XmlOut::new();
    if stores.is_empty() {
        out.event(Event::Empty(BytesStart::new(COLLECTION_ELEMENT)))?;
        return Ok(out.finish());
    }
    out.open(COLLECTION_ELEMENT)?;
    for s in stores {
        out.open(STORE_ELEMENT)?;
        out.leaf("name", &s.name)?;
        out.atom_link(&links.store_with_format(&s.workspace, &s.name, Format::Xml))?;
        out.close(STORE_ELEMENT)?;
    }
    out.close(COLLECTION_ELEMENT)?;
    Ok(out.finish())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use configs::StoreDefaults;

    use super::*;

    #[test]
    fn decodes_create_body() {
        let xml = "<wmsStore><name>newWMSStore</name><capabilitiesURL>http://somehost/wms?</capabilitiesURL><workspace>sf</workspace></wmsStore>";
        let patch = decode_store(xml.as_bytes()).unwrap();
        assert_eq!(patch.name.as_deref(), Some("newWMSStore"));
        assert_eq!(patch.workspace.as_deref(), Some("sf"));
        assert_eq!(patch.capabilities_url.as_deref(), Some("http://somehost/wms?"));
        assert_eq!(patch.enabled, None);
    }

    #[test]
    fn decodes_partial_update_body() {
        let xml = "<wmsStore><name>demo</name><enabled>false</enabled></wmsStore>";
        let patch = decode_store(xml.as_bytes()).unwrap();
        assert_eq!(
            patch,
            StorePatch { name: Some("demo".into()), enabled: Some(false), ..Default::default() }
        );
    }

    #[test]
    fn decodes_nested_workspace_escapes_and_empty_elements() {
        let xml = r#"<?xml version="1.0"?>
            <wmsStore>
              <workspace><name>gs</name></workspace>
              <capabilitiesURL>http://host/wms?a=1&amp;b=2</capabilitiesURL>
              <description/>
              <user></user>
              <maxConnections>12</maxConnections>
            </wmsStore>"#;
        let patch = decode_store(xml.as_bytes()).unwrap();
        assert_eq!(patch.workspace.as_deref(), Some("gs"));
        assert_eq!(patch.capabilities_url.as_deref(), Some("http://host/wms?a=1&b=2"));
        assert_eq!(patch.description, Some(None));
        assert_eq!(patch.user, Some(None));
        assert_eq!(patch.max_connections, Some(12));
        assert_eq!(patch.name, None);
    }

    #[test]
    fn rejects_wrong_root_and_bad_values() {
        assert!(matches!(decode_store(b"<dataStore><name>x</name></dataStore>"), Err(CodecError::Malformed { .. })));
        assert!(matches!(
            decode_store(b"<wmsStore><enabled>yes</enabled></wmsStore>"),
            Err(CodecError::InvalidValue { field: "enabled", .. })
        ));
        assert!(matches!(
            decode_store(b"<wmsStore><readTimeout>soon</readTimeout></wmsStore>"),
            Err(CodecError::InvalidValue { field: "readTimeout", .. })
        ));
        assert!(decode_store(b"<wmsStore><name>x</name>").is_err());
    }

    #[test]
    fn encodes_store_and_reads_back() {
        let store = StorePatch {
            name: Some("demo".into()),
            capabilities_url: Some("http://demo.opengeo.org/geoserver/wms?".into()),
            ..Default::default()
        }
        .into_new_store("sf", &StoreDefaults::default(), Utc::now())
        .unwrap();
        let links = Links::new(None, "/rest");
        let bytes = encode_store(&store, &[], &links).unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.starts_with("<wmsStore><name>demo</name>"));
        assert!(text.contains("<workspace><name>sf</name>"));
        assert!(text.contains("<enabled>true</enabled>"));

        let back = decode_store(&bytes).unwrap();
        assert_eq!(back.workspace.as_deref(), Some("sf"));
        assert_eq!(back.capabilities_url.as_deref(), Some("http://demo.opengeo.org/geoserver/wms?"));
        assert_eq!(back.max_connections, Some(6));
    }

    #[test]
    fn encodes_collections() {
        let links = Links::new(None, "/rest");
        let empty = String::from_utf8(encode_collection("sf", &[], &links).unwrap()).unwrap();
        assert_eq!(empty, "<wmsStores/>");
    }
}
