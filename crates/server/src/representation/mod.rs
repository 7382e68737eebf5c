//! XML/JSON representations of WMS stores.
//!
//! Both encodings share the same field names (`name`, `workspace/name`,
//! `capabilitiesURL`, ...). Decoding yields a presence-tracked
//! [`models::StorePatch`]; encoding renders a store or a collection.

use models::{Layer, Store, StorePatch};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use thiserror::Error;

pub mod json;
pub mod xml;

pub const STORE_ELEMENT: &str = "wmsStore";
pub const COLLECTION_ELEMENT: &str = "wmsStores";
pub const LAYER_COLLECTION_ELEMENT: &str = "wmsLayers";
pub const LAYER_ELEMENT: &str = "wmsLayer";

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("request body is empty")]
    Empty,
    #[error("malformed {format} body: {detail}")]
    Malformed { format: &'static str, detail: String },
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
    #[error("{0} representation is not supported")]
    Unsupported(&'static str),
    #[error("encoding failed: {0}")]
    Encode(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Xml,
    Json,
    Html,
}

impl Format {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "xml" => Some(Format::Xml),
            "json" => Some(Format::Json),
            "html" | "htm" => Some(Format::Html),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Format::Xml => "xml",
            Format::Json => "json",
            Format::Html => "html",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Format::Xml => "application/xml",
            Format::Json => "application/json",
            Format::Html => "text/html",
        }
    }

    /// Response format: explicit extension first, then `Accept`, XML otherwise.
    pub fn negotiate(ext: Option<Format>, accept: Option<&str>) -> Self {
        if let Some(f) = ext {
            return f;
        }
        match accept {
            Some(a) if a.contains("json") => Format::Json,
            Some(a) if a.contains("html") && !a.contains("xml") => Format::Html,
            _ => Format::Xml,
        }
    }

    /// Request body format from `Content-Type`.
    pub fn of_content_type(content_type: Option<&str>) -> Self {
        match content_type {
            Some(ct) if ct.contains("json") => Format::Json,
            _ => Format::Xml,
        }
    }
}

/// Split a trailing `.xml`/`.json`/`.html` off a path segment.
pub fn split_extension(segment: &str) -> (&str, Option<Format>) {
    if let Some((stem, ext)) = segment.rsplit_once('.') {
        if let Some(f) = Format::from_extension(ext) {
            if !stem.is_empty() {
                return (stem, Some(f));
            }
        }
    }
    (segment, None)
}

/// Characters escaped inside a single path segment (RFC 3986 `pchar` complement).
/// Non-ASCII is always escaped as UTF-8.
const SEGMENT_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

fn segment(s: &str) -> String {
    utf8_percent_encode(s, SEGMENT_ENCODE_SET).to_string()
}

/// Absolute or relative hrefs for links inside representations and `Location`.
#[derive(Clone, Debug)]
pub struct Links {
    prefix: String,
}

impl Links {
    /// `public_url` (may be absent) followed by the REST base path.
    pub fn new(public_url: Option<&str>, base_path: &str) -> Self {
        let mut prefix = public_url.unwrap_or_default().trim_end_matches('/').to_string();
        prefix.push_str(base_path.trim_end_matches('/'));
        Self { prefix }
    }

    pub fn workspace(&self, workspace: &str, format: Format) -> String {
        format!("{}/workspaces/{}.{}", self.prefix, segment(workspace), format.extension())
    }

    /// Canonical store path, no extension.
    pub fn store(&self, workspace: &str, name: &str) -> String {
        format!("{}/workspaces/{}/wmsstores/{}", self.prefix, segment(workspace), segment(name))
    }

    pub fn store_with_format(&self, workspace: &str, name: &str, format: Format) -> String {
        format!("{}.{}", self.store(workspace, name), format.extension())
    }

    pub fn layer(&self, workspace: &str, store: &str, layer: &str, format: Format) -> String {
        format!("{}/wmslayers/{}.{}", self.store(workspace, store), segment(layer), format.extension())
    }
}

pub fn decode_store(format: Format, body: &[u8]) -> Result<StorePatch, CodecError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(CodecError::Empty);
    }
    match format {
        Format::Json => json::decode_store(body),
        Format::Xml => xml::decode_store(body),
        Format::Html => Err(CodecError::Unsupported("html")),
    }
}

pub fn encode_store(format: Format, store: &Store, layers: &[Layer], links: &Links) -> Result<Vec<u8>, CodecError> {
    match format {
        Format::Json => json::encode_store(store, layers, links),
        Format::Xml => xml::encode_store(store, layers, links),
        Format::Html => Err(CodecError::Unsupported("html")),
    }
}

pub fn encode_collection(
    format: Format,
    workspace: &str,
    stores: &[Store],
    links: &Links,
) -> Result<Vec<u8>, CodecError> {
    match format {
        Format::Json => json::encode_collection(workspace, stores, links),
        Format::Xml => xml::encode_collection(workspace, stores, links),
        Format::Html => Err(CodecError::Unsupported("html")),
    }
}

pub(crate) fn parse_bool(field: &'static str, raw: &str) -> Result<bool, CodecError> {
    match raw.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(CodecError::InvalidValue { field, value: other.to_string() }),
    }
}

pub(crate) fn parse_int(field: &'static str, raw: &str) -> Result<i32, CodecError> {
    raw.trim()
        .parse::<i32>()
        .map_err(|_| CodecError::InvalidValue { field, value: raw.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_split_only_when_known() {
        assert_eq!(split_extension("demo.xml"), ("demo", Some(Format::Xml)));
        assert_eq!(split_extension("demo.json"), ("demo", Some(Format::Json)));
        assert_eq!(split_extension("sfssssss.html"), ("sfssssss", Some(Format::Html)));
        assert_eq!(split_extension("demo"), ("demo", None));
        assert_eq!(split_extension("my.store"), ("my.store", None));
        assert_eq!(split_extension(".xml"), (".xml", None));
    }

    #[test]
    fn negotiation_prefers_extension() {
        assert_eq!(Format::negotiate(Some(Format::Json), Some("application/xml")), Format::Json);
        assert_eq!(Format::negotiate(None, Some("application/json")), Format::Json);
        assert_eq!(Format::negotiate(None, Some("text/html")), Format::Html);
        assert_eq!(Format::negotiate(None, Some("*/*")), Format::Xml);
        assert_eq!(Format::negotiate(None, None), Format::Xml);
        assert_eq!(Format::of_content_type(Some("text/json")), Format::Json);
        assert_eq!(Format::of_content_type(Some("text/xml")), Format::Xml);
    }

    #[test]
    fn links_are_canonical() {
        let links = Links::new(Some("http://localhost:8080/"), "/rest");
        assert_eq!(
            links.store("sf", "newWMSStore"),
            "http://localhost:8080/rest/workspaces/sf/wmsstores/newWMSStore"
        );
        assert_eq!(links.workspace("sf", Format::Xml), "http://localhost:8080/rest/workspaces/sf.xml");
        let relative = Links::new(None, "/rest");
        assert_eq!(relative.store_with_format("sf", "demo", Format::Json), "/rest/workspaces/sf/wmsstores/demo.json");
    }

    #[test]
    fn link_segments_are_escaped() {
        let links = Links::new(None, "/rest");
        assert_eq!(links.store("sf", "a?b"), "/rest/workspaces/sf/wmsstores/a%3Fb");
        assert_eq!(links.store("sf", "a#b"), "/rest/workspaces/sf/wmsstores/a%23b");
        assert_eq!(links.store("sf", "a%2Fb"), "/rest/workspaces/sf/wmsstores/a%252Fb");
        assert_eq!(links.store("my ws", "café"), "/rest/workspaces/my%20ws/wmsstores/caf%C3%A9");
    }

    #[test]
    fn blank_body_is_rejected() {
        assert!(matches!(decode_store(Format::Xml, b"  \n"), Err(CodecError::Empty)));
        assert!(matches!(decode_store(Format::Html, b"<p/>"), Err(CodecError::Unsupported(_))));
    }
}
