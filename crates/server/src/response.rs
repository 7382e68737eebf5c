//! Maps resource outcomes and errors onto HTTP responses.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use service::{StoreError, StoreOutcome};
use tracing::error;

use crate::representation::{self, CodecError, Format, Links};

#[derive(Debug, PartialEq, Eq)]
pub enum ResponseBody {
    Empty,
    /// Plain-text error message.
    Message(String),
    Representation { content_type: &'static str, bytes: Vec<u8> },
}

#[derive(Debug)]
pub struct ResponseDescriptor {
    pub status: StatusCode,
    pub location: Option<String>,
    pub allow: Option<&'static [&'static str]>,
    pub body: ResponseBody,
}

impl ResponseDescriptor {
    fn new(status: StatusCode, body: ResponseBody) -> Self {
        Self { status, location: None, allow: None, body }
    }

    pub fn build(result: Result<StoreOutcome, StoreError>, format: Format, links: &Links) -> Self {
        match result {
            Ok(outcome) => Self::from_outcome(outcome, format, links),
            Err(e) => Self::from_error(&e),
        }
    }

    fn from_outcome(outcome: StoreOutcome, format: Format, links: &Links) -> Self {
        let encoded = match outcome {
            StoreOutcome::Created(key) => {
                let mut resp = Self::new(StatusCode::CREATED, ResponseBody::Empty);
                resp.location = Some(links.store(&key.workspace, &key.name));
                return resp;
            }
            StoreOutcome::Updated(_) | StoreOutcome::Deleted(_) => {
                return Self::new(StatusCode::OK, ResponseBody::Empty);
            }
            StoreOutcome::Found { store, layers } => representation::encode_store(format, &store, &layers, links),
            StoreOutcome::Collection { workspace, stores } => {
                representation::encode_collection(format, &workspace, &stores, links)
            }
        };
        match encoded {
            Ok(bytes) => Self::new(
                StatusCode::OK,
                ResponseBody::Representation { content_type: format.content_type(), bytes },
            ),
            Err(CodecError::Unsupported(_)) => Self::new(StatusCode::NOT_ACCEPTABLE, ResponseBody::Empty),
            Err(e) => {
                error!(error = %e, "failed to encode representation");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, ResponseBody::Message(e.to_string()))
            }
        }
    }

    pub fn from_error(err: &StoreError) -> Self {
        match err {
            StoreError::NotFound { quiet: true, .. } => Self::new(StatusCode::NOT_FOUND, ResponseBody::Empty),
            StoreError::NotFound { message, .. } => {
                Self::new(StatusCode::NOT_FOUND, ResponseBody::Message(message.clone()))
            }
            StoreError::Forbidden(msg) => Self::new(StatusCode::FORBIDDEN, ResponseBody::Message(msg.clone())),
            StoreError::MethodNotSupported { allow, .. } => {
                let mut resp = Self::new(StatusCode::METHOD_NOT_ALLOWED, ResponseBody::Empty);
                resp.allow = Some(*allow);
                resp
            }
            StoreError::Validation(msg) => Self::new(StatusCode::BAD_REQUEST, ResponseBody::Message(msg.clone())),
            StoreError::Conflict(msg) => Self::new(StatusCode::CONFLICT, ResponseBody::Message(msg.clone())),
            StoreError::Catalog(_) => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, ResponseBody::Message(err.to_string()))
            }
        }
    }
}

impl IntoResponse for ResponseDescriptor {
    fn into_response(self) -> Response {
        let mut resp = match self.body {
            ResponseBody::Empty => self.status.into_response(),
            ResponseBody::Message(msg) => {
                (self.status, [(header::CONTENT_TYPE, "text/plain; charset=utf-8")], msg).into_response()
            }
            ResponseBody::Representation { content_type, bytes } => {
                (self.status, [(header::CONTENT_TYPE, content_type)], bytes).into_response()
            }
        };
        let headers = resp.headers_mut();
        if let Some(loc) = self.location.and_then(|l| HeaderValue::from_str(&l).ok()) {
            headers.insert(header::LOCATION, loc);
        }
        if let Some(allow) = self.allow {
            if let Ok(v) = HeaderValue::from_str(&allow.join(", ")) {
                headers.insert(header::ALLOW, v);
            }
        }
        resp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use models::StoreKey;

    fn links() -> Links {
        Links::new(Some("http://localhost:8080"), "/rest")
    }

    #[test]
    fn created_carries_location() {
        let key = StoreKey::new("sf", "newWMSStore");
        let resp = ResponseDescriptor::build(Ok(StoreOutcome::Created(key)), Format::Xml, &links());
        assert_eq!(resp.status, StatusCode::CREATED);
        assert_eq!(
            resp.location.as_deref(),
            Some("http://localhost:8080/rest/workspaces/sf/wmsstores/newWMSStore")
        );
        assert_eq!(resp.body, ResponseBody::Empty);
    }

    #[test]
    fn errors_map_to_statuses() {
        let cases = [
            (StoreError::NotFound { message: "No such wms store: sf,x".into(), quiet: false }, StatusCode::NOT_FOUND),
            (StoreError::Forbidden("no".into()), StatusCode::FORBIDDEN),
            (StoreError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (StoreError::Conflict("dup".into()), StatusCode::CONFLICT),
            (StoreError::Catalog("disk".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ResponseDescriptor::from_error(&err).status, status);
        }
    }

    #[test]
    fn quiet_not_found_has_no_body() {
        let err = StoreError::NotFound { message: "No such wms store: sf,x".into(), quiet: true };
        let resp = ResponseDescriptor::from_error(&err);
        assert_eq!(resp.status, StatusCode::NOT_FOUND);
        assert_eq!(resp.body, ResponseBody::Empty);

        let loud = ResponseDescriptor::from_error(&StoreError::NotFound {
            message: "No such wms store: sf,x".into(),
            quiet: false,
        });
        assert_eq!(loud.body, ResponseBody::Message("No such wms store: sf,x".into()));
    }

    #[test]
    fn method_not_supported_sets_allow() {
        let err = StoreError::MethodNotSupported {
            method: "PUT",
            target: "/workspaces/sf/wmsstores".into(),
            allow: &["GET", "POST"],
        };
        let resp = ResponseDescriptor::from_error(&err);
        assert_eq!(resp.status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(resp.allow, Some(&["GET", "POST"][..]));
        let http = resp.into_response();
        assert_eq!(http.headers().get(header::ALLOW).unwrap(), "GET, POST");
    }
}
