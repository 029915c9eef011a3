//! Plain request and response values.
//!
//! The validator is transport-agnostic: an HTTP front end or an in-process
//! adapter turns whatever it receives into a [`Request`] and writes the
//! [`Response`] back.

use crate::config::ResponseFormat;
use crate::error::{ValidatorError, ValidatorResult};
use ledgerlink_codec::{encode_body, ContentType, Value};

/// Request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// HEAD
    Head,
    /// GET
    Get,
    /// POST
    Post,
}

/// An incoming request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Method.
    pub method: Method,
    /// Path without the leading `/`, including any query string.
    pub path: String,
    /// `Content-Type` header, if any.
    pub content_type: Option<String>,
    /// `Cookie` header, if any.
    pub cookie: Option<String>,
    /// Request body.
    pub body: Vec<u8>,
}

impl Request {
    fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            content_type: None,
            cookie: None,
            body: Vec::new(),
        }
    }

    /// A GET request.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    /// A HEAD request.
    pub fn head(path: impl Into<String>) -> Self {
        Self::new(Method::Head, path)
    }

    /// A POST request.
    pub fn post(path: impl Into<String>, content_type: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            content_type: Some(content_type.into()),
            body,
            ..Self::new(Method::Post, path)
        }
    }

    /// Attaches a `Cookie` header.
    pub fn with_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.cookie = Some(cookie.into());
        self
    }

    /// Splits the path into its route and query parts.
    pub fn route_and_query(&self) -> (&str, &str) {
        let path = self.path.trim_start_matches('/');
        path.split_once('?').unwrap_or((path, ""))
    }
}

/// An outgoing response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    /// Status code.
    pub status: u16,
    /// `Content-Type` header, if any.
    pub content_type: Option<String>,
    /// `Set-Cookie` header, if any.
    pub set_cookie: Option<String>,
    /// Response body.
    pub body: Vec<u8>,
}

impl Response {
    /// A response with no body.
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    /// A response carrying `value` in the requested encoding.
    pub fn structured(status: u16, value: &Value, format: ResponseFormat) -> ValidatorResult<Self> {
        let content_type = match format {
            ResponseFormat::Cbor => ContentType::Cbor,
            ResponseFormat::Json => ContentType::Json,
        };
        let body = encode_body(&content_type, value)?;
        Ok(Self {
            status,
            content_type: Some(content_type.as_str().to_string()),
            set_cookie: None,
            body,
        })
    }

    /// The error payload `{errorType, error}` for `err`.
    pub fn error(err: &ValidatorError, format: ResponseFormat) -> Self {
        let payload = Value::map([
            ("errorType", Value::from(err.error_type())),
            ("error", Value::from(err.detail())),
        ]);
        Self::structured(err.status_code(), &payload, format).unwrap_or_else(|_| {
            Self {
                status: err.status_code(),
                content_type: Some("text/plain".to_string()),
                set_cookie: None,
                body: err.to_string().into_bytes(),
            }
        })
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
