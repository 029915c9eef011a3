//! HTTP transport channel.
//!
//! The actual HTTP client is abstracted via [`HttpClient`] so the channel
//! can run over reqwest, an in-process loopback, or a test double. The
//! [`Channel`] owns everything above raw HTTP: URL joining, the session
//! cookie, response classification and body decoding.

use crate::error::{ClientError, ClientResult};
use ledgerlink_codec::{decode_body, to_cbor, to_json, Body, ContentType, Value};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Request headers as name/value pairs.
pub type Headers<'a> = &'a [(&'static str, String)];

/// HTTP request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// HEAD
    Head,
    /// GET
    Get,
    /// POST
    Post,
}

/// A raw HTTP response.
///
/// Non-2xx statuses are responses, not errors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// `Content-Type` header, if any.
    pub content_type: Option<String>,
    /// `Set-Cookie` header, if any.
    pub set_cookie: Option<String>,
    /// Response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a response with the given status and no body.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    /// Sets the body and its content type.
    pub fn with_body(mut self, content_type: &ContentType, body: Vec<u8>) -> Self {
        self.content_type = Some(content_type.as_str().to_string());
        self.body = body;
        self
    }

    /// Sets the `Set-Cookie` header.
    pub fn with_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.set_cookie = Some(cookie.into());
        self
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A request that never produced an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpError {
    /// The request exceeded its timeout.
    Timeout,
    /// Connection refused, reset, DNS failure and the like.
    Failed(String),
}

impl From<HttpError> for ClientError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Timeout => ClientError::Timeout,
            HttpError::Failed(reason) => {
                ClientError::transport_retryable(format!("operation failed: {reason}"))
            }
        }
    }
}

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport. All calls
/// block until a response arrives or `timeout` expires.
pub trait HttpClient: Send + Sync {
    /// Sends a HEAD request.
    fn head(&self, url: &str, headers: Headers<'_>, timeout: Duration) -> Result<HttpResponse, HttpError>;

    /// Sends a GET request.
    fn get(&self, url: &str, headers: Headers<'_>, timeout: Duration) -> Result<HttpResponse, HttpError>;

    /// Sends a POST request.
    fn post(
        &self,
        url: &str,
        headers: Headers<'_>,
        body: Vec<u8>,
        timeout: Duration,
    ) -> Result<HttpResponse, HttpError>;
}

impl<T: HttpClient + ?Sized> HttpClient for Arc<T> {
    fn head(&self, url: &str, headers: Headers<'_>, timeout: Duration) -> Result<HttpResponse, HttpError> {
        (**self).head(url, headers, timeout)
    }

    fn get(&self, url: &str, headers: Headers<'_>, timeout: Duration) -> Result<HttpResponse, HttpError> {
        (**self).get(url, headers, timeout)
    }

    fn post(
        &self,
        url: &str,
        headers: Headers<'_>,
        body: Vec<u8>,
        timeout: Duration,
    ) -> Result<HttpResponse, HttpError> {
        (**self).post(url, headers, body, timeout)
    }
}

/// Renders a structured value for log lines and error messages.
fn render(value: &Value) -> String {
    to_json(value)
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_else(|_| format!("{value:?}"))
}

/// Error type tag marking a validation rejection.
pub const INVALID_TRANSACTION_ERROR: &str = "InvalidTransactionError";

/// Blocking request channel to one validator.
pub struct Channel<C: HttpClient> {
    base_url: String,
    client: C,
    cookie: OnceLock<String>,
    head_timeout: Duration,
    get_timeout: Duration,
    post_timeout: Duration,
}

impl<C: HttpClient> Channel<C> {
    /// Creates a channel with default timeouts (HEAD 30 s, GET and POST
    /// 10 s).
    pub fn new(base_url: impl Into<String>, client: C) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            cookie: OnceLock::new(),
            head_timeout: Duration::from_secs(30),
            get_timeout: Duration::from_secs(10),
            post_timeout: Duration::from_secs(10),
        }
    }

    /// Overrides the per-method timeouts.
    pub fn with_timeouts(mut self, head: Duration, get: Duration, post: Duration) -> Self {
        self.head_timeout = head;
        self.get_timeout = get;
        self.post_timeout = post;
        self
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the session cookie, once the validator has assigned one.
    pub fn session_cookie(&self) -> Option<&str> {
        self.cookie.get().map(String::as_str)
    }

    /// Returns the underlying HTTP client.
    pub fn client(&self) -> &C {
        &self.client
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn headers(&self) -> Vec<(&'static str, String)> {
        self.cookie
            .get()
            .map(|cookie| vec![("cookie", cookie.clone())])
            .unwrap_or_default()
    }

    /// Keeps the first session cookie the validator hands out.
    fn record_cookie(&self, response: &HttpResponse) {
        if let Some(raw) = response.set_cookie.as_deref() {
            let cookie = raw.split(';').next().unwrap_or(raw).trim();
            if !cookie.is_empty() && self.cookie.set(cookie.to_string()).is_ok() {
                debug!(cookie, "session cookie assigned");
            }
        }
    }

    /// Sends a HEAD request and returns the status code, whatever it is.
    ///
    /// # Errors
    ///
    /// Returns an error only if no response arrived.
    pub fn head(&self, path: &str) -> ClientResult<u16> {
        let url = self.url(path);
        debug!(%url, "head request");
        let response = self
            .client
            .head(&url, &self.headers(), self.head_timeout)
            .map_err(|e| {
                warn!(%url, error = ?e, "no response from server");
                ClientError::from(e)
            })?;
        self.record_cookie(&response);
        Ok(response.status)
    }

    /// Sends a GET request with the default timeout and decodes the body by
    /// its content type.
    pub fn get(&self, path: &str) -> ClientResult<Body> {
        self.get_with_timeout(path, self.get_timeout)
    }

    /// Sends a GET request with an explicit timeout.
    ///
    /// # Errors
    ///
    /// Non-2xx responses and malformed structured bodies are transport
    /// failures.
    pub fn get_with_timeout(&self, path: &str, timeout: Duration) -> ClientResult<Body> {
        let url = self.url(path);
        debug!(%url, "get content");
        let response = self.client.get(&url, &self.headers(), timeout).map_err(|e| {
            warn!(%url, error = ?e, "no response from server");
            ClientError::from(e)
        })?;
        self.record_cookie(&response);

        if !response.is_success() {
            warn!(status = response.status, "operation failed with response");
            if response.status == 400 {
                warn!(
                    detail = %String::from_utf8_lossy(&response.body),
                    "error from server"
                );
            }
            return Err(failure_for_status(response.status));
        }

        let content_type = ContentType::parse(response.content_type.as_deref());
        Ok(decode_body(&content_type, &response.body)?)
    }

    /// Posts `message` as CBOR to `endpoint`.
    ///
    /// Returns the decoded response, or `None` if the validator answered
    /// with an unstructured body.
    ///
    /// # Errors
    ///
    /// A structured error payload tagged `InvalidTransactionError` becomes
    /// [`ClientError::InvalidTransaction`]; every other failure is a
    /// transport failure.
    pub fn post(&self, endpoint: &str, message: &Value) -> ClientResult<Option<Value>> {
        let body = to_cbor(message)?;
        let url = self.url(endpoint);
        debug!(%url, len = body.len(), "post message");

        let mut headers = self.headers();
        headers.push(("content-type", ContentType::Cbor.as_str().to_string()));
        let response = self
            .client
            .post(&url, &headers, body, self.post_timeout)
            .map_err(|e| {
                warn!(%url, error = ?e, "no response from server");
                ClientError::from(e)
            })?;
        self.record_cookie(&response);

        let content_type = ContentType::parse(response.content_type.as_deref());
        if !response.is_success() {
            return Err(classify_post_failure(&response, &content_type));
        }

        match decode_body(&content_type, &response.body)? {
            Body::Structured(value) => Ok(Some(value)),
            Body::Opaque(bytes) => {
                info!(
                    content_type = %content_type,
                    body = %String::from_utf8_lossy(&bytes),
                    "server responded with an unstructured message"
                );
                Ok(None)
            }
        }
    }
}

fn failure_for_status(status: u16) -> ClientError {
    let message = format!("operation failed with response: {status}");
    if status >= 500 {
        ClientError::transport_retryable(message)
    } else {
        ClientError::transport_fatal(message)
    }
}

fn classify_post_failure(response: &HttpResponse, content_type: &ContentType) -> ClientError {
    let value = match decode_body(content_type, &response.body) {
        Ok(Body::Structured(value)) => value,
        _ => {
            warn!(status = response.status, "operation failed with response");
            return failure_for_status(response.status);
        }
    };
    warn!(status = response.status, body = %render(&value), "operation failed with response");

    match value.get("errorType").and_then(Value::as_text) {
        Some(INVALID_TRANSACTION_ERROR) => {
            let detail = match value.get("error") {
                Some(Value::Text(text)) => text.clone(),
                Some(other) => render(other),
                None => render(&value),
            };
            ClientError::InvalidTransaction(detail)
        }
        _ => ClientError::transport_fatal(render(&value)),
    }
}

/// Trait for servers that can handle loopback requests.
pub trait LoopbackServer: Send + Sync {
    /// Handles a request for `path` (the URL path without its leading `/`,
    /// plus the query string).
    fn handle(&self, method: Method, path: &str, headers: Headers<'_>, body: &[u8]) -> HttpResponse;
}

/// A loopback HTTP client that routes requests directly to an in-process
/// server.
///
/// Useful for testing without actual network overhead.
pub struct LoopbackClient<S: LoopbackServer> {
    server: S,
}

impl<S: LoopbackServer> LoopbackClient<S> {
    /// Creates a new loopback client connected to the given server.
    pub fn new(server: S) -> Self {
        Self { server }
    }

    /// Returns the server.
    pub fn server(&self) -> &S {
        &self.server
    }

    fn dispatch(&self, method: Method, url: &str, headers: Headers<'_>, body: &[u8]) -> Result<HttpResponse, HttpError> {
        let parsed = url::Url::parse(url).map_err(|e| HttpError::Failed(format!("{url}: {e}")))?;
        let mut path = parsed.path().trim_start_matches('/').to_string();
        if let Some(query) = parsed.query() {
            path.push('?');
            path.push_str(query);
        }
        Ok(self.server.handle(method, &path, headers, body))
    }
}

impl<S: LoopbackServer> HttpClient for LoopbackClient<S> {
    fn head(&self, url: &str, headers: Headers<'_>, _timeout: Duration) -> Result<HttpResponse, HttpError> {
        self.dispatch(Method::Head, url, headers, &[])
    }

    fn get(&self, url: &str, headers: Headers<'_>, _timeout: Duration) -> Result<HttpResponse, HttpError> {
        self.dispatch(Method::Get, url, headers, &[])
    }

    fn post(
        &self,
        url: &str,
        headers: Headers<'_>,
        body: Vec<u8>,
        _timeout: Duration,
    ) -> Result<HttpResponse, HttpError> {
        self.dispatch(Method::Post, url, headers, &body)
    }
}
