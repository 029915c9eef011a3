//! [`HttpClient`] over `reqwest`'s blocking client.

use crate::error::{ClientError, ClientResult};
use crate::http::{Headers, HttpClient, HttpError, HttpResponse};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{HeaderName, CONTENT_TYPE, SET_COOKIE};
use reqwest::redirect::Policy;
use std::time::Duration;

/// Blocking HTTP client.
///
/// Proxies are ignored and redirects are not followed, so a `302` from a
/// status check reaches the caller as `pending`.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: Client,
}

impl ReqwestClient {
    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the HTTP stack cannot initialize.
    pub fn new() -> ClientResult<Self> {
        let client = Client::builder()
            .no_proxy()
            .redirect(Policy::none())
            .build()
            .map_err(|e| ClientError::configuration(format!("failed to build http client: {e}")))?;
        Ok(Self { client })
    }

    fn send(&self, request: RequestBuilder, headers: Headers<'_>, timeout: Duration) -> Result<HttpResponse, HttpError> {
        let request = headers
            .iter()
            .fold(request.timeout(timeout), |request, (name, value)| {
                request.header(*name, value.as_str())
            });

        let response = request.send().map_err(classify)?;
        let header = |name: HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let status = response.status().as_u16();
        let content_type = header(CONTENT_TYPE);
        let set_cookie = header(SET_COOKIE);
        let body = response.bytes().map_err(classify)?.to_vec();

        Ok(HttpResponse {
            status,
            content_type,
            set_cookie,
            body,
        })
    }
}

fn classify(err: reqwest::Error) -> HttpError {
    if err.is_timeout() {
        HttpError::Timeout
    } else {
        HttpError::Failed(err.to_string())
    }
}

impl HttpClient for ReqwestClient {
    fn head(&self, url: &str, headers: Headers<'_>, timeout: Duration) -> Result<HttpResponse, HttpError> {
        self.send(self.client.head(url), headers, timeout)
    }

    fn get(&self, url: &str, headers: Headers<'_>, timeout: Duration) -> Result<HttpResponse, HttpError> {
        self.send(self.client.get(url), headers, timeout)
    }

    fn post(
        &self,
        url: &str,
        headers: Headers<'_>,
        body: Vec<u8>,
        timeout: Duration,
    ) -> Result<HttpResponse, HttpError> {
        self.send(self.client.post(url).body(body), headers, timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_host_is_a_transport_failure() {
        let client = ReqwestClient::new().unwrap();
        // Port 9 (discard) on localhost is closed in test environments.
        let result = client.get("http://127.0.0.1:9/status", &[], Duration::from_millis(500));
        assert!(result.is_err());
        let err = ClientError::from(result.unwrap_err());
        assert!(err.is_transport_failure());
    }
}
