//! Request execution.
//!
//! The [`Requester`] trait sits between building a request and putting it on
//! the wire. The client holds an `Arc<dyn Requester>`; basic auth, AWS SigV4
//! and test doubles all plug in here.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Request, StatusCode, header};
use tracing::{debug, trace};

use crate::config::{DEFAULT_REQUEST_TIMEOUT, ElasticsearchConfig};
use crate::error::{ElasticsearchError, Result};

/// Executes a fully built HTTP request and returns the raw response.
///
/// Implementations must report failures where no response was received as
/// [`Transport`](ElasticsearchError::Transport) or
/// [`Timeout`](ElasticsearchError::Timeout), never as a status error.
#[async_trait]
pub trait Requester: Send + Sync {
    /// Execute a request.
    async fn execute(&self, request: Request<Bytes>) -> Result<RawResponse>;
}

/// An unclassified HTTP response.
#[derive(Debug, Clone)]
pub struct RawResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl RawResponse {
    /// Create a response from its parts.
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// Get the status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Get the response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get the response body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Consume the response and return the body.
    pub fn into_body(self) -> Bytes {
        self.body
    }
}

/// Direct HTTP requester over a shared `reqwest::Client`.
///
/// Adds a `Basic` authorization header when credentials are configured and
/// applies a fixed per-request timeout (30 seconds unless configured).
#[derive(Clone)]
pub struct HttpRequester {
    client: reqwest::Client,
    authorization: Option<HeaderValue>,
    timeout: Duration,
}

impl HttpRequester {
    /// Create a requester around an existing HTTP client.
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            authorization: None,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Create a requester using the credentials and timeout of a configuration.
    pub fn from_config(client: reqwest::Client, config: &ElasticsearchConfig) -> Self {
        let requester = Self::new(client).with_timeout(config.request_timeout);
        match config.credentials() {
            Some((username, password)) => requester.with_basic_auth(username, password),
            None => requester,
        }
    }

    /// Send `Authorization: Basic base64(username:password)` on every request.
    pub fn with_basic_auth(mut self, username: &str, password: &str) -> Self {
        self.authorization = basic_auth_header(username, password);
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get the per-request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl Requester for HttpRequester {
    async fn execute(&self, mut request: Request<Bytes>) -> Result<RawResponse> {
        if let Some(authorization) = &self.authorization {
            request
                .headers_mut()
                .insert(header::AUTHORIZATION, authorization.clone());
        }
        send(&self.client, request, self.timeout).await
    }
}

impl std::fmt::Debug for HttpRequester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRequester")
            .field("basic_auth", &self.authorization.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn basic_auth_header(username: &str, password: &str) -> Option<HeaderValue> {
    let encoded =
        base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"));
    let mut value = HeaderValue::from_str(&format!("Basic {encoded}")).ok()?;
    value.set_sensitive(true);
    Some(value)
}

/// Put a request on the wire and collect the response body.
pub(crate) async fn send(
    client: &reqwest::Client,
    request: Request<Bytes>,
    timeout: Duration,
) -> Result<RawResponse> {
    let (parts, body) = request.into_parts();

    trace!(
        method = %parts.method,
        url = %parts.uri,
        body = %String::from_utf8_lossy(&body),
        "Sending request"
    );
    log_headers(&parts.headers);

    let response = client
        .request(parts.method, parts.uri.to_string())
        .headers(parts.headers)
        .body(body)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| transport_error(e, timeout))?;

    let status = response.status();
    let headers = response.headers().clone();
    let body = response
        .bytes()
        .await
        .map_err(|e| transport_error(e, timeout))?;

    debug!(status = %status, bytes = body.len(), "Received response");

    Ok(RawResponse::new(status, headers, body))
}

fn transport_error(error: reqwest::Error, timeout: Duration) -> ElasticsearchError {
    if error.is_timeout() {
        ElasticsearchError::Timeout(timeout)
    } else {
        ElasticsearchError::Transport(error.to_string())
    }
}

fn log_headers(headers: &HeaderMap) {
    for (name, value) in headers {
        if value.is_sensitive() || *name == header::AUTHORIZATION {
            trace!(header = %name, "Request header <redacted>");
        } else {
            trace!(header = %name, value = ?value, "Request header");
        }
    }
}
