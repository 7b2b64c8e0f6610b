//! Response pipeline: execute, classify by status, decode.

use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Method, Request, header};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use crate::error::{ElasticsearchError, Result};
use crate::requester::{RawResponse, Requester};

/// Upper bound on request/response bytes kept for diagnostics and raw results.
pub const MAX_COLLECTED_BODY: usize = 1024 * 1024;

/// Sends requests through a [`Requester`] and classifies the responses.
///
/// A single execute-and-classify pass per call; nothing is retried.
#[derive(Clone)]
pub struct ResponsePipeline {
    requester: Arc<dyn Requester>,
}

impl ResponsePipeline {
    /// Create a pipeline over a requester.
    pub fn new(requester: Arc<dyn Requester>) -> Self {
        Self { requester }
    }

    /// Get the underlying requester.
    pub fn requester(&self) -> &Arc<dyn Requester> {
        &self.requester
    }

    /// Execute a request without classifying the status.
    pub async fn execute(
        &self,
        method: Method,
        url: &str,
        headers: HeaderMap,
        body: Option<Bytes>,
    ) -> Result<RawResponse> {
        let request = build_request(method, url, headers, body)?;
        self.requester.execute(request).await
    }

    /// Execute a request and return the raw response if its status is 2xx.
    ///
    /// Any other status fails with [`BadStatus`](ElasticsearchError::BadStatus)
    /// carrying both bodies, truncated to [`MAX_COLLECTED_BODY`].
    pub async fn send_raw(
        &self,
        method: Method,
        url: &str,
        headers: HeaderMap,
        body: Option<Bytes>,
    ) -> Result<RawResponse> {
        let request_body = body.clone().unwrap_or_default();
        let response = self.execute(method.clone(), url, headers, body).await?;
        trace!(status = %response.status(), "Response");

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let request_body = truncate(request_body);
        let response_body = truncate(response.into_body());
        trace!(
            status = %status,
            method = %method,
            url = %url,
            request_body = %String::from_utf8_lossy(&request_body),
            response_body = %String::from_utf8_lossy(&response_body),
            "Bad status from Elasticsearch"
        );

        Err(ElasticsearchError::BadStatus {
            status: status.as_u16(),
            message: error_reason(&response_body)
                .unwrap_or_else(|| "Bad status code from Elasticsearch".to_string()),
            request_body,
            response_body,
        })
    }

    /// Execute a request and decode a 2xx JSON body into `T`.
    pub async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        headers: HeaderMap,
        body: Option<Bytes>,
    ) -> Result<T> {
        let response = self.send_raw(method, url, headers, body).await?;
        decode(response.body())
    }
}

impl std::fmt::Debug for ResponsePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponsePipeline").finish_non_exhaustive()
    }
}

/// Decode a JSON body, naming the target type on failure.
pub(crate) fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(|source| {
        let type_name = std::any::type_name::<T>();
        debug!(
            type_name,
            error = %source,
            body = %String::from_utf8_lossy(&body[..body.len().min(MAX_COLLECTED_BODY)]),
            "Failed to decode response"
        );
        ElasticsearchError::Decode { type_name, source }
    })
}

/// Serialize a request body as JSON.
pub(crate) fn encode_json<T: Serialize + ?Sized>(value: &T) -> Result<Bytes> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(ElasticsearchError::Encode)
}

/// Headers carrying a content type.
pub(crate) fn content_type(value: &'static str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(value));
    headers
}

/// Headers for a JSON request body.
pub(crate) fn json_headers() -> HeaderMap {
    content_type("application/json")
}

/// Keep at most [`MAX_COLLECTED_BODY`] bytes.
pub(crate) fn truncate(body: Bytes) -> Bytes {
    if body.len() > MAX_COLLECTED_BODY {
        body.slice(..MAX_COLLECTED_BODY)
    } else {
        body
    }
}

fn build_request(
    method: Method,
    url: &str,
    headers: HeaderMap,
    body: Option<Bytes>,
) -> Result<Request<Bytes>> {
    let mut request = Request::builder()
        .method(method)
        .uri(url)
        .body(body.unwrap_or_default())
        .map_err(|e| ElasticsearchError::MalformedUrl(format!("{url}: {e}")))?;
    *request.headers_mut() = headers;
    Ok(request)
}

/// Pull `error.reason` out of an Elasticsearch error body.
fn error_reason(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    match &value["error"] {
        serde_json::Value::String(reason) => Some(reason.clone()),
        error => error["reason"].as_str().map(str::to_string),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use http::StatusCode;
    use serde::Deserialize;
    use std::sync::Mutex;

    /// A request as seen by [`MockRequester`].
    #[derive(Debug, Clone)]
    pub(crate) struct RecordedRequest {
        pub method: Method,
        pub url: String,
        pub headers: HeaderMap,
        pub body: Bytes,
    }

    impl RecordedRequest {
        pub fn json(&self) -> serde_json::Value {
            serde_json::from_slice(&self.body).unwrap()
        }

        pub fn body_text(&self) -> String {
            String::from_utf8(self.body.to_vec()).unwrap()
        }
    }

    /// Requester returning canned responses in order and recording requests.
    #[derive(Default)]
    pub(crate) struct MockRequester {
        responses: Mutex<Vec<Result<RawResponse>>>,
        requests: Mutex<Vec<RecordedRequest>>,
    }

    impl MockRequester {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn respond(self, status: u16, body: impl Into<Bytes>) -> Self {
            let response = RawResponse::new(
                StatusCode::from_u16(status).unwrap(),
                HeaderMap::new(),
                body,
            );
            self.responses.lock().unwrap().push(Ok(response));
            self
        }

        pub fn respond_json(self, status: u16, body: serde_json::Value) -> Self {
            self.respond(status, body.to_string())
        }

        pub fn fail(self, error: ElasticsearchError) -> Self {
            self.responses.lock().unwrap().push(Err(error));
            self
        }

        pub fn requests(&self) -> Vec<RecordedRequest> {
            self.requests.lock().unwrap().clone()
        }

        pub fn last_request(&self) -> RecordedRequest {
            self.requests().pop().expect("no request was sent")
        }
    }

    #[async_trait]
    impl Requester for MockRequester {
        async fn execute(&self, request: Request<Bytes>) -> Result<RawResponse> {
            let (parts, body) = request.into_parts();
            self.requests.lock().unwrap().push(RecordedRequest {
                method: parts.method,
                url: parts.uri.to_string(),
                headers: parts.headers,
                body,
            });
            let mut responses = self.responses.lock().unwrap();
            assert!(!responses.is_empty(), "unexpected request");
            responses.remove(0)
        }
    }

    fn pipeline(mock: MockRequester) -> (ResponsePipeline, Arc<MockRequester>) {
        let mock = Arc::new(mock);
        (ResponsePipeline::new(mock.clone()), mock)
    }

    #[derive(Debug, Deserialize)]
    struct Acknowledged {
        acknowledged: bool,
    }

    #[tokio::test]
    async fn test_success_statuses_are_decoded() {
        for status in [200, 201, 299] {
            let (pipeline, _) =
                pipeline(MockRequester::new().respond(status, r#"{"acknowledged":true}"#));
            let result: Acknowledged = pipeline
                .send(Method::PUT, "http://localhost:9200/items", HeaderMap::new(), None)
                .await
                .unwrap();
            assert!(result.acknowledged);
        }
    }

    #[tokio::test]
    async fn test_non_success_statuses_are_bad_status() {
        for status in [199, 300, 404, 409, 500] {
            let (pipeline, _) =
                pipeline(MockRequester::new().respond(status, r#"{"acknowledged":true}"#));
            let error = pipeline
                .send::<Acknowledged>(
                    Method::GET,
                    "http://localhost:9200/items",
                    HeaderMap::new(),
                    None,
                )
                .await
                .unwrap_err();
            assert_eq!(error.status_code(), Some(status), "status {status}");
            assert!(matches!(error, ElasticsearchError::BadStatus { .. }));
        }
    }

    #[tokio::test]
    async fn test_bad_status_carries_bodies_and_reason() {
        let (pipeline, _) = pipeline(MockRequester::new().respond_json(
            409,
            serde_json::json!({
                "error": {"type": "version_conflict_engine_exception", "reason": "document already exists"},
                "status": 409
            }),
        ));
        let error = pipeline
            .send_raw(
                Method::PUT,
                "http://localhost:9200/items/_doc/1",
                HeaderMap::new(),
                Some(Bytes::from_static(b"{\"name\":\"apple\"}")),
            )
            .await
            .unwrap_err();

        match error {
            ElasticsearchError::BadStatus {
                status,
                message,
                request_body,
                response_body,
            } => {
                assert_eq!(status, 409);
                assert_eq!(message, "document already exists");
                assert_eq!(request_body.as_ref(), b"{\"name\":\"apple\"}");
                assert!(!response_body.is_empty());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_oversized_error_body_is_truncated() {
        let huge = vec![b'x'; MAX_COLLECTED_BODY + 10];
        let (pipeline, _) = pipeline(MockRequester::new().respond(500, huge));
        let error = pipeline
            .send_raw(Method::GET, "http://localhost:9200/", HeaderMap::new(), None)
            .await
            .unwrap_err();

        match error {
            ElasticsearchError::BadStatus { response_body, message, .. } => {
                assert_eq!(response_body.len(), MAX_COLLECTED_BODY);
                assert_eq!(message, "Bad status code from Elasticsearch");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_decode_failure_names_type() {
        let (pipeline, _) = pipeline(MockRequester::new().respond(200, r#"{"unexpected":1}"#));
        let error = pipeline
            .send::<Acknowledged>(Method::GET, "http://localhost:9200/", HeaderMap::new(), None)
            .await
            .unwrap_err();

        match error {
            ElasticsearchError::Decode { type_name, .. } => {
                assert!(type_name.ends_with("Acknowledged"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_transport_error_passes_through() {
        let (pipeline, mock) = pipeline(
            MockRequester::new().fail(ElasticsearchError::Transport("connection refused".into())),
        );
        let error = pipeline
            .send::<Acknowledged>(Method::GET, "http://localhost:9200/", HeaderMap::new(), None)
            .await
            .unwrap_err();

        assert!(error.is_transport());
        assert_eq!(mock.requests().len(), 1);
    }

    #[test]
    fn test_error_reason_shapes() {
        assert_eq!(
            error_reason(br#"{"error":{"reason":"no such index [items]"}}"#).as_deref(),
            Some("no such index [items]")
        );
        assert_eq!(
            error_reason(br#"{"error":"Incorrect HTTP method"}"#).as_deref(),
            Some("Incorrect HTTP method")
        );
        assert_eq!(error_reason(b"not json"), None);
    }
}
