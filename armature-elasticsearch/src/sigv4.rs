//! AWS SigV4 signed requests for Amazon OpenSearch Service / Elasticsearch domains.

use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use aws_sigv4::http_request::{
    SignableBody, SignableRequest, SigningParams, SigningSettings, sign,
};
use aws_sigv4::sign::v4;
use bytes::Bytes;
use http::{HeaderName, HeaderValue, Request};
use tracing::{debug, trace};

use crate::config::DEFAULT_REQUEST_TIMEOUT;
use crate::error::{ElasticsearchError, Result};
use crate::requester::{RawResponse, Requester, send};

/// Service name used in the credential scope of managed domains.
pub const DEFAULT_SERVICE: &str = "es";

/// Requester that signs every request with AWS SigV4 before sending it over
/// the same `reqwest` transport as [`HttpRequester`](crate::HttpRequester).
#[derive(Clone)]
pub struct SigV4Requester {
    client: reqwest::Client,
    region: String,
    service: String,
    credentials: SharedCredentialsProvider,
    timeout: Duration,
}

impl SigV4Requester {
    /// Create a signing requester for a region and credential provider.
    pub fn new(
        client: reqwest::Client,
        region: impl Into<String>,
        credentials: impl ProvideCredentials + 'static,
    ) -> Self {
        Self {
            client,
            region: region.into(),
            service: DEFAULT_SERVICE.to_string(),
            credentials: SharedCredentialsProvider::new(credentials),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Create a signing requester from the default AWS environment
    /// (environment variables, profile files, instance metadata).
    pub async fn from_env(client: reqwest::Client) -> Result<Self> {
        let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;

        let region = sdk_config
            .region()
            .map(|r| r.as_ref().to_string())
            .ok_or_else(|| ElasticsearchError::Transport("No AWS region configured".to_string()))?;
        let credentials = sdk_config.credentials_provider().ok_or_else(|| {
            ElasticsearchError::Transport("No AWS credentials provider configured".to_string())
        })?;

        debug!(region = %region, "Loaded AWS signing configuration");

        Ok(Self {
            client,
            region,
            service: DEFAULT_SERVICE.to_string(),
            credentials,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    /// Set the signing service name (`es` for managed domains, `aoss` for serverless).
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = service.into();
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get the signing region.
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Add SigV4 headers to a request.
    fn sign_request(
        &self,
        request: &mut Request<Bytes>,
        credentials: Credentials,
        time: SystemTime,
    ) -> Result<()> {
        let identity = credentials.into();
        let params: SigningParams<'_> = v4::SigningParams::builder()
            .identity(&identity)
            .region(&self.region)
            .name(&self.service)
            .time(time)
            .settings(SigningSettings::default())
            .build()
            .map_err(|e| signing_error(&e))?
            .into();

        let uri = request.uri().to_string();
        let headers: Vec<(&str, &str)> = request
            .headers()
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v)))
            .collect();
        let signable = SignableRequest::new(
            request.method().as_str(),
            uri.as_str(),
            headers.into_iter(),
            SignableBody::Bytes(request.body()),
        )
        .map_err(|e| signing_error(&e))?;

        let (instructions, _signature) = sign(signable, &params)
            .map_err(|e| signing_error(&e))?
            .into_parts();

        let signed: Vec<(String, String)> = instructions
            .headers()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();

        for (name, value) in signed {
            let name = HeaderName::try_from(name.as_str())
                .map_err(|e| signing_error(&e))?;
            let mut value = HeaderValue::try_from(value.as_str())
                .map_err(|e| signing_error(&e))?;
            if name == http::header::AUTHORIZATION || name.as_str() == "x-amz-security-token" {
                value.set_sensitive(true);
            }
            request.headers_mut().insert(name, value);
        }

        Ok(())
    }
}

#[async_trait]
impl Requester for SigV4Requester {
    async fn execute(&self, mut request: Request<Bytes>) -> Result<RawResponse> {
        let credentials = self
            .credentials
            .provide_credentials()
            .await
            .map_err(|e| ElasticsearchError::Transport(format!("AWS credentials: {e}")))?;

        self.sign_request(&mut request, credentials, SystemTime::now())?;
        trace!(region = %self.region, service = %self.service, "Signed request");

        send(&self.client, request, self.timeout).await
    }
}

impl std::fmt::Debug for SigV4Requester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigV4Requester")
            .field("region", &self.region)
            .field("service", &self.service)
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn signing_error(error: &dyn std::fmt::Display) -> ElasticsearchError {
    ElasticsearchError::Transport(format!("SigV4 signing failed: {error}"))
}
