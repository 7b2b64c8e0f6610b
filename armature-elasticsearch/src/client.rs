//! Elasticsearch client implementation.

use std::fmt::Display;
use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderMap, Method};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::bulk::{self, BulkOperation, BulkResponse, NDJSON_CONTENT_TYPE};
use crate::config::ElasticsearchConfig;
use crate::document::{
    CreateResponse, DeleteResponse, Document, Identifiable, UpdateResponse,
};
use crate::error::{ElasticsearchError, Result};
use crate::index::{AcknowledgedResponse, IndexManager};
use crate::pipeline::{ResponsePipeline, content_type, encode_json, json_headers, truncate};
use crate::requester::{HttpRequester, Requester};
use crate::search::{CountResponse, PaginatedSearch, SearchResponse};
use crate::url_builder::UrlBuilder;

/// Elasticsearch client for document operations.
///
/// Cheap to clone; clones share the configuration and requester.
#[derive(Clone)]
pub struct ElasticsearchClient {
    config: Arc<ElasticsearchConfig>,
    urls: UrlBuilder,
    pipeline: ResponsePipeline,
}

impl ElasticsearchClient {
    /// Create a client with a new HTTP client and the configured basic auth.
    pub fn new(config: ElasticsearchConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| ElasticsearchError::Transport(e.to_string()))?;
        Self::with_http_client(config, http)
    }

    /// Create a client over an existing HTTP client.
    ///
    /// The HTTP client is shared, never closed by this crate.
    pub fn with_http_client(config: ElasticsearchConfig, http: reqwest::Client) -> Result<Self> {
        let requester = HttpRequester::from_config(http, &config);
        Self::with_requester(config, Arc::new(requester))
    }

    /// Create a client over any [`Requester`].
    ///
    /// Fails with [`Validation`](ElasticsearchError::Validation) if the
    /// configuration is rejected.
    pub fn with_requester(
        config: ElasticsearchConfig,
        requester: Arc<dyn Requester>,
    ) -> Result<Self> {
        let urls = UrlBuilder::new(&config)?;

        info!(
            scheme = %config.scheme,
            host = %config.host,
            port = ?config.port,
            "Initializing Elasticsearch client"
        );

        Ok(Self {
            config: Arc::new(config),
            urls,
            pipeline: ResponsePipeline::new(requester),
        })
    }

    /// Create a client that signs requests with AWS SigV4 using credentials
    /// and region from the environment.
    #[cfg(feature = "aws-auth")]
    pub async fn with_aws_signing(
        config: ElasticsearchConfig,
        http: reqwest::Client,
    ) -> Result<Self> {
        let requester = crate::sigv4::SigV4Requester::from_env(http)
            .await?
            .with_timeout(config.request_timeout);
        Self::with_requester(config, Arc::new(requester))
    }

    /// Get the configuration.
    pub fn config(&self) -> &ElasticsearchConfig {
        &self.config
    }

    /// Get the requester in use.
    pub fn requester(&self) -> &Arc<dyn Requester> {
        self.pipeline.requester()
    }

    /// Get an index manager for index operations.
    pub fn indices(&self) -> IndexManager {
        IndexManager::new(self.urls.clone(), self.pipeline.clone())
    }

    // =========================================================================
    // Document Operations
    // =========================================================================

    /// Get a document by ID. A missing document is a `404`
    /// [`BadStatus`](ElasticsearchError::BadStatus).
    pub async fn get<T: DeserializeOwned>(
        &self,
        id: impl Display,
        index: &str,
    ) -> Result<Document<T>> {
        let id = id.to_string();
        debug!(index = %index, id = %id, "Getting document");

        let url = self.urls.build_segments(&[index, "_doc", &id], &[])?;
        self.pipeline
            .send(Method::GET, &url, HeaderMap::new(), None)
            .await
    }

    /// Create a document with an engine-assigned ID.
    pub async fn create_document<T: Serialize + ?Sized>(
        &self,
        document: &T,
        index: &str,
    ) -> Result<CreateResponse> {
        debug!(index = %index, "Creating document with generated ID");

        let url = self.urls.build_segments(&[index, "_doc"], &[])?;
        self.send_json(Method::POST, &url, document).await
    }

    /// Create a document under its own ID.
    pub async fn create_document_with_id<T>(
        &self,
        document: &T,
        index: &str,
    ) -> Result<CreateResponse>
    where
        T: Serialize + Identifiable + ?Sized,
    {
        let id = document.id().to_string();
        debug!(index = %index, id = %id, "Creating document");

        let url = self.urls.build_segments(&[index, "_doc", &id], &[])?;
        self.send_json(Method::POST, &url, document).await
    }

    /// Replace a document.
    pub async fn update_document<T: Serialize + ?Sized>(
        &self,
        document: &T,
        id: impl Display,
        index: &str,
    ) -> Result<UpdateResponse> {
        let id = id.to_string();
        debug!(index = %index, id = %id, "Updating document");

        let url = self.urls.build_segments(&[index, "_doc", &id], &[])?;
        self.send_json(Method::PUT, &url, document).await
    }

    /// Replace a document under its own ID.
    pub async fn update_identifiable<T>(&self, document: &T, index: &str) -> Result<UpdateResponse>
    where
        T: Serialize + Identifiable + ?Sized,
    {
        self.update_document(document, document.id(), index).await
    }

    /// Update a document with a script, sent as `{"script": ...}`.
    pub async fn update_document_with_script<S: Serialize + ?Sized>(
        &self,
        script: &S,
        id: impl Display,
        index: &str,
    ) -> Result<UpdateResponse> {
        #[derive(Serialize)]
        struct ScriptBody<'a, S: ?Sized> {
            script: &'a S,
        }

        let id = id.to_string();
        debug!(index = %index, id = %id, "Updating document with script");

        let url = self.urls.build_segments(&[index, "_update", &id], &[])?;
        self.send_json(Method::POST, &url, &ScriptBody { script }).await
    }

    /// Delete a document.
    pub async fn delete_document(&self, id: impl Display, index: &str) -> Result<DeleteResponse> {
        let id = id.to_string();
        debug!(index = %index, id = %id, "Deleting document");

        let url = self.urls.build_segments(&[index, "_doc", &id], &[])?;
        self.pipeline
            .send(Method::DELETE, &url, HeaderMap::new(), None)
            .await
    }

    // =========================================================================
    // Search
    // =========================================================================

    /// Search an index with a query-string term (`?q=`).
    pub async fn search<T: DeserializeOwned>(
        &self,
        index: &str,
        term: &str,
    ) -> Result<SearchResponse<T>> {
        let url = self.urls.build_segments(&[index, "_search"], &[("q", term)])?;
        self.pipeline
            .send(Method::GET, &url, HeaderMap::new(), None)
            .await
    }

    /// Paginated query-string search.
    pub async fn search_paginated<T: DeserializeOwned>(
        &self,
        index: &str,
        term: &str,
        size: u64,
        offset: u64,
    ) -> Result<SearchResponse<T>> {
        self.search_with_body(index, &PaginatedSearch::query_string(term, size, offset))
            .await
    }

    /// Paginated search with a caller-supplied query clause, sent as
    /// `{"from", "size", "query": <query>}`.
    pub async fn search_with_query<T, Q>(
        &self,
        index: &str,
        query: &Q,
        size: u64,
        offset: u64,
    ) -> Result<SearchResponse<T>>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        self.search_with_body(index, &PaginatedSearch::new(query, size, offset))
            .await
    }

    /// Search with a prepared paginated body, e.g. one carrying
    /// [`SearchOptions`](crate::SearchOptions).
    pub async fn search_with_body<T, Q>(
        &self,
        index: &str,
        body: &PaginatedSearch<Q>,
    ) -> Result<SearchResponse<T>>
    where
        T: DeserializeOwned,
        Q: Serialize,
    {
        self.custom_search(index, body).await
    }

    /// Search with a complete caller-supplied body.
    pub async fn custom_search<T, Q>(&self, index: &str, body: &Q) -> Result<SearchResponse<T>>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        self.custom_search_raw(index, encode_json(body)?).await
    }

    /// Search with a pre-encoded JSON body.
    pub async fn custom_search_raw<T: DeserializeOwned>(
        &self,
        index: &str,
        body: impl Into<Bytes>,
    ) -> Result<SearchResponse<T>> {
        let url = self.urls.build_segments(&[index, "_search"], &[])?;
        self.pipeline
            .send(Method::GET, &url, json_headers(), Some(body.into()))
            .await
    }

    /// Count documents, optionally matching a query-string term.
    pub async fn count(&self, index: &str, term: Option<&str>) -> Result<CountResponse> {
        let query: Vec<(&str, &str)> = term.map(|term| ("q", term)).into_iter().collect();
        let url = self.urls.build_segments(&[index, "_count"], &query)?;
        self.pipeline
            .send(Method::GET, &url, HeaderMap::new(), None)
            .await
    }

    /// Count documents matching a caller-supplied body such as `{"query": ...}`.
    pub async fn count_with_query<Q: Serialize + ?Sized>(
        &self,
        index: &str,
        body: &Q,
    ) -> Result<CountResponse> {
        let url = self.urls.build_segments(&[index, "_count"], &[])?;
        self.send_json(Method::GET, &url, body).await
    }

    // =========================================================================
    // Bulk and index operations
    // =========================================================================

    /// Execute bulk operations in order.
    ///
    /// The call succeeds when the request does; check
    /// [`BulkResponse::errors`] for per-item failures.
    pub async fn bulk<D, I>(&self, operations: &[BulkOperation<D, I>]) -> Result<BulkResponse>
    where
        D: Serialize,
        I: Display,
    {
        let body = bulk::encode(operations)?;
        debug!(operations = operations.len(), "Sending bulk request");

        let url = self.urls.build("/_bulk", &[])?;
        self.pipeline
            .send(
                Method::POST,
                &url,
                content_type(NDJSON_CONTENT_TYPE),
                Some(Bytes::from(body)),
            )
            .await
    }

    /// Create an index. See [`IndexManager::create`].
    pub async fn create_index<M, S>(
        &self,
        name: &str,
        mappings: &M,
        settings: &S,
    ) -> Result<AcknowledgedResponse>
    where
        M: Serialize + ?Sized,
        S: Serialize + ?Sized,
    {
        self.indices().create(name, mappings, settings).await
    }

    /// Delete an index.
    pub async fn delete_index(&self, name: &str) -> Result<AcknowledgedResponse> {
        self.indices().delete(name).await
    }

    /// Check if an index exists.
    pub async fn index_exists(&self, name: &str) -> Result<bool> {
        self.indices().exists(name).await
    }

    /// Send an arbitrary request and return the raw response body, truncated
    /// to [`MAX_COLLECTED_BODY`](crate::MAX_COLLECTED_BODY).
    ///
    /// A non-2xx status still fails with
    /// [`BadStatus`](ElasticsearchError::BadStatus).
    pub async fn custom(
        &self,
        path: &str,
        query: &[(&str, &str)],
        method: Method,
        body: impl Into<Bytes>,
    ) -> Result<Bytes> {
        let url = self.urls.build(path, query)?;
        let response = self
            .pipeline
            .send_raw(method, &url, json_headers(), Some(body.into()))
            .await?;
        Ok(truncate(response.into_body()))
    }

    async fn send_json<T, B>(&self, method: Method, url: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = encode_json(body)?;
        self.pipeline
            .send(method, url, json_headers(), Some(body))
            .await
    }
}

impl std::fmt::Debug for ElasticsearchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElasticsearchClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
