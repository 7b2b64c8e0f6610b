//! Index management for Elasticsearch.

use http::{HeaderMap, Method, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::document::ShardStats;
use crate::error::{ElasticsearchError, Result};
use crate::pipeline::{ResponsePipeline, encode_json, json_headers};
use crate::url_builder::UrlBuilder;

/// Index manager for creating and managing indices.
#[derive(Debug, Clone)]
pub struct IndexManager {
    urls: UrlBuilder,
    pipeline: ResponsePipeline,
}

impl IndexManager {
    /// Create a new index manager.
    pub(crate) fn new(urls: UrlBuilder, pipeline: ResponsePipeline) -> Self {
        Self { urls, pipeline }
    }

    /// Create an index with mappings and settings.
    ///
    /// Sends `PUT /{name}` with body `{"mappings": ..., "settings": ...}`.
    pub async fn create<M, S>(
        &self,
        name: &str,
        mappings: &M,
        settings: &S,
    ) -> Result<AcknowledgedResponse>
    where
        M: Serialize + ?Sized,
        S: Serialize + ?Sized,
    {
        info!(index = %name, "Creating index");

        let body = encode_json(&CreateIndexBody { mappings, settings })?;
        let url = self.urls.build_segments(&[name], &[])?;
        self.pipeline
            .send(Method::PUT, &url, json_headers(), Some(body))
            .await
    }

    /// Delete an index.
    pub async fn delete(&self, name: &str) -> Result<AcknowledgedResponse> {
        info!(index = %name, "Deleting index");

        let url = self.urls.build_segments(&[name], &[])?;
        self.pipeline
            .send(Method::DELETE, &url, HeaderMap::new(), None)
            .await
    }

    /// Check if an index exists.
    ///
    /// `200` means it exists and `404` that it does not. Any other status is
    /// reported as [`UnexpectedStatus`](ElasticsearchError::UnexpectedStatus).
    pub async fn exists(&self, name: &str) -> Result<bool> {
        let url = self.urls.build_segments(&[name], &[])?;
        let response = self
            .pipeline
            .execute(Method::HEAD, &url, HeaderMap::new(), None)
            .await?;

        debug!(index = %name, status = %response.status(), "Index exists check");

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(ElasticsearchError::UnexpectedStatus {
                status: status.as_u16(),
                message: format!("unexpected status checking whether index {name} exists"),
            }),
        }
    }

    /// Refresh an index, making recent writes searchable.
    pub async fn refresh(&self, name: &str) -> Result<ShardStats> {
        let url = self.urls.build_segments(&[name, "_refresh"], &[])?;
        let response: RefreshResponse = self
            .pipeline
            .send(Method::POST, &url, HeaderMap::new(), None)
            .await?;
        Ok(response.shards)
    }

    /// List all indices.
    pub async fn list(&self) -> Result<Vec<IndexInfo>> {
        let url = self.urls.build("/_cat/indices", &[("format", "json")])?;
        self.pipeline
            .send(Method::GET, &url, HeaderMap::new(), None)
            .await
    }
}

#[derive(Serialize)]
struct CreateIndexBody<'a, M: ?Sized, S: ?Sized> {
    mappings: &'a M,
    settings: &'a S,
}

#[derive(Deserialize)]
struct RefreshResponse {
    #[serde(rename = "_shards")]
    shards: ShardStats,
}

/// Acknowledgement returned by index create/delete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcknowledgedResponse {
    /// Whether the cluster acknowledged the change.
    pub acknowledged: bool,
    /// Whether the required shard copies started before the timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shards_acknowledged: Option<bool>,
    /// Index name, returned by create.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
}

/// Index information from `_cat/indices`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexInfo {
    /// Index name.
    #[serde(rename = "index")]
    pub name: String,
    /// Health status.
    #[serde(default)]
    pub health: Option<String>,
    /// Open/closed status.
    #[serde(default)]
    pub status: Option<String>,
    /// Document count, as reported.
    #[serde(rename = "docs.count", default)]
    pub docs_count: Option<String>,
    /// Store size.
    #[serde(rename = "store.size", default)]
    pub store_size: Option<String>,
}

impl IndexInfo {
    /// Document count, when reported and numeric.
    pub fn document_count(&self) -> Option<u64> {
        self.docs_count.as_deref()?.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ElasticsearchConfig;
    use crate::pipeline::tests::MockRequester;
    use serde_json::json;
    use std::sync::Arc;

    fn manager(mock: MockRequester) -> (IndexManager, Arc<MockRequester>) {
        let mock = Arc::new(mock);
        let urls = UrlBuilder::new(&ElasticsearchConfig::default()).unwrap();
        (IndexManager::new(urls, ResponsePipeline::new(mock.clone())), mock)
    }

    #[tokio::test]
    async fn test_create_index() {
        let (indices, mock) = manager(MockRequester::new().respond_json(
            200,
            json!({"acknowledged": true, "shards_acknowledged": true, "index": "items"}),
        ));

        let mappings = json!({"properties": {"name": {"type": "text"}}});
        let settings = json!({"number_of_shards": 1});
        let response = indices.create("items", &mappings, &settings).await.unwrap();
        assert!(response.acknowledged);
        assert_eq!(response.index.as_deref(), Some("items"));

        let request = mock.last_request();
        assert_eq!(request.method, Method::PUT);
        assert_eq!(request.url, "http://localhost:9200/items");
        assert_eq!(request.headers["content-type"], "application/json");
        assert_eq!(request.json(), json!({"mappings": mappings, "settings": settings}));
    }

    #[tokio::test]
    async fn test_delete_index() {
        let (indices, mock) =
            manager(MockRequester::new().respond_json(200, json!({"acknowledged": true})));

        assert!(indices.delete("items").await.unwrap().acknowledged);
        let request = mock.last_request();
        assert_eq!(request.method, Method::DELETE);
        assert!(request.body.is_empty());
    }

    #[tokio::test]
    async fn test_exists_maps_status() {
        let (indices, mock) = manager(
            MockRequester::new()
                .respond(200, "")
                .respond(404, "")
                .respond(500, ""),
        );

        assert!(indices.exists("items").await.unwrap());
        assert!(!indices.exists("missing").await.unwrap());

        let error = indices.exists("items").await.unwrap_err();
        assert!(matches!(error, ElasticsearchError::UnexpectedStatus { status: 500, .. }));
        assert_eq!(error.status_code(), Some(500));

        let requests = mock.requests();
        assert!(requests.iter().all(|r| r.method == Method::HEAD));
        assert_eq!(requests[1].url, "http://localhost:9200/missing");
    }

    #[tokio::test]
    async fn test_refresh() {
        let (indices, mock) = manager(MockRequester::new().respond_json(
            200,
            json!({"_shards": {"total": 2, "successful": 1, "failed": 0}}),
        ));

        let shards = indices.refresh("items").await.unwrap();
        assert_eq!(shards.successful, 1);
        assert_eq!(mock.last_request().url, "http://localhost:9200/items/_refresh");
    }

    #[tokio::test]
    async fn test_list() {
        let (indices, mock) = manager(MockRequester::new().respond_json(
            200,
            json!([
                {"health": "yellow", "status": "open", "index": "items", "docs.count": "12", "store.size": "8kb"},
                {"health": "red", "status": "close", "index": "archive", "docs.count": null}
            ]),
        ));

        let list = indices.list().await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].name, "items");
        assert_eq!(list[0].document_count(), Some(12));
        assert_eq!(list[1].document_count(), None);
        assert_eq!(
            mock.last_request().url,
            "http://localhost:9200/_cat/indices?format=json"
        );
    }
}
