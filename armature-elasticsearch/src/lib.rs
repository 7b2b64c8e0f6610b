//! Elasticsearch client for the Armature framework.
//!
//! This crate provides a typed client for Elasticsearch-compatible engines:
//! - Document create, get, update, and delete
//! - Query-string, paginated, and custom-body search plus counts
//! - Bulk operations encoded as NDJSON
//! - Index creation, deletion, existence checks, refresh, and listing
//! - Pluggable request execution: basic auth over HTTP or AWS SigV4 signing
//!
//! # Example
//!
//! ```rust,no_run
//! use armature_elasticsearch::{BulkOperation, ElasticsearchClient, ElasticsearchConfig};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! struct Article {
//!     title: String,
//!     body: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ElasticsearchConfig::from_url("http://localhost:9200")?
//!         .with_basic_auth("elastic", "changeme");
//!     let client = ElasticsearchClient::new(config)?;
//!
//!     let article = Article {
//!         title: "Hello Elasticsearch".to_string(),
//!         body: "Getting started with full-text search.".to_string(),
//!     };
//!     let created = client.create_document(&article, "articles").await?;
//!
//!     client
//!         .bulk(&[
//!             BulkOperation::index("articles", created.id.clone(), article),
//!             BulkOperation::delete("articles", "stale".to_string()),
//!         ])
//!         .await?;
//!
//!     let results = client
//!         .search_paginated::<Article>("articles", "hello", 10, 0)
//!         .await?;
//!     for article in results.documents() {
//!         println!("{}", article.title);
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod bulk;
mod client;
mod config;
mod document;
mod error;
mod index;
mod pipeline;
mod requester;
mod search;
mod url_builder;

#[cfg(feature = "aws-auth")]
mod sigv4;

pub use bulk::{
    BulkItem, BulkItemError, BulkItemStatus, BulkOperation, BulkOperationKind, BulkResponse,
    NDJSON_CONTENT_TYPE, encode as encode_bulk,
};
pub use client::ElasticsearchClient;
pub use config::{
    ALLOWED_SCHEMES, DEFAULT_PORT, DEFAULT_REQUEST_TIMEOUT, ElasticsearchConfig, ValidationError,
};
pub use document::{
    CreateResponse, DeleteResponse, Document, Identifiable, ShardStats, UpdateResponse,
    WriteResponse,
};
pub use error::{ElasticsearchError, Result};
pub use index::{AcknowledgedResponse, IndexInfo, IndexManager};
pub use pipeline::{MAX_COLLECTED_BODY, ResponsePipeline};
pub use requester::{HttpRequester, RawResponse, Requester};
pub use search::{
    CountResponse, PaginatedSearch, SearchHits, SearchOptions, SearchResponse, TotalHits,
    TotalHitsRelation, TrackTotalHits,
};
pub use url_builder::UrlBuilder;

#[cfg(feature = "aws-auth")]
pub use sigv4::{DEFAULT_SERVICE, SigV4Requester};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        BulkOperation, Document, ElasticsearchClient, ElasticsearchConfig, ElasticsearchError,
        Identifiable, Requester, Result, SearchOptions, SearchResponse,
    };
}
