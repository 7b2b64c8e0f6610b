//! Search request bodies and results.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::document::{Document, ShardStats};

/// Whether and how precisely the engine should count total hits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TrackTotalHits {
    /// `true` counts exactly, `false` skips counting.
    Enabled(bool),
    /// Count exactly up to this many hits.
    UpTo(u64),
}

impl From<bool> for TrackTotalHits {
    fn from(value: bool) -> Self {
        Self::Enabled(value)
    }
}

impl From<u64> for TrackTotalHits {
    fn from(value: u64) -> Self {
        Self::UpTo(value)
    }
}

/// Options shared by body-carrying searches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchOptions {
    /// Sent as `track_total_hits` only when set.
    pub track_total_hits: Option<TrackTotalHits>,
}

impl SearchOptions {
    /// Create default options, leaving hit counting to the engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `track_total_hits`.
    pub fn track_total_hits(mut self, track: impl Into<TrackTotalHits>) -> Self {
        self.track_total_hits = Some(track.into());
        self
    }
}

/// Body of a paginated search: `{from, size, query}`.
#[derive(Debug, Clone, Serialize)]
pub struct PaginatedSearch<Q> {
    /// Offset of the first hit.
    pub from: u64,
    /// Maximum number of hits.
    pub size: u64,
    /// Query clause.
    pub query: Q,
    /// Hit counting, omitted unless set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_total_hits: Option<TrackTotalHits>,
}

impl<Q> PaginatedSearch<Q> {
    /// Create a paginated search body.
    pub fn new(query: Q, size: u64, from: u64) -> Self {
        Self {
            from,
            size,
            query,
            track_total_hits: None,
        }
    }

    /// Apply search options.
    pub fn with_options(mut self, options: SearchOptions) -> Self {
        self.track_total_hits = options.track_total_hits;
        self
    }
}

impl PaginatedSearch<Value> {
    /// Paginated `query_string` search for a term.
    pub fn query_string(term: &str, size: u64, from: u64) -> Self {
        Self::new(json!({ "query_string": { "query": term } }), size, from)
    }
}

/// Search response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse<T> {
    /// Time taken in milliseconds.
    #[serde(default)]
    pub took: u64,
    /// Whether the search timed out on any shard.
    #[serde(default)]
    pub timed_out: bool,
    /// Shard statistics.
    #[serde(rename = "_shards", default, skip_serializing_if = "Option::is_none")]
    pub shards: Option<ShardStats>,
    /// Hits.
    pub hits: SearchHits<T>,
    /// Aggregation results, untyped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregations: Option<Value>,
}

impl<T> SearchResponse<T> {
    /// Total hit count, when the engine reported one.
    pub fn total(&self) -> Option<&TotalHits> {
        self.hits.total.as_ref()
    }

    /// Iterate the hit documents in server order.
    pub fn documents(&self) -> impl Iterator<Item = &T> {
        self.hits.hits.iter().map(|hit| &hit.source)
    }

    /// Consume the response and return the hit documents in server order.
    pub fn into_documents(self) -> Vec<T> {
        self.hits.hits.into_iter().map(Document::into_source).collect()
    }
}

/// Hits section of a search response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHits<T> {
    /// Total hits, absent when counting was disabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<TotalHits>,
    /// Maximum score.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_score: Option<f64>,
    /// Hit documents.
    pub hits: Vec<Document<T>>,
}

/// Total hit count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotalHits {
    /// Hit count.
    pub value: u64,
    /// Whether `value` is exact or a lower bound.
    pub relation: TotalHitsRelation,
}

/// Relation of a reported total to the true hit count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TotalHitsRelation {
    /// Exact.
    Eq,
    /// Lower bound.
    Gte,
}

/// Count response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountResponse {
    /// Number of matching documents.
    pub count: u64,
    /// Shard statistics.
    #[serde(rename = "_shards")]
    pub shards: ShardStats,
}
