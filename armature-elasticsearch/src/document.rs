//! Document envelopes and write results.

use std::fmt::Display;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A document that knows its own identifier.
///
/// # Example
///
/// ```rust
/// use armature_elasticsearch::Identifiable;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Serialize, Deserialize)]
/// struct Product {
///     sku: String,
///     name: String,
/// }
///
/// impl Identifiable for Product {
///     type Id = String;
///
///     fn id(&self) -> &String {
///         &self.sku
///     }
/// }
/// ```
pub trait Identifiable {
    /// Identifier type, rendered into the request path.
    type Id: Display;

    /// Returns the document identifier.
    fn id(&self) -> &Self::Id;
}

/// A document with its metadata, as returned by get and search hits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document<T> {
    /// Document ID.
    #[serde(rename = "_id")]
    pub id: String,
    /// Index name.
    #[serde(rename = "_index")]
    pub index: String,
    /// Document version.
    #[serde(rename = "_version", default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    /// Relevance score, present on search hits.
    #[serde(rename = "_score", default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Sort values, present when the search was sorted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<Value>,
    /// The document data.
    #[serde(rename = "_source")]
    pub source: T,
}

impl<T> Document<T> {
    /// Consume the envelope and return the document.
    pub fn into_source(self) -> T {
        self.source
    }
}

/// Shard acknowledgement counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardStats {
    /// Shards the operation targeted.
    pub total: u32,
    /// Shards that succeeded.
    pub successful: u32,
    /// Shards that were skipped.
    #[serde(default)]
    pub skipped: u32,
    /// Shards that failed.
    pub failed: u32,
}

/// Result of a single-document write (create, update, delete).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteResponse {
    /// Document ID, engine-assigned for auto-id creates.
    #[serde(rename = "_id")]
    pub id: String,
    /// Index name.
    #[serde(rename = "_index")]
    pub index: String,
    /// Document version after the write.
    #[serde(rename = "_version")]
    pub version: u64,
    /// Outcome, e.g. `created`, `updated`, `deleted`, `noop`.
    pub result: String,
    /// Shard acknowledgements.
    #[serde(rename = "_shards")]
    pub shards: ShardStats,
    /// Sequence number.
    #[serde(rename = "_seq_no", default, skip_serializing_if = "Option::is_none")]
    pub seq_no: Option<u64>,
    /// Primary term.
    #[serde(rename = "_primary_term", default, skip_serializing_if = "Option::is_none")]
    pub primary_term: Option<u64>,
}

/// Result of a create.
pub type CreateResponse = WriteResponse;
/// Result of an update.
pub type UpdateResponse = WriteResponse;
/// Result of a delete.
pub type DeleteResponse = WriteResponse;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        name: String,
    }

    #[test]
    fn test_get_envelope() {
        let document: Document<Item> = serde_json::from_value(json!({
            "_index": "items",
            "_id": "1",
            "_version": 3,
            "_seq_no": 7,
            "_primary_term": 1,
            "found": true,
            "_source": {"name": "apple"}
        }))
        .unwrap();

        assert_eq!(document.id, "1");
        assert_eq!(document.index, "items");
        assert_eq!(document.version, Some(3));
        assert!(document.sort.is_none());
        assert_eq!(document.into_source().name, "apple");
    }

    #[test]
    fn test_search_hit_envelope() {
        let document: Document<Item> = serde_json::from_value(json!({
            "_index": "items",
            "_id": "2",
            "_score": null,
            "_source": {"name": "pear"},
            "sort": [1700000000, "2"]
        }))
        .unwrap();

        assert!(document.version.is_none());
        assert!(document.score.is_none());
        assert_eq!(document.sort, Some(json!([1700000000, "2"])));
    }

    #[test]
    fn test_write_response() {
        let response: WriteResponse = serde_json::from_value(json!({
            "_index": "items",
            "_id": "W0tpsmIBdwcYyG50zbta",
            "_version": 1,
            "result": "created",
            "_shards": {"total": 2, "successful": 1, "failed": 0},
            "_seq_no": 0,
            "_primary_term": 1
        }))
        .unwrap();

        assert_eq!(response.result, "created");
        assert_eq!(response.shards.skipped, 0);
        assert_eq!(response.seq_no, Some(0));
    }
}
