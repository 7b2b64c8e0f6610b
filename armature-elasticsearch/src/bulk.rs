//! Bulk operations and the NDJSON payload encoder.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::ShardStats;
use crate::error::{ElasticsearchError, Result};

/// Content type of a bulk request body.
pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

/// A single bulk operation.
///
/// Every variant carries exactly the fields valid for its kind; `Delete` has no
/// payload. `D` is the document type and `I` the document identifier.
#[derive(Debug, Clone, PartialEq)]
pub enum BulkOperation<D, I = String> {
    /// Create a document, failing if it already exists.
    Create {
        /// Target index.
        index: String,
        /// Document ID.
        id: I,
        /// Document data.
        document: D,
    },
    /// Index a document, replacing any existing one.
    Index {
        /// Target index.
        index: String,
        /// Document ID.
        id: I,
        /// Document data.
        document: D,
    },
    /// Partially update a document.
    Update {
        /// Target index.
        index: String,
        /// Document ID.
        id: I,
        /// Partial document.
        document: D,
    },
    /// Update a document with a script.
    UpdateScript {
        /// Target index.
        index: String,
        /// Document ID.
        id: I,
        /// Script body, e.g. `{"source": "...", "params": {...}}`.
        script: Value,
    },
    /// Delete a document.
    Delete {
        /// Target index.
        index: String,
        /// Document ID.
        id: I,
    },
}

impl<D, I> BulkOperation<D, I> {
    /// Create a `create` operation.
    pub fn create(index: impl Into<String>, id: I, document: D) -> Self {
        Self::Create {
            index: index.into(),
            id,
            document,
        }
    }

    /// Create an `index` operation.
    pub fn index(index: impl Into<String>, id: I, document: D) -> Self {
        Self::Index {
            index: index.into(),
            id,
            document,
        }
    }

    /// Create an `update` operation with a partial document.
    pub fn update(index: impl Into<String>, id: I, document: D) -> Self {
        Self::Update {
            index: index.into(),
            id,
            document,
        }
    }

    /// Create a scripted `update` operation.
    pub fn update_script(index: impl Into<String>, id: I, script: Value) -> Self {
        Self::UpdateScript {
            index: index.into(),
            id,
            script,
        }
    }

    /// Create a `delete` operation.
    pub fn delete(index: impl Into<String>, id: I) -> Self {
        Self::Delete {
            index: index.into(),
            id,
        }
    }

    /// Get the operation kind.
    pub fn kind(&self) -> BulkOperationKind {
        match self {
            Self::Create { .. } => BulkOperationKind::Create,
            Self::Index { .. } => BulkOperationKind::Index,
            Self::Update { .. } => BulkOperationKind::Update,
            Self::UpdateScript { .. } => BulkOperationKind::UpdateScript,
            Self::Delete { .. } => BulkOperationKind::Delete,
        }
    }

    /// Get the target index.
    pub fn target_index(&self) -> &str {
        match self {
            Self::Create { index, .. }
            | Self::Index { index, .. }
            | Self::Update { index, .. }
            | Self::UpdateScript { index, .. }
            | Self::Delete { index, .. } => index,
        }
    }

    /// Get the document ID.
    pub fn id(&self) -> &I {
        match self {
            Self::Create { id, .. }
            | Self::Index { id, .. }
            | Self::Update { id, .. }
            | Self::UpdateScript { id, .. }
            | Self::Delete { id, .. } => id,
        }
    }
}

/// Kind of a bulk operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BulkOperationKind {
    /// `create`
    Create,
    /// `index`
    Index,
    /// `update` with a partial document.
    Update,
    /// `update` with a script.
    UpdateScript,
    /// `delete`
    Delete,
}

impl BulkOperationKind {
    /// Action name used on the wire.
    pub fn action(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Index => "index",
            Self::Update | Self::UpdateScript => "update",
            Self::Delete => "delete",
        }
    }
}

impl Display for BulkOperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UpdateScript => f.write_str("update script"),
            kind => f.write_str(kind.action()),
        }
    }
}

/// Encode operations as an NDJSON bulk body.
///
/// Each operation yields an action line followed, except for deletes, by a data
/// line. Every line ends with `\n`. Nothing is returned unless every operation
/// encodes.
pub fn encode<D, I>(operations: &[BulkOperation<D, I>]) -> Result<String>
where
    D: Serialize,
    I: Display,
{
    if operations.is_empty() {
        return Err(ElasticsearchError::EmptyBulkOperation);
    }

    let mut body = String::new();
    for operation in operations {
        let kind = operation.kind();
        let meta = ActionMeta {
            index: operation.target_index(),
            id: operation.id().to_string(),
        };
        let action = serde_json::to_string(&BTreeMap::from([(kind.action(), meta)]))
            .map_err(ElasticsearchError::Encode)?;
        push_line(&mut body, &action);

        match operation {
            BulkOperation::Create { document, .. } | BulkOperation::Index { document, .. } => {
                let document = payload(document, kind)?;
                push_line(&mut body, &document);
            }
            BulkOperation::Update { document, .. } => {
                let document = payload(document, kind)?;
                push_line(&mut body, &format!("{{\"doc\":{document}}}"));
            }
            BulkOperation::UpdateScript { script, .. } => {
                let script = payload(script, kind)?;
                push_line(&mut body, &format!("{{\"script\":{script}}}"));
            }
            BulkOperation::Delete { .. } => {}
        }
    }

    Ok(body)
}

#[derive(Serialize)]
struct ActionMeta<'a> {
    #[serde(rename = "_index")]
    index: &'a str,
    #[serde(rename = "_id")]
    id: String,
}

fn payload<T: Serialize>(value: &T, kind: BulkOperationKind) -> Result<String> {
    let encoded = serde_json::to_string(value).map_err(ElasticsearchError::Encode)?;
    if encoded == "null" {
        return Err(ElasticsearchError::MissingPayload { kind });
    }
    Ok(encoded)
}

// serde_json escapes newlines inside strings, so each value is a single line.
fn push_line(body: &mut String, line: &str) {
    body.push_str(line);
    body.push('\n');
}

/// Bulk API response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkResponse {
    /// Time taken in milliseconds.
    pub took: u64,
    /// Whether any item failed.
    pub errors: bool,
    /// Per-operation results, in request order.
    pub items: Vec<BulkItem>,
}

impl BulkResponse {
    /// Items whose status is not 2xx.
    pub fn failed_items(&self) -> impl Iterator<Item = &BulkItem> {
        self.items.iter().filter(|item| !item.status().is_success())
    }
}

/// Result of one bulk operation, tagged by the action that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkItem {
    /// Index result.
    Index(BulkItemStatus),
    /// Create result.
    Create(BulkItemStatus),
    /// Update result.
    Update(BulkItemStatus),
    /// Delete result.
    Delete(BulkItemStatus),
}

impl BulkItem {
    /// Get the item status regardless of action.
    pub fn status(&self) -> &BulkItemStatus {
        match self {
            Self::Index(status)
            | Self::Create(status)
            | Self::Update(status)
            | Self::Delete(status) => status,
        }
    }

    /// Action name of the item.
    pub fn action(&self) -> &'static str {
        match self {
            Self::Index(_) => "index",
            Self::Create(_) => "create",
            Self::Update(_) => "update",
            Self::Delete(_) => "delete",
        }
    }
}

/// Status of a bulk item operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkItemStatus {
    /// Index name.
    #[serde(rename = "_index")]
    pub index: String,
    /// Document ID.
    #[serde(rename = "_id")]
    pub id: String,
    /// Document version.
    #[serde(rename = "_version", default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    /// Result, e.g. `created` or `deleted`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    /// Shard acknowledgements.
    #[serde(rename = "_shards", default, skip_serializing_if = "Option::is_none")]
    pub shards: Option<ShardStats>,
    /// HTTP status code.
    pub status: u16,
    /// Error details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<BulkItemError>,
}

impl BulkItemStatus {
    /// Check if the operation was successful.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Bulk item error details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkItemError {
    /// Error type.
    #[serde(rename = "type")]
    pub error_type: String,
    /// Error reason.
    pub reason: String,
}
