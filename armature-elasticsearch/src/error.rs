//! Error types for Elasticsearch operations.

use std::time::Duration;

use bytes::Bytes;
use thiserror::Error;

use crate::bulk::BulkOperationKind;
use crate::config::ValidationError;

/// Result type alias for Elasticsearch operations.
pub type Result<T> = std::result::Result<T, ElasticsearchError>;

/// Elasticsearch client error.
///
/// Errors fall into three groups:
///
/// - caller-input violations detected before any request is sent
///   ([`Validation`](Self::Validation), [`EmptyBulkOperation`](Self::EmptyBulkOperation),
///   [`MissingPayload`](Self::MissingPayload), [`Encode`](Self::Encode));
/// - failures where no response was obtained ([`Transport`](Self::Transport),
///   [`Timeout`](Self::Timeout));
/// - failures after a response arrived ([`BadStatus`](Self::BadStatus),
///   [`UnexpectedStatus`](Self::UnexpectedStatus), [`Decode`](Self::Decode)).
#[derive(Error, Debug)]
pub enum ElasticsearchError {
    /// Connection configuration was rejected at client construction.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The transport failed before a response was received.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The request did not complete within the requester's timeout.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The server answered with a non-2xx status.
    #[error("Bad status code from Elasticsearch: {status} - {message}")]
    BadStatus {
        /// HTTP status code.
        status: u16,
        /// Error message.
        message: String,
        /// Request body, truncated to the diagnostic limit.
        request_body: Bytes,
        /// Response body, truncated to the diagnostic limit.
        response_body: Bytes,
    },

    /// The server answered with a status the operation has no meaning for.
    #[error("Unexpected status code from Elasticsearch: {status} - {message}")]
    UnexpectedStatus {
        /// HTTP status code.
        status: u16,
        /// Error message.
        message: String,
    },

    /// A 2xx response body could not be decoded into the expected type.
    #[error("Failed to convert response into {type_name}: {source}")]
    Decode {
        /// Name of the expected type.
        type_name: &'static str,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// A request body could not be serialized.
    #[error("Serialization error: {0}")]
    Encode(#[source] serde_json::Error),

    /// A bulk request was issued with no operations.
    #[error("No operations to perform for the bulk API")]
    EmptyBulkOperation,

    /// A bulk operation that needs a payload serialized to `null`.
    #[error("No document provided for {kind} bulk operation")]
    MissingPayload {
        /// The offending operation kind.
        kind: BulkOperationKind,
    },

    /// The request URL could not be composed.
    #[error("Malformed URL: {0}")]
    MalformedUrl(String),
}

impl ElasticsearchError {
    /// Get the HTTP status code, present only when a response was received.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::BadStatus { status, .. } | Self::UnexpectedStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Check if this is a timeout error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Check if no response was obtained from the server.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout(_))
    }

    /// Check if the caller's input was rejected before anything was sent.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::Encode(_)
                | Self::EmptyBulkOperation
                | Self::MissingPayload { .. }
        )
    }
}
