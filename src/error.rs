//! Error types for store operations.

use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

use crate::backend::OpKind;

/// Crate-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    /// A document failed schema validation before serialization.
    #[error("validation failed for field '{field}': {message}")]
    Validation {
        /// Offending field name.
        field: String,
        /// What was wrong with the value.
        message: String,
    },

    /// A document or index the operation targeted does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// An operation required a pre-assigned identifier the document lacks.
    #[error("'id' missing from document")]
    MissingId,

    /// A store response lacks the fields needed to make sense of it.
    #[error("invalid response from the store: {0}")]
    InvalidResponse(String),

    /// A document type declaration is incomplete or inconsistent.
    #[error("invalid document definition: {0}")]
    Definition(String),

    /// Index creation hit an index that already exists.
    #[error("index already exists: {0}")]
    IndexExists(String),

    /// One or more operations of a bulk commit were rejected.
    #[error("bulk commit failed: {} operation(s) rejected", .0.len())]
    Session(SessionFailures),

    /// Connection setup failed.
    #[error("connection error: {0}")]
    Connection(String),

    /// The store rejected a request.
    #[error("store error ({status}): {reason}")]
    Store {
        /// HTTP status code reported by the store.
        status: u16,
        /// Reason extracted from the error body.
        reason: String,
    },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Transport error from the underlying client.
    #[error("transport error: {0}")]
    Transport(#[from] opensearch::Error),
}

impl Error {
    pub(crate) fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A single rejected bulk operation.
///
/// Retains the original operation's target so the caller can identify it:
/// the index it was addressed to, the identifier (the enqueued one, or the
/// one the store assigned), and the submitted body.
#[derive(Debug, Clone)]
pub struct BulkFailure {
    /// Target index of the rejected operation.
    pub index: String,
    /// Document identifier, when one was known.
    pub id: Option<String>,
    /// Submitted document body, for operations that carried one.
    pub body: Option<Value>,
    /// HTTP status the store reported for this item.
    pub status: u16,
    /// Failure reason extracted from the item's error object.
    pub reason: Option<String>,
}

/// Failures of one bulk commit, grouped by operation kind.
///
/// Produced only after every buffered operation has been attempted; the
/// store applies no cross-document transaction, so operations that
/// succeeded in the same commit stay applied.
#[derive(Debug, Clone, Default)]
pub struct SessionFailures {
    by_kind: BTreeMap<OpKind, Vec<BulkFailure>>,
}

impl SessionFailures {
    pub(crate) fn push(&mut self, kind: OpKind, failure: BulkFailure) {
        self.by_kind.entry(kind).or_default().push(failure);
    }

    /// Total number of rejected operations.
    pub fn len(&self) -> usize {
        self.by_kind.values().map(Vec::len).sum()
    }

    /// True when no operation was rejected.
    pub fn is_empty(&self) -> bool {
        self.by_kind.is_empty()
    }

    /// Rejected operations of one kind, in enqueue order.
    pub fn of(&self, kind: OpKind) -> &[BulkFailure] {
        self.by_kind.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All failures, grouped by operation kind.
    pub fn by_kind(&self) -> &BTreeMap<OpKind, Vec<BulkFailure>> {
        &self.by_kind
    }
}
