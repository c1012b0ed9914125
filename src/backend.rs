//! Narrow asynchronous boundary to the document store.
//!
//! Everything the mapper, the bulk session, and the index manager need
//! from the store is listed here explicitly; nothing else of the
//! underlying client leaks through. A not-found outcome is always
//! [`Error::NotFound`](crate::Error::NotFound) so callers can tell
//! "already absent" apart from real failures.

use std::fmt;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::error::Result;

/// Store-side visibility policy for a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Refresh {
    /// Block until the next periodic refresh makes the write visible.
    #[default]
    WaitFor,
    /// Force an immediate refresh.
    True,
    /// Do not force a refresh.
    False,
}

impl Refresh {
    /// Wire encoding of the policy.
    pub fn as_str(self) -> &'static str {
        match self {
            Refresh::WaitFor => "wait_for",
            Refresh::True => "true",
            Refresh::False => "false",
        }
    }

    /// An unset policy defers to the next periodic refresh.
    pub fn from_option(refresh: Option<bool>) -> Self {
        match refresh {
            None => Refresh::WaitFor,
            Some(true) => Refresh::True,
            Some(false) => Refresh::False,
        }
    }
}

/// Kind of a buffered bulk operation.
///
/// The declaration order is the order buckets are flattened in on commit;
/// result ordering is only guaranteed within one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OpKind {
    /// Upsert with a server-assigned identifier.
    Index,
    /// Create, failing if the document already exists.
    Create,
    /// Merge a document body into an existing document.
    Update,
    /// Delete by identifier.
    Delete,
}

impl OpKind {
    /// Wire name of the operation kind.
    pub fn as_str(self) -> &'static str {
        match self {
            OpKind::Index => "index",
            OpKind::Create => "create",
            OpKind::Update => "update",
            OpKind::Delete => "delete",
        }
    }

    pub(crate) fn parse(name: &str) -> Option<Self> {
        match name {
            "index" => Some(OpKind::Index),
            "create" => Some(OpKind::Create),
            "update" => Some(OpKind::Update),
            "delete" => Some(OpKind::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A buffered mutation, owned by the session that enqueued it.
#[derive(Debug, Clone)]
pub struct BulkAction {
    /// Operation kind.
    pub kind: OpKind,
    /// Target index.
    pub index: String,
    /// Document identifier; absent for server-assigned upserts.
    pub id: Option<String>,
    /// Document body; absent for deletes.
    pub source: Option<Value>,
}

impl BulkAction {
    /// Convert to bulk request lines: the action header and, for kinds
    /// that carry one, the body line. Update bodies travel as a partial
    /// document under `doc`.
    pub fn to_lines(&self) -> (Value, Option<Value>) {
        let mut meta = Map::new();
        meta.insert("_index".to_string(), Value::String(self.index.clone()));
        if let Some(id) = &self.id {
            meta.insert("_id".to_string(), Value::String(id.clone()));
        }
        let mut header = Map::new();
        header.insert(self.kind.as_str().to_string(), Value::Object(meta));

        let body = match self.kind {
            OpKind::Delete => None,
            OpKind::Update => self.source.as_ref().map(|doc| json!({ "doc": doc })),
            OpKind::Index | OpKind::Create => self.source.clone(),
        };
        (Value::Object(header), body)
    }
}

/// Asynchronous operations the core requires from the document store.
///
/// Implemented by [`OpenSearchBackend`](crate::OpenSearchBackend) for real
/// clusters; tests inject scripted implementations. Every call suspends
/// until the store responds; timeouts are a transport property and
/// surface as errors unchanged.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Fetch one document. `Error::NotFound` when it does not exist.
    async fn get_document(&self, index: &str, id: &str) -> Result<Value>;

    /// Upsert one document, returning the (possibly server-assigned)
    /// identifier. With `id` set this is a replace-by-id.
    async fn index_document(
        &self,
        index: &str,
        id: Option<&str>,
        body: &Value,
        refresh: Refresh,
    ) -> Result<String>;

    /// Delete one document. `Error::NotFound` when it does not exist.
    async fn delete_document(&self, index: &str, id: &str, refresh: Refresh) -> Result<()>;

    /// Run a search request verbatim and return the raw response.
    async fn search(&self, index: &str, query: &Value) -> Result<Value>;

    /// Submit one batched request; the response's `items` are in
    /// submission order.
    async fn bulk(&self, actions: &[BulkAction], refresh: Refresh) -> Result<Value>;

    /// True when `index` (or an alias of that name) exists.
    async fn index_exists(&self, index: &str) -> Result<bool>;

    /// Create a physical index, returning its name as reported by the
    /// store.
    async fn create_index(&self, index: &str) -> Result<String>;

    /// Delete a physical index.
    async fn delete_index(&self, index: &str) -> Result<()>;

    /// Resolve an alias to the physical indices holding it.
    /// `Error::NotFound` when the alias resolves to nothing.
    async fn get_alias(&self, alias: &str) -> Result<Vec<String>>;

    /// Apply a multi-action alias update as one atomic request.
    async fn update_aliases(&self, actions: Value) -> Result<()>;

    /// Force a refresh so subsequent reads see prior writes.
    async fn refresh_index(&self, index: &str) -> Result<()>;

    /// True when an index template of that name is registered.
    async fn template_exists(&self, name: &str) -> Result<bool>;

    /// Register an index template.
    async fn put_template(&self, name: &str, body: Value) -> Result<()>;

    /// Copy all documents from `source` into `target` store-side.
    /// `Error::NotFound` when the source resolves to nothing.
    async fn reindex(&self, source: &str, target: &str) -> Result<()>;
}
