//! Bulk session: an ordered, typed buffer of pending mutations.
//!
//! Operations are buffered per kind and submitted as one batched call on
//! [`commit`](BulkSession::commit). Within one kind, the store reports
//! results in enqueue order; the position returned by each enqueue
//! method is the key used to read the assigned identifier back out of
//! the commit results. Nothing here may reorder operations within a
//! kind.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::debug;

use crate::backend::{BulkAction, OpKind, Refresh};
use crate::document::Document;
use crate::error::{BulkFailure, Error, Result, SessionFailures};
use crate::store::Store;

/// Identifiers returned by a commit, grouped by operation kind and
/// ordered by enqueue position within each kind.
pub type CommitResults = BTreeMap<OpKind, Vec<String>>;

/// A buffer of pending mutations against one or more logical indices.
///
/// Sessions are created per unit of work via [`Store::session`] and do
/// not auto-commit: dropping a session discards whatever is still
/// buffered.
pub struct BulkSession {
    store: Store,
    actions: BTreeMap<OpKind, Vec<BulkAction>>,
    refresh: Option<bool>,
}

impl BulkSession {
    pub(crate) fn new(store: Store) -> Self {
        Self {
            store,
            actions: BTreeMap::new(),
            refresh: None,
        }
    }

    /// Set the default refresh policy for commits of this session.
    pub fn with_refresh(mut self, refresh: bool) -> Self {
        self.refresh = Some(refresh);
        self
    }

    /// True when nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Total number of buffered mutations.
    pub fn pending(&self) -> usize {
        self.actions.values().map(Vec::len).sum()
    }

    fn push(&mut self, action: BulkAction) -> usize {
        let bucket = self.actions.entry(action.kind).or_default();
        bucket.push(action);
        bucket.len() - 1
    }

    /// Buffer an upsert with a server-assigned identifier. Returns the
    /// position of the mutation within the `index` bucket.
    pub fn index(&mut self, body: Map<String, Value>, index: &str) -> usize {
        self.push(BulkAction {
            kind: OpKind::Index,
            index: index.to_string(),
            id: None,
            source: Some(Value::Object(body)),
        })
    }

    /// Buffer many bodies as `index` operations, returning their bucket
    /// positions.
    pub fn bulk_index(&mut self, bodies: Vec<Map<String, Value>>, index: &str) -> Vec<usize> {
        bodies.into_iter().map(|body| self.index(body, index)).collect()
    }

    /// Buffer a create that fails if the document already exists.
    pub fn create(&mut self, body: Map<String, Value>, id: &str, index: &str) -> usize {
        self.push(BulkAction {
            kind: OpKind::Create,
            index: index.to_string(),
            id: Some(id.to_string()),
            source: Some(Value::Object(body)),
        })
    }

    /// Buffer a merge of `body` into the document with `id`.
    pub fn update(&mut self, body: Map<String, Value>, id: &str, index: &str) -> usize {
        self.push(BulkAction {
            kind: OpKind::Update,
            index: index.to_string(),
            id: Some(id.to_string()),
            source: Some(Value::Object(body)),
        })
    }

    /// Buffer a delete of the document with `id`.
    pub fn delete(&mut self, id: &str, index: &str) -> usize {
        self.push(BulkAction {
            kind: OpKind::Delete,
            index: index.to_string(),
            id: Some(id.to_string()),
            source: None,
        })
    }

    /// Validate and buffer a typed document as an `index` operation.
    pub fn index_document<T: Document>(&mut self, doc: &T) -> Result<usize> {
        let body = doc.to_wire()?;
        Ok(self.index(body, T::index_name()))
    }

    /// Validate and buffer a typed document as a `create` operation.
    /// The document must already carry an identifier.
    pub fn create_document<T: Document>(&mut self, doc: &T) -> Result<usize> {
        let id = doc.id().ok_or(Error::MissingId)?.to_string();
        let body = doc.to_wire()?;
        Ok(self.create(body, &id, T::index_name()))
    }

    /// Validate and buffer a typed document as an `update` operation.
    ///
    /// The merge body is the full serialized record, so the update
    /// behaves as a replace of every mapped field rather than a diff.
    /// The document must already carry an identifier; the check happens
    /// here, not at commit.
    pub fn update_document<T: Document>(&mut self, doc: &T) -> Result<usize> {
        let id = doc.id().ok_or(Error::MissingId)?.to_string();
        let body = doc.to_wire()?;
        Ok(self.update(body, &id, T::index_name()))
    }

    /// Validate and buffer a typed document as a `delete` operation.
    /// The document must already carry an identifier.
    pub fn delete_document<T: Document>(&mut self, doc: &T) -> Result<usize> {
        let id = doc.id().ok_or(Error::MissingId)?.to_string();
        doc.to_wire()?;
        Ok(self.delete(&id, T::index_name()))
    }

    /// Validate and buffer a batch of typed documents, commit, and patch
    /// the assigned identifiers back onto the documents in enqueue order.
    ///
    /// Fails when the number of identifiers the store returned for the
    /// `index` bucket disagrees with the number of documents enqueued.
    pub async fn index_documents<T: Document>(&mut self, docs: &mut [T]) -> Result<Vec<String>> {
        let mut positions = Vec::with_capacity(docs.len());
        for doc in docs.iter() {
            positions.push(self.index_document(doc)?);
        }

        let mut results = self.commit(None, None).await?;
        let ids = results.remove(&OpKind::Index).unwrap_or_default();
        if ids.len() != positions.len() {
            return Err(Error::InvalidResponse(format!(
                "bulk index returned {} identifier(s) for {} document(s)",
                ids.len(),
                positions.len()
            )));
        }

        for (doc, position) in docs.iter_mut().zip(positions) {
            let id = ids.get(position).ok_or_else(|| {
                Error::InvalidResponse("bulk index result is missing a position".to_string())
            })?;
            doc.set_id(id.clone());
        }
        Ok(ids)
    }

    /// Flush every buffered mutation as one batched call.
    ///
    /// An empty session commits to an empty result without contacting the
    /// store. `chunk_size` caps the number of operations per physical
    /// request; result ordering is preserved across chunks. The buffer is
    /// cleared unconditionally, including on error, so a failed commit is
    /// never replayed.
    ///
    /// When any mutation was rejected, returns [`Error::Session`] with
    /// the failures grouped by kind — raised only after every chunk has
    /// been attempted.
    pub async fn commit(
        &mut self,
        refresh: Option<bool>,
        chunk_size: Option<usize>,
    ) -> Result<CommitResults> {
        let buckets = std::mem::take(&mut self.actions);
        if buckets.is_empty() {
            return Ok(CommitResults::new());
        }

        let refresh = Refresh::from_option(refresh.or(self.refresh));
        let flat: Vec<BulkAction> = buckets.into_values().flatten().collect();
        let total = flat.len();
        debug!(operations = total, refresh = refresh.as_str(), "committing bulk session");

        let chunk = chunk_size.unwrap_or(total).max(1);
        let mut items: Vec<Value> = Vec::with_capacity(total);
        for batch in flat.chunks(chunk) {
            let response = self.store.backend().bulk(batch, refresh).await?;
            let batch_items = response["items"].as_array().ok_or_else(|| {
                Error::InvalidResponse("bulk response has no 'items'".to_string())
            })?;
            items.extend(batch_items.iter().cloned());
        }
        if items.len() != total {
            return Err(Error::InvalidResponse(format!(
                "bulk response reported {} item(s) for {} operation(s)",
                items.len(),
                total
            )));
        }

        let mut results = CommitResults::new();
        let mut failures = SessionFailures::default();
        for (action, item) in flat.iter().zip(items.iter()) {
            let (kind, outcome) = item
                .as_object()
                .and_then(|object| object.iter().next())
                .and_then(|(key, outcome)| Some((OpKind::parse(key)?, outcome)))
                .ok_or_else(|| {
                    Error::InvalidResponse("unrecognized bulk response item".to_string())
                })?;
            if kind != action.kind {
                return Err(Error::InvalidResponse(
                    "bulk response items are out of order".to_string(),
                ));
            }

            let status = outcome["status"].as_u64().unwrap_or(0) as u16;
            let error = outcome.get("error").filter(|e| !e.is_null());
            if error.is_some() || !(200..300).contains(&status) {
                failures.push(
                    kind,
                    BulkFailure {
                        index: action.index.clone(),
                        id: action
                            .id
                            .clone()
                            .or_else(|| outcome["_id"].as_str().map(str::to_string)),
                        body: action.source.clone(),
                        status,
                        reason: error.and_then(|e| {
                            e.get("reason")
                                .and_then(Value::as_str)
                                .map(str::to_string)
                                .or_else(|| e.as_str().map(str::to_string))
                        }),
                    },
                );
            } else {
                let id = outcome["_id"].as_str().unwrap_or_default().to_string();
                results.entry(kind).or_default().push(id);
            }
        }

        if failures.is_empty() {
            Ok(results)
        } else {
            Err(Error::Session(failures))
        }
    }
}
