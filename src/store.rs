//! Shared handle to the document store.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::backend::{Refresh, SearchBackend};
use crate::bulk::BulkSession;
use crate::client::OpenSearchBackend;
use crate::config::StoreConfig;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::index::IndexManager;
use crate::response::SearchResponse;

/// Handle to the document store, passed explicitly wherever the store is
/// needed.
///
/// Cloning is cheap — clones share one backend, which must itself be safe
/// for concurrent use. The handle performs no locking and caches nothing:
/// every read re-queries the store.
#[derive(Clone)]
pub struct Store {
    backend: Arc<dyn SearchBackend>,
}

impl Store {
    /// Connect to a cluster described by `config`.
    pub fn connect(config: StoreConfig) -> Result<Self> {
        Ok(Self::with_backend(Arc::new(OpenSearchBackend::new(config)?)))
    }

    /// Build a store over any backend implementation.
    pub fn with_backend(backend: Arc<dyn SearchBackend>) -> Self {
        Self { backend }
    }

    pub(crate) fn backend(&self) -> &dyn SearchBackend {
        self.backend.as_ref()
    }

    /// Validate and upsert one document, assigning the returned
    /// identifier back onto it.
    ///
    /// A document that already carries an identifier is replaced in
    /// place (idempotent); otherwise the store generates a fresh one.
    /// `index` overrides the type's logical index.
    pub async fn save<T: Document>(
        &self,
        doc: &mut T,
        index: Option<&str>,
        refresh: Option<bool>,
    ) -> Result<String> {
        let body = Value::Object(doc.to_wire()?);
        let index = index.unwrap_or(T::index_name());
        let id = self
            .backend
            .index_document(index, doc.id(), &body, Refresh::from_option(refresh))
            .await?;
        doc.set_id(id.clone());
        Ok(id)
    }

    /// Fetch one document by identifier. [`Error::NotFound`] when the
    /// store has no such document.
    pub async fn get<T: Document>(&self, id: &str, index: Option<&str>) -> Result<T> {
        let index = index.unwrap_or(T::index_name());
        let raw = self.backend.get_document(index, id).await?;
        T::from_wire(&raw)?
            .ok_or_else(|| Error::InvalidResponse("empty response for get".to_string()))
    }

    /// Delete one document.
    ///
    /// [`Error::MissingId`] when the document was never assigned an
    /// identifier; [`Error::NotFound`] when the store has no such
    /// document — kept distinguishable so callers can treat "already
    /// gone" as success.
    pub async fn delete<T: Document>(
        &self,
        doc: &T,
        index: Option<&str>,
        refresh: Option<bool>,
    ) -> Result<()> {
        let id = doc.id().ok_or(Error::MissingId)?;
        let index = index.unwrap_or(T::index_name());
        self.backend
            .delete_document(index, id, Refresh::from_option(refresh))
            .await
    }

    /// Run a search against the type's logical index, delegating the
    /// query verbatim.
    pub async fn search<T: Document>(&self, query: Value) -> Result<SearchResponse<T>> {
        debug!(index = T::index_name(), "search");
        let raw = self.backend.search(T::index_name(), &query).await?;
        Ok(SearchResponse::new(query, raw))
    }

    /// Validate and index a batch of documents through an implicit
    /// refresh-enabled session, patching the assigned identifiers onto
    /// the documents and returning them in input order.
    pub async fn bulk_index<T: Document>(&self, docs: &mut [T]) -> Result<Vec<String>> {
        let mut session = self.session().with_refresh(true);
        session.index_documents(docs).await
    }

    /// Open a bulk session for this store.
    pub fn session(&self) -> BulkSession {
        BulkSession::new(self.clone())
    }

    /// The lifecycle manager for a document type's logical index.
    pub fn index<T: Document>(&self) -> IndexManager<T> {
        IndexManager::new(self.clone())
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}
