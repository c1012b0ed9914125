//! Typed object-document mapping for OpenSearch-compatible stores.
//!
//! This crate binds schema-validated record types to logical indices and
//! provides:
//! - Document operations (save, get, delete, search) with full
//!   re-validation before every write
//! - Bulk sessions: buffered heterogeneous mutations submitted as one
//!   batched call, with server-assigned identifiers reconciled back onto
//!   the records positionally
//! - Zero-downtime schema migrations: versioned physical indices behind
//!   an alias that is repointed in a single atomic request
//! - Typed search responses with aggregation-bucket extraction
//!
//! # Example
//!
//! ```rust,no_run
//! use opensearch_odm::{Document, FieldSpec, Schema, SetupOptions, Store, StoreConfig};
//! use serde::{Deserialize, Serialize};
//! use serde_json::json;
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! #[serde(deny_unknown_fields)]
//! struct Shirt {
//!     #[serde(default, skip_serializing_if = "Option::is_none")]
//!     id: Option<String>,
//!     brand: String,
//!     color: String,
//! }
//!
//! impl Document for Shirt {
//!     fn index_name() -> &'static str {
//!         "shirts"
//!     }
//!
//!     fn schema() -> Schema {
//!         Schema::builder()
//!             .field("brand", FieldSpec::keyword())
//!             .field("color", FieldSpec::keyword())
//!             .build()
//!     }
//!
//!     fn id(&self) -> Option<&str> {
//!         self.id.as_deref()
//!     }
//!
//!     fn set_id(&mut self, id: String) {
//!         self.id = Some(id);
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Store::connect(StoreConfig::new("http://localhost:9200"))?;
//!
//!     // Register the template, create the first physical index, bind the alias
//!     store.index::<Shirt>().setup(SetupOptions::default()).await?;
//!
//!     // Save a document; the assigned id lands back on the record
//!     let mut shirt = Shirt {
//!         id: None,
//!         brand: "gucci".to_string(),
//!         color: "red".to_string(),
//!     };
//!     store.save(&mut shirt, None, Some(true)).await?;
//!
//!     // Search
//!     let response = store
//!         .search::<Shirt>(json!({ "query": { "term": { "color": "red" } } }))
//!         .await?;
//!     for shirt in response.documents()? {
//!         println!("{} ({})", shirt.brand, shirt.color);
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod backend;
mod bulk;
mod client;
mod config;
mod document;
mod error;
mod index;
mod response;
mod schema;
mod store;
pub mod validators;

#[cfg(test)]
mod testutil;

pub use backend::{BulkAction, OpKind, Refresh, SearchBackend};
pub use bulk::{BulkSession, CommitResults};
pub use client::OpenSearchBackend;
pub use config::StoreConfig;
pub use document::{validate_definition, Document, IndexSettings};
pub use error::{BulkFailure, Error, Result, SessionFailures};
pub use index::{IndexManager, SetupOptions};
pub use response::SearchResponse;
pub use schema::{FieldSpec, FieldType, FieldValidator, Schema, SchemaBuilder};
pub use store::Store;

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        Document, Error, FieldSpec, IndexSettings, Result, Schema, SetupOptions, Store,
        StoreConfig,
    };
}
