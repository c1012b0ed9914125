//! Document trait and wire conversion.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::schema::Schema;

/// Index-level settings declared by a document type.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexSettings {
    /// Number of primary shards.
    pub number_of_shards: Option<u32>,
    /// Number of replicas.
    pub number_of_replicas: Option<u32>,
}

impl IndexSettings {
    /// Create empty settings; the store's defaults apply.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of primary shards.
    pub fn shards(mut self, shards: u32) -> Self {
        self.number_of_shards = Some(shards);
        self
    }

    /// Set the number of replicas.
    pub fn replicas(mut self, replicas: u32) -> Self {
        self.number_of_replicas = Some(replicas);
        self
    }
}

/// Trait binding a record type to a logical index and its schema.
///
/// The identifier lives outside the schema: it stays `None` until the
/// caller or the store assigns one, and it never travels in a document
/// body. Implementations keep it as an `Option<String>` field skipped
/// during serialization when unset.
///
/// # Example
///
/// ```rust
/// use opensearch_odm::{Document, FieldSpec, IndexSettings, Schema};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Serialize, Deserialize)]
/// #[serde(deny_unknown_fields)]
/// struct Shirt {
///     #[serde(default, skip_serializing_if = "Option::is_none")]
///     id: Option<String>,
///     brand: String,
///     color: String,
/// }
///
/// impl Document for Shirt {
///     fn index_name() -> &'static str {
///         "shirts"
///     }
///
///     fn schema() -> Schema {
///         Schema::builder()
///             .field("brand", FieldSpec::keyword())
///             .field("color", FieldSpec::keyword())
///             .build()
///     }
///
///     fn settings() -> IndexSettings {
///         IndexSettings::new().shards(2).replicas(1)
///     }
///
///     fn id(&self) -> Option<&str> {
///         self.id.as_deref()
///     }
///
///     fn set_id(&mut self, id: String) {
///         self.id = Some(id);
///     }
/// }
/// ```
pub trait Document: Serialize + DeserializeOwned + Send + Sync {
    /// The logical index this type is bound to. Resolved to a physical
    /// index through an alias of the same name.
    fn index_name() -> &'static str;

    /// The field declarations for this type.
    fn schema() -> Schema;

    /// Index-level settings baked into the index template.
    fn settings() -> IndexSettings {
        IndexSettings::default()
    }

    /// Whether the store keeps the original document source.
    fn source_enabled() -> bool {
        true
    }

    /// Schema version recorded on the index template.
    fn version() -> Option<i64> {
        None
    }

    /// The assigned identifier, when there is one.
    fn id(&self) -> Option<&str>;

    /// Assign the identifier.
    fn set_id(&mut self, id: String);

    /// Serialize to the wire representation.
    ///
    /// Re-validates the full document against the schema, strips the
    /// identifier, and normalizes field values (temporal fields become
    /// canonical ISO-8601 text). Nothing partially valid ever leaves this
    /// function.
    fn to_wire(&self) -> Result<Map<String, Value>> {
        self.to_wire_excluding(&[])
    }

    /// Like [`to_wire`](Document::to_wire), additionally dropping the
    /// named fields after validation.
    fn to_wire_excluding(&self, exclude: &[&str]) -> Result<Map<String, Value>> {
        let value = serde_json::to_value(self)?;
        let Value::Object(mut doc) = value else {
            return Err(Error::Definition(format!(
                "document type for index '{}' does not serialize to an object",
                Self::index_name()
            )));
        };
        doc.remove("id");
        Self::schema().validate_document(&mut doc)?;
        for field in exclude {
            doc.remove(*field);
        }
        Ok(doc)
    }

    /// Materialize a document from a raw store hit.
    ///
    /// Returns `None` for an empty hit. A hit that lacks either a source
    /// body or an identifier cannot be materialized and is an
    /// [`Error::InvalidResponse`].
    fn from_wire(hit: &Value) -> Result<Option<Self>> {
        if hit.is_null() || hit.as_object().is_some_and(Map::is_empty) {
            return Ok(None);
        }

        let source = hit
            .get("_source")
            .filter(|s| !s.is_null() && !s.as_object().is_some_and(Map::is_empty));
        let id = hit.get("_id").and_then(Value::as_str);
        let (Some(source), Some(id)) = (source, id) else {
            return Err(Error::InvalidResponse(
                "hit is missing '_source' or '_id'".to_string(),
            ));
        };

        let mut doc: Self = serde_json::from_value(source.clone())
            .map_err(|e| Error::InvalidResponse(format!("cannot materialize document: {e}")))?;
        doc.set_id(id.to_string());
        Ok(Some(doc))
    }
}

/// Validate a document type declaration.
///
/// Checks what the type system cannot: a non-empty index name, a schema
/// with at least one field, and no duplicate field declarations. Run by
/// [`IndexManager::setup`](crate::IndexManager::setup) before touching
/// the store, and directly by tests.
pub fn validate_definition<T: Document>() -> Result<()> {
    let mut problems = Vec::new();
    if T::index_name().trim().is_empty() {
        problems.push("'index' name is empty".to_string());
    }
    let schema = T::schema();
    if schema.is_empty() {
        problems.push("schema declares no fields".to_string());
    }
    for name in schema.duplicates() {
        problems.push(format!("field '{name}' is declared more than once"));
    }
    if problems.is_empty() {
        Ok(())
    } else {
        Err(Error::Definition(problems.join("; ")))
    }
}
