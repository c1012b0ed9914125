//! Search response wrapper.

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

use serde_json::Value;

use crate::document::Document;
use crate::error::{Error, Result};

/// A raw search result bound to the query that produced it and the
/// document type to materialize hits into.
pub struct SearchResponse<T> {
    query: Value,
    raw: Value,
    _marker: PhantomData<T>,
}

impl<T: Document> SearchResponse<T> {
    pub(crate) fn new(query: Value, raw: Value) -> Self {
        Self {
            query,
            raw,
            _marker: PhantomData,
        }
    }

    /// Raw hit objects, in store order.
    pub fn hits(&self) -> &[Value] {
        self.raw["hits"]["hits"]
            .as_array()
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of returned hits.
    pub fn len(&self) -> usize {
        self.hits().len()
    }

    /// True when the response carries no hits.
    pub fn is_empty(&self) -> bool {
        self.hits().is_empty()
    }

    /// Total matching documents as reported by the store.
    pub fn total(&self) -> u64 {
        self.raw["hits"]["total"]["value"].as_u64().unwrap_or(0)
    }

    /// Whether the store reported a timeout.
    pub fn timed_out(&self) -> bool {
        self.raw["timed_out"].as_bool().unwrap_or(false)
    }

    /// Shard accounting for the search.
    pub fn shards(&self) -> &Value {
        &self.raw["_shards"]
    }

    /// True iff the search did not time out and every queried shard
    /// responded successfully.
    pub fn success(&self) -> bool {
        let shards = self.shards();
        match (shards["total"].as_u64(), shards["successful"].as_u64()) {
            (Some(total), Some(successful)) => !self.timed_out() && total == successful,
            _ => false,
        }
    }

    /// Materialize every hit into a typed document.
    pub fn documents(&self) -> Result<Vec<T>> {
        self.hits()
            .iter()
            .map(|hit| {
                T::from_wire(hit)?
                    .ok_or_else(|| Error::InvalidResponse("empty hit in search response".to_string()))
            })
            .collect()
    }

    /// Names of the explicitly requested projection fields present on the
    /// first hit; empty when there are no hits.
    pub fn fields(&self) -> Vec<String> {
        self.hits()
            .first()
            .and_then(|hit| hit.get("fields"))
            .and_then(Value::as_object)
            .map(|fields| fields.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Bucket lists for each aggregation named in the query's `aggs`
    /// clause.
    ///
    /// `None` when the query had no aggregations, the response carries
    /// none, or a named aggregation has no bucket list.
    pub fn buckets(&self) -> Option<BTreeMap<String, Vec<Value>>> {
        let named = self.query.get("aggs")?.as_object()?;
        let aggregations = self.raw.get("aggregations")?;
        let mut buckets = BTreeMap::new();
        for name in named.keys() {
            let list = aggregations.get(name)?.get("buckets")?.as_array()?;
            buckets.insert(name.clone(), list.clone());
        }
        Some(buckets)
    }

    /// The query this response answers.
    pub fn query(&self) -> &Value {
        &self.query
    }

    /// The unparsed store response.
    pub fn raw(&self) -> &Value {
        &self.raw
    }
}

impl<T> fmt::Debug for SearchResponse<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchResponse")
            .field("raw", &self.raw)
            .finish()
    }
}
