//! Test support: a scripted backend and fixture document types.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::backend::{BulkAction, OpKind, Refresh, SearchBackend};
use crate::document::{Document, IndexSettings};
use crate::error::{Error, Result};
use crate::schema::{FieldSpec, Schema};
use crate::store::Store;
use crate::validators;

/// One recorded backend interaction.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Get { index: String, id: String },
    Index { index: String, id: Option<String>, body: Value, refresh: &'static str },
    DeleteDoc { index: String, id: String },
    Search { index: String, query: Value },
    Bulk { count: usize, refresh: &'static str },
    IndexExists(String),
    CreateIndex(String),
    DeleteIndex(String),
    GetAlias(String),
    UpdateAliases(Value),
    RefreshIndex(String),
    TemplateExists(String),
    PutTemplate { name: String, body: Value },
    Reindex { source: String, target: String },
}

/// Scripted in-process backend recording every call it receives.
#[derive(Default)]
pub struct MockBackend {
    pub calls: Mutex<Vec<Call>>,
    get_response: Mutex<Option<Value>>,
    search_response: Mutex<Value>,
    delete_missing: Mutex<bool>,
    reject_kinds: Mutex<Vec<OpKind>>,
    fail_bulk: Mutex<bool>,
    template_present: Mutex<bool>,
    index_present: Mutex<bool>,
    alias_indices: Mutex<Option<Vec<String>>>,
    reindex_missing: Mutex<bool>,
    id_counter: Mutex<usize>,
}

impl MockBackend {
    pub fn set_get_response(&self, response: Value) {
        *self.get_response.lock().unwrap() = Some(response);
    }

    pub fn set_search_response(&self, response: Value) {
        *self.search_response.lock().unwrap() = response;
    }

    pub fn set_delete_missing(&self, missing: bool) {
        *self.delete_missing.lock().unwrap() = missing;
    }

    /// Reject every bulk operation of `kind` with a not-found item.
    pub fn reject_kind(&self, kind: OpKind) {
        self.reject_kinds.lock().unwrap().push(kind);
    }

    /// Fail the next bulk requests outright.
    pub fn fail_bulk(&self) {
        *self.fail_bulk.lock().unwrap() = true;
    }

    pub fn set_template_present(&self, present: bool) {
        *self.template_present.lock().unwrap() = present;
    }

    pub fn set_index_present(&self, present: bool) {
        *self.index_present.lock().unwrap() = present;
    }

    pub fn set_alias_indices(&self, indices: Vec<String>) {
        *self.alias_indices.lock().unwrap() = Some(indices);
    }

    pub fn set_reindex_missing(&self, missing: bool) {
        *self.reindex_missing.lock().unwrap() = missing;
    }

    fn next_id(&self) -> String {
        let mut counter = self.id_counter.lock().unwrap();
        let id = format!("id-{counter}");
        *counter += 1;
        id
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl SearchBackend for MockBackend {
    async fn get_document(&self, index: &str, id: &str) -> Result<Value> {
        self.record(Call::Get {
            index: index.to_string(),
            id: id.to_string(),
        });
        self.get_response
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| Error::NotFound(format!("document with id {id} is not found")))
    }

    async fn index_document(
        &self,
        index: &str,
        id: Option<&str>,
        body: &Value,
        refresh: Refresh,
    ) -> Result<String> {
        self.record(Call::Index {
            index: index.to_string(),
            id: id.map(str::to_string),
            body: body.clone(),
            refresh: refresh.as_str(),
        });
        Ok(id.map(str::to_string).unwrap_or_else(|| self.next_id()))
    }

    async fn delete_document(&self, index: &str, id: &str, _refresh: Refresh) -> Result<()> {
        self.record(Call::DeleteDoc {
            index: index.to_string(),
            id: id.to_string(),
        });
        if *self.delete_missing.lock().unwrap() {
            return Err(Error::NotFound(format!("document with id={id} is not found")));
        }
        Ok(())
    }

    async fn search(&self, index: &str, query: &Value) -> Result<Value> {
        self.record(Call::Search {
            index: index.to_string(),
            query: query.clone(),
        });
        Ok(self.search_response.lock().unwrap().clone())
    }

    async fn bulk(&self, actions: &[BulkAction], refresh: Refresh) -> Result<Value> {
        self.record(Call::Bulk {
            count: actions.len(),
            refresh: refresh.as_str(),
        });
        if *self.fail_bulk.lock().unwrap() {
            return Err(Error::Store {
                status: 500,
                reason: "scripted bulk failure".to_string(),
            });
        }

        let rejected = self.reject_kinds.lock().unwrap().clone();
        let mut errors = false;
        let items: Vec<Value> = actions
            .iter()
            .map(|action| {
                let kind = action.kind.as_str();
                if rejected.contains(&action.kind) {
                    errors = true;
                    json!({
                        kind: {
                            "_index": action.index,
                            "_id": action.id,
                            "status": 404,
                            "error": {
                                "type": "document_missing_exception",
                                "reason": "document missing"
                            }
                        }
                    })
                } else {
                    let id = action.id.clone().unwrap_or_else(|| self.next_id());
                    json!({
                        kind: {
                            "_index": action.index,
                            "_id": id,
                            "status": 200,
                            "result": "created"
                        }
                    })
                }
            })
            .collect();
        Ok(json!({ "took": 1, "errors": errors, "items": items }))
    }

    async fn index_exists(&self, index: &str) -> Result<bool> {
        self.record(Call::IndexExists(index.to_string()));
        Ok(*self.index_present.lock().unwrap())
    }

    async fn create_index(&self, index: &str) -> Result<String> {
        self.record(Call::CreateIndex(index.to_string()));
        Ok(index.to_string())
    }

    async fn delete_index(&self, index: &str) -> Result<()> {
        self.record(Call::DeleteIndex(index.to_string()));
        Ok(())
    }

    async fn get_alias(&self, alias: &str) -> Result<Vec<String>> {
        self.record(Call::GetAlias(alias.to_string()));
        self.alias_indices
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| Error::NotFound(format!("alias {alias} is not found")))
    }

    async fn update_aliases(&self, actions: Value) -> Result<()> {
        self.record(Call::UpdateAliases(actions));
        Ok(())
    }

    async fn refresh_index(&self, index: &str) -> Result<()> {
        self.record(Call::RefreshIndex(index.to_string()));
        Ok(())
    }

    async fn template_exists(&self, name: &str) -> Result<bool> {
        self.record(Call::TemplateExists(name.to_string()));
        Ok(*self.template_present.lock().unwrap())
    }

    async fn put_template(&self, name: &str, body: Value) -> Result<()> {
        self.record(Call::PutTemplate {
            name: name.to_string(),
            body,
        });
        *self.template_present.lock().unwrap() = true;
        Ok(())
    }

    async fn reindex(&self, source: &str, target: &str) -> Result<()> {
        self.record(Call::Reindex {
            source: source.to_string(),
            target: target.to_string(),
        });
        if *self.reindex_missing.lock().unwrap() {
            return Err(Error::NotFound(format!("index {source} is not found")));
        }
        Ok(())
    }
}

/// A store over a fresh mock backend, plus the backend for scripting and
/// assertions.
pub fn mock_store() -> (Store, Arc<MockBackend>) {
    let backend = Arc::new(MockBackend::default());
    (Store::with_backend(backend.clone()), backend)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Shirt {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub brand: String,
    pub color: String,
}

impl Document for Shirt {
    fn index_name() -> &'static str {
        "shirts"
    }

    fn schema() -> Schema {
        Schema::builder()
            .field("brand", FieldSpec::keyword())
            .field("color", FieldSpec::keyword())
            .build()
    }

    fn settings() -> IndexSettings {
        IndexSettings::new().shards(1).replicas(0)
    }

    fn version() -> Option<i64> {
        Some(1)
    }

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EventLog {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub cluster_guid: String,
}

impl Document for EventLog {
    fn index_name() -> &'static str {
        "event-logs"
    }

    fn schema() -> Schema {
        Schema::builder()
            .field(
                "timestamp",
                FieldSpec::date().format("strict_date_optional_time_nanos||epoch_millis"),
            )
            .field("message", FieldSpec::text())
            .field(
                "cluster_guid",
                FieldSpec::keyword().with_validator(validators::guid),
            )
            .build()
    }

    fn settings() -> IndexSettings {
        IndexSettings::new().shards(2).replicas(1)
    }

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }
}
