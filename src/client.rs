//! `SearchBackend` implementation over the official OpenSearch client.

use async_trait::async_trait;
use opensearch::http::request::JsonBody;
use opensearch::http::response::Response;
use opensearch::http::transport::{SingleNodeConnectionPool, TransportBuilder};
use opensearch::http::StatusCode;
use opensearch::indices::{
    IndicesCreateParts, IndicesDeleteParts, IndicesExistsIndexTemplateParts, IndicesExistsParts,
    IndicesGetAliasParts, IndicesPutIndexTemplateParts, IndicesRefreshParts,
};
use opensearch::params::Refresh as ApiRefresh;
use opensearch::{BulkParts, DeleteParts, GetParts, IndexParts, OpenSearch, SearchParts};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::backend::{BulkAction, Refresh, SearchBackend};
use crate::config::StoreConfig;
use crate::error::{Error, Result};

fn api_refresh(refresh: Refresh) -> ApiRefresh {
    match refresh {
        Refresh::WaitFor => ApiRefresh::WaitFor,
        Refresh::True => ApiRefresh::True,
        Refresh::False => ApiRefresh::False,
    }
}

/// Store backend talking to an OpenSearch-compatible cluster.
pub struct OpenSearchBackend {
    client: OpenSearch,
}

impl OpenSearchBackend {
    /// Build a backend from connection settings.
    pub fn new(config: StoreConfig) -> Result<Self> {
        info!(urls = ?config.urls, "initializing store client");

        let url = config
            .urls
            .first()
            .ok_or_else(|| Error::Connection("no store URL provided".to_string()))?;
        let url = opensearch::http::Url::parse(url)
            .map_err(|e| Error::Connection(format!("invalid URL: {e}")))?;

        let conn_pool = SingleNodeConnectionPool::new(url);
        let mut builder = TransportBuilder::new(conn_pool)
            .timeout(config.request_timeout)
            .disable_proxy();

        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            builder = builder.auth(opensearch::auth::Credentials::Basic(
                user.clone(),
                pass.clone(),
            ));
        }

        let transport = builder
            .build()
            .map_err(|e| Error::Connection(e.to_string()))?;

        debug!("store client initialized");
        Ok(Self {
            client: OpenSearch::new(transport),
        })
    }

    /// Decode a non-success response into a store error.
    async fn reject(response: Response) -> Error {
        let status = response.status_code().as_u16();
        let reason = match response.json::<Value>().await {
            Ok(body) => body["error"]["reason"]
                .as_str()
                .or_else(|| body["error"].as_str())
                .unwrap_or("unknown error")
                .to_string(),
            Err(_) => "unknown error".to_string(),
        };
        Error::Store { status, reason }
    }
}

#[async_trait]
impl SearchBackend for OpenSearchBackend {
    async fn get_document(&self, index: &str, id: &str) -> Result<Value> {
        debug!(index, id, "get document");

        let response = self
            .client
            .get(GetParts::IndexId(index, id))
            .send()
            .await?;

        if response.status_code() == StatusCode::NOT_FOUND {
            return Err(Error::NotFound(format!("document with id {id} is not found")));
        }
        if !response.status_code().is_success() {
            return Err(Self::reject(response).await);
        }

        let body: Value = response.json().await?;
        if !body["found"].as_bool().unwrap_or(false) {
            return Err(Error::NotFound(format!("document with id {id} is not found")));
        }
        Ok(body)
    }

    async fn index_document(
        &self,
        index: &str,
        id: Option<&str>,
        body: &Value,
        refresh: Refresh,
    ) -> Result<String> {
        debug!(index, id = id.unwrap_or("<server-assigned>"), "index document");

        let request = match id {
            Some(id) => self.client.index(IndexParts::IndexId(index, id)),
            None => self.client.index(IndexParts::Index(index)),
        };
        let response = request
            .body(body)
            .refresh(api_refresh(refresh))
            .send()
            .await?;

        if !response.status_code().is_success() {
            return Err(Self::reject(response).await);
        }

        let body: Value = response.json().await?;
        body["_id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Error::InvalidResponse("index response has no '_id'".to_string()))
    }

    async fn delete_document(&self, index: &str, id: &str, refresh: Refresh) -> Result<()> {
        debug!(index, id, "delete document");

        let response = self
            .client
            .delete(DeleteParts::IndexId(index, id))
            .refresh(api_refresh(refresh))
            .send()
            .await?;

        if response.status_code() == StatusCode::NOT_FOUND {
            return Err(Error::NotFound(format!("document with id={id} is not found")));
        }
        if !response.status_code().is_success() {
            return Err(Self::reject(response).await);
        }
        Ok(())
    }

    async fn search(&self, index: &str, query: &Value) -> Result<Value> {
        debug!(index, "search");

        let response = self
            .client
            .search(SearchParts::Index(&[index]))
            .body(query)
            .send()
            .await?;

        if !response.status_code().is_success() {
            return Err(Self::reject(response).await);
        }
        Ok(response.json().await?)
    }

    async fn bulk(&self, actions: &[BulkAction], refresh: Refresh) -> Result<Value> {
        debug!(operations = actions.len(), "bulk request");

        let mut body: Vec<JsonBody<Value>> = Vec::with_capacity(actions.len() * 2);
        for action in actions {
            let (header, source) = action.to_lines();
            body.push(header.into());
            if let Some(source) = source {
                body.push(source.into());
            }
        }

        let response = self
            .client
            .bulk(BulkParts::None)
            .body(body)
            .refresh(api_refresh(refresh))
            .send()
            .await?;

        if !response.status_code().is_success() {
            return Err(Self::reject(response).await);
        }
        Ok(response.json().await?)
    }

    async fn index_exists(&self, index: &str) -> Result<bool> {
        let response = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[index]))
            .send()
            .await?;
        Ok(response.status_code().is_success())
    }

    async fn create_index(&self, index: &str) -> Result<String> {
        info!(index, "creating index");

        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(index))
            .send()
            .await?;

        let status = response.status_code();
        if status == StatusCode::BAD_REQUEST {
            let body: Value = response.json().await?;
            if body["error"]["type"].as_str() == Some("resource_already_exists_exception") {
                return Err(Error::IndexExists(index.to_string()));
            }
            return Err(Error::Store {
                status: status.as_u16(),
                reason: body["error"]["reason"]
                    .as_str()
                    .unwrap_or("unknown error")
                    .to_string(),
            });
        }
        if !status.is_success() {
            return Err(Self::reject(response).await);
        }

        let body: Value = response.json().await?;
        Ok(body["index"].as_str().unwrap_or(index).to_string())
    }

    async fn delete_index(&self, index: &str) -> Result<()> {
        info!(index, "deleting index");

        let response = self
            .client
            .indices()
            .delete(IndicesDeleteParts::Index(&[index]))
            .send()
            .await?;

        if response.status_code() == StatusCode::NOT_FOUND {
            return Err(Error::NotFound(format!("index {index} is not found")));
        }
        if !response.status_code().is_success() {
            return Err(Self::reject(response).await);
        }
        Ok(())
    }

    async fn get_alias(&self, alias: &str) -> Result<Vec<String>> {
        let response = self
            .client
            .indices()
            .get_alias(IndicesGetAliasParts::Index(&[alias]))
            .send()
            .await?;

        if response.status_code() == StatusCode::NOT_FOUND {
            return Err(Error::NotFound(format!("alias {alias} is not found")));
        }
        if !response.status_code().is_success() {
            return Err(Self::reject(response).await);
        }

        let body: Value = response.json().await?;
        let indices = body
            .as_object()
            .map(|resolved| resolved.keys().cloned().collect())
            .unwrap_or_default();
        Ok(indices)
    }

    async fn update_aliases(&self, actions: Value) -> Result<()> {
        debug!("updating aliases");

        let response = self
            .client
            .indices()
            .update_aliases()
            .body(actions)
            .send()
            .await?;

        if !response.status_code().is_success() {
            return Err(Self::reject(response).await);
        }
        Ok(())
    }

    async fn refresh_index(&self, index: &str) -> Result<()> {
        debug!(index, "refreshing index");

        let response = self
            .client
            .indices()
            .refresh(IndicesRefreshParts::Index(&[index]))
            .send()
            .await?;

        if !response.status_code().is_success() {
            return Err(Self::reject(response).await);
        }
        Ok(())
    }

    async fn template_exists(&self, name: &str) -> Result<bool> {
        let response = self
            .client
            .indices()
            .exists_index_template(IndicesExistsIndexTemplateParts::Name(name))
            .send()
            .await?;
        Ok(response.status_code().is_success())
    }

    async fn put_template(&self, name: &str, body: Value) -> Result<()> {
        info!(template = name, "registering index template");

        let response = self
            .client
            .indices()
            .put_index_template(IndicesPutIndexTemplateParts::Name(name))
            .body(body)
            .send()
            .await?;

        if !response.status_code().is_success() {
            return Err(Self::reject(response).await);
        }
        Ok(())
    }

    async fn reindex(&self, source: &str, target: &str) -> Result<()> {
        info!(source, target, "reindexing");

        let response = self
            .client
            .reindex()
            .body(json!({
                "source": { "index": source },
                "dest": { "index": target },
            }))
            .send()
            .await?;

        if response.status_code() == StatusCode::NOT_FOUND {
            return Err(Error::NotFound(format!("index {source} is not found")));
        }
        if !response.status_code().is_success() {
            return Err(Self::reject(response).await);
        }
        Ok(())
    }
}

impl std::fmt::Debug for OpenSearchBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenSearchBackend").finish_non_exhaustive()
    }
}
