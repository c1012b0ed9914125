//! Physical-index lifecycle behind a logical alias.
//!
//! A logical index name never addresses a physical index directly: the
//! name is an alias, and every migration creates a fresh timestamped
//! physical index, optionally copies the existing data forward, and
//! repoints the alias in one atomic request. Readers therefore always
//! see either the old or the new index, never neither — which is what
//! lets mapping changes deploy with zero downtime on stores that forbid
//! in-place mapping edits.

use std::marker::PhantomData;

use chrono::Utc;
use futures::future::try_join_all;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::document::{validate_definition, Document};
use crate::error::{Error, Result};
use crate::store::Store;

/// Options for [`IndexManager::setup`].
#[derive(Debug, Clone, Copy)]
pub struct SetupOptions {
    /// Copy existing data into the new physical index when migrating.
    pub move_data: bool,
    /// Repoint the alias at the new physical index when migrating.
    pub update_alias: bool,
    /// Migrate even when a physical index already exists.
    pub force_migrate: bool,
}

impl Default for SetupOptions {
    fn default() -> Self {
        Self {
            move_data: true,
            update_alias: true,
            force_migrate: false,
        }
    }
}

/// Manages the physical indices and alias of one document type's logical
/// index. Obtained from [`Store::index`]; holds no state of its own —
/// everything is derived from the type and re-queried from the store.
pub struct IndexManager<T> {
    store: Store,
    _marker: PhantomData<T>,
}

impl<T: Document> IndexManager<T> {
    pub(crate) fn new(store: Store) -> Self {
        Self {
            store,
            _marker: PhantomData,
        }
    }

    /// The alias readers and writers address.
    pub fn alias(&self) -> &'static str {
        T::index_name()
    }

    /// Glob matching every physical index of this logical index.
    pub fn pattern(&self) -> String {
        format!("{}-*", T::index_name())
    }

    /// Index template body derived from the document type: mappings from
    /// the schema, source-storage toggle, shard and replica settings, and
    /// the declared version.
    pub fn template_body(&self) -> Value {
        let mut mappings = Map::new();
        mappings.insert("properties".to_string(), T::schema().properties());
        mappings.insert("_source".to_string(), json!({ "enabled": T::source_enabled() }));

        let declared = T::settings();
        let mut index = Map::new();
        if let Some(shards) = declared.number_of_shards {
            index.insert("number_of_shards".to_string(), json!(shards));
        }
        if let Some(replicas) = declared.number_of_replicas {
            index.insert("number_of_replicas".to_string(), json!(replicas));
        }

        let mut body = json!({
            "index_patterns": [self.pattern()],
            "template": {
                "mappings": mappings,
                "settings": { "index": index },
            },
            "composed_of": [],
            "priority": 1,
        });
        if let Some(version) = T::version() {
            body["version"] = json!(version);
        }
        body
    }

    /// Bring the logical index up: register the template when absent
    /// (an existing template is never overwritten here), then migrate if
    /// no physical index exists yet or `force_migrate` is set.
    pub async fn setup(&self, opts: SetupOptions) -> Result<()> {
        validate_definition::<T>()?;

        let name = self.alias();
        if !self.store.backend().template_exists(name).await? {
            info!(template = name, "registering index template");
            self.store
                .backend()
                .put_template(name, self.template_body())
                .await?;
        }

        if opts.force_migrate || !self.exist().await? {
            self.migrate(opts.move_data, opts.update_alias).await?;
        }
        Ok(())
    }

    /// Create the next physical index and cut over to it.
    ///
    /// The new name substitutes the current UTC timestamp (microsecond
    /// precision) into the pattern wildcard; settings and mappings are
    /// inherited from the template. With `move_data`, all documents are
    /// copied forward store-side and the new index is refreshed so they
    /// are immediately visible; a source that resolves to nothing (first
    /// migration) is not an error. With `update_alias`, the alias is
    /// moved in a single atomic multi-action request — this is the only
    /// place the alias binding ever changes.
    ///
    /// Returns the new physical index name.
    pub async fn migrate(&self, move_data: bool, update_alias: bool) -> Result<String> {
        let stamp = Utc::now().format("%Y%m%d-%H%M%S%6f").to_string();
        let next_index = self.pattern().replace('*', &stamp);

        info!(index = next_index.as_str(), "creating physical index");
        let created = self.store.backend().create_index(&next_index).await?;

        if move_data {
            match self.store.backend().reindex(self.alias(), &next_index).await {
                Ok(()) => {}
                Err(Error::NotFound(_)) => {
                    debug!(alias = self.alias(), "no existing data to move");
                }
                Err(e) => return Err(e),
            }
            self.store.backend().refresh_index(&next_index).await?;
        }

        if update_alias {
            let actions = json!({
                "actions": [
                    { "remove": { "alias": self.alias(), "index": self.pattern() } },
                    { "add": { "alias": self.alias(), "index": next_index } },
                ]
            });
            self.store.backend().update_aliases(actions).await?;
        }

        Ok(created)
    }

    /// Delete every physical index the alias resolves to, concurrently.
    /// An alias that resolves to nothing means there is nothing to
    /// delete, which is success.
    pub async fn delete(&self) -> Result<()> {
        let physical = match self.store.backend().get_alias(self.alias()).await {
            Ok(indices) => indices,
            Err(Error::NotFound(_)) => return Ok(()),
            Err(e) => return Err(e),
        };

        info!(
            alias = self.alias(),
            indices = physical.len(),
            "deleting physical indices"
        );
        try_join_all(
            physical
                .iter()
                .map(|index| self.store.backend().delete_index(index)),
        )
        .await?;
        Ok(())
    }

    /// True when the alias currently resolves to at least one physical
    /// index.
    pub async fn exist(&self) -> Result<bool> {
        self.store.backend().index_exists(self.alias()).await
    }
}
