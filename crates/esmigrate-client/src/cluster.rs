//! The cluster operations the migration core depends on.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Error;
use crate::types::{AliasAction, AliasBindings, ReindexRequest, TaskList, TaskStatus};

/// Narrow API surface of a search cluster.
///
/// Implemented over HTTP by [`crate::Client`] and, with the `memory` feature,
/// in memory by `MemoryCluster`.
#[async_trait]
pub trait Cluster: Send + Sync {
    /// `GET /{index}/_count`.
    async fn count(&self, index: &str) -> Result<u64, Error>;

    /// `HEAD /{index}`.
    async fn index_exists(&self, index: &str) -> Result<bool, Error>;

    /// `HEAD /_alias/{alias}`.
    async fn alias_exists(&self, alias: &str) -> Result<bool, Error>;

    /// `GET /_alias/{alias}`. Returns [`Error::NotFound`] when the alias is absent.
    async fn alias_bindings(&self, alias: &str) -> Result<AliasBindings, Error>;

    /// `GET /{indexes}/_settings/index.creation_date`, in epoch milliseconds.
    async fn creation_dates(&self, indexes: &[String]) -> Result<BTreeMap<String, i64>, Error>;

    /// `GET /{index}/_stats/docs`, primary document count.
    async fn stats_doc_count(&self, index: &str) -> Result<u64, Error>;

    /// `PUT /{index}` with `{ "mappings": .. }`.
    async fn create_index(&self, index: &str, mappings: &Value) -> Result<(), Error>;

    /// `DELETE /{index}`.
    async fn delete_index(&self, index: &str) -> Result<(), Error>;

    /// `POST /_reindex?wait_for_completion=false&slices=..`, returning the task id.
    async fn start_reindex(&self, request: &ReindexRequest) -> Result<String, Error>;

    /// `GET /_tasks/{task_id}`.
    async fn task_status(&self, task_id: &str) -> Result<TaskStatus, Error>;

    /// `GET /_tasks?detailed=true&actions={actions}`.
    async fn list_tasks(&self, actions: &str) -> Result<TaskList, Error>;

    /// `POST /_aliases` with all actions in a single request.
    async fn update_aliases(&self, actions: &[AliasAction]) -> Result<(), Error>;
}
