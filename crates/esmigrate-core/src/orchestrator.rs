//! Migration orchestrator - copies one index into another.
//!
//! Each step is a precondition for the next:
//! 1. count source documents (zero means nothing to do)
//! 2. estimate slices, timeout and poll interval (refuse oversized datasets)
//! 3. launch the asynchronous reindex
//! 4. track the task to a terminal state

use std::sync::Arc;
use std::time::Duration;

use esmigrate_client::{Cluster, ReindexRequest};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::clock::Clock;
use crate::error::{MigrationError, Result};
use crate::estimator::{estimate, EstimatedParams};
use crate::inspector::Inspector;
use crate::lifecycle::IndexManager;
use crate::tracker::{ReindexTask, TaskTracker, REINDEX_ACTIONS};

/// Timeout of the reindex launch request. The copy itself is bounded by the
/// estimated task timeout.
pub const REINDEX_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// What to do when the source document count cannot be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CountFailurePolicy {
    /// Fail the migration.
    #[default]
    Abort,
    /// Treat the source as empty and skip the copy.
    TreatAsEmpty,
}

/// Orchestrator configuration.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Timeout of the reindex launch request.
    pub reindex_request_timeout: Duration,
    /// Action pattern used to find reindex slices.
    pub task_actions: String,
    /// Behaviour on a failed document count.
    pub count_failure: CountFailurePolicy,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            reindex_request_timeout: REINDEX_REQUEST_TIMEOUT,
            task_actions: REINDEX_ACTIONS.to_string(),
            count_failure: CountFailurePolicy::Abort,
        }
    }
}

/// Result of a copy.
#[derive(Debug, Clone)]
pub struct MigrationResult {
    /// Source index.
    pub source: String,
    /// Destination index.
    pub dest: String,
    /// Documents in the source when the copy started.
    pub doc_count: u64,
    /// Parameters used; `None` when nothing was copied.
    pub params: Option<EstimatedParams>,
    /// The tracked task; `None` when nothing was copied.
    pub task: Option<ReindexTask>,
}

impl MigrationResult {
    /// Whether the copy was skipped because the source was empty.
    pub fn is_noop(&self) -> bool {
        self.task.is_none()
    }
}

/// Drives a reindex from launch to a terminal state.
pub struct Orchestrator {
    cluster: Arc<dyn Cluster>,
    inspector: Inspector,
    indexes: IndexManager,
    tracker: TaskTracker,
    config: MigrationConfig,
}

impl Orchestrator {
    /// Create a new orchestrator.
    pub fn new(cluster: Arc<dyn Cluster>, clock: Arc<dyn Clock>, config: MigrationConfig) -> Self {
        let tracker = TaskTracker::new(Arc::clone(&cluster), clock)
            .with_actions(config.task_actions.clone());

        Self {
            inspector: Inspector::new(Arc::clone(&cluster)),
            indexes: IndexManager::new(Arc::clone(&cluster)),
            tracker,
            cluster,
            config,
        }
    }

    /// The orchestrator configuration.
    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Create `dest` with `mappings`, then copy `source` into it.
    pub async fn migrate(&self, source: &str, dest: &str, mappings: &Value) -> Result<MigrationResult> {
        self.indexes.create(dest, mappings).await?;
        self.copy(source, dest).await
    }

    /// Copy all documents of `source` into the existing index `dest`.
    pub async fn copy(&self, source: &str, dest: &str) -> Result<MigrationResult> {
        let doc_count = match self.config.count_failure {
            CountFailurePolicy::Abort => self.inspector.try_document_count(source).await?,
            CountFailurePolicy::TreatAsEmpty => self.inspector.document_count(source).await,
        };

        let mut result = MigrationResult {
            source: source.to_string(),
            dest: dest.to_string(),
            doc_count,
            params: None,
            task: None,
        };

        if doc_count == 0 {
            warn!(source = %source, "source holds no documents, nothing to migrate");
            return Ok(result);
        }

        let params = estimate(doc_count);
        info!(
            source = %source,
            dest = %dest,
            doc_count,
            slices = params.parallelism,
            timeout_secs = params.timeout.as_secs(),
            poll_interval_secs = params.poll_interval.as_secs(),
            "estimated reindex parameters"
        );
        if params.is_refused() {
            error!(source = %source, doc_count, "dataset too large for automatic reindex, migrate in batches");
            return Err(MigrationError::ScaleRefusal {
                index: source.to_string(),
                doc_count,
            });
        }
        result.params = Some(params);

        let request = ReindexRequest {
            source: source.to_string(),
            dest: dest.to_string(),
            slices: params.parallelism,
            request_timeout: self.config.reindex_request_timeout,
        };
        let task_id = self.cluster.start_reindex(&request).await.map_err(|e| {
            error!(source = %source, dest = %dest, error = %e, "reindex launch failed");
            MigrationError::transport(format!("launch reindex {} -> {}", source, dest), e)
        })?;
        info!(task_id = %task_id, source = %source, dest = %dest, "reindex launched");

        let task = self
            .tracker
            .track(&task_id, params.timeout, params.poll_interval)
            .await?;
        result.task = Some(task);
        Ok(result)
    }
}
