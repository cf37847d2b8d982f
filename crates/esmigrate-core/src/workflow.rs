//! End-to-end migration workflow.
//!
//! One run resolves the source behind the alias (renaming a bare index if
//! needed), creates the destination, copies the documents, moves the alias and
//! optionally deletes the old index. Steps run strictly in sequence and a
//! failure stops the run; completed steps are not rolled back.

use std::sync::Arc;

use chrono::Utc;
use esmigrate_client::Cluster;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::cutover::{CutoverManager, CutoverReport};
use crate::error::{MigrationError, Result};
use crate::inspector::{AliasState, Inspector};
use crate::lifecycle::IndexManager;
use crate::orchestrator::{MigrationConfig, Orchestrator};
use crate::plan::MigrationPlan;
use crate::resolver::{RenameOutcome, RenameResolver};

/// Summary of a completed run.
#[derive(Debug, Clone)]
pub struct WorkflowReport {
    /// Index the documents came from; `None` on bootstrap.
    pub source: Option<String>,
    /// Index the alias now points to.
    pub dest: String,
    /// Documents copied into the destination.
    pub documents: u64,
    /// Backup created for a bare index under the alias name.
    pub renamed_to: Option<String>,
    /// Whether the source was deleted.
    pub deleted_old: bool,
    /// The alias move.
    pub cutover: CutoverReport,
}

/// Runs migration plans against a cluster.
pub struct Workflow {
    cluster: Arc<dyn Cluster>,
    inspector: Inspector,
    indexes: IndexManager,
    orchestrator: Orchestrator,
    cutover: CutoverManager,
}

impl Workflow {
    /// Create a workflow.
    pub fn new(cluster: Arc<dyn Cluster>, clock: Arc<dyn Clock>, config: MigrationConfig) -> Self {
        Self {
            inspector: Inspector::new(Arc::clone(&cluster)),
            indexes: IndexManager::new(Arc::clone(&cluster)),
            orchestrator: Orchestrator::new(Arc::clone(&cluster), clock, config),
            cutover: CutoverManager::new(Arc::clone(&cluster)),
            cluster,
        }
    }

    /// Run `plan` to completion.
    pub async fn run(&self, plan: &MigrationPlan) -> Result<WorkflowReport> {
        let (source, renamed_to) = match &plan.source {
            Some(source) => (Some(source.clone()), None),
            None => self.resolve_source(plan).await?,
        };

        let dest = plan.dest_name(Utc::now());
        info!(alias = %plan.alias, source = ?source, dest = %dest, "migration plan resolved");

        self.indexes.create(&dest, &plan.mappings).await?;

        let documents = match &source {
            Some(source) => self.orchestrator.copy(source, &dest).await?.doc_count,
            None => {
                info!(alias = %plan.alias, "no source index, skipping copy");
                0
            }
        };

        let cutover = self.cutover.cutover(&plan.alias, &dest).await?;

        let mut deleted_old = false;
        if plan.delete_old {
            match &source {
                Some(source) if *source != dest => {
                    self.indexes.delete(source).await?;
                    deleted_old = true;
                }
                _ => warn!(alias = %plan.alias, "no old index to delete"),
            }
        }

        info!(
            alias = %plan.alias,
            dest = %dest,
            documents,
            deleted_old,
            "migration complete"
        );
        Ok(WorkflowReport {
            source,
            dest,
            documents,
            renamed_to,
            deleted_old,
            cutover,
        })
    }

    /// Find the index currently behind the alias.
    ///
    /// Returns the source and, if a bare index had to be renamed, its backup.
    async fn resolve_source(&self, plan: &MigrationPlan) -> Result<(Option<String>, Option<String>)> {
        match self.inspector.try_alias_state(&plan.alias).await? {
            AliasState::Absent => {
                let resolver = RenameResolver::new(Arc::clone(&self.cluster), &self.orchestrator);
                let outcome = resolver
                    .rename_if_needed(&plan.alias, &plan.mappings, &plan.rename_suffix)
                    .await?;
                match outcome {
                    RenameOutcome::Renamed { backup, .. } => Ok((Some(backup.clone()), Some(backup))),
                    RenameOutcome::NothingToRename => Ok((None, None)),
                    RenameOutcome::AlreadyAlias => Ok((self.latest(&plan.alias).await?, None)),
                }
            }
            AliasState::Unbound => {
                info!(alias = %plan.alias, "alias has no bound index");
                Ok((None, None))
            }
            AliasState::Bound(_) => Ok((self.latest(&plan.alias).await?, None)),
        }
    }

    async fn latest(&self, alias: &str) -> Result<Option<String>> {
        match self.inspector.resolve_latest_index_for_alias(alias).await {
            Some(latest) => {
                info!(
                    alias = %alias,
                    index = %latest.name,
                    document_count = ?latest.document_count,
                    "using latest index as source"
                );
                Ok(Some(latest.name))
            }
            // Bindings were seen a moment ago; cutting over now could orphan them.
            None => Err(MigrationError::IndexNotFound {
                index: alias.to_string(),
            }),
        }
    }
}
