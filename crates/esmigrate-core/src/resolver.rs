//! Rename-if-needed resolver.
//!
//! Bootstraps a name that is still a bare index: the index is migrated into a
//! suffixed backup and deleted, which frees the name to become an alias.

use std::sync::Arc;

use esmigrate_client::Cluster;
use serde_json::Value;
use tracing::{error, info};

use crate::error::{MigrationError, Result};
use crate::inspector::Inspector;
use crate::lifecycle::IndexManager;
use crate::orchestrator::{MigrationResult, Orchestrator};

/// Default suffix of the backup index.
pub const DEFAULT_RENAME_SUFFIX: &str = "_backup";

/// What the resolver did with a name.
#[derive(Debug, Clone)]
pub enum RenameOutcome {
    /// The name already denotes an alias; nothing was touched.
    AlreadyAlias,
    /// Nothing exists under the name.
    NothingToRename,
    /// The bare index was moved to `backup`.
    Renamed {
        /// The new name of the former index.
        backup: String,
        /// The copy that populated the backup.
        migration: MigrationResult,
    },
}

impl RenameOutcome {
    /// The backup index, if a rename happened.
    pub fn backup(&self) -> Option<&str> {
        match self {
            RenameOutcome::Renamed { backup, .. } => Some(backup),
            _ => None,
        }
    }
}

/// Moves bare indexes out of the way of an alias.
pub struct RenameResolver<'a> {
    inspector: Inspector,
    indexes: IndexManager,
    orchestrator: &'a Orchestrator,
}

impl<'a> RenameResolver<'a> {
    /// Create a resolver that migrates through `orchestrator`.
    pub fn new(cluster: Arc<dyn Cluster>, orchestrator: &'a Orchestrator) -> Self {
        Self {
            inspector: Inspector::new(Arc::clone(&cluster)),
            indexes: IndexManager::new(cluster),
            orchestrator,
        }
    }

    /// Make sure `name` is free to become an alias.
    ///
    /// A bare index named `name` is migrated into `name + suffix` with
    /// `mappings` and then deleted. Fails without touching anything when the
    /// backup name is already taken.
    pub async fn rename_if_needed(
        &self,
        name: &str,
        mappings: &Value,
        suffix: &str,
    ) -> Result<RenameOutcome> {
        if self.inspector.try_alias_state(name).await?.exists() {
            info!(name = %name, "name is already an alias, no rename needed");
            return Ok(RenameOutcome::AlreadyAlias);
        }
        if !self.inspector.try_index_exists(name).await? {
            info!(name = %name, "no index under name, nothing to rename");
            return Ok(RenameOutcome::NothingToRename);
        }

        let backup = format!("{}{}", name, suffix);
        let taken = self.inspector.try_index_exists(&backup).await?
            || self.inspector.try_alias_state(&backup).await?.exists();
        if taken {
            error!(name = %name, backup = %backup, "rename target already exists");
            return Err(MigrationError::RenameTargetExists { index: backup });
        }

        info!(name = %name, backup = %backup, "renaming bare index");
        let migration = self.orchestrator.migrate(name, &backup, mappings).await?;
        self.indexes.delete(name).await?;
        info!(
            name = %name,
            backup = %backup,
            documents = migration.doc_count,
            "bare index renamed"
        );

        Ok(RenameOutcome::Renamed { backup, migration })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::orchestrator::MigrationConfig;
    use crate::ErrorKind;
    use esmigrate_client::{MemoryCluster, Operation};
    use serde_json::json;

    fn orchestrator(cluster: &Arc<MemoryCluster>) -> Orchestrator {
        Orchestrator::new(
            cluster.clone(),
            Arc::new(ManualClock::new()),
            MigrationConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_bare_index_is_renamed() {
        let cluster = Arc::new(MemoryCluster::new().with_index("products", 50_000));
        let orchestrator = orchestrator(&cluster);
        let resolver = RenameResolver::new(cluster.clone(), &orchestrator);

        let mappings = json!({ "properties": { "sku": { "type": "keyword" } } });
        let outcome = resolver
            .rename_if_needed("products", &mappings, DEFAULT_RENAME_SUFFIX)
            .await
            .unwrap();

        assert_eq!(outcome.backup(), Some("products_backup"));
        assert!(!cluster.has_index("products"));
        assert_eq!(cluster.doc_count("products_backup"), Some(50_000));
        assert_eq!(cluster.mappings("products_backup"), Some(mappings));
    }

    #[tokio::test]
    async fn test_alias_is_left_alone() {
        let cluster = Arc::new(
            MemoryCluster::new()
                .with_index("products_v1", 5)
                .with_alias("products", "products_v1", true),
        );
        let orchestrator = orchestrator(&cluster);
        let resolver = RenameResolver::new(cluster.clone(), &orchestrator);

        for _ in 0..2 {
            let outcome = resolver.rename_if_needed("products", &json!({}), "_backup").await.unwrap();
            assert!(matches!(outcome, RenameOutcome::AlreadyAlias));
        }
        assert!(cluster.mutating_calls().is_empty());
    }

    #[tokio::test]
    async fn test_nothing_to_rename() {
        let cluster = Arc::new(MemoryCluster::new());
        let orchestrator = orchestrator(&cluster);
        let outcome = RenameResolver::new(cluster.clone(), &orchestrator)
            .rename_if_needed("products", &json!({}), "_backup")
            .await
            .unwrap();
        assert!(matches!(outcome, RenameOutcome::NothingToRename));
        assert!(cluster.mutating_calls().is_empty());
    }

    #[tokio::test]
    async fn test_taken_backup_aborts() {
        let cluster = Arc::new(
            MemoryCluster::new()
                .with_index("products", 10)
                .with_index("products_old", 3),
        );
        let orchestrator = orchestrator(&cluster);
        let err = RenameResolver::new(cluster.clone(), &orchestrator)
            .rename_if_needed("products", &json!({}), "_old")
            .await
            .unwrap_err();

        assert!(matches!(err, MigrationError::RenameTargetExists { ref index } if index == "products_old"));
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(cluster.mutating_calls().is_empty());
        assert_eq!(cluster.doc_count("products"), Some(10));
    }

    #[tokio::test]
    async fn test_lookup_failures_abort_before_mutation() {
        for operation in [Operation::AliasExists, Operation::IndexExists] {
            let cluster = Arc::new(
                MemoryCluster::new()
                    .with_index("products", 10)
                    .with_fault(operation),
            );
            let orchestrator = orchestrator(&cluster);
            let err = RenameResolver::new(cluster.clone(), &orchestrator)
                .rename_if_needed("products", &json!({}), "_backup")
                .await
                .unwrap_err();

            assert_eq!(err.kind(), ErrorKind::Transport);
            assert!(cluster.mutating_calls().is_empty());
            assert_eq!(cluster.doc_count("products"), Some(10));
        }
    }

    #[tokio::test]
    async fn test_failed_copy_keeps_original() {
        let cluster = Arc::new(
            MemoryCluster::new()
                .with_index("products", 10)
                .with_fault(Operation::TaskStatus),
        );
        let orchestrator = orchestrator(&cluster);
        let err = RenameResolver::new(cluster.clone(), &orchestrator)
            .rename_if_needed("products", &json!({}), "_backup")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(cluster.has_index("products"));
        assert!(cluster.calls_of(Operation::DeleteIndex).is_empty());
    }
}
