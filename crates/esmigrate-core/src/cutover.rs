//! Atomic alias cutover.
//!
//! The alias is moved in one `_aliases` request that removes every current
//! binding and adds the new index as the sole write index, so readers never see
//! the alias unbound or bound to both generations.

use std::sync::Arc;

use esmigrate_client::{AliasAction, Cluster};
use tracing::{error, info, warn};

use crate::error::{MigrationError, Result};
use crate::inspector::Inspector;

/// Outcome of a cutover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CutoverReport {
    /// Alias that was moved.
    pub alias: String,
    /// Indexes the alias was unbound from.
    pub removed: Vec<String>,
    /// The new write index.
    pub new_index: String,
}

/// Actions that move `alias` from `current` onto `new_index`.
///
/// `new_index` is removed and re-added if it is already bound, which leaves it
/// as the only write index.
pub fn cutover_actions(alias: &str, current: &[String], new_index: &str) -> Vec<AliasAction> {
    current
        .iter()
        .map(|index| AliasAction::remove(index.as_str(), alias))
        .chain(std::iter::once(AliasAction::add_write(new_index, alias)))
        .collect()
}

/// Rebinds aliases.
pub struct CutoverManager {
    cluster: Arc<dyn Cluster>,
    inspector: Inspector,
}

impl CutoverManager {
    /// Create a new cutover manager.
    pub fn new(cluster: Arc<dyn Cluster>) -> Self {
        Self {
            inspector: Inspector::new(Arc::clone(&cluster)),
            cluster,
        }
    }

    /// Bind `alias` to `new_index` only, in one atomic request.
    pub async fn cutover(&self, alias: &str, new_index: &str) -> Result<CutoverReport> {
        let current = self.inspector.bound_indexes(alias).await?.index_names();
        if current.is_empty() {
            warn!(alias = %alias, "alias currently bound to no index");
        } else {
            info!(alias = %alias, indexes = ?current, "alias currently bound");
        }

        let actions = cutover_actions(alias, &current, new_index);
        self.cluster.update_aliases(&actions).await.map_err(|e| {
            error!(alias = %alias, new_index = %new_index, error = %e, "alias update failed");
            MigrationError::transport(format!("move alias {} to {}", alias, new_index), e)
        })?;

        info!(alias = %alias, from = ?current, to = %new_index, "alias switched");
        Ok(CutoverReport {
            alias: alias.to_string(),
            removed: current,
            new_index: new_index.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use esmigrate_client::{MemoryCluster, Operation};

    #[test]
    fn test_actions_remove_then_add() {
        let actions = cutover_actions("p", &["p_1".into(), "p_2".into()], "p_3");
        assert_eq!(
            actions,
            vec![
                AliasAction::remove("p_1", "p"),
                AliasAction::remove("p_2", "p"),
                AliasAction::add_write("p_3", "p"),
            ]
        );
        assert_eq!(cutover_actions("p", &[], "p_3"), vec![AliasAction::add_write("p_3", "p")]);
    }

    #[tokio::test]
    async fn test_cutover_moves_alias_in_one_request() {
        let cluster = Arc::new(
            MemoryCluster::new()
                .with_index("p_1", 1)
                .with_index("p_2", 1)
                .with_index("p_3", 0)
                .with_alias("p", "p_1", false)
                .with_alias("p", "p_2", true),
        );

        let report = CutoverManager::new(cluster.clone()).cutover("p", "p_3").await.unwrap();
        assert_eq!(report.removed, vec!["p_1", "p_2"]);

        assert_eq!(cluster.calls_of(Operation::UpdateAliases).len(), 1);
        let bindings = cluster.bindings("p").unwrap();
        assert_eq!(bindings.index_names(), vec!["p_3"]);
        assert_eq!(bindings.write_index(), Some("p_3"));

        // Every state a reader could observe has exactly one bound index.
        for observed in cluster.alias_history("p") {
            assert_eq!(observed.len(), 1);
        }
    }

    #[tokio::test]
    async fn test_cutover_creates_missing_alias() {
        let cluster = Arc::new(MemoryCluster::new().with_index("p_1", 0));
        let report = CutoverManager::new(cluster.clone()).cutover("p", "p_1").await.unwrap();
        assert!(report.removed.is_empty());
        assert_eq!(cluster.bindings("p").unwrap().write_index(), Some("p_1"));
    }

    #[tokio::test]
    async fn test_failed_cutover_keeps_old_binding() {
        let cluster = Arc::new(
            MemoryCluster::new()
                .with_index("p_1", 1)
                .with_alias("p", "p_1", true),
        );

        // The new index does not exist, so the request is rejected as a whole.
        let err = CutoverManager::new(cluster.clone()).cutover("p", "p_2").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(cluster.bindings("p").unwrap().index_names(), vec!["p_1"]);
    }

    #[tokio::test]
    async fn test_unreadable_bindings_abort_before_update() {
        let cluster = Arc::new(
            MemoryCluster::new()
                .with_index("p_1", 1)
                .with_index("p_2", 0)
                .with_alias("p", "p_1", true)
                .with_fault(Operation::AliasBindings),
        );
        assert!(CutoverManager::new(cluster.clone()).cutover("p", "p_2").await.is_err());
        assert!(cluster.calls_of(Operation::UpdateAliases).is_empty());
    }

    #[tokio::test]
    async fn test_cutover_onto_already_bound_index() {
        let cluster = Arc::new(
            MemoryCluster::new()
                .with_index("p_1", 1)
                .with_index("p_2", 1)
                .with_alias("p", "p_1", true)
                .with_alias("p", "p_2", false),
        );
        CutoverManager::new(cluster.clone()).cutover("p", "p_2").await.unwrap();
        let bindings = cluster.bindings("p").unwrap();
        assert_eq!(bindings.index_names(), vec!["p_2"]);
        assert_eq!(bindings.write_index(), Some("p_2"));
    }
}
