//! Read-only index and alias queries.
//!
//! Plain queries collapse their own failure into a negative answer (`false`,
//! [`AliasState::Absent`], `None`, zero) and log it. Callers that mutate the
//! cluster based on the answer use the `try_` variants, which keep transport
//! errors as errors.

use std::sync::Arc;

use esmigrate_client::{AliasBindings, Cluster};
use tracing::{info, warn};

use crate::error::{MigrationError, Result};

/// What an alias name currently denotes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AliasState {
    /// No alias by that name (or it could not be inspected).
    Absent,
    /// The alias exists but no index is bound to it.
    Unbound,
    /// The alias is bound to at least one index.
    Bound(AliasBindings),
}

impl AliasState {
    /// Whether the alias exists at all.
    pub fn exists(&self) -> bool {
        !matches!(self, AliasState::Absent)
    }
}

/// Metadata used to pick the newest of several aliased indexes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexMetadata {
    /// Index name.
    pub name: String,
    /// Creation time in epoch milliseconds.
    pub creation_timestamp: i64,
    /// Primary document count, if it could be read.
    pub document_count: Option<u64>,
}

/// Read-only inspector over a cluster.
pub struct Inspector {
    cluster: Arc<dyn Cluster>,
}

impl Inspector {
    /// Create a new inspector.
    pub fn new(cluster: Arc<dyn Cluster>) -> Self {
        Self { cluster }
    }

    /// Whether `name` is an existing index.
    pub async fn index_exists(&self, name: &str) -> bool {
        match self.try_index_exists(name).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!(index = %name, error = %e, "index existence check failed");
                false
            }
        }
    }

    /// Whether `name` is an existing index, surfacing lookup failures.
    pub async fn try_index_exists(&self, name: &str) -> Result<bool> {
        self.cluster
            .index_exists(name)
            .await
            .map_err(|e| MigrationError::transport(format!("check index {}", name), e))
    }

    /// Whether `name` is an existing alias.
    pub async fn alias_exists(&self, name: &str) -> bool {
        self.alias_state(name).await.exists()
    }

    /// Classify `name` as an absent, unbound or bound alias. A failed lookup
    /// reads as [`AliasState::Absent`].
    pub async fn alias_state(&self, name: &str) -> AliasState {
        match self.try_alias_state(name).await {
            Ok(state) => state,
            Err(e) => {
                warn!(alias = %name, error = %e, "alias lookup failed");
                AliasState::Absent
            }
        }
    }

    /// Classify `name`, surfacing lookup failures. Only a cluster answer of
    /// "no such alias" yields [`AliasState::Absent`].
    pub async fn try_alias_state(&self, name: &str) -> Result<AliasState> {
        let exists = self
            .cluster
            .alias_exists(name)
            .await
            .map_err(|e| MigrationError::transport(format!("check alias {}", name), e))?;
        if !exists {
            return Ok(AliasState::Absent);
        }

        match self.cluster.alias_bindings(name).await {
            Ok(bindings) if bindings.is_empty() => Ok(AliasState::Unbound),
            Ok(bindings) => Ok(AliasState::Bound(bindings)),
            Err(e) if e.is_not_found() => Ok(AliasState::Unbound),
            Err(e) => Err(MigrationError::transport(
                format!("read bindings of alias {}", name),
                e,
            )),
        }
    }

    /// Indexes currently bound to `alias`; empty when absent or unbound.
    pub async fn bound_indexes(&self, alias: &str) -> Result<AliasBindings> {
        match self.cluster.alias_bindings(alias).await {
            Ok(bindings) => Ok(bindings),
            Err(e) if e.is_not_found() => Ok(AliasBindings::empty(alias)),
            Err(e) => Err(MigrationError::transport(
                format!("read bindings of alias {}", alias),
                e,
            )),
        }
    }

    /// The most recently created index bound to `alias`, or `None` when no index
    /// is bound or the lookup fails.
    pub async fn resolve_latest_index_for_alias(&self, alias: &str) -> Option<IndexMetadata> {
        let names = match self.cluster.alias_bindings(alias).await {
            Ok(bindings) => bindings.index_names(),
            Err(e) => {
                if !e.is_not_found() {
                    warn!(alias = %alias, error = %e, "alias lookup failed");
                }
                return None;
            }
        };
        info!(alias = %alias, indexes = ?names, "indexes bound to alias");
        if names.is_empty() {
            return None;
        }

        let dates = match self.cluster.creation_dates(&names).await {
            Ok(dates) => dates,
            Err(e) => {
                warn!(alias = %alias, error = %e, "creation date lookup failed");
                return None;
            }
        };

        // Ties resolve to the lexicographically last name.
        let (name, creation_timestamp) = dates
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)))?;

        let document_count = match self.cluster.stats_doc_count(&name).await {
            Ok(count) => Some(count),
            Err(e) => {
                warn!(index = %name, error = %e, "doc stats lookup failed");
                None
            }
        };
        info!(
            alias = %alias,
            index = %name,
            creation_timestamp,
            document_count = ?document_count,
            "latest index resolved"
        );

        Some(IndexMetadata {
            name,
            creation_timestamp,
            document_count,
        })
    }

    /// Document count of `index`; a failed lookup counts as zero.
    pub async fn document_count(&self, index: &str) -> u64 {
        match self.try_document_count(index).await {
            Ok(count) => count,
            Err(e) => {
                warn!(index = %index, error = %e, "document count failed, assuming empty");
                0
            }
        }
    }

    /// Document count of `index`, surfacing lookup failures.
    pub async fn try_document_count(&self, index: &str) -> Result<u64> {
        self.cluster
            .count(index)
            .await
            .map_err(|source| MigrationError::CountUnavailable {
                index: index.to_string(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use esmigrate_client::{MemoryCluster, Operation};

    fn inspector(cluster: MemoryCluster) -> (Arc<MemoryCluster>, Inspector) {
        let cluster = Arc::new(cluster);
        (cluster.clone(), Inspector::new(cluster))
    }

    #[tokio::test]
    async fn test_alias_state_distinguishes_unbound() {
        let (_, inspector) = inspector(
            MemoryCluster::new()
                .with_index("v1", 3)
                .with_alias("bound", "v1", true)
                .with_empty_alias("unbound"),
        );

        assert_eq!(inspector.alias_state("missing").await, AliasState::Absent);
        assert_eq!(inspector.alias_state("unbound").await, AliasState::Unbound);
        assert!(matches!(inspector.alias_state("bound").await, AliasState::Bound(_)));
        assert!(inspector.alias_exists("unbound").await);
        assert!(!inspector.alias_exists("missing").await);
    }

    #[tokio::test]
    async fn test_lookup_failures_collapse() {
        let (_, inspector) = inspector(
            MemoryCluster::new()
                .with_index("v1", 3)
                .with_alias("p", "v1", true)
                .with_fault(Operation::IndexExists)
                .with_fault(Operation::AliasExists)
                .with_fault(Operation::Count),
        );

        assert!(!inspector.index_exists("v1").await);
        assert_eq!(inspector.alias_state("p").await, AliasState::Absent);
        assert_eq!(inspector.document_count("v1").await, 0);
        let err = inspector.try_document_count("v1").await.unwrap_err();
        assert!(matches!(err, MigrationError::CountUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_fallible_lookups_surface_failures() {
        let (cluster, inspector) = inspector(
            MemoryCluster::new()
                .with_index("v1", 3)
                .with_alias("p", "v1", true),
        );
        assert!(matches!(inspector.try_alias_state("p").await, Ok(AliasState::Bound(_))));
        assert_eq!(inspector.try_alias_state("q").await.unwrap(), AliasState::Absent);
        assert!(inspector.try_index_exists("v1").await.unwrap());

        cluster.inject_fault(Operation::AliasExists);
        cluster.inject_fault(Operation::IndexExists);
        let err = inspector.try_alias_state("p").await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Transport);
        assert_eq!(
            inspector.try_index_exists("v1").await.unwrap_err().kind(),
            crate::ErrorKind::Transport
        );

        cluster.clear_fault(Operation::AliasExists);
        cluster.inject_fault(Operation::AliasBindings);
        assert!(inspector.try_alias_state("p").await.is_err());
        assert_eq!(inspector.alias_state("p").await, AliasState::Absent);
    }

    #[tokio::test]
    async fn test_resolve_latest_picks_newest() {
        let (_, inspector) = inspector(
            MemoryCluster::new()
                .with_index_created_at("p_1", 10, 1_000)
                .with_index_created_at("p_3", 30, 3_000)
                .with_index_created_at("p_2", 20, 2_000)
                .with_alias("p", "p_1", false)
                .with_alias("p", "p_2", false)
                .with_alias("p", "p_3", true),
        );

        let latest = inspector.resolve_latest_index_for_alias("p").await.unwrap();
        assert_eq!(latest.name, "p_3");
        assert_eq!(latest.creation_timestamp, 3_000);
        assert_eq!(latest.document_count, Some(30));
    }

    #[tokio::test]
    async fn test_resolve_latest_tie_and_empty() {
        let (_, inspector) = inspector(
            MemoryCluster::new()
                .with_index_created_at("a", 1, 5_000)
                .with_index_created_at("b", 1, 5_000)
                .with_alias("p", "a", false)
                .with_alias("p", "b", false)
                .with_empty_alias("empty"),
        );

        assert_eq!(inspector.resolve_latest_index_for_alias("p").await.unwrap().name, "b");
        assert!(inspector.resolve_latest_index_for_alias("empty").await.is_none());
        assert!(inspector.resolve_latest_index_for_alias("missing").await.is_none());
    }

    #[tokio::test]
    async fn test_bound_indexes() {
        let (cluster, inspector) = inspector(
            MemoryCluster::new()
                .with_index("v1", 1)
                .with_alias("p", "v1", true),
        );
        assert_eq!(inspector.bound_indexes("p").await.unwrap().index_names(), vec!["v1"]);
        assert!(inspector.bound_indexes("q").await.unwrap().is_empty());

        cluster.inject_fault(Operation::AliasBindings);
        let err = inspector.bound_indexes("p").await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Transport);
    }
}
