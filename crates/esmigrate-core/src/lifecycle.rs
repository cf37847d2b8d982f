//! Index creation and deletion.

use std::sync::Arc;

use esmigrate_client::{Cluster, Error as ClientError};
use serde_json::Value;
use tracing::{error, info};

use crate::error::{MigrationError, Result};

/// Creates and deletes indexes. Never overwrites an existing index.
pub struct IndexManager {
    cluster: Arc<dyn Cluster>,
}

impl IndexManager {
    /// Create a new index manager.
    pub fn new(cluster: Arc<dyn Cluster>) -> Self {
        Self { cluster }
    }

    /// Create `index` with `mappings`.
    pub async fn create(&self, index: &str, mappings: &Value) -> Result<()> {
        match self.cluster.create_index(index, mappings).await {
            Ok(()) => {
                info!(index = %index, "index created");
                Ok(())
            }
            Err(e) => {
                error!(index = %index, error = %e, "index creation failed");
                Err(match e {
                    ClientError::Conflict(_) => MigrationError::IndexExists {
                        index: index.to_string(),
                    },
                    ClientError::Rejected { kind, reason, .. } => MigrationError::MappingRejected {
                        index: index.to_string(),
                        reason: format!("[{}] {}", kind, reason),
                    },
                    other => MigrationError::transport(format!("create index {}", index), other),
                })
            }
        }
    }

    /// Delete `index`.
    pub async fn delete(&self, index: &str) -> Result<()> {
        match self.cluster.delete_index(index).await {
            Ok(()) => {
                info!(index = %index, "index deleted");
                Ok(())
            }
            Err(e) => {
                error!(index = %index, error = %e, "index deletion failed");
                Err(match e {
                    ClientError::NotFound(_) => MigrationError::IndexNotFound {
                        index: index.to_string(),
                    },
                    other => MigrationError::transport(format!("delete index {}", index), other),
                })
            }
        }
    }
}
