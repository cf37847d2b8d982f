//! esmigrate core.
//!
//! Zero-downtime Elasticsearch index migration: a new index is created with the
//! new mappings, the documents are copied with an asynchronous reindex, and the
//! alias is moved onto the new index in one atomic request.
//!
//! # Components
//!
//! - [`estimate`]: document count to slices, timeout and poll interval
//! - [`Inspector`]: read-only index and alias queries
//! - [`IndexManager`]: index creation and deletion
//! - [`TaskTracker`]: polls a reindex task to a terminal state
//! - [`Orchestrator`]: count, estimate, launch, track
//! - [`CutoverManager`]: atomic alias rebind
//! - [`RenameResolver`]: moves a bare index out of an alias' way
//! - [`Workflow`]: all of the above, in order
//!
//! Every component takes an `Arc<dyn Cluster>`; tests use
//! `esmigrate_client::MemoryCluster` (feature `memory`) and [`ManualClock`].

pub mod clock;
pub mod cutover;
pub mod error;
pub mod estimator;
pub mod inspector;
pub mod lifecycle;
pub mod orchestrator;
pub mod plan;
pub mod resolver;
pub mod tracker;
pub mod workflow;

pub use clock::{Clock, ManualClock, TokioClock};
pub use cutover::{cutover_actions, CutoverManager, CutoverReport};
pub use error::{ErrorKind, MigrationError, Result};
pub use estimator::{estimate, EstimatedParams};
pub use inspector::{AliasState, IndexMetadata, Inspector};
pub use lifecycle::IndexManager;
pub use orchestrator::{
    CountFailurePolicy, MigrationConfig, MigrationResult, Orchestrator, REINDEX_REQUEST_TIMEOUT,
};
pub use plan::MigrationPlan;
pub use resolver::{RenameOutcome, RenameResolver, DEFAULT_RENAME_SUFFIX};
pub use tracker::{ProgressSnapshot, ReindexTask, TaskState, TaskTracker};
pub use workflow::{Workflow, WorkflowReport};
