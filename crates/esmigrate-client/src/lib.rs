//! esmigrate client - the cluster collaborator used by the migration core.
//!
//! This crate exposes the narrow set of Elasticsearch APIs the migration
//! workflow drives: document counts, index and alias inspection, index
//! creation and deletion, asynchronous reindex, task status, and atomic
//! alias updates.
//!
//! # Quick Start
//!
//! ```ignore
//! use esmigrate_client::{Client, ClientConfig, Cluster};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::connect(
//!         ClientConfig::new("https://es.internal:9200").with_basic_auth("elastic", "secret"),
//!     )?;
//!
//!     let docs = client.count("products_v1").await?;
//!     println!("products_v1 holds {} documents", docs);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod cluster;
pub mod config;
pub mod error;
#[cfg(any(test, feature = "memory"))]
pub mod memory;
pub mod types;

pub use client::Client;
pub use cluster::Cluster;
pub use config::ClientConfig;
pub use error::Error;
#[cfg(any(test, feature = "memory"))]
pub use memory::{ClusterCall, MemoryCluster, Operation, TaskScript};
pub use types::{
    AliasAction, AliasBindings, ReindexRequest, SubTaskInfo, SubTaskStatus, TaskList, TaskStatus,
};
