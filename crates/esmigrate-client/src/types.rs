//! Request and response bodies exchanged with the cluster.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// One index bound to an alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundIndex {
    /// Index name.
    pub name: String,
    /// Whether this index receives writes through the alias.
    pub is_write_index: bool,
}

/// The set of indexes currently bound to an alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasBindings {
    /// Alias name.
    pub alias: String,
    /// Bound indexes, sorted by name.
    pub indexes: Vec<BoundIndex>,
}

impl AliasBindings {
    /// Bindings of an alias with no bound index.
    pub fn empty(alias: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            indexes: Vec::new(),
        }
    }

    /// Names of all bound indexes.
    pub fn index_names(&self) -> Vec<String> {
        self.indexes.iter().map(|i| i.name.clone()).collect()
    }

    /// The designated write index, if any.
    pub fn write_index(&self) -> Option<&str> {
        self.indexes
            .iter()
            .find(|i| i.is_write_index)
            .map(|i| i.name.as_str())
    }

    /// Whether no index is bound.
    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    /// Decode a `GET /_alias/{alias}` body: `{ index: { aliases: { alias: {..} } } }`.
    pub fn from_response(alias: &str, body: &Value) -> Self {
        let mut indexes: Vec<BoundIndex> = body
            .as_object()
            .into_iter()
            .flatten()
            .filter_map(|(index, entry)| {
                let meta = entry.get("aliases")?.get(alias)?;
                Some(BoundIndex {
                    name: index.clone(),
                    is_write_index: meta
                        .get("is_write_index")
                        .and_then(Value::as_bool)
                        .unwrap_or(false),
                })
            })
            .collect();
        indexes.sort_by(|a, b| a.name.cmp(&b.name));

        Self {
            alias: alias.to_string(),
            indexes,
        }
    }
}

/// One action of an atomic `POST /_aliases` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AliasAction {
    /// Bind `index` to `alias`.
    Add {
        /// Index name.
        index: String,
        /// Alias name.
        alias: String,
        /// Mark the index as the alias write index.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_write_index: Option<bool>,
    },
    /// Unbind `index` from `alias`.
    Remove {
        /// Index name.
        index: String,
        /// Alias name.
        alias: String,
    },
}

impl AliasAction {
    /// Add `index` as the write index of `alias`.
    pub fn add_write(index: impl Into<String>, alias: impl Into<String>) -> Self {
        AliasAction::Add {
            index: index.into(),
            alias: alias.into(),
            is_write_index: Some(true),
        }
    }

    /// Remove `index` from `alias`.
    pub fn remove(index: impl Into<String>, alias: impl Into<String>) -> Self {
        AliasAction::Remove {
            index: index.into(),
            alias: alias.into(),
        }
    }
}

/// Parameters of an asynchronous `POST /_reindex`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReindexRequest {
    /// Source index.
    pub source: String,
    /// Destination index.
    pub dest: String,
    /// Number of slices the cluster splits the job into.
    pub slices: u32,
    /// Timeout of the launch request only, not of the copy.
    pub request_timeout: Duration,
}

impl ReindexRequest {
    /// Request body.
    pub fn body(&self) -> Value {
        json!({
            "source": { "index": self.source },
            "dest": { "index": self.dest },
        })
    }
}

/// `GET /_tasks/{task_id}` response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    /// Whether the task has finished.
    #[serde(default)]
    pub completed: bool,
    /// Failure reported by the cluster.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
    /// Final task response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    /// Task description including live status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<Value>,
}

impl TaskStatus {
    /// A running task.
    pub fn running() -> Self {
        Self::default()
    }

    /// A task that finished without error.
    pub fn succeeded(response: Value) -> Self {
        Self {
            completed: true,
            response: Some(response),
            ..Self::default()
        }
    }

    /// A task that finished with an error.
    pub fn failed(error: Value) -> Self {
        Self {
            completed: true,
            error: Some(error),
            ..Self::default()
        }
    }
}

/// Live status of a reindex (sub-)task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubTaskStatus {
    /// Documents created so far.
    #[serde(default)]
    pub created: u64,
    /// Documents to process.
    #[serde(default)]
    pub total: u64,
}

/// One entry of the detailed task list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubTaskInfo {
    /// Task action (e.g. `indices:data/write/reindex`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// Parent task, set for slices of a sliced reindex.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_task_id: Option<String>,
    /// Live status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<SubTaskStatus>,
}

/// Tasks running on one node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeTasks {
    /// Tasks keyed by task id.
    #[serde(default)]
    pub tasks: BTreeMap<String, SubTaskInfo>,
}

/// `GET /_tasks?detailed=true&actions=...` response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskList {
    /// Per-node task maps keyed by node id.
    #[serde(default)]
    pub nodes: BTreeMap<String, NodeTasks>,
}

impl TaskList {
    /// All tasks whose parent is `parent_task_id`.
    pub fn children_of<'a>(
        &'a self,
        parent_task_id: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a SubTaskInfo)> + 'a {
        self.nodes
            .values()
            .flat_map(|node| node.tasks.iter())
            .filter(move |(_, info)| info.parent_task_id.as_deref() == Some(parent_task_id))
            .map(|(id, info)| (id.as_str(), info))
    }
}
