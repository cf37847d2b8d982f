//! In-memory cluster.
//!
//! `MemoryCluster` implements [`Cluster`] over plain maps. Reindex tasks follow
//! a [`TaskScript`], faults can be injected per [`Operation`], every call is
//! journaled, and the bindings of every alias are snapshotted after each
//! mutating request so tests can check which states a concurrent reader could
//! have observed.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::cluster::Cluster;
use crate::error::Error;
use crate::types::{
    AliasAction, AliasBindings, BoundIndex, NodeTasks, ReindexRequest, SubTaskInfo, SubTaskStatus,
    TaskList, TaskStatus,
};

/// Node id reported for every task.
pub const MEMORY_NODE: &str = "mem-node";

/// First creation timestamp handed out (epoch millis).
const EPOCH_START_MS: i64 = 1_700_000_000_000;

/// Cluster operations, used for fault injection and journal filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Count,
    IndexExists,
    AliasExists,
    AliasBindings,
    CreationDates,
    StatsDocCount,
    CreateIndex,
    DeleteIndex,
    StartReindex,
    TaskStatus,
    ListTasks,
    UpdateAliases,
}

impl Operation {
    /// Whether the operation changes cluster state.
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Operation::CreateIndex
                | Operation::DeleteIndex
                | Operation::StartReindex
                | Operation::UpdateAliases
        )
    }
}

/// A request received by the memory cluster.
#[derive(Debug, Clone, PartialEq)]
pub enum ClusterCall {
    Count(String),
    IndexExists(String),
    AliasExists(String),
    AliasBindings(String),
    CreationDates(Vec<String>),
    StatsDocCount(String),
    CreateIndex(String),
    DeleteIndex(String),
    StartReindex(ReindexRequest),
    TaskStatus(String),
    ListTasks(String),
    UpdateAliases(Vec<AliasAction>),
}

impl ClusterCall {
    /// The operation this call invoked.
    pub fn operation(&self) -> Operation {
        match self {
            ClusterCall::Count(_) => Operation::Count,
            ClusterCall::IndexExists(_) => Operation::IndexExists,
            ClusterCall::AliasExists(_) => Operation::AliasExists,
            ClusterCall::AliasBindings(_) => Operation::AliasBindings,
            ClusterCall::CreationDates(_) => Operation::CreationDates,
            ClusterCall::StatsDocCount(_) => Operation::StatsDocCount,
            ClusterCall::CreateIndex(_) => Operation::CreateIndex,
            ClusterCall::DeleteIndex(_) => Operation::DeleteIndex,
            ClusterCall::StartReindex(_) => Operation::StartReindex,
            ClusterCall::TaskStatus(_) => Operation::TaskStatus,
            ClusterCall::ListTasks(_) => Operation::ListTasks,
            ClusterCall::UpdateAliases(_) => Operation::UpdateAliases,
        }
    }

    /// Whether the call changes cluster state.
    pub fn is_mutating(&self) -> bool {
        self.operation().is_mutating()
    }
}

/// Scripted behaviour of reindex tasks.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskScript {
    /// Status polls answered with "running" before the task completes.
    /// `None` keeps the task running forever.
    pub polls_before_completion: Option<u32>,
    /// Error reported when the task completes.
    pub error: Option<Value>,
}

impl TaskScript {
    /// Complete successfully after `polls` running answers.
    pub fn completes_after(polls: u32) -> Self {
        Self {
            polls_before_completion: Some(polls),
            error: None,
        }
    }

    /// Complete with `error` after `polls` running answers.
    pub fn fails_after(polls: u32, error: Value) -> Self {
        Self {
            polls_before_completion: Some(polls),
            error: Some(error),
        }
    }

    /// Never complete.
    pub fn never_completes() -> Self {
        Self {
            polls_before_completion: None,
            error: None,
        }
    }
}

impl Default for TaskScript {
    fn default() -> Self {
        Self::completes_after(1)
    }
}

#[derive(Debug, Clone)]
struct MemoryIndex {
    mappings: Value,
    creation_date: i64,
    docs: u64,
}

#[derive(Debug, Clone)]
struct MemoryTask {
    sources: Vec<String>,
    dest: String,
    slices: u32,
    docs: u64,
    polls: u32,
    script: TaskScript,
    finished: bool,
}

impl MemoryTask {
    fn created_so_far(&self) -> u64 {
        match self.script.polls_before_completion {
            Some(n) if !self.finished => self.docs * u64::from(self.polls) / u64::from(n + 1),
            Some(_) => self.docs,
            None => 0,
        }
    }
}

#[derive(Debug, Default)]
struct State {
    indexes: BTreeMap<String, MemoryIndex>,
    aliases: BTreeMap<String, BTreeMap<String, bool>>,
    tasks: BTreeMap<String, MemoryTask>,
    journal: Vec<ClusterCall>,
    alias_history: Vec<BTreeMap<String, Vec<String>>>,
    faults: HashSet<Operation>,
    script: TaskScript,
    next_task: u64,
    clock_ms: i64,
}

impl State {
    fn record(&mut self, call: ClusterCall) -> Result<(), Error> {
        let operation = call.operation();
        self.journal.push(call);
        if self.faults.contains(&operation) {
            return Err(Error::Transport(format!("injected failure: {:?}", operation)));
        }
        Ok(())
    }

    fn tick(&mut self) -> i64 {
        self.clock_ms += 1_000;
        EPOCH_START_MS + self.clock_ms
    }

    fn snapshot_aliases(&mut self) {
        let snapshot = self
            .aliases
            .iter()
            .map(|(alias, bound)| (alias.clone(), bound.keys().cloned().collect()))
            .collect();
        self.alias_history.push(snapshot);
    }

    /// Concrete indexes behind a name (index or alias).
    fn resolve(&self, name: &str) -> Result<Vec<String>, Error> {
        if self.indexes.contains_key(name) {
            return Ok(vec![name.to_string()]);
        }
        match self.aliases.get(name) {
            Some(bound) => Ok(bound.keys().cloned().collect()),
            None => Err(Error::NotFound(name.to_string())),
        }
    }

    fn docs_of(&self, indexes: &[String]) -> u64 {
        indexes
            .iter()
            .filter_map(|i| self.indexes.get(i))
            .map(|i| i.docs)
            .sum()
    }
}

/// An in-memory [`Cluster`].
///
/// # Example
///
/// ```ignore
/// let cluster = MemoryCluster::new()
///     .with_index("products_v1", 50_000)
///     .with_alias("products", "products_v1", true);
/// assert_eq!(cluster.count("products").await?, 50_000);
/// ```
#[derive(Debug, Default)]
pub struct MemoryCluster {
    state: Mutex<State>,
}

impl MemoryCluster {
    /// Create an empty cluster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an index holding `docs` documents.
    pub fn with_index(self, name: impl Into<String>, docs: u64) -> Self {
        {
            let mut state = self.state.lock();
            let creation_date = state.tick();
            state.indexes.insert(
                name.into(),
                MemoryIndex {
                    mappings: json!({}),
                    creation_date,
                    docs,
                },
            );
        }
        self
    }

    /// Add an index with an explicit creation timestamp (epoch millis).
    pub fn with_index_created_at(self, name: impl Into<String>, docs: u64, millis: i64) -> Self {
        self.state.lock().indexes.insert(
            name.into(),
            MemoryIndex {
                mappings: json!({}),
                creation_date: millis,
                docs,
            },
        );
        self
    }

    /// Bind `index` to `alias`.
    pub fn with_alias(self, alias: impl Into<String>, index: impl Into<String>, is_write: bool) -> Self {
        self.state
            .lock()
            .aliases
            .entry(alias.into())
            .or_default()
            .insert(index.into(), is_write);
        self
    }

    /// Register an alias with no bound index.
    pub fn with_empty_alias(self, alias: impl Into<String>) -> Self {
        self.state.lock().aliases.entry(alias.into()).or_default();
        self
    }

    /// Set the behaviour of reindex tasks launched from now on.
    pub fn with_task_script(self, script: TaskScript) -> Self {
        self.state.lock().script = script;
        self
    }

    /// Make every call of `operation` fail with a transport error.
    pub fn with_fault(self, operation: Operation) -> Self {
        self.inject_fault(operation);
        self
    }

    /// Make every call of `operation` fail with a transport error.
    pub fn inject_fault(&self, operation: Operation) {
        self.state.lock().faults.insert(operation);
    }

    /// Remove an injected fault.
    pub fn clear_fault(&self, operation: Operation) {
        self.state.lock().faults.remove(&operation);
    }

    /// All calls received so far.
    pub fn journal(&self) -> Vec<ClusterCall> {
        self.state.lock().journal.clone()
    }

    /// Calls of one operation.
    pub fn calls_of(&self, operation: Operation) -> Vec<ClusterCall> {
        self.state
            .lock()
            .journal
            .iter()
            .filter(|c| c.operation() == operation)
            .cloned()
            .collect()
    }

    /// Calls that changed (or tried to change) cluster state.
    pub fn mutating_calls(&self) -> Vec<ClusterCall> {
        self.state
            .lock()
            .journal
            .iter()
            .filter(|c| c.is_mutating())
            .cloned()
            .collect()
    }

    /// Forget the journal.
    pub fn clear_journal(&self) {
        self.state.lock().journal.clear();
    }

    /// Whether an index exists.
    pub fn has_index(&self, name: &str) -> bool {
        self.state.lock().indexes.contains_key(name)
    }

    /// Document count of an index.
    pub fn doc_count(&self, name: &str) -> Option<u64> {
        self.state.lock().indexes.get(name).map(|i| i.docs)
    }

    /// Mappings an index was created with.
    pub fn mappings(&self, name: &str) -> Option<Value> {
        self.state.lock().indexes.get(name).map(|i| i.mappings.clone())
    }

    /// Current bindings of an alias, if it exists.
    pub fn bindings(&self, alias: &str) -> Option<AliasBindings> {
        let state = self.state.lock();
        state.aliases.get(alias).map(|bound| bindings_of(alias, bound))
    }

    /// Bound index sets of `alias` as observed after every mutating request.
    /// An absent alias shows up as an empty set.
    pub fn alias_history(&self, alias: &str) -> Vec<Vec<String>> {
        self.state
            .lock()
            .alias_history
            .iter()
            .map(|snapshot| snapshot.get(alias).cloned().unwrap_or_default())
            .collect()
    }
}

fn bindings_of(alias: &str, bound: &BTreeMap<String, bool>) -> AliasBindings {
    AliasBindings {
        alias: alias.to_string(),
        indexes: bound
            .iter()
            .map(|(name, is_write)| BoundIndex {
                name: name.clone(),
                is_write_index: *is_write,
            })
            .collect(),
    }
}

#[async_trait]
impl Cluster for MemoryCluster {
    async fn count(&self, index: &str) -> Result<u64, Error> {
        let mut state = self.state.lock();
        state.record(ClusterCall::Count(index.to_string()))?;
        let targets = state.resolve(index)?;
        Ok(state.docs_of(&targets))
    }

    async fn index_exists(&self, index: &str) -> Result<bool, Error> {
        let mut state = self.state.lock();
        state.record(ClusterCall::IndexExists(index.to_string()))?;
        Ok(state.indexes.contains_key(index))
    }

    async fn alias_exists(&self, alias: &str) -> Result<bool, Error> {
        let mut state = self.state.lock();
        state.record(ClusterCall::AliasExists(alias.to_string()))?;
        Ok(state.aliases.contains_key(alias))
    }

    async fn alias_bindings(&self, alias: &str) -> Result<AliasBindings, Error> {
        let mut state = self.state.lock();
        state.record(ClusterCall::AliasBindings(alias.to_string()))?;
        state
            .aliases
            .get(alias)
            .map(|bound| bindings_of(alias, bound))
            .ok_or_else(|| Error::NotFound(alias.to_string()))
    }

    async fn creation_dates(&self, indexes: &[String]) -> Result<BTreeMap<String, i64>, Error> {
        let mut state = self.state.lock();
        state.record(ClusterCall::CreationDates(indexes.to_vec()))?;
        indexes
            .iter()
            .map(|name| {
                state
                    .indexes
                    .get(name)
                    .map(|i| (name.clone(), i.creation_date))
                    .ok_or_else(|| Error::NotFound(name.clone()))
            })
            .collect()
    }

    async fn stats_doc_count(&self, index: &str) -> Result<u64, Error> {
        let mut state = self.state.lock();
        state.record(ClusterCall::StatsDocCount(index.to_string()))?;
        state
            .indexes
            .get(index)
            .map(|i| i.docs)
            .ok_or_else(|| Error::NotFound(index.to_string()))
    }

    async fn create_index(&self, index: &str, mappings: &Value) -> Result<(), Error> {
        let mut state = self.state.lock();
        state.record(ClusterCall::CreateIndex(index.to_string()))?;
        if state.indexes.contains_key(index) || state.aliases.contains_key(index) {
            return Err(Error::Conflict(format!("index [{}] already exists", index)));
        }
        if !mappings.is_object() {
            return Err(Error::Rejected {
                status: 400,
                kind: "mapper_parsing_exception".to_string(),
                reason: "mappings must be an object".to_string(),
            });
        }
        let creation_date = state.tick();
        state.indexes.insert(
            index.to_string(),
            MemoryIndex {
                mappings: mappings.clone(),
                creation_date,
                docs: 0,
            },
        );
        state.snapshot_aliases();
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> Result<(), Error> {
        let mut state = self.state.lock();
        state.record(ClusterCall::DeleteIndex(index.to_string()))?;
        if state.indexes.remove(index).is_none() {
            return Err(Error::NotFound(index.to_string()));
        }
        for bound in state.aliases.values_mut() {
            bound.remove(index);
        }
        state.aliases.retain(|_, bound| !bound.is_empty());
        state.snapshot_aliases();
        Ok(())
    }

    async fn start_reindex(&self, request: &ReindexRequest) -> Result<String, Error> {
        let mut state = self.state.lock();
        state.record(ClusterCall::StartReindex(request.clone()))?;
        let sources = state.resolve(&request.source)?;
        let docs = state.docs_of(&sources);
        if !state.indexes.contains_key(&request.dest) {
            let creation_date = state.tick();
            state.indexes.insert(
                request.dest.clone(),
                MemoryIndex {
                    mappings: json!({}),
                    creation_date,
                    docs: 0,
                },
            );
        }

        state.next_task += 1;
        let task_id = format!("{}:{}", MEMORY_NODE, state.next_task);
        let script = state.script.clone();
        state.tasks.insert(
            task_id.clone(),
            MemoryTask {
                sources,
                dest: request.dest.clone(),
                slices: request.slices.max(1),
                docs,
                polls: 0,
                script,
                finished: false,
            },
        );
        state.snapshot_aliases();
        Ok(task_id)
    }

    async fn task_status(&self, task_id: &str) -> Result<TaskStatus, Error> {
        let mut state = self.state.lock();
        state.record(ClusterCall::TaskStatus(task_id.to_string()))?;
        let task = state
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| Error::NotFound(task_id.to_string()))?;

        if !task.finished {
            task.polls += 1;
            match task.script.polls_before_completion {
                Some(n) if task.polls > n => task.finished = true,
                _ => return Ok(TaskStatus::running()),
            }
            if task.script.error.is_none() {
                let (sources, dest) = (task.sources.clone(), task.dest.clone());
                let copied = state.docs_of(&sources);
                if let Some(index) = state.indexes.get_mut(&dest) {
                    index.docs += copied;
                }
            }
        }

        let task = &state.tasks[task_id];
        Ok(match &task.script.error {
            Some(error) => TaskStatus::failed(error.clone()),
            None => TaskStatus::succeeded(json!({
                "created": task.docs,
                "total": task.docs,
                "slices": task.slices,
            })),
        })
    }

    async fn list_tasks(&self, actions: &str) -> Result<TaskList, Error> {
        let mut state = self.state.lock();
        state.record(ClusterCall::ListTasks(actions.to_string()))?;

        let mut node = NodeTasks::default();
        for (task_id, task) in state.tasks.iter().filter(|(_, t)| !t.finished) {
            node.tasks.insert(
                task_id.clone(),
                SubTaskInfo {
                    action: Some("indices:data/write/reindex".to_string()),
                    parent_task_id: None,
                    status: Some(SubTaskStatus {
                        created: task.created_so_far(),
                        total: task.docs,
                    }),
                },
            );
            if task.slices < 2 {
                continue;
            }
            let slices = u64::from(task.slices);
            for slice in 0..slices {
                let share = task.docs / slices + u64::from(slice < task.docs % slices);
                let created = task.created_so_far() / slices
                    + u64::from(slice < task.created_so_far() % slices);
                node.tasks.insert(
                    format!("{}{}", task_id, slice),
                    SubTaskInfo {
                        action: Some("indices:data/write/reindex".to_string()),
                        parent_task_id: Some(task_id.clone()),
                        status: Some(SubTaskStatus {
                            created,
                            total: share,
                        }),
                    },
                );
            }
        }

        let mut list = TaskList::default();
        list.nodes.insert(MEMORY_NODE.to_string(), node);
        Ok(list)
    }

    async fn update_aliases(&self, actions: &[AliasAction]) -> Result<(), Error> {
        let mut state = self.state.lock();
        state.record(ClusterCall::UpdateAliases(actions.to_vec()))?;

        // Validate everything before touching state: the request is all-or-nothing.
        for action in actions {
            match action {
                AliasAction::Remove { index, alias } => {
                    let bound = state
                        .aliases
                        .get(alias)
                        .is_some_and(|b| b.contains_key(index));
                    if !bound {
                        return Err(Error::NotFound(format!("aliases [{}] missing on [{}]", alias, index)));
                    }
                }
                AliasAction::Add { index, .. } => {
                    if !state.indexes.contains_key(index) {
                        return Err(Error::NotFound(index.clone()));
                    }
                }
            }
        }

        for action in actions {
            match action {
                AliasAction::Remove { index, alias } => {
                    if let Some(bound) = state.aliases.get_mut(alias) {
                        bound.remove(index);
                    }
                }
                AliasAction::Add {
                    index,
                    alias,
                    is_write_index,
                } => {
                    let bound = state.aliases.entry(alias.clone()).or_default();
                    let is_write = is_write_index.unwrap_or(false);
                    if is_write {
                        bound.values_mut().for_each(|w| *w = false);
                    }
                    bound.insert(index.clone(), is_write);
                }
            }
        }
        state.aliases.retain(|_, bound| !bound.is_empty());
        state.snapshot_aliases();
        Ok(())
    }
}
