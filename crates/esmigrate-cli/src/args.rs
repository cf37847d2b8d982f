//! Command line arguments and the configuration derived from them.

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser};
use esmigrate_client::config::{DEFAULT_HOST, DEFAULT_MAX_RETRIES};
use esmigrate_client::ClientConfig;
use esmigrate_core::{CountFailurePolicy, MigrationConfig, MigrationPlan, DEFAULT_RENAME_SUFFIX};
use serde_json::Value;

use crate::mapping::MappingSource;

/// Zero-downtime Elasticsearch index migration.
///
/// Creates a new index with the given mappings, reindexes the documents of the
/// index currently behind the alias into it, and atomically moves the alias.
#[derive(Debug, Parser)]
#[command(name = "esmigrate")]
#[command(version, about = "Zero-downtime Elasticsearch index migration")]
#[command(disable_version_flag = true)]
pub struct Args {
    /// Alias the clients use.
    #[arg(short = 'a', long)]
    pub alias: String,

    /// Index to copy from. Defaults to the newest index behind the alias.
    #[arg(short = 'o', long = "old_index")]
    pub old_index: Option<String>,

    /// Index to create. Defaults to <alias>_<unix-seconds>.
    #[arg(short = 'n', long = "new_index")]
    pub new_index: Option<String>,

    /// JSON file keyed by alias: {"<alias>": {"mappings": {...}}}.
    #[arg(short = 'm', long = "mapping_file_path", conflicts_with = "mapping")]
    pub mapping_file_path: Option<PathBuf>,

    /// Inline mappings JSON.
    #[arg(short = 'M', long)]
    pub mapping: Option<String>,

    /// Delete the old index once the alias has moved.
    #[arg(short = 'd', long = "delete_old")]
    pub delete_old: bool,

    /// Suffix for renaming a bare index that occupies the alias name.
    #[arg(short = 's', long, default_value = DEFAULT_RENAME_SUFFIX)]
    pub suffix: String,

    /// Cluster URL. May be given more than once.
    #[arg(long = "host", default_value = DEFAULT_HOST)]
    pub hosts: Vec<String>,

    /// Basic auth user.
    #[arg(long)]
    pub username: Option<String>,

    /// Basic auth password.
    #[arg(long, requires = "username")]
    pub password: Option<String>,

    /// Skip TLS certificate verification.
    #[arg(long)]
    pub insecure: bool,

    /// Per-request timeout in seconds.
    #[arg(long = "request_timeout", default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// Retries for read-only requests.
    #[arg(long = "max_retries", default_value_t = DEFAULT_MAX_RETRIES)]
    pub max_retries: usize,

    /// Do not retry read-only requests that timed out.
    #[arg(long = "no_retry_on_timeout")]
    pub no_retry_on_timeout: bool,

    /// Treat an unreadable document count as an empty source instead of failing.
    #[arg(long = "lenient_count")]
    pub lenient_count: bool,

    /// Print version.
    #[arg(short = 'v', long, action = ArgAction::Version)]
    version: Option<bool>,
}

impl Args {
    /// Where the mappings come from.
    pub fn mapping_source(&self) -> MappingSource {
        match (&self.mapping, &self.mapping_file_path) {
            (Some(inline), _) => MappingSource::Inline(inline.clone()),
            (None, Some(path)) => MappingSource::File(path.clone()),
            (None, None) => MappingSource::Default,
        }
    }

    /// The migration plan for `mappings`.
    pub fn plan(&self, mappings: Value) -> MigrationPlan {
        let mut plan = MigrationPlan::new(&self.alias, mappings)
            .with_rename_suffix(&self.suffix)
            .with_delete_old(self.delete_old);
        if let Some(source) = &self.old_index {
            plan = plan.with_source(source);
        }
        if let Some(dest) = &self.new_index {
            plan = plan.with_dest(dest);
        }
        plan
    }
}

/// Configuration of one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Cluster connection.
    pub client: ClientConfig,
    /// Migration behaviour.
    pub migration: MigrationConfig,
}

impl From<&Args> for RunConfig {
    fn from(args: &Args) -> Self {
        let mut client = ClientConfig::localhost()
            .with_hosts(args.hosts.iter().cloned())
            .with_verify_certs(!args.insecure)
            .with_timeout(Duration::from_secs(args.request_timeout_secs))
            .with_max_retries(args.max_retries)
            .with_retry_on_timeout(!args.no_retry_on_timeout);
        if let Some(username) = &args.username {
            client = client.with_basic_auth(username, args.password.clone().unwrap_or_default());
        }

        let count_failure = if args.lenient_count {
            CountFailurePolicy::TreatAsEmpty
        } else {
            CountFailurePolicy::Abort
        };

        Self {
            client,
            migration: MigrationConfig {
                count_failure,
                ..MigrationConfig::default()
            },
        }
    }
}
