//! Migration plan.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::resolver::DEFAULT_RENAME_SUFFIX;

/// Everything one workflow run needs to know.
///
/// # Example
///
/// ```
/// use esmigrate_core::MigrationPlan;
/// use serde_json::json;
///
/// let plan = MigrationPlan::new("products", json!({ "properties": {} }))
///     .with_dest("products_v2")
///     .with_delete_old(true);
/// assert_eq!(plan.rename_suffix, "_backup");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationPlan {
    /// Alias the clients use.
    pub alias: String,
    /// Index to copy from; resolved from the alias when `None`.
    pub source: Option<String>,
    /// Index to create; `<alias>_<unix-seconds>` when `None`.
    pub dest: Option<String>,
    /// Mappings of the new index.
    pub mappings: Value,
    /// Suffix used when a bare index has to be renamed.
    pub rename_suffix: String,
    /// Delete the source once the alias has moved.
    pub delete_old: bool,
}

impl MigrationPlan {
    /// Create a plan for `alias` with the new `mappings`.
    pub fn new(alias: impl Into<String>, mappings: Value) -> Self {
        Self {
            alias: alias.into(),
            source: None,
            dest: None,
            mappings,
            rename_suffix: DEFAULT_RENAME_SUFFIX.to_string(),
            delete_old: false,
        }
    }

    /// Copy from an explicit source index.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Create an explicitly named destination index.
    pub fn with_dest(mut self, dest: impl Into<String>) -> Self {
        self.dest = Some(dest.into());
        self
    }

    /// Set the rename suffix.
    pub fn with_rename_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.rename_suffix = suffix.into();
        self
    }

    /// Delete the source after cutover.
    pub fn with_delete_old(mut self, delete_old: bool) -> Self {
        self.delete_old = delete_old;
        self
    }

    /// Destination name, defaulting to a timestamped name at `now`.
    pub fn dest_name(&self, now: DateTime<Utc>) -> String {
        match &self.dest {
            Some(dest) => dest.clone(),
            None => timestamped_name(&self.alias, now),
        }
    }
}

/// `<alias>_<unix-seconds>`.
pub fn timestamped_name(alias: &str, now: DateTime<Utc>) -> String {
    format!("{}_{}", alias, now.timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_builder() {
        let plan = MigrationPlan::new("p", json!({}))
            .with_source("p_1")
            .with_dest("p_2")
            .with_rename_suffix("_old")
            .with_delete_old(true);

        assert_eq!(plan.source.as_deref(), Some("p_1"));
        assert_eq!(plan.dest.as_deref(), Some("p_2"));
        assert_eq!(plan.rename_suffix, "_old");
        assert!(plan.delete_old);
    }

    #[test]
    fn test_dest_name_defaults_to_timestamp() {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let plan = MigrationPlan::new("products", json!({}));
        assert_eq!(plan.dest_name(now), "products_1700000000");
        assert_eq!(plan.with_dest("products_v2").dest_name(now), "products_v2");
    }
}
