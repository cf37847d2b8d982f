//! Client configuration.

use std::time::Duration;

/// Default cluster address.
pub const DEFAULT_HOST: &str = "http://127.0.0.1:9200";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of retries for read-only requests.
pub const DEFAULT_MAX_RETRIES: usize = 3;

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Cluster base URLs (e.g., "http://127.0.0.1:9200"). Requests start at the
    /// first host and rotate on retry.
    pub hosts: Vec<String>,

    /// Basic-auth user name.
    pub username: Option<String>,

    /// Basic-auth password.
    pub password: Option<String>,

    /// Verify TLS certificates.
    pub verify_certs: bool,

    /// Per-request timeout.
    pub timeout: Duration,

    /// Retries for read-only requests (GET/HEAD). Mutating requests are never retried.
    pub max_retries: usize,

    /// Whether a timed-out read-only request is retried.
    pub retry_on_timeout: bool,
}

impl ClientConfig {
    /// Create a new client configuration for a single host.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            hosts: vec![host.into()],
            username: None,
            password: None,
            verify_certs: true,
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_on_timeout: true,
        }
    }

    /// Create a configuration for a local single-node cluster.
    pub fn localhost() -> Self {
        Self::new(DEFAULT_HOST)
    }

    /// Replace the host list.
    pub fn with_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hosts = hosts.into_iter().map(Into::into).collect();
        self
    }

    /// Set basic-auth credentials.
    pub fn with_basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Enable or disable TLS certificate verification.
    pub fn with_verify_certs(mut self, verify: bool) -> Self {
        self.verify_certs = verify;
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the retry budget for read-only requests.
    pub fn with_max_retries(mut self, retries: usize) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set whether timeouts are retried.
    pub fn with_retry_on_timeout(mut self, retry: bool) -> Self {
        self.retry_on_timeout = retry;
        self
    }

    /// Host used for the given attempt (0-based).
    pub(crate) fn host_for_attempt(&self, attempt: usize) -> &str {
        if self.hosts.is_empty() {
            return DEFAULT_HOST;
        }
        self.hosts[attempt % self.hosts.len()].trim_end_matches('/')
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::localhost()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.hosts, vec![DEFAULT_HOST.to_string()]);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.max_retries, DEFAULT_MAX_RETRIES);
        assert!(config.verify_certs);
        assert!(config.retry_on_timeout);
        assert!(config.username.is_none());
    }

    #[test]
    fn test_config_builder() {
        let config = ClientConfig::new("https://es-1:9200")
            .with_basic_auth("elastic", "changeme")
            .with_verify_certs(false)
            .with_timeout(Duration::from_secs(90))
            .with_max_retries(0)
            .with_retry_on_timeout(false);

        assert_eq!(config.username.as_deref(), Some("elastic"));
        assert_eq!(config.password.as_deref(), Some("changeme"));
        assert!(!config.verify_certs);
        assert_eq!(config.timeout, Duration::from_secs(90));
        assert_eq!(config.max_retries, 0);
        assert!(!config.retry_on_timeout);
    }

    #[test]
    fn test_hosts_rotate_per_attempt() {
        let config = ClientConfig::localhost().with_hosts(["http://a:9200/", "http://b:9200"]);
        assert_eq!(config.host_for_attempt(0), "http://a:9200");
        assert_eq!(config.host_for_attempt(1), "http://b:9200");
        assert_eq!(config.host_for_attempt(2), "http://a:9200");
    }

    #[test]
    fn test_empty_hosts_fall_back_to_default() {
        let config = ClientConfig::localhost().with_hosts(Vec::<String>::new());
        assert_eq!(config.host_for_attempt(3), DEFAULT_HOST);
    }
}
