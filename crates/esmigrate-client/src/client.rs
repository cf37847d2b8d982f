//! HTTP client for the cluster.
//!
//! This module provides the `Client` struct, the [`Cluster`] implementation
//! used against a real Elasticsearch deployment.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::cluster::Cluster;
use crate::config::ClientConfig;
use crate::error::Error;
use crate::types::{AliasAction, AliasBindings, ReindexRequest, TaskList, TaskStatus};

/// A client for the Elasticsearch REST API.
///
/// # Example
///
/// ```ignore
/// use esmigrate_client::{Client, ClientConfig, Cluster};
///
/// let client = Client::connect(ClientConfig::localhost())?;
/// if client.index_exists("products").await? {
///     println!("{} docs", client.count("products").await?);
/// }
/// ```
pub struct Client {
    http: reqwest::Client,
    config: ClientConfig,
    requests_sent: AtomicU64,
}

impl Client {
    /// Build a client for the configured hosts.
    ///
    /// No request is sent; connectivity problems surface on first use.
    pub fn connect(config: ClientConfig) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(!config.verify_certs)
            .build()
            .map_err(|e| Error::Transport(format!("failed to build http client: {}", e)))?;

        Ok(Self {
            http,
            config,
            requests_sent: AtomicU64::new(0),
        })
    }

    /// Build a client for a single host.
    pub fn connect_to(host: impl Into<String>) -> Result<Self, Error> {
        Self::connect(ClientConfig::new(host))
    }

    /// The client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Number of HTTP requests sent so far, retries included.
    pub fn requests_sent(&self) -> u64 {
        self.requests_sent.load(Ordering::SeqCst)
    }

    fn request(&self, method: Method, host: &str, path: &str) -> RequestBuilder {
        let mut builder = self.http.request(method, format!("{}{}", host, path));
        if let Some(username) = &self.config.username {
            builder = builder.basic_auth(username, self.config.password.as_ref());
        }
        builder
    }

    /// Send a read-only request, retrying on connect errors and timeouts.
    async fn read(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Response, Error> {
        let mut attempt = 0;
        loop {
            let host = self.config.host_for_attempt(attempt);
            self.requests_sent.fetch_add(1, Ordering::SeqCst);
            match self.request(method.clone(), host, path).query(query).send().await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    let retryable =
                        e.is_connect() || (e.is_timeout() && self.config.retry_on_timeout);
                    if retryable && attempt < self.config.max_retries {
                        warn!(host, path, attempt, error = %e, "retrying read request");
                        attempt += 1;
                        continue;
                    }
                    return Err(e.into());
                }
            }
        }
    }

    /// Send a mutating request exactly once.
    async fn write(&self, builder: RequestBuilder) -> Result<Response, Error> {
        self.requests_sent.fetch_add(1, Ordering::SeqCst);
        Ok(builder.send().await?)
    }

    fn write_request(&self, method: Method, path: &str) -> RequestBuilder {
        self.request(method, self.config.host_for_attempt(0), path)
    }

    /// Decode a successful JSON body or convert the error body.
    async fn json<T: DeserializeOwned>(response: Response, resource: &str) -> Result<T, Error> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }
        let body = response.text().await.unwrap_or_default();
        Err(error_from_body(status, &body, resource))
    }

    /// Accept any successful status, discarding the body.
    async fn acknowledged(response: Response, resource: &str) -> Result<(), Error> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(error_from_body(status, &body, resource))
    }

    /// Map a HEAD response to existence.
    fn exists(status: StatusCode, resource: &str) -> Result<bool, Error> {
        if status.is_success() {
            Ok(true)
        } else if status == StatusCode::NOT_FOUND {
            Ok(false)
        } else {
            Err(error_from_body(status, "", resource))
        }
    }
}

#[async_trait]
impl Cluster for Client {
    async fn count(&self, index: &str) -> Result<u64, Error> {
        let response = self.read(Method::GET, &format!("/{}/_count", index), &[]).await?;
        let body: Value = Self::json(response, index).await?;
        body.get("count")
            .and_then(Value::as_u64)
            .ok_or_else(|| Error::InvalidResponse(format!("missing count for {}", index)))
    }

    async fn index_exists(&self, index: &str) -> Result<bool, Error> {
        let response = self.read(Method::HEAD, &format!("/{}", index), &[]).await?;
        Self::exists(response.status(), index)
    }

    async fn alias_exists(&self, alias: &str) -> Result<bool, Error> {
        let response = self.read(Method::HEAD, &format!("/_alias/{}", alias), &[]).await?;
        Self::exists(response.status(), alias)
    }

    async fn alias_bindings(&self, alias: &str) -> Result<AliasBindings, Error> {
        let response = self.read(Method::GET, &format!("/_alias/{}", alias), &[]).await?;
        let body: Value = Self::json(response, alias).await?;
        Ok(AliasBindings::from_response(alias, &body))
    }

    async fn creation_dates(&self, indexes: &[String]) -> Result<BTreeMap<String, i64>, Error> {
        if indexes.is_empty() {
            return Ok(BTreeMap::new());
        }
        let target = indexes.join(",");
        let response = self
            .read(
                Method::GET,
                &format!("/{}/_settings/index.creation_date", target),
                &[],
            )
            .await?;
        let body: Value = Self::json(response, &target).await?;
        parse_creation_dates(&body)
    }

    async fn stats_doc_count(&self, index: &str) -> Result<u64, Error> {
        let response = self.read(Method::GET, &format!("/{}/_stats/docs", index), &[]).await?;
        let body: Value = Self::json(response, index).await?;
        body.pointer(&format!("/indices/{}/primaries/docs/count", index))
            .and_then(Value::as_u64)
            .ok_or_else(|| Error::InvalidResponse(format!("missing doc stats for {}", index)))
    }

    async fn create_index(&self, index: &str, mappings: &Value) -> Result<(), Error> {
        let builder = self
            .write_request(Method::PUT, &format!("/{}", index))
            .json(&json!({ "mappings": mappings }));
        let response = self.write(builder).await?;
        Self::acknowledged(response, index).await
    }

    async fn delete_index(&self, index: &str) -> Result<(), Error> {
        let builder = self.write_request(Method::DELETE, &format!("/{}", index));
        let response = self.write(builder).await?;
        Self::acknowledged(response, index).await
    }

    async fn start_reindex(&self, request: &ReindexRequest) -> Result<String, Error> {
        let slices = request.slices.to_string();
        let builder = self
            .write_request(Method::POST, "/_reindex")
            .query(&[("wait_for_completion", "false"), ("slices", slices.as_str())])
            .timeout(request.request_timeout)
            .json(&request.body());
        let response = self.write(builder).await?;
        let body: Value = Self::json(response, &request.source).await?;
        let task_id = body
            .get("task")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::InvalidResponse("reindex response carries no task id".into()))?;
        debug!(task_id, source = %request.source, dest = %request.dest, "reindex accepted");
        Ok(task_id.to_string())
    }

    async fn task_status(&self, task_id: &str) -> Result<TaskStatus, Error> {
        let response = self.read(Method::GET, &format!("/_tasks/{}", task_id), &[]).await?;
        Self::json(response, task_id).await
    }

    async fn list_tasks(&self, actions: &str) -> Result<TaskList, Error> {
        let response = self
            .read(
                Method::GET,
                "/_tasks",
                &[("detailed", "true"), ("actions", actions)],
            )
            .await?;
        Self::json(response, "_tasks").await
    }

    async fn update_aliases(&self, actions: &[AliasAction]) -> Result<(), Error> {
        let builder = self
            .write_request(Method::POST, "/_aliases")
            .json(&json!({ "actions": actions }));
        let response = self.write(builder).await?;
        Self::acknowledged(response, "_aliases").await
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("hosts", &self.config.hosts)
            .field("requests_sent", &self.requests_sent())
            .finish()
    }
}

/// Convert a non-success response into a client error.
///
/// The cluster reports failures either as `{"error": {"type", "reason"}}` or,
/// for some 404s, as `{"error": "alias [x] missing"}`.
fn error_from_body(status: StatusCode, body: &str, resource: &str) -> Error {
    let parsed: Value = serde_json::from_str(body).unwrap_or(Value::Null);
    let (kind, reason) = match parsed.get("error") {
        Some(Value::Object(err)) => (
            err.get("type")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
            err.get("reason")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        ),
        Some(Value::String(message)) => ("error".to_string(), message.clone()),
        _ => ("unknown".to_string(), body.to_string()),
    };

    if status == StatusCode::NOT_FOUND {
        return Error::NotFound(resource.to_string());
    }
    if status == StatusCode::CONFLICT || kind == "resource_already_exists_exception" {
        return Error::Conflict(format!("{}: {}", resource, reason));
    }
    if status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::GATEWAY_TIMEOUT {
        return Error::Timeout;
    }
    Error::Rejected {
        status: status.as_u16(),
        kind,
        reason,
    }
}

/// Extract `settings.index.creation_date` per index; the cluster sends it as a string.
fn parse_creation_dates(body: &Value) -> Result<BTreeMap<String, i64>, Error> {
    let mut dates = BTreeMap::new();
    for (index, entry) in body.as_object().into_iter().flatten() {
        let raw = entry
            .pointer("/settings/index/creation_date")
            .ok_or_else(|| Error::InvalidResponse(format!("missing creation_date for {}", index)))?;
        let millis = match raw {
            Value::String(s) => s.parse::<i64>().ok(),
            Value::Number(n) => n.as_i64(),
            _ => None,
        }
        .ok_or_else(|| Error::InvalidResponse(format!("bad creation_date for {}", index)))?;
        dates.insert(index.clone(), millis);
    }
    Ok(dates)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_from_structured_body() {
        let body = r#"{"error":{"type":"resource_already_exists_exception","reason":"index [p/abc] already exists"},"status":400}"#;
        let err = error_from_body(StatusCode::BAD_REQUEST, body, "p");
        assert!(err.is_conflict());

        let body = r#"{"error":{"type":"mapper_parsing_exception","reason":"no handler for type [strnig]"},"status":400}"#;
        match error_from_body(StatusCode::BAD_REQUEST, body, "p") {
            Error::Rejected { status, kind, reason } => {
                assert_eq!(status, 400);
                assert_eq!(kind, "mapper_parsing_exception");
                assert!(reason.contains("strnig"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_error_from_string_body() {
        let body = r#"{"error":"alias [products] missing","status":404}"#;
        assert!(error_from_body(StatusCode::NOT_FOUND, body, "products").is_not_found());
    }

    #[test]
    fn test_error_from_empty_body() {
        match error_from_body(StatusCode::SERVICE_UNAVAILABLE, "", "x") {
            Error::Rejected { status, kind, .. } => {
                assert_eq!(status, 503);
                assert_eq!(kind, "unknown");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(matches!(
            error_from_body(StatusCode::GATEWAY_TIMEOUT, "", "x"),
            Error::Timeout
        ));
    }

    #[test]
    fn test_parse_creation_dates() {
        let body = json!({
            "products_v1": { "settings": { "index": { "creation_date": "1719000000000" } } },
            "products_v2": { "settings": { "index": { "creation_date": 1719000500000i64 } } }
        });
        let dates = parse_creation_dates(&body).unwrap();
        assert_eq!(dates["products_v1"], 1_719_000_000_000);
        assert_eq!(dates["products_v2"], 1_719_000_500_000);

        let bad = json!({ "x": { "settings": { "index": {} } } });
        assert!(parse_creation_dates(&bad).is_err());
    }

    #[test]
    fn test_exists_mapping() {
        assert!(Client::exists(StatusCode::OK, "x").unwrap());
        assert!(!Client::exists(StatusCode::NOT_FOUND, "x").unwrap());
        assert!(Client::exists(StatusCode::UNAUTHORIZED, "x").is_err());
    }

    #[test]
    fn test_connect_does_not_send() {
        let client = Client::connect_to("http://127.0.0.1:9").unwrap();
        assert_eq!(client.requests_sent(), 0);
        assert_eq!(client.config().hosts, vec!["http://127.0.0.1:9".to_string()]);
    }
}
