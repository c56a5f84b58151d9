//! Authenticated HTTP transport with retry, health-check caching, and
//! bounded connection pooling (§4.1). Leaf component — depends on nothing
//! else in the crate.
//!
//! Grounded on the teacher's `sdk/rust/src/client.rs` (`Client`/
//! `ClientConfig`/builder shape, `Arc<HttpClient>` sharing, header
//! construction) and `llm/router.rs`'s retry loop (`while retry_count <=
//! max_retries { ... tokio::time::sleep(backoff) ... }`), generalized from
//! LLM-provider-call retries to generic HTTP-call retries.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{header, Client as HttpClient, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use url::Url;

use crate::error::{Error, Result};

const MAX_ATTEMPTS: u32 = 3;
const BASE_BACKOFF: Duration = Duration::from_secs(2);
const DEFAULT_HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const POOL_MAX_IDLE_PER_HOST: usize = 10;
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// Connection parameters for a `Transport`.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub base_url: Url,
    /// Opaque bearer credential: either the raw API key, or the
    /// base64-encoded certificate — both travel as a bearer token, the
    /// certificate's embedded tenant/user fields are parsed separately by
    /// `settings::identity`.
    pub credential: String,
    pub timeout: Duration,
    pub health_check_interval: Duration,
    pub user_agent: String,
}

impl TransportConfig {
    pub fn new(base_url: Url, credential: impl Into<String>) -> Self {
        Self {
            base_url,
            credential: credential.into(),
            timeout: DEFAULT_TIMEOUT,
            health_check_interval: DEFAULT_HEALTH_CHECK_INTERVAL,
            user_agent: format!("xians-agent-sdk-rust/{}", crate::VERSION),
        }
    }
}

struct ClientState {
    client: HttpClient,
    last_health_check: DateTime<Utc>,
    healthy: bool,
}

/// Shared, thread-safe HTTP transport. One instance per platform/server
/// pairing; re-created lazily (and re-validated) under a lock on health
/// check failure, mirroring the teacher's singleton-client-per-config
/// pattern in `sdk/rust/src/client.rs`.
pub struct Transport {
    config: TransportConfig,
    state: RwLock<Option<ClientState>>,
    tenant_header: Option<String>,
}

impl Transport {
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config,
            state: RwLock::new(None),
            tenant_header: None,
        }
    }

    /// Attach a `TenantId` header to every subsequent request made through
    /// this transport.
    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_header = Some(tenant_id.into());
        self
    }

    fn build_client(&self) -> Result<HttpClient> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            self.config
                .user_agent
                .parse()
                .map_err(|e| Error::configuration(format!("invalid user agent: {}", e)))?,
        );
        headers.insert(
            header::AUTHORIZATION,
            format!("Bearer {}", self.config.credential)
                .parse()
                .map_err(|e| Error::configuration(format!("invalid credential: {}", e)))?,
        );
        if let Some(tenant) = &self.tenant_header {
            headers.insert(
                header::HeaderName::from_static("tenantid"),
                tenant
                    .parse()
                    .map_err(|e| Error::configuration(format!("invalid tenant header: {}", e)))?,
            );
        }

        HttpClient::builder()
            .timeout(self.config.timeout)
            .default_headers(headers)
            .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
            .pool_idle_timeout(POOL_IDLE_TIMEOUT)
            .build()
            .map_err(|e| Error::configuration(format!("failed to build HTTP client: {}", e)))
    }

    /// Returns a client known-healthy within the configured health-check
    /// interval, rebuilding it if the cached result is stale or failed.
    pub async fn get_healthy_client(&self) -> Result<HttpClient> {
        {
            let guard = self.state.read().await;
            if let Some(state) = guard.as_ref() {
                let age = Utc::now() - state.last_health_check;
                if state.healthy
                    && age < chrono::Duration::from_std(self.config.health_check_interval).unwrap_or_default()
                {
                    return Ok(state.client.clone());
                }
            }
        }

        let mut guard = self.state.write().await;
        // Re-check: another task may have refreshed it while we waited for the lock.
        if let Some(state) = guard.as_ref() {
            let age = Utc::now() - state.last_health_check;
            if state.healthy
                && age < chrono::Duration::from_std(self.config.health_check_interval).unwrap_or_default()
            {
                return Ok(state.client.clone());
            }
        }

        let client = self.build_client()?;
        let healthy = Self::probe(&client, &self.config.base_url).await;
        *guard = Some(ClientState {
            client: client.clone(),
            last_health_check: Utc::now(),
            healthy,
        });

        if !healthy {
            warn!(server = %self.config.base_url, "health check failed, proceeding with newly built client anyway");
        }
        Ok(client)
    }

    async fn probe(client: &HttpClient, base_url: &Url) -> bool {
        client
            .get(base_url.clone())
            .send()
            .await
            .map(|r| r.status().is_success() || r.status().is_client_error())
            .unwrap_or(false)
    }

    fn is_transient(status: Option<StatusCode>, is_timeout: bool, is_connect: bool) -> bool {
        if is_timeout || is_connect {
            return true;
        }
        match status {
            None => true,
            Some(code) => {
                code.is_server_error() || code == StatusCode::REQUEST_TIMEOUT || code == StatusCode::TOO_MANY_REQUESTS
            }
        }
    }

    /// Execute an HTTP call built fresh for each attempt (so a consumed
    /// request body can be rebuilt), retrying transient failures up to
    /// `MAX_ATTEMPTS` times with exponential backoff from `BASE_BACKOFF`.
    /// Non-transient 4xx errors fail fast.
    pub async fn execute_with_retry<F>(&self, request_factory: F) -> Result<reqwest::Response>
    where
        F: Fn(&HttpClient) -> reqwest::RequestBuilder,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let client = self.get_healthy_client().await?;
            let request = request_factory(&client);

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() || status == StatusCode::NOT_FOUND || status == StatusCode::CONFLICT {
                        return Ok(response);
                    }
                    if !Self::is_transient(Some(status), false, false) || attempt >= MAX_ATTEMPTS {
                        let path = response.url().path().to_string();
                        let body = response.text().await.unwrap_or_default();
                        return Err(Error::Server {
                            status: status.as_u16(),
                            path,
                            body,
                        });
                    }
                    debug!(attempt, %status, "transient HTTP error, retrying");
                }
                Err(err) => {
                    let transient = Self::is_transient(err.status(), err.is_timeout(), err.is_connect());
                    if !transient || attempt >= MAX_ATTEMPTS {
                        return Err(Error::Connection {
                            server: self.config.base_url.to_string(),
                            message: err.to_string(),
                        });
                    }
                    debug!(attempt, error = %err, "transient transport error, retrying");
                }
            }

            let backoff = BASE_BACKOFF * attempt;
            tokio::time::sleep(backoff).await;
        }
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.config
            .base_url
            .join(path)
            .map_err(|e| Error::configuration(format!("invalid path '{}': {}", path, e)))
    }

    /// GET `path`, returning `Ok(None)` on 404 (per §6: "404 -> null/absent").
    pub async fn get_with_retry<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let url = self.url(path)?;
        let response = self
            .execute_with_retry(move |client| client.get(url.clone()))
            .await?;
        Self::decode_optional(response).await
    }

    pub async fn get_query_with_retry<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<T>> {
        let url = self.url(path)?;
        let query: Vec<(String, String)> = query
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let response = self
            .execute_with_retry(move |client| client.get(url.clone()).query(&query))
            .await?;
        Self::decode_optional(response).await
    }

    pub async fn post_with_retry<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.url(path)?;
        let body = serde_json::to_value(body)?;
        let response = self
            .execute_with_retry(move |client| client.post(url.clone()).json(&body))
            .await?;
        Self::decode_required(response).await
    }

    /// POST with extra per-request headers layered on top of the client's
    /// default headers — used where a caller resolves a header value (such
    /// as a usage event's `TenantId`) per call rather than once at
    /// `Transport` construction.
    pub async fn post_with_retry_headers<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        headers: &HashMap<String, String>,
    ) -> Result<T> {
        let url = self.url(path)?;
        let body = serde_json::to_value(body)?;
        let headers = headers.clone();
        let response = self
            .execute_with_retry(move |client| {
                let mut builder = client.post(url.clone()).json(&body);
                for (name, value) in &headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                builder
            })
            .await?;
        Self::decode_required(response).await
    }

    /// POST returning `true`/`false` on success vs. 409 conflict (secret
    /// create, for instance, maps a 409 onto `Error::Conflict` instead).
    pub async fn post_expect_conflict<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.url(path)?;
        let payload = serde_json::to_value(body)?;
        let response = self
            .execute_with_retry(move |client| client.post(url.clone()).json(&payload))
            .await?;
        if response.status() == StatusCode::CONFLICT {
            return Err(Error::conflict(format!("conflict creating resource at {}", path)));
        }
        Self::decode_required(response).await
    }

    pub async fn put_with_retry<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.url(path)?;
        let body = serde_json::to_value(body)?;
        let response = self
            .execute_with_retry(move |client| client.put(url.clone()).json(&body))
            .await?;
        Self::decode_required(response).await
    }

    /// DELETE returning `true` on success, `false` on not-found (§4.10).
    pub async fn delete_with_retry(&self, path: &str) -> Result<bool> {
        let url = self.url(path)?;
        let response = self
            .execute_with_retry(move |client| client.request(Method::DELETE, url.clone()))
            .await?;
        Ok(response.status().is_success())
    }

    async fn decode_optional<T: DeserializeOwned>(response: reqwest::Response) -> Result<Option<T>> {
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let value: Value = response.json().await.map_err(Error::from)?;
        if value.is_null() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(value)?))
    }

    async fn decode_required<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let value: Value = response.json().await.map_err(Error::from)?;
        Ok(serde_json::from_value(value)?)
    }
}

/// Builds the single-entry header map `metrics::report_async` passes to
/// `post_with_retry_headers` so the usage-report POST carries the *resolved*
/// tenant (explicit > context > tenant cache, per §4.9), not whatever tenant
/// this `Transport` happened to be constructed with.
pub fn tenant_header_map(tenant_id: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    map.insert("TenantId".to_string(), tenant_id.to_string());
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(base_url: &str) -> Transport {
        Transport::new(TransportConfig::new(Url::parse(base_url).unwrap(), "test-credential"))
    }

    #[tokio::test]
    async fn retries_transient_server_errors_then_succeeds() {
        let mut server = mockito::Server::new_async().await;
        let m1 = server
            .mock("GET", "/api/agent/thing")
            .with_status(500)
            .expect(2)
            .create_async()
            .await;
        let m2 = server
            .mock("GET", "/api/agent/thing")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok":true}"#)
            .expect(1)
            .create_async()
            .await;

        let transport = transport(&server.url());
        let result: Option<Value> = transport.get_with_retry("/api/agent/thing").await.unwrap();
        assert_eq!(result, Some(serde_json::json!({"ok": true})));
        m1.assert_async().await;
        m2.assert_async().await;
    }

    #[tokio::test]
    async fn does_not_retry_404_returns_none() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("GET", "/api/agent/missing")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        let transport = transport(&server.url());
        let result: Option<Value> = transport.get_with_retry("/api/agent/missing").await.unwrap();
        assert_eq!(result, None);
        m.assert_async().await;
    }

    #[tokio::test]
    async fn non_transient_4xx_fails_fast() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("GET", "/api/agent/forbidden")
            .with_status(403)
            .expect(1)
            .create_async()
            .await;

        let transport = transport(&server.url());
        let err = transport
            .get_with_retry::<Value>("/api/agent/forbidden")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Server { status: 403, .. }));
        m.assert_async().await;
    }

    #[tokio::test]
    async fn post_with_retry_headers_carries_the_resolved_tenant() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("POST", "/api/agent/usage/report")
            .match_header("tenantid", "acme")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("{}")
            .expect(1)
            .create_async()
            .await;

        let transport = transport(&server.url());
        let headers = tenant_header_map("acme");
        let _: Value = transport
            .post_with_retry_headers("/api/agent/usage/report", &serde_json::json!({}), &headers)
            .await
            .unwrap();
        m.assert_async().await;
    }
}
