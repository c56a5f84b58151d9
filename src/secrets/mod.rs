//! Secret Vault (§4.10): scoped CRUD over encrypted secrets.
//!
//! Grounded on `knowledge::`'s provider-plus-executor shape (this module is
//! a thinner version of the same "scope tuple in, REST call out" pattern,
//! with no cache in front of it — §4.5's cache is explicitly a Knowledge/
//! Settings/Workflow-Definitions concern, secrets are never cached) and on
//! `transport::Transport::post_expect_conflict` for the 409-on-duplicate-key
//! create semantics.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::executor::{Context as ExecContext, Executor};
use crate::models::ids::{AgentName, TenantId, UserId};
use crate::models::secret::MAX_KEY_LENGTH;
use crate::models::Secret;
use crate::transport::Transport;

const SECRETS_PATH: &str = "/api/agent/secrets";
const SECRETS_FETCH_PATH: &str = "/api/agent/secrets/fetch";

/// The narrower shape returned by fetch-by-key: `value` and
/// `additionalData` only, never the full audit record (§3, §4.10).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretValue {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_data: Option<Value>,
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::validation("secret key must not be empty"));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(Error::validation(format!("secret key exceeds {} characters", MAX_KEY_LENGTH)));
    }
    Ok(())
}

/// `.tenantScope(t?).agentScope(a?).userScope(u?)` — builds the scope tuple
/// every vault operation is keyed by.
#[derive(Debug, Clone, Default)]
pub struct SecretScope {
    pub tenant_id: Option<TenantId>,
    pub agent_id: Option<AgentName>,
    pub user_id: Option<UserId>,
}

impl SecretScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tenant_scope(mut self, tenant_id: Option<TenantId>) -> Self {
        self.tenant_id = tenant_id;
        self
    }

    pub fn agent_scope(mut self, agent_id: Option<AgentName>) -> Self {
        self.agent_id = agent_id;
        self
    }

    pub fn user_scope(mut self, user_id: Option<UserId>) -> Self {
        self.user_id = user_id;
        self
    }

    fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(t) = &self.tenant_id {
            pairs.push(("tenantId", t.as_str().to_string()));
        }
        if let Some(a) = &self.agent_id {
            pairs.push(("agentId", a.as_str().to_string()));
        }
        if let Some(u) = &self.user_id {
            pairs.push(("userId", u.as_str().to_string()));
        }
        pairs
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateRequest<'a> {
    key: &'a str,
    value: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    tenant_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    agent_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    additional_data: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateRequest<'a> {
    value: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    additional_data: Option<Value>,
}

/// Scoped client over `/api/agent/secrets*`. One `SecretVault` per agent,
/// built against the shared `Transport`.
pub struct SecretVault {
    transport: Arc<Transport>,
    executor: Executor,
    scope: SecretScope,
}

impl SecretVault {
    pub fn new(transport: Arc<Transport>, scope: SecretScope) -> Self {
        Self {
            transport,
            executor: Executor::new(),
            scope,
        }
    }

    /// Returns `Error::Conflict` on a duplicate key within scope (§4.10, §7).
    pub async fn create(&self, context: &ExecContext, key: &str, value: &str, additional_data: Option<Value>) -> Result<Secret> {
        validate_key(key)?;
        if value.is_empty() {
            return Err(Error::validation("secret value must not be empty on write"));
        }

        let body = CreateRequest {
            key,
            value,
            tenant_id: self.scope.tenant_id.as_ref().map(|t| t.as_str()),
            agent_id: self.scope.agent_id.as_ref().map(|a| a.as_str()),
            user_id: self.scope.user_id.as_ref().map(|u| u.as_str()),
            additional_data,
        };
        let transport = self.transport.clone();
        let transport_b = self.transport.clone();
        let body_a = serde_json::to_value(&body)?;
        let body_b = body_a.clone();

        self.executor
            .execute(
                context,
                "secrets.create",
                move || async move { transport.post_expect_conflict(SECRETS_PATH, &body_a).await },
                move || async move { transport_b.post_expect_conflict(SECRETS_PATH, &body_b).await },
            )
            .await
    }

    /// Fetch the decrypted value by key; `{value, additionalData}` only
    /// (§3, §4.10). `None` if no secret matches the key within scope.
    pub async fn fetch_by_key(&self, context: &ExecContext, key: &str) -> Result<Option<SecretValue>> {
        let mut query = self.scope.query_pairs();
        query.push(("key", key.to_string()));
        let query_a: Vec<(&str, &str)> = query.iter().map(|(k, v)| (*k, v.as_str())).collect();
        let path = SECRETS_FETCH_PATH.to_string();
        let path_b = path.clone();
        let query_owned = query.clone();

        let transport = self.transport.clone();
        let transport_b = self.transport.clone();

        self.executor
            .execute(
                context,
                "secrets.fetchByKey",
                move || async move { transport.get_query_with_retry(&path, &query_a).await },
                move || async move {
                    let query_b: Vec<(&str, &str)> = query_owned.iter().map(|(k, v)| (*k, v.as_str())).collect();
                    transport_b.get_query_with_retry(&path_b, &query_b).await
                },
            )
            .await
    }

    /// List secrets in scope; `value` is always omitted (§3, §4.10).
    pub async fn list(&self, context: &ExecContext) -> Result<Vec<Secret>> {
        let query = self.scope.query_pairs();
        let query_a: Vec<(&str, &str)> = query.iter().map(|(k, v)| (*k, v.as_str())).collect();
        let query_owned = query.clone();
        let transport = self.transport.clone();
        let transport_b = self.transport.clone();

        Ok(self
            .executor
            .execute(
                context,
                "secrets.list",
                move || async move { transport.get_query_with_retry(SECRETS_PATH, &query_a).await },
                move || async move {
                    let query_b: Vec<(&str, &str)> = query_owned.iter().map(|(k, v)| (*k, v.as_str())).collect();
                    transport_b.get_query_with_retry(SECRETS_PATH, &query_b).await
                },
            )
            .await?
            .unwrap_or_default())
    }

    /// Fetch the full audit record by id, including `value` (§4.10).
    pub async fn get_by_id(&self, context: &ExecContext, id: Uuid) -> Result<Option<Secret>> {
        let path = format!("{}/{}", SECRETS_PATH, id);
        let path_b = path.clone();
        let transport = self.transport.clone();
        let transport_b = self.transport.clone();

        self.executor
            .execute(
                context,
                "secrets.getById",
                move || async move { transport.get_with_retry(&path).await },
                move || async move { transport_b.get_with_retry(&path_b).await },
            )
            .await
    }

    pub async fn update(&self, context: &ExecContext, id: Uuid, value: &str, additional_data: Option<Value>) -> Result<Secret> {
        if value.is_empty() {
            return Err(Error::validation("secret value must not be empty on write"));
        }
        let path = format!("{}/{}", SECRETS_PATH, id);
        let body = UpdateRequest { value, additional_data };
        let body_a = serde_json::to_value(&body)?;
        let body_b = body_a.clone();
        let path_b = path.clone();
        let transport = self.transport.clone();
        let transport_b = self.transport.clone();

        self.executor
            .execute(
                context,
                "secrets.update",
                move || async move { transport.put_with_retry(&path, &body_a).await },
                move || async move { transport_b.put_with_retry(&path_b, &body_b).await },
            )
            .await
    }

    /// Returns `true` on success, `false` if no secret matched (§3, §4.10).
    pub async fn delete(&self, context: &ExecContext, id: Uuid) -> Result<bool> {
        let path = format!("{}/{}", SECRETS_PATH, id);
        let path_b = path.clone();
        let transport = self.transport.clone();
        let transport_b = self.transport.clone();

        self.executor
            .execute(
                context,
                "secrets.delete",
                move || async move { transport.delete_with_retry(&path).await },
                move || async move { transport_b.delete_with_retry(&path_b).await },
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn vault(base_url: &str) -> SecretVault {
        let transport = Arc::new(Transport::new(crate::transport::TransportConfig::new(Url::parse(base_url).unwrap(), "cred")));
        SecretVault::new(transport, SecretScope::new().tenant_scope(Some(TenantId::new("acme"))))
    }

    #[tokio::test]
    async fn create_surfaces_conflict_on_duplicate_key() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("POST", "/api/agent/secrets").with_status(409).create_async().await;

        let vault = vault(&server.url());
        let err = vault
            .create(&ExecContext::OutsideEngine, "api-key", "s3cr3t", None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict { .. }));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn empty_key_is_a_validation_error_before_any_request() {
        let vault = vault("http://localhost:1");
        let err = vault.create(&ExecContext::OutsideEngine, "", "v", None).await.unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[tokio::test]
    async fn oversize_key_is_rejected() {
        let vault = vault("http://localhost:1");
        let key = "k".repeat(MAX_KEY_LENGTH + 1);
        let err = vault.create(&ExecContext::OutsideEngine, &key, "v", None).await.unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[tokio::test]
    async fn delete_returns_false_on_not_found() {
        let mut server = mockito::Server::new_async().await;
        let id = Uuid::nil();
        let mock = server
            .mock("DELETE", format!("/api/agent/secrets/{}", id).as_str())
            .with_status(404)
            .create_async()
            .await;

        let vault = vault(&server.url());
        let deleted = vault.delete(&ExecContext::OutsideEngine, id).await.unwrap();
        assert!(!deleted);
        mock.assert_async().await;
    }
}
