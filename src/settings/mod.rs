//! Settings & Identity (§4.2): flow-engine connection parameters fetched
//! once from the server and cached, plus credential-derived tenant/user
//! identity.

pub mod certificate;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cache::Cache;
use crate::config::SdkConfig;
use crate::error::{Error, Result};
use crate::models::cache::CacheAspect;
use crate::models::ids::{TenantId, UserId};
use crate::transport::Transport;

const SETTINGS_PATH: &str = "/api/agent/settings/flowserver";
const SETTINGS_CACHE_KEY: &str = "flowserver";

/// Flow-engine connection parameters as returned by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowServerSettings {
    pub flow_server_url: String,
    pub flow_server_namespace: String,
    #[serde(default)]
    pub flow_server_cert_base64: Option<String>,
    #[serde(default)]
    pub flow_server_key_base64: Option<String>,
}

impl FlowServerSettings {
    fn validate(self) -> Result<Self> {
        if self.flow_server_url.trim().is_empty() {
            return Err(Error::configuration("flowServerUrl must not be empty"));
        }
        if self.flow_server_namespace.trim().is_empty() {
            return Err(Error::configuration("flowServerNamespace must not be empty"));
        }
        Ok(self)
    }
}

/// Tenant/user identity resolved from the configured API credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub tenant_id: Option<TenantId>,
    pub user_id: Option<UserId>,
}

pub struct Settings {
    transport: Arc<Transport>,
    cache: Arc<Cache<FlowServerSettings>>,
    config: SdkConfig,
}

impl Settings {
    pub fn new(transport: Arc<Transport>, cache: Arc<Cache<FlowServerSettings>>, config: SdkConfig) -> Self {
        Self {
            transport,
            cache,
            config,
        }
    }

    /// On first call, GET the flow-engine connection parameters and cache
    /// them; an environment override of the flow-server URL, if present and
    /// valid, takes precedence over the server-reported value.
    pub async fn get_settings(&self) -> Result<FlowServerSettings> {
        if let Some(cached) = self.cache.get(CacheAspect::Settings, SETTINGS_CACHE_KEY) {
            return Ok(cached);
        }

        let fetched: FlowServerSettings = self
            .transport
            .get_with_retry(SETTINGS_PATH)
            .await?
            .ok_or_else(|| Error::configuration("server returned no flow-engine settings"))?;
        let mut settings = fetched.validate()?;

        if let Some(override_url) = &self.config.temporal_server_url {
            SdkConfig::validate_flow_server_url(override_url)?;
            settings.flow_server_url = override_url.clone();
        }
        if let Some(namespace) = &self.config.temporal_namespace {
            settings.flow_server_namespace = namespace.clone();
        }
        if let Some(cert) = &self.config.temporal_cert_base64 {
            settings.flow_server_cert_base64 = Some(cert.clone());
        }
        if let Some(key) = &self.config.temporal_key_base64 {
            settings.flow_server_key_base64 = Some(key.clone());
        }

        self.cache.put(CacheAspect::Settings, SETTINGS_CACHE_KEY, settings.clone());
        Ok(settings)
    }

    /// Parse the configured API credential for tenant/user identity. If it
    /// is a base64-encoded certificate, `O` -> tenantId, `OU` -> userId. If
    /// the credential is opaque (plain API key, not a certificate), both
    /// come back `None` and the caller must supply them via memo or
    /// environment.
    pub fn identity(&self) -> Result<Identity> {
        let credential = self
            .config
            .agent_certificate
            .as_deref()
            .or(self.config.api_key.as_deref())
            .ok_or_else(|| Error::configuration("no API credential configured"))?;

        if self.config.agent_certificate.is_some() {
            let fields = certificate::parse_credential(credential)?;
            Ok(Identity {
                tenant_id: fields.organization.map(TenantId::new),
                user_id: fields.organizational_unit.map(UserId::new),
            })
        } else {
            Ok(Identity {
                tenant_id: None,
                user_id: None,
            })
        }
    }

    /// `/api/agent/conversation/authorization/{token?}` (§4.13, §6):
    /// exchange an optional inbound token for the resolved authorization
    /// payload. Schema is server-defined and opaque to the SDK.
    pub async fn exchange_authorization(&self, token: Option<&str>) -> Result<Value> {
        let path = match token {
            Some(token) => format!("/api/agent/conversation/authorization/{}", token),
            None => "/api/agent/conversation/authorization".to_string(),
        };
        self.transport
            .get_with_retry(&path)
            .await?
            .ok_or_else(|| Error::configuration("authorization exchange returned no payload"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use url::Url;

    fn base_config(server_url: &str) -> SdkConfig {
        SdkConfig {
            server_url: server_url.to_string(),
            api_key: Some("test-key".to_string()),
            agent_certificate: None,
            temporal_server_url: None,
            temporal_namespace: None,
            temporal_cert_base64: None,
            temporal_key_base64: None,
            console_log_level: "info".to_string(),
            server_log_level: "info".to_string(),
            run_integration_tests: false,
            use_test_data: false,
        }
    }

    #[tokio::test]
    async fn fetches_and_caches_settings() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/agent/settings/flowserver")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"flowServerUrl":"grpc://flow.example.com:7233","flowServerNamespace":"default"}"#)
            .expect(1)
            .create_async()
            .await;

        let transport = Arc::new(crate::transport::Transport::new(
            crate::transport::TransportConfig::new(Url::parse(&server.url()).unwrap(), "k"),
        ));
        let cache = Cache::new(CacheConfig::default());
        let settings = Settings::new(transport, cache, base_config(&server.url()));

        let first = settings.get_settings().await.unwrap();
        let second = settings.get_settings().await.unwrap();
        assert_eq!(first.flow_server_namespace, "default");
        assert_eq!(second.flow_server_namespace, "default");
        mock.assert_async().await;
    }

    #[test]
    fn opaque_credential_resolves_to_no_identity() {
        let identity = Identity {
            tenant_id: None,
            user_id: None,
        };
        assert_eq!(identity.tenant_id, None);
        assert_eq!(identity.user_id, None);
    }
}
