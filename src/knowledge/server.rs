//! HTTP-backed knowledge provider, reaching `/api/agent/knowledge/*` on the
//! configured server (§4.5).

use async_trait::async_trait;

use super::KnowledgeProvider;
use crate::error::Result;
use crate::models::ids::{AgentName, TenantId};
use crate::models::KnowledgeItem;
use crate::transport::Transport;
use std::sync::Arc;

fn knowledge_path(agent: &AgentName, name: &str) -> String {
    format!("/api/agent/knowledge/{}/{}", agent.as_str(), name)
}

fn list_path(agent: &AgentName) -> String {
    format!("/api/agent/knowledge/{}", agent.as_str())
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateRequest<'a> {
    content: &'a str,
    #[serde(rename = "type")]
    content_type: &'a str,
    system_scoped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tenant_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    activation: Option<&'a str>,
}

pub struct ServerKnowledgeProvider {
    transport: Arc<Transport>,
}

impl ServerKnowledgeProvider {
    pub fn new(transport: Arc<Transport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl KnowledgeProvider for ServerKnowledgeProvider {
    async fn get(
        &self,
        name: &str,
        agent: &AgentName,
        tenant: Option<&TenantId>,
        activation: Option<&str>,
    ) -> Result<Option<KnowledgeItem>> {
        let mut query = Vec::new();
        if let Some(tenant) = tenant {
            query.push(("tenantId", tenant.as_str()));
        }
        if let Some(activation) = activation {
            query.push(("activation", activation));
        }
        self.transport.get_query_with_retry(&knowledge_path(agent, name), &query).await
    }

    async fn get_system(&self, name: &str, agent: &AgentName, activation: Option<&str>) -> Result<Option<KnowledgeItem>> {
        self.get(name, agent, None, activation).await
    }

    async fn update(
        &self,
        name: &str,
        content: &str,
        content_type: &str,
        agent: &AgentName,
        tenant: Option<&TenantId>,
        system_scoped: bool,
        activation: Option<&str>,
    ) -> Result<KnowledgeItem> {
        let body = UpdateRequest {
            content,
            content_type,
            system_scoped,
            tenant_id: tenant.map(|t| t.as_str()),
            activation,
        };
        self.transport.put_with_retry(&knowledge_path(agent, name), &body).await
    }

    async fn delete(
        &self,
        name: &str,
        agent: &AgentName,
        _tenant: Option<&TenantId>,
        _activation: Option<&str>,
    ) -> Result<bool> {
        self.transport.delete_with_retry(&knowledge_path(agent, name)).await
    }

    async fn list(&self, agent: &AgentName, tenant: Option<&TenantId>, activation: Option<&str>) -> Result<Vec<KnowledgeItem>> {
        let mut query = Vec::new();
        if let Some(tenant) = tenant {
            query.push(("tenantId", tenant.as_str()));
        }
        if let Some(activation) = activation {
            query.push(("activation", activation));
        }
        Ok(self
            .transport
            .get_query_with_retry(&list_path(agent), &query)
            .await?
            .unwrap_or_default())
    }
}
