//! In-process knowledge provider: embedded assets named
//! `"{AgentName}.Knowledge.{KnowledgeName}.{ext}"` (ext one of md/txt/json/
//! yaml/yml), with an in-memory store backing writes so `update`/`delete`
//! work the same way the server-backed provider's semantics do for a local
//! dev loop.
//!
//! Grounded on the teacher's `engine/nats_storage.rs` in-memory fallback
//! store (a `Mutex<HashMap<...>>` guarding a map keyed by a composite scope
//! string) — the same shape generalized to the knowledge scope tuple.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::KnowledgeProvider;
use crate::error::Result;
use crate::models::ids::{AgentName, TenantId};
use crate::models::KnowledgeItem;

const EMBEDDED_EXTENSIONS: &[&str] = &["md", "txt", "json", "yaml", "yml"];

fn scope_key(agent: &AgentName, tenant: Option<&TenantId>, activation: Option<&str>, name: &str) -> String {
    format!(
        "{}:{}:{}:{}",
        tenant.map(|t| t.as_str()).unwrap_or("system"),
        agent.as_str(),
        activation.unwrap_or("default"),
        name
    )
}

fn embedded_asset_name(agent: &AgentName, name: &str, ext: &str) -> String {
    format!("{}.Knowledge.{}.{}", agent.as_str(), name, ext)
}

/// Local/embedded provider. Looks up a fixed set of compiled-in assets by
/// naming convention first; falls back to an in-memory store so writes made
/// through `update` are visible to later `get`/`list` calls within the same
/// process.
pub struct LocalKnowledgeProvider {
    embedded: HashMap<String, (String, String)>,
    store: Mutex<HashMap<String, KnowledgeItem>>,
}

impl LocalKnowledgeProvider {
    pub fn new() -> Self {
        Self {
            embedded: HashMap::new(),
            store: Mutex::new(HashMap::new()),
        }
    }

    /// Register an embedded asset's raw content ahead of time, keyed by the
    /// `"{AgentName}.Knowledge.{KnowledgeName}.{ext}"` convention.
    pub fn with_embedded(mut self, agent: &AgentName, name: &str, ext: &str, content: impl Into<String>) -> Self {
        let asset_name = embedded_asset_name(agent, name, ext);
        self.embedded.insert(asset_name, (ext.to_string(), content.into()));
        self
    }

    fn lookup_embedded(&self, agent: &AgentName, name: &str) -> Option<KnowledgeItem> {
        for ext in EMBEDDED_EXTENSIONS {
            let asset_name = embedded_asset_name(agent, name, ext);
            if let Some((ext, content)) = self.embedded.get(&asset_name) {
                return Some(KnowledgeItem {
                    name: name.to_string(),
                    content: content.clone(),
                    content_type: content_type_for_ext(ext),
                    agent: agent.clone(),
                    system_scoped: true,
                    tenant_id: None,
                });
            }
        }
        None
    }
}

impl Default for LocalKnowledgeProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn content_type_for_ext(ext: &str) -> String {
    match ext {
        "json" => "application/json",
        "yaml" | "yml" => "application/yaml",
        "md" => "text/markdown",
        _ => "text/plain",
    }
    .to_string()
}

#[async_trait]
impl KnowledgeProvider for LocalKnowledgeProvider {
    async fn get(
        &self,
        name: &str,
        agent: &AgentName,
        tenant: Option<&TenantId>,
        activation: Option<&str>,
    ) -> Result<Option<KnowledgeItem>> {
        let key = scope_key(agent, tenant, activation, name);
        if let Some(item) = self.store.lock().unwrap().get(&key) {
            return Ok(Some(item.clone()));
        }
        Ok(self.lookup_embedded(agent, name))
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
        let key = scope_key(agent, tenant, activation, name);
        let item = KnowledgeItem {
            name: name.to_string(),
            content: content.to_string(),
            content_type: content_type.to_string(),
            agent: agent.clone(),
            system_scoped,
            tenant_id: tenant.map(|t| t.as_str().to_string()),
        };
        self.store.lock().unwrap().insert(key, item.clone());
        Ok(item)
    }

    async fn delete(
        &self,
        name: &str,
        agent: &AgentName,
        tenant: Option<&TenantId>,
        activation: Option<&str>,
    ) -> Result<bool> {
        let key = scope_key(agent, tenant, activation, name);
        Ok(self.store.lock().unwrap().remove(&key).is_some())
    }

    async fn list(&self, agent: &AgentName, tenant: Option<&TenantId>, activation: Option<&str>) -> Result<Vec<KnowledgeItem>> {
        let prefix = format!(
            "{}:{}:{}:",
            tenant.map(|t| t.as_str()).unwrap_or("system"),
            agent.as_str(),
            activation.unwrap_or("default")
        );
        Ok(self
            .store
            .lock()
            .unwrap()
            .iter()
            .filter(|(key, _)| key.starts_with(&prefix))
            .map(|(_, item)| item.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn embedded_asset_is_found_by_naming_convention() {
        let agent = AgentName::new("Supervisor");
        let provider = LocalKnowledgeProvider::new().with_embedded(&agent, "SystemPrompt", "md", "You are helpful.");

        let item = provider.get_system("SystemPrompt", &agent, None).await.unwrap().unwrap();
        assert_eq!(item.content, "You are helpful.");
        assert_eq!(item.content_type, "text/markdown");
    }

    #[tokio::test]
    async fn list_only_returns_entries_for_the_requested_scope() {
        let agent = AgentName::new("Supervisor");
        let other_agent = AgentName::new("Other");
        let provider = LocalKnowledgeProvider::new();

        provider
            .update("a", "content-a", "text/plain", &agent, None, true, None)
            .await
            .unwrap();
        provider
            .update("b", "content-b", "text/plain", &other_agent, None, true, None)
            .await
            .unwrap();

        let items = provider.list(&agent, None, None).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "a");
    }
}
