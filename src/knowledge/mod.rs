//! Knowledge Provider + Cache (§4.5): mapping from (tenant, agent, name) to
//! a content blob, backed by either HTTP or embedded assets, fronted by a
//! shared TTL cache.

pub mod local;
pub mod server;

use std::sync::Arc;

use async_trait::async_trait;

use crate::cache::Cache;
use crate::error::Result;
use crate::executor::{Context, Executor};
use crate::models::cache::CacheAspect;
use crate::models::ids::{AgentName, TenantId};
use crate::models::KnowledgeItem;

/// Capability set both the server and local providers implement — §9's
/// "Polymorphic knowledge provider. Use a single capability set {Get,
/// GetSystem, Update, Delete, List}."
#[async_trait]
pub trait KnowledgeProvider: Send + Sync {
    async fn get(
        &self,
        name: &str,
        agent: &AgentName,
        tenant: Option<&TenantId>,
        activation: Option<&str>,
    ) -> Result<Option<KnowledgeItem>>;

    async fn get_system(&self, name: &str, agent: &AgentName, activation: Option<&str>) -> Result<Option<KnowledgeItem>>;

    async fn update(
        &self,
        name: &str,
        content: &str,
        content_type: &str,
        agent: &AgentName,
        tenant: Option<&TenantId>,
        system_scoped: bool,
        activation: Option<&str>,
    ) -> Result<KnowledgeItem>;

    async fn delete(
        &self,
        name: &str,
        agent: &AgentName,
        tenant: Option<&TenantId>,
        activation: Option<&str>,
    ) -> Result<bool>;

    async fn list(&self, agent: &AgentName, tenant: Option<&TenantId>, activation: Option<&str>) -> Result<Vec<KnowledgeItem>>;
}

fn cache_key(agent: &AgentName, tenant: Option<&TenantId>, activation: Option<&str>, name: &str) -> String {
    format!(
        "{}:{}:{}:{}",
        tenant.map(|t| t.as_str()).unwrap_or("system"),
        agent.as_str(),
        activation.unwrap_or("default"),
        name
    )
}

/// Owned call parameters, cloned once per dispatch path (activity vs
/// direct) since each closure passed to `Executor::execute` is `FnOnce`.
struct GetArgs {
    name: String,
    agent: AgentName,
    tenant: Option<TenantId>,
    activation: Option<String>,
}

impl GetArgs {
    fn new(name: &str, agent: &AgentName, tenant: Option<&TenantId>, activation: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            agent: agent.clone(),
            tenant: tenant.cloned(),
            activation: activation.map(str::to_string),
        }
    }
}

/// Cache sits above the provider so both the server and local providers
/// share it (§9). Every read/write routes through the Context-Aware
/// Executor since it is I/O-bearing whenever the provider is the server
/// variant (and uniformly so for the local variant too, to keep one code
/// path).
pub struct KnowledgeClient {
    provider: Arc<dyn KnowledgeProvider>,
    cache: Arc<Cache<KnowledgeItem>>,
    executor: Executor,
}

impl KnowledgeClient {
    pub fn new(provider: Arc<dyn KnowledgeProvider>, cache: Arc<Cache<KnowledgeItem>>) -> Self {
        Self {
            provider,
            cache,
            executor: Executor::new(),
        }
    }

    pub async fn get(
        &self,
        context: &Context,
        name: &str,
        agent: &AgentName,
        tenant: Option<&TenantId>,
        activation: Option<&str>,
    ) -> Result<Option<KnowledgeItem>> {
        let key = cache_key(agent, tenant, activation, name);
        if let Some(cached) = self.cache.get(CacheAspect::Knowledge, &key) {
            return Ok(Some(cached));
        }

        let args = GetArgs::new(name, agent, tenant, activation);
        let provider_a = self.provider.clone();
        let provider_d = self.provider.clone();
        let args_a = args;
        let args_d = GetArgs {
            name: args_a.name.clone(),
            agent: args_a.agent.clone(),
            tenant: args_a.tenant.clone(),
            activation: args_a.activation.clone(),
        };

        let result = self
            .executor
            .execute(
                context,
                "knowledge.get",
                move || async move {
                    provider_a
                        .get(&args_a.name, &args_a.agent, args_a.tenant.as_ref(), args_a.activation.as_deref())
                        .await
                },
                move || async move {
                    provider_d
                        .get(&args_d.name, &args_d.agent, args_d.tenant.as_ref(), args_d.activation.as_deref())
                        .await
                },
            )
            .await?;

        if let Some(item) = &result {
            self.cache.put(CacheAspect::Knowledge, key, item.clone());
        }
        Ok(result)
    }

    pub async fn get_system(
        &self,
        context: &Context,
        name: &str,
        agent: &AgentName,
        activation: Option<&str>,
    ) -> Result<Option<KnowledgeItem>> {
        self.get(context, name, agent, None, activation).await
    }

    pub async fn update(
        &self,
        context: &Context,
        name: &str,
        content: &str,
        content_type: &str,
        agent: &AgentName,
        tenant: Option<&TenantId>,
        system_scoped: bool,
        activation: Option<&str>,
    ) -> Result<KnowledgeItem> {
        let key = cache_key(agent, tenant, activation, name);
        let name = name.to_string();
        let content = content.to_string();
        let content_type = content_type.to_string();
        let agent = agent.clone();
        let tenant = tenant.cloned();
        let activation = activation.map(str::to_string);

        let provider_a = self.provider.clone();
        let (name_a, content_a, type_a, agent_a, tenant_a, activation_a) =
            (name.clone(), content.clone(), content_type.clone(), agent.clone(), tenant.clone(), activation.clone());
        let provider_d = self.provider.clone();

        let item = self
            .executor
            .execute(
                context,
                "knowledge.update",
                move || async move {
                    provider_a
                        .update(&name_a, &content_a, &type_a, &agent_a, tenant_a.as_ref(), system_scoped, activation_a.as_deref())
                        .await
                },
                move || async move {
                    provider_d
                        .update(&name, &content, &content_type, &agent, tenant.as_ref(), system_scoped, activation.as_deref())
                        .await
                },
            )
            .await?;

        // Mutations must invalidate the corresponding key (§4.5).
        self.cache.invalidate(&key);
        Ok(item)
    }

    pub async fn delete(
        &self,
        context: &Context,
        name: &str,
        agent: &AgentName,
        tenant: Option<&TenantId>,
        activation: Option<&str>,
    ) -> Result<bool> {
        let key = cache_key(agent, tenant, activation, name);
        let args_a = GetArgs::new(name, agent, tenant, activation);
        let args_d = GetArgs {
            name: args_a.name.clone(),
            agent: args_a.agent.clone(),
            tenant: args_a.tenant.clone(),
            activation: args_a.activation.clone(),
        };
        let provider_a = self.provider.clone();
        let provider_d = self.provider.clone();

        let deleted = self
            .executor
            .execute(
                context,
                "knowledge.delete",
                move || async move {
                    provider_a
                        .delete(&args_a.name, &args_a.agent, args_a.tenant.as_ref(), args_a.activation.as_deref())
                        .await
                },
                move || async move {
                    provider_d
                        .delete(&args_d.name, &args_d.agent, args_d.tenant.as_ref(), args_d.activation.as_deref())
                        .await
                },
            )
            .await?;

        self.cache.invalidate(&key);
        Ok(deleted)
    }

    pub async fn list(
        &self,
        context: &Context,
        agent: &AgentName,
        tenant: Option<&TenantId>,
        activation: Option<&str>,
    ) -> Result<Vec<KnowledgeItem>> {
        let agent_a = agent.clone();
        let tenant_a = tenant.cloned();
        let activation_a = activation.map(str::to_string);
        let agent_d = agent_a.clone();
        let tenant_d = tenant_a.clone();
        let activation_d = activation_a.clone();
        let provider_a = self.provider.clone();
        let provider_d = self.provider.clone();

        self.executor
            .execute(
                context,
                "knowledge.list",
                move || async move { provider_a.list(&agent_a, tenant_a.as_ref(), activation_a.as_deref()).await },
                move || async move { provider_d.list(&agent_d, tenant_d.as_ref(), activation_d.as_deref()).await },
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use local::LocalKnowledgeProvider;

    fn client() -> KnowledgeClient {
        let provider = Arc::new(LocalKnowledgeProvider::new());
        let cache = Cache::new(CacheConfig::default());
        KnowledgeClient::new(provider, cache)
    }

    #[tokio::test]
    async fn update_then_get_round_trips() {
        let client = client();
        let agent = AgentName::new("Docs");
        let context = Context::OutsideEngine;

        client
            .update(&context, "readme", "hello world", "text/plain", &agent, None, true, None)
            .await
            .unwrap();

        let item = client.get(&context, "readme", &agent, None, None).await.unwrap().unwrap();
        assert_eq!(item.content, "hello world");
    }

    #[tokio::test]
    async fn second_get_is_served_from_cache() {
        let client = client();
        let agent = AgentName::new("Docs");
        let context = Context::OutsideEngine;

        client
            .update(&context, "readme", "v1", "text/plain", &agent, None, true, None)
            .await
            .unwrap();
        let first = client.get(&context, "readme", &agent, None, None).await.unwrap();
        let second = client.get(&context, "readme", &agent, None, None).await.unwrap();
        assert_eq!(first.unwrap().content, second.unwrap().content);
    }

    #[tokio::test]
    async fn delete_then_get_returns_none() {
        let client = client();
        let agent = AgentName::new("Docs");
        let context = Context::OutsideEngine;

        client
            .update(&context, "readme", "v1", "text/plain", &agent, None, true, None)
            .await
            .unwrap();
        client.delete(&context, "readme", &agent, None, None).await.unwrap();
        let item = client.get(&context, "readme", &agent, None, None).await.unwrap();
        assert!(item.is_none());
    }
}
