//! A supervisor agent that routes inbound chat, delegates document
//! questions to a `Docs` agent over A2A, and reports usage for every turn.
//!
//! Run with `XIANS_SERVER_URL`/`XIANS_API_KEY` set: `cargo run --example
//! supervisor_agent`.

use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use xians_agent_sdk::models::ids::{AgentName, TenantId};
use xians_agent_sdk::{
    A2ADispatcher, Agent, Context, FlowEngineClientFactory, MessageHandler, MessageRouter, Metrics, Platform, Result, SdkConfig, Settings,
    Transport, TransportConfig, UserMessageContext,
};

struct SupervisorHandler {
    a2a: Arc<A2ADispatcher>,
    metrics: Arc<Metrics>,
}

#[async_trait]
impl MessageHandler for SupervisorHandler {
    async fn handle(&self, context: UserMessageContext) -> Result<()> {
        let text = context.message().payload.text.clone().unwrap_or_default();

        if text.to_lowercase().contains("document") {
            let docs_agent = AgentName::new("Docs");
            self.a2a
                .send_chat_to_built_in(&Context::OutsideEngine, &docs_agent, "Default Workflow", &context.message().payload)
                .await?;
            context.set_skip_response(true);
        } else {
            context.reply_async(&format!("Supervisor heard: {}", text), None, None, None).await?;
        }

        self.metrics
            .report()
            .from_message_context(&context)
            .metric("turn", "count", 1.0, "count")
            .report_async()
            .await;

        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = SdkConfig::from_env()?;
    xians_agent_sdk::logging::init_tracing(&config);

    let transport = Arc::new(Transport::new(TransportConfig::new(
        Url::parse(&config.server_url)?,
        config.api_key.clone().unwrap_or_default(),
    )));

    let settings_cache = xians_agent_sdk::Cache::new(xians_agent_sdk::CacheConfig::default());
    let settings = Arc::new(Settings::new(transport.clone(), settings_cache, config.clone()));
    let flow_settings = settings.get_settings().await?;

    let flow_factory = FlowEngineClientFactory::new();
    let flow_client = flow_factory
        .get_or_create(&flow_settings.flow_server_url, &flow_settings.flow_server_namespace, "cred")
        .await?;

    let identity = settings.identity()?;
    let tenant = identity.tenant_id.unwrap_or_else(|| TenantId::new("acme"));

    let platform = Platform::new();
    let handle = platform.register(Agent::new("Supervisor", "Routes inbound chat and delegates to specialists"))?;
    handle.workflows.define_builtin(&AgentName::new("Supervisor"), "Default Workflow", 4);

    let history = Arc::new(xians_agent_sdk::messaging::history::HistoryClient::new(transport.clone()));
    let reply_sink = Arc::new(xians_agent_sdk::messaging::HttpReplySink::new(transport.clone()));
    let a2a = Arc::new(A2ADispatcher::new(flow_client, tenant));
    let metrics = Arc::new(Metrics::new(transport.clone()).with_settings(settings.clone()));

    let _router = MessageRouter::new(history, reply_sink).on_chat(Arc::new(SupervisorHandler { a2a, metrics }));

    // Wiring the router into the flow engine's actual activity dispatch is
    // the out-of-scope engine's concern; this demo only shows how an agent
    // author assembles the pieces this crate provides.
    tracing::info!("Supervisor agent assembled, ready to be wired into a worker");
    Ok(())
}
