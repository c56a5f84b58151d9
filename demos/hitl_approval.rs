//! Starting a human-in-the-loop approval task from a workflow and reacting
//! once a human has acted on it.
//!
//! Run with `XIANS_SERVER_URL`/`XIANS_API_KEY` set: `cargo run --example
//! hitl_approval`.

use std::sync::Arc;
use std::time::Duration;

use url::Url;

use xians_agent_sdk::models::ids::{AgentName, TenantId, UserId};
use xians_agent_sdk::{Context, Memo, Result, SdkConfig, TaskWorkflowRequest, Transport, TransportConfig, WorkflowExecutionContext, WorkflowId};

#[tokio::main]
async fn main() -> Result<()> {
    let config = SdkConfig::from_env()?;
    xians_agent_sdk::logging::init_tracing(&config);

    let transport = Arc::new(Transport::new(TransportConfig::new(
        Url::parse(&config.server_url)?,
        config.api_key.clone().unwrap_or_default(),
    )));

    let flow_factory = xians_agent_sdk::FlowEngineClientFactory::new();
    let flow_client = flow_factory.get_or_create(&config.server_url, "default", "cred").await?;

    let tenant = TenantId::new("acme");
    let agent = AgentName::new("Orders");
    let tasks = xians_agent_sdk::Tasks::new(flow_client);

    let exec_context = Context::InActivity(WorkflowExecutionContext {
        workflow_id: WorkflowId::build(&tenant, "Orders:Default Workflow", None),
        tenant_id: tenant.clone(),
        agent_name: agent.clone(),
    });

    let parent_memo = Memo::new(&tenant, &UserId::new("user-42"), &agent, false);

    let mut request = TaskWorkflowRequest::new("Approve refund", "Refund of $120 for order #9821 needs manager approval");
    request.actions = vec!["approve".to_string(), "reject".to_string()];
    request.timeout = Some(Duration::from_secs(60 * 60 * 24));

    let task = tasks
        .start(&exec_context, &tenant, &agent, false, &parent_memo, request)
        .await?;

    tracing::info!(workflow_id = %task.workflow_id(), "approval task started");

    // In a real workflow this would be a durable signal wait, not a poll
    // loop; here we just demonstrate the query/signal surface directly.
    let info = task.get_info(&exec_context).await?;
    if !info.is_completed {
        tracing::info!(title = %info.title, actions = ?info.available_actions, "waiting on a human decision");
    }

    task.approve_task(&exec_context, Some("looks correct, approved")).await?;

    let summary = task.get_task_info(&exec_context).await?;
    tracing::info!(%summary, "task resolved");

    Ok(())
}
