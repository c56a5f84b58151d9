//! Task (HITL) Subsystem (§4.7): starts a task as a child workflow, and
//! exposes its query/signal surface plus agent-author convenience sugar.
//!
//! The state machine itself (`TaskRecord`/`TaskState`) lives in
//! `models::task`; this module is the client-side half — building the
//! `StartWorkflowOptions` for a task child workflow and wrapping its
//! query/signal names behind a typed `TaskHandle`.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::executor::{Context as ExecContext, Executor};
use crate::flow::{FlowEngineClient, IdReusePolicy, ParentClosePolicy, StartWorkflowOptions};
use crate::models::ids::{AgentName, TaskName, TenantId};
use crate::models::memo::{self, Memo};
use crate::models::task::{RetryPolicy, TaskWorkflowRequest};
use crate::models::workflow::TaskQueueName;
use crate::models::WorkflowId;

const QUERY_GET_INFO: &str = "getTaskInfo";
const QUERY_GET_DRAFT: &str = "getCurrentDraft";
const QUERY_GET_INITIAL_WORK: &str = "getInitialWork";
const SIGNAL_UPDATE_DRAFT: &str = "updateDraft";
const SIGNAL_PERFORM_ACTION: &str = "performAction";

/// Extra execution timeout headroom added on top of the caller's requested
/// task timeout, per §4.7: "Execution timeout = (request.timeout or 0) + 1 day."
const EXECUTION_TIMEOUT_PADDING: Duration = Duration::from_secs(24 * 60 * 60);

/// The `getInfo()` query response shape (§4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInfo {
    pub task_id: String,
    pub title: String,
    pub description: String,
    pub initial_work: Option<String>,
    pub final_work: Option<String>,
    pub available_actions: Vec<String>,
    pub is_completed: bool,
    #[serde(default)]
    pub performed_action: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    pub participant_id: String,
    #[serde(default)]
    pub metadata: Option<Value>,
}

/// Starts HITL tasks as child workflows of the calling workflow's agent.
pub struct Tasks {
    flow_client: Arc<dyn FlowEngineClient>,
    executor: Executor,
}

impl Tasks {
    pub fn new(flow_client: Arc<dyn FlowEngineClient>) -> Self {
        Self {
            flow_client,
            executor: Executor::new(),
        }
    }

    /// Start a task child workflow. `parent_memo` supplies the inherited
    /// memo and, when `request.participant_id` is absent, the participant
    /// id (failing fast — §4.7/§9 — if neither is present).
    pub async fn start(
        &self,
        context: &ExecContext,
        tenant: &TenantId,
        agent: &AgentName,
        system_scoped: bool,
        parent_memo: &Memo,
        request: TaskWorkflowRequest,
    ) -> Result<TaskHandle> {
        let request = request.validate_and_normalize()?;

        let participant_id = match &request.participant_id {
            Some(id) => id.clone(),
            None => parent_memo
                .user_id()
                .map(|id| id.into_inner())
                .ok_or_else(|| Error::validation("task has no participantId and parent memo has no userId to inherit"))?,
        };

        let task_name = request.task_name.clone().unwrap_or_else(|| TaskName::new(Uuid::new_v4().to_string()));
        let workflow_type = format!("{}:Task Workflow", agent.as_str());
        let base_id = WorkflowId::build(tenant, &workflow_type, None);
        let workflow_id = WorkflowId::from(format!("{}--{}", base_id.as_str(), task_name.as_str()));
        let task_queue = TaskQueueName::derive(&workflow_type, system_scoped, tenant.as_str());

        let child_memo = memo::inherit(
            parent_memo,
            &[
                (memo::KEY_USER_ID, participant_id.clone()),
                (memo::KEY_TASK_TITLE, request.title.clone()),
                (memo::KEY_TASK_DESCRIPTION, request.description.clone()),
                (memo::KEY_TASK_ACTIONS, request.actions.join(",")),
            ],
        );

        let parent_close_policy = if request.survive_parent_close {
            ParentClosePolicy::Abandon
        } else {
            ParentClosePolicy::Terminate
        };
        let execution_timeout = request.timeout.unwrap_or_default() + EXECUTION_TIMEOUT_PADDING;

        let input = serde_json::json!({
            "taskName": task_name.as_str(),
            "title": request.title,
            "description": request.description,
            "draftWork": request.draft_work,
            "participantId": participant_id,
            "metadata": request.metadata,
            "availableActions": request.actions,
            "retryPolicy": RetryPolicySummary::from(&request.retry_policy),
        });

        let options = StartWorkflowOptions {
            workflow_type,
            workflow_id: workflow_id.clone(),
            task_queue: task_queue.as_str().to_string(),
            memo: child_memo,
            input,
            id_reuse_policy: IdReusePolicy::TerminateIfRunning,
            parent_close_policy,
            execution_timeout: Some(execution_timeout),
        };

        let flow_client = self.flow_client.clone();
        let flow_client_b = self.flow_client.clone();
        let options_b = options.clone_for_retry();

        self.executor
            .execute(
                context,
                "tasks.start",
                move || async move { flow_client.start_or_get_workflow(options).await },
                move || async move { flow_client_b.start_or_get_workflow(options_b).await },
            )
            .await?;

        Ok(TaskHandle {
            workflow_id,
            flow_client: self.flow_client.clone(),
            executor: Executor::new(),
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RetryPolicySummary {
    max_attempts: u32,
    backoff_coefficient: f64,
}

impl From<&RetryPolicy> for RetryPolicySummary {
    fn from(policy: &RetryPolicy) -> Self {
        Self {
            max_attempts: policy.max_attempts,
            backoff_coefficient: policy.backoff_coefficient,
        }
    }
}

/// `StartWorkflowOptions` doesn't derive `Clone` end-to-end cheaply (its
/// `input: Value` can be large); `tasks::start` needs the same options on
/// both executor dispatch paths, so this builds a shallow copy explicitly
/// rather than deriving `Clone` on a type whose `Value` payload callers
/// elsewhere construct fresh per call.
impl StartWorkflowOptions {
    fn clone_for_retry(&self) -> Self {
        Self {
            workflow_type: self.workflow_type.clone(),
            workflow_id: self.workflow_id.clone(),
            task_queue: self.task_queue.clone(),
            memo: self.memo.clone(),
            input: self.input.clone(),
            id_reuse_policy: self.id_reuse_policy,
            parent_close_policy: self.parent_close_policy,
            execution_timeout: self.execution_timeout,
        }
    }
}

/// A handle to a started task child workflow, exposing its query/signal
/// surface (§4.7).
pub struct TaskHandle {
    workflow_id: WorkflowId,
    flow_client: Arc<dyn FlowEngineClient>,
    executor: Executor,
}

impl TaskHandle {
    pub fn workflow_id(&self) -> &WorkflowId {
        &self.workflow_id
    }

    pub async fn get_info(&self, context: &ExecContext) -> Result<TaskInfo> {
        let value = self.query(context, QUERY_GET_INFO).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn get_initial_work(&self, context: &ExecContext) -> Result<Option<String>> {
        let value = self.query(context, QUERY_GET_INITIAL_WORK).await?;
        Ok(value.as_str().map(str::to_string))
    }

    pub async fn get_current_draft(&self, context: &ExecContext) -> Result<Option<String>> {
        let value = self.query(context, QUERY_GET_DRAFT).await?;
        Ok(value.as_str().map(str::to_string))
    }

    pub async fn update_draft(&self, context: &ExecContext, text: &str) -> Result<()> {
        self.signal(context, SIGNAL_UPDATE_DRAFT, serde_json::json!({ "text": text })).await
    }

    pub async fn perform_action(&self, context: &ExecContext, action: &str, comment: Option<&str>) -> Result<()> {
        self.signal(
            context,
            SIGNAL_PERFORM_ACTION,
            serde_json::json!({ "action": action, "comment": comment }),
        )
        .await
    }

    /// Sugar over `performAction("approve", comment)` (§4.7).
    pub async fn approve_task(&self, context: &ExecContext, comment: Option<&str>) -> Result<()> {
        self.perform_action(context, "approve", comment).await
    }

    /// Sugar over `performAction("reject", reason)` (§4.7).
    pub async fn reject_task(&self, context: &ExecContext, reason: Option<&str>) -> Result<()> {
        self.perform_action(context, "reject", reason).await
    }

    /// A human-formatted one-line summary, convenience for agent authors
    /// who just want something to log or relay in a reply.
    pub async fn get_task_info(&self, context: &ExecContext) -> Result<String> {
        let info = self.get_info(context).await?;
        if info.is_completed {
            Ok(format!(
                "Task '{}' completed: {} ({})",
                info.title,
                info.performed_action.unwrap_or_default(),
                info.comment.unwrap_or_default()
            ))
        } else {
            Ok(format!("Task '{}' pending, available actions: {}", info.title, info.available_actions.join(", ")))
        }
    }

    async fn query(&self, context: &ExecContext, query_name: &str) -> Result<Value> {
        let flow_client = self.flow_client.clone();
        let flow_client_b = self.flow_client.clone();
        let id_a = self.workflow_id.clone();
        let id_b = self.workflow_id.clone();
        let name_a = query_name.to_string();
        let name_b = query_name.to_string();

        self.executor
            .execute(
                context,
                "tasks.query",
                move || async move { flow_client.query_workflow(&id_a, &name_a, Value::Null).await },
                move || async move { flow_client_b.query_workflow(&id_b, &name_b, Value::Null).await },
            )
            .await
    }

    async fn signal(&self, context: &ExecContext, signal_name: &str, payload: Value) -> Result<()> {
        let flow_client = self.flow_client.clone();
        let flow_client_b = self.flow_client.clone();
        let id_a = self.workflow_id.clone();
        let id_b = self.workflow_id.clone();
        let name_a = signal_name.to_string();
        let name_b = signal_name.to_string();
        let payload_a = payload.clone();
        let payload_b = payload;

        self.executor
            .execute(
                context,
                "tasks.signal",
                move || async move { flow_client.signal_workflow(&id_a, &name_a, payload_a).await },
                move || async move { flow_client_b.signal_workflow(&id_b, &name_b, payload_b).await },
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ids::UserId;

    fn parent_memo() -> Memo {
        Memo::new(&TenantId::new("acme"), &UserId::new("manager-1"), &AgentName::new("Orders"), false)
    }

    #[tokio::test]
    async fn start_fails_fast_without_participant_or_parent_user() {
        let mut server = mockito::Server::new_async().await;
        let transport = Arc::new(crate::transport::Transport::new(crate::transport::TransportConfig::new(
            url::Url::parse(&server.url()).unwrap(),
            "cred",
        )));
        let flow_client: Arc<dyn FlowEngineClient> = Arc::new(crate::flow::HttpFlowEngineClient::new(transport));
        let tasks = Tasks::new(flow_client);

        let empty_memo = Memo::default();
        let request = TaskWorkflowRequest::new("Approve Order", "Approve the pending order");

        let err = tasks
            .start(&ExecContext::OutsideEngine, &TenantId::new("acme"), &AgentName::new("Orders"), false, &empty_memo, request)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
        let _ = server.url();
    }

    #[tokio::test]
    async fn start_builds_a_double_dash_suffixed_workflow_id() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/workflows/start")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok":true}"#)
            .create_async()
            .await;
        let transport = Arc::new(crate::transport::Transport::new(crate::transport::TransportConfig::new(
            url::Url::parse(&server.url()).unwrap(),
            "cred",
        )));
        let flow_client: Arc<dyn FlowEngineClient> = Arc::new(crate::flow::HttpFlowEngineClient::new(transport));
        let tasks = Tasks::new(flow_client);

        let request = TaskWorkflowRequest::new("Approve Order", "Approve the pending order").validate_and_normalize().unwrap();
        let handle = tasks
            .start(&ExecContext::OutsideEngine, &TenantId::new("acme"), &AgentName::new("Orders"), false, &parent_memo(), request)
            .await
            .unwrap();

        assert!(handle.workflow_id().as_str().contains("--"));
        assert!(handle.workflow_id().as_str().starts_with("acme:Orders:Task Workflow"));
    }
}
