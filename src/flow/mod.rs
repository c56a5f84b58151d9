//! Flow-Engine Client (§4.3): a thin adapter to the durable workflow engine.
//! The engine itself is explicitly out of scope (§1) — this module only
//! needs to expose the operations higher layers call and route every one of
//! them through JSON-over-HTTP against the flow server's resolved base URL,
//! the same REST-facade shape the teacher uses for its own server calls
//! rather than a bespoke binary protocol.
//!
//! Grounded on `other_examples`'s Temporal `WorkerClient` trait (thin,
//! narrow adapter surface: start/signal/query/terminate/schedule) for the
//! *shape* of this trait, and on the teacher's `TenantAwareAgentEngineFactory`
//! (`api/agents/tenant_isolation.rs`) for the per-(serverUrl, namespace)
//! singleton-with-creation-lock caching pattern.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::models::memo::Memo;
use crate::models::{WorkflowId, WorkflowStatus};
use crate::transport::{Transport, TransportConfig};

/// Policy applied when starting a workflow whose id is already in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdReusePolicy {
    AllowDuplicate,
    RejectDuplicate,
    TerminateIfRunning,
}

/// Policy applied to a child workflow when its parent closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParentClosePolicy {
    Abandon,
    Terminate,
}

/// Options for `start_or_get_workflow`.
#[derive(Debug, Clone)]
pub struct StartWorkflowOptions {
    pub workflow_type: String,
    pub workflow_id: WorkflowId,
    pub task_queue: String,
    pub memo: Memo,
    pub input: Value,
    pub id_reuse_policy: IdReusePolicy,
    pub parent_close_policy: ParentClosePolicy,
    pub execution_timeout: Option<Duration>,
}

/// A handle to a started (or already-running) workflow instance.
#[derive(Debug, Clone)]
pub struct WorkflowHandle {
    pub id: WorkflowId,
}

/// Result of `describe`.
#[derive(Debug, Clone)]
pub struct DescribeResult {
    pub status: WorkflowStatus,
    pub memo: Memo,
}

/// An interval-based schedule, as returned by `list_schedules`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleInfo {
    pub schedule_id: String,
    pub interval_seconds: u64,
}

/// Thin adapter surface to the durable workflow engine. All methods are
/// safe to call concurrently (§4.3) — implementations own their own
/// connection management and health checking.
#[async_trait]
pub trait FlowEngineClient: Send + Sync {
    async fn start_or_get_workflow(&self, options: StartWorkflowOptions) -> Result<WorkflowHandle>;
    async fn signal_workflow(&self, id: &WorkflowId, signal_name: &str, payload: Value) -> Result<()>;
    async fn query_workflow(&self, id: &WorkflowId, query_name: &str, args: Value) -> Result<Value>;
    async fn get_handle(&self, id: &WorkflowId) -> Result<WorkflowHandle>;
    async fn terminate(&self, id: &WorkflowId, reason: &str) -> Result<()>;
    async fn list_schedules(&self) -> Result<Vec<ScheduleInfo>>;
    async fn create_schedule_if_not_exists(&self, id: &str, interval: Duration, input: Value) -> Result<()>;
    async fn describe(&self, id: &WorkflowId) -> Result<DescribeResult>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StartWorkflowPayload<'a> {
    workflow_type: &'a str,
    workflow_id: &'a str,
    task_queue: &'a str,
    memo: &'a HashMap<String, String>,
    input: &'a Value,
    id_reuse_policy: IdReusePolicy,
    parent_close_policy: ParentClosePolicy,
    #[serde(skip_serializing_if = "Option::is_none")]
    execution_timeout_seconds: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescribeResponse {
    status: WorkflowStatus,
    memo: HashMap<String, String>,
}

/// HTTP-over-JSON implementation: REST facade over the engine's start /
/// signal / query / terminate / schedule surface, reached at the flow
/// server's resolved base URL.
pub struct HttpFlowEngineClient {
    transport: Arc<Transport>,
}

impl HttpFlowEngineClient {
    pub fn new(transport: Arc<Transport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl FlowEngineClient for HttpFlowEngineClient {
    async fn start_or_get_workflow(&self, options: StartWorkflowOptions) -> Result<WorkflowHandle> {
        let payload = StartWorkflowPayload {
            workflow_type: &options.workflow_type,
            workflow_id: options.workflow_id.as_str(),
            task_queue: &options.task_queue,
            memo: options.memo.as_map(),
            input: &options.input,
            id_reuse_policy: options.id_reuse_policy,
            parent_close_policy: options.parent_close_policy,
            execution_timeout_seconds: options.execution_timeout.map(|d| d.as_secs()),
        };

        let _: Value = self.transport.post_with_retry("/workflows/start", &payload).await?;
        Ok(WorkflowHandle {
            id: options.workflow_id,
        })
    }

    async fn signal_workflow(&self, id: &WorkflowId, signal_name: &str, payload: Value) -> Result<()> {
        let path = format!("/workflows/{}/signal/{}", id.as_str(), signal_name);
        let _: Value = self.transport.post_with_retry(&path, &payload).await?;
        Ok(())
    }

    async fn query_workflow(&self, id: &WorkflowId, query_name: &str, args: Value) -> Result<Value> {
        let path = format!("/workflows/{}/query/{}", id.as_str(), query_name);
        self.transport.post_with_retry(&path, &args).await
    }

    async fn get_handle(&self, id: &WorkflowId) -> Result<WorkflowHandle> {
        Ok(WorkflowHandle { id: id.clone() })
    }

    async fn terminate(&self, id: &WorkflowId, reason: &str) -> Result<()> {
        let path = format!("/workflows/{}/terminate", id.as_str());
        let body = serde_json::json!({ "reason": reason });
        let _: Value = self.transport.post_with_retry(&path, &body).await?;
        Ok(())
    }

    async fn list_schedules(&self) -> Result<Vec<ScheduleInfo>> {
        Ok(self
            .transport
            .get_with_retry("/schedules")
            .await?
            .unwrap_or_default())
    }

    async fn create_schedule_if_not_exists(&self, id: &str, interval: Duration, input: Value) -> Result<()> {
        let existing: Option<ScheduleInfo> = self
            .transport
            .get_with_retry(&format!("/schedules/{}", id))
            .await?;
        if existing.is_some() {
            return Ok(());
        }

        let body = serde_json::json!({
            "scheduleId": id,
            "intervalSeconds": interval.as_secs(),
            "input": input,
        });
        let _: Value = self.transport.post_with_retry("/schedules", &body).await?;
        Ok(())
    }

    async fn describe(&self, id: &WorkflowId) -> Result<DescribeResult> {
        let response: DescribeResponse = self
            .transport
            .get_with_retry(&format!("/workflows/{}", id.as_str()))
            .await?
            .ok_or_else(|| Error::configuration(format!("workflow '{}' not found", id.as_str())))?;

        let mut memo = Memo::default();
        for (key, value) in response.memo {
            memo.insert(key, value);
        }
        Ok(DescribeResult {
            status: response.status,
            memo,
        })
    }
}

/// Caches one `FlowEngineClient` per (server URL, namespace) pairing,
/// created under a lock so concurrent first-callers don't race to build
/// duplicate clients — generalized from the teacher's
/// `TenantAwareAgentEngineFactory` (one engine per tenant, built once,
/// reused thereafter).
pub struct FlowEngineClientFactory {
    clients: Mutex<HashMap<(String, String), Arc<dyn FlowEngineClient>>>,
}

impl Default for FlowEngineClientFactory {
    fn default() -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
        }
    }
}

impl FlowEngineClientFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_create(
        &self,
        server_url: &str,
        namespace: &str,
        credential: &str,
    ) -> Result<Arc<dyn FlowEngineClient>> {
        let key = (server_url.to_string(), namespace.to_string());
        let mut clients = self.clients.lock().await;
        if let Some(existing) = clients.get(&key) {
            return Ok(existing.clone());
        }

        let base_url = if server_url.contains("://") {
            server_url.to_string()
        } else {
            format!("https://{}", server_url)
        };
        let transport = Arc::new(Transport::new(TransportConfig::new(
            url::Url::parse(&base_url)?,
            credential,
        )));
        let client: Arc<dyn FlowEngineClient> = Arc::new(HttpFlowEngineClient::new(transport));
        clients.insert(key, client.clone());
        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ids::{AgentName, TenantId, UserId};

    #[tokio::test]
    async fn start_or_get_workflow_returns_a_handle() {
        let mut server = mockito::Server::new_async().await;
        let _start = server
            .mock("POST", "/workflows/start")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok":true}"#)
            .create_async()
            .await;
        let transport = Arc::new(Transport::new(TransportConfig::new(
            url::Url::parse(&server.url()).unwrap(),
            "cred",
        )));
        let client = HttpFlowEngineClient::new(transport);

        let tenant = TenantId::new("acme");
        let memo = Memo::new(&tenant, &UserId::new("u1"), &AgentName::new("Supervisor"), false);
        let workflow_id = WorkflowId::build(&tenant, "Supervisor:Default", None);

        let handle = client
            .start_or_get_workflow(StartWorkflowOptions {
                workflow_type: "Supervisor:Default".to_string(),
                workflow_id: workflow_id.clone(),
                task_queue: "acme:Supervisor:Default".to_string(),
                memo,
                input: serde_json::json!({}),
                id_reuse_policy: IdReusePolicy::TerminateIfRunning,
                parent_close_policy: ParentClosePolicy::Abandon,
                execution_timeout: None,
            })
            .await
            .unwrap();
        assert_eq!(handle.id, workflow_id);
    }

    #[tokio::test]
    async fn factory_reuses_client_for_same_key() {
        let factory = FlowEngineClientFactory::new();
        let a = factory
            .get_or_create("flow.example.com:7233", "default", "cred")
            .await
            .unwrap();
        let b = factory
            .get_or_create("flow.example.com:7233", "default", "cred")
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
