//! Workflow Lifecycle & Registry (§4.8): agent registration, workflow
//! definitions, upload idempotence, worker pool startup, schedule creation.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::executor::{Context as ExecContext, Executor};
use crate::flow::FlowEngineClient;
use crate::models::ids::{AgentName, TenantId};
use crate::models::workflow::TaskQueueName;
use crate::models::{Agent, WorkflowDefinition, WorkflowKind};
use crate::transport::Transport;

const DEFINITIONS_CHECK_PATH: &str = "/api/agent/definitions/check";
const DEFINITIONS_PATH: &str = "/api/agent/definitions";

/// Per-agent collection of workflow definitions, populated during init and
/// read-only during run (§5).
pub struct WorkflowRegistry {
    definitions: Mutex<Vec<WorkflowDefinition>>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self {
            definitions: Mutex::new(Vec::new()),
        }
    }

    /// `agent.workflows.defineBuiltIn(name, workers)`.
    pub fn define_builtin(&self, agent_name: &AgentName, display_name: impl Into<String>, workers: u32) -> WorkflowDefinition {
        self.define(agent_name, display_name, WorkflowKind::Builtin, workers)
    }

    /// `agent.workflows.defineCustom(T, options)`.
    pub fn define_custom(&self, agent_name: &AgentName, display_name: impl Into<String>, workers: u32) -> WorkflowDefinition {
        self.define(agent_name, display_name, WorkflowKind::Custom, workers)
    }

    fn define(&self, agent_name: &AgentName, display_name: impl Into<String>, kind: WorkflowKind, workers: u32) -> WorkflowDefinition {
        let definition = WorkflowDefinition::new(agent_name.clone(), display_name, kind).with_workers(workers);
        self.definitions.lock().unwrap().push(definition.clone());
        definition
    }

    pub fn definitions(&self) -> Vec<WorkflowDefinition> {
        self.definitions.lock().unwrap().clone()
    }
}

impl Default for WorkflowRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// A registered agent paired with its workflow-definition registry.
pub struct AgentHandle {
    pub agent: Agent,
    pub workflows: WorkflowRegistry,
}

/// `platform.agents.register(agentConfig)`: the top-level registry agent
/// authors build against. One `Platform` per tenant scope — cross-tenant
/// uniqueness (§3: "unique by (tenant, name) unless systemScoped") is the
/// caller's concern, since nothing in this crate models a multi-tenant
/// process-wide singleton (§9 explicitly forbids that shape).
pub struct Platform {
    agents: Mutex<HashMap<String, Arc<AgentHandle>>>,
}

impl Platform {
    pub fn new() -> Self {
        Self {
            agents: Mutex::new(HashMap::new()),
        }
    }

    /// Register an agent. Rejects a duplicate name (§4.8).
    pub fn register(&self, agent: Agent) -> Result<Arc<AgentHandle>> {
        let mut agents = self.agents.lock().unwrap();
        let key = agent.name.as_str().to_string();
        if agents.contains_key(&key) {
            return Err(Error::conflict(format!("agent '{}' is already registered", key)));
        }
        let handle = Arc::new(AgentHandle {
            agent,
            workflows: WorkflowRegistry::new(),
        });
        agents.insert(key, handle.clone());
        Ok(handle)
    }

    pub fn agent(&self, name: &str) -> Option<Arc<AgentHandle>> {
        self.agents.lock().unwrap().get(name).cloned()
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct DefinitionPayload<'a> {
    agent: &'a str,
    workflow_type: String,
    name: &'a str,
    system_scoped: bool,
    workers: u32,
}

/// Uploads workflow definitions idempotently: at most one `check` GET and
/// at most one `POST` per `workflowType` per process lifetime (§4.8, §8).
pub struct DefinitionUploader {
    transport: Arc<Transport>,
    executor: Executor,
    checked: Mutex<HashSet<String>>,
}

impl DefinitionUploader {
    pub fn new(transport: Arc<Transport>) -> Self {
        Self {
            transport,
            executor: Executor::new(),
            checked: Mutex::new(HashSet::new()),
        }
    }

    /// Returns `true` if this call actually uploaded the definition, `false`
    /// if it was already present (either checked earlier this process, or
    /// found on the server).
    pub async fn upload_if_new(&self, context: &ExecContext, definition: &WorkflowDefinition) -> Result<bool> {
        let workflow_type = definition.workflow_type();
        {
            let mut checked = self.checked.lock().unwrap();
            if !checked.insert(workflow_type.clone()) {
                return Ok(false);
            }
        }

        let check_path = format!("{}?workflowType={}", DEFINITIONS_CHECK_PATH, workflow_type);
        let transport = self.transport.clone();
        let transport_b = self.transport.clone();
        let path_a = check_path.clone();
        let path_b = check_path;

        let existing: Option<Value> = self
            .executor
            .execute(
                context,
                "workflows.checkDefinition",
                move || async move { transport.get_with_retry(&path_a).await },
                move || async move { transport_b.get_with_retry(&path_b).await },
            )
            .await?;

        if existing.is_some() {
            return Ok(false);
        }

        let payload = DefinitionPayload {
            agent: definition.agent_name.as_str(),
            workflow_type,
            name: &definition.display_name,
            system_scoped: definition.system_scoped,
            workers: definition.workers,
        };

        let transport = self.transport.clone();
        let transport_b = self.transport.clone();
        let payload_a = serde_json::to_value(&payload)?;
        let payload_b = payload_a.clone();

        let _: Value = self
            .executor
            .execute(
                context,
                "workflows.uploadDefinition",
                move || async move { transport.post_with_retry(DEFINITIONS_PATH, &payload_a).await },
                move || async move { transport_b.post_with_retry(DEFINITIONS_PATH, &payload_b).await },
            )
            .await?;
        Ok(true)
    }
}

/// A started set of worker pools, one per activable definition's derived
/// task queue. Actually subscribing to the flow engine's per-queue activity
/// dispatch is the out-of-scope engine's concern (§1); this models the
/// queue-derivation and cancellation contract the SDK owns.
pub struct WorkerPool {
    pub queues: Vec<TaskQueueName>,
    cancellation: CancellationToken,
}

impl WorkerPool {
    /// `runAllAsync()`: derive a task queue for every activable definition.
    pub fn start(definitions: &[WorkflowDefinition], tenant: &TenantId) -> Self {
        let queues = definitions
            .iter()
            .filter(|d| d.activable)
            .map(|d| TaskQueueName::derive(&d.workflow_type(), d.system_scoped, tenant.as_str()))
            .collect();
        Self {
            queues,
            cancellation: CancellationToken::new(),
        }
    }

    /// Blocks until `cancel()` is called, mirroring `runAllAsync()`'s "block
    /// until cancelled" contract (§4.8).
    pub async fn run_until_cancelled(&self) {
        self.cancellation.cancelled().await;
    }

    pub fn cancel(&self) {
        self.cancellation.cancel();
    }
}

/// `agent.schedules.create<T>(id)...createIfNotExistsAsync()`.
pub struct Schedules {
    flow_client: Arc<dyn FlowEngineClient>,
    executor: Executor,
}

impl Schedules {
    pub fn new(flow_client: Arc<dyn FlowEngineClient>) -> Self {
        Self {
            flow_client,
            executor: Executor::new(),
        }
    }

    pub fn create(&self, id: impl Into<String>) -> ScheduleBuilder<'_> {
        ScheduleBuilder {
            flow_client: self.flow_client.clone(),
            executor: &self.executor,
            id: id.into(),
            interval: None,
            input: Value::Null,
        }
    }
}

pub struct ScheduleBuilder<'a> {
    flow_client: Arc<dyn FlowEngineClient>,
    executor: &'a Executor,
    id: String,
    interval: Option<Duration>,
    input: Value,
}

impl<'a> ScheduleBuilder<'a> {
    pub fn with_interval_schedule(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn with_input(mut self, input: Value) -> Self {
        self.input = input;
        self
    }

    /// Idempotent: re-creating with the same id is a no-op (§4.8, §8).
    pub async fn create_if_not_exists_async(self, context: &ExecContext) -> Result<()> {
        let interval = self
            .interval
            .ok_or_else(|| Error::validation("schedule requires an interval"))?;

        let flow_client = self.flow_client.clone();
        let flow_client_b = self.flow_client.clone();
        let id_a = self.id.clone();
        let id_b = self.id;
        let input_a = self.input.clone();
        let input_b = self.input;

        self.executor
            .execute(
                context,
                "workflows.createScheduleIfNotExists",
                move || async move { flow_client.create_schedule_if_not_exists(&id_a, interval, input_a).await },
                move || async move { flow_client_b.create_schedule_if_not_exists(&id_b, interval, input_b).await },
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ids::UserId;

    #[test]
    fn registering_duplicate_agent_name_is_a_conflict() {
        let platform = Platform::new();
        let agent = Agent::new(AgentName::new("Orders"), "Order processing agent");
        platform.register(agent.clone()).unwrap();
        let err = platform.register(agent).unwrap_err();
        assert!(matches!(err, Error::Conflict { .. }));
    }

    #[test]
    fn workflow_type_matches_composite_form() {
        let registry = WorkflowRegistry::new();
        let def = registry.define_builtin(&AgentName::new("Orders"), "Default Workflow - Conversational", 2);
        assert_eq!(def.workflow_type(), "Orders:Default Workflow - Conversational");
        assert_eq!(registry.definitions().len(), 1);
    }

    #[tokio::test]
    async fn upload_checks_once_and_posts_once_across_two_calls() {
        let mut server = mockito::Server::new_async().await;
        let check = server
            .mock("GET", mockito::Matcher::Regex(r"^/api/agent/definitions/check".to_string()))
            .with_status(404)
            .expect(1)
            .create_async()
            .await;
        let post = server
            .mock("POST", "/api/agent/definitions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok":true}"#)
            .expect(1)
            .create_async()
            .await;

        let transport = Arc::new(crate::transport::Transport::new(crate::transport::TransportConfig::new(
            url::Url::parse(&server.url()).unwrap(),
            "cred",
        )));
        let uploader = DefinitionUploader::new(transport);
        let definition = WorkflowDefinition::new(AgentName::new("PayloadTestAgent_X"), "Default Workflow - Conversational", WorkflowKind::Builtin);

        let first = uploader.upload_if_new(&ExecContext::OutsideEngine, &definition).await.unwrap();
        let second = uploader.upload_if_new(&ExecContext::OutsideEngine, &definition).await.unwrap();
        assert!(first);
        assert!(!second);
        check.assert_async().await;
        post.assert_async().await;
    }

    #[test]
    fn worker_pool_derives_only_activable_queues() {
        let registry = WorkflowRegistry::new();
        registry.define_builtin(&AgentName::new("Orders"), "Active", 1);
        let inactive = WorkflowDefinition::new(AgentName::new("Orders"), "Inactive", WorkflowKind::Custom).inactive();
        registry.definitions.lock().unwrap().push(inactive);

        let pool = WorkerPool::start(&registry.definitions(), &TenantId::new("acme"));
        assert_eq!(pool.queues.len(), 1);
        let _ = UserId::new("unused");
    }
}
