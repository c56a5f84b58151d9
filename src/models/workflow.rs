//! `WorkflowDefinition`, its routing `TaskQueueName`, and `WorkflowStatus`.
//!
//! Grounded on the teacher's `WorkflowDefinition` (`models/workflow.rs`) for
//! overall shape (a named, versionable definition uploaded once to the
//! server) but with Petri-net-specific fields (places/transitions) dropped —
//! this domain's definitions describe an *agent's* workflow, not a token
//! net.

use serde::{Deserialize, Serialize};

use crate::models::ids::AgentName;

/// Whether a definition ships with the SDK or is supplied by the agent
/// author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowKind {
    Builtin,
    Custom,
}

/// A registered workflow definition. `workflow_type` is always
/// `"{agentName}:{displayName}"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub agent_name: AgentName,
    pub display_name: String,
    pub kind: WorkflowKind,
    /// Whether a worker pool should actually be started for this
    /// definition; inactive definitions are registered but never run.
    pub activable: bool,
    /// Number of workers to start on the derived task queue.
    pub workers: u32,
    pub system_scoped: bool,
}

impl WorkflowDefinition {
    pub fn new(agent_name: impl Into<AgentName>, display_name: impl Into<String>, kind: WorkflowKind) -> Self {
        Self {
            agent_name: agent_name.into(),
            display_name: display_name.into(),
            kind,
            activable: true,
            workers: 1,
            system_scoped: false,
        }
    }

    /// `"{agentName}:{displayName}"`, the composite identity used both as
    /// the flow-engine `workflowType` and as the key for the upload
    /// idempotence check.
    pub fn workflow_type(&self) -> String {
        format!("{}:{}", self.agent_name.as_str(), self.display_name)
    }

    pub fn with_workers(mut self, workers: u32) -> Self {
        self.workers = workers;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.activable = false;
        self
    }

    pub fn system_scoped(mut self) -> Self {
        self.system_scoped = true;
        self
    }
}

/// Task-queue routing label, derived from a definition's `(workflowType,
/// systemScoped, tenantId)`. Workers registered for a definition subscribe
/// to exactly this derived name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskQueueName(String);

impl TaskQueueName {
    pub fn derive(workflow_type: &str, system_scoped: bool, tenant_id: &str) -> Self {
        if system_scoped {
            Self(format!("system:{}", workflow_type))
        } else {
            Self(format!("{}:{}", tenant_id, workflow_type))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Workflow run status, backing `describe(id) -> {status, memo}` (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WorkflowStatus {
    Running,
    Completed,
    Failed,
    Terminated,
    ContinuedAsNew,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workflow_type_is_composite() {
        let def = WorkflowDefinition::new("Supervisor", "Default Workflow - Conversational", WorkflowKind::Builtin);
        assert_eq!(def.workflow_type(), "Supervisor:Default Workflow - Conversational");
    }

    #[test]
    fn task_queue_system_scoped_differs_from_tenant_scoped() {
        let system = TaskQueueName::derive("Agent:Wf", true, "acme");
        let tenant = TaskQueueName::derive("Agent:Wf", false, "acme");
        assert_ne!(system, tenant);
        assert!(system.as_str().starts_with("system:"));
        assert!(tenant.as_str().starts_with("acme:"));
    }
}
