//! HITL task data model: the child-workflow state machine described in §4.7.
//!
//! Grounded on the teacher's `AgentRetryConfig` (`models/agent.rs`) for
//! `RetryPolicy`'s shape, generalized from agent-execution retries to
//! task-workflow retries; the state machine itself is modeled explicitly as
//! an enum per spec §9's design note ("Do not encode via mutable flags
//! scattered over the task implementation").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::models::ids::TaskName;

/// Retry policy for a task's underlying child workflow. Default: a single
/// attempt (no retry) — §3 notes `retryPolicy? (default max attempts = 1)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_interval: std::time::Duration,
    pub backoff_coefficient: f64,
    pub max_interval: std::time::Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            initial_interval: std::time::Duration::from_secs(1),
            backoff_coefficient: 2.0,
            max_interval: std::time::Duration::from_secs(60),
        }
    }
}

/// Options accepted by `Tasks::start`. Defaults follow §4.7 exactly.
#[derive(Debug, Clone)]
pub struct TaskWorkflowRequest {
    pub title: String,
    pub description: String,
    pub draft_work: Option<String>,
    pub participant_id: Option<String>,
    pub metadata: Option<Value>,
    pub actions: Vec<String>,
    pub timeout: Option<std::time::Duration>,
    pub survive_parent_close: bool,
    pub task_name: Option<TaskName>,
    pub retry_policy: RetryPolicy,
}

impl TaskWorkflowRequest {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            draft_work: None,
            participant_id: None,
            metadata: None,
            actions: Vec::new(),
            timeout: None,
            survive_parent_close: false,
            task_name: None,
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Validate required fields and apply the `actions` default, per §4.7 /
    /// §8's boundary behavior ("`availableActions=[]` -> defaulted to
    /// `["approve","reject"]`").
    pub fn validate_and_normalize(mut self) -> Result<Self> {
        if self.title.trim().is_empty() {
            return Err(Error::validation("task title must not be empty"));
        }
        if self.description.trim().is_empty() {
            return Err(Error::validation("task description must not be empty"));
        }
        if self.actions.is_empty() {
            self.actions = vec!["approve".to_string(), "reject".to_string()];
        }
        Ok(self)
    }
}

/// A task's current state. Terminal states (`Completed`, `TimedOut`,
/// `Terminated`) accept no further signals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum TaskState {
    Pending,
    Completed {
        performed_action: String,
        comment: Option<String>,
    },
    TimedOut,
    Terminated,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskState::Pending)
    }
}

/// A HITL task, the child-workflow instance backing §4.7's surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub task_name: TaskName,
    pub title: String,
    pub description: String,
    pub initial_work: Option<String>,
    pub current_draft: Option<String>,
    pub participant_id: String,
    pub metadata: Option<Value>,
    pub available_actions: Vec<String>,
    pub state: TaskState,
    pub created_at: DateTime<Utc>,
}

impl TaskRecord {
    pub fn new(task_name: TaskName, request: &TaskWorkflowRequest, participant_id: String) -> Self {
        Self {
            task_name,
            title: request.title.clone(),
            description: request.description.clone(),
            initial_work: request.draft_work.clone(),
            current_draft: request.draft_work.clone(),
            participant_id,
            metadata: request.metadata.clone(),
            available_actions: request.actions.clone(),
            state: TaskState::Pending,
            created_at: Utc::now(),
        }
    }

    /// Legal only while `Pending` (§4.7).
    pub fn update_draft(&mut self, text: String) -> Result<()> {
        if self.state.is_terminal() {
            return Err(Error::conflict(format!(
                "task '{}' is no longer pending",
                self.task_name
            )));
        }
        self.current_draft = Some(text);
        Ok(())
    }

    /// Legal only while `Pending` and only if `action` is a member of
    /// `available_actions`.
    pub fn perform_action(&mut self, action: &str, comment: Option<String>) -> Result<()> {
        if self.state.is_terminal() {
            return Err(Error::conflict(format!(
                "task '{}' is no longer pending",
                self.task_name
            )));
        }
        if !self.available_actions.iter().any(|a| a == action) {
            return Err(Error::validation(format!(
                "action '{}' is not a member of availableActions {:?}",
                action, self.available_actions
            )));
        }
        self.state = TaskState::Completed {
            performed_action: action.to_string(),
            comment,
        };
        Ok(())
    }

    /// Engine-driven timeout transition; no-op if already terminal.
    pub fn time_out(&mut self) {
        if !self.state.is_terminal() {
            self.state = TaskState::TimedOut;
        }
    }

    pub fn terminate(&mut self) {
        if !self.state.is_terminal() {
            self.state = TaskState::Terminated;
        }
    }
}

/// Final result returned to the parent workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResult {
    pub task_name: TaskName,
    pub initial_work: Option<String>,
    pub final_work: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub performed_action: Option<String>,
    pub comment: Option<String>,
    pub timed_out: bool,
}

impl From<&TaskRecord> for TaskResult {
    fn from(record: &TaskRecord) -> Self {
        match &record.state {
            TaskState::Completed { performed_action, comment } => TaskResult {
                task_name: record.task_name.clone(),
                initial_work: record.initial_work.clone(),
                final_work: record.current_draft.clone(),
                completed_at: Some(Utc::now()),
                performed_action: Some(performed_action.clone()),
                comment: comment.clone(),
                timed_out: false,
            },
            TaskState::TimedOut => TaskResult {
                task_name: record.task_name.clone(),
                initial_work: record.initial_work.clone(),
                final_work: record.current_draft.clone(),
                completed_at: Some(Utc::now()),
                performed_action: None,
                comment: None,
                timed_out: true,
            },
            _ => TaskResult {
                task_name: record.task_name.clone(),
                initial_work: record.initial_work.clone(),
                final_work: record.current_draft.clone(),
                completed_at: None,
                performed_action: None,
                comment: None,
                timed_out: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request() -> TaskWorkflowRequest {
        TaskWorkflowRequest::new("Approve Order", "Approve the pending order")
    }

    #[test]
    fn empty_actions_default_to_approve_reject() {
        let request = sample_request().validate_and_normalize().unwrap();
        assert_eq!(request.actions, vec!["approve", "reject"]);
    }

    #[test]
    fn blank_title_is_rejected() {
        let request = TaskWorkflowRequest::new("   ", "desc");
        assert!(request.validate_and_normalize().is_err());
    }

    #[test]
    fn perform_action_rejects_unknown_action() {
        let request = sample_request().validate_and_normalize().unwrap();
        let mut record = TaskRecord::new(TaskName::new("t1"), &request, "user-1".to_string());
        let err = record.perform_action("hold", None).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
        assert_eq!(record.state, TaskState::Pending);
    }

    #[test]
    fn perform_action_transitions_to_completed() {
        let request = sample_request().validate_and_normalize().unwrap();
        let mut record = TaskRecord::new(TaskName::new("t1"), &request, "user-1".to_string());
        record.perform_action("approve", Some("OK".to_string())).unwrap();
        assert!(record.state.is_terminal());

        let result = TaskResult::from(&record);
        assert_eq!(result.performed_action.as_deref(), Some("approve"));
        assert!(!result.timed_out);
    }

    #[test]
    fn terminal_state_rejects_further_signals() {
        let request = sample_request().validate_and_normalize().unwrap();
        let mut record = TaskRecord::new(TaskName::new("t1"), &request, "user-1".to_string());
        record.time_out();
        assert!(record.update_draft("late".to_string()).is_err());
        assert!(record.perform_action("approve", None).is_err());
    }

    #[test]
    fn timeout_result_has_no_performed_action() {
        let request = sample_request().validate_and_normalize().unwrap();
        let mut record = TaskRecord::new(TaskName::new("t1"), &request, "user-1".to_string());
        record.time_out();
        let result = TaskResult::from(&record);
        assert!(result.timed_out);
        assert!(result.performed_action.is_none());
    }
}
