//! Core domain models.
//!
//! Mirrors the teacher's module-root style (`pub mod` declarations plus a
//! flat `pub use` re-export block at the bottom) but the entities are this
//! domain's: agents, workflow definitions, memos, messages, tasks,
//! knowledge, cache entries, secrets, usage events.

pub mod agent;
pub mod cache;
pub mod ids;
pub mod knowledge;
pub mod memo;
pub mod message;
pub mod secret;
pub mod task;
pub mod usage;
pub mod workflow;

pub use agent::Agent;
pub use cache::{CacheAspect, CacheEntry};
pub use ids::{AgentName, TaskName, TenantId, ThreadId, UserId, WorkflowId};
pub use knowledge::KnowledgeItem;
pub use memo::{inherit, Memo};
pub use message::{InboundMessage, MessageDirection, MessagePayload, MessageType, StoredMessage};
pub use secret::Secret;
pub use task::{RetryPolicy, TaskRecord, TaskResult, TaskState, TaskWorkflowRequest};
pub use usage::{UsageEvent, UsageMetric};
pub use workflow::{TaskQueueName, WorkflowDefinition, WorkflowKind, WorkflowStatus};
