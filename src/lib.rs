//! # xians-agent-sdk
//!
//! Client-side SDK for building durable AI agents: long-lived, replayable
//! processes that coordinate LLM-driven conversations, human-in-the-loop
//! (HITL) approvals, scheduled jobs, and agent-to-agent (A2A) message
//! exchange on top of an out-of-scope durable workflow execution engine
//! (the "flow engine").
//!
//! The crate is a *client* of that engine — it does not implement durable
//! execution, replay, or scheduling itself. See each module for the
//! component of the specification it implements.
//!
//! ## Module map
//!
//! - [`transport`] — authenticated HTTP client with retry and health checks.
//! - [`settings`] — flow-engine connection parameters and credential identity.
//! - [`flow`] — thin adapter to the durable workflow engine.
//! - [`executor`] — the activity/direct-call dispatch every I/O operation
//!   routes through.
//! - [`cache`] — the shared TTL cache fronting knowledge/settings/definitions.
//! - [`knowledge`] — knowledge provider (server or local) plus the cache.
//! - [`messaging`] — inbound routing, history, reply/skip/hint/scope, A2A.
//! - [`tasks`] — the HITL task child-workflow subsystem.
//! - [`workflows`] — agent registration, definition upload, worker startup.
//! - [`metrics`] — usage-event reporting.
//! - [`secrets`] — the scoped secret vault.
//! - [`documents`] — the document-store client.

pub mod cache;
pub mod config;
pub mod documents;
pub mod error;
pub mod executor;
pub mod flow;
pub mod knowledge;
pub mod logging;
pub mod messaging;
pub mod metrics;
pub mod models;
pub mod secrets;
pub mod settings;
pub mod tasks;
pub mod transport;
pub mod workflows;

pub use error::{Error, Result};

/// The crate's own version, carried in the `Transport` user-agent string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Flat re-exports for the common entry points, so callers can write
// `xians_agent_sdk::Platform` instead of `xians_agent_sdk::workflows::Platform`.
pub use cache::{Cache, CacheConfig};
pub use config::SdkConfig;
pub use executor::{Context, Executor, WorkflowExecutionContext};
pub use flow::{FlowEngineClient, FlowEngineClientFactory, HttpFlowEngineClient};
pub use knowledge::{local::LocalKnowledgeProvider, server::ServerKnowledgeProvider, KnowledgeClient, KnowledgeProvider};
pub use messaging::{A2ADispatcher, MessageHandler, MessageRouter, UserMessageContext};
pub use metrics::Metrics;
pub use models::{
    Agent, CacheAspect, InboundMessage, KnowledgeItem, Memo, MessagePayload, MessageType, Secret, TaskQueueName, TaskRecord, TaskState,
    TaskWorkflowRequest, TenantId, UsageEvent, WorkflowDefinition, WorkflowId, WorkflowKind,
};
pub use secrets::{SecretScope, SecretVault};
pub use settings::Settings;
pub use tasks::{TaskHandle, Tasks};
pub use transport::{Transport, TransportConfig};
pub use workflows::{AgentHandle, DefinitionUploader, Platform, Schedules, WorkerPool, WorkflowRegistry};
