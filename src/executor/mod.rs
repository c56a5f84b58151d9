//! Context-Aware Executor (§4.4): the single abstraction every I/O-bearing
//! operation in the SDK routes through, so workflow replay stays
//! deterministic.
//!
//! Grounded on spec §9's design note directly: "Replace with a single
//! generic executor: `Execute(actFn, svcFn, opName)` that inspects the
//! context and dispatches. Every external-effect operation routes through
//! it — no exceptions." The `Context` tagged-variant shape (rather than
//! thread-local ambient state) follows the same note's "Model as handles on
//! a `Platform` value threaded through the API; never rely on process-wide
//! singletons in production."

use std::future::Future;

use crate::error::Result;
use crate::models::ids::{AgentName, TenantId};
use crate::models::WorkflowId;

/// Identifying context of the workflow a call is running under, carried by
/// both `InWorkflow` and `InActivity` (they differ only in which side of
/// the determinism boundary the caller is on).
#[derive(Debug, Clone)]
pub struct WorkflowExecutionContext {
    pub workflow_id: WorkflowId,
    pub tenant_id: TenantId,
    pub agent_name: AgentName,
}

/// Where a call is originating from. Threaded explicitly through every
/// executor invocation — never read from thread-local or global state.
#[derive(Debug, Clone)]
pub enum Context {
    /// Inside deterministic workflow code: I/O must go through an activity.
    InWorkflow(WorkflowExecutionContext),
    /// Inside an activity: already off the deterministic path, direct calls
    /// are safe.
    InActivity(WorkflowExecutionContext),
    /// Outside the engine entirely (process init, a CLI tool, a test
    /// harness): direct calls are safe.
    OutsideEngine,
}

impl Context {
    pub fn workflow_execution_context(&self) -> Option<&WorkflowExecutionContext> {
        match self {
            Context::InWorkflow(ctx) | Context::InActivity(ctx) => Some(ctx),
            Context::OutsideEngine => None,
        }
    }

    pub fn is_in_workflow(&self) -> bool {
        matches!(self, Context::InWorkflow(_))
    }
}

/// Dispatches every I/O-bearing operation to either the activity path or
/// the direct-call path depending on `Context`. Stateless — it holds no
/// engine connection itself, since the actual activity-submission
/// machinery belongs to the workflow runtime, not this crate's out-of-scope
/// engine (§1).
#[derive(Debug, Default, Clone, Copy)]
pub struct Executor;

impl Executor {
    pub fn new() -> Self {
        Self
    }

    /// Run `act_fn` if `context` is `InWorkflow`, otherwise run `svc_fn`
    /// directly. `op_name` is carried only for diagnostics (log lines,
    /// error context) — it does not affect dispatch.
    pub async fn execute<T, FAct, FutAct, FSvc, FutSvc>(
        &self,
        context: &Context,
        op_name: &str,
        act_fn: FAct,
        svc_fn: FSvc,
    ) -> Result<T>
    where
        FAct: FnOnce() -> FutAct,
        FutAct: Future<Output = Result<T>>,
        FSvc: FnOnce() -> FutSvc,
        FutSvc: Future<Output = Result<T>>,
    {
        match context {
            Context::InWorkflow(_) => {
                tracing::debug!(operation = op_name, "executing via activity path");
                act_fn().await
            }
            Context::InActivity(_) | Context::OutsideEngine => {
                tracing::debug!(operation = op_name, "executing via direct call path");
                svc_fn().await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_workflow_context() -> WorkflowExecutionContext {
        WorkflowExecutionContext {
            workflow_id: WorkflowId::build(&TenantId::new("acme"), "Agent:Wf", None),
            tenant_id: TenantId::new("acme"),
            agent_name: AgentName::new("Agent"),
        }
    }

    #[tokio::test]
    async fn in_workflow_takes_the_activity_path() {
        let executor = Executor::new();
        let context = Context::InWorkflow(sample_workflow_context());

        let result = executor
            .execute(
                &context,
                "fetchKnowledge",
                || async { Ok::<_, crate::error::Error>("via-activity") },
                || async { Ok::<_, crate::error::Error>("via-direct") },
            )
            .await
            .unwrap();
        assert_eq!(result, "via-activity");
    }

    #[tokio::test]
    async fn outside_engine_takes_the_direct_path() {
        let executor = Executor::new();
        let context = Context::OutsideEngine;

        let result = executor
            .execute(
                &context,
                "fetchKnowledge",
                || async { Ok::<_, crate::error::Error>("via-activity") },
                || async { Ok::<_, crate::error::Error>("via-direct") },
            )
            .await
            .unwrap();
        assert_eq!(result, "via-direct");
    }

    #[tokio::test]
    async fn in_activity_takes_the_direct_path() {
        let executor = Executor::new();
        let context = Context::InActivity(sample_workflow_context());

        let result = executor
            .execute(
                &context,
                "fetchKnowledge",
                || async { Ok::<_, crate::error::Error>("via-activity") },
                || async { Ok::<_, crate::error::Error>("via-direct") },
            )
            .await
            .unwrap();
        assert_eq!(result, "via-direct");
    }
}
