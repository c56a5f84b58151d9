//! Newtype identifiers.
//!
//! Grounded on the teacher's `AgentId(String)` pattern (`models/agent.rs`) and
//! `StateId` (`models/state.rs`): a thin wrapper around `String` rather than
//! passing bare strings between every layer, so a `TenantId` and a `UserId`
//! can't be swapped by accident at a call site.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

string_id!(TenantId, "Identifies a tenant, the first segment of every workflow id.");
string_id!(UserId, "Identifies a user/participant within a tenant.");
string_id!(AgentName, "Name of a registered agent, unique per tenant unless system-scoped.");
string_id!(ThreadId, "Opaque conversation-history stream id, scoped per (participantId, workflowType).");
string_id!(TaskName, "Unique suffix distinguishing one HITL task child workflow from another.");

/// Composite workflow identifier of the form
/// `"{tenantId}:{workflowType}[:{idPostfix}]"`.
///
/// Invariant: always contains at least two `:` separators; `tenantId` is
/// recoverable as the first segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowId(String);

impl WorkflowId {
    /// Build a workflow id from its parts.
    pub fn build(tenant: &TenantId, workflow_type: &str, id_postfix: Option<&str>) -> Self {
        let mut id = format!("{}:{}", tenant.as_str(), workflow_type);
        if let Some(postfix) = id_postfix {
            id.push(':');
            id.push_str(postfix);
        }
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Recover the tenant id, the first `:`-delimited segment.
    pub fn tenant_id(&self) -> TenantId {
        let first = self.0.split(':').next().unwrap_or_default();
        TenantId::new(first)
    }

    /// True iff this id satisfies the workflow-id invariant: at least two
    /// `:` separators.
    pub fn is_well_formed(&self) -> bool {
        self.0.matches(':').count() >= 2
    }
}

impl From<String> for WorkflowId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_round_trips_tenant() {
        let tenant = TenantId::new("acme");
        let id = WorkflowId::build(&tenant, "Supervisor:Default Workflow", Some("abc123"));
        assert_eq!(id.tenant_id(), tenant);
        assert!(id.is_well_formed());
        assert_eq!(id.as_str(), "acme:Supervisor:Default Workflow:abc123");
    }

    #[test]
    fn build_without_postfix_still_well_formed() {
        let tenant = TenantId::new("acme");
        let id = WorkflowId::build(&tenant, "Supervisor:Default Workflow", None);
        assert!(id.is_well_formed());
    }

    #[test]
    fn malformed_id_detected() {
        let id = WorkflowId::from("no-colons-here".to_string());
        assert!(!id.is_well_formed());
    }

    proptest::proptest! {
        // §8: "For all (tenant, workflowType) pairs, workflowId parsing
        // round-trips: parseTenant(buildId(t, wt, p)) == t."
        #[test]
        fn build_then_tenant_id_round_trips(
            tenant in "[a-zA-Z0-9_-]{1,24}",
            workflow_type in "[a-zA-Z0-9_ -]{1,24}",
            postfix in proptest::option::of("[a-zA-Z0-9_-]{1,12}"),
        ) {
            let tenant_id = TenantId::new(tenant.clone());
            let id = WorkflowId::build(&tenant_id, &workflow_type, postfix.as_deref());
            prop_assert_eq!(id.tenant_id(), tenant_id);
            prop_assert!(id.is_well_formed());
        }
    }
}
