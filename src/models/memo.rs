//! Workflow memo / search-attribute map, and the pure inheritance function
//! child workflows use to build theirs from a parent's.
//!
//! Grounded on spec §9's design note: "Build a pure function
//! `inherit(parentMemo, overlays) -> childMemo` with the overlay set
//! explicit — avoids accidental leaks from per-subsystem copying loops."
//! Shaped as a thin `HashMap<String, String>` wrapper, the way the teacher's
//! `ResourceMetadata` (`models/resource.rs`) wraps a string map rather than
//! inventing a bespoke struct per caller.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::ids::{AgentName, TenantId, UserId};

pub const KEY_TENANT_ID: &str = "tenantId";
pub const KEY_USER_ID: &str = "userId";
pub const KEY_AGENT_NAME: &str = "agentName";
pub const KEY_SYSTEM_SCOPED: &str = "systemScoped";
pub const KEY_TASK_TITLE: &str = "taskTitle";
pub const KEY_TASK_DESCRIPTION: &str = "taskDescription";
pub const KEY_TASK_ACTIONS: &str = "taskActions";

/// Every workflow carries one of these. Invariant: always identifies its
/// owning tenant, user, and agent — enforced by `Memo::new` requiring them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Memo(HashMap<String, String>);

impl Memo {
    pub fn new(tenant_id: &TenantId, user_id: &UserId, agent_name: &AgentName, system_scoped: bool) -> Self {
        let mut map = HashMap::new();
        map.insert(KEY_TENANT_ID.to_string(), tenant_id.as_str().to_string());
        map.insert(KEY_USER_ID.to_string(), user_id.as_str().to_string());
        map.insert(KEY_AGENT_NAME.to_string(), agent_name.as_str().to_string());
        map.insert(KEY_SYSTEM_SCOPED.to_string(), system_scoped.to_string());
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.get(KEY_TENANT_ID).map(TenantId::new)
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.get(KEY_USER_ID).map(UserId::new)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn as_map(&self) -> &HashMap<String, String> {
        &self.0
    }
}

/// Child workflows inherit the *full* memo of the parent, overlaying their
/// own task-specific fields. `overlays` wins on key collision.
pub fn inherit(parent: &Memo, overlays: &[(&str, String)]) -> Memo {
    let mut child = parent.clone();
    for (key, value) in overlays {
        child.insert(*key, value.clone());
    }
    child
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_parent() -> Memo {
        Memo::new(
            &TenantId::new("acme"),
            &UserId::new("u1"),
            &AgentName::new("Supervisor"),
            false,
        )
    }

    #[test]
    fn child_retains_every_parent_key() {
        let parent = sample_parent();
        let child = inherit(&parent, &[(KEY_TASK_TITLE, "Approve Order".to_string())]);
        for key in parent.as_map().keys() {
            assert!(child.as_map().contains_key(key));
        }
        assert_eq!(child.get(KEY_TASK_TITLE), Some("Approve Order"));
    }

    #[test]
    fn overlay_wins_on_collision() {
        let parent = sample_parent();
        let child = inherit(&parent, &[(KEY_USER_ID, "delegate-user".to_string())]);
        assert_eq!(child.user_id(), Some(UserId::new("delegate-user")));
    }
}
