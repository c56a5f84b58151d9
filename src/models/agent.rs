//! `Agent` — a registered unit owning workflow definitions, a knowledge
//! collection, a secret-vault view, and a cache handle.
//!
//! Grounded on the teacher's `AgentDefinition` (`models/agent.rs`), trimmed
//! of LLM-provider-specific fields (`LLMProvider`, `LLMConfig`, prompts) that
//! belong to a different domain, and extended with the registration
//! invariants from spec §3 (unique by (tenant, name) unless system-scoped).

use serde::{Deserialize, Serialize};

use crate::models::ids::AgentName;

/// A registered agent: name, description, version, author, and the two
/// scoping flags that govern uniqueness and template status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub name: AgentName,
    pub description: String,
    pub version: String,
    pub author: String,
    /// If true, `name` must be globally unique; otherwise unique per tenant.
    pub system_scoped: bool,
    /// If true, this agent is a template other agents can be cloned from,
    /// not directly instantiable.
    pub is_template: bool,
}

impl Agent {
    pub fn new(name: impl Into<AgentName>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            version: "0.1.0".to_string(),
            author: String::new(),
            system_scoped: false,
            is_template: false,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn system_scoped(mut self) -> Self {
        self.system_scoped = true;
        self
    }

    pub fn as_template(mut self) -> Self {
        self.is_template = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_are_non_system_scoped() {
        let agent = Agent::new("Supervisor", "routes inbound chat");
        assert!(!agent.system_scoped);
        assert!(!agent.is_template);
    }
}
