//! `KnowledgeItem` — a content blob keyed by (tenant, agent, activation, name).

use serde::{Deserialize, Serialize};

use crate::models::ids::AgentName;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeItem {
    pub name: String,
    pub content: String,
    #[serde(rename = "type")]
    pub content_type: String,
    pub agent: AgentName,
    pub system_scoped: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
}

impl KnowledgeItem {
    pub fn key(&self, activation: Option<&str>) -> String {
        let tenant = if self.system_scoped {
            "system".to_string()
        } else {
            self.tenant_id.clone().unwrap_or_default()
        };
        format!(
            "{}:{}:{}:{}",
            tenant,
            self.agent.as_str(),
            activation.unwrap_or("default"),
            self.name
        )
    }
}
