//! Inbound message envelope and payload (§3, §4.6).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::ids::{AgentName, ThreadId};

/// The `type` discriminant messages are demultiplexed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Chat,
    Data,
    File,
}

/// The content carried inside an `InboundMessage`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    pub agent: AgentName,
    pub thread_id: ThreadId,
    pub participant_id: String,
    #[serde(default)]
    pub text: Option<String>,
    pub request_id: String,
    #[serde(default)]
    pub hint: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(rename = "type")]
    pub message_type: MessageType,
}

/// A message signalled in on `HandleInboundChatOrData`, carrying both the
/// payload and where it came from (for A2A attribution, not the receiver's
/// own identity).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessage {
    pub payload: MessagePayload,
    #[serde(default)]
    pub source_agent: Option<AgentName>,
    #[serde(default)]
    pub source_workflow_id: Option<String>,
    #[serde(default)]
    pub source_workflow_type: Option<String>,
}

/// History entry direction, used when constructing prompt history (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageDirection {
    Incoming,
    Outgoing,
}

/// One stored message in a thread's history, as returned by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMessage {
    pub direction: MessageDirection,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
}
