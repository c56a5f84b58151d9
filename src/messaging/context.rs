//! `UserMessageContext` — the object handed to every chat/data/file handler
//! (§4.6).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::models::ids::ThreadId;
use crate::models::message::{InboundMessage, StoredMessage};
use crate::models::WorkflowId;

/// Polymorphic over where the message came from. An A2A message carries the
/// target workflow identity so metrics/usage helpers attribute the turn to
/// the target, not the sender (§4.6, §9's "A2A context" note).
#[derive(Debug, Clone)]
pub enum MessageOrigin {
    Direct,
    A2A {
        target_workflow_id: WorkflowId,
        target_workflow_type: String,
    },
}

/// Sends an outbound reply for the current turn. Implemented over the
/// flow-engine/transport boundary; abstracted behind a trait so
/// `UserMessageContext` doesn't need to know which.
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn reply(&self, thread_id: &ThreadId, text: &str, data: Option<Value>, hint: Option<String>, scope: Option<String>) -> Result<()>;
}

/// Given to every `on_chat`/`on_data`/`on_file` handler. Carries the parsed
/// message, already-fetched recent history (for hint accessors), and a
/// `reply_async` sink. `skip_response` suppresses the router's automatic
/// outbound reply for this turn — it has no effect on explicit
/// `reply_async` calls.
pub struct UserMessageContext {
    message: InboundMessage,
    thread_id: ThreadId,
    origin: MessageOrigin,
    history: Vec<StoredMessage>,
    skip_response: AtomicBool,
    reply_sink: Arc<dyn ReplySink>,
}

impl UserMessageContext {
    pub fn new(
        message: InboundMessage,
        thread_id: ThreadId,
        origin: MessageOrigin,
        history: Vec<StoredMessage>,
        reply_sink: Arc<dyn ReplySink>,
    ) -> Self {
        Self {
            message,
            thread_id,
            origin,
            history,
            skip_response: AtomicBool::new(false),
            reply_sink,
        }
    }

    pub fn message(&self) -> &InboundMessage {
        &self.message
    }

    pub fn thread_id(&self) -> &ThreadId {
        &self.thread_id
    }

    pub fn origin(&self) -> &MessageOrigin {
        &self.origin
    }

    pub fn history(&self) -> &[StoredMessage] {
        &self.history
    }

    /// Suppress the router's automatic outbound reply for this turn.
    pub fn set_skip_response(&self, skip: bool) {
        self.skip_response.store(skip, Ordering::SeqCst);
    }

    pub fn skip_response(&self) -> bool {
        self.skip_response.load(Ordering::SeqCst)
    }

    /// Most recent hint of any kind, newest-first in `history`.
    pub fn last_hint(&self) -> Option<String> {
        self.history.iter().find_map(|m| m.hint.clone())
    }

    /// Most recent hint that looks like a task pointer — a well-formed
    /// workflow id (at least one `:` separator), since task hints carry a
    /// workflow-id reference (§4.6).
    pub fn last_task_hint(&self) -> Option<String> {
        self.history.iter().find_map(|m| m.hint.clone().filter(|h| h.contains(':')))
    }

    pub async fn reply_async(&self, text: &str, data: Option<Value>, hint: Option<String>, scope: Option<String>) -> Result<()> {
        self.reply_sink.reply(&self.thread_id, text, data, hint, scope).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ids::AgentName;
    use crate::models::message::{MessagePayload, MessageType};
    use std::sync::Mutex;

    struct RecordingSink {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ReplySink for RecordingSink {
        async fn reply(&self, _thread_id: &ThreadId, text: &str, _data: Option<Value>, _hint: Option<String>, _scope: Option<String>) -> Result<()> {
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    fn sample_message() -> InboundMessage {
        InboundMessage {
            payload: MessagePayload {
                agent: AgentName::new("Supervisor"),
                thread_id: ThreadId::new("thread-1"),
                participant_id: "user-1".to_string(),
                text: Some("hi".to_string()),
                request_id: "req-1".to_string(),
                hint: None,
                scope: None,
                data: None,
                message_type: MessageType::Chat,
            },
            source_agent: None,
            source_workflow_id: None,
            source_workflow_type: None,
        }
    }

    #[tokio::test]
    async fn reply_async_reaches_the_sink() {
        let sink = Arc::new(RecordingSink { sent: Mutex::new(Vec::new()) });
        let ctx = UserMessageContext::new(sample_message(), ThreadId::new("thread-1"), MessageOrigin::Direct, Vec::new(), sink.clone());

        ctx.reply_async("hello back", None, None, None).await.unwrap();
        assert_eq!(sink.sent.lock().unwrap().as_slice(), ["hello back"]);
    }

    #[test]
    fn last_task_hint_ignores_plain_hints() {
        let history = vec![
            StoredMessage {
                direction: crate::models::message::MessageDirection::Outgoing,
                text: Some("ok".to_string()),
                hint: Some("just-a-note".to_string()),
            },
            StoredMessage {
                direction: crate::models::message::MessageDirection::Incoming,
                text: Some("approve it".to_string()),
                hint: Some("acme:Supervisor:Task Workflow--t1".to_string()),
            },
        ];
        let sink = Arc::new(RecordingSink { sent: Mutex::new(Vec::new()) });
        let ctx = UserMessageContext::new(sample_message(), ThreadId::new("thread-1"), MessageOrigin::Direct, history, sink);

        assert_eq!(ctx.last_hint(), Some("just-a-note".to_string()));
        assert_eq!(ctx.last_task_hint(), Some("acme:Supervisor:Task Workflow--t1".to_string()));
    }
}
