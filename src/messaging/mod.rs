//! Messaging Core (§4.6): inbound message demultiplexing, per-thread
//! history, reply/skip/hint/scope semantics, A2A dispatch, file-upload
//! decode.

pub mod context;
pub mod history;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::executor::{Context as ExecContext, Executor};
use crate::flow::FlowEngineClient;
use crate::models::ids::{AgentName, TenantId, ThreadId};
use crate::models::message::{InboundMessage, MessagePayload, MessageType};
use crate::models::WorkflowId;
use crate::transport::Transport;

pub use context::{MessageOrigin, ReplySink, UserMessageContext};
pub use history::{build_prompt_history, HistoryClient, HistoryQuery, PromptMessage, Role};

const REPLY_PATH: &str = "/api/agent/conversation/reply";
const HANDLE_INBOUND_SIGNAL: &str = "HandleInboundChatOrData";

/// Handler invoked by the router for one inbound message type.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, context: UserMessageContext) -> Result<()>;
}

/// Sends replies over HTTP. The real delivery path (signalling the source
/// workflow vs. a plain REST reply) is an engine concern out of scope per
/// §1; this reaches a readable REST endpoint the same way `flow::` reaches
/// the engine.
pub struct HttpReplySink {
    transport: Arc<Transport>,
}

impl HttpReplySink {
    pub fn new(transport: Arc<Transport>) -> Self {
        Self { transport }
    }
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplyRequest<'a> {
    thread_id: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scope: Option<&'a str>,
}

#[async_trait]
impl ReplySink for HttpReplySink {
    async fn reply(&self, thread_id: &ThreadId, text: &str, data: Option<Value>, hint: Option<String>, scope: Option<String>) -> Result<()> {
        let body = ReplyRequest {
            thread_id: thread_id.as_str(),
            text,
            data,
            hint: hint.as_deref(),
            scope: scope.as_deref(),
        };
        let _: Value = self.transport.post_with_retry(REPLY_PATH, &body).await?;
        Ok(())
    }
}

/// Demultiplexes inbound messages by `type` into the three handler slots and
/// fetches recent history up front so hint accessors work. Sending the
/// actual reply is the handler's job via `UserMessageContext::reply_async`;
/// the router's only automatic behavior is suppressing that reply when
/// `skip_response` is set — it does not invent a reply of its own.
pub struct MessageRouter {
    on_chat: Option<Arc<dyn MessageHandler>>,
    on_data: Option<Arc<dyn MessageHandler>>,
    on_file: Option<Arc<dyn MessageHandler>>,
    history: Arc<HistoryClient>,
    reply_sink: Arc<dyn ReplySink>,
}

impl MessageRouter {
    pub fn new(history: Arc<HistoryClient>, reply_sink: Arc<dyn ReplySink>) -> Self {
        Self {
            on_chat: None,
            on_data: None,
            on_file: None,
            history,
            reply_sink,
        }
    }

    pub fn on_chat(mut self, handler: Arc<dyn MessageHandler>) -> Self {
        self.on_chat = Some(handler);
        self
    }

    pub fn on_data(mut self, handler: Arc<dyn MessageHandler>) -> Self {
        self.on_data = Some(handler);
        self
    }

    pub fn on_file(mut self, handler: Arc<dyn MessageHandler>) -> Self {
        self.on_file = Some(handler);
        self
    }

    /// Dispatch one inbound message. An unmatched `type` (no handler
    /// registered for that slot) is logged and dropped (§4.6).
    pub async fn dispatch(&self, exec_context: &ExecContext, workflow_type: &str, inbound: InboundMessage) -> Result<()> {
        let handler = match inbound.payload.message_type {
            MessageType::Chat => self.on_chat.as_ref(),
            MessageType::Data => self.on_data.as_ref(),
            MessageType::File => self.on_file.as_ref(),
        };
        let Some(handler) = handler else {
            tracing::warn!(message_type = ?inbound.payload.message_type, "no handler registered for inbound message type, dropping");
            return Ok(());
        };

        let query = HistoryQuery::new(
            &inbound.payload.agent,
            workflow_type,
            &inbound.payload.thread_id,
            &inbound.payload.participant_id,
        );
        let query = match inbound.payload.scope.as_deref() {
            Some(scope) => query.with_scope(scope),
            None => query,
        };
        let history = self.history.get_history(exec_context, query).await?;

        let origin = match (&inbound.source_agent, &inbound.source_workflow_id, &inbound.source_workflow_type) {
            (Some(_), Some(id), Some(workflow_type)) => MessageOrigin::A2A {
                target_workflow_id: WorkflowId::from(id.clone()),
                target_workflow_type: workflow_type.clone(),
            },
            _ => MessageOrigin::Direct,
        };

        let thread_id = inbound.payload.thread_id.clone();
        let context = UserMessageContext::new(inbound, thread_id, origin, history, self.reply_sink.clone());
        handler.handle(context).await
    }
}

/// Agent-to-agent dispatch: signal a target agent's named built-in workflow
/// directly, bypassing the router (§4.6).
pub struct A2ADispatcher {
    flow_client: Arc<dyn FlowEngineClient>,
    tenant: TenantId,
    executor: Executor,
}

impl A2ADispatcher {
    pub fn new(flow_client: Arc<dyn FlowEngineClient>, tenant: TenantId) -> Self {
        Self {
            flow_client,
            tenant,
            executor: Executor::new(),
        }
    }

    /// Signal `workflow_name`'s built-in workflow on `target_agent` with
    /// `message`. Returns the target workflow id, which metrics/usage
    /// helpers attribute the turn to (not the sender's own id).
    pub async fn send_chat_to_built_in(
        &self,
        exec_context: &ExecContext,
        target_agent: &AgentName,
        workflow_name: &str,
        message: &MessagePayload,
    ) -> Result<WorkflowId> {
        let workflow_type = format!("{}:{}", target_agent.as_str(), workflow_name);
        let workflow_id = WorkflowId::build(&self.tenant, &workflow_type, None);
        let payload = serde_json::to_value(message)?;

        let flow_client = self.flow_client.clone();
        let id_a = workflow_id.clone();
        let payload_a = payload.clone();
        let flow_client_b = self.flow_client.clone();
        let id_b = workflow_id.clone();
        let payload_b = payload;

        self.executor
            .execute(
                exec_context,
                "messaging.sendChatToBuiltIn",
                move || async move { flow_client.signal_workflow(&id_a, HANDLE_INBOUND_SIGNAL, payload_a).await },
                move || async move { flow_client_b.signal_workflow(&id_b, HANDLE_INBOUND_SIGNAL, payload_b).await },
            )
            .await?;
        Ok(workflow_id)
    }
}

/// A file decoded from an inbound `file`-type message.
#[derive(Debug, Clone)]
pub struct DecodedFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Decode a file payload. The object form `{content, fileName, contentType}`
/// in `payload.data` is canonical; a raw base64 string in `payload.data`
/// with the filename carried in `payload.text` is accepted only as a
/// fallback (§9's Open Question decision). Invalid base64 is a validation
/// error — the caller is expected to reply with a user-visible error rather
/// than retry (§4.6).
pub fn decode_file_payload(payload: &MessagePayload) -> Result<DecodedFile> {
    use base64::Engine;

    let data = payload
        .data
        .as_ref()
        .ok_or_else(|| Error::validation("file message missing `data`"))?;

    let (content, file_name, content_type) = if let Some(obj) = data.as_object() {
        object_form(obj, payload)?
    } else if let Some(raw) = data.as_str() {
        let file_name = payload
            .text
            .clone()
            .ok_or_else(|| Error::validation("file message missing file name"))?;
        (raw.to_string(), file_name, "application/octet-stream".to_string())
    } else {
        return Err(Error::validation("file message `data` is neither an object nor a string"));
    };

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(content.trim())
        .map_err(|e| Error::validation(format!("file content is not valid base64: {}", e)))?;

    Ok(DecodedFile {
        file_name,
        content_type,
        bytes,
    })
}

fn object_form(obj: &serde_json::Map<String, Value>, payload: &MessagePayload) -> Result<(String, String, String)> {
    let content = obj
        .get("content")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::validation("file message missing `content`"))?
        .to_string();
    let file_name = obj
        .get("fileName")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| payload.text.clone())
        .ok_or_else(|| Error::validation("file message missing `fileName`"))?;
    let content_type = obj
        .get("contentType")
        .and_then(Value::as_str)
        .unwrap_or("application/octet-stream")
        .to_string();
    Ok((content, file_name, content_type))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ids::{AgentName, ThreadId};
    use crate::models::message::MessageType;
    use std::sync::Mutex;

    fn payload_with_data(data: Value, text: Option<&str>) -> MessagePayload {
        MessagePayload {
            agent: AgentName::new("Docs"),
            thread_id: ThreadId::new("t1"),
            participant_id: "user-1".to_string(),
            text: text.map(str::to_string),
            request_id: "r1".to_string(),
            hint: None,
            scope: None,
            data: Some(data),
            message_type: MessageType::File,
        }
    }

    #[test]
    fn decodes_canonical_object_form() {
        use base64::Engine;
        let encoded = base64::engine::general_purpose::STANDARD.encode(b"hello file");
        let payload = payload_with_data(
            serde_json::json!({"content": encoded, "fileName": "a.txt", "contentType": "text/plain"}),
            None,
        );
        let file = decode_file_payload(&payload).unwrap();
        assert_eq!(file.file_name, "a.txt");
        assert_eq!(file.bytes, b"hello file");
    }

    #[test]
    fn decodes_raw_string_fallback_with_filename_from_text() {
        use base64::Engine;
        let encoded = base64::engine::general_purpose::STANDARD.encode(b"fallback bytes");
        let payload = payload_with_data(Value::String(encoded), Some("legacy.bin"));
        let file = decode_file_payload(&payload).unwrap();
        assert_eq!(file.file_name, "legacy.bin");
        assert_eq!(file.bytes, b"fallback bytes");
    }

    #[test]
    fn invalid_base64_is_a_validation_error() {
        let payload = payload_with_data(serde_json::json!({"content": "not base64 !!!", "fileName": "a.txt"}), None);
        let err = decode_file_payload(&payload).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    struct NullSink {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl ReplySink for NullSink {
        async fn reply(&self, _thread_id: &ThreadId, text: &str, _data: Option<Value>, _hint: Option<String>, _scope: Option<String>) -> Result<()> {
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    struct EchoHandler;

    #[async_trait::async_trait]
    impl MessageHandler for EchoHandler {
        async fn handle(&self, context: UserMessageContext) -> Result<()> {
            let text = context.message().payload.text.clone().unwrap_or_default();
            context.reply_async(&format!("echo: {}", text), None, None, None).await
        }
    }

    #[tokio::test]
    async fn unmatched_message_type_is_dropped_without_error() {
        let mut server = mockito::Server::new_async().await;
        let transport = Arc::new(crate::transport::Transport::new(crate::transport::TransportConfig::new(
            url::Url::parse(&server.url()).unwrap(),
            "cred",
        )));
        let _mock = server
            .mock("GET", "/api/agent/conversation/history")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("[]")
            .create_async()
            .await;

        let history = Arc::new(HistoryClient::new(transport));
        let sink = Arc::new(NullSink { sent: Mutex::new(Vec::new()) });
        let router = MessageRouter::new(history, sink.clone()).on_chat(Arc::new(EchoHandler));

        let inbound = InboundMessage {
            payload: payload_with_data(Value::Null, None),
            source_agent: None,
            source_workflow_id: None,
            source_workflow_type: None,
        };
        router.dispatch(&ExecContext::OutsideEngine, "Docs:Default", inbound).await.unwrap();
        assert!(sink.sent.lock().unwrap().is_empty());
    }
}
