//! Metrics & Usage Reporting (§4.9): a fluent builder that auto-populates
//! context from a message context and/or the current execution context,
//! then posts a structured usage event. Failures are swallowed (logged
//! WARN) — usage reporting must never surface an error to the caller.
//!
//! Grounded on `messaging::` for the context shapes it reads from
//! (`UserMessageContext`, `MessageOrigin`, `executor::WorkflowExecutionContext`)
//! and on `transport::Transport::post_with_retry` for the actual HTTP call —
//! the same REST-facade pattern every other ambient client in this crate
//! uses.

use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::error::{Error, Result};
use crate::executor::WorkflowExecutionContext;
use crate::messaging::context::{MessageOrigin, UserMessageContext};
use crate::models::ids::{AgentName, TenantId};
use crate::models::{UsageEvent, UsageMetric};
use crate::settings::Settings;
use crate::transport::Transport;

const USAGE_REPORT_PATH: &str = "/api/agent/usage/report";

/// Posts usage events. One instance per platform/transport pairing, the
/// same sharing shape as `Transport` itself.
pub struct Metrics {
    transport: Arc<Transport>,
    settings: Option<Arc<Settings>>,
}

impl Metrics {
    pub fn new(transport: Arc<Transport>) -> Self {
        Self {
            transport,
            settings: None,
        }
    }

    /// Attach a `Settings` handle so `tenant_id` can fall back to the
    /// credential-derived identity when neither an explicit override nor
    /// the execution context supplies one.
    pub fn with_settings(mut self, settings: Arc<Settings>) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn report(&self) -> ReportBuilder<'_> {
        ReportBuilder {
            metrics: self,
            tenant_id: None,
            participant_id: None,
            workflow_id: None,
            workflow_type: None,
            request_id: None,
            agent_name: None,
            activation_name: None,
            model: None,
            custom_identifier: None,
            metadata: None,
            items: Vec::new(),
        }
    }
}

/// Fluent usage-report builder. Every field can be set explicitly, or
/// auto-populated from a message context / execution context; explicit
/// values always win (§4.9's resolution order).
pub struct ReportBuilder<'a> {
    metrics: &'a Metrics,
    tenant_id: Option<TenantId>,
    participant_id: Option<String>,
    workflow_id: Option<String>,
    workflow_type: Option<String>,
    request_id: Option<String>,
    agent_name: Option<AgentName>,
    activation_name: Option<String>,
    model: Option<String>,
    custom_identifier: Option<String>,
    metadata: Option<Value>,
    items: Vec<UsageMetric>,
}

impl<'a> ReportBuilder<'a> {
    /// Populate `participantId`, `requestId`, and (if the message is an A2A
    /// dispatch) `workflowId`/`workflowType` from the target, not the
    /// sender (§4.6's "A2A context" note, §9).
    pub fn from_message_context(mut self, context: &UserMessageContext) -> Self {
        let payload = &context.message().payload;
        if self.participant_id.is_none() {
            self.participant_id = Some(payload.participant_id.clone());
        }
        if self.request_id.is_none() {
            self.request_id = Some(payload.request_id.clone());
        }
        if self.agent_name.is_none() {
            self.agent_name = Some(payload.agent.clone());
        }
        if let MessageOrigin::A2A {
            target_workflow_id,
            target_workflow_type,
        } = context.origin()
        {
            if self.workflow_id.is_none() {
                self.workflow_id = Some(target_workflow_id.as_str().to_string());
            }
            if self.workflow_type.is_none() {
                self.workflow_type = Some(target_workflow_type.clone());
            }
        }
        self
    }

    /// Populate `tenantId`, `agentName`, and (absent an A2A target already
    /// set) `workflowId` from the current workflow's execution context.
    pub fn from_execution_context(mut self, context: &WorkflowExecutionContext) -> Self {
        if self.tenant_id.is_none() {
            self.tenant_id = Some(context.tenant_id.clone());
        }
        if self.agent_name.is_none() {
            self.agent_name = Some(context.agent_name.clone());
        }
        if self.workflow_id.is_none() {
            self.workflow_id = Some(context.workflow_id.as_str().to_string());
        }
        self
    }

    pub fn tenant_id(mut self, tenant_id: TenantId) -> Self {
        self.tenant_id = Some(tenant_id);
        self
    }

    pub fn participant_id(mut self, participant_id: impl Into<String>) -> Self {
        self.participant_id = Some(participant_id.into());
        self
    }

    pub fn workflow_id(mut self, workflow_id: impl Into<String>) -> Self {
        self.workflow_id = Some(workflow_id.into());
        self
    }

    pub fn workflow_type(mut self, workflow_type: impl Into<String>) -> Self {
        self.workflow_type = Some(workflow_type.into());
        self
    }

    pub fn request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn agent_name(mut self, agent_name: AgentName) -> Self {
        self.agent_name = Some(agent_name);
        self
    }

    pub fn activation_name(mut self, activation_name: impl Into<String>) -> Self {
        self.activation_name = Some(activation_name.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn custom_identifier(mut self, custom_identifier: impl Into<String>) -> Self {
        self.custom_identifier = Some(custom_identifier.into());
        self
    }

    pub fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn metric(mut self, category: impl Into<String>, metric_type: impl Into<String>, value: f64, unit: impl Into<String>) -> Self {
        self.items.push(UsageMetric {
            category: category.into(),
            metric_type: metric_type.into(),
            value,
            unit: unit.into(),
        });
        self
    }

    fn resolve(self) -> Result<UsageEvent> {
        let tenant_id = match self.tenant_id {
            Some(t) => Some(t),
            None => self
                .metrics
                .settings
                .as_ref()
                .and_then(|s| s.identity().ok())
                .and_then(|identity| identity.tenant_id),
        }
        .ok_or_else(|| Error::validation("usage report requires a tenantId"))?;

        let agent_name = self.agent_name.ok_or_else(|| Error::validation("usage report requires an agentName"))?;
        let workflow_id = self.workflow_id.ok_or_else(|| Error::validation("usage report requires a workflowId"))?;
        let workflow_type = self.workflow_type.unwrap_or_else(|| workflow_id.clone());
        let request_id = self.request_id.ok_or_else(|| Error::validation("usage report requires a requestId"))?;
        let participant_id = self.participant_id.unwrap_or_default();

        Ok(UsageEvent {
            tenant_id: tenant_id.into_inner(),
            participant_id,
            workflow_id,
            request_id,
            workflow_type,
            agent_name: agent_name.into_inner(),
            activation_name: self.activation_name,
            model: self.model,
            custom_identifier: self.custom_identifier,
            metrics: self.items,
            metadata: self.metadata,
        })
    }

    /// Resolve the event and POST it. Failures of any kind — resolution
    /// errors, transport errors, server errors — are logged at WARN and
    /// swallowed; usage reporting is never allowed to fail the caller's
    /// turn (§4.9, §7).
    pub async fn report_async(self) {
        let transport = self.metrics.transport.clone();
        let event = match self.resolve() {
            Ok(event) => event,
            Err(err) => {
                warn!(error = %err, "dropping usage report: could not resolve event");
                return;
            }
        };

        let headers = crate::transport::tenant_header_map(&event.tenant_id);
        if let Err(err) = transport
            .post_with_retry_headers::<_, Value>(USAGE_REPORT_PATH, &event, &headers)
            .await
        {
            warn!(error = %err, workflow_id = %event.workflow_id, "usage report failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ids::{AgentName, ThreadId};
    use crate::models::message::{InboundMessage, MessagePayload, MessageType};
    use crate::models::WorkflowId;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;
    use url::Url;

    fn sample_message() -> InboundMessage {
        InboundMessage {
            payload: MessagePayload {
                agent: AgentName::new("Supervisor"),
                thread_id: ThreadId::new("t1"),
                participant_id: "user-1".to_string(),
                text: Some("hi".to_string()),
                request_id: "req-1".to_string(),
                hint: None,
                scope: None,
                data: None,
                message_type: MessageType::Chat,
            },
            source_agent: Some(AgentName::new("Web Search")),
            source_workflow_id: Some("acme:WebSearch:Web".to_string()),
            source_workflow_type: Some("WebSearch:Web".to_string()),
        }
    }

    struct NullSink;
    #[async_trait]
    impl crate::messaging::context::ReplySink for NullSink {
        async fn reply(&self, _t: &ThreadId, _text: &str, _d: Option<Value>, _h: Option<String>, _s: Option<String>) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn a2a_message_attributes_to_target_workflow() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/agent/usage/report")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("{}")
            .create_async()
            .await;

        let transport = Arc::new(Transport::new(crate::transport::TransportConfig::new(Url::parse(&server.url()).unwrap(), "cred")));
        let metrics = Metrics::new(transport.clone());

        let inbound = sample_message();
        let origin = MessageOrigin::A2A {
            target_workflow_id: WorkflowId::from(inbound.source_workflow_id.clone().unwrap()),
            target_workflow_type: inbound.source_workflow_type.clone().unwrap(),
        };
        let ctx = UserMessageContext::new(inbound, ThreadId::new("t1"), origin, Vec::new(), Arc::new(NullSink));

        metrics
            .report()
            .from_message_context(&ctx)
            .tenant_id(TenantId::new("acme"))
            .metric("llm", "tokens", 120.0, "count")
            .report_async()
            .await;

        mock.assert_async().await;
        let _ = StdMutex::new(0);
    }

    #[tokio::test]
    async fn resolution_failure_is_swallowed_not_propagated() {
        let transport = Arc::new(Transport::new(crate::transport::TransportConfig::new(Url::parse("http://localhost:1").unwrap(), "cred")));
        let metrics = Metrics::new(transport);
        // No tenant/agent/workflow set at all: resolve() fails, report_async
        // must not panic or return an error (there is nothing to return).
        metrics.report().report_async().await;
    }
}
