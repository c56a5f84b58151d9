//! Per-thread conversation history fetch and prompt-history construction
//! (§4.6).

use std::sync::Arc;

use crate::error::Result;
use crate::executor::{Context, Executor};
use crate::models::ids::{AgentName, ThreadId};
use crate::models::message::{MessageDirection, StoredMessage};
use crate::transport::Transport;

const HISTORY_PATH: &str = "/api/agent/conversation/history";
const DEFAULT_PAGE_SIZE: u32 = 20;

/// Parameters for a single `getHistory` call.
pub struct HistoryQuery<'a> {
    pub agent: &'a AgentName,
    pub workflow_type: &'a str,
    pub thread_id: &'a ThreadId,
    pub participant_id: &'a str,
    pub scope: Option<&'a str>,
    pub page: u32,
    pub page_size: u32,
}

impl<'a> HistoryQuery<'a> {
    pub fn new(agent: &'a AgentName, workflow_type: &'a str, thread_id: &'a ThreadId, participant_id: &'a str) -> Self {
        Self {
            agent,
            workflow_type,
            thread_id,
            participant_id,
            scope: None,
            page: 0,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_scope(mut self, scope: &'a str) -> Self {
        self.scope = Some(scope);
        self
    }
}

/// A role a prompt message is attributed to, after applying the history
/// construction rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptMessage {
    pub role: Role,
    pub text: String,
}

/// Fetches message pages for a thread. Routes through the executor since
/// it's an I/O-bearing operation (§4.4).
pub struct HistoryClient {
    transport: Arc<Transport>,
    executor: Executor,
}

impl HistoryClient {
    pub fn new(transport: Arc<Transport>) -> Self {
        Self {
            transport,
            executor: Executor::new(),
        }
    }

    /// Fetch one page of history, newest-first, as the server returns it.
    pub async fn get_history(&self, context: &Context, query: HistoryQuery<'_>) -> Result<Vec<StoredMessage>> {
        let page = query.page.to_string();
        let page_size = query.page_size.to_string();
        let mut params: Vec<(&str, &str)> = vec![
            ("agent", query.agent.as_str()),
            ("workflowType", query.workflow_type),
            ("threadId", query.thread_id.as_str()),
            ("participantId", query.participant_id),
            ("page", &page),
            ("pageSize", &page_size),
        ];
        if let Some(scope) = query.scope {
            params.push(("scope", scope));
        }

        let transport = self.transport.clone();
        let params_owned: Vec<(String, String)> = params.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        let transport_b = transport.clone();
        let params_b = params_owned.clone();

        self.executor
            .execute(
                context,
                "messaging.getHistory",
                move || async move { fetch(&transport, &params_owned).await },
                move || async move { fetch(&transport_b, &params_b).await },
            )
            .await
    }
}

async fn fetch(transport: &Transport, params: &[(String, String)]) -> Result<Vec<StoredMessage>> {
    let borrowed: Vec<(&str, &str)> = params.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
    Ok(transport.get_query_with_retry(HISTORY_PATH, &borrowed).await?.unwrap_or_default())
}

/// Build the prompt-ready history from a newest-first page, per §4.6's
/// five-step construction: reverse to oldest-first, drop empty-text
/// messages, drop a duplicate of the current message if it's the newest
/// incoming entry, then map directions onto roles.
pub fn build_prompt_history(newest_first: &[StoredMessage], current_text: Option<&str>) -> Vec<PromptMessage> {
    let newest_is_duplicate = current_text
        .map(|current| {
            newest_first
                .first()
                .map(|m| m.direction == MessageDirection::Incoming && m.text.as_deref() == Some(current))
                .unwrap_or(false)
        })
        .unwrap_or(false);

    let oldest_first: Vec<&StoredMessage> = newest_first.iter().rev().collect();
    let last_index = oldest_first.len().saturating_sub(1);

    oldest_first
        .iter()
        .enumerate()
        .filter_map(|(index, message)| {
            let text = message.text.as_ref().filter(|t| !t.is_empty())?;
            if index == last_index && newest_is_duplicate {
                return None;
            }
            let role = match message.direction {
                MessageDirection::Incoming => Role::User,
                MessageDirection::Outgoing => Role::Assistant,
            };
            Some(PromptMessage {
                role,
                text: text.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(direction: MessageDirection, text: &str) -> StoredMessage {
        StoredMessage {
            direction,
            text: Some(text.to_string()),
            hint: None,
        }
    }

    #[test]
    fn reverses_and_maps_roles() {
        let newest_first = vec![
            message(MessageDirection::Outgoing, "how can I help"),
            message(MessageDirection::Incoming, "hello"),
        ];
        let history = build_prompt_history(&newest_first, None);
        assert_eq!(
            history,
            vec![
                PromptMessage {
                    role: Role::User,
                    text: "hello".to_string()
                },
                PromptMessage {
                    role: Role::Assistant,
                    text: "how can I help".to_string()
                },
            ]
        );
    }

    #[test]
    fn drops_duplicate_of_current_message() {
        let newest_first = vec![
            message(MessageDirection::Incoming, "repeat this"),
            message(MessageDirection::Outgoing, "earlier reply"),
        ];
        let history = build_prompt_history(&newest_first, Some("repeat this"));
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].text, "earlier reply");
    }

    #[test]
    fn drops_empty_text_entries() {
        let newest_first = vec![StoredMessage {
            direction: MessageDirection::Incoming,
            text: Some(String::new()),
            hint: None,
        }];
        assert!(build_prompt_history(&newest_first, None).is_empty());
    }
}
