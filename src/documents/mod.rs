//! Document Store client (SPEC_FULL §4.12, ambient from spec.md §6's
//! endpoint table): a thin REST-RPC client over `/api/agent/documents/*`,
//! routed through the Context-Aware Executor like every other I/O-bearing
//! client in this crate.
//!
//! Grounded on `sdk/rust/src/resources.rs`'s `ResourceClient` (create/get/
//! list/execute-activity CRUD-over-a-single-collection shape), adapted from
//! GraphQL calls to the plain JSON-POST endpoints spec.md §6 actually lists
//! for documents (`save`, `get`, `get-by-key`, `query`, `update`, `delete`,
//! `delete-many`, `exists` — every one a POST, not a REST-verb split).

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::Result;
use crate::executor::{Context as ExecContext, Executor};
use crate::models::ids::{AgentName, TenantId};
use crate::transport::Transport;

const BASE_PATH: &str = "/api/agent/documents";

/// An opaque document: an agent-scoped JSON blob addressable by id or an
/// optional caller-assigned key. Schema of `data` is caller-defined — the
/// store itself is untyped, mirroring the teacher's `config: serde_json::
/// Value` field on `ResourceData`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub agent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    pub data: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SaveRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    key: Option<&'a str>,
    agent: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    tenant_id: Option<&'a str>,
    data: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct IdRequest {
    id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct KeyRequest<'a> {
    key: &'a str,
    agent: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateRequest {
    id: Uuid,
    data: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct IdsRequest {
    ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DocumentQuery {
    pub agent: Option<String>,
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub filter: Value,
}

/// Client over the document-store endpoints, scoped to one agent.
pub struct DocumentStore {
    transport: Arc<Transport>,
    executor: Executor,
    agent: AgentName,
}

impl DocumentStore {
    pub fn new(transport: Arc<Transport>, agent: AgentName) -> Self {
        Self {
            transport,
            executor: Executor::new(),
            agent,
        }
    }

    pub async fn save(&self, context: &ExecContext, key: Option<&str>, tenant_id: Option<&TenantId>, data: Value) -> Result<Document> {
        let body = SaveRequest {
            key,
            agent: self.agent.as_str(),
            tenant_id: tenant_id.map(|t| t.as_str()),
            data,
        };
        let path = format!("{}/save", BASE_PATH);
        self.post(context, "documents.save", &path, &body).await
    }

    pub async fn get(&self, context: &ExecContext, id: Uuid) -> Result<Option<Document>> {
        let path = format!("{}/get", BASE_PATH);
        self.post_optional(context, "documents.get", &path, &IdRequest { id }).await
    }

    pub async fn get_by_key(&self, context: &ExecContext, key: &str) -> Result<Option<Document>> {
        let path = format!("{}/get-by-key", BASE_PATH);
        self.post_optional(
            context,
            "documents.getByKey",
            &path,
            &KeyRequest {
                key,
                agent: self.agent.as_str(),
            },
        )
        .await
    }

    pub async fn query(&self, context: &ExecContext, filter: Value) -> Result<Vec<Document>> {
        let path = format!("{}/query", BASE_PATH);
        let body = DocumentQuery {
            agent: Some(self.agent.as_str().to_string()),
            tenant_id: None,
            filter,
        };
        Ok(self.post::<_, Option<Vec<Document>>>(context, "documents.query", &path, &body).await?.unwrap_or_default())
    }

    pub async fn update(&self, context: &ExecContext, id: Uuid, data: Value) -> Result<Document> {
        let path = format!("{}/update", BASE_PATH);
        self.post(context, "documents.update", &path, &UpdateRequest { id, data }).await
    }

    /// `true` on success, `false` if no document matched `id` (§4.11's
    /// "NotFound -> null/absent" convention, mirrored for deletes).
    pub async fn delete(&self, context: &ExecContext, id: Uuid) -> Result<bool> {
        let path = format!("{}/delete", BASE_PATH);
        self.post(context, "documents.delete", &path, &IdRequest { id }).await
    }

    pub async fn delete_many(&self, context: &ExecContext, ids: Vec<Uuid>) -> Result<u64> {
        let path = format!("{}/delete-many", BASE_PATH);
        self.post(context, "documents.deleteMany", &path, &IdsRequest { ids }).await
    }

    pub async fn exists(&self, context: &ExecContext, id: Uuid) -> Result<bool> {
        let path = format!("{}/exists", BASE_PATH);
        self.post(context, "documents.exists", &path, &IdRequest { id }).await
    }

    async fn post<B: Serialize, T: for<'de> Deserialize<'de>>(&self, context: &ExecContext, op: &str, path: &str, body: &B) -> Result<T> {
        let transport = self.transport.clone();
        let transport_b = self.transport.clone();
        let path_a = path.to_string();
        let path_b = path.to_string();
        let body_a = serde_json::to_value(body)?;
        let body_b = body_a.clone();

        self.executor
            .execute(
                context,
                op,
                move || async move { transport.post_with_retry(&path_a, &body_a).await },
                move || async move { transport_b.post_with_retry(&path_b, &body_b).await },
            )
            .await
    }

    async fn post_optional<B: Serialize>(&self, context: &ExecContext, op: &str, path: &str, body: &B) -> Result<Option<Document>> {
        // POST-shaped RPC, but a JSON `null` body still deserializes to
        // `None` the same way a REST 404 does elsewhere in this crate.
        let transport = self.transport.clone();
        let transport_b = self.transport.clone();
        let path_a = path.to_string();
        let path_b = path.to_string();
        let body_a = serde_json::to_value(body)?;
        let body_b = body_a.clone();

        self.executor
            .execute(
                context,
                op,
                move || async move { transport.post_with_retry::<_, Option<Document>>(&path_a, &body_a).await },
                move || async move { transport_b.post_with_retry::<_, Option<Document>>(&path_b, &body_b).await },
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn store(base_url: &str) -> DocumentStore {
        let transport = Arc::new(Transport::new(crate::transport::TransportConfig::new(Url::parse(base_url).unwrap(), "cred")));
        DocumentStore::new(transport, AgentName::new("Docs"))
    }

    #[tokio::test]
    async fn save_posts_to_the_save_endpoint() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/agent/documents/save")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"00000000-0000-0000-0000-000000000001","agent":"Docs","data":{"a":1}}"#)
            .create_async()
            .await;

        let store = store(&server.url());
        let doc = store
            .save(&ExecContext::OutsideEngine, Some("k1"), None, serde_json::json!({"a": 1}))
            .await
            .unwrap();
        assert_eq!(doc.agent, "Docs");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn exists_reflects_server_boolean() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/agent/documents/exists")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("true")
            .create_async()
            .await;

        let store = store(&server.url());
        let exists = store.exists(&ExecContext::OutsideEngine, Uuid::nil()).await.unwrap();
        assert!(exists);
        mock.assert_async().await;
    }
}
