//! reqwest-backed [`RemoteAuthority`].

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use lendora_auth::{AssignmentRequest, RoleDraft, RolePatch};
use lendora_core::{RoleId, UserId};

use crate::config::ClientConfig;
use crate::error::RemoteError;
use crate::remote::RemoteAuthority;

/// Supplies the session's bearer token per request.
///
/// Owned by the session collaborator; the authority only asks for the
/// current value and sends no `Authorization` header when there is none.
pub trait TokenSource: Send + Sync {
    fn bearer_token(&self) -> Option<String>;
}

/// A token fixed at construction time.
#[derive(Debug, Clone, Default)]
pub struct StaticToken(pub Option<String>);

impl TokenSource for StaticToken {
    fn bearer_token(&self) -> Option<String> {
        self.0.clone()
    }
}

#[derive(Clone)]
pub struct HttpAuthority {
    client: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenSource>,
}

impl HttpAuthority {
    pub fn new(config: &ClientConfig) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            tokens: Arc::new(StaticToken(config.auth_token.clone())),
        })
    }

    pub fn with_token_source(mut self, tokens: Arc<dyn TokenSource>) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value, RemoteError> {
        let request = match self.tokens.bearer_token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        if !status.is_success() {
            tracing::debug!(status = status.as_u16(), "remote authority rejected request");
            return Err(RemoteError::from_response(status.as_u16(), &body));
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| RemoteError::Decode(e.to_string()))
    }
}

impl core::fmt::Debug for HttpAuthority {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HttpAuthority")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl RemoteAuthority for HttpAuthority {
    async fn list_permissions(&self) -> Result<Value, RemoteError> {
        self.send(self.client.get(self.url("/permissions"))).await
    }

    async fn list_roles(&self) -> Result<Value, RemoteError> {
        self.send(self.client.get(self.url("/roles"))).await
    }

    async fn list_user_roles(&self) -> Result<Value, RemoteError> {
        self.send(self.client.get(self.url("/user-roles"))).await
    }

    async fn create_role(&self, draft: &RoleDraft) -> Result<Value, RemoteError> {
        self.send(self.client.post(self.url("/roles")).json(draft)).await
    }

    async fn update_role(&self, role_id: &RoleId, patch: &RolePatch) -> Result<Value, RemoteError> {
        let url = self.url(&format!("/roles/{role_id}"));
        self.send(self.client.put(url).json(patch)).await
    }

    async fn delete_role(&self, role_id: &RoleId) -> Result<(), RemoteError> {
        let url = self.url(&format!("/roles/{role_id}"));
        self.send(self.client.delete(url)).await.map(|_| ())
    }

    async fn assign_role(&self, request: &AssignmentRequest) -> Result<Value, RemoteError> {
        self.send(self.client.post(self.url("/user-roles")).json(request))
            .await
    }

    async fn remove_role(&self, user_id: &UserId, role_id: &RoleId) -> Result<(), RemoteError> {
        let body = json!({ "userId": user_id, "roleId": role_id });
        self.send(self.client.delete(self.url("/user-roles")).json(&body))
            .await
            .map(|_| ())
    }
}
