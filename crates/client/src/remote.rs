//! Boundary to the remote authorization authority.
//!
//! Payloads stay raw JSON here; shape normalization belongs to
//! [`lendora_auth::reference`], so every transport gets the same tolerance.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use lendora_auth::{AssignmentRequest, RoleDraft, RolePatch};
use lendora_core::{RoleId, UserId};

use crate::error::RemoteError;

#[async_trait]
pub trait RemoteAuthority: Send + Sync {
    /// `GET /permissions`
    async fn list_permissions(&self) -> Result<Value, RemoteError>;

    /// `GET /roles`
    async fn list_roles(&self) -> Result<Value, RemoteError>;

    /// `GET /user-roles`
    async fn list_user_roles(&self) -> Result<Value, RemoteError>;

    /// `POST /roles`
    async fn create_role(&self, draft: &RoleDraft) -> Result<Value, RemoteError>;

    /// `PUT /roles/{id}`
    async fn update_role(&self, role_id: &RoleId, patch: &RolePatch) -> Result<Value, RemoteError>;

    /// `DELETE /roles/{id}`
    async fn delete_role(&self, role_id: &RoleId) -> Result<(), RemoteError>;

    /// `POST /user-roles`
    async fn assign_role(&self, request: &AssignmentRequest) -> Result<Value, RemoteError>;

    /// `DELETE /user-roles` with `{userId, roleId}` in the body.
    async fn remove_role(&self, user_id: &UserId, role_id: &RoleId) -> Result<(), RemoteError>;
}

#[async_trait]
impl<T> RemoteAuthority for Arc<T>
where
    T: RemoteAuthority + ?Sized,
{
    async fn list_permissions(&self) -> Result<Value, RemoteError> {
        (**self).list_permissions().await
    }

    async fn list_roles(&self) -> Result<Value, RemoteError> {
        (**self).list_roles().await
    }

    async fn list_user_roles(&self) -> Result<Value, RemoteError> {
        (**self).list_user_roles().await
    }

    async fn create_role(&self, draft: &RoleDraft) -> Result<Value, RemoteError> {
        (**self).create_role(draft).await
    }

    async fn update_role(&self, role_id: &RoleId, patch: &RolePatch) -> Result<Value, RemoteError> {
        (**self).update_role(role_id, patch).await
    }

    async fn delete_role(&self, role_id: &RoleId) -> Result<(), RemoteError> {
        (**self).delete_role(role_id).await
    }

    async fn assign_role(&self, request: &AssignmentRequest) -> Result<Value, RemoteError> {
        (**self).assign_role(request).await
    }

    async fn remove_role(&self, user_id: &UserId, role_id: &RoleId) -> Result<(), RemoteError> {
        (**self).remove_role(user_id, role_id).await
    }
}
