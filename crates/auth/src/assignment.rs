use chrono::{DateTime, Utc};
use lendora_core::{AssignmentId, RoleId, UserId};
use serde::{Deserialize, Serialize};

use crate::Role;

/// Edge linking a user to a role, with provenance.
///
/// All references are canonical ids; the wire may embed objects instead, but
/// that ambiguity is resolved by [`crate::reference`] on ingress. A full role
/// embedded in the wire record is kept on this edge only; other assignments
/// naming the same role id still resolve through the roles collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRoleAssignment {
    /// Server-assigned id; `None` while the assignment is optimistic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<AssignmentId>,
    pub user_id: UserId,
    pub role_id: RoleId,
    pub assigned_by: UserId,
    pub assigned_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedded_role: Option<Role>,
}

impl UserRoleAssignment {
    /// An unconfirmed assignment synthesised locally before the server answers.
    pub fn optimistic(request: &AssignmentRequest, assigned_at: DateTime<Utc>) -> Self {
        Self {
            id: None,
            user_id: request.user_id.clone(),
            role_id: request.role_id.clone(),
            assigned_by: request.assigned_by.clone(),
            assigned_at,
            embedded_role: None,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.id.is_some()
    }

    pub fn with_embedded_role(mut self, role: Role) -> Self {
        self.embedded_role = Some(role);
        self
    }

    pub fn links(&self, user_id: &UserId, role_id: &RoleId) -> bool {
        &self.user_id == user_id && &self.role_id == role_id
    }
}

/// Body of an assign-role request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentRequest {
    pub user_id: UserId,
    pub role_id: RoleId,
    pub assigned_by: UserId,
}

impl AssignmentRequest {
    pub fn new(
        user_id: impl Into<UserId>,
        role_id: impl Into<RoleId>,
        assigned_by: impl Into<UserId>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            role_id: role_id.into(),
            assigned_by: assigned_by.into(),
        }
    }
}
