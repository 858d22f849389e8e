//! Roles: named bundles of permissions, plus the local validation applied
//! before a role write is sent to the remote authority.

use lendora_core::{DomainError, DomainResult, Entity, PermissionId, RoleId};
use serde::{Deserialize, Serialize};

use crate::Permission;

/// Name of the built-in administrator role (compared case-insensitively).
pub const ADMIN_ROLE: &str = "admin";

/// Upper bound on role name length, in characters.
pub const MAX_ROLE_NAME_LEN: usize = 50;

/// A role with its fully embedded permission objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

impl Role {
    pub fn new(id: impl Into<RoleId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            permissions: Vec::new(),
        }
    }

    pub fn with_permissions(mut self, permissions: Vec<Permission>) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Whether this is the protected administrator role.
    pub fn is_admin(&self) -> bool {
        is_admin_name(&self.name)
    }

    /// Whether the role carries a permission with exactly this name.
    pub fn grants(&self, permission_name: &str) -> bool {
        self.permissions.iter().any(|p| p.name == permission_name)
    }

    /// The admin role is never deletable.
    pub fn ensure_deletable(&self) -> DomainResult<()> {
        if self.is_admin() {
            return Err(DomainError::invariant("the admin role cannot be deleted"));
        }
        Ok(())
    }
}

impl Entity for Role {
    type Id = RoleId;

    fn id(&self) -> &RoleId {
        &self.id
    }
}

pub(crate) fn is_admin_name(name: &str) -> bool {
    name.trim().eq_ignore_ascii_case(ADMIN_ROLE)
}

/// Payload for creating a role. The server assigns the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleDraft {
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "permissions")]
    pub permission_ids: Vec<PermissionId>,
}

impl RoleDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            permission_ids: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_permissions<I, P>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PermissionId>,
    {
        self.permission_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Validate against the roles currently known locally.
    ///
    /// Returns the draft with its name trimmed.
    pub fn validated(mut self, existing: &[Role]) -> DomainResult<Self> {
        self.name = validate_role_name(&self.name, existing, None)?;
        Ok(self)
    }
}

/// Partial update of a role. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RolePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "permissions", skip_serializing_if = "Option::is_none")]
    pub permission_ids: Option<Vec<PermissionId>>,
}

impl RolePatch {
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_permissions<I, P>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PermissionId>,
    {
        self.permission_ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    /// Validate a rename against the other roles known locally.
    pub fn validated(mut self, role_id: &RoleId, existing: &[Role]) -> DomainResult<Self> {
        if let Some(name) = self.name.take() {
            self.name = Some(validate_role_name(&name, existing, Some(role_id))?);
        }
        Ok(self)
    }

    /// Merge the patch into `role`.
    ///
    /// `permissions` are the patch's permission ids already resolved to full
    /// objects; it is ignored when the patch does not touch permissions.
    pub fn apply_to(&self, role: &mut Role, permissions: Vec<Permission>) {
        if let Some(name) = &self.name {
            role.name = name.clone();
        }
        if let Some(description) = &self.description {
            role.description = Some(description.clone());
        }
        if self.permission_ids.is_some() {
            role.permissions = permissions;
        }
    }
}

/// Check a role name: non-empty after trimming, at most
/// [`MAX_ROLE_NAME_LEN`] characters, and case-insensitively unique among
/// `existing` (ignoring the role identified by `exclude`).
pub fn validate_role_name(
    name: &str,
    existing: &[Role],
    exclude: Option<&RoleId>,
) -> DomainResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation("role name is required"));
    }
    if trimmed.chars().count() > MAX_ROLE_NAME_LEN {
        return Err(DomainError::validation(format!(
            "role name must be at most {MAX_ROLE_NAME_LEN} characters"
        )));
    }

    let wanted = trimmed.to_lowercase();
    let taken = existing
        .iter()
        .filter(|role| Some(&role.id) != exclude)
        .any(|role| role.name.trim().to_lowercase() == wanted);
    if taken {
        return Err(DomainError::conflict(format!("a role named '{trimmed}' already exists")));
    }

    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> Role {
        Role::new("r1", "manager")
    }

    #[test]
    fn duplicate_name_is_case_insensitive() {
        let result = RoleDraft::new("Manager").validated(&[manager()]);
        assert!(matches!(result, Err(DomainError::Conflict(_))));
    }

    #[test]
    fn blank_and_long_names_rejected() {
        assert!(matches!(
            validate_role_name("   ", &[], None),
            Err(DomainError::Validation(_))
        ));

        let long = "x".repeat(MAX_ROLE_NAME_LEN + 1);
        assert!(matches!(
            validate_role_name(&long, &[], None),
            Err(DomainError::Validation(_))
        ));

        let exact = "x".repeat(MAX_ROLE_NAME_LEN);
        assert_eq!(validate_role_name(&exact, &[], None).unwrap(), exact);
    }

    #[test]
    fn rename_to_own_name_is_allowed() {
        let role = manager();
        let patch = RolePatch::rename(" MANAGER ").validated(&role.id, &[role.clone()]).unwrap();
        assert_eq!(patch.name.as_deref(), Some("MANAGER"));
    }

    #[test]
    fn admin_role_is_protected() {
        assert!(Role::new("r0", "Admin").ensure_deletable().is_err());
        assert!(manager().ensure_deletable().is_ok());
    }

    #[test]
    fn patch_leaves_untouched_fields() {
        let mut role = manager()
            .with_description("ops")
            .with_permissions(vec![Permission::new("p1", "view_customers")]);

        RolePatch::rename("lead").apply_to(&mut role, Vec::new());

        assert_eq!(role.name, "lead");
        assert_eq!(role.description.as_deref(), Some("ops"));
        assert_eq!(role.permissions.len(), 1);
    }

    #[test]
    fn draft_serializes_permission_ids() {
        let draft = RoleDraft::new("auditor").with_permissions(["p1", "p2"]);
        let body = serde_json::to_value(&draft).unwrap();
        assert_eq!(body["permissions"], serde_json::json!(["p1", "p2"]));
        assert_eq!(body["description"], serde_json::Value::Null);
    }
}
