use serde::Serialize;
use thiserror::Error;

use lendora_core::UserId;

use crate::roles::is_admin_name;
use crate::{AuthzCatalog, resolver};

/// The acting user, as reported by the session collaborator.
///
/// `session_role` is the role name carried by the session itself (if any);
/// it is consulted for the admin bypass only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub session_role: Option<String>,
}

impl Principal {
    pub fn new(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            session_role: None,
        }
    }

    pub fn with_session_role(mut self, role: impl Into<String>) -> Self {
        self.session_role = Some(role.into());
        self
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Permission checks with the admin bypass applied in front of the resolver.
///
/// This is a UI convenience layer, not a security boundary: the remote
/// authority enforces access on its own.
#[derive(Debug, Clone, Copy)]
pub struct AccessGuard<'a> {
    catalog: &'a AuthzCatalog,
}

impl<'a> AccessGuard<'a> {
    pub fn new(catalog: &'a AuthzCatalog) -> Self {
        Self { catalog }
    }

    /// Admin via the session role or via an assigned role named `admin`.
    pub fn is_admin(&self, principal: &Principal) -> bool {
        is_admin_session(principal)
            || resolver::get_user_roles(self.catalog, &principal.user_id)
                .iter()
                .any(|role| role.is_admin())
    }

    pub fn has_permission(&self, principal: &Principal, permission_name: &str) -> bool {
        self.is_admin(principal)
            || resolver::has_permission(self.catalog, &principal.user_id, permission_name)
    }

    pub fn can_access(&self, principal: &Principal, resource: &str, action: &str) -> bool {
        self.is_admin(principal)
            || resolver::can_access(self.catalog, &principal.user_id, resource, action)
    }

    /// Same as [`Self::has_permission`], as a `Result` for `?` call sites.
    ///
    /// - No IO
    /// - No panics
    pub fn authorize(&self, principal: &Principal, permission_name: &str) -> Result<(), AuthzError> {
        if self.has_permission(principal, permission_name) {
            Ok(())
        } else {
            Err(AuthzError::Forbidden(permission_name.to_string()))
        }
    }

    /// Explain why a check would pass or fail.
    pub fn explain(&self, principal: &Principal, permission_name: &str) -> AccessExplanation {
        let assigned = resolver::get_user_roles(self.catalog, &principal.user_id);

        let reason = if is_admin_session(principal) || assigned.iter().any(|role| role.is_admin()) {
            AccessReason::AdminBypass
        } else if let Some(role) = assigned.iter().find(|role| role.grants(permission_name)) {
            AccessReason::GrantedByRole(role.name.clone())
        } else {
            AccessReason::Missing
        };

        AccessExplanation {
            permission: permission_name.to_string(),
            granted: reason != AccessReason::Missing,
            roles: assigned.iter().map(|role| role.name.clone()).collect(),
            reason,
        }
    }
}

fn is_admin_session(principal: &Principal) -> bool {
    principal.session_role.as_deref().is_some_and(is_admin_name)
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization Explanation
// ─────────────────────────────────────────────────────────────────────────────

/// Why a permission check came out the way it did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "role")]
pub enum AccessReason {
    /// The principal is an administrator; nothing else was consulted.
    AdminBypass,
    /// The first assigned role that carries the permission.
    GrantedByRole(String),
    /// No assigned role carries the permission.
    Missing,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccessExplanation {
    pub permission: String,
    pub granted: bool,
    pub reason: AccessReason,
    /// Names of the principal's resolved roles, in assignment order.
    pub roles: Vec<String>,
}
