//! The three authorization collections as one value.

use lendora_core::{PermissionId, RoleId, UserId};
use serde::{Deserialize, Serialize};

use crate::{Permission, Role, UserRoleAssignment};

/// Snapshot of everything the resolver reads.
///
/// Roles that arrived embedded inside assignments live on those assignments
/// (see [`UserRoleAssignment::embedded_role`]), not in `roles`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthzCatalog {
    pub permissions: Vec<Permission>,
    pub roles: Vec<Role>,
    pub assignments: Vec<UserRoleAssignment>,
}

impl AuthzCatalog {
    pub fn new(
        permissions: Vec<Permission>,
        roles: Vec<Role>,
        assignments: Vec<UserRoleAssignment>,
    ) -> Self {
        Self {
            permissions,
            roles,
            assignments,
        }
    }

    pub fn role(&self, role_id: &RoleId) -> Option<&Role> {
        self.roles.iter().find(|role| &role.id == role_id)
    }

    pub fn role_mut(&mut self, role_id: &RoleId) -> Option<&mut Role> {
        self.roles.iter_mut().find(|role| &role.id == role_id)
    }

    /// Copies of `role_id` embedded in assignments.
    pub fn embedded_copies_mut<'a>(
        &'a mut self,
        role_id: &'a RoleId,
    ) -> impl Iterator<Item = &'a mut Role> + 'a {
        self.assignments
            .iter_mut()
            .filter_map(|a| a.embedded_role.as_mut())
            .filter(move |role| &role.id == role_id)
    }

    /// Resolve permission ids to known permission objects, in request order.
    /// Unknown ids are dropped.
    pub fn resolve_permissions(&self, ids: &[PermissionId]) -> Vec<Permission> {
        ids.iter()
            .filter_map(|id| self.permissions.iter().find(|p| &p.id == id))
            .cloned()
            .collect()
    }

    /// Remove a role together with every assignment pointing at it.
    ///
    /// Returns the number of assignments removed.
    pub fn remove_role(&mut self, role_id: &RoleId) -> usize {
        self.roles.retain(|role| &role.id != role_id);
        let before = self.assignments.len();
        self.assignments.retain(|a| &a.role_id != role_id);
        before - self.assignments.len()
    }

    /// Remove every assignment linking `user_id` to `role_id`.
    pub fn remove_assignment(&mut self, user_id: &UserId, role_id: &RoleId) -> usize {
        let before = self.assignments.len();
        self.assignments.retain(|a| !a.links(user_id, role_id));
        before - self.assignments.len()
    }

    /// Insert an assignment, dropping any existing one for the same pair first.
    pub fn put_assignment(&mut self, assignment: UserRoleAssignment) {
        self.remove_assignment(&assignment.user_id, &assignment.role_id);
        self.assignments.push(assignment);
    }

    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty() && self.roles.is_empty() && self.assignments.is_empty()
    }
}
