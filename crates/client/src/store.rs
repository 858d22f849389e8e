//! Authorization store: the shared, observable copy of the catalog.
//!
//! One explicitly constructed handle per consumer; clones share state. The
//! lock is a plain `std` lock and is never held across an `.await`.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;

use lendora_auth::{AuthzCatalog, Permission, Role, UserRoleAssignment, resolver};
use lendora_core::{RoleId, UserId};

/// The five optimistic writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    CreateRole,
    UpdateRole,
    DeleteRole,
    AssignRole,
    RemoveRole,
}

impl MutationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationKind::CreateRole => "create_role",
            MutationKind::UpdateRole => "update_role",
            MutationKind::DeleteRole => "delete_role",
            MutationKind::AssignRole => "assign_role",
            MutationKind::RemoveRole => "remove_role",
        }
    }
}

impl core::fmt::Display for MutationKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// In-flight operation counts. Counters rather than flags so overlapping
/// operations of one kind do not clear each other's indicator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BusyState {
    pub loading: usize,
    pub creating: usize,
    pub updating: usize,
    pub deleting: usize,
    pub assigning: usize,
    pub removing: usize,
}

impl BusyState {
    pub fn is_loading(&self) -> bool {
        self.loading > 0
    }

    pub fn is_mutating(&self, kind: MutationKind) -> bool {
        self.mutation_count(kind) > 0
    }

    pub fn is_idle(&self) -> bool {
        *self == BusyState::default()
    }

    pub fn mutation_count(&self, kind: MutationKind) -> usize {
        match kind {
            MutationKind::CreateRole => self.creating,
            MutationKind::UpdateRole => self.updating,
            MutationKind::DeleteRole => self.deleting,
            MutationKind::AssignRole => self.assigning,
            MutationKind::RemoveRole => self.removing,
        }
    }

    fn counter_mut(&mut self, activity: Activity) -> &mut usize {
        match activity {
            Activity::Load => &mut self.loading,
            Activity::Mutation(MutationKind::CreateRole) => &mut self.creating,
            Activity::Mutation(MutationKind::UpdateRole) => &mut self.updating,
            Activity::Mutation(MutationKind::DeleteRole) => &mut self.deleting,
            Activity::Mutation(MutationKind::AssignRole) => &mut self.assigning,
            Activity::Mutation(MutationKind::RemoveRole) => &mut self.removing,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Activity {
    Load,
    Mutation(MutationKind),
}

/// Collections an optimistic write may touch and therefore must snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Nothing,
    Roles,
    Assignments,
    RolesAndAssignments,
}

impl Scope {
    fn roles(self) -> bool {
        matches!(self, Scope::Roles | Scope::RolesAndAssignments)
    }

    fn assignments(self) -> bool {
        matches!(self, Scope::Assignments | Scope::RolesAndAssignments)
    }
}

/// Bumped every time a load replaces a collection wholesale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Revisions {
    permissions: u64,
    roles: u64,
    assignments: u64,
}

#[derive(Debug, Default)]
struct StoreState {
    catalog: AuthzCatalog,
    revisions: Revisions,
    busy: BusyState,
    last_error: Option<String>,
}

/// Pre-mutation copy of the collections in a [`Scope`].
#[derive(Debug, Clone)]
pub struct StoreSnapshot {
    scope: Scope,
    roles: Vec<Role>,
    assignments: Vec<UserRoleAssignment>,
    revisions: Revisions,
}

impl StoreSnapshot {
    pub fn scope(&self) -> Scope {
        self.scope
    }
}

#[derive(Debug, Clone, Default)]
pub struct AuthorizationStore {
    inner: Arc<RwLock<StoreState>>,
}

impl AuthorizationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-populated with `catalog`, as if it had just been loaded.
    pub fn with_catalog(catalog: AuthzCatalog) -> Self {
        Self {
            inner: Arc::new(RwLock::new(StoreState {
                catalog,
                ..StoreState::default()
            })),
        }
    }

    fn state(&self) -> RwLockReadGuard<'_, StoreState> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn state_mut(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────

    pub fn catalog(&self) -> AuthzCatalog {
        self.state().catalog.clone()
    }

    pub fn permissions(&self) -> Vec<Permission> {
        self.state().catalog.permissions.clone()
    }

    pub fn roles(&self) -> Vec<Role> {
        self.state().catalog.roles.clone()
    }

    pub fn assignments(&self) -> Vec<UserRoleAssignment> {
        self.state().catalog.assignments.clone()
    }

    pub fn role(&self, role_id: &RoleId) -> Option<Role> {
        self.state().catalog.role(role_id).cloned()
    }

    /// Run `f` against the catalog under the read lock.
    pub fn read<R>(&self, f: impl FnOnce(&AuthzCatalog) -> R) -> R {
        f(&self.state().catalog)
    }

    pub fn busy(&self) -> BusyState {
        self.state().busy
    }

    /// Message of the most recent remote failure, if it has not been cleared.
    pub fn last_error(&self) -> Option<String> {
        self.state().last_error.clone()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Resolver shortcuts (no admin bypass)
    // ─────────────────────────────────────────────────────────────────────────

    pub fn user_roles(&self, user_id: &UserId) -> Vec<Role> {
        self.read(|catalog| {
            resolver::get_user_roles(catalog, user_id)
                .into_iter()
                .cloned()
                .collect()
        })
    }

    pub fn has_permission(&self, user_id: &UserId, permission_name: &str) -> bool {
        self.read(|catalog| resolver::has_permission(catalog, user_id, permission_name))
    }

    pub fn can_access(&self, user_id: &UserId, resource: &str, action: &str) -> bool {
        self.read(|catalog| resolver::can_access(catalog, user_id, resource, action))
    }

    pub fn effective_permissions(&self, user_id: &UserId) -> Vec<String> {
        self.read(|catalog| resolver::effective_permissions(catalog, user_id))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Wholesale replacement (loads)
    // ─────────────────────────────────────────────────────────────────────────

    pub fn replace_permissions(&self, permissions: Vec<Permission>) {
        let mut state = self.state_mut();
        state.catalog.permissions = permissions;
        state.revisions.permissions += 1;
    }

    pub fn replace_roles(&self, roles: Vec<Role>) {
        let mut state = self.state_mut();
        state.catalog.roles = roles;
        state.revisions.roles += 1;
    }

    pub fn replace_assignments(&self, assignments: Vec<UserRoleAssignment>) {
        let mut state = self.state_mut();
        state.catalog.assignments = assignments;
        state.revisions.assignments += 1;
    }

    pub fn clear_error(&self) {
        self.state_mut().last_error = None;
    }

    pub(crate) fn set_error(&self, message: impl Into<String>) {
        self.state_mut().last_error = Some(message.into());
    }

    /// Mutate the catalog under the write lock.
    pub(crate) fn write<R>(&self, f: impl FnOnce(&mut AuthzCatalog) -> R) -> R {
        f(&mut self.state_mut().catalog)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Busy tracking
    // ─────────────────────────────────────────────────────────────────────────

    pub(crate) fn begin_load(&self) -> BusyGuard {
        self.begin(Activity::Load)
    }

    pub(crate) fn begin_mutation(&self, kind: MutationKind) -> BusyGuard {
        self.begin(Activity::Mutation(kind))
    }

    fn begin(&self, activity: Activity) -> BusyGuard {
        *self.state_mut().busy.counter_mut(activity) += 1;
        BusyGuard {
            store: self.clone(),
            activity,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Snapshot / rollback
    // ─────────────────────────────────────────────────────────────────────────

    pub(crate) fn snapshot(&self, scope: Scope) -> StoreSnapshot {
        let state = self.state();
        StoreSnapshot {
            scope,
            roles: if scope.roles() {
                state.catalog.roles.clone()
            } else {
                Vec::new()
            },
            assignments: if scope.assignments() {
                state.catalog.assignments.clone()
            } else {
                Vec::new()
            },
            revisions: state.revisions,
        }
    }

    /// Put the snapshotted collections back.
    ///
    /// A collection replaced by a load after the snapshot was taken is left
    /// alone: the fresher server state wins over the rollback. Returns `false`
    /// when anything was skipped.
    pub(crate) fn restore(&self, snapshot: StoreSnapshot) -> bool {
        let mut state = self.state_mut();
        let mut complete = true;

        if snapshot.scope.roles() {
            if state.revisions.roles == snapshot.revisions.roles {
                state.catalog.roles = snapshot.roles;
            } else {
                tracing::warn!("roles reloaded during mutation; rollback skipped");
                complete = false;
            }
        }

        if snapshot.scope.assignments() {
            if state.revisions.assignments == snapshot.revisions.assignments {
                state.catalog.assignments = snapshot.assignments;
            } else {
                tracing::warn!("assignments reloaded during mutation; rollback skipped");
                complete = false;
            }
        }

        complete
    }
}

/// Decrements its busy counter when dropped, whichever way the operation ends.
#[derive(Debug)]
pub(crate) struct BusyGuard {
    store: AuthorizationStore,
    activity: Activity,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        let mut state = self.store.state_mut();
        let counter = state.busy.counter_mut(self.activity);
        *counter = counter.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use lendora_auth::AssignmentRequest;

    use super::*;

    fn assignment(user: &str, role: &str) -> UserRoleAssignment {
        UserRoleAssignment::optimistic(&AssignmentRequest::new(user, role, "root"), Utc::now())
    }

    fn seeded() -> AuthorizationStore {
        AuthorizationStore::with_catalog(AuthzCatalog::new(
            vec![Permission::new("p1", "view_customers")],
            vec![Role::new("r1", "Manager")],
            vec![assignment("u1", "r1")],
        ))
    }

    #[test]
    fn busy_guard_counts_overlapping_operations() {
        let store = AuthorizationStore::new();
        let first = store.begin_mutation(MutationKind::AssignRole);
        let second = store.begin_mutation(MutationKind::AssignRole);
        assert_eq!(store.busy().assigning, 2);

        drop(first);
        assert!(store.busy().is_mutating(MutationKind::AssignRole));

        drop(second);
        assert!(store.busy().is_idle());
    }

    #[test]
    fn restore_puts_scoped_collections_back() {
        let store = seeded();
        let before = store.catalog();
        let snapshot = store.snapshot(Scope::RolesAndAssignments);

        store.write(|catalog| catalog.remove_role(&RoleId::new("r1")));
        assert!(store.roles().is_empty());

        assert!(store.restore(snapshot));
        assert_eq!(store.catalog(), before);
    }

    #[test]
    fn restore_leaves_out_of_scope_collections_alone() {
        let store = seeded();
        let snapshot = store.snapshot(Scope::Assignments);

        store.write(|catalog| {
            catalog.roles.clear();
            catalog.assignments.clear();
        });
        store.restore(snapshot);

        assert!(store.roles().is_empty());
        assert_eq!(store.assignments().len(), 1);
    }

    #[test]
    fn reload_after_snapshot_wins_over_rollback() {
        let store = seeded();
        let snapshot = store.snapshot(Scope::Roles);

        store.write(|catalog| catalog.roles.clear());
        store.replace_roles(vec![Role::new("r9", "Auditor")]);

        assert!(!store.restore(snapshot));
        assert_eq!(store.roles(), vec![Role::new("r9", "Auditor")]);
    }

    #[test]
    fn last_error_round_trip() {
        let store = AuthorizationStore::new();
        assert_eq!(store.last_error(), None);

        store.set_error("Role already exists");
        assert_eq!(store.last_error().as_deref(), Some("Role already exists"));

        store.clear_error();
        assert_eq!(store.last_error(), None);
    }

    #[test]
    fn clones_share_state() {
        let store = AuthorizationStore::new();
        let other = store.clone();
        other.replace_permissions(vec![Permission::new("p1", "view_customers")]);

        assert_eq!(store.permissions().len(), 1);
    }

    #[test]
    fn resolver_shortcuts_read_current_catalog() {
        let store = seeded();
        let user = UserId::new("u1");
        assert_eq!(store.user_roles(&user).len(), 1);
        assert!(!store.has_permission(&user, "view_customers"));

        store.write(|catalog| {
            if let Some(role) = catalog.role_mut(&RoleId::new("r1")) {
                role.permissions.push(Permission::new("p1", "view_customers"));
            }
        });
        assert!(store.has_permission(&user, "view_customers"));
        assert!(store.can_access(&user, "customers", "view"));
        assert_eq!(store.effective_permissions(&user), vec!["view_customers"]);
    }
}
