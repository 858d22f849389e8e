//! The facade a page or tool holds on to.

use std::sync::Arc;

use lendora_auth::{
    AccessExplanation, AccessGuard, AssignmentRequest, AuthzError, Principal, Role, RoleDraft,
    RolePatch, UserRoleAssignment,
};
use lendora_core::{RoleId, UserId};

use crate::error::ClientResult;
use crate::lifecycle::{LoadOutcome, RequestLifecycle};
use crate::loader::{LoadReport, StoreLoader};
use crate::mutation::MutationCoordinator;
use crate::remote::RemoteAuthority;
use crate::store::AuthorizationStore;

/// Store, loader and mutation coordinator wired to one remote authority.
///
/// Dropping the client tears down its request lifecycle, so loads still in
/// flight resolve to [`LoadOutcome::Cancelled`] and never write to the store.
pub struct AuthorizationClient<R: ?Sized> {
    store: AuthorizationStore,
    lifecycle: RequestLifecycle,
    loader: StoreLoader<R>,
    mutations: MutationCoordinator<R>,
}

impl<R> AuthorizationClient<R>
where
    R: RemoteAuthority + ?Sized,
{
    pub fn new(remote: Arc<R>) -> Self {
        Self::with_store(AuthorizationStore::new(), remote)
    }

    pub fn with_store(store: AuthorizationStore, remote: Arc<R>) -> Self {
        let lifecycle = RequestLifecycle::new();
        Self {
            loader: StoreLoader::new(store.clone(), Arc::clone(&remote), lifecycle.clone()),
            mutations: MutationCoordinator::new(store.clone(), remote),
            store,
            lifecycle,
        }
    }

    pub fn store(&self) -> &AuthorizationStore {
        &self.store
    }

    pub fn loader(&self) -> &StoreLoader<R> {
        &self.loader
    }

    pub fn mutations(&self) -> &MutationCoordinator<R> {
        &self.mutations
    }

    /// Initial bulk load of all three collections.
    pub async fn start(&self) -> ClientResult<LoadReport> {
        self.loader.refresh_all().await
    }

    pub async fn refresh_all(&self) -> ClientResult<LoadReport> {
        self.loader.refresh_all().await
    }

    pub async fn refresh_permissions(&self) -> ClientResult<LoadOutcome> {
        self.loader.refresh_permissions().await
    }

    pub async fn refresh_roles(&self) -> ClientResult<LoadOutcome> {
        self.loader.refresh_roles().await
    }

    pub async fn refresh_assignments(&self) -> ClientResult<LoadOutcome> {
        self.loader.refresh_assignments().await
    }

    pub async fn create_role(&self, draft: RoleDraft) -> ClientResult<Role> {
        self.mutations.create_role(draft).await
    }

    pub async fn update_role(&self, role_id: &RoleId, patch: RolePatch) -> ClientResult<Option<Role>> {
        self.mutations.update_role(role_id, patch).await
    }

    pub async fn delete_role(&self, role_id: &RoleId) -> ClientResult<()> {
        self.mutations.delete_role(role_id).await
    }

    pub async fn assign_role(&self, request: AssignmentRequest) -> ClientResult<UserRoleAssignment> {
        self.mutations.assign_role(request).await
    }

    pub async fn remove_role(&self, user_id: &UserId, role_id: &RoleId) -> ClientResult<()> {
        self.mutations.remove_role(user_id, role_id).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Checks (admin bypass applied)
    // ─────────────────────────────────────────────────────────────────────────

    pub fn has_permission(&self, principal: &Principal, permission_name: &str) -> bool {
        self.store
            .read(|catalog| AccessGuard::new(catalog).has_permission(principal, permission_name))
    }

    pub fn can_access(&self, principal: &Principal, resource: &str, action: &str) -> bool {
        self.store
            .read(|catalog| AccessGuard::new(catalog).can_access(principal, resource, action))
    }

    pub fn authorize(&self, principal: &Principal, permission_name: &str) -> Result<(), AuthzError> {
        self.store
            .read(|catalog| AccessGuard::new(catalog).authorize(principal, permission_name))
    }

    pub fn explain(&self, principal: &Principal, permission_name: &str) -> AccessExplanation {
        self.store
            .read(|catalog| AccessGuard::new(catalog).explain(principal, permission_name))
    }

    pub fn user_roles(&self, user_id: &UserId) -> Vec<Role> {
        self.store.user_roles(user_id)
    }

    pub fn effective_permissions(&self, user_id: &UserId) -> Vec<String> {
        self.store.effective_permissions(user_id)
    }

    /// Cancel every in-flight load; later loads resolve to `Cancelled`.
    pub fn teardown(&self) {
        self.lifecycle.teardown();
    }
}

impl<R: ?Sized> Drop for AuthorizationClient<R> {
    fn drop(&mut self) {
        self.lifecycle.teardown();
    }
}
