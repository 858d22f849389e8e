//! Optimistic role and assignment writes.
//!
//! Every write follows the same protocol: snapshot, mark busy, apply the
//! local guess, call the remote authority, then reconcile with its answer or
//! roll back to the snapshot. A write whose future is dropped before the
//! authority answers is rolled back as well. Local validation failures stop
//! before any of that and leave the store untouched.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;

use lendora_auth::reference::{normalize_assignment, normalize_role};
use lendora_auth::{AssignmentRequest, AuthzCatalog, Role, RoleDraft, RolePatch, UserRoleAssignment};
use lendora_core::entity::upsert;
use lendora_core::{RoleId, UserId};

use crate::error::{ClientResult, RemoteError};
use crate::remote::RemoteAuthority;
use crate::store::{AuthorizationStore, MutationKind, Scope, StoreSnapshot};

pub struct MutationCoordinator<R: ?Sized> {
    store: AuthorizationStore,
    remote: Arc<R>,
}

impl<R: ?Sized> Clone for MutationCoordinator<R> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            remote: Arc::clone(&self.remote),
        }
    }
}

impl<R> MutationCoordinator<R>
where
    R: RemoteAuthority + ?Sized,
{
    pub fn new(store: AuthorizationStore, remote: Arc<R>) -> Self {
        Self { store, remote }
    }

    /// The shared optimistic protocol.
    ///
    /// `remote_call` must be lazy (not started until polled) so that the
    /// optimistic change is visible before the request goes out. A failing
    /// `reconcile` is reported but does not roll back: the remote authority
    /// has already committed. Dropping the returned future before the
    /// authority answers restores the snapshot.
    pub async fn run_optimistic<T, U, Fut>(
        &self,
        kind: MutationKind,
        scope: Scope,
        apply: impl FnOnce(&mut AuthzCatalog),
        remote_call: Fut,
        reconcile: impl FnOnce(&AuthorizationStore, T) -> Result<U, RemoteError>,
    ) -> ClientResult<U>
    where
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let snapshot = self.store.snapshot(scope);
        let _busy = self.store.begin_mutation(kind);
        let mut rollback = Rollback::arm(&self.store, kind, snapshot);
        self.store.write(apply);

        match remote_call.await {
            Ok(response) => {
                rollback.disarm();
                match reconcile(&self.store, response) {
                    Ok(out) => {
                        tracing::info!(mutation = %kind, "mutation committed");
                        Ok(out)
                    }
                    Err(err) => {
                        tracing::warn!(mutation = %kind, error = %err, "mutation committed but response unusable");
                        self.store.set_error(err.message());
                        Err(err.into())
                    }
                }
            }
            Err(err) => {
                let restored = rollback.restore();
                tracing::warn!(mutation = %kind, error = %err, restored, "mutation rolled back");
                self.store.set_error(err.message());
                Err(err.into())
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Roles
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a role. Nothing is inserted until the server answers.
    pub async fn create_role(&self, draft: RoleDraft) -> ClientResult<Role> {
        let draft = self.store.read(|catalog| draft.validated(&catalog.roles))?;

        self.run_optimistic(
            MutationKind::CreateRole,
            Scope::Nothing,
            |_| {},
            self.remote.create_role(&draft),
            |store, payload| {
                let known = store.permissions();
                let role = normalize_role(payload, &known)
                    .ok_or_else(|| RemoteError::Decode("create role: no role in response".into()))?;
                store.write(|catalog| upsert(&mut catalog.roles, role.clone()));
                Ok(role)
            },
        )
        .await
    }

    /// Update a role in place.
    ///
    /// Returns the server's canonical role, or `None` when the response did
    /// not carry one and the optimistic merge was kept.
    pub async fn update_role(&self, role_id: &RoleId, patch: RolePatch) -> ClientResult<Option<Role>> {
        let patch = self
            .store
            .read(|catalog| patch.validated(role_id, &catalog.roles))?;
        let permissions = match &patch.permission_ids {
            Some(ids) => self.store.read(|catalog| catalog.resolve_permissions(ids)),
            None => Vec::new(),
        };
        // Embedded copies live on assignments, so those need snapshotting too.
        let scope = self.store.read(|catalog| {
            let embedded = catalog
                .assignments
                .iter()
                .filter_map(|a| a.embedded_role.as_ref())
                .any(|role| &role.id == role_id);
            if embedded {
                Scope::RolesAndAssignments
            } else {
                Scope::Roles
            }
        });

        self.run_optimistic(
            MutationKind::UpdateRole,
            scope,
            |catalog| {
                for role in catalog.embedded_copies_mut(role_id) {
                    patch.apply_to(role, permissions.clone());
                }
                if let Some(role) = catalog.role_mut(role_id) {
                    patch.apply_to(role, permissions);
                }
            },
            self.remote.update_role(role_id, &patch),
            |store, payload| {
                let known = store.permissions();
                let Some(role) = normalize_role(payload, &known) else {
                    tracing::debug!(role = %role_id, "update response carried no role; keeping local merge");
                    return Ok(None);
                };
                store.write(|catalog| {
                    for embedded in catalog.embedded_copies_mut(&role.id) {
                        *embedded = role.clone();
                    }
                    upsert(&mut catalog.roles, role.clone());
                });
                Ok(Some(role))
            },
        )
        .await
    }

    /// Delete a role and every assignment that references it.
    pub async fn delete_role(&self, role_id: &RoleId) -> ClientResult<()> {
        self.store
            .read(|catalog| catalog.role(role_id).map(Role::ensure_deletable))
            .transpose()?;

        self.run_optimistic(
            MutationKind::DeleteRole,
            Scope::RolesAndAssignments,
            |catalog| {
                let dropped = catalog.remove_role(role_id);
                tracing::debug!(role = %role_id, assignments = dropped, "role removed locally");
            },
            self.remote.delete_role(role_id),
            |store, ()| {
                // A reload during the call may have brought the role back.
                store.write(|catalog| catalog.remove_role(role_id));
                Ok(())
            },
        )
        .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Assignments
    // ─────────────────────────────────────────────────────────────────────────

    /// Assign a role to a user.
    ///
    /// Returns the server-confirmed assignment, or the optimistic one when
    /// the response carried nothing usable.
    pub async fn assign_role(&self, request: AssignmentRequest) -> ClientResult<UserRoleAssignment> {
        UserId::parse(request.user_id.as_str())?;
        RoleId::parse(request.role_id.as_str())?;

        let optimistic = UserRoleAssignment::optimistic(&request, Utc::now());
        let local = optimistic.clone();

        self.run_optimistic(
            MutationKind::AssignRole,
            Scope::Assignments,
            |catalog| catalog.put_assignment(local),
            self.remote.assign_role(&request),
            |store, payload| {
                let known = store.permissions();
                let Some(mut confirmed) = normalize_assignment(payload, &known) else {
                    tracing::debug!(user = %request.user_id, role = %request.role_id, "assign response carried no assignment");
                    return Ok(optimistic);
                };

                if confirmed.user_id.is_empty() {
                    confirmed.user_id = request.user_id.clone();
                }
                if confirmed.role_id.is_empty() {
                    confirmed.role_id = request.role_id.clone();
                }
                if confirmed.assigned_by.is_empty() {
                    confirmed.assigned_by = request.assigned_by.clone();
                }

                store.write(|catalog| {
                    // Clears the optimistic entry for the requested pair too.
                    catalog.remove_assignment(&request.user_id, &request.role_id);
                    catalog.put_assignment(confirmed.clone());
                });
                Ok(confirmed)
            },
        )
        .await
    }

    /// Remove a role from a user.
    pub async fn remove_role(&self, user_id: &UserId, role_id: &RoleId) -> ClientResult<()> {
        UserId::parse(user_id.as_str())?;
        RoleId::parse(role_id.as_str())?;

        self.run_optimistic(
            MutationKind::RemoveRole,
            Scope::Assignments,
            |catalog| {
                catalog.remove_assignment(user_id, role_id);
            },
            self.remote.remove_role(user_id, role_id),
            |store, ()| {
                store.write(|catalog| catalog.remove_assignment(user_id, role_id));
                Ok(())
            },
        )
        .await
    }
}

/// Holds the pre-mutation snapshot until the authority has answered.
///
/// Dropped while still armed (the mutation future was abandoned mid-flight),
/// it restores the snapshot so no unconfirmed change is left behind.
struct Rollback<'a> {
    store: &'a AuthorizationStore,
    kind: MutationKind,
    snapshot: Option<StoreSnapshot>,
}

impl<'a> Rollback<'a> {
    fn arm(store: &'a AuthorizationStore, kind: MutationKind, snapshot: StoreSnapshot) -> Self {
        Self {
            store,
            kind,
            snapshot: Some(snapshot),
        }
    }

    fn disarm(&mut self) {
        self.snapshot = None;
    }

    /// Restore now. Returns `false` when a reload made part of it stale.
    fn restore(&mut self) -> bool {
        match self.snapshot.take() {
            Some(snapshot) => self.store.restore(snapshot),
            None => true,
        }
    }
}

impl Drop for Rollback<'_> {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            let restored = self.store.restore(snapshot);
            tracing::warn!(mutation = %self.kind, restored, "mutation abandoned in flight; rolled back");
        }
    }
}
