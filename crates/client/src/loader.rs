//! Bulk loads: fetch a collection, normalize it, replace it wholesale.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::Instrument;

use lendora_auth::reference::{normalize_assignments, normalize_permissions, normalize_roles};

use crate::error::{ClientResult, RemoteError};
use crate::lifecycle::{Collection, LoadCycle, LoadOutcome, RequestLifecycle};
use crate::remote::RemoteAuthority;
use crate::store::AuthorizationStore;

/// Per-collection outcome of [`StoreLoader::refresh_all`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub permissions: LoadOutcome,
    pub roles: LoadOutcome,
    pub assignments: LoadOutcome,
}

impl LoadReport {
    /// Whether any of the three loads was superseded.
    pub fn is_cancelled(&self) -> bool {
        self.permissions.is_cancelled()
            || self.roles.is_cancelled()
            || self.assignments.is_cancelled()
    }

    pub fn all_applied(&self) -> bool {
        [self.permissions, self.roles, self.assignments]
            .iter()
            .all(|outcome| *outcome == LoadOutcome::Applied)
    }
}

enum Fetch {
    Cancelled,
    Failed(RemoteError, LoadCycle),
    Ready(Value, LoadCycle),
}

pub struct StoreLoader<R: ?Sized> {
    store: AuthorizationStore,
    remote: Arc<R>,
    lifecycle: RequestLifecycle,
}

impl<R: ?Sized> Clone for StoreLoader<R> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            remote: Arc::clone(&self.remote),
            lifecycle: self.lifecycle.clone(),
        }
    }
}

impl<R> StoreLoader<R>
where
    R: RemoteAuthority + ?Sized,
{
    pub fn new(store: AuthorizationStore, remote: Arc<R>, lifecycle: RequestLifecycle) -> Self {
        Self {
            store,
            remote,
            lifecycle,
        }
    }

    pub fn lifecycle(&self) -> &RequestLifecycle {
        &self.lifecycle
    }

    pub async fn refresh_permissions(&self) -> ClientResult<LoadOutcome> {
        self.refresh(Collection::Permissions).await
    }

    /// Role permission lists are resolved against the permissions currently
    /// in the store.
    pub async fn refresh_roles(&self) -> ClientResult<LoadOutcome> {
        self.refresh(Collection::Roles).await
    }

    pub async fn refresh_assignments(&self) -> ClientResult<LoadOutcome> {
        self.refresh(Collection::Assignments).await
    }

    /// Re-fetch one collection and replace it wholesale.
    ///
    /// A failure leaves the previous collection in place and is recorded in
    /// the store's last-error slot. A superseded load is `Ok(Cancelled)`.
    pub async fn refresh(&self, collection: Collection) -> ClientResult<LoadOutcome> {
        let _busy = self.store.begin_load();
        let fetched = self.fetch(collection).await;
        self.apply(collection, fetched).map_err(|err| {
            self.store.set_error(err.message());
            err.into()
        })
    }

    /// Load all three collections concurrently.
    ///
    /// Successful fetches are applied (permissions first, so roles resolve
    /// against the fresh set); a failed fetch keeps its prior collection.
    /// The first error, in that same order, is returned and recorded.
    pub async fn refresh_all(&self) -> ClientResult<LoadReport> {
        let _busy = self.store.begin_load();
        let (permissions, roles, assignments) = tokio::join!(
            self.fetch(Collection::Permissions),
            self.fetch(Collection::Roles),
            self.fetch(Collection::Assignments),
        );

        let results = [
            self.apply(Collection::Permissions, permissions),
            self.apply(Collection::Roles, roles),
            self.apply(Collection::Assignments, assignments),
        ];

        match results {
            [Ok(permissions), Ok(roles), Ok(assignments)] => {
                let report = LoadReport {
                    permissions,
                    roles,
                    assignments,
                };
                if report.all_applied() {
                    self.store.clear_error();
                }
                Ok(report)
            }
            [Err(err), _, _] | [_, Err(err), _] | [_, _, Err(err)] => {
                self.store.set_error(err.message());
                Err(err.into())
            }
        }
    }

    async fn fetch(&self, collection: Collection) -> Fetch {
        let mut cycle = self.lifecycle.begin(collection);
        let span = tracing::debug_span!("load", cycle = %cycle.id(), %collection);

        async move {
            let request = async {
                match collection {
                    Collection::Permissions => self.remote.list_permissions().await,
                    Collection::Roles => self.remote.list_roles().await,
                    Collection::Assignments => self.remote.list_user_roles().await,
                }
            };

            match cycle.run(request).await {
                None => {
                    tracing::debug!("load superseded before response");
                    Fetch::Cancelled
                }
                Some(Err(err)) => Fetch::Failed(err, cycle),
                Some(Ok(payload)) => Fetch::Ready(payload, cycle),
            }
        }
        .instrument(span)
        .await
    }

    fn apply(&self, collection: Collection, fetched: Fetch) -> Result<LoadOutcome, RemoteError> {
        let (payload, cycle) = match fetched {
            Fetch::Cancelled => return Ok(LoadOutcome::Cancelled),
            Fetch::Failed(err, cycle) => {
                if !cycle.is_current() {
                    return Ok(LoadOutcome::Cancelled);
                }
                tracing::warn!(cycle = %cycle.id(), %collection, error = %err, "load failed; keeping previous collection");
                return Err(err);
            }
            Fetch::Ready(payload, cycle) => (payload, cycle),
        };

        if !cycle.is_current() {
            tracing::debug!(cycle = %cycle.id(), %collection, "load superseded; response dropped");
            return Ok(LoadOutcome::Cancelled);
        }

        let count = match collection {
            Collection::Permissions => {
                let permissions = normalize_permissions(payload);
                let count = permissions.len();
                self.store.replace_permissions(permissions);
                count
            }
            Collection::Roles => {
                let known = self.store.permissions();
                let roles = normalize_roles(payload, &known);
                let count = roles.len();
                self.store.replace_roles(roles);
                count
            }
            Collection::Assignments => {
                let known = self.store.permissions();
                let assignments = normalize_assignments(payload, &known);
                let count = assignments.len();
                self.store.replace_assignments(assignments);
                count
            }
        };

        tracing::info!(cycle = %cycle.id(), %collection, count, "collection loaded");
        Ok(LoadOutcome::Applied)
    }
}
