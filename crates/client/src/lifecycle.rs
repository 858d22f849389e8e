//! Request lifecycle for bulk loads.
//!
//! Each collection has its own generation counter. Beginning a load cycle
//! bumps the counter, which cancels whatever cycle was still in flight for
//! that collection; a response is only applied while its cycle is current.
//! Teardown bumps every counter and keeps later cycles dead on arrival.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tokio::sync::watch;
use uuid::Uuid;

/// The independently loaded collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Permissions,
    Roles,
    Assignments,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Permissions => "permissions",
            Collection::Roles => "roles",
            Collection::Assignments => "assignments",
        }
    }
}

impl core::fmt::Display for Collection {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a load settled when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadOutcome {
    /// The response replaced the collection.
    Applied,
    /// A newer cycle (or teardown) superseded this one; nothing was applied.
    Cancelled,
}

impl LoadOutcome {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, LoadOutcome::Cancelled)
    }
}

#[derive(Debug)]
struct LifecycleInner {
    permissions: watch::Sender<u64>,
    roles: watch::Sender<u64>,
    assignments: watch::Sender<u64>,
    torn_down: Arc<AtomicBool>,
}

/// Issues and cancels load cycles. Cheap to clone; clones share state.
#[derive(Debug, Clone)]
pub struct RequestLifecycle {
    inner: Arc<LifecycleInner>,
}

impl RequestLifecycle {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(LifecycleInner {
                permissions: watch::channel(0).0,
                roles: watch::channel(0).0,
                assignments: watch::channel(0).0,
                torn_down: Arc::new(AtomicBool::new(false)),
            }),
        }
    }

    fn sender(&self, collection: Collection) -> &watch::Sender<u64> {
        match collection {
            Collection::Permissions => &self.inner.permissions,
            Collection::Roles => &self.inner.roles,
            Collection::Assignments => &self.inner.assignments,
        }
    }

    /// Start a new cycle for `collection`, cancelling the previous one.
    pub fn begin(&self, collection: Collection) -> LoadCycle {
        let sender = self.sender(collection);
        let mut generation = 0;
        sender.send_modify(|current| {
            *current += 1;
            generation = *current;
        });

        let cycle = LoadCycle {
            id: Uuid::now_v7(),
            collection,
            generation,
            rx: sender.subscribe(),
            torn_down: Arc::clone(&self.inner.torn_down),
        };
        tracing::trace!(cycle = %cycle.id, %collection, generation, "load cycle started");
        cycle
    }

    /// Cancel every in-flight load. Loads begun afterwards resolve to
    /// [`LoadOutcome::Cancelled`] without touching the network.
    pub fn teardown(&self) {
        if self.inner.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }
        for collection in [Collection::Permissions, Collection::Roles, Collection::Assignments] {
            self.sender(collection).send_modify(|current| *current += 1);
        }
        tracing::debug!("request lifecycle torn down");
    }

    pub fn is_torn_down(&self) -> bool {
        self.inner.torn_down.load(Ordering::SeqCst)
    }
}

impl Default for RequestLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// One load attempt for one collection.
#[derive(Debug)]
pub struct LoadCycle {
    id: Uuid,
    collection: Collection,
    generation: u64,
    rx: watch::Receiver<u64>,
    torn_down: Arc<AtomicBool>,
}

impl LoadCycle {
    /// Correlation id for logs.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn collection(&self) -> Collection {
        self.collection
    }

    /// Whether no newer cycle has started and the lifecycle is still alive.
    pub fn is_current(&self) -> bool {
        !self.torn_down.load(Ordering::SeqCst) && *self.rx.borrow() == self.generation
    }

    /// Drive `request` unless the cycle is cancelled first.
    ///
    /// Returns `None` when cancelled; the request future is dropped at that
    /// point, which aborts it. A cycle that is already stale never polls
    /// `request` at all.
    pub async fn run<F, T>(&mut self, request: F) -> Option<T>
    where
        F: Future<Output = T>,
    {
        if !self.is_current() {
            return None;
        }

        tokio::select! {
            biased;
            _ = self.superseded() => None,
            out = request => Some(out),
        }
    }

    async fn superseded(&mut self) {
        loop {
            if self.rx.changed().await.is_err() {
                // Lifecycle dropped: nothing will ever be current again.
                return;
            }
            if *self.rx.borrow_and_update() != self.generation {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn new_cycle_supersedes_old_one() {
        let lifecycle = RequestLifecycle::new();
        let first = lifecycle.begin(Collection::Roles);
        assert!(first.is_current());

        let second = lifecycle.begin(Collection::Roles);
        assert!(!first.is_current());
        assert!(second.is_current());
    }

    #[tokio::test]
    async fn collections_are_independent() {
        let lifecycle = RequestLifecycle::new();
        let roles = lifecycle.begin(Collection::Roles);
        let _perms = lifecycle.begin(Collection::Permissions);

        assert!(roles.is_current());
    }

    #[tokio::test]
    async fn stale_cycle_never_polls_request() {
        let lifecycle = RequestLifecycle::new();
        let mut stale = lifecycle.begin(Collection::Assignments);
        let _fresh = lifecycle.begin(Collection::Assignments);

        let mut polled = false;
        let out = stale
            .run(async {
                polled = true;
                1
            })
            .await;

        assert_eq!(out, None);
        assert!(!polled);
    }

    #[tokio::test]
    async fn pending_request_is_cancelled_by_newer_cycle() {
        let lifecycle = RequestLifecycle::new();
        let mut first = lifecycle.begin(Collection::Roles);

        let (out, ()) = tokio::join!(first.run(std::future::pending::<u8>()), async {
            tokio::task::yield_now().await;
            lifecycle.begin(Collection::Roles);
        });

        assert_eq!(out, None);
    }

    #[tokio::test]
    async fn teardown_cancels_everything() {
        let lifecycle = RequestLifecycle::new();
        let mut cycle = lifecycle.begin(Collection::Permissions);

        let (out, ()) = tokio::join!(cycle.run(std::future::pending::<u8>()), async {
            lifecycle.teardown();
        });
        assert_eq!(out, None);

        let mut later = lifecycle.begin(Collection::Permissions);
        assert!(!later.is_current());
        assert_eq!(later.run(async { 7 }).await, None);
        assert!(lifecycle.is_torn_down());
    }

    #[tokio::test]
    async fn current_cycle_completes() {
        let lifecycle = RequestLifecycle::new();
        let mut cycle = lifecycle.begin(Collection::Roles);
        assert_eq!(cycle.run(async { "ok" }).await, Some("ok"));
    }
}
