//! In-memory remote authority with scripted replies.
//!
//! Replies are queued per operation and consumed in call order. A gated
//! reply holds the call open until the test releases it, which is how tests
//! observe optimistic state mid-flight or race a newer load against it.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tokio::sync::Notify;

use lendora_auth::{
    AssignmentRequest, AuthzCatalog, Permission, Role, RoleDraft, RolePatch, UserRoleAssignment,
};
use lendora_client::{RemoteAuthority, RemoteError};
use lendora_core::{AssignmentId, RoleId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    ListPermissions,
    ListRoles,
    ListUserRoles,
    CreateRole,
    UpdateRole,
    DeleteRole,
    AssignRole,
    RemoveRole,
}

struct Reply {
    result: Result<Value, RemoteError>,
    gate: Option<Arc<Notify>>,
}

#[derive(Default)]
struct Script {
    replies: HashMap<Op, VecDeque<Reply>>,
    calls: Vec<(Op, Value)>,
}

#[derive(Default)]
pub struct ScriptedAuthority {
    script: Mutex<Script>,
}

impl ScriptedAuthority {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push(&self, op: Op, result: Result<Value, RemoteError>, gate: Option<Arc<Notify>>) {
        self.script
            .lock()
            .unwrap()
            .replies
            .entry(op)
            .or_default()
            .push_back(Reply { result, gate });
    }

    pub fn reply_ok(&self, op: Op, payload: Value) {
        self.push(op, Ok(payload), None);
    }

    pub fn reply_err(&self, op: Op, err: RemoteError) {
        self.push(op, Err(err), None);
    }

    /// Queue a reply that is only delivered once the returned gate is notified.
    pub fn gated(&self, op: Op, result: Result<Value, RemoteError>) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.push(op, result, Some(Arc::clone(&gate)));
        gate
    }

    pub fn calls(&self) -> Vec<Op> {
        self.script
            .lock()
            .unwrap()
            .calls
            .iter()
            .map(|(op, _)| *op)
            .collect()
    }

    pub fn call_count(&self, op: Op) -> usize {
        self.calls().into_iter().filter(|c| *c == op).count()
    }

    /// Request bodies recorded for `op`, in call order.
    pub fn bodies(&self, op: Op) -> Vec<Value> {
        self.script
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|(o, _)| *o == op)
            .map(|(_, body)| body.clone())
            .collect()
    }

    /// Wait until `op` has been called at least once.
    pub async fn called(&self, op: Op) {
        while self.call_count(op) == 0 {
            tokio::task::yield_now().await;
        }
    }

    async fn answer(&self, op: Op, body: Value) -> Result<Value, RemoteError> {
        let reply = {
            let mut script = self.script.lock().unwrap();
            script.calls.push((op, body));
            script.replies.get_mut(&op).and_then(VecDeque::pop_front)
        };

        match reply {
            None => Ok(Value::Null),
            Some(Reply { result, gate }) => {
                if let Some(gate) = gate {
                    gate.notified().await;
                }
                result
            }
        }
    }
}

#[async_trait]
impl RemoteAuthority for ScriptedAuthority {
    async fn list_permissions(&self) -> Result<Value, RemoteError> {
        self.answer(Op::ListPermissions, Value::Null).await
    }

    async fn list_roles(&self) -> Result<Value, RemoteError> {
        self.answer(Op::ListRoles, Value::Null).await
    }

    async fn list_user_roles(&self) -> Result<Value, RemoteError> {
        self.answer(Op::ListUserRoles, Value::Null).await
    }

    async fn create_role(&self, draft: &RoleDraft) -> Result<Value, RemoteError> {
        self.answer(Op::CreateRole, serde_json::to_value(draft).unwrap())
            .await
    }

    async fn update_role(&self, role_id: &RoleId, patch: &RolePatch) -> Result<Value, RemoteError> {
        let body = json!({ "id": role_id, "patch": patch });
        self.answer(Op::UpdateRole, body).await
    }

    async fn delete_role(&self, role_id: &RoleId) -> Result<(), RemoteError> {
        self.answer(Op::DeleteRole, json!({ "id": role_id }))
            .await
            .map(|_| ())
    }

    async fn assign_role(&self, request: &AssignmentRequest) -> Result<Value, RemoteError> {
        self.answer(Op::AssignRole, serde_json::to_value(request).unwrap())
            .await
    }

    async fn remove_role(&self, user_id: &UserId, role_id: &RoleId) -> Result<(), RemoteError> {
        self.answer(Op::RemoveRole, json!({ "userId": user_id, "roleId": role_id }))
            .await
            .map(|_| ())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Fixtures
// ─────────────────────────────────────────────────────────────────────────────

/// A server-confirmed assignment with a fixed timestamp, so fixtures compare equal.
pub fn confirmed(id: &str, user: &str, role: &str) -> UserRoleAssignment {
    let assigned_at = DateTime::<Utc>::from_timestamp(1_704_067_200, 0).unwrap();
    let mut assignment =
        UserRoleAssignment::optimistic(&AssignmentRequest::new(user, role, "root"), assigned_at);
    assignment.id = Some(AssignmentId::new(id));
    assignment
}

/// `admin` (r0), `Manager` (r1, view_customers) and `Teller` (r2, no
/// permissions); u1 is a Manager, u2 a Teller.
pub fn branch_catalog() -> AuthzCatalog {
    let view = Permission::new("p1", "view_customers");
    let approve = Permission::new("p2", "approve_loans");
    AuthzCatalog::new(
        vec![view.clone(), approve],
        vec![
            Role::new("r0", "admin"),
            Role::new("r1", "Manager").with_permissions(vec![view]),
            Role::new("r2", "Teller"),
        ],
        vec![confirmed("a1", "u1", "r1"), confirmed("a2", "u2", "r2")],
    )
}
