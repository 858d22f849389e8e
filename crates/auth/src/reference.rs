//! Reference normalizer.
//!
//! The remote authority is loose about shapes: a related entity may arrive as
//! a bare id string or as an embedded object carrying `_id`, and collections
//! may arrive bare, wrapped under a key, or as a single object. Everything in
//! this module turns those shapes into canonical domain values, and nothing
//! ambiguous is allowed past it.

use chrono::{DateTime, Utc};
use lendora_core::{AssignmentId, PermissionId, RoleId, UserId};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{AuthzCatalog, Permission, Role, UserRoleAssignment};

/// Wrapper keys under which each collection may arrive.
pub const PERMISSION_KEYS: &[&str] = &["permission", "permissions", "data"];
pub const ROLE_KEYS: &[&str] = &["roles", "data"];
pub const ASSIGNMENT_KEYS: &[&str] = &["userRoles", "assignments", "data"];

/// Wrapper keys for single-entity responses.
pub const SINGLE_ROLE_KEYS: &[&str] = &["role", "data"];
pub const SINGLE_ASSIGNMENT_KEYS: &[&str] = &["userRole", "assignment", "data"];

// ─────────────────────────────────────────────────────────────────────────────
// Wire shapes
// ─────────────────────────────────────────────────────────────────────────────

/// A reference as it appears on the wire: either a bare id or an embedded
/// object.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Ref<T> {
    Id(String),
    Embedded(T),
}

/// Anything that can be the embedded side of a [`Ref`].
pub trait RefTarget {
    /// Canonical id of the embedded object (`_id`, falling back to `id`).
    fn ref_id(&self) -> String;
}

/// Extract the canonical id from either reference shape.
///
/// Absent references map to the empty string. Never fails.
pub fn extract_id<T: RefTarget>(reference: Option<&Ref<T>>) -> String {
    match reference {
        Some(Ref::Id(id)) => id.trim().to_string(),
        Some(Ref::Embedded(value)) => value.ref_id(),
        None => String::new(),
    }
}

fn pick_id(mongo_id: &Option<String>, id: &Option<String>) -> String {
    mongo_id
        .as_deref()
        .or(id.as_deref())
        .map(str::trim)
        .unwrap_or_default()
        .to_string()
}

/// Minimal embedded entity: only the id matters.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EmbeddedEntity {
    #[serde(rename = "_id", default)]
    mongo_id: Option<String>,
    #[serde(default)]
    id: Option<String>,
}

impl EmbeddedEntity {
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            mongo_id: Some(id.into()),
            id: None,
        }
    }
}

impl RefTarget for EmbeddedEntity {
    fn ref_id(&self) -> String {
        pick_id(&self.mongo_id, &self.id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
struct WirePermission {
    #[serde(rename = "_id", default)]
    mongo_id: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl RefTarget for WirePermission {
    fn ref_id(&self) -> String {
        pick_id(&self.mongo_id, &self.id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
struct WireRole {
    #[serde(rename = "_id", default)]
    mongo_id: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    permissions: Option<Vec<Ref<WirePermission>>>,
}

impl RefTarget for WireRole {
    fn ref_id(&self) -> String {
        pick_id(&self.mongo_id, &self.id)
    }
}

impl WireRole {
    /// Whether the object carries enough to stand in for a full role.
    fn is_full(&self) -> bool {
        self.name.is_some() || self.permissions.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
struct WireAssignment {
    #[serde(rename = "_id", default)]
    mongo_id: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "userId", default)]
    user_id: Option<Ref<EmbeddedEntity>>,
    #[serde(rename = "roleId", default)]
    role_id: Option<Ref<WireRole>>,
    #[serde(rename = "assignedBy", default)]
    assigned_by: Option<Ref<EmbeddedEntity>>,
    #[serde(rename = "assignedAt", default)]
    assigned_at: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Response shapes
// ─────────────────────────────────────────────────────────────────────────────

/// Flatten a collection payload into its items.
///
/// Accepts a bare array, an object wrapping the list under one of `keys`, or
/// a single entity object (anything carrying `_id`/`id`). Every other shape
/// yields an empty list.
pub fn unwrap_collection(payload: Value, keys: &[&str]) -> Vec<Value> {
    match payload {
        Value::Array(items) => items,
        Value::Object(mut map) => {
            for key in keys {
                match map.remove(*key) {
                    Some(Value::Array(items)) => return items,
                    Some(item @ Value::Object(_)) => return vec![item],
                    _ => {}
                }
            }
            if map.contains_key("_id") || map.contains_key("id") {
                vec![Value::Object(map)]
            } else {
                Vec::new()
            }
        }
        _ => Vec::new(),
    }
}

fn parse_items<T: DeserializeOwned>(items: Vec<Value>, kind: &'static str) -> Vec<T> {
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<T>(item) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                tracing::warn!(kind, error = %err, "skipping malformed item in remote payload");
                None
            }
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Permissions
// ─────────────────────────────────────────────────────────────────────────────

fn permission_from_wire(wire: WirePermission) -> Option<Permission> {
    let id = wire.ref_id();
    let name = wire.name.map(|n| n.trim().to_string()).unwrap_or_default();
    if id.is_empty() && name.is_empty() {
        return None;
    }
    Some(Permission {
        id: PermissionId::new(id),
        name,
        description: wire.description,
    })
}

/// Normalize a list-permissions payload.
pub fn normalize_permissions(payload: Value) -> Vec<Permission> {
    parse_items::<WirePermission>(unwrap_collection(payload, PERMISSION_KEYS), "permission")
        .into_iter()
        .filter_map(permission_from_wire)
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Roles
// ─────────────────────────────────────────────────────────────────────────────

fn role_permissions(refs: Vec<Ref<WirePermission>>, known: &[Permission]) -> Vec<Permission> {
    refs.into_iter()
        .filter_map(|reference| match reference {
            Ref::Embedded(wire) if wire.name.is_some() => permission_from_wire(wire),
            other => {
                let id = extract_id(Some(&other));
                let found = known.iter().find(|p| p.id == id.as_str()).cloned();
                if found.is_none() {
                    tracing::debug!(permission_id = %id, "dropping unknown permission reference on role");
                }
                found
            }
        })
        .collect()
}

fn role_from_wire(wire: WireRole, known: &[Permission]) -> Option<Role> {
    let id = wire.ref_id();
    if id.is_empty() {
        tracing::warn!("skipping role without an id");
        return None;
    }
    Some(Role {
        id: RoleId::new(id),
        name: wire.name.map(|n| n.trim().to_string()).unwrap_or_default(),
        description: wire.description,
        permissions: role_permissions(wire.permissions.unwrap_or_default(), known),
    })
}

/// Normalize a list-roles payload.
///
/// Permission references given as bare ids are resolved against `known`.
pub fn normalize_roles(payload: Value, known: &[Permission]) -> Vec<Role> {
    parse_items::<WireRole>(unwrap_collection(payload, ROLE_KEYS), "role")
        .into_iter()
        .filter_map(|wire| role_from_wire(wire, known))
        .collect()
}

/// Normalize a single-role response (create/update).
pub fn normalize_role(payload: Value, known: &[Permission]) -> Option<Role> {
    parse_items::<WireRole>(unwrap_collection(payload, SINGLE_ROLE_KEYS), "role")
        .into_iter()
        .find_map(|wire| role_from_wire(wire, known))
}

// ─────────────────────────────────────────────────────────────────────────────
// Assignments
// ─────────────────────────────────────────────────────────────────────────────

fn parse_timestamp(raw: Option<&str>) -> DateTime<Utc> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

fn assignment_from_wire(wire: WireAssignment, known: &[Permission]) -> UserRoleAssignment {
    let id = pick_id(&wire.mongo_id, &wire.id);
    let role_id = RoleId::new(extract_id(wire.role_id.as_ref()));

    let embedded_role = match wire.role_id {
        Some(Ref::Embedded(role)) if role.is_full() => role_from_wire(role, known),
        _ => None,
    };

    UserRoleAssignment {
        id: (!id.is_empty()).then(|| AssignmentId::new(id)),
        user_id: UserId::new(extract_id(wire.user_id.as_ref())),
        role_id,
        assigned_by: UserId::new(extract_id(wire.assigned_by.as_ref())),
        assigned_at: parse_timestamp(wire.assigned_at.as_deref()),
        embedded_role,
    }
}

/// Normalize a list-assignments payload.
///
/// A role embedded with a `name` or `permissions` stays on the assignment it
/// arrived with.
pub fn normalize_assignments(payload: Value, known: &[Permission]) -> Vec<UserRoleAssignment> {
    parse_items::<WireAssignment>(unwrap_collection(payload, ASSIGNMENT_KEYS), "assignment")
        .into_iter()
        .map(|wire| assignment_from_wire(wire, known))
        .collect()
}

/// Normalize a single-assignment response (assign).
pub fn normalize_assignment(payload: Value, known: &[Permission]) -> Option<UserRoleAssignment> {
    parse_items::<WireAssignment>(
        unwrap_collection(payload, SINGLE_ASSIGNMENT_KEYS),
        "assignment",
    )
    .into_iter()
    .next()
    .map(|wire| assignment_from_wire(wire, known))
}

// ─────────────────────────────────────────────────────────────────────────────
// Resolution
// ─────────────────────────────────────────────────────────────────────────────

/// Resolve the role an assignment points at.
///
/// The role embedded in this assignment wins; otherwise the id is looked up
/// in the roles collection. `None` means "no role" and is not an error.
pub fn resolve_role<'a>(
    catalog: &'a AuthzCatalog,
    assignment: &'a UserRoleAssignment,
) -> Option<&'a Role> {
    if assignment.role_id.is_empty() {
        return None;
    }
    assignment
        .embedded_role
        .as_ref()
        .or_else(|| catalog.role(&assignment.role_id))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;

    #[test]
    fn extract_id_handles_every_shape() {
        let bare: Ref<EmbeddedEntity> = Ref::Id("u1".into());
        let embedded: Ref<EmbeddedEntity> = Ref::Embedded(EmbeddedEntity::with_id("u2"));

        assert_eq!(extract_id(Some(&bare)), "u1");
        assert_eq!(extract_id(Some(&embedded)), "u2");
        assert_eq!(extract_id::<EmbeddedEntity>(None), "");
    }

    #[test]
    fn embedded_entity_falls_back_to_plain_id() {
        let r: Ref<EmbeddedEntity> = serde_json::from_value(json!({ "id": "u9" })).unwrap();
        assert_eq!(extract_id(Some(&r)), "u9");
    }

    #[test]
    fn wrapped_user_roles_payload() {
        let payload = json!({
            "userRoles": [{ "_id": "a1", "userId": { "_id": "u1" }, "roleId": "r1" }]
        });

        let assignments = normalize_assignments(payload, &[]);
        assert_eq!(assignments.len(), 1);

        let a = &assignments[0];
        assert_eq!(a.user_id, "u1");
        assert_eq!(a.role_id, "r1");
        assert_eq!(a.id, Some(AssignmentId::new("a1")));
        assert!(a.embedded_role.is_none());
    }

    #[test]
    fn single_object_is_coerced_to_list() {
        let payload = json!({ "_id": "a1", "userId": "u1", "roleId": "r1" });
        assert_eq!(normalize_assignments(payload, &[]).len(), 1);
    }

    #[test]
    fn unknown_shapes_become_empty() {
        assert!(normalize_assignments(json!({}), &[]).is_empty());
        assert!(normalize_assignments(Value::Null, &[]).is_empty());
        assert!(normalize_roles(json!("nope"), &[]).is_empty());
        assert!(normalize_permissions(json!({ "permission": null })).is_empty());
    }

    #[test]
    fn wrapped_permissions_and_roles() {
        let perms = normalize_permissions(json!({
            "permission": [
                { "_id": "p1", "name": "view_customers" },
                { "_id": "p2", "name": "edit_loans", "description": "Edit loans" }
            ]
        }));
        assert_eq!(perms.len(), 2);
        assert_eq!(perms[1].description.as_deref(), Some("Edit loans"));

        let roles = normalize_roles(
            json!({ "roles": [{ "_id": "r1", "name": "Manager", "permissions": ["p1", { "_id": "p2", "name": "edit_loans" }, "p404"] }] }),
            &perms,
        );
        assert_eq!(roles.len(), 1);
        let names: Vec<_> = roles[0].permissions.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["view_customers", "edit_loans"]);
    }

    #[test]
    fn embedded_role_stays_on_its_assignment() {
        let payload = json!([{
            "_id": "a1",
            "userId": "u1",
            "roleId": { "_id": "r7", "name": "Collector", "permissions": [{ "_id": "p1", "name": "view_loans" }] },
            "assignedBy": { "_id": "u0", "name": "Root" },
            "assignedAt": "2024-03-01T10:00:00Z"
        }]);

        let assignments = normalize_assignments(payload, &[]);
        let a = &assignments[0];
        assert_eq!(a.role_id, "r7");
        assert_eq!(a.assigned_by, "u0");
        assert_eq!(a.assigned_at.to_rfc3339(), "2024-03-01T10:00:00+00:00");

        let role = a.embedded_role.as_ref().unwrap();
        assert!(role.grants("view_loans"));
    }

    #[test]
    fn id_only_embedded_role_is_not_synthesised() {
        let assignments =
            normalize_assignments(json!([{ "userId": "u1", "roleId": { "_id": "r1" } }]), &[]);
        assert_eq!(assignments[0].role_id, "r1");
        assert!(assignments[0].id.is_none());
        assert!(assignments[0].embedded_role.is_none());
    }

    #[test]
    fn malformed_items_are_skipped() {
        let roles = normalize_roles(json!([{ "_id": "r1", "name": "ok" }, 42, { "name": "no id" }]), &[]);
        assert_eq!(roles.len(), 1);
    }

    #[test]
    fn single_role_response_may_be_wrapped() {
        let role = normalize_role(json!({ "role": { "_id": "r2", "name": "Teller" } }), &[]).unwrap();
        assert_eq!(role.id, "r2");
        assert!(normalize_role(json!({ "ok": true }), &[]).is_none());
    }

    #[test]
    fn resolve_role_prefers_the_assignments_own_embedded_role() {
        let payload = json!([
            { "_id": "a1", "userId": "u1", "roleId": { "_id": "r1", "name": "Embedded" } },
            { "_id": "a2", "userId": "u2", "roleId": "r1" },
            { "_id": "a3", "userId": "u3", "roleId": "missing" },
            { "_id": "a4", "userId": "u4" }
        ]);
        let catalog = AuthzCatalog::new(
            Vec::new(),
            vec![Role::new("r1", "Stored")],
            normalize_assignments(payload, &[]),
        );
        let resolved: Vec<_> = catalog
            .assignments
            .iter()
            .map(|a| resolve_role(&catalog, a).map(|role| role.name.as_str()))
            .collect();

        assert_eq!(resolved, vec![Some("Embedded"), Some("Stored"), None, None]);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: both wire shapes of a user reference normalize to the same id.
        #[test]
        fn user_reference_shapes_agree(id in "[a-f0-9]{1,24}") {
            let bare = normalize_assignments(json!([{ "userId": id.clone(), "roleId": "r1" }]), &[]);
            let embedded = normalize_assignments(json!([{ "userId": { "_id": id.clone() }, "roleId": "r1" }]), &[]);

            prop_assert_eq!(bare[0].user_id.as_str(), id.as_str());
            prop_assert_eq!(&bare[0].user_id, &embedded[0].user_id);
        }

        /// Property: normalization never panics on arbitrary scalar payloads.
        #[test]
        fn scalars_normalize_to_empty(n in any::<i64>(), s in ".{0,16}", b in any::<bool>()) {
            prop_assert!(normalize_permissions(json!(n)).is_empty());
            prop_assert!(normalize_roles(json!(s), &[]).is_empty());
            prop_assert!(normalize_assignments(json!(b), &[]).is_empty());
        }
    }
}
