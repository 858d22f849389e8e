//! Permission resolver.
//!
//! Pure functions over an [`AuthzCatalog`]: assignments → roles → permissions.
//! No admin bypass happens here; see [`crate::authorize::AccessGuard`].

use std::collections::BTreeSet;

use lendora_core::UserId;

use crate::reference::resolve_role;
use crate::{AuthzCatalog, Role};

fn user_roles<'a, 'u>(
    catalog: &'a AuthzCatalog,
    user_id: &'u UserId,
) -> impl Iterator<Item = &'a Role> + 'u
where
    'a: 'u,
{
    catalog
        .assignments
        .iter()
        .filter(move |a| !user_id.is_empty() && &a.user_id == user_id)
        .filter_map(move |a| resolve_role(catalog, a))
}

/// Roles assigned to `user_id`, in assignment order.
///
/// Unresolvable role references are dropped. Duplicates are kept: a role
/// assigned twice appears twice.
pub fn get_user_roles<'a>(catalog: &'a AuthzCatalog, user_id: &UserId) -> Vec<&'a Role> {
    user_roles(catalog, user_id).collect()
}

/// Whether any of the user's roles carries a permission named `permission_name`.
pub fn has_permission(catalog: &AuthzCatalog, user_id: &UserId, permission_name: &str) -> bool {
    user_roles(catalog, user_id).any(|role| role.grants(permission_name))
}

/// Candidate permission names for a resource/action pair, deduplicated in
/// order: `action_resource`, `action_resources`, their lower-cased forms,
/// then `resource_action`.
///
/// Remote permission names do not follow a single convention; this list is a
/// compatibility heuristic and can under- or over-match names it was not
/// written for.
pub fn permission_candidates(resource: &str, action: &str) -> Vec<String> {
    let singular = format!("{action}_{resource}");
    let plural = format!("{action}_{resource}s");
    let raw = [
        singular.to_lowercase(),
        plural.to_lowercase(),
        format!("{resource}_{action}"),
    ];

    let mut candidates = vec![singular, plural];
    for name in raw {
        if !candidates.contains(&name) {
            candidates.push(name);
        }
    }
    candidates
}

/// Whether the user may perform `action` on `resource`.
pub fn can_access(catalog: &AuthzCatalog, user_id: &UserId, resource: &str, action: &str) -> bool {
    permission_candidates(resource, action)
        .iter()
        .any(|candidate| has_permission(catalog, user_id, candidate))
}

/// Sorted, deduplicated names of every permission the user holds.
pub fn effective_permissions(catalog: &AuthzCatalog, user_id: &UserId) -> Vec<String> {
    user_roles(catalog, user_id)
        .flat_map(|role| role.permissions.iter().map(|p| p.name.clone()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
