//! `lendora-auth` — pure authorization model and resolution (no IO).
//!
//! This crate is intentionally decoupled from HTTP and from the shared store:
//! everything here is a function of an [`AuthzCatalog`] snapshot.

pub mod assignment;
pub mod authorize;
pub mod catalog;
pub mod permissions;
pub mod reference;
pub mod resolver;
pub mod roles;

pub use assignment::{AssignmentRequest, UserRoleAssignment};
pub use authorize::{AccessExplanation, AccessGuard, AccessReason, AuthzError, Principal};
pub use catalog::AuthzCatalog;
pub use permissions::Permission;
pub use reference::{Ref, extract_id};
pub use resolver::{
    can_access, effective_permissions, get_user_roles, has_permission, permission_candidates,
};
pub use roles::{ADMIN_ROLE, MAX_ROLE_NAME_LEN, Role, RoleDraft, RolePatch};
