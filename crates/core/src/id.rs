//! Strongly-typed identifiers used across the domain.
//!
//! The remote authority issues opaque string ids (document ids), so these are
//! string newtypes rather than UUIDs. An empty id is representable: it is what
//! the normalizer produces for an absent reference, and it never matches a
//! real entity.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Identifier of a user (staff account).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

/// Identifier of a role.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleId(String);

/// Identifier of a permission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionId(String);

/// Server-assigned identifier of a user-role assignment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssignmentId(String);

macro_rules! impl_string_id {
    ($t:ty, $name:literal) => {
        impl $t {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Parse a non-empty identifier, trimming surrounding whitespace.
            pub fn parse(raw: &str) -> Result<Self, DomainError> {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    return Err(DomainError::invalid_id(format!("{} must not be empty", $name)));
                }
                Ok(Self(trimmed.to_string()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $t {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $t {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<$t> for String {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl PartialEq<str> for $t {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $t {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }
    };
}

impl_string_id!(UserId, "UserId");
impl_string_id!(RoleId, "RoleId");
impl_string_id!(PermissionId, "PermissionId");
impl_string_id!(AssignmentId, "AssignmentId");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rejects_blank() {
        assert!(matches!(UserId::parse("   "), Err(DomainError::InvalidId(_))));
        assert_eq!(RoleId::parse(" r1 ").unwrap(), RoleId::new("r1"));
    }

    #[test]
    fn serializes_as_bare_string() {
        let json = serde_json::to_string(&PermissionId::new("p1")).unwrap();
        assert_eq!(json, "\"p1\"");
    }

    #[test]
    fn compares_with_str() {
        assert!(UserId::new("u1") == "u1");
        assert!(UserId::default().is_empty());
    }
}
