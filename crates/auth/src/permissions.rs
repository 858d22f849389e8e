use lendora_core::{Entity, PermissionId};
use serde::{Deserialize, Serialize};

/// Atomic named capability (e.g. `"view_customers"`).
///
/// `name` is what checks compare against; `id` is only used to reference the
/// permission from roles and request bodies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permission {
    pub id: PermissionId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Permission {
    pub fn new(id: impl Into<PermissionId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl Entity for Permission {
    type Id = PermissionId;

    fn id(&self) -> &PermissionId {
        &self.id
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.name)
    }
}
