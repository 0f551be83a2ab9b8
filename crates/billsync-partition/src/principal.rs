//! Principals and roles

use crate::name::PartitionName;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of an authenticated principal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// May switch among catalog partitions
    Admin,
    /// Pinned to the assigned partition
    Employee,
}

impl Role {
    /// Lowercase name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Employee => "employee",
        }
    }

    /// Check if this role may select partitions
    #[inline]
    #[must_use]
    pub fn can_select(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authenticated principal as handed over by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Stable identity
    pub id: String,
    /// Human-readable name
    pub display_name: String,
    /// Role
    pub role: Role,
    /// Partition assigned by the operator, if any
    #[serde(default)]
    pub assigned_partition: Option<PartitionName>,
}

impl Principal {
    /// Create new administrator
    #[must_use]
    pub fn admin(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            display_name: id.clone(),
            id,
            role: Role::Admin,
            assigned_partition: None,
        }
    }

    /// Create new employee pinned to `partition`
    #[must_use]
    pub fn employee(id: impl Into<String>, partition: PartitionName) -> Self {
        let id = id.into();
        Self {
            display_name: id.clone(),
            id,
            role: Role::Employee,
            assigned_partition: Some(partition),
        }
    }

    /// With display name
    #[inline]
    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// With assigned partition
    #[inline]
    #[must_use]
    pub fn with_assigned_partition(mut self, partition: Option<PartitionName>) -> Self {
        self.assigned_partition = partition;
        self
    }
}
