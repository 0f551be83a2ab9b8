//! Partition catalog
//!
//! Ordered set of partitions the deployment knows about. Order matters: an
//! administrator without a selection falls back to the first entry open to
//! the admin role.

use crate::name::PartitionName;
use crate::principal::Role;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

fn all_roles() -> Vec<Role> {
    vec![Role::Admin, Role::Employee]
}

/// One catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionDescriptor {
    /// Partition identity
    pub name: PartitionName,
    /// Roles allowed to work in this partition
    #[serde(default = "all_roles")]
    pub allowed_roles: Vec<Role>,
}

impl PartitionDescriptor {
    /// Create new descriptor open to every role
    #[must_use]
    pub fn new(name: PartitionName) -> Self {
        Self {
            name,
            allowed_roles: all_roles(),
        }
    }

    /// With allowed roles
    #[inline]
    #[must_use]
    pub fn with_roles(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.allowed_roles = roles.into_iter().collect();
        self
    }

    /// Check if `role` may use this partition
    #[inline]
    #[must_use]
    pub fn allows(&self, role: Role) -> bool {
        self.allowed_roles.contains(&role)
    }
}

/// Ordered partition catalog
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionCatalog {
    entries: IndexMap<PartitionName, PartitionDescriptor>,
}

impl PartitionCatalog {
    /// Empty catalog
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With descriptor appended (replaces an existing entry in place)
    #[must_use]
    pub fn with(mut self, descriptor: PartitionDescriptor) -> Self {
        self.insert(descriptor);
        self
    }

    /// Add or replace a descriptor, keeping the original position on replace
    pub fn insert(&mut self, descriptor: PartitionDescriptor) {
        if self.entries.contains_key(&descriptor.name) {
            tracing::warn!(partition = %descriptor.name, "duplicate catalog entry replaced");
        }
        self.entries.insert(descriptor.name.clone(), descriptor);
    }

    /// Look up a descriptor
    #[inline]
    #[must_use]
    pub fn get(&self, name: &PartitionName) -> Option<&PartitionDescriptor> {
        self.entries.get(name)
    }

    /// Check membership
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &PartitionName) -> bool {
        self.entries.contains_key(name)
    }

    /// Check if `name` exists and is open to `role`
    #[must_use]
    pub fn is_open_to(&self, name: &PartitionName, role: Role) -> bool {
        self.get(name).is_some_and(|d| d.allows(role))
    }

    /// First entry open to `role`, in catalog order
    #[must_use]
    pub fn first_open_to(&self, role: Role) -> Option<&PartitionName> {
        self.entries.values().find(|d| d.allows(role)).map(|d| &d.name)
    }

    /// Iterate descriptors in catalog order
    pub fn iter(&self) -> impl Iterator<Item = &PartitionDescriptor> {
        self.entries.values()
    }

    /// Iterate names in catalog order
    pub fn names(&self) -> impl Iterator<Item = &PartitionName> {
        self.entries.keys()
    }

    /// Number of entries
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<PartitionDescriptor> for PartitionCatalog {
    fn from_iter<I: IntoIterator<Item = PartitionDescriptor>>(iter: I) -> Self {
        let mut catalog = Self::new();
        for descriptor in iter {
            catalog.insert(descriptor);
        }
        catalog
    }
}
