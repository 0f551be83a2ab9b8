//! Partition router
//!
//! Maps the session's principal to exactly one partition:
//! - administrators: explicit selection → assigned partition → first admin entry
//! - employees: assigned partition, nothing else
//!
//! Anything unresolvable is `PartitionError::Unconfigured`.

use crate::catalog::PartitionCatalog;
use crate::error::PartitionError;
use crate::name::PartitionName;
use crate::principal::Role;
use crate::session::Session;
use std::sync::Arc;

/// Resolves and switches the session's partition
#[derive(Debug, Clone)]
pub struct PartitionRouter {
    catalog: Arc<PartitionCatalog>,
    session: Arc<Session>,
}

impl PartitionRouter {
    /// Create new router
    #[must_use]
    pub fn new(catalog: Arc<PartitionCatalog>, session: Arc<Session>) -> Self {
        Self { catalog, session }
    }

    /// Catalog in use
    #[inline]
    #[must_use]
    pub fn catalog(&self) -> &PartitionCatalog {
        &self.catalog
    }

    /// Session in use
    #[inline]
    #[must_use]
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Resolve the partition the principal should work in
    ///
    /// # Errors
    /// `PartitionError::Unconfigured` if no usable partition exists
    pub fn resolve_partition(&self) -> Result<PartitionName, PartitionError> {
        let principal = self.session.principal();
        let role = principal.role;

        let resolved = match role {
            Role::Admin => self
                .session
                .selected()
                .filter(|name| self.catalog.is_open_to(name, role))
                .or_else(|| self.assigned_if_open(role))
                .or_else(|| self.catalog.first_open_to(role).cloned()),
            Role::Employee => self.assigned_if_open(role),
        };

        resolved.ok_or_else(|| {
            tracing::warn!(
                principal = %principal.id,
                role = %role,
                assigned = ?principal.assigned_partition,
                "no partition resolvable"
            );
            PartitionError::unconfigured(principal.id.clone())
        })
    }

    /// Switch the administrator's selection
    ///
    /// The selection is left untouched on error.
    ///
    /// # Errors
    /// - `PartitionError::SelectionForbidden` for non-administrators
    /// - `PartitionError::InvalidName` for malformed names
    /// - `PartitionError::UnknownPartition` for names outside the catalog
    /// - `PartitionError::NotPermitted` for entries closed to administrators
    pub fn select_partition(&self, name: &str) -> Result<PartitionName, PartitionError> {
        let role = self.session.role();
        if !role.can_select() {
            return Err(PartitionError::SelectionForbidden(role));
        }

        let name = PartitionName::new(name)?;
        let Some(descriptor) = self.catalog.get(&name) else {
            return Err(PartitionError::UnknownPartition(name.to_string()));
        };
        if !descriptor.allows(role) {
            return Err(PartitionError::not_permitted(name.as_str(), role));
        }

        tracing::info!(principal = %self.session.principal().id, partition = %name, "partition selected");
        self.session.set_selected(name.clone());
        Ok(name)
    }

    fn assigned_if_open(&self, role: Role) -> Option<PartitionName> {
        self.session
            .principal()
            .assigned_partition
            .as_ref()
            .filter(|name| self.catalog.is_open_to(name, role))
            .cloned()
    }
}
