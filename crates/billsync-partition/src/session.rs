//! Session context
//!
//! Holds the principal plus the two pieces of mutable routing state: the
//! administrator's explicit selection and the partition the replica is
//! currently attached to. Shared by `Arc` between router, gateway and engine.

use crate::name::PartitionName;
use crate::principal::{Principal, Role};
use parking_lot::RwLock;

/// Per-login routing context
#[derive(Debug)]
pub struct Session {
    principal: Principal,
    selected: RwLock<Option<PartitionName>>,
    active: RwLock<Option<PartitionName>>,
}

impl Session {
    /// Create new session for `principal`
    #[must_use]
    pub fn new(principal: Principal) -> Self {
        Self {
            principal,
            selected: RwLock::new(None),
            active: RwLock::new(None),
        }
    }

    /// Authenticated principal
    #[inline]
    #[must_use]
    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    /// Role shortcut
    #[inline]
    #[must_use]
    pub fn role(&self) -> Role {
        self.principal.role
    }

    /// Explicit administrator selection, if any
    #[must_use]
    pub fn selected(&self) -> Option<PartitionName> {
        self.selected.read().clone()
    }

    pub(crate) fn set_selected(&self, name: PartitionName) {
        *self.selected.write() = Some(name);
    }

    /// Partition the replica is attached to, if any
    #[must_use]
    pub fn active(&self) -> Option<PartitionName> {
        self.active.read().clone()
    }

    /// Record the attached partition (`None` while switching or shut down)
    pub fn set_active(&self, name: Option<PartitionName>) {
        *self.active.write() = name;
    }
}
