//! Error types for partition routing

use crate::principal::Role;

/// Partition routing errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PartitionError {
    /// Principal has no resolvable partition; callers must fail closed
    #[error("no partition configured for principal '{principal}'")]
    Unconfigured {
        /// Principal id
        principal: String,
    },

    /// Name is not in the catalog
    #[error("unknown partition: {0}")]
    UnknownPartition(String),

    /// Partition exists but is not open to the role
    #[error("partition '{partition}' is not open to role {role}")]
    NotPermitted {
        /// Requested partition
        partition: String,
        /// Role of the requesting principal
        role: Role,
    },

    /// Only administrators may switch partitions
    #[error("role {0} may not select a partition")]
    SelectionForbidden(Role),

    /// Name fails validation
    #[error("invalid partition name '{name}': {reason}")]
    InvalidName {
        /// Offending name
        name: String,
        /// What is wrong with it
        reason: &'static str,
    },
}

impl PartitionError {
    /// Create unconfigured error
    pub fn unconfigured(principal: impl Into<String>) -> Self {
        Self::Unconfigured {
            principal: principal.into(),
        }
    }

    /// Create not-permitted error
    pub fn not_permitted(partition: impl Into<String>, role: Role) -> Self {
        Self::NotPermitted {
            partition: partition.into(),
            role,
        }
    }

    /// Configuration mistakes the caller can correct by choosing differently
    #[inline]
    #[must_use]
    pub fn is_configuration_error(&self) -> bool {
        !matches!(self, Self::Unconfigured { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(!PartitionError::unconfigured("emp-1").is_configuration_error());
        assert!(PartitionError::UnknownPartition("x".into()).is_configuration_error());
        assert!(PartitionError::SelectionForbidden(Role::Employee).is_configuration_error());
        assert!(PartitionError::not_permitted("x", Role::Employee).is_configuration_error());
    }

    #[test]
    fn display() {
        let err = PartitionError::not_permitted("tagihan_nia", Role::Employee);
        assert_eq!(
            err.to_string(),
            "partition 'tagihan_nia' is not open to role employee"
        );
    }
}
