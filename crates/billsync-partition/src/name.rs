//! Validated partition names

use crate::error::PartitionError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identity of a partition
///
/// Non-empty, lowercase ASCII letters, digits and `_` only. The name doubles
/// as the remote table name, so nothing else is allowed through.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PartitionName(String);

impl PartitionName {
    /// Validate and wrap a name
    ///
    /// # Errors
    /// `PartitionError::InvalidName` when empty or containing other characters
    pub fn new(name: impl Into<String>) -> Result<Self, PartitionError> {
        let name = name.into();
        if name.is_empty() {
            return Err(PartitionError::InvalidName {
                name,
                reason: "empty",
            });
        }
        if !name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
        {
            return Err(PartitionError::InvalidName {
                name,
                reason: "only lowercase letters, digits and '_' are allowed",
            });
        }
        Ok(Self(name))
    }

    /// Borrow as string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PartitionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl FromStr for PartitionName {
    type Err = PartitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for PartitionName {
    type Error = PartitionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PartitionName> for String {
    fn from(name: PartitionName) -> Self {
        name.0
    }
}

impl AsRef<str> for PartitionName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
