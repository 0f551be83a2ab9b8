//! Catalog listing and principal resolution

use billsync_partition::{
    PartitionCatalog, PartitionError, PartitionName, PartitionRouter, Principal, Session,
};
use serde::Serialize;
use std::fmt::Write as _;
use std::sync::Arc;

/// Outcome of resolving a principal against the catalog
#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    /// Principal that was resolved
    pub principal: Principal,
    /// Partition it would work in
    pub partition: Option<PartitionName>,
    /// Why nothing resolved
    pub error: Option<String>,
}

/// Resolve `principal`, applying `select` first when given
#[must_use]
pub fn resolve(catalog: PartitionCatalog, principal: Principal, select: Option<&str>) -> Resolution {
    let session = Arc::new(Session::new(principal.clone()));
    let router = PartitionRouter::new(Arc::new(catalog), session);

    let result: Result<PartitionName, PartitionError> = match select {
        Some(name) => router
            .select_partition(name)
            .and_then(|_| router.resolve_partition()),
        None => router.resolve_partition(),
    };
    match result {
        Ok(partition) => Resolution {
            principal,
            partition: Some(partition),
            error: None,
        },
        Err(e) => Resolution {
            principal,
            partition: None,
            error: Some(e.to_string()),
        },
    }
}

/// One line per catalog entry
#[must_use]
pub fn describe_catalog(catalog: &PartitionCatalog) -> String {
    let mut out = String::new();
    for (index, descriptor) in catalog.iter().enumerate() {
        let roles: Vec<&str> = descriptor.allowed_roles.iter().map(|r| r.as_str()).collect();
        let _ = writeln!(out, "{:>2}. {:<28} [{}]", index + 1, descriptor.name, roles.join(", "));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use billsync_partition::{PartitionDescriptor, Role};

    fn name(s: &str) -> PartitionName {
        PartitionName::new(s).unwrap()
    }

    #[test]
    fn admin_falls_back_to_first_entry() {
        let resolution = resolve(AppConfig::default().catalog(), Principal::admin("owner"), None);
        assert_eq!(resolution.partition, Some(name("customer_bills")));
        assert!(resolution.error.is_none());
    }

    #[test]
    fn admin_selection_applies() {
        let resolution = resolve(
            AppConfig::default().catalog(),
            Principal::admin("owner"),
            Some("tagihan_nia"),
        );
        assert_eq!(resolution.partition, Some(name("tagihan_nia")));
    }

    #[test]
    fn employee_selection_is_refused() {
        let resolution = resolve(
            AppConfig::default().catalog(),
            Principal::employee("clerk", name("tagihan_yono")),
            Some("tagihan_nia"),
        );
        assert_eq!(resolution.partition, None);
        assert!(resolution.error.unwrap().contains("may not select"));
    }

    #[test]
    fn describes_every_entry() {
        let catalog = PartitionCatalog::new()
            .with(PartitionDescriptor::new(name("customer_bills")).with_roles([Role::Admin]))
            .with(PartitionDescriptor::new(name("tagihan_yono")));
        let text = describe_catalog(&catalog);
        assert_eq!(text.lines().count(), 2);
        assert!(text.lines().next().unwrap().contains("[admin]"));
        assert!(text.contains("[admin, employee]"));
    }
}
