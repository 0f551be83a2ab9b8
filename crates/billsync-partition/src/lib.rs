//! billsync Partition
//!
//! Session context and partition routing. A session belongs to exactly one
//! principal and, at any instant, to at most one active partition.
//!
//! ```rust
//! use std::sync::Arc;
//! use billsync_partition::{
//!     PartitionCatalog, PartitionDescriptor, PartitionName, PartitionRouter, Principal, Session,
//! };
//!
//! let bills = PartitionName::new("customer_bills").unwrap();
//! let catalog = Arc::new(PartitionCatalog::new().with(PartitionDescriptor::new(bills.clone())));
//! let session = Arc::new(Session::new(Principal::admin("owner")));
//! let router = PartitionRouter::new(catalog, session);
//!
//! assert_eq!(router.resolve_partition().unwrap(), bills);
//! ```

#![warn(unreachable_pub)]

pub mod catalog;
pub mod error;
pub mod name;
pub mod principal;
pub mod router;
pub mod session;

pub use catalog::{PartitionCatalog, PartitionDescriptor};
pub use error::PartitionError;
pub use name::PartitionName;
pub use principal::{Principal, Role};
pub use router::PartitionRouter;
pub use session::Session;
