//! Port adapters.
//!
//! - [`memory::InMemoryAccessStore`]: every port over in-process maps, with
//!   snapshot loading and fault injection
//! - [`postgres::PgSharingStore`]: read-only queries over the control plane tables

pub mod memory;
pub mod postgres;

pub use memory::{AccessSnapshot, InMemoryAccessStore, PermissionEntry, Port};
pub use postgres::PgSharingStore;
