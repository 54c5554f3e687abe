//! Record-level sharing: access decisions and list filters.
//!
//! This module provides:
//! - **Models**: identifiers, object permissions, org-wide defaults, rules, shares
//! - **Ports**: read-only interfaces the engine consumes its data through
//! - **Group Resolver**: transitive group membership, cycle-safe in both directions
//! - **Access Service**: ordered grant evaluation for a single record
//! - **Filter Compiler**: the same grants compiled into a structured predicate
//!
//! # Usage
//!
//! ```rust,ignore
//! use sharing_core::sharing::{AccessType, RecordAccessService};
//! use sharing_core::store::memory::InMemoryAccessStore;
//!
//! let service = RecordAccessService::with_store(Arc::new(store));
//!
//! // Single record
//! let allowed = service
//!     .can_access(&user_id, &tenant_id, &collection_id, &record_id, Some(&owner_id), AccessType::Edit)
//!     .await?;
//!
//! // List query
//! if let Some(predicate) = service
//!     .build_sharing_where_clause(&user_id, &tenant_id, &collection_id)
//!     .await?
//! {
//!     let fragment = predicate.to_sql(&FilterColumns::default(), 2);
//! }
//! ```

pub mod access;
pub mod compiler;
pub mod filter;
pub mod groups;
pub mod models;
pub mod ports;
pub mod rules;
pub mod subject;

pub use access::{AccessDecision, DenyReason, GrantSource, RecordAccessService};
pub use filter::{
    FilterClause, FilterColumn, FilterColumns, FilterOperator, SharingPredicate, SqlFragment,
};
pub use groups::{GroupMembershipResolver, DEFAULT_MAX_GROUP_DEPTH};
pub use models::{
    AccessLevel, AccessType, CollectionId, DefaultAccess, EffectiveObjectPermission, GroupId,
    GroupMembership, ManagerScope, MemberType, OrgWideDefault, Principal, RecordId, RecordShare,
    RoleId, RuleKind, ShareSubject, SharingRule, TenantId, User, UserId,
};
pub use ports::{GroupMembershipStore, ObjectPermissionResolver, SharingStore, UserDirectory};
pub use rules::RecordScope;
pub use subject::AccessSubject;
