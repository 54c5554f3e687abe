#![allow(clippy::result_large_err)]
//! # Sharing Core
//!
//! Record-level access control and sharing resolution for a multi-tenant,
//! schema-driven control plane.
//!
//! ## Architecture
//!
//! - **Group Resolver**: transitive nested-group membership in both directions, cycle-safe and depth-bounded
//! - **Access Service**: ordered, short-circuiting grant evaluation for a single record
//! - **Filter Compiler**: the same grants compiled into a structured predicate for list queries
//! - **Ports**: read-only data interfaces, with in-memory and PostgreSQL adapters
//! - **Telemetry**: structured logging and decision metrics

pub mod config;
pub mod error;
pub mod sharing;
pub mod store;
pub mod telemetry;

pub use error::{ErrorCode, ErrorContext, ErrorDetails, ErrorSeverity, Result, SharingError};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{Config, DatabaseConfig, SharingConfig};
    pub use crate::error::{
        ErrorCode, ErrorContext, ErrorDetails, ErrorSeverity, Result, SharingError,
    };
    pub use crate::sharing::{
        AccessDecision, AccessLevel, AccessSubject, AccessType, CollectionId, DefaultAccess,
        DenyReason, EffectiveObjectPermission, FilterClause, FilterColumn, FilterColumns,
        FilterOperator, GrantSource, GroupId, GroupMembership, GroupMembershipResolver,
        GroupMembershipStore, ManagerScope, ObjectPermissionResolver, OrgWideDefault, Principal,
        RecordAccessService, RecordId, RecordShare, RoleId, RuleKind, ShareSubject,
        SharingPredicate, SharingRule, SharingStore, SqlFragment, TenantId, User, UserDirectory,
        UserId,
    };
    pub use crate::store::{AccessSnapshot, InMemoryAccessStore, PgSharingStore, Port};
    pub use crate::telemetry::{init_telemetry, TelemetryConfig};
}
