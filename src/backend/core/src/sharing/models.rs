//! Sharing data models: identifiers, object permissions, org-wide defaults,
//! sharing rules, record shares, group memberships and directory users.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ═══════════════════════════════════════════════════════════════════════════════
// Identifiers
// ═══════════════════════════════════════════════════════════════════════════════

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id!(
    /// Strongly-typed user identifier.
    UserId
);
string_id!(
    /// Strongly-typed group (or queue) identifier.
    GroupId
);
string_id!(
    /// Strongly-typed role identifier.
    RoleId
);
string_id!(
    /// Strongly-typed tenant identifier.
    TenantId
);
string_id!(
    /// Runtime-defined collection identifier.
    CollectionId
);
string_id!(
    /// Identifier of a record inside a collection.
    RecordId
);

// ═══════════════════════════════════════════════════════════════════════════════
// Access Type
// ═══════════════════════════════════════════════════════════════════════════════

/// The operation a caller wants to perform on a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessType {
    Read,
    Edit,
    Delete,
}

impl AccessType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Edit => "edit",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for AccessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Object Permission
// ═══════════════════════════════════════════════════════════════════════════════

/// Object-level CRUD flags for a (user, collection) pair.
///
/// Produced by the permission resolver that sits outside this crate; the
/// sharing engine only consumes it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EffectiveObjectPermission {
    pub can_create: bool,
    pub can_read: bool,
    pub can_edit: bool,
    pub can_delete: bool,
    pub can_view_all: bool,
    pub can_modify_all: bool,
}

impl EffectiveObjectPermission {
    /// No permissions at all.
    pub fn none() -> Self {
        Self::default()
    }

    /// Create/read/edit/delete without any sharing bypass.
    pub fn crud() -> Self {
        Self {
            can_create: true,
            can_read: true,
            can_edit: true,
            can_delete: true,
            ..Self::default()
        }
    }

    /// Read only, without any sharing bypass.
    pub fn read_only() -> Self {
        Self {
            can_read: true,
            ..Self::default()
        }
    }

    pub fn with_view_all(mut self) -> Self {
        self.can_view_all = true;
        self
    }

    pub fn with_modify_all(mut self) -> Self {
        self.can_modify_all = true;
        self
    }

    /// Object-level gate: does the user hold the base permission for `access`?
    pub fn permits(&self, access: AccessType) -> bool {
        match access {
            AccessType::Read => self.can_read,
            AccessType::Edit => self.can_edit,
            AccessType::Delete => self.can_delete,
        }
    }

    /// Whether `canViewAll`/`canModifyAll` lets `access` skip record sharing.
    pub fn bypasses_sharing(&self, access: AccessType) -> bool {
        match access {
            AccessType::Read => self.can_view_all,
            AccessType::Edit | AccessType::Delete => self.can_modify_all,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Org-Wide Default
// ═══════════════════════════════════════════════════════════════════════════════

/// Baseline visibility of a collection for every user of a tenant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DefaultAccess {
    Private,
    PublicRead,
    /// Used when no org-wide default row exists.
    #[default]
    PublicReadWrite,
}

impl DefaultAccess {
    /// Whether this default alone grants `access` on every record.
    pub fn grants(&self, access: AccessType) -> bool {
        match self {
            Self::PublicReadWrite => true,
            Self::PublicRead => access == AccessType::Read,
            Self::Private => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "PRIVATE",
            Self::PublicRead => "PUBLIC_READ",
            Self::PublicReadWrite => "PUBLIC_READ_WRITE",
        }
    }

    /// Parse the stored column value. Unknown values are treated as `Private`.
    pub fn parse(s: &str) -> Self {
        match s {
            "PUBLIC_READ_WRITE" => Self::PublicReadWrite,
            "PUBLIC_READ" => Self::PublicRead,
            _ => Self::Private,
        }
    }
}

/// One org-wide default per (tenant, collection).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgWideDefault {
    pub tenant_id: TenantId,
    pub collection_id: CollectionId,
    pub internal_access: DefaultAccess,
}

impl OrgWideDefault {
    pub fn new(
        tenant_id: impl Into<TenantId>,
        collection_id: impl Into<CollectionId>,
        internal_access: DefaultAccess,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            collection_id: collection_id.into(),
            internal_access,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Access Level
// ═══════════════════════════════════════════════════════════════════════════════

/// Level granted by a sharing rule or a record share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessLevel {
    Read,
    ReadWrite,
}

impl AccessLevel {
    /// `READ_WRITE` satisfies every access type; `READ` only satisfies reads.
    pub fn satisfies(&self, access: AccessType) -> bool {
        match self {
            Self::ReadWrite => true,
            Self::Read => access == AccessType::Read,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "READ",
            Self::ReadWrite => "READ_WRITE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "READ" => Some(Self::Read),
            "READ_WRITE" => Some(Self::ReadWrite),
            _ => None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Principal
// ═══════════════════════════════════════════════════════════════════════════════

/// A population of users a sharing rule refers to, either as recipients
/// (`shared_to`) or as record owners (`shared_from`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Principal {
    User(UserId),
    Group(GroupId),
    /// Queues are stored as groups and resolve the same way.
    Queue(GroupId),
    Role(RoleId),
}

impl Principal {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::User(_) => "USER",
            Self::Group(_) => "GROUP",
            Self::Queue(_) => "QUEUE",
            Self::Role(_) => "ROLE",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::User(id) => id.as_str(),
            Self::Group(id) | Self::Queue(id) => id.as_str(),
            Self::Role(id) => id.as_str(),
        }
    }

    /// Build a principal from its stored `(type, id)` pair.
    pub fn from_parts(kind: &str, id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        match kind {
            "USER" => Some(Self::User(UserId(id))),
            "GROUP" => Some(Self::Group(GroupId(id))),
            "QUEUE" => Some(Self::Queue(GroupId(id))),
            "ROLE" => Some(Self::Role(RoleId(id))),
            _ => None,
        }
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.id())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Sharing Rule
// ═══════════════════════════════════════════════════════════════════════════════

/// What records a sharing rule opens up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "ruleType", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleKind {
    /// Records owned by members of `shared_from`.
    #[serde(rename_all = "camelCase")]
    OwnerBased { shared_from: Principal },
    /// Records matching field criteria. The criteria document is owned by
    /// the metadata service and is not interpreted here.
    CriteriaBased {
        #[serde(default)]
        criteria: serde_json::Value,
    },
}

/// A declarative rule extending visibility on a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharingRule {
    #[serde(default = "generate_id")]
    pub id: String,
    pub tenant_id: TenantId,
    pub collection_id: CollectionId,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub kind: RuleKind,
    pub shared_to: Principal,
    pub access_level: AccessLevel,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

impl SharingRule {
    /// Owner-based rule sharing records owned by `shared_from` with `shared_to`.
    pub fn owner_based(
        tenant_id: impl Into<TenantId>,
        collection_id: impl Into<CollectionId>,
        shared_from: Principal,
        shared_to: Principal,
        access_level: AccessLevel,
    ) -> Self {
        Self::new(
            tenant_id,
            collection_id,
            RuleKind::OwnerBased { shared_from },
            shared_to,
            access_level,
        )
    }

    /// Criteria-based rule sharing matching records with `shared_to`.
    pub fn criteria_based(
        tenant_id: impl Into<TenantId>,
        collection_id: impl Into<CollectionId>,
        criteria: serde_json::Value,
        shared_to: Principal,
        access_level: AccessLevel,
    ) -> Self {
        Self::new(
            tenant_id,
            collection_id,
            RuleKind::CriteriaBased { criteria },
            shared_to,
            access_level,
        )
    }

    fn new(
        tenant_id: impl Into<TenantId>,
        collection_id: impl Into<CollectionId>,
        kind: RuleKind,
        shared_to: Principal,
        access_level: AccessLevel,
    ) -> Self {
        Self {
            id: generate_id(),
            tenant_id: tenant_id.into(),
            collection_id: collection_id.into(),
            name: String::new(),
            kind,
            shared_to,
            access_level,
            active: true,
            created_at: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Record Share
// ═══════════════════════════════════════════════════════════════════════════════

/// Who a manual record share was granted to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShareSubject {
    User(UserId),
    Group(GroupId),
}

/// Explicit grant of access to a single record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordShare {
    #[serde(default = "generate_id")]
    pub id: String,
    pub tenant_id: TenantId,
    pub collection_id: CollectionId,
    pub record_id: RecordId,
    pub shared_with: ShareSubject,
    pub access_level: AccessLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl RecordShare {
    pub fn new(
        tenant_id: impl Into<TenantId>,
        collection_id: impl Into<CollectionId>,
        record_id: impl Into<RecordId>,
        shared_with: ShareSubject,
        access_level: AccessLevel,
    ) -> Self {
        Self {
            id: generate_id(),
            tenant_id: tenant_id.into(),
            collection_id: collection_id.into(),
            record_id: record_id.into(),
            shared_with,
            access_level,
            reason: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Group Membership
// ═══════════════════════════════════════════════════════════════════════════════

/// Kind of member in a group membership edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemberType {
    User,
    Group,
}

/// Directed edge `member_id ∈ group_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMembership {
    pub group_id: GroupId,
    pub member_type: MemberType,
    pub member_id: String,
}

impl GroupMembership {
    pub fn user(group_id: impl Into<GroupId>, user_id: impl Into<UserId>) -> Self {
        Self {
            group_id: group_id.into(),
            member_type: MemberType::User,
            member_id: user_id.into().0,
        }
    }

    /// `child` is nested inside `parent`.
    pub fn nested(parent: impl Into<GroupId>, child: impl Into<GroupId>) -> Self {
        Self {
            group_id: parent.into(),
            member_type: MemberType::Group,
            member_id: child.into().0,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Directory User
// ═══════════════════════════════════════════════════════════════════════════════

/// The slice of a platform user the sharing engine needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<TenantId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager_id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_id: Option<RoleId>,
}

impl User {
    pub fn new(id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            tenant_id: None,
            manager_id: None,
            role_id: None,
        }
    }

    pub fn in_tenant(mut self, tenant_id: impl Into<TenantId>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn with_manager(mut self, manager_id: impl Into<UserId>) -> Self {
        self.manager_id = Some(manager_id.into());
        self
    }

    pub fn with_role(mut self, role_id: impl Into<RoleId>) -> Self {
        self.role_id = Some(role_id.into());
        self
    }

    /// Users without a tenant are platform-wide and belong to every tenant.
    pub fn belongs_to(&self, tenant_id: &TenantId) -> bool {
        self.tenant_id.as_ref().map_or(true, |t| t == tenant_id)
    }

    pub fn has_role_in(&self, role_id: &RoleId, tenant_id: &TenantId) -> bool {
        self.role_id.as_ref() == Some(role_id) && self.belongs_to(tenant_id)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Manager Scope
// ═══════════════════════════════════════════════════════════════════════════════

/// How far up the manager chain record access cascades.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManagerScope {
    /// Only the owner's direct manager.
    #[default]
    Direct,
    /// Every manager above the owner, with a cycle guard.
    Transitive,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
