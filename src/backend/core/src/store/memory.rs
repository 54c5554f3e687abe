//! In-memory implementation of every data port.
//!
//! Backs unit and integration tests, benchmarks and the CLI. State lives in
//! `DashMap`s behind `Arc`, so clones share the same data and the store can
//! be mutated while a service holds it.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{ErrorCode, ErrorContext, Result, SharingError};
use crate::sharing::models::{
    CollectionId, EffectiveObjectPermission, GroupId, GroupMembership, MemberType,
    OrgWideDefault, RecordId, RecordShare, RoleId, ShareSubject, SharingRule, TenantId, User,
    UserId,
};
use crate::sharing::ports::{
    GroupMembershipStore, ObjectPermissionResolver, SharingStore, UserDirectory,
};

// ═══════════════════════════════════════════════════════════════════════════════
// Ports
// ═══════════════════════════════════════════════════════════════════════════════

/// A data port of the store, for fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Port {
    ObjectPermissions,
    Sharing,
    Users,
    Groups,
}

impl Port {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ObjectPermissions => "object_permissions",
            Self::Sharing => "sharing",
            Self::Users => "users",
            Self::Groups => "group_membership",
        }
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Store
// ═══════════════════════════════════════════════════════════════════════════════

/// Thread-safe in-memory store implementing all four ports.
///
/// Users without an explicit object permission get `default_permission`
/// (full CRUD, no bypass, unless overridden).
#[derive(Debug, Clone)]
pub struct InMemoryAccessStore {
    default_permission: Arc<RwLock<EffectiveObjectPermission>>,
    permissions: Arc<DashMap<(UserId, CollectionId), EffectiveObjectPermission>>,
    org_wide_defaults: Arc<DashMap<(TenantId, CollectionId), OrgWideDefault>>,
    rules: Arc<DashMap<(TenantId, CollectionId), Vec<SharingRule>>>,
    shares: Arc<DashMap<(CollectionId, RecordId), Vec<RecordShare>>>,
    users: Arc<DashMap<UserId, User>>,
    /// Direct members per group.
    members: Arc<DashMap<GroupId, BTreeSet<(MemberType, String)>>>,
    failing: Arc<Mutex<HashSet<Port>>>,
}

impl Default for InMemoryAccessStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryAccessStore {
    pub fn new() -> Self {
        Self {
            default_permission: Arc::new(RwLock::new(EffectiveObjectPermission::crud())),
            permissions: Arc::new(DashMap::new()),
            org_wide_defaults: Arc::new(DashMap::new()),
            rules: Arc::new(DashMap::new()),
            shares: Arc::new(DashMap::new()),
            users: Arc::new(DashMap::new()),
            members: Arc::new(DashMap::new()),
            failing: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Builders
    // ─────────────────────────────────────────────────────────────────────────

    pub fn with_default_permission(self, permission: EffectiveObjectPermission) -> Self {
        *self.default_permission.write() = permission;
        self
    }

    pub fn with_permission(
        self,
        user_id: impl Into<UserId>,
        collection_id: impl Into<CollectionId>,
        permission: EffectiveObjectPermission,
    ) -> Self {
        self.insert_permission(user_id.into(), collection_id.into(), permission);
        self
    }

    pub fn with_org_wide_default(self, owd: OrgWideDefault) -> Self {
        self.insert_org_wide_default(owd);
        self
    }

    pub fn with_rule(self, rule: SharingRule) -> Self {
        self.insert_rule(rule);
        self
    }

    pub fn with_record_share(self, share: RecordShare) -> Self {
        self.insert_record_share(share);
        self
    }

    pub fn with_user(self, user: User) -> Self {
        self.insert_user(user);
        self
    }

    pub fn with_membership(self, membership: GroupMembership) -> Self {
        self.insert_membership(membership);
        self
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutation
    // ─────────────────────────────────────────────────────────────────────────

    pub fn insert_permission(
        &self,
        user_id: UserId,
        collection_id: CollectionId,
        permission: EffectiveObjectPermission,
    ) {
        self.permissions.insert((user_id, collection_id), permission);
    }

    pub fn insert_org_wide_default(&self, owd: OrgWideDefault) {
        self.org_wide_defaults
            .insert((owd.tenant_id.clone(), owd.collection_id.clone()), owd);
    }

    pub fn insert_rule(&self, rule: SharingRule) {
        self.rules
            .entry((rule.tenant_id.clone(), rule.collection_id.clone()))
            .or_default()
            .push(rule);
    }

    pub fn insert_record_share(&self, share: RecordShare) {
        self.shares
            .entry((share.collection_id.clone(), share.record_id.clone()))
            .or_default()
            .push(share);
    }

    pub fn insert_user(&self, user: User) {
        self.users.insert(user.id.clone(), user);
    }

    pub fn insert_membership(&self, membership: GroupMembership) {
        self.members
            .entry(membership.group_id)
            .or_default()
            .insert((membership.member_type, membership.member_id));
    }

    /// Make every call to `port` fail with [`ErrorCode::PortUnavailable`].
    pub fn fail_port(&self, port: Port) {
        debug!(port = %port, "Injecting port failure");
        self.failing.lock().insert(port);
    }

    pub fn restore_port(&self, port: Port) {
        self.failing.lock().remove(&port);
    }

    fn check(&self, port: Port) -> Result<()> {
        if self.failing.lock().contains(&port) {
            return Err(SharingError::port_unavailable(
                port.as_str(),
                "injected failure",
            ));
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Snapshots
    // ─────────────────────────────────────────────────────────────────────────

    pub fn from_snapshot(snapshot: AccessSnapshot) -> Self {
        let store = Self::new();
        if let Some(permission) = snapshot.default_permission {
            *store.default_permission.write() = permission;
        }
        for entry in snapshot.permissions {
            store.insert_permission(entry.user_id, entry.collection_id, entry.permission);
        }
        for owd in snapshot.org_wide_defaults {
            store.insert_org_wide_default(owd);
        }
        for rule in snapshot.sharing_rules {
            store.insert_rule(rule);
        }
        for share in snapshot.record_shares {
            store.insert_record_share(share);
        }
        for user in snapshot.users {
            store.insert_user(user);
        }
        for membership in snapshot.memberships {
            store.insert_membership(membership);
        }
        store
    }

    /// Load a JSON or YAML snapshot, chosen by file extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let snapshot = AccessSnapshot::load(path)?;
        Ok(Self::from_snapshot(snapshot))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Snapshot Format
// ═══════════════════════════════════════════════════════════════════════════════

/// Object permission of one user on one collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionEntry {
    pub user_id: UserId,
    pub collection_id: CollectionId,
    #[serde(flatten)]
    pub permission: EffectiveObjectPermission,
}

/// Serializable contents of an [`InMemoryAccessStore`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccessSnapshot {
    pub default_permission: Option<EffectiveObjectPermission>,
    pub permissions: Vec<PermissionEntry>,
    pub org_wide_defaults: Vec<OrgWideDefault>,
    pub sharing_rules: Vec<SharingRule>,
    pub record_shares: Vec<RecordShare>,
    pub users: Vec<User>,
    pub memberships: Vec<GroupMembership>,
}

impl AccessSnapshot {
    pub fn from_json(input: &str) -> Result<Self> {
        Ok(serde_json::from_str(input)?)
    }

    pub fn from_yaml(input: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(input)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).with_error_code(ErrorCode::InvalidSnapshot)?;

        let snapshot = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json(&content)?,
            Some("yaml") | Some("yml") => Self::from_yaml(&content)?,
            other => {
                return Err(SharingError::new(
                    ErrorCode::InvalidSnapshot,
                    format!(
                        "Unsupported snapshot format: {}",
                        other.unwrap_or("<none>")
                    ),
                ))
            }
        };

        info!(
            path = %path.display(),
            users = snapshot.users.len(),
            rules = snapshot.sharing_rules.len(),
            shares = snapshot.record_shares.len(),
            memberships = snapshot.memberships.len(),
            "Loaded access snapshot"
        );
        Ok(snapshot)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Port Implementations
// ═══════════════════════════════════════════════════════════════════════════════

#[async_trait]
impl ObjectPermissionResolver for InMemoryAccessStore {
    async fn resolve_object_permission(
        &self,
        user_id: &UserId,
        collection_id: &CollectionId,
    ) -> Result<EffectiveObjectPermission> {
        self.check(Port::ObjectPermissions)?;
        let key = (user_id.clone(), collection_id.clone());
        Ok(self
            .permissions
            .get(&key)
            .map(|p| *p)
            .unwrap_or_else(|| *self.default_permission.read()))
    }
}

#[async_trait]
impl SharingStore for InMemoryAccessStore {
    async fn find_org_wide_default(
        &self,
        tenant_id: &TenantId,
        collection_id: &CollectionId,
    ) -> Result<Option<OrgWideDefault>> {
        self.check(Port::Sharing)?;
        let key = (tenant_id.clone(), collection_id.clone());
        Ok(self.org_wide_defaults.get(&key).map(|o| o.value().clone()))
    }

    async fn find_active_sharing_rules(
        &self,
        tenant_id: &TenantId,
        collection_id: &CollectionId,
    ) -> Result<Vec<SharingRule>> {
        self.check(Port::Sharing)?;
        let key = (tenant_id.clone(), collection_id.clone());
        Ok(self
            .rules
            .get(&key)
            .map(|rules| rules.iter().filter(|r| r.active).cloned().collect())
            .unwrap_or_default())
    }

    async fn find_direct_record_shares(
        &self,
        collection_id: &CollectionId,
        record_id: &RecordId,
        user_id: &UserId,
    ) -> Result<Vec<RecordShare>> {
        self.check(Port::Sharing)?;
        let key = (collection_id.clone(), record_id.clone());
        Ok(self
            .shares
            .get(&key)
            .map(|shares| {
                shares
                    .iter()
                    .filter(|s| matches!(&s.shared_with, ShareSubject::User(u) if u == user_id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn find_group_record_shares(
        &self,
        collection_id: &CollectionId,
        record_id: &RecordId,
        group_ids: &[GroupId],
    ) -> Result<Vec<RecordShare>> {
        self.check(Port::Sharing)?;
        let key = (collection_id.clone(), record_id.clone());
        Ok(self
            .shares
            .get(&key)
            .map(|shares| {
                shares
                    .iter()
                    .filter(|s| {
                        matches!(&s.shared_with, ShareSubject::Group(g) if group_ids.contains(g))
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn find_record_shares_for_collection(
        &self,
        tenant_id: &TenantId,
        collection_id: &CollectionId,
    ) -> Result<Vec<RecordShare>> {
        self.check(Port::Sharing)?;
        Ok(self
            .shares
            .iter()
            .filter(|entry| entry.key().0 == *collection_id)
            .flat_map(|entry| {
                entry
                    .value()
                    .iter()
                    .filter(|s| s.tenant_id == *tenant_id)
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect())
    }
}

#[async_trait]
impl UserDirectory for InMemoryAccessStore {
    async fn find_user_by_id(&self, user_id: &UserId) -> Result<Option<User>> {
        self.check(Port::Users)?;
        Ok(self.users.get(user_id).map(|u| u.value().clone()))
    }

    async fn find_subordinates(&self, manager_id: &UserId) -> Result<Vec<User>> {
        self.check(Port::Users)?;
        Ok(self
            .users
            .iter()
            .filter(|u| u.manager_id.as_ref() == Some(manager_id))
            .map(|u| u.value().clone())
            .collect())
    }

    async fn find_user_ids_by_role(
        &self,
        tenant_id: &TenantId,
        role_id: &RoleId,
    ) -> Result<Vec<UserId>> {
        self.check(Port::Users)?;
        Ok(self
            .users
            .iter()
            .filter(|u| u.has_role_in(role_id, tenant_id))
            .map(|u| u.id.clone())
            .collect())
    }
}

#[async_trait]
impl GroupMembershipStore for InMemoryAccessStore {
    async fn find_direct_group_ids_for_user(&self, user_id: &UserId) -> Result<Vec<GroupId>> {
        self.check(Port::Groups)?;
        let member = (MemberType::User, user_id.to_string());
        Ok(self
            .members
            .iter()
            .filter(|entry| entry.value().contains(&member))
            .map(|entry| entry.key().clone())
            .collect())
    }

    async fn find_parent_groups(&self, group_id: &GroupId) -> Result<Vec<GroupMembership>> {
        self.check(Port::Groups)?;
        let member = (MemberType::Group, group_id.to_string());
        Ok(self
            .members
            .iter()
            .filter(|entry| entry.value().contains(&member))
            .map(|entry| GroupMembership::nested(entry.key().clone(), group_id.clone()))
            .collect())
    }

    async fn find_direct_user_ids_for_group(&self, group_id: &GroupId) -> Result<Vec<UserId>> {
        self.check(Port::Groups)?;
        Ok(self.members_of(group_id, MemberType::User, UserId))
    }

    async fn find_child_group_ids(&self, group_id: &GroupId) -> Result<Vec<GroupId>> {
        self.check(Port::Groups)?;
        Ok(self.members_of(group_id, MemberType::Group, GroupId))
    }
}

impl InMemoryAccessStore {
    fn members_of<T>(&self, group_id: &GroupId, kind: MemberType, make: fn(String) -> T) -> Vec<T> {
        self.members
            .get(group_id)
            .map(|members| {
                members
                    .iter()
                    .filter(|(member_type, _)| *member_type == kind)
                    .map(|(_, id)| make(id.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
