//! Single-record access decisions.
//!
//! [`RecordAccessService::evaluate`] walks the grant sources in a fixed order
//! and stops at the first one that grants:
//!
//! 1. object-level permission gate (the only step that can deny outright)
//! 2. `canViewAll` / `canModifyAll` bypass
//! 3. org-wide default
//! 4. ownership
//! 5. manager chain
//! 6. sharing rules
//! 7. manual record shares, direct then through groups
//!
//! Sources only ever add access. Any port failure is returned as an error and
//! must be read as a deny.

use futures::try_join;
use serde::Serialize;
use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument};

use super::groups::GroupMembershipResolver;
use super::models::{
    AccessType, CollectionId, DefaultAccess, GroupId, ManagerScope, Principal, RecordId,
    TenantId, UserId,
};
use super::ports::{GroupMembershipStore, ObjectPermissionResolver, SharingStore, UserDirectory};
use super::rules::{applicable_scopes, RecordScope};
use super::subject::AccessSubject;
use crate::config::SharingConfig;
use crate::error::{Result, SharingError};
use crate::telemetry::metrics::AccessDecisionCounter;

// ═══════════════════════════════════════════════════════════════════════════════
// Decision
// ═══════════════════════════════════════════════════════════════════════════════

/// Which grant source allowed the access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", content = "id", rename_all = "snake_case")]
pub enum GrantSource {
    ViewAll,
    ModifyAll,
    OrgWideDefault(DefaultAccess),
    Ownership,
    ManagerChain,
    /// Id of the first matching rule.
    SharingRule(String),
    /// Id of the share granted to the user.
    RecordShare(String),
    /// Id of the share granted to one of the user's groups.
    GroupShare(String),
}

impl GrantSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ViewAll => "view_all",
            Self::ModifyAll => "modify_all",
            Self::OrgWideDefault(_) => "org_wide_default",
            Self::Ownership => "ownership",
            Self::ManagerChain => "manager_chain",
            Self::SharingRule(_) => "sharing_rule",
            Self::RecordShare(_) => "record_share",
            Self::GroupShare(_) => "group_share",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// The object-level permission for the access type is missing.
    MissingObjectPermission,
    /// No grant source applied.
    NoGrant,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingObjectPermission => "missing_object_permission",
            Self::NoGrant => "no_grant",
        }
    }
}

/// Outcome of an access check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", content = "reason", rename_all = "snake_case")]
pub enum AccessDecision {
    Granted(GrantSource),
    Denied(DenyReason),
}

impl AccessDecision {
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted(_))
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Denied(_))
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Granted(source) => source.as_str(),
            Self::Denied(reason) => reason.as_str(),
        }
    }
}

impl fmt::Display for AccessDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Granted(GrantSource::OrgWideDefault(owd)) => {
                write!(f, "granted (org_wide_default {})", owd.as_str())
            }
            Self::Granted(GrantSource::SharingRule(id))
            | Self::Granted(GrantSource::RecordShare(id))
            | Self::Granted(GrantSource::GroupShare(id)) => {
                write!(f, "granted ({} {})", self.label(), id)
            }
            Self::Granted(source) => write!(f, "granted ({})", source.as_str()),
            Self::Denied(reason) => write!(f, "denied ({})", reason.as_str()),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Service
// ═══════════════════════════════════════════════════════════════════════════════

/// Record-level access decisions and list filters over injected data ports.
///
/// Holds no mutable state; share it behind an `Arc` and call it concurrently.
#[derive(Clone)]
pub struct RecordAccessService {
    pub(super) permissions: Arc<dyn ObjectPermissionResolver>,
    pub(super) sharing: Arc<dyn SharingStore>,
    pub(super) users: Arc<dyn UserDirectory>,
    pub(super) groups: GroupMembershipResolver,
    pub(super) manager_scope: ManagerScope,
}

impl fmt::Debug for RecordAccessService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordAccessService")
            .field("groups", &self.groups)
            .field("manager_scope", &self.manager_scope)
            .finish()
    }
}

/// The record side of a check.
#[derive(Debug, Clone, Copy)]
pub(super) struct RecordRef<'a> {
    pub tenant_id: &'a TenantId,
    pub collection_id: &'a CollectionId,
    pub record_id: &'a RecordId,
    pub owner_id: Option<&'a UserId>,
}

/// Resolves the subject on first use unless the caller supplied one.
pub(super) struct LazySubject<'a> {
    user_id: &'a UserId,
    resolved: Option<Cow<'a, AccessSubject>>,
}

impl<'a> LazySubject<'a> {
    pub(super) fn pending(user_id: &'a UserId) -> Self {
        Self {
            user_id,
            resolved: None,
        }
    }

    pub(super) fn ready(subject: &'a AccessSubject) -> Self {
        Self {
            user_id: &subject.user_id,
            resolved: Some(Cow::Borrowed(subject)),
        }
    }

    pub(super) fn user_id(&self) -> &'a UserId {
        self.user_id
    }

    pub(super) async fn get(&mut self, service: &RecordAccessService) -> Result<&AccessSubject> {
        if self.resolved.is_none() {
            let subject = service.resolve_subject(self.user_id).await?;
            self.resolved = Some(Cow::Owned(subject));
        }
        self.resolved
            .as_deref()
            .ok_or_else(|| SharingError::internal("access subject was not resolved"))
    }
}

impl RecordAccessService {
    pub fn new(
        permissions: Arc<dyn ObjectPermissionResolver>,
        sharing: Arc<dyn SharingStore>,
        users: Arc<dyn UserDirectory>,
        memberships: Arc<dyn GroupMembershipStore>,
    ) -> Self {
        Self {
            permissions,
            sharing,
            users,
            groups: GroupMembershipResolver::new(memberships),
            manager_scope: ManagerScope::default(),
        }
    }

    /// Build a service whose ports are all served by one store.
    pub fn with_store<S>(store: Arc<S>) -> Self
    where
        S: ObjectPermissionResolver + SharingStore + UserDirectory + GroupMembershipStore + 'static,
    {
        Self::new(store.clone(), store.clone(), store.clone(), store)
    }

    /// Apply the engine settings from configuration.
    pub fn configured(self, config: &SharingConfig) -> Self {
        self.with_manager_scope(config.manager_scope)
            .with_max_group_depth(config.max_group_depth)
    }

    pub fn with_manager_scope(mut self, scope: ManagerScope) -> Self {
        self.manager_scope = scope;
        self
    }

    pub fn with_max_group_depth(mut self, max_depth: usize) -> Self {
        self.groups = self.groups.with_max_depth(max_depth);
        self
    }

    pub fn manager_scope(&self) -> ManagerScope {
        self.manager_scope
    }

    pub fn group_resolver(&self) -> &GroupMembershipResolver {
        &self.groups
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Subject
    // ─────────────────────────────────────────────────────────────────────────

    /// Resolve the user's role and effective groups once, for reuse across
    /// many checks in the same request.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn resolve_subject(&self, user_id: &UserId) -> Result<AccessSubject> {
        let (user, group_ids) = try_join!(
            self.users.find_user_by_id(user_id),
            self.groups.effective_group_ids(user_id),
        )?;

        let (role_id, tenant_id) = user.map_or((None, None), |u| (u.role_id, u.tenant_id));
        Ok(AccessSubject::new(user_id.clone())
            .with_role(role_id)
            .with_tenant(tenant_id)
            .with_groups(group_ids))
    }

    /// Every group the user belongs to, directly or through nesting.
    pub async fn effective_group_ids(&self, user_id: &UserId) -> Result<HashSet<GroupId>> {
        self.groups.effective_group_ids(user_id).await
    }

    /// Every user belonging to the group, directly or through nested groups.
    pub async fn effective_user_ids(&self, group_id: &GroupId) -> Result<HashSet<UserId>> {
        self.groups.effective_user_ids(group_id).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Decisions
    // ─────────────────────────────────────────────────────────────────────────

    /// Whether `user_id` may perform `access` on the record.
    pub async fn can_access(
        &self,
        user_id: &UserId,
        tenant_id: &TenantId,
        collection_id: &CollectionId,
        record_id: &RecordId,
        owner_id: Option<&UserId>,
        access: AccessType,
    ) -> Result<bool> {
        let decision = self
            .evaluate(user_id, tenant_id, collection_id, record_id, owner_id, access)
            .await?;
        Ok(decision.is_granted())
    }

    /// [`can_access`](Self::can_access) with a pre-resolved subject.
    pub async fn can_access_as(
        &self,
        subject: &AccessSubject,
        tenant_id: &TenantId,
        collection_id: &CollectionId,
        record_id: &RecordId,
        owner_id: Option<&UserId>,
        access: AccessType,
    ) -> Result<bool> {
        let decision = self
            .evaluate_as(subject, tenant_id, collection_id, record_id, owner_id, access)
            .await?;
        Ok(decision.is_granted())
    }

    /// Fail-closed form of [`can_access`](Self::can_access): any error is
    /// logged and reported as no access.
    pub async fn can_access_or_deny(
        &self,
        user_id: &UserId,
        tenant_id: &TenantId,
        collection_id: &CollectionId,
        record_id: &RecordId,
        owner_id: Option<&UserId>,
        access: AccessType,
    ) -> bool {
        match self
            .can_access(user_id, tenant_id, collection_id, record_id, owner_id, access)
            .await
        {
            Ok(allowed) => allowed,
            Err(error) => {
                error.log();
                AccessDecisionCounter::increment("error", access.as_str());
                false
            }
        }
    }

    /// Evaluate the grant sources and report which one decided.
    #[instrument(
        skip_all,
        fields(
            user_id = %user_id,
            tenant_id = %tenant_id,
            collection_id = %collection_id,
            record_id = %record_id,
            access = %access
        )
    )]
    pub async fn evaluate(
        &self,
        user_id: &UserId,
        tenant_id: &TenantId,
        collection_id: &CollectionId,
        record_id: &RecordId,
        owner_id: Option<&UserId>,
        access: AccessType,
    ) -> Result<AccessDecision> {
        let record = RecordRef {
            tenant_id,
            collection_id,
            record_id,
            owner_id,
        };
        self.decide(LazySubject::pending(user_id), record, access)
            .await
    }

    /// [`evaluate`](Self::evaluate) with a pre-resolved subject.
    #[instrument(
        skip_all,
        fields(
            user_id = %subject.user_id,
            tenant_id = %tenant_id,
            collection_id = %collection_id,
            record_id = %record_id,
            access = %access
        )
    )]
    pub async fn evaluate_as(
        &self,
        subject: &AccessSubject,
        tenant_id: &TenantId,
        collection_id: &CollectionId,
        record_id: &RecordId,
        owner_id: Option<&UserId>,
        access: AccessType,
    ) -> Result<AccessDecision> {
        let record = RecordRef {
            tenant_id,
            collection_id,
            record_id,
            owner_id,
        };
        self.decide(LazySubject::ready(subject), record, access)
            .await
    }

    async fn decide(
        &self,
        subject: LazySubject<'_>,
        record: RecordRef<'_>,
        access: AccessType,
    ) -> Result<AccessDecision> {
        let decision = self.decide_inner(subject, record, access).await?;
        debug!(decision = %decision, "Access evaluated");
        AccessDecisionCounter::increment(decision.label(), access.as_str());
        Ok(decision)
    }

    async fn decide_inner(
        &self,
        mut subject: LazySubject<'_>,
        record: RecordRef<'_>,
        access: AccessType,
    ) -> Result<AccessDecision> {
        let user_id = subject.user_id();

        // 1. Object-level gate
        let permission = self
            .permissions
            .resolve_object_permission(user_id, record.collection_id)
            .await?;
        if !permission.permits(access) {
            return Ok(AccessDecision::Denied(DenyReason::MissingObjectPermission));
        }

        // 2. View all / modify all
        if permission.bypasses_sharing(access) {
            let source = match access {
                AccessType::Read => GrantSource::ViewAll,
                AccessType::Edit | AccessType::Delete => GrantSource::ModifyAll,
            };
            return Ok(AccessDecision::Granted(source));
        }

        // 3. Org-wide default
        let default_access = self.default_access(record.tenant_id, record.collection_id).await?;
        if default_access.grants(access) {
            return Ok(AccessDecision::Granted(GrantSource::OrgWideDefault(
                default_access,
            )));
        }

        // 4. Ownership
        if record.owner_id == Some(user_id) {
            return Ok(AccessDecision::Granted(GrantSource::Ownership));
        }

        // 5. Manager chain
        if let Some(owner_id) = record.owner_id {
            if self.is_manager_of(user_id, owner_id).await? {
                return Ok(AccessDecision::Granted(GrantSource::ManagerChain));
            }
        }

        // 6. Sharing rules
        let rules = self
            .sharing
            .find_active_sharing_rules(record.tenant_id, record.collection_id)
            .await?;
        if !rules.is_empty() {
            let subject = subject.get(self).await?;
            for (rule, scope) in applicable_scopes(&rules, subject, access) {
                let covered = match scope {
                    RecordScope::AllRecords => true,
                    RecordScope::OwnedBy(principal) => match record.owner_id {
                        Some(owner_id) => {
                            self.owner_in_principal(principal, owner_id, record.tenant_id)
                                .await?
                        }
                        None => false,
                    },
                };
                if covered {
                    return Ok(AccessDecision::Granted(GrantSource::SharingRule(
                        rule.id.clone(),
                    )));
                }
            }
        }

        // 7. Manual shares, direct first
        let direct = self
            .sharing
            .find_direct_record_shares(record.collection_id, record.record_id, user_id)
            .await?;
        if let Some(share) = direct
            .iter()
            .find(|s| s.tenant_id == *record.tenant_id && s.access_level.satisfies(access))
        {
            return Ok(AccessDecision::Granted(GrantSource::RecordShare(
                share.id.clone(),
            )));
        }

        let subject = subject.get(self).await?;
        if !subject.group_ids.is_empty() {
            let group_ids = subject.sorted_group_ids();
            let shares = self
                .sharing
                .find_group_record_shares(record.collection_id, record.record_id, &group_ids)
                .await?;
            if let Some(share) = shares
                .iter()
                .find(|s| s.tenant_id == *record.tenant_id && s.access_level.satisfies(access))
            {
                return Ok(AccessDecision::Granted(GrantSource::GroupShare(
                    share.id.clone(),
                )));
            }
        }

        Ok(AccessDecision::Denied(DenyReason::NoGrant))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Helpers shared with the filter compiler
    // ─────────────────────────────────────────────────────────────────────────

    /// The org-wide default, falling back to `PUBLIC_READ_WRITE` when unset.
    pub(super) async fn default_access(
        &self,
        tenant_id: &TenantId,
        collection_id: &CollectionId,
    ) -> Result<DefaultAccess> {
        let owd = self
            .sharing
            .find_org_wide_default(tenant_id, collection_id)
            .await?;
        Ok(owd.map(|o| o.internal_access).unwrap_or_default())
    }

    /// Whether `user_id` manages `owner_id` under the configured scope.
    async fn is_manager_of(&self, user_id: &UserId, owner_id: &UserId) -> Result<bool> {
        let mut current = owner_id.clone();
        let mut visited: HashSet<UserId> = HashSet::from([current.clone()]);

        loop {
            let manager_id = match self.users.find_user_by_id(&current).await? {
                Some(user) => user.manager_id,
                None => None,
            };
            let Some(manager_id) = manager_id else {
                return Ok(false);
            };
            if manager_id == *user_id {
                return Ok(true);
            }
            if self.manager_scope == ManagerScope::Direct || !visited.insert(manager_id.clone()) {
                return Ok(false);
            }
            current = manager_id;
        }
    }

    /// Whether the record owner belongs to the principal an owner-based rule
    /// shares from.
    async fn owner_in_principal(
        &self,
        principal: &Principal,
        owner_id: &UserId,
        tenant_id: &TenantId,
    ) -> Result<bool> {
        match principal {
            Principal::User(user_id) => Ok(user_id == owner_id),
            Principal::Group(group_id) | Principal::Queue(group_id) => Ok(self
                .groups
                .effective_user_ids(group_id)
                .await?
                .contains(owner_id)),
            Principal::Role(role_id) => Ok(self
                .users
                .find_user_by_id(owner_id)
                .await?
                .map_or(false, |owner| owner.has_role_in(role_id, tenant_id))),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
