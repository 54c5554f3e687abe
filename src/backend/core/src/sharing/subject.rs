//! The resolved identity an access check is evaluated for.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::models::{GroupId, RoleId, ShareSubject, TenantId, UserId};

/// A user together with everything that can make a rule or share target them:
/// their role and their effective (transitive) groups. The role only counts in
/// the user's own tenant; a subject without a tenant holds it everywhere.
///
/// Resolve once per request with
/// [`RecordAccessService::resolve_subject`](super::RecordAccessService::resolve_subject)
/// and pass it to the `*_as` operations when checking many records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessSubject {
    pub user_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_id: Option<RoleId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<TenantId>,
    #[serde(default)]
    pub group_ids: HashSet<GroupId>,
}

impl AccessSubject {
    pub fn new(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            role_id: None,
            tenant_id: None,
            group_ids: HashSet::new(),
        }
    }

    pub fn with_role(mut self, role_id: Option<RoleId>) -> Self {
        self.role_id = role_id;
        self
    }

    pub fn with_tenant(mut self, tenant_id: Option<TenantId>) -> Self {
        self.tenant_id = tenant_id;
        self
    }

    pub fn with_groups(mut self, group_ids: HashSet<GroupId>) -> Self {
        self.group_ids = group_ids;
        self
    }

    /// Same rule as [`User::has_role_in`](super::models::User::has_role_in).
    pub fn has_role_in(&self, role_id: &RoleId, tenant_id: &TenantId) -> bool {
        self.role_id.as_ref() == Some(role_id)
            && self.tenant_id.as_ref().map_or(true, |t| t == tenant_id)
    }

    pub fn is_in_group(&self, group_id: &GroupId) -> bool {
        self.group_ids.contains(group_id)
    }

    /// Effective groups in a stable order, for port calls that take a slice.
    pub fn sorted_group_ids(&self) -> Vec<GroupId> {
        let mut ids: Vec<GroupId> = self.group_ids.iter().cloned().collect();
        ids.sort();
        ids
    }

    /// Whether a record share granted to `shared_with` reaches this subject.
    pub fn is_share_recipient(&self, shared_with: &ShareSubject) -> bool {
        match shared_with {
            ShareSubject::User(user_id) => *user_id == self.user_id,
            ShareSubject::Group(group_id) => self.is_in_group(group_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_share_recipient() {
        let subject = AccessSubject::new("u1")
            .with_groups(HashSet::from([GroupId::new("sales"), GroupId::new("emea")]));

        assert!(subject.is_share_recipient(&ShareSubject::User(UserId::new("u1"))));
        assert!(subject.is_share_recipient(&ShareSubject::Group(GroupId::new("emea"))));
        assert!(!subject.is_share_recipient(&ShareSubject::User(UserId::new("u2"))));
        assert!(!subject.is_share_recipient(&ShareSubject::Group(GroupId::new("apac"))));
    }

    #[test]
    fn test_sorted_group_ids() {
        let subject = AccessSubject::new("u1")
            .with_groups(HashSet::from([GroupId::new("b"), GroupId::new("a")]));
        assert_eq!(subject.sorted_group_ids(), vec![GroupId::new("a"), GroupId::new("b")]);
    }

    #[test]
    fn test_role_is_scoped_to_tenant() {
        let support = RoleId::new("support");
        let scoped = AccessSubject::new("u1")
            .with_role(Some(support.clone()))
            .with_tenant(Some(TenantId::new("t2")));
        assert!(scoped.has_role_in(&support, &TenantId::new("t2")));
        assert!(!scoped.has_role_in(&support, &TenantId::new("t1")));
        assert!(!scoped.has_role_in(&RoleId::new("admin"), &TenantId::new("t2")));

        let global = AccessSubject::new("u2").with_role(Some(support.clone()));
        assert!(global.has_role_in(&support, &TenantId::new("t1")));
    }
}
