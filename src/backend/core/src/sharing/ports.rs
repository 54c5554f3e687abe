//! Read-only data ports consumed by the sharing engine.
//!
//! Every port returns "not found" as an empty or `None` result. An `Err` means
//! the backing store failed and must reach the caller unchanged.

use async_trait::async_trait;

use super::models::{
    CollectionId, EffectiveObjectPermission, GroupId, GroupMembership, OrgWideDefault, RecordId,
    RecordShare, RoleId, SharingRule, TenantId, User, UserId,
};
use crate::error::Result;

/// Object-level permission flags, computed outside this crate.
#[async_trait]
pub trait ObjectPermissionResolver: Send + Sync {
    async fn resolve_object_permission(
        &self,
        user_id: &UserId,
        collection_id: &CollectionId,
    ) -> Result<EffectiveObjectPermission>;
}

/// Org-wide defaults, sharing rules and manual record shares.
#[async_trait]
pub trait SharingStore: Send + Sync {
    async fn find_org_wide_default(
        &self,
        tenant_id: &TenantId,
        collection_id: &CollectionId,
    ) -> Result<Option<OrgWideDefault>>;

    /// Only rules with `active = true`.
    async fn find_active_sharing_rules(
        &self,
        tenant_id: &TenantId,
        collection_id: &CollectionId,
    ) -> Result<Vec<SharingRule>>;

    /// Shares on one record granted directly to `user_id`.
    async fn find_direct_record_shares(
        &self,
        collection_id: &CollectionId,
        record_id: &RecordId,
        user_id: &UserId,
    ) -> Result<Vec<RecordShare>>;

    /// Shares on one record granted to any of `group_ids`.
    async fn find_group_record_shares(
        &self,
        collection_id: &CollectionId,
        record_id: &RecordId,
        group_ids: &[GroupId],
    ) -> Result<Vec<RecordShare>>;

    /// Every share in a collection, used when compiling list filters.
    async fn find_record_shares_for_collection(
        &self,
        tenant_id: &TenantId,
        collection_id: &CollectionId,
    ) -> Result<Vec<RecordShare>>;
}

/// Platform users and the manager relation.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_user_by_id(&self, user_id: &UserId) -> Result<Option<User>>;

    /// Users whose `manager_id` is `manager_id`.
    async fn find_subordinates(&self, manager_id: &UserId) -> Result<Vec<User>>;

    /// Users of `tenant_id` holding `role_id`.
    async fn find_user_ids_by_role(
        &self,
        tenant_id: &TenantId,
        role_id: &RoleId,
    ) -> Result<Vec<UserId>>;
}

/// Group membership edges.
#[async_trait]
pub trait GroupMembershipStore: Send + Sync {
    /// Groups `user_id` is a direct member of.
    async fn find_direct_group_ids_for_user(&self, user_id: &UserId) -> Result<Vec<GroupId>>;

    /// Edges whose member is the group `group_id`; `edge.group_id` is the parent.
    async fn find_parent_groups(&self, group_id: &GroupId) -> Result<Vec<GroupMembership>>;

    /// Users that are direct members of `group_id`.
    async fn find_direct_user_ids_for_group(&self, group_id: &GroupId) -> Result<Vec<UserId>>;

    /// Groups nested directly inside `group_id`.
    async fn find_child_group_ids(&self, group_id: &GroupId) -> Result<Vec<GroupId>>;
}
