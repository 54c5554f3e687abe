//! Compiles the access decision into a list filter.
//!
//! For a fixed user, tenant, collection and access type, a record satisfies
//! the compiled [`SharingPredicate`] exactly when
//! [`RecordAccessService::can_access`] grants it. `None` means the user sees
//! every record and no filter is needed.

use std::collections::{BTreeSet, HashSet, VecDeque};
use tracing::{debug, instrument};

use super::access::{LazySubject, RecordAccessService};
use super::filter::{FilterClause, SharingPredicate};
use super::models::{AccessType, CollectionId, ManagerScope, Principal, RecordId, TenantId, UserId};
use super::rules::{applicable_scopes, RecordScope};
use super::subject::AccessSubject;
use crate::error::Result;
use crate::telemetry::metrics::FilterCounter;

impl RecordAccessService {
    /// Read filter for list queries. `None` means unrestricted.
    pub async fn build_sharing_where_clause(
        &self,
        user_id: &UserId,
        tenant_id: &TenantId,
        collection_id: &CollectionId,
    ) -> Result<Option<SharingPredicate>> {
        self.build_sharing_filter(user_id, tenant_id, collection_id, AccessType::Read)
            .await
    }

    /// Filter selecting the records `user_id` may perform `access` on.
    ///
    /// A failed object-level gate yields [`SharingPredicate::match_nothing`].
    #[instrument(
        skip_all,
        fields(
            user_id = %user_id,
            tenant_id = %tenant_id,
            collection_id = %collection_id,
            access = %access
        )
    )]
    pub async fn build_sharing_filter(
        &self,
        user_id: &UserId,
        tenant_id: &TenantId,
        collection_id: &CollectionId,
        access: AccessType,
    ) -> Result<Option<SharingPredicate>> {
        self.compile(LazySubject::pending(user_id), tenant_id, collection_id, access)
            .await
    }

    /// [`build_sharing_filter`](Self::build_sharing_filter) with a
    /// pre-resolved subject.
    #[instrument(
        skip_all,
        fields(
            user_id = %subject.user_id,
            tenant_id = %tenant_id,
            collection_id = %collection_id,
            access = %access
        )
    )]
    pub async fn build_sharing_filter_as(
        &self,
        subject: &AccessSubject,
        tenant_id: &TenantId,
        collection_id: &CollectionId,
        access: AccessType,
    ) -> Result<Option<SharingPredicate>> {
        self.compile(LazySubject::ready(subject), tenant_id, collection_id, access)
            .await
    }

    async fn compile(
        &self,
        subject: LazySubject<'_>,
        tenant_id: &TenantId,
        collection_id: &CollectionId,
        access: AccessType,
    ) -> Result<Option<SharingPredicate>> {
        let filter = self
            .compile_inner(subject, tenant_id, collection_id, access)
            .await?;

        let kind = match &filter {
            None => "unrestricted",
            Some(predicate) if predicate.is_match_nothing() => "match_nothing",
            Some(_) => "restricted",
        };
        debug!(kind, clauses = filter.as_ref().map_or(0, |p| p.clauses.len()), "Sharing filter built");
        FilterCounter::increment(kind);
        Ok(filter)
    }

    async fn compile_inner(
        &self,
        mut subject: LazySubject<'_>,
        tenant_id: &TenantId,
        collection_id: &CollectionId,
        access: AccessType,
    ) -> Result<Option<SharingPredicate>> {
        let user_id = subject.user_id();

        let permission = self
            .permissions
            .resolve_object_permission(user_id, collection_id)
            .await?;
        if !permission.permits(access) {
            return Ok(Some(SharingPredicate::match_nothing()));
        }
        if permission.bypasses_sharing(access) {
            return Ok(None);
        }
        if self.default_access(tenant_id, collection_id).await?.grants(access) {
            return Ok(None);
        }

        let mut predicate = SharingPredicate::new(vec![FilterClause::owner_eq(user_id)]);

        let subordinates = self.subordinate_ids(user_id).await?;
        if !subordinates.is_empty() {
            predicate.push(FilterClause::owner_in(&subordinates));
        }

        let rules = self
            .sharing
            .find_active_sharing_rules(tenant_id, collection_id)
            .await?;
        if !rules.is_empty() {
            let subject = subject.get(self).await?;
            let mut rule_owners: BTreeSet<UserId> = BTreeSet::new();
            for (rule, scope) in applicable_scopes(&rules, subject, access) {
                match scope {
                    RecordScope::AllRecords => {
                        debug!(rule_id = %rule.id, "Sharing rule covers the whole collection");
                        return Ok(None);
                    }
                    RecordScope::OwnedBy(principal) => {
                        rule_owners.extend(self.principal_user_ids(principal, tenant_id).await?);
                    }
                }
            }
            if !rule_owners.is_empty() {
                predicate.push(FilterClause::owner_in(&rule_owners));
            }
        }

        let subject = subject.get(self).await?;
        let shared: BTreeSet<RecordId> = self
            .sharing
            .find_record_shares_for_collection(tenant_id, collection_id)
            .await?
            .into_iter()
            .filter(|share| {
                share.tenant_id == *tenant_id
                    && share.access_level.satisfies(access)
                    && subject.is_share_recipient(&share.shared_with)
            })
            .map(|share| share.record_id)
            .collect();
        if !shared.is_empty() {
            predicate.push(FilterClause::id_in(&shared));
        }

        Ok(Some(predicate))
    }

    /// Users whose records `user_id` sees as their manager.
    async fn subordinate_ids(&self, user_id: &UserId) -> Result<BTreeSet<UserId>> {
        let mut result = BTreeSet::new();
        let mut visited: HashSet<UserId> = HashSet::from([user_id.clone()]);
        let mut queue: VecDeque<UserId> = VecDeque::from([user_id.clone()]);

        while let Some(manager_id) = queue.pop_front() {
            for subordinate in self.users.find_subordinates(&manager_id).await? {
                result.insert(subordinate.id.clone());
                if self.manager_scope == ManagerScope::Transitive
                    && visited.insert(subordinate.id.clone())
                {
                    queue.push_back(subordinate.id);
                }
            }
        }
        Ok(result)
    }

    /// Every user an owner-based rule shares records from.
    async fn principal_user_ids(
        &self,
        principal: &Principal,
        tenant_id: &TenantId,
    ) -> Result<Vec<UserId>> {
        match principal {
            Principal::User(user_id) => Ok(vec![user_id.clone()]),
            Principal::Group(group_id) | Principal::Queue(group_id) => Ok(self
                .groups
                .effective_user_ids(group_id)
                .await?
                .into_iter()
                .collect()),
            Principal::Role(role_id) => self.users.find_user_ids_by_role(tenant_id, role_id).await,
        }
    }
}
