//! Sharing rule dispatch.
//!
//! A rule answers two independent questions: who receives access
//! (`shared_to`) and which records it opens up (its [`RuleKind`]). Both are
//! resolved here so the decision loop and the filter compiler only ever see a
//! [`RecordScope`].

use super::models::{AccessType, Principal, RuleKind, SharingRule, TenantId};
use super::subject::AccessSubject;

/// The set of records a matching rule opens up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordScope<'a> {
    /// Every record of the collection.
    AllRecords,
    /// Records whose owner belongs to the principal.
    OwnedBy(&'a Principal),
}

impl Principal {
    /// Whether the subject is (or belongs to) this principal within `tenant_id`.
    ///
    /// Groups and queues are tested against the subject's effective groups,
    /// so nested membership counts. A role only matches a subject whose user
    /// belongs to the tenant.
    pub fn includes_subject(&self, subject: &AccessSubject, tenant_id: &TenantId) -> bool {
        match self {
            Self::User(user_id) => *user_id == subject.user_id,
            Self::Role(role_id) => subject.has_role_in(role_id, tenant_id),
            Self::Group(group_id) | Self::Queue(group_id) => subject.is_in_group(group_id),
        }
    }
}

impl SharingRule {
    pub fn record_scope(&self) -> RecordScope<'_> {
        match &self.kind {
            RuleKind::OwnerBased { shared_from } => RecordScope::OwnedBy(shared_from),
            // Field criteria are evaluated by the metadata layer; a criteria
            // rule that reaches the subject covers the collection.
            RuleKind::CriteriaBased { .. } => RecordScope::AllRecords,
        }
    }

    /// Active, targets the subject and grants a level sufficient for `access`.
    pub fn applies_to(&self, subject: &AccessSubject, access: AccessType) -> bool {
        self.active
            && self.access_level.satisfies(access)
            && self.shared_to.includes_subject(subject, &self.tenant_id)
    }
}

/// The scopes of every rule in `rules` that applies to the subject.
pub fn applicable_scopes<'a>(
    rules: &'a [SharingRule],
    subject: &'a AccessSubject,
    access: AccessType,
) -> impl Iterator<Item = (&'a SharingRule, RecordScope<'a>)> + 'a {
    rules
        .iter()
        .filter(move |rule| rule.applies_to(subject, access))
        .map(|rule| (rule, rule.record_scope()))
}
