//! Integration tests for the list filter compiler.
//!
//! Tests cover:
//! - Gate failure, bypass and org-wide defaults
//! - Clause construction for owners, subordinates, rules and shares
//! - Criteria rules lifting the restriction
//! - SQL rendering of compiled filters

use std::sync::Arc;

use sharing_core::sharing::{
    AccessLevel, AccessType, CollectionId, DefaultAccess, EffectiveObjectPermission,
    FilterClause, FilterColumn, FilterColumns, GroupId, GroupMembership, ManagerScope,
    OrgWideDefault, Principal, RecordAccessService, RecordId, RecordShare, RoleId,
    ShareSubject, SharingPredicate, SharingRule, TenantId, User, UserId,
};
use sharing_core::store::{InMemoryAccessStore, Port};

// ============================================================================
// Test Utilities
// ============================================================================

const TENANT: &str = "tenant-1";
const COLLECTION: &str = "accounts";

fn private_store() -> InMemoryAccessStore {
    InMemoryAccessStore::new().with_org_wide_default(OrgWideDefault::new(
        TENANT,
        COLLECTION,
        DefaultAccess::Private,
    ))
}

async fn filter_for(
    service: &RecordAccessService,
    user: &str,
    access: AccessType,
) -> Option<SharingPredicate> {
    service
        .build_sharing_filter(
            &UserId::new(user),
            &TenantId::new(TENANT),
            &CollectionId::new(COLLECTION),
            access,
        )
        .await
        .unwrap()
}

fn service(store: InMemoryAccessStore) -> RecordAccessService {
    RecordAccessService::with_store(Arc::new(store))
}

fn clause_values(predicate: &SharingPredicate, column: FilterColumn) -> Vec<Vec<String>> {
    predicate
        .clauses
        .iter()
        .filter(|clause| clause.column == column)
        .map(|clause| clause.values.clone())
        .collect()
}

// ============================================================================
// Unrestricted and Empty Filters
// ============================================================================

#[tokio::test]
async fn test_missing_read_permission_matches_nothing() {
    let store = private_store().with_permission("u1", COLLECTION, EffectiveObjectPermission::none());
    let predicate = filter_for(&service(store), "u1", AccessType::Read).await.unwrap();

    assert!(predicate.is_match_nothing());
    assert!(!predicate.matches(&RecordId::new("r1"), Some(&UserId::new("u1"))));
}

#[tokio::test]
async fn test_view_all_is_unrestricted() {
    let store = private_store().with_permission(
        "u1",
        COLLECTION,
        EffectiveObjectPermission::read_only().with_view_all(),
    );
    assert!(filter_for(&service(store), "u1", AccessType::Read).await.is_none());
}

#[tokio::test]
async fn test_public_defaults_are_unrestricted() {
    let missing = InMemoryAccessStore::new();
    assert!(filter_for(&service(missing), "u1", AccessType::Edit).await.is_none());

    let public_read = InMemoryAccessStore::new().with_org_wide_default(OrgWideDefault::new(
        TENANT,
        COLLECTION,
        DefaultAccess::PublicRead,
    ));
    let service = service(public_read);
    assert!(filter_for(&service, "u1", AccessType::Read).await.is_none());
    assert!(filter_for(&service, "u1", AccessType::Edit).await.is_some());
}

#[tokio::test]
async fn test_criteria_rule_lifts_restriction() {
    let store = private_store().with_rule(SharingRule::criteria_based(
        TENANT,
        COLLECTION,
        serde_json::json!({ "field": "status", "op": "eq", "value": "open" }),
        Principal::User(UserId::new("u1")),
        AccessLevel::Read,
    ));
    let service = service(store);

    assert!(filter_for(&service, "u1", AccessType::Read).await.is_none());
    // Not for access the rule does not grant
    assert!(filter_for(&service, "u1", AccessType::Edit).await.is_some());
    // Nor for users outside the rule
    assert!(filter_for(&service, "u2", AccessType::Read).await.is_some());
}

// ============================================================================
// Clause Construction
// ============================================================================

#[tokio::test]
async fn test_private_collection_filters_to_own_records() {
    let predicate = filter_for(&service(private_store()), "u1", AccessType::Read)
        .await
        .unwrap();

    assert_eq!(predicate.clauses, vec![FilterClause::owner_eq(&UserId::new("u1"))]);
    assert_eq!(predicate.to_string(), "owner = u1");
}

#[tokio::test]
async fn test_manager_sees_subordinate_records() {
    let store = private_store()
        .with_user(User::new("rep-1").with_manager("lead"))
        .with_user(User::new("rep-2").with_manager("lead"))
        .with_user(User::new("intern").with_manager("rep-1"));

    let direct = filter_for(&service(store.clone()), "lead", AccessType::Read)
        .await
        .unwrap();
    assert_eq!(
        clause_values(&direct, FilterColumn::Owner),
        vec![vec!["lead".to_string()], vec!["rep-1".to_string(), "rep-2".to_string()]]
    );

    let transitive = service(store).with_manager_scope(ManagerScope::Transitive);
    let predicate = filter_for(&transitive, "lead", AccessType::Read).await.unwrap();
    assert!(predicate.matches(&RecordId::new("r1"), Some(&UserId::new("intern"))));
}

#[tokio::test]
async fn test_rule_owners_expand_groups_and_roles() {
    let store = private_store()
        .with_membership(GroupMembership::user("team", "reader"))
        .with_membership(GroupMembership::user("sales", "seller-1"))
        .with_membership(GroupMembership::nested("sales", "sales-emea"))
        .with_membership(GroupMembership::user("sales-emea", "seller-2"))
        .with_user(User::new("exec").in_tenant(TENANT).with_role("executive"))
        .with_rule(SharingRule::owner_based(
            TENANT,
            COLLECTION,
            Principal::Group(GroupId::new("sales")),
            Principal::Group(GroupId::new("team")),
            AccessLevel::Read,
        ))
        .with_rule(SharingRule::owner_based(
            TENANT,
            COLLECTION,
            Principal::Role(RoleId::new("executive")),
            Principal::User(UserId::new("reader")),
            AccessLevel::Read,
        ));

    let predicate = filter_for(&service(store), "reader", AccessType::Read)
        .await
        .unwrap();
    for owner in ["reader", "seller-1", "seller-2", "exec"] {
        assert!(
            predicate.matches(&RecordId::new("r1"), Some(&UserId::new(owner))),
            "records of {} should be visible",
            owner
        );
    }
    assert!(!predicate.matches(&RecordId::new("r1"), Some(&UserId::new("stranger"))));
}

#[tokio::test]
async fn test_role_rule_ignores_other_tenant_user() {
    let store = private_store()
        .with_user(User::new("agent").in_tenant(TENANT).with_role("support"))
        .with_user(User::new("outsider").in_tenant("tenant-2").with_role("support"))
        .with_rule(SharingRule::owner_based(
            TENANT,
            COLLECTION,
            Principal::User(UserId::new("owner")),
            Principal::Role(RoleId::new("support")),
            AccessLevel::ReadWrite,
        ));
    let service = service(store);

    let outsider = filter_for(&service, "outsider", AccessType::Edit).await.unwrap();
    assert_eq!(outsider.clauses, vec![FilterClause::owner_eq(&UserId::new("outsider"))]);

    let agent = filter_for(&service, "agent", AccessType::Edit).await.unwrap();
    assert!(agent.matches(&RecordId::new("r1"), Some(&UserId::new("owner"))));
}

#[tokio::test]
async fn test_shared_records_become_id_clause() {
    let store = private_store()
        .with_membership(GroupMembership::user("team", "u1"))
        .with_record_share(RecordShare::new(
            TENANT,
            COLLECTION,
            "r2",
            ShareSubject::User(UserId::new("u1")),
            AccessLevel::Read,
        ))
        .with_record_share(RecordShare::new(
            TENANT,
            COLLECTION,
            "r3",
            ShareSubject::Group(GroupId::new("team")),
            AccessLevel::ReadWrite,
        ))
        .with_record_share(RecordShare::new(
            TENANT,
            COLLECTION,
            "r4",
            ShareSubject::User(UserId::new("u2")),
            AccessLevel::ReadWrite,
        ));
    let service = service(store);

    let read = filter_for(&service, "u1", AccessType::Read).await.unwrap();
    assert_eq!(
        clause_values(&read, FilterColumn::Id),
        vec![vec!["r2".to_string(), "r3".to_string()]]
    );

    let edit = filter_for(&service, "u1", AccessType::Edit).await.unwrap();
    assert_eq!(clause_values(&edit, FilterColumn::Id), vec![vec!["r3".to_string()]]);
}

#[tokio::test]
async fn test_where_clause_is_read_filter() {
    let store = private_store().with_record_share(RecordShare::new(
        TENANT,
        COLLECTION,
        "r2",
        ShareSubject::User(UserId::new("u1")),
        AccessLevel::Read,
    ));
    let service = service(store);

    let where_clause = service
        .build_sharing_where_clause(
            &UserId::new("u1"),
            &TenantId::new(TENANT),
            &CollectionId::new(COLLECTION),
        )
        .await
        .unwrap();
    assert_eq!(where_clause, filter_for(&service, "u1", AccessType::Read).await);
}

// ============================================================================
// SQL Rendering
// ============================================================================

#[tokio::test]
async fn test_compiled_filter_renders_parameterised_sql() {
    let store = private_store()
        .with_user(User::new("rep").with_manager("lead"))
        .with_record_share(RecordShare::new(
            TENANT,
            COLLECTION,
            "r9",
            ShareSubject::User(UserId::new("lead")),
            AccessLevel::Read,
        ));
    let predicate = filter_for(&service(store), "lead", AccessType::Read)
        .await
        .unwrap();

    let fragment = predicate.to_sql(&FilterColumns::default(), 3);
    assert_eq!(
        fragment.sql,
        "(\"owner_id\" = $3 OR \"owner_id\" IN ($4) OR \"id\" IN ($5))"
    );
    assert_eq!(fragment.params, vec!["lead", "rep", "r9"]);
}

#[tokio::test]
async fn test_store_failure_propagates() {
    let store = private_store();
    store.fail_port(Port::Users);

    let result = service(store)
        .build_sharing_where_clause(
            &UserId::new("u1"),
            &TenantId::new(TENANT),
            &CollectionId::new(COLLECTION),
        )
        .await;
    assert!(result.unwrap_err().is_deny_equivalent());
}
