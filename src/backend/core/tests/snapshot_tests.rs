//! End-to-end checks against the CLI demo snapshot.

use std::path::PathBuf;
use std::sync::Arc;

use sharing_core::sharing::{
    AccessDecision, AccessType, CollectionId, GrantSource, GroupId, RecordAccessService, RecordId,
    TenantId, UserId,
};
use sharing_core::store::InMemoryAccessStore;

// ============================================================================
// Test Utilities
// ============================================================================

fn demo_service() -> RecordAccessService {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../cli/fixtures/demo.yaml");
    let store = InMemoryAccessStore::load(path).unwrap();
    RecordAccessService::with_store(Arc::new(store))
}

async fn decide(service: &RecordAccessService, user: &str, record: &str, owner: &str, access: AccessType) -> AccessDecision {
    service
        .evaluate(
            &UserId::new(user),
            &TenantId::new("acme"),
            &CollectionId::new("accounts"),
            &RecordId::new(record),
            Some(&UserId::new(owner)),
            access,
        )
        .await
        .unwrap()
}

// ============================================================================
// Demo Snapshot
// ============================================================================

#[tokio::test]
async fn test_demo_decisions() {
    let service = demo_service();

    assert_eq!(
        decide(&service, "dana", "acct-1", "erin", AccessType::Read).await,
        AccessDecision::Granted(GrantSource::ManagerChain)
    );
    assert_eq!(
        decide(&service, "frank", "acct-1", "erin", AccessType::Read).await,
        AccessDecision::Granted(GrantSource::SharingRule("west-to-support".to_string()))
    );
    assert_eq!(
        decide(&service, "frank", "acct-7", "dana", AccessType::Edit).await,
        AccessDecision::Granted(GrantSource::RecordShare("share-1".to_string()))
    );
    assert_eq!(
        decide(&service, "frank", "acct-9", "dana", AccessType::Read).await,
        AccessDecision::Granted(GrantSource::GroupShare("share-2".to_string()))
    );
    assert_eq!(
        decide(&service, "auditor", "acct-1", "erin", AccessType::Read).await,
        AccessDecision::Granted(GrantSource::ViewAll)
    );
    assert!(decide(&service, "intern", "acct-1", "intern", AccessType::Read).await.is_denied());
    // Delete is not part of the default object permission
    assert!(decide(&service, "erin", "acct-1", "erin", AccessType::Delete).await.is_denied());
}

#[tokio::test]
async fn test_demo_criteria_rule_unrestricts_cfo() {
    let service = demo_service();
    let (tenant, accounts) = (TenantId::new("acme"), CollectionId::new("accounts"));

    let cfo = service
        .build_sharing_where_clause(&UserId::new("cfo"), &tenant, &accounts)
        .await
        .unwrap();
    assert!(cfo.is_none());

    let frank = service
        .build_sharing_where_clause(&UserId::new("frank"), &tenant, &accounts)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        frank.to_string(),
        "owner = frank OR owner IN [erin] OR id IN [acct-7, acct-9]"
    );
}

#[tokio::test]
async fn test_demo_group_closure() {
    let service = demo_service();

    let groups = service.effective_group_ids(&UserId::new("erin")).await.unwrap();
    assert!(groups.contains(&GroupId::new("sales-west")));
    assert!(groups.contains(&GroupId::new("sales")));

    let members = service.effective_user_ids(&GroupId::new("sales")).await.unwrap();
    assert!(members.contains(&UserId::new("erin")));
}
