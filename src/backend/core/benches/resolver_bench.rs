//! Benchmarks for group resolution, access decisions and filter compilation.
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use sharing_core::sharing::{
    AccessLevel, AccessType, CollectionId, DefaultAccess, GroupId, GroupMembership, OrgWideDefault,
    Principal, RecordAccessService, RecordId, RecordShare, ShareSubject, SharingRule, TenantId, User, UserId,
};
use sharing_core::store::InMemoryAccessStore;

const TENANT: &str = "tenant-bench";
const COLLECTION: &str = "accounts";

/// `group-0 ∈ group-1 ∈ ... ∈ group-{depth}` with `user-0` in `group-0`.
fn deep_store(depth: usize) -> InMemoryAccessStore {
    let store = InMemoryAccessStore::new().with_membership(GroupMembership::user("group-0", "user-0"));
    for i in 0..depth { store.insert_membership(GroupMembership::nested(format!("group-{}", i + 1), format!("group-{i}"))); }
    store
}

/// `user-0` directly in `width` groups, each nested in one shared parent.
fn wide_store(width: usize) -> InMemoryAccessStore {
    let store = InMemoryAccessStore::new();
    for i in 0..width {
        store.insert_membership(GroupMembership::user(format!("group-{i}"), "user-0"));
        store.insert_membership(GroupMembership::nested("parent", format!("group-{i}")));
        store.insert_membership(GroupMembership::user(format!("group-{i}"), format!("member-{i}")));
    }
    store
}

/// Private collection with a team, a manager chain, one rule and `shares` group shares.
fn sharing_store(shares: usize) -> InMemoryAccessStore {
    let store = wide_store(20).with_org_wide_default(OrgWideDefault::new(TENANT, COLLECTION, DefaultAccess::Private));
    for i in 0..10 { store.insert_user(User::new(format!("rep-{i}")).in_tenant(TENANT).with_manager("user-0")); }
    store.insert_rule(SharingRule::owner_based(TENANT, COLLECTION, Principal::Group(GroupId::new("parent")), Principal::User(UserId::new("auditor")), AccessLevel::Read));
    for i in 0..shares {
        store.insert_record_share(RecordShare::new(TENANT, COLLECTION, format!("record-{i}"), ShareSubject::Group(GroupId::new(format!("group-{}", i % 20))), AccessLevel::Read));
    }
    store
}

fn bench_effective_group_ids(c: &mut Criterion) {
    let mut group = c.benchmark_group("effective_group_ids");
    let rt = tokio::runtime::Runtime::new().unwrap();
    let user = UserId::new("user-0");
    for depth in [1, 5, 10, 50] {
        let service = RecordAccessService::with_store(Arc::new(deep_store(depth)));
        group.bench_with_input(BenchmarkId::new("deep", depth), &depth, |b, _| {
            b.iter(|| rt.block_on(async { black_box(service.effective_group_ids(&user).await.unwrap()) }));
        });
    }
    for width in [10, 100, 1_000] {
        let service = RecordAccessService::with_store(Arc::new(wide_store(width)));
        group.throughput(Throughput::Elements(width as u64));
        group.bench_with_input(BenchmarkId::new("wide", width), &width, |b, _| {
            b.iter(|| rt.block_on(async { black_box(service.effective_group_ids(&user).await.unwrap()) }));
        });
    }
    group.finish();
}

fn bench_effective_user_ids(c: &mut Criterion) {
    let mut group = c.benchmark_group("effective_user_ids");
    let rt = tokio::runtime::Runtime::new().unwrap();
    let parent = GroupId::new("parent");
    for width in [10, 100, 1_000] {
        let service = RecordAccessService::with_store(Arc::new(wide_store(width)));
        group.throughput(Throughput::Elements(width as u64));
        group.bench_with_input(BenchmarkId::from_parameter(width), &width, |b, _| {
            b.iter(|| rt.block_on(async { black_box(service.effective_user_ids(&parent).await.unwrap()) }));
        });
    }
    group.finish();
}

fn bench_can_access(c: &mut Criterion) {
    let mut group = c.benchmark_group("can_access");
    let rt = tokio::runtime::Runtime::new().unwrap();
    let service = RecordAccessService::with_store(Arc::new(sharing_store(1_000)));
    let (tenant, collection) = (TenantId::new(TENANT), CollectionId::new(COLLECTION));
    let user = UserId::new("user-0");
    let cases = [
        ("ownership", RecordId::new("record-x"), Some(UserId::new("user-0"))),
        ("manager", RecordId::new("record-x"), Some(UserId::new("rep-3"))),
        ("group_share", RecordId::new("record-999"), Some(UserId::new("stranger"))),
        ("denied", RecordId::new("record-x"), Some(UserId::new("stranger"))),
    ];
    for (name, record, owner) in &cases {
        group.bench_function(*name, |b| {
            b.iter(|| rt.block_on(async { black_box(service.can_access(&user, &tenant, &collection, record, owner.as_ref(), AccessType::Read).await.unwrap()) }));
        });
    }
    let subject = rt.block_on(service.resolve_subject(&user)).unwrap();
    group.bench_function("group_share_pre_resolved", |b| {
        let record = RecordId::new("record-999");
        let owner = UserId::new("stranger");
        b.iter(|| rt.block_on(async { black_box(service.can_access_as(&subject, &tenant, &collection, &record, Some(&owner), AccessType::Read).await.unwrap()) }));
    });
    group.finish();
}

fn bench_build_sharing_where_clause(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_sharing_where_clause");
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (tenant, collection) = (TenantId::new(TENANT), CollectionId::new(COLLECTION));
    for shares in [10, 1_000, 10_000] {
        let service = RecordAccessService::with_store(Arc::new(sharing_store(shares)));
        group.throughput(Throughput::Elements(shares as u64));
        group.bench_with_input(BenchmarkId::new("user", shares), &shares, |b, _| {
            let user = UserId::new("user-0");
            b.iter(|| rt.block_on(async { black_box(service.build_sharing_where_clause(&user, &tenant, &collection).await.unwrap()) }));
        });
        group.bench_with_input(BenchmarkId::new("rule_recipient", shares), &shares, |b, _| {
            let user = UserId::new("auditor");
            b.iter(|| rt.block_on(async { black_box(service.build_sharing_where_clause(&user, &tenant, &collection).await.unwrap()) }));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_effective_group_ids, bench_effective_user_ids, bench_can_access, bench_build_sharing_where_clause);
criterion_main!(benches);
