//! Effective group membership over nested groups.
//!
//! Group nesting is expected to form a DAG but nothing enforces it, so both
//! directions of traversal run as an iterative breadth-first search with a
//! visited set. Upward traversal (user → groups) is also bounded by a maximum
//! number of hops.
//!
//! Example: user A is in group X and X is nested in Y, so A's effective groups
//! are `{X, Y}` and Y's effective users include A.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, warn};

use super::models::{GroupId, UserId};
use super::ports::GroupMembershipStore;
use crate::error::Result;
use crate::telemetry::metrics::GroupResolutionCounter;

/// Default number of parent hops followed from a user's direct groups.
pub const DEFAULT_MAX_GROUP_DEPTH: usize = 10;

/// Resolves transitive group membership in both directions.
///
/// Holds no cache: every call reads the current graph through the store.
#[derive(Clone)]
pub struct GroupMembershipResolver {
    store: Arc<dyn GroupMembershipStore>,
    max_depth: usize,
}

impl std::fmt::Debug for GroupMembershipResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupMembershipResolver")
            .field("max_depth", &self.max_depth)
            .finish()
    }
}

impl GroupMembershipResolver {
    pub fn new(store: Arc<dyn GroupMembershipStore>) -> Self {
        Self {
            store,
            max_depth: DEFAULT_MAX_GROUP_DEPTH,
        }
    }

    /// Override the upward hop limit.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Every group `user_id` belongs to, directly or through nesting.
    ///
    /// Direct groups are depth 0; parents are followed for at most
    /// `max_depth` hops. `None` or a user without memberships yields an
    /// empty set.
    pub async fn effective_group_ids<'a>(
        &self,
        user_id: impl Into<Option<&'a UserId>>,
    ) -> Result<HashSet<GroupId>> {
        let Some(user_id) = user_id.into() else {
            return Ok(HashSet::new());
        };
        GroupResolutionCounter::increment("up");

        let direct = self.store.find_direct_group_ids_for_user(user_id).await?;
        let direct_count = direct.len();

        // The result set doubles as the visited set: a group enters the
        // frontier only the first time it is seen.
        let mut effective: HashSet<GroupId> = HashSet::with_capacity(direct_count);
        let mut frontier: Vec<GroupId> = Vec::with_capacity(direct_count);
        for group_id in direct {
            if effective.insert(group_id.clone()) {
                frontier.push(group_id);
            }
        }

        let mut depth = 0;
        while !frontier.is_empty() {
            if depth >= self.max_depth {
                warn!(
                    user_id = %user_id,
                    max_depth = self.max_depth,
                    unexpanded = frontier.len(),
                    "Maximum group nesting depth reached"
                );
                GroupResolutionCounter::depth_truncated();
                break;
            }

            let mut next = Vec::new();
            for group_id in &frontier {
                for edge in self.store.find_parent_groups(group_id).await? {
                    let parent = edge.group_id;
                    if effective.insert(parent.clone()) {
                        next.push(parent);
                    } else {
                        debug!(group_id = %group_id, parent = %parent, "Parent group already visited");
                    }
                }
            }

            frontier = next;
            depth += 1;
        }

        debug!(
            user_id = %user_id,
            effective = effective.len(),
            direct = direct_count,
            "Resolved effective groups"
        );
        Ok(effective)
    }

    /// Every user belonging to `group_id`, directly or through nested child
    /// groups. The visited set alone bounds the traversal.
    pub async fn effective_user_ids<'a>(
        &self,
        group_id: impl Into<Option<&'a GroupId>>,
    ) -> Result<HashSet<UserId>> {
        let Some(root) = group_id.into() else {
            return Ok(HashSet::new());
        };
        GroupResolutionCounter::increment("down");

        let mut users = HashSet::new();
        let mut visited: HashSet<GroupId> = HashSet::from([root.clone()]);
        let mut queue: VecDeque<GroupId> = VecDeque::from([root.clone()]);

        while let Some(group_id) = queue.pop_front() {
            users.extend(self.store.find_direct_user_ids_for_group(&group_id).await?);

            for child in self.store.find_child_group_ids(&group_id).await? {
                if visited.insert(child.clone()) {
                    queue.push_back(child);
                } else {
                    debug!(group_id = %group_id, child = %child, "Child group already visited");
                }
            }
        }

        debug!(
            group_id = %root,
            users = users.len(),
            groups = visited.len(),
            "Resolved effective users"
        );
        Ok(users)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sharing::models::GroupMembership;
    use crate::store::memory::InMemoryAccessStore;

    fn resolver(store: InMemoryAccessStore) -> GroupMembershipResolver {
        GroupMembershipResolver::new(Arc::new(store))
    }

    fn groups(ids: &[&str]) -> HashSet<GroupId> {
        ids.iter().map(|id| GroupId::new(*id)).collect()
    }

    fn users(ids: &[&str]) -> HashSet<UserId> {
        ids.iter().map(|id| UserId::new(*id)).collect()
    }

    #[tokio::test]
    async fn test_none_user_is_empty() {
        let resolver = resolver(InMemoryAccessStore::new());
        assert!(resolver.effective_group_ids(None::<&UserId>).await.unwrap().is_empty());
        assert!(resolver.effective_user_ids(None::<&GroupId>).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_user_without_groups_is_empty() {
        let resolver = resolver(InMemoryAccessStore::new());
        let result = resolver
            .effective_group_ids(&UserId::new("user-1"))
            .await
            .unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_direct_memberships_only() {
        let store = InMemoryAccessStore::new()
            .with_membership(GroupMembership::user("group-a", "user-1"))
            .with_membership(GroupMembership::user("group-b", "user-1"));

        let result = resolver(store)
            .effective_group_ids(&UserId::new("user-1"))
            .await
            .unwrap();
        assert_eq!(result, groups(&["group-a", "group-b"]));
    }

    #[tokio::test]
    async fn test_includes_ancestors() {
        let store = InMemoryAccessStore::new()
            .with_membership(GroupMembership::user("group-a", "user-1"))
            .with_membership(GroupMembership::nested("group-b", "group-a"))
            .with_membership(GroupMembership::nested("group-c", "group-b"));

        let result = resolver(store)
            .effective_group_ids(&UserId::new("user-1"))
            .await
            .unwrap();
        assert_eq!(result, groups(&["group-a", "group-b", "group-c"]));
    }

    #[tokio::test]
    async fn test_two_cycle_terminates() {
        let store = InMemoryAccessStore::new()
            .with_membership(GroupMembership::user("group-a", "user-1"))
            .with_membership(GroupMembership::nested("group-b", "group-a"))
            .with_membership(GroupMembership::nested("group-a", "group-b"));

        let result = resolver(store)
            .effective_group_ids(&UserId::new("user-1"))
            .await
            .unwrap();
        assert_eq!(result, groups(&["group-a", "group-b"]));
    }

    #[tokio::test]
    async fn test_custom_depth_bound() {
        let mut store = InMemoryAccessStore::new()
            .with_membership(GroupMembership::user("group-0", "user-1"));
        for i in 0..5 {
            store = store.with_membership(GroupMembership::nested(
                format!("group-{}", i + 1),
                format!("group-{}", i),
            ));
        }

        let result = resolver(store)
            .with_max_depth(2)
            .effective_group_ids(&UserId::new("user-1"))
            .await
            .unwrap();
        assert_eq!(result, groups(&["group-0", "group-1", "group-2"]));
    }

    #[tokio::test]
    async fn test_effective_users_through_children() {
        let store = InMemoryAccessStore::new()
            .with_membership(GroupMembership::user("sales", "alice"))
            .with_membership(GroupMembership::nested("sales", "emea"))
            .with_membership(GroupMembership::user("emea", "bob"))
            .with_membership(GroupMembership::nested("emea", "dach"))
            .with_membership(GroupMembership::user("dach", "carol"));

        let result = resolver(store)
            .effective_user_ids(&GroupId::new("sales"))
            .await
            .unwrap();
        assert_eq!(result, users(&["alice", "bob", "carol"]));
    }

    #[tokio::test]
    async fn test_effective_users_cycle_and_dedup() {
        let store = InMemoryAccessStore::new()
            .with_membership(GroupMembership::nested("group-a", "group-b"))
            .with_membership(GroupMembership::nested("group-a", "group-c"))
            .with_membership(GroupMembership::nested("group-b", "group-a"))
            .with_membership(GroupMembership::user("group-b", "user-1"))
            .with_membership(GroupMembership::user("group-c", "user-1"))
            .with_membership(GroupMembership::user("group-c", "user-2"));

        let result = resolver(store)
            .effective_user_ids(&GroupId::new("group-a"))
            .await
            .unwrap();
        assert_eq!(result, users(&["user-1", "user-2"]));
    }

    #[tokio::test]
    async fn test_downward_has_no_depth_cap() {
        let mut store = InMemoryAccessStore::new();
        for i in 0..15 {
            store = store.with_membership(GroupMembership::nested(
                format!("group-{}", i),
                format!("group-{}", i + 1),
            ));
        }
        store = store.with_membership(GroupMembership::user("group-15", "deep-user"));

        let result = resolver(store)
            .effective_user_ids(&GroupId::new("group-0"))
            .await
            .unwrap();
        assert_eq!(result, users(&["deep-user"]));
    }
}
