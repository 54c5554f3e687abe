//! PostgreSQL adapter for the sharing, directory and group ports.
//!
//! Tables are owned by the administrative services of the control plane; this
//! adapter only reads them. Object permissions are resolved elsewhere and are
//! not served from here.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::{info, warn};

use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::sharing::models::{
    AccessLevel, CollectionId, DefaultAccess, GroupId, GroupMembership, OrgWideDefault,
    Principal, RecordId, RecordShare, RoleId, RuleKind, ShareSubject, SharingRule, TenantId,
    User, UserId,
};
use crate::sharing::ports::{GroupMembershipStore, SharingStore, UserDirectory};

/// Read-only sqlx store over the control plane's sharing tables.
#[derive(Clone)]
pub struct PgSharingStore {
    pool: PgPool,
}

impl PgSharingStore {
    /// Open a connection pool.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.url)
            .await?;

        info!(
            max_connections = config.max_connections,
            "Connected sharing store to PostgreSQL"
        );
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Sharing
// ═══════════════════════════════════════════════════════════════════════════════

#[async_trait]
impl SharingStore for PgSharingStore {
    async fn find_org_wide_default(
        &self,
        tenant_id: &TenantId,
        collection_id: &CollectionId,
    ) -> Result<Option<OrgWideDefault>> {
        let row = sqlx::query_as::<_, OrgWideDefaultRow>(
            r#"
            SELECT tenant_id, collection_id, internal_access
            FROM org_wide_default
            WHERE tenant_id = $1 AND collection_id = $2
            "#,
        )
        .bind(tenant_id.as_str())
        .bind(collection_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(OrgWideDefault::from))
    }

    async fn find_active_sharing_rules(
        &self,
        tenant_id: &TenantId,
        collection_id: &CollectionId,
    ) -> Result<Vec<SharingRule>> {
        let rows = sqlx::query_as::<_, SharingRuleRow>(
            r#"
            SELECT id, tenant_id, collection_id, name, rule_type,
                   shared_from_type, shared_from_id, criteria,
                   shared_to_type, shared_to_id, access_level, active, created_at
            FROM sharing_rule
            WHERE tenant_id = $1 AND collection_id = $2 AND active = TRUE
            ORDER BY created_at
            "#,
        )
        .bind(tenant_id.as_str())
        .bind(collection_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().filter_map(SharingRuleRow::into_rule).collect())
    }

    async fn find_direct_record_shares(
        &self,
        collection_id: &CollectionId,
        record_id: &RecordId,
        user_id: &UserId,
    ) -> Result<Vec<RecordShare>> {
        let rows = sqlx::query_as::<_, RecordShareRow>(
            r#"
            SELECT id, tenant_id, collection_id, record_id, shared_with_type,
                   shared_with_id, access_level, reason, created_at
            FROM record_share
            WHERE collection_id = $1 AND record_id = $2
              AND shared_with_type = 'USER' AND shared_with_id = $3
            "#,
        )
        .bind(collection_id.as_str())
        .bind(record_id.as_str())
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().filter_map(RecordShareRow::into_share).collect())
    }

    async fn find_group_record_shares(
        &self,
        collection_id: &CollectionId,
        record_id: &RecordId,
        group_ids: &[GroupId],
    ) -> Result<Vec<RecordShare>> {
        if group_ids.is_empty() {
            return Ok(Vec::new());
        }
        let group_ids: Vec<String> = group_ids.iter().map(|g| g.to_string()).collect();

        let rows = sqlx::query_as::<_, RecordShareRow>(
            r#"
            SELECT id, tenant_id, collection_id, record_id, shared_with_type,
                   shared_with_id, access_level, reason, created_at
            FROM record_share
            WHERE collection_id = $1 AND record_id = $2
              AND shared_with_type = 'GROUP' AND shared_with_id = ANY($3)
            "#,
        )
        .bind(collection_id.as_str())
        .bind(record_id.as_str())
        .bind(group_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().filter_map(RecordShareRow::into_share).collect())
    }

    async fn find_record_shares_for_collection(
        &self,
        tenant_id: &TenantId,
        collection_id: &CollectionId,
    ) -> Result<Vec<RecordShare>> {
        let rows = sqlx::query_as::<_, RecordShareRow>(
            r#"
            SELECT id, tenant_id, collection_id, record_id, shared_with_type,
                   shared_with_id, access_level, reason, created_at
            FROM record_share
            WHERE tenant_id = $1 AND collection_id = $2
            "#,
        )
        .bind(tenant_id.as_str())
        .bind(collection_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().filter_map(RecordShareRow::into_share).collect())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Directory
// ═══════════════════════════════════════════════════════════════════════════════

#[async_trait]
impl UserDirectory for PgSharingStore {
    async fn find_user_by_id(&self, user_id: &UserId) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, tenant_id, manager_id, role_id FROM platform_user WHERE id = $1",
        )
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    async fn find_subordinates(&self, manager_id: &UserId) -> Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(
            "SELECT id, tenant_id, manager_id, role_id FROM platform_user WHERE manager_id = $1",
        )
        .bind(manager_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn find_user_ids_by_role(
        &self,
        tenant_id: &TenantId,
        role_id: &RoleId,
    ) -> Result<Vec<UserId>> {
        let ids: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT id FROM platform_user
            WHERE role_id = $1 AND (tenant_id = $2 OR tenant_id IS NULL)
            "#,
        )
        .bind(role_id.as_str())
        .bind(tenant_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().map(UserId).collect())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Group Membership
// ═══════════════════════════════════════════════════════════════════════════════

#[async_trait]
impl GroupMembershipStore for PgSharingStore {
    async fn find_direct_group_ids_for_user(&self, user_id: &UserId) -> Result<Vec<GroupId>> {
        let ids: Vec<String> = sqlx::query_scalar(
            "SELECT group_id FROM group_membership WHERE member_type = 'USER' AND member_id = $1",
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().map(GroupId).collect())
    }

    async fn find_parent_groups(&self, group_id: &GroupId) -> Result<Vec<GroupMembership>> {
        let parents: Vec<String> = sqlx::query_scalar(
            "SELECT group_id FROM group_membership WHERE member_type = 'GROUP' AND member_id = $1",
        )
        .bind(group_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(parents
            .into_iter()
            .map(|parent| GroupMembership::nested(GroupId(parent), group_id.clone()))
            .collect())
    }

    async fn find_direct_user_ids_for_group(&self, group_id: &GroupId) -> Result<Vec<UserId>> {
        let ids: Vec<String> = sqlx::query_scalar(
            "SELECT member_id FROM group_membership WHERE group_id = $1 AND member_type = 'USER'",
        )
        .bind(group_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().map(UserId).collect())
    }

    async fn find_child_group_ids(&self, group_id: &GroupId) -> Result<Vec<GroupId>> {
        let ids: Vec<String> = sqlx::query_scalar(
            "SELECT member_id FROM group_membership WHERE group_id = $1 AND member_type = 'GROUP'",
        )
        .bind(group_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().map(GroupId).collect())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Row Types
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, sqlx::FromRow)]
struct OrgWideDefaultRow {
    tenant_id: String,
    collection_id: String,
    internal_access: String,
}

impl From<OrgWideDefaultRow> for OrgWideDefault {
    fn from(row: OrgWideDefaultRow) -> Self {
        OrgWideDefault::new(
            row.tenant_id,
            row.collection_id,
            DefaultAccess::parse(&row.internal_access),
        )
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SharingRuleRow {
    id: String,
    tenant_id: String,
    collection_id: String,
    name: Option<String>,
    rule_type: String,
    shared_from_type: Option<String>,
    shared_from_id: Option<String>,
    criteria: Option<serde_json::Value>,
    shared_to_type: String,
    shared_to_id: String,
    access_level: String,
    active: bool,
    created_at: DateTime<Utc>,
}

impl SharingRuleRow {
    /// Rows that cannot be interpreted grant nothing and are skipped.
    fn into_rule(self) -> Option<SharingRule> {
        let kind = match self.rule_type.as_str() {
            "OWNER_BASED" => {
                let shared_from = match (&self.shared_from_type, &self.shared_from_id) {
                    (Some(kind), Some(id)) => Principal::from_parts(kind, id.clone()),
                    _ => None,
                };
                RuleKind::OwnerBased {
                    shared_from: shared_from.or_else(|| {
                        warn!(rule_id = %self.id, "Owner-based rule without a valid source");
                        None
                    })?,
                }
            }
            "CRITERIA_BASED" => RuleKind::CriteriaBased {
                criteria: self.criteria.unwrap_or_default(),
            },
            other => {
                warn!(rule_id = %self.id, rule_type = other, "Skipping rule of unknown type");
                return None;
            }
        };

        let shared_to = Principal::from_parts(&self.shared_to_type, self.shared_to_id.clone());
        let access_level = AccessLevel::parse(&self.access_level);
        let (Some(shared_to), Some(access_level)) = (shared_to, access_level) else {
            warn!(rule_id = %self.id, "Skipping rule with invalid target or access level");
            return None;
        };

        Some(SharingRule {
            id: self.id,
            tenant_id: TenantId(self.tenant_id),
            collection_id: CollectionId(self.collection_id),
            name: self.name.unwrap_or_default(),
            kind,
            shared_to,
            access_level,
            active: self.active,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RecordShareRow {
    id: String,
    tenant_id: String,
    collection_id: String,
    record_id: String,
    shared_with_type: String,
    shared_with_id: String,
    access_level: String,
    reason: Option<String>,
    created_at: DateTime<Utc>,
}

impl RecordShareRow {
    fn into_share(self) -> Option<RecordShare> {
        let shared_with = match self.shared_with_type.as_str() {
            "USER" => ShareSubject::User(UserId(self.shared_with_id)),
            "GROUP" => ShareSubject::Group(GroupId(self.shared_with_id)),
            other => {
                warn!(share_id = %self.id, shared_with_type = other, "Skipping share of unknown subject type");
                return None;
            }
        };
        let Some(access_level) = AccessLevel::parse(&self.access_level) else {
            warn!(share_id = %self.id, "Skipping share with invalid access level");
            return None;
        };

        Some(RecordShare {
            id: self.id,
            tenant_id: TenantId(self.tenant_id),
            collection_id: CollectionId(self.collection_id),
            record_id: RecordId(self.record_id),
            shared_with,
            access_level,
            reason: self.reason,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: String,
    tenant_id: Option<String>,
    manager_id: Option<String>,
    role_id: Option<String>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: UserId(row.id),
            tenant_id: row.tenant_id.map(TenantId),
            manager_id: row.manager_id.map(UserId),
            role_id: row.role_id.map(RoleId),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn rule_row(rule_type: &str) -> SharingRuleRow {
        SharingRuleRow {
            id: "rule-1".to_string(),
            tenant_id: "t1".to_string(),
            collection_id: "accounts".to_string(),
            name: None,
            rule_type: rule_type.to_string(),
            shared_from_type: Some("QUEUE".to_string()),
            shared_from_id: Some("support".to_string()),
            criteria: None,
            shared_to_type: "ROLE".to_string(),
            shared_to_id: "agent".to_string(),
            access_level: "READ_WRITE".to_string(),
            active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_rule_row_conversion() {
        let rule = rule_row("OWNER_BASED").into_rule().unwrap();
        assert_eq!(
            rule.kind,
            RuleKind::OwnerBased {
                shared_from: Principal::Queue(GroupId::new("support"))
            }
        );
        assert_eq!(rule.shared_to, Principal::Role(RoleId::new("agent")));
        assert_eq!(rule.access_level, AccessLevel::ReadWrite);
    }

    #[test]
    fn test_malformed_rule_rows_are_skipped() {
        assert!(rule_row("TERRITORY").into_rule().is_none());

        let mut row = rule_row("OWNER_BASED");
        row.shared_from_id = None;
        assert!(row.into_rule().is_none());

        let mut row = rule_row("CRITERIA_BASED");
        row.access_level = "FULL".to_string();
        assert!(row.into_rule().is_none());
    }

    #[test]
    fn test_share_row_conversion() {
        let row = RecordShareRow {
            id: "s1".to_string(),
            tenant_id: "t1".to_string(),
            collection_id: "accounts".to_string(),
            record_id: "r1".to_string(),
            shared_with_type: "GROUP".to_string(),
            shared_with_id: "emea".to_string(),
            access_level: "READ".to_string(),
            reason: Some("escalation".to_string()),
            created_at: Utc::now(),
        };
        let share = row.into_share().unwrap();
        assert_eq!(share.shared_with, ShareSubject::Group(GroupId::new("emea")));
        assert_eq!(share.access_level, AccessLevel::Read);
    }
}
