//! Structured sharing predicate for list queries.
//!
//! A [`SharingPredicate`] is a disjunction of `(column, operator, values)`
//! clauses. It never carries SQL text: callers either evaluate it directly
//! with [`SharingPredicate::matches`] or render it with
//! [`SharingPredicate::to_sql`], which emits bind placeholders for every value
//! and takes identifiers only from the caller's [`FilterColumns`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::models::{RecordId, UserId};

// ═══════════════════════════════════════════════════════════════════════════════
// Clauses
// ═══════════════════════════════════════════════════════════════════════════════

/// Logical record column a clause tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterColumn {
    Id,
    Owner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    Eq,
    In,
}

/// One `column operator values` test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterClause {
    pub column: FilterColumn,
    pub operator: FilterOperator,
    pub values: Vec<String>,
}

impl FilterClause {
    pub fn owner_eq(user_id: &UserId) -> Self {
        Self {
            column: FilterColumn::Owner,
            operator: FilterOperator::Eq,
            values: vec![user_id.to_string()],
        }
    }

    pub fn owner_in<'a>(user_ids: impl IntoIterator<Item = &'a UserId>) -> Self {
        Self::set(FilterColumn::Owner, user_ids.into_iter().map(UserId::as_str))
    }

    pub fn id_in<'a>(record_ids: impl IntoIterator<Item = &'a RecordId>) -> Self {
        Self::set(FilterColumn::Id, record_ids.into_iter().map(RecordId::as_str))
    }

    fn set<'a>(column: FilterColumn, values: impl Iterator<Item = &'a str>) -> Self {
        let values: BTreeSet<&str> = values.collect();
        Self {
            column,
            operator: FilterOperator::In,
            values: values.into_iter().map(str::to_string).collect(),
        }
    }

    fn matches(&self, record_id: &RecordId, owner_id: Option<&UserId>) -> bool {
        let value = match self.column {
            FilterColumn::Id => Some(record_id.as_str()),
            FilterColumn::Owner => owner_id.map(UserId::as_str),
        };
        value.map_or(false, |v| self.values.iter().any(|candidate| candidate == v))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Predicate
// ═══════════════════════════════════════════════════════════════════════════════

/// OR of clauses. No clauses means no record matches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharingPredicate {
    pub clauses: Vec<FilterClause>,
}

impl SharingPredicate {
    pub fn new(clauses: Vec<FilterClause>) -> Self {
        Self { clauses }
    }

    /// The predicate returned when the object-level gate fails.
    pub fn match_nothing() -> Self {
        Self::default()
    }

    pub fn is_match_nothing(&self) -> bool {
        self.clauses.iter().all(|clause| clause.values.is_empty())
    }

    pub fn push(&mut self, clause: FilterClause) {
        self.clauses.push(clause);
    }

    /// Evaluate the predicate against one record. A record without an owner
    /// only matches through its id.
    pub fn matches(&self, record_id: &RecordId, owner_id: Option<&UserId>) -> bool {
        self.clauses
            .iter()
            .any(|clause| clause.matches(record_id, owner_id))
    }

    /// Render as a parameterised SQL boolean expression.
    ///
    /// Placeholders are numbered from `first_placeholder` (`$n` style) so the
    /// fragment can be appended to a query that already binds parameters.
    pub fn to_sql(&self, columns: &FilterColumns, first_placeholder: usize) -> SqlFragment {
        let mut params = Vec::new();
        let mut parts = Vec::with_capacity(self.clauses.len());
        let mut next = first_placeholder;

        for clause in &self.clauses {
            if clause.values.is_empty() {
                continue;
            }
            let column = quote_ident(columns.column(clause.column));
            let placeholders: Vec<String> = clause
                .values
                .iter()
                .map(|value| {
                    params.push(value.clone());
                    let placeholder = format!("${}", next);
                    next += 1;
                    placeholder
                })
                .collect();

            parts.push(match clause.operator {
                FilterOperator::Eq if placeholders.len() == 1 => {
                    format!("{} = {}", column, placeholders[0])
                }
                _ => format!("{} IN ({})", column, placeholders.join(", ")),
            });
        }

        let sql = match parts.len() {
            0 => "FALSE".to_string(),
            1 => parts.remove(0),
            _ => format!("({})", parts.join(" OR ")),
        };
        SqlFragment { sql, params }
    }
}

impl fmt::Display for SharingPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_match_nothing() {
            return f.write_str("FALSE");
        }
        let rendered: Vec<String> = self
            .clauses
            .iter()
            .filter(|clause| !clause.values.is_empty())
            .map(|clause| {
                let column = match clause.column {
                    FilterColumn::Id => "id",
                    FilterColumn::Owner => "owner",
                };
                match clause.operator {
                    FilterOperator::Eq => format!("{} = {}", column, clause.values.join(", ")),
                    FilterOperator::In => format!("{} IN [{}]", column, clause.values.join(", ")),
                }
            })
            .collect();
        f.write_str(&rendered.join(" OR "))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SQL Rendering
// ═══════════════════════════════════════════════════════════════════════════════

/// Physical column names for the logical filter columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterColumns {
    pub id: String,
    pub owner: String,
}

impl Default for FilterColumns {
    fn default() -> Self {
        Self {
            id: "id".to_string(),
            owner: "owner_id".to_string(),
        }
    }
}

impl FilterColumns {
    fn column(&self, column: FilterColumn) -> &str {
        match column {
            FilterColumn::Id => &self.id,
            FilterColumn::Owner => &self.owner,
        }
    }
}

/// SQL text plus the values to bind, in placeholder order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlFragment {
    pub sql: String,
    pub params: Vec<String>,
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
