//! List filter compilation.
//!
//! Prints the compiled predicate and its SQL rendering for a user and
//! collection.

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use super::AccessArg;
use crate::output::{self, OutputFormat};
use sharing_core::sharing::{
    AccessType, CollectionId, FilterColumn, FilterColumns, FilterOperator, RecordAccessService,
    SharingPredicate, SqlFragment, TenantId, UserId,
};

#[derive(Args)]
pub struct FilterArgs {
    /// User listing records
    #[arg(short, long)]
    user: String,

    /// Tenant being listed
    #[arg(short, long)]
    tenant: String,

    /// Collection being listed
    #[arg(short = 'C', long)]
    collection: String,

    /// Access type
    #[arg(short, long, value_enum, default_value = "read")]
    access: AccessArg,

    /// Physical record id column
    #[arg(long, default_value = "id")]
    id_column: String,

    /// Physical owner column
    #[arg(long, default_value = "owner_id")]
    owner_column: String,

    /// First SQL placeholder number
    #[arg(long, default_value = "1")]
    first_placeholder: usize,
}

#[derive(Serialize, Tabled)]
struct ClauseRow {
    #[tabled(rename = "Column")]
    column: String,
    #[tabled(rename = "Operator")]
    operator: String,
    #[tabled(rename = "Values")]
    values: String,
}

#[derive(Serialize)]
struct FilterResult<'a> {
    unrestricted: bool,
    predicate: Option<&'a SharingPredicate>,
    sql: Option<SqlFragment>,
}

pub async fn execute(args: FilterArgs, service: &RecordAccessService, format: OutputFormat) -> Result<()> {
    let filter = service
        .build_sharing_filter(
            &UserId::new(args.user),
            &TenantId::new(args.tenant),
            &CollectionId::new(args.collection),
            AccessType::from(args.access),
        )
        .await?;

    let columns = FilterColumns {
        id: args.id_column,
        owner: args.owner_column,
    };
    let sql = filter
        .as_ref()
        .map(|predicate| predicate.to_sql(&columns, args.first_placeholder));

    match format {
        OutputFormat::Table => {
            let (Some(predicate), Some(sql)) = (&filter, &sql) else {
                output::print_info("Unrestricted: every record in the collection is visible");
                return Ok(());
            };

            output::print_header("Sharing Filter");
            output::print_detail("Predicate", &predicate.to_string());
            output::print_detail("SQL", &sql.sql);
            output::print_detail("Params", &sql.params.join(", "));
            println!();

            let rows: Vec<ClauseRow> = predicate
                .clauses
                .iter()
                .map(|clause| ClauseRow {
                    column: match clause.column {
                        FilterColumn::Id => columns.id.clone(),
                        FilterColumn::Owner => columns.owner.clone(),
                    },
                    operator: match clause.operator {
                        FilterOperator::Eq => "=".to_string(),
                        FilterOperator::In => "IN".to_string(),
                    },
                    values: clause.values.join(", "),
                })
                .collect();
            output::print_list(&rows, format)?;
        }
        _ => output::print_item(
            &FilterResult {
                unrestricted: filter.is_none(),
                predicate: filter.as_ref(),
                sql,
            },
            format,
        )?,
    }

    Ok(())
}
