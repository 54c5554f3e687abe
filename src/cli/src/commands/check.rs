//! Single-record access check.

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use super::AccessArg;
use crate::output::{self, OutputFormat};
use sharing_core::sharing::{
    AccessDecision, AccessType, CollectionId, RecordAccessService, RecordId, TenantId, UserId,
};

#[derive(Args)]
pub struct CheckArgs {
    /// User requesting access
    #[arg(short, long)]
    user: String,

    /// Tenant the record belongs to
    #[arg(short, long)]
    tenant: String,

    /// Collection the record belongs to
    #[arg(short = 'C', long)]
    collection: String,

    /// Record ID
    #[arg(short, long)]
    record: String,

    /// Record owner, if any
    #[arg(long)]
    owner: Option<String>,

    /// Access type
    #[arg(short, long, value_enum, default_value = "read")]
    access: AccessArg,
}

#[derive(Serialize)]
struct CheckResult<'a> {
    user_id: &'a str,
    record_id: &'a str,
    access: AccessType,
    allowed: bool,
    decision: &'a AccessDecision,
}

pub async fn execute(args: CheckArgs, service: &RecordAccessService, format: OutputFormat) -> Result<()> {
    let user_id = UserId::new(args.user);
    let record_id = RecordId::new(args.record);
    let owner_id = args.owner.map(UserId::new);
    let access = AccessType::from(args.access);

    let decision = service
        .evaluate(
            &user_id,
            &TenantId::new(args.tenant),
            &CollectionId::new(args.collection),
            &record_id,
            owner_id.as_ref(),
            access,
        )
        .await?;

    match format {
        OutputFormat::Table => {
            output::print_header("Access Check");
            output::print_detail("User", user_id.as_str());
            output::print_detail("Record", record_id.as_str());
            output::print_detail("Owner", owner_id.as_ref().map_or("-", UserId::as_str));
            output::print_detail("Access", access.as_str());
            println!();

            let message = format!("{} {} {}: {}", user_id, access, record_id, decision);
            if decision.is_granted() {
                output::print_granted(&message);
            } else {
                output::print_denied(&message);
            }
        }
        _ => output::print_item(
            &CheckResult {
                user_id: user_id.as_str(),
                record_id: record_id.as_str(),
                access,
                allowed: decision.is_granted(),
                decision: &decision,
            },
            format,
        )?,
    }

    Ok(())
}
