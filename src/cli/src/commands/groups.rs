//! Group resolution commands.
//!
//! `groups` walks up from a user, `members` walks down from a group.

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use sharing_core::sharing::{GroupId, RecordAccessService, UserId};

#[derive(Args)]
pub struct GroupsArgs {
    /// User whose groups to resolve
    user: String,
}

#[derive(Args)]
pub struct MembersArgs {
    /// Group whose users to resolve
    group: String,
}

#[derive(Serialize, Tabled)]
struct IdRow {
    #[tabled(rename = "ID")]
    id: String,
}

fn sorted_rows(ids: impl IntoIterator<Item = String>) -> Vec<IdRow> {
    let mut ids: Vec<String> = ids.into_iter().collect();
    ids.sort();
    ids.into_iter().map(|id| IdRow { id }).collect()
}

pub async fn execute_groups(args: GroupsArgs, service: &RecordAccessService, format: OutputFormat) -> Result<()> {
    let groups = service.effective_group_ids(&UserId::new(args.user)).await?;
    let rows = sorted_rows(groups.into_iter().map(|group| group.0));

    if let OutputFormat::Table = format {
        output::print_header(&format!(
            "Effective groups (max depth {})",
            service.group_resolver().max_depth()
        ));
    }
    output::print_list(&rows, format)
}

pub async fn execute_members(args: MembersArgs, service: &RecordAccessService, format: OutputFormat) -> Result<()> {
    let users = service.effective_user_ids(&GroupId::new(args.group)).await?;
    let rows = sorted_rows(users.into_iter().map(|user| user.0));

    if let OutputFormat::Table = format {
        output::print_header("Effective members");
    }
    output::print_list(&rows, format)
}
