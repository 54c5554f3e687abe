//! Subcommands and the argument types they share.

pub mod check;
pub mod filter;
pub mod groups;

use clap::ValueEnum;
use sharing_core::sharing::AccessType;

/// Access type accepted on the command line.
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum AccessArg {
    #[default]
    Read,
    Edit,
    Delete,
}

impl From<AccessArg> for AccessType {
    fn from(arg: AccessArg) -> Self {
        match arg {
            AccessArg::Read => AccessType::Read,
            AccessArg::Edit => AccessType::Edit,
            AccessArg::Delete => AccessType::Delete,
        }
    }
}
