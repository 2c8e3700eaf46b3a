// zensh-aio/src/lib.rs
//! Blocking IO for zensh (filesystem, json records, archives, git, processes)

pub mod extract;
pub mod fs;
pub mod git2;
pub mod git_command;
pub mod json_io;
pub mod process;

pub use extract::{detect, extract_archive, ArchiveType, PeekReader};
pub use fs::*;
pub use git2::Git2Client;
pub use git_command::GitCommand;
pub use json_io::{read_asset_record, read_json, write_asset_record, write_json};
pub use process::run_command;
