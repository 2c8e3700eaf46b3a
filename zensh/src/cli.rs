// zensh/src/cli.rs
//! Defines the command-line argument structure using clap.
use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use zensh_common::error::Result;
use zensh_common::Config;
use zensh_core::Orchestrator;

pub mod info;
pub mod install;
pub mod outdated;
pub mod update;

use crate::cli::info::Info;
use crate::cli::install::InstallArgs;
use crate::cli::outdated::Outdated;
use crate::cli::update::Update;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, name = "zensh", bin_name = "zensh")]
#[command(propagate_version = true)]
pub struct CliArgs {
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Plugin list to use instead of $ZENSH_CONFIG or ~/.zensh/plugins.toml
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Install every configured plugin that is not present yet
    Install(InstallArgs),
    /// Show the installed version of each plugin
    #[command(alias = "list")]
    Info(Info),
    /// List plugins with new commits or releases upstream
    Outdated(Outdated),
    /// Update installed plugins
    Update(Update),
}

impl Command {
    pub async fn run(&self, config: &Config, orchestrator: &Orchestrator) -> Result<()> {
        match self {
            Self::Install(command) => command.run(config, orchestrator).await,
            Self::Info(command) => command.run(config),
            Self::Outdated(command) => command.run(config, orchestrator).await,
            Self::Update(command) => command.run(config, orchestrator).await,
        }
    }
}
