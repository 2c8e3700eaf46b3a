// zensh/src/cli/update.rs
use std::io;

use clap::Args;
use colored::Colorize;
use tracing::instrument;
use zensh_common::config::Config;
use zensh_common::error::{Result, ZenshError};
use zensh_core::{Orchestrator, UpdateOutcome};

use crate::cli::install::print_failures;

#[derive(Args, Debug)]
pub struct Update;

impl Update {
    #[instrument(skip_all)]
    pub async fn run(&self, config: &Config, orchestrator: &Orchestrator) -> Result<()> {
        let report = orchestrator.update(&config.recipes, io::stdout()).await;

        let updated = report
            .completed
            .iter()
            .filter(|(_, outcome)| *outcome == UpdateOutcome::Updated)
            .count();
        println!(
            "{} {} of {} plugins updated",
            "==>".bold().blue(),
            updated,
            report.completed.len()
        );

        if report.failures.is_empty() {
            return Ok(());
        }
        print_failures(&report.failures);
        Err(ZenshError::Generic(report.failures.to_string()))
    }
}
