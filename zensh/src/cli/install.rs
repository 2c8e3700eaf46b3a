// zensh/src/cli/install.rs
use std::io;
use std::sync::Arc;

use clap::Args;
use colored::Colorize;
use dialoguer::Confirm;
use tracing::{debug, instrument, warn};
use zensh_aio::fs::remove_directory_recursive;
use zensh_common::config::Config;
use zensh_common::error::{InstallFailures, Result, ZenshError};
use zensh_common::model::{Recipe, SourceKind};
use zensh_core::Orchestrator;

#[derive(Debug, Args)]
pub struct InstallArgs {
    /// Exit on failure instead of offering a retry
    #[arg(long)]
    pub no_retry: bool,

    /// Retry failed plugins without asking
    #[arg(short, long, conflicts_with = "no_retry")]
    pub yes: bool,
}

impl InstallArgs {
    #[instrument(skip_all, fields(recipes = config.recipes.len()))]
    pub async fn run(&self, config: &Config, orchestrator: &Orchestrator) -> Result<()> {
        let mut targets: Vec<Arc<Recipe>> = config.recipes.clone();

        loop {
            let report = orchestrator.install(&targets, io::stdout()).await;
            let installed = report.completed.len();
            let failures = match report.into_result() {
                Ok(_) => {
                    if installed > 0 {
                        println!("{} {} plugins installed", "==>".bold().blue(), installed);
                    }
                    return Ok(());
                }
                Err(failures) => failures,
            };

            print_failures(&failures);
            targets = self.after_failure(failures)?;
            debug!("Retrying {} failed recipes", targets.len());
        }
    }

    /// Cleans up after a failed batch and returns the recipes to run again,
    /// or the batch error when no retry is wanted.
    fn after_failure(&self, failures: InstallFailures) -> Result<Vec<Arc<Recipe>>> {
        remove_failed_destinations(&failures);
        if self.should_retry(failures.len())? {
            Ok(failures.recipes())
        } else {
            Err(ZenshError::Generic(failures.to_string()))
        }
    }

    fn should_retry(&self, failed: usize) -> Result<bool> {
        if self.no_retry {
            return Ok(false);
        }
        if self.yes {
            return Ok(true);
        }
        Confirm::new()
            .with_prompt(format!("Retry {failed} failed plugins?"))
            .default(true)
            .interact()
            .map_err(|e| {
                warn!("Cannot ask for a retry: {}", e);
                ZenshError::Generic(format!("retry prompt failed: {e}"))
            })
    }
}

pub(crate) fn print_failures(failures: &InstallFailures) {
    eprintln!();
    for failure in failures.iter() {
        eprintln!(
            "{} {}: {}",
            "Error".red().bold(),
            failure.recipe.repo().bold(),
            failure.error
        );
    }
}

/// Clears what a failed attempt left behind so the next install starts clean.
fn remove_failed_destinations(failures: &InstallFailures) {
    for failure in failures.iter() {
        let recipe = &failure.recipe;
        if recipe.source() == SourceKind::LocalPath {
            continue;
        }
        match remove_directory_recursive(recipe.directory()) {
            Ok(true) => debug!("Removed {}", recipe.directory().display()),
            Ok(false) => {}
            Err(e) => warn!(
                "Could not remove {} after failed install: {}",
                recipe.directory().display(),
                e
            ),
        }
    }
}
