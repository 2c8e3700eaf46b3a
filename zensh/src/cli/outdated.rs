// zensh/src/cli/outdated.rs
use std::io;
use std::sync::Arc;

use clap::Args;
use colored::Colorize;
use tracing::{instrument, warn};
use zensh_common::config::Config;
use zensh_common::error::Result;
use zensh_common::model::Recipe;
use zensh_core::{CheckOptions, JobOutcome, Orchestrator, UpdateInfo};

#[derive(Args, Debug)]
pub struct Outdated {
    /// Compare against what was fetched last time
    #[arg(long)]
    pub no_fetch: bool,
}

impl Outdated {
    #[instrument(skip_all)]
    pub async fn run(&self, config: &Config, orchestrator: &Orchestrator) -> Result<()> {
        let options = CheckOptions {
            fetch: !self.no_fetch,
            history_limit: config.git.history_limit,
        };
        let report = orchestrator
            .check_updates(&config.recipes, options, io::stdout())
            .await;

        // Detection errors only cost the affected plugin its line.
        for failure in report.failures.iter() {
            warn!("Update check for {} failed: {}", failure.recipe, failure.error);
        }

        let outdated = in_config_order(&config.recipes, report.completed);
        if outdated.is_empty() {
            println!("{} All plugins are up to date.", "==>".bold().blue());
            return Ok(());
        }
        for (recipe, info) in outdated {
            println!("{}: {}", recipe.repo().bold(), info.summary().yellow());
        }
        Ok(())
    }
}

fn in_config_order(
    recipes: &[Arc<Recipe>],
    completed: Vec<(Arc<Recipe>, UpdateInfo)>,
) -> Vec<(Arc<Recipe>, UpdateInfo)> {
    let mut outdated: Vec<_> = completed
        .into_iter()
        .filter(|(_, info)| info.has_update())
        .collect();
    outdated.sort_by_key(|(recipe, _)| {
        recipes
            .iter()
            .position(|r| Arc::ptr_eq(r, recipe))
            .unwrap_or(usize::MAX)
    });
    outdated
}
