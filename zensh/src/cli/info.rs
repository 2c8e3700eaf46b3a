// zensh/src/cli/info.rs
use clap::Args;
use colored::Colorize;
use tracing::debug;
use zensh_common::config::Config;
use zensh_common::error::{Result, ZenshError};
use zensh_common::model::{Identity, Recipe};
use zensh_core::identity_of;

#[derive(Args, Debug)]
pub struct Info {}

impl Info {
    pub fn run(&self, config: &Config) -> Result<()> {
        if config.recipes.is_empty() {
            println!("No plugins configured.");
            return Ok(());
        }

        let width = config
            .recipes
            .iter()
            .map(|r| r.repo().chars().count())
            .max()
            .unwrap_or(0);

        for recipe in &config.recipes {
            println!("{}", format_row(recipe, identity_of(recipe), width));
        }
        Ok(())
    }
}

fn format_row(recipe: &Recipe, identity: Result<Identity>, width: usize) -> String {
    let name = format!("{:<width$}", recipe.repo());
    let source = format!("{:<14}", recipe.source().to_string());
    let state = match identity {
        Ok(Identity::Release(id)) => format!("Release {id}").green().to_string(),
        Ok(identity @ Identity::Commit(_)) => identity.to_string().green().to_string(),
        Ok(Identity::Untracked) => "-".normal().to_string(),
        Err(ZenshError::NotInstalled(_) | ZenshError::NotFound(_)) => "not installed".yellow().to_string(),
        Err(e) => {
            debug!("Identity of {} unavailable: {}", recipe, e);
            format!("error: {e}").red().to_string()
        }
    };
    format!("{} {} {}", name.bold(), source.dimmed(), state)
}
