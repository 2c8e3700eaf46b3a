// zensh-core/src/install/mod.rs
//! Per-recipe install and update logic. Everything here is blocking and runs
//! on a worker thread; progress goes to the recipe's [`TaskHandle`].

pub mod release;

use std::fmt;
use std::sync::Arc;

use tracing::{debug, instrument};
use zensh_aio::git2::{head_oid, open_repo};
use zensh_common::client::{ReleaseSource, VcsClient};
use zensh_common::error::{Result, ZenshError};
use zensh_common::model::{Recipe, SourceKind};

use crate::pipeline::JobOutcome;
use crate::progress::TaskHandle;

/// External services the pipeline talks to, built once at startup.
#[derive(Clone)]
pub struct Collaborators {
    pub vcs: Arc<dyn VcsClient>,
    pub releases: Arc<dyn ReleaseSource>,
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    AlreadyInstalled,
    Installed,
}

impl JobOutcome for InstallOutcome {
    fn summary(&self) -> String {
        match self {
            InstallOutcome::AlreadyInstalled => "already installed".to_string(),
            InstallOutcome::Installed => "done!".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    UpToDate,
    Updated,
}

impl JobOutcome for UpdateOutcome {
    fn summary(&self) -> String {
        match self {
            UpdateOutcome::UpToDate => "up to date".to_string(),
            UpdateOutcome::Updated => "updated!".to_string(),
        }
    }
}

/// Brings `recipe` to the installed state. An existing destination counts as
/// installed and is left untouched; on failure whatever was written stays.
#[instrument(skip_all, fields(recipe = %recipe))]
pub fn install_recipe(
    recipe: &Recipe,
    collaborators: &Collaborators,
    task: &TaskHandle,
) -> Result<InstallOutcome> {
    if recipe.is_installed() {
        debug!("{} already present at {}", recipe, recipe.directory().display());
        return Ok(InstallOutcome::AlreadyInstalled);
    }

    match recipe.source() {
        SourceKind::VcsHosted => install_vcs(recipe, collaborators.vcs.as_ref(), task)?,
        SourceKind::ReleaseArchive => {
            release::install_release(recipe, collaborators.releases.as_ref(), task)?;
        }
        SourceKind::LocalPath => {
            return Err(ZenshError::NotFound(recipe.repo().to_string()));
        }
    }
    Ok(InstallOutcome::Installed)
}

fn install_vcs(recipe: &Recipe, vcs: &dyn VcsClient, task: &TaskHandle) -> Result<()> {
    let url = recipe.remote_url();
    task.update(format!("cloning {url} ..."));
    vcs.clone_repo(&url, recipe.directory())?;

    if let Some(version) = recipe.version() {
        task.update(format!("checkout {version} ..."));
        vcs.checkout(recipe.directory(), version)?;
    }
    Ok(())
}

/// Moves an installed recipe to its newest upstream state.
#[instrument(skip_all, fields(recipe = %recipe))]
pub fn update_recipe(
    recipe: &Recipe,
    collaborators: &Collaborators,
    task: &TaskHandle,
) -> Result<UpdateOutcome> {
    if !recipe.is_installed() {
        return Err(ZenshError::NotInstalled(recipe.repo().to_string()));
    }

    match recipe.source() {
        SourceKind::LocalPath => Ok(UpdateOutcome::UpToDate),
        SourceKind::VcsHosted => {
            let before = head_oid(&open_repo(recipe.directory())?)?;
            task.update("updating ...");
            collaborators.vcs.update(recipe.directory())?;
            let after = head_oid(&open_repo(recipe.directory())?)?;
            debug!("{}: {} -> {}", recipe, before, after);
            Ok(if before == after {
                UpdateOutcome::UpToDate
            } else {
                UpdateOutcome::Updated
            })
        }
        SourceKind::ReleaseArchive => {
            release::update_release(recipe, collaborators.releases.as_ref(), task)
        }
    }
}
