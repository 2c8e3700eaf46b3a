// zensh-core/src/install/release.rs
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use zensh_aio::extract::extract_archive;
use zensh_aio::fs::remove_directory_recursive;
use zensh_aio::json_io::{read_asset_record, write_asset_record};
use zensh_common::client::ReleaseSource;
use zensh_common::error::Result;
use zensh_common::model::{Asset, Recipe};

use super::UpdateOutcome;
use crate::progress::TaskHandle;

fn best_asset(recipe: &Recipe, releases: &dyn ReleaseSource, task: &TaskHandle) -> Result<Asset> {
    let (owner, name) = recipe.owner_and_name()?;
    task.update("fetching release information ...");
    releases.fetch_latest_or_tagged(owner, name, recipe.version())
}

fn unpack_asset(
    destination: &Path,
    releases: &dyn ReleaseSource,
    task: &TaskHandle,
    asset: &Asset,
) -> Result<()> {
    task.update(format!("downloading {} ...", asset.name));
    let stream = releases.open(asset)?;
    extract_archive(destination, &asset.name, stream)
}

/// Downloads `asset`, unpacks it into the destination and records its id.
fn install_asset(
    recipe: &Recipe,
    releases: &dyn ReleaseSource,
    task: &TaskHandle,
    asset: &Asset,
) -> Result<()> {
    unpack_asset(recipe.directory(), releases, task, asset)?;
    write_asset_record(recipe, asset)?;
    debug!("{} installed from asset {} ({})", recipe, asset.name, asset.id);
    Ok(())
}

pub fn install_release(recipe: &Recipe, releases: &dyn ReleaseSource, task: &TaskHandle) -> Result<Asset> {
    let asset = best_asset(recipe, releases, task)?;
    install_asset(recipe, releases, task, &asset)?;
    Ok(asset)
}

/// Sibling directory a replacement asset is unpacked into.
fn staging_path(destination: &Path) -> PathBuf {
    let mut staged = destination.as_os_str().to_os_string();
    staged.push(".zensh-update");
    PathBuf::from(staged)
}

/// Reinstalls when the remote's best asset differs from the recorded one.
/// The installed copy and its record stay untouched until the new asset
/// has been unpacked.
pub fn update_release(
    recipe: &Recipe,
    releases: &dyn ReleaseSource,
    task: &TaskHandle,
) -> Result<UpdateOutcome> {
    let installed = read_asset_record(recipe)?;
    let available = best_asset(recipe, releases, task)?;
    if available.id == installed.id {
        return Ok(UpdateOutcome::UpToDate);
    }

    debug!(
        "{}: replacing asset {} with {}",
        recipe, installed.id, available.id
    );
    let staging = staging_path(recipe.directory());
    remove_directory_recursive(&staging)?;
    if let Err(e) = unpack_asset(&staging, releases, task, &available) {
        if let Err(cleanup) = remove_directory_recursive(&staging) {
            warn!("Could not remove {}: {}", staging.display(), cleanup);
        }
        return Err(e);
    }

    remove_directory_recursive(recipe.directory())?;
    fs::rename(&staging, recipe.directory())?;
    write_asset_record(recipe, &available)?;
    debug!("{} updated to asset {} ({})", recipe, available.name, available.id);
    Ok(UpdateOutcome::Updated)
}
