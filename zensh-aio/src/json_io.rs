// zensh-aio/src/json_io.rs
use std::io::BufReader;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use zensh_common::error::{Result, ZenshError};
use zensh_common::model::{Asset, Recipe};

/// Writes serializable data to a JSON file (pretty-printed), atomically.
pub fn write_json<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    debug!("Writing JSON to: {}", path.display());
    let json_bytes = serde_json::to_vec_pretty(data)?;
    crate::fs::atomic_write_file(path, &json_bytes)
}

/// Reads and deserializes data from a JSON file.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    debug!("Reading JSON from: {}", path.display());
    let file = crate::fs::open_file(path)?;
    serde_json::from_reader(BufReader::new(file)).map_err(ZenshError::from)
}

/// Persists the asset a release-archive recipe was installed from.
pub fn write_asset_record(recipe: &Recipe, asset: &Asset) -> Result<()> {
    write_json(&recipe.asset_record_path()?, asset)
}

pub fn read_asset_record(recipe: &Recipe) -> Result<Asset> {
    read_json(&recipe.asset_record_path()?)
}
