// zensh-common/src/client.rs
//! Contracts of the external collaborators the install pipeline talks to.
//!
//! Implementations are built once at startup and handed to the installer, so
//! the pipeline can be exercised against fakes.

use std::io::Read;
use std::path::Path;

use crate::error::Result;
use crate::model::Asset;

pub trait VcsClient: Send + Sync {
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<()>;

    fn fetch(&self, dir: &Path) -> Result<()>;

    /// Checks out `reference`, trying the remote-tracking branch first and the
    /// plain ref or tag second.
    fn checkout(&self, dir: &Path, reference: &str) -> Result<()>;

    /// Saves uncommitted changes before a destructive operation. Failures are
    /// logged and swallowed.
    fn stash(&self, dir: &Path, message: &str);

    /// Stashes local edits, fetches and fast-forwards to the upstream branch.
    fn update(&self, dir: &Path) -> Result<()>;
}

pub trait ReleaseSource: Send + Sync {
    /// Best matching asset for the running platform from the latest release,
    /// or from the release tagged `tag`.
    fn fetch_latest_or_tagged(&self, owner: &str, repo: &str, tag: Option<&str>) -> Result<Asset>;

    fn open(&self, asset: &Asset) -> Result<Box<dyn Read + Send>>;
}
