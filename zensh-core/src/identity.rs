// zensh-core/src/identity.rs
use zensh_aio::git2::{head_oid, open_repo};
use zensh_aio::json_io::read_asset_record;
use zensh_common::error::{Result, ZenshError};
use zensh_common::model::{Identity, Recipe, SourceKind};

/// What is currently installed for `recipe`: the recorded asset id for release
/// archives, the checked out commit for repositories.
pub fn identity_of(recipe: &Recipe) -> Result<Identity> {
    if !recipe.is_installed() {
        return Err(match recipe.source() {
            SourceKind::LocalPath => ZenshError::NotFound(recipe.repo().to_string()),
            _ => ZenshError::NotInstalled(recipe.repo().to_string()),
        });
    }

    match recipe.source() {
        SourceKind::ReleaseArchive => Ok(Identity::Release(read_asset_record(recipe)?.id)),
        SourceKind::VcsHosted => Ok(Identity::Commit(head_oid(&open_repo(recipe.directory())?)?)),
        SourceKind::LocalPath => Ok(Identity::Untracked),
    }
}
