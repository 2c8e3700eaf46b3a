// zensh-common/src/model/recipe.rs
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::{expand_home, Directories};
use crate::error::{Result, ZenshError};

/// Where a recipe is obtained from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SourceKind {
    /// A git repository hosted on GitHub, installed by cloning.
    #[default]
    #[serde(rename = "github")]
    VcsHosted,
    /// A prebuilt asset attached to a GitHub release.
    #[serde(rename = "github-release")]
    ReleaseArchive,
    /// A directory already present on the local filesystem.
    #[serde(rename = "local")]
    LocalPath,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SourceKind::VcsHosted => "github",
            SourceKind::ReleaseArchive => "github-release",
            SourceKind::LocalPath => "local",
        })
    }
}

/// How the shell integration treats the recipe once installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecipeKind {
    #[default]
    Plugin,
    Command,
}

impl fmt::Display for RecipeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RecipeKind::Plugin => "plugin",
            RecipeKind::Command => "command",
        })
    }
}

/// A `[[plugin]]` table as written in the configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct RecipeSpec {
    pub repo: String,
    #[serde(default)]
    pub source: SourceKind,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default, rename = "as")]
    pub kind: RecipeKind,
}

/// One declared installable artifact with its destination already resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipe {
    repo: String,
    source: SourceKind,
    version: Option<String>,
    kind: RecipeKind,
    destination: PathBuf,
}

impl Recipe {
    pub fn from_spec(spec: RecipeSpec, dirs: &Directories, home: &Path) -> Result<Self> {
        let repo = spec.repo.trim().to_string();
        if repo.is_empty() {
            return Err(ZenshError::Config(
                "plugin entry with an empty `repo`".to_string(),
            ));
        }
        if spec.source != SourceKind::LocalPath
            && repo.split('/').any(|part| part == "." || part == "..")
        {
            return Err(ZenshError::InvalidRepository(repo));
        }
        let version = spec.version.filter(|v| !v.trim().is_empty());
        let destination = Self::resolve_destination(spec.source, &repo, dirs, home);
        Ok(Self {
            repo,
            source: spec.source,
            version,
            kind: spec.kind,
            destination,
        })
    }

    /// Destination directory for `(source, repo)` under the configured roots.
    pub fn resolve_destination(
        source: SourceKind,
        repo: &str,
        dirs: &Directories,
        home: &Path,
    ) -> PathBuf {
        let prefix = match source {
            SourceKind::VcsHosted => "github.com",
            SourceKind::ReleaseArchive => "github-release",
            SourceKind::LocalPath => {
                let path = expand_home(home, repo);
                if path.is_absolute() {
                    return path;
                }
                return dirs.local.join(path);
            }
        };
        let mut dest = dirs.repo.join(prefix);
        for part in repo.split('/').filter(|p| !p.is_empty()) {
            dest.push(part);
        }
        dest
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    pub fn source(&self) -> SourceKind {
        self.source
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn kind(&self) -> RecipeKind {
        self.kind
    }

    pub fn directory(&self) -> &Path {
        &self.destination
    }

    pub fn is_installed(&self) -> bool {
        self.destination.exists()
    }

    pub fn remote_url(&self) -> String {
        format!("https://github.com/{}.git", self.repo)
    }

    /// Splits `owner/name`; anything else is rejected.
    pub fn owner_and_name(&self) -> Result<(&str, &str)> {
        match self.repo.split('/').collect::<Vec<_>>().as_slice() {
            [owner, name] if !owner.is_empty() && !name.is_empty() => Ok((owner, name)),
            _ => Err(ZenshError::InvalidRepository(self.repo.clone())),
        }
    }

    /// `<repo>.json` stored beside the extracted directory.
    pub fn asset_record_path(&self) -> Result<PathBuf> {
        let (_, name) = self.owner_and_name()?;
        let parent = self
            .destination
            .parent()
            .ok_or_else(|| ZenshError::InvalidRepository(self.repo.clone()))?;
        Ok(parent.join(format!("{name}.json")))
    }
}

impl fmt::Display for Recipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repo)
    }
}
