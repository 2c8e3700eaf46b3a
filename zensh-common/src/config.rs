// zensh-common/src/config.rs
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use directories::UserDirs;
use serde::Deserialize;
use tracing::debug;

use super::error::{Result, ZenshError};
use crate::model::{Recipe, RecipeSpec};

pub const DEFAULT_THREADS: usize = 8;
const DEFAULT_REPO_DIR: &str = "~/.zensh";
const DEFAULT_LOCAL_DIR: &str = "~/.zensh/local";
const CONFIG_FILENAME: &str = "plugins.toml";

/// Roots under which recipes are installed, already `~`-expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directories {
    pub repo: PathBuf,
    pub local: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GitBackend {
    /// Linked libgit2 through the `git2` crate.
    #[default]
    Libgit2,
    /// Shells out to the `git` executable.
    Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GitSettings {
    pub backend: GitBackend,
    pub command: String,
    /// Shallow clone depth, 0 clones the full history.
    pub depth: u32,
    /// Maximum number of commits walked when counting new commits, 0 = unlimited.
    pub history_limit: usize,
}

impl Default for GitSettings {
    fn default() -> Self {
        Self {
            backend: GitBackend::default(),
            command: "git".to_string(),
            depth: 0,
            history_limit: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub threads: usize,
    pub directories: Directories,
    pub github_token: Option<String>,
    pub git: GitSettings,
    pub home: PathBuf,
    pub recipes: Vec<Arc<Recipe>>,
}

#[derive(Debug, Default, Deserialize)]
struct RawConfigFile {
    #[serde(default)]
    config: RawGlobalConfig,
    #[serde(default)]
    plugin: Vec<RecipeSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawGlobalConfig {
    threads: usize,
    directories: RawDirectories,
    github: RawGithub,
    git: GitSettings,
}

impl Default for RawGlobalConfig {
    fn default() -> Self {
        Self {
            threads: DEFAULT_THREADS,
            directories: RawDirectories::default(),
            github: RawGithub::default(),
            git: GitSettings::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawDirectories {
    repo: String,
    local: String,
}

impl Default for RawDirectories {
    fn default() -> Self {
        Self {
            repo: DEFAULT_REPO_DIR.to_string(),
            local: DEFAULT_LOCAL_DIR.to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawGithub {
    token: String,
}

impl Config {
    /// Reads the configuration file at `path`. `ZENSH_GITHUB_TOKEN` overrides the
    /// token from the file.
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading zensh configuration from {}", path.display());
        let text = fs::read_to_string(path).map_err(|e| {
            ZenshError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let mut config = Self::from_toml_str(&text, &home_dir())?;

        if let Some(token) = env::var("ZENSH_GITHUB_TOKEN").ok().filter(|s| !s.is_empty()) {
            debug!("Using GitHub token from ZENSH_GITHUB_TOKEN");
            config.github_token = Some(token);
        }

        debug!(
            "Configuration loaded successfully ({} recipes, {} threads).",
            config.recipes.len(),
            config.threads
        );
        Ok(config)
    }

    pub fn from_toml_str(text: &str, home: &Path) -> Result<Self> {
        let raw: RawConfigFile = toml::from_str(text)?;
        let global = raw.config;

        if global.threads == 0 {
            return Err(ZenshError::Config(
                "`threads` must be at least 1".to_string(),
            ));
        }

        let directories = Directories {
            repo: expand_home(home, &global.directories.repo),
            local: expand_home(home, &global.directories.local),
        };

        let recipes = raw
            .plugin
            .into_iter()
            .map(|spec| Recipe::from_spec(spec, &directories, home).map(Arc::new))
            .collect::<Result<Vec<_>>>()?;

        let github_token = Some(global.github.token).filter(|t| !t.is_empty());

        Ok(Self {
            threads: global.threads,
            directories,
            github_token,
            git: global.git,
            home: home.to_path_buf(),
            recipes,
        })
    }

    pub fn repo_dir(&self) -> &Path {
        &self.directories.repo
    }

    pub fn local_dir(&self) -> &Path {
        &self.directories.local
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.directories.repo.join("logs")
    }
}

/// `ZENSH_CONFIG` if set, otherwise `~/.zensh/plugins.toml`.
pub fn default_config_path() -> PathBuf {
    match env::var("ZENSH_CONFIG").ok().filter(|s| !s.is_empty()) {
        Some(path) => PathBuf::from(path),
        None => expand_home(&home_dir(), DEFAULT_REPO_DIR).join(CONFIG_FILENAME),
    }
}

pub fn home_dir() -> PathBuf {
    UserDirs::new().map_or_else(|| PathBuf::from("/"), |ud| ud.home_dir().to_path_buf())
}

/// Replaces a leading `~` component with `home`.
pub fn expand_home(home: &Path, path: &str) -> PathBuf {
    if path == "~" {
        return home.to_path_buf();
    }
    match path.strip_prefix("~/") {
        Some(rest) => home.join(rest),
        None => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::model::{RecipeKind, SourceKind};

    #[test]
    fn defaults_apply_to_an_empty_file() {
        let config = Config::from_toml_str("", Path::new("/home/u")).unwrap();
        assert_eq!(config.threads, DEFAULT_THREADS);
        assert_eq!(config.repo_dir(), Path::new("/home/u/.zensh"));
        assert_eq!(config.local_dir(), Path::new("/home/u/.zensh/local"));
        assert_eq!(config.github_token, None);
        assert_eq!(config.git, GitSettings::default());
        assert!(config.recipes.is_empty());
    }

    #[test]
    fn parses_plugins_in_declaration_order() {
        let text = r#"
            [config]
            threads = 3

            [config.directories]
            repo = "/srv/zensh"

            [config.github]
            token = "abc"

            [config.git]
            backend = "command"
            history_limit = 50

            [[plugin]]
            repo = "zsh-users/zsh-syntax-highlighting"

            [[plugin]]
            repo = "junegunn/fzf"
            source = "github-release"
            version = "0.44.1"
            as = "command"

            [[plugin]]
            repo = "~/dotfiles/zsh"
            source = "local"
        "#;
        let config = Config::from_toml_str(text, Path::new("/home/u")).unwrap();
        assert_eq!(config.threads, 3);
        assert_eq!(config.github_token.as_deref(), Some("abc"));
        assert_eq!(config.git.backend, GitBackend::Command);
        assert_eq!(config.git.history_limit, 50);
        assert_eq!(config.git.command, "git");
        assert_eq!(config.local_dir(), Path::new("/home/u/.zensh/local"));

        let repos: Vec<_> = config.recipes.iter().map(|r| r.repo()).collect();
        assert_eq!(
            repos,
            ["zsh-users/zsh-syntax-highlighting", "junegunn/fzf", "~/dotfiles/zsh"]
        );
        assert_eq!(config.recipes[0].source(), SourceKind::VcsHosted);
        assert_eq!(config.recipes[1].source(), SourceKind::ReleaseArchive);
        assert_eq!(config.recipes[1].version(), Some("0.44.1"));
        assert_eq!(config.recipes[1].kind(), RecipeKind::Command);
        assert_eq!(
            config.recipes[1].directory(),
            Path::new("/srv/zensh/github-release/junegunn/fzf")
        );
        assert_eq!(
            config.recipes[2].directory(),
            Path::new("/home/u/dotfiles/zsh")
        );
    }

    #[test]
    fn rejects_unknown_source_and_zero_threads() {
        let bad_source = "[[plugin]]\nrepo = \"a/b\"\nsource = \"gitlab\"\n";
        assert!(matches!(
            Config::from_toml_str(bad_source, Path::new("/h")),
            Err(ZenshError::Toml(_))
        ));

        let zero = "[config]\nthreads = 0\n";
        assert!(matches!(
            Config::from_toml_str(zero, Path::new("/h")),
            Err(ZenshError::Config(_))
        ));
    }

    #[test]
    fn load_reports_missing_file_as_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(Config::load(&missing), Err(ZenshError::Config(_))));

        let path = dir.path().join(CONFIG_FILENAME);
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "[[plugin]]\nrepo = \"a/b\"").unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.recipes.len(), 1);
    }

    #[test]
    fn expands_only_leading_tilde() {
        let home = Path::new("/home/u");
        assert_eq!(expand_home(home, "~"), PathBuf::from("/home/u"));
        assert_eq!(expand_home(home, "~/x/y"), PathBuf::from("/home/u/x/y"));
        assert_eq!(expand_home(home, "a/~/b"), PathBuf::from("a/~/b"));
        assert_eq!(expand_home(home, "~user/x"), PathBuf::from("~user/x"));
    }
}
