// zensh-common/src/error.rs
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::model::Recipe;

#[derive(Error, Debug, Clone)]
pub enum ZenshError {
    #[error("I/O Error: {0}")]
    Io(#[from] Arc<std::io::Error>),

    #[error("HTTP Request Error: {0}")]
    Http(#[from] Arc<reqwest::Error>),

    #[error("JSON Parsing Error: {0}")]
    Json(#[from] Arc<serde_json::Error>),

    #[error("TOML Parsing Error: {0}")]
    Toml(#[from] Arc<toml::de::Error>),

    #[error("Git Error: {0}")]
    Git(#[from] Arc<git2::Error>),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("invalid repository name: {0}")]
    InvalidRepository(String),

    #[error("binary release of {repo} for {os}-{arch} not found")]
    AssetNotFound {
        repo: String,
        os: &'static str,
        arch: &'static str,
    },

    #[error("HTTP status {status} for {url}")]
    HttpStatus { status: u16, url: String },

    #[error("directory already exists: {}", .0.display())]
    DirectoryAlreadyExists(PathBuf),

    #[error("unknown archive entry type: {0:?}")]
    UnknownEntryType(char),

    #[error("unsafe path in archive: {0}")]
    UnsafePath(String),

    #[error("commit history walk exceeded depth limit of {0}")]
    DepthLimitExceeded(usize),

    #[error("no common commit history")]
    NoCommonHistory,

    #[error("not installed: {0}")]
    NotInstalled(String),

    #[error("Resource Not Found: {0}")]
    NotFound(String),

    #[error("Failed to execute command: {0}")]
    CommandExecError(String),

    #[error("Generic Error: {0}")]
    Generic(String),
}

impl From<std::io::Error> for ZenshError {
    fn from(err: std::io::Error) -> Self {
        ZenshError::Io(Arc::new(err))
    }
}

impl From<reqwest::Error> for ZenshError {
    fn from(err: reqwest::Error) -> Self {
        ZenshError::Http(Arc::new(err))
    }
}

impl From<serde_json::Error> for ZenshError {
    fn from(err: serde_json::Error) -> Self {
        ZenshError::Json(Arc::new(err))
    }
}

impl From<toml::de::Error> for ZenshError {
    fn from(err: toml::de::Error) -> Self {
        ZenshError::Toml(Arc::new(err))
    }
}

impl From<git2::Error> for ZenshError {
    fn from(err: git2::Error) -> Self {
        ZenshError::Git(Arc::new(err))
    }
}

pub type Result<T> = std::result::Result<T, ZenshError>;

/// One recipe whose pipeline failed, paired with the error it produced.
#[derive(Debug, Clone)]
pub struct InstallFailure {
    pub recipe: Arc<Recipe>,
    pub error: ZenshError,
}

/// Every failure of a batch, in completion order.
#[derive(Debug, Clone, Default)]
pub struct InstallFailures(pub Vec<InstallFailure>);

impl InstallFailures {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, InstallFailure> {
        self.0.iter()
    }

    pub fn recipes(&self) -> Vec<Arc<Recipe>> {
        self.0.iter().map(|f| Arc::clone(&f.recipe)).collect()
    }
}

impl fmt::Display for InstallFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} errors occurred", self.0.len())
    }
}

impl std::error::Error for InstallFailures {}

impl IntoIterator for InstallFailures {
    type Item = InstallFailure;
    type IntoIter = std::vec::IntoIter<InstallFailure>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
