// zensh-common/src/lib.rs
pub mod client;
pub mod config;
pub mod error;
pub mod model;

// Re-export key types
pub use client::{ReleaseSource, VcsClient};
pub use config::Config;
pub use error::{InstallFailure, InstallFailures, Result, ZenshError};
pub use model::{Asset, Identity, Recipe, RecipeKind, SourceKind};
