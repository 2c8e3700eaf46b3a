// zensh-common/src/model/mod.rs
// Declares the modules within the model directory.

pub mod asset;
pub mod identity;
pub mod recipe;

// Re-export
pub use asset::Asset;
pub use identity::Identity;
pub use recipe::{Recipe, RecipeKind, RecipeSpec, SourceKind};
