// zensh-core/src/lib.rs

pub mod identity;
pub mod install;
pub mod pipeline;
pub mod progress;
pub mod semaphore;
pub mod update_check;

#[cfg(test)]
mod testing;

pub use identity::identity_of;
pub use install::{Collaborators, InstallOutcome, UpdateOutcome};
pub use pipeline::{BatchReport, JobOutcome, Orchestrator};
pub use progress::{Renderer, TaskHandle};
pub use update_check::{CheckOptions, UpdateInfo};
