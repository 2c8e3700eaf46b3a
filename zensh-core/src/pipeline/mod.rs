// zensh-core/src/pipeline/mod.rs
pub mod engine;

use std::sync::Arc;

use zensh_common::error::InstallFailures;
use zensh_common::model::Recipe;

pub use engine::Orchestrator;

/// Result of one recipe job, shown as the row's final status.
pub trait JobOutcome {
    fn summary(&self) -> String;
}

/// Everything a batch produced. `completed` is in completion order.
#[derive(Debug)]
pub struct BatchReport<T> {
    pub completed: Vec<(Arc<Recipe>, T)>,
    pub failures: InstallFailures,
}

impl<T> Default for BatchReport<T> {
    fn default() -> Self {
        Self {
            completed: Vec::new(),
            failures: InstallFailures::default(),
        }
    }
}

impl<T> BatchReport<T> {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of recipes the batch touched.
    pub fn len(&self) -> usize {
        self.completed.len() + self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_result(self) -> Result<Vec<(Arc<Recipe>, T)>, InstallFailures> {
        if self.failures.is_empty() {
            Ok(self.completed)
        } else {
            Err(self.failures)
        }
    }
}
