// zensh-core/src/pipeline/engine.rs
use std::collections::HashMap;
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crossbeam_channel::bounded as crossbeam_bounded;
use tokio::task::{Id as TaskId, JoinError, JoinSet};
use tracing::{debug, error, instrument, warn};
use zensh_common::config::Config;
use zensh_common::error::{InstallFailure, InstallFailures, Result, ZenshError};
use zensh_common::model::{Recipe, SourceKind};

use super::{BatchReport, JobOutcome};
use crate::install::{install_recipe, update_recipe, Collaborators, InstallOutcome, UpdateOutcome};
use crate::progress::{Renderer, TaskHandle};
use crate::semaphore::Semaphore;
use crate::update_check::{check_update, CheckOptions, UpdateInfo};

fn get_panic_message(e: Box<dyn std::any::Any + Send>) -> String {
    match e.downcast_ref::<&'static str>() {
        Some(s) => (*s).to_string(),
        None => match e.downcast_ref::<String>() {
            Some(s) => s.clone(),
            None => "Unknown panic payload".to_string(),
        },
    }
}

/// Failure of a worker that died outside the job's own panic guard.
fn join_failure(recipe: Arc<Recipe>, e: JoinError) -> InstallFailure {
    let error = if e.is_panic() {
        ZenshError::Generic(format!("worker panicked: {}", get_panic_message(e.into_panic())))
    } else {
        ZenshError::Generic(format!("worker did not finish: {e}"))
    };
    InstallFailure { recipe, error }
}

/// Runs per-recipe jobs concurrently, at most `threads` at a time, with one
/// progress row per started job.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    collaborators: Collaborators,
    threads: usize,
}

impl Orchestrator {
    pub fn new(collaborators: Collaborators, threads: usize) -> Self {
        Self {
            collaborators,
            threads: threads.max(1),
        }
    }

    pub fn from_config(config: &Config, collaborators: Collaborators) -> Self {
        Self::new(collaborators, config.threads)
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    /// Installs every hosted recipe that is not present yet. Local paths and
    /// installed recipes are not touched.
    #[instrument(skip_all, fields(recipes = recipes.len()))]
    pub async fn install<W>(&self, recipes: &[Arc<Recipe>], out: W) -> BatchReport<InstallOutcome>
    where
        W: Write + Send + 'static,
    {
        let pending = select(recipes, |r| r.source() != SourceKind::LocalPath && !r.is_installed());
        debug!("{} of {} recipes need installing", pending.len(), recipes.len());
        self.run_batch(pending, out, install_recipe).await
    }

    /// Compares installed hosted recipes with their remotes.
    #[instrument(skip_all, fields(recipes = recipes.len()))]
    pub async fn check_updates<W>(
        &self,
        recipes: &[Arc<Recipe>],
        options: CheckOptions,
        out: W,
    ) -> BatchReport<UpdateInfo>
    where
        W: Write + Send + 'static,
    {
        let installed = select(recipes, |r| r.source() != SourceKind::LocalPath && r.is_installed());
        self.run_batch(installed, out, move |recipe, collaborators, task| {
            check_update(recipe, collaborators, task, options)
        })
        .await
    }

    #[instrument(skip_all, fields(recipes = recipes.len()))]
    pub async fn update<W>(&self, recipes: &[Arc<Recipe>], out: W) -> BatchReport<UpdateOutcome>
    where
        W: Write + Send + 'static,
    {
        let installed = select(recipes, |r| r.source() != SourceKind::LocalPath && r.is_installed());
        self.run_batch(installed, out, update_recipe).await
    }

    /// Runs `job` for each recipe on a blocking worker. A job holds a permit
    /// for its whole run; its row is added once the permit is granted. Errors
    /// and panics become failures of that recipe only. The renderer is torn
    /// down after the last job finished.
    pub async fn run_batch<T, F, W>(&self, recipes: Vec<Arc<Recipe>>, out: W, job: F) -> BatchReport<T>
    where
        T: JobOutcome + Send + 'static,
        F: Fn(&Recipe, &Collaborators, &TaskHandle) -> Result<T> + Send + Sync + 'static,
        W: Write + Send + 'static,
    {
        if recipes.is_empty() {
            return BatchReport::default();
        }

        let renderer = Renderer::new(out);
        let semaphore = Semaphore::new(self.threads);
        let job = Arc::new(job);
        let (failure_tx, failure_rx) = crossbeam_bounded::<InstallFailure>(recipes.len().max(1));
        let mut workers = JoinSet::new();
        let mut running: HashMap<TaskId, Arc<Recipe>> = HashMap::new();

        for recipe in recipes {
            let permit = match semaphore.acquire().await {
                Ok(permit) => permit,
                Err(error) => {
                    error!("[{}] Could not acquire a worker permit: {}", recipe, error);
                    let _ = failure_tx.send(InstallFailure { recipe, error });
                    continue;
                }
            };
            let task = renderer.add_task(recipe.repo(), "");
            let job = Arc::clone(&job);
            let collaborators = self.collaborators.clone();
            let failure_tx = failure_tx.clone();
            let owner = Arc::clone(&recipe);

            debug!("[{}] Submitting job to worker", recipe);
            let handle = workers.spawn_blocking(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(|| {
                    (*job)(&recipe, &collaborators, &task)
                }))
                .unwrap_or_else(|payload| {
                    Err(ZenshError::Generic(format!(
                        "worker panicked: {}",
                        get_panic_message(payload)
                    )))
                });
                permit.release();

                match result {
                    Ok(outcome) => {
                        debug!("[{}] Worker finished successfully", recipe);
                        task.done(outcome.summary());
                        Some((recipe, outcome))
                    }
                    Err(error) => {
                        warn!("[{}] Worker failed: {}", recipe, error);
                        task.done(format!("Error: {error}"));
                        let _ = failure_tx.send(InstallFailure { recipe, error });
                        None
                    }
                }
            });
            running.insert(handle.id(), owner);
        }
        drop(failure_tx);

        let mut completed = Vec::new();
        let mut lost = Vec::new();
        while let Some(joined) = workers.join_next_with_id().await {
            match joined {
                Ok((id, entry)) => {
                    running.remove(&id);
                    completed.extend(entry);
                }
                Err(e) => {
                    error!("Worker task could not be joined: {}", e);
                    if let Some(recipe) = running.remove(&e.id()) {
                        lost.push(join_failure(recipe, e));
                    }
                }
            }
        }
        renderer.teardown().await;

        let mut failures: Vec<InstallFailure> = failure_rx.try_iter().collect();
        failures.extend(lost);
        let failures = InstallFailures(failures);
        debug!(
            "Batch finished: {} succeeded, {} failed",
            completed.len(),
            failures.len()
        );
        BatchReport { completed, failures }
    }
}

fn select(recipes: &[Arc<Recipe>], keep: impl Fn(&Recipe) -> bool) -> Vec<Arc<Recipe>> {
    recipes.iter().filter(|r| keep(r)).cloned().collect()
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use zensh_common::client::{ReleaseSource, VcsClient};

    use super::*;
    use crate::testing::{recipe, FakeReleases, FakeVcs, Scratch, SharedBuf};

    fn orchestrator(vcs: &Arc<FakeVcs>, releases: &Arc<FakeReleases>, threads: usize) -> Orchestrator {
        Orchestrator::new(
            Collaborators {
                vcs: Arc::clone(vcs) as Arc<dyn VcsClient>,
                releases: Arc::clone(releases) as Arc<dyn ReleaseSource>,
            },
            threads,
        )
    }

    fn hosted(scratch: &Scratch, count: usize) -> Vec<Arc<Recipe>> {
        (0..count)
            .map(|i| recipe(scratch, &format!("user/plugin-{i}"), SourceKind::VcsHosted, None))
            .collect()
    }

    #[tokio::test]
    async fn active_jobs_never_exceed_the_thread_count() {
        let scratch = Scratch::new();
        let vcs = Arc::new(FakeVcs::default().with_delay(Duration::from_millis(20)));
        let releases = Arc::new(FakeReleases::default());
        let recipes = hosted(&scratch, 10);

        let report = orchestrator(&vcs, &releases, 3)
            .install(&recipes, io::sink())
            .await;

        assert!(report.is_success());
        assert_eq!(report.completed.len(), 10);
        assert_eq!(vcs.clones.load(Ordering::SeqCst), 10);
        let peak = vcs.peak.load(Ordering::SeqCst);
        assert!(peak >= 1 && peak <= 3, "peak was {peak}");
    }

    #[tokio::test]
    async fn one_failure_does_not_stop_the_others() {
        let scratch = Scratch::new();
        let vcs = Arc::new(FakeVcs::failing_on("user/plugin-1"));
        let releases = Arc::new(FakeReleases::default());
        let recipes = hosted(&scratch, 3);

        let report = orchestrator(&vcs, &releases, 2)
            .install(&recipes, io::sink())
            .await;

        assert_eq!(report.completed.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures.to_string(), "1 errors occurred");
        let failed = report.failures.recipes();
        assert_eq!(failed[0].repo(), "user/plugin-1");
        assert!(recipes[0].is_installed());
        assert!(!recipes[1].is_installed());
        assert!(recipes[2].is_installed());
    }

    #[tokio::test]
    async fn second_install_has_nothing_to_do() {
        let scratch = Scratch::new();
        let vcs = Arc::new(FakeVcs::default());
        let releases = Arc::new(FakeReleases::default());
        let recipes = hosted(&scratch, 2);
        let orchestrator = orchestrator(&vcs, &releases, 4);

        assert_eq!(orchestrator.install(&recipes, io::sink()).await.completed.len(), 2);
        let again = orchestrator.install(&recipes, io::sink()).await;

        assert!(again.is_empty());
        assert_eq!(vcs.clones.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn local_paths_are_never_scheduled() {
        let scratch = Scratch::new();
        let vcs = Arc::new(FakeVcs::default());
        let releases = Arc::new(FakeReleases::default());
        let local = recipe(&scratch, "missing-local", SourceKind::LocalPath, None);

        let report = orchestrator(&vcs, &releases, 1)
            .install(&[local], io::sink())
            .await;

        assert!(report.is_empty());
        assert!(report.into_result().unwrap().is_empty());
    }

    #[tokio::test]
    async fn rows_show_final_status() {
        let scratch = Scratch::new();
        let vcs = Arc::new(FakeVcs::failing_on("user/plugin-0"));
        let releases = Arc::new(FakeReleases::default());
        let recipes = hosted(&scratch, 2);
        let buf = SharedBuf::default();

        let report = orchestrator(&vcs, &releases, 2)
            .install(&recipes, buf.clone())
            .await;

        assert!(!report.is_success());
        let text = buf.text();
        assert!(text.contains("user/plugin-0"));
        assert!(text.contains("Error: "));
        assert!(text.contains("done!"));
    }

    #[tokio::test]
    async fn panicking_job_is_a_failure() {
        let scratch = Scratch::new();
        let vcs = Arc::new(FakeVcs::default());
        let releases = Arc::new(FakeReleases::default());
        let recipes = hosted(&scratch, 2);

        let report = orchestrator(&vcs, &releases, 2)
            .run_batch(recipes, io::sink(), |recipe, _, _| {
                if recipe.repo().ends_with('0') {
                    panic!("boom");
                }
                Ok(InstallOutcome::AlreadyInstalled)
            })
            .await;

        assert_eq!(report.completed.len(), 1);
        let failure = report.failures.iter().next().unwrap();
        assert!(matches!(failure.error, ZenshError::Generic(ref m) if m.contains("boom")));
    }

    #[tokio::test]
    async fn lost_worker_is_a_failure_of_its_recipe() {
        let scratch = Scratch::new();
        let r = recipe(&scratch, "user/lost", SourceKind::VcsHosted, None);
        let join_error = tokio::spawn(async { panic!("worker died") })
            .await
            .unwrap_err();

        let failure = join_failure(Arc::clone(&r), join_error);

        assert_eq!(failure.recipe.repo(), "user/lost");
        assert!(matches!(failure.error, ZenshError::Generic(ref m) if m.contains("worker died")));
    }

    #[tokio::test]
    async fn update_checks_skip_missing_and_report_new_releases() {
        let scratch = Scratch::new();
        let vcs = Arc::new(FakeVcs::default());
        let releases = Arc::new(FakeReleases::with_binary(1, "tool-v1"));
        let orchestrator = orchestrator(&vcs, &releases, 2);
        let tool = recipe(&scratch, "o/tool", SourceKind::ReleaseArchive, None);
        let absent = recipe(&scratch, "o/absent", SourceKind::ReleaseArchive, None);
        let local = recipe(&scratch, "mine", SourceKind::LocalPath, None);
        fs::create_dir_all(local.directory()).unwrap();

        orchestrator.install(&[Arc::clone(&tool)], io::sink()).await;
        releases.publish(2, "tool-v2");
        let options = CheckOptions {
            fetch: false,
            history_limit: 0,
        };
        let report = orchestrator
            .check_updates(&[tool, absent, local], options, io::sink())
            .await;

        assert!(report.is_success());
        assert_eq!(report.completed.len(), 1);
        let (checked, info) = &report.completed[0];
        assert_eq!(checked.repo(), "o/tool");
        assert!(matches!(info, UpdateInfo::NewRelease { installed: 1, available } if available.id == 2));
    }

    #[tokio::test]
    async fn update_moves_release_to_new_asset() {
        let scratch = Scratch::new();
        let vcs = Arc::new(FakeVcs::default());
        let releases = Arc::new(FakeReleases::with_binary(5, "bin-5"));
        let orchestrator = orchestrator(&vcs, &releases, 1);
        let tool = recipe(&scratch, "o/bin", SourceKind::ReleaseArchive, None);
        orchestrator.install(&[Arc::clone(&tool)], io::sink()).await;

        releases.publish(6, "bin-6");
        let report = orchestrator.update(&[Arc::clone(&tool)], io::sink()).await;

        assert_eq!(report.completed[0].1, UpdateOutcome::Updated);
        assert!(tool.directory().join("bin-6").is_file());
    }
}
