/*
File: zensh-aio/src/git2.rs
Purpose: Git operations through libgit2, plus the read-only repository queries
used by the update check regardless of the configured backend.
*/
use std::path::Path;

use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{
    AutotagOption, Branch, BranchType, Commit, FetchOptions, ObjectType, Oid, Repository,
    Signature,
};
use tracing::{debug, error, warn};
use zensh_common::client::VcsClient;
use zensh_common::error::{Result, ZenshError};

const ORIGIN: &str = "origin";
const ORIGIN_REFSPEC: &str = "refs/heads/*:refs/remotes/origin/*";

/// `VcsClient` backed by the linked libgit2.
#[derive(Debug, Clone, Default)]
pub struct Git2Client {
    depth: u32,
}

impl Git2Client {
    /// `depth` of 0 clones the full history.
    pub fn new(depth: u32) -> Self {
        Self { depth }
    }

    fn fetch_options(&self) -> FetchOptions<'static> {
        let mut options = FetchOptions::new();
        options.download_tags(AutotagOption::All);
        if self.depth > 0 {
            options.depth(i32::try_from(self.depth).unwrap_or(i32::MAX));
        }
        options
    }
}

pub fn open_repo(dir: &Path) -> Result<Repository> {
    Repository::open(dir).map_err(|e| {
        error!("Failed open repo {}: {}", dir.display(), e);
        ZenshError::from(e)
    })
}

/// Commit currently checked out.
pub fn head_oid(repo: &Repository) -> Result<Oid> {
    let head = repo.head()?;
    Ok(head.peel_to_commit()?.id())
}

/// Commit the checked out branch would move to: its upstream when tracked,
/// otherwise the merge entry recorded in `FETCH_HEAD`.
pub fn upstream_oid(repo: &Repository) -> Result<Oid> {
    let head = repo.head()?;
    if head.is_branch() {
        match Branch::wrap(head).upstream() {
            Ok(upstream) => return Ok(upstream.get().peel_to_commit()?.id()),
            Err(e) => debug!("No upstream branch configured: {}", e),
        }
    }

    let mut merge_head = None;
    let walk = repo.fetchhead_foreach(|name, _url, oid, is_merge| {
        if is_merge {
            debug!("Using FETCH_HEAD entry {} ({})", oid, name);
            merge_head = Some(*oid);
            return false;
        }
        true
    });
    match (merge_head, walk) {
        (Some(oid), _) => Ok(oid),
        (None, Err(e)) => Err(ZenshError::from(e)),
        (None, Ok(())) => Err(ZenshError::NotFound(
            "no upstream branch and no FETCH_HEAD merge entry".to_string(),
        )),
    }
}

fn fetch_origin(repo: &Repository, options: &mut FetchOptions<'_>) -> Result<()> {
    let mut remote = repo.find_remote(ORIGIN).map_err(|e| {
        error!("Failed find remote 'origin': {}", e);
        ZenshError::Generic(format!("Failed to find remote 'origin': {e}"))
    })?;
    remote.fetch(&[ORIGIN_REFSPEC], Some(options), None).map_err(|e| {
        error!("Failed fetch: {}", e);
        ZenshError::Generic(format!("Failed to fetch updates: {e}"))
    })
}

fn update_submodules(repo: &Repository) -> Result<()> {
    for mut submodule in repo.submodules()? {
        debug!("Updating submodule {}", submodule.path().display());
        submodule.update(true, None)?;
        let nested = submodule.open()?;
        update_submodules(&nested)?;
    }
    Ok(())
}

/// Where a checkout lands: the commit, the local branch to put it on and the
/// remote-tracking branch that branch should follow.
struct Resolved<'r> {
    commit: Commit<'r>,
    branch: String,
    upstream: Option<String>,
}

/// Remote-tracking branch first, then a tag, then anything revparse accepts.
/// Revparse results that are not tags get a branch named after the commit id.
fn resolve_reference<'r>(repo: &'r Repository, reference: &str) -> Result<Resolved<'r>> {
    let remote_name = format!("refs/remotes/{ORIGIN}/{reference}");
    if let Ok(found) = repo.find_reference(&remote_name) {
        return Ok(Resolved {
            commit: found.peel_to_commit()?,
            branch: reference.to_string(),
            upstream: Some(format!("{ORIGIN}/{reference}")),
        });
    }
    if let Ok(found) = repo.find_reference(&format!("refs/tags/{reference}")) {
        return Ok(Resolved {
            commit: found.peel_to_commit()?,
            branch: reference.to_string(),
            upstream: None,
        });
    }
    let object = repo.revparse_single(reference).map_err(|e| {
        error!("Cannot resolve '{}': {}", reference, e);
        ZenshError::NotFound(format!("reference '{reference}'"))
    })?;
    let branch = match object.kind() {
        Some(ObjectType::Tag) => reference.to_string(),
        _ => object.id().to_string(),
    };
    Ok(Resolved {
        commit: object.peel_to_commit()?,
        branch,
        upstream: None,
    })
}

impl VcsClient for Git2Client {
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<()> {
        debug!("Cloning {} into {}", url, dest.display());
        let repo = RepoBuilder::new()
            .fetch_options(self.fetch_options())
            .clone(url, dest)
            .map_err(|e| {
                error!("Failed clone {}: {}", url, e);
                ZenshError::from(e)
            })?;
        update_submodules(&repo)
    }

    fn fetch(&self, dir: &Path) -> Result<()> {
        debug!("Fetching {}", dir.display());
        let repo = open_repo(dir)?;
        fetch_origin(&repo, &mut self.fetch_options())
    }

    fn checkout(&self, dir: &Path, reference: &str) -> Result<()> {
        debug!("Checking out '{}' in {}", reference, dir.display());
        self.stash(dir, "zensh checkout");
        let repo = open_repo(dir)?;
        let resolved = resolve_reference(&repo, reference)?;

        let mut branch = match repo.find_branch(&resolved.branch, BranchType::Local) {
            Ok(existing) => existing,
            Err(_) => repo.branch(&resolved.branch, &resolved.commit, false)?,
        };
        if let Some(upstream) = resolved.upstream.as_deref() {
            branch.set_upstream(Some(upstream))?;
        }
        let branch_ref = branch
            .get()
            .name()
            .ok_or_else(|| {
                ZenshError::Generic(format!("branch name '{}' is not UTF-8", resolved.branch))
            })?
            .to_string();

        repo.checkout_tree(
            resolved.commit.as_object(),
            Some(CheckoutBuilder::new().force()),
        )?;
        repo.set_head(&branch_ref)?;
        debug!("HEAD now at {} ({})", resolved.commit.id(), branch_ref);
        Ok(())
    }

    fn stash(&self, dir: &Path, message: &str) {
        let result = open_repo(dir).and_then(|mut repo| {
            let signature = repo
                .signature()
                .or_else(|_| Signature::now("unknown", "unknown"))?;
            repo.stash_save(&signature, message, None)?;
            Ok(())
        });
        if let Err(e) = result {
            debug!("Stash in {} skipped: {}", dir.display(), e);
        }
    }

    fn update(&self, dir: &Path) -> Result<()> {
        debug!("Updating git repository at: {}", dir.display());
        self.stash(dir, "zensh: stash before update");

        let repo = open_repo(dir)?;
        fetch_origin(&repo, &mut self.fetch_options())?;

        let head = repo.head()?;
        if !head.is_branch() {
            return Err(ZenshError::Generic(format!(
                "{} has a detached HEAD, nothing to fast-forward",
                dir.display()
            )));
        }
        let local_name = head
            .name()
            .ok_or_else(|| ZenshError::Generic("HEAD branch name is not UTF-8".to_string()))?
            .to_string();
        let upstream = Branch::wrap(head).upstream().map_err(|e| {
            error!("No upstream for '{}': {}", local_name, e);
            ZenshError::Generic(format!("Branch '{local_name}' has no upstream: {e}"))
        })?;
        let fetch_commit = repo.reference_to_annotated_commit(upstream.get())?;

        let (analysis, _) = repo.merge_analysis(&[&fetch_commit]).map_err(|e| {
            error!("Failed merge analysis: {}", e);
            ZenshError::Generic(format!("Failed to analyze merge: {e}"))
        })?;

        if analysis.is_up_to_date() {
            debug!("Repository {} already up-to-date.", dir.display());
            return Ok(());
        }

        if analysis.is_fast_forward() {
            debug!("Fast-forwarding '{}' in {}", local_name, dir.display());
            let mut local_ref = repo.find_reference(&local_name)?;
            local_ref
                .set_target(
                    fetch_commit.id(),
                    &format!("Fast-forward {local_name} to upstream"),
                )
                .map_err(|e| {
                    error!("Failed set target for fast-forward: {}", e);
                    ZenshError::Generic(format!("Failed to fast-forward: {e}"))
                })?;
            repo.set_head(&local_name)?;
            repo.checkout_head(Some(CheckoutBuilder::default().force()))
                .map_err(|e| {
                    error!("Failed checkout HEAD after update: {}", e);
                    ZenshError::Generic(format!("Failed to checkout HEAD: {e}"))
                })?;
            return update_submodules(&repo);
        }

        if analysis.is_normal() {
            warn!("Repository {} diverged from its upstream.", dir.display());
            return Err(ZenshError::Generic(format!(
                "{} diverged from upstream, merge manually",
                dir.display()
            )));
        }

        error!(
            "Unexpected merge analysis state ({:?}) for {}",
            analysis,
            dir.display()
        );
        Err(ZenshError::Generic(format!(
            "Unexpected repository state in {}: {:?}",
            dir.display(),
            analysis
        )))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn commit_file(repo: &Repository, file: &str, content: &str) -> Oid {
        let workdir = repo.workdir().unwrap();
        fs::write(workdir.join(file), content).unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new(file)).unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = Signature::now("test", "test@example.com").unwrap();
        let parents = match repo.head() {
            Ok(head) => vec![head.peel_to_commit().unwrap()],
            Err(_) => vec![],
        };
        let parent_refs = parents.iter().collect::<Vec<_>>();
        repo.commit(Some("HEAD"), &sig, &sig, content, &tree, &parent_refs)
            .unwrap()
    }

    fn origin_with_history() -> (tempfile::TempDir, Repository, Vec<Oid>) {
        let tmp = tempfile::tempdir().unwrap();
        let repo = Repository::init(tmp.path().join("origin")).unwrap();
        let first = commit_file(&repo, "plugin.zsh", "one");
        let second = commit_file(&repo, "plugin.zsh", "two");
        (tmp, repo, vec![first, second])
    }

    fn url(repo: &Repository) -> String {
        repo.workdir().unwrap().to_string_lossy().into_owned()
    }

    #[test]
    fn clone_checks_out_default_branch() {
        let (tmp, origin, commits) = origin_with_history();
        let dest = tmp.path().join("clone");

        Git2Client::new(0).clone_repo(&url(&origin), &dest).unwrap();

        let cloned = open_repo(&dest).unwrap();
        assert_eq!(head_oid(&cloned).unwrap(), commits[1]);
        assert_eq!(fs::read_to_string(dest.join("plugin.zsh")).unwrap(), "two");
    }

    #[test]
    fn checkout_resolves_tags() {
        let (tmp, origin, commits) = origin_with_history();
        let first = origin.find_commit(commits[0]).unwrap();
        origin.tag_lightweight("v1", first.as_object(), false).unwrap();
        let dest = tmp.path().join("clone");
        let client = Git2Client::new(0);

        client.clone_repo(&url(&origin), &dest).unwrap();
        client.checkout(&dest, "v1").unwrap();

        let cloned = open_repo(&dest).unwrap();
        assert_eq!(head_oid(&cloned).unwrap(), commits[0]);
        assert_eq!(fs::read_to_string(dest.join("plugin.zsh")).unwrap(), "one");
        assert!(cloned.find_branch("v1", BranchType::Local).is_ok());
    }

    #[test]
    fn checkout_prefers_remote_tracking_branch() {
        let (tmp, origin, commits) = origin_with_history();
        let first = origin.find_commit(commits[0]).unwrap();
        origin.branch("stable", &first, false).unwrap();
        let dest = tmp.path().join("clone");
        let client = Git2Client::new(0);

        client.clone_repo(&url(&origin), &dest).unwrap();
        client.checkout(&dest, "stable").unwrap();

        let cloned = open_repo(&dest).unwrap();
        assert_eq!(head_oid(&cloned).unwrap(), commits[0]);
        assert_eq!(upstream_oid(&cloned).unwrap(), commits[0]);
    }

    #[test]
    fn checkout_of_a_revision_uses_the_commit_id_as_branch() {
        let (tmp, origin, commits) = origin_with_history();
        let dest = tmp.path().join("clone");
        let client = Git2Client::new(0);

        client.clone_repo(&url(&origin), &dest).unwrap();
        client.checkout(&dest, "HEAD~1").unwrap();

        let cloned = open_repo(&dest).unwrap();
        assert_eq!(head_oid(&cloned).unwrap(), commits[0]);
        let head = cloned.head().unwrap();
        assert_eq!(head.shorthand(), Some(commits[0].to_string().as_str()));
    }

    #[test]
    fn checkout_stashes_local_edits_first() {
        let (tmp, origin, commits) = origin_with_history();
        let first = origin.find_commit(commits[0]).unwrap();
        origin.tag_lightweight("v1", first.as_object(), false).unwrap();
        let dest = tmp.path().join("clone");
        let client = Git2Client::new(0);
        client.clone_repo(&url(&origin), &dest).unwrap();
        fs::write(dest.join("plugin.zsh"), "local edit").unwrap();

        client.checkout(&dest, "v1").unwrap();

        assert_eq!(fs::read_to_string(dest.join("plugin.zsh")).unwrap(), "one");
        let mut cloned = open_repo(&dest).unwrap();
        let mut stashed = Vec::new();
        cloned
            .stash_foreach(|_, message, _| {
                stashed.push(message.to_string());
                true
            })
            .unwrap();
        assert_eq!(stashed.len(), 1);
        assert!(stashed[0].contains("zensh checkout"));
    }

    #[test]
    fn checkout_unknown_reference_fails() {
        let (tmp, origin, _) = origin_with_history();
        let dest = tmp.path().join("clone");
        let client = Git2Client::new(0);
        client.clone_repo(&url(&origin), &dest).unwrap();

        assert!(client.checkout(&dest, "no-such-ref").is_err());
    }

    #[test]
    fn update_fast_forwards_to_upstream() {
        let (tmp, origin, _) = origin_with_history();
        let dest = tmp.path().join("clone");
        let client = Git2Client::new(0);
        client.clone_repo(&url(&origin), &dest).unwrap();
        let third = commit_file(&origin, "plugin.zsh", "three");

        client.fetch(&dest).unwrap();
        let cloned = open_repo(&dest).unwrap();
        assert_eq!(upstream_oid(&cloned).unwrap(), third);
        assert_ne!(head_oid(&cloned).unwrap(), third);

        client.update(&dest).unwrap();
        assert_eq!(head_oid(&open_repo(&dest).unwrap()).unwrap(), third);
        assert_eq!(fs::read_to_string(dest.join("plugin.zsh")).unwrap(), "three");
    }

    #[test]
    fn stash_without_changes_is_swallowed() {
        let (tmp, origin, _) = origin_with_history();
        let dest = tmp.path().join("clone");
        let client = Git2Client::new(0);
        client.clone_repo(&url(&origin), &dest).unwrap();

        client.stash(&dest, "nothing to save");
        client.stash(&tmp.path().join("not-a-repo"), "missing");
    }
}
