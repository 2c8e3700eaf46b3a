// zensh-core/src/update_check.rs
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::Debug;
use std::hash::Hash;

use git2::{Oid, Repository};
use tracing::{debug, instrument};
use zensh_aio::git2::{head_oid, open_repo, upstream_oid};
use zensh_aio::json_io::read_asset_record;
use zensh_common::error::{Result, ZenshError};
use zensh_common::model::{Asset, Recipe, SourceKind};

use crate::install::Collaborators;
use crate::pipeline::JobOutcome;
use crate::progress::TaskHandle;

/// Parent edges of a commit graph.
pub trait CommitGraph {
    type Id: Copy + Eq + Hash + Debug;

    fn parents(&self, id: Self::Id) -> Result<Vec<Self::Id>>;
}

impl CommitGraph for Repository {
    type Id = Oid;

    fn parents(&self, id: Oid) -> Result<Vec<Oid>> {
        Ok(self.find_commit(id)?.parent_ids().collect())
    }
}

/// Commits reachable from `new` that come after `old`, oldest first: `old`
/// itself is excluded and `new` is the last element.
///
/// Walks parent edges breadth-first from `new`, remembering which commit
/// discovered each one, and follows those links back once `old` is popped.
/// `limit` caps the number of commits visited (0 = unlimited).
pub fn commits_between<G: CommitGraph>(
    graph: &G,
    new: G::Id,
    old: G::Id,
    limit: usize,
) -> Result<Vec<G::Id>> {
    if new == old {
        return Ok(Vec::new());
    }

    let mut discovered_by: HashMap<G::Id, G::Id> = HashMap::new();
    let mut visited: HashSet<G::Id> = HashSet::from([new]);
    let mut queue = VecDeque::from([new]);
    let mut depth = 0usize;

    while !queue.is_empty() {
        if limit != 0 && depth > limit {
            debug!("History walk gave up after {} commits", depth);
            return Err(ZenshError::DepthLimitExceeded(limit));
        }
        let Some(current) = queue.pop_front() else {
            break;
        };

        if current == old {
            let mut chain = Vec::new();
            let mut cursor = discovered_by.get(&old).copied();
            while let Some(id) = cursor {
                chain.push(id);
                cursor = discovered_by.get(&id).copied();
            }
            return Ok(chain);
        }

        for parent in graph.parents(current)? {
            if visited.insert(parent) {
                discovered_by.insert(parent, current);
                queue.push_back(parent);
            }
        }
        depth += 1;
    }

    Err(ZenshError::NoCommonHistory)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckOptions {
    /// Fetch from the remote before comparing.
    pub fetch: bool,
    /// Passed to [`commits_between`].
    pub history_limit: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateInfo {
    UpToDate,
    /// Upstream moved `count` commits ahead of the checked out one.
    NewCommits { count: usize },
    NewRelease { installed: u64, available: Asset },
    /// Local paths are never updated.
    Untracked,
}

impl UpdateInfo {
    pub fn has_update(&self) -> bool {
        matches!(self, UpdateInfo::NewCommits { .. } | UpdateInfo::NewRelease { .. })
    }
}

impl JobOutcome for UpdateInfo {
    fn summary(&self) -> String {
        match self {
            UpdateInfo::UpToDate => "up to date".to_string(),
            UpdateInfo::NewCommits { count: 1 } => "1 new commit".to_string(),
            UpdateInfo::NewCommits { count } => format!("{count} new commits"),
            UpdateInfo::NewRelease { available, .. } => format!("new release {}", available.name),
            UpdateInfo::Untracked => "untracked".to_string(),
        }
    }
}

/// Compares an installed recipe against its remote.
#[instrument(skip_all, fields(recipe = %recipe))]
pub fn check_update(
    recipe: &Recipe,
    collaborators: &Collaborators,
    task: &TaskHandle,
    options: CheckOptions,
) -> Result<UpdateInfo> {
    if !recipe.is_installed() {
        return Err(ZenshError::NotInstalled(recipe.repo().to_string()));
    }

    match recipe.source() {
        SourceKind::LocalPath => Ok(UpdateInfo::Untracked),
        SourceKind::VcsHosted => {
            if options.fetch {
                task.update(format!("fetching {} ...", recipe.repo()));
                collaborators.vcs.fetch(recipe.directory())?;
            }
            task.update("comparing ...");
            let repo = open_repo(recipe.directory())?;
            let head = head_oid(&repo)?;
            let upstream = upstream_oid(&repo)?;
            if head == upstream {
                return Ok(UpdateInfo::UpToDate);
            }
            // An unconnected or too deep history fails this recipe only.
            let commits = commits_between(&repo, upstream, head, options.history_limit)?;
            debug!("{}: {} commits behind {}", recipe, commits.len(), upstream);
            Ok(UpdateInfo::NewCommits {
                count: commits.len(),
            })
        }
        SourceKind::ReleaseArchive => {
            let installed = read_asset_record(recipe)?;
            let (owner, name) = recipe.owner_and_name()?;
            task.update("fetching release information ...");
            let available = collaborators
                .releases
                .fetch_latest_or_tagged(owner, name, recipe.version())?;
            debug!(
                "{}: installed asset {}, remote asset {}",
                recipe, installed.id, available.id
            );
            if available.id == installed.id {
                Ok(UpdateInfo::UpToDate)
            } else {
                Ok(UpdateInfo::NewRelease {
                    installed: installed.id,
                    available,
                })
            }
        }
    }
}
