// zensh-aio/src/git_command.rs
//! `VcsClient` that shells out to a `git` executable.

use std::collections::HashMap;
use std::path::Path;

use tracing::debug;
use zensh_common::client::VcsClient;
use zensh_common::error::{Result, ZenshError};

use crate::process::run_checked;

#[derive(Debug, Clone)]
pub struct GitCommand {
    program: String,
    depth: u32,
    envs: HashMap<String, String>,
}

impl GitCommand {
    pub fn new(program: impl Into<String>, depth: u32) -> Self {
        let mut envs = HashMap::new();
        // Never block on a credential prompt behind the progress display.
        envs.insert("GIT_TERMINAL_PROMPT".to_string(), "0".to_string());
        Self {
            program: program.into(),
            depth,
            envs,
        }
    }

    fn git(&self, dir: Option<&Path>, args: &[&str]) -> Result<()> {
        run_checked(&self.program, args, dir, Some(&self.envs)).map(|_| ())
    }
}

fn path_arg(path: &Path) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| ZenshError::Generic(format!("path is not UTF-8: {}", path.display())))
}

impl VcsClient for GitCommand {
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<()> {
        let dest = path_arg(dest)?;
        let depth = self.depth.to_string();
        let mut args = vec!["clone", "--recursive", url, dest];
        if self.depth > 0 {
            args.extend(["--depth", depth.as_str()]);
        }
        self.git(None, &args)
    }

    fn fetch(&self, dir: &Path) -> Result<()> {
        self.git(Some(dir), &["fetch"])
    }

    fn checkout(&self, dir: &Path, reference: &str) -> Result<()> {
        self.stash(dir, "zensh checkout");
        let remote = format!("origin/{reference}");
        match self.git(Some(dir), &["checkout", "-b", reference, &remote]) {
            Ok(()) => Ok(()),
            Err(e) => {
                debug!("No remote branch {}, trying plain ref: {}", remote, e);
                self.git(Some(dir), &["checkout", "-b", reference, reference])
            }
        }
    }

    fn stash(&self, dir: &Path, message: &str) {
        if let Err(e) = self.git(Some(dir), &["stash", "save", message]) {
            debug!("Stash in {} skipped: {}", dir.display(), e);
        }
    }

    fn update(&self, dir: &Path) -> Result<()> {
        self.stash(dir, "zensh: stash before update");
        self.git(Some(dir), &["pull", "--ff-only"])
    }
}
