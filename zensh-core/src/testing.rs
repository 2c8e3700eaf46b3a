// zensh-core/src/testing.rs
//! In-memory collaborators and scratch directories for unit tests.

use std::fs;
use std::io::{self, Cursor, Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::TempDir;
use zensh_common::client::{ReleaseSource, VcsClient};
use zensh_common::config::Directories;
use zensh_common::error::{Result, ZenshError};
use zensh_common::model::{Asset, Recipe, RecipeKind, RecipeSpec, SourceKind};

pub struct Scratch {
    pub dir: TempDir,
    pub dirs: Directories,
}

impl Scratch {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let dirs = Directories {
            repo: dir.path().join("repo"),
            local: dir.path().join("local"),
        };
        Self { dir, dirs }
    }
}

pub fn recipe(scratch: &Scratch, repo: &str, source: SourceKind, version: Option<&str>) -> Arc<Recipe> {
    let spec = RecipeSpec {
        repo: repo.to_string(),
        source,
        version: version.map(str::to_string),
        kind: RecipeKind::Plugin,
    };
    Arc::new(Recipe::from_spec(spec, &scratch.dirs, scratch.dir.path()).unwrap())
}

/// Records calls; `clone_repo` creates the destination unless the URL
/// mentions the failing repository.
#[derive(Default)]
pub struct FakeVcs {
    pub clones: AtomicUsize,
    pub active: AtomicUsize,
    pub peak: AtomicUsize,
    fail_on: Option<String>,
    delay: Duration,
    urls: Mutex<Vec<String>>,
    checkouts: Mutex<Vec<String>>,
}

impl FakeVcs {
    pub fn failing_on(repo: &str) -> Self {
        Self {
            fail_on: Some(repo.to_string()),
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn cloned_urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }

    pub fn checkouts(&self) -> Vec<String> {
        self.checkouts.lock().unwrap().clone()
    }
}

impl VcsClient for FakeVcs {
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<()> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        self.clones.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(url.to_string());

        let result = match &self.fail_on {
            Some(repo) if url.contains(repo.as_str()) => Err(ZenshError::CommandExecError(
                format!("git clone {url}: fatal: repository not found"),
            )),
            _ => fs::create_dir_all(dest).map_err(ZenshError::from),
        };
        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn fetch(&self, _dir: &Path) -> Result<()> {
        Ok(())
    }

    fn checkout(&self, _dir: &Path, reference: &str) -> Result<()> {
        self.checkouts.lock().unwrap().push(reference.to_string());
        Ok(())
    }

    fn stash(&self, _dir: &Path, _message: &str) {}

    fn update(&self, _dir: &Path) -> Result<()> {
        Ok(())
    }
}

/// Serves one published asset whose content is a plain (non-archive) file.
#[derive(Default)]
pub struct FakeReleases {
    published: Mutex<Option<(u64, String)>>,
    offline: AtomicBool,
}

impl FakeReleases {
    pub fn with_binary(id: u64, name: &str) -> Self {
        let releases = Self::default();
        releases.publish(id, name);
        releases
    }

    pub fn publish(&self, id: u64, name: &str) {
        *self.published.lock().unwrap() = Some((id, name.to_string()));
    }

    /// Release metadata still resolves but every download fails.
    pub fn break_downloads(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }
}

impl ReleaseSource for FakeReleases {
    fn fetch_latest_or_tagged(&self, owner: &str, repo: &str, _tag: Option<&str>) -> Result<Asset> {
        match self.published.lock().unwrap().clone() {
            Some((id, name)) => Ok(Asset {
                id,
                name,
                owner: owner.to_string(),
                repo: repo.to_string(),
            }),
            None => Err(ZenshError::AssetNotFound {
                repo: format!("{owner}/{repo}"),
                os: "linux",
                arch: "x86_64",
            }),
        }
    }

    fn open(&self, asset: &Asset) -> Result<Box<dyn Read + Send>> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(ZenshError::Generic(format!("download of {} interrupted", asset.name)));
        }
        let mut payload = format!("#!/bin/sh\necho {}\n", asset.name).into_bytes();
        payload.resize(600, b'#');
        Ok(Box::new(Cursor::new(payload)))
    }
}

/// In-memory terminal for renderer output.
#[derive(Clone, Default)]
pub struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
