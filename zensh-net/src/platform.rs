// zensh-net/src/platform.rs
//! Matching release asset file names against the running platform.

use std::env::consts;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    pub os: &'static str,
    pub arch: &'static str,
}

impl Platform {
    pub fn current() -> Self {
        Self {
            os: consts::OS,
            arch: consts::ARCH,
        }
    }

    /// `name` must already be lowercase.
    pub fn matches_os(&self, name: &str) -> bool {
        match self.os {
            "macos" => ["darwin", "osx", "macos"].iter().any(|p| name.contains(p)),
            os => name.contains(os),
        }
    }

    /// `name` must already be lowercase.
    pub fn matches_arch(&self, name: &str) -> bool {
        match self.arch {
            "x86_64" => ["amd64", "x86_64", "x86-64"].iter().any(|p| name.contains(p)),
            "x86" => {
                // "x86" is a prefix of "x86_64"; 64-bit builds are not ours.
                if name.contains("x86_64") {
                    return false;
                }
                name.contains("386") || name.contains("x86")
            }
            "aarch64" => name.contains("aarch64") || name.contains("arm64"),
            arch => name.contains(arch),
        }
    }

    pub fn matches(&self, asset_name: &str) -> bool {
        let name = asset_name.to_lowercase();
        self.matches_os(&name) && self.matches_arch(&name)
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::current()
    }
}
