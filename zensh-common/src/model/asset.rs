// zensh-common/src/model/asset.rs
use serde::{Deserialize, Serialize};

/// A resolved release asset. Persisted as `<repo>.json` next to the extracted
/// directory and read back on the next run to detect updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub id: u64,
    pub name: String,
    pub owner: String,
    pub repo: String,
}

impl Asset {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}
