// zensh-common/src/model/identity.rs
use std::fmt;

use git2::Oid;

/// Version fingerprint of an installed recipe. Which variant applies is decided
/// by the recipe's source kind alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Identity {
    /// Numeric id of the release asset that was extracted.
    Release(u64),
    /// Commit checked out in the working tree.
    Commit(Oid),
    /// Local paths are not version tracked.
    Untracked,
}

impl Identity {
    pub fn as_release(&self) -> Option<u64> {
        match self {
            Identity::Release(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_commit(&self) -> Option<Oid> {
        match self {
            Identity::Commit(oid) => Some(*oid),
            _ => None,
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Release(id) => write!(f, "{id}"),
            Identity::Commit(oid) => write!(f, "{oid}"),
            Identity::Untracked => f.write_str("-"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_each_variant() {
        assert_eq!(Identity::Release(42).to_string(), "42");
        let oid = Oid::from_str("0123456789abcdef0123456789abcdef01234567").unwrap();
        assert_eq!(
            Identity::Commit(oid).to_string(),
            "0123456789abcdef0123456789abcdef01234567"
        );
        assert_eq!(Identity::Untracked.to_string(), "-");
    }

    #[test]
    fn accessors_only_match_their_variant() {
        assert_eq!(Identity::Release(7).as_release(), Some(7));
        assert_eq!(Identity::Release(7).as_commit(), None);
        assert_eq!(Identity::Untracked.as_release(), None);
    }
}
