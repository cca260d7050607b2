//! Name-based comparison of stored projects against remote repositories.

use crate::model::{ProjectRecord, RemoteRepository};

/// Result of comparing the local and remote sets. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diff {
    /// Remote repositories with no stored project of the same name.
    pub missing: Vec<RemoteRepository>,
    /// Stored projects with no remote repository of the same name.
    pub extra: Vec<ProjectRecord>,
}

impl Diff {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.extra.is_empty()
    }
}

/// Partition both inputs by exact, case-sensitive name membership.
///
/// Each element is tested independently against the opposite collection, so
/// duplicates survive and a single same-named element on the other side is
/// enough to exclude one. Input order is preserved.
pub fn diff(local: &[ProjectRecord], remote: &[RemoteRepository]) -> Diff {
    let missing = remote
        .iter()
        .filter(|repo| !local.iter().any(|project| project.name == repo.name))
        .cloned()
        .collect();

    let extra = local
        .iter()
        .filter(|project| !remote.iter().any(|repo| repo.name == project.name))
        .cloned()
        .collect();

    Diff { missing, extra }
}
