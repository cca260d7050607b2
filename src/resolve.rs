//! Mapping a remote repository to its checkout on disk.
//!
//! A folder in the working directory whose name matches the repository
//! (ignoring case) is taken as the existing checkout. It is not checked to be
//! a git repository. Without a match the user may choose to clone.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::error::SyncError;
use crate::git::Cloner;
use crate::model::RemoteRepository;
use crate::prompt::Prompter;

/// Where a repository lives locally, or why it has no location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathResolution {
    /// An entry in the working directory matched the repository name.
    Existing(PathBuf),
    /// The repository was cloned into the working directory.
    Cloned(PathBuf),
    /// No match and the user declined to clone.
    Declined,
}

impl PathResolution {
    pub fn path(&self) -> Option<&Path> {
        match self {
            PathResolution::Existing(p) | PathResolution::Cloned(p) => Some(p),
            PathResolution::Declined => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PathResolver {
    work_dir: PathBuf,
    force: bool,
}

impl PathResolver {
    /// `work_dir` should be absolute; returned paths are joined onto it.
    /// With `force` the clone prompt is skipped and treated as accepted.
    pub fn new(work_dir: impl Into<PathBuf>, force: bool) -> Self {
        Self {
            work_dir: work_dir.into(),
            force,
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Locate or clone `repo`.
    ///
    /// A failed clone is returned as [`SyncError::Clone`] inside the
    /// `anyhow::Error`; every other error comes from listing the directory or
    /// reading the prompt.
    pub fn resolve(
        &self,
        repo: &RemoteRepository,
        prompter: &mut dyn Prompter,
        cloner: &dyn Cloner,
    ) -> Result<PathResolution> {
        if let Some(entry) = self.find_matching_entry(&repo.name)? {
            return Ok(PathResolution::Existing(self.work_dir.join(entry)));
        }

        let accepted = self.force
            || prompter.confirm(&format!(
                "Failed to resolve {}'s path, would you like to clone the repo?",
                repo.name
            ))?;
        if !accepted {
            return Ok(PathResolution::Declined);
        }

        cloner
            .clone_repo(&repo.url, &self.work_dir)
            .map_err(|e| SyncError::clone_failed(&repo.url, e))?;
        Ok(PathResolution::Cloned(self.work_dir.join(&repo.name)))
    }

    /// First directory entry, in file-name order, equal to `name` ignoring case.
    fn find_matching_entry(&self, name: &str) -> Result<Option<String>> {
        let entries = std::fs::read_dir(&self.work_dir)
            .with_context(|| format!("failed to list {}", self.work_dir.display()))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry
                .with_context(|| format!("failed to read entry in {}", self.work_dir.display()))?;
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        names.sort();

        let wanted = name.to_lowercase();
        Ok(names.into_iter().find(|n| n.to_lowercase() == wanted))
    }
}
