//! Git provenance capture
//!
//! Tracking backends record which code produced a run. Provenance is captured
//! once at process entry and threaded through configuration so nothing deeper
//! in the stack touches the repository or the environment.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Code provenance attached to every tracked run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    /// Commit hash of HEAD, if available
    pub commit: Option<String>,
    /// Current branch name
    pub branch: Option<String>,
    /// Subject line of the HEAD commit
    pub message: Option<String>,
    /// URL of the `origin` remote
    pub remote_url: Option<String>,
    /// Whether the working tree had uncommitted changes
    pub dirty: bool,
}

impl Provenance {
    /// Capture provenance from the repository containing `path`.
    ///
    /// Returns a default (all-`None`) value when `path` is not inside a git
    /// repository; a missing repository is not an error for untracked
    /// development runs.
    pub fn capture(path: &Path) -> Self {
        let repo = match git2::Repository::discover(path) {
            Ok(repo) => repo,
            Err(err) => {
                debug!(path = %path.display(), error = %err, "no git repository found");
                return Self::default();
            }
        };

        let mut provenance = Self::default();

        if let Ok(head) = repo.head() {
            provenance.branch = head.shorthand().map(str::to_string);
            if let Ok(commit) = head.peel_to_commit() {
                provenance.commit = Some(commit.id().to_string());
                provenance.message = commit.summary().map(str::to_string);
            }
        }

        if let Ok(remote) = repo.find_remote("origin") {
            provenance.remote_url = remote.url().map(str::to_string);
        }

        if let Ok(statuses) = repo.statuses(None) {
            provenance.dirty = statuses
                .iter()
                .any(|entry| !entry.status().is_ignored() && entry.status() != git2::Status::CURRENT);
        }

        provenance
    }

    /// Short form of the commit hash for display.
    pub fn short_commit(&self) -> Option<&str> {
        self.commit.as_deref().map(|c| &c[..c.len().min(8)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_outside_repository() {
        let dir = tempfile::tempdir().unwrap();
        let provenance = Provenance::capture(dir.path());
        assert_eq!(provenance, Provenance::default());
    }

    #[test]
    fn test_short_commit() {
        let provenance = Provenance {
            commit: Some("0123456789abcdef".to_string()),
            ..Default::default()
        };
        assert_eq!(provenance.short_commit(), Some("01234567"));
    }
}
