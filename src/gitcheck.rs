// src/gitcheck.rs

//! Summarise the git state of every repository directly under a directory.

use std::fmt;
use std::path::Path;

use crate::errors::Result;
use crate::exec::exec_capture;
use crate::fs::FileSystem;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoStatus {
    pub name: String,
    pub branch: String,
    pub ahead: u32,
    pub dirty: u32,
    pub untracked: u32,
}

impl RepoStatus {
    /// Parse `git status --porcelain=v2 --branch` output.
    pub fn from_porcelain(name: impl Into<String>, text: &str) -> Self {
        let mut status = RepoStatus {
            name: name.into(),
            ..Default::default()
        };

        for line in text.lines() {
            if let Some(head) = line.strip_prefix("# branch.head ") {
                status.branch = head.trim().to_string();
            } else if let Some(ab) = line.strip_prefix("# branch.ab +") {
                let ahead = ab.split_whitespace().next().unwrap_or("0");
                status.ahead = ahead.parse().unwrap_or(0);
            } else if line.starts_with("1 ") || line.starts_with("2 ") || line.starts_with("u ") {
                status.dirty += 1;
            } else if line.starts_with("? ") {
                status.untracked += 1;
            }
        }

        status
    }

    /// Nothing to push and no tracked changes. Untracked files alone do not
    /// make a repository unclean; they are only listed next to other changes.
    pub fn is_clean(&self) -> bool {
        self.ahead == 0 && self.dirty == 0
    }
}

impl fmt::Display for RepoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}:", self.name, self.branch)?;
        if self.is_clean() {
            return write!(f, " clean");
        }
        if self.ahead > 0 {
            write!(f, " AHEAD {}", self.ahead)?;
        }
        if self.dirty > 0 {
            write!(f, " DIRTY {}", self.dirty)?;
        }
        if self.untracked > 0 {
            write!(f, " UNTRACKED {}", self.untracked)?;
        }
        Ok(())
    }
}

/// Status of every non-hidden git working tree directly under `root`.
pub async fn check_workspace(fs: &dyn FileSystem, root: &Path) -> Result<Vec<RepoStatus>> {
    let mut statuses = Vec::new();
    for dir in fs.read_dir(root)? {
        let Some(name) = dir.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.starts_with('.') || !fs.is_dir(&dir) || !fs.exists(&dir.join(".git")) {
            continue;
        }
        let text = exec_capture("git status --porcelain=v2 --branch", Some(&dir)).await?;
        statuses.push(RepoStatus::from_porcelain(name, &text));
    }
    Ok(statuses)
}
