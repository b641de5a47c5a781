// src/deps/remote.rs

//! Remote ref listing.

use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;

use crate::errors::{DevtaskError, Result};
use crate::exec::exec_capture;

/// Lists the refs of a remote repository.
///
/// Returns `<commit-hash>\t<ref-name>` records separated by newlines, the
/// format of `git ls-remote`.
pub trait RefLister: Send + Sync + Debug {
    fn list_refs<'a>(
        &'a self,
        url: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;
}

/// Production lister shelling out to `git ls-remote`.
#[derive(Debug, Clone, Default)]
pub struct GitLsRemote;

impl RefLister for GitLsRemote {
    fn list_refs<'a>(
        &'a self,
        url: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(async move {
            let cmd = format!("git ls-remote {}", shell_words::quote(url));
            exec_capture(&cmd, None)
                .await
                .map_err(|e| DevtaskError::RefQuery {
                    url: url.to_string(),
                    reason: e.to_string(),
                })
        })
    }
}

/// Lines of a listing whose text ends with `reference`.
pub fn matching_refs<'a>(listing: &'a str, reference: &str) -> Vec<&'a str> {
    listing
        .lines()
        .map(|l| l.trim_end_matches('\r'))
        .filter(|l| !l.is_empty() && l.ends_with(reference))
        .collect()
}

/// Commit hash of a listing line: the text before the tab separator.
pub fn commit_of(line: &str) -> &str {
    line.split('\t').next().unwrap_or(line).trim()
}
