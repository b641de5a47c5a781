// src/deps/resolver.rs

//! Freshness check for git-sourced dependencies.
//!
//! For each manifest dependency, in declaration order:
//! 1. not a remote git source → skip;
//! 2. no lockfile entry (or no resolved value) for `name@declared` → refetch;
//! 3. list the remote's refs and keep lines ending with the declared ref:
//!    exactly one match whose hash the lockfile already points at → skip,
//!    anything else → refetch.
//!
//! Dependencies are processed strictly one after another: one ref listing
//! in flight at a time, and during [`GitDependencyResolver::upgrade`] each
//! refetch finishes before the next dependency is looked at.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{debug, info};

use crate::deps::lockfile::Lockfile;
use crate::deps::manifest::Manifest;
use crate::deps::remote::{RefLister, commit_of, matching_refs};
use crate::deps::source::DeclaredSource;
use crate::errors::{DevtaskError, Result};
use crate::exec::{ProcessRunner, RunSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Skip,
    Refetch,
}

/// Why a decision was taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reason {
    NotGit,
    Unresolved,
    /// The declared ref matched this many lines (zero or several).
    AmbiguousRef(usize),
    UpToDate { commit: String },
    Outdated { tip: String },
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::NotGit => write!(f, "not a git dependency"),
            Reason::Unresolved => write!(f, "not resolved in lockfile"),
            Reason::AmbiguousRef(n) => write!(f, "ref matched {n} remote refs"),
            Reason::UpToDate { commit } => write!(f, "at tip {commit}"),
            Reason::Outdated { tip } => write!(f, "remote tip is {tip}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub name: String,
    pub declared: String,
    pub action: Action,
    pub reason: Reason,
}

/// Re-fetches a single dependency through the package manager.
pub trait Refetcher: Send + Sync + fmt::Debug {
    fn refetch<'a>(
        &'a self,
        name: &'a str,
        declared: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}

/// Refetcher running a command template such as `yarn add {source}`.
///
/// `{name}` and `{source}` are replaced with the shell-quoted package name
/// and declared source.
#[derive(Debug, Clone)]
pub struct CommandRefetcher {
    runner: ProcessRunner,
    template: String,
    cwd: Option<PathBuf>,
}

impl CommandRefetcher {
    pub fn new(runner: ProcessRunner, template: impl Into<String>) -> Self {
        Self {
            runner,
            template: template.into(),
            cwd: None,
        }
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn command_for(&self, name: &str, declared: &str) -> String {
        self.template
            .replace("{name}", &shell_words::quote(name))
            .replace("{source}", &shell_words::quote(declared))
    }
}

impl Refetcher for CommandRefetcher {
    fn refetch<'a>(
        &'a self,
        name: &'a str,
        declared: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let mut spec = RunSpec::shell(self.command_for(name, declared));
            if let Some(dir) = &self.cwd {
                spec = spec.cwd(dir.clone());
            }
            self.runner.run(&spec).await?.into_result()?;
            Ok(())
        })
    }
}

#[derive(Debug, Clone)]
pub struct GitDependencyResolver {
    lister: Arc<dyn RefLister>,
}

impl GitDependencyResolver {
    pub fn new(lister: Arc<dyn RefLister>) -> Self {
        Self { lister }
    }

    /// Decide skip/refetch for every manifest dependency without refetching.
    pub async fn resolve_staleness(
        &self,
        manifest: &Manifest,
        lockfile: &Lockfile,
    ) -> Result<Vec<Decision>> {
        let mut decisions = Vec::with_capacity(manifest.dependencies.len());
        for (name, declared) in &manifest.dependencies {
            decisions.push(self.decide(name, declared, lockfile).await?);
        }
        Ok(decisions)
    }

    /// Decide each dependency and refetch stale ones as they are found.
    ///
    /// The first refetch failure aborts the sequence; earlier refetches are
    /// kept.
    pub async fn upgrade(
        &self,
        manifest: &Manifest,
        lockfile: &Lockfile,
        refetcher: &dyn Refetcher,
    ) -> Result<Vec<Decision>> {
        let mut decisions = Vec::with_capacity(manifest.dependencies.len());
        for (name, declared) in &manifest.dependencies {
            let decision = self.decide(name, declared, lockfile).await?;
            if decision.action == Action::Refetch {
                info!(dependency = %name, source = %declared, reason = %decision.reason, "refetching dependency");
                refetcher
                    .refetch(name, declared)
                    .await
                    .map_err(|e| match e {
                        e @ DevtaskError::RefetchFailure { .. } => e,
                        other => DevtaskError::RefetchFailure {
                            name: name.clone(),
                            declared: declared.clone(),
                            reason: other.to_string(),
                        },
                    })?;
            }
            decisions.push(decision);
        }
        Ok(decisions)
    }

    /// Decide a single dependency.
    pub async fn decide(&self, name: &str, declared: &str, lockfile: &Lockfile) -> Result<Decision> {
        let decision = |action, reason| Decision {
            name: name.to_string(),
            declared: declared.to_string(),
            action,
            reason,
        };

        let (url, reference) = match DeclaredSource::parse(declared) {
            DeclaredSource::Registry(_) => return Ok(decision(Action::Skip, Reason::NotGit)),
            DeclaredSource::Git { url, reference } => (url, reference),
        };

        let Some(resolved) = lockfile.resolved(name, declared) else {
            debug!(dependency = %name, "no resolved lockfile entry");
            return Ok(decision(Action::Refetch, Reason::Unresolved));
        };

        info!(dependency = %name, "git ls-remote {}", url);
        let listing = self.lister.list_refs(&url).await?;
        let matches = matching_refs(&listing, &reference);

        let [line] = matches.as_slice() else {
            debug!(dependency = %name, reference = %reference, matches = matches.len(), "ambiguous ref");
            return Ok(decision(Action::Refetch, Reason::AmbiguousRef(matches.len())));
        };

        let tip = commit_of(line).to_string();
        if resolved.ends_with(&format!("#{tip}")) {
            debug!(dependency = %name, commit = %tip, "already at remote tip");
            Ok(decision(Action::Skip, Reason::UpToDate { commit: tip }))
        } else {
            Ok(decision(Action::Refetch, Reason::Outdated { tip }))
        }
    }
}
