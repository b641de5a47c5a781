// src/deps/mod.rs

//! Git dependency freshness.
//!
//! - [`source`] classifies declared sources (registry vs remote git).
//! - [`manifest`] / [`lockfile`] read the dependency declarations and pins.
//! - [`remote`] lists a remote's refs.
//! - [`resolver`] decides skip/refetch and drives refetches.

pub mod lockfile;
pub mod manifest;
pub mod remote;
pub mod resolver;
pub mod source;

use std::path::Path;

use tracing::warn;

pub use lockfile::{LockEntry, Lockfile};
pub use manifest::Manifest;
pub use remote::{GitLsRemote, RefLister};
pub use resolver::{
    Action, CommandRefetcher, Decision, GitDependencyResolver, Reason, Refetcher,
};
pub use source::DeclaredSource;

use crate::errors::Result;
use crate::fs::FileSystem;

/// Read the manifest and lockfile.
///
/// A missing lockfile is treated as empty, which makes every git
/// dependency unresolved.
pub fn load_inputs(
    fs: &dyn FileSystem,
    manifest_path: &Path,
    lockfile_path: &Path,
) -> Result<(Manifest, Lockfile)> {
    let manifest = Manifest::load(fs, manifest_path)?;
    let lockfile = if fs.exists(lockfile_path) {
        Lockfile::load(fs, lockfile_path)?
    } else {
        warn!(path = %lockfile_path.display(), "lockfile not found; treating all git dependencies as unresolved");
        Lockfile::default()
    };
    Ok((manifest, lockfile))
}
