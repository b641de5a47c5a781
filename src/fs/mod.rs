// src/fs/mod.rs

//! Read-only filesystem access for manifest, lockfile and workspace scans.

use std::fmt::Debug;
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{DevtaskError, Result};

pub mod mock;

/// Abstract filesystem interface.
pub trait FileSystem: Send + Sync + Debug {
    fn read_to_string(&self, path: &Path) -> Result<String>;
    fn exists(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;

    /// Return a list of entries in a directory.
    /// Returns full paths, sorted.
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;
}

/// Implementation that uses `std::fs`.
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).map_err(|e| with_path(e, "reading", path))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path).map_err(|e| with_path(e, "reading dir", path))? {
            entries.push(entry?.path());
        }
        entries.sort();
        Ok(entries)
    }
}

fn with_path(err: std::io::Error, action: &str, path: &Path) -> DevtaskError {
    DevtaskError::IoError(std::io::Error::new(
        err.kind(),
        format!("{action} {}: {err}", path.display()),
    ))
}
