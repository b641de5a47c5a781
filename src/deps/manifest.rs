// src/deps/manifest.rs

//! Manifest reader (`package.json`).

use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::errors::{DevtaskError, Result};
use crate::fs::FileSystem;

/// Dependencies declared in the manifest, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub dependencies: IndexMap<String, String>,
}

impl Manifest {
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| DevtaskError::ManifestError(e.to_string()))
    }

    pub fn load(fs: &dyn FileSystem, path: &Path) -> Result<Self> {
        let text = fs.read_to_string(path)?;
        Self::parse(&text).map_err(|e| match e {
            DevtaskError::ManifestError(msg) => {
                DevtaskError::ManifestError(format!("{}: {msg}", path.display()))
            }
            other => other,
        })
    }
}
