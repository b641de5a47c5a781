// src/deps/lockfile.rs

//! Reader for the yarn v1 lockfile format.
//!
//! Only the parts needed for freshness checks are kept: every entry key
//! (`name@declared-source`) maps to its `version` and `resolved` fields.
//! Nested blocks such as `dependencies:` are skipped.

use std::collections::HashMap;
use std::path::Path;

use crate::errors::{DevtaskError, Result};
use crate::fs::FileSystem;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockEntry {
    pub version: Option<String>,
    pub resolved: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lockfile {
    entries: HashMap<String, LockEntry>,
}

impl Lockfile {
    pub fn key(name: &str, declared: &str) -> String {
        format!("{name}@{declared}")
    }

    /// Entry for the exact `name@declared` key.
    pub fn get(&self, name: &str, declared: &str) -> Option<&LockEntry> {
        self.entries.get(&Self::key(name, declared))
    }

    /// Resolved value for `name@declared`, if the entry exists and has one.
    pub fn resolved(&self, name: &str, declared: &str) -> Option<&str> {
        self.get(name, declared)
            .and_then(|e| e.resolved.as_deref())
            .filter(|r| !r.is_empty())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn load(fs: &dyn FileSystem, path: &Path) -> Result<Self> {
        let text = fs.read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut entries = HashMap::new();
        let mut current_keys: Vec<String> = Vec::new();
        let mut current = LockEntry::default();
        let mut in_nested_block = false;

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim_end();
            if line.trim().is_empty() || line.trim_start().starts_with('#') {
                continue;
            }

            let indent = line.len() - line.trim_start().len();
            if indent == 0 {
                flush(&mut entries, &mut current_keys, &mut current);
                let header = line.strip_suffix(':').ok_or_else(|| DevtaskError::LockfileParse {
                    line: line_no,
                    message: format!("expected entry header ending with ':', got {line:?}"),
                })?;
                current_keys = header
                    .split(',')
                    .map(|k| unquote(k.trim()).to_string())
                    .filter(|k| !k.is_empty())
                    .collect();
                if current_keys.is_empty() {
                    return Err(DevtaskError::LockfileParse {
                        line: line_no,
                        message: "entry header has no keys".to_string(),
                    });
                }
                in_nested_block = false;
                continue;
            }

            if current_keys.is_empty() {
                return Err(DevtaskError::LockfileParse {
                    line: line_no,
                    message: "field outside of any entry".to_string(),
                });
            }

            if indent > 2 {
                if in_nested_block {
                    continue;
                }
                return Err(DevtaskError::LockfileParse {
                    line: line_no,
                    message: "unexpected indentation".to_string(),
                });
            }

            let field = line.trim_start();
            if field.ends_with(':') {
                in_nested_block = true;
                continue;
            }
            in_nested_block = false;

            let (name, value) = match field.split_once(char::is_whitespace) {
                Some((name, value)) => (unquote(name), unquote(value.trim())),
                None => (unquote(field), ""),
            };
            match name {
                "version" => current.version = Some(value.to_string()),
                "resolved" => current.resolved = Some(value.to_string()),
                _ => {}
            }
        }

        flush(&mut entries, &mut current_keys, &mut current);
        Ok(Self { entries })
    }
}

fn flush(
    entries: &mut HashMap<String, LockEntry>,
    keys: &mut Vec<String>,
    current: &mut LockEntry,
) {
    let entry = std::mem::take(current);
    for key in keys.drain(..) {
        entries.insert(key, entry.clone());
    }
}

fn unquote(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(s)
}
