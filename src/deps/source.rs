// src/deps/source.rs

//! Declared dependency sources as written in the manifest.

/// URL schemes that point at a remote git repository.
const GIT_PREFIXES: &[&str] = &[
    "https://",
    "http://",
    "git://",
    "ssh://",
    "git+https://",
    "git+http://",
    "git+ssh://",
];

/// Ref matched when a git source carries no `#fragment`.
pub const DEFAULT_REF: &str = "HEAD";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclaredSource {
    /// A registry version range such as `^1.2.0`; never checked against a remote.
    Registry(String),
    /// A remote git repository plus the branch/tag/ref after `#`.
    ///
    /// `url` is what git itself accepts: package-manager `git+` scheme
    /// prefixes are removed.
    Git { url: String, reference: String },
}

impl DeclaredSource {
    pub fn parse(declared: &str) -> Self {
        let declared = declared.trim();
        if !is_remote_git(declared) {
            return DeclaredSource::Registry(declared.to_string());
        }

        let (url, reference) = match declared.split_once('#') {
            Some((url, reference)) if !reference.is_empty() => (url, reference),
            Some((url, _)) => (url, DEFAULT_REF),
            None => (declared, DEFAULT_REF),
        };
        DeclaredSource::Git {
            url: listing_url(url).to_string(),
            reference: reference.to_string(),
        }
    }

    pub fn is_git(&self) -> bool {
        matches!(self, DeclaredSource::Git { .. })
    }
}

fn is_remote_git(declared: &str) -> bool {
    if GIT_PREFIXES.iter().any(|p| declared.starts_with(p)) {
        return true;
    }
    // scp-like form: git@github.com:org/repo.git
    match declared.split_once(':') {
        Some((host, _)) => host.contains('@') && !host.contains('/'),
        None => false,
    }
}

/// `git+https://host/repo` → `https://host/repo`.
fn listing_url(url: &str) -> &str {
    url.strip_prefix("git+").unwrap_or(url)
}
