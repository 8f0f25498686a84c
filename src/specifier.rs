//! Repository identity: the specifier a caller names, and the canonical
//! storage key derived from it.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Where a repository's content actually lives.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Location {
    /// A remote URL, reachable through the configured provider.
    Url(String),
    /// A path on the local filesystem.
    Path(String),
}

/// Identity of a repository as supplied by a caller.
///
/// Two specifiers compare equal iff their normalized `url` strings match;
/// normalization lowercases the host and drops a trailing `.git` segment so
/// that `https://Host/org/foo` and `https://host/org/foo.git` are the same
/// repository.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RepositorySpecifier {
    url: String,
}

impl RepositorySpecifier {
    /// Create a specifier from a caller-supplied URL or path string.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// The original, un-normalized URL string.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Whether this specifier names a local filesystem path rather than a
    /// remote URL.
    #[must_use]
    pub fn is_local(&self) -> bool {
        !self.url.contains("://") && !self.url.starts_with("git@")
    }

    /// Where this specifier's content lives.
    #[must_use]
    pub fn location(&self) -> Location {
        if self.is_local() {
            Location::Path(self.url.clone())
        } else {
            Location::Url(self.url.clone())
        }
    }

    /// The canonical form used for equality and storage-key derivation:
    /// lowercased host, trailing `.git` trimmed.
    #[must_use]
    pub fn canonical_url(&self) -> String {
        canonicalize(&self.url)
    }

    /// A short, filesystem-safe basename derived from the canonical URL,
    /// stable across processes and versions: all variants of the same
    /// logical repository (trailing `.git`, host case) produce the same
    /// key.
    ///
    /// Modeled on the teacher's cache-key scheme: a readable prefix (host
    /// and path, `/` replaced with `-`) followed by a stable hash suffix of
    /// the full canonical URL, so collisions across differently-cased or
    /// `.git`-suffixed inputs are avoided without sacrificing readability.
    #[must_use]
    pub fn storage_key(&self) -> String {
        storage_key(&self.url)
    }
}

impl PartialEq for RepositorySpecifier {
    fn eq(&self, other: &Self) -> bool {
        self.canonical_url() == other.canonical_url()
    }
}

impl Eq for RepositorySpecifier {}

impl Hash for RepositorySpecifier {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical_url().hash(state);
    }
}

/// Lowercase the host, trim a trailing `.git`, strip a trailing slash.
fn canonicalize(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    let without_git = trimmed.strip_suffix(".git").unwrap_or(trimmed);

    if let Some(rest) = without_git.split_once("://") {
        let (scheme, after_scheme) = rest;
        let (host, path) = after_scheme
            .split_once('/')
            .map_or((after_scheme, ""), |(h, p)| (h, p));
        if path.is_empty() {
            format!("{scheme}://{}", host.to_lowercase())
        } else {
            format!("{scheme}://{}/{path}", host.to_lowercase())
        }
    } else if let Some(rest) = without_git.strip_prefix("git@") {
        // scp-like syntax, e.g. git@host:org/repo
        if let Some((host, path)) = rest.split_once(':') {
            format!("git@{}:{path}", host.to_lowercase())
        } else {
            format!("git@{}", rest.to_lowercase())
        }
    } else {
        without_git.to_string()
    }
}

/// Deterministic `storage_key` computation, independent of any specifier
/// instance so it can be reused by callers that only have a raw URL string
/// (e.g. the catalog's corruption-recovery path).
#[must_use]
pub fn storage_key(url: &str) -> String {
    let canonical = canonicalize(url);

    let prefix = readable_prefix(&canonical);

    let mut hasher = DefaultHasher::new();
    canonical.hash(&mut hasher);
    let suffix = hasher.finish();

    format!("{prefix}-{suffix:08x}")
}

/// Extract a short, human-legible `org-repo`-style prefix from a canonical
/// URL for use in the storage key. Falls back to a sanitized form of the
/// whole string when the URL doesn't look like `scheme://host/org/repo`.
fn readable_prefix(canonical: &str) -> String {
    let after_scheme = canonical.split("://").next_back().unwrap_or(canonical);
    let after_host = after_scheme.split_once('/').map_or("", |(_, p)| p);

    let candidate = if after_host.is_empty() {
        after_scheme
    } else {
        after_host
    };

    let sanitized: String = candidate
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
        .collect();

    let trimmed = sanitized.trim_matches('-');
    if trimmed.is_empty() {
        "repo".to_string()
    } else {
        trimmed.to_lowercase()
    }
}
