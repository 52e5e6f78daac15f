//! Logical path <-> object key mapping.
//!
//! A [`PathResolver`] is a pure value owned by each filesystem instance.
//! It maps hierarchical paths (as used by the filesystem contract and the
//! public URL space) onto flat object-store keys namespaced by a key
//! prefix, and back.  All inputs are normalized to forward slashes before
//! use; backslashes never survive past this module.

/// Delimiter used by the store to emulate hierarchy.
pub const DELIMITER: char = '/';

/// Replace backslashes with forward slashes.
pub fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/")
}

/// Canonical form of a logical path: forward slashes, no leading or
/// trailing delimiter.
pub fn normalize(path: &str) -> String {
    normalize_separators(path)
        .trim_matches(DELIMITER)
        .to_string()
}

/// Case-insensitive segment-aware prefix test: `/media` matches `/media`
/// and `/media/x` but not `/mediax`.
pub fn path_starts_with(path: &str, root: &str) -> bool {
    if root.is_empty() {
        return true;
    }
    let path_lower = path.to_ascii_lowercase();
    let root_lower = root.to_ascii_lowercase();
    path_lower == root_lower
        || (path_lower.starts_with(&root_lower)
            && path_lower.as_bytes().get(root_lower.len()) == Some(&b'/'))
}

/// Maps logical filesystem paths to object keys and public URLs.
#[derive(Debug, Clone)]
pub struct PathResolver {
    /// Key prefix namespacing this filesystem's objects in the bucket.
    /// Normalized: no leading or trailing delimiter.  May be empty.
    prefix: String,
    /// Public mount root, e.g. `/media`.  Normalized: leading slash, no
    /// trailing slash.  Empty when the filesystem is mounted at `/`.
    root_url: String,
}

impl PathResolver {
    /// Create a resolver from a raw key prefix and virtual mount path.
    pub fn new(key_prefix: &str, virtual_path: &str) -> Self {
        let prefix = normalize(key_prefix);
        let trimmed = normalize(virtual_path);
        let root_url = if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{trimmed}")
        };
        Self { prefix, root_url }
    }

    /// The normalized key prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The public mount root (e.g. `/media`).
    pub fn root_url(&self) -> &str {
        &self.root_url
    }

    /// Resolve a logical path to a fully-qualified object key.
    ///
    /// Empty input resolves to the bare prefix (the root directory
    /// marker).  A duplicated leading prefix is stripped so the mapping
    /// is idempotent against double-prefixed input.  When `is_dir` is
    /// set the key always ends with the delimiter, which is how the
    /// store denotes a directory prefix.
    pub fn to_object_key(&self, path: &str, is_dir: bool) -> String {
        if path.is_empty() {
            return self.prefix.clone();
        }

        let mut path = normalize_separators(path)
            .trim_start_matches(DELIMITER)
            .to_string();

        if !self.prefix.is_empty() && path_starts_with(&path, &self.prefix) {
            path = path[self.prefix.len()..]
                .trim_start_matches(DELIMITER)
                .to_string();
        }

        if is_dir && !path.ends_with(DELIMITER) {
            path.push(DELIMITER);
        }

        if self.prefix.is_empty() {
            path
        } else {
            format!("{}/{}", self.prefix, path)
        }
    }

    /// Reverse mapping: strip the prefix off a store key and trim
    /// delimiters, yielding the logical path.
    ///
    /// Satisfies `from_object_key(to_object_key(p, false)) == normalize(p)`
    /// for any `p` that does not itself carry a duplicated prefix.
    pub fn from_object_key(&self, key: &str) -> String {
        let key = if !self.prefix.is_empty() && key.starts_with(&self.prefix) {
            &key[self.prefix.len()..]
        } else {
            key
        };
        key.trim_matches(DELIMITER).to_string()
    }

    /// Map a logical path to the filesystem's public full path, rooted at
    /// the virtual mount point.  A path already under the mount root is
    /// not double-prefixed.
    pub fn to_full_path(&self, path: &str) -> String {
        let path = normalize_separators(path);
        let full = if path_starts_with(&path, &self.root_url) {
            path
        } else {
            format!("{}/{}", self.root_url, path)
        };
        full.trim_matches(DELIMITER).to_string()
    }

    /// Map a full path or URL back to a logical path relative to the
    /// mount root.  Idempotent: re-applying it to its own output returns
    /// the same value.
    pub fn to_relative_path(&self, full_path_or_url: &str) -> String {
        let path = normalize_separators(full_path_or_url);
        if path_starts_with(&path, &self.root_url) {
            path[self.root_url.len()..]
                .trim_start_matches(DELIMITER)
                .to_string()
        } else {
            path
        }
    }

    /// Compose the public URL for a logical path.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.root_url,
            normalize_separators(path).trim_matches(DELIMITER)
        )
    }
}
