//! Key composition: logical paths to physical store keys
//!
//! Every caller-supplied path is resolved exactly once. The result is a
//! [`PhysicalKey`], which has no resolve path of its own, so a key can never
//! pick up the subfolder prefix twice.

use std::fmt;

/// Marker for dynamic variants (e.g. `thumb.png?width=200`)
pub const VARIANT_MARKER: char = '?';

/// Key as used against the backing store, subfolder prefix applied
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PhysicalKey(String);

impl PhysicalKey {
    /// Wrap a key that is already physical (store listings, retention paths)
    pub fn from_raw(key: impl Into<String>) -> Self {
        PhysicalKey(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// True for dynamic variant keys, which are never cached and always exist
    pub fn is_variant(&self) -> bool {
        self.0.contains(VARIANT_MARKER)
    }
}

impl AsRef<str> for PhysicalKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhysicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Maps logical paths onto physical keys under a fixed subfolder
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyComposer {
    /// Normalized prefix: empty, or segments joined by '/' with a trailing '/'
    prefix: String,
}

impl KeyComposer {
    /// Create a composer for a subfolder
    ///
    /// Leading, trailing and repeated slashes are dropped. An empty subfolder
    /// yields the identity transform.
    ///
    /// ```
    /// use storage_gateway::KeyComposer;
    ///
    /// let keys = KeyComposer::new("/media/shop/");
    /// assert_eq!(keys.resolve("a/b.png").as_str(), "media/shop/a/b.png");
    /// assert_eq!(KeyComposer::new("").resolve("a/b.png").as_str(), "a/b.png");
    /// ```
    pub fn new(subfolder: &str) -> Self {
        let segments: Vec<&str> = subfolder.split('/').filter(|s| !s.is_empty()).collect();
        let prefix = if segments.is_empty() {
            String::new()
        } else {
            format!("{}/", segments.join("/"))
        };
        KeyComposer { prefix }
    }

    /// The normalized prefix (empty or ending in '/')
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Resolve a logical path; a leading '/' on the path is ignored
    pub fn resolve(&self, logical: &str) -> PhysicalKey {
        let logical = logical.trim_start_matches('/');
        PhysicalKey(format!("{}{}", self.prefix, logical))
    }

    /// Strip the prefix from a physical key
    ///
    /// Returns `None` for keys outside the subfolder.
    pub fn logical<'a>(&self, physical: &'a str) -> Option<&'a str> {
        physical.strip_prefix(self.prefix.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_subfolder_is_identity() {
        let keys = KeyComposer::new("");
        assert_eq!(keys.prefix(), "");
        assert_eq!(keys.resolve("a/b.png").as_str(), "a/b.png");
        assert_eq!(KeyComposer::new("///").prefix(), "");
    }

    #[test]
    fn test_subfolder_normalization() {
        assert_eq!(KeyComposer::new("media").prefix(), "media/");
        assert_eq!(KeyComposer::new("/media/").prefix(), "media/");
        assert_eq!(KeyComposer::new("media//shop").prefix(), "media/shop/");
    }

    #[test]
    fn test_resolve_strips_leading_slash() {
        let keys = KeyComposer::new("media");
        assert_eq!(keys.resolve("/a/b.png").as_str(), "media/a/b.png");
        assert_eq!(keys.resolve("a/b.png").as_str(), "media/a/b.png");
    }

    #[test]
    fn test_logical_inverts_resolve() {
        let keys = KeyComposer::new("media");
        let physical = keys.resolve("a/b.png");
        assert_eq!(keys.logical(physical.as_str()), Some("a/b.png"));
        assert_eq!(keys.logical("other/a/b.png"), None);
    }

    #[test]
    fn test_variant_detection() {
        let keys = KeyComposer::new("");
        assert!(keys.resolve("thumb.png?width=200").is_variant());
        assert!(!keys.resolve("thumb.png").is_variant());
    }
}
