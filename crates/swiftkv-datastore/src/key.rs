//! Datastore keys and their object-name mapping.
//!
//! Keys are '/'-separated paths that always start with '/'. The object store
//! (and in particular its bulk endpoints) does not accept names starting with
//! '/', so the storage name of a key is its path with the leading '/' removed:
//!
//! ```text
//!   Key "/a/b/c"  <->  object name "a/b/c"
//!   Key "/"       <->  object name ""
//! ```

use std::fmt;

/// A cleaned, '/'-rooted datastore key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(String);

impl Key {
    /// Build a key from any path-like string.
    ///
    /// Adds the leading '/', drops empty and `.` segments, resolves `..` and
    /// removes any trailing '/'.
    pub fn new(path: impl AsRef<str>) -> Self {
        let mut segments: Vec<&str> = Vec::new();
        for segment in path.as_ref().split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                s => segments.push(s),
            }
        }
        Key(format!("/{}", segments.join("/")))
    }

    /// Rebuild a key from an object name returned by the store.
    pub fn from_name(name: &str) -> Self {
        Key(format!("/{}", name))
    }

    /// The root key `/`
    pub fn root() -> Self {
        Key("/".to_string())
    }

    /// External representation, always starting with '/'.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Object name: the external form without its leading '/'.
    pub fn name(&self) -> &str {
        &self.0[1..]
    }

    /// Whether an object can be stored under this key's name.
    ///
    /// Cleaning keeps any byte, so the root key (empty name) and names with
    /// NUL bytes are valid keys that the store can never hold. Writes reject
    /// them; deletes treat them as absent.
    pub fn is_storable(&self) -> bool {
        !self.name().is_empty() && !self.0.contains('\0')
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Key {
    fn from(path: &str) -> Self {
        Key::new(path)
    }
}

impl From<String> for Key {
    fn from(path: String) -> Self {
        Key::new(path)
    }
}

impl AsRef<str> for Key {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Object name for a key.
pub fn key_to_name(key: &Key) -> &str {
    key.name()
}

/// Key for an object name.
pub fn name_to_key(name: &str) -> Key {
    Key::from_name(name)
}

/// Listing prefix for a query prefix: one leading '/' stripped, nothing else.
pub fn normalize_prefix(prefix: &str) -> &str {
    prefix.strip_prefix('/').unwrap_or(prefix)
}
