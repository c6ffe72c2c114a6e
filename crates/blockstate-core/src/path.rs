//! Field paths
//!
//! A `FieldPath` names a field inside a snapshot tree as a sequence of object
//! keys, starting from the root of the block that declared it.

use std::fmt;

use serde_json::Value;

/// Location of a field inside a snapshot tree
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    /// Empty path (the block root)
    #[inline]
    pub fn root() -> Self {
        FieldPath(Vec::new())
    }

    /// Path of a direct child field
    pub fn child(&self, key: &str) -> Self {
        let mut segments = Vec::with_capacity(self.0.len() + 1);
        segments.extend(self.0.iter().cloned());
        segments.push(key.to_owned());
        FieldPath(segments)
    }

    #[inline]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Look up the value at this path.
    ///
    /// Returns `None` as soon as a segment is missing or an intermediate value
    /// is not an object.
    pub fn lookup<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        self.0
            .iter()
            .try_fold(root, |current, key| current.as_object()?.get(key))
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

/// Parses a dotted path (`"a.b.c"`); the empty string is the root.
impl From<&str> for FieldPath {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            FieldPath::root()
        } else {
            FieldPath(s.split('.').map(str::to_owned).collect())
        }
    }
}

impl From<Vec<String>> for FieldPath {
    fn from(segments: Vec<String>) -> Self {
        FieldPath(segments)
    }
}
