//! Store paths and write batches.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

use crate::errors::{RemoteWriteError, SubscriptionError};

/// Characters the store refuses inside a path segment.
const FORBIDDEN: &[char] = &['.', '#', '$', '[', ']'];

/// A path that failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathError {
    pub path: String,
    pub reason: &'static str,
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' {}", self.path, self.reason)
    }
}

impl std::error::Error for PathError {}

impl From<PathError> for RemoteWriteError {
    fn from(err: PathError) -> Self {
        RemoteWriteError::InvalidPath(err.to_string())
    }
}

impl From<PathError> for SubscriptionError {
    fn from(err: PathError) -> Self {
        SubscriptionError::InvalidPath(err.to_string())
    }
}

/// A validated, `/`-separated location in the store tree.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StorePath(String);

impl StorePath {
    /// Parse a path, trimming leading and trailing slashes.
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        let trimmed = raw.trim_matches('/');
        if trimmed.is_empty() {
            return Err(PathError {
                path: raw.to_string(),
                reason: "is empty",
            });
        }
        for segment in trimmed.split('/') {
            validate_segment(raw, segment)?;
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Append a single segment, which must not itself contain `/`.
    pub fn child(&self, segment: &str) -> Result<Self, PathError> {
        let full = format!("{}/{}", self.0, segment);
        if segment.contains('/') {
            return Err(PathError {
                path: full,
                reason: "has a segment containing '/'",
            });
        }
        validate_segment(&full, segment)?;
        Ok(Self(full))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Every proper ancestor, nearest last.
    pub fn ancestors(&self) -> Vec<&str> {
        self.0
            .match_indices('/')
            .map(|(idx, _)| &self.0[..idx])
            .collect()
    }

    /// True when `other` lies strictly below this path.
    pub fn is_ancestor_of(&self, other: &StorePath) -> bool {
        other.0.len() > self.0.len()
            && other.0.starts_with(&self.0)
            && other.0.as_bytes()[self.0.len()] == b'/'
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn validate_segment(path: &str, segment: &str) -> Result<(), PathError> {
    if segment.is_empty() {
        return Err(PathError {
            path: path.to_string(),
            reason: "has an empty segment",
        });
    }
    if segment.contains(FORBIDDEN) || segment.chars().any(char::is_control) {
        return Err(PathError {
            path: path.to_string(),
            reason: "contains a forbidden character",
        });
    }
    Ok(())
}

/// One or more path/value pairs applied atomically.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    writes: BTreeMap<StorePath, Value>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(path: StorePath, value: Value) -> Self {
        let mut batch = Self::new();
        batch.insert(path, value);
        batch
    }

    /// Build a batch from a JSON object of `"path": value` pairs.
    pub fn from_json(body: &Value) -> Result<Self, RemoteWriteError> {
        let Some(pairs) = body.as_object() else {
            return Err(RemoteWriteError::Rejected(
                "update body must be an object of path/value pairs".to_string(),
            ));
        };
        let mut batch = Self::new();
        for (path, value) in pairs {
            batch.insert(StorePath::parse(path)?, value.clone());
        }
        Ok(batch)
    }

    pub fn insert(&mut self, path: StorePath, value: Value) {
        self.writes.insert(path, value);
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &StorePath> {
        self.writes.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StorePath, &Value)> {
        self.writes.iter()
    }

    /// Reject empty batches and batches where one path lies below another.
    pub fn validate(&self) -> Result<(), RemoteWriteError> {
        if self.is_empty() {
            return Err(RemoteWriteError::Rejected("empty write batch".to_string()));
        }
        for path in self.writes.keys() {
            for ancestor in path.ancestors() {
                if self.writes.contains_key(&StorePath(ancestor.to_string())) {
                    return Err(RemoteWriteError::Rejected(format!(
                        "path '{}' overlaps '{}' in the same batch",
                        path, ancestor
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_trims_and_validates() {
        assert_eq!(StorePath::parse("/notifications/").unwrap().as_str(), "notifications");
        assert!(StorePath::parse("").is_err());
        assert!(StorePath::parse("a//b").is_err());
        assert!(StorePath::parse("a/b.c").is_err());
        assert!(StorePath::parse("a/$b").is_err());
    }

    #[test]
    fn test_child_rejects_nested_segments() {
        let root = StorePath::parse("notifications").unwrap();
        assert_eq!(root.child("n1").unwrap().as_str(), "notifications/n1");
        assert!(root.child("n1/read").is_err());
        assert!(root.child("").is_err());
        assert!(root.child("n[1]").is_err());
    }

    #[test]
    fn test_ancestry() {
        let a = StorePath::parse("a/b").unwrap();
        let b = StorePath::parse("a/b/c").unwrap();
        let sibling = StorePath::parse("a/bc").unwrap();
        assert!(a.is_ancestor_of(&b));
        assert!(!a.is_ancestor_of(&sibling));
        assert!(!a.is_ancestor_of(&a));
        assert_eq!(b.ancestors(), vec!["a", "a/b"]);
    }

    #[test]
    fn test_batch_validation() {
        assert!(WriteBatch::new().validate().is_err());

        let batch = WriteBatch::from_json(&json!({ "a/b": 1, "a/c": 2 })).unwrap();
        assert_eq!(batch.len(), 2);
        assert!(batch.validate().is_ok());

        let overlapping = WriteBatch::from_json(&json!({ "a": 1, "a/b": 2 })).unwrap();
        assert!(overlapping.validate().is_err());

        assert!(matches!(
            WriteBatch::from_json(&json!({ "a.b": 1 })),
            Err(RemoteWriteError::InvalidPath(_))
        ));
        assert!(WriteBatch::from_json(&json!([1, 2])).is_err());
    }
}
