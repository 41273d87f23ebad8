//! Immutable key sequences addressing blocks in a document tree.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::error::{DomainError, DomainResult};

/// Default separator used for the textual form of a path.
pub const DEFAULT_SEPARATOR: char = '.';

/// A single key inside a section.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Str(String),
    Int(i64),
}

impl Key {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Key::Str(s) => Some(s),
            Key::Int(_) => None,
        }
    }
}

/// How textual path segments and document keys are typed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyFormat {
    /// Canonical integer segments become [`Key::Int`], as YAML types them.
    #[default]
    Native,
    /// Every key is a string, including integer scalars in documents.
    String,
}

impl KeyFormat {
    /// Key for one textual segment.
    pub fn key(self, segment: &str) -> Key {
        match self {
            KeyFormat::Native => match segment.parse::<i64>() {
                Ok(i) if i.to_string() == segment => Key::Int(i),
                _ => Key::from(segment),
            },
            KeyFormat::String => Key::from(segment),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Str(s) => f.write_str(s),
            Key::Int(i) => write!(f, "{i}"),
        }
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Str(value.to_string())
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key::Str(value)
    }
}

impl From<&String> for Key {
    fn from(value: &String) -> Self {
        Key::Str(value.clone())
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Key::Int(value)
    }
}

/// Ordered, non-empty, immutable sequence of keys.
///
/// Equality and hashing depend on the keys only, so a path built from a
/// single key equals one parsed from text with the same content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path {
    keys: Vec<Key>,
}

impl Path {
    /// Build a path from one or more keys.
    pub fn new<I, K>(keys: I) -> DomainResult<Self>
    where
        I: IntoIterator<Item = K>,
        K: Into<Key>,
    {
        let keys: Vec<Key> = keys.into_iter().map(Into::into).collect();
        if keys.is_empty() {
            return Err(DomainError::EmptyPath);
        }
        Ok(Self { keys })
    }

    /// Path consisting of exactly one key.
    pub fn single(key: impl Into<Key>) -> Self {
        Self {
            keys: vec![key.into()],
        }
    }

    /// Parse a separated textual path, e.g. `server.port`.
    ///
    /// Every segment becomes a string key; empty segments are kept as empty
    /// string keys so that `a..b` addresses `["a", "", "b"]`.
    pub fn parse(text: &str, separator: char) -> DomainResult<Self> {
        if text.is_empty() {
            return Err(DomainError::EmptyPath);
        }
        Self::new(text.split(separator))
    }

    /// Parse a separated textual path, typing each segment per `format`.
    pub fn parse_with(text: &str, separator: char, format: KeyFormat) -> DomainResult<Self> {
        if text.is_empty() {
            return Err(DomainError::EmptyPath);
        }
        Self::new(text.split(separator).map(|segment| format.key(segment)))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn get(&self, index: usize) -> DomainResult<&Key> {
        self.keys
            .get(index)
            .ok_or(DomainError::PathIndexOutOfBounds {
                index,
                len: self.keys.len(),
            })
    }

    /// Terminal key.
    pub fn last(&self) -> &Key {
        // non-empty by construction
        &self.keys[self.keys.len() - 1]
    }

    /// Path with the terminal key removed.
    pub fn parent(&self) -> DomainResult<Self> {
        if self.keys.len() == 1 {
            return Err(DomainError::RootHasNoParent(self.to_string()));
        }
        Ok(Self {
            keys: self.keys[..self.keys.len() - 1].to_vec(),
        })
    }

    /// New path with `key` appended; the receiver is untouched.
    pub fn add(&self, key: impl Into<Key>) -> Self {
        let mut keys = Vec::with_capacity(self.keys.len() + 1);
        keys.extend(self.keys.iter().cloned());
        keys.push(key.into());
        Self { keys }
    }

    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Key> {
        self.keys.iter()
    }

    /// True when `self` is `other` or one of its descendants.
    pub fn starts_with(&self, other: &Path) -> bool {
        self.keys.starts_with(&other.keys)
    }

    pub fn to_string_with(&self, separator: char) -> String {
        let mut out = String::new();
        for (i, key) in self.keys.iter().enumerate() {
            if i > 0 {
                out.push(separator);
            }
            out.push_str(&key.to_string());
        }
        out
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_with(DEFAULT_SEPARATOR))
    }
}

impl FromStr for Path {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s, DEFAULT_SEPARATOR)
    }
}

impl<'a> IntoIterator for &'a Path {
    type Item = &'a Key;
    type IntoIter = std::slice::Iter<'a, Key>;

    fn into_iter(self) -> Self::IntoIter {
        self.keys.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    fn hash_of(path: &Path) -> u64 {
        let mut hasher = DefaultHasher::new();
        path.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn given_single_and_multi_construction_when_compared_then_equal() {
        let single = Path::single("a");
        let multi = Path::new(["a"]).unwrap();
        let parsed: Path = "a".parse().unwrap();
        assert_eq!(single, multi);
        assert_eq!(single, parsed);
        assert_eq!(hash_of(&single), hash_of(&parsed));
    }

    #[test]
    fn given_path_when_add_then_parent_roundtrips() {
        let p = Path::parse("server.http", '.').unwrap();
        let child = p.add("port");
        assert_eq!(child.len(), 3);
        assert_eq!(p.len(), 2, "add must not mutate the receiver");
        assert_eq!(child.parent().unwrap(), p);
    }

    #[test]
    fn given_root_length_path_when_parent_then_error() {
        let p = Path::single("root");
        assert!(matches!(p.parent(), Err(DomainError::RootHasNoParent(_))));
    }

    #[test]
    fn given_out_of_range_index_when_get_then_error() {
        let p = Path::parse("a.b", '.').unwrap();
        assert_eq!(p.get(1).unwrap(), &Key::from("b"));
        assert_eq!(
            p.get(2),
            Err(DomainError::PathIndexOutOfBounds { index: 2, len: 2 })
        );
    }

    #[test]
    fn given_no_keys_when_new_then_error() {
        let keys: Vec<&str> = vec![];
        assert_eq!(Path::new(keys), Err(DomainError::EmptyPath));
        assert_eq!(Path::parse("", '.'), Err(DomainError::EmptyPath));
    }

    #[test]
    fn given_mixed_keys_when_displayed_then_joined_with_separator() {
        let p = Path::new([Key::from("list"), Key::from(3i64)]).unwrap();
        assert_eq!(p.to_string(), "list.3");
        assert_eq!(p.to_string_with('/'), "list/3");
        // plain text parsing never produces integer keys
        assert_ne!(p, Path::parse("list.3", '.').unwrap());
    }

    #[test]
    fn given_native_format_when_parsing_then_canonical_integers_typed() {
        let p = Path::parse_with("ports.80", '.', KeyFormat::Native).unwrap();
        assert_eq!(p, Path::new([Key::from("ports"), Key::from(80i64)]).unwrap());

        let padded = Path::parse_with("ports.080.-1", '.', KeyFormat::Native).unwrap();
        assert_eq!(padded.get(1).unwrap(), &Key::from("080"));
        assert_eq!(padded.get(2).unwrap(), &Key::Int(-1));

        let strings = Path::parse_with("ports.80", '.', KeyFormat::String).unwrap();
        assert_eq!(strings, Path::parse("ports.80", '.').unwrap());
    }

    #[test]
    fn given_prefix_when_starts_with_then_true() {
        let p = Path::parse("a.b.c", '.').unwrap();
        assert!(p.starts_with(&Path::parse("a.b", '.').unwrap()));
        assert!(!p.starts_with(&Path::single("b")));
    }
}
