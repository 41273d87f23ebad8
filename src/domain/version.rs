//! Schema versions drawn from a declared, ordered catalog.
//!
//! A catalog is either listed explicitly (`["1", "2", "3"]`) or described by
//! a [`Pattern`] of segments that expands into the ordered cartesian product
//! (`1..=2` and `0..=1` joined by `.` gives `1.0, 1.1, 2.0, 2.1`).

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::domain::error::{DomainError, DomainResult};

/// One component of a versioning pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Segment {
    /// Inclusive integer range.
    Range { start: u32, end: u32 },
    /// Explicit ordered values.
    Literal(Vec<String>),
}

impl Segment {
    pub fn range(start: u32, end: u32) -> Self {
        Segment::Range { start, end }
    }

    pub fn literal<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Segment::Literal(values.into_iter().map(Into::into).collect())
    }

    fn values(&self) -> Vec<String> {
        match self {
            Segment::Range { start, end } => (*start..=*end).map(|v| v.to_string()).collect(),
            Segment::Literal(values) => values.clone(),
        }
    }
}

/// Segments joined by a separator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    pub segments: Vec<Segment>,
    pub separator: String,
}

impl Pattern {
    pub fn new(segments: Vec<Segment>, separator: impl Into<String>) -> Self {
        Self {
            segments,
            separator: separator.into(),
        }
    }

    /// Expand to the ordered list of IDs; the first segment is most significant.
    pub fn expand(&self) -> Vec<String> {
        let mut ids: Vec<String> = vec![String::new()];
        for (i, segment) in self.segments.iter().enumerate() {
            let values = segment.values();
            let mut next = Vec::with_capacity(ids.len() * values.len());
            for prefix in &ids {
                for value in &values {
                    if i == 0 {
                        next.push(value.clone());
                    } else {
                        next.push(format!("{prefix}{}{value}", self.separator));
                    }
                }
            }
            ids = next;
        }
        if self.segments.is_empty() {
            ids.clear();
        }
        ids
    }
}

#[derive(Debug)]
struct CatalogInner {
    ids: Vec<String>,
    positions: HashMap<String, usize>,
}

/// Ordered set of valid version IDs, shared by every [`Version`] parsed from it.
#[derive(Debug, Clone)]
pub struct VersionCatalog {
    inner: Arc<CatalogInner>,
}

impl VersionCatalog {
    pub fn new<I, S>(ids: I) -> DomainResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: Vec<String> = ids.into_iter().map(Into::into).collect();
        if ids.is_empty() {
            return Err(DomainError::EmptyCatalog);
        }
        let mut positions = HashMap::with_capacity(ids.len());
        for (i, id) in ids.iter().enumerate() {
            if positions.insert(id.clone(), i).is_some() {
                return Err(DomainError::DuplicateVersion(id.clone()));
            }
        }
        Ok(Self {
            inner: Arc::new(CatalogInner { ids, positions }),
        })
    }

    pub fn from_pattern(pattern: &Pattern) -> DomainResult<Self> {
        Self::new(pattern.expand())
    }

    /// Parse a raw ID; fails when it is not a catalog member.
    #[instrument(level = "trace", skip(self))]
    pub fn parse(&self, id: &str) -> DomainResult<Version> {
        let index = self
            .inner
            .positions
            .get(id)
            .copied()
            .ok_or_else(|| DomainError::UnknownVersion(id.to_string()))?;
        Ok(Version {
            catalog: self.clone(),
            index,
        })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.positions.contains_key(id)
    }

    /// Oldest version.
    pub fn first(&self) -> Version {
        Version {
            catalog: self.clone(),
            index: 0,
        }
    }

    /// Newest version.
    pub fn last(&self) -> Version {
        Version {
            catalog: self.clone(),
            index: self.inner.ids.len() - 1,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.ids.is_empty()
    }

    pub fn ids(&self) -> &[String] {
        &self.inner.ids
    }

    fn same(&self, other: &VersionCatalog) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Position within a [`VersionCatalog`].
///
/// `Clone` is the independent copy: advancing a clone leaves the original
/// where it was.
#[derive(Debug, Clone)]
pub struct Version {
    catalog: VersionCatalog,
    index: usize,
}

impl Version {
    /// Exact catalog string, used as the relocation lookup key.
    pub fn as_id(&self) -> &str {
        &self.catalog.inner.ids[self.index]
    }

    pub fn catalog(&self) -> &VersionCatalog {
        &self.catalog
    }

    pub fn has_next(&self) -> bool {
        self.index + 1 < self.catalog.len()
    }

    /// Advance to the following catalog entry.
    pub fn next(&mut self) -> DomainResult<()> {
        if !self.has_next() {
            return Err(DomainError::VersionOverflow(self.as_id().to_string()));
        }
        self.index += 1;
        Ok(())
    }

    pub fn copy(&self) -> Version {
        self.clone()
    }

    /// Order by catalog position; versions of different catalogs do not compare.
    pub fn compare_to(&self, other: &Version) -> DomainResult<Ordering> {
        if !self.catalog.same(&other.catalog) {
            return Err(DomainError::CatalogMismatch {
                left: self.as_id().to_string(),
                right: other.as_id().to_string(),
            });
        }
        Ok(self.index.cmp(&other.index))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.catalog.same(&other.catalog) && self.index == other.index
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.compare_to(other).ok()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> VersionCatalog {
        VersionCatalog::new(["1", "2", "3", "4"]).unwrap()
    }

    #[test]
    fn given_first_version_when_advancing_len_minus_one_times_then_reaches_last() {
        let catalog = catalog();
        let mut v = catalog.first();
        for _ in 0..catalog.len() - 1 {
            v.next().unwrap();
        }
        assert_eq!(v, catalog.last());
        assert!(!v.has_next());
        assert_eq!(v.next(), Err(DomainError::VersionOverflow("4".into())));
    }

    #[test]
    fn given_version_when_compared_to_itself_then_equal() {
        let v = catalog().parse("2").unwrap();
        assert_eq!(v.compare_to(&v).unwrap(), Ordering::Equal);
        assert!(v < catalog_parse_same(&v, "3"));
    }

    fn catalog_parse_same(v: &Version, id: &str) -> Version {
        v.catalog().parse(id).unwrap()
    }

    #[test]
    fn given_ids_when_parsed_then_as_id_roundtrips() {
        let catalog = catalog();
        for id in catalog.ids() {
            assert_eq!(catalog.parse(id).unwrap().as_id(), id);
        }
    }

    #[test]
    fn given_unknown_id_when_parsed_then_error() {
        assert_eq!(
            catalog().parse("1.5").unwrap_err(),
            DomainError::UnknownVersion("1.5".into())
        );
    }

    #[test]
    fn given_copy_when_advanced_then_original_unchanged() {
        let original = catalog().first();
        let mut copy = original.copy();
        copy.next().unwrap();
        assert_eq!(original.as_id(), "1");
        assert_eq!(copy.as_id(), "2");
    }

    #[test]
    fn given_versions_from_distinct_catalogs_when_compared_then_mismatch() {
        let a = catalog().first();
        let b = catalog().first();
        assert!(matches!(
            a.compare_to(&b),
            Err(DomainError::CatalogMismatch { .. })
        ));
        assert_ne!(a, b);
    }

    #[test]
    fn given_pattern_when_expanded_then_cartesian_product_in_order() {
        let pattern = Pattern::new(
            vec![Segment::range(1, 2), Segment::literal(["0", "5"])],
            ".",
        );
        assert_eq!(pattern.expand(), vec!["1.0", "1.5", "2.0", "2.5"]);
        let catalog = VersionCatalog::from_pattern(&pattern).unwrap();
        assert_eq!(catalog.last().as_id(), "2.5");
    }

    #[test]
    fn given_invalid_catalogs_when_created_then_error() {
        let empty: Vec<String> = vec![];
        assert_eq!(VersionCatalog::new(empty).unwrap_err(), DomainError::EmptyCatalog);
        assert_eq!(
            VersionCatalog::new(["1", "1"]).unwrap_err(),
            DomainError::DuplicateVersion("1".into())
        );
        assert_eq!(
            VersionCatalog::from_pattern(&Pattern::new(vec![], ".")).unwrap_err(),
            DomainError::EmptyCatalog
        );
    }
}
