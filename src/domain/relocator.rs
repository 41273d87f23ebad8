//! Versioned relocation of blocks inside a document.
//!
//! Relocations are declared per version ID as `old path -> new path` pairs.
//! Upgrading from version `u` to `t` applies the instructions of every
//! version in `(u, t]`, in catalog order.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

use indexmap::IndexMap;
use tracing::{debug, instrument, trace};

use crate::domain::document::{Block, Document, NodeId};
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::path::{KeyFormat, Path};
use crate::domain::version::{Version, VersionCatalog};

/// Instructions of one version, in declaration order.
pub type VersionRelocations = IndexMap<Path, Path>;

/// Relocation instruction set keyed by canonical version ID.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Relocations {
    by_version: BTreeMap<String, VersionRelocations>,
}

/// Shape-checked but not yet parsed entries of one version.
type RawVersion = (String, Result<Vec<(String, String)>, String>);

impl Relocations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one instruction; returns the destination it replaced, if any.
    pub fn insert(&mut self, version: impl Into<String>, from: Path, to: Path) -> Option<Path> {
        self.by_version
            .entry(version.into())
            .or_default()
            .insert(from, to)
    }

    pub fn for_version(&self, id: &str) -> Option<&VersionRelocations> {
        self.by_version.get(id)
    }

    pub fn versions(&self) -> impl Iterator<Item = &str> {
        self.by_version.keys().map(String::as_str)
    }

    /// Total number of instructions over all versions.
    pub fn len(&self) -> usize {
        self.by_version.values().map(IndexMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Version IDs that the catalog does not know; they are never applied.
    pub fn unknown_versions(&self, catalog: &VersionCatalog) -> Vec<String> {
        self.by_version
            .keys()
            .filter(|id| !catalog.contains(id))
            .cloned()
            .collect()
    }

    /// Build from a TOML table `{ version = { "old.path" = "new.path" } }`.
    pub fn from_toml(value: &toml::Value, separator: char, format: KeyFormat) -> DomainResult<Self> {
        let table = value
            .as_table()
            .ok_or_else(|| invalid("*", "relocations must be a table keyed by version"))?;
        let raw: Vec<RawVersion> = table
            .iter()
            .map(|(version, entries)| {
                let parsed: Result<Vec<(String, String)>, String> = match entries.as_table() {
                    Some(entries) => entries
                        .iter()
                        .map(|(from, to)| match to.as_str() {
                            Some(to) => Ok((from.clone(), to.to_string())),
                            None => Err(format!("destination of '{from}' is not a string")),
                        })
                        .collect(),
                    None => Err("value is not a table of paths".to_string()),
                };
                (version.clone(), parsed)
            })
            .collect();
        Self::from_raw(raw, separator, format)
    }

    /// Build from a YAML mapping. Version keys may be written as numbers.
    pub fn from_yaml(
        value: &serde_yaml::Value,
        separator: char,
        format: KeyFormat,
    ) -> DomainResult<Self> {
        let mapping = value
            .as_mapping()
            .ok_or_else(|| invalid("*", "relocations must be a mapping keyed by version"))?;
        let mut raw = Vec::with_capacity(mapping.len());
        for (version, entries) in mapping {
            let version = yaml_key(version).ok_or_else(|| {
                invalid(&format!("{version:?}"), "version key must be a scalar")
            })?;
            let parsed: Result<Vec<(String, String)>, String> = match entries.as_mapping() {
                Some(entries) => entries
                    .iter()
                    .map(|(from, to)| match (yaml_key(from), to.as_str()) {
                        (Some(from), Some(to)) => Ok((from, to.to_string())),
                        _ => Err(format!("entry {from:?} -> {to:?} is not a path pair")),
                    })
                    .collect(),
                None => Err("value is not a mapping of paths".to_string()),
            };
            raw.push((version, parsed));
        }
        Self::from_raw(raw, separator, format)
    }

    fn from_raw(raw: Vec<RawVersion>, separator: char, format: KeyFormat) -> DomainResult<Self> {
        let mut relocations = Self::new();
        for (version, entries) in raw {
            let entries = entries.map_err(|reason| invalid(&version, &reason))?;
            let map = relocations.by_version.entry(version.clone()).or_default();
            for (from, to) in entries {
                let from = Path::parse_with(&from, separator, format)
                    .map_err(|e| invalid(&version, &format!("'{from}': {e}")))?;
                let to = Path::parse_with(&to, separator, format)
                    .map_err(|e| invalid(&version, &format!("'{to}': {e}")))?;
                map.insert(from, to);
            }
        }
        Ok(relocations)
    }
}

fn yaml_key(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn invalid(version: &str, reason: &str) -> DomainError {
    DomainError::InvalidRelocations {
        version: version.to_string(),
        reason: reason.to_string(),
    }
}

/// Outcome counters of one relocation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelocationReport {
    /// Version IDs whose instructions were applied, ascending.
    pub versions: Vec<String>,
    /// Blocks placed at a new path.
    pub moved: usize,
    /// Instructions whose source did not exist.
    pub skipped: usize,
}

/// Applies a [`Relocations`] set to a document.
#[derive(Debug)]
pub struct Relocator<'a> {
    relocations: &'a Relocations,
}

impl<'a> Relocator<'a> {
    pub fn new(relocations: &'a Relocations) -> Self {
        Self { relocations }
    }

    /// Apply every version in `(current, target]` to `document` in place.
    #[instrument(level = "debug", skip(self, document, current, target), fields(current = %current, target = %target))]
    pub fn apply(
        &self,
        document: &mut Document,
        current: &Version,
        target: &Version,
    ) -> DomainResult<RelocationReport> {
        let mut report = RelocationReport::default();
        if current.compare_to(target)? != Ordering::Less {
            debug!("document already at or past target, nothing to relocate");
            return Ok(report);
        }

        let mut version = current.copy();
        version.next()?;
        loop {
            match self.relocations.for_version(version.as_id()) {
                Some(map) if !map.is_empty() => {
                    debug!(version = version.as_id(), entries = map.len(), "applying relocations");
                    report.versions.push(version.as_id().to_string());
                    apply_version(document, map.clone(), &mut report)?;
                }
                _ => trace!(version = version.as_id(), "no relocations"),
            }
            if version.compare_to(target)? != Ordering::Less {
                break;
            }
            version.next()?;
        }
        debug!(moved = report.moved, skipped = report.skipped, "relocation finished");
        Ok(report)
    }
}

/// Working set of one version: the instructions not yet resolved, plus a
/// count of how many of them target each destination.
#[derive(Debug)]
struct Pending {
    entries: VersionRelocations,
    declared: VersionRelocations,
    destinations: HashMap<Path, usize>,
}

impl Pending {
    fn new(entries: VersionRelocations) -> Self {
        let mut destinations: HashMap<Path, usize> = HashMap::with_capacity(entries.len());
        for to in entries.values() {
            *destinations.entry(to.clone()).or_default() += 1;
        }
        Self {
            declared: entries.clone(),
            entries,
            destinations,
        }
    }

    /// Consume the entry at `from`, returning its destination.
    fn remove(&mut self, from: &Path) -> Option<Path> {
        let to = self.entries.shift_remove(from)?;
        if let Some(count) = self.destinations.get_mut(&to) {
            *count -= 1;
            if *count == 0 {
                self.destinations.remove(&to);
            }
        }
        Some(to)
    }

    /// Chain heads first: an entry whose source is still the destination of
    /// another pending entry waits for that value to arrive. Pure cycles
    /// have no head and fall back to declaration order.
    fn next_entry(&self) -> Option<Path> {
        self.entries
            .keys()
            .find(|from| !self.destinations.contains_key(*from))
            .or_else(|| self.entries.keys().next())
            .cloned()
    }

    /// True when the declared instructions lead from `start` back to one of
    /// `sources`, consumed or not.
    fn closes_cycle(&self, start: &Path, sources: &HashSet<Path>) -> bool {
        let mut current = start;
        for _ in 0..self.declared.len() {
            match self.declared.get(current) {
                Some(next) if sources.contains(next) => return true,
                Some(next) => current = next,
                None => return false,
            }
        }
        false
    }
}

/// Process one version's instructions. Every entry is consumed exactly once.
fn apply_version(
    document: &mut Document,
    entries: VersionRelocations,
    report: &mut RelocationReport,
) -> DomainResult<()> {
    let mut pending = Pending::new(entries);
    while let Some(from) = pending.next_entry() {
        if let Some(to) = pending.remove(&from) {
            relocate(document, from, to, &mut pending, report)?;
        }
    }
    Ok(())
}

/// Move the block at `from` to `to`, first moving whatever occupies `to`
/// when that block is itself scheduled to leave.
///
/// Entries are removed from `pending` the moment their resolution starts;
/// the detached blocks on `in_progress` are placed deepest first. An empty
/// destination keeps its own entry pending so chains carry the value on,
/// unless that entry belongs to a cycle through this walk's sources: the
/// value then stops one step round, as the occupant of a swap would.
fn relocate(
    document: &mut Document,
    from: Path,
    to: Path,
    pending: &mut Pending,
    report: &mut RelocationReport,
) -> DomainResult<()> {
    let mut in_progress: Vec<(NodeId, Path)> = Vec::new();
    let mut sources: HashSet<Path> = HashSet::new();
    let (mut from, mut to) = (from, to);

    loop {
        sources.insert(from.clone());
        let Some(node) = take(document, &from) else {
            if in_progress.is_empty() {
                trace!(%from, "source absent, skipping");
                report.skipped += 1;
            }
            break;
        };
        in_progress.push((node, to.clone()));

        if document.get(&to).is_none() {
            if pending.closes_cycle(&to, &sources) && pending.remove(&to).is_some() {
                trace!(%to, "destination empty inside a cycle, not carried further");
            }
            break;
        }
        match pending.remove(&to) {
            Some(next) => {
                trace!(blocking = %to, next = %next, "resolving destination first");
                from = std::mem::replace(&mut to, next);
            }
            None => break,
        }
    }

    for (node, to) in in_progress.into_iter().rev() {
        trace!(%to, "placing block");
        document.set_path(&to, node)?;
        report.moved += 1;
    }
    Ok(())
}

/// Detach the block at `path` and prune ancestors left empty.
fn take(document: &mut Document, path: &Path) -> Option<NodeId> {
    let parent = document.get_parent(path)?;
    let node = document.remove(parent, path.last())?;
    prune(document, parent);
    Some(node)
}

/// Remove empty sections upwards from `section`; the root always stays.
fn prune(document: &mut Document, mut section: NodeId) {
    while section != document.root() && document.is_empty_section(section, false) {
        let parent = document.block(section).and_then(Block::parent);
        document.discard(section);
        match parent {
            Some(parent) => section = parent,
            None => break,
        }
    }
}
