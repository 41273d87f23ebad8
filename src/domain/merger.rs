//! Structural copy of a defaults document into a user document.
//!
//! Runs after relocation: user values win, missing defaults are copied in
//! with their comments, and keys unknown to the defaults are dropped unless
//! kept by the options.

use tracing::{debug, instrument, trace};

use crate::domain::document::{Document, NodeId};
use crate::domain::error::DomainResult;
use crate::domain::path::{Key, Path};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOptions {
    /// Keep user keys that the defaults do not declare.
    pub keep_all: bool,
    /// Subtrees taken from the user document verbatim.
    pub ignored_paths: Vec<Path>,
}

impl MergeOptions {
    fn is_ignored(&self, path: &Path) -> bool {
        self.ignored_paths.iter().any(|ignored| path.starts_with(ignored))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub added: usize,
    pub replaced: usize,
    pub removed: usize,
}

/// Merge `defaults` into `user` in place.
#[instrument(level = "debug", skip_all)]
pub fn merge(
    user: &mut Document,
    defaults: &Document,
    options: &MergeOptions,
) -> DomainResult<MergeReport> {
    let mut report = MergeReport::default();
    let root = user.root();
    merge_section(
        user,
        root,
        defaults,
        defaults.root(),
        None,
        options,
        &mut report,
    )?;
    debug!(?report, "merge finished");
    Ok(report)
}

fn child_path(prefix: Option<&Path>, key: &Key) -> Path {
    match prefix {
        Some(prefix) => prefix.add(key.clone()),
        None => Path::single(key.clone()),
    }
}

fn merge_section(
    user: &mut Document,
    user_section: NodeId,
    defaults: &Document,
    default_section: NodeId,
    prefix: Option<&Path>,
    options: &MergeOptions,
    report: &mut MergeReport,
) -> DomainResult<()> {
    let default_keys = defaults.keys(default_section);

    for key in &default_keys {
        let Some(default_child) = defaults.get_block_safe(default_section, key) else {
            continue;
        };
        let path = child_path(prefix, key);
        match user.get_block_safe(user_section, key) {
            None => {
                trace!(%path, "adding default");
                copy_into(user, user_section, key, defaults, default_child)?;
                report.added += 1;
            }
            Some(_) if options.is_ignored(&path) => trace!(%path, "ignored"),
            Some(user_child) => {
                let user_is_section = user.is_section(user_child);
                if user_is_section != defaults.is_section(default_child) {
                    trace!(%path, "shape changed, replacing with default");
                    copy_into(user, user_section, key, defaults, default_child)?;
                    report.replaced += 1;
                    continue;
                }
                if user_is_section {
                    merge_section(
                        user,
                        user_child,
                        defaults,
                        default_child,
                        Some(&path),
                        options,
                        report,
                    )?;
                }
                fill_comments(user, user_child, defaults, default_child);
            }
        }
    }

    if !options.keep_all {
        for key in user.keys(user_section) {
            if default_keys.contains(&key) || options.is_ignored(&child_path(prefix, &key)) {
                continue;
            }
            if let Some(stale) = user.remove(user_section, &key) {
                trace!(%key, "dropping key unknown to defaults");
                user.discard(stale);
                report.removed += 1;
            }
        }
    }

    user.reorder(user_section, &default_keys)
}

fn copy_into(
    user: &mut Document,
    user_section: NodeId,
    key: &Key,
    defaults: &Document,
    default_child: NodeId,
) -> DomainResult<()> {
    if let Some(copy) = user.deep_copy_from(defaults, default_child) {
        user.set(user_section, key.clone(), copy)?;
    }
    Ok(())
}

/// User comments win; a block without any comments takes the defaults'.
fn fill_comments(user: &mut Document, user_child: NodeId, defaults: &Document, default_child: NodeId) {
    let Some(default_comments) = defaults.comments(default_child) else {
        return;
    };
    if let Some(comments) = user.comments_mut(user_child) {
        if comments.is_empty() {
            *comments = default_comments.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::comment::{CommentLine, NodeRole, Position};
    use serde_yaml::Value;

    fn p(text: &str) -> Path {
        Path::parse(text, '.').unwrap()
    }

    fn defaults() -> Document {
        let mut doc = Document::new();
        let root = doc.root();
        doc.insert_value(root, "name", "default").unwrap();
        let server = doc.insert_section(root, "server").unwrap();
        let port = doc.insert_value(server, "port", 80).unwrap();
        doc.comments_mut(port).unwrap().set(
            NodeRole::Key,
            Position::Before,
            vec![CommentLine::block(" listening port")],
        );
        doc.insert_value(server, "host", "localhost").unwrap();
        doc
    }

    #[test]
    fn given_partial_user_when_merged_then_missing_defaults_added_and_values_kept() {
        let mut user = Document::new();
        let server = user.insert_section(user.root(), "server").unwrap();
        user.insert_value(server, "port", 8080).unwrap();

        let report = merge(&mut user, &defaults(), &MergeOptions::default()).unwrap();

        assert_eq!(report.added, 2);
        let port = user.get(&p("server.port")).unwrap();
        assert_eq!(user.value(port), Some(&Value::from(8080)));
        assert!(
            user.comments(port).unwrap().get(NodeRole::Key, Position::Before).is_some(),
            "comment-less user block takes default comments"
        );
        assert_eq!(
            user.value(user.get(&p("server.host")).unwrap()),
            Some(&Value::from("localhost"))
        );
        assert_eq!(user.keys(user.root()), vec![Key::from("name"), Key::from("server")]);
    }

    #[test]
    fn given_unknown_user_keys_when_merged_then_removed_unless_kept() {
        let mut user = Document::new();
        user.insert_value(user.root(), "legacy", 1).unwrap();
        user.insert_value(user.root(), "custom", 2).unwrap();

        let options = MergeOptions {
            keep_all: false,
            ignored_paths: vec![p("custom")],
        };
        let report = merge(&mut user, &defaults(), &options).unwrap();

        assert_eq!(report.removed, 1);
        assert!(user.get(&p("legacy")).is_none());
        assert!(user.get(&p("custom")).is_some());
        assert_eq!(user.keys(user.root()).last(), Some(&Key::from("custom")));

        let mut kept = Document::new();
        kept.insert_value(kept.root(), "legacy", 1).unwrap();
        let options = MergeOptions {
            keep_all: true,
            ..MergeOptions::default()
        };
        merge(&mut kept, &defaults(), &options).unwrap();
        assert!(kept.get(&p("legacy")).is_some());
    }

    #[test]
    fn given_shape_mismatch_when_merged_then_default_replaces_user_block() {
        let mut user = Document::new();
        user.insert_value(user.root(), "server", "flat").unwrap();

        let report = merge(&mut user, &defaults(), &MergeOptions::default()).unwrap();

        assert_eq!(report.replaced, 1);
        assert!(user.is_section(user.get(&p("server")).unwrap()));
        assert!(user.get(&p("server.port")).is_some());
    }
}
