//! Document update service
//!
//! Brings a user document up to the version of a defaults document:
//! relocate blocks across versions, merge defaults in, stamp the version.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_yaml::Value;
use tracing::{debug, info, instrument, warn};

use crate::application::{ApplicationError, ApplicationResult, PathContextExt};
use crate::config::Settings;
use crate::domain::{
    merge, BlockKind, Document, MergeReport, Path as DocPath, RelocationReport, Relocations, Relocator,
    Version, VersionCatalog,
};
use crate::infrastructure::traits::FileSystem;
use crate::infrastructure::yaml::{emit_document, parse_document_with};

/// Result of updating one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Version the user document was treated as
    pub from: String,
    /// Version the document was stamped with
    pub to: String,
    /// True when the user version was missing or unknown
    pub fallback: bool,
    pub relocation: RelocationReport,
    pub merge: MergeReport,
}

/// Result of updating a file on disk.
#[derive(Debug, Clone)]
pub struct FileUpdate {
    pub outcome: UpdateOutcome,
    /// Leaf paths before the update
    pub before: Vec<DocPath>,
    /// Leaf paths after the update
    pub after: Vec<DocPath>,
    /// Rendered YAML of the updated document
    pub rendered: String,
    /// Destination written, `None` on dry runs
    pub written: Option<PathBuf>,
}

/// Service for relocating and updating versioned documents.
pub struct UpdateService {
    fs: Arc<dyn FileSystem>,
    settings: Arc<Settings>,
}

impl UpdateService {
    /// Create a new update service.
    pub fn new(fs: Arc<dyn FileSystem>, settings: Arc<Settings>) -> Self {
        Self { fs, settings }
    }

    /// Version catalog from the settings.
    pub fn catalog(&self) -> ApplicationResult<VersionCatalog> {
        Ok(self.settings.versioning.catalog()?)
    }

    fn route(&self) -> ApplicationResult<DocPath> {
        Ok(DocPath::parse_with(
            &self.settings.versioning.route,
            self.settings.path_separator,
            self.settings.key_format,
        )?)
    }

    /// Parse a YAML document from disk. A missing file is an empty document.
    #[instrument(level = "debug", skip(self))]
    pub fn load_document(&self, path: &Path) -> ApplicationResult<Document> {
        if !self.fs.exists(path) {
            debug!("document missing, starting empty: {}", path.display());
            return Ok(Document::new());
        }
        let content = self
            .fs
            .read_to_string(path)
            .with_path_context("read document", path)?;
        parse_document_with(&content, self.settings.key_format)
            .with_path_context("parse document", path)
    }

    /// Load a relocation file; the format follows the extension.
    ///
    /// TOML files may nest the version tables under a `relocations` table.
    #[instrument(level = "debug", skip(self))]
    pub fn load_relocations(&self, path: &Path) -> ApplicationResult<Relocations> {
        let content = self
            .fs
            .read_to_string(path)
            .with_path_context("read relocations", path)?;
        let (separator, format) = (self.settings.path_separator, self.settings.key_format);
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        let relocations = match extension.as_deref() {
            Some("toml") => {
                let value = toml::from_str::<toml::Value>(&content)
                    .with_path_context("parse relocations", path)?;
                let table = value.get("relocations").unwrap_or(&value);
                Relocations::from_toml(table, separator, format)?
            }
            Some("yml") | Some("yaml") => {
                let value = serde_yaml::from_str::<Value>(&content)
                    .with_path_context("parse relocations", path)?;
                if value.is_null() {
                    Relocations::new()
                } else {
                    Relocations::from_yaml(&value, separator, format)?
                }
            }
            _ => return Err(ApplicationError::UnsupportedFormat(path.to_path_buf())),
        };
        debug!("loaded {} relocations", relocations.len());
        Ok(relocations)
    }

    /// Version ID stored at the route, if any. Numbers are read as text.
    pub fn document_version(&self, document: &Document) -> ApplicationResult<Option<String>> {
        let route = self.route()?;
        let id = document
            .get(&route)
            .and_then(|node| document.value(node))
            .and_then(|value| match value {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            });
        Ok(id)
    }

    /// Resolve the user's version; absent or unknown IDs fall back to the oldest.
    fn user_version(
        &self,
        document: &Document,
        catalog: &VersionCatalog,
    ) -> ApplicationResult<(Version, bool)> {
        match self.document_version(document)? {
            Some(id) => match catalog.parse(&id) {
                Ok(version) => Ok((version, false)),
                Err(_) => {
                    warn!("unknown document version '{}', assuming {}", id, catalog.first());
                    Ok((catalog.first(), true))
                }
            },
            None => {
                info!("document has no version, assuming {}", catalog.first());
                Ok((catalog.first(), true))
            }
        }
    }

    /// Update `user` in place to the version declared by `defaults`.
    #[instrument(level = "debug", skip_all)]
    pub fn update_document(
        &self,
        user: &mut Document,
        defaults: &Document,
        relocations: &Relocations,
    ) -> ApplicationResult<UpdateOutcome> {
        let catalog = self.catalog()?;
        let route = self.route()?;

        let default_id =
            self.document_version(defaults)?
                .ok_or_else(|| ApplicationError::MissingDefaultVersion {
                    route: self.settings.versioning.route.clone(),
                })?;
        let target = catalog.parse(&default_id)?;
        let (current, fallback) = self.user_version(user, &catalog)?;

        for unknown in relocations.unknown_versions(&catalog) {
            warn!("relocations for unknown version '{}' are ignored", unknown);
        }

        let relocation = match current.compare_to(&target)? {
            Ordering::Greater if !self.settings.updater.enable_downgrading => {
                return Err(ApplicationError::DowngradeNotAllowed {
                    user: current.to_string(),
                    defaults: target.to_string(),
                });
            }
            Ordering::Greater => {
                warn!("downgrading document from {} to {}", current, target);
                RelocationReport::default()
            }
            _ => Relocator::new(relocations).apply(user, &current, &target)?,
        };

        let options = self
            .settings
            .updater
            .merge_options(self.settings.path_separator, self.settings.key_format)?;
        let merged = merge(user, defaults, &options)?;

        stamp_version(user, defaults, &route)?;
        info!(
            "updated {} -> {}: {} moved, {} added, {} removed",
            current, target, relocation.moved, merged.added, merged.removed
        );

        Ok(UpdateOutcome {
            from: current.to_string(),
            to: target.to_string(),
            fallback,
            relocation,
            merge: merged,
        })
    }

    /// Apply relocations between two explicit versions, without merging.
    #[instrument(level = "debug", skip(self, document, relocations))]
    pub fn relocate_document(
        &self,
        document: &mut Document,
        relocations: &Relocations,
        from: &str,
        to: &str,
    ) -> ApplicationResult<RelocationReport> {
        let catalog = self.catalog()?;
        let current = catalog.parse(from)?;
        let target = catalog.parse(to)?;
        Ok(Relocator::new(relocations).apply(document, &current, &target)?)
    }

    /// Update a YAML file against a defaults file.
    ///
    /// Writes to `output`, or back to `user_path` when absent; nothing is
    /// written on a dry run.
    #[instrument(level = "debug", skip(self))]
    pub fn update_file(
        &self,
        user_path: &Path,
        defaults_path: &Path,
        relocations_path: Option<&Path>,
        output: Option<&Path>,
        dry_run: bool,
    ) -> ApplicationResult<FileUpdate> {
        if !self.fs.is_file(defaults_path) {
            return Err(ApplicationError::OperationFailed {
                context: format!("defaults not found: {}", defaults_path.display()),
                source: Box::new(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "file does not exist",
                )),
            });
        }
        let defaults = self.load_document(defaults_path)?;
        let relocations = match relocations_path {
            Some(path) => self.load_relocations(path)?,
            None => Relocations::new(),
        };

        let mut user = self.load_document(user_path)?;
        let before = user.leaf_paths();
        let outcome = self.update_document(&mut user, &defaults, &relocations)?;
        let after = user.leaf_paths();
        let rendered = emit_document(&user).with_path_context("render document", user_path)?;

        let written = if dry_run {
            debug!("dry run, not writing");
            None
        } else {
            let destination = output.unwrap_or(user_path);
            self.write(destination, &rendered)?;
            Some(destination.to_path_buf())
        };

        Ok(FileUpdate {
            outcome,
            before,
            after,
            rendered,
            written,
        })
    }

    /// Write rendered YAML, creating parent directories.
    pub fn write(&self, path: &Path, content: &str) -> ApplicationResult<()> {
        self.fs
            .ensure_parent(path)
            .with_path_context("create parent directory", path)?;
        self.fs
            .write(path, content)
            .with_path_context("write document", path)
    }
}

/// Copy the defaults' version value into `user`, keeping the comments of an
/// existing version block.
fn stamp_version(user: &mut Document, defaults: &Document, route: &DocPath) -> ApplicationResult<()> {
    let Some(value) = defaults
        .get(route)
        .and_then(|node| defaults.value(node))
        .cloned()
    else {
        return Ok(());
    };
    if let Some(node) = user.get(route).filter(|node| !user.is_section(*node)) {
        if let Some(block) = user.block_mut(node) {
            block.kind = BlockKind::Mapping(value);
        }
        return Ok(());
    }
    let node = user.new_value(value);
    user.set_path(route, node)?;
    Ok(())
}
