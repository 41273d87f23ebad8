//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/cfgshift/cfgshift.toml`
//! 3. Local config: `<project_dir>/.cfgshift.toml`
//! 4. Environment variables: `CFGSHIFT_*` prefix

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::application::ApplicationError;
use crate::domain::{
    DomainResult, KeyFormat, MergeOptions, Path as DocPath, Pattern, Segment, VersionCatalog,
};

/// How document versions are declared and where they are stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct VersioningSettings {
    /// Path of the version value inside documents
    pub route: String,
    /// Explicit catalog, oldest first (takes precedence over `segments`)
    pub versions: Vec<String>,
    /// Pattern segments expanded into the catalog when `versions` is empty
    pub segments: Vec<Segment>,
    /// Separator between expanded segments
    pub separator: String,
}

impl Default for VersioningSettings {
    fn default() -> Self {
        Self {
            route: "config-version".into(),
            versions: vec![],
            segments: vec![Segment::range(1, 100)],
            separator: ".".into(),
        }
    }
}

impl VersioningSettings {
    /// Build the version catalog described by these settings.
    pub fn catalog(&self) -> DomainResult<VersionCatalog> {
        if self.versions.is_empty() {
            VersionCatalog::from_pattern(&Pattern::new(
                self.segments.clone(),
                self.separator.clone(),
            ))
        } else {
            VersionCatalog::new(self.versions.iter().cloned())
        }
    }
}

/// Merge behaviour after relocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct UpdaterSettings {
    /// Keep user keys the defaults do not declare
    pub keep_all: bool,
    /// Accept documents newer than the defaults (skips relocation)
    pub enable_downgrading: bool,
    /// Paths copied from the user document verbatim
    pub ignored_paths: Vec<String>,
}

/// Raw versioning config for intermediate parsing.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawVersioningSettings {
    pub route: Option<String>,
    pub versions: Option<Vec<String>>,
    pub segments: Option<Vec<Segment>>,
    pub separator: Option<String>,
}

/// Raw updater config for intermediate parsing (arrays are Option to detect "not specified").
///
/// Used during layered config merging to distinguish between:
/// - `None` → field not specified, inherit from base
/// - `Some([])` → explicit empty array
/// - `Some([...])` → explicit values to merge
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawUpdaterSettings {
    pub keep_all: Option<bool>,
    pub enable_downgrading: Option<bool>,
    pub ignored_paths: Option<Vec<String>>,
}

/// Raw settings for intermediate parsing.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub path_separator: Option<char>,
    pub key_format: Option<KeyFormat>,
    pub relocations: Option<PathBuf>,
    pub versioning: RawVersioningSettings,
    pub updater: RawUpdaterSettings,
}

impl UpdaterSettings {
    /// Merge arrays with union semantics and negation support.
    ///
    /// - Items from overlay are added to base
    /// - Items prefixed with `!` remove the corresponding item from the result
    /// - Duplicates are de-duplicated
    ///
    /// # Examples
    /// ```ignore
    /// merge_array(&["a", "b"], &["c"])       // → ["a", "b", "c"]
    /// merge_array(&["a", "b"], &["!a", "c"]) // → ["b", "c"]
    /// ```
    pub fn merge_array(base: &[String], overlay: &[String]) -> Vec<String> {
        let mut result: HashSet<String> = base.iter().cloned().collect();

        for pattern in overlay {
            if let Some(negated) = pattern.strip_prefix('!') {
                result.remove(negated);
            } else {
                result.insert(pattern.clone());
            }
        }

        // Convert to sorted Vec for deterministic output
        let mut vec: Vec<String> = result.into_iter().collect();
        vec.sort();
        vec
    }

    /// Merge overlay config onto self (base): scalars replace, ignored paths union.
    pub fn merge(&self, overlay: &RawUpdaterSettings) -> Self {
        Self {
            keep_all: overlay.keep_all.unwrap_or(self.keep_all),
            enable_downgrading: overlay
                .enable_downgrading
                .unwrap_or(self.enable_downgrading),
            ignored_paths: overlay
                .ignored_paths
                .as_ref()
                .map(|o| Self::merge_array(&self.ignored_paths, o))
                .unwrap_or_else(|| self.ignored_paths.clone()),
        }
    }

    /// Apply global config onto defaults: arrays are REPLACED, not merged.
    pub fn apply_global(&self, global: &RawUpdaterSettings) -> Self {
        Self {
            keep_all: global.keep_all.unwrap_or(self.keep_all),
            enable_downgrading: global
                .enable_downgrading
                .unwrap_or(self.enable_downgrading),
            ignored_paths: global
                .ignored_paths
                .clone()
                .unwrap_or_else(|| self.ignored_paths.clone()),
        }
    }

    /// Merge options with paths parsed using `separator` and `format`.
    pub fn merge_options(&self, separator: char, format: KeyFormat) -> DomainResult<MergeOptions> {
        let ignored_paths = self
            .ignored_paths
            .iter()
            .map(|p| DocPath::parse_with(p, separator, format))
            .collect::<DomainResult<Vec<_>>>()?;
        Ok(MergeOptions {
            keep_all: self.keep_all,
            ignored_paths,
        })
    }
}

impl VersioningSettings {
    /// Any layer that sets a field replaces it; the catalog is never unioned.
    fn overlay(&self, raw: &RawVersioningSettings) -> Self {
        Self {
            route: raw.route.clone().unwrap_or_else(|| self.route.clone()),
            versions: raw.versions.clone().unwrap_or_else(|| self.versions.clone()),
            segments: raw.segments.clone().unwrap_or_else(|| self.segments.clone()),
            separator: raw
                .separator
                .clone()
                .unwrap_or_else(|| self.separator.clone()),
        }
    }
}

/// Unified configuration for cfgshift.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Separator of textual paths in relocation files and settings
    pub path_separator: char,
    /// Typing of integer-like keys in documents and textual paths
    pub key_format: KeyFormat,
    /// Default relocation file, relative paths resolve against the working directory
    pub relocations: Option<PathBuf>,
    pub versioning: VersioningSettings,
    pub updater: UpdaterSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            path_separator: '.',
            key_format: KeyFormat::default(),
            relocations: None,
            versioning: VersioningSettings::default(),
            updater: UpdaterSettings::default(),
        }
    }
}

/// Get the XDG config directory for cfgshift.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "cfgshift").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("cfgshift.toml"))
}

/// Get the path to the local config file in a project directory.
pub fn local_config_path(project_dir: &Path) -> PathBuf {
    project_dir.join(".cfgshift.toml")
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    shellexpand::full(raw.as_ref())
        .map(|s| PathBuf::from(s.into_owned()))
        .unwrap_or_else(|_| path.to_path_buf())
}

impl Settings {
    /// Merge overlay config onto self (base) with union semantics for arrays.
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        Self {
            path_separator: overlay.path_separator.unwrap_or(self.path_separator),
            key_format: overlay.key_format.unwrap_or(self.key_format),
            relocations: overlay
                .relocations
                .clone()
                .or_else(|| self.relocations.clone()),
            versioning: self.versioning.overlay(&overlay.versioning),
            updater: self.updater.merge(&overlay.updater),
        }
    }

    /// Apply global config onto defaults with REPLACE semantics for arrays.
    fn apply_global(&self, global: &RawSettings) -> Self {
        Self {
            path_separator: global.path_separator.unwrap_or(self.path_separator),
            key_format: global.key_format.unwrap_or(self.key_format),
            relocations: global
                .relocations
                .clone()
                .or_else(|| self.relocations.clone()),
            versioning: self.versioning.overlay(&global.versioning),
            updater: self.updater.apply_global(&global.updater),
        }
    }

    /// Load settings with layered precedence.
    ///
    /// # Precedence (lowest to highest)
    /// 1. Compiled defaults
    /// 2. Global config: `$XDG_CONFIG_HOME/cfgshift/cfgshift.toml` (arrays REPLACE defaults)
    /// 3. Local config: `<project_dir>/.cfgshift.toml` (arrays UNION with global)
    /// 4. Environment variables: `CFGSHIFT_*` prefix (REPLACES - explicit override)
    pub fn load(project_dir: Option<&Path>) -> Result<Self, ApplicationError> {
        let mut current = Self::default();

        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                let raw = load_raw_settings(&global_path)?;
                current = current.apply_global(&raw);
            }
        }

        if let Some(project) = project_dir {
            let local_path = local_config_path(project);
            if local_path.exists() {
                let raw = load_raw_settings(&local_path)?;
                current = current.merge_with(&raw);
            }
        }

        current = Self::apply_env_overrides(current)?;

        if let Some(relocations) = &current.relocations {
            current.relocations = Some(expand_path(relocations));
        }

        Ok(current)
    }

    /// Load a single TOML file on top of compiled defaults.
    pub fn from_file(path: &Path) -> Result<Self, ApplicationError> {
        let raw = load_raw_settings(path)?;
        Ok(Self::default().merge_with(&raw))
    }

    /// Apply CFGSHIFT_* environment variables as explicit overrides.
    ///
    /// Nested keys use `__`: `CFGSHIFT_UPDATER__KEEP_ALL=true`,
    /// `CFGSHIFT_VERSIONING__VERSIONS=1,2,3`. An unknown `CFGSHIFT_KEY_FORMAT`
    /// is a config error.
    fn apply_env_overrides(mut settings: Self) -> Result<Self, ApplicationError> {
        let builder = Config::builder().add_source(
            Environment::with_prefix("CFGSHIFT")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("versioning.versions")
                .with_list_parse_key("updater.ignored_paths")
                .try_parsing(true),
        );

        let config = builder.build().map_err(config_err)?;

        if let Ok(val) = config.get_string("path_separator") {
            if let Some(c) = val.chars().next() {
                settings.path_separator = c;
            }
        }
        if let Ok(val) = config.get_string("key_format") {
            settings.key_format = parse_key_format(&val)?;
        }
        if let Ok(val) = config.get_string("relocations") {
            settings.relocations = Some(PathBuf::from(val));
        }
        if let Ok(val) = config.get_string("versioning.route") {
            settings.versioning.route = val;
        }
        if let Ok(val) = config.get::<Vec<String>>("versioning.versions") {
            settings.versioning.versions = val;
        }
        if let Ok(val) = config.get_bool("updater.keep_all") {
            settings.updater.keep_all = val;
        }
        if let Ok(val) = config.get_bool("updater.enable_downgrading") {
            settings.updater.enable_downgrading = val;
        }
        if let Ok(val) = config.get::<Vec<String>>("updater.ignored_paths") {
            settings.updater.ignored_paths = val;
        }

        Ok(settings)
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# cfgshift configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/cfgshift/cfgshift.toml  (defines your baseline)
#   Local:  <project>/.cfgshift.toml          (project-specific additions)
#   Env:    CFGSHIFT_* environment variables  (explicit overrides)

# Separator of textual paths (relocation files, ignored_paths)
# path_separator = "."

# Key typing: "native" reads `80` in documents and paths as an integer key,
# "string" reads every key as text
# key_format = "native"

# Default relocation file
# relocations = "relocations.toml"

[versioning]
# Where documents store their version
# route = "config-version"

# Explicit catalog, oldest first. Leave empty to use segments instead.
# versions = ["1", "2", "3"]

# Pattern segments, expanded into the catalog (here 1.0 .. 3.9)
# segments = [{ start = 1, end = 3 }, { start = 0, end = 9 }]
# separator = "."

[updater]
# Keep keys the defaults do not declare
# keep_all = false

# Accept documents newer than the defaults
# enable_downgrading = false

# Paths taken from the user document verbatim (merged with global, use !path to remove)
# ignored_paths = ["plugins"]
"#
        .to_string()
    }
}

fn parse_key_format(value: &str) -> Result<KeyFormat, ApplicationError> {
    match value.to_ascii_lowercase().as_str() {
        "native" => Ok(KeyFormat::Native),
        "string" => Ok(KeyFormat::String),
        other => Err(ApplicationError::Config {
            message: format!("key_format must be 'native' or 'string', got '{other}'"),
        }),
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_no_config_when_loading_then_uses_defaults() {
        let settings = Settings::load(None).expect("load defaults");
        assert_eq!(settings.path_separator, '.');
        assert_eq!(settings.versioning.route, "config-version");
        let catalog = settings.versioning.catalog().unwrap();
        assert_eq!(catalog.first().as_id(), "1");
        assert_eq!(catalog.last().as_id(), "100");
    }

    #[test]
    fn given_explicit_versions_when_catalog_then_segments_ignored() {
        let versioning = VersioningSettings {
            versions: vec!["1.0".into(), "1.1".into(), "2.0".into()],
            ..VersioningSettings::default()
        };
        let catalog = versioning.catalog().unwrap();
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.last().as_id(), "2.0");
    }

    #[test]
    fn test_merge_array_union_and_negation() {
        let base = vec!["a".to_string(), "b".to_string()];
        let overlay = vec!["!a".to_string(), "c".to_string()];
        let result = UpdaterSettings::merge_array(&base, &overlay);

        assert!(!result.contains(&"a".to_string()), "a should be removed by !a");
        assert!(result.contains(&"b".to_string()));
        assert!(result.contains(&"c".to_string()));
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn test_merge_array_duplicates() {
        let base = vec!["a".to_string(), "b".to_string()];
        let overlay = vec!["a".to_string(), "c".to_string()];
        let result = UpdaterSettings::merge_array(&base, &overlay);
        assert_eq!(result, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_apply_global_replaces_arrays() {
        let base = UpdaterSettings {
            keep_all: false,
            enable_downgrading: false,
            ignored_paths: vec!["plugins".into()],
        };
        let global = RawUpdaterSettings {
            keep_all: Some(true),
            enable_downgrading: None,
            ignored_paths: Some(vec!["extensions".into()]),
        };

        let result = base.apply_global(&global);

        assert!(result.keep_all);
        assert!(!result.enable_downgrading);
        assert_eq!(result.ignored_paths, vec!["extensions".to_string()]);
    }

    #[test]
    fn test_merge_unions_ignored_paths() {
        let base = UpdaterSettings {
            ignored_paths: vec!["plugins".into()],
            ..UpdaterSettings::default()
        };
        let overlay = RawUpdaterSettings {
            ignored_paths: Some(vec!["extensions".into()]),
            ..RawUpdaterSettings::default()
        };
        let result = base.merge(&overlay);
        assert_eq!(
            result.ignored_paths,
            vec!["extensions".to_string(), "plugins".to_string()]
        );
    }

    #[test]
    fn given_ignored_paths_when_merge_options_then_parsed_with_separator() {
        let updater = UpdaterSettings {
            keep_all: true,
            enable_downgrading: false,
            ignored_paths: vec!["a/b".into()],
        };
        let options = updater.merge_options('/', KeyFormat::Native).unwrap();
        assert!(options.keep_all);
        assert_eq!(options.ignored_paths[0], DocPath::parse("a.b", '.').unwrap());
    }

    #[test]
    fn given_key_format_when_merge_options_then_ignored_paths_typed() {
        let updater = UpdaterSettings {
            ignored_paths: vec!["ports.80".into()],
            ..UpdaterSettings::default()
        };
        let native = updater.merge_options('.', KeyFormat::Native).unwrap();
        assert_eq!(native.ignored_paths[0].last(), &crate::domain::Key::Int(80));

        let strings = updater.merge_options('.', KeyFormat::String).unwrap();
        assert_eq!(strings.ignored_paths[0].last(), &crate::domain::Key::from("80"));
    }

    #[test]
    fn given_key_format_text_when_parsed_then_case_insensitive() {
        assert_eq!(parse_key_format("String").unwrap(), KeyFormat::String);
        assert_eq!(parse_key_format("native").unwrap(), KeyFormat::Native);
        assert!(matches!(
            parse_key_format("numeric"),
            Err(ApplicationError::Config { .. })
        ));
    }

    #[test]
    fn given_settings_when_to_toml_then_contains_sections() {
        let toml = Settings::default().to_toml().unwrap();
        assert!(toml.contains("[versioning]"));
        assert!(toml.contains("[updater]"));
        assert!(toml.contains("key_format = \"native\""));
    }
}
