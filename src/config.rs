//! Configuration schema for spancover.
//!
//! A config file controls which files are scanned and how reports are laid out.

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::analysis::{get_analyzer_by_id, registered_languages, Category, ChainStyle};
use crate::error::SpanError;

/// Default config file names to search for.
pub const DEFAULT_CONFIG_NAMES: &[&str] = &["spancover.yaml", ".spancover.yaml"];

/// Path components and file names skipped unless overridden.
pub const DEFAULT_EXCLUDED_PATHS: &[&str] = &[
    "venv",
    ".venv",
    "tests",
    "node_modules",
    "__pycache__",
    ".git",
    "__init__.py",
];

/// Report columns used when none are configured.
pub const DEFAULT_COLUMNS: &[&str] = &["spans", "tracers", "counters", "events", "attributes"];

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub version: String,
    /// Restrict the scan to one language ("python" or "java").
    #[serde(default)]
    pub language: Option<String>,
    /// Directory or file names skipped anywhere in the tree.
    #[serde(default = "default_excluded_paths")]
    pub excluded_paths: Vec<String>,
    /// Glob patterns (relative to the scanned root) to exclude.
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    /// Category columns of the coverage table, in order.
    #[serde(default = "default_columns")]
    pub columns: Vec<String>,
    /// Layout of fluent call chains in the detailed report.
    #[serde(default)]
    pub chain_style: ChainStyle,
}

fn default_excluded_paths() -> Vec<String> {
    DEFAULT_EXCLUDED_PATHS.iter().map(|s| s.to_string()).collect()
}

fn default_columns() -> Vec<String> {
    DEFAULT_COLUMNS.iter().map(|s| s.to_string()).collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: String::new(),
            language: None,
            excluded_paths: default_excluded_paths(),
            exclude_globs: Vec::new(),
            columns: default_columns(),
            chain_style: ChainStyle::default(),
        }
    }
}

impl Config {
    /// Parse a config from a YAML file.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Self, SpanError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| SpanError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse_str(&content)
    }

    /// Parse a config from YAML text.
    pub fn parse_str(content: &str) -> Result<Self, SpanError> {
        if content.trim().is_empty() {
            return Ok(Config::default());
        }
        serde_yaml::from_str(content).map_err(|e| SpanError::Configuration(e.to_string()))
    }

    /// Load the config at `path`, or the first default config file found in
    /// `dir`, or the defaults.
    pub fn load(path: Option<&Path>, dir: &Path) -> Result<Self, SpanError> {
        match path {
            Some(p) => Self::parse_file(p),
            None => match discover(dir) {
                Some(p) => Self::parse_file(p),
                None => Ok(Config::default()),
            },
        }
    }

    /// The configured report columns as categories.
    pub fn categories(&self) -> Result<Vec<Category>, SpanError> {
        self.columns
            .iter()
            .map(|name| {
                Category::parse(name).ok_or_else(|| {
                    SpanError::Configuration(format!(
                        "unknown column {:?}, expected one of: {}",
                        name,
                        Category::ALL.map(|c| c.as_str()).join(", ")
                    ))
                })
            })
            .collect()
    }

    /// Compiled `exclude_globs`.
    pub fn glob_set(&self) -> Result<GlobSet, SpanError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.exclude_globs {
            let glob = Glob::new(pattern).map_err(|e| {
                SpanError::Configuration(format!("invalid exclude_globs pattern {:?}: {}", pattern, e))
            })?;
            builder.add(glob);
        }
        builder
            .build()
            .map_err(|e| SpanError::Configuration(e.to_string()))
    }

    /// Whether any component of `relative` is an excluded name.
    pub fn is_name_excluded(&self, relative: &Path) -> bool {
        relative.components().any(|c| {
            let name = c.as_os_str().to_string_lossy();
            self.excluded_paths.iter().any(|e| *e == name)
        })
    }
}

/// Find a default config file in `dir`.
pub fn discover(dir: &Path) -> Option<PathBuf> {
    DEFAULT_CONFIG_NAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.is_file())
}

/// Validate a config for correctness.
pub fn validate(config: &Config) -> Result<(), SpanError> {
    if let Some(language) = &config.language {
        if get_analyzer_by_id(language).is_none() {
            return Err(SpanError::Configuration(format!(
                "invalid language {:?}, must be one of: {}",
                language,
                registered_languages().join(", ")
            )));
        }
    }

    if config.columns.is_empty() {
        return Err(SpanError::Configuration(
            "columns must list at least one category".to_string(),
        ));
    }
    config.categories()?;
    config.glob_set()?;

    Ok(())
}
