//! Configuration management for kubegate
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. CLI arguments (highest precedence)
//! 2. Environment variables (KUBEGATE_* prefix, `__` between sections)
//! 3. kubegate.local.toml (gitignored, local overrides)
//! 4. kubegate.toml (git-tracked, project config)
//! 5. ~/.config/kubegate/config.toml (user defaults)
//! 6. Built-in defaults (lowest precedence)

use anyhow::Result;
use kubegate_rbac::{AnalyzerOptions, DecodeOptions, LoadMode, Severity};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::Paths;

/// Main kubegate configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KubegateConfig {
    pub project: ProjectConfig,
    pub store: StoreConfig,
    pub manifests: ManifestsConfig,
    pub analyzer: AnalyzerConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub name: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: "kubegate-project".to_string(),
        }
    }
}

/// How manifests are loaded into the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub load_mode: LoadMode,

    /// Skip documents of kinds other than the five RBAC kinds, so full
    /// cluster exports can be loaded.
    pub ignore_unsupported_kinds: bool,

    /// Namespace given to Roles, RoleBindings and ServiceAccounts that omit
    /// `metadata.namespace`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_namespace: Option<String>,
}

/// Manifest files and directories used when none are given on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestsConfig {
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub min_severity: Severity,
    pub report_missing_service_accounts: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            min_severity: Severity::Info,
            report_missing_service_accounts: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub color: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            color: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl KubegateConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Load configuration from specific project directory
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Resolve relative manifest paths against `base_dir`
    pub fn resolve_paths(&mut self, base_dir: impl AsRef<Path>) {
        let base = base_dir.as_ref();

        for path in &mut self.manifests.paths {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }

    /// Check invariants the type system does not express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.project.name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "project.name must not be empty".to_string(),
            ));
        }
        if self
            .store
            .default_namespace
            .as_ref()
            .is_some_and(|ns| ns.trim().is_empty())
        {
            return Err(ConfigError::ValidationError(
                "store.default_namespace must not be empty when set".to_string(),
            ));
        }
        if self.manifests.paths.iter().any(|p| p.as_os_str().is_empty()) {
            return Err(ConfigError::ValidationError(
                "manifests.paths must not contain empty entries".to_string(),
            ));
        }
        Ok(())
    }

    /// Analyzer settings as library options
    pub fn analyzer_options(&self) -> AnalyzerOptions {
        AnalyzerOptions {
            min_severity: self.analyzer.min_severity,
            report_missing_service_accounts: self.analyzer.report_missing_service_accounts,
        }
    }

    /// Manifest decoding settings as library options
    pub fn decode_options(&self) -> DecodeOptions {
        let options =
            DecodeOptions::default().ignore_unsupported_kinds(self.store.ignore_unsupported_kinds);
        match &self.store.default_namespace {
            Some(namespace) => options.with_default_namespace(namespace.clone()),
            None => options,
        }
    }

    /// Render the effective configuration as TOML
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}
