//! CLI command implementations.
//!
//! Every command except `version` and `config` works on a [`ResourceStore`]
//! loaded from manifest files given with `-f` or listed in the project
//! configuration.

pub mod analyze;
pub mod can_i;
pub mod config;
pub mod list;
pub mod version;
pub mod who_can;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use kubegate_config::{KubegateConfig, OutputFormat};
use kubegate_rbac::{DecodeOptions, LoadMode, RbacObject, ResourceStore, Subject, decode_str};
use tracing::debug;

/// File extensions read when a directory is given.
const MANIFEST_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// Settings shared by every command, after merging flags over configuration.
pub struct Session {
    pub config: KubegateConfig,
    pub files: Vec<PathBuf>,
    pub project: PathBuf,
    pub format: OutputFormat,
    pub load_mode: LoadMode,
    pub verbose: bool,
}

impl Session {
    /// Reads every manifest and loads them as one batch.
    ///
    /// Files are decoded first so that a bad file leaves nothing loaded.
    pub fn load_store(&self) -> Result<ResourceStore> {
        let paths = if self.files.is_empty() {
            &self.config.manifests.paths
        } else {
            &self.files
        };
        if paths.is_empty() {
            bail!("No manifests given. Pass -f <file|dir> or set manifests.paths in kubegate.toml");
        }

        let options = self.config.decode_options();
        let mut objects: Vec<RbacObject> = Vec::new();

        for file in expand_paths(paths)? {
            objects.extend(decode_file(&file, &options)?);
        }

        let mut store = ResourceStore::new().with_mode(self.load_mode);
        let summary = store
            .load(objects)
            .context("Failed to load manifests into the store")?;
        debug!(
            inserted = summary.inserted,
            replaced = summary.replaced,
            objects = store.len(),
            "Store ready"
        );

        Ok(store)
    }
}

fn decode_file(path: &Path, options: &DecodeOptions) -> Result<Vec<RbacObject>> {
    let input = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    decode_str(&input, options).with_context(|| format!("Failed to decode {}", path.display()))
}

/// Expands directories into their manifest files, sorted by name.
/// Directories are not descended into recursively.
fn expand_paths(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for path in paths {
        let metadata = fs::metadata(path)
            .with_context(|| format!("Failed to access {}", path.display()))?;

        if !metadata.is_dir() {
            files.push(path.clone());
            continue;
        }

        let mut entries: Vec<PathBuf> = fs::read_dir(path)
            .with_context(|| format!("Failed to list {}", path.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && has_manifest_extension(p))
            .collect();
        entries.sort();

        if entries.is_empty() {
            tracing::warn!(dir = %path.display(), "No manifest files in directory");
        }
        files.extend(entries);
    }

    Ok(files)
}

fn has_manifest_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| MANIFEST_EXTENSIONS.contains(&ext))
}

/// Builds the subject from kubectl-style impersonation flags.
///
/// `--as system:serviceaccount:<ns>:<name>` is a ServiceAccount, any other
/// `--as` value a User, and `--as-group` a Group.
pub fn parse_subject(as_user: Option<&str>, as_group: Option<&str>) -> Result<Subject> {
    match (as_user, as_group) {
        (Some(user), None) => user
            .parse()
            .with_context(|| format!("Invalid --as value '{user}'")),
        (None, Some(group)) if !group.is_empty() => Ok(Subject::group(group)),
        (None, Some(_)) => bail!("--as-group must not be empty"),
        _ => bail!("Exactly one of --as or --as-group is required"),
    }
}

/// Splits a kubectl-style resource argument.
///
/// `pods` -> (`""`, `pods`, None), `deployments.apps` -> (`apps`, `deployments`, None),
/// `pods/web-0` -> (`""`, `pods`, Some(`web-0`)). An explicit `--api-group`
/// wins over a dotted suffix.
pub fn parse_resource(
    arg: &str,
    api_group: Option<&str>,
) -> Result<(String, String, Option<String>)> {
    let (kind, name) = match arg.split_once('/') {
        Some((kind, name)) if !name.is_empty() => (kind, Some(name.to_string())),
        Some(_) => bail!("Resource '{arg}' has an empty name"),
        None => (arg, None),
    };
    let (resource, group) = match kind.split_once('.') {
        Some((resource, group)) => (resource, group),
        None => (kind, ""),
    };
    if resource.is_empty() {
        bail!("Resource must not be empty");
    }

    let group = api_group.unwrap_or(group).to_string();
    Ok((group, resource.to_string(), name))
}
