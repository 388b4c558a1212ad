//! Configuration commands.

use std::path::Path;

use anyhow::Result;
use kubegate_config::{KubegateConfig, OutputFormat, Paths};

use crate::style::colors::SemanticStyle;
use crate::style::{info_table, print_hint, print_spacer};

/// Show the effective configuration after every layer is merged.
pub fn show(config: &KubegateConfig, format: OutputFormat, project_dir: &Path) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(config)?),
        OutputFormat::Text => {
            println!("{}", "kubegate configuration".header());
            print_spacer();

            let paths = if config.manifests.paths.is_empty() {
                "(none)".to_string()
            } else {
                config
                    .manifests
                    .paths
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join("\n")
            };
            let table = info_table(&[
                ("project.name", config.project.name.clone()),
                ("store.load_mode", format!("{:?}", config.store.load_mode).to_lowercase()),
                (
                    "store.ignore_unsupported_kinds",
                    config.store.ignore_unsupported_kinds.to_string(),
                ),
                (
                    "store.default_namespace",
                    config
                        .store
                        .default_namespace
                        .clone()
                        .unwrap_or_else(|| "(none)".to_string()),
                ),
                ("manifests.paths", paths),
                ("analyzer.min_severity", config.analyzer.min_severity.to_string()),
                (
                    "analyzer.report_missing_service_accounts",
                    config.analyzer.report_missing_service_accounts.to_string(),
                ),
                ("output.format", format!("{:?}", config.output.format).to_lowercase()),
                ("output.color", config.output.color.to_string()),
            ]);
            println!("{table}");

            if !Paths::is_initialized(project_dir) {
                print_spacer();
                print_hint(&format!(
                    "No kubegate.toml in {}; showing defaults and overrides",
                    project_dir.display()
                ));
            }
        }
    }

    Ok(())
}

/// Print the effective configuration as TOML, ready to save as kubegate.toml.
pub fn dump(config: &KubegateConfig) -> Result<()> {
    print!("{}", config.to_toml_string()?);
    Ok(())
}
