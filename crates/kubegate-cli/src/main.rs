//! kubegate CLI.
//!
//! Offline Kubernetes RBAC authorization and least-privilege audit.
//!
//! # Quick Start
//!
//! ```bash
//! # Can the pod-reader ServiceAccount list pods in default?
//! kubegate -f rbac/ can-i list pods -n default --as system:serviceaccount:default:pod-reader
//!
//! # Who may delete secrets in kube-system?
//! kubegate -f rbac/ who-can delete secrets -n kube-system
//!
//! # Fail CI on critical findings
//! kubegate -f rbac/ analyze --fail-on critical
//! ```
//!
//! Exit codes: 0 success or allowed, 1 denied or `--fail-on` threshold
//! reached, 2 error.

mod commands;
mod style;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use kubegate_config::{ConfigLoader, OutputFormat};
use kubegate_rbac::{LoadMode, Severity};
use tracing_subscriber::EnvFilter;

use commands::Session;
use commands::analyze::AnalyzeArgs;
use commands::can_i::CanIArgs;

/// kubegate - offline Kubernetes RBAC authorization and audit.
#[derive(Parser)]
#[command(name = "kubegate")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Manifest file or directory of .yaml/.yml/.json files (repeatable).
    #[arg(short = 'f', long = "file", global = true)]
    files: Vec<PathBuf>,

    /// Project directory holding kubegate.toml.
    #[arg(short = 'C', long = "project", global = true, default_value = ".")]
    project: PathBuf,

    /// Output format (overrides output.format).
    #[arg(short = 'o', long, global = true, value_enum)]
    format: Option<OutputFormat>,

    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,

    /// Reject conflicting duplicate objects instead of keeping the last one.
    #[arg(long, global = true)]
    strict: bool,

    /// Verbose logging on stderr, including authorization audit events.
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version information.
    Version,

    /// Check whether a subject may perform an action.
    CanI {
        /// Verb, e.g. get, list, create, delete.
        verb: String,

        /// Resource as `pods`, `deployments.apps` or `pods/web-0`.
        resource: String,

        #[command(flatten)]
        subject: SubjectArgs,

        /// Namespace of the request; omit for a cluster-scoped request.
        #[arg(short, long)]
        namespace: Option<String>,

        /// API group (overrides a dotted resource suffix).
        #[arg(long)]
        api_group: Option<String>,
    },

    /// List the subjects allowed to perform an action.
    WhoCan {
        /// Verb, e.g. get, list, create, delete.
        verb: String,

        /// Resource as `pods`, `deployments.apps` or `pods/web-0`.
        resource: String,

        /// Namespace of the request; omit for a cluster-scoped request.
        #[arg(short, long)]
        namespace: Option<String>,

        /// API group (overrides a dotted resource suffix).
        #[arg(long)]
        api_group: Option<String>,
    },

    /// List every rule granted to a subject.
    List {
        #[command(flatten)]
        subject: SubjectArgs,

        /// Include grants in this namespace; omit for cluster-wide grants only.
        #[arg(short, long)]
        namespace: Option<String>,
    },

    /// Report least-privilege findings.
    Analyze {
        /// Hide findings below this severity.
        #[arg(long, value_parser = parse_severity)]
        min_severity: Option<Severity>,

        /// Exit 1 when a finding at or above this severity exists.
        #[arg(long, value_parser = parse_severity)]
        fail_on: Option<Severity>,

        /// Report bindings naming ServiceAccounts that are not defined.
        #[arg(long)]
        missing_service_accounts: bool,
    },

    /// Configuration commands.
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct SubjectArgs {
    /// User to act as; system:serviceaccount:<ns>:<name> selects a ServiceAccount.
    #[arg(long = "as")]
    as_user: Option<String>,

    /// Group to act as.
    #[arg(long = "as-group")]
    as_group: Option<String>,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective configuration.
    Show,

    /// Print the effective configuration as TOML.
    Dump,
}

fn parse_severity(s: &str) -> Result<Severity, String> {
    s.parse()
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Loads configuration and merges the global flags over it.
fn open_session(global: GlobalArgs) -> Result<Session> {
    let config = ConfigLoader::new()
        .with_project_dir(&global.project)
        .load()
        .context("Failed to load configuration")?;

    style::set_no_color(
        global.no_color || !config.output.color || std::env::var_os("NO_COLOR").is_some(),
    );

    Ok(Session {
        format: global.format.unwrap_or(config.output.format),
        load_mode: if global.strict {
            LoadMode::Strict
        } else {
            config.store.load_mode
        },
        files: global.files,
        project: global.project,
        verbose: global.verbose,
        config,
    })
}

fn run(cli: Cli) -> Result<ExitCode> {
    let session = match cli.command {
        // Needs no configuration, so a broken kubegate.toml cannot break it.
        Commands::Version => {
            style::set_no_color(cli.global.no_color || std::env::var_os("NO_COLOR").is_some());
            commands::version::run();
            return Ok(ExitCode::SUCCESS);
        }
        _ => open_session(cli.global)?,
    };

    match cli.command {
        Commands::Version => Ok(ExitCode::SUCCESS),
        Commands::CanI {
            verb,
            resource,
            subject,
            namespace,
            api_group,
        } => commands::can_i::run(
            &session,
            &CanIArgs {
                verb: &verb,
                resource: &resource,
                api_group: api_group.as_deref(),
                namespace: namespace.as_deref(),
                as_user: subject.as_user.as_deref(),
                as_group: subject.as_group.as_deref(),
            },
        ),
        Commands::WhoCan {
            verb,
            resource,
            namespace,
            api_group,
        } => {
            commands::who_can::run(
                &session,
                &verb,
                &resource,
                api_group.as_deref(),
                namespace.as_deref(),
            )?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::List { subject, namespace } => {
            commands::list::run(
                &session,
                subject.as_user.as_deref(),
                subject.as_group.as_deref(),
                namespace.as_deref(),
            )?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Analyze {
            min_severity,
            fail_on,
            missing_service_accounts,
        } => commands::analyze::run(
            &session,
            &AnalyzeArgs {
                min_severity,
                fail_on,
                report_missing_service_accounts: missing_service_accounts,
            },
        ),
        Commands::Config(cmd) => {
            match cmd {
                ConfigCommands::Show => {
                    commands::config::show(&session.config, session.format, &session.project)?;
                }
                ConfigCommands::Dump => commands::config::dump(&session.config)?,
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            style::print_error(&format!("{e:#}"));
            ExitCode::from(2)
        }
    }
}
