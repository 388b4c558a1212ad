//! `analyze`: least-privilege report over every loaded object.

use std::collections::BTreeMap;
use std::process::ExitCode;

use anyhow::Result;
use kubegate_config::OutputFormat;
use kubegate_rbac::{Analyzer, Finding, Severity};

use super::Session;
use crate::style::colors::{SemanticStyle, paint_severity};
use crate::style::{print_success, print_table, report_table, severity_cell};

pub struct AnalyzeArgs {
    /// Overrides `analyzer.min_severity`.
    pub min_severity: Option<Severity>,
    /// Exit 1 if any finding is at least this severe.
    pub fail_on: Option<Severity>,
    /// Forces the missing ServiceAccount check on.
    pub report_missing_service_accounts: bool,
}

pub fn run(session: &Session, args: &AnalyzeArgs) -> Result<ExitCode> {
    let store = session.load_store()?;

    let mut options = session.config.analyzer_options();
    if let Some(min) = args.min_severity {
        options.min_severity = min;
    }
    options.report_missing_service_accounts |= args.report_missing_service_accounts;

    let findings = Analyzer::new(options).analyze(&store);

    match session.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&findings)?),
        OutputFormat::Text => print_report(&findings, store.len()),
    }

    let failed = args
        .fail_on
        .is_some_and(|threshold| findings.iter().any(|f| f.severity >= threshold));

    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn print_report(findings: &[Finding], objects: usize) {
    if findings.is_empty() {
        print_success(&format!("No findings across {objects} objects"));
        return;
    }

    let mut table = report_table(&["Severity", "Category", "Object", "Message"]);
    for finding in findings {
        table.add_row(vec![
            severity_cell(finding.severity),
            finding.category.to_string().into(),
            finding.object.to_string().into(),
            finding.message.as_str().into(),
        ]);
    }
    print_table(&table, "finding");

    let mut counts: BTreeMap<Severity, usize> = BTreeMap::new();
    for finding in findings {
        *counts.entry(finding.severity).or_default() += 1;
    }
    let summary: Vec<String> = counts
        .iter()
        .rev()
        .map(|(severity, count)| format!("{count} {}", paint_severity(*severity)))
        .collect();
    println!("{} {}", "Summary:".header(), summary.join(", "));
}
