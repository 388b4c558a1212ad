//! `list`: every rule granted to a subject, with where it came from.

use anyhow::Result;
use kubegate_config::OutputFormat;
use kubegate_rbac::Authorizer;

use super::{Session, parse_subject};
use crate::style::{print_table, report_table};

pub fn run(
    session: &Session,
    as_user: Option<&str>,
    as_group: Option<&str>,
    namespace: Option<&str>,
) -> Result<()> {
    let subject = parse_subject(as_user, as_group)?;
    let store = session.load_store()?;

    let rules = Authorizer::new(&store).list_rules(&subject, namespace);

    match session.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rules)?),
        OutputFormat::Text => {
            let mut table = report_table(&[
                "Binding",
                "Role",
                "Scope",
                "API Groups",
                "Resources",
                "Names",
                "Verbs",
            ]);
            for granted in &rules {
                let groups: Vec<&str> = granted
                    .rule
                    .api_groups
                    .iter()
                    .map(|g| if g.is_empty() { "core" } else { g.as_str() })
                    .collect();
                table.add_row(vec![
                    granted.binding.to_string(),
                    format!("{} #{}", granted.role, granted.rule_index),
                    granted.scope.to_string(),
                    groups.join(","),
                    granted.rule.resources.join(","),
                    granted.rule.resource_names.join(","),
                    granted.rule.verbs.join(","),
                ]);
            }
            print_table(&table, "rule");
        }
    }

    Ok(())
}
