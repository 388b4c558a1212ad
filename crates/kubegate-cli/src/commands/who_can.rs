//! `who-can`: reverse lookup of the subjects allowed to perform an action.

use anyhow::Result;
use kubegate_config::OutputFormat;
use kubegate_rbac::{AuthorizationRequest, Authorizer, Subject};

use super::{Session, parse_resource};
use crate::style::{print_table, report_table};

pub fn run(
    session: &Session,
    verb: &str,
    resource: &str,
    api_group: Option<&str>,
    namespace: Option<&str>,
) -> Result<()> {
    let (api_group, resource, name) = parse_resource(resource, api_group)?;
    let store = session.load_store()?;

    // The request subject is ignored by who_can.
    let mut req = AuthorizationRequest::new(Subject::user(""), verb, api_group, resource);
    req.resource_name = name;
    req.namespace = namespace.map(str::to_string);

    let subjects = Authorizer::new(&store).without_audit().who_can(&req);

    match session.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&subjects)?),
        OutputFormat::Text => {
            let mut table = report_table(&["Kind", "Name", "Namespace"]);
            for subject in &subjects {
                table.add_row(vec![
                    subject.kind().to_string(),
                    subject.name().to_string(),
                    subject.namespace().unwrap_or("").to_string(),
                ]);
            }
            print_table(&table, "subject");
        }
    }

    Ok(())
}
