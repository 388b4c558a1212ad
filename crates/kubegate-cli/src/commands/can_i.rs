//! `can-i`: decide a single request and explain the decision.

use std::process::ExitCode;

use anyhow::Result;
use kubegate_config::OutputFormat;
use kubegate_rbac::{AuthorizationRequest, Authorizer};
use serde_json::json;

use super::{Session, parse_resource, parse_subject};
use crate::style::colors::SemanticStyle;
use crate::style::print_warn;

pub struct CanIArgs<'a> {
    pub verb: &'a str,
    pub resource: &'a str,
    pub api_group: Option<&'a str>,
    pub namespace: Option<&'a str>,
    pub as_user: Option<&'a str>,
    pub as_group: Option<&'a str>,
}

/// Exits 0 when allowed and 1 when denied, like `kubectl auth can-i`.
pub fn run(session: &Session, args: &CanIArgs<'_>) -> Result<ExitCode> {
    let subject = parse_subject(args.as_user, args.as_group)?;
    let (api_group, resource, name) = parse_resource(args.resource, args.api_group)?;
    let store = session.load_store()?;

    let mut req = AuthorizationRequest::new(subject, args.verb, api_group, resource);
    req.resource_name = name;
    req.namespace = args.namespace.map(str::to_string);

    let authorizer = if session.verbose {
        Authorizer::new(&store)
    } else {
        Authorizer::new(&store).without_audit()
    };
    let decision = authorizer.authorize(&req);

    match session.format {
        OutputFormat::Json => {
            let report = json!({
                "request": req,
                "allowed": decision.allowed,
                "reason": decision.reason(),
                "matchedRule": decision.matched_rule,
                "evaluatedBindings": decision.evaluated_bindings,
                "diagnostics": decision.diagnostics,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            if decision.allowed {
                println!("{}", "yes".success());
            } else {
                println!("{}", "no".error());
            }
            println!("  {}", decision.reason().muted());
            if let Some(matched) = &decision.matched_rule {
                println!("  {}", matched.rule.to_string().muted());
            }
            for diagnostic in &decision.diagnostics {
                print_warn(&diagnostic.to_string());
            }
        }
    }

    Ok(if decision.allowed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
