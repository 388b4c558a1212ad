//! Least-privilege analysis.
//!
//! Static checks over a whole [`ResourceStore`], independent of any
//! request. Output is sorted by severity (most severe first), then by
//! object kind, namespace and name, so reports are stable across runs.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::objects::{Binding, ObjectKind, ObjectRef};
use crate::resolver::BindingResolver;
use crate::rules::PolicyRule;
use crate::store::ResourceStore;
use crate::subject::SubjectKind;

/// How urgent a finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "warning" | "warn" => Ok(Severity::Warning),
            "critical" => Ok(Severity::Critical),
            other => Err(format!(
                "unknown severity '{other}' (expected info, warning or critical)"
            )),
        }
    }
}

/// What a finding is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    /// Verb `"*"`, or every write verb plus `get` and `list`.
    WildcardVerb,
    /// Resource `"*"`.
    WildcardResource,
    /// A ClusterRoleBinding grants unrestricted access.
    ClusterAdminEquivalent,
    /// A binding's `roleRef` does not resolve.
    DanglingBinding,
    /// A Role or ClusterRole nothing binds.
    UnusedRole,
    /// A rule with no API groups; it can never match.
    MalformedRule,
    /// A binding names a ServiceAccount absent from the store.
    MissingServiceAccount,
}

impl Category {
    pub fn default_severity(&self) -> Severity {
        match self {
            Category::WildcardVerb | Category::ClusterAdminEquivalent => Severity::Critical,
            Category::WildcardResource | Category::DanglingBinding | Category::MalformedRule => {
                Severity::Warning
            }
            Category::UnusedRole | Category::MissingServiceAccount => Severity::Info,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One analyzer result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub severity: Severity,
    pub category: Category,
    pub object: ObjectRef,
    pub message: String,
}

impl Finding {
    fn new(category: Category, object: ObjectRef, message: impl Into<String>) -> Self {
        Self {
            severity: category.default_severity(),
            category,
            object,
            message: message.into(),
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {}: {}",
            self.severity, self.category, self.object, self.message
        )
    }
}

/// Analyzer tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalyzerOptions {
    /// Findings below this severity are dropped.
    pub min_severity: Severity,

    /// Report bindings naming ServiceAccounts the store does not contain.
    pub report_missing_service_accounts: bool,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        Self {
            min_severity: Severity::Info,
            report_missing_service_accounts: false,
        }
    }
}

/// Least-Privilege Analyzer.
#[derive(Debug, Clone, Copy, Default)]
pub struct Analyzer {
    options: AnalyzerOptions,
}

impl Analyzer {
    pub fn new(options: AnalyzerOptions) -> Self {
        Self { options }
    }

    /// Runs every check and returns the sorted findings.
    pub fn analyze(&self, store: &ResourceStore) -> Vec<Finding> {
        let mut findings = Vec::new();

        for role in store.roles() {
            let object =
                ObjectRef::new(ObjectKind::Role, Some(role.namespace.as_str()), &role.name);
            check_rules(&object, &role.rules, &mut findings);
        }
        for role in store.cluster_roles() {
            let object = ObjectRef::new(ObjectKind::ClusterRole, None, &role.name);
            check_rules(&object, &role.rules, &mut findings);
        }

        check_bindings(store, &mut findings);

        if self.options.report_missing_service_accounts {
            check_service_accounts(store, &mut findings);
        }

        findings.retain(|f| f.severity >= self.options.min_severity);
        sort_findings(&mut findings);

        info!(
            findings = findings.len(),
            critical = findings
                .iter()
                .filter(|f| f.severity == Severity::Critical)
                .count(),
            "Least-privilege analysis complete"
        );

        findings
    }
}

/// Analyzes `store` with default options.
pub fn analyze(store: &ResourceStore) -> Vec<Finding> {
    Analyzer::default().analyze(store)
}

/// Orders findings by severity (descending), then object, then category.
pub fn sort_findings(findings: &mut [Finding]) {
    findings.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| a.object.cmp(&b.object))
            .then_with(|| a.category.cmp(&b.category))
            .then_with(|| a.message.cmp(&b.message))
    });
}

fn check_rules(object: &ObjectRef, rules: &[PolicyRule], findings: &mut Vec<Finding>) {
    for (index, rule) in rules.iter().enumerate() {
        if rule.is_malformed() {
            findings.push(Finding::new(
                Category::MalformedRule,
                object.clone(),
                format!("rule #{index} has no apiGroups and can never match"),
            ));
        }

        if rule.has_wildcard_verb() {
            findings.push(Finding::new(
                Category::WildcardVerb,
                object.clone(),
                format!("rule #{index} grants verb '*' on [{}]", rule.resources.join(",")),
            ));
        } else if rule.has_admin_equivalent_verbs() {
            findings.push(Finding::new(
                Category::WildcardVerb,
                object.clone(),
                format!(
                    "rule #{index} grants every read and write verb on [{}]",
                    rule.resources.join(",")
                ),
            ));
        }

        if rule.has_wildcard_resource() {
            findings.push(Finding::new(
                Category::WildcardResource,
                object.clone(),
                format!("rule #{index} grants [{}] on every resource", rule.verbs.join(",")),
            ));
        }
    }
}

fn check_bindings(store: &ResourceStore, findings: &mut Vec<Finding>) {
    let resolver = BindingResolver::new(store);
    let mut referenced: BTreeSet<ObjectRef> = BTreeSet::new();

    for binding in store.list_bindings(None) {
        let binding_ref = binding.object_ref();

        match resolver.resolve_binding(binding) {
            Ok(source) => {
                if matches!(binding, Binding::Cluster(_))
                    && source.rules.iter().any(PolicyRule::is_unrestricted)
                {
                    findings.push(Finding::new(
                        Category::ClusterAdminEquivalent,
                        binding_ref,
                        format!(
                            "grants unrestricted {} cluster-wide to {}",
                            source.role,
                            describe_subjects(binding)
                        ),
                    ));
                }
                referenced.insert(source.role);
            }
            Err(diagnostic) => {
                findings.push(Finding::new(
                    Category::DanglingBinding,
                    binding_ref,
                    diagnostic.to_string(),
                ));
            }
        }
    }

    let roles = store
        .roles()
        .map(|r| ObjectRef::new(ObjectKind::Role, Some(r.namespace.as_str()), &r.name));
    let cluster_roles = store
        .cluster_roles()
        .map(|r| ObjectRef::new(ObjectKind::ClusterRole, None, &r.name));

    for role in roles.chain(cluster_roles) {
        if !referenced.contains(&role) {
            findings.push(Finding::new(
                Category::UnusedRole,
                role,
                "no binding references this role",
            ));
        }
    }
}

fn check_service_accounts(store: &ResourceStore, findings: &mut Vec<Finding>) {
    for binding in store.list_bindings(None) {
        let missing: BTreeSet<String> = binding
            .subjects()
            .iter()
            .filter(|s| s.kind() == SubjectKind::ServiceAccount)
            .filter_map(|s| {
                let ns = s.namespace()?;
                store
                    .service_account(ns, s.name())
                    .is_none()
                    .then(|| format!("{ns}:{}", s.name()))
            })
            .collect();

        for account in missing {
            findings.push(Finding::new(
                Category::MissingServiceAccount,
                binding.object_ref(),
                format!("ServiceAccount {account} is not defined"),
            ));
        }
    }
}

fn describe_subjects(binding: Binding<'_>) -> String {
    if binding.subjects().is_empty() {
        return "no subjects".to_string();
    }
    binding
        .subjects()
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
