//! Authorization engine.
//!
//! Answers "can subject S perform verb V on resource R in namespace N?"
//! against a loaded [`ResourceStore`].
//!
//! Authorization is purely additive: the union of every rule bound to the
//! subject. There is no deny rule, so evaluation stops at the first match
//! and reports it as the explanation. Bindings are tried in resolution
//! order (ClusterRoleBindings first, then RoleBindings), rules in
//! declaration order.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use tracing::{info, warn};

use crate::objects::{Binding, ObjectRef};
use crate::resolver::{BindingResolver, GrantScope, ResolutionDiagnostic};
use crate::rules::{self, PolicyRule};
use crate::store::ResourceStore;
use crate::subject::Subject;

/// Reason reported when nothing grants the request.
pub const NO_MATCH_REASON: &str = "no matching rule found";

/// A proposed access: subject, verb and target resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationRequest {
    pub subject: Subject,
    pub verb: String,
    /// `""` is the core group.
    pub api_group: String,
    pub resource: String,
    pub resource_name: Option<String>,
    /// Absent for cluster-scoped requests.
    pub namespace: Option<String>,
}

impl AuthorizationRequest {
    pub fn new(
        subject: Subject,
        verb: impl Into<String>,
        api_group: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            subject,
            verb: verb.into(),
            api_group: api_group.into(),
            resource: resource.into(),
            resource_name: None,
            namespace: None,
        }
    }

    pub fn with_resource_name(mut self, name: impl Into<String>) -> Self {
        self.resource_name = Some(name.into());
        self
    }

    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Same request on behalf of another subject.
    pub fn for_subject(&self, subject: Subject) -> Self {
        Self {
            subject,
            ..self.clone()
        }
    }
}

impl fmt::Display for AuthorizationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ", self.subject, self.verb)?;
        if !self.api_group.is_empty() {
            write!(f, "{}/", self.api_group)?;
        }
        f.write_str(&self.resource)?;
        if let Some(name) = &self.resource_name {
            write!(f, "/{name}")?;
        }
        match &self.namespace {
            Some(ns) => write!(f, " in namespace {ns}"),
            None => f.write_str(" cluster-wide"),
        }
    }
}

/// The `(binding, role, rule)` triple that granted a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedRule {
    pub binding: ObjectRef,
    pub role: ObjectRef,
    /// Zero-based index into the role's rules.
    pub rule_index: usize,
    pub rule: PolicyRule,
}

/// Outcome of [`Authorizer::authorize`], with its audit trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationDecision {
    pub allowed: bool,
    pub matched_rule: Option<MatchedRule>,
    /// Every binding naming the subject, in evaluation order.
    pub evaluated_bindings: Vec<ObjectRef>,
    /// Inert bindings skipped during resolution.
    pub diagnostics: Vec<ResolutionDiagnostic>,
}

impl AuthorizationDecision {
    /// Human-readable explanation.
    ///
    /// `"allowed by <BindingKind>/<name> -> <RoleKind>/<name> rule #<index>"`
    /// or `"no matching rule found"`.
    pub fn reason(&self) -> String {
        match &self.matched_rule {
            Some(m) => format!(
                "allowed by {}/{} -> {}/{} rule #{}",
                m.binding.kind, m.binding.name, m.role.kind, m.role.name, m.rule_index
            ),
            None => NO_MATCH_REASON.to_string(),
        }
    }
}

/// Compact answer to a `can-i` query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub allowed: bool,
    pub reason: String,
}

impl From<&AuthorizationDecision> for Verdict {
    fn from(decision: &AuthorizationDecision) -> Self {
        Self {
            allowed: decision.allowed,
            reason: decision.reason(),
        }
    }
}

/// One rule granted to a subject, with where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantedRule<'a> {
    pub binding: ObjectRef,
    pub role: ObjectRef,
    pub scope: GrantScope,
    pub rule_index: usize,
    pub rule: &'a PolicyRule,
}

/// Authorization Engine over a loaded store.
///
/// Read-only: any number of authorizers may share one store.
#[derive(Debug, Clone, Copy)]
pub struct Authorizer<'a> {
    store: &'a ResourceStore,

    /// Whether to log decisions.
    audit_enabled: bool,
}

impl<'a> Authorizer<'a> {
    pub fn new(store: &'a ResourceStore) -> Self {
        Self {
            store,
            audit_enabled: true,
        }
    }

    /// Disables decision logging (for bulk queries and tests).
    pub fn without_audit(mut self) -> Self {
        self.audit_enabled = false;
        self
    }

    /// Decides a request.
    ///
    /// Denial is a normal return value, never an error.
    pub fn authorize(&self, req: &AuthorizationRequest) -> AuthorizationDecision {
        let decision = self.evaluate(req);

        if self.audit_enabled {
            if decision.allowed {
                info!(request = %req, reason = %decision.reason(), "Access granted");
            } else {
                warn!(
                    request = %req,
                    bindings = decision.evaluated_bindings.len(),
                    "Access denied"
                );
            }
        }

        decision
    }

    /// `kubectl auth can-i` style query.
    pub fn can_i(
        &self,
        subject: &Subject,
        verb: &str,
        api_group: &str,
        resource: &str,
        resource_name: Option<&str>,
        namespace: Option<&str>,
    ) -> Verdict {
        let mut req = AuthorizationRequest::new(subject.clone(), verb, api_group, resource);
        req.resource_name = resource_name.map(str::to_string);
        req.namespace = namespace.map(str::to_string);

        Verdict::from(&self.authorize(&req))
    }

    /// Every rule that applies to `subject` in `namespace`, in evaluation
    /// order. Without a namespace, only cluster-wide grants are listed.
    pub fn list_rules(&self, subject: &Subject, namespace: Option<&str>) -> Vec<GrantedRule<'a>> {
        let resolution = BindingResolver::new(self.store).resolve_roles(subject, namespace);

        resolution
            .bindings
            .into_iter()
            .flat_map(|resolved| {
                let binding = resolved.binding;
                let source = resolved.source;
                let rules = source.rules;
                rules
                    .iter()
                    .enumerate()
                    .map(move |(rule_index, rule)| GrantedRule {
                        binding: binding.clone(),
                        role: source.role.clone(),
                        scope: source.scope.clone(),
                        rule_index,
                        rule,
                    })
            })
            .collect()
    }

    /// Subjects that would be allowed to perform the request's action.
    ///
    /// The request's own subject is ignored. Candidates are every subject
    /// named by a binding that applies to the request's namespace; each is
    /// checked with the same evaluation as [`authorize`](Self::authorize).
    pub fn who_can(&self, req: &AuthorizationRequest) -> Vec<Subject> {
        let bindings: Vec<Binding<'_>> = match req.namespace.as_deref() {
            Some(ns) => self.store.list_bindings(Some(ns)),
            None => self
                .store
                .cluster_role_bindings()
                .map(Binding::Cluster)
                .collect(),
        };

        let candidates: BTreeSet<&Subject> =
            bindings.iter().flat_map(|b| b.subjects().iter()).collect();

        candidates
            .into_iter()
            .filter(|subject| self.evaluate(&req.for_subject((*subject).clone())).allowed)
            .cloned()
            .collect()
    }

    fn evaluate(&self, req: &AuthorizationRequest) -> AuthorizationDecision {
        let resolution =
            BindingResolver::new(self.store).resolve_roles(&req.subject, req.namespace.as_deref());

        let matched_rule = resolution.bindings.iter().find_map(|resolved| {
            resolved
                .source
                .rules
                .iter()
                .position(|rule| rules::matches(rule, req))
                .map(|rule_index| MatchedRule {
                    binding: resolved.binding.clone(),
                    role: resolved.source.role.clone(),
                    rule_index,
                    rule: resolved.source.rules[rule_index].clone(),
                })
        });

        AuthorizationDecision {
            allowed: matched_rule.is_some(),
            matched_rule,
            evaluated_bindings: resolution.considered,
            diagnostics: resolution.diagnostics,
        }
    }
}
