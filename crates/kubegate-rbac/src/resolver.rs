//! Binding resolution.
//!
//! Given a subject and an optional namespace, enumerates every rule set
//! bound to the subject:
//! 1. ClusterRoleBindings naming the subject, granting their ClusterRole
//!    cluster-wide
//! 2. with a namespace, RoleBindings in that namespace naming the subject,
//!    granting a Role or a ClusterRole scoped to that namespace
//!
//! A binding whose `roleRef` does not resolve is inert: it is recorded as a
//! [`ResolutionDiagnostic`] and resolution continues with the rest.

use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::objects::{Binding, ObjectKind, ObjectRef, RoleRefKind};
use crate::rules::PolicyRule;
use crate::store::ResourceStore;
use crate::subject::Subject;

/// Where the rules of a resolved binding apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum GrantScope {
    /// Every namespace, and cluster-scoped requests.
    Cluster,
    /// Only requests in this namespace.
    Namespace(String),
}

impl fmt::Display for GrantScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrantScope::Cluster => f.write_str("cluster-wide"),
            GrantScope::Namespace(ns) => write!(f, "namespace {ns}"),
        }
    }
}

/// The rule set a binding grants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSource<'a> {
    /// The Role or ClusterRole the rules come from.
    pub role: ObjectRef,
    pub scope: GrantScope,
    pub rules: &'a [PolicyRule],
}

/// A binding together with the rules it resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBinding<'a> {
    pub binding: ObjectRef,
    pub source: RuleSource<'a>,
}

/// Non-fatal problem found while resolving bindings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "type")]
pub enum ResolutionDiagnostic {
    /// The binding's `roleRef` names a role that is not in the store.
    DanglingRoleRef { binding: ObjectRef, role: ObjectRef },
}

impl fmt::Display for ResolutionDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionDiagnostic::DanglingRoleRef { binding, role } => {
                write!(f, "{binding} references missing {role}")
            }
        }
    }
}

/// Everything bound to one subject, in evaluation order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution<'a> {
    /// Bindings that resolved, ClusterRoleBindings first.
    pub bindings: Vec<ResolvedBinding<'a>>,

    /// Every binding naming the subject, including inert ones.
    pub considered: Vec<ObjectRef>,

    pub diagnostics: Vec<ResolutionDiagnostic>,
}

/// Binding Resolver over a loaded store.
#[derive(Debug, Clone, Copy)]
pub struct BindingResolver<'a> {
    store: &'a ResourceStore,
}

impl<'a> BindingResolver<'a> {
    pub fn new(store: &'a ResourceStore) -> Self {
        Self { store }
    }

    /// Collects the rule sources bound to `subject`.
    ///
    /// Without a namespace only ClusterRoleBindings are consulted:
    /// namespaced grants never apply to cluster-scoped requests.
    pub fn resolve_roles(&self, subject: &Subject, namespace: Option<&str>) -> Resolution<'a> {
        let mut resolution = Resolution::default();

        let candidates = match namespace {
            Some(_) => self.store.list_bindings(namespace),
            None => self
                .store
                .cluster_role_bindings()
                .map(Binding::Cluster)
                .collect(),
        };

        for binding in candidates.into_iter().filter(|b| b.grants_to(subject)) {
            let binding_ref = binding.object_ref();
            resolution.considered.push(binding_ref.clone());

            match self.resolve_binding(binding) {
                Ok(source) => {
                    debug!(
                        subject = %subject,
                        binding = %binding_ref,
                        role = %source.role,
                        "Resolved binding"
                    );
                    resolution.bindings.push(ResolvedBinding {
                        binding: binding_ref,
                        source,
                    });
                }
                Err(diagnostic) => {
                    debug!(subject = %subject, diagnostic = %diagnostic, "Skipping inert binding");
                    resolution.diagnostics.push(diagnostic);
                }
            }
        }

        resolution
    }

    /// Resolves a single binding's `roleRef`.
    pub fn resolve_binding(
        &self,
        binding: Binding<'a>,
    ) -> Result<RuleSource<'a>, ResolutionDiagnostic> {
        let role_ref = binding.role_ref();
        let store = self.store;

        let (role, rules) = match (binding, role_ref.kind) {
            (Binding::Namespaced(b), RoleRefKind::Role) => (
                ObjectRef::new(ObjectKind::Role, Some(b.namespace.as_str()), &role_ref.name),
                store
                    .role(&b.namespace, &role_ref.name)
                    .map(|r| r.rules.as_slice()),
            ),
            (_, RoleRefKind::ClusterRole) => (
                ObjectRef::new(ObjectKind::ClusterRole, None, &role_ref.name),
                store
                    .cluster_role(&role_ref.name)
                    .map(|r| r.rules.as_slice()),
            ),
            // Rejected at load time; treated as dangling if constructed by hand.
            (Binding::Cluster(_), RoleRefKind::Role) => (
                ObjectRef::new(ObjectKind::Role, None, &role_ref.name),
                None,
            ),
        };

        let Some(rules) = rules else {
            return Err(ResolutionDiagnostic::DanglingRoleRef {
                binding: binding.object_ref(),
                role,
            });
        };

        let scope = match binding.namespace() {
            Some(ns) => GrantScope::Namespace(ns.to_string()),
            None => GrantScope::Cluster,
        };

        Ok(RuleSource { role, scope, rules })
    }
}
