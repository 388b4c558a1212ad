//! # kubegate-rbac: Kubernetes RBAC policy evaluation
//!
//! Loads `rbac.authorization.k8s.io/v1` objects offline and answers:
//! - **Authorization**: can subject S perform verb V on resource R in namespace N?
//! - **Explanation**: which binding, role and rule granted it
//! - **Review**: who can perform an action, and what rules a subject holds
//! - **Least privilege**: wildcard grants, cluster-admin equivalents, dangling
//!   bindings and unused roles
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  Manifests (YAML / JSON)                     │
//! └─────────────────┬───────────────────────────┘
//!                   │ manifest::decode_str
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  ResourceStore                               │
//! │  keyed by (kind, namespace, name)            │
//! └──────┬──────────────────────────────┬───────┘
//!        │                              │
//!        ▼                              ▼
//! ┌──────────────────────┐   ┌──────────────────────┐
//! │  BindingResolver     │   │  Analyzer            │
//! │  subject -> rules    │   │  findings            │
//! └──────┬───────────────┘   └──────────────────────┘
//!        │
//!        ▼
//! ┌──────────────────────┐
//! │  Authorizer          │
//! │  first matching rule │
//! └──────────────────────┘
//! ```
//!
//! The store is read-only during evaluation. Authorization is additive:
//! there are no deny rules, so the first matching rule is the explanation.
//!
//! ## Examples
//!
//! ### Checking access
//!
//! ```
//! use kubegate_rbac::{Authorizer, DecodeOptions, ResourceStore, Subject};
//!
//! let manifests = r#"
//! kind: Role
//! apiVersion: rbac.authorization.k8s.io/v1
//! metadata: {name: pod-reader, namespace: default}
//! rules:
//!   - apiGroups: [""]
//!     resources: ["pods"]
//!     verbs: ["get", "list"]
//! ---
//! kind: RoleBinding
//! apiVersion: rbac.authorization.k8s.io/v1
//! metadata: {name: read-pods, namespace: default}
//! subjects:
//!   - {kind: User, name: jane, apiGroup: rbac.authorization.k8s.io}
//! roleRef: {kind: Role, name: pod-reader, apiGroup: rbac.authorization.k8s.io}
//! "#;
//!
//! let mut store = ResourceStore::new();
//! store.load_manifests(manifests, &DecodeOptions::default()).unwrap();
//!
//! let authorizer = Authorizer::new(&store);
//! let jane = Subject::user("jane");
//!
//! let verdict = authorizer.can_i(&jane, "get", "", "pods", None, Some("default"));
//! assert!(verdict.allowed);
//! assert_eq!(verdict.reason, "allowed by RoleBinding/read-pods -> Role/pod-reader rule #0");
//!
//! let verdict = authorizer.can_i(&jane, "delete", "", "pods", None, Some("default"));
//! assert!(!verdict.allowed);
//! ```
//!
//! ### Auditing a store
//!
//! ```
//! use kubegate_rbac::{analyze, Category, ClusterRole, PolicyRule, RbacObject, ResourceStore};
//!
//! let everything = ClusterRole::new("everything").with_rule(PolicyRule::new(["*"], ["*"], ["*"]));
//!
//! let mut store = ResourceStore::new();
//! store.load([RbacObject::from(everything)]).unwrap();
//!
//! let findings = analyze(&store);
//! assert!(findings.iter().any(|f| f.category == Category::WildcardVerb));
//! assert!(findings.iter().any(|f| f.category == Category::UnusedRole));
//! ```

pub mod analyzer;
pub mod engine;
pub mod manifest;
pub mod objects;
pub mod resolver;
pub mod rules;
pub mod store;
pub mod subject;

// Re-export commonly used types
pub use analyzer::{Analyzer, AnalyzerOptions, Category, Finding, Severity, analyze};
pub use engine::{
    AuthorizationDecision, AuthorizationRequest, Authorizer, GrantedRule, MatchedRule, Verdict,
};
pub use manifest::{DecodeOptions, decode_str};
pub use objects::{
    Binding, ClusterRole, ClusterRoleBinding, ObjectKind, ObjectRef, RbacObject, Role,
    RoleBinding, RoleRef, RoleRefKind, ServiceAccount,
};
pub use resolver::{BindingResolver, GrantScope, Resolution, ResolutionDiagnostic};
pub use rules::PolicyRule;
pub use store::{LoadError, LoadMode, LoadSummary, ResourceStore};
pub use subject::{Subject, SubjectError, SubjectKind};

#[cfg(test)]
mod tests;
