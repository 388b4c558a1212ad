//! RBAC object model.
//!
//! The five object kinds the store indexes, plus the references used to
//! name them in traces and findings. Field names on the wire follow the
//! upstream manifest schema (`roleRef`, `subjects`, `rules`).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::rules::PolicyRule;
use crate::subject::Subject;

/// API group of the RBAC kinds.
pub const RBAC_API_GROUP: &str = "rbac.authorization.k8s.io";

/// Discriminator over the object kinds the store accepts.
///
/// Declaration order is the sort order used for stable output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    ServiceAccount,
    Role,
    ClusterRole,
    RoleBinding,
    ClusterRoleBinding,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::ServiceAccount => "ServiceAccount",
            ObjectKind::Role => "Role",
            ObjectKind::ClusterRole => "ClusterRole",
            ObjectKind::RoleBinding => "RoleBinding",
            ObjectKind::ClusterRoleBinding => "ClusterRoleBinding",
        }
    }

    /// Parses the manifest `kind` field. Unknown kinds yield `None`.
    pub fn from_kind(kind: &str) -> Option<Self> {
        match kind {
            "ServiceAccount" => Some(ObjectKind::ServiceAccount),
            "Role" => Some(ObjectKind::Role),
            "ClusterRole" => Some(ObjectKind::ClusterRole),
            "RoleBinding" => Some(ObjectKind::RoleBinding),
            "ClusterRoleBinding" => Some(ObjectKind::ClusterRoleBinding),
            _ => None,
        }
    }

    /// Returns whether objects of this kind live in a namespace.
    pub fn is_namespaced(&self) -> bool {
        match self {
            ObjectKind::ServiceAccount | ObjectKind::Role | ObjectKind::RoleBinding => true,
            ObjectKind::ClusterRole | ObjectKind::ClusterRoleBinding => false,
        }
    }

    /// Expected `apiVersion` for manifests of this kind.
    pub fn api_version(&self) -> &'static str {
        match self {
            ObjectKind::ServiceAccount => "v1",
            _ => "rbac.authorization.k8s.io/v1",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Store key and display handle: `(kind, namespace, name)`.
///
/// Ordering is kind, then namespace (cluster-scoped first), then name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    pub kind: ObjectKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectRef {
    pub fn new(kind: ObjectKind, namespace: Option<&str>, name: impl Into<String>) -> Self {
        Self {
            kind,
            namespace: namespace.map(str::to_string),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{ns}/{}", self.kind, self.name),
            None => write!(f, "{}/{}", self.kind, self.name),
        }
    }
}

/// Kind a binding's `roleRef` may point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RoleRefKind {
    Role,
    ClusterRole,
}

impl RoleRefKind {
    pub fn object_kind(&self) -> ObjectKind {
        match self {
            RoleRefKind::Role => ObjectKind::Role,
            RoleRefKind::ClusterRole => ObjectKind::ClusterRole,
        }
    }
}

impl fmt::Display for RoleRefKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.object_kind(), f)
    }
}

/// Reference from a binding to the role it grants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleRef {
    #[serde(default = "default_rbac_api_group")]
    pub api_group: String,
    pub kind: RoleRefKind,
    pub name: String,
}

fn default_rbac_api_group() -> String {
    RBAC_API_GROUP.to_string()
}

impl RoleRef {
    pub fn role(name: impl Into<String>) -> Self {
        Self {
            api_group: default_rbac_api_group(),
            kind: RoleRefKind::Role,
            name: name.into(),
        }
    }

    pub fn cluster_role(name: impl Into<String>) -> Self {
        Self {
            api_group: default_rbac_api_group(),
            kind: RoleRefKind::ClusterRole,
            name: name.into(),
        }
    }
}

/// Namespaced workload identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAccount {
    pub name: String,
    pub namespace: String,
}

impl ServiceAccount {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }

    /// The subject this account authenticates as.
    pub fn subject(&self) -> Subject {
        Subject::service_account(self.namespace.clone(), self.name.clone())
    }
}

/// Namespace-scoped permission set.
///
/// Rule order is irrelevant for matching; it only determines the rule
/// index reported in decision traces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    pub namespace: String,
    pub rules: Vec<PolicyRule>,
}

impl Role {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            rules: Vec::new(),
        }
    }

    pub fn with_rule(mut self, rule: PolicyRule) -> Self {
        self.rules.push(rule);
        self
    }
}

/// Cluster-scoped permission set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterRole {
    pub name: String,
    pub rules: Vec<PolicyRule>,
}

impl ClusterRole {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rules: Vec::new(),
        }
    }

    pub fn with_rule(mut self, rule: PolicyRule) -> Self {
        self.rules.push(rule);
        self
    }
}

/// Grants a Role, or a ClusterRole scoped down to this namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleBinding {
    pub name: String,
    pub namespace: String,
    pub role_ref: RoleRef,
    pub subjects: Vec<Subject>,
}

impl RoleBinding {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, role_ref: RoleRef) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            role_ref,
            subjects: Vec::new(),
        }
    }

    pub fn with_subject(mut self, subject: Subject) -> Self {
        self.subjects.push(subject);
        self
    }
}

/// Grants a ClusterRole across every namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRoleBinding {
    pub name: String,
    pub role_ref: RoleRef,
    pub subjects: Vec<Subject>,
}

impl ClusterRoleBinding {
    pub fn new(name: impl Into<String>, cluster_role: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role_ref: RoleRef::cluster_role(cluster_role),
            subjects: Vec::new(),
        }
    }

    pub fn with_subject(mut self, subject: Subject) -> Self {
        self.subjects.push(subject);
        self
    }
}

/// Sum type over every object the store accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RbacObject {
    ServiceAccount(ServiceAccount),
    Role(Role),
    ClusterRole(ClusterRole),
    RoleBinding(RoleBinding),
    ClusterRoleBinding(ClusterRoleBinding),
}

impl RbacObject {
    pub fn kind(&self) -> ObjectKind {
        match self {
            RbacObject::ServiceAccount(_) => ObjectKind::ServiceAccount,
            RbacObject::Role(_) => ObjectKind::Role,
            RbacObject::ClusterRole(_) => ObjectKind::ClusterRole,
            RbacObject::RoleBinding(_) => ObjectKind::RoleBinding,
            RbacObject::ClusterRoleBinding(_) => ObjectKind::ClusterRoleBinding,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            RbacObject::ServiceAccount(o) => &o.name,
            RbacObject::Role(o) => &o.name,
            RbacObject::ClusterRole(o) => &o.name,
            RbacObject::RoleBinding(o) => &o.name,
            RbacObject::ClusterRoleBinding(o) => &o.name,
        }
    }

    /// Namespace of namespaced kinds; `None` for cluster-scoped kinds.
    pub fn namespace(&self) -> Option<&str> {
        match self {
            RbacObject::ServiceAccount(o) => Some(o.namespace.as_str()),
            RbacObject::Role(o) => Some(o.namespace.as_str()),
            RbacObject::RoleBinding(o) => Some(o.namespace.as_str()),
            RbacObject::ClusterRole(_) | RbacObject::ClusterRoleBinding(_) => None,
        }
    }

    pub fn object_ref(&self) -> ObjectRef {
        ObjectRef::new(self.kind(), self.namespace(), self.name())
    }

    /// Rules carried by Roles and ClusterRoles.
    pub fn rules(&self) -> Option<&[PolicyRule]> {
        match self {
            RbacObject::Role(o) => Some(o.rules.as_slice()),
            RbacObject::ClusterRole(o) => Some(o.rules.as_slice()),
            _ => None,
        }
    }

    /// View of this object as a binding, if it is one.
    pub fn as_binding(&self) -> Option<Binding<'_>> {
        match self {
            RbacObject::RoleBinding(b) => Some(Binding::Namespaced(b)),
            RbacObject::ClusterRoleBinding(b) => Some(Binding::Cluster(b)),
            _ => None,
        }
    }
}

impl From<ServiceAccount> for RbacObject {
    fn from(o: ServiceAccount) -> Self {
        RbacObject::ServiceAccount(o)
    }
}

impl From<Role> for RbacObject {
    fn from(o: Role) -> Self {
        RbacObject::Role(o)
    }
}

impl From<ClusterRole> for RbacObject {
    fn from(o: ClusterRole) -> Self {
        RbacObject::ClusterRole(o)
    }
}

impl From<RoleBinding> for RbacObject {
    fn from(o: RoleBinding) -> Self {
        RbacObject::RoleBinding(o)
    }
}

impl From<ClusterRoleBinding> for RbacObject {
    fn from(o: ClusterRoleBinding) -> Self {
        RbacObject::ClusterRoleBinding(o)
    }
}

/// Borrowed view over either binding kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding<'a> {
    Namespaced(&'a RoleBinding),
    Cluster(&'a ClusterRoleBinding),
}

impl<'a> Binding<'a> {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Binding::Namespaced(_) => ObjectKind::RoleBinding,
            Binding::Cluster(_) => ObjectKind::ClusterRoleBinding,
        }
    }

    pub fn name(&self) -> &'a str {
        match self {
            Binding::Namespaced(b) => &b.name,
            Binding::Cluster(b) => &b.name,
        }
    }

    pub fn namespace(&self) -> Option<&'a str> {
        match self {
            Binding::Namespaced(b) => Some(b.namespace.as_str()),
            Binding::Cluster(_) => None,
        }
    }

    pub fn role_ref(&self) -> &'a RoleRef {
        match self {
            Binding::Namespaced(b) => &b.role_ref,
            Binding::Cluster(b) => &b.role_ref,
        }
    }

    pub fn subjects(&self) -> &'a [Subject] {
        match self {
            Binding::Namespaced(b) => &b.subjects,
            Binding::Cluster(b) => &b.subjects,
        }
    }

    /// Returns whether this binding names the subject.
    ///
    /// Users and groups compare by name; service accounts by name and
    /// namespace. Kinds never cross-match.
    pub fn grants_to(&self, subject: &Subject) -> bool {
        self.subjects().iter().any(|s| s == subject)
    }

    pub fn object_ref(&self) -> ObjectRef {
        ObjectRef::new(self.kind(), self.namespace(), self.name())
    }
}
