//! Subject identities referenced by bindings and authorization requests.
//!
//! A subject is one of three kinds:
//! - User: an externally authenticated human or client certificate
//! - Group: a named set of users
//! - ServiceAccount: a namespaced workload identity

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Prefix kubectl uses to impersonate a service account.
pub const SERVICE_ACCOUNT_USER_PREFIX: &str = "system:serviceaccount:";

/// Kind of a [`Subject`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SubjectKind {
    User,
    Group,
    ServiceAccount,
}

impl SubjectKind {
    /// Returns the manifest spelling of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectKind::User => "User",
            SubjectKind::Group => "Group",
            SubjectKind::ServiceAccount => "ServiceAccount",
        }
    }
}

impl fmt::Display for SubjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error produced when a subject violates its invariants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubjectError {
    #[error("subject name must not be empty")]
    EmptyName,

    #[error("ServiceAccount subject '{name}' requires a namespace")]
    MissingNamespace { name: String },

    #[error("{kind} subject '{name}' must not carry a namespace")]
    UnexpectedNamespace { kind: SubjectKind, name: String },
}

/// Identity reference: who is asking, or who a binding grants to.
///
/// Immutable once constructed. The namespace is present iff the kind is
/// [`SubjectKind::ServiceAccount`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawSubject", into = "RawSubject")]
pub struct Subject {
    kind: SubjectKind,
    name: String,
    namespace: Option<String>,
}

impl Subject {
    /// Creates a user subject.
    pub fn user(name: impl Into<String>) -> Self {
        Self {
            kind: SubjectKind::User,
            name: name.into(),
            namespace: None,
        }
    }

    /// Creates a group subject.
    pub fn group(name: impl Into<String>) -> Self {
        Self {
            kind: SubjectKind::Group,
            name: name.into(),
            namespace: None,
        }
    }

    /// Creates a service account subject.
    pub fn service_account(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: SubjectKind::ServiceAccount,
            name: name.into(),
            namespace: Some(namespace.into()),
        }
    }

    /// Builds a subject from its parts, enforcing the namespace invariant.
    pub fn new(
        kind: SubjectKind,
        name: impl Into<String>,
        namespace: Option<String>,
    ) -> Result<Self, SubjectError> {
        let name = name.into();
        if name.is_empty() {
            return Err(SubjectError::EmptyName);
        }

        // Empty namespace strings are how exports spell "absent".
        let namespace = namespace.filter(|ns| !ns.is_empty());

        match (kind, namespace) {
            (SubjectKind::ServiceAccount, None) => Err(SubjectError::MissingNamespace { name }),
            (SubjectKind::ServiceAccount, Some(ns)) => Ok(Self::service_account(ns, name)),
            (kind, Some(_)) => Err(SubjectError::UnexpectedNamespace { kind, name }),
            (kind, None) => Ok(Self {
                kind,
                name,
                namespace: None,
            }),
        }
    }

    pub fn kind(&self) -> SubjectKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Namespace of a service account; `None` for users and groups.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{ns}:{}", self.kind, self.name),
            None => write!(f, "{}/{}", self.kind, self.name),
        }
    }
}

/// Parses a kubectl `--as` style identity.
///
/// `system:serviceaccount:<namespace>:<name>` yields a service account;
/// anything else is treated as a user name.
impl FromStr for Subject {
    type Err = SubjectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(rest) = s.strip_prefix(SERVICE_ACCOUNT_USER_PREFIX) {
            let (namespace, name) = rest.split_once(':').unwrap_or((rest, ""));
            return Subject::new(
                SubjectKind::ServiceAccount,
                name,
                Some(namespace.to_string()),
            );
        }
        Subject::new(SubjectKind::User, s, None)
    }
}

/// Wire shape of a subject as it appears in binding manifests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawSubject {
    kind: SubjectKind,
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    api_group: Option<String>,
}

impl RawSubject {
    /// Fills a missing ServiceAccount namespace, as the API server does for
    /// subjects of a RoleBinding.
    pub(crate) fn or_namespace(mut self, namespace: &str) -> Self {
        if self.kind == SubjectKind::ServiceAccount
            && self.namespace.as_deref().is_none_or(str::is_empty)
        {
            self.namespace = Some(namespace.to_string());
        }
        self
    }
}

impl TryFrom<RawSubject> for Subject {
    type Error = SubjectError;

    fn try_from(raw: RawSubject) -> Result<Self, Self::Error> {
        Subject::new(raw.kind, raw.name, raw.namespace)
    }
}

impl From<Subject> for RawSubject {
    fn from(subject: Subject) -> Self {
        let api_group = match subject.kind {
            SubjectKind::ServiceAccount => None,
            SubjectKind::User | SubjectKind::Group => {
                Some("rbac.authorization.k8s.io".to_string())
            }
        };
        Self {
            kind: subject.kind,
            name: subject.name,
            namespace: subject.namespace,
            api_group,
        }
    }
}
