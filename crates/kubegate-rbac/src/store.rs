//! In-memory index of RBAC objects.
//!
//! Objects are keyed by `(kind, namespace, name)`. Loading follows
//! declarative apply semantics: a duplicate key replaces the prior entry
//! unless [`LoadMode::Strict`] is selected. Loads are atomic; a batch that
//! fails validation leaves the store untouched.
//!
//! The store is plain owned data. Load it once (behind `&mut`), then share
//! it by reference with any number of readers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::objects::{
    Binding, ClusterRole, ClusterRoleBinding, ObjectKind, ObjectRef, RbacObject, Role,
    RoleBinding, RoleRefKind, ServiceAccount,
};

/// Error type for loading objects into the store.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The object violates a structural invariant.
    #[error("Malformed {object}: {reason}")]
    Malformed { object: String, reason: String },

    /// The manifest kind is not one of the five RBAC kinds.
    #[error("Unsupported kind '{kind}'")]
    UnsupportedKind { kind: String },

    /// Strict mode only: the key is already present with different content.
    #[error("Conflicting duplicate for {object}")]
    DuplicateWithConflict { object: ObjectRef },

    /// The input was not valid YAML or JSON.
    #[error("Failed to decode manifest: {0}")]
    Decode(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, LoadError>;

/// How duplicate keys are handled during [`ResourceStore::load`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoadMode {
    /// Last write wins.
    #[default]
    Replace,

    /// A duplicate with different content aborts the load. Identical
    /// duplicates are accepted.
    Strict,
}

/// Outcome counters of a successful load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub inserted: usize,
    pub replaced: usize,
    pub unchanged: usize,
}

/// Resource Store: the single source of RBAC objects for every query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceStore {
    objects: BTreeMap<ObjectRef, RbacObject>,
    mode: LoadMode,
}

impl ResourceStore {
    /// Creates an empty store in [`LoadMode::Replace`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the duplicate handling mode.
    pub fn with_mode(mut self, mode: LoadMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> LoadMode {
        self.mode
    }

    /// Validates and inserts a batch of objects.
    ///
    /// Every object is validated before anything is inserted, so an error
    /// leaves the store exactly as it was.
    pub fn load<I>(&mut self, resources: I) -> Result<LoadSummary>
    where
        I: IntoIterator<Item = RbacObject>,
    {
        let mut staged: BTreeMap<ObjectRef, RbacObject> = BTreeMap::new();

        for object in resources {
            validate(&object)?;
            let key = object.object_ref();

            if self.mode == LoadMode::Strict {
                let existing = staged.get(&key).or_else(|| self.objects.get(&key));
                if existing.is_some_and(|e| *e != object) {
                    warn!(object = %key, "Conflicting duplicate rejected in strict mode");
                    return Err(LoadError::DuplicateWithConflict { object: key });
                }
            }

            staged.insert(key, object);
        }

        let mut summary = LoadSummary::default();
        for (key, object) in staged {
            match self.objects.get(&key) {
                Some(existing) if *existing == object => summary.unchanged += 1,
                Some(_) => summary.replaced += 1,
                None => summary.inserted += 1,
            }
            self.objects.insert(key, object);
        }

        info!(
            inserted = summary.inserted,
            replaced = summary.replaced,
            unchanged = summary.unchanged,
            total = self.objects.len(),
            "RBAC objects loaded"
        );

        Ok(summary)
    }

    /// Looks up an object by kind, namespace and name.
    ///
    /// Cluster-scoped kinds are found with `namespace = None`.
    pub fn get(&self, kind: ObjectKind, namespace: Option<&str>, name: &str) -> Option<&RbacObject> {
        self.objects.get(&ObjectRef::new(kind, namespace, name))
    }

    /// Removes an object, returning it if present.
    ///
    /// Together with [`load`](Self::load) this models updates as
    /// remove-then-reinsert.
    pub fn remove(
        &mut self,
        kind: ObjectKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Option<RbacObject> {
        self.objects.remove(&ObjectRef::new(kind, namespace, name))
    }

    pub fn role(&self, namespace: &str, name: &str) -> Option<&Role> {
        match self.get(ObjectKind::Role, Some(namespace), name) {
            Some(RbacObject::Role(role)) => Some(role),
            _ => None,
        }
    }

    pub fn cluster_role(&self, name: &str) -> Option<&ClusterRole> {
        match self.get(ObjectKind::ClusterRole, None, name) {
            Some(RbacObject::ClusterRole(role)) => Some(role),
            _ => None,
        }
    }

    pub fn service_account(&self, namespace: &str, name: &str) -> Option<&ServiceAccount> {
        match self.get(ObjectKind::ServiceAccount, Some(namespace), name) {
            Some(RbacObject::ServiceAccount(sa)) => Some(sa),
            _ => None,
        }
    }

    /// All objects in key order.
    pub fn objects(&self) -> impl Iterator<Item = &RbacObject> {
        self.objects.values()
    }

    pub fn service_accounts(&self) -> impl Iterator<Item = &ServiceAccount> {
        self.objects.values().filter_map(|o| match o {
            RbacObject::ServiceAccount(sa) => Some(sa),
            _ => None,
        })
    }

    pub fn roles(&self) -> impl Iterator<Item = &Role> {
        self.objects.values().filter_map(|o| match o {
            RbacObject::Role(role) => Some(role),
            _ => None,
        })
    }

    pub fn cluster_roles(&self) -> impl Iterator<Item = &ClusterRole> {
        self.objects.values().filter_map(|o| match o {
            RbacObject::ClusterRole(role) => Some(role),
            _ => None,
        })
    }

    pub fn role_bindings(&self) -> impl Iterator<Item = &RoleBinding> {
        self.objects.values().filter_map(|o| match o {
            RbacObject::RoleBinding(b) => Some(b),
            _ => None,
        })
    }

    pub fn cluster_role_bindings(&self) -> impl Iterator<Item = &ClusterRoleBinding> {
        self.objects.values().filter_map(|o| match o {
            RbacObject::ClusterRoleBinding(b) => Some(b),
            _ => None,
        })
    }

    /// Lists bindings, ClusterRoleBindings first, each group in name order.
    ///
    /// With a namespace, only that namespace's RoleBindings follow the
    /// ClusterRoleBindings (the bindings that can apply there). Without
    /// one, every RoleBinding in the store follows.
    pub fn list_bindings(&self, namespace: Option<&str>) -> Vec<Binding<'_>> {
        let cluster = self.cluster_role_bindings().map(Binding::Cluster);
        let namespaced = self
            .role_bindings()
            .filter(|b| namespace.is_none_or(|ns| b.namespace == ns))
            .map(Binding::Namespaced);
        cluster.chain(namespaced).collect()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// Checks the structural invariants every stored object must satisfy.
fn validate(object: &RbacObject) -> Result<()> {
    let malformed = |reason: &str| LoadError::Malformed {
        object: object.object_ref().to_string(),
        reason: reason.to_string(),
    };

    if object.name().is_empty() {
        return Err(malformed("name must not be empty"));
    }

    if object.kind().is_namespaced() && object.namespace().is_none_or(str::is_empty) {
        return Err(malformed("namespace must not be empty"));
    }

    if let Some(binding) = object.as_binding() {
        let role_ref = binding.role_ref();
        if role_ref.name.is_empty() {
            return Err(malformed("roleRef.name must not be empty"));
        }
        if matches!(binding, Binding::Cluster(_)) && role_ref.kind != RoleRefKind::ClusterRole {
            return Err(malformed("ClusterRoleBinding may only reference a ClusterRole"));
        }
    }

    Ok(())
}
