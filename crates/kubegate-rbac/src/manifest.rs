//! Manifest decoding.
//!
//! Turns upstream-shaped manifests into [`RbacObject`]s. Input may be a YAML
//! stream of `---` separated documents or JSON (a YAML subset). `kind: List`
//! and `<Kind>List` wrappers, as produced by `kubectl get -o yaml`, are
//! unwrapped recursively.
//!
//! Decoding is a pure function of the input text; reading files is the
//! caller's job.

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::objects::{
    ClusterRole, ClusterRoleBinding, ObjectKind, RbacObject, Role, RoleBinding, RoleRef,
    ServiceAccount,
};
use crate::rules::PolicyRule;
use crate::store::{LoadError, LoadSummary, ResourceStore, Result};
use crate::subject::{RawSubject, Subject};

/// Options controlling manifest decoding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Skip documents of unknown kinds instead of failing.
    pub ignore_unsupported_kinds: bool,

    /// Namespace assigned to namespaced objects that omit
    /// `metadata.namespace`, like `kubectl apply -n`.
    pub default_namespace: Option<String>,
}

impl DecodeOptions {
    pub fn ignore_unsupported_kinds(mut self, ignore: bool) -> Self {
        self.ignore_unsupported_kinds = ignore;
        self
    }

    pub fn with_default_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.default_namespace = Some(namespace.into());
        self
    }
}

#[derive(Debug, Default, Deserialize)]
struct ObjectMeta {
    #[serde(default)]
    name: String,
    #[serde(default)]
    namespace: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RoleManifest {
    #[serde(default)]
    rules: Option<Vec<PolicyRule>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BindingManifest {
    role_ref: RoleRef,
    #[serde(default)]
    subjects: Option<Vec<RawSubject>>,
}

/// Decodes every RBAC object in `input`.
pub fn decode_str(input: &str, options: &DecodeOptions) -> Result<Vec<RbacObject>> {
    let mut objects = Vec::new();

    for (index, document) in serde_yaml::Deserializer::from_str(input).enumerate() {
        let value =
            Value::deserialize(document).map_err(|e| LoadError::Decode(e.to_string()))?;
        if value.is_null() {
            continue;
        }
        decode_value(value, index + 1, options, &mut objects)?;
    }

    debug!(count = objects.len(), "Decoded manifest objects");
    Ok(objects)
}

fn decode_value(
    value: Value,
    document: usize,
    options: &DecodeOptions,
    out: &mut Vec<RbacObject>,
) -> Result<()> {
    let Some(kind) = value.get("kind").and_then(Value::as_str).map(str::to_string) else {
        return Err(LoadError::Malformed {
            object: format!("document #{document}"),
            reason: "missing 'kind'".to_string(),
        });
    };

    if kind.ends_with("List") {
        if let Some(items) = value.get("items").and_then(Value::as_array) {
            for item in items {
                decode_value(item.clone(), document, options, out)?;
            }
            return Ok(());
        }
    }

    let Some(object_kind) = ObjectKind::from_kind(&kind) else {
        if options.ignore_unsupported_kinds {
            warn!(kind = %kind, document, "Skipping unsupported kind");
            return Ok(());
        }
        return Err(LoadError::UnsupportedKind { kind });
    };

    if let Some(api_version) = value.get("apiVersion").and_then(Value::as_str) {
        if api_version != object_kind.api_version() {
            warn!(
                kind = %kind,
                api_version = %api_version,
                expected = object_kind.api_version(),
                "Unexpected apiVersion"
            );
        }
    }

    let metadata: ObjectMeta = match value.get("metadata") {
        Some(meta) => ObjectMeta::deserialize(meta).map_err(|e| LoadError::Malformed {
            object: format!("{kind} in document #{document}"),
            reason: format!("invalid metadata: {e}"),
        })?,
        None => ObjectMeta::default(),
    };

    let label = if metadata.name.is_empty() {
        format!("{kind} in document #{document}")
    } else {
        format!("{kind} '{}'", metadata.name)
    };
    let malformed = |reason: String| LoadError::Malformed {
        object: label.clone(),
        reason,
    };

    let namespace = metadata.namespace.filter(|ns| !ns.is_empty());
    let namespace = if object_kind.is_namespaced() {
        namespace
            .or_else(|| options.default_namespace.clone())
            .ok_or_else(|| malformed("metadata.namespace is required".to_string()))?
    } else {
        if namespace.is_some() {
            return Err(malformed(
                "cluster-scoped object must not set metadata.namespace".to_string(),
            ));
        }
        String::new()
    };
    let name = metadata.name;

    let object: RbacObject = match object_kind {
        ObjectKind::ServiceAccount => ServiceAccount { name, namespace }.into(),
        ObjectKind::Role | ObjectKind::ClusterRole => {
            let manifest =
                RoleManifest::deserialize(&value).map_err(|e| malformed(e.to_string()))?;
            let rules = manifest.rules.unwrap_or_default();
            if object_kind == ObjectKind::Role {
                Role {
                    name,
                    namespace,
                    rules,
                }
                .into()
            } else {
                ClusterRole { name, rules }.into()
            }
        }
        ObjectKind::RoleBinding | ObjectKind::ClusterRoleBinding => {
            let manifest =
                BindingManifest::deserialize(&value).map_err(|e| malformed(e.to_string()))?;
            let namespaced = object_kind == ObjectKind::RoleBinding;
            let subjects = manifest
                .subjects
                .unwrap_or_default()
                .into_iter()
                .map(|raw| {
                    let raw = if namespaced {
                        raw.or_namespace(&namespace)
                    } else {
                        raw
                    };
                    Subject::try_from(raw)
                })
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| malformed(e.to_string()))?;
            if namespaced {
                RoleBinding {
                    name,
                    namespace,
                    role_ref: manifest.role_ref,
                    subjects,
                }
                .into()
            } else {
                ClusterRoleBinding {
                    name,
                    role_ref: manifest.role_ref,
                    subjects,
                }
                .into()
            }
        }
    };

    out.push(object);
    Ok(())
}

impl ResourceStore {
    /// Decodes `input` and loads the result as one atomic batch.
    pub fn load_manifests(&mut self, input: &str, options: &DecodeOptions) -> Result<LoadSummary> {
        let objects = decode_str(input, options)?;
        self.load(objects)
    }
}
