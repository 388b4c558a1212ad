//! Policy rules and the rule matcher.
//!
//! A [`PolicyRule`] is the permission tuple
//! `apiGroups x resources x resourceNames x verbs`. Matching is exact and
//! case-sensitive, except that the wildcard `"*"` anywhere in a set matches
//! every value for that field.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::engine::AuthorizationRequest;

/// Sentinel matching any value in its field.
pub const WILDCARD: &str = "*";

/// Verbs that together with `get` and `list` amount to full control of a
/// resource.
pub const WRITE_VERBS: [&str; 4] = ["create", "update", "patch", "delete"];

/// Read verbs that complete the admin-equivalent verb set.
pub const READ_VERBS: [&str; 2] = ["get", "list"];

/// Permission tuple granted by a Role or ClusterRole.
///
/// Field names follow the upstream manifest schema. `nonResourceURLs` is
/// accepted on input and ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyRule {
    /// API groups; `""` is the core group.
    #[serde(default)]
    pub api_groups: Vec<String>,

    /// Resource types, e.g. `"pods"` or `"deployments"`.
    #[serde(default)]
    pub resources: Vec<String>,

    /// Specific object names. Empty means any name.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_names: Vec<String>,

    /// Verbs, e.g. `"get"`, `"list"`, `"watch"`.
    #[serde(default)]
    pub verbs: Vec<String>,
}

impl PolicyRule {
    /// Creates a rule over the given API groups, resources and verbs.
    pub fn new<G, R, V>(api_groups: G, resources: R, verbs: V) -> Self
    where
        G: IntoIterator,
        G::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
        V: IntoIterator,
        V::Item: Into<String>,
    {
        Self {
            api_groups: api_groups.into_iter().map(Into::into).collect(),
            resources: resources.into_iter().map(Into::into).collect(),
            resource_names: Vec::new(),
            verbs: verbs.into_iter().map(Into::into).collect(),
        }
    }

    /// Restricts the rule to specific object names.
    pub fn with_resource_names<N>(mut self, names: N) -> Self
    where
        N: IntoIterator,
        N::Item: Into<String>,
    {
        self.resource_names = names.into_iter().map(Into::into).collect();
        self
    }

    /// Returns whether this rule grants the request.
    pub fn matches(&self, req: &AuthorizationRequest) -> bool {
        matches(self, req)
    }

    /// A rule with no API groups can never match anything.
    pub fn is_malformed(&self) -> bool {
        self.api_groups.is_empty()
    }

    pub fn has_wildcard_verb(&self) -> bool {
        contains_wildcard(&self.verbs)
    }

    pub fn has_wildcard_resource(&self) -> bool {
        contains_wildcard(&self.resources)
    }

    pub fn has_wildcard_api_group(&self) -> bool {
        contains_wildcard(&self.api_groups)
    }

    /// Returns whether the verb set amounts to full control: either the
    /// wildcard, or every write verb together with `get` and `list`.
    pub fn has_admin_equivalent_verbs(&self) -> bool {
        self.has_wildcard_verb()
            || WRITE_VERBS
                .iter()
                .chain(READ_VERBS.iter())
                .all(|verb| self.verbs.iter().any(|v| v == verb))
    }

    /// Wildcard verb, resource and API group: unrestricted access.
    pub fn is_unrestricted(&self) -> bool {
        self.has_wildcard_verb() && self.has_wildcard_resource() && self.has_wildcard_api_group()
    }
}

impl fmt::Display for PolicyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let groups: Vec<&str> = self
            .api_groups
            .iter()
            .map(|g| if g.is_empty() { "core" } else { g.as_str() })
            .collect();
        write!(
            f,
            "apiGroups=[{}] resources=[{}] verbs=[{}]",
            groups.join(","),
            self.resources.join(","),
            self.verbs.join(",")
        )?;
        if !self.resource_names.is_empty() {
            write!(f, " resourceNames=[{}]", self.resource_names.join(","))?;
        }
        Ok(())
    }
}

/// Decides whether `rule` grants `req`.
///
/// Pure function. A rule with an empty `apiGroups` set is malformed and
/// never matches. An empty `resourceNames` set matches any name, including
/// requests that carry no name; a non-empty set only matches requests
/// naming one of its members.
pub fn matches(rule: &PolicyRule, req: &AuthorizationRequest) -> bool {
    if rule.is_malformed() {
        return false;
    }

    field_matches(&rule.api_groups, &req.api_group)
        && field_matches(&rule.resources, &req.resource)
        && field_matches(&rule.verbs, &req.verb)
        && resource_name_matches(&rule.resource_names, req.resource_name.as_deref())
}

fn contains_wildcard(values: &[String]) -> bool {
    values.iter().any(|v| v == WILDCARD)
}

fn field_matches(values: &[String], requested: &str) -> bool {
    values.iter().any(|v| v == WILDCARD || v == requested)
}

fn resource_name_matches(names: &[String], requested: Option<&str>) -> bool {
    if names.is_empty() || contains_wildcard(names) {
        return true;
    }
    requested.is_some_and(|name| names.iter().any(|n| n == name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subject::Subject;
    use test_case::test_case;

    fn request(verb: &str, api_group: &str, resource: &str) -> AuthorizationRequest {
        AuthorizationRequest::new(Subject::user("jane"), verb, api_group, resource)
    }

    fn pod_reader() -> PolicyRule {
        PolicyRule::new([""], ["pods"], ["get", "list"])
    }

    #[test_case("get", "", "pods" => true; "exact get")]
    #[test_case("list", "", "pods" => true; "exact list")]
    #[test_case("delete", "", "pods" => false; "verb not granted")]
    #[test_case("get", "apps", "pods" => false; "wrong api group")]
    #[test_case("get", "", "secrets" => false; "wrong resource")]
    #[test_case("GET", "", "pods" => false; "verbs are case sensitive")]
    #[test_case("get", "", "Pods" => false; "resources are case sensitive")]
    fn test_exact_matching(verb: &str, group: &str, resource: &str) -> bool {
        pod_reader().matches(&request(verb, group, resource))
    }

    #[test]
    fn test_wildcard_dominates_set() {
        let rule = PolicyRule::new([""], ["pods", "*"], ["get"]);
        assert!(rule.matches(&request("get", "", "configmaps")));
        assert!(rule.has_wildcard_resource());

        let rule = PolicyRule::new(["*"], ["deployments"], ["*"]);
        assert!(rule.matches(&request("escalate", "apps", "deployments")));
        assert!(rule.matches(&request("watch", "extensions", "deployments")));
        assert!(!rule.matches(&request("watch", "apps", "replicasets")));
    }

    #[test]
    fn test_empty_api_groups_fails_closed() {
        let rule = PolicyRule::new(Vec::<String>::new(), ["*"], ["*"]);
        assert!(rule.is_malformed());
        assert!(!rule.matches(&request("get", "", "pods")));
    }

    #[test]
    fn test_resource_names() {
        let rule = PolicyRule::new([""], ["configmaps"], ["get", "update"])
            .with_resource_names(["app-config"]);

        let named = request("get", "", "configmaps").with_resource_name("app-config");
        let other = request("get", "", "configmaps").with_resource_name("db-config");
        let unnamed = request("get", "", "configmaps");

        assert!(rule.matches(&named));
        assert!(!rule.matches(&other));
        assert!(!rule.matches(&unnamed));

        // No resourceNames: any name, or none, is fine.
        assert!(pod_reader().matches(&request("get", "", "pods").with_resource_name("web-0")));
    }

    #[test]
    fn test_admin_equivalent_verbs() {
        assert!(PolicyRule::new([""], ["pods"], ["*"]).has_admin_equivalent_verbs());
        assert!(
            PolicyRule::new(
                [""],
                ["pods"],
                ["get", "list", "create", "update", "patch", "delete"]
            )
            .has_admin_equivalent_verbs()
        );
        assert!(
            !PolicyRule::new([""], ["pods"], ["create", "update", "patch", "delete"])
                .has_admin_equivalent_verbs()
        );
        // Both reads are required alongside the writes.
        assert!(
            !PolicyRule::new([""], ["pods"], ["get", "create", "update", "patch", "delete"])
                .has_admin_equivalent_verbs()
        );
        assert!(!pod_reader().has_admin_equivalent_verbs());
    }

    #[test]
    fn test_unrestricted() {
        assert!(PolicyRule::new(["*"], ["*"], ["*"]).is_unrestricted());
        assert!(!PolicyRule::new([""], ["*"], ["*"]).is_unrestricted());
    }

    #[test]
    fn test_deserialize_upstream_field_names() {
        let json = r#"{
            "apiGroups": [""],
            "resources": ["configmaps"],
            "resourceNames": ["app-config"],
            "verbs": ["get"],
            "nonResourceURLs": ["/healthz"]
        }"#;
        let rule: PolicyRule = serde_json::from_str(json).unwrap();
        assert_eq!(rule.api_groups, vec![String::new()]);
        assert_eq!(rule.resource_names, vec!["app-config".to_string()]);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            pod_reader().to_string(),
            "apiGroups=[core] resources=[pods] verbs=[get,list]"
        );
    }
}
