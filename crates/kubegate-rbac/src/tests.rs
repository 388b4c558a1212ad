//! End-to-end tests over manifests: decode, load, resolve, authorize, analyze.

#![allow(clippy::unwrap_used)] // Tests use unwrap for simplicity
#![allow(clippy::too_many_lines)] // Test functions can be long


use crate::analyzer::{Analyzer, AnalyzerOptions, Category, Severity, analyze};
use crate::engine::{AuthorizationRequest, Authorizer, NO_MATCH_REASON};
use crate::manifest::DecodeOptions;
use crate::objects::{ObjectKind, ObjectRef};
use crate::resolver::GrantScope;
use crate::store::{LoadError, LoadMode, ResourceStore};
use crate::subject::Subject;

// ============================================================================
// Fixtures
// ============================================================================

const POD_READER: &str = r#"
apiVersion: v1
kind: ServiceAccount
metadata:
  name: pod-reader
  namespace: default
---
apiVersion: rbac.authorization.k8s.io/v1
kind: Role
metadata:
  name: pod-reader
  namespace: default
rules:
  - apiGroups: [""]
    resources: ["pods"]
    verbs: ["get", "list"]
---
apiVersion: rbac.authorization.k8s.io/v1
kind: RoleBinding
metadata:
  name: read-pods
  namespace: default
subjects:
  - kind: ServiceAccount
    name: pod-reader
    namespace: default
roleRef:
  apiGroup: rbac.authorization.k8s.io
  kind: Role
  name: pod-reader
"#;

const CLUSTER_ADMINS: &str = r#"
apiVersion: rbac.authorization.k8s.io/v1
kind: ClusterRole
metadata:
  name: super-user
rules:
  - apiGroups: ["*"]
    resources: ["*"]
    verbs: ["*"]
---
apiVersion: rbac.authorization.k8s.io/v1
kind: ClusterRoleBinding
metadata:
  name: cluster-admins
subjects:
  - kind: Group
    name: cluster-admins
    apiGroup: rbac.authorization.k8s.io
roleRef:
  apiGroup: rbac.authorization.k8s.io
  kind: ClusterRole
  name: super-user
"#;

const DANGLING: &str = r#"
apiVersion: rbac.authorization.k8s.io/v1
kind: RoleBinding
metadata:
  name: deploy-bot
  namespace: ci
subjects:
  - kind: User
    name: bot
    apiGroup: rbac.authorization.k8s.io
roleRef:
  apiGroup: rbac.authorization.k8s.io
  kind: Role
  name: deployer
"#;

const ORPHAN_ROLE: &str = r#"
apiVersion: rbac.authorization.k8s.io/v1
kind: Role
metadata:
  name: secret-reader
  namespace: default
rules:
  - apiGroups: [""]
    resources: ["secrets"]
    verbs: ["get"]
"#;

fn store_from(manifests: &[&str]) -> ResourceStore {
    let mut store = ResourceStore::new();
    for manifest in manifests {
        store
            .load_manifests(manifest, &DecodeOptions::default())
            .unwrap();
    }
    store
}

fn pods(subject: &Subject, verb: &str) -> AuthorizationRequest {
    AuthorizationRequest::new(subject.clone(), verb, "", "pods").in_namespace("default")
}

// ============================================================================
// Namespaced grant through a RoleBinding
// ============================================================================

#[test]
fn test_service_account_reads_pods_in_its_namespace() {
    let store = store_from(&[POD_READER]);
    let authorizer = Authorizer::new(&store);
    let account = Subject::service_account("default", "pod-reader");

    let decision = authorizer.authorize(&pods(&account, "list"));
    assert!(decision.allowed);
    assert_eq!(
        decision.reason(),
        "allowed by RoleBinding/read-pods -> Role/pod-reader rule #0"
    );

    let decision = authorizer.authorize(&pods(&account, "delete"));
    assert!(!decision.allowed);
    assert_eq!(decision.reason(), NO_MATCH_REASON);
    assert_eq!(
        decision.evaluated_bindings,
        vec![ObjectRef::new(
            ObjectKind::RoleBinding,
            Some("default"),
            "read-pods"
        )]
    );
}

#[test]
fn test_namespaced_grant_does_not_leak() {
    let store = store_from(&[POD_READER]);
    let authorizer = Authorizer::new(&store).without_audit();
    let account = Subject::service_account("default", "pod-reader");

    let other_ns =
        AuthorizationRequest::new(account.clone(), "list", "", "pods").in_namespace("kube-system");
    assert!(!authorizer.authorize(&other_ns).allowed);

    let cluster_wide = AuthorizationRequest::new(account, "list", "", "pods");
    assert!(!authorizer.authorize(&cluster_wide).allowed);
}

#[test]
fn test_same_name_in_other_namespace_is_a_different_subject() {
    let store = store_from(&[POD_READER]);
    let authorizer = Authorizer::new(&store).without_audit();
    let impostor = Subject::service_account("staging", "pod-reader");

    assert!(!authorizer.authorize(&pods(&impostor, "list")).allowed);
}

#[test]
fn test_can_i_parses_service_account_username() {
    let store = store_from(&[POD_READER]);
    let authorizer = Authorizer::new(&store).without_audit();
    let account: Subject = "system:serviceaccount:default:pod-reader".parse().unwrap();

    let verdict = authorizer.can_i(&account, "get", "", "pods", Some("web-0"), Some("default"));
    assert!(verdict.allowed);
    assert_eq!(
        verdict.reason,
        "allowed by RoleBinding/read-pods -> Role/pod-reader rule #0"
    );
}

#[test]
fn test_service_account_subject_inherits_role_binding_namespace() {
    let manifest = POD_READER.replace(
        "    name: pod-reader\n    namespace: default\nroleRef:",
        "    name: pod-reader\nroleRef:",
    );
    assert_ne!(manifest, POD_READER);

    let store = store_from(&[manifest.as_str()]);
    let authorizer = Authorizer::new(&store).without_audit();

    let account = Subject::service_account("default", "pod-reader");
    let decision = authorizer.authorize(&pods(&account, "list"));
    assert!(decision.allowed);
    assert_eq!(
        decision.reason(),
        "allowed by RoleBinding/read-pods -> Role/pod-reader rule #0"
    );

    let impostor = Subject::service_account("staging", "pod-reader");
    let request = AuthorizationRequest::new(impostor, "list", "", "pods").in_namespace("staging");
    assert!(!authorizer.authorize(&request).allowed);
}

// ============================================================================
// Cluster-admin equivalent grant
// ============================================================================

#[test]
fn test_cluster_admin_equivalent_binding() {
    let store = store_from(&[CLUSTER_ADMINS]);
    let findings = analyze(&store);

    let admin: Vec<_> = findings
        .iter()
        .filter(|f| f.category == Category::ClusterAdminEquivalent)
        .collect();
    assert_eq!(admin.len(), 1);
    assert_eq!(admin[0].severity, Severity::Critical);
    assert_eq!(
        admin[0].object,
        ObjectRef::new(ObjectKind::ClusterRoleBinding, None, "cluster-admins")
    );
    assert!(admin[0].message.contains("Group/cluster-admins"));

    // Critical findings sort first.
    assert_eq!(findings[0].severity, Severity::Critical);
}

#[test]
fn test_cluster_admin_group_can_do_anything_anywhere() {
    let store = store_from(&[CLUSTER_ADMINS]);
    let authorizer = Authorizer::new(&store).without_audit();
    let admins = Subject::group("cluster-admins");

    let req = AuthorizationRequest::new(admins.clone(), "escalate", "rbac.authorization.k8s.io", "roles")
        .with_resource_name("anything")
        .in_namespace("kube-system");
    let decision = authorizer.authorize(&req);
    assert!(decision.allowed);
    assert_eq!(
        decision.reason(),
        "allowed by ClusterRoleBinding/cluster-admins -> ClusterRole/super-user rule #0"
    );

    let nodes = AuthorizationRequest::new(admins, "delete", "", "nodes");
    assert!(authorizer.authorize(&nodes).allowed);
}

// ============================================================================
// Dangling binding
// ============================================================================

#[test]
fn test_dangling_binding_denies_and_is_reported() {
    let store = store_from(&[DANGLING]);
    let authorizer = Authorizer::new(&store).without_audit();
    let bot = Subject::user("bot");

    let req = AuthorizationRequest::new(bot, "create", "apps", "deployments").in_namespace("ci");
    let decision = authorizer.authorize(&req);
    assert!(!decision.allowed);
    assert_eq!(decision.evaluated_bindings.len(), 1);
    assert_eq!(decision.diagnostics.len(), 1);

    let findings = analyze(&store);
    let dangling: Vec<_> = findings
        .iter()
        .filter(|f| f.category == Category::DanglingBinding)
        .collect();
    assert_eq!(dangling.len(), 1);
    assert_eq!(dangling[0].severity, Severity::Warning);
    assert_eq!(dangling[0].object.name, "deploy-bot");
    assert!(dangling[0].message.contains("Role/ci/deployer"));
}

#[test]
fn test_loading_missing_role_later_activates_binding() {
    let mut store = store_from(&[DANGLING]);
    store
        .load_manifests(
            "kind: Role\nmetadata:\n  name: deployer\n  namespace: ci\nrules:\n  - apiGroups: [apps]\n    resources: [deployments]\n    verbs: [create]\n",
            &DecodeOptions::default(),
        )
        .unwrap();

    let req = AuthorizationRequest::new(Subject::user("bot"), "create", "apps", "deployments")
        .in_namespace("ci");
    assert!(Authorizer::new(&store).without_audit().authorize(&req).allowed);
    assert!(
        analyze(&store)
            .iter()
            .all(|f| f.category != Category::DanglingBinding)
    );
}

// ============================================================================
// Unused role
// ============================================================================

#[test]
fn test_unused_role_reported_and_never_grants() {
    let store = store_from(&[POD_READER, ORPHAN_ROLE]);

    let findings = analyze(&store);
    let unused: Vec<_> = findings
        .iter()
        .filter(|f| f.category == Category::UnusedRole)
        .collect();
    assert_eq!(unused.len(), 1);
    assert_eq!(unused[0].severity, Severity::Info);
    assert_eq!(
        unused[0].object,
        ObjectRef::new(ObjectKind::Role, Some("default"), "secret-reader")
    );

    let authorizer = Authorizer::new(&store).without_audit();
    let secrets = AuthorizationRequest::new(Subject::user("anyone"), "get", "", "secrets")
        .in_namespace("default");
    assert!(authorizer.who_can(&secrets).is_empty());
}

#[test]
fn test_min_severity_filters_info() {
    let store = store_from(&[POD_READER, ORPHAN_ROLE, DANGLING]);
    let options = AnalyzerOptions {
        min_severity: Severity::Warning,
        ..AnalyzerOptions::default()
    };

    let findings = Analyzer::new(options).analyze(&store);
    assert!(!findings.is_empty());
    assert!(findings.iter().all(|f| f.severity >= Severity::Warning));
}

#[test]
fn test_missing_service_account_is_opt_in() {
    let store = store_from(&[
        "kind: RoleBinding\nmetadata:\n  name: ghost-sa\n  namespace: default\nroleRef:\n  kind: ClusterRole\n  name: view\nsubjects:\n  - kind: ServiceAccount\n    name: ghost\n    namespace: default\n",
        "kind: ClusterRole\nmetadata:\n  name: view\nrules:\n  - apiGroups: ['']\n    resources: [pods]\n    verbs: [get]\n",
    ]);

    assert!(
        analyze(&store)
            .iter()
            .all(|f| f.category != Category::MissingServiceAccount)
    );

    let options = AnalyzerOptions {
        report_missing_service_accounts: true,
        ..AnalyzerOptions::default()
    };
    let findings = Analyzer::new(options).analyze(&store);
    let missing: Vec<_> = findings
        .iter()
        .filter(|f| f.category == Category::MissingServiceAccount)
        .collect();
    assert_eq!(missing.len(), 1);
    assert!(missing[0].message.contains("default:ghost"));
}

// ============================================================================
// Review queries
// ============================================================================

#[test]
fn test_who_can_lists_every_allowed_subject() {
    let store = store_from(&[POD_READER, CLUSTER_ADMINS]);
    let authorizer = Authorizer::new(&store).without_audit();

    let req = pods(&Subject::user("ignored"), "get");
    assert_eq!(
        authorizer.who_can(&req),
        vec![
            Subject::group("cluster-admins"),
            Subject::service_account("default", "pod-reader"),
        ]
    );

    let delete = pods(&Subject::user("ignored"), "delete");
    assert_eq!(authorizer.who_can(&delete), vec![Subject::group("cluster-admins")]);
}

#[test]
fn test_list_rules_in_evaluation_order() {
    let mut store = store_from(&[POD_READER, CLUSTER_ADMINS]);
    store
        .load_manifests(
            "kind: ClusterRoleBinding\nmetadata:\n  name: sa-admin\nroleRef:\n  kind: ClusterRole\n  name: super-user\nsubjects:\n  - kind: ServiceAccount\n    name: pod-reader\n    namespace: default\n",
            &DecodeOptions::default(),
        )
        .unwrap();
    let authorizer = Authorizer::new(&store);
    let account = Subject::service_account("default", "pod-reader");

    let rules = authorizer.list_rules(&account, Some("default"));
    assert_eq!(rules.len(), 2);
    assert_eq!(rules[0].scope, GrantScope::Cluster);
    assert_eq!(rules[0].role.name, "super-user");
    assert_eq!(rules[1].scope, GrantScope::Namespace("default".to_string()));
    assert_eq!(rules[1].rule.verbs, vec!["get", "list"]);

    let cluster_only = authorizer.list_rules(&account, None);
    assert_eq!(cluster_only.len(), 1);
}

// ============================================================================
// Loading
// ============================================================================

#[test]
fn test_strict_mode_rejects_conflicting_redefinition() {
    let mut store = ResourceStore::new().with_mode(LoadMode::Strict);
    store
        .load_manifests(ORPHAN_ROLE, &DecodeOptions::default())
        .unwrap();

    // Identical content is accepted.
    let summary = store
        .load_manifests(ORPHAN_ROLE, &DecodeOptions::default())
        .unwrap();
    assert_eq!(summary.unchanged, 1);

    let widened = ORPHAN_ROLE.replace("verbs: [\"get\"]", "verbs: [\"get\", \"list\"]");
    let err = store
        .load_manifests(&widened, &DecodeOptions::default())
        .unwrap_err();
    assert!(matches!(err, LoadError::DuplicateWithConflict { .. }));

    let role = store.role("default", "secret-reader").unwrap();
    assert_eq!(role.rules[0].verbs, vec!["get"]);
}

#[test]
fn test_replace_mode_last_write_wins() {
    let mut store = store_from(&[ORPHAN_ROLE]);
    let widened = ORPHAN_ROLE.replace("verbs: [\"get\"]", "verbs: [\"get\", \"list\"]");

    let summary = store
        .load_manifests(&widened, &DecodeOptions::default())
        .unwrap();
    assert_eq!(summary.replaced, 1);
    assert_eq!(
        store.role("default", "secret-reader").unwrap().rules[0].verbs,
        vec!["get", "list"]
    );
}
