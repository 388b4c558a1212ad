//! Integration tests for CLI commands.
//!
//! Tests that verify command functionality end-to-end against the manifest
//! fixtures in `tests/fixtures`.

#![allow(deprecated)] // Command::cargo_bin is deprecated but replacement requires newer assert_cmd

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn fixture(name: &str) -> String {
    format!("{}/tests/fixtures/{name}", env!("CARGO_MANIFEST_DIR"))
}

/// A command isolated from any kubegate.toml, with colors off.
fn kubegate(project: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("kubegate").unwrap();
    cmd.env_remove("RUST_LOG")
        .args(["--no-color", "-C", project.path().to_str().unwrap()]);
    cmd
}

// ============================================================================
// can-i
// ============================================================================

#[test]
fn can_i_allows_bound_service_account() {
    let project = TempDir::new().unwrap();

    kubegate(&project)
        .args(["-f", &fixture("pod-reader.yaml")])
        .args(["can-i", "list", "pods", "-n", "default"])
        .args(["--as", "system:serviceaccount:default:pod-reader"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("yes"))
        .stdout(predicate::str::contains(
            "allowed by RoleBinding/read-pods -> Role/pod-reader rule #0",
        ));
}

#[test]
fn can_i_denies_unlisted_verb() {
    let project = TempDir::new().unwrap();

    kubegate(&project)
        .args(["-f", &fixture("pod-reader.yaml")])
        .args(["can-i", "delete", "pods", "-n", "default"])
        .args(["--as", "system:serviceaccount:default:pod-reader"])
        .assert()
        .code(1)
        .stdout(predicate::str::starts_with("no"))
        .stdout(predicate::str::contains("no matching rule found"));
}

#[test]
fn can_i_json_report() {
    let project = TempDir::new().unwrap();

    let output = kubegate(&project)
        .args(["-f", &fixture("cluster-admins.yaml"), "-o", "json"])
        .args(["can-i", "escalate", "roles.rbac.authorization.k8s.io"])
        .args(["--as-group", "cluster-admins"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["allowed"], true);
    assert_eq!(
        report["reason"],
        "allowed by ClusterRoleBinding/cluster-admins -> ClusterRole/super-user rule #0"
    );
    assert_eq!(report["request"]["apiGroup"], "rbac.authorization.k8s.io");
    assert_eq!(report["request"]["resource"], "roles");
}

#[test]
fn can_i_reports_dangling_binding() {
    let project = TempDir::new().unwrap();

    kubegate(&project)
        .args(["-f", &fixture("dangling.yaml")])
        .args(["can-i", "create", "deployments.apps", "-n", "ci", "--as", "bot"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains(
            "RoleBinding/ci/deploy-bot references missing Role/ci/deployer",
        ));
}

// ============================================================================
// who-can and list
// ============================================================================

#[test]
fn who_can_lists_subjects_across_files() {
    let project = TempDir::new().unwrap();

    kubegate(&project)
        .args(["-f", &fixture("pod-reader.yaml")])
        .args(["-f", &fixture("cluster-admins.yaml")])
        .args(["who-can", "get", "pods", "-n", "default"])
        .assert()
        .success()
        .stdout(predicate::str::contains("cluster-admins"))
        .stdout(predicate::str::contains("pod-reader"))
        .stdout(predicate::str::contains("(2 subjects)"));
}

#[test]
fn who_can_json_is_an_array_of_subjects() {
    let project = TempDir::new().unwrap();

    let output = kubegate(&project)
        .args(["-f", &fixture("pod-reader.yaml"), "--format", "json"])
        .args(["who-can", "delete", "pods", "-n", "default"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let subjects: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(subjects, serde_json::json!([]));
}

#[test]
fn list_shows_granted_rules() {
    let project = TempDir::new().unwrap();

    kubegate(&project)
        .args(["-f", &fixture("pod-reader.yaml")])
        .args(["list", "-n", "default"])
        .args(["--as", "system:serviceaccount:default:pod-reader"])
        .assert()
        .success()
        .stdout(predicate::str::contains("RoleBinding/default/read-pods"))
        .stdout(predicate::str::contains("get,list"))
        .stdout(predicate::str::contains("(1 rule)"));
}

// ============================================================================
// analyze
// ============================================================================

#[test]
fn analyze_flags_cluster_admin_equivalent() {
    let project = TempDir::new().unwrap();

    kubegate(&project)
        .args(["-f", &fixture("cluster-admins.yaml"), "analyze"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ClusterAdminEquivalent"))
        .stdout(predicate::str::contains("ClusterRoleBinding/cluster-admins"));
}

#[test]
fn analyze_fail_on_sets_exit_code() {
    let project = TempDir::new().unwrap();

    kubegate(&project)
        .args(["-f", &fixture("cluster-admins.yaml")])
        .args(["analyze", "--fail-on", "critical"])
        .assert()
        .code(1);

    kubegate(&project)
        .args(["-f", &fixture("unused-role.json")])
        .args(["analyze", "--fail-on", "warning"])
        .assert()
        .success()
        .stdout(predicate::str::contains("UnusedRole"));
}

#[test]
fn analyze_json_findings() {
    let project = TempDir::new().unwrap();

    let output = kubegate(&project)
        .args(["-f", &fixture("dangling.yaml"), "-o", "json"])
        .args(["analyze", "--min-severity", "warning"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let findings: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let findings = findings.as_array().unwrap();
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0]["category"], "DanglingBinding");
    assert_eq!(findings[0]["severity"], "warning");
    assert_eq!(findings[0]["object"]["name"], "deploy-bot");
}

// ============================================================================
// Loading and configuration
// ============================================================================

#[test]
fn unsupported_kind_fails_unless_ignored() {
    let project = TempDir::new().unwrap();

    kubegate(&project)
        .args(["-f", &fixture("cluster-export.yaml"), "analyze"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Unsupported kind 'ConfigMap'"));

    fs::write(
        project.path().join("kubegate.toml"),
        "[store]\nignore_unsupported_kinds = true\n",
    )
    .unwrap();

    kubegate(&project)
        .args(["-f", &fixture("cluster-export.yaml")])
        .args(["can-i", "watch", "nodes", "--as-group", "ops"])
        .assert()
        .success();
}

#[test]
fn manifest_paths_from_project_config() {
    let project = TempDir::new().unwrap();
    let rbac = project.path().join("rbac");
    fs::create_dir(&rbac).unwrap();
    fs::copy(fixture("pod-reader.yaml"), rbac.join("pod-reader.yaml")).unwrap();
    fs::copy(fixture("unused-role.json"), rbac.join("unused-role.json")).unwrap();
    fs::write(rbac.join("README.md"), "not a manifest").unwrap();

    fs::write(
        project.path().join("kubegate.toml"),
        "[manifests]\npaths = [\"rbac\"]\n",
    )
    .unwrap();

    kubegate(&project)
        .args(["who-can", "list", "pods", "-n", "default"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pod-reader"));
}

#[test]
fn default_namespace_from_project_config() {
    let project = TempDir::new().unwrap();
    let manifest = project.path().join("builder.yaml");
    fs::write(
        &manifest,
        r"
kind: Role
metadata:
  name: builder
rules:
  - apiGroups: [batch]
    resources: [jobs]
    verbs: [create]
---
kind: RoleBinding
metadata:
  name: builder
subjects:
  - kind: ServiceAccount
    name: builder
roleRef:
  kind: Role
  name: builder
",
    )
    .unwrap();

    let args = [
        "-f",
        manifest.to_str().unwrap(),
        "can-i",
        "create",
        "jobs.batch",
        "-n",
        "team-a",
        "--as",
        "system:serviceaccount:team-a:builder",
    ];

    kubegate(&project)
        .args(args)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("metadata.namespace is required"));

    fs::write(
        project.path().join("kubegate.toml"),
        "[store]\ndefault_namespace = \"team-a\"\n",
    )
    .unwrap();

    kubegate(&project)
        .args(args)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "allowed by RoleBinding/builder -> Role/builder rule #0",
        ));
}

#[test]
fn strict_mode_rejects_conflicting_duplicates() {
    let project = TempDir::new().unwrap();
    let widened = fs::read_to_string(fixture("pod-reader.yaml"))
        .unwrap()
        .replace("verbs: [\"get\", \"list\"]", "verbs: [\"get\", \"list\", \"watch\"]");
    let widened_path = project.path().join("widened.yaml");
    fs::write(&widened_path, widened).unwrap();

    let args = [
        "-f".to_string(),
        fixture("pod-reader.yaml"),
        "-f".to_string(),
        widened_path.to_str().unwrap().to_string(),
    ];

    // Last write wins by default.
    kubegate(&project)
        .args(&args)
        .args(["can-i", "watch", "pods", "-n", "default"])
        .args(["--as", "system:serviceaccount:default:pod-reader"])
        .assert()
        .success();

    kubegate(&project)
        .args(&args)
        .args(["--strict", "analyze"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Conflicting duplicate"));
}

#[test]
fn config_show_reflects_project_file() {
    let project = TempDir::new().unwrap();
    fs::write(
        project.path().join("kubegate.toml"),
        "[project]\nname = \"platform-rbac\"\n\n[analyzer]\nmin_severity = \"warning\"\n",
    )
    .unwrap();

    kubegate(&project)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("platform-rbac"))
        .stdout(predicate::str::contains("warning"));

    kubegate(&project)
        .args(["config", "dump"])
        .assert()
        .success()
        .stdout(predicate::str::contains("name = \"platform-rbac\""));
}

#[test]
fn invalid_config_is_an_error() {
    let project = TempDir::new().unwrap();
    fs::write(
        project.path().join("kubegate.toml"),
        "[output]\nformat = \"yaml\"\n",
    )
    .unwrap();

    kubegate(&project)
        .args(["config", "show"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Failed to load configuration"));
}

#[test]
fn version_ignores_broken_project_config() {
    let project = TempDir::new().unwrap();
    fs::write(project.path().join("kubegate.toml"), "[output\nformat = ").unwrap();

    kubegate(&project)
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));

    kubegate(&project)
        .args(["config", "show"])
        .assert()
        .code(2);
}
