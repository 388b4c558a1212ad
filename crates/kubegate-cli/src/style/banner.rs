//! Version banner.

use super::colors::SemanticStyle;

/// Prints the version banner.
pub fn print_version_banner(version: &str) {
    println!();
    println!(
        "  {} {} {}",
        "⎈".info(),
        "kubegate".header(),
        format!("v{version}").muted()
    );
    println!("  {}", "Offline Kubernetes RBAC authorization and audit".muted());
    println!();
}
