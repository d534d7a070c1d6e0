//! opkg package command generation.

use resolver::PackagePlan;
use serde::{Deserialize, Serialize};

/// A package currently installed on the device, as reported by
/// `opkg list-installed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledPackage {
    pub name: String,
    pub version: String,
}

/// Parse `opkg list-installed` output (`name - version` per line).
/// Lines that do not match the format are ignored.
pub fn parse_list_installed(output: &str) -> Vec<InstalledPackage> {
    output
        .lines()
        .filter_map(|line| {
            let (name, version) = line.trim().split_once(" - ")?;
            Some(InstalledPackage {
                name: name.trim().to_string(),
                version: version.trim().to_string(),
            })
        })
        .collect()
}

/// Serialize a package plan into opkg commands.
///
/// With a snapshot of currently installed packages, uninstalls of absent
/// packages and installs of packages already present (at any version)
/// are dropped. Removal comes first so a replacement package never
/// conflicts with the one it supersedes; installs are preceded by a
/// single `opkg update`. An empty side emits nothing.
pub fn package_commands(plan: &PackagePlan, installed: Option<&[InstalledPackage]>) -> Vec<String> {
    let is_installed =
        |name: &str| installed.is_none_or(|snapshot| snapshot.iter().any(|p| p.name == name));

    let uninstall: Vec<&str> = plan
        .uninstall
        .iter()
        .map(String::as_str)
        .filter(|&name| is_installed(name))
        .collect();
    let install: Vec<&str> = plan
        .install
        .iter()
        .map(|directive| directive.name.as_str())
        .filter(|&name| installed.is_none() || !is_installed(name))
        .collect();

    let mut commands = Vec::new();
    if !uninstall.is_empty() {
        commands.push(format!(
            "opkg remove --force-removal-of-dependent-packages {}",
            uninstall.join(" ")
        ));
    }
    if !install.is_empty() {
        commands.push("opkg update".to_string());
        commands.push(format!("opkg install {}", install.join(" ")));
    }
    commands
}
