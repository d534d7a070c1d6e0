//! Device script assembly.
//!
//! The command order is a correctness invariant, not a presentation
//! choice: packages change before configuration that may depend on
//! them, sections are reset before new values land in them, and
//! commit/reload come last.

use crate::commands::config_commands;
use crate::opkg::{InstalledPackage, package_commands};
use resolver::{PackagePlan, ResetScope, ResolvedConfig};
use std::collections::BTreeSet;

/// Serialize a reset scope into delete-loop commands. Each loop removes
/// the first anonymous section of the type until none remain.
pub fn reset_commands(scope: &ResetScope) -> Vec<String> {
    let mut commands = Vec::new();
    for (group, section_types) in scope {
        for section_type in section_types {
            commands.push(format!(
                "while uci -q delete {group}.@{section_type}[0]; do :; done"
            ));
        }
    }
    commands
}

/// Assemble the full ordered script for one device:
/// uninstall → update+install → reset loops → set commands → commit →
/// reload.
pub fn device_script(
    config: &ResolvedConfig,
    packages: &PackagePlan,
    reset_scope: &ResetScope,
    installed: Option<&[InstalledPackage]>,
) -> Vec<String> {
    let mut commands = package_commands(packages, installed);
    commands.extend(reset_commands(reset_scope));
    commands.extend(config_commands(config));
    commands.push("uci commit".to_string());
    commands.push("reload_config".to_string());
    commands
}

/// Best-effort cleanup commands for a failed script: `uci revert` for
/// every top-level group this run touched or could have touched.
pub fn revert_commands(config: &ResolvedConfig, reset_scope: &ResetScope) -> Vec<String> {
    let groups: BTreeSet<&str> = config
        .groups
        .keys()
        .chain(reset_scope.keys())
        .map(String::as_str)
        .collect();
    groups
        .iter()
        .map(|group| format!("uci revert {group}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use resolver::{DeviceFacts, Node, PackageDirective};
    use std::collections::BTreeMap;

    fn resolved(value: serde_json::Value) -> ResolvedConfig {
        let config: BTreeMap<String, Node> = serde_json::from_value(value).unwrap();
        resolver::resolve_config(&config, &DeviceFacts::default()).unwrap()
    }

    fn sample_config() -> ResolvedConfig {
        resolved(serde_json::json!({
            "network": {"interface": [{".name": "lan", "proto": "static"}]}
        }))
    }

    fn sample_packages() -> PackagePlan {
        PackagePlan {
            install: vec![PackageDirective {
                name: "sqm-scripts".into(),
                version: None,
            }],
            uninstall: vec!["firewall4".into()],
        }
    }

    fn sample_scope() -> ResetScope {
        ResetScope::from([("network".to_string(), vec!["interface".to_string()])])
    }

    #[test]
    fn test_reset_commands_are_delete_loops() {
        let commands = reset_commands(&sample_scope());
        assert_eq!(
            commands,
            vec!["while uci -q delete network.@interface[0]; do :; done"]
        );
    }

    #[test]
    fn test_script_order() {
        let script = device_script(&sample_config(), &sample_packages(), &sample_scope(), None);
        assert_eq!(
            script,
            vec![
                "opkg remove --force-removal-of-dependent-packages firewall4",
                "opkg update",
                "opkg install sqm-scripts",
                "while uci -q delete network.@interface[0]; do :; done",
                "uci set network.lan=interface",
                "uci set network.lan.proto='static'",
                "uci commit",
                "reload_config",
            ]
        );
    }

    #[test]
    fn test_script_ends_with_commit_and_reload_even_when_empty() {
        let script = device_script(
            &ResolvedConfig::default(),
            &PackagePlan::default(),
            &ResetScope::new(),
            None,
        );
        assert_eq!(script, vec!["uci commit", "reload_config"]);
    }

    #[test]
    fn test_revert_covers_resolved_and_reset_groups() {
        let scope = ResetScope::from([("dhcp".to_string(), vec!["dhcp".to_string()])]);
        let commands = revert_commands(&sample_config(), &scope);
        assert_eq!(commands, vec!["uci revert dhcp", "uci revert network"]);
    }

    #[test]
    fn test_script_is_idempotent() {
        let config = sample_config();
        let packages = sample_packages();
        let scope = sample_scope();
        assert_eq!(
            device_script(&config, &packages, &scope, None),
            device_script(&config, &packages, &scope, None)
        );
    }
}
