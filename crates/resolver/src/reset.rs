//! Reset-scope resolution.
//!
//! Before new values are written, the section types a device already has
//! must be cleared so stale sections cannot linger. The document can
//! exempt `<group>.<section-type>` pairs, or a whole group via
//! `<group>.*`; exemption entries are themselves device-conditional.

use crate::condition::evaluate;
use crate::error::ConditionError;
use crate::facts::DeviceFacts;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A conditional "do not reset" entry from the document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResetExemption {
    #[serde(rename = ".if", default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default)]
    pub configs: Vec<String>,
}

/// Group name to the section types that must be cleared on the device.
pub type ResetScope = BTreeMap<String, Vec<String>>;

/// Determine which section types to clear, given the section types the
/// device schema knows about and the document's exemptions. Groups with
/// no remaining section types are omitted.
pub fn resolve_reset_scope(
    config_sections: &BTreeMap<String, Vec<String>>,
    exemptions: &[ResetExemption],
    facts: &DeviceFacts,
) -> Result<ResetScope, ConditionError> {
    let mut exempt = BTreeSet::new();
    for entry in exemptions {
        if evaluate(entry.condition.as_deref(), facts)? {
            exempt.extend(entry.configs.iter().map(String::as_str));
        }
    }

    let mut scope = ResetScope::new();
    for (group, section_types) in config_sections {
        if exempt.contains(format!("{group}.*").as_str()) {
            continue;
        }
        let kept: Vec<String> = section_types
            .iter()
            .filter(|section_type| !exempt.contains(format!("{group}.{section_type}").as_str()))
            .cloned()
            .collect();
        if !kept.is_empty() {
            scope.insert(group.clone(), kept);
        }
    }
    Ok(scope)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts() -> DeviceFacts {
        DeviceFacts::default()
    }

    fn sections() -> BTreeMap<String, Vec<String>> {
        BTreeMap::from([
            (
                "network".into(),
                vec!["interface".into(), "device".into(), "switch_vlan".into()],
            ),
            ("dhcp".into(), vec!["dnsmasq".into(), "dhcp".into()]),
        ])
    }

    fn exemption(condition: Option<&str>, configs: &[&str]) -> ResetExemption {
        ResetExemption {
            condition: condition.map(str::to_string),
            configs: configs.iter().map(|c| (*c).to_string()).collect(),
        }
    }

    #[test]
    fn test_everything_resets_without_exemptions() {
        let scope = resolve_reset_scope(&sections(), &[], &facts()).unwrap();
        assert_eq!(scope.len(), 2);
        assert_eq!(scope["network"].len(), 3);
    }

    #[test]
    fn test_single_section_exemption() {
        let exemptions = [exemption(None, &["network.switch_vlan"])];
        let scope = resolve_reset_scope(&sections(), &exemptions, &facts()).unwrap();
        assert_eq!(scope["network"], vec!["interface", "device"]);
    }

    #[test]
    fn test_wildcard_exempts_whole_group() {
        // The wildcard wins even when individual exemptions are also listed.
        let exemptions = [exemption(None, &["dhcp.*", "dhcp.dnsmasq"])];
        let scope = resolve_reset_scope(&sections(), &exemptions, &facts()).unwrap();
        assert!(!scope.contains_key("dhcp"));
        assert!(scope.contains_key("network"));
    }

    #[test]
    fn test_fully_exempted_group_is_omitted() {
        let exemptions = [exemption(None, &["dhcp.dnsmasq", "dhcp.dhcp"])];
        let scope = resolve_reset_scope(&sections(), &exemptions, &facts()).unwrap();
        assert!(!scope.contains_key("dhcp"));
    }

    #[test]
    fn test_exemptions_are_device_conditional() {
        let exemptions = [exemption(Some("device.hostname == 'spared'"), &["dhcp.*"])];

        let scope = resolve_reset_scope(&sections(), &exemptions, &facts()).unwrap();
        assert!(scope.contains_key("dhcp"));

        let spared = DeviceFacts {
            hostname: "spared".into(),
            ..Default::default()
        };
        let scope = resolve_reset_scope(&sections(), &exemptions, &spared).unwrap();
        assert!(!scope.contains_key("dhcp"));
    }
}
