//! UCI set/add_list command generation.

use log::warn;
use resolver::{Node, ResolvedConfig, Scalar};

/// Serialize a resolved configuration tree into `uci` commands.
///
/// Every section yields a create command (`uci set <group>.<name>=<type>`)
/// followed by one `uci set` per scalar field and one `uci add_list` per
/// list element, in list order. Groups, section types and fields are
/// walked in sorted order, so repeated generation over the same tree is
/// byte-identical.
pub fn config_commands(config: &ResolvedConfig) -> Vec<String> {
    let mut commands = Vec::new();

    for (group, resolved_group) in &config.groups {
        for (section_type, sections) in &resolved_group.sections {
            for section in sections {
                let Some(name) = &section.name else {
                    warn!("skipping unnamed {group}.{section_type} section");
                    continue;
                };
                let identifier = format!("{group}.{name}");
                commands.push(format!("uci set {identifier}={section_type}"));

                for (field, value) in &section.fields {
                    property_commands(&mut commands, &identifier, field, value);
                }
            }
        }
    }

    commands
}

fn property_commands(commands: &mut Vec<String>, identifier: &str, field: &str, value: &Node) {
    match value {
        Node::List(items) => {
            for item in items {
                match item {
                    Node::Scalar(scalar) => commands.push(format!(
                        "uci add_list {identifier}.{field}='{}'",
                        coerce(scalar)
                    )),
                    _ => warn!("skipping non-scalar list element in {identifier}.{field}"),
                }
            }
        }
        Node::Scalar(scalar) => {
            commands.push(format!("uci set {identifier}.{field}='{}'", coerce(scalar)));
        }
        Node::Group(_) => {
            // UCI options are flat; a nested object has no encoding.
            warn!("skipping nested object at {identifier}.{field}");
        }
    }
}

/// Coerce a scalar to its UCI text form: booleans become `1`/`0`,
/// numbers render as minimal decimal text, strings pass through.
fn coerce(scalar: &Scalar) -> String {
    match scalar {
        Scalar::Bool(true) => "1".to_string(),
        Scalar::Bool(false) => "0".to_string(),
        Scalar::Null => String::new(),
        Scalar::Int(i) => i.to_string(),
        Scalar::Float(f) => f.to_string(),
        Scalar::Str(s) => s.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resolver::DeviceFacts;
    use std::collections::BTreeMap;

    fn resolved(value: serde_json::Value) -> ResolvedConfig {
        let config: BTreeMap<String, Node> = serde_json::from_value(value).unwrap();
        resolver::resolve_config(&config, &DeviceFacts::default()).unwrap()
    }

    #[test]
    fn test_section_and_field_commands() {
        let config = resolved(serde_json::json!({
            "network": {
                "interface": [
                    {".name": "lan", "proto": "static", "ipaddr": "192.168.1.1"}
                ]
            }
        }));
        let commands = config_commands(&config);
        assert_eq!(
            commands,
            vec![
                "uci set network.lan=interface",
                "uci set network.lan.ipaddr='192.168.1.1'",
                "uci set network.lan.proto='static'",
            ]
        );
    }

    #[test]
    fn test_list_fields_use_add_list_in_order() {
        let config = resolved(serde_json::json!({
            "network": {
                "interface": [
                    {".name": "lan", "dns": ["8.8.8.8", "1.1.1.1"]}
                ]
            }
        }));
        let commands = config_commands(&config);
        assert_eq!(
            commands,
            vec![
                "uci set network.lan=interface",
                "uci add_list network.lan.dns='8.8.8.8'",
                "uci add_list network.lan.dns='1.1.1.1'",
            ]
        );
    }

    #[test]
    fn test_scalar_coercion() {
        let config = resolved(serde_json::json!({
            "firewall": {
                "defaults": [
                    {".name": "defaults", "syn_flood": true, "drop_invalid": false,
                     "mtu": 1500, "scale": 1.5}
                ]
            }
        }));
        let commands = config_commands(&config);
        assert!(commands.contains(&"uci set firewall.defaults.syn_flood='1'".to_string()));
        assert!(commands.contains(&"uci set firewall.defaults.drop_invalid='0'".to_string()));
        assert!(commands.contains(&"uci set firewall.defaults.mtu='1500'".to_string()));
        assert!(commands.contains(&"uci set firewall.defaults.scale='1.5'".to_string()));
    }

    #[test]
    fn test_unnamed_sections_are_skipped() {
        let config = resolved(serde_json::json!({
            "system": {"system": [{"timezone": "UTC"}]}
        }));
        assert!(config_commands(&config).is_empty());
    }

    #[test]
    fn test_generation_is_idempotent() {
        let config = resolved(serde_json::json!({
            "dhcp": {
                "dhcp": [{".name": "lan", "interface": "lan", "start": 100, "limit": 150}],
                "dnsmasq": [{".name": "main", "domainneeded": true}]
            }
        }));
        assert_eq!(config_commands(&config), config_commands(&config));
    }
}
