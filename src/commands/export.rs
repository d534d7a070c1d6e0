//! `wrtconf export-config` - turn a live device back into a document.
//!
//! Reads the device's UCI state and installed packages and emits a
//! configuration document that round-trips through the loader. Useful
//! for bootstrapping a fleet document from an already-configured
//! device.

use anyhow::{Context as AnyhowContext, Result, bail};
use log::{debug, info};
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::sync::LazyLock;

use crate::Context;
use crate::cli::ExportArgs;
use crate::config::{DeviceEntry, Document, ProvisioningConfig, SshAuth};
use crate::remote::{RemoteExecutor, SshSession};
use resolver::{Group, Node, PackageProfile, Scalar};

/// Configuration groups read from the device. The first two must exist
/// on any OpenWrt system; wireless and dropbear are optional hardware
/// and service dependent.
const REQUIRED_GROUPS: [&str; 2] = ["system", "network"];
const OPTIONAL_GROUPS: [&str; 2] = ["wireless", "dropbear"];

pub fn run(_ctx: &Context, args: &ExportArgs) -> Result<()> {
    eprintln!("Connecting to {}@{}...", args.user, args.ip);
    let session = SshSession::connect(&args.ip, &args.user, args.pass.as_deref())
        .with_context(|| format!("Could not connect to {}", args.ip))?;

    let document = export_document(
        &session,
        args.model.as_deref(),
        &args.ip,
        &args.user,
        args.pass.as_deref(),
    )?;
    eprintln!("Configuration exported successfully.");

    let rendered = serde_json::to_string_pretty(&document)?;
    match &args.output {
        Some(path) => {
            fs::write(path, rendered)
                .with_context(|| format!("Could not write {}", path.display()))?;
            eprintln!("Configuration written to {}", path.display());
        }
        None => println!("{rendered}"),
    }
    Ok(())
}

fn export_document(
    executor: &dyn RemoteExecutor,
    expected_model: Option<&str>,
    ipaddr: &str,
    username: &str,
    password: Option<&str>,
) -> Result<Document> {
    let board = executor
        .execute("cat /etc/board.json")?
        .require("cat /etc/board.json")?;
    let board: serde_json::Value =
        serde_json::from_str(&board).context("Could not parse /etc/board.json")?;
    let model_id = board["model"]["id"]
        .as_str()
        .context("No model id in /etc/board.json")?
        .to_string();
    if let Some(expected) = expected_model
        && expected != model_id
    {
        bail!("device model mismatch: expected {expected}, got {model_id}");
    }
    info!("exporting {model_id} at {ipaddr}");

    let mut config = BTreeMap::new();
    for group in REQUIRED_GROUPS {
        let output = executor
            .execute(&format!("uci show {group}"))?
            .require(&format!("uci show {group}"))?;
        config.insert(group.to_string(), group_node(parse_uci_show(&output)));
    }
    for group in OPTIONAL_GROUPS {
        match executor.execute(&format!("uci show {group}")) {
            Ok(output) if output.success && !output.stdout.trim().is_empty() => {
                config.insert(group.to_string(), group_node(parse_uci_show(&output.stdout)));
            }
            // Absent wireless/dropbear configuration is not an error.
            _ => debug!("no {group} configuration on {ipaddr}"),
        }
    }

    let hostname = hostname_from_config(config.get("system")).unwrap_or_else(|| model_id.clone());

    let packages_output = executor
        .execute("opkg list-installed")?
        .require("opkg list-installed")?;
    let packages: Vec<String> = ucikit::parse_list_installed(&packages_output)
        .into_iter()
        .map(|p| p.name)
        .collect();

    Ok(Document {
        devices: vec![DeviceEntry {
            enabled: None,
            model_id,
            ipaddr: ipaddr.to_string(),
            hostname,
            tags: BTreeMap::new(),
            provisioning_config: Some(ProvisioningConfig {
                ssh_auth: SshAuth {
                    username: username.to_string(),
                    password: password.map(str::to_string),
                },
            }),
        }],
        package_profiles: vec![PackageProfile {
            condition: None,
            packages,
        }],
        configs_to_not_reset: Vec::new(),
        config,
    })
}

// ============================================================================
// uci show parsing
// ============================================================================

struct UciSection {
    name: String,
    section_type: String,
    fields: BTreeMap<String, Node>,
}

static OPTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^.\s=]+\.([^.=]+)\.([^.=]+)=(.*)$").expect("valid regex"));
static TYPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^.\s=]+\.([^.=]+)=(\S+)$").expect("valid regex"));

/// Parse `uci show <config>` output into sections, in listing order.
/// Option lines for sections without a preceding type line are dropped.
fn parse_uci_show(output: &str) -> Vec<UciSection> {
    let mut sections: Vec<UciSection> = Vec::new();
    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(captures) = OPTION_RE.captures(line) {
            let name = &captures[1];
            if let Some(section) = sections.iter_mut().find(|s| s.name == name) {
                section.fields.insert(
                    captures[2].to_string(),
                    Node::Scalar(Scalar::Str(unquote(&captures[3]))),
                );
            }
        } else if let Some(captures) = TYPE_RE.captures(line) {
            sections.push(UciSection {
                name: captures[1].to_string(),
                section_type: unquote(&captures[2]),
                fields: BTreeMap::new(),
            });
        }
    }
    sections
}

fn unquote(value: &str) -> String {
    value.trim_matches(['\'', '"']).to_string()
}

/// Reassemble parsed sections into a document group node:
/// `{<section-type>: [{".name": ..., <field>: <value>}, ...]}`.
fn group_node(sections: Vec<UciSection>) -> Node {
    let mut by_type: BTreeMap<String, Vec<Node>> = BTreeMap::new();
    for section in sections {
        by_type
            .entry(section.section_type)
            .or_default()
            .push(Node::Group(Group {
                name: Some(section.name),
                fields: section.fields,
                ..Default::default()
            }));
    }

    let fields = by_type
        .into_iter()
        .map(|(section_type, list)| (section_type, Node::List(list)))
        .collect();
    Node::Group(Group {
        fields,
        ..Default::default()
    })
}

fn hostname_from_config(system: Option<&Node>) -> Option<String> {
    let group = system?.as_group()?;
    for value in group.fields.values() {
        let Node::List(sections) = value else {
            continue;
        };
        for section in sections {
            let Some(group) = section.as_group() else {
                continue;
            };
            if let Some(Node::Scalar(Scalar::Str(hostname))) = group.fields.get("hostname") {
                return Some(hostname.clone());
            }
        }
    }
    None
}

trait RequireSuccess {
    fn require(self, command: &str) -> Result<String>;
}

impl RequireSuccess for crate::remote::CommandOutput {
    fn require(self, command: &str) -> Result<String> {
        if !self.success {
            bail!("`{command}` failed: {}", self.detail());
        }
        Ok(self.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::testing::ScriptedExecutor;

    const SYSTEM_SHOW: &str = "system.@system[0]=system\n\
        system.@system[0].hostname='gw'\n\
        system.@system[0].timezone='UTC'\n";

    const NETWORK_SHOW: &str = "network.loopback=interface\n\
        network.loopback.device='lo'\n\
        network.lan=interface\n\
        network.lan.proto='static'\n\
        network.lan.ipaddr='192.168.1.1'\n";

    fn executor() -> ScriptedExecutor {
        ScriptedExecutor::new()
            .respond("cat /etc/board.json", r#"{"model": {"id": "ubnt,edgerouter-x"}}"#)
            .respond("uci show system", SYSTEM_SHOW)
            .respond("uci show network", NETWORK_SHOW)
            .fail("uci show wireless", "uci: Entry not found")
            .fail("uci show dropbear", "uci: Entry not found")
            .respond("opkg list-installed", "dnsmasq - 2.90-2\nfirewall4 - 2024.01.1\n")
    }

    #[test]
    fn test_parse_uci_show() {
        let sections = parse_uci_show(NETWORK_SHOW);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].name, "loopback");
        assert_eq!(sections[0].section_type, "interface");
        assert_eq!(sections[1].fields.len(), 2);
        assert_eq!(
            sections[1].fields["ipaddr"],
            Node::Scalar(Scalar::Str("192.168.1.1".into()))
        );
    }

    #[test]
    fn test_export_builds_round_trippable_document() {
        let exec = executor();
        let document = export_document(&exec, None, "192.168.1.1", "root", Some("pw")).unwrap();

        assert_eq!(document.devices.len(), 1);
        assert_eq!(document.devices[0].model_id, "ubnt,edgerouter-x");
        assert_eq!(document.devices[0].hostname, "gw");
        assert_eq!(
            document.package_profiles[0].packages,
            vec!["dnsmasq", "firewall4"]
        );
        // Wireless and dropbear were absent and must not appear.
        assert!(!document.config.contains_key("wireless"));
        assert!(!document.config.contains_key("dropbear"));

        // The emitted document survives a serialize/deserialize cycle.
        let text = serde_json::to_string(&document).unwrap();
        let reloaded: Document = serde_json::from_str(&text).unwrap();
        let network = reloaded.config["network"].as_group().unwrap();
        let Node::List(interfaces) = &network.fields["interface"] else {
            panic!("expected interface list");
        };
        assert_eq!(interfaces.len(), 2);
    }

    #[test]
    fn test_model_mismatch_is_fatal() {
        let exec = executor();
        let err =
            export_document(&exec, Some("tplink,archer-c7-v5"), "192.168.1.1", "root", None)
                .unwrap_err();
        assert!(err.to_string().contains("model mismatch"));
    }
}
