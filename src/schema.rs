//! Device schema discovery.
//!
//! Before anything can be resolved for a device we need to know what the
//! hardware actually is: the board model, whether it uses the legacy
//! swconfig switch subsystem or DSA, which ports and radios exist, which
//! configuration groups (and section types) are installed, and the
//! firmware release. All of it is read from the live device over the
//! remote executor; nothing is guessed from the model id.

use crate::remote::RemoteExecutor;
use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use thiserror::Error;

/// Everything discovery learned about one device.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceSchema {
    /// Board model id from `/etc/board.json` (e.g. `ubnt,edgerouter-x`).
    pub name: String,
    /// Firmware release (`DISTRIB_RELEASE`).
    pub version: String,
    /// Whether the device uses the legacy swconfig switch subsystem.
    pub sw_config: bool,
    /// Installed configuration groups and their section types.
    pub config_sections: BTreeMap<String, Vec<String>>,
    pub ports: Vec<Port>,
    pub radios: Vec<Radio>,
}

/// A network port on the device.
#[derive(Debug, Clone, Serialize)]
pub struct Port {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_role: Option<String>,
    /// CPU-facing device name, only present on swconfig ports.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sw_config_cpu_name: Option<String>,
}

/// A WiFi radio on the device.
#[derive(Debug, Clone, Serialize)]
pub struct Radio {
    pub name: String,
    #[serde(rename = "type")]
    pub radio_type: String,
    pub path: String,
    pub band: String,
}

/// Discovery failures. Each is fatal for the affected device only.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to run `{command}` on {host}: {detail}")]
    Probe {
        host: String,
        command: String,
        detail: String,
    },

    #[error("failed to parse {what} from {host}: {source}")]
    Parse {
        host: String,
        what: &'static str,
        source: serde_json::Error,
    },

    #[error("found no ports for {model_id} at {host}")]
    NoPorts { model_id: String, host: String },

    #[error("found no CPU port for swconfig device {model_id} at {host}")]
    NoCpuPort { model_id: String, host: String },

    #[error("DISTRIB_RELEASE not found in /etc/openwrt_release on {host}")]
    NoRelease { host: String },
}

// ============================================================================
// board.json
// ============================================================================

#[derive(Debug, Deserialize)]
struct BoardJson {
    model: BoardModel,
    #[serde(default)]
    switch: BTreeMap<String, SwitchInfo>,
    #[serde(default)]
    network: NetworkInfo,
}

#[derive(Debug, Deserialize)]
struct BoardModel {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SwitchInfo {
    #[serde(default)]
    ports: Vec<SwitchPort>,
}

#[derive(Debug, Deserialize)]
struct SwitchPort {
    num: i64,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    device: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct NetworkInfo {
    #[serde(default)]
    lan: Option<NetworkInterface>,
    #[serde(default)]
    wan: Option<NetworkInterface>,
}

#[derive(Debug, Deserialize)]
struct NetworkInterface {
    #[serde(default)]
    ports: Vec<String>,
    #[serde(default)]
    device: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WirelessStatus {
    #[serde(default)]
    values: BTreeMap<String, WifiDeviceInfo>,
}

#[derive(Debug, Deserialize)]
struct WifiDeviceInfo {
    #[serde(rename = ".name")]
    name: String,
    #[serde(rename = "type", default)]
    radio_type: String,
    #[serde(default)]
    path: String,
    #[serde(default)]
    band: String,
}

// ============================================================================
// Discovery
// ============================================================================

/// Inspect a live device and build its schema.
pub fn discover(
    executor: &dyn RemoteExecutor,
    model_id: &str,
    host: &str,
) -> Result<DeviceSchema, SchemaError> {
    let board_raw = run(executor, host, "cat /etc/board.json")?;
    let board: BoardJson =
        serde_json::from_str(&board_raw).map_err(|source| SchemaError::Parse {
            host: host.to_string(),
            what: "/etc/board.json",
            source,
        })?;

    let sw_config = !board.switch.is_empty();
    let ports = build_ports(&board, sw_config);
    if ports.is_empty() {
        return Err(SchemaError::NoPorts {
            model_id: model_id.to_string(),
            host: host.to_string(),
        });
    }
    if sw_config && !ports.iter().any(|p| p.sw_config_cpu_name.is_some()) {
        return Err(SchemaError::NoCpuPort {
            model_id: model_id.to_string(),
            host: host.to_string(),
        });
    }

    let radios = discover_radios(executor, host)?;
    let config_sections = discover_config_sections(executor, host)?;
    let version = discover_version(executor, host)?;

    Ok(DeviceSchema {
        name: board.model.id,
        version,
        sw_config,
        config_sections,
        ports,
        radios,
    })
}

fn build_ports(board: &BoardJson, sw_config: bool) -> Vec<Port> {
    let mut ports = Vec::new();

    if sw_config {
        for switch in board.switch.values() {
            for port in &switch.ports {
                ports.push(Port {
                    name: format!("eth{}", port.num),
                    default_role: port.role.clone(),
                    sw_config_cpu_name: port.device.clone(),
                });
            }
        }
        return ports;
    }

    // DSA devices describe ports through the default network assignment.
    if let Some(lan) = &board.network.lan {
        if lan.ports.is_empty() {
            if let Some(device) = &lan.device
                && (device.as_str() == "lan" || device.as_str() == "eth0")
            {
                ports.push(role_port(device, "lan"));
            }
        } else {
            for name in &lan.ports {
                ports.push(role_port(name, "lan"));
            }
        }
    }
    if let Some(wan) = &board.network.wan {
        if let Some(device) = &wan.device {
            ports.push(role_port(device, "wan"));
        }
        for name in &wan.ports {
            ports.push(role_port(name, "wan"));
        }
    }

    ports
}

fn role_port(name: &str, role: &str) -> Port {
    Port {
        name: name.to_string(),
        default_role: Some(role.to_string()),
        sw_config_cpu_name: None,
    }
}

fn discover_radios(executor: &dyn RemoteExecutor, host: &str) -> Result<Vec<Radio>, SchemaError> {
    const COMMAND: &str = r#"ubus call uci get '{"config": "wireless", "type": "wifi-device"}'"#;

    let output = executor
        .execute(COMMAND)
        .map_err(|err| probe_error(host, COMMAND, &err.to_string()))?;
    if !output.success {
        // No wireless configuration at all is a wired device, not an error.
        if output.detail().contains("Not found") {
            return Ok(Vec::new());
        }
        return Err(probe_error(host, COMMAND, output.detail()));
    }

    let status: WirelessStatus =
        serde_json::from_str(&output.stdout).map_err(|source| SchemaError::Parse {
            host: host.to_string(),
            what: "wireless status",
            source,
        })?;

    Ok(status
        .values
        .into_values()
        .map(|info| Radio {
            name: info.name,
            radio_type: info.radio_type,
            path: info.path,
            band: info.band,
        })
        .collect())
}

/// Walk `/etc/config` and record the section types each group contains.
/// Groups whose contents cannot be read are skipped rather than failing
/// discovery; an unreadable group simply won't be reset.
fn discover_config_sections(
    executor: &dyn RemoteExecutor,
    host: &str,
) -> Result<BTreeMap<String, Vec<String>>, SchemaError> {
    let listing = run(executor, host, "ls /etc/config")?;

    let mut sections = BTreeMap::new();
    for group in listing.split_whitespace() {
        let command = format!("uci -q show {group}");
        let Ok(output) = executor.execute(&command) else {
            continue;
        };
        if !output.success {
            debug!("skipping unreadable config group {group} on {host}");
            continue;
        }

        let mut section_types: Vec<String> = Vec::new();
        for line in output.stdout.lines() {
            // Section-type lines have a single-dot key: `network.lan=interface`
            // or `network.@device[0]=device`. Option lines have two dots.
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            if key.matches('.').count() != 1 {
                continue;
            }
            let section_type = value.trim_matches(['\'', '"']).to_string();
            if !section_type.is_empty() && !section_types.contains(&section_type) {
                section_types.push(section_type);
            }
        }

        if !section_types.is_empty() {
            sections.insert(group.to_string(), section_types);
        }
    }

    Ok(sections)
}

static RELEASE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?m)^DISTRIB_RELEASE='([^']*)'"#).expect("valid regex"));

fn discover_version(executor: &dyn RemoteExecutor, host: &str) -> Result<String, SchemaError> {
    let release = run(executor, host, "cat /etc/openwrt_release")?;
    RELEASE_RE
        .captures(&release)
        .map(|captures| captures[1].to_string())
        .ok_or_else(|| SchemaError::NoRelease {
            host: host.to_string(),
        })
}

fn run(executor: &dyn RemoteExecutor, host: &str, command: &str) -> Result<String, SchemaError> {
    let output = executor
        .execute(command)
        .map_err(|err| probe_error(host, command, &err.to_string()))?;
    if !output.success {
        return Err(probe_error(host, command, output.detail()));
    }
    Ok(output.stdout)
}

fn probe_error(host: &str, command: &str, detail: &str) -> SchemaError {
    SchemaError::Probe {
        host: host.to_string(),
        command: command.to_string(),
        detail: detail.to_string(),
    }
}
