//! The configuration document.
//!
//! One JSON document describes a whole fleet: the devices themselves,
//! conditional package profiles, reset exemptions, and the declarative
//! UCI configuration tree shared by all devices.

use anyhow::{Context, Result};
use resolver::{Node, PackageProfile, ResetExemption, TagValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// The root configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub devices: Vec<DeviceEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub package_profiles: Vec<PackageProfile>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub configs_to_not_reset: Vec<ResetExemption>,
    /// Declarative UCI tree: group name to group node. The reserved
    /// `extra` key passes through untouched for round-tripping.
    #[serde(default)]
    pub config: BTreeMap<String, Node>,
}

/// One device in the fleet.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    pub model_id: String,
    #[serde(default)]
    pub ipaddr: String,
    pub hostname: String,
    #[serde(default)]
    pub tags: BTreeMap<String, TagValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_config: Option<ProvisioningConfig>,
}

impl DeviceEntry {
    /// Devices are enabled unless the document says otherwise.
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    /// The SSH credentials, when the device can be provisioned.
    pub fn ssh_auth(&self) -> Option<&SshAuth> {
        self.provisioning_config.as_ref().map(|p| &p.ssh_auth)
    }
}

/// Provisioning transport settings for one device.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvisioningConfig {
    pub ssh_auth: SshAuth,
}

/// SSH credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SshAuth {
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl Document {
    /// Load a document from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid configuration document {}", path.display()))
    }

    /// The devices this run should touch.
    pub fn enabled_devices(&self) -> impl Iterator<Item = &DeviceEntry> {
        self.devices.iter().filter(|device| device.is_enabled())
    }
}
