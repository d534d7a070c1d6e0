//! Per-device target state.
//!
//! Glues the resolvers together: builds the fact namespace from the
//! document entry plus the discovered schema, resolves the tree, the
//! package plan and the reset scope, and hands the bundle to `ucikit`
//! for serialization into a command script.

use crate::config::{DeviceEntry, Document};
use crate::schema::DeviceSchema;
use resolver::{
    ConditionError, DeviceFacts, PackagePlan, ResetScope, ResolvedConfig, resolve_config,
    resolve_packages, resolve_reset_scope,
};
use serde::Serialize;
use ucikit::InstalledPackage;

/// Everything one device should converge to. Created fresh per device
/// per run and consumed immediately; nothing here is persisted.
#[derive(Debug, Clone, Serialize)]
pub struct TargetState {
    pub config: ResolvedConfig,
    pub packages: PackagePlan,
    pub config_sections_to_reset: ResetScope,
}

/// Build the condition fact namespace for one device.
pub fn device_facts(device: &DeviceEntry, schema: &DeviceSchema) -> DeviceFacts {
    DeviceFacts {
        hostname: device.hostname.clone(),
        ipaddr: device.ipaddr.clone(),
        model_id: device.model_id.clone(),
        version: schema.version.clone(),
        sw_config: schema.sw_config,
        tags: device.tags.clone(),
    }
}

/// Resolve the document into one device's target state.
pub fn target_state(
    document: &Document,
    device: &DeviceEntry,
    schema: &DeviceSchema,
) -> Result<TargetState, ConditionError> {
    let facts = device_facts(device, schema);

    Ok(TargetState {
        config: resolve_config(&document.config, &facts)?,
        packages: resolve_packages(&document.package_profiles, &facts)?,
        config_sections_to_reset: resolve_reset_scope(
            &schema.config_sections,
            &document.configs_to_not_reset,
            &facts,
        )?,
    })
}

impl TargetState {
    /// The full ordered command script for this state, optionally
    /// narrowed by a snapshot of currently installed packages.
    pub fn script(&self, installed: Option<&[InstalledPackage]>) -> Vec<String> {
        ucikit::device_script(
            &self.config,
            &self.packages,
            &self.config_sections_to_reset,
            installed,
        )
    }

    /// Best-effort cleanup commands for a failed script.
    pub fn revert_commands(&self) -> Vec<String> {
        ucikit::revert_commands(&self.config, &self.config_sections_to_reset)
    }
}
