//! `wrtconf print-uci-commands` - resolve and print without executing.
//!
//! The dry run still needs each device's schema (firmware version,
//! swconfig flag and installed section types all feed resolution), so
//! devices are contacted for discovery; nothing is written to them.

use anyhow::{Context as AnyhowContext, Result};
use log::warn;
use std::path::Path;

use crate::Context;
use crate::config::{DeviceEntry, Document};
use crate::engine;
use crate::remote::SshSession;
use crate::schema;

pub fn run(_ctx: &Context, config_path: &Path, json: bool) -> Result<()> {
    let document = Document::load(config_path)?;

    let mut states = serde_json::Map::new();
    for device in document.enabled_devices() {
        let Some(state) = resolve_device(&document, device)? else {
            continue;
        };

        if json {
            states.insert(
                device.hostname.clone(),
                serde_json::to_value(&state).context("Could not serialize target state")?,
            );
        } else {
            println!("# device {}", device.hostname);
            for command in state.script(None) {
                println!("{command}");
            }
        }
    }

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::Value::Object(states))?
        );
    }
    Ok(())
}

fn resolve_device(
    document: &Document,
    device: &DeviceEntry,
) -> Result<Option<engine::TargetState>> {
    let auth = match device.ssh_auth() {
        Some(auth) if !device.ipaddr.is_empty() => auth,
        _ => {
            warn!(
                "skipping {}: schema discovery needs an address and credentials",
                device.hostname
            );
            return Ok(None);
        }
    };

    let session = SshSession::connect(&device.ipaddr, &auth.username, auth.password.as_deref())
        .with_context(|| format!("Could not connect to {}", device.ipaddr))?;
    let schema = schema::discover(&session, &device.model_id, &device.ipaddr)
        .context("Device discovery failed")?;

    let state = engine::target_state(document, device, &schema)
        .with_context(|| format!("Could not resolve configuration for {}", device.hostname))?;
    Ok(Some(state))
}
