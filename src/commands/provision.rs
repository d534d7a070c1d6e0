//! `wrtconf provision` - converge every enabled device.

use anyhow::{Context as AnyhowContext, Result, bail};
use colored::Colorize;
use log::{info, warn};
use std::path::Path;

use crate::Context;
use crate::config::{DeviceEntry, Document};
use crate::engine;
use crate::remote::{RemoteExecutor, SshSession};
use crate::runner;
use crate::schema;

pub fn run(ctx: &Context, config_path: &Path, yes: bool) -> Result<()> {
    let document = Document::load(config_path)?;
    let devices: Vec<&DeviceEntry> = document.enabled_devices().collect();

    if devices.is_empty() {
        println!("{}", "No enabled devices in document".yellow());
        return Ok(());
    }

    if !yes {
        let prompt = format!("Provision {} device(s)?", devices.len());
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .context("Confirmation prompt failed")?;
        if !confirmed {
            println!("Aborted.");
            return Ok(());
        }
    }

    // Device failures are isolated: one bad device never blocks the rest
    // of the batch.
    let mut failed = 0usize;
    for device in &devices {
        match provision_device(ctx, &document, device) {
            Ok(()) => {}
            Err(err) => {
                failed += 1;
                eprintln!("{} {}: {err:#}", "✗".red().bold(), device.hostname);
            }
        }
    }

    let succeeded = devices.len() - failed;
    if !ctx.quiet {
        println!(
            "\n{} {succeeded} provisioned, {failed} failed",
            if failed == 0 { "✓".green() } else { "✗".red() }
        );
    }
    if failed > 0 {
        bail!("{failed} of {} device(s) failed", devices.len());
    }
    Ok(())
}

fn provision_device(ctx: &Context, document: &Document, device: &DeviceEntry) -> Result<()> {
    if device.ipaddr.is_empty() {
        warn!("skipping {}: no IP address", device.hostname);
        return Ok(());
    }
    let Some(auth) = device.ssh_auth() else {
        warn!("skipping {}: no provisioning config", device.hostname);
        return Ok(());
    };

    println!(
        "{} {}@{} ({})",
        "Provisioning".bold(),
        auth.username,
        device.ipaddr,
        device.hostname
    );

    let session = SshSession::connect(&device.ipaddr, &auth.username, auth.password.as_deref())
        .with_context(|| format!("Could not connect to {}", device.ipaddr))?;

    let schema = schema::discover(&session, &device.model_id, &device.ipaddr)
        .context("Device discovery failed")?;
    if schema.name != device.model_id {
        bail!(
            "mismatching device model id: expected {} but found {} in /etc/board.json",
            device.model_id,
            schema.name
        );
    }
    info!("{}: schema discovered, firmware {}", device.hostname, schema.version);

    let state = engine::target_state(document, device, &schema)
        .with_context(|| format!("Could not resolve configuration for {}", device.hostname))?;

    // Snapshot what's installed so the script only touches real drift.
    // A failed snapshot falls back to the unnarrowed plan.
    let installed = match session.execute("opkg list-installed") {
        Ok(output) if output.success => Some(ucikit::parse_list_installed(&output.stdout)),
        _ => {
            warn!("{}: could not list installed packages", device.hostname);
            None
        }
    };

    let script = state.script(installed.as_deref());
    if ctx.verbose > 0 {
        for command in &script {
            println!("  {}", command.dimmed());
        }
    }

    runner::run_script(&session, &script, &state.revert_commands())?;

    println!("{} {}", "✓".green().bold(), device.hostname);
    Ok(())
}
