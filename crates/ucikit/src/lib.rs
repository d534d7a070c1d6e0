//! # ucikit
//!
//! UCI and opkg command generation for OpenWrt provisioning.
//!
//! This crate turns per-device resolved state (from the `resolver`
//! crate) into the ordered list of shell commands that converge a
//! device: `opkg` removal/installation, section reset loops,
//! `uci set`/`uci add_list` assignments, and the final commit/reload
//! pair. It also produces the best-effort `uci revert` cleanup used
//! when a script fails mid-way.
//!
//! All functions here are pure string-level transforms; nothing in this
//! crate talks to a device.
//!
//! ## Example
//!
//! ```
//! use resolver::{DeviceFacts, Node};
//! use std::collections::BTreeMap;
//!
//! let raw = serde_json::json!({
//!     "system": {"system": [{".name": "main", "hostname": "gw"}]}
//! });
//! let config: BTreeMap<String, Node> = serde_json::from_value(raw).unwrap();
//! let resolved = resolver::resolve_config(&config, &DeviceFacts::default()).unwrap();
//!
//! let commands = ucikit::config_commands(&resolved);
//! assert_eq!(commands[0], "uci set system.main=system");
//! assert_eq!(commands[1], "uci set system.main.hostname='gw'");
//! ```

pub mod commands;
pub mod opkg;
pub mod script;

pub use commands::config_commands;
pub use opkg::{InstalledPackage, package_commands, parse_list_installed};
pub use script::{device_script, reset_commands, revert_commands};
