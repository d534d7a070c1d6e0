//! # resolver
//!
//! Turns a declarative, condition-annotated configuration document into
//! per-device resolved state.
//!
//! One document describes many devices; per-device facts (hostname,
//! model, firmware version, user tags) select which parts apply where.
//! This crate provides:
//!
//! - the condition expression language (`<path> == <literal>` atoms
//!   combined with `&&` and `||`), evaluated against [`DeviceFacts`]
//! - the recursive tree resolver that prunes conditional branches and
//!   merges ordered overrides into a [`ResolvedConfig`]
//! - the package-plan resolver ([`PackagePlan`]: install/uninstall sets)
//! - the reset-scope resolver (which section types to clear before
//!   writing new values)
//!
//! Everything here is a pure, synchronous transform: inputs are only
//! read, results are fresh values, and resolving different devices
//! concurrently is safe by construction. Command generation and
//! transport live elsewhere.
//!
//! ## Example
//!
//! ```
//! use resolver::{DeviceFacts, Node, TagValue, Scalar, resolve_config};
//! use std::collections::BTreeMap;
//!
//! let raw = serde_json::json!({
//!     "network": {
//!         "interface": [
//!             {".name": "wan", ".if": "device.tag.role == 'router'", "proto": "dhcp"}
//!         ]
//!     }
//! });
//! let config: BTreeMap<String, Node> = serde_json::from_value(raw).unwrap();
//!
//! let mut facts = DeviceFacts::default();
//! facts.tags.insert("role".into(), TagValue::Scalar(Scalar::Str("router".into())));
//!
//! let resolved = resolve_config(&config, &facts).unwrap();
//! assert!(resolved.groups.contains_key("network"));
//! ```

pub mod condition;
pub mod error;
pub mod facts;
pub mod node;
pub mod packages;
pub mod reset;
pub mod tree;

pub use condition::evaluate;
pub use error::{ConditionError, Result};
pub use facts::{DeviceFacts, FactValue, TagValue};
pub use node::{EXTRA_KEY, Group, Node, OverrideRule, Scalar};
pub use packages::{PackageDirective, PackagePlan, PackageProfile, resolve_packages};
pub use reset::{ResetExemption, ResetScope, resolve_reset_scope};
pub use tree::{ResolvedConfig, ResolvedGroup, ResolvedSection, resolve_config};
