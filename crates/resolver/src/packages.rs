//! Package plan resolution.
//!
//! Package profiles are conditional bundles of raw package tokens. A
//! token starting with `-` is an uninstall directive; `name@version`
//! pins an install to a version. Deduplication happens on the raw token
//! string before sign/version parsing, so `-pkg` and `pkg` are distinct
//! tokens and both survive into the plan.

use crate::condition::evaluate;
use crate::error::ConditionError;
use crate::facts::DeviceFacts;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A conditional bundle of package tokens from the document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackageProfile {
    #[serde(rename = ".if", default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default)]
    pub packages: Vec<String>,
}

/// One package to install, with an optional pinned version.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageDirective {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// The resolved install/uninstall sets for one device, sorted by
/// package name so emitted commands are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PackagePlan {
    pub install: Vec<PackageDirective>,
    pub uninstall: Vec<String>,
}

impl PackagePlan {
    pub fn is_empty(&self) -> bool {
        self.install.is_empty() && self.uninstall.is_empty()
    }
}

/// Evaluate every profile against the device facts and reduce the
/// matching tokens to a package plan.
pub fn resolve_packages(
    profiles: &[PackageProfile],
    facts: &DeviceFacts,
) -> Result<PackagePlan, ConditionError> {
    let mut tokens = BTreeSet::new();
    for profile in profiles {
        if evaluate(profile.condition.as_deref(), facts)? {
            tokens.extend(profile.packages.iter().map(String::as_str));
        }
    }

    let mut plan = PackagePlan::default();
    for token in tokens {
        if let Some(name) = token.strip_prefix('-') {
            plan.uninstall.push(name.to_string());
        } else {
            let (name, version) = match token.split_once('@') {
                Some((name, version)) => (name, Some(version.to_string())),
                None => (token, None),
            };
            plan.install.push(PackageDirective {
                name: name.to_string(),
                version,
            });
        }
    }
    plan.install.sort();
    plan.uninstall.sort();
    Ok(plan)
}
