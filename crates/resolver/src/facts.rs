//! Per-device fact namespace for condition evaluation.

use crate::error::ConditionError;
use crate::node::Scalar;
use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A user-defined tag value: a scalar or a list of scalars.
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    Scalar(Scalar),
    List(Vec<Scalar>),
}

impl TagValue {
    fn from_value(value: &Value) -> Self {
        match value {
            Value::Array(items) => Self::List(items.iter().map(scalar_or_text).collect()),
            other => Self::Scalar(scalar_or_text(other)),
        }
    }

    fn to_value(&self) -> Value {
        match self {
            Self::Scalar(s) => s.to_value(),
            Self::List(items) => Value::Array(items.iter().map(Scalar::to_value).collect()),
        }
    }
}

/// Non-scalar tag values have no comparison semantics of their own; they
/// fall back to their JSON text, which is what stringified equality sees.
fn scalar_or_text(value: &Value) -> Scalar {
    Scalar::from_value(value).unwrap_or_else(|| Scalar::Str(value.to_string()))
}

impl Serialize for TagValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TagValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_value(&value))
    }
}

/// The value a condition path resolves to.
#[derive(Debug, Clone, PartialEq)]
pub enum FactValue {
    Scalar(Scalar),
    List(Vec<Scalar>),
}

/// Immutable per-device facts: the left-hand-side namespace of the
/// condition language.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceFacts {
    pub hostname: String,
    pub ipaddr: String,
    pub model_id: String,
    /// Firmware release version, from device discovery.
    pub version: String,
    /// Whether the device uses the legacy swconfig switch subsystem.
    pub sw_config: bool,
    pub tags: BTreeMap<String, TagValue>,
}

impl DeviceFacts {
    /// Resolve a condition path against the fact namespace.
    ///
    /// An unknown path is a fatal evaluation error, never a silent false:
    /// a typo'd condition must not quietly deselect configuration.
    pub fn lookup(&self, path: &str) -> Result<FactValue, ConditionError> {
        match path {
            "device.hostname" => Ok(FactValue::Scalar(Scalar::Str(self.hostname.clone()))),
            "device.ipaddr" => Ok(FactValue::Scalar(Scalar::Str(self.ipaddr.clone()))),
            "device.model_id" => Ok(FactValue::Scalar(Scalar::Str(self.model_id.clone()))),
            "device.version" => Ok(FactValue::Scalar(Scalar::Str(self.version.clone()))),
            "device.sw_config" => Ok(FactValue::Scalar(Scalar::Bool(self.sw_config))),
            _ => path
                .strip_prefix("device.tag.")
                .and_then(|key| self.tags.get(key))
                .map(|tag| match tag {
                    TagValue::Scalar(s) => FactValue::Scalar(s.clone()),
                    TagValue::List(items) => FactValue::List(items.clone()),
                })
                .ok_or_else(|| ConditionError::UnknownVariable {
                    path: path.to_string(),
                }),
        }
    }
}
