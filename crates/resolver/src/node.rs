//! The document tree.
//!
//! Configuration documents are dynamically shaped JSON, but three object
//! keys are reserved: `.if` (a condition), `.overrides` (an ordered list of
//! conditional field overrides) and `.name` (the section identifier). The
//! [`Node`] type lifts those keys out of the raw object at conversion time
//! so the resolver can handle them exhaustively instead of re-inspecting
//! maps at every step.

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Top-level document key that is carried for round-tripping but never
/// resolved or emitted as commands.
pub const EXTRA_KEY: &str = "extra";

const IF_KEY: &str = ".if";
const OVERRIDES_KEY: &str = ".overrides";
const NAME_KEY: &str = ".name";

/// A JSON scalar.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Scalar {
    /// Convert a JSON value, if it is a scalar.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(Self::Null),
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float)),
            Value::String(s) => Some(Self::Str(s.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Convert back to a JSON value.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::Number((*i).into()),
            Self::Float(f) => serde_json::Number::from_f64(*f).map_or(Value::Null, Value::Number),
            Self::Str(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for Scalar {
    /// Minimal decimal text, matching JSON scalar rendering. Used for the
    /// stringified comparisons of the condition language.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => write!(f, "{s}"),
        }
    }
}

/// One conditional override: when `condition` holds for a device, the
/// `fields` are merged into the owning group, overwriting field-by-field.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OverrideRule {
    pub condition: Option<String>,
    pub fields: BTreeMap<String, Node>,
}

/// An object node: plain fields plus the lifted reserved keys.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Group {
    /// Lifted `.if` condition; absent means the group always applies.
    pub condition: Option<String>,
    /// Lifted `.overrides`, in document order.
    pub overrides: Vec<OverrideRule>,
    /// Lifted `.name` section identifier.
    pub name: Option<String>,
    /// Ordinary configuration fields.
    pub fields: BTreeMap<String, Node>,
}

/// A node of the document tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Scalar(Scalar),
    List(Vec<Node>),
    Group(Group),
}

impl Node {
    /// Build a tree from raw JSON, lifting reserved keys.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Array(items) => Self::List(items.iter().map(Self::from_value).collect()),
            Value::Object(map) => Self::Group(group_from_map(map)),
            scalar => Self::Scalar(Scalar::from_value(scalar).unwrap_or(Scalar::Null)),
        }
    }

    /// Convert back to raw JSON, re-emitting reserved keys.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Scalar(s) => s.to_value(),
            Self::List(items) => Value::Array(items.iter().map(Self::to_value).collect()),
            Self::Group(group) => {
                let mut map = serde_json::Map::new();
                if let Some(condition) = &group.condition {
                    map.insert(IF_KEY.into(), Value::String(condition.clone()));
                }
                if let Some(name) = &group.name {
                    map.insert(NAME_KEY.into(), Value::String(name.clone()));
                }
                if !group.overrides.is_empty() {
                    let overrides = group
                        .overrides
                        .iter()
                        .map(|rule| {
                            let mut entry = serde_json::Map::new();
                            if let Some(condition) = &rule.condition {
                                entry.insert(IF_KEY.into(), Value::String(condition.clone()));
                            }
                            let fields: serde_json::Map<String, Value> = rule
                                .fields
                                .iter()
                                .map(|(k, v)| (k.clone(), v.to_value()))
                                .collect();
                            entry.insert("override".into(), Value::Object(fields));
                            Value::Object(entry)
                        })
                        .collect();
                    map.insert(OVERRIDES_KEY.into(), Value::Array(overrides));
                }
                for (key, node) in &group.fields {
                    map.insert(key.clone(), node.to_value());
                }
                Value::Object(map)
            }
        }
    }

    /// The group behind this node, if it is one.
    pub fn as_group(&self) -> Option<&Group> {
        match self {
            Self::Group(group) => Some(group),
            _ => None,
        }
    }
}

fn group_from_map(map: &serde_json::Map<String, Value>) -> Group {
    let mut group = Group::default();
    for (key, value) in map {
        match key.as_str() {
            // A non-string `.if` or `.name` carries no meaning; it is
            // dropped rather than kept as an ordinary field.
            IF_KEY => group.condition = value.as_str().map(str::to_string),
            NAME_KEY => group.name = value.as_str().map(str::to_string),
            OVERRIDES_KEY => group.overrides = overrides_from_value(value),
            _ => {
                group.fields.insert(key.clone(), Node::from_value(value));
            }
        }
    }
    group
}

fn overrides_from_value(value: &Value) -> Vec<OverrideRule> {
    let Value::Array(items) = value else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let obj = item.as_object()?;
            let condition = obj.get(IF_KEY).and_then(Value::as_str).map(str::to_string);
            let mut fields = BTreeMap::new();
            if let Some(Value::Object(override_fields)) = obj.get("override") {
                for (k, v) in override_fields {
                    // Reserved keys are not overridable fields; in
                    // particular a section can never be renamed by an
                    // override.
                    if matches!(k.as_str(), IF_KEY | OVERRIDES_KEY | NAME_KEY) {
                        continue;
                    }
                    fields.insert(k.clone(), Node::from_value(v));
                }
            }
            Some(OverrideRule { condition, fields })
        })
        .collect()
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_value(&value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reserved_keys_are_lifted() {
        let value = json!({
            ".if": "device.tag.role == 'router'",
            ".name": "wan",
            ".overrides": [
                {".if": "device.sw_config == true", "override": {"mtu": 1500}}
            ],
            "proto": "static"
        });

        let Node::Group(group) = Node::from_value(&value) else {
            panic!("expected group");
        };

        assert_eq!(group.condition.as_deref(), Some("device.tag.role == 'router'"));
        assert_eq!(group.name.as_deref(), Some("wan"));
        assert_eq!(group.overrides.len(), 1);
        assert_eq!(
            group.overrides[0].condition.as_deref(),
            Some("device.sw_config == true")
        );
        assert_eq!(group.fields.len(), 1);
        assert!(group.fields.contains_key("proto"));
    }

    #[test]
    fn test_malformed_overrides_are_ignored() {
        let value = json!({".overrides": [42, {"override": "not-an-object"}, {"override": {"a": 1}}]});
        let Node::Group(group) = Node::from_value(&value) else {
            panic!("expected group");
        };
        // The scalar entry is dropped; the non-object override body yields
        // an empty rule; the well-formed entry survives.
        assert_eq!(group.overrides.len(), 2);
        assert!(group.overrides[0].fields.is_empty());
        assert_eq!(group.overrides[1].fields.len(), 1);
    }

    #[test]
    fn test_overrides_cannot_carry_reserved_keys() {
        let value = json!({
            ".name": "wan",
            ".overrides": [{"override": {".name": "lan", "metric": 5}}]
        });
        let Node::Group(group) = Node::from_value(&value) else {
            panic!("expected group");
        };
        let fields: Vec<&str> = group.overrides[0].fields.keys().map(String::as_str).collect();
        assert_eq!(fields, vec!["metric"]);
    }

    #[test]
    fn test_value_round_trip() {
        let value = json!({
            ".if": "*",
            ".name": "lan",
            "dns": ["8.8.8.8", "1.1.1.1"],
            "enabled": true,
            "metric": 10
        });
        let node = Node::from_value(&value);
        assert_eq!(node.to_value(), value);
    }

    #[test]
    fn test_scalar_display_is_minimal_decimal() {
        assert_eq!(Scalar::Int(10).to_string(), "10");
        assert_eq!(Scalar::Float(10.5).to_string(), "10.5");
        assert_eq!(Scalar::Float(10.0).to_string(), "10");
        assert_eq!(Scalar::Bool(true).to_string(), "true");
    }
}
