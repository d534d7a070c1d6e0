//! Declarative tree resolution.
//!
//! Turns the generic, condition-annotated document tree into the flat
//! per-device configuration: conditions pruned, overrides merged in
//! document order, reserved keys consumed. `.name` survives resolution
//! because the command generator needs it as the section identifier.

use crate::condition::evaluate;
use crate::error::ConditionError;
use crate::facts::DeviceFacts;
use crate::node::{EXTRA_KEY, Group, Node};
use serde::ser::Serializer;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// One resolved section: the identified record the command generator
/// turns into a `create` command plus `set`/`add_list` commands.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSection {
    pub name: Option<String>,
    pub fields: BTreeMap<String, Node>,
}

/// One resolved configuration group: section-type name to the ordered
/// list of sections of that type.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResolvedGroup {
    pub sections: BTreeMap<String, Vec<ResolvedSection>>,
}

/// The fully resolved configuration tree for one device.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResolvedConfig {
    pub groups: BTreeMap<String, ResolvedGroup>,
}

impl ResolvedConfig {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// JSON rendering for inspection output; `.name` reappears as a key.
    pub fn to_value(&self) -> Value {
        let mut groups = serde_json::Map::new();
        for (group_name, group) in &self.groups {
            let mut sections = serde_json::Map::new();
            for (section_type, list) in &group.sections {
                let rendered: Vec<Value> = list
                    .iter()
                    .map(|section| {
                        let mut map = serde_json::Map::new();
                        if let Some(name) = &section.name {
                            map.insert(".name".into(), Value::String(name.clone()));
                        }
                        for (key, node) in &section.fields {
                            map.insert(key.clone(), node.to_value());
                        }
                        Value::Object(map)
                    })
                    .collect();
                sections.insert(section_type.clone(), Value::Array(rendered));
            }
            groups.insert(group_name.clone(), Value::Object(sections));
        }
        Value::Object(groups)
    }
}

impl Serialize for ResolvedConfig {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// Resolve a document's `config` tree for one device.
///
/// Group values that are not objects, and section-list entries that are
/// not objects, carry no sections and are dropped. The reserved `extra`
/// key is excluded from resolution entirely.
pub fn resolve_config(
    config: &BTreeMap<String, Node>,
    facts: &DeviceFacts,
) -> Result<ResolvedConfig, ConditionError> {
    let mut resolved = ResolvedConfig::default();

    for (group_name, node) in config {
        if group_name == EXTRA_KEY {
            continue;
        }
        let Some(group) = node.as_group() else {
            continue;
        };
        let Some(Node::Group(applied)) = resolve_node(&Node::Group(group.clone()), facts)? else {
            continue;
        };

        let mut sections = BTreeMap::new();
        for (section_type, value) in &applied.fields {
            let Node::List(items) = value else {
                continue;
            };
            let list: Vec<ResolvedSection> = items
                .iter()
                .filter_map(|item| item.as_group())
                .filter(|section| section.name.is_some() || !section.fields.is_empty())
                .map(|section| ResolvedSection {
                    name: section.name.clone(),
                    fields: section.fields.clone(),
                })
                .collect();
            if !list.is_empty() {
                sections.insert(section_type.clone(), list);
            }
        }

        if !sections.is_empty() {
            resolved
                .groups
                .insert(group_name.clone(), ResolvedGroup { sections });
        }
    }

    Ok(resolved)
}

/// Resolve one node. `None` means the node's condition failed and it is
/// dropped from the output together with everything beneath it.
fn resolve_node(node: &Node, facts: &DeviceFacts) -> Result<Option<Node>, ConditionError> {
    match node {
        Node::Scalar(_) => Ok(Some(node.clone())),
        Node::List(items) => {
            let mut kept = Vec::with_capacity(items.len());
            for item in items {
                if let Some(resolved) = resolve_node(item, facts)? {
                    kept.push(resolved);
                }
            }
            Ok(Some(Node::List(kept)))
        }
        Node::Group(group) => {
            if !evaluate(group.condition.as_deref(), facts)? {
                return Ok(None);
            }

            // Merge matching overrides in document order; a later match
            // overwrites an earlier one on the same field.
            let mut fields = group.fields.clone();
            for rule in &group.overrides {
                if evaluate(rule.condition.as_deref(), facts)? {
                    for (key, value) in &rule.fields {
                        fields.insert(key.clone(), value.clone());
                    }
                }
            }

            let mut resolved = BTreeMap::new();
            for (key, value) in &fields {
                if let Some(node) = resolve_node(value, facts)? {
                    resolved.insert(key.clone(), node);
                }
            }

            Ok(Some(Node::Group(Group {
                condition: None,
                overrides: Vec::new(),
                name: group.name.clone(),
                fields: resolved,
            })))
        }
    }
}
