//! Bridges between nodes and generic serde data.
//!
//! `Serialize` expands a node to its direct field map; nested nodes are
//! reached through the serializer's own recursion. JSON and YAML value trees
//! convert into [`Input`] so they flow through ordinary assignment.

use crate::node::ConfigNode;
use crate::value::{Input, Value};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;

impl Serialize for ConfigNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.with_fields(|fields| {
            let mut map = serializer.serialize_map(Some(fields.len()))?;
            for (key, value) in fields {
                map.serialize_entry(key, value)?;
            }
            map.end()
        })
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::None => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Str(s) => serializer.serialize_str(s),
            // Byte strings export as arrays of integers.
            Value::Bytes(bytes) => serializer.collect_seq(bytes),
            Value::Tuple(items) => serializer.collect_seq(items),
            Value::Node(node) => node.serialize(serializer),
        }
    }
}

impl From<serde_json::Value> for Input {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Input::None,
            serde_json::Value::Bool(b) => Input::Bool(b),
            serde_json::Value::Number(n) => number_to_input(n.as_i64(), n.as_u64(), n.as_f64(), &n),
            serde_json::Value::String(s) => Input::Str(s),
            serde_json::Value::Array(items) => Input::list(items),
            serde_json::Value::Object(map) => Input::map(map),
        }
    }
}

/// Integers first, then out-of-range unsigned values, then floats.
fn number_to_input(
    int: Option<i64>,
    unsigned: Option<u64>,
    float: Option<f64>,
    text: &dyn fmt::Display,
) -> Input {
    match (int, unsigned, float) {
        (Some(i), _, _) => Input::Int(i),
        (None, Some(u), _) => Input::from(u),
        (None, None, Some(f)) => Input::Float(f),
        (None, None, None) => Input::unsupported(format!("number {text}")),
    }
}

impl From<serde_yaml::Value> for Input {
    fn from(value: serde_yaml::Value) -> Self {
        match value {
            serde_yaml::Value::Null => Input::None,
            serde_yaml::Value::Bool(b) => Input::Bool(b),
            serde_yaml::Value::Number(n) => number_to_input(n.as_i64(), n.as_u64(), n.as_f64(), &n),
            serde_yaml::Value::String(s) => Input::Str(s),
            serde_yaml::Value::Sequence(items) => Input::list(items),
            serde_yaml::Value::Mapping(mapping) => {
                let mut entries = Vec::with_capacity(mapping.len());
                for (key, value) in mapping {
                    match key {
                        serde_yaml::Value::String(key) => entries.push((key, Input::from(value))),
                        _ => return Input::unsupported("mapping with non-string keys"),
                    }
                }
                Input::Map(entries)
            }
            serde_yaml::Value::Tagged(tagged) => Input::from(tagged.value),
        }
    }
}
