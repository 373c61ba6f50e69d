//! Field values and assignment inputs.
//!
//! [`Value`] is the closed set of kinds a node may store. [`Input`] is what
//! an assignment accepts: it adds lists and mappings, which are coerced on
//! assignment, and foreign values, which are rejected.

use crate::node::ConfigNode;
use indexmap::IndexMap;
use std::collections::{BTreeMap, HashMap};

/// A stored field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    /// Immutable ordered sequence; may nest further tuples and nodes.
    Tuple(Vec<Value>),
    /// Shared sub-node. Equality is identity.
    Node(ConfigNode),
}

impl Value {
    /// Short kind name used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::None => "none",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Bytes(_) => "bytes",
            Value::Tuple(_) => "tuple",
            Value::Node(_) => "node",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Float value; integers widen.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&[Value]> {
        match self {
            Value::Tuple(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<&ConfigNode> {
        match self {
            Value::Node(node) => Some(node),
            _ => None,
        }
    }

    /// Every node referenced by this value, directly or at any tuple depth.
    pub(crate) fn collect_nodes(&self, out: &mut Vec<ConfigNode>) {
        match self {
            Value::Node(node) => out.push(node.clone()),
            Value::Tuple(items) => {
                for item in items {
                    item.collect_nodes(out);
                }
            }
            _ => {}
        }
    }
}

/// Anything that may be assigned to a field.
#[derive(Debug, Clone)]
pub enum Input {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    /// Coerced to a tuple.
    List(Vec<Input>),
    Tuple(Vec<Input>),
    /// Coerced to a fresh node carrying the owner's key filter.
    Map(Vec<(String, Input)>),
    Node(ConfigNode),
    /// A foreign value outside the permitted kinds, named by its type.
    Unsupported(String),
}

impl Input {
    pub fn tuple<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Input>,
    {
        Input::Tuple(items.into_iter().map(Into::into).collect())
    }

    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Input>,
    {
        Input::List(items.into_iter().map(Into::into).collect())
    }

    pub fn map<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Input>,
    {
        Input::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Input::Bytes(bytes.into())
    }

    pub fn unsupported(type_name: impl Into<String>) -> Self {
        Input::Unsupported(type_name.into())
    }

    /// Short kind name used in error messages.
    pub fn kind_name(&self) -> String {
        match self {
            Input::None => "none".to_string(),
            Input::Bool(_) => "bool".to_string(),
            Input::Int(_) => "int".to_string(),
            Input::Float(_) => "float".to_string(),
            Input::Str(_) => "str".to_string(),
            Input::Bytes(_) => "bytes".to_string(),
            Input::List(_) => "list".to_string(),
            Input::Tuple(_) => "tuple".to_string(),
            Input::Map(_) => "mapping".to_string(),
            Input::Node(_) => "node".to_string(),
            Input::Unsupported(name) => name.clone(),
        }
    }
}

impl From<Value> for Input {
    fn from(value: Value) -> Self {
        match value {
            Value::None => Input::None,
            Value::Bool(b) => Input::Bool(b),
            Value::Int(i) => Input::Int(i),
            Value::Float(f) => Input::Float(f),
            Value::Str(s) => Input::Str(s),
            Value::Bytes(b) => Input::Bytes(b),
            Value::Tuple(items) => Input::Tuple(items.into_iter().map(Input::from).collect()),
            Value::Node(node) => Input::Node(node),
        }
    }
}

impl From<&Value> for Input {
    fn from(value: &Value) -> Self {
        Input::from(value.clone())
    }
}

impl From<ConfigNode> for Input {
    fn from(node: ConfigNode) -> Self {
        Input::Node(node)
    }
}

impl From<&ConfigNode> for Input {
    fn from(node: &ConfigNode) -> Self {
        Input::Node(node.clone())
    }
}

impl From<()> for Input {
    fn from(_: ()) -> Self {
        Input::None
    }
}

impl From<bool> for Input {
    fn from(b: bool) -> Self {
        Input::Bool(b)
    }
}

macro_rules! input_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Input {
                fn from(i: $t) -> Self {
                    Input::Int(i64::from(i))
                }
            }
        )*
    };
}

input_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<u64> for Input {
    fn from(i: u64) -> Self {
        match i64::try_from(i) {
            Ok(i) => Input::Int(i),
            Err(_) => Input::Unsupported(format!("integer {i} out of range")),
        }
    }
}

impl From<usize> for Input {
    fn from(i: usize) -> Self {
        Input::from(i as u64)
    }
}

impl From<f32> for Input {
    fn from(f: f32) -> Self {
        Input::Float(f64::from(f))
    }
}

impl From<f64> for Input {
    fn from(f: f64) -> Self {
        Input::Float(f)
    }
}

impl From<&str> for Input {
    fn from(s: &str) -> Self {
        Input::Str(s.to_string())
    }
}

impl From<String> for Input {
    fn from(s: String) -> Self {
        Input::Str(s)
    }
}

impl From<&String> for Input {
    fn from(s: &String) -> Self {
        Input::Str(s.clone())
    }
}

impl<T: Into<Input>> From<Option<T>> for Input {
    fn from(value: Option<T>) -> Self {
        value.map_or(Input::None, Into::into)
    }
}

impl<T: Into<Input>> From<Vec<T>> for Input {
    fn from(items: Vec<T>) -> Self {
        Input::list(items)
    }
}

impl<K: Into<String>, V: Into<Input>> From<HashMap<K, V>> for Input {
    fn from(map: HashMap<K, V>) -> Self {
        Input::map(map)
    }
}

impl<K: Into<String>, V: Into<Input>> From<BTreeMap<K, V>> for Input {
    fn from(map: BTreeMap<K, V>) -> Self {
        Input::map(map)
    }
}

impl<K: Into<String>, V: Into<Input>> From<IndexMap<K, V>> for Input {
    fn from(map: IndexMap<K, V>) -> Self {
        Input::map(map)
    }
}

macro_rules! input_from_tuple {
    ($($name:ident),+) => {
        impl<$($name: Into<Input>),+> From<($($name,)+)> for Input {
            #[allow(non_snake_case)]
            fn from(($($name,)+): ($($name,)+)) -> Self {
                Input::Tuple(vec![$($name.into()),+])
            }
        }
    };
}

input_from_tuple!(A);
input_from_tuple!(A, B);
input_from_tuple!(A, B, C);
input_from_tuple!(A, B, C, D);
input_from_tuple!(A, B, C, D, E);
input_from_tuple!(A, B, C, D, E, F);

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::None
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<ConfigNode> for Value {
    fn from(node: ConfigNode) -> Self {
        Value::Node(node)
    }
}
