//! The `Config` factory.
//!
//! Nodes are only created here. Every factory routes its entries through
//! ordinary assignment, so coercion, validation and key filtering behave the
//! same whatever the source:
//! - **Fields** - `create`, `create_with`, `create_filtered`
//! - **Mappings** - `from_dict`, `from_object`
//! - **Text** - `from_json`, `from_yaml`, `from_script`
//! - **Files** - `from_script_file`, [`loader::load_file`], [`loader::load_layers`]
//!
//! Engine operations that act on an existing node (`update`, `get`, `pop`)
//! are associated functions taking the node first, keeping them apart from
//! the node's field namespace.

pub mod loader;
mod merge;

use crate::error::{ConfigError, Result};
use crate::node::ConfigNode;
use crate::script;
use crate::validate::{KeyFilter, allow_all, is_reserved};
use crate::value::{Input, Value};
use serde::Serialize;
use std::path::Path;
use tracing::debug;

/// Factory and engine entry points. Uninhabited: never constructed.
pub enum Config {}

impl Config {
    /// Create an empty node accepting every valid key.
    pub fn create() -> ConfigNode {
        ConfigNode::new(allow_all())
    }

    /// Create a node seeded with `fields`.
    pub fn create_with<I, K, V>(fields: I) -> Result<ConfigNode>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Input>,
    {
        Self::create_filtered(allow_all(), fields)
    }

    /// Create a node with a key filter, seeded with `fields`.
    ///
    /// The filter also applies to sub-nodes built from mapping values.
    pub fn create_filtered<I, K, V>(key_filter: KeyFilter, fields: I) -> Result<ConfigNode>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Input>,
    {
        let node = ConfigNode::new(key_filter);
        merge::update(&node, Input::map(fields))?;
        Ok(node)
    }

    /// Build a node from a mapping. Anything else is a type error.
    pub fn from_dict(dict: impl Into<Input>, key_filter: KeyFilter) -> Result<ConfigNode> {
        match dict.into() {
            Input::Map(entries) => Self::create_filtered(key_filter, entries),
            other => Err(ConfigError::NotAMapping(other.kind_name())),
        }
    }

    /// Build a node from JSON text holding an object.
    pub fn from_json(text: &str, key_filter: KeyFilter) -> Result<ConfigNode> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        Self::from_dict(value, key_filter)
    }

    /// Build a node from YAML text holding a mapping.
    pub fn from_yaml(text: &str, key_filter: KeyFilter) -> Result<ConfigNode> {
        let value: serde_yaml::Value = serde_yaml::from_str(text)?;
        Self::from_dict(value, key_filter)
    }

    /// Build a node from the public fields of a serializable object.
    ///
    /// Fields whose serialized name starts with `_` are skipped. The object
    /// must serialize as a struct or map.
    pub fn from_object<T>(object: &T, key_filter: KeyFilter) -> Result<ConfigNode>
    where
        T: Serialize + ?Sized,
    {
        match serde_json::to_value(object)? {
            serde_json::Value::Object(map) => {
                let entries: Vec<(String, Input)> = map
                    .into_iter()
                    .filter(|(key, _)| !is_reserved(key))
                    .map(|(key, value)| (key, Input::from(value)))
                    .collect();
                Self::from_dict(Input::Map(entries), key_filter)
            }
            other => Err(ConfigError::NotAMapping(Input::from(other).kind_name())),
        }
    }

    /// Build a node from the top-level bindings of a settings script.
    ///
    /// Bindings starting with `_` are private to the script and skipped.
    pub fn from_script(source: &str, key_filter: KeyFilter) -> Result<ConfigNode> {
        let bindings = script::parse(source)?;
        let entries: Vec<(String, Input)> = bindings
            .into_iter()
            .filter(|(name, _)| !is_reserved(name))
            .collect();
        Self::from_dict(Input::Map(entries), key_filter)
    }

    /// Read and load a settings script file.
    pub fn from_script_file(path: impl AsRef<Path>, key_filter: KeyFilter) -> Result<ConfigNode> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
        debug!(path = %path.display(), bytes = source.len(), "loading settings script");
        Self::from_script(&source, key_filter)
    }

    /// Serialize to compact JSON text.
    pub fn to_json(node: &ConfigNode) -> Result<String> {
        Ok(serde_json::to_string(node)?)
    }

    /// Serialize to indented JSON text.
    pub fn to_json_pretty(node: &ConfigNode) -> Result<String> {
        Ok(serde_json::to_string_pretty(node)?)
    }

    /// Serialize to YAML text.
    pub fn to_yaml(node: &ConfigNode) -> Result<String> {
        Ok(serde_yaml::to_string(node)?)
    }

    /// Expand to a plain nested JSON object.
    ///
    /// Non-finite floats have no JSON form and become `null`.
    pub fn to_dict(node: &ConfigNode) -> Result<serde_json::Map<String, serde_json::Value>> {
        match serde_json::to_value(node)? {
            serde_json::Value::Object(map) => Ok(map),
            other => Err(ConfigError::NotAMapping(Input::from(other).kind_name())),
        }
    }

    /// Merge `source` into `node`.
    ///
    /// `source` must be a node or a mapping. Keys missing from `node` are
    /// added, nodes present on both sides merge recursively, and every other
    /// value in `source` overwrites the one in `node`.
    pub fn update(node: &ConfigNode, source: impl Into<Input>) -> Result<()> {
        merge::update(node, source.into())
    }

    /// Value of `key`, or `default` when the key is absent.
    pub fn get(node: &ConfigNode, key: &str, default: impl Into<Value>) -> Value {
        node.get(key).unwrap_or_else(|| default.into())
    }

    /// Remove `key` from `node`, returning its value.
    pub fn pop(node: &ConfigNode, key: &str) -> Option<Value> {
        node.pop(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::validate::allow_upper;
    use serde_json::json;

    #[test]
    fn test_create_with_fields() {
        let c = Config::create_with([("a", Input::Int(1)), ("b", Input::tuple([1, 2, 3]))]).unwrap();
        assert_eq!(c.get("a"), Some(Value::Int(1)));
        assert_eq!(Config::to_json(&c).unwrap(), r#"{"a":1,"b":[1,2,3]}"#);
        assert_eq!(Config::pop(&c, "a"), Some(Value::Int(1)));
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn test_create_rejects_bad_key() {
        let err = Config::create_with([("_hidden", 1)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Name);
    }

    #[test]
    fn test_from_dict_requires_mapping() {
        let err = Config::from_dict(vec![1, 2], allow_all()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
        let err = Config::from_dict(json!([1]), allow_all()).unwrap_err();
        assert!(matches!(err, ConfigError::NotAMapping(ref kind) if kind == "list"));
    }

    #[test]
    fn test_from_json() {
        let c = Config::from_json(r#"{"a": 1, "sub": {"b": [1, 2]}}"#, allow_all()).unwrap();
        assert_eq!(c.get("a"), Some(Value::Int(1)));
        let sub = c.get("sub").unwrap();
        assert_eq!(
            sub.as_node().unwrap().get("b"),
            Some(Value::Tuple(vec![Value::Int(1), Value::Int(2)]))
        );
    }

    #[test]
    fn test_from_json_errors() {
        let err = Config::from_json("{not json", allow_all()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
        let err = Config::from_json("[1, 2]", allow_all()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
    }

    #[test]
    fn test_from_yaml_with_filter() {
        let yaml = "DEBUG: true\nname: skipped\nDB:\n  PORT: 5432\n  host: skipped\n";
        let c = Config::from_yaml(yaml, allow_upper()).unwrap();
        assert_eq!(c.keys(), vec!["DEBUG", "DB"]);
        let db = c.get("DB").unwrap();
        assert_eq!(db.as_node().unwrap().keys(), vec!["PORT"]);
    }

    #[derive(Serialize)]
    struct Settings {
        host: String,
        port: u16,
        _secret: String,
        tags: Vec<String>,
    }

    #[test]
    fn test_from_object_skips_private_fields() {
        let settings = Settings {
            host: "localhost".into(),
            port: 8080,
            _secret: "hunter2".into(),
            tags: vec!["a".into()],
        };
        let c = Config::from_object(&settings, allow_all()).unwrap();
        assert_eq!(c.keys(), vec!["host", "port", "tags"]);
        assert_eq!(c.get("port"), Some(Value::Int(8080)));
        assert_eq!(c.get("tags"), Some(Value::Tuple(vec![Value::Str("a".into())])));
    }

    #[test]
    fn test_from_object_requires_struct() {
        let err = Config::from_object(&42, allow_all()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
    }

    #[test]
    fn test_from_script() {
        let source = "DEBUG = True\n_private = 1\nHOSTS = ['a', 'b']\nDB = {'PORT': 5432}\n";
        let c = Config::from_script(source, allow_all()).unwrap();
        assert_eq!(c.keys(), vec!["DEBUG", "HOSTS", "DB"]);
        assert_eq!(
            c.get("HOSTS"),
            Some(Value::Tuple(vec![Value::Str("a".into()), Value::Str("b".into())]))
        );
    }

    #[test]
    fn test_from_script_set_is_type_error() {
        let err = Config::from_script("S = {1, 2}\n", allow_all()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
    }

    #[test]
    fn test_from_missing_script_file() {
        let err = Config::from_script_file("/definitely/not/here.py", allow_all()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(err.to_string().contains("/definitely/not/here.py"));
    }

    #[test]
    fn test_get_with_default() {
        let c = Config::create_with([("a", 1)]).unwrap();
        assert_eq!(Config::get(&c, "a", 0), Value::Int(1));
        assert_eq!(Config::get(&c, "missing", "fallback"), Value::Str("fallback".into()));
        assert_eq!(Config::get(&c, "missing", ()), Value::None);
    }

    #[test]
    fn test_to_yaml() {
        let c = Config::create_with([("a", Input::Int(1)), ("sub", Input::map([("b", "x")]))]).unwrap();
        let yaml = Config::to_yaml(&c).unwrap();
        let back = Config::from_yaml(&yaml, allow_all()).unwrap();
        assert_eq!(Config::to_dict(&back).unwrap(), Config::to_dict(&c).unwrap());
    }

    #[test]
    fn test_to_json_pretty_parses_back() {
        let c = Config::create_with([("a", Input::tuple([Input::None, Input::Bool(true)]))]).unwrap();
        let text = Config::to_json_pretty(&c).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, json!({"a": [null, true]}));
    }

    #[test]
    fn test_to_dict_non_finite_and_bytes() {
        let c = Config::create_with([
            ("nan", Input::Float(f64::NAN)),
            ("raw", Input::bytes(vec![0u8, 255])),
        ])
        .unwrap();
        assert_eq!(
            serde_json::Value::Object(Config::to_dict(&c).unwrap()),
            json!({"nan": null, "raw": [0, 255]})
        );
    }
}
