//! Hierarchical, type-checked configuration objects.
//!
//! A [`ConfigNode`] holds named fields restricted to a closed set of value
//! kinds. Nodes nest and may be shared between parents, but never form a
//! cycle. [`Config`] creates nodes from fields, mappings, JSON, YAML,
//! serializable objects and settings scripts, merges them, and serializes
//! them back.
//!
//! ```
//! use os_config::{Config, Input, Value};
//!
//! let c = Config::create_with([("a", Input::Int(1)), ("b", Input::tuple([1, 2, 3]))])?;
//! assert_eq!(Config::to_json(&c)?, r#"{"a":1,"b":[1,2,3]}"#);
//!
//! c.set("db", Input::map([("port", 5432)]))?;
//! let db = c.get("db").unwrap();
//! assert_eq!(db.as_node().unwrap().get("port"), Some(Value::Int(5432)));
//!
//! assert!(c.set("self_ref", &c).is_err());
//! # Ok::<(), os_config::ConfigError>(())
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod node;
pub mod script;
pub mod serialize;
pub mod validate;
pub mod value;

pub use config::Config;
pub use config::loader::{FileFormat, load_file, load_layers};
pub use error::{ConfigError, ErrorKind, Result};
pub use node::ConfigNode;
pub use validate::{KeyFilter, allow_all, allow_upper};
pub use value::{Input, Value};
