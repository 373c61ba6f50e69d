//! File loading with layer-based merging.
//!
//! A file is decoded according to its extension. Several files load as
//! layers merged in order, later layers taking precedence field by field.

use super::Config;
use crate::error::{ConfigError, Result};
use crate::node::ConfigNode;
use crate::validate::KeyFilter;
use std::path::Path;
use tracing::debug;

/// Source format of a configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Json,
    Yaml,
    /// Settings script; the fallback for unknown extensions.
    Script,
}

impl FileFormat {
    /// Pick the format from the file extension.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("json") => FileFormat::Json,
            Some("yaml" | "yml") => FileFormat::Yaml,
            _ => FileFormat::Script,
        }
    }
}

impl std::fmt::Display for FileFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileFormat::Json => write!(f, "json"),
            FileFormat::Yaml => write!(f, "yaml"),
            FileFormat::Script => write!(f, "script"),
        }
    }
}

/// Load one configuration file.
pub fn load_file(path: impl AsRef<Path>, key_filter: KeyFilter) -> Result<ConfigNode> {
    let path = path.as_ref();
    let format = FileFormat::from_path(path);
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
    debug!(path = %path.display(), %format, "loading configuration file");

    match format {
        FileFormat::Json => Config::from_json(&content, key_filter),
        FileFormat::Yaml => Config::from_yaml(&content, key_filter),
        FileFormat::Script => Config::from_script(&content, key_filter),
    }
}

/// Load files in order and merge them into one node.
///
/// The first file is the lowest-precedence layer. Nested nodes merge
/// recursively; any other value from a later layer replaces the earlier one.
pub fn load_layers<I, P>(paths: I, key_filter: KeyFilter) -> Result<ConfigNode>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let merged = ConfigNode::new(key_filter.clone());
    for (index, path) in paths.into_iter().enumerate() {
        let layer = load_file(path.as_ref(), key_filter.clone())?;
        debug!(layer = index, fields = layer.len(), "merging configuration layer");
        Config::update(&merged, &layer)?;
    }
    Ok(merged)
}
