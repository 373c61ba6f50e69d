//! Key validation and built-in key filters.

use crate::error::{ConfigError, Result};
use regex_lite::Regex;
use std::rc::Rc;
use std::sync::LazyLock;

/// Prefix reserved for engine bookkeeping; user keys may not start with it.
pub const RESERVED_PREFIX: &str = "_";

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid"));

/// Predicate deciding whether a key is accepted by a node.
///
/// Keys rejected by the filter are dropped silently on assignment.
pub type KeyFilter = Rc<dyn Fn(&str) -> bool>;

/// Filter accepting every valid key.
pub fn allow_all() -> KeyFilter {
    Rc::new(|_: &str| true)
}

/// Filter accepting only upper-case keys (`DEBUG`, `DB_PORT`).
///
/// A key qualifies when it contains at least one cased character and none
/// of its cased characters are lower-case.
pub fn allow_upper() -> KeyFilter {
    Rc::new(is_upper)
}

fn is_upper(key: &str) -> bool {
    key.chars().any(char::is_uppercase) && !key.chars().any(char::is_lowercase)
}

/// Check whether `name` is a bare identifier.
pub fn is_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

/// Check whether `name` starts with the reserved prefix.
pub fn is_reserved(name: &str) -> bool {
    name.starts_with(RESERVED_PREFIX)
}

/// Validate a user key: not reserved and a bare identifier.
pub fn ensure_key(key: &str) -> Result<()> {
    if is_reserved(key) {
        return Err(ConfigError::ReservedName(key.to_string()));
    }
    if !is_identifier(key) {
        return Err(ConfigError::InvalidName(key.to_string()));
    }
    Ok(())
}
