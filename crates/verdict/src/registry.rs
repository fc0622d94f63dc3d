//! Process-global ornament registry
//!
//! Ornaments registered here are visible to every evaluation in the
//! process, after builtins and any per-evaluation extensions.

use std::sync::{Arc, LazyLock};

use dashmap::DashMap;

use crate::error::VerdictError;

/// An ornament implementation. Values cross the boundary as JSON; a
/// returned `Err` becomes an error diagnostic at the ornament's span.
pub type OrnamentFn =
    Arc<dyn Fn(serde_json::Value) -> Result<serde_json::Value, String> + Send + Sync>;

static GLOBAL: LazyLock<DashMap<String, OrnamentFn>> = LazyLock::new(DashMap::new);

/// True for a well-formed ornament key: a lowercase word, `_` allowed
/// after the first character.
pub fn valid_key(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c == '_')
}

/// Register a global ornament. Replaces any previous registration under
/// the same name.
pub fn register<F>(name: &str, f: F) -> Result<(), VerdictError>
where
    F: Fn(serde_json::Value) -> Result<serde_json::Value, String> + Send + Sync + 'static,
{
    if !valid_key(name) {
        return Err(VerdictError::InvalidOrnamentKey(name.to_string()));
    }
    GLOBAL.insert(name.to_string(), Arc::new(f));
    Ok(())
}

/// Remove a global ornament. Returns whether it was registered.
pub fn unregister(name: &str) -> bool {
    GLOBAL.remove(name).is_some()
}

/// Look up a global ornament.
pub fn get(name: &str) -> Option<OrnamentFn> {
    GLOBAL.get(name).map(|entry| Arc::clone(entry.value()))
}

/// Names of every registered global ornament.
pub fn keys() -> Vec<String> {
    GLOBAL.iter().map(|entry| entry.key().clone()).collect()
}
