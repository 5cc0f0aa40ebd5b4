//! Single-document JSON persistence shared by both stores.
//!
//! State fits comfortably in one keyed JSON document at this scale
//! (hundreds to low thousands of users). Loads are forgiving: a
//! missing or corrupt file yields an empty map with a warning, since
//! subscriptions are recoverable (users resubscribe) but refusing to
//! start is not. Writes are atomic via tmp + rename so a reader never
//! observes a partially written document.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::error::StoreError;

/// Load a keyed document, falling back to empty on any read/parse failure.
pub(crate) fn load_or_empty<T: DeserializeOwned>(path: &Path) -> HashMap<String, T> {
    if !path.exists() {
        return HashMap::new();
    }
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "store unreadable, starting empty");
            return HashMap::new();
        }
    };
    match serde_json::from_str(&raw) {
        Ok(map) => map,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "store corrupt, starting empty");
            HashMap::new()
        }
    }
}

/// Write the full document atomically. The mutation is durable once
/// this returns Ok.
pub(crate) fn persist<T: Serialize>(
    path: &Path,
    map: &HashMap<String, T>,
) -> Result<(), StoreError> {
    let json = serde_json::to_vec_pretty(map).map_err(|e| StoreError::Serialize(e.to_string()))?;

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, &json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let map: HashMap<String, String> = load_or_empty(&dir.path().join("nope.json"));
        assert!(map.is_empty());
    }

    #[test]
    fn test_load_corrupt_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{not json").unwrap();
        let map: HashMap<String, String> = load_or_empty(&path);
        assert!(map.is_empty());
    }

    #[test]
    fn test_persist_then_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        let mut map = HashMap::new();
        map.insert("u1".to_string(), "capetown-7-gardens".to_string());
        persist(&path, &map).unwrap();

        let loaded: HashMap<String, String> = load_or_empty(&path);
        assert_eq!(loaded, map);
        // No stray tmp file left behind.
        assert!(!path.with_extension("json.tmp").exists());
    }
}
