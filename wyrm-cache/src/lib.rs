#![deny(missing_docs)]
//! Content-addressed cache for wyrm.
//!
//! Keys are short SHA-256 digests over `(instruction, rendered context,
//! purpose)` or, for ASLR-resistant lookups, over the raw bytes of a code
//! region plus a purpose suffix. Storage is a directory of one JSON file per
//! key, created lazily; corrupt or unreadable entries read as misses and a
//! failed write never fails the caller.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

/// Length of the hex digest kept in cache keys.
const KEY_HEX_LEN: usize = 16;

/// Hash `parts` into a cache key: newline-joined, SHA-256, truncated hex.
pub fn key_from_parts(parts: &[&str]) -> String {
    let blob = parts.join("\n");
    let digest = Sha256::digest(blob.as_bytes());
    hex_prefix(&digest)
}

/// Hash raw code bytes into a cache key, with an optional purpose suffix.
pub fn key_from_bytes(bytes: &[u8], suffix: &str) -> String {
    let digest = Sha256::digest(bytes);
    let hash = hex_prefix(&digest);
    if suffix.is_empty() {
        hash
    } else {
        format!("{hash}_{suffix}")
    }
}

fn hex_prefix(digest: &[u8]) -> String {
    let mut out = String::with_capacity(KEY_HEX_LEN);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
        if out.len() >= KEY_HEX_LEN {
            break;
        }
    }
    out.truncate(KEY_HEX_LEN);
    out
}

/// Simple file-based key-value storage for cache entries.
///
/// Layout: one `<key>.json` file per entry under the root directory.
pub struct FileStorage {
    directory: PathBuf,
}

impl FileStorage {
    /// Create storage rooted at `directory`. The directory is created
    /// lazily on first write.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.directory.join(format!("{key}.json"))
    }

    /// Retrieve a cached value by key. Corrupt entries are logged misses.
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        let path = self.key_path(key);
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                tracing::warn!(key, %err, "failed to read cache entry");
                return None;
            }
        };
        match serde_json::from_str(&contents) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(key, %err, "corrupt cache entry treated as miss");
                None
            }
        }
    }

    /// Store a value. Best-effort: failures are logged, never returned.
    pub fn set(&self, key: &str, value: &serde_json::Value) {
        if let Err(err) = std::fs::create_dir_all(&self.directory) {
            tracing::warn!(key, %err, "failed to create cache directory");
            return;
        }
        let rendered = match serde_json::to_string(value) {
            Ok(rendered) => rendered,
            Err(err) => {
                tracing::warn!(key, %err, "failed to serialize cache entry");
                return;
            }
        };
        if let Err(err) = std::fs::write(self.key_path(key), rendered) {
            tracing::warn!(key, %err, "failed to write cache entry");
        }
    }

    /// Delete a cache entry. Returns whether an entry existed.
    pub fn delete(&self, key: &str) -> bool {
        std::fs::remove_file(self.key_path(key)).is_ok()
    }

    /// Remove all cache entries.
    pub fn clear(&self) {
        let Ok(entries) = std::fs::read_dir(&self.directory) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                let _ = std::fs::remove_file(path);
            }
        }
    }

    /// List all cache keys.
    pub fn keys(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.directory) else {
            return Vec::new();
        };
        entries
            .flatten()
            .filter_map(|entry| {
                let path = entry.path();
                (path.extension()? == "json")
                    .then(|| path.file_stem()?.to_str().map(str::to_string))
                    .flatten()
            })
            .collect()
    }

    /// The storage root.
    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

/// Content-addressed cache over a [`FileStorage`].
///
/// Keying on code bytes instead of addresses makes entries survive process
/// restarts and ASLR re-randomization.
pub struct ContentCache {
    storage: FileStorage,
}

impl ContentCache {
    /// Create a cache over `storage`.
    pub fn new(storage: FileStorage) -> Self {
        Self { storage }
    }

    /// Create a content-addressed key from code bytes.
    pub fn make_key(&self, code_bytes: &[u8], suffix: &str) -> String {
        key_from_bytes(code_bytes, suffix)
    }

    /// Look up a cached value by code content.
    pub fn get(&self, code_bytes: &[u8], suffix: &str) -> Option<serde_json::Value> {
        self.storage.get(&self.make_key(code_bytes, suffix))
    }

    /// Store a value keyed by code content.
    pub fn set(&self, code_bytes: &[u8], value: &serde_json::Value, suffix: &str) {
        self.storage.set(&self.make_key(code_bytes, suffix), value);
    }

    /// Direct key lookup.
    pub fn get_by_key(&self, key: &str) -> Option<serde_json::Value> {
        self.storage.get(key)
    }

    /// Direct key storage.
    pub fn set_by_key(&self, key: &str, value: &serde_json::Value) {
        self.storage.set(key, value);
    }

    /// Remove everything.
    pub fn clear(&self) {
        self.storage.clear();
    }

    /// List all keys.
    pub fn keys(&self) -> Vec<String> {
        self.storage.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_is_16_hex_chars_and_deterministic() {
        let a = key_from_parts(&["show pc", "Target: arm64", "act"]);
        let b = key_from_parts(&["show pc", "Target: arm64", "act"]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn different_purposes_get_different_keys() {
        let act = key_from_parts(&["x", "ctx", "act"]);
        let observe = key_from_parts(&["x", "ctx", "observe"]);
        assert_ne!(act, observe);
    }

    #[test]
    fn byte_key_carries_suffix() {
        let key = key_from_bytes(b"\x55\x48\x89\xe5", "decompile");
        assert!(key.ends_with("_decompile"));
        assert_eq!(key.split('_').next().unwrap().len(), 16);
    }

    #[test]
    fn storage_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        storage.set("abc", &json!({"success": true}));
        assert_eq!(storage.get("abc"), Some(json!({"success": true})));
    }

    #[test]
    fn missing_key_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        assert_eq!(storage.get("nothing"), None);
    }

    #[test]
    fn corrupt_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        std::fs::write(dir.path().join("bad.json"), "{not json").unwrap();
        assert_eq!(storage.get("bad"), None);
    }

    #[test]
    fn directory_is_created_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("deep").join("cache");
        let storage = FileStorage::new(&nested);
        assert!(!nested.exists());
        storage.set("k", &json!(1));
        assert!(nested.exists());
    }

    #[test]
    fn clear_and_keys() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        storage.set("one", &json!(1));
        storage.set("two", &json!(2));
        let mut keys = storage.keys();
        keys.sort();
        assert_eq!(keys, vec!["one", "two"]);
        storage.clear();
        assert!(storage.keys().is_empty());
    }

    #[test]
    fn delete_reports_existence() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        storage.set("gone", &json!(1));
        assert!(storage.delete("gone"));
        assert!(!storage.delete("gone"));
    }

    #[test]
    fn content_cache_by_bytes_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::new(FileStorage::new(dir.path()));
        cache.set(b"\x90\x90", &json!({"verdict": "nop sled"}), "analysis");
        assert_eq!(
            cache.get(b"\x90\x90", "analysis"),
            Some(json!({"verdict": "nop sled"}))
        );
        // Different suffix misses.
        assert_eq!(cache.get(b"\x90\x90", "decompile"), None);
    }
}
