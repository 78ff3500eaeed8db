//!
//! src/cache.rs
//!
//! Response cache keyed by request URL or synthetic fingerprint URL.
//! Entries never expire and are never evicted. Nothing serializes
//! get-then-put across callers: two concurrent misses on one key both
//! fetch and the last put wins, which is harmless since both bodies come
//! from the same query.
//!

use std::{collections::HashMap, fs, io::Write, path::{Path, PathBuf}, sync::RwLock};

use tracing::warn;

use crate::errors::ResolverError;
use crate::hasher::sha256_hex;

pub trait ResponseCache: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn put(&self, key: &str, body: &str);
}

/// In-process cache, lives as long as the server. Nothing is evicted, so
/// memory grows with the number of distinct queries; long-lived
/// deployments should set `CACHE_DIR` to use `DiskZstdCache` instead.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, String>>
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        match self.entries.read() {
            Ok(map) => map.len(),
            Err(poisoned) => poisoned.into_inner().len()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResponseCache for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        match self.entries.read() {
            Ok(map) => map.get(key).cloned(),
            Err(poisoned) => poisoned.into_inner().get(key).cloned()
        }
    }

    fn put(&self, key: &str, body: &str) {
        match self.entries.write() {
            Ok(mut map) => { map.insert(key.to_string(), body.to_string()); }
            Err(poisoned) => {
                poisoned.into_inner().insert(key.to_string(), body.to_string());
            }
        }
    }
}

/// Cache entries as zstd-compressed files, one per key, named by the
/// SHA-256 of the key so arbitrary URLs map to safe file names.
pub struct DiskZstdCache {
    root: PathBuf,
    level: i32
}

impl DiskZstdCache {
    pub fn new(root: impl AsRef<Path>, level: i32) -> Self {
        Self { root: root.as_ref().to_path_buf(), level: level.clamp(0, 21) }
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let digest = sha256_hex(key.as_bytes());
        self.root.join(&digest[..2]).join(format!("{digest}.body.zst"))
    }

    pub fn read_entry(&self, key: &str) -> Result<Option<String>, ResolverError> {
        let path = self.entry_path(key);
        let file = match fs::File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into())
        };
        let bytes = zstd::stream::decode_all(file).map_err(|e|
            ResolverError::Cache(format!("zstd decode {}: {e}", path.display())))?;
        let body = String::from_utf8(bytes).map_err(|e|
            ResolverError::Cache(format!("utf8 {}: {e}", path.display())))?;
        Ok(Some(body))
    }

    pub fn write_entry(&self, key: &str, body: &str) -> Result<PathBuf, ResolverError> {
        let path = self.entry_path(key);
        let parent = path.parent()
            .ok_or_else(|| ResolverError::Cache(format!("no parent for {}", path.display())))?;

        fs::create_dir_all(parent).map_err(|e|
            ResolverError::Cache(format!("create dir {}: {e}", parent.display())))?;

        let temp = tempfile::NamedTempFile::new_in(parent).map_err(|e|
            ResolverError::Cache(format!("tempfile in {}: {e}", parent.display())))?;

        {
            let mut enc = zstd::stream::write::Encoder::new(temp.as_file(), self.level)
                .map_err(|e| ResolverError::Cache(format!("zstd encoder: {e}")))?;
            enc.write_all(body.as_bytes())
                .map_err(|e| ResolverError::Cache(format!("zstd write: {e}")))?;
            enc.finish()
                .map_err(|e| ResolverError::Cache(format!("zstd finish: {e}")))?;
        }

        temp.persist(&path).map_err(|e|
            ResolverError::Cache(format!("persist {}: {e}", path.display())))?;

        Ok(path)
    }
}

impl ResponseCache for DiskZstdCache {
    fn get(&self, key: &str) -> Option<String> {
        match self.read_entry(key) {
            Ok(hit) => hit,
            Err(e) => {
                warn!(error = %e, key = %key, "cache.read.failed");
                None
            }
        }
    }

    fn put(&self, key: &str, body: &str) {
        if let Err(e) = self.write_entry(key, body) {
            warn!(error = %e, key = %key, "cache.write.failed");
        }
    }
}
