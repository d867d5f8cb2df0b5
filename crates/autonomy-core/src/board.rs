use crate::error::Result;
use crate::io;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Logical board fields the project-board transport is expected to provide.
/// The transport resolves each name to an external field identifier once and
/// caches it here.
pub const REQUIRED_FIELDS: &[&str] = &["Priority", "Pinned", "Sprint", "Track"];

/// Persisted mapping from logical board field name to the external field
/// identifier, kept to avoid redundant remote lookups.
pub struct FieldCache {
    path: PathBuf,
}

impl FieldCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> BTreeMap<String, String> {
        let Ok(data) = std::fs::read_to_string(&self.path) else {
            return BTreeMap::new();
        };
        match serde_json::from_str(&data) {
            Ok(map) => map,
            Err(e) => {
                tracing::warn!("field cache unreadable, starting empty: {e}");
                BTreeMap::new()
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.load().get(name).cloned()
    }

    pub fn set(&self, name: &str, id: &str) -> Result<()> {
        let mut map = self.load();
        map.insert(name.to_string(), id.to_string());
        let data = serde_json::to_vec_pretty(&map)?;
        io::atomic_write(&self.path, &data)
    }

    /// Required fields not yet resolved to an external identifier.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let map = self.load();
        REQUIRED_FIELDS
            .iter()
            .filter(|name| !map.contains_key(**name))
            .copied()
            .collect()
    }
}
