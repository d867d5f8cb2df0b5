use crate::error::Result;
use crate::io;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

type PinnedMap = BTreeMap<String, BTreeSet<u64>>;

/// Per-project set of pinned issue numbers, persisted as JSON keyed by
/// `owner/repo`. Pins never expire on their own; the ranking layer consults
/// them to exclude issues from automatic dispatch.
pub struct PinnedItemsStore {
    path: PathBuf,
}

impl PinnedItemsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing or corrupt file loads as an empty map — local state damage
    /// must never fail the calling operation.
    fn load(&self) -> PinnedMap {
        let Ok(data) = std::fs::read_to_string(&self.path) else {
            return PinnedMap::new();
        };
        match serde_json::from_str(&data) {
            Ok(map) => map,
            Err(e) => {
                tracing::warn!("pinned store unreadable, starting empty: {e}");
                PinnedMap::new()
            }
        }
    }

    fn save(&self, map: &PinnedMap) -> Result<()> {
        let data = serde_json::to_vec_pretty(map)?;
        io::atomic_write(&self.path, &data)
    }

    pub fn pin(&self, project: &str, number: u64) -> Result<()> {
        let mut map = self.load();
        map.entry(project.to_string()).or_default().insert(number);
        self.save(&map)
    }

    /// Returns true if the issue was pinned before the call.
    pub fn unpin(&self, project: &str, number: u64) -> Result<bool> {
        let mut map = self.load();
        let removed = map
            .get_mut(project)
            .map(|set| set.remove(&number))
            .unwrap_or(false);
        if removed {
            self.save(&map)?;
        }
        Ok(removed)
    }

    pub fn is_pinned(&self, project: &str, number: u64) -> bool {
        self.load()
            .get(project)
            .map(|set| set.contains(&number))
            .unwrap_or(false)
    }

    pub fn pinned(&self, project: &str) -> BTreeSet<u64> {
        self.load().get(project).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> PinnedItemsStore {
        PinnedItemsStore::new(dir.path().join("pinned.json"))
    }

    #[test]
    fn pin_unpin_roundtrip() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        s.pin("octo/proj", 7).unwrap();
        s.pin("octo/proj", 9).unwrap();
        assert!(s.is_pinned("octo/proj", 7));
        assert_eq!(s.pinned("octo/proj"), BTreeSet::from([7, 9]));

        assert!(s.unpin("octo/proj", 7).unwrap());
        assert!(!s.is_pinned("octo/proj", 7));
        assert!(!s.unpin("octo/proj", 7).unwrap());
    }

    #[test]
    fn projects_are_isolated() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        s.pin("octo/a", 1).unwrap();
        assert!(!s.is_pinned("octo/b", 1));
        assert!(s.pinned("octo/b").is_empty());
    }

    #[test]
    fn corrupt_file_defaults_empty() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        std::fs::write(s.path(), "not json").unwrap();
        assert!(s.pinned("octo/proj").is_empty());
        // And pinning over the corrupt file recovers it.
        s.pin("octo/proj", 3).unwrap();
        assert!(s.is_pinned("octo/proj", 3));
    }

    #[test]
    fn persists_across_instances() {
        let dir = TempDir::new().unwrap();
        store(&dir).pin("octo/proj", 11).unwrap();
        assert!(store(&dir).is_pinned("octo/proj", 11));
    }
}
