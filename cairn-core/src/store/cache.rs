use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{CacheError, PersistError};
use crate::types::ItemId;

use super::atomic::write_json_atomic;
use super::migrate;

/// Current on-disk cache schema.
pub const CACHE_SCHEMA_VERSION: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub path: String,
    #[serde(default)]
    pub stale: bool,
    #[serde(default)]
    pub last_seen_run: u64,
}

/// Persistent uid → path mapping.
///
/// Loaded once per run, read-only during resolution, and replaced by the
/// snapshot [`IdentityCache::advance`] returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityCache {
    pub schema_version: u32,
    #[serde(default)]
    pub config_hash: String,
    #[serde(default)]
    pub run_id: u64,
    #[serde(default)]
    pub entries: BTreeMap<ItemId, CacheEntry>,
}

impl Default for IdentityCache {
    fn default() -> Self {
        Self {
            schema_version: CACHE_SCHEMA_VERSION,
            config_hash: String::new(),
            run_id: 0,
            entries: BTreeMap::new(),
        }
    }
}

/// A cache as read from disk.
#[derive(Debug, Clone)]
pub struct LoadedCache {
    pub cache: IdentityCache,
    /// Legacy version the file was migrated from, if any.
    pub migrated_from: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub stale: usize,
    pub run_id: u64,
}

impl IdentityCache {
    /// Read the cache at `path`. A missing file is an empty cache.
    pub fn load(path: &Path, accept_legacy: bool) -> Result<LoadedCache, CacheError> {
        if !path.exists() {
            info!(path = %path.display(), "No cache file, starting empty");
            return Ok(LoadedCache {
                cache: Self::default(),
                migrated_from: None,
            });
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text, accept_legacy, &path.display().to_string())
    }

    pub fn from_json(
        text: &str,
        accept_legacy: bool,
        origin: &str,
    ) -> Result<LoadedCache, CacheError> {
        let corrupt = |message: String| CacheError::Corrupt {
            path: origin.to_string(),
            message,
        };
        let raw: serde_json::Value =
            serde_json::from_str(text).map_err(|e| corrupt(e.to_string()))?;
        let (doc, migrated_from) = migrate::upgrade(raw, accept_legacy, origin)?;
        let cache: Self = serde_json::from_value(doc).map_err(|e| corrupt(e.to_string()))?;
        if let Some(from) = migrated_from {
            warn!(
                from,
                to = CACHE_SCHEMA_VERSION,
                entries = cache.entries.len(),
                "Migrated legacy cache"
            );
        }
        Ok(LoadedCache {
            cache,
            migrated_from,
        })
    }

    /// Entry for `uid`, stale or not. A returning item keeps its path.
    pub fn entry(&self, uid: &ItemId) -> Option<&CacheEntry> {
        self.entries.get(uid)
    }

    /// Snapshot for the next run: placed uids are refreshed, absent uids
    /// are marked stale and retained.
    pub fn advance(&self, placements: &BTreeMap<ItemId, String>, config_hash: &str) -> Self {
        let run_id = self.run_id + 1;
        let mut entries = BTreeMap::new();
        for (uid, entry) in &self.entries {
            if !placements.contains_key(uid) {
                entries.insert(
                    uid.clone(),
                    CacheEntry {
                        stale: true,
                        ..entry.clone()
                    },
                );
            }
        }
        for (uid, path) in placements {
            entries.insert(
                uid.clone(),
                CacheEntry {
                    path: path.clone(),
                    stale: false,
                    last_seen_run: run_id,
                },
            );
        }
        Self {
            schema_version: CACHE_SCHEMA_VERSION,
            config_hash: config_hash.to_string(),
            run_id,
            entries,
        }
    }

    /// Remove stale entries, or only those missing for more than
    /// `max_missing_runs` runs. Returns the removed uids.
    pub fn prune_stale(&mut self, max_missing_runs: Option<u64>) -> BTreeSet<ItemId> {
        let run_id = self.run_id;
        let doomed: BTreeSet<ItemId> = self
            .entries
            .iter()
            .filter(|(_, e)| {
                e.stale
                    && max_missing_runs
                        .is_none_or(|n| run_id.saturating_sub(e.last_seen_run) > n)
            })
            .map(|(uid, _)| uid.clone())
            .collect();
        self.entries.retain(|uid, _| !doomed.contains(uid));
        if !doomed.is_empty() {
            info!(removed = doomed.len(), "Pruned stale cache entries");
        }
        doomed
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            stale: self.entries.values().filter(|e| e.stale).count(),
            run_id: self.run_id,
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), PersistError> {
        write_json_atomic(path, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn placements(pairs: &[(&str, &str)]) -> BTreeMap<ItemId, String> {
        pairs
            .iter()
            .map(|(u, p)| (ItemId::from(*u), (*p).to_string()))
            .collect()
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = IdentityCache::load(&dir.path().join("none.json"), false).unwrap();
        assert!(loaded.cache.entries.is_empty());
        assert_eq!(loaded.cache.schema_version, CACHE_SCHEMA_VERSION);
    }

    #[test]
    fn advance_refreshes_and_marks_stale() {
        let first = IdentityCache::default().advance(
            &placements(&[("A", "Global/X/A.md"), ("B", "Global/X/B.md")]),
            "h1",
        );
        assert_eq!(first.run_id, 1);

        let second = first.advance(&placements(&[("A", "Global/Y/A.md")]), "h2");
        assert_eq!(second.run_id, 2);
        assert_eq!(second.config_hash, "h2");
        let a = &second.entries[&ItemId::from("A")];
        assert_eq!((a.path.as_str(), a.stale, a.last_seen_run), ("Global/Y/A.md", false, 2));
        let b = &second.entries[&ItemId::from("B")];
        assert!(b.stale);
        assert_eq!(b.last_seen_run, 1);
        assert!(second.entry(&ItemId::from("B")).is_some_and(|e| e.stale));
    }

    #[test]
    fn prune_respects_missing_run_bound() {
        let mut cache = IdentityCache::default();
        cache.run_id = 10;
        for (uid, last, stale) in [("old", 2, true), ("recent", 9, true), ("live", 10, false)] {
            cache.entries.insert(
                ItemId::from(uid),
                CacheEntry {
                    path: format!("Global/{uid}.md"),
                    stale,
                    last_seen_run: last,
                },
            );
        }
        let removed = cache.prune_stale(Some(5));
        assert_eq!(removed, BTreeSet::from([ItemId::from("old")]));

        let removed = cache.prune_stale(None);
        assert_eq!(removed, BTreeSet::from([ItemId::from("recent")]));
        assert_eq!(cache.stats().entries, 1);
    }

    #[test]
    fn save_then_load_current_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let cache = IdentityCache::default().advance(&placements(&[("A", "Global/A.md")]), "h");
        cache.save(&path).unwrap();

        let loaded = IdentityCache::load(&path, false).unwrap();
        assert_eq!(loaded.cache, cache);
        assert_eq!(loaded.migrated_from, None);
    }

    #[test]
    fn legacy_file_needs_acceptance() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, r#"{"mapping": {"A": "Global/A.md"}}"#).unwrap();

        let err = IdentityCache::load(&path, false).unwrap_err();
        assert!(matches!(err, CacheError::SchemaMismatch { found: 0, .. }));

        let loaded = IdentityCache::load(&path, true).unwrap();
        assert_eq!(loaded.migrated_from, Some(0));
        assert_eq!(loaded.cache.entries[&ItemId::from("A")].path, "Global/A.md");
    }

    #[test]
    fn garbage_is_corrupt() {
        let err = IdentityCache::from_json("not json", true, "c.json").unwrap_err();
        assert!(matches!(err, CacheError::Corrupt { .. }));
    }
}
