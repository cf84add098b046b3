//! Legacy cache adapters. Each step is a pure function over the raw JSON so
//! the chain can be composed without intermediate typed models.
//!
//! ```text
//! v0: {"mapping": {uid: "path"}}
//! v1: {"meta": {"schema_version": 1, "config_hash", "run_id"},
//!      "mapping": {uid: {"path", "last_seen"}}}
//! v2: {"schema_version": 2, "config_hash", "run_id",
//!      "entries": {uid: {"path", "stale", "last_seen_run"}}}
//! ```

use serde_json::{Map, Value, json};

use crate::error::CacheError;

use super::cache::CACHE_SCHEMA_VERSION;

/// Schema version of a raw cache document, if recognizable.
pub fn detect_version(doc: &Value) -> Option<u32> {
    let read = |v: &Value| v.as_u64().and_then(|n| u32::try_from(n).ok());
    if let Some(v) = doc.get("schema_version") {
        return read(v);
    }
    if let Some(v) = doc.get("meta").and_then(|m| m.get("schema_version")) {
        return read(v);
    }
    doc.get("mapping").is_some().then_some(0)
}

pub fn migrate_v0_to_v1(doc: Value) -> Result<Value, String> {
    let mapping = doc
        .get("mapping")
        .and_then(Value::as_object)
        .ok_or("v0 cache has no mapping object")?;
    let mut out = Map::new();
    for (uid, path) in mapping {
        let path = path
            .as_str()
            .ok_or_else(|| format!("v0 entry {uid} is not a path string"))?;
        out.insert(uid.clone(), json!({"path": path, "last_seen": 0}));
    }
    Ok(json!({
        "meta": {"schema_version": 1, "config_hash": "", "run_id": 0},
        "mapping": out,
    }))
}

pub fn migrate_v1_to_v2(doc: Value) -> Result<Value, String> {
    let meta = doc.get("meta").cloned().unwrap_or(Value::Null);
    let mapping = doc
        .get("mapping")
        .and_then(Value::as_object)
        .ok_or("v1 cache has no mapping object")?;
    let mut entries = Map::new();
    for (uid, entry) in mapping {
        let path = entry
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| format!("v1 entry {uid} has no path"))?;
        let last_seen = entry.get("last_seen").and_then(Value::as_u64).unwrap_or(0);
        entries.insert(
            uid.clone(),
            json!({"path": path, "stale": false, "last_seen_run": last_seen}),
        );
    }
    Ok(json!({
        "schema_version": 2,
        "config_hash": meta.get("config_hash").and_then(Value::as_str).unwrap_or(""),
        "run_id": meta.get("run_id").and_then(Value::as_u64).unwrap_or(0),
        "entries": entries,
    }))
}

/// Bring a raw document to the current schema.
///
/// Returns the upgraded document and the version it was migrated from, or
/// `None` if it was already current. Older versions require
/// `accept_legacy`; newer versions are always rejected.
pub fn upgrade(
    doc: Value,
    accept_legacy: bool,
    path: &str,
) -> Result<(Value, Option<u32>), CacheError> {
    let corrupt = |message: String| CacheError::Corrupt {
        path: path.to_string(),
        message,
    };
    let found = detect_version(&doc).ok_or_else(|| corrupt("unrecognized cache layout".into()))?;
    if found == CACHE_SCHEMA_VERSION {
        return Ok((doc, None));
    }
    if found > CACHE_SCHEMA_VERSION || !accept_legacy {
        return Err(CacheError::SchemaMismatch {
            found,
            expected: CACHE_SCHEMA_VERSION,
        });
    }

    let mut doc = doc;
    let mut version = found;
    while version < CACHE_SCHEMA_VERSION {
        doc = match version {
            0 => migrate_v0_to_v1(doc),
            1 => migrate_v1_to_v2(doc),
            other => Err(format!("no migration from version {other}")),
        }
        .map_err(corrupt)?;
        version += 1;
    }
    Ok((doc, Some(found)))
}
