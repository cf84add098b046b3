use std::fs::File;
use std::io::Write as _;
use std::path::{Component, Path, PathBuf};

use crate::error::PersistError;

/// Write `bytes` to a sibling temp file, fsync, then rename over `path`.
/// Readers see either the old contents or the new, never a partial file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PersistError> {
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(parent) = parent {
        std::fs::create_dir_all(parent)?;
    }
    let file_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("cairn");
    let tmp_name = format!(".{file_name}.tmp-{}", std::process::id());
    let tmp = parent.map_or_else(|| PathBuf::from(&tmp_name), |p| p.join(&tmp_name));

    let written = write_synced(&tmp, bytes).and_then(|()| std::fs::rename(&tmp, path));
    if let Err(e) = written {
        let _ = std::fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

/// Serialize `value` as pretty JSON with a trailing newline and write it
/// atomically.
pub fn write_json_atomic<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), PersistError> {
    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');
    write_atomic(path, &bytes)
}

/// Join a relative output path under `root`, refusing absolute paths and
/// any `..` component.
pub fn contained_join(root: &Path, relative: &str) -> Result<PathBuf, PersistError> {
    let rel = Path::new(relative);
    let escapes = rel
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if relative.is_empty() || escapes {
        return Err(PersistError::Escape(relative.to_string()));
    }
    Ok(root.join(rel))
}
