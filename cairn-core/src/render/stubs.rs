use std::collections::BTreeSet;
use std::path::Path;

use tracing::{debug, info};

use crate::error::PersistError;
use crate::store::{contained_join, write_atomic};

use super::report::MoveRecord;

/// Stubs written and skipped by one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StubSummary {
    pub written: Vec<String>,
    /// Old paths left alone: an existing file, or a page of this run.
    pub skipped: Vec<String>,
}

/// Link from the directory of `from` to `to`, both relative to the output
/// root.
pub fn relative_link(from: &str, to: &str) -> String {
    let from_dir: Vec<&str> = from.split('/').filter(|s| !s.is_empty()).collect();
    let from_dir = &from_dir[..from_dir.len().saturating_sub(1)];
    let target: Vec<&str> = to.split('/').filter(|s| !s.is_empty()).collect();
    let shared = from_dir
        .iter()
        .zip(&target)
        .take_while(|(a, b)| a == b)
        .count();
    let mut parts: Vec<&str> = vec![".."; from_dir.len() - shared];
    parts.extend(&target[shared..]);
    parts.join("/")
}

fn quoted(value: &str) -> String {
    serde_json::Value::from(value).to_string()
}

pub fn render_stub(mv: &MoveRecord) -> String {
    let file = mv.old_path.rsplit('/').next().unwrap_or(&mv.old_path);
    let title = file.strip_suffix(".md").unwrap_or(file);
    format!(
        "---\nuid: {uid}\nobsolete: true\nold_path: {old}\nnew_path: {new}\n---\n\n\
         # {title}\n\nThis page moved to [{target}]({link}).\n",
        uid = quoted(mv.uid.as_str()),
        old = quoted(&mv.old_path),
        new = quoted(&mv.new_path),
        target = mv.new_path,
        link = relative_link(&mv.old_path, &mv.new_path),
    )
}

/// Write one redirect stub per move under `out_dir`.
///
/// A stub is never written over an existing file, and never at a path that
/// another item occupies in this run.
pub fn write_stubs(
    out_dir: &Path,
    moves: &[MoveRecord],
    live_paths: &BTreeSet<String>,
) -> Result<StubSummary, PersistError> {
    let live: BTreeSet<String> = live_paths.iter().map(|p| p.to_ascii_lowercase()).collect();
    let mut summary = StubSummary::default();
    for mv in moves {
        let target = contained_join(out_dir, &mv.old_path)?;
        if target.exists() || live.contains(&mv.old_path.to_ascii_lowercase()) {
            debug!(path = %mv.old_path, "Stub skipped");
            summary.skipped.push(mv.old_path.clone());
            continue;
        }
        write_atomic(&target, render_stub(mv).as_bytes())?;
        summary.written.push(mv.old_path.clone());
    }
    info!(
        written = summary.written.len(),
        skipped = summary.skipped.len(),
        "Redirect stubs"
    );
    Ok(summary)
}
