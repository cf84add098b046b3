use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Deserialize;
use tracing::{debug, info, instrument};

use crate::error::IngestError;

/// One record from an extractor manifest.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestRecord {
    #[serde(default)]
    pub uid: Option<String>,
    pub name: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default, alias = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
    /// Inheritance chain, root first, immediate base last.
    #[serde(default)]
    pub inheritance: Vec<String>,
    #[serde(default)]
    pub implements: Vec<String>,
}

/// A record tagged with the manifest it came from and its position there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcedRecord {
    pub record: ManifestRecord,
    pub source: String,
    pub position: usize,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ManifestFile {
    List(Vec<ManifestRecord>),
    Wrapped { items: Vec<ManifestRecord> },
}

impl ManifestFile {
    fn into_records(self) -> Vec<ManifestRecord> {
        match self {
            Self::List(records) | Self::Wrapped { items: records } => records,
        }
    }
}

const MANIFEST_EXTENSIONS: [&str; 3] = ["json", "yml", "yaml"];

/// Find manifest files under `input` (or `input` itself if it is a file),
/// sorted by path.
pub fn find_manifests(input: &Path) -> Result<Vec<PathBuf>, IngestError> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }
    if !input.is_dir() {
        return Err(IngestError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("input not found: {}", input.display()),
        )));
    }

    let mut matched = Vec::new();
    for ext in MANIFEST_EXTENSIONS {
        let pattern = input.join("**").join(format!("*.{ext}"));
        let pattern = pattern.to_string_lossy();
        let paths = glob::glob(&pattern).map_err(|e| IngestError::Pattern(e.to_string()))?;
        matched.extend(paths.flatten().filter(|p| p.is_file()));
    }
    matched.sort();
    matched.dedup();
    Ok(matched)
}

/// Parse every manifest under `input` in parallel.
///
/// The result is ordered by `(source, position)` regardless of which file
/// finished parsing first.
#[instrument(skip_all, name = "load_manifests")]
pub fn load_manifests(input: &Path) -> Result<Vec<SourcedRecord>, IngestError> {
    let files = find_manifests(input)?;
    let parsed: Vec<Vec<SourcedRecord>> = files
        .par_iter()
        .map(|path| parse_manifest(path, input))
        .collect::<Result<_, _>>()?;

    let mut records: Vec<SourcedRecord> = parsed.into_iter().flatten().collect();
    records.sort_by(|a, b| a.source.cmp(&b.source).then(a.position.cmp(&b.position)));
    info!(files = files.len(), records = records.len(), "Manifests loaded");
    Ok(records)
}

fn parse_manifest(path: &Path, root: &Path) -> Result<Vec<SourcedRecord>, IngestError> {
    let text = std::fs::read_to_string(path)?;
    let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
    let file: ManifestFile = if is_json {
        serde_json::from_str(&text).map_err(|e| parse_error(path, e))?
    } else {
        serde_yaml::from_str(&text).map_err(|e| parse_error(path, e))?
    };

    let source = path
        .strip_prefix(root)
        .ok()
        .filter(|rel| !rel.as_os_str().is_empty())
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/");
    let records = file.into_records();
    debug!(source = %source, records = records.len(), "Parsed manifest");
    Ok(records
        .into_iter()
        .enumerate()
        .map(|(position, record)| SourcedRecord {
            record,
            source: source.clone(),
            position,
        })
        .collect())
}

fn parse_error(path: &Path, e: impl std::fmt::Display) -> IngestError {
    IngestError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}
