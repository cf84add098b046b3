// Integration test utilities and fixture builders for Cairn.

use std::path::{Path, PathBuf};

use cairn_core::config::ClusterConfig;
use cairn_core::extract::{ItemSet, ManifestRecord, SourcedRecord, build_items};
use cairn_core::pipeline::{ClusterPipeline, OutputPaths, RunContext, RunOptions, RunOutcome};
use cairn_core::progress::NoopReporter;
use cairn_core::store::IdentityCache;
use cairn_core::text::Lexicon;
use cairn_core::types::ItemId;

/// Builds item sets from type names, as if read from one manifest.
#[derive(Debug, Clone, Default)]
pub struct ItemSetBuilder {
    records: Vec<ManifestRecord>,
}

impl ItemSetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A global class with uid `T:{name}`.
    #[must_use]
    pub fn class(mut self, name: &str) -> Self {
        self.records.push(record(name));
        self
    }

    #[must_use]
    pub fn classes<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .fold(self, |builder, name| builder.class(name.as_ref()))
    }

    /// A class deriving from `base`.
    #[must_use]
    pub fn derived(mut self, name: &str, base: &str) -> Self {
        let mut rec = record(name);
        rec.inheritance = vec!["System.Object".into(), base.to_string()];
        self.records.push(rec);
        self
    }

    /// A class implementing each interface in `interfaces`.
    #[must_use]
    pub fn implementing(mut self, name: &str, interfaces: &[&str]) -> Self {
        let mut rec = record(name);
        rec.implements = interfaces.iter().map(|i| (*i).to_string()).collect();
        self.records.push(rec);
        self
    }

    #[must_use]
    pub fn record(mut self, rec: ManifestRecord) -> Self {
        self.records.push(rec);
        self
    }

    pub fn records(&self) -> &[ManifestRecord] {
        &self.records
    }

    pub fn build(&self, lexicon: &Lexicon) -> ItemSet {
        let sourced = self
            .records
            .iter()
            .enumerate()
            .map(|(position, rec)| SourcedRecord {
                record: rec.clone(),
                source: "types.json".into(),
                position,
            })
            .collect();
        build_items(sourced, lexicon)
    }
}

fn record(name: &str) -> ManifestRecord {
    ManifestRecord {
        uid: Some(format!("T:{name}")),
        name: name.to_string(),
        full_name: Some(name.to_string()),
        kind: Some("class".into()),
        namespace: None,
        inheritance: Vec::new(),
        implements: Vec::new(),
    }
}

/// Extractor-shaped JSON for one record.
pub fn record_json(rec: &ManifestRecord) -> serde_json::Value {
    let mut obj = serde_json::json!({ "name": rec.name });
    let fields = [
        ("uid", rec.uid.as_ref()),
        ("fullName", rec.full_name.as_ref()),
        ("type", rec.kind.as_ref()),
        ("namespace", rec.namespace.as_ref()),
    ];
    for (key, value) in fields {
        if let Some(v) = value {
            obj[key] = serde_json::Value::from(v.as_str());
        }
    }
    if !rec.inheritance.is_empty() {
        obj["inheritance"] = serde_json::json!(rec.inheritance);
    }
    if !rec.implements.is_empty() {
        obj["implements"] = serde_json::json!(rec.implements);
    }
    obj
}

/// A temporary directory holding manifests and run outputs.
#[derive(Debug)]
pub struct Fixture {
    pub dir: tempfile::TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create tempdir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn input_dir(&self) -> PathBuf {
        self.path().join("api")
    }

    pub fn outputs(&self) -> OutputPaths {
        OutputPaths {
            out_dir: self.path().join("site"),
            cache: self.path().join("state").join("cache.json"),
            report: self.path().join("state").join("report.json"),
        }
    }

    /// Write `records` as a JSON list manifest under the input directory.
    pub fn write_json_manifest(&self, file: &str, records: &[ManifestRecord]) -> PathBuf {
        let doc: Vec<serde_json::Value> = records.iter().map(record_json).collect();
        self.write_manifest(file, &serde_json::to_string_pretty(&doc).expect("encode json"))
    }

    /// Write `records` as a YAML `{items: [...]}` manifest.
    pub fn write_yaml_manifest(&self, file: &str, records: &[ManifestRecord]) -> PathBuf {
        let items: Vec<serde_json::Value> = records.iter().map(record_json).collect();
        let doc = serde_json::json!({ "items": items });
        self.write_manifest(file, &serde_yaml::to_string(&doc).expect("encode yaml"))
    }

    pub fn write_manifest(&self, file: &str, contents: &str) -> PathBuf {
        let path = self.input_dir().join(file);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create manifest dir");
        }
        std::fs::write(&path, contents).expect("write manifest");
        path
    }
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Run the pipeline over `set` with `config` and `cache`.
pub fn run_with(
    config: &ClusterConfig,
    cache: IdentityCache,
    options: RunOptions,
    builder: &ItemSetBuilder,
) -> RunOutcome {
    let ctx = RunContext::new(config.clone(), cache, options);
    let set = builder.build(&ctx.lexicon);
    ClusterPipeline::new(&ctx, &NoopReporter).run(&set)
}

/// Run the pipeline with an empty cache and default options.
pub fn run_fresh(config: &ClusterConfig, builder: &ItemSetBuilder) -> RunOutcome {
    run_with(config, IdentityCache::default(), RunOptions::default(), builder)
}

/// Path of `uid` in `outcome`.
pub fn path_of<'a>(outcome: &'a RunOutcome, uid: &str) -> &'a str {
    outcome
        .paths
        .get(&ItemId::from(uid))
        .map_or_else(|| panic!("no path for {uid}"), String::as_str)
}

/// Folder names directly below the global dir, excluding misc.
pub fn top_level_folders(outcome: &RunOutcome, config: &ClusterConfig) -> Vec<String> {
    let layout = &config.layout;
    let mut folders: Vec<String> = outcome
        .paths
        .values()
        .filter_map(|p| {
            let mut segments = p.split('/');
            if segments.next()? != layout.global_dir {
                return None;
            }
            let mut first = segments.next()?;
            let rest: Vec<&str> = segments.collect();
            if rest.is_empty() {
                return None;
            }
            if first == layout.family_dir {
                first = rest.first().copied().filter(|_| rest.len() > 1)?;
            }
            (first != layout.misc_dir).then(|| first.to_string())
        })
        .collect();
    folders.sort();
    folders.dedup();
    folders
}
