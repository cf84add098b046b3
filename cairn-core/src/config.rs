use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::digest::sha256_hex;
use crate::error::ConfigError;

/// How an oversized folder is split by the density safety valve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OverflowStrategy {
    /// Split on the neighbouring token, falling back to first letters.
    #[default]
    Token,
    /// Always bucket by first letter.
    Letter,
}

/// What suppressed items prefer when they are rerouted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RerouteBias {
    /// Keep a previously published path if its root survived.
    #[default]
    Stability,
    /// Always re-evaluate the item's original rule signals.
    Signal,
}

/// Fully merged clustering configuration.
///
/// Built by deep-merging a user file onto [`ClusterConfig::default`] (see
/// [`deep_merge`]) and validated before any stage runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClusterConfig {
    pub thresholds: Thresholds,
    pub rules: Rules,
    pub denylists: Denylists,
    /// uid or full name → explicit output path.
    pub path_overrides: BTreeMap<String, String>,
    /// Tokens whose casing is preserved. Unions with the defaults on merge.
    pub acronyms: Vec<String>,
    pub overflow_strategy: OverflowStrategy,
    pub reroute_bias: RerouteBias,
    pub layout: Layout,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            rules: Rules::default(),
            denylists: Denylists::default(),
            path_overrides: BTreeMap::new(),
            acronyms: [
                "UI", "XML", "JSON", "API", "URL", "HTTP", "HTTPS", "FTP", "SSH", "GUI", "HUD",
            ]
            .iter()
            .map(|s| (*s).to_string())
            .collect(),
            overflow_strategy: OverflowStrategy::default(),
            reroute_bias: RerouteBias::default(),
            layout: Layout::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Thresholds {
    pub min_cluster_size: usize,
    pub top_k: usize,
    pub max_top_level_folders: usize,
    pub max_folder_size: usize,
    pub min_family_size: usize,
    pub fragmentation_limit: f64,
    pub stale_prune_after_runs: u64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_cluster_size: 10,
            top_k: 20,
            max_top_level_folders: 40,
            max_folder_size: 250,
            min_family_size: 3,
            fragmentation_limit: 0.5,
            stale_prune_after_runs: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Rules {
    pub priority_suffixes: Vec<String>,
    pub stop_tokens: Vec<String>,
    /// Bucket name → whole-token keywords.
    pub keyword_clusters: BTreeMap<String, Vec<String>>,
    pub pinned_roots: Vec<String>,
    pub pinned_allow_singleton: bool,
    /// Hub uid → display name used as the cluster value.
    pub hub_types: BTreeMap<String, String>,
    /// Multi-character idioms kept as atomic tokens (`2D`, `3D`).
    pub idioms: Vec<String>,
    /// Hub names ending in one of these are never hubs.
    pub hub_disallowed_suffixes: Vec<String>,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            priority_suffixes: vec!["UI".into(), "Editor".into()],
            stop_tokens: [
                "Manager",
                "Controller",
                "System",
                "Data",
                "Helper",
                "Util",
                "Base",
                "Common",
            ]
            .iter()
            .map(|s| (*s).to_string())
            .collect(),
            keyword_clusters: BTreeMap::new(),
            pinned_roots: Vec::new(),
            pinned_allow_singleton: false,
            hub_types: BTreeMap::new(),
            idioms: vec!["2D".into(), "3D".into()],
            hub_disallowed_suffixes: vec!["Base".into()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Denylists {
    pub metadata_denylist: Vec<String>,
}

impl Default for Denylists {
    fn default() -> Self {
        Self {
            metadata_denylist: [
                "MonoBehaviour",
                "ScriptableObject",
                "Component",
                "Object",
                "Exception",
                "IEnumerator",
                "ValueType",
                "Enum",
                "Attribute",
            ]
            .iter()
            .map(|s| (*s).to_string())
            .collect(),
        }
    }
}

/// Output folder names.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Layout {
    pub global_dir: String,
    pub family_dir: String,
    pub misc_dir: String,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            global_dir: "Global".into(),
            family_dir: "TypeFamilies".into(),
            misc_dir: "Misc".into(),
        }
    }
}

impl ClusterConfig {
    /// Load defaults, deep-merged with the user file at `path` when given.
    ///
    /// The format is chosen by extension: `.json`, `.yaml`/`.yml`, `.toml`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        };
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Parse(format!("{}: {e}", path.display())))?;
        let user = parse_user_config(path, &text)?;
        Self::from_overrides(user)
    }

    /// Merge a user override tree onto the defaults, then validate.
    pub fn from_overrides(user: Value) -> Result<Self, ConfigError> {
        let user = match user {
            Value::Null => Value::Object(serde_json::Map::new()),
            v @ Value::Object(_) => v,
            other => {
                return Err(ConfigError::Invalid(format!(
                    "top-level config must be a mapping, got {other}"
                )));
            }
        };
        let defaults = serde_json::to_value(Self::default())
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        let merged = deep_merge(defaults, user);
        let config: Self =
            serde_json::from_value(merged).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.thresholds;
        for (name, value) in [
            ("thresholds.min_cluster_size", t.min_cluster_size),
            ("thresholds.max_top_level_folders", t.max_top_level_folders),
            ("thresholds.max_folder_size", t.max_folder_size),
            ("thresholds.min_family_size", t.min_family_size),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{name} must be at least 1")));
            }
        }
        if !(0.0..=1.0).contains(&t.fragmentation_limit) {
            return Err(ConfigError::Invalid(
                "thresholds.fragmentation_limit must be within [0, 1]".into(),
            ));
        }

        let lists = [
            ("rules.priority_suffixes", &self.rules.priority_suffixes),
            ("rules.stop_tokens", &self.rules.stop_tokens),
            ("rules.pinned_roots", &self.rules.pinned_roots),
            ("rules.idioms", &self.rules.idioms),
            ("rules.hub_disallowed_suffixes", &self.rules.hub_disallowed_suffixes),
            ("denylists.metadata_denylist", &self.denylists.metadata_denylist),
            ("acronyms", &self.acronyms),
        ];
        for (name, list) in lists {
            if list.iter().any(|s| s.trim().is_empty()) {
                return Err(ConfigError::Invalid(format!("{name} contains an empty entry")));
            }
        }
        for (bucket, keywords) in &self.rules.keyword_clusters {
            if bucket.trim().is_empty() || keywords.iter().any(|k| k.trim().is_empty()) {
                return Err(ConfigError::Invalid(format!(
                    "rules.keyword_clusters entry {bucket:?} is empty"
                )));
            }
        }

        for (key, target) in &self.path_overrides {
            let normalized = target.replace('\\', "/");
            let escapes = normalized.split('/').any(|seg| seg == "..");
            if normalized.trim().is_empty()
                || normalized.starts_with('/')
                || escapes
                || !normalized.ends_with(".md")
            {
                return Err(ConfigError::Invalid(format!(
                    "path_overrides[{key:?}] must be a relative .md path, got {target:?}"
                )));
            }
        }

        for (name, dir) in [
            ("layout.global_dir", &self.layout.global_dir),
            ("layout.family_dir", &self.layout.family_dir),
            ("layout.misc_dir", &self.layout.misc_dir),
        ] {
            if dir.is_empty() || dir.contains(['/', '\\']) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be a single folder name"
                )));
            }
        }
        Ok(())
    }

    /// SHA-256 of the canonical (sorted-key) JSON form of this config.
    pub fn config_hash(&self) -> String {
        let value = serde_json::to_value(self).unwrap_or(Value::Null);
        let canonical = canonicalize(value).to_string();
        sha256_hex(canonical.as_bytes())
    }
}

fn parse_user_config(path: &Path, text: &str) -> Result<Value, ConfigError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let parsed = match ext.as_str() {
        "json" => serde_json::from_str::<Value>(text).map_err(|e| e.to_string()),
        "yaml" | "yml" => serde_yaml::from_str::<Value>(text).map_err(|e| e.to_string()),
        "toml" => toml::from_str::<Value>(text).map_err(|e| e.to_string()),
        other => Err(format!("unsupported config extension {other:?}")),
    };
    parsed.map_err(|message| ConfigError::Parse(format!("{}: {message}", path.display())))
}

/// Structural merge of `update` onto `base`.
///
/// Objects merge recursively; scalars and arrays in `update` replace the
/// base value, except `acronyms`, which unions as a sorted set.
pub fn deep_merge(base: Value, update: Value) -> Value {
    match (base, update) {
        (Value::Object(mut base), Value::Object(update)) => {
            for (key, value) in update {
                let merged = match base.remove(&key) {
                    Some(Value::Array(existing)) if key == "acronyms" => {
                        union_arrays(existing, value)
                    }
                    Some(existing @ Value::Object(_)) if value.is_object() => {
                        deep_merge(existing, value)
                    }
                    _ => value,
                };
                base.insert(key, merged);
            }
            Value::Object(base)
        }
        (_, update) => update,
    }
}

fn union_arrays(existing: Vec<Value>, update: Value) -> Value {
    let Value::Array(added) = update else {
        return update;
    };
    let mut strings: Vec<String> = existing
        .into_iter()
        .chain(added)
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect();
    strings.sort();
    strings.dedup();
    Value::Array(strings.into_iter().map(Value::String).collect())
}

/// Rebuild objects with keys inserted in sorted order so the serialized
/// form is canonical whichever map backend `serde_json` uses.
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, canonicalize(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}
