#![allow(clippy::cast_precision_loss)]

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{info, warn};

use crate::config::ClusterConfig;
use crate::normalize::{MergeDecision, Normalized, Target};
use crate::paths::{CollisionRecord, PathPlan};
use crate::resolve::Resolution;
use crate::store::IdentityCache;
use crate::types::{ClusterKey, FailureReason, ItemId, RuleId};

pub const REPORT_SCHEMA_VERSION: u32 = 1;

/// Decision log of one run. Contains no timestamps, so identical inputs
/// serialize to identical bytes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub meta: ReportMeta,
    pub metrics: Metrics,
    pub entries: Vec<ReportEntry>,
    pub merges: Vec<MergeDecision>,
    pub collisions: Vec<CollisionRecord>,
    pub moves: Vec<MoveRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportMeta {
    pub schema_version: u32,
    pub config_hash: String,
    pub total_items: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunnerUp {
    pub rule: RuleId,
    pub cluster_key: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportEntry {
    pub uid: ItemId,
    pub winning_rule: RuleId,
    /// Key of the cluster the item finally landed in.
    pub cluster_key: String,
    pub score: f64,
    pub resolved_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runner_up: Option<RunnerUp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_root: Option<String>,
    pub rerouted: bool,
    pub failure_reasons: Vec<FailureReason>,
}

/// A published path that changed since the cached run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoveRecord {
    pub uid: ItemId,
    pub old_path: String,
    pub new_path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Metrics {
    pub singleton_rate: f64,
    pub top_level_count: usize,
    pub misc_share: f64,
    pub nav_friction: f64,
    pub fragmentation: f64,
    pub reroute_share: f64,
    pub root_churn: f64,
    pub capacity_constraint_ok: bool,
    pub num_roots_pre_merge: usize,
    pub num_roots_post_merge: usize,
    pub num_items_rerouted: usize,
    pub num_items_to_misc: usize,
    pub num_merges_attempted: usize,
    pub num_merges_applied: usize,
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        round4(num as f64 / den as f64)
    }
}

/// Items whose prior cached path differs from the new one. Stale entries
/// count: a returning item still leaves a stub behind.
pub fn compute_moves(prior: &IdentityCache, paths: &BTreeMap<ItemId, String>) -> Vec<MoveRecord> {
    paths
        .iter()
        .filter_map(|(uid, new_path)| {
            let old = prior.entry(uid)?;
            (old.path != *new_path).then(|| MoveRecord {
                uid: uid.clone(),
                old_path: old.path.clone(),
                new_path: new_path.clone(),
            })
        })
        .collect()
}

/// Everything a report is built from.
#[derive(Debug)]
pub struct ReportInputs<'a> {
    pub config: &'a ClusterConfig,
    pub config_hash: &'a str,
    pub resolutions: &'a [Resolution],
    pub normalized: &'a Normalized,
    pub plan: &'a PathPlan,
    pub prior: &'a IdentityCache,
    /// Reasons recorded before clustering (identity repair).
    pub ingest_failures: &'a BTreeMap<ItemId, Vec<FailureReason>>,
}

impl Report {
    pub fn build(inputs: &ReportInputs<'_>) -> Self {
        let moves = compute_moves(inputs.prior, &inputs.plan.paths);
        let entries: Vec<ReportEntry> = inputs
            .resolutions
            .iter()
            .filter_map(|r| entry_for(r, inputs))
            .collect();
        let metrics = Metrics::compute(inputs, &entries, moves.len());

        info!(
            items = entries.len(),
            top_level = metrics.top_level_count,
            misc_share = metrics.misc_share,
            churn = metrics.root_churn,
            "Report built"
        );
        if metrics.fragmentation > inputs.config.thresholds.fragmentation_limit {
            warn!(
                fragmentation = metrics.fragmentation,
                limit = inputs.config.thresholds.fragmentation_limit,
                "Fragmentation above limit"
            );
        }

        Self {
            meta: ReportMeta {
                schema_version: REPORT_SCHEMA_VERSION,
                config_hash: inputs.config_hash.to_string(),
                total_items: entries.len(),
            },
            metrics,
            entries,
            merges: inputs.normalized.decisions.clone(),
            collisions: inputs.plan.collisions.clone(),
            moves,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self).map(|mut s| {
            s.push('\n');
            s
        })
    }
}

fn entry_for(resolution: &Resolution, inputs: &ReportInputs<'_>) -> Option<ReportEntry> {
    let uid = &resolution.uid;
    let placement = inputs.normalized.placements.get(uid)?;
    let resolved_path = inputs.plan.paths.get(uid)?.clone();
    let arena = &inputs.normalized.arena;

    let cluster_key = match &placement.target {
        Target::Root { rep, .. } => arena.roots[*rep].key.to_string(),
        Target::Misc => ClusterKey::misc().to_string(),
        Target::Fixed { path, rule } => ClusterKey::new(*rule, path.clone()).to_string(),
    };

    let mut failure_reasons: Vec<FailureReason> = inputs
        .ingest_failures
        .get(uid)
        .cloned()
        .unwrap_or_default();
    let later = placement
        .reasons
        .iter()
        .chain(inputs.plan.reasons.get(uid).into_iter().flatten());
    for reason in later {
        if !failure_reasons.contains(reason) {
            failure_reasons.push(*reason);
        }
    }

    Some(ReportEntry {
        uid: uid.clone(),
        winning_rule: resolution.rule(),
        cluster_key,
        score: round4(resolution.winner.score),
        resolved_path,
        runner_up: resolution.runner_up.as_ref().map(|c| RunnerUp {
            rule: c.rule(),
            cluster_key: c.key.to_string(),
            score: round4(c.score),
        }),
        initial_root: placement.initial_root.map(|id| arena.roots[id].key.to_string()),
        rerouted: placement.rerouted,
        failure_reasons,
    })
}

/// Split a path into its folder segments below the global dir.
fn folder_segments<'p>(path: &'p str, global: &str) -> Vec<&'p str> {
    let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    segments.pop();
    if segments.first().is_some_and(|s| s.eq_ignore_ascii_case(global)) {
        segments.remove(0);
    }
    segments
}

impl Metrics {
    fn compute(inputs: &ReportInputs<'_>, entries: &[ReportEntry], moved: usize) -> Self {
        let config = inputs.config;
        let layout = &config.layout;
        let total = entries.len();
        let misc_dir = PathPlan::misc_dir(layout).to_ascii_lowercase();

        let mut per_folder: BTreeMap<String, usize> = BTreeMap::new();
        let mut depth_sum = 0usize;
        let mut top_level: BTreeSet<String> = BTreeSet::new();
        let mut misc_items = 0usize;

        let pinned_folders: BTreeSet<String> = inputs
            .normalized
            .kept
            .iter()
            .filter(|&&rep| inputs.normalized.arena.roots[rep].is_pinned)
            .filter_map(|rep| inputs.plan.root_folders.get(rep))
            .filter_map(|f| f.rsplit('/').next())
            .map(str::to_ascii_lowercase)
            .collect();

        for entry in entries {
            let path = &entry.resolved_path;
            let folder = path.rsplit_once('/').map_or("", |(f, _)| f).to_ascii_lowercase();
            if folder == misc_dir {
                misc_items += 1;
            } else {
                *per_folder.entry(folder).or_default() += 1;
            }

            let segments = folder_segments(path, &layout.global_dir);
            depth_sum += segments.len();
            let top = match segments.as_slice() {
                [family, name, ..] if family.eq_ignore_ascii_case(&layout.family_dir) => Some(*name),
                [first, ..] => Some(*first),
                [] => None,
            };
            if let Some(top) = top.map(str::to_ascii_lowercase) {
                if top != layout.misc_dir.to_ascii_lowercase() && !pinned_folders.contains(&top) {
                    top_level.insert(top);
                }
            }
        }

        let leaves: Vec<usize> = per_folder
            .iter()
            .filter(|(folder, _)| {
                let child = format!("{folder}/");
                !per_folder.keys().any(|other| other.starts_with(&child))
            })
            .map(|(_, &count)| count)
            .collect();
        let singletons = leaves.iter().filter(|&&c| c == 1).count();
        let small = leaves
            .iter()
            .filter(|&&c| c < config.thresholds.min_cluster_size)
            .count();

        let rerouted = entries.iter().filter(|e| e.rerouted).count();
        let with_prior = entries
            .iter()
            .filter(|e| inputs.prior.entry(&e.uid).is_some())
            .count();
        let top_level_count = top_level.len();

        Self {
            singleton_rate: ratio(singletons, leaves.len()),
            top_level_count,
            misc_share: ratio(misc_items, total),
            nav_friction: ratio(depth_sum, total),
            fragmentation: ratio(small, leaves.len()),
            reroute_share: ratio(rerouted, total),
            root_churn: ratio(moved, with_prior),
            capacity_constraint_ok: top_level_count <= config.thresholds.max_top_level_folders,
            num_roots_pre_merge: inputs.normalized.arena.len(),
            num_roots_post_merge: inputs.normalized.roots_post_merge(),
            num_items_rerouted: rerouted,
            num_items_to_misc: misc_items,
            num_merges_attempted: inputs.normalized.decisions.len(),
            num_merges_applied: inputs.normalized.merges_applied(),
        }
    }
}
