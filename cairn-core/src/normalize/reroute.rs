use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::config::{ClusterConfig, RerouteBias};
use crate::resolve::Resolution;
use crate::store::IdentityCache;
use crate::text::Lexicon;
use crate::types::{FailureReason, RuleId};

use super::roots::RootArena;
use super::union_find::UnionFind;
use super::{Placement, Target};

/// Post-merge size of every representative.
pub fn component_sizes(arena: &RootArena, uf: &UnionFind) -> BTreeMap<usize, usize> {
    let mut sizes = BTreeMap::new();
    for (id, root) in arena.roots.iter().enumerate() {
        *sizes.entry(uf.find_const(id)).or_insert(0) += root.size();
    }
    sizes
}

/// Representatives that get a top-level folder.
///
/// Non-pinned candidates are ranked by size then name and cut at the cap;
/// pinned representatives are added after the cut and never count toward it.
pub fn select_kept(arena: &RootArena, uf: &UnionFind, config: &ClusterConfig) -> BTreeSet<usize> {
    let t = &config.thresholds;
    let sizes = component_sizes(arena, uf);

    let mut ranked: Vec<(usize, usize)> = sizes
        .iter()
        .filter(|&(&rep, &size)| !arena.roots[rep].is_pinned && size >= t.min_cluster_size)
        .map(|(&rep, &size)| (rep, size))
        .collect();
    ranked.sort_by(|(ra, sa), (rb, sb)| {
        sb.cmp(sa)
            .then_with(|| arena.roots[*ra].normalized_name.cmp(&arena.roots[*rb].normalized_name))
    });
    ranked.truncate(t.max_top_level_folders);

    let mut kept: BTreeSet<usize> = ranked.into_iter().map(|(rep, _)| rep).collect();
    for (&rep, &size) in &sizes {
        let root = &arena.roots[rep];
        let big_enough = size >= t.min_cluster_size || config.rules.pinned_allow_singleton;
        if root.is_pinned && size >= 1 && big_enough {
            kept.insert(rep);
        }
    }
    kept
}

/// Everything rerouting needs to read.
#[derive(Debug)]
pub struct Rerouter<'a> {
    pub arena: &'a RootArena,
    pub uf: &'a UnionFind,
    pub kept: &'a BTreeSet<usize>,
    pub lexicon: &'a Lexicon,
    pub config: &'a ClusterConfig,
    pub cache: &'a IdentityCache,
}

impl Rerouter<'_> {
    /// Place an item whose post-merge root was not kept.
    pub fn reroute(&self, resolution: &Resolution, initial_root: usize) -> Placement {
        let mut reasons = vec![FailureReason::RootSuppressed];

        if let Some(path) = self.stable_cached_path(resolution) {
            debug!(uid = %resolution.uid, path = %path, "Kept cached path");
            reasons.push(FailureReason::StabilityKept);
            return Placement {
                target: Target::Fixed {
                    path,
                    rule: RuleId::Cache,
                },
                initial_root: Some(initial_root),
                rerouted: true,
                reasons,
            };
        }

        let target = match self.best_signal(resolution) {
            Some(rep) => {
                debug!(
                    uid = %resolution.uid,
                    to = %self.arena.roots[rep].normalized_name,
                    "Rerouted"
                );
                Target::Root {
                    rep,
                    subfolder: None,
                }
            }
            None => {
                debug!(uid = %resolution.uid, "Rerouted to misc");
                reasons.push(FailureReason::ReroutedToMisc);
                Target::Misc
            }
        };
        Placement {
            target,
            initial_root: Some(initial_root),
            rerouted: true,
            reasons,
        }
    }

    /// Under the stability bias, a cached path whose top-level folder is
    /// still a kept root survives unchanged. Only items the cache rule did
    /// not place (a forced rebuild) get here with an entry.
    fn stable_cached_path(&self, resolution: &Resolution) -> Option<String> {
        if self.config.reroute_bias != RerouteBias::Stability {
            return None;
        }
        let entry = self.cache.entry(&resolution.uid)?;
        let top = self.top_level_segment(&entry.path)?;
        self.kept
            .iter()
            .any(|&rep| self.arena.roots[rep].sanitized_name.eq_ignore_ascii_case(top))
            .then(|| entry.path.clone())
    }

    fn top_level_segment<'p>(&self, path: &'p str) -> Option<&'p str> {
        let layout = &self.config.layout;
        let mut segments = path.split('/').filter(|s| !s.is_empty()).peekable();
        if segments.peek().is_some_and(|s| s.eq_ignore_ascii_case(&layout.global_dir)) {
            segments.next();
        }
        if segments.peek().is_some_and(|s| s.eq_ignore_ascii_case(&layout.family_dir)) {
            segments.next();
        }
        let top = segments.next()?;
        // A bare file name has no folder.
        segments.peek().is_some().then_some(top)
    }

    /// First reroute tier with a kept representative; within a tier the
    /// smallest name wins.
    fn best_signal(&self, resolution: &Resolution) -> Option<usize> {
        RuleId::REROUTE_TIERS.iter().find_map(|&tier| {
            resolution
                .signals
                .iter()
                .filter(|c| c.rule() == tier)
                .filter_map(|c| self.arena.lookup(&self.lexicon.canonical_name(&c.key.value)))
                .map(|id| self.uf.find_const(id))
                .filter(|rep| self.kept.contains(rep))
                .min_by(|a, b| {
                    self.arena.roots[*a]
                        .normalized_name
                        .cmp(&self.arena.roots[*b].normalized_name)
                })
        })
    }
}
