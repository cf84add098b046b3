//! Post-clustering refinement, in four ordered steps: micro-variant merge,
//! kept-set selection, reroute and the density valve.

pub mod density;
pub mod merge;
pub mod reroute;
pub mod roots;
pub mod union_find;

use std::collections::{BTreeMap, BTreeSet};

use tracing::{info, instrument};

use crate::config::ClusterConfig;
use crate::resolve::Resolution;
use crate::store::IdentityCache;
use crate::text::Lexicon;
use crate::types::{FailureReason, Item, ItemId, RuleId};

pub use merge::{MergeDecision, MergeOutcome};
pub use reroute::Rerouter;
pub use roots::{Root, RootArena};
pub use union_find::UnionFind;

/// Where an item ends up after normalization, before path collisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A kept root by representative id, with a density subfolder when the
    /// root was split.
    Root {
        rep: usize,
        subfolder: Option<String>,
    },
    Misc,
    /// A verbatim path from the cache (including stability reroutes) or an
    /// override.
    Fixed { path: String, rule: RuleId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub target: Target,
    /// Arena id of the root the item was first assigned to.
    pub initial_root: Option<usize>,
    pub rerouted: bool,
    pub reasons: Vec<FailureReason>,
}

impl Placement {
    fn settled(target: Target) -> Self {
        Self {
            target,
            initial_root: None,
            rerouted: false,
            reasons: Vec::new(),
        }
    }
}

/// Output of the pass: the root arena with its merge forest, the kept set,
/// every merge decision and one placement per item.
#[derive(Debug, Clone)]
pub struct Normalized {
    pub arena: RootArena,
    pub uf: UnionFind,
    pub kept: BTreeSet<usize>,
    pub decisions: Vec<MergeDecision>,
    pub placements: BTreeMap<ItemId, Placement>,
}

impl Normalized {
    pub fn representative(&self, id: usize) -> usize {
        self.uf.find_const(id)
    }

    pub fn roots_post_merge(&self) -> usize {
        (0..self.arena.len())
            .map(|id| self.representative(id))
            .collect::<BTreeSet<_>>()
            .len()
    }

    pub fn merges_applied(&self) -> usize {
        self.decisions
            .iter()
            .filter(|d| d.outcome == MergeOutcome::Applied)
            .count()
    }
}

#[derive(Debug)]
pub struct NormalizationPass<'a> {
    pub config: &'a ClusterConfig,
    pub lexicon: &'a Lexicon,
    pub cache: &'a IdentityCache,
}

impl NormalizationPass<'_> {
    #[instrument(skip_all, name = "normalize")]
    pub fn run(&self, items: &[Item], resolutions: &[Resolution]) -> Normalized {
        let by_uid: BTreeMap<&ItemId, &Item> = items.iter().map(|i| (&i.uid, i)).collect();
        let pinned: BTreeSet<String> = self
            .config
            .rules
            .pinned_roots
            .iter()
            .map(|p| self.lexicon.canonical_name(p))
            .collect();

        let arena = RootArena::build(resolutions, &by_uid, self.lexicon, &pinned);
        let (uf, decisions) = merge::merge_roots(&arena, &self.config.thresholds);
        let kept = reroute::select_kept(&arena, &uf, self.config);

        let rerouter = Rerouter {
            arena: &arena,
            uf: &uf,
            kept: &kept,
            lexicon: self.lexicon,
            config: self.config,
            cache: self.cache,
        };
        let mut placements: BTreeMap<ItemId, Placement> = resolutions
            .iter()
            .map(|r| (r.uid.clone(), self.place(r, &arena, &uf, &kept, &rerouter)))
            .collect();

        self.apply_density(&arena, &by_uid, &mut placements);

        let normalized = Normalized {
            arena,
            uf,
            kept,
            decisions,
            placements,
        };
        info!(
            roots = normalized.arena.len(),
            post_merge = normalized.roots_post_merge(),
            merges = normalized.merges_applied(),
            kept = normalized.kept.len(),
            "Normalization complete"
        );
        normalized
    }

    fn place(
        &self,
        resolution: &Resolution,
        arena: &RootArena,
        uf: &UnionFind,
        kept: &BTreeSet<usize>,
        rerouter: &Rerouter<'_>,
    ) -> Placement {
        if let Some(path) = &resolution.fixed_path {
            return Placement::settled(Target::Fixed {
                path: path.clone(),
                rule: resolution.rule(),
            });
        }
        let initial = resolution
            .forms_root()
            .then(|| arena.lookup(&self.lexicon.canonical_name(&resolution.winner.key.value)))
            .flatten();
        let Some(initial) = initial else {
            return Placement::settled(Target::Misc);
        };

        let mut placement = {
            let rep = uf.find_const(initial);
            if kept.contains(&rep) {
                Placement {
                    target: Target::Root {
                        rep,
                        subfolder: None,
                    },
                    initial_root: Some(initial),
                    rerouted: false,
                    reasons: Vec::new(),
                }
            } else {
                rerouter.reroute(resolution, initial)
            }
        };
        if !arena.roots[initial].boundaries.is_known() {
            placement.reasons.insert(0, FailureReason::BoundariesUnknown);
        }
        placement
    }

    fn apply_density(
        &self,
        arena: &RootArena,
        by_uid: &BTreeMap<&ItemId, &Item>,
        placements: &mut BTreeMap<ItemId, Placement>,
    ) {
        let mut members: BTreeMap<usize, Vec<&Item>> = BTreeMap::new();
        for (uid, placement) in placements.iter() {
            if let (Target::Root { rep, .. }, Some(item)) = (&placement.target, by_uid.get(uid)) {
                members.entry(*rep).or_default().push(*item);
            }
        }

        let limit = self.config.thresholds.max_folder_size;
        for (rep, items) in members.into_iter().filter(|(_, m)| m.len() > limit) {
            let subs = density::split_root(
                &arena.roots[rep],
                &items,
                self.lexicon,
                self.config.overflow_strategy,
            );
            for (uid, sub) in subs {
                if let Some(Placement {
                    target: Target::Root { subfolder, .. },
                    ..
                }) = placements.get_mut(&uid)
                {
                    *subfolder = Some(sub);
                }
            }
        }
    }
}
