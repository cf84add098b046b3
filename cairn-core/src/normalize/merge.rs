#![allow(clippy::cast_precision_loss)]

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::config::Thresholds;
use crate::text::boundaries::common_prefix_len;

use super::roots::{Root, RootArena};
use super::union_find::UnionFind;

/// Length of the bucketing prefix and minimum shared prefix for a merge.
pub const MERGE_PREFIX_LEN: usize = 5;
/// Shared prefix length that relaxes the unknown-boundary and utility guards.
pub const LONG_PREFIX_LEN: usize = 7;
pub const SIMILARITY_THRESHOLD: f64 = 0.7;
/// Under cap pressure, roots at or above this size only merge on a long
/// shared prefix.
pub const UTILITY_SIZE_LIMIT: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeOutcome {
    Applied,
    /// Neither the boundary test nor the similarity test passed.
    FalseFriends,
    /// Both roots are large and the cap is under pressure.
    Utility,
    /// Both sides already belong to pinned roots.
    PinnedPair,
}

/// One evaluated candidate pair, kept for the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeDecision {
    pub scope_token: String,
    pub a: String,
    pub b: String,
    pub prefix_len: usize,
    pub similarity: f64,
    pub merged_size: usize,
    pub outcome: MergeOutcome,
    /// Representative after an applied merge.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner: Option<String>,
}

/// True when the roots that could claim a top-level folder outnumber the
/// cap. Computed once, before any merge.
pub fn cap_pressure(arena: &RootArena, thresholds: &Thresholds) -> bool {
    let pool = arena
        .roots
        .iter()
        .filter(|r| r.size() >= thresholds.min_cluster_size || (r.is_pinned && r.size() >= 1))
        .count();
    pool > thresholds.max_top_level_folders
}

struct Pair {
    a: usize,
    b: usize,
    prefix_len: usize,
    merged_size: usize,
}

/// Candidate pairs in evaluation order: scope ascending, shared prefix
/// descending, combined size descending, then the two names ascending.
fn candidate_pairs(arena: &RootArena) -> Vec<Pair> {
    let mut buckets: BTreeMap<(&str, String), Vec<usize>> = BTreeMap::new();
    for (id, root) in arena.roots.iter().enumerate() {
        if root.normalized_name.chars().count() < MERGE_PREFIX_LEN {
            continue;
        }
        let head: String = root.normalized_name.chars().take(MERGE_PREFIX_LEN).collect();
        buckets
            .entry((root.scope_token.as_str(), head))
            .or_default()
            .push(id);
    }

    let mut pairs = Vec::new();
    for ids in buckets.values() {
        for (i, &a) in ids.iter().enumerate() {
            for &b in &ids[i + 1..] {
                let (ra, rb) = (&arena.roots[a], &arena.roots[b]);
                let prefix_len = common_prefix_len(&ra.normalized_name, &rb.normalized_name);
                if prefix_len >= MERGE_PREFIX_LEN {
                    pairs.push(Pair {
                        a,
                        b,
                        prefix_len,
                        merged_size: ra.size() + rb.size(),
                    });
                }
            }
        }
    }

    // Arena ids follow normalized-name order, so `a < b` orders names too.
    pairs.sort_by(|x, y| {
        let sx = &arena.roots[x.a].scope_token;
        let sy = &arena.roots[y.a].scope_token;
        sx.cmp(sy)
            .then(y.prefix_len.cmp(&x.prefix_len))
            .then(y.merged_size.cmp(&x.merged_size))
            .then(x.a.cmp(&y.a))
            .then(x.b.cmp(&y.b))
    });
    pairs
}

fn similarity(a: &Root, b: &Root, prefix_len: usize) -> f64 {
    let shorter = a
        .normalized_name
        .chars()
        .count()
        .min(b.normalized_name.chars().count());
    if shorter == 0 {
        0.0
    } else {
        prefix_len as f64 / shorter as f64
    }
}

/// Boundary hit on either side, or a similar enough pair. Roots with no
/// known boundaries on either side need both similarity and a long prefix.
fn passes_false_friends(a: &Root, b: &Root, prefix_len: usize, ratio: f64) -> bool {
    if !a.boundaries.is_known() && !b.boundaries.is_known() {
        return ratio >= SIMILARITY_THRESHOLD && prefix_len >= LONG_PREFIX_LEN;
    }
    a.boundaries.contains(a.project_prefix(prefix_len))
        || b.boundaries.contains(b.project_prefix(prefix_len))
        || ratio >= SIMILARITY_THRESHOLD
}

fn passes_utility(pressure: bool, size_a: usize, size_b: usize, prefix_len: usize) -> bool {
    !pressure
        || prefix_len >= LONG_PREFIX_LEN
        || (size_a < UTILITY_SIZE_LIMIT && size_b < UTILITY_SIZE_LIMIT)
}

/// Union-find over the arena after micro-variant merging, plus a decision
/// per evaluated pair.
pub fn merge_roots(arena: &RootArena, thresholds: &Thresholds) -> (UnionFind, Vec<MergeDecision>) {
    let pressure = cap_pressure(arena, thresholds);
    let mut uf = UnionFind::new(arena.len());
    let mut sizes: Vec<usize> = arena.roots.iter().map(Root::size).collect();
    let mut decisions = Vec::new();

    for pair in candidate_pairs(arena) {
        let (rep_a, rep_b) = (uf.find(pair.a), uf.find(pair.b));
        if rep_a == rep_b {
            continue;
        }
        let (a, b) = (&arena.roots[pair.a], &arena.roots[pair.b]);
        let ratio = similarity(a, b, pair.prefix_len);
        let (pinned_a, pinned_b) = (arena.roots[rep_a].is_pinned, arena.roots[rep_b].is_pinned);

        let outcome = if pinned_a && pinned_b {
            MergeOutcome::PinnedPair
        } else if !passes_false_friends(a, b, pair.prefix_len, ratio) {
            MergeOutcome::FalseFriends
        } else if !passes_utility(pressure, sizes[rep_a], sizes[rep_b], pair.prefix_len) {
            MergeOutcome::Utility
        } else {
            MergeOutcome::Applied
        };

        let winner = (outcome == MergeOutcome::Applied).then(|| {
            // Pinned first, then the smaller name; ids follow name order.
            let (keep, absorb) = if pinned_a || (!pinned_b && rep_a < rep_b) {
                (rep_a, rep_b)
            } else {
                (rep_b, rep_a)
            };
            uf.link(keep, absorb);
            sizes[keep] += sizes[absorb];
            arena.roots[keep].normalized_name.clone()
        });

        debug!(
            scope = %a.scope_token,
            a = %a.normalized_name,
            b = %b.normalized_name,
            prefix_len = pair.prefix_len,
            guard = ?outcome,
            "Merge candidate"
        );
        decisions.push(MergeDecision {
            scope_token: a.scope_token.clone(),
            a: a.normalized_name.clone(),
            b: b.normalized_name.clone(),
            prefix_len: pair.prefix_len,
            similarity: (ratio * 1000.0).round() / 1000.0,
            merged_size: pair.merged_size,
            outcome,
            winner,
        });
    }
    (uf, decisions)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::resolve::Resolution;
    use crate::text::Lexicon;
    use crate::text::Boundaries;
    use crate::types::{Candidate, ClusterKey, Item, ItemId, ItemKind, RuleId};

    /// Arena with one root per `(name, size)`; each member is an item whose
    /// name equals the root name.
    fn build_arena(roots: &[(&str, usize)], pinned: &[&str]) -> RootArena {
        let lexicon = Lexicon::default();
        let mut items = Vec::new();
        let mut resolutions = Vec::new();
        for (name, size) in roots {
            for n in 0..*size {
                let uid = format!("{name}#{n}");
                items.push(Item {
                    uid: ItemId::from(uid.as_str()),
                    name: (*name).into(),
                    full_name: (*name).into(),
                    kind: ItemKind::Class,
                    tokens: lexicon.tokenize(name),
                    base_type: None,
                    interfaces: BTreeSet::new(),
                    weak_id: false,
                    source: None,
                });
                let winner = Candidate::new(RuleId::StrongPrefix, *name, 0.8);
                resolutions.push(Resolution {
                    uid: ItemId::from(uid.as_str()),
                    winner: winner.clone(),
                    runner_up: None,
                    signals: vec![winner],
                    fixed_path: None,
                });
            }
        }
        let by_uid = items.iter().map(|i| (&i.uid, i)).collect();
        let pinned = pinned.iter().map(|p| (*p).to_string()).collect();
        RootArena::build(&resolutions, &by_uid, &lexicon, &pinned)
    }

    fn rep_name(arena: &RootArena, uf: &UnionFind, name: &str) -> String {
        let id = arena.lookup(name).unwrap();
        arena.roots[uf.find_const(id)].normalized_name.clone()
    }

    /// A root without a character map, so prefixes clamp to the name length.
    fn bare_root(name: &str, boundaries: Boundaries) -> Root {
        Root {
            key: ClusterKey::new(RuleId::StrongPrefix, name),
            normalized_name: name.into(),
            sanitized_name: name.into(),
            scope_token: name.into(),
            tokens: vec![name.into()],
            boundaries,
            projection: None,
            members: BTreeSet::new(),
            is_pinned: false,
        }
    }

    fn guard(a: &Root, b: &Root) -> bool {
        let prefix_len = common_prefix_len(&a.normalized_name, &b.normalized_name);
        passes_false_friends(a, b, prefix_len, similarity(a, b, prefix_len))
    }

    #[test]
    fn unknown_boundaries_on_both_sides_need_a_long_similar_prefix() {
        let unknown = |name: &str| bare_root(name, Boundaries::Unknown);

        // 6/8 is similar enough but the shared prefix is too short.
        assert!(!guard(&unknown("SplineUI"), &unknown("SplineFX")));
        assert!(guard(&unknown("PrinterA"), &unknown("PrinterB")));
        // Long prefix, but 7/13 is under the similarity bar.
        assert!(!guard(&unknown("PrinterQueueA"), &unknown("PrinterSpoolB")));
    }

    #[test]
    fn one_known_side_can_pass_on_its_boundary() {
        let known = bare_root("SplineMesh", Boundaries::Known(BTreeSet::from([0, 6, 10])));
        let unknown = bare_root("SplineWeldTool", Boundaries::Unknown);
        assert!(guard(&known, &unknown));
        assert!(guard(&unknown, &known));

        let no_hit = bare_root("SplineMesh", Boundaries::Known(BTreeSet::from([0, 10])));
        assert!(!guard(&no_hit, &unknown));
    }

    #[test]
    fn boundary_aligned_variants_merge() {
        let arena = build_arena(&[("Inventory", 3), ("InventoryItem", 2)], &[]);
        let (uf, decisions) = merge_roots(&arena, &Thresholds::default());
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].outcome, MergeOutcome::Applied);
        assert_eq!(rep_name(&arena, &uf, "InventoryItem"), "Inventory");
    }

    #[test]
    fn false_friends_stay_apart() {
        // "GameParam" ends mid-token on both sides and 9/13 is under the
        // similarity bar.
        let arena = build_arena(&[("GameParamount", 2), ("GameParameter", 2)], &[]);
        let (uf, decisions) = merge_roots(&arena, &Thresholds::default());
        assert_eq!(decisions[0].outcome, MergeOutcome::FalseFriends);
        assert_ne!(
            rep_name(&arena, &uf, "GameParamount"),
            rep_name(&arena, &uf, "GameParameter")
        );
    }

    #[test]
    fn pinned_root_absorbs_and_pinned_pair_refuses() {
        let arena = build_arena(&[("Dialogue", 1), ("DialogueBox", 4)], &["DialogueBox"]);
        let (uf, _) = merge_roots(&arena, &Thresholds::default());
        assert_eq!(rep_name(&arena, &uf, "Dialogue"), "DialogueBox");

        let arena = build_arena(&[("Dialogue", 1), ("DialogueBox", 4)], &["Dialogue", "DialogueBox"]);
        let (uf, decisions) = merge_roots(&arena, &Thresholds::default());
        assert_eq!(decisions[0].outcome, MergeOutcome::PinnedPair);
        assert_eq!(rep_name(&arena, &uf, "DialogueBox"), "DialogueBox");
        assert_eq!(rep_name(&arena, &uf, "Dialogue"), "Dialogue");
    }

    #[test]
    fn utility_guard_only_bites_under_pressure() {
        let thresholds = Thresholds {
            min_cluster_size: 1,
            max_top_level_folders: 1,
            ..Thresholds::default()
        };
        let arena = build_arena(&[("Camera", 25), ("CameraRig", 25)], &[]);
        assert!(cap_pressure(&arena, &thresholds));
        let (_, decisions) = merge_roots(&arena, &thresholds);
        assert_eq!(decisions[0].outcome, MergeOutcome::Utility);

        let arena_long = build_arena(&[("Character", 25), ("CharacterRig", 25)], &[]);
        let (_, decisions) = merge_roots(&arena_long, &thresholds);
        assert_eq!(decisions[0].outcome, MergeOutcome::Applied);

        let (_, decisions) = merge_roots(&arena, &Thresholds::default());
        assert_eq!(decisions[0].outcome, MergeOutcome::Applied);
    }

    #[test]
    fn pairs_are_ordered_by_prefix_then_size() {
        let arena = build_arena(&[("Weapon", 1), ("WeaponSlot", 1), ("WeaponSlotUI", 1)], &[]);
        let (uf, decisions) = merge_roots(&arena, &Thresholds::default());
        assert_eq!(decisions[0].prefix_len, 10);
        assert_eq!(decisions[0].a, "WeaponSlot");
        assert_eq!(rep_name(&arena, &uf, "WeaponSlotUI"), "Weapon");
    }
}
