//! Final layout: folder and file names for every placement, with
//! deterministic collision repair.

pub mod registry;

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, instrument};

use crate::config::{ClusterConfig, Layout};
use crate::normalize::{Normalized, Root, Target};
use crate::text::{Lexicon, sanitize};
use crate::types::{FailureReason, Item, ItemId, RuleId};

pub use registry::{CollisionKind, CollisionRecord, NodeKind, PathNode, PathRegistry};

/// Resolved paths for one run.
#[derive(Debug, Clone, Default)]
pub struct PathPlan {
    pub paths: BTreeMap<ItemId, String>,
    /// Final folder of each kept representative.
    pub root_folders: BTreeMap<usize, String>,
    pub collisions: Vec<CollisionRecord>,
    pub reasons: BTreeMap<ItemId, Vec<FailureReason>>,
}

impl PathPlan {
    pub fn misc_dir(layout: &Layout) -> String {
        format!("{}/{}", layout.global_dir, layout.misc_dir)
    }
}

/// Folder a root asks for before collision repair.
pub fn root_folder(root: &Root, layout: &Layout) -> String {
    if root.key.rule == RuleId::TypeFamily {
        format!("{}/{}/{}", layout.global_dir, layout.family_dir, root.sanitized_name)
    } else {
        format!("{}/{}", layout.global_dir, root.sanitized_name)
    }
}

pub fn file_name(item: &Item, lexicon: &Lexicon) -> String {
    format!("{}.md", sanitize(&lexicon.case_token(&item.name)))
}

struct Planner<'a> {
    normalized: &'a Normalized,
    layout: &'a Layout,
    registry: PathRegistry,
    plan: PathPlan,
}

impl Planner<'_> {
    fn note(&mut self, uid: &ItemId, reasons: impl IntoIterator<Item = FailureReason>) {
        let entry = self.plan.reasons.entry(uid.clone()).or_default();
        for reason in reasons {
            if !entry.contains(&reason) {
                entry.push(reason);
            }
        }
    }

    fn claim_root_folders(&mut self) {
        let normalized = self.normalized;
        let arena = &normalized.arena;
        let mut wanted: Vec<(String, usize)> = normalized
            .kept
            .iter()
            .map(|&rep| (root_folder(&arena.roots[rep], self.layout), rep))
            .collect();
        wanted.sort_by(|(pa, ra), (pb, rb)| {
            pa.to_ascii_lowercase()
                .cmp(&pb.to_ascii_lowercase())
                .then_with(|| pa.cmp(pb))
                .then_with(|| arena.roots[*ra].key.cmp(&arena.roots[*rb].key))
        });

        for (path, rep) in wanted {
            let seed = arena.roots[rep].key.to_string();
            let (folder, record) = self.registry.claim_folder(&path, &seed);
            if let Some(record) = record {
                self.plan.collisions.push(record);
                let members = normalized
                    .placements
                    .iter()
                    .filter(|(_, p)| matches!(p.target, Target::Root { rep: r, .. } if r == rep));
                for (uid, _) in members {
                    self.note(uid, [FailureReason::FolderCollision]);
                }
            }
            self.plan.root_folders.insert(rep, folder);
        }
    }

    fn claim_subfolders(&mut self) -> BTreeMap<(usize, String), String> {
        let normalized = self.normalized;
        let wanted: BTreeSet<(usize, &String)> = normalized
            .placements
            .values()
            .filter_map(|p| match &p.target {
                Target::Root {
                    rep,
                    subfolder: Some(sub),
                } => Some((*rep, sub)),
                _ => None,
            })
            .collect();

        let mut folders = BTreeMap::new();
        for (rep, sub) in wanted {
            let Some(parent) = self.plan.root_folders.get(&rep) else {
                continue;
            };
            let path = format!("{parent}/{}", sanitize(sub));
            let seed = format!("{}/{sub}", normalized.arena.roots[rep].key);
            let (folder, record) = self.registry.claim_folder(&path, &seed);
            self.plan.collisions.extend(record);
            folders.insert((rep, sub.clone()), folder);
        }
        folders
    }

    fn desired_path(
        &self,
        target: &Target,
        item: &Item,
        lexicon: &Lexicon,
        subfolders: &BTreeMap<(usize, String), String>,
    ) -> Option<String> {
        let file = file_name(item, lexicon);
        match target {
            Target::Fixed { path, .. } => Some(path.clone()),
            Target::Misc => Some(format!("{}/{file}", PathPlan::misc_dir(self.layout))),
            Target::Root { rep, subfolder } => {
                let folder = match subfolder {
                    Some(sub) => subfolders.get(&(*rep, sub.clone()))?,
                    None => self.plan.root_folders.get(rep)?,
                };
                Some(format!("{folder}/{file}"))
            }
        }
    }
}

/// Assign a unique, case-insensitively distinct path to every placement.
///
/// Claims happen in a fixed order so that earlier claimants keep their
/// names: layout folders, parents of cached and override paths, root
/// folders, subfolders, then files (cached, overrides, computed). A root
/// may move into a parent folder spelled exactly like its own; a parent
/// that differs only in case pushes the root to a hashed name.
#[instrument(skip_all, name = "paths")]
pub fn assign_paths(
    items: &[Item],
    normalized: &Normalized,
    config: &ClusterConfig,
    lexicon: &Lexicon,
) -> PathPlan {
    let layout = &config.layout;
    let mut planner = Planner {
        normalized,
        layout,
        registry: PathRegistry::new(),
        plan: PathPlan::default(),
    };
    planner.registry.reserve_folder(&layout.global_dir);
    planner.registry.reserve_folder(&PathPlan::misc_dir(layout));
    planner
        .registry
        .reserve_folder(&format!("{}/{}", layout.global_dir, layout.family_dir));

    for placement in normalized.placements.values() {
        if let Target::Fixed { path, .. } = &placement.target {
            if let Some((parent, _)) = path.rsplit_once('/') {
                planner.registry.ensure_folder(parent);
            }
        }
    }

    planner.claim_root_folders();
    let subfolders = planner.claim_subfolders();

    // (tier, path, uid): cached first, then overrides, then computed.
    let mut files: Vec<(u8, String, &ItemId)> = Vec::new();
    for item in items {
        let Some(placement) = normalized.placements.get(&item.uid) else {
            continue;
        };
        let tier = match &placement.target {
            Target::Fixed {
                rule: RuleId::Override,
                ..
            } => 1,
            Target::Fixed { .. } => 0,
            _ => 2,
        };
        let path = planner
            .desired_path(&placement.target, item, lexicon, &subfolders)
            .unwrap_or_else(|| {
                debug!(uid = %item.uid, "No folder for placement, using misc");
                format!("{}/{}", PathPlan::misc_dir(layout), file_name(item, lexicon))
            });
        files.push((tier, path, &item.uid));
    }
    files.sort_by(|(ta, pa, ua), (tb, pb, ub)| {
        ta.cmp(tb).then_with(|| {
            if *ta == 2 {
                pa.cmp(pb).then_with(|| ua.cmp(ub))
            } else {
                ua.cmp(ub)
            }
        })
    });

    for (_, path, uid) in files {
        let (resolved, record, reasons) = planner.registry.claim_file(&path, uid);
        planner.plan.collisions.extend(record);
        if !reasons.is_empty() {
            planner.note(uid, reasons);
        }
        planner.plan.paths.insert(uid.clone(), resolved);
    }
    planner.plan
}
