use std::collections::{BTreeMap, BTreeSet};

use cairn_core::config::ClusterConfig;
use cairn_core::extract::ingest;
use cairn_core::normalize::MergeOutcome;
use cairn_core::pipeline::{ClusterPipeline, RunContext, RunOptions, persist};
use cairn_core::progress::NoopReporter;
use cairn_core::store::IdentityCache;
use cairn_core::types::{FailureReason, ItemId};
use cairn_test::{Fixture, ItemSetBuilder, path_of, run_fresh, run_with, top_level_folders};

const CARD_PARTS: [&str; 30] = [
    "Front", "Back", "Deck", "Hand", "Pile", "Slot", "Face", "Edge", "Rank", "Suit", "Draw",
    "Burn", "Flip", "Grid", "Lane", "Mark", "Note", "Pack", "Rule", "Seal", "Tier", "Trim",
    "Vault", "Wing", "Zone", "Glow", "Halo", "Icon", "Jolt", "Knot",
];

const CARD_TAILS: [&str; 10] = [
    "Alpha", "Bravo", "Charlie", "Delta", "Echo", "Foxtrot", "Golf", "Hotel", "India", "Juliet",
];

fn mixed_namespace() -> ItemSetBuilder {
    ItemSetBuilder::new()
        .classes(["InventoryUI", "ShopUI", "QuestUI", "MapUI"])
        .classes(["PlayerHealth", "PlayerMotor", "PlayerInput", "PlayerCamera"])
        .classes(["BigBadWolf", "BigBadWolfAnim", "BigBadWolfSound"])
        .classes(["Zorp", "Blip", "HTTP2Server", "2DVector", "Version2"])
}

fn small_clusters() -> ClusterConfig {
    let mut config = ClusterConfig::default();
    config.thresholds.min_cluster_size = 3;
    config
}

// ── Determinism ──────────────────────────────────────────────────

#[test]
fn identical_inputs_give_byte_identical_reports() {
    let config = small_clusters();
    let first = run_fresh(&config, &mixed_namespace());
    let second = run_fresh(&config, &mixed_namespace());
    assert_eq!(first.paths, second.paths);
    assert_eq!(
        first.report.to_json().unwrap(),
        second.report.to_json().unwrap()
    );
}

#[test]
fn record_order_does_not_change_output() {
    let config = small_clusters();
    let forward = mixed_namespace();
    let reversed = forward
        .records()
        .iter()
        .rev()
        .cloned()
        .fold(ItemSetBuilder::new(), ItemSetBuilder::record);
    let a = run_fresh(&config, &forward);
    let b = run_fresh(&config, &reversed);
    assert_eq!(a.paths, b.paths);
    assert_eq!(a.report.to_json().unwrap(), b.report.to_json().unwrap());
}

// ── End-to-end scenarios ─────────────────────────────────────────

#[test]
fn type_family_and_misc_singleton() {
    let mut config = ClusterConfig::default();
    config.rules.pinned_roots = vec!["BigBadWolf".into()];
    config.rules.pinned_allow_singleton = true;
    let items = ItemSetBuilder::new().classes(["BigBadWolf", "BigBadWolfAnim", "BigBadWolfSound", "Zorp"]);

    let outcome = run_fresh(&config, &items);
    for uid in ["T:BigBadWolf", "T:BigBadWolfAnim", "T:BigBadWolfSound"] {
        assert!(
            path_of(&outcome, uid).starts_with("Global/TypeFamilies/BigBadWolf/"),
            "{uid} -> {}",
            path_of(&outcome, uid)
        );
    }
    assert_eq!(path_of(&outcome, "T:Zorp"), "Global/Misc/Zorp.md");
}

#[test]
fn folder_and_file_collision_renames_the_page() {
    let mut config = small_clusters();
    config
        .path_overrides
        .insert("Story".into(), "Global/Story.md".into());
    let items = ItemSetBuilder::new().classes(["Story", "StoryNode", "StoryGraph", "StoryBeat"]);

    let outcome = run_fresh(&config, &items);
    assert_eq!(path_of(&outcome, "T:StoryNode"), "Global/Story/StoryNode.md");
    assert_eq!(path_of(&outcome, "T:Story"), "Global/Story_Page.md");

    let entry = outcome
        .report
        .entries
        .iter()
        .find(|e| e.uid == ItemId::from("T:Story"))
        .unwrap();
    assert!(
        entry
            .failure_reasons
            .contains(&FailureReason::FolderFileCollision)
    );
    assert_eq!(outcome.report.collisions.len(), 1);
}

#[test]
fn every_item_gets_exactly_one_path() {
    let config = small_clusters();
    let items = mixed_namespace();
    let outcome = run_fresh(&config, &items);
    assert_eq!(outcome.paths.len(), items.records().len());
    assert_eq!(outcome.report.entries.len(), items.records().len());

    let unique: BTreeSet<String> = outcome
        .paths
        .values()
        .map(|p| p.to_ascii_lowercase())
        .collect();
    assert_eq!(unique.len(), outcome.paths.len());
}

// ── Pinned roots ─────────────────────────────────────────────────

fn wolves() -> ItemSetBuilder {
    ItemSetBuilder::new()
        .classes(["BigBadWolf", "BigBadWolfAnim", "BigBadWolfSound"])
        .classes(["BigBadWolves", "BigBadWolvesAnim", "BigBadWolvesSound"])
}

fn pinned(names: &[&str]) -> ClusterConfig {
    let mut config = ClusterConfig::default();
    config.rules.pinned_roots = names.iter().map(|n| (*n).to_string()).collect();
    config.rules.pinned_allow_singleton = true;
    config
}

#[test]
fn pinned_root_absorbs_its_variant() {
    let outcome = run_fresh(&pinned(&["BigBadWolf"]), &wolves());

    let merge = &outcome.report.merges[0];
    assert_eq!(merge.outcome, MergeOutcome::Applied);
    assert_eq!(merge.winner.as_deref(), Some("BigBadWolf"));
    assert_eq!(
        path_of(&outcome, "T:BigBadWolvesAnim"),
        "Global/TypeFamilies/BigBadWolf/BigBadWolvesAnim.md"
    );
}

#[test]
fn two_pinned_roots_never_merge() {
    let outcome = run_fresh(&pinned(&["BigBadWolf", "BigBadWolves"]), &wolves());

    assert!(
        outcome
            .report
            .merges
            .iter()
            .all(|m| m.outcome != MergeOutcome::Applied)
    );
    assert_eq!(outcome.report.merges[0].outcome, MergeOutcome::PinnedPair);
    assert!(path_of(&outcome, "T:BigBadWolfAnim").starts_with("Global/TypeFamilies/BigBadWolf/"));
    assert!(
        path_of(&outcome, "T:BigBadWolvesAnim").starts_with("Global/TypeFamilies/BigBadWolves/")
    );
}

// ── Capacity ─────────────────────────────────────────────────────

#[test]
fn top_level_cap_is_respected() {
    let mut config = small_clusters();
    config.thresholds.max_top_level_folders = 5;
    let names: Vec<String> = CARD_TAILS
        .iter()
        .flat_map(|head| ["Gate", "Lamp", "Rope", "Tank"].map(|tail| format!("{head}{tail}")))
        .chain(["3DModel", "3DMesh", "3DLight", "404Page"].map(String::from))
        .collect();
    let items = ItemSetBuilder::new().classes(&names);

    let outcome = run_fresh(&config, &items);
    let folders = top_level_folders(&outcome, &config);
    assert!(folders.len() <= 5, "{folders:?}");
    assert!(outcome.report.metrics.capacity_constraint_ok);
    assert!(outcome.report.metrics.top_level_count <= 5);
    assert_eq!(outcome.paths.len(), names.len());
    assert!(outcome.report.metrics.num_items_rerouted > 0);
}

#[test]
fn no_top_level_folder_is_numeric() {
    let config = small_clusters();
    let items = ItemSetBuilder::new()
        .classes(["3DModel", "3DMesh", "3DLight", "2DSprite", "2DAtlas", "2DTile"])
        .classes(["Item1", "Item2", "Item3", "1999Edition", "2000Edition", "2001Edition"]);

    let outcome = run_fresh(&config, &items);
    for folder in top_level_folders(&outcome, &config) {
        assert!(
            !folder.chars().all(|c| c.is_ascii_digit()),
            "numeric folder {folder}"
        );
    }
}

#[test]
fn oversized_cluster_is_split_by_next_token() {
    let config = ClusterConfig::default();
    let names: Vec<String> = CARD_PARTS
        .iter()
        .flat_map(|part| CARD_TAILS.map(|tail| format!("Card{part}{tail}")))
        .collect();
    assert_eq!(names.len(), 300);
    let items = ItemSetBuilder::new().classes(&names);

    let outcome = run_fresh(&config, &items);
    assert_eq!(outcome.paths.len(), 300);

    let mut per_folder: BTreeMap<&str, usize> = BTreeMap::new();
    for path in outcome.paths.values() {
        assert!(path.starts_with("Global/Card/"), "{path}");
        let folder = path.rsplit_once('/').map_or(path.as_str(), |(dir, _)| dir);
        *per_folder.entry(folder).or_default() += 1;
    }
    assert!(per_folder.len() <= 50);
    assert!(per_folder.values().all(|&n| n <= config.thresholds.max_folder_size));
    assert_eq!(per_folder.get("Global/Card/Front"), Some(&10));
    assert_eq!(
        path_of(&outcome, "T:CardFrontAlpha"),
        "Global/Card/Front/CardFrontAlpha.md"
    );
}

// ── Cache lifecycle ──────────────────────────────────────────────

#[test]
fn rerun_from_manifests_is_idempotent() {
    let fixture = Fixture::new();
    let items = mixed_namespace();
    fixture.write_json_manifest("types.json", items.records());
    let outputs = fixture.outputs();
    let config = small_clusters();

    let first_ctx = RunContext::new(config.clone(), IdentityCache::default(), RunOptions::default());
    let set = ingest(&fixture.input_dir(), &first_ctx.lexicon).unwrap();
    let first = ClusterPipeline::new(&first_ctx, &NoopReporter).run(&set);
    persist(&first, &outputs, false).unwrap();

    let cache = IdentityCache::load(&outputs.cache, false).unwrap().cache;
    assert_eq!(cache.entries.len(), items.records().len());
    let second_ctx = RunContext::new(config, cache, RunOptions::default());
    let set = ingest(&fixture.input_dir(), &second_ctx.lexicon).unwrap();
    let second = ClusterPipeline::new(&second_ctx, &NoopReporter).run(&set);

    assert_eq!(second.paths, first.paths);
    assert!(second.report.moves.is_empty());
    assert!(second.report.metrics.root_churn.abs() < f64::EPSILON);
    let summary = persist(&second, &outputs, false).unwrap();
    assert!(summary.stubs.written.is_empty());
}

#[test]
fn returning_item_keeps_its_stale_cached_path() {
    let published = BTreeMap::from([(ItemId::from("T:Zorp"), "Global/Misc/Zorp.md".to_string())]);
    let cache = IdentityCache::default()
        .advance(&published, "h")
        .advance(&BTreeMap::new(), "h");
    assert!(cache.entries[&ItemId::from("T:Zorp")].stale);

    let items = ItemSetBuilder::new()
        .class("Zorp")
        .classes(CARD_TAILS.iter().map(|tail| format!("Zorp{tail}")));
    let outcome = run_with(&ClusterConfig::default(), cache, RunOptions::default(), &items);

    assert_eq!(path_of(&outcome, "T:Zorp"), "Global/Misc/Zorp.md");
    assert!(outcome.report.moves.is_empty());
    let entry = &outcome.next_cache.entries[&ItemId::from("T:Zorp")];
    assert!(!entry.stale);
    assert_eq!(entry.last_seen_run, 3);
}

#[test]
fn forced_rebuild_records_moves_and_writes_stubs() {
    let fixture = Fixture::new();
    let outputs = fixture.outputs();
    let items = ItemSetBuilder::new().classes(["Story", "StoryNode", "StoryGraph", "StoryBeat"]);

    let first = run_fresh(&small_clusters(), &items);
    assert_eq!(path_of(&first, "T:StoryNode"), "Global/Story/StoryNode.md");
    persist(&first, &outputs, false).unwrap();

    let mut stricter = ClusterConfig::default();
    stricter.thresholds.min_cluster_size = 5;
    let cache = IdentityCache::load(&outputs.cache, false).unwrap().cache;
    let options = RunOptions {
        force_rebuild: true,
        ..RunOptions::default()
    };
    let second = run_with(&stricter, cache, options, &items);

    assert_eq!(path_of(&second, "T:StoryNode"), "Global/Misc/StoryNode.md");
    assert_eq!(second.report.moves.len(), 4);
    assert!((second.report.metrics.root_churn - 1.0).abs() < f64::EPSILON);

    let summary = persist(&second, &outputs, false).unwrap();
    assert_eq!(summary.stubs.written.len(), 4);
    let stub =
        std::fs::read_to_string(outputs.out_dir.join("Global/Story/StoryNode.md")).unwrap();
    assert!(stub.contains("obsolete: true"));
    assert!(stub.contains("(../Misc/StoryNode.md)"));
}

// ── Ingestion ────────────────────────────────────────────────────

#[test]
fn json_and_yaml_manifests_are_merged() {
    let fixture = Fixture::new();
    let json = ItemSetBuilder::new().classes(["InventoryUI", "ShopUI"]);
    fixture.write_json_manifest("a.json", json.records());
    let yaml = ItemSetBuilder::new().classes(["QuestUI"]);
    fixture.write_yaml_manifest("nested/b.yml", yaml.records());
    fixture.write_manifest(
        "c.json",
        r#"[
  {"name": "Dup", "fullName": "Dup", "type": "class"},
  {"name": "Dup", "fullName": "Dup", "type": "class"},
  {"name": "Helper", "fullName": "Game.Helper", "type": "class", "namespace": "Game"},
  {"name": "Run", "fullName": "Run", "type": "method"}
]"#,
    );

    let config = ClusterConfig::default();
    let ctx = RunContext::new(config, IdentityCache::default(), RunOptions::default());
    let set = ingest(&fixture.input_dir(), &ctx.lexicon).unwrap();

    assert_eq!(set.len(), 5);
    assert_eq!(set.stats.skipped_out_of_scope, 1);
    assert_eq!(set.stats.skipped_non_type, 1);
    assert_eq!(set.stats.synthetic_ids, 2);
    let dup: Vec<&ItemId> = set
        .items
        .iter()
        .map(|i| &i.uid)
        .filter(|u| u.as_str().starts_with("class:Dup"))
        .collect();
    assert_eq!(dup.len(), 2);
    assert!(set.failures.values().flatten().any(|r| *r == FailureReason::IdentityCollision));
}
