//! Initial assignment: the ordered rule chain applied per item.

pub mod rules;

use tracing::{debug, instrument};

use crate::config::ClusterConfig;
use crate::store::IdentityCache;
use crate::types::{Candidate, ClusterKey, Item, ItemId, RuleId};

pub use rules::RuleContext;

/// Outcome of the rule chain for one item.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub uid: ItemId,
    pub winner: Candidate,
    pub runner_up: Option<Candidate>,
    /// Heuristic matches in precedence order. Reroute draws only from
    /// these.
    pub signals: Vec<Candidate>,
    /// Verbatim path for cache and override winners.
    pub fixed_path: Option<String>,
}

impl Resolution {
    pub fn rule(&self) -> RuleId {
        self.winner.rule()
    }

    /// True when the winner is a heuristic rule that forms a root.
    pub fn forms_root(&self) -> bool {
        !matches!(self.rule(), RuleId::Cache | RuleId::Override | RuleId::Misc)
    }
}

/// Normalize an explicit path to forward slashes without a leading `./`.
pub fn canonical_path(path: &str) -> String {
    let slashed = path.trim().replace('\\', "/");
    slashed
        .trim_start_matches("./")
        .trim_end_matches('/')
        .to_string()
}

fn override_for<'c>(item: &Item, config: &'c ClusterConfig) -> Option<&'c String> {
    config
        .path_overrides
        .get(item.uid.as_str())
        .or_else(|| config.path_overrides.get(&item.full_name))
}

/// Resolve one item.
///
/// Cache hits short-circuit everything. Overrides win but the heuristic
/// rules still run so the report can name a runner-up.
pub fn resolve_item(
    item: &Item,
    ctx: &RuleContext<'_>,
    cache: &IdentityCache,
    force_rebuild: bool,
) -> Resolution {
    if !force_rebuild {
        if let Some(entry) = cache.entry(&item.uid) {
            return Resolution {
                uid: item.uid.clone(),
                winner: Candidate::new(RuleId::Cache, entry.path.clone(), 1.0),
                runner_up: None,
                signals: Vec::new(),
                fixed_path: Some(entry.path.clone()),
            };
        }
    }

    let signals = ctx.evaluate(item);
    if let Some(target) = override_for(item, ctx.config) {
        let target = canonical_path(target);
        return Resolution {
            uid: item.uid.clone(),
            winner: Candidate::new(RuleId::Override, target.clone(), 1.0),
            runner_up: signals.first().cloned(),
            signals,
            fixed_path: Some(target),
        };
    }

    let mut ranked = signals.iter();
    let winner = ranked.next().cloned().unwrap_or_else(|| Candidate {
        key: ClusterKey::misc(),
        score: 0.0,
    });
    Resolution {
        uid: item.uid.clone(),
        winner,
        runner_up: ranked.next().cloned(),
        signals,
        fixed_path: None,
    }
}

/// Resolve every item, in item order.
#[instrument(skip_all, name = "resolve")]
pub fn resolve_all(
    items: &[Item],
    ctx: &RuleContext<'_>,
    cache: &IdentityCache,
    force_rebuild: bool,
) -> Vec<Resolution> {
    let resolutions: Vec<Resolution> = items
        .iter()
        .map(|item| resolve_item(item, ctx, cache, force_rebuild))
        .collect();
    for r in &resolutions {
        debug!(uid = %r.uid, rule = %r.rule(), key = %r.winner.key, "Initial assignment");
    }
    resolutions
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::analyze::Analysis;
    use crate::store::CacheEntry;
    use crate::text::Lexicon;
    use crate::types::ItemKind;

    fn item(uid: &str, name: &str, lexicon: &Lexicon) -> Item {
        Item {
            uid: ItemId::from(uid),
            name: name.into(),
            full_name: format!("Game.{name}"),
            kind: ItemKind::Class,
            tokens: lexicon.tokenize(name),
            base_type: None,
            interfaces: BTreeSet::new(),
            weak_id: false,
            source: None,
        }
    }

    fn cache_with(uid: &str, path: &str, stale: bool) -> IdentityCache {
        let mut cache = IdentityCache::default();
        cache.entries.insert(
            ItemId::from(uid),
            CacheEntry {
                path: path.into(),
                stale,
                last_seen_run: 0,
            },
        );
        cache
    }

    #[test]
    fn cache_short_circuits() {
        let config = ClusterConfig::default();
        let lexicon = Lexicon::from_config(&config);
        let items = vec![item("U1", "InventoryUi", &lexicon)];
        let analysis = Analysis::run(&items, &lexicon, &config);
        let ctx = RuleContext::new(&config, &lexicon, &analysis);
        let cache = cache_with("U1", "Global/Old/InventoryUi.md", false);

        let r = resolve_item(&items[0], &ctx, &cache, false);
        assert_eq!(r.rule(), RuleId::Cache);
        assert_eq!(r.fixed_path.as_deref(), Some("Global/Old/InventoryUi.md"));
        assert!(r.signals.is_empty());
        assert!(r.runner_up.is_none());

        let rebuilt = resolve_item(&items[0], &ctx, &cache, true);
        assert_eq!(rebuilt.rule(), RuleId::PrioritySuffix);
    }

    #[test]
    fn stale_entries_keep_their_path() {
        let config = ClusterConfig::default();
        let lexicon = Lexicon::from_config(&config);
        let items = vec![item("U1", "Zorp", &lexicon)];
        let analysis = Analysis::run(&items, &lexicon, &config);
        let ctx = RuleContext::new(&config, &lexicon, &analysis);
        let cache = cache_with("U1", "Global/Old/Zorp.md", true);

        let r = resolve_item(&items[0], &ctx, &cache, false);
        assert_eq!(r.rule(), RuleId::Cache);
        assert_eq!(r.fixed_path.as_deref(), Some("Global/Old/Zorp.md"));

        let rebuilt = resolve_item(&items[0], &ctx, &cache, true);
        assert_eq!(rebuilt.rule(), RuleId::Misc);
        assert_eq!(rebuilt.winner.key, ClusterKey::misc());
    }

    #[test]
    fn uid_override_beats_full_name_and_keeps_runner_up() {
        let mut config = ClusterConfig::default();
        config
            .path_overrides
            .insert("Game.InventoryUi".into(), "Global/ByName.md".into());
        config
            .path_overrides
            .insert("U1".into(), "Global\\ByUid.md".into());
        let lexicon = Lexicon::from_config(&config);
        let items = vec![item("U1", "InventoryUi", &lexicon)];
        let analysis = Analysis::run(&items, &lexicon, &config);
        let ctx = RuleContext::new(&config, &lexicon, &analysis);

        let r = resolve_item(&items[0], &ctx, &IdentityCache::default(), false);
        assert_eq!(r.rule(), RuleId::Override);
        assert_eq!(r.fixed_path.as_deref(), Some("Global/ByUid.md"));
        assert_eq!(r.runner_up.map(|c| c.rule()), Some(RuleId::PrioritySuffix));
        assert!((r.winner.score - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn full_name_override_applies_without_uid_entry() {
        let mut config = ClusterConfig::default();
        config
            .path_overrides
            .insert("Game.Zorp".into(), "Global/Special/Zorp.md".into());
        let lexicon = Lexicon::from_config(&config);
        let items = vec![item("U9", "Zorp", &lexicon)];
        let analysis = Analysis::run(&items, &lexicon, &config);
        let ctx = RuleContext::new(&config, &lexicon, &analysis);
        let r = resolve_item(&items[0], &ctx, &IdentityCache::default(), false);
        assert_eq!(r.fixed_path.as_deref(), Some("Global/Special/Zorp.md"));
        assert!(!r.forms_root());
    }

    #[test]
    fn canonical_paths() {
        assert_eq!(canonical_path("./Global\\A\\B.md"), "Global/A/B.md");
        assert_eq!(canonical_path("Global/A/"), "Global/A");
    }
}
