//! Ingestion: manifest discovery and parsing, scope filtering, identity
//! assignment and tokenization into [`Item`] records.

pub mod identity;
pub mod manifest;

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{info, instrument};

use crate::error::IngestError;
use crate::text::Lexicon;
use crate::types::{FailureReason, Item, ItemId, ItemKind};

pub use identity::IdentityAssigner;
pub use manifest::{ManifestRecord, SourcedRecord, load_manifests};

/// Counters reported after ingestion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub records: usize,
    pub items: usize,
    pub skipped_non_type: usize,
    pub skipped_out_of_scope: usize,
    pub synthetic_ids: usize,
    pub identity_collisions: usize,
}

/// The immutable item snapshot a run clusters.
#[derive(Debug, Clone, Default)]
pub struct ItemSet {
    /// Sorted by uid.
    pub items: Vec<Item>,
    /// Identity repairs recorded during ingestion.
    pub failures: BTreeMap<ItemId, Vec<FailureReason>>,
    pub stats: IngestStats,
}

impl ItemSet {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Load manifests from `input` and build the item snapshot.
pub fn ingest(input: &Path, lexicon: &Lexicon) -> Result<ItemSet, IngestError> {
    let records = load_manifests(input)?;
    Ok(build_items(records, lexicon))
}

/// Only type records in the global namespace are clustered.
fn in_scope(record: &ManifestRecord) -> bool {
    record
        .namespace
        .as_deref()
        .map(str::trim)
        .is_none_or(|ns| ns.is_empty() || ns == "Global")
}

/// Turn ordered records into items. Records must already be sorted by
/// `(source, position)`.
#[instrument(skip_all, name = "build_items")]
pub fn build_items(records: Vec<SourcedRecord>, lexicon: &Lexicon) -> ItemSet {
    let mut stats = IngestStats {
        records: records.len(),
        ..IngestStats::default()
    };
    let mut ids = IdentityAssigner::with_reserved(
        records
            .iter()
            .filter_map(|r| r.record.uid.as_deref())
            .map(str::trim)
            .filter(|u| !u.is_empty()),
    );
    let mut failures = BTreeMap::new();
    let mut items = Vec::with_capacity(records.len());

    for sourced in records {
        let record = sourced.record;
        let Some(kind) = record.kind.as_deref().and_then(ItemKind::parse) else {
            stats.skipped_non_type += 1;
            continue;
        };
        if !in_scope(&record) {
            stats.skipped_out_of_scope += 1;
            continue;
        }

        let full_name = record.full_name.clone().unwrap_or_else(|| record.name.clone());
        let (uid, reasons) = ids.assign(record.uid.as_deref(), kind, &full_name, &sourced.source);
        if !reasons.is_empty() {
            failures.insert(uid.clone(), reasons);
        }

        items.push(Item {
            tokens: lexicon.tokenize(&record.name),
            base_type: record.inheritance.last().cloned(),
            interfaces: record.implements.into_iter().collect(),
            weak_id: record.uid.as_deref().is_none_or(|u| u.trim().is_empty()),
            source: Some(sourced.source),
            uid,
            name: record.name,
            full_name,
            kind,
        });
    }

    items.sort_by(|a, b| a.uid.cmp(&b.uid));
    stats.items = items.len();
    stats.synthetic_ids = ids.synthetic;
    stats.identity_collisions = ids.collisions;
    info!(
        records = stats.records,
        items = stats.items,
        skipped_non_type = stats.skipped_non_type,
        skipped_out_of_scope = stats.skipped_out_of_scope,
        synthetic_ids = stats.synthetic_ids,
        "Items built"
    );

    ItemSet {
        items,
        failures,
        stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(uid: Option<&str>, name: &str, kind: &str) -> SourcedRecord {
        SourcedRecord {
            record: ManifestRecord {
                uid: uid.map(str::to_string),
                name: name.to_string(),
                full_name: None,
                kind: Some(kind.to_string()),
                namespace: None,
                inheritance: vec!["System.Object".into(), "StoryBase".into()],
                implements: vec!["IStoryNode".into()],
            },
            source: "m.yml".into(),
            position: 0,
        }
    }

    #[test]
    fn builds_sorted_items_with_tokens() {
        let set = build_items(
            vec![
                record(Some("T:Zeta"), "ZetaNode", "Class"),
                record(Some("T:Alpha"), "XMLParser", "Struct"),
            ],
            &Lexicon::default(),
        );
        assert_eq!(set.len(), 2);
        assert_eq!(set.items[0].uid.as_str(), "T:Alpha");
        assert_eq!(set.items[0].tokens, vec!["XML", "Parser"]);
        assert_eq!(set.items[0].base_type.as_deref(), Some("StoryBase"));
        assert!(set.items[0].interfaces.contains("IStoryNode"));
        assert!(set.failures.is_empty());
    }

    #[test]
    fn filters_non_types_and_foreign_namespaces() {
        let mut foreign = record(Some("T:Other"), "Other", "Class");
        foreign.record.namespace = Some("Game.Core".into());
        let mut global = record(Some("T:Here"), "Here", "Class");
        global.record.namespace = Some("Global".into());

        let set = build_items(
            vec![record(Some("M:Run"), "Run", "Method"), foreign, global],
            &Lexicon::default(),
        );
        assert_eq!(set.len(), 1);
        assert_eq!(set.stats.skipped_non_type, 1);
        assert_eq!(set.stats.skipped_out_of_scope, 1);
    }

    #[test]
    fn weak_ids_are_flagged() {
        let set = build_items(vec![record(None, "Loose", "Enum")], &Lexicon::default());
        let item = &set.items[0];
        assert!(item.weak_id);
        assert_eq!(item.uid.as_str(), "enum:Loose");
        assert_eq!(set.failures[&item.uid], vec![FailureReason::WeakIdentity]);
        assert_eq!(set.stats.synthetic_ids, 1);
    }
}
