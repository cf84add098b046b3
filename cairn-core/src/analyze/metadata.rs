use std::collections::BTreeMap;

use crate::config::ClusterConfig;
use crate::types::Item;

/// Minimum short-name length of a hub type.
pub const MIN_HUB_NAME_LEN: usize = 4;

/// Base-type and interface occurrence counts across the namespace.
#[derive(Debug, Clone, Default)]
pub struct MetadataIndex {
    /// Hub uid → items naming it as base type or interface.
    pub hub_counts: BTreeMap<String, usize>,
}

/// A hub picked for an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubChoice {
    pub uid: String,
    pub count: usize,
}

impl MetadataIndex {
    pub fn build(items: &[Item]) -> Self {
        let mut hub_counts: BTreeMap<String, usize> = BTreeMap::new();
        for item in items {
            if let Some(base) = &item.base_type {
                *hub_counts.entry(base.clone()).or_default() += 1;
            }
            for iface in &item.interfaces {
                if item.base_type.as_ref() != Some(iface) {
                    *hub_counts.entry(iface.clone()).or_default() += 1;
                }
            }
        }
        Self { hub_counts }
    }

    pub fn count(&self, hub: &str) -> usize {
        self.hub_counts.get(hub).copied().unwrap_or(0)
    }

    pub fn is_eligible(&self, hub: &str, config: &ClusterConfig) -> bool {
        let short = short_name(hub);
        let denied = config
            .denylists
            .metadata_denylist
            .iter()
            .any(|d| d == hub || d == short);
        let disallowed = config
            .rules
            .hub_disallowed_suffixes
            .iter()
            .any(|s| short.ends_with(s.as_str()));
        short.chars().count() >= MIN_HUB_NAME_LEN
            && !denied
            && !disallowed
            && self.count(hub) >= config.thresholds.min_cluster_size
    }

    /// The immediate base type when eligible, else the eligible interface
    /// with the highest count (ties ascending by uid).
    pub fn choose_hub(&self, item: &Item, config: &ClusterConfig) -> Option<HubChoice> {
        if let Some(base) = item
            .base_type
            .as_deref()
            .filter(|b| self.is_eligible(b, config))
        {
            return Some(HubChoice {
                uid: base.to_string(),
                count: self.count(base),
            });
        }
        item.interfaces
            .iter()
            .filter(|i| self.is_eligible(i, config))
            .map(|i| HubChoice {
                uid: i.clone(),
                count: self.count(i),
            })
            .min_by(|a, b| b.count.cmp(&a.count).then_with(|| a.uid.cmp(&b.uid)))
    }
}

/// Name after the last `.`, with any generic arity marker removed.
pub fn short_name(uid: &str) -> &str {
    let short = uid.rsplit('.').next().unwrap_or(uid);
    short.split('`').next().unwrap_or(short)
}
