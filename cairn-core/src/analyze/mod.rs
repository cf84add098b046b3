//! Namespace-wide signal discovery: token frequencies and metadata hubs.
#![allow(clippy::cast_precision_loss)]

pub mod frequency;
pub mod metadata;

use tracing::{info, instrument};

use crate::config::ClusterConfig;
use crate::text::Lexicon;
use crate::types::Item;

pub use frequency::TokenFrequency;
pub use metadata::{HubChoice, MetadataIndex};

/// Report strength of a cluster signal with `count` members against a
/// threshold of `min`, in `[0.5, 1.0]`.
pub fn strength(count: usize, min: usize) -> f64 {
    if count == 0 {
        return 0.5;
    }
    (1.0 - min as f64 / (2.0 * count as f64)).clamp(0.5, 1.0)
}

/// Everything the resolver needs from the analysis stage.
#[derive(Debug, Clone, Default)]
pub struct Analysis {
    pub frequency: TokenFrequency,
    pub metadata: MetadataIndex,
}

impl Analysis {
    #[instrument(skip_all, name = "analyze")]
    pub fn run(items: &[Item], lexicon: &Lexicon, config: &ClusterConfig) -> Self {
        let frequency = TokenFrequency::analyze(items, lexicon, &config.thresholds);
        let metadata = MetadataIndex::build(items);
        info!(
            prefixes = frequency.prefix_counts.len(),
            top_prefixes = frequency.top_prefixes.len(),
            strong_suffixes = frequency.strong_suffixes.len(),
            hubs = metadata.hub_counts.len(),
            "Analysis complete"
        );
        Self {
            frequency,
            metadata,
        }
    }
}
