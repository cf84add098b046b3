use std::collections::{BTreeMap, BTreeSet};

use crate::config::Thresholds;
use crate::text::{Lexicon, is_numeric};
use crate::types::Item;

use super::strength;

/// Shortest type-family stem, in characters.
pub const MIN_FAMILY_STEM_LEN: usize = 4;

/// Namespace-wide token counts over cased tokens.
#[derive(Debug, Clone, Default)]
pub struct TokenFrequency {
    pub prefix_counts: BTreeMap<String, usize>,
    pub suffix_counts: BTreeMap<String, usize>,
    /// Joined leading-token chains (`Big`, `BigBad`, `BigBadWolf`) → count.
    pub stem_counts: BTreeMap<String, usize>,
    /// Stop tokens seen in first or last position; reported, never used.
    pub stop_token_counts: BTreeMap<String, usize>,
    /// Top-K prefixes by `(count desc, token asc)`.
    pub top_prefixes: BTreeSet<String>,
    /// Every suffix meeting `min_cluster_size`.
    pub strong_suffixes: BTreeSet<String>,
}

impl TokenFrequency {
    pub fn analyze(items: &[Item], lexicon: &Lexicon, thresholds: &Thresholds) -> Self {
        let mut freq = Self::default();
        for item in items {
            let cased = lexicon.cased(&item.tokens);
            let (Some(first), Some(last)) = (cased.first(), cased.last()) else {
                continue;
            };
            *freq.prefix_counts.entry(first.clone()).or_default() += 1;
            *freq.suffix_counts.entry(last.clone()).or_default() += 1;
            for token in [first, last] {
                if lexicon.is_stop_token(token) {
                    *freq.stop_token_counts.entry(token.clone()).or_default() += 1;
                }
            }
            let mut stem = String::new();
            for token in &cased {
                stem.push_str(token);
                *freq.stem_counts.entry(stem.clone()).or_default() += 1;
            }
        }

        let min = thresholds.min_cluster_size;
        let eligible = |token: &str, count: usize| {
            count >= min && !lexicon.is_stop_token(token) && !is_numeric(token)
        };

        let mut ranked: Vec<(&String, usize)> = freq
            .prefix_counts
            .iter()
            .filter(|(token, count)| eligible(token, **count))
            .map(|(token, count)| (token, *count))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        freq.top_prefixes = ranked
            .into_iter()
            .take(thresholds.top_k)
            .map(|(token, _)| token.clone())
            .collect();

        freq.strong_suffixes = freq
            .suffix_counts
            .iter()
            .filter(|(token, count)| eligible(token, **count))
            .map(|(token, _)| token.clone())
            .collect();
        freq
    }

    pub fn prefix_strength(&self, token: &str, min: usize) -> f64 {
        strength(self.prefix_counts.get(token).copied().unwrap_or(0), min)
    }

    pub fn suffix_strength(&self, token: &str, min: usize) -> f64 {
        strength(self.suffix_counts.get(token).copied().unwrap_or(0), min)
    }

    /// Longest leading-token stem shared by at least `min_family_size`
    /// items, at least [`MIN_FAMILY_STEM_LEN`] characters long. The first
    /// token must not be a stop token.
    pub fn family_stem(
        &self,
        cased: &[String],
        lexicon: &Lexicon,
        min_family_size: usize,
    ) -> Option<(String, usize)> {
        let first = cased.first()?;
        if lexicon.is_stop_token(first) || is_numeric(first) {
            return None;
        }
        (1..=cased.len()).rev().find_map(|n| {
            let stem = cased[..n].concat();
            let count = self.stem_counts.get(&stem).copied().unwrap_or(0);
            (count >= min_family_size && stem.chars().count() >= MIN_FAMILY_STEM_LEN)
                .then_some((stem, count))
        })
    }
}
