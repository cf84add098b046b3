//! Heuristic rules of the resolver chain. Each rule is a pure function of
//! the item and the shared context; precedence is positional.

use std::collections::{BTreeMap, BTreeSet};

use crate::analyze::{Analysis, metadata::short_name, strength};
use crate::config::ClusterConfig;
use crate::text::{Lexicon, is_numeric};
use crate::types::{Candidate, Item, RuleId};

pub const HUB_SCORE: f64 = 0.95;
pub const PRIORITY_SUFFIX_SCORE: f64 = 0.9;
pub const STRONG_PREFIX_SCORE: f64 = 0.8;
pub const STRONG_SUFFIX_SCORE: f64 = 0.7;
pub const KEYWORD_SCORE: f64 = 0.6;
pub const TYPE_FAMILY_SCORE: f64 = 0.5;

/// Read-only inputs shared by every rule.
#[derive(Debug)]
pub struct RuleContext<'a> {
    pub config: &'a ClusterConfig,
    pub lexicon: &'a Lexicon,
    pub analysis: &'a Analysis,
    /// Folded priority suffix → canonical spelling.
    priority_suffixes: BTreeMap<String, String>,
    /// Canonical bucket name → folded keywords, in bucket order.
    keywords: Vec<(String, BTreeSet<String>)>,
}

impl<'a> RuleContext<'a> {
    pub fn new(config: &'a ClusterConfig, lexicon: &'a Lexicon, analysis: &'a Analysis) -> Self {
        let priority_suffixes = config
            .rules
            .priority_suffixes
            .iter()
            .map(|s| (lexicon.fold_token(s), lexicon.case_token(s)))
            .collect();
        let keywords = config
            .rules
            .keyword_clusters
            .iter()
            .map(|(bucket, words)| {
                let folded = words.iter().map(|w| lexicon.fold_token(w)).collect();
                (lexicon.canonical_name(bucket), folded)
            })
            .collect();
        Self {
            config,
            lexicon,
            analysis,
            priority_suffixes,
            keywords,
        }
    }

    /// Every heuristic rule that matches `item`, in precedence order.
    pub fn evaluate(&self, item: &Item) -> Vec<Candidate> {
        let cased = self.lexicon.cased(&item.tokens);
        let mut out = Vec::new();
        out.extend(self.metadata_hub(item));
        out.extend(self.priority_suffix(&cased));
        out.extend(self.strong_prefix(&cased));
        out.extend(self.strong_suffix(&cased));
        out.extend(self.keyword(&cased));
        out.extend(self.type_family(&cased));
        out.retain(|c| !c.key.value.is_empty() && !is_numeric(&c.key.value));
        out
    }

    fn min_cluster(&self) -> usize {
        self.config.thresholds.min_cluster_size
    }

    fn metadata_hub(&self, item: &Item) -> Option<Candidate> {
        let hub = self.analysis.metadata.choose_hub(item, self.config)?;
        let display = self
            .config
            .rules
            .hub_types
            .get(&hub.uid)
            .map(|name| self.lexicon.canonical_name(name))
            .unwrap_or_else(|| self.lexicon.canonical_name(short_name(&hub.uid)));
        let score = HUB_SCORE * strength(hub.count, self.min_cluster());
        Some(Candidate::new(RuleId::MetadataHub, display, score))
    }

    fn priority_suffix(&self, cased: &[String]) -> Option<Candidate> {
        let last = cased.last()?;
        let canonical = self.priority_suffixes.get(&self.lexicon.fold_token(last))?;
        Some(Candidate::new(
            RuleId::PrioritySuffix,
            canonical.clone(),
            PRIORITY_SUFFIX_SCORE,
        ))
    }

    fn strong_prefix(&self, cased: &[String]) -> Option<Candidate> {
        let first = cased.first()?;
        let freq = &self.analysis.frequency;
        freq.top_prefixes.contains(first).then(|| {
            let score = STRONG_PREFIX_SCORE * freq.prefix_strength(first, self.min_cluster());
            Candidate::new(RuleId::StrongPrefix, first.clone(), score)
        })
    }

    fn strong_suffix(&self, cased: &[String]) -> Option<Candidate> {
        let last = cased.last()?;
        let freq = &self.analysis.frequency;
        freq.strong_suffixes.contains(last).then(|| {
            let score = STRONG_SUFFIX_SCORE * freq.suffix_strength(last, self.min_cluster());
            Candidate::new(RuleId::StrongSuffix, last.clone(), score)
        })
    }

    /// One candidate per bucket with a whole-token hit.
    fn keyword(&self, cased: &[String]) -> Vec<Candidate> {
        if self.keywords.is_empty() {
            return Vec::new();
        }
        let folded: BTreeSet<String> = cased.iter().map(|t| self.lexicon.fold_token(t)).collect();
        self.keywords
            .iter()
            .filter(|(_, words)| !words.is_disjoint(&folded))
            .map(|(bucket, _)| Candidate::new(RuleId::Keyword, bucket.clone(), KEYWORD_SCORE))
            .collect()
    }

    fn type_family(&self, cased: &[String]) -> Option<Candidate> {
        let min_family = self.config.thresholds.min_family_size;
        let (stem, count) = self
            .analysis
            .frequency
            .family_stem(cased, self.lexicon, min_family)?;
        let score = TYPE_FAMILY_SCORE * strength(count, min_family);
        Some(Candidate::new(RuleId::TypeFamily, stem, score))
    }
}
