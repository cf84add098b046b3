//! Name handling: tokenization, casing, sanitization and boundary
//! projection between normalized and sanitized names.

pub mod boundaries;
pub mod sanitizer;
pub mod tokenizer;

use std::collections::{BTreeMap, BTreeSet};

use crate::config::ClusterConfig;

pub use boundaries::{Boundaries, Projection};
pub use sanitizer::sanitize;
pub use tokenizer::Tokenizer;

/// Tokenizer plus the casing and stop-token tables from a config.
#[derive(Debug, Clone)]
pub struct Lexicon {
    tokenizer: Tokenizer,
    /// Lowercased acronym → canonical spelling.
    acronyms: BTreeMap<String, String>,
    idioms: BTreeSet<String>,
    /// Lowercased sanitized stop tokens.
    stop_tokens: BTreeSet<String>,
}

impl Default for Lexicon {
    fn default() -> Self {
        Self::from_config(&ClusterConfig::default())
    }
}

impl Lexicon {
    pub fn from_config(config: &ClusterConfig) -> Self {
        let acronyms = config
            .acronyms
            .iter()
            .map(|a| (a.to_ascii_lowercase(), a.clone()))
            .collect();
        let mut lexicon = Self {
            tokenizer: Tokenizer::new(&config.rules.idioms),
            acronyms,
            idioms: config.rules.idioms.iter().cloned().collect(),
            stop_tokens: BTreeSet::new(),
        };
        lexicon.stop_tokens = config
            .rules
            .stop_tokens
            .iter()
            .map(|t| lexicon.fold_token(t))
            .collect();
        lexicon
    }

    pub fn tokenize(&self, name: &str) -> Vec<String> {
        self.tokenizer.tokenize(name)
    }

    /// Acronyms take their canonical spelling, idioms and all-caps tokens
    /// keep theirs, everything else gets an uppercase first letter.
    pub fn case_token(&self, token: &str) -> String {
        if let Some(canonical) = self.acronyms.get(&token.to_ascii_lowercase()) {
            return canonical.clone();
        }
        if self.idioms.contains(token) || is_all_caps(token) {
            return token.to_string();
        }
        let mut chars = token.chars();
        match chars.next() {
            Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
            None => String::new(),
        }
    }

    pub fn cased<S: AsRef<str>>(&self, tokens: &[S]) -> Vec<String> {
        tokens.iter().map(|t| self.case_token(t.as_ref())).collect()
    }

    /// Cased tokens joined without a separator.
    pub fn normalized_name<S: AsRef<str>>(&self, tokens: &[S]) -> String {
        self.cased(tokens).concat()
    }

    /// Re-tokenize and re-case a free-form name (pinned roots, hub display
    /// names, keyword buckets). Names with no tokens are kept trimmed.
    pub fn canonical_name(&self, raw: &str) -> String {
        let tokens = self.tokenize(raw);
        if tokens.is_empty() {
            raw.trim().to_string()
        } else {
            self.normalized_name(&tokens)
        }
    }

    /// Stop tokens compare after casing and sanitization, case-insensitively.
    pub fn is_stop_token(&self, token: &str) -> bool {
        self.stop_tokens.contains(&self.fold_token(token))
    }

    /// Comparison key: cased, sanitized, lowercased.
    pub fn fold_token(&self, token: &str) -> String {
        sanitize(&self.case_token(token)).to_ascii_lowercase()
    }
}

fn is_all_caps(token: &str) -> bool {
    token.chars().count() >= 2
        && token.chars().any(|c| c.is_ascii_uppercase())
        && !token.chars().any(|c| c.is_ascii_lowercase())
}

/// True when `value` is non-empty and entirely ASCII digits.
pub fn is_numeric(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_digit())
}
