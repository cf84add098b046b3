use std::collections::BTreeSet;

use serde::{Serialize, Serializer};

use super::sanitizer::sanitize;

/// Token edges of a root's sanitized name.
///
/// `Unknown` answers "no" to every membership test, so guards that rely on
/// boundaries fail closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Boundaries {
    Known(BTreeSet<usize>),
    Unknown,
}

impl Boundaries {
    pub fn contains(&self, offset: usize) -> bool {
        match self {
            Self::Known(set) => set.contains(&offset),
            Self::Unknown => false,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Self::Known(_))
    }
}

impl Serialize for Boundaries {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Known(set) => set.serialize(serializer),
            Self::Unknown => serializer.serialize_none(),
        }
    }
}

/// Character map from normalized offsets to sanitized offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    /// `map[k]` is the sanitized offset of the first retained character at
    /// or after normalized offset `k`; `map[len]` is the sanitized length.
    map: Vec<usize>,
}

impl Projection {
    /// Build the map in one pass. Returns `None` if sanitization did more
    /// than delete characters (e.g. a hash fallback).
    pub fn build(normalized: &str, sanitized: &str) -> Option<Self> {
        let norm: Vec<char> = normalized.chars().collect();
        let san: Vec<char> = sanitized.chars().collect();

        let mut retained = vec![None; norm.len()];
        let mut s = 0;
        for (n, c) in norm.iter().enumerate() {
            if san.get(s).is_some_and(|sc| sc.eq_ignore_ascii_case(c)) {
                retained[n] = Some(s);
                s += 1;
            }
        }
        if s != san.len() {
            return None;
        }

        let mut map = vec![san.len(); norm.len() + 1];
        for k in (0..norm.len()).rev() {
            map[k] = retained[k].unwrap_or(map[k + 1]);
        }
        Some(Self { map })
    }

    /// Project a normalized offset; offsets past the end clamp to the
    /// sanitized length.
    pub fn project(&self, offset: usize) -> usize {
        let last = self.map.len() - 1;
        self.map[offset.min(last)]
    }

    pub fn project_all(&self, offsets: &BTreeSet<usize>) -> BTreeSet<usize> {
        let mut out: BTreeSet<usize> = offsets.iter().map(|&k| self.project(k)).collect();
        out.insert(0);
        out.insert(self.map[self.map.len() - 1]);
        out
    }
}

/// Cumulative character offsets of `tokens`, including 0 and the total.
pub fn token_offsets<S: AsRef<str>>(tokens: &[S]) -> BTreeSet<usize> {
    let mut offsets = BTreeSet::from([0]);
    let mut acc = 0;
    for token in tokens {
        acc += token.as_ref().chars().count();
        offsets.insert(acc);
    }
    offsets
}

/// Boundaries taken directly from per-token sanitization, used when the
/// character map cannot be built. Fails if the sanitized tokens do not
/// concatenate to `sanitized`.
pub fn from_sanitized_tokens<S: AsRef<str>>(tokens: &[S], sanitized: &str) -> Option<BTreeSet<usize>> {
    let pieces: Vec<String> = tokens.iter().map(|t| sanitize(t.as_ref())).collect();
    (pieces.concat() == sanitized).then(|| token_offsets(&pieces))
}

/// Length in characters of the longest shared prefix.
pub fn common_prefix_len(a: &str, b: &str) -> usize {
    a.chars().zip(b.chars()).take_while(|(x, y)| x == y).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_projection() {
        let p = Projection::build("BigBadWolf", "BigBadWolf").unwrap();
        let offsets = token_offsets(&["Big", "Bad", "Wolf"]);
        assert_eq!(p.project_all(&offsets), BTreeSet::from([0, 3, 6, 10]));
    }

    #[test]
    fn removed_characters_shift_offsets() {
        // "Story:" + "Node" sanitizes to "StoryNode".
        let p = Projection::build("Story:Node", "StoryNode").unwrap();
        assert_eq!(p.project(6), 5);
        assert_eq!(p.project(5), 5);
        assert_eq!(p.project(10), 9);
        assert_eq!(p.project(99), 9);
    }

    #[test]
    fn projection_fails_on_rewrite() {
        assert!(Projection::build("Con", &sanitize("Con")).is_none());
    }

    #[test]
    fn boundaries_always_include_ends() {
        let p = Projection::build("AB", "AB").unwrap();
        let set = p.project_all(&BTreeSet::new());
        assert!(set.contains(&0));
        assert!(set.contains(&2));
    }

    #[test]
    fn sanitized_token_escape_hatch() {
        assert_eq!(
            from_sanitized_tokens(&["Big", "Bad"], "BigBad"),
            Some(BTreeSet::from([0, 3, 6]))
        );
        assert_eq!(from_sanitized_tokens(&["Big", "Bad"], "BigBadWolf"), None);
    }

    #[test]
    fn unknown_fails_closed() {
        assert!(!Boundaries::Unknown.contains(0));
        assert!(Boundaries::Known(BTreeSet::from([0, 4])).contains(4));
    }

    #[test]
    fn common_prefix() {
        assert_eq!(common_prefix_len("Inventory", "InventoryItem"), 9);
        assert_eq!(common_prefix_len("Story", "Stone"), 3);
        assert_eq!(common_prefix_len("", "X"), 0);
    }

    mod proptests {
        use super::*;
        use crate::text::sanitizer::is_reserved;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(200))]

            #[test]
            fn projection_is_monotonic_and_bounded(name in "[A-Za-z0-9:#]{1,20}") {
                let sanitized = sanitize(&name);
                if let Some(p) = Projection::build(&name, &sanitized) {
                    let len = sanitized.chars().count();
                    let mut prev = 0;
                    for k in 0..=name.chars().count() {
                        let v = p.project(k);
                        prop_assert!(v >= prev);
                        prop_assert!(v <= len);
                        prev = v;
                    }
                    prop_assert_eq!(p.project(name.chars().count()), len);
                }
            }

            #[test]
            fn known_boundaries_contain_ends(tokens in proptest::collection::vec("[A-Z][a-z]{0,5}", 1..5)) {
                let normalized = tokens.concat();
                prop_assume!(!is_reserved(&normalized));
                let sanitized = sanitize(&normalized);
                let p = Projection::build(&normalized, &sanitized).unwrap();
                let set = p.project_all(&token_offsets(&tokens));
                prop_assert!(set.contains(&0));
                prop_assert!(set.contains(&sanitized.chars().count()));
            }
        }
    }
}
