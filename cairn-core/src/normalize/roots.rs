use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::resolve::Resolution;
use crate::text::boundaries::{from_sanitized_tokens, token_offsets};
use crate::text::{Boundaries, Lexicon, Projection, sanitize};
use crate::types::{ClusterKey, Item, ItemId};

/// A named cluster during normalization.
#[derive(Debug, Clone)]
pub struct Root {
    /// Highest-precedence key among the members' winning keys.
    pub key: ClusterKey,
    pub normalized_name: String,
    pub sanitized_name: String,
    /// First cased token of the key; merges only happen within a scope.
    pub scope_token: String,
    /// Cased tokens of the normalized name.
    pub tokens: Vec<String>,
    pub boundaries: Boundaries,
    pub projection: Option<Projection>,
    pub members: BTreeSet<ItemId>,
    pub is_pinned: bool,
}

impl Root {
    pub fn size(&self) -> usize {
        self.members.len()
    }

    /// Sanitized-space offset for a normalized-space prefix length. Roots
    /// without a character map clamp to the sanitized length.
    pub fn project_prefix(&self, len: usize) -> usize {
        match &self.projection {
            Some(p) => p.project(len),
            None => len.min(self.sanitized_name.chars().count()),
        }
    }
}

/// Arena of roots indexed by position, sorted by normalized name.
#[derive(Debug, Clone, Default)]
pub struct RootArena {
    pub roots: Vec<Root>,
    by_name: BTreeMap<String, usize>,
}

impl RootArena {
    /// Group heuristic winners into roots keyed by normalized name. Cache,
    /// override and Misc winners never form roots.
    pub fn build(
        resolutions: &[Resolution],
        items: &BTreeMap<&ItemId, &Item>,
        lexicon: &Lexicon,
        pinned: &BTreeSet<String>,
    ) -> Self {
        let mut groups: BTreeMap<String, (ClusterKey, BTreeSet<ItemId>)> = BTreeMap::new();
        for r in resolutions.iter().filter(|r| r.forms_root()) {
            let name = lexicon.canonical_name(&r.winner.key.value);
            let entry = groups
                .entry(name)
                .or_insert_with(|| (r.winner.key.clone(), BTreeSet::new()));
            if r.winner.key < entry.0 {
                entry.0 = r.winner.key.clone();
            }
            entry.1.insert(r.uid.clone());
        }

        let mut arena = Self::default();
        for (name, (key, members)) in groups {
            let root = build_root(name, key, members, items, lexicon, pinned);
            if !root.boundaries.is_known() {
                debug!(root = %root.normalized_name, "Token boundaries unknown");
            }
            arena.by_name.insert(root.normalized_name.clone(), arena.roots.len());
            arena.roots.push(root);
        }
        arena
    }

    pub fn lookup(&self, normalized: &str) -> Option<usize> {
        self.by_name.get(normalized).copied()
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

fn build_root(
    normalized_name: String,
    key: ClusterKey,
    members: BTreeSet<ItemId>,
    items: &BTreeMap<&ItemId, &Item>,
    lexicon: &Lexicon,
    pinned: &BTreeSet<String>,
) -> Root {
    let tokens = lexicon.cased(&lexicon.tokenize(&key.value));
    let sanitized_name = sanitize(&normalized_name);
    let offsets = if tokens.concat() == normalized_name {
        token_offsets(&tokens)
    } else {
        BTreeSet::from([0, normalized_name.chars().count()])
    };

    let projection = Projection::build(&normalized_name, &sanitized_name);
    let boundaries = match &projection {
        Some(p) => Boundaries::Known(p.project_all(&offsets)),
        None => escape_hatch(&members, items, lexicon, &sanitized_name),
    };

    Root {
        scope_token: tokens
            .first()
            .cloned()
            .unwrap_or_else(|| normalized_name.clone()),
        is_pinned: pinned.contains(&normalized_name),
        key,
        normalized_name,
        sanitized_name,
        tokens,
        boundaries,
        projection,
        members,
    }
}

/// When the character map fails, members that all share one token list
/// can still supply boundaries through per-token sanitization.
fn escape_hatch(
    members: &BTreeSet<ItemId>,
    items: &BTreeMap<&ItemId, &Item>,
    lexicon: &Lexicon,
    sanitized: &str,
) -> Boundaries {
    let mut lists = members
        .iter()
        .filter_map(|uid| items.get(uid))
        .map(|item| &item.tokens);
    let Some(first) = lists.next() else {
        return Boundaries::Unknown;
    };
    if lists.any(|other| other != first) {
        return Boundaries::Unknown;
    }
    from_sanitized_tokens(&lexicon.cased(first), sanitized)
        .map_or(Boundaries::Unknown, Boundaries::Known)
}
