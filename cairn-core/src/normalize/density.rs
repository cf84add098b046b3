use std::collections::{BTreeMap, BTreeSet};

use tracing::info;

use crate::config::OverflowStrategy;
use crate::text::{Lexicon, is_numeric};
use crate::types::{Item, ItemId};

use super::roots::Root;

/// More distinct token keys than this sends the whole root to letters.
pub const MAX_TOKEN_SUBFOLDERS: usize = 50;
/// Bucket for names that do not start with an ASCII letter.
pub const NON_LETTER_BUCKET: &str = "_";

/// Split an oversized root one level deep. Returns the subfolder name of
/// every member; nothing is left unassigned.
pub fn split_root(
    root: &Root,
    members: &[&Item],
    lexicon: &Lexicon,
    strategy: OverflowStrategy,
) -> BTreeMap<ItemId, String> {
    let keys: Vec<(&Item, Option<String>)> = members
        .iter()
        .map(|item| (*item, neighbor_token(root, item, lexicon)))
        .collect();
    let distinct: BTreeSet<&String> = keys.iter().filter_map(|(_, k)| k.as_ref()).collect();
    let by_letter =
        strategy == OverflowStrategy::Letter || distinct.len() > MAX_TOKEN_SUBFOLDERS;

    info!(
        root = %root.normalized_name,
        members = members.len(),
        token_keys = distinct.len(),
        by_letter,
        "Splitting oversized root"
    );

    keys.into_iter()
        .map(|(item, key)| {
            let sub = match key {
                Some(token) if !by_letter => token,
                Some(token) => letter_bucket(&token),
                None => letter_bucket(remainder(root, item)),
            };
            (item.uid.clone(), sub)
        })
        .collect()
}

/// The token after the root's tokens (or before them, for suffix roots),
/// unless it is a stop token or a number.
fn neighbor_token(root: &Root, item: &Item, lexicon: &Lexicon) -> Option<String> {
    let cased = lexicon.cased(&item.tokens);
    let folded: Vec<String> = cased.iter().map(|t| lexicon.fold_token(t)).collect();
    let window: Vec<String> = root.tokens.iter().map(|t| lexicon.fold_token(t)).collect();
    if window.is_empty() || window.len() > folded.len() {
        return None;
    }

    let mut starts = 0..=folded.len() - window.len();
    let matches = |&i: &usize| folded[i..i + window.len()] == window[..];
    let neighbor = if root.key.rule.is_suffix_rule() {
        let start = starts.rev().find(matches)?;
        start.checked_sub(1)?
    } else {
        let start = starts.find(matches)?;
        start + window.len()
    };

    let token = cased.get(neighbor)?;
    (!lexicon.is_stop_token(token) && !is_numeric(token)).then(|| token.clone())
}

/// The item name without the root name, when the root name sits at either
/// end of it.
fn remainder<'a>(root: &Root, item: &'a Item) -> &'a str {
    let name = item.name.as_str();
    let root_len = root.normalized_name.len();
    if name.len() > root_len && name.is_char_boundary(root_len) {
        let (head, tail) = name.split_at(root_len);
        if head.eq_ignore_ascii_case(&root.normalized_name) {
            return tail;
        }
    }
    let cut = name.len().saturating_sub(root_len);
    if cut > 0 && name.is_char_boundary(cut) {
        let (head, tail) = name.split_at(cut);
        if tail.eq_ignore_ascii_case(&root.normalized_name) {
            return head;
        }
    }
    name
}

fn letter_bucket(source: &str) -> String {
    match source.chars().find(|c| !matches!(c, '_' | '`')) {
        Some(c) if c.is_ascii_alphabetic() => c.to_ascii_uppercase().to_string(),
        _ => NON_LETTER_BUCKET.to_string(),
    }
}
