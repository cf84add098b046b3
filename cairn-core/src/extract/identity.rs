//! Identity assignment: supplied uids are kept, missing ones are synthesized
//! from (kind, full name) and flagged weak.

use std::collections::BTreeSet;

use tracing::warn;

use crate::digest::short_hash;
use crate::types::{FailureReason, ItemId, ItemKind};

/// Hands out unique ids in record order.
#[derive(Debug, Default)]
pub struct IdentityAssigner {
    /// Every uid supplied anywhere in the input.
    reserved: BTreeSet<String>,
    taken: BTreeSet<String>,
    pub synthetic: usize,
    pub collisions: usize,
}

impl IdentityAssigner {
    /// Reserve supplied uids up front so a synthetic id never shadows a
    /// real one that appears later in the input.
    pub fn with_reserved<'a>(uids: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            reserved: uids.into_iter().map(str::to_string).collect(),
            ..Self::default()
        }
    }

    pub fn assign(
        &mut self,
        uid: Option<&str>,
        kind: ItemKind,
        full_name: &str,
        source: &str,
    ) -> (ItemId, Vec<FailureReason>) {
        if let Some(uid) = uid.map(str::trim).filter(|u| !u.is_empty()) {
            if self.taken.insert(uid.to_string()) {
                return (ItemId::from(uid), Vec::new());
            }
            return self.suffixed(uid, source, vec![FailureReason::IdentityCollision]);
        }

        self.synthetic += 1;
        let base = format!("{kind}:{full_name}");
        if !self.reserved.contains(&base) && self.taken.insert(base.clone()) {
            return (ItemId(base), vec![FailureReason::WeakIdentity]);
        }
        self.suffixed(
            &base,
            source,
            vec![FailureReason::WeakIdentity, FailureReason::IdentityCollision],
        )
    }

    fn suffixed(
        &mut self,
        base: &str,
        source: &str,
        reasons: Vec<FailureReason>,
    ) -> (ItemId, Vec<FailureReason>) {
        self.collisions += 1;
        let hashed = format!("{base}~{}", short_hash(source));
        let mut candidate = hashed.clone();
        let mut counter = 2;
        while self.reserved.contains(&candidate) || !self.taken.insert(candidate.clone()) {
            candidate = format!("{hashed}~{counter}");
            counter += 1;
        }
        warn!(base = %base, id = %candidate, source = %source, "Identity collision repaired");
        (ItemId(candidate), reasons)
    }
}
