use std::collections::BTreeMap;

use serde::Serialize;
use tracing::warn;

use crate::digest::short_hash;
use crate::types::{FailureReason, ItemId};

const PAGE_SUFFIX: &str = "_Page";
const FILE_EXT: &str = ".md";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Folder,
    File,
}

/// A claimed path. Only used to detect collisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathNode {
    pub canonical_path: String,
    pub kind: NodeKind,
    /// Owned by a root, a subfolder or the layout. Unowned folders exist
    /// only as parents of other paths.
    pub owned: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionKind {
    FolderFolder,
    FolderFile,
    FileFile,
}

/// A rename forced by an earlier claim on the same case-folded path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollisionRecord {
    pub kind: CollisionKind,
    pub requested: String,
    pub resolved: String,
    /// Path that already held the name.
    pub holder: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<ItemId>,
}

/// Case-insensitive registry of claimed folders and files.
///
/// A file `X.md` and a folder `X` occupy the same slot, so a page can never
/// shadow a section with the same name.
#[derive(Debug, Clone, Default)]
pub struct PathRegistry {
    nodes: BTreeMap<String, PathNode>,
}

fn slot(path: &str) -> String {
    let lower = path.to_ascii_lowercase();
    lower
        .strip_suffix(FILE_EXT)
        .map_or_else(|| lower.clone(), str::to_string)
}

/// `a/b/Name.md` + `_x` → `a/b/Name_x.md`; folders just get the suffix.
fn with_suffix(path: &str, suffix: &str) -> String {
    match path.strip_suffix(FILE_EXT) {
        Some(stem) => format!("{stem}{suffix}{FILE_EXT}"),
        None => format!("{path}{suffix}"),
    }
}

impl PathRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<&PathNode> {
        self.nodes.get(&slot(path))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Register a folder and its parents without renaming. Slots that are
    /// already taken are left alone.
    pub fn ensure_folder(&mut self, path: &str) {
        let mut prefix = String::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(segment);
            self.nodes.entry(slot(&prefix)).or_insert_with(|| PathNode {
                canonical_path: prefix.clone(),
                kind: NodeKind::Folder,
                owned: false,
            });
        }
    }

    /// Register a layout folder that no root may take over.
    pub fn reserve_folder(&mut self, path: &str) {
        self.ensure_folder(path);
        if let Some(node) = self.nodes.get_mut(&slot(path)) {
            node.owned = true;
        }
    }

    fn ensure_parent(&mut self, path: &str) {
        if let Some((parent, _)) = path.rsplit_once('/') {
            self.ensure_folder(parent);
        }
    }

    /// First free variant of `base`, counting up from 2.
    fn free_variant(&self, base: &str) -> String {
        if self.get(base).is_none() {
            return base.to_string();
        }
        (2..)
            .map(|n| with_suffix(base, &format!("_{n}")))
            .find(|candidate| self.get(candidate).is_none())
            .unwrap_or_else(|| base.to_string())
    }

    /// Claim a root or subfolder. An unowned parent folder with the same
    /// spelling is adopted; any other holder of the slot renames this
    /// folder with a hash of `seed` (the cluster key).
    pub fn claim_folder(&mut self, path: &str, seed: &str) -> (String, Option<CollisionRecord>) {
        let holder = match self.nodes.get_mut(&slot(path)) {
            None => {
                self.ensure_parent(path);
                self.insert(path, NodeKind::Folder);
                return (path.to_string(), None);
            }
            Some(node)
                if node.kind == NodeKind::Folder && !node.owned && node.canonical_path == path =>
            {
                node.owned = true;
                return (path.to_string(), None);
            }
            Some(node) => node.canonical_path.clone(),
        };
        let resolved = self.free_variant(&with_suffix(path, &format!("_{}", short_hash(seed))));
        warn!(requested = %path, resolved = %resolved, holder = %holder, "Folder collision");
        self.ensure_parent(&resolved);
        self.insert(&resolved, NodeKind::Folder);
        let record = CollisionRecord {
            kind: CollisionKind::FolderFolder,
            requested: path.to_string(),
            resolved: resolved.clone(),
            holder,
            uid: None,
        };
        (resolved, Some(record))
    }

    /// Claim a file for `uid`.
    ///
    /// Against a folder the file becomes `{Name}_Page.md`, and if that is
    /// taken too it gets a hash of the folder path. Against a file it gets a
    /// hash of the uid.
    pub fn claim_file(
        &mut self,
        path: &str,
        uid: &ItemId,
    ) -> (String, Option<CollisionRecord>, Vec<FailureReason>) {
        let Some(holder) = self.get(path).cloned() else {
            self.ensure_parent(path);
            self.insert(path, NodeKind::File);
            return (path.to_string(), None, Vec::new());
        };

        let mut reasons = Vec::new();
        let (kind, candidate) = match holder.kind {
            NodeKind::Folder => {
                reasons.push(FailureReason::FolderFileCollision);
                let paged = with_suffix(path, PAGE_SUFFIX);
                if self.get(&paged).is_some() {
                    reasons.push(FailureReason::FileCollision);
                    let hash = short_hash(&holder.canonical_path);
                    (CollisionKind::FolderFile, with_suffix(&paged, &format!("_{hash}")))
                } else {
                    (CollisionKind::FolderFile, paged)
                }
            }
            NodeKind::File => {
                reasons.push(FailureReason::FileCollision);
                let hash = short_hash(uid.as_str());
                (CollisionKind::FileFile, with_suffix(path, &format!("_{hash}")))
            }
        };
        let resolved = self.free_variant(&candidate);
        warn!(
            uid = %uid,
            requested = %path,
            resolved = %resolved,
            holder = %holder.canonical_path,
            "File collision"
        );
        self.ensure_parent(&resolved);
        self.insert(&resolved, NodeKind::File);
        let record = CollisionRecord {
            kind,
            requested: path.to_string(),
            resolved: resolved.clone(),
            holder: holder.canonical_path,
            uid: Some(uid.clone()),
        };
        (resolved, Some(record), reasons)
    }

    fn insert(&mut self, path: &str, kind: NodeKind) {
        self.nodes.insert(
            slot(path),
            PathNode {
                canonical_path: path.to_string(),
                kind,
                owned: true,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_beats_file_with_page_suffix() {
        let mut reg = PathRegistry::new();
        reg.claim_folder("Global/Story", "strong_prefix:Story");
        let (path, record, reasons) = reg.claim_file("Global/story.md", &ItemId::from("U1"));
        assert_eq!(path, "Global/story_Page.md");
        assert_eq!(record.unwrap().kind, CollisionKind::FolderFile);
        assert_eq!(reasons, vec![FailureReason::FolderFileCollision]);
        assert_eq!(reg.get("GLOBAL/STORY").unwrap().kind, NodeKind::Folder);
    }

    #[test]
    fn page_collision_cascades_to_folder_hash() {
        let mut reg = PathRegistry::new();
        reg.claim_folder("Global/Story", "k");
        reg.claim_file("Global/Story_Page.md", &ItemId::from("A"));
        let (path, _, reasons) = reg.claim_file("Global/Story.md", &ItemId::from("B"));
        assert_eq!(
            path,
            format!("Global/Story_Page_{}.md", short_hash("Global/Story"))
        );
        assert_eq!(
            reasons,
            vec![FailureReason::FolderFileCollision, FailureReason::FileCollision]
        );
    }

    #[test]
    fn file_file_collision_uses_uid_hash() {
        let mut reg = PathRegistry::new();
        reg.claim_file("Global/Misc/Zorp.md", &ItemId::from("A"));
        let (path, record, _) = reg.claim_file("Global/Misc/ZORP.md", &ItemId::from("B"));
        assert_eq!(path, format!("Global/Misc/ZORP_{}.md", short_hash("B")));
        let record = record.unwrap();
        assert_eq!(record.holder, "Global/Misc/Zorp.md");
        assert_eq!(record.uid, Some(ItemId::from("B")));
    }

    #[test]
    fn folder_folder_collision_hashes_cluster_key() {
        let mut reg = PathRegistry::new();
        assert_eq!(reg.claim_folder("Global/Audio", "a").0, "Global/Audio");
        let (path, record) = reg.claim_folder("Global/AUDIO", "keyword:AUDIO");
        assert_eq!(path, format!("Global/AUDIO_{}", short_hash("keyword:AUDIO")));
        assert_eq!(record.unwrap().kind, CollisionKind::FolderFolder);
    }

    #[test]
    fn parent_folders_are_adopted_only_with_the_same_spelling() {
        let mut reg = PathRegistry::new();
        reg.ensure_folder("Global/Story");
        let (path, record) = reg.claim_folder("Global/Story", "strong_prefix:Story");
        assert_eq!(path, "Global/Story");
        assert!(record.is_none());
        assert!(reg.get("Global/Story").unwrap().owned);

        let (path, record) = reg.claim_folder("Global/STORY", "keyword:STORY");
        assert_eq!(path, format!("Global/STORY_{}", short_hash("keyword:STORY")));
        assert_eq!(record.unwrap().holder, "Global/Story");

        reg.ensure_folder("Global/quest");
        let (path, record) = reg.claim_folder("Global/Quest", "strong_prefix:Quest");
        assert_eq!(path, format!("Global/Quest_{}", short_hash("strong_prefix:Quest")));
        assert_eq!(record.unwrap().kind, CollisionKind::FolderFolder);
    }

    #[test]
    fn reserved_folders_are_never_adopted() {
        let mut reg = PathRegistry::new();
        reg.reserve_folder("Global/Misc");
        assert!(!reg.get("Global").unwrap().owned);
        let (path, record) = reg.claim_folder("Global/Misc", "strong_prefix:Misc");
        assert_ne!(path, "Global/Misc");
        assert!(record.is_some());
    }

    #[test]
    fn ensure_folder_registers_parents_once() {
        let mut reg = PathRegistry::new();
        reg.ensure_folder("Global/TypeFamilies/Wolf");
        reg.ensure_folder("global/typefamilies");
        assert_eq!(reg.len(), 3);
        assert_eq!(
            reg.get("global/typefamilies").unwrap().canonical_path,
            "Global/TypeFamilies"
        );
    }
}
