use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

// ── Identity ───────────────────────────────────────────────────────

/// Primary identity of an item. Either the extractor-supplied uid or a
/// weak synthetic id derived from `(kind, full_name)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub String);

impl ItemId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ItemId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ── Items ──────────────────────────────────────────────────────────

/// Type kinds that participate in clustering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Class,
    Struct,
    Interface,
    Enum,
    Delegate,
}

impl ItemKind {
    /// Parse an extractor kind string. Non-type kinds (namespaces, members)
    /// return `None`.
    pub fn parse(kind: &str) -> Option<Self> {
        match kind.trim().to_ascii_lowercase().as_str() {
            "class" => Some(Self::Class),
            "struct" => Some(Self::Struct),
            "interface" => Some(Self::Interface),
            "enum" => Some(Self::Enum),
            "delegate" => Some(Self::Delegate),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Class => "class",
            Self::Struct => "struct",
            Self::Interface => "interface",
            Self::Enum => "enum",
            Self::Delegate => "delegate",
        }
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable record of one type in the flat namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub uid: ItemId,
    /// Short name as shown in the namespace (`BigBadWolf`, ``List`1``).
    pub name: String,
    pub full_name: String,
    pub kind: ItemKind,
    /// Raw tokens in tokenizer order.
    pub tokens: Vec<String>,
    /// Immediate base type uid, if any.
    pub base_type: Option<String>,
    pub interfaces: BTreeSet<String>,
    /// True when `uid` was synthesized rather than supplied.
    pub weak_id: bool,
    /// Manifest the record came from.
    pub source: Option<String>,
}

// ── Rules ──────────────────────────────────────────────────────────

/// Rules of the resolver chain, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleId {
    Cache,
    Override,
    MetadataHub,
    PrioritySuffix,
    StrongPrefix,
    StrongSuffix,
    Keyword,
    TypeFamily,
    Misc,
}

impl RuleId {
    /// Reroute tiers, in the order suppressed items test them. Type families
    /// are not reroute targets.
    pub const REROUTE_TIERS: [RuleId; 5] = [
        RuleId::MetadataHub,
        RuleId::PrioritySuffix,
        RuleId::StrongSuffix,
        RuleId::StrongPrefix,
        RuleId::Keyword,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::Override => "override",
            Self::MetadataHub => "metadata_hub",
            Self::PrioritySuffix => "priority_suffix",
            Self::StrongPrefix => "strong_prefix",
            Self::StrongSuffix => "strong_suffix",
            Self::Keyword => "keyword",
            Self::TypeFamily => "type_family",
            Self::Misc => "misc",
        }
    }

    /// Suffix clusters split oversized folders on the token preceding the
    /// root token; every other cluster splits on the following token.
    pub fn is_suffix_rule(self) -> bool {
        matches!(self, Self::PrioritySuffix | Self::StrongSuffix)
    }
}

impl std::fmt::Display for RuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `{rule_id}:{normalized_value}`: how and why a root exists.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClusterKey {
    pub rule: RuleId,
    pub value: String,
}

impl ClusterKey {
    pub fn new(rule: RuleId, value: impl Into<String>) -> Self {
        Self {
            rule,
            value: value.into(),
        }
    }

    pub fn misc() -> Self {
        Self::new(RuleId::Misc, "Misc")
    }
}

impl std::fmt::Display for ClusterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.rule, self.value)
    }
}

/// A rule that matched an item, with its report score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub key: ClusterKey,
    /// In `[0, 1]`. Informational only: precedence is positional.
    pub score: f64,
}

impl Candidate {
    pub fn new(rule: RuleId, value: impl Into<String>, score: f64) -> Self {
        Self {
            key: ClusterKey::new(rule, value),
            score: score.clamp(0.0, 1.0),
        }
    }

    pub fn rule(&self) -> RuleId {
        self.key.rule
    }
}

// ── Recoverable conditions ─────────────────────────────────────────

/// Reason codes for recovered conditions, attached to report entries so a
/// decision can be reconstructed from the report alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The uid was synthesized from `(kind, full_name)`.
    WeakIdentity,
    /// The synthetic uid collided and was suffixed with a source hash.
    IdentityCollision,
    /// The item's initial root could not project token boundaries.
    BoundariesUnknown,
    /// The item's post-merge root was not kept.
    RootSuppressed,
    /// Rerouting found no kept candidate.
    ReroutedToMisc,
    /// Rerouting kept the cached path under the stability bias.
    StabilityKept,
    /// Two files collided; the later one was hash-suffixed.
    FileCollision,
    /// A file collided with a folder and was renamed to `_Page`.
    FolderFileCollision,
    /// The item's folder collided with another root's folder.
    FolderCollision,
}

impl FailureReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WeakIdentity => "weak_identity",
            Self::IdentityCollision => "identity_collision",
            Self::BoundariesUnknown => "boundaries_unknown",
            Self::RootSuppressed => "root_suppressed",
            Self::ReroutedToMisc => "rerouted_to_misc",
            Self::StabilityKept => "stability_kept",
            Self::FileCollision => "file_collision",
            Self::FolderFileCollision => "folder_file_collision",
            Self::FolderCollision => "folder_collision",
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
