//! Knowledge entity definitions.
//!
//! Each persisted record has a `New*` counterpart carrying only the
//! caller-supplied fields; the store fills in ids, timestamps, and defaults.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Declares a snake_case string enum with `as_str`, `Display`, and `FromStr`.
macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident { $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            /// SQL-compatible string representation.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(format!(concat!("unknown ", stringify!($name), ": {}"), s)),
                }
            }
        }
    };
}

string_enum!(
    /// Lifecycle of a decision. Superseding happens outside the append path.
    DecisionStatus {
        Active => "active",
        Superseded => "superseded",
    }
);

string_enum!(
    Severity {
        Info => "info",
        Warning => "warning",
        Critical => "critical",
    }
);

string_enum!(
    /// Where a pattern came from: recorded by a person or found by the scanner.
    PatternSource {
        Manual => "manual",
        Detected => "detected",
    }
);

string_enum!(
    FeatureStatus {
        Active => "active",
        Archived => "archived",
    }
);

string_enum!(
    Impact {
        Low => "low",
        Medium => "medium",
        High => "high",
    }
);

impl Default for DecisionStatus {
    fn default() -> Self {
        Self::Active
    }
}

impl Default for Severity {
    fn default() -> Self {
        Self::Warning
    }
}

impl Default for PatternSource {
    fn default() -> Self {
        Self::Manual
    }
}

impl Default for Impact {
    fn default() -> Self {
        Self::Medium
    }
}

// ── Append-only logs ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub alternatives: Vec<String>,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub status: DecisionStatus,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub feature: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewDecision {
    pub content: String,
    pub reason: String,
    pub context: Option<String>,
    pub alternatives: Vec<String>,
    pub author: Option<String>,
    pub status: Option<DecisionStatus>,
    pub tags: Vec<String>,
    pub feature: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warning {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub evidence: Option<String>,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub feature: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewWarning {
    pub content: String,
    pub reason: String,
    pub evidence: Option<String>,
    pub severity: Option<Severity>,
    pub author: Option<String>,
    pub tags: Vec<String>,
    pub feature: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub feature: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewInsight {
    pub content: String,
    pub author: Option<String>,
    pub feature: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub source: PatternSource,
    pub created_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewPattern {
    pub name: String,
    pub description: String,
    pub source: Option<PatternSource>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionEvent {
    pub id: String,
    pub event_type: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub impact: Impact,
    pub timestamp: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewEvolutionEvent {
    pub event_type: String,
    pub title: String,
    pub description: String,
    pub author: Option<String>,
    pub impact: Option<Impact>,
}

// ── Features and conversations ────────────────────────────────────────────────

/// A bounded unit of work. Lives in `features/<id>/` while active and
/// `archive/<id>/` while archived; never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub id: String,
    pub status: FeatureStatus,
    #[serde(default)]
    pub branch: Option<String>,
    /// Parent feature id. Resolution is best effort and cycle-safe.
    #[serde(default)]
    pub extends: Option<String>,
    #[serde(default)]
    pub current_state: String,
    #[serde(default)]
    pub relevant_files: Vec<String>,
    #[serde(default)]
    pub owner: Option<String>,
    pub created_at: String,
    pub last_accessed: String,
    #[serde(default)]
    pub archived_at: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewFeature {
    pub id: String,
    pub branch: Option<String>,
    pub extends: Option<String>,
    pub current_state: String,
    pub relevant_files: Vec<String>,
    pub owner: Option<String>,
}

/// Partial update for an active feature. `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct FeatureUpdate {
    pub current_state: Option<String>,
    pub relevant_files: Option<Vec<String>>,
    pub branch: Option<String>,
    pub owner: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub feature: String,
    pub summary: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub files_discussed: Vec<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewConversation {
    pub summary: String,
    pub key_points: Vec<String>,
    pub files_discussed: Vec<String>,
}

// ── Knowledge graph ───────────────────────────────────────────────────────────

/// A typed reference to any entity (`("decision", "dec-…")`, `("file", "src/lib.rs")`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeRef {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
}

impl NodeRef {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }
}

/// Identity of an edge. `created_at` is deliberately not part of it.
pub type EdgeKey = (String, String, String, String, String);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub from_type: String,
    pub from_id: String,
    pub to_type: String,
    pub to_id: String,
    pub relation: String,
    pub created_at: String,
}

impl Edge {
    pub fn key(&self) -> EdgeKey {
        (
            self.from_type.clone(),
            self.from_id.clone(),
            self.to_type.clone(),
            self.to_id.clone(),
            self.relation.clone(),
        )
    }

    pub fn from_node(&self) -> NodeRef {
        NodeRef::new(&self.from_type, &self.from_id)
    }

    pub fn to_node(&self) -> NodeRef {
        NodeRef::new(&self.to_type, &self.to_id)
    }

    /// True if `node` sits on either end.
    pub fn touches(&self, node: &NodeRef) -> bool {
        (self.from_type == node.kind && self.from_id == node.id)
            || (self.to_type == node.kind && self.to_id == node.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEdge {
    pub from: NodeRef,
    pub to: NodeRef,
    pub relation: String,
}

impl NewEdge {
    pub fn new(from: NodeRef, relation: impl Into<String>, to: NodeRef) -> Self {
        Self {
            from,
            to,
            relation: relation.into(),
        }
    }

    pub fn key(&self) -> EdgeKey {
        (
            self.from.kind.clone(),
            self.from.id.clone(),
            self.to.kind.clone(),
            self.to.id.clone(),
            self.relation.clone(),
        )
    }
}

// ── Scanner output ────────────────────────────────────────────────────────────

/// Per-file summary produced by the external scanner, keyed by path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileIndex {
    pub path: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub exports: Vec<String>,
    #[serde(default)]
    pub imports: Vec<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default)]
    pub content_hash: String,
    pub indexed_at: String,
}

/// Sub-file unit (function, class, block) produced by the scanner. Index-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeChunk {
    pub path: String,
    pub name: String,
    pub kind: String,
    #[serde(default)]
    pub language: Option<String>,
    pub start_line: u32,
    pub end_line: u32,
    pub content: String,
}

/// Project-level singleton stored at `knowledge/project.json`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProjectMeta {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
    #[serde(default, flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}
