//! Common Types and Constants
//!
//! Shared data structures used across all algorithm modules. Field names on
//! the wire follow the persisted snapshot format, so most records carry
//! explicit serde renames.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==================== Constants ====================

/// Lower bound of the SM-2 ease factor
pub const MIN_EFACTOR: f64 = 1.3;

/// Ease factor assigned to freshly created items
pub const DEFAULT_EFACTOR: f64 = 2.5;

/// Highest quality rating accepted by the scheduler
pub const MAX_QUALITY: u8 = 5;

/// Ratings below this value count as a failed recall
pub const PASSING_QUALITY: u8 = 3;

/// Upper bound for a scheduled interval (days)
pub const MAX_INTERVAL_DAYS: u32 = 36_500;

/// Mastery scores live in [0, 100]
pub const SCORE_MIN: f64 = 0.0;
pub const SCORE_MAX: f64 = 100.0;

pub const DEFAULT_QUEUE_LIMIT: usize = 10;
pub const DEFAULT_WEAK_NODE_LIMIT: usize = 5;

/// Rolling window for the activity log
pub const ACTIVITY_RETENTION_DAYS: i64 = 60;
pub const ACTIVITY_MAX_ENTRIES: usize = 3000;

// ==================== Knowledge Graph ====================

fn default_difficulty_weight() -> u8 {
    1
}

/// A single concept extracted from a source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeNode {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub description: String,
    /// Atomic facts, the only ground truth items may be generated from
    #[serde(default)]
    pub content_atoms: Vec<String>,
    /// Ids of nodes that must be understood first
    #[serde(default)]
    pub prerequisites: Vec<String>,
    /// Complexity 1..=5
    #[serde(default = "default_difficulty_weight")]
    pub difficulty_weight: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeGraph {
    pub id: String,
    pub title: String,
    pub nodes: Vec<KnowledgeNode>,
    #[serde(default)]
    pub source_text: String,
    pub created_at: DateTime<Utc>,
}

impl KnowledgeGraph {
    pub fn node(&self, id: &str) -> Option<&KnowledgeNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|node| node.id.as_str())
    }
}

// ==================== Mastery ====================

/// Per-concept confidence and stability, both in [0, 100].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasteryState {
    #[serde(rename = "nodeId")]
    pub node_id: String,
    pub confidence_score: f64,
    pub stability_index: f64,
    pub last_interaction_at: Option<DateTime<Utc>>,
}

impl MasteryState {
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            confidence_score: 0.0,
            stability_index: 0.0,
            last_interaction_at: None,
        }
    }
}

/// All mastery states for one knowledge graph, in graph node order.
pub type MasteryLayer = Vec<MasteryState>;

// ==================== Spaced Repetition ====================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sm2State {
    /// Days until the next review
    pub interval: u32,
    /// Consecutive successful recalls
    pub repetitions: u32,
    /// Ease factor, never below `MIN_EFACTOR`
    pub efactor: f64,
}

impl Default for Sm2State {
    fn default() -> Self {
        Self {
            interval: 0,
            repetitions: 0,
            efactor: DEFAULT_EFACTOR,
        }
    }
}

impl Sm2State {
    pub fn is_valid(&self) -> bool {
        self.efactor.is_finite() && self.efactor >= MIN_EFACTOR
    }
}

// ==================== Study Items ====================

/// Type-specific payload of a study item, tagged by `type` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ItemKind {
    #[serde(rename = "flashcard")]
    Flashcard { answer: String },
    #[serde(rename = "mcq")]
    Mcq {
        options: Vec<String>,
        #[serde(rename = "correctAnswerIndex")]
        correct_answer_index: usize,
    },
    #[serde(rename = "true/false")]
    TrueFalse {
        #[serde(rename = "correctAnswer")]
        correct_answer: bool,
    },
    #[serde(rename = "free")]
    FreeResponse { answer: String },
    #[serde(rename = "case")]
    CaseStudy { answer: String },
}

impl ItemKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Flashcard { .. } => "flashcard",
            Self::Mcq { .. } => "mcq",
            Self::TrueFalse { .. } => "true/false",
            Self::FreeResponse { .. } => "free",
            Self::CaseStudy { .. } => "case",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyItem {
    pub id: String,
    #[serde(flatten)]
    pub kind: ItemKind,
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default = "default_difficulty_weight")]
    pub difficulty: u8,
    #[serde(default)]
    pub sm2: Sm2State,
    #[serde(default)]
    pub last_reviewed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub next_review_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_quality: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_node_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_atoms: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub atom_coverage: Option<f64>,
}

impl StudyItem {
    pub fn new(id: impl Into<String>, kind: ItemKind, question: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            question: question.into(),
            explanation: None,
            difficulty: default_difficulty_weight(),
            sm2: Sm2State::default(),
            last_reviewed_at: None,
            next_review_at: None,
            tags: Vec::new(),
            last_quality: None,
            source_node_id: None,
            source_atoms: Vec::new(),
            atom_coverage: None,
        }
    }

    /// Never reviewed.
    pub fn is_new(&self) -> bool {
        self.last_reviewed_at.is_none()
    }

    /// Clears scheduling state, as done when an item enters the collection.
    pub fn reset_schedule(&mut self) {
        self.sm2 = Sm2State::default();
        self.last_reviewed_at = None;
        self.next_review_at = None;
        self.last_quality = None;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudySet {
    pub id: String,
    pub title: String,
    pub items: Vec<StudyItem>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_text: Option<String>,
}

// ==================== Activity ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Review,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewMode {
    DailyReview,
    Session,
}

impl ReviewMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DailyReview" => Some(Self::DailyReview),
            "Session" => Some(Self::Session),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEvent {
    pub ts: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub item_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<ReviewMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gained_xp: Option<u32>,
}

// ==================== Orchestration ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionMode {
    Review,
    Expansion,
    Remediation,
    Socratic,
}

impl SessionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Review => "Review",
            Self::Expansion => "Expansion",
            Self::Remediation => "Remediation",
            Self::Socratic => "Socratic",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PedagogicalDirective {
    pub mode: SessionMode,
    pub target_node_ids: Vec<String>,
    /// 1..=5
    pub intensity: u8,
    pub max_items: usize,
    pub rationale: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionType {
    Sprint,
    DeepWork,
    Maintenance,
    Recovery,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSignals {
    /// Minutes
    pub time_available: f64,
    pub energy_level: Level,
    pub stress_level: Level,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserContext {
    /// Cognitive availability, 1..=100
    pub focus_score: u8,
    pub session_type: SessionType,
    #[serde(default)]
    pub state_description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signals: Option<UserSignals>,
}

impl UserContext {
    pub fn energy_level(&self) -> Option<Level> {
        self.signals.as_ref().map(|s| s.energy_level)
    }
}

// ==================== Analytics ====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeakNodeInsight {
    pub node_id: String,
    pub label: String,
    pub confidence: f64,
    pub stability: f64,
    pub errors_7d: u32,
    pub priority: f64,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub level: u32,
    pub current_xp: u32,
    pub xp_for_next_level: u32,
}

impl Default for Progress {
    fn default() -> Self {
        Self {
            level: 1,
            current_xp: 0,
            xp_for_next_level: crate::xp::xp_for_level(1),
        }
    }
}
