//! # savant-algo - adaptive learning decision core
//!
//! Pure, deterministic functions that decide what a learner should study
//! next. Every operation takes `now` explicitly; nothing here reads the clock,
//! touches storage or performs I/O.
//!
//! ## Modules
//!
//! - [`srs`] - SM-2 scheduling and due-item selection
//! - [`mastery`] - per-concept confidence/stability layer
//! - [`weak_nodes`] - ranking of struggling concepts
//! - [`review`] - daily review queue assembly
//! - [`poe`] - pedagogical orchestration (session directive)
//! - [`xp`] - XP awards and level progression
//! - [`graph`] - knowledge graph validation and cycle handling
//! - [`activity`] - activity log construction and pruning
//! - [`generation`] - local fallback item synthesis
//! - [`export`] - Anki and JSON export, JSON import
//! - [`sanitize`] - raw JSON to typed snapshot coercion
//! - [`types`] - shared types and constants
//!
//! ## Example
//!
//! ```rust
//! use chrono::Utc;
//! use savant_algo::{calculate_sm2, Sm2State};
//!
//! let outcome = calculate_sm2(&Sm2State::default(), 5.0, Utc::now());
//! assert_eq!(outcome.state.interval, 1);
//! ```

pub mod activity;
pub mod export;
pub mod generation;
pub mod graph;
pub mod mastery;
pub mod poe;
pub mod review;
pub mod sanitize;
pub mod srs;
pub mod types;
pub mod weak_nodes;
pub mod xp;

pub use types::*;

pub use activity::prune_activity;
pub use export::{format_anki_txt, format_json, parse_json, ImportError};
pub use generation::{fallback_for_directive, fallback_items, targets_for_directive};
pub use graph::{is_valid_graph_id, node_labels, validate_graph, CyclePolicy, GraphError, GraphRepair, ValidatedGraph};
pub use mastery::{
    apply_review, mastery_summary, normalize_mastery_layer, resolve_source_node, update_mastery_state,
    MasterySummary,
};
pub use poe::compute_directive;
pub use review::build_daily_review_queue;
pub use srs::{calculate_sm2, clamp_quality, get_due_study_items, is_due, review_item, Sm2Outcome};
pub use weak_nodes::compute_weak_nodes;
pub use xp::{apply_xp, award_xp, xp_for_level};
