//! Data Sanitization
//!
//! Converts raw persisted JSON into typed snapshots. Nothing here fails:
//! malformed fields are coerced to safe defaults and unusable records are
//! dropped, so the scheduling code downstream only ever sees valid state.
//!
//! Functions:
//! - Timestamp parsing
//! - SM-2 state, mastery layer, study items
//! - Activity log and progress

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value};

use crate::mastery::clamp_score;
use crate::srs::clamp_quality;
use crate::types::{
    ActivityEvent, ActivityKind, ItemKind, MasteryLayer, MasteryState, Progress, ReviewMode, Sm2State,
    StudyItem, MAX_INTERVAL_DAYS, MIN_EFACTOR,
};
use crate::xp::apply_xp;

const MIN_DIFFICULTY: f64 = 1.0;
const MAX_DIFFICULTY: f64 = 5.0;

/// Parses RFC 3339, falling back to naive date-times and plain dates (UTC).
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn timestamp_field(obj: &Map<String, Value>, key: &str) -> Option<DateTime<Utc>> {
    obj.get(key).and_then(Value::as_str).and_then(parse_timestamp)
}

fn finite_field(obj: &Map<String, Value>, key: &str) -> Option<f64> {
    obj.get(key).and_then(Value::as_f64).filter(|v| v.is_finite())
}

fn string_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_string)
}

fn non_empty_string_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    string_field(obj, key).filter(|s| !s.trim().is_empty())
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|list| list.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

fn quality_field(obj: &Map<String, Value>, key: &str) -> Option<u8> {
    obj.get(key).and_then(Value::as_f64).map(clamp_quality)
}

// ==================== SM-2 ====================

/// Any unusable field resets the whole state to `{0, 0, 2.5}`.
pub fn sanitize_sm2(value: &Value) -> Sm2State {
    let Some(obj) = value.as_object() else {
        return Sm2State::default();
    };

    let interval = finite_field(obj, "interval").filter(|v| *v >= 0.0);
    let repetitions = finite_field(obj, "repetitions").filter(|v| *v >= 0.0);
    let efactor = finite_field(obj, "efactor").filter(|v| *v >= MIN_EFACTOR);

    match (interval, repetitions, efactor) {
        (Some(interval), Some(repetitions), Some(efactor)) => Sm2State {
            interval: interval.round().min(MAX_INTERVAL_DAYS as f64) as u32,
            repetitions: repetitions.round().min(u32::MAX as f64) as u32,
            efactor,
        },
        _ => Sm2State::default(),
    }
}

// ==================== Mastery ====================

fn score_field(obj: &Map<String, Value>, key: &str) -> f64 {
    clamp_score(obj.get(key).and_then(Value::as_f64).unwrap_or(0.0))
}

pub fn sanitize_mastery_layer(value: &Value) -> MasteryLayer {
    let Some(entries) = value.as_array() else {
        return MasteryLayer::new();
    };

    entries
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|obj| {
            let node_id = string_field(obj, "nodeId")?;
            Some(MasteryState {
                node_id,
                confidence_score: score_field(obj, "confidence_score"),
                stability_index: score_field(obj, "stability_index"),
                last_interaction_at: timestamp_field(obj, "last_interaction_at"),
            })
        })
        .collect()
}

// ==================== Study Items ====================

fn sanitize_kind(obj: &Map<String, Value>) -> ItemKind {
    let answer = string_field(obj, "answer");
    let degraded = || ItemKind::Flashcard {
        answer: String::new(),
    };

    match obj.get("type").and_then(Value::as_str) {
        Some("mcq") => {
            let options = string_list(obj.get("options"));
            match obj.get("correctAnswerIndex").and_then(Value::as_u64) {
                Some(index) if (index as usize) < options.len() => ItemKind::Mcq {
                    options,
                    correct_answer_index: index as usize,
                },
                _ => degraded(),
            }
        }
        Some("true/false") => match obj.get("correctAnswer").and_then(Value::as_bool) {
            Some(correct_answer) => ItemKind::TrueFalse { correct_answer },
            None => degraded(),
        },
        Some("free") => answer.map_or_else(degraded, |answer| ItemKind::FreeResponse { answer }),
        Some("case") => answer.map_or_else(degraded, |answer| ItemKind::CaseStudy { answer }),
        _ => answer.map_or_else(degraded, |answer| ItemKind::Flashcard { answer }),
    }
}

fn sanitize_item(obj: &Map<String, Value>) -> Option<StudyItem> {
    let id = non_empty_string_field(obj, "id")?;
    let question = string_field(obj, "question")?;

    let mut item = StudyItem::new(id, sanitize_kind(obj), question);
    item.explanation = string_field(obj, "explanation");
    if let Some(difficulty) = finite_field(obj, "difficulty") {
        item.difficulty = difficulty.round().clamp(MIN_DIFFICULTY, MAX_DIFFICULTY) as u8;
    }
    item.sm2 = obj.get("sm2").map(sanitize_sm2).unwrap_or_default();
    item.last_reviewed_at = timestamp_field(obj, "lastReviewedAt");
    item.next_review_at = timestamp_field(obj, "nextReviewAt");
    item.tags = string_list(obj.get("tags"));
    item.last_quality = quality_field(obj, "lastQuality");
    item.source_node_id = non_empty_string_field(obj, "sourceNodeId");
    item.source_atoms = string_list(obj.get("sourceAtoms"));
    item.atom_coverage = finite_field(obj, "atomCoverage").map(|c| c.clamp(0.0, 1.0));
    Some(item)
}

pub fn sanitize_items(value: &Value) -> Vec<StudyItem> {
    value
        .as_array()
        .map(|entries| entries.iter().filter_map(Value::as_object).filter_map(sanitize_item).collect())
        .unwrap_or_default()
}

// ==================== Activity ====================

fn sanitize_event(obj: &Map<String, Value>) -> Option<ActivityEvent> {
    let ts = timestamp_field(obj, "ts")?;
    let item_id = non_empty_string_field(obj, "itemId")?;

    Some(ActivityEvent {
        ts,
        kind: ActivityKind::Review,
        item_id,
        node_id: non_empty_string_field(obj, "nodeId"),
        quality: quality_field(obj, "quality"),
        mode: obj.get("mode").and_then(Value::as_str).and_then(ReviewMode::parse),
        gained_xp: finite_field(obj, "gainedXp").map(|xp| xp.max(0.0).round().min(u32::MAX as f64) as u32),
    })
}

pub fn sanitize_activity(value: &Value) -> Vec<ActivityEvent> {
    value
        .as_array()
        .map(|entries| entries.iter().filter_map(Value::as_object).filter_map(sanitize_event).collect())
        .unwrap_or_default()
}

// ==================== Progress ====================

fn whole_number(value: Option<f64>) -> u32 {
    value.map_or(0.0, |v| v.max(0.0).round().min(u32::MAX as f64)) as u32
}

/// Level below 1 becomes 1, negative XP becomes 0, and overflowing XP is
/// carried into further levels.
pub fn sanitize_progress(value: &Value) -> Progress {
    let Some(obj) = value.as_object() else {
        return Progress::default();
    };
    let level = whole_number(finite_field(obj, "level")).max(1);
    let current_xp = whole_number(finite_field(obj, "currentXp"));
    apply_xp(level, current_xp, 0)
}
