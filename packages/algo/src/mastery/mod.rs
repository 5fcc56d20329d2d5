//! Mastery Model
//!
//! Per-concept confidence/stability layer aligned to the active knowledge
//! graph. The layer is rebuilt from the graph's node list whenever the graph
//! changes and updated once per answered item.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{MasteryLayer, MasteryState, StudyItem, SCORE_MAX, SCORE_MIN};

const CONFIDENCE_STEP: f64 = 10.0;
const STABILITY_SMOOTHING: f64 = 0.7;
const STABILITY_SCALE: f64 = 20.0;
const MASTERED_CONFIDENCE: f64 = 90.0;

/// Prefix of ids assigned by the local fallback generator.
pub const FALLBACK_ITEM_PREFIX: &str = "ige-fallback-";

pub(crate) fn clamp_score(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(SCORE_MIN, SCORE_MAX)
    } else {
        SCORE_MIN
    }
}

/// Builds one entry per node, in node order. Stored entries are kept (last
/// one wins on duplicate ids), missing nodes start at 0/0/null and entries for
/// nodes that left the graph are dropped.
pub fn normalize_mastery_layer<'a, I>(node_ids: I, stored: Option<&[MasteryState]>) -> MasteryLayer
where
    I: IntoIterator<Item = &'a str>,
{
    let stored_map: HashMap<&str, &MasteryState> = stored
        .unwrap_or_default()
        .iter()
        .map(|state| (state.node_id.as_str(), state))
        .collect();

    node_ids
        .into_iter()
        .map(|id| match stored_map.get(id) {
            Some(existing) => MasteryState {
                node_id: id.to_string(),
                confidence_score: clamp_score(existing.confidence_score),
                stability_index: clamp_score(existing.stability_index),
                last_interaction_at: existing.last_interaction_at,
            },
            None => MasteryState::new(id),
        })
        .collect()
}

pub fn confidence_adjustment(quality: u8) -> f64 {
    match quality {
        q if q >= 4 => CONFIDENCE_STEP,
        q if q <= 2 => -CONFIDENCE_STEP,
        _ => 0.0,
    }
}

/// Stability implied by an SM-2 interval: `log2(interval + 1) * 20`, clamped.
pub fn stability_from_interval(interval: u32) -> f64 {
    clamp_score(((interval as f64 + 1.0).log2() * STABILITY_SCALE).round())
}

/// Updates one entry after an answered item. `interval` is the item's
/// post-review SM-2 interval.
pub fn update_mastery_state(
    state: &MasteryState,
    quality: u8,
    interval: u32,
    now: DateTime<Utc>,
) -> MasteryState {
    let confidence = clamp_score(clamp_score(state.confidence_score) + confidence_adjustment(quality));
    let stability_raw = stability_from_interval(interval);
    let stability = clamp_score(
        (STABILITY_SMOOTHING * clamp_score(state.stability_index)
            + (1.0 - STABILITY_SMOOTHING) * stability_raw)
            .round(),
    );

    MasteryState {
        node_id: state.node_id.clone(),
        confidence_score: confidence,
        stability_index: stability,
        last_interaction_at: Some(now),
    }
}

/// Returns the updated layer, or `None` when `node_id` has no entry.
pub fn apply_review(
    layer: &[MasteryState],
    node_id: &str,
    quality: u8,
    interval: u32,
    now: DateTime<Utc>,
) -> Option<MasteryLayer> {
    let index = layer.iter().position(|state| state.node_id == node_id)?;
    let mut updated = layer.to_vec();
    updated[index] = update_mastery_state(&layer[index], quality, interval, now);
    Some(updated)
}

/// Resolves the concept an item was generated from.
///
/// Uses `sourceNodeId` when it names a graph node, otherwise tries the id
/// layout of fallback-generated items (`ige-fallback-{node}-{i}-{millis}`).
pub fn resolve_source_node(item: &StudyItem, node_ids: &HashSet<&str>) -> Option<String> {
    if let Some(source) = item.source_node_id.as_deref() {
        if node_ids.contains(source) {
            return Some(source.to_string());
        }
    }

    let rest = item.id.strip_prefix(FALLBACK_ITEM_PREFIX)?;
    let mut parts = rest.rsplitn(3, '-');
    let _millis = parts.next()?;
    let _index = parts.next()?;
    let candidate = parts.next()?;
    node_ids.contains(candidate).then(|| candidate.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterySummary {
    pub node_count: usize,
    pub average_confidence: f64,
    pub average_stability: f64,
    pub mastered_count: usize,
    pub unseen_count: usize,
}

pub fn mastery_summary(layer: &[MasteryState]) -> MasterySummary {
    let node_count = layer.len();
    if node_count == 0 {
        return MasterySummary {
            node_count: 0,
            average_confidence: 0.0,
            average_stability: 0.0,
            mastered_count: 0,
            unseen_count: 0,
        };
    }

    let n = node_count as f64;
    MasterySummary {
        node_count,
        average_confidence: layer.iter().map(|s| clamp_score(s.confidence_score)).sum::<f64>() / n,
        average_stability: layer.iter().map(|s| clamp_score(s.stability_index)).sum::<f64>() / n,
        mastered_count: layer
            .iter()
            .filter(|s| s.confidence_score >= MASTERED_CONFIDENCE)
            .count(),
        unseen_count: layer.iter().filter(|s| s.last_interaction_at.is_none()).count(),
    }
}
