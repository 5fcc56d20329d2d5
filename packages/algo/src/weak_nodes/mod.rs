//! Weak-Node Detection
//!
//! Flags concepts that need attention, either because their mastery is low on
//! both axes or because they keep producing errors.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::types::{ActivityEvent, MasteryState, WeakNodeInsight};

const CONFIDENCE_TARGET: f64 = 60.0;
const STABILITY_TARGET: f64 = 40.0;
const CRITICAL_CONFIDENCE: f64 = 40.0;
const ERROR_QUALITY_MAX: u8 = 2;
const ERROR_STREAK_MIN: u32 = 2;
const ERROR_PENALTY: f64 = 15.0;
const ERROR_WINDOW_DAYS: i64 = 7;

/// Counts failed answers (quality <= 2) per node over the last 7 days.
pub fn recent_errors(activity: &[ActivityEvent], now: DateTime<Utc>) -> HashMap<String, u32> {
    let window_start = now - Duration::days(ERROR_WINDOW_DAYS);
    let mut errors: HashMap<String, u32> = HashMap::new();

    for event in activity {
        let (Some(node_id), Some(quality)) = (event.node_id.as_ref(), event.quality) else {
            continue;
        };
        if quality <= ERROR_QUALITY_MAX && event.ts > window_start {
            *errors.entry(node_id.clone()).or_insert(0) += 1;
        }
    }

    errors
}

pub fn compute_weak_nodes(
    mastery: &[MasteryState],
    activity: &[ActivityEvent],
    node_labels: &HashMap<String, String>,
    now: DateTime<Utc>,
    limit: usize,
) -> Vec<WeakNodeInsight> {
    let errors = recent_errors(activity, now);

    let mut weak: Vec<WeakNodeInsight> = mastery
        .iter()
        .filter_map(|state| {
            let errors_7d = errors.get(&state.node_id).copied().unwrap_or(0);
            let low_mastery = state.confidence_score < CONFIDENCE_TARGET
                && state.stability_index < STABILITY_TARGET;
            let error_prone = errors_7d >= ERROR_STREAK_MIN;
            if !low_mastery && !error_prone {
                return None;
            }

            let priority = (CONFIDENCE_TARGET - state.confidence_score).max(0.0)
                + (STABILITY_TARGET - state.stability_index).max(0.0)
                + errors_7d as f64 * ERROR_PENALTY;

            let reason = if error_prone {
                format!("{errors_7d} erreurs récentes")
            } else if state.confidence_score < CRITICAL_CONFIDENCE {
                "Maîtrise critique".to_string()
            } else {
                "Faible rétention".to_string()
            };

            let label = node_labels
                .get(&state.node_id)
                .filter(|label| !label.is_empty())
                .cloned()
                .unwrap_or_else(|| state.node_id.clone());

            Some(WeakNodeInsight {
                node_id: state.node_id.clone(),
                label,
                confidence: state.confidence_score,
                stability: state.stability_index,
                errors_7d,
                priority,
                reason,
            })
        })
        .collect();

    weak.sort_by(|a, b| b.priority.total_cmp(&a.priority));
    weak.truncate(limit);
    weak
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ActivityKind;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 8, 0, 0).unwrap()
    }

    fn state(id: &str, confidence: f64, stability: f64) -> MasteryState {
        MasteryState {
            node_id: id.to_string(),
            confidence_score: confidence,
            stability_index: stability,
            last_interaction_at: None,
        }
    }

    fn failure(node: &str, days_ago: i64) -> ActivityEvent {
        ActivityEvent {
            ts: now() - Duration::days(days_ago),
            kind: ActivityKind::Review,
            item_id: format!("item-{node}"),
            node_id: Some(node.to_string()),
            quality: Some(1),
            mode: None,
            gained_xp: Some(0),
        }
    }

    #[test]
    fn test_low_mastery_is_weak() {
        let mastery = vec![state("a", 10.0, 10.0), state("b", 80.0, 80.0)];
        let weak = compute_weak_nodes(&mastery, &[], &HashMap::new(), now(), 5);

        assert_eq!(weak.len(), 1);
        assert_eq!(weak[0].node_id, "a");
        assert_eq!(weak[0].label, "a");
        assert_eq!(weak[0].priority, 80.0);
        assert_eq!(weak[0].reason, "Maîtrise critique");
    }

    #[test]
    fn test_recent_errors_flag_strong_node() {
        let mastery = vec![state("a", 85.0, 70.0)];
        let activity = vec![failure("a", 1), failure("a", 3), failure("a", 10)];
        let labels = HashMap::from([("a".to_string(), "Alpha".to_string())]);
        let weak = compute_weak_nodes(&mastery, &activity, &labels, now(), 5);

        assert_eq!(weak.len(), 1);
        assert_eq!(weak[0].errors_7d, 2);
        assert_eq!(weak[0].priority, 30.0);
        assert_eq!(weak[0].reason, "2 erreurs récentes");
        assert_eq!(weak[0].label, "Alpha");
    }

    #[test]
    fn test_low_retention_reason() {
        let weak = compute_weak_nodes(&[state("a", 50.0, 30.0)], &[], &HashMap::new(), now(), 5);
        assert_eq!(weak[0].reason, "Faible rétention");
        assert_eq!(weak[0].priority, 20.0);
    }

    #[test]
    fn test_sorted_and_limited() {
        let mastery = vec![
            state("mild", 55.0, 35.0),
            state("worst", 0.0, 0.0),
            state("mid", 30.0, 20.0),
        ];
        let weak = compute_weak_nodes(&mastery, &[], &HashMap::new(), now(), 2);
        let ids: Vec<&str> = weak.iter().map(|w| w.node_id.as_str()).collect();
        assert_eq!(ids, vec!["worst", "mid"]);
    }

    #[test]
    fn test_ignores_passes_and_unattributed_events() {
        let mut pass = failure("a", 1);
        pass.quality = Some(4);
        let mut anonymous = failure("a", 1);
        anonymous.node_id = None;
        let errors = recent_errors(&[pass, anonymous], now());
        assert!(errors.is_empty());
    }
}
