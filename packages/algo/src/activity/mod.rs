//! Activity log helpers

use chrono::{DateTime, Duration, Utc};

use crate::types::{ActivityEvent, ActivityKind, ReviewMode};

impl ActivityEvent {
    pub fn review(
        ts: DateTime<Utc>,
        item_id: impl Into<String>,
        node_id: Option<String>,
        quality: u8,
        mode: Option<ReviewMode>,
        gained_xp: u32,
    ) -> Self {
        Self {
            ts,
            kind: ActivityKind::Review,
            item_id: item_id.into(),
            node_id,
            quality: Some(quality),
            mode,
            gained_xp: Some(gained_xp),
        }
    }
}

/// Keeps events inside the retention window, capped to the newest
/// `max_entries`, in chronological order.
pub fn prune_activity(
    log: &[ActivityEvent],
    now: DateTime<Utc>,
    retention_days: i64,
    max_entries: usize,
) -> Vec<ActivityEvent> {
    let cutoff = now - Duration::days(retention_days.max(0));
    let mut kept: Vec<ActivityEvent> = log.iter().filter(|e| e.ts >= cutoff).cloned().collect();
    kept.sort_by_key(|e| e.ts);
    if kept.len() > max_entries {
        kept.drain(..kept.len() - max_entries);
    }
    kept
}
