//! Daily Review Queue
//!
//! Deterministic queue assembly: overdue items first, then never-seen items,
//! then the least consolidated items as reinforcement.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::types::StudyItem;

pub fn build_daily_review_queue(
    items: &[StudyItem],
    now: DateTime<Utc>,
    limit: usize,
) -> Vec<StudyItem> {
    if items.is_empty() || limit == 0 {
        return Vec::new();
    }

    let mut queue: Vec<StudyItem> = Vec::with_capacity(limit.min(items.len()));
    let mut taken: HashSet<&str> = HashSet::new();

    let mut due: Vec<&StudyItem> = items
        .iter()
        .filter(|item| item.next_review_at.is_some_and(|at| at <= now))
        .collect();
    due.sort_by_key(|item| item.next_review_at);

    let mut reinforcement: Vec<&StudyItem> = items.iter().collect();
    reinforcement.sort_by_key(|item| item.sm2.interval);

    let candidates = due
        .into_iter()
        .chain(items.iter().filter(|item| item.is_new()))
        .chain(reinforcement);

    for item in candidates {
        if queue.len() >= limit {
            break;
        }
        if taken.insert(item.id.as_str()) {
            queue.push(item.clone());
        }
    }

    queue
}
