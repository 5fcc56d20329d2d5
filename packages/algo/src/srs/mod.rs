//! SM-2 Spaced Repetition
//!
//! Pure scheduling functions. Out-of-range input is coerced rather than
//! rejected: quality is clamped to an integer in [0, 5] and a corrupt stored
//! state restarts from `Sm2State::default()`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Sm2State, StudyItem, MAX_INTERVAL_DAYS, MAX_QUALITY, MIN_EFACTOR, PASSING_QUALITY};

/// Result of one scheduling step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sm2Outcome {
    #[serde(flatten)]
    pub state: Sm2State,
    pub next_review_at: DateTime<Utc>,
}

/// Clamps a raw rating to an integer quality in [0, 5]. NaN and infinities map to 0.
pub fn clamp_quality(quality: f64) -> u8 {
    if !quality.is_finite() {
        return 0;
    }
    quality.round().clamp(0.0, MAX_QUALITY as f64) as u8
}

pub fn calculate_sm2(state: &Sm2State, quality: f64, now: DateTime<Utc>) -> Sm2Outcome {
    let quality = clamp_quality(quality);
    let Sm2State {
        mut interval,
        mut repetitions,
        mut efactor,
    } = if state.is_valid() {
        *state
    } else {
        Sm2State::default()
    };

    if quality < PASSING_QUALITY {
        repetitions = 0;
        interval = 1;
    } else {
        let miss = (MAX_QUALITY - quality) as f64;
        efactor = (efactor + (0.1 - miss * (0.08 + miss * 0.02))).max(MIN_EFACTOR);
        repetitions = repetitions.saturating_add(1);

        interval = match repetitions {
            1 => 1,
            2 => 6,
            _ => {
                let next = (interval as f64 * efactor).round();
                next.clamp(1.0, MAX_INTERVAL_DAYS as f64) as u32
            }
        };
    }

    Sm2Outcome {
        state: Sm2State {
            interval,
            repetitions,
            efactor,
        },
        next_review_at: add_days(now, interval),
    }
}

fn add_days(now: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    now.checked_add_signed(Duration::days(days as i64))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Applies a rating to an item and stamps its review timestamps.
pub fn review_item(item: &StudyItem, quality: f64, now: DateTime<Utc>) -> StudyItem {
    let outcome = calculate_sm2(&item.sm2, quality, now);
    let mut reviewed = item.clone();
    reviewed.sm2 = outcome.state;
    reviewed.last_reviewed_at = Some(now);
    reviewed.next_review_at = Some(outcome.next_review_at);
    reviewed.last_quality = Some(clamp_quality(quality));
    reviewed
}

/// An item without a scheduled review, or one whose review time has passed.
pub fn is_due(item: &StudyItem, now: DateTime<Utc>) -> bool {
    match item.next_review_at {
        None => true,
        Some(at) => at <= now,
    }
}

pub fn get_due_study_items(items: &[StudyItem], now: DateTime<Utc>) -> Vec<StudyItem> {
    items.iter().filter(|item| is_due(item, now)).cloned().collect()
}
