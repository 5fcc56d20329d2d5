//! XP / Level progression

use crate::types::Progress;

const BASE_THRESHOLD: u32 = 100;
const THRESHOLD_STEP: u32 = 50;

/// XP needed to leave `level`: 100 + (level - 1) * 50.
pub fn xp_for_level(level: u32) -> u32 {
    BASE_THRESHOLD.saturating_add((level.max(1) - 1).saturating_mul(THRESHOLD_STEP))
}

pub fn award_xp(quality: u8) -> u32 {
    match quality {
        5 => 20,
        4 => 15,
        3 => 10,
        2 => 5,
        _ => 0,
    }
}

/// Adds XP and levels up as many times as the total allows.
pub fn apply_xp(level: u32, current_xp: u32, gained: u32) -> Progress {
    let mut level = level.max(1);
    let mut xp = current_xp.saturating_add(gained);

    while xp >= xp_for_level(level) {
        xp -= xp_for_level(level);
        level += 1;
    }

    Progress {
        level,
        current_xp: xp,
        xp_for_next_level: xp_for_level(level),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thresholds() {
        assert_eq!(xp_for_level(0), 100);
        assert_eq!(xp_for_level(1), 100);
        assert_eq!(xp_for_level(3), 200);
    }

    #[test]
    fn test_award_by_quality() {
        let awards: Vec<u32> = (0..=5).map(award_xp).collect();
        assert_eq!(awards, vec![0, 0, 5, 10, 15, 20]);
    }

    #[test]
    fn test_single_level_up() {
        let progress = apply_xp(1, 90, 20);
        assert_eq!(
            progress,
            Progress {
                level: 2,
                current_xp: 10,
                xp_for_next_level: 150
            }
        );
    }

    #[test]
    fn test_multi_level_jump() {
        // 100 + 150 + 200 = 450
        let progress = apply_xp(1, 0, 460);
        assert_eq!(progress.level, 4);
        assert_eq!(progress.current_xp, 10);
        assert_eq!(progress.xp_for_next_level, 250);
    }

    #[test]
    fn test_no_level_up() {
        let progress = apply_xp(2, 10, 0);
        assert_eq!(progress.level, 2);
        assert_eq!(progress.current_xp, 10);
    }
}
