//! Pitch -> (note, bend) mapping. Pure functions, no context mutation.

use crate::constants::{BEND_CENTER, BEND_MAX};
use crate::state::FingerState;

fn limit(low: i32, val: i32, high: i32) -> i32 {
    if val < low {
        return low;
    }
    if val > high {
        return high;
    }
    val
}

/// Map a real-valued note to the nearest 12-ET integer note plus the 14-bit
/// bend needed to reach it exactly, given a channel bend width in semitones.
pub fn fnote_to_note_bend(fnote: f32, bend_semis: i32) -> (i32, i32) {
    let note = fnote.round_ties_even() as i32;
    let float_bend = fnote - note as f32;
    let bend = (BEND_CENTER as f32 + float_bend * BEND_CENTER as f32 / bend_semis as f32) as i32;
    (note, bend)
}

/// Map a real-valued note relative to a finger's existing note, reusing the
/// integer note if the bend stays in range. Falls back to a fresh
/// `fnote_to_note_bend` pair when the bend would saturate — this is the
/// bend-saturation retrigger gate.
pub fn fnote_bend_from_existing(fnote: f32, bend_semis: i32, existing: &FingerState) -> (i32, i32) {
    let note = existing.note;
    let float_bend = fnote - note as f32;
    let bend = (BEND_CENTER as f32 + float_bend * BEND_CENTER as f32 / bend_semis as f32) as i32;
    if !(0..BEND_MAX).contains(&bend) {
        fnote_to_note_bend(fnote, bend_semis)
    } else {
        (note, bend)
    }
}

/// Clamp a velocity-like value into `[low, high]`.
pub fn limit_val(low: i32, val: i32, high: i32) -> i32 {
    limit(low, val, high)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centered_note_has_no_bend() {
        let (note, bend) = fnote_to_note_bend(60.0, 2);
        assert_eq!(note, 60);
        assert_eq!(bend, BEND_CENTER);
    }

    #[test]
    fn quarter_semitone_up_bends_half_range() {
        // fnote=60.5, semis=2: floatBend=0.5, bend = 8192 + 0.5*8192/2 = 10240
        let (note, bend) = fnote_to_note_bend(60.5, 2);
        assert_eq!(note, 60);
        assert_eq!(bend, 10240);
    }

    #[test]
    fn downward_bend_truncates_the_whole_expression_not_the_product() {
        // fnote=59.99, semis=2: floatBend=-0.01, bend = 8192 + (-0.01*8192/2) = 8150.96 -> 8151.
        // Truncating the product alone before adding the center would give 8152.
        let (note, bend) = fnote_to_note_bend(59.99, 2);
        assert_eq!(note, 60);
        assert_eq!(bend, 8151);
    }

    #[test]
    fn bend_from_existing_reuses_note_in_range() {
        let existing = FingerState {
            note: 60,
            ..FingerState::default()
        };
        let (note, bend) = fnote_bend_from_existing(61.0, 2, &existing);
        // floatBend = 1.0, bend = 8192 + 1.0*8192/2 = 12288, within [0, 16384)
        assert_eq!(note, 60);
        assert_eq!(bend, 12288);
    }

    #[test]
    fn bend_from_existing_retriggers_on_saturation() {
        let existing = FingerState {
            note: 60,
            ..FingerState::default()
        };
        // fnote far enough from 60 that bend exits [0, 16384) at semis=2
        let (note, bend) = fnote_bend_from_existing(63.0, 2, &existing);
        assert_eq!(note, 63);
        assert_eq!(bend, BEND_CENTER);
    }
}
