//! Per-context state: fingers, channels, polyphony groups, and the
//! note+channel ledgers. Mirrors `struct Fretless_context` field for
//! field, with `NOBODY` sentinels replaced by `Option<FingerId>`.

use crate::constants::{BEND_CENTER, CHANNEL_MAX, FINGER_MAX, NOTE_MAX, POLY_MAX};

pub type FingerId = usize;
pub type ChannelId = usize;
pub type PolyId = usize;

/// `Fretless_context.ctxState` as an enum instead of a magic int.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Init,
    Booted,
}

/// One logical continuous touch.
#[derive(Debug, Clone, Copy)]
pub struct FingerState {
    pub on: bool,
    pub suppressed: bool,
    pub channel: ChannelId,
    pub note: i32,
    pub bend: i32,
    pub velocity: i32,
    pub poly_group: Option<PolyId>,
    pub visiting_poly_group: Option<PolyId>,
    pub next_in_poly: Option<FingerId>,
    pub prev_in_poly: Option<FingerId>,
    pub next_in_channel: Option<FingerId>,
    pub prev_in_channel: Option<FingerId>,
}

impl Default for FingerState {
    fn default() -> Self {
        Self {
            on: false,
            suppressed: false,
            channel: 0,
            note: 0,
            bend: BEND_CENTER,
            velocity: 0,
            poly_group: None,
            visiting_poly_group: None,
            next_in_poly: None,
            prev_in_poly: None,
            next_in_channel: None,
            prev_in_channel: None,
        }
    }
}

/// One MIDI channel as privately managed by the encoder.
#[derive(Debug, Clone, Copy)]
pub struct ChannelState {
    pub last_bend: i32,
    pub last_aftertouch: i32,
    pub current_finger: Option<FingerId>,
    pub use_count: i32,
}

impl Default for ChannelState {
    fn default() -> Self {
        Self {
            last_bend: BEND_CENTER,
            last_aftertouch: 0,
            current_finger: None,
            use_count: 0,
        }
    }
}

/// One polyphony/legato group.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolyState {
    pub current_finger: Option<FingerId>,
}

/// The complete, re-entrant state of one encoder context.
///
/// Every field here is owned by value — there is no process-wide state,
/// matching the "global state -> injected context" design note.
pub struct EncoderState {
    pub fingers: [FingerState; FINGER_MAX],
    pub channels: [ChannelState; CHANNEL_MAX],
    pub polys: [PolyState; POLY_MAX],
    pub ctx_state: ContextState,
    /// Seed for channel rotation. Holds `channel_base - 1` after boot so the
    /// first allocation lands on the lowest channel of the span, then tracks
    /// whichever channel index was last handed out.
    pub last_allocated_channel: i32,
    pub fingers_down_count: i32,
    pub note_channel_down_count: [[i32; CHANNEL_MAX]; NOTE_MAX],
    pub note_channel_down_raw_balance: [[i32; CHANNEL_MAX]; NOTE_MAX],
    pub channel_base: i32,
    pub channel_span: i32,
    pub channel_bend_semis: i32,
    pub suppress_bends: bool,
}

impl Default for EncoderState {
    fn default() -> Self {
        Self {
            fingers: [FingerState::default(); FINGER_MAX],
            channels: [ChannelState::default(); CHANNEL_MAX],
            polys: [PolyState::default(); POLY_MAX],
            ctx_state: ContextState::Init,
            last_allocated_channel: 0,
            fingers_down_count: 0,
            note_channel_down_count: [[0; CHANNEL_MAX]; NOTE_MAX],
            note_channel_down_raw_balance: [[0; CHANNEL_MAX]; NOTE_MAX],
            channel_base: 0,
            channel_span: 8,
            channel_bend_semis: 2,
            suppress_bends: false,
        }
    }
}
