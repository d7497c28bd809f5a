//! Encoder core (C6) and self-test/recovery (C7): orchestrates the
//! channel allocator, polyphony linker, and pitch mapper into the MIDI
//! byte stream that drives a multi-timbral receiver.

use crate::constants::{
    split_14bit, BEND_CENTER, CHANNEL_MAX, FINGER_MAX, LEGATO_NONE, LEGATO_ON_UP, LEGATO_ON_UP_DOWN,
    MIDI_CHANNEL_PRESSURE, MIDI_CONTROL_CHANGE, MIDI_NOTE_ON, MIDI_PITCH_BEND, NOTE_MAX, NOTE_TIE_NRPN, POLY_MAX,
};
use crate::pitch::{fnote_bend_from_existing, fnote_to_note_bend, limit_val};
use crate::sink::{put_bytes, ByteSink, Diagnostics};
use crate::state::{ContextState, EncoderState, FingerId, PolyId};

/// Owns one fully independent gesture-to-MIDI context: fixed-size finger,
/// channel and poly pools, the note+channel ledgers, and the injected
/// byte sink / diagnostics capabilities.
///
/// A process may hold any number of these; there is no shared mutable
/// state between contexts.
pub struct GestureEncoder<S: ByteSink, D: Diagnostics> {
    pub(crate) sink: S,
    pub(crate) diagnostics: D,
    pub(crate) state: EncoderState,
}

impl<S: ByteSink, D: Diagnostics> GestureEncoder<S, D> {
    pub fn new(sink: S, diagnostics: D) -> Self {
        Self {
            sink,
            diagnostics,
            state: EncoderState::default(),
        }
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    fn check_finger(&mut self, finger: FingerId) -> bool {
        if finger >= FINGER_MAX {
            self.diagnostics.fail(&format!("finger out of range {finger}"));
            false
        } else {
            true
        }
    }

    fn check_poly(&mut self, poly_group: PolyId) -> bool {
        if poly_group >= POLY_MAX {
            self.diagnostics.fail(&format!("poly group out of range {poly_group}"));
            false
        } else {
            true
        }
    }

    fn check_fnote(&mut self, fnote: f32) -> bool {
        if !(-0.5..127.5).contains(&fnote) {
            self.diagnostics.fail(&format!("fnote out of range {fnote}"));
            false
        } else {
            true
        }
    }

    fn check_booted(&mut self) -> bool {
        if self.state.ctx_state != ContextState::Booted {
            self.diagnostics.fail("context is not booted yet");
            false
        } else {
            true
        }
    }

    // ---- hints (preserved across boot) ----

    pub fn channel_base(&self) -> i32 {
        self.state.channel_base
    }

    pub fn channel_span(&self) -> i32 {
        self.state.channel_span
    }

    pub fn channel_bend_semis(&self) -> i32 {
        self.state.channel_bend_semis
    }

    pub fn set_suppress_bends(&mut self, suppress: bool) {
        self.state.suppress_bends = suppress;
    }

    pub fn set_channel_base(&mut self, base: i32) {
        if base < 0 || base as usize >= CHANNEL_MAX {
            self.diagnostics.fail(&format!("{base}: base < 0 || base >= CHANNEL_MAX"));
        }
        self.state.channel_base = base;
        if self.state.channel_base + self.state.channel_span > FINGER_MAX as i32 {
            self.state.channel_span = FINGER_MAX as i32 - self.state.channel_base;
        }
    }

    pub fn set_channel_span(&mut self, span: i32) {
        if span < 1 || span as usize > CHANNEL_MAX {
            self.diagnostics.fail(&format!("{span}: span < 1 || span > CHANNEL_MAX"));
        }
        self.state.channel_span = span;
        if self.state.channel_base + self.state.channel_span > FINGER_MAX as i32 {
            self.state.channel_span = FINGER_MAX as i32 - self.state.channel_base;
        }
    }

    /// Set the bend-width hint. If already booted, immediately re-emits the
    /// RPN bend-range bytes on every channel in the span — call this after
    /// `boot` to push the new width to the device.
    pub fn set_channel_bend_semis(&mut self, semitones: i32) {
        if !(1..=24).contains(&semitones) {
            self.diagnostics.fail(&format!(
                "{semitones}: semitones < 1 || semitones > 24 -- MIDI spec limits to 24"
            ));
        }
        self.state.channel_bend_semis = semitones;
        if self.state.ctx_state == ContextState::Booted {
            for c in 0..self.state.channel_span {
                let channel = (self.state.channel_base + c) as u8;
                put_bytes(
                    &mut self.sink,
                    &[
                        MIDI_CONTROL_CHANGE + channel,
                        101,
                        0,
                        MIDI_CONTROL_CHANGE + channel,
                        100,
                        0,
                        MIDI_CONTROL_CHANGE + channel,
                        6,
                        semitones as u8,
                        MIDI_CONTROL_CHANGE + channel,
                        38,
                        0,
                        MIDI_CONTROL_CHANGE + channel,
                        101,
                        127,
                        MIDI_CONTROL_CHANGE + channel,
                        100,
                        127,
                    ],
                );
            }
        }
    }

    /// Reset everything except hints and injected capabilities. Safe to
    /// call at any time all fingers are known to be up — this is the
    /// recovery path after a self-test failure.
    pub fn boot(&mut self) {
        for c in 0..CHANNEL_MAX {
            self.state.channels[c] = crate::state::ChannelState::default();
            for n in 0..NOTE_MAX {
                self.state.note_channel_down_count[n][c] = 0;
                self.state.note_channel_down_raw_balance[n][c] = 0;
            }
        }
        for f in 0..FINGER_MAX {
            self.state.fingers[f] = crate::state::FingerState::default();
        }
        for p in 0..POLY_MAX {
            self.state.polys[p] = crate::state::PolyState::default();
        }
        self.state.fingers_down_count = 0;
        // Seeded one below the span's floor so the first allocation after
        // boot rotates onto channel_base rather than skipping it.
        self.state.last_allocated_channel = self.state.channel_base - 1;

        if self.state.channel_span == 0 {
            self.diagnostics.fail("channel_span == 0");
        }
        if self.state.channel_base < 0 {
            self.diagnostics
                .fail(&format!("{}: channel_base < 0", self.state.channel_base));
        }
        if self.state.channel_base as usize >= CHANNEL_MAX {
            self.diagnostics.fail("channel_base >= CHANNEL_MAX");
        }
        if self.state.channel_span + self.state.channel_base >= CHANNEL_MAX as i32 {
            self.diagnostics.fail(&format!(
                "channel_span:{} + channel_base:{} >= CHANNEL_MAX",
                self.state.channel_span, self.state.channel_base
            ));
        }
        self.state.ctx_state = ContextState::Booted;
        let semis = self.state.channel_bend_semis;
        self.set_channel_bend_semis(semis);
    }

    /// Must be called (per finger) before any other operation on it.
    /// Allocates a channel but emits nothing — velocity is still unknown.
    pub fn begin_down(&mut self, finger: FingerId) {
        if !self.check_booted() || !self.check_finger(finger) {
            return;
        }
        if self.state.fingers[finger].on {
            self.diagnostics
                .fail(&format!("finger {finger}: begin_down && on == true"));
        }
        self.state.fingers[finger].on = true;
        self.state.fingers[finger].channel = self.alloc_channel(finger);
    }

    /// Completes the gesture started by `begin_down`, maps `fnote` to a
    /// (note, bend) pair, joins the poly group, and emits Note-On bytes in
    /// the order required by the protocol's collision/legato rules.
    pub fn end_down(&mut self, finger: FingerId, fnote: f32, poly_group: PolyId, velocity: f32, legato: i32) {
        if !self.check_booted()
            || !self.check_finger(finger)
            || !self.check_poly(poly_group)
            || !self.check_fnote(fnote)
        {
            return;
        }
        if !self.state.fingers[finger].on {
            self.diagnostics
                .fail(&format!("finger {finger}: end_down && on == false"));
        }
        self.state.fingers[finger].velocity = limit_val(1, (velocity * 127.0) as i32, 127);
        self.state.fingers[finger].poly_group = Some(poly_group);

        let bend_semis = self.state.channel_bend_semis;
        let (note, bend) = fnote_to_note_bend(fnote, bend_semis);
        self.state.fingers[finger].note = note;
        self.state.fingers[finger].bend = bend;

        self.state.fingers_down_count += 1;
        let channel = self.state.fingers[finger].channel;
        self.state.note_channel_down_count[note as usize][channel] += 1;

        // Only send a pre-emptive note off before on if more than one
        // logical finger is claiming this (note, channel) pair.
        if !self.state.fingers[finger].suppressed
            && self.state.note_channel_down_count[note as usize][channel] > 1
        {
            put_bytes(&mut self.sink, &[MIDI_NOTE_ON + channel as u8, note as u8, 0]);
            self.state.note_channel_down_raw_balance[note as usize][channel] -= 1;
        }

        let finger_turning_off = self.link(finger);
        self.set_current_bend(finger);

        if self.state.channels[channel].current_finger != Some(finger) {
            self.diagnostics.fail(&format!(
                "finger {finger} should be current in channel because it's note down"
            ));
        }
        if let Some(off) = finger_turning_off {
            if !self.state.fingers[off].on {
                self.diagnostics.fail("turning-off finger should be on");
            }
            if !self.state.fingers[off].suppressed {
                self.diagnostics.fail("turning-off finger should be suppressed");
            }
            if legato == LEGATO_ON_UP_DOWN {
                self.note_tie(off);
            }
            let off_channel = self.state.fingers[off].channel;
            let off_note = self.state.fingers[off].note;
            put_bytes(&mut self.sink, &[MIDI_NOTE_ON + off_channel as u8, off_note as u8, 0]);
            self.state.note_channel_down_raw_balance[off_note as usize][off_channel] -= 1;
        }
        let velocity_byte = self.state.fingers[finger].velocity as u8;
        put_bytes(&mut self.sink, &[MIDI_NOTE_ON + channel as u8, note as u8, velocity_byte]);
        self.state.note_channel_down_raw_balance[note as usize][channel] += 1;
        if self.state.note_channel_down_raw_balance[note as usize][channel] > 1 {
            self.diagnostics
                .log(&format!("we sent out a doubled note on down ch{channel} n{note}"));
        }
    }

    /// Legal between `begin_down` and `end_down`, and after `end_down`.
    /// `key` and `val` are taken modulo 127 rather than validated.
    pub fn express(&mut self, finger: FingerId, key: i32, val: f32) {
        if !self.check_finger(finger) {
            return;
        }
        if !self.state.fingers[finger].on {
            self.diagnostics
                .fail(&format!("finger {finger}: express && on == false"));
        }
        let channel = self.state.fingers[finger].channel as u8;
        put_bytes(
            &mut self.sink,
            &[
                MIDI_CONTROL_CHANGE + channel,
                key.rem_euclid(127) as u8,
                ((val * 127.0) as i32).rem_euclid(127) as u8,
            ],
        );
    }

    /// Move a sounding finger, optionally noting a poly group it is
    /// "visiting" (advisory only — it is never consumed to relink). If the
    /// bend saturates, silently re-voices on a new integer note.
    pub fn move_finger(&mut self, finger: FingerId, fnote: f32, velocity: f32, poly_group: i32) -> f32 {
        if !self.check_finger(finger) || !self.check_fnote(fnote) {
            return fnote;
        }
        if !self.state.fingers[finger].on {
            self.diagnostics
                .fail(&format!("finger {finger}: move && on == false"));
        }
        let bend_semis = self.state.channel_bend_semis;
        let existing = self.state.fingers[finger];
        let (new_note, new_bend) = fnote_bend_from_existing(fnote, bend_semis, &existing);
        let existing_poly_group = self.state.fingers[finger].poly_group;
        if poly_group >= 0 && (poly_group as usize) < FINGER_MAX {
            self.state.fingers[finger].visiting_poly_group = Some(poly_group as usize);
        }
        if new_note == self.state.fingers[finger].note {
            self.state.fingers[finger].bend = new_bend;
            self.set_current_aftertouch(finger, velocity);
            self.set_current_bend(finger);
        } else {
            self.note_tie(finger);
            self.up(finger, LEGATO_ON_UP);
            self.begin_down(finger);
            let existing_poly_group = match existing_poly_group {
                Some(p) => p,
                None => {
                    self.diagnostics
                        .fail(&format!("finger {finger}: move expected an existing poly_group"));
                    0
                }
            };
            self.end_down(finger, fnote, existing_poly_group, velocity, LEGATO_ON_UP);
        }
        fnote
    }

    /// The finger came up: turns its note off (unless suppressed) and
    /// reveals the next-most-recent finger in its poly group, if any.
    pub fn up(&mut self, finger: FingerId, legato: i32) {
        if !self.check_finger(finger) {
            return;
        }
        if !self.state.fingers[finger].on {
            self.diagnostics.fail(&format!("finger {finger}: up && on == false"));
        }

        let old_velocity = self.state.fingers[finger].velocity;
        let finger_was_suppressed = self.state.fingers[finger].suppressed;
        let finger_to_turn_on = self.unlink(finger);

        let note = self.state.fingers[finger].note as usize;
        let channel = self.state.fingers[finger].channel;
        self.state.note_channel_down_count[note][channel] -= 1;

        if !finger_was_suppressed && self.state.note_channel_down_count[note][channel] == 0 {
            if finger_to_turn_on.is_some() && legato > LEGATO_NONE {
                self.note_tie(finger);
            }
            put_bytes(&mut self.sink, &[MIDI_NOTE_ON + channel as u8, note as u8, 0]);
            self.state.note_channel_down_raw_balance[note][channel] -= 1;
        }

        if let Some(on) = finger_to_turn_on {
            if !self.state.fingers[on].on {
                self.diagnostics.fail("turning-on finger should be on");
            }
            if self.state.fingers[on].suppressed {
                self.diagnostics.fail("turning-on finger should not be suppressed");
            }
            // Force a re-send of the bend — note ups don't happen often
            // enough for this to be a rate problem.
            let on_channel = self.state.fingers[on].channel;
            self.state.channels[on_channel].last_bend = -1;
            self.set_current_bend(on);
            self.state.fingers[on].velocity = old_velocity;
            let on_note = self.state.fingers[on].note;
            let on_velocity = self.state.fingers[on].velocity as u8;
            put_bytes(
                &mut self.sink,
                &[MIDI_NOTE_ON + on_channel as u8, on_note as u8, on_velocity],
            );
            self.state.note_channel_down_raw_balance[on_note as usize][on_channel] += 1;
            if self.state.note_channel_down_raw_balance[note][channel] > 1 {
                self.diagnostics
                    .log(&format!("we sent out a doubled note on up ch{channel} n{note}"));
            }
        }

        if self.state.note_channel_down_count[note][channel] < 0 {
            self.diagnostics.fail(&format!(
                "note_channel_down_count[{note}][{channel}] == {}",
                self.state.note_channel_down_count[note][channel]
            ));
        }

        self.state.fingers_down_count -= 1;
        if self.state.fingers_down_count < 0 {
            self.diagnostics
                .fail(&format!("fingers_down_count == {}", self.state.fingers_down_count));
        }

        self.state.fingers[finger].on = false;
        self.free_channel(finger);
        self.state.fingers[finger] = crate::state::FingerState::default();

        if self.state.fingers_down_count <= 0 {
            self.self_test();
        }
    }

    /// Marks a boundary for this gesture; forwards to the injected sink
    /// without synthesizing any bytes of its own.
    pub fn flush(&mut self) {
        self.sink.flush();
    }

    pub fn channel_occupancy(&self, channel: usize) -> i32 {
        self.state.channels[channel].use_count
    }

    pub fn channel_bend(&self, channel: usize) -> f32 {
        (self.state.channels[channel].last_bend - BEND_CENTER) as f32 / BEND_CENTER as f32
    }

    fn note_tie(&mut self, finger: FingerId) {
        let (lsb, msb) = split_14bit(NOTE_TIE_NRPN);
        let channel = self.state.fingers[finger].channel as u8;
        let note = self.state.fingers[finger].note as u8;
        put_bytes(
            &mut self.sink,
            &[
                MIDI_CONTROL_CHANGE + channel,
                0x63,
                msb,
                MIDI_CONTROL_CHANGE + channel,
                0x62,
                lsb,
                MIDI_CONTROL_CHANGE + channel,
                0x06,
                note,
            ],
        );
    }

    fn set_current_bend(&mut self, finger: FingerId) {
        let f = self.state.fingers[finger];
        let channel = f.channel;
        if self.state.channels[channel].last_bend != f.bend
            && self.state.channels[channel].current_finger == Some(finger)
            && f.on
            && !self.state.suppress_bends
        {
            self.state.channels[channel].last_bend = f.bend;
            let (lo, hi) = split_14bit(f.bend);
            put_bytes(&mut self.sink, &[MIDI_PITCH_BEND + channel as u8, lo, hi]);
        }
    }

    fn set_current_aftertouch(&mut self, finger: FingerId, velocity: f32) {
        let clamped = limit_val(1, (velocity * 127.0) as i32, 127);
        self.state.fingers[finger].velocity = clamped;
        let f = self.state.fingers[finger];
        let channel = f.channel;
        if self.state.channels[channel].last_aftertouch != clamped
            && self.state.channels[channel].current_finger == Some(finger)
            && f.on
            && !self.state.suppress_bends
        {
            self.state.channels[channel].last_aftertouch = clamped;
            put_bytes(&mut self.sink, &[MIDI_CHANNEL_PRESSURE + channel as u8, clamped as u8]);
        }
    }

    /// Runs whenever `fingers_down_count` returns to zero. Verifies every
    /// invariant that should hold at quiescence; on failure, brute-forces
    /// all notes off on every (note, channel) pair and reboots.
    fn self_test(&mut self) {
        let mut passed = true;
        if self.state.fingers_down_count == 0 {
            for c in 0..CHANNEL_MAX {
                let use_count = self.state.channels[c].use_count;
                if use_count != 0 {
                    self.diagnostics
                        .fail(&format!("{use_count}: self_test fingers_down_count==0 && use_count != 0"));
                    passed = false;
                }
                for n in 0..NOTE_MAX {
                    if self.state.note_channel_down_count[n][c] != 0 {
                        self.diagnostics.fail(&format!(
                            "note_channel_down_count[{n}][{c}] == {}",
                            self.state.note_channel_down_count[n][c]
                        ));
                        passed = false;
                    }
                    if self.state.note_channel_down_raw_balance[n][c] != 0 {
                        if self.state.note_channel_down_raw_balance[n][c] < 0 {
                            let found = self.state.note_channel_down_raw_balance[n][c];
                            self.state.note_channel_down_raw_balance[n][c] = 0;
                            self.diagnostics
                                .log(&format!("note_channel_down_raw_balance[{n:#x}][{c:#x}] == {found}"));
                        } else {
                            self.diagnostics.fail(&format!(
                                "note_channel_down_raw_balance[{n:#x}][{c:#x}] == {}",
                                self.state.note_channel_down_raw_balance[n][c]
                            ));
                            passed = false;
                        }
                    }
                }
                if self.state.channels[c].current_finger.is_some() {
                    self.diagnostics
                        .fail(&format!("channels[{c:#x}].current_finger != None"));
                    passed = false;
                }
            }
            for p in 0..POLY_MAX {
                if self.state.polys[p].current_finger.is_some() {
                    self.diagnostics.fail("poly group use_count is wrong");
                    passed = false;
                }
            }
            for f in 0..FINGER_MAX {
                if self.state.fingers[f].on {
                    self.diagnostics.fail(&format!("self_test fingers[{f}].on"));
                    passed = false;
                }
                if self.state.fingers[f].next_in_channel.is_some() {
                    self.diagnostics
                        .fail(&format!("fingers[{f}].next_in_channel != None"));
                    passed = false;
                }
                if self.state.fingers[f].prev_in_channel.is_some() {
                    self.diagnostics
                        .fail(&format!("fingers[{f}].prev_in_channel != None"));
                    passed = false;
                }
            }
        }
        if self.state.fingers_down_count < 0 {
            self.diagnostics.fail("less than zero fingers count!");
            passed = false;
        }
        if passed {
            self.diagnostics.passed();
        } else {
            for n in 0..NOTE_MAX {
                for c in 0..CHANNEL_MAX {
                    put_bytes(&mut self.sink, &[MIDI_NOTE_ON + c as u8, n as u8, 0]);
                }
                self.flush();
            }
            self.boot();
        }
    }
}
