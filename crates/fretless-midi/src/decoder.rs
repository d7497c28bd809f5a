//! Inbound MIDI decoder (C8): a per-byte FSM that reverses a subset of the
//! protocol the encoder emits, driving an embedded tone generator.

use crate::constants::{BEND_CENTER, CHANNEL_MAX};
use crate::sink::Diagnostics;

/// Where decoded note/pitch events go. Called synchronously from
/// [`GestureDecoder::put_byte`] — never buffered.
pub trait EngineSink {
    /// `attack == true` signals that the upcoming note-on is tied to the
    /// previous one on this channel (the manufacturer "note tie" NRPN),
    /// not a fresh articulation.
    fn note_event(&mut self, channel: usize, attack: bool, pitch: f32, vol: f32, expr_parm: i32, expr: i32);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    Status,
    OnByteNote,
    OnByteVol,
    OffByteNote,
    OffByteVol,
    BendLo,
    BendHi,
    RpnLo,
    #[allow(dead_code)] // never reached: the original FSM has no transition into this state
    RpnHi,
    NrpnLoKey,
    NrpnHiKey,
    RpnVal,
    RpnLoKey,
    RpnHiKey,
    ChPress,
    Rpn11,
}

/// Byte-level FSM state for one inbound decoder instance.
pub struct GestureDecoder<E: EngineSink, D: Diagnostics> {
    engine: E,
    diagnostics: D,
    expect: Expect,
    status: u8,
    channel: usize,
    note: [i32; CHANNEL_MAX],
    vol: [i32; CHANNEL_MAX],
    bend: [i32; CHANNEL_MAX],
    pitch_bend_semis: i32,
    nrpn_key_lo: i32,
    nrpn_key_hi: i32,
    rpn_key_lo: i32,
    rpn_key_hi: i32,
    rpn_val: i32,
    is_registered: bool,
    expr_parm: i32,
    expr: i32,
}

impl<E: EngineSink, D: Diagnostics> GestureDecoder<E, D> {
    pub fn new(engine: E, diagnostics: D) -> Self {
        Self {
            engine,
            diagnostics,
            expect: Expect::Status,
            status: 0,
            channel: 0,
            note: [0; CHANNEL_MAX],
            vol: [0; CHANNEL_MAX],
            bend: [BEND_CENTER; CHANNEL_MAX],
            pitch_bend_semis: 2,
            nrpn_key_lo: 0,
            nrpn_key_hi: 0,
            rpn_key_lo: 0,
            rpn_key_hi: 0,
            rpn_val: 0,
            is_registered: false,
            expr_parm: 0,
            expr: 0,
        }
    }

    pub fn into_engine(self) -> E {
        self.engine
    }

    fn compute_pitch(&self, channel: usize) -> f32 {
        self.note[channel] as f32
            + (self.pitch_bend_semis as f32 * (self.bend[channel] - BEND_CENTER) as f32) / BEND_CENTER as f32
    }

    fn compute_vol(&self, channel: usize) -> f32 {
        self.vol[channel] as f32 / 127.0
    }

    fn emit(&mut self, attack: bool, vol_override: Option<f32>) {
        let channel = self.channel;
        let pitch = self.compute_pitch(channel);
        let vol = vol_override.unwrap_or_else(|| self.compute_vol(channel));
        let expr_parm = self.expr_parm;
        let expr = self.expr;
        self.engine.note_event(channel, attack, pitch, vol, expr_parm, expr);
    }

    /// Feed one inbound MIDI byte to the decoder.
    pub fn put_byte(&mut self, c: u8) {
        if self.expect == Expect::Status {
            // idempotence at gesture boundaries: every fresh status byte
            // resets all channels' bend back to center.
            self.bend = [BEND_CENTER; CHANNEL_MAX];
        }
        if c & 0x80 != 0 {
            self.status = (c & 0xF0) >> 4;
            self.channel = (c & 0x0F) as usize;
            match self.status {
                0x08 => self.expect = Expect::OffByteNote,
                0x09 => self.expect = Expect::OnByteNote,
                0x0B => self.expect = Expect::RpnLo,
                0x0D => self.expect = Expect::ChPress,
                0x0E => self.expect = Expect::BendLo,
                other => self.diagnostics.log(&format!("unrecognized status byte {other}")),
            }
            return;
        }

        let data = (c & 0x7F) as i32;
        match self.expect {
            Expect::OnByteNote => {
                self.note[self.channel] = data;
                self.expect = Expect::OnByteVol;
            }
            Expect::OnByteVol => {
                self.vol[self.channel] = data;
                self.expect = Expect::OnByteNote;
                self.emit(false, None);
            }
            Expect::OffByteNote => {
                self.note[self.channel] = data;
                self.expect = Expect::OffByteVol;
            }
            Expect::OffByteVol => {
                self.vol[self.channel] = 0;
                self.expect = Expect::OffByteNote;
                self.emit(false, Some(0.0));
            }
            Expect::BendLo => {
                self.bend[self.channel] = data;
                self.expect = Expect::BendHi;
            }
            Expect::BendHi => {
                self.bend[self.channel] += data << 7;
                self.expect = Expect::BendLo;
                self.emit(false, None);
            }
            Expect::RpnLo => match data {
                0x63 => self.expect = Expect::NrpnLoKey,
                0x62 => self.expect = Expect::NrpnHiKey,
                101 => self.expect = Expect::RpnLoKey,
                100 => self.expect = Expect::RpnHiKey,
                0x06 => self.expect = Expect::RpnVal,
                11 => self.expect = Expect::Rpn11,
                _ => {}
            },
            // The original FSM never restores `expect` to `RpnLo` after
            // these key/value states — preserved, not fixed, since a
            // sender relying on MIDI running status for a second RPN/NRPN
            // message back-to-back would desync here too.
            Expect::NrpnLoKey => {
                self.is_registered = false;
                self.nrpn_key_lo = data;
            }
            Expect::NrpnHiKey => {
                self.is_registered = false;
                self.nrpn_key_hi = data;
            }
            Expect::RpnVal => {
                self.rpn_val = data;
                if self.is_registered && self.rpn_key_lo == 0 && self.rpn_key_hi == 0 {
                    self.pitch_bend_semis = self.rpn_val;
                } else if !self.is_registered && self.nrpn_key_lo == 9 && self.nrpn_key_hi == 71 {
                    // Manufacturer "note tie": signal the engine that the
                    // next on/off pair continues rather than re-articulates.
                    self.engine.note_event(self.channel, true, 0.0, 0.0, 0, 0);
                }
            }
            Expect::ChPress => {
                if self.vol[self.channel] != 0 {
                    self.vol[self.channel] = data;
                    self.emit(false, None);
                }
            }
            Expect::RpnLoKey => {
                self.is_registered = true;
                self.rpn_key_lo = data;
            }
            Expect::RpnHiKey => {
                self.is_registered = true;
                self.rpn_key_hi = data;
            }
            Expect::Rpn11 => {
                self.expr_parm = 11;
                self.expr = data;
            }
            Expect::Status => {
                self.diagnostics.log("data byte received before a status byte");
            }
            Expect::RpnHi => {
                self.diagnostics.log("unexpected data byte in unreachable RpnHi state");
            }
        }
    }

    /// We don't act on data boundaries — forwarded for API parity only.
    pub fn flush(&mut self) {}
}
