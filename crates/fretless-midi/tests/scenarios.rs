//! End-to-end scenarios against the public API only, exercising the
//! encoder/decoder pair the way an embedder would: construct, boot, drive
//! gestures, read back the emitted byte stream.

use std::cell::RefCell;
use std::rc::Rc;

use fretless_midi::constants::{split_14bit, BEND_CENTER, MIDI_CONTROL_CHANGE};
use fretless_midi::{ByteSink, Diagnostics, EngineSink, GestureDecoder, GestureEncoder};

#[derive(Default)]
struct VecSink {
    bytes: Vec<u8>,
}

impl ByteSink for VecSink {
    fn put_byte(&mut self, byte: u8) {
        self.bytes.push(byte);
    }
    fn flush(&mut self) {}
}

/// Shares its failure/pass log with the test via a handle, since
/// [`GestureEncoder`] only exposes its sink and diagnostics by value
/// (`into_sink`), not by reference.
#[derive(Clone, Default)]
struct SharedDiagnostics {
    fails: Rc<RefCell<Vec<String>>>,
    passed_count: Rc<RefCell<usize>>,
}

impl Diagnostics for SharedDiagnostics {
    fn fail(&mut self, message: &str) {
        self.fails.borrow_mut().push(message.to_string());
    }
    fn passed(&mut self) {
        *self.passed_count.borrow_mut() += 1;
    }
}

fn booted(base: i32, span: i32, semis: i32) -> (GestureEncoder<VecSink, SharedDiagnostics>, SharedDiagnostics) {
    let diag = SharedDiagnostics::default();
    let mut enc = GestureEncoder::new(VecSink::default(), diag.clone());
    enc.set_channel_base(base);
    enc.set_channel_span(span);
    enc.set_channel_bend_semis(semis);
    enc.boot();
    (enc, diag)
}

#[test]
fn s1_single_note_on_lands_on_base_channel() {
    let (mut enc, _diag) = booted(0, 2, 2);
    enc.begin_down(0);
    enc.end_down(0, 60.0, 0, 1.0, 0);
    let sink = enc.into_sink();
    // boot's own RPN bend-range bytes precede the gesture; check the tail.
    assert_eq!(&sink.bytes[sink.bytes.len() - 3..], [0x90, 0x3C, 0x7F]);
}

#[test]
fn s2_quarter_bend_then_up_rounds_half_to_even() {
    let (mut enc, _diag) = booted(0, 2, 2);
    enc.begin_down(0);
    enc.end_down(0, 60.5, 0, 1.0, 0);
    enc.up(0, 0);
    let sink = enc.into_sink();
    let tail = &sink.bytes[sink.bytes.len() - 9..];
    assert_eq!(tail, [0xE0, 0x00, 0x50, 0x90, 0x3C, 0x7F, 0x90, 0x3C, 0x00]);
}

#[test]
fn s3_legato_stack_revoices_predecessor_on_release() {
    let (mut enc, diag) = booted(0, 2, 2);
    enc.begin_down(0);
    enc.end_down(0, 60.0, 5, 1.0, 2);
    enc.begin_down(1);
    enc.end_down(1, 62.0, 5, 1.0, 2);
    enc.up(1, 1);
    enc.up(0, 0);
    assert!(diag.fails.borrow().is_empty(), "unexpected diagnostics: {:?}", diag.fails.borrow());
    let sink = enc.into_sink();
    // finger 0's note (60 = 0x3C) is re-voiced somewhere after finger 1 releases.
    assert!(sink.bytes.contains(&0x3C));
}

#[test]
fn s4_collision_emits_preemptive_off_before_the_second_on() {
    let (mut enc, _diag) = booted(0, 1, 2);
    enc.begin_down(0);
    enc.end_down(0, 60.0, 0, 1.0, 0);
    enc.begin_down(1);
    enc.end_down(1, 60.0, 1, 1.0, 0);
    let sink = enc.into_sink();
    let pos = sink
        .bytes
        .windows(3)
        .position(|w| w == [0x90, 0x3C, 0x00])
        .expect("preemptive off must appear");
    let second_on = sink.bytes[pos + 3..]
        .windows(3)
        .position(|w| w == [0x90, 0x3C, 0x7F]);
    assert!(second_on.is_some());
}

#[test]
fn s5_bend_saturation_retriggers_on_new_integer_note() {
    let (mut enc, diag) = booted(0, 2, 2);
    enc.begin_down(0);
    enc.end_down(0, 60.0, 0, 1.0, 0);
    enc.move_finger(0, 63.0, 1.0, 0);
    assert!(diag.fails.borrow().is_empty(), "unexpected diagnostics: {:?}", diag.fails.borrow());
    let sink = enc.into_sink();
    assert!(sink.bytes.contains(&0x3F)); // note 63 re-articulated after the retrigger
}

#[test]
fn p3_quiescence_clears_ledgers_and_self_test_passes() {
    let (mut enc, diag) = booted(0, 4, 2);
    enc.begin_down(0);
    enc.end_down(0, 60.0, 0, 1.0, 0);
    enc.up(0, 0);
    assert!(diag.fails.borrow().is_empty());
    assert_eq!(*diag.passed_count.borrow(), 1);
}

#[test]
fn p5_repeated_boot_with_unchanged_hints_is_idempotent() {
    let (mut enc, diag) = booted(0, 4, 2);
    enc.boot();
    enc.begin_down(0);
    enc.end_down(0, 60.0, 0, 1.0, 0);
    assert!(diag.fails.borrow().is_empty());
    let sink = enc.into_sink();
    assert_eq!(&sink.bytes[sink.bytes.len() - 3..], [0x90, 0x3C, 0x7F]);
}

#[derive(Default)]
struct RecordingEngine {
    events: Vec<(usize, bool, f32, f32, i32, i32)>,
}

impl EngineSink for RecordingEngine {
    fn note_event(&mut self, channel: usize, attack: bool, pitch: f32, vol: f32, expr_parm: i32, expr: i32) {
        self.events.push((channel, attack, pitch, vol, expr_parm, expr));
    }
}

#[test]
fn s6_decoder_reconstructs_bent_pitch_and_trailing_off() {
    let mut dec = GestureDecoder::new(RecordingEngine::default(), SharedDiagnostics::default());
    for b in [0x90, 0x3C, 0x64, 0xE0, 0x00, 0x50, 0x80, 0x3C, 0x00] {
        dec.put_byte(b);
    }
    let engine = dec.into_engine();
    // note-on, then the bend's own pitch update, then the off.
    assert_eq!(engine.events.len(), 3);
    let (channel, _attack, on_pitch, on_vol, _, _) = engine.events[0];
    assert_eq!(channel, 0);
    assert!((on_vol - 100.0 / 127.0).abs() < 1e-6);
    assert!((on_pitch - 60.0).abs() < 1e-6);
    let (_, _, bent_pitch, _, _, _) = engine.events[1];
    assert!((bent_pitch - 60.5).abs() < 1e-4);
    let (_, _, _, off_vol, _, _) = engine.events[2];
    assert_eq!(off_vol, 0.0);
}

#[test]
fn p7_decoder_bend_roundtrip_matches_linear_formula() {
    let mut dec = GestureDecoder::new(RecordingEngine::default(), SharedDiagnostics::default());
    // Push the bend-range RPN (channel 0, semis=2) through the wire before the note.
    for b in [
        MIDI_CONTROL_CHANGE,
        101,
        0,
        MIDI_CONTROL_CHANGE,
        100,
        0,
        MIDI_CONTROL_CHANGE,
        6,
        2,
    ] {
        dec.put_byte(b);
    }
    let bend: i32 = BEND_CENTER + 1024;
    let (lo, hi) = split_14bit(bend);
    for b in [0x90, 67, 100, 0xE0, lo, hi] {
        dec.put_byte(b);
    }
    let engine = dec.into_engine();
    let (_, _, pitch, _, _, _) = *engine.events.last().unwrap();
    let expected = 67.0 + 2.0 * (bend - BEND_CENTER) as f32 / BEND_CENTER as f32;
    assert!((pitch - expected).abs() < 1e-4);
}
