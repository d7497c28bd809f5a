//! Buffered MIDI emission for a fretless, pitch-continuous, multi-touch
//! instrument.
//!
//! [`GestureEncoder`] turns finger gestures — continuous pitch, velocity,
//! and per-gesture expression — into a MIDI 1.0 byte stream that a
//! standard multi-timbral receiver can render as faithfully as the wire
//! protocol allows, via channel cycling, legato stacks, and silent
//! note-retrigger on bend saturation. [`decoder::GestureDecoder`] reverses
//! the same protocol subset for an embedded tone generator.
//!
//! Everything here is re-entrant: a context holds no process-wide state,
//! so a process may run any number of independent instruments in
//! parallel, each with its own injected [`sink::ByteSink`] and
//! [`sink::Diagnostics`].

mod channel;
pub mod constants;
pub mod decoder;
mod encoder;
mod poly;
mod pitch;
pub mod sink;
pub mod state;

pub use decoder::{EngineSink, GestureDecoder};
pub use encoder::GestureEncoder;
pub use sink::{ByteSink, Diagnostics};
