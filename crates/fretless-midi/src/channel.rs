//! Channel allocator (C3): least-use assignment within a contiguous span,
//! rotating the tie-break just past the last allocation.

use crate::sink::{ByteSink, Diagnostics};
use crate::state::{ChannelId, FingerId};
use crate::GestureEncoder;

impl<S: ByteSink, D: Diagnostics> GestureEncoder<S, D> {
    /// Assign `finger` to the least-used channel in `[base, base+span)`,
    /// scanning candidates starting just after `last_allocated_channel`.
    pub(crate) fn alloc_channel(&mut self, finger: FingerId) -> ChannelId {
        let span = self.state.channel_span;
        let base = self.state.channel_base;
        let last = self.state.last_allocated_channel;
        let mut low_used_count = 0;
        loop {
            for s in 0..span {
                let candidate = last + 1 + s;
                let channel = ((candidate - base).rem_euclid(span) + base) as usize;
                if self.state.channels[channel].use_count < 0 {
                    self.diagnostics.fail("channel use_count < 0 on alloc");
                    return channel;
                }
                if self.state.channels[channel].use_count == low_used_count {
                    self.state.channels[channel].use_count += 1;
                    let current_finger_in_channel = self.state.channels[channel].current_finger;
                    if let Some(cur) = current_finger_in_channel {
                        if self.state.fingers[cur].next_in_channel.is_some() {
                            self.diagnostics
                                .fail("current finger in channel already has a next when allocating");
                        }
                        self.state.fingers[cur].next_in_channel = Some(finger);
                        self.state.fingers[finger].prev_in_channel = Some(cur);
                    }
                    self.state.channels[channel].current_finger = Some(finger);
                    self.state.last_allocated_channel = channel as i32;
                    return channel;
                }
            }
            low_used_count += 1;
        }
    }

    /// Release `finger`'s channel, decrementing `use_count` and promoting
    /// its predecessor to `current_finger` if it was the head.
    pub(crate) fn free_channel(&mut self, finger: FingerId) {
        let channel = self.state.fingers[finger].channel;
        self.state.channels[channel].use_count -= 1;
        if self.state.channels[channel].use_count < 0 {
            self.diagnostics.fail("channel use_count < 0 on free");
        }
        let prev_finger = self.state.fingers[finger].prev_in_channel;
        let next_finger = self.state.fingers[finger].next_in_channel;
        let current_finger = self.state.channels[channel].current_finger;

        if let Some(p) = prev_finger {
            self.state.fingers[p].next_in_channel = next_finger;
        }
        if let Some(n) = next_finger {
            self.state.fingers[n].prev_in_channel = prev_finger;
        }
        self.state.fingers[finger].prev_in_channel = None;
        self.state.fingers[finger].next_in_channel = None;
        if current_finger == Some(finger) {
            self.state.channels[channel].current_finger = prev_finger;
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::sink::test_support::{RecordingDiagnostics, RecordingSink};
    use crate::GestureEncoder;

    fn booted(span: i32) -> GestureEncoder<RecordingSink, RecordingDiagnostics> {
        let mut enc = GestureEncoder::new(RecordingSink::default(), RecordingDiagnostics::default());
        enc.set_channel_span(span);
        enc.boot();
        enc
    }

    #[test]
    fn allocates_least_used_channel_first() {
        let mut enc = booted(4);
        let c0 = enc.alloc_channel(0);
        let c1 = enc.alloc_channel(1);
        assert_ne!(c0, c1);
        assert_eq!(enc.state.channels[c0].use_count, 1);
        assert_eq!(enc.state.channels[c1].use_count, 1);
    }

    #[test]
    fn rotates_past_last_allocated_on_tie() {
        let mut enc = booted(2);
        let c0 = enc.alloc_channel(0);
        enc.free_channel(0);
        let c1 = enc.alloc_channel(1);
        // with span=2 and both at use_count 0, rotation should pick the other channel
        assert_ne!(c0, c1);
    }

    #[test]
    fn free_decrements_use_count() {
        let mut enc = booted(2);
        let c = enc.alloc_channel(0);
        enc.state.fingers[0].channel = c;
        assert_eq!(enc.state.channels[c].use_count, 1);
        enc.free_channel(0);
        assert_eq!(enc.state.channels[c].use_count, 0);
    }
}
