//! Polyphony / legato linker (C4): a per-group LIFO stack of fingers.
//! The newest finger in a group is audible; older ones are suppressed and
//! resurface in strict LIFO order as newer ones release.

use crate::sink::{ByteSink, Diagnostics};
use crate::state::FingerId;
use crate::GestureEncoder;

impl<S: ByteSink, D: Diagnostics> GestureEncoder<S, D> {
    /// Link `finger` into its own `poly_group`, suppressing and returning
    /// whichever finger was previously current in that group (if any).
    pub(crate) fn link(&mut self, finger: FingerId) -> Option<FingerId> {
        let poly_group = self.state.fingers[finger].poly_group.expect("poly_group must be set before link");
        let finger_to_turn_off = self.state.polys[poly_group].current_finger;
        if let Some(off) = finger_to_turn_off {
            self.state.fingers[off].suppressed = true;
            self.state.fingers[off].next_in_poly = Some(finger);
            self.state.fingers[finger].prev_in_poly = Some(off);
        }
        self.state.fingers[finger].poly_group = Some(poly_group);
        self.state.polys[poly_group].current_finger = Some(finger);
        finger_to_turn_off
    }

    /// Remove `finger` from its poly group's stack. If it was current,
    /// promote its predecessor and unsuppress it, returning that finger.
    pub(crate) fn unlink(&mut self, finger: FingerId) -> Option<FingerId> {
        let poly_group = self.state.fingers[finger].poly_group.expect("poly_group must be set before unlink");
        let current_finger = self.state.polys[poly_group].current_finger;
        let prev_finger = self.state.fingers[finger].prev_in_poly;
        let next_finger = self.state.fingers[finger].next_in_poly;
        let mut finger_to_turn_on = None;

        if let Some(p) = prev_finger {
            self.state.fingers[p].next_in_poly = next_finger;
        }
        if let Some(n) = next_finger {
            self.state.fingers[n].prev_in_poly = prev_finger;
        }
        if current_finger == Some(finger) {
            self.state.polys[poly_group].current_finger = prev_finger;
            finger_to_turn_on = prev_finger;
            if let Some(on) = finger_to_turn_on {
                self.state.fingers[on].suppressed = false;
            }
        }

        self.state.fingers[finger].prev_in_poly = None;
        self.state.fingers[finger].next_in_poly = None;
        self.state.fingers[finger].poly_group = None;
        finger_to_turn_on
    }
}

#[cfg(test)]
mod tests {
    use crate::sink::test_support::{RecordingDiagnostics, RecordingSink};
    use crate::GestureEncoder;

    fn booted() -> GestureEncoder<RecordingSink, RecordingDiagnostics> {
        let mut enc = GestureEncoder::new(RecordingSink::default(), RecordingDiagnostics::default());
        enc.boot();
        enc
    }

    #[test]
    fn linking_second_finger_suppresses_first() {
        let mut enc = booted();
        enc.state.fingers[0].poly_group = Some(0);
        let suppressed = enc.link(0);
        assert_eq!(suppressed, None);

        enc.state.fingers[1].poly_group = Some(0);
        let suppressed = enc.link(1);
        assert_eq!(suppressed, Some(0));
        assert!(enc.state.fingers[0].suppressed);
        assert_eq!(enc.state.polys[0].current_finger, Some(1));
    }

    #[test]
    fn unlinking_current_reveals_previous_in_lifo_order() {
        let mut enc = booted();
        enc.state.fingers[0].poly_group = Some(0);
        enc.link(0);
        enc.state.fingers[1].poly_group = Some(0);
        enc.link(1);

        let revealed = enc.unlink(1);
        assert_eq!(revealed, Some(0));
        assert!(!enc.state.fingers[0].suppressed);
        assert_eq!(enc.state.polys[0].current_finger, Some(0));
    }
}
