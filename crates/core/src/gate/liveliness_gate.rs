use std::time::{Duration, Instant};

/// Where the liveliness check currently stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateState {
    /// First phase: waiting for a face within the phase deadline.
    AwaitingPresence,
    /// Second phase: waiting for a face again, on a fresh deadline.
    AwaitingSecondPresence,
    /// Both phases passed; capture is permitted until the next re-arm.
    Unlocked,
    /// A phase deadline expired; capture stays forbidden until re-armed.
    Failed,
}

/// Two-phase timed presence gate that decides when capture is allowed.
///
/// The gate unlocks only after a face has been observed at least once in
/// each of two back-to-back windows of `phase_length`. This is a presence
/// check, not motion analysis: a held, unmoving face passes both windows.
/// It blocks an empty chair, not a determined photograph of one.
///
/// The gate never reads the clock itself. Every transition is driven by an
/// `observe` tick carrying the caller's timestamp, so it composes with a
/// periodic preview tick instead of blocking the foreground.
///
/// The phase deadline is exclusive: a tick arriving at or after the
/// deadline fails the phase even if that tick saw a face.
pub struct LivelinessGate {
    state: GateState,
    phase_length: Duration,
    phase_started: Option<Instant>,
}

impl LivelinessGate {
    pub fn new(phase_length: Duration) -> Self {
        Self {
            state: GateState::AwaitingPresence,
            phase_length,
            phase_started: None,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn is_unlocked(&self) -> bool {
        self.state == GateState::Unlocked
    }

    /// Re-arms the gate: back to the first phase with a fresh timer.
    ///
    /// Called on retake and on explicit user restart, from any state.
    pub fn arm(&mut self, now: Instant) {
        self.state = GateState::AwaitingPresence;
        self.phase_started = Some(now);
    }

    /// Feeds one detection tick into the gate and returns the new state.
    ///
    /// `face_present` is whether this tick's detection result was
    /// non-empty. Terminal states ignore further ticks. A gate that was
    /// never armed starts its first phase at the first observed tick.
    pub fn observe(&mut self, now: Instant, face_present: bool) -> GateState {
        if matches!(self.state, GateState::Unlocked | GateState::Failed) {
            return self.state;
        }

        let started = *self.phase_started.get_or_insert(now);
        if now.duration_since(started) >= self.phase_length {
            self.state = GateState::Failed;
        } else if face_present {
            self.state = match self.state {
                GateState::AwaitingPresence => {
                    // Second phase runs on its own timer, from this tick
                    self.phase_started = Some(now);
                    GateState::AwaitingSecondPresence
                }
                _ => GateState::Unlocked,
            };
        }
        self.state
    }
}
