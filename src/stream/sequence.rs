//! Sequence tracking and gap detection.

/// Outcome of observing one sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeqCheck {
    /// Exactly the next number, or the first event of a fresh session.
    Continuous,
    /// One or more events were skipped.
    GapDetected { expected: u64, received: u64 },
    /// Same number as the previous event (replayed after reconnect).
    Duplicate,
    /// Lower than the previous number; the producer's counter restarted.
    Regressed { previous: u64, received: u64 },
}

impl SeqCheck {
    /// Whether dependent views must be resynchronized from scratch.
    pub fn requires_resync(&self) -> bool {
        matches!(
            self,
            SeqCheck::GapDetected { .. } | SeqCheck::Regressed { .. }
        )
    }
}

/// Tracks the last-seen sequence number of a feed.
///
/// Zero is the "nothing seen yet" sentinel: the first event after it is
/// never a gap, since the server already replayed from that point.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequenceTracker {
    last_seq: u64,
}

impl SequenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_seq(&self) -> u64 {
        self.last_seq
    }

    /// Classify `seq` against the last one seen, then advance to it.
    pub fn observe(&mut self, seq: u64) -> SeqCheck {
        let previous = self.last_seq;
        self.last_seq = seq;

        if previous == 0 {
            return SeqCheck::Continuous;
        }
        match seq {
            s if s == previous => SeqCheck::Duplicate,
            s if s < previous => SeqCheck::Regressed {
                previous,
                received: s,
            },
            s if s > previous + 1 => SeqCheck::GapDetected {
                expected: previous + 1,
                received: s,
            },
            _ => SeqCheck::Continuous,
        }
    }
}
