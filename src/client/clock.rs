//! Phase clock for one HTTP exchange

use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};

/// Lifecycle transitions of an exchange, in temporal order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Name resolved
    Dns = 0,
    /// TCP connection established
    Tcp = 1,
    /// TLS handshake complete
    Tls = 2,
    /// Response head received
    FirstByte = 3,
    /// Body drained and connection closed
    LastByte = 4,
}

/// Durations of the five phases
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseDurations {
    pub dns_lookup: Duration,
    pub tcp_handshake: Duration,
    pub tls_handshake: Duration,
    pub first_byte: Duration,
    pub last_byte: Duration,
}

/// Records the instant of each phase transition.
///
/// A phase lasts from the previous recorded mark (or the start) to its own
/// mark. A phase that was never marked has zero duration and does not move
/// the reference point, so without a TLS mark the first byte is measured
/// from the TCP mark.
#[derive(Debug, Clone)]
pub struct PhaseClock {
    started: Instant,
    started_at: DateTime<Utc>,
    marks: [Option<Instant>; 5],
}

impl PhaseClock {
    /// Start the clock now
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
            started_at: Utc::now(),
            marks: [None; 5],
        }
    }

    /// Wall clock time the clock was started
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Record `phase` as complete now
    pub fn mark(&mut self, phase: Phase) {
        self.mark_at(phase, Instant::now());
    }

    /// Record `phase` as complete at `at`; the first mark of a phase wins
    pub fn mark_at(&mut self, phase: Phase, at: Instant) {
        let slot = &mut self.marks[phase as usize];
        if slot.is_none() {
            *slot = Some(at);
        }
    }

    pub fn is_marked(&self, phase: Phase) -> bool {
        self.marks[phase as usize].is_some()
    }

    /// Time since the clock was started
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Derive the phase durations from the recorded marks
    pub fn durations(&self) -> PhaseDurations {
        let mut reference = self.started;
        let mut spans = [Duration::ZERO; 5];

        for (span, mark) in spans.iter_mut().zip(self.marks.iter()) {
            if let Some(at) = mark {
                *span = at.saturating_duration_since(reference);
                reference = *at;
            }
        }

        PhaseDurations {
            dns_lookup: spans[0],
            tcp_handshake: spans[1],
            tls_handshake: spans[2],
            first_byte: spans[3],
            last_byte: spans[4],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clock_at(started: Instant) -> PhaseClock {
        PhaseClock {
            started,
            started_at: Utc::now(),
            marks: [None; 5],
        }
    }

    #[test]
    fn test_phases_follow_marks() {
        let t0 = Instant::now();
        let mut clock = clock_at(t0);
        clock.mark_at(Phase::Dns, t0 + Duration::from_millis(5));
        clock.mark_at(Phase::Tcp, t0 + Duration::from_millis(25));
        clock.mark_at(Phase::Tls, t0 + Duration::from_millis(60));
        clock.mark_at(Phase::FirstByte, t0 + Duration::from_millis(160));
        clock.mark_at(Phase::LastByte, t0 + Duration::from_millis(162));

        let d = clock.durations();
        assert_eq!(d.dns_lookup, Duration::from_millis(5));
        assert_eq!(d.tcp_handshake, Duration::from_millis(20));
        assert_eq!(d.tls_handshake, Duration::from_millis(35));
        assert_eq!(d.first_byte, Duration::from_millis(100));
        assert_eq!(d.last_byte, Duration::from_millis(2));
    }

    #[test]
    fn test_missing_tls_mark_is_zero() {
        let t0 = Instant::now();
        let mut clock = clock_at(t0);
        clock.mark_at(Phase::Dns, t0 + Duration::from_millis(1));
        clock.mark_at(Phase::Tcp, t0 + Duration::from_millis(3));
        clock.mark_at(Phase::FirstByte, t0 + Duration::from_millis(10));
        clock.mark_at(Phase::LastByte, t0 + Duration::from_millis(11));

        let d = clock.durations();
        assert_eq!(d.tls_handshake, Duration::ZERO);
        assert_eq!(d.first_byte, Duration::from_millis(7));
        assert!(!clock.is_marked(Phase::Tls));
    }

    #[test]
    fn test_first_mark_wins() {
        let t0 = Instant::now();
        let mut clock = clock_at(t0);
        clock.mark_at(Phase::Dns, t0 + Duration::from_millis(2));
        clock.mark_at(Phase::Dns, t0 + Duration::from_millis(9));
        assert_eq!(clock.durations().dns_lookup, Duration::from_millis(2));
    }

    #[test]
    fn test_unmarked_clock_is_all_zero() {
        let clock = PhaseClock::start();
        assert_eq!(clock.durations(), PhaseDurations::default());
    }
}
