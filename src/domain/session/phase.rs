//! Preparation/speaking phase tracking for two-phase questions

use std::fmt;
use std::time::Duration as StdDuration;

use crate::domain::recording::Duration;

use super::capture::{CaptureState, InvalidStateTransition};

/// Question phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Preparation,
    Speaking,
    Done,
    /// Mirrors the wrapped capture session's error state
    Error,
}

impl Phase {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Preparation => "preparation",
            Self::Speaking => "speaking",
            Self::Done => "done",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Phase bookkeeping, independent of any timer.
///
///   PREPARATION -> SPEAKING (countdown reaches zero, or skip)
///   SPEAKING -> DONE (capture recorded)
///   any -> ERROR (capture failed)
///   DONE | ERROR -> SPEAKING (capture reset)
///   any -> PREPARATION (restart, two-phase only)
#[derive(Debug, Clone)]
pub struct PhaseTracker {
    phase: Phase,
    preparation: Option<Duration>,
    remaining_secs: u64,
    countdown_running: bool,
}

impl PhaseTracker {
    /// Two-phase questions start in PREPARATION with a full countdown;
    /// single-phase questions start directly in SPEAKING.
    pub fn new(preparation: Option<Duration>) -> Self {
        let mut tracker = Self {
            phase: Phase::Speaking,
            preparation,
            remaining_secs: 0,
            countdown_running: false,
        };
        tracker.restart();
        tracker
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn preparation_remaining_secs(&self) -> u64 {
        self.remaining_secs
    }

    pub fn is_countdown_running(&self) -> bool {
        self.countdown_running
    }

    pub fn is_two_phase(&self) -> bool {
        self.preparation.is_some()
    }

    fn invalid(&self, action: &str) -> InvalidStateTransition {
        // Phase errors reuse the capture transition error; report the
        // capture state the phase implies.
        let current_state = match self.phase {
            Phase::Done => CaptureState::Recorded,
            Phase::Error => CaptureState::Error,
            Phase::Preparation | Phase::Speaking => CaptureState::Idle,
        };
        InvalidStateTransition {
            current_state,
            action: format!("{} during {} phase", action, self.phase),
        }
    }

    /// Mark the preparation countdown as running
    pub fn begin_countdown(&mut self) -> Result<(), InvalidStateTransition> {
        if self.phase != Phase::Preparation || self.countdown_running {
            return Err(self.invalid("begin preparation countdown"));
        }
        self.countdown_running = true;
        Ok(())
    }

    /// Recompute the remaining preparation time from the time since the
    /// countdown began. Returns `true` when this update entered SPEAKING.
    pub fn update_countdown(
        &mut self,
        since_start: StdDuration,
    ) -> Result<bool, InvalidStateTransition> {
        if self.phase != Phase::Preparation || !self.countdown_running {
            return Err(self.invalid("tick preparation countdown"));
        }
        let total = self.preparation.map(|d| d.as_secs()).unwrap_or(0);
        self.remaining_secs = total.saturating_sub(since_start.as_secs());
        if self.remaining_secs == 0 {
            self.enter_speaking();
            return Ok(true);
        }
        Ok(false)
    }

    /// Jump straight to SPEAKING
    pub fn skip(&mut self) -> Result<(), InvalidStateTransition> {
        if self.phase != Phase::Preparation {
            return Err(self.invalid("skip preparation"));
        }
        self.enter_speaking();
        Ok(())
    }

    fn enter_speaking(&mut self) {
        self.remaining_secs = 0;
        self.countdown_running = false;
        self.phase = Phase::Speaking;
    }

    /// Wrapped capture reached RECORDED
    pub fn capture_recorded(&mut self) {
        if self.phase == Phase::Speaking {
            self.phase = Phase::Done;
        }
    }

    /// Wrapped capture reached ERROR
    pub fn capture_failed(&mut self) {
        self.countdown_running = false;
        self.phase = Phase::Error;
    }

    /// Wrapped capture went back to IDLE on its own
    pub fn capture_reset(&mut self) {
        if matches!(self.phase, Phase::Done | Phase::Error) {
            self.phase = Phase::Speaking;
        }
    }

    /// Back to the start of the question: full preparation for two-phase
    /// questions, SPEAKING otherwise.
    pub fn restart(&mut self) {
        self.countdown_running = false;
        match self.preparation {
            Some(preparation) => {
                self.phase = Phase::Preparation;
                self.remaining_secs = preparation.as_secs();
            }
            None => self.enter_speaking(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_phase(secs: u64) -> PhaseTracker {
        PhaseTracker::new(Some(Duration::from_secs(secs)))
    }

    #[test]
    fn two_phase_starts_in_preparation() {
        let tracker = two_phase(60);
        assert_eq!(tracker.phase(), Phase::Preparation);
        assert_eq!(tracker.preparation_remaining_secs(), 60);
        assert!(!tracker.is_countdown_running());
    }

    #[test]
    fn single_phase_starts_speaking() {
        let tracker = PhaseTracker::new(None);
        assert_eq!(tracker.phase(), Phase::Speaking);
        assert_eq!(tracker.preparation_remaining_secs(), 0);
    }

    #[test]
    fn countdown_requires_begin() {
        let mut tracker = two_phase(10);
        assert!(tracker.update_countdown(StdDuration::from_secs(1)).is_err());
        tracker.begin_countdown().unwrap();
        assert!(tracker.begin_countdown().is_err());
    }

    #[test]
    fn countdown_reaches_speaking() {
        let mut tracker = two_phase(10);
        tracker.begin_countdown().unwrap();

        assert!(!tracker.update_countdown(StdDuration::from_millis(3_500)).unwrap());
        assert_eq!(tracker.preparation_remaining_secs(), 7);

        assert!(tracker.update_countdown(StdDuration::from_secs(10)).unwrap());
        assert_eq!(tracker.phase(), Phase::Speaking);
        assert_eq!(tracker.preparation_remaining_secs(), 0);
        assert!(!tracker.is_countdown_running());
    }

    #[test]
    fn suspended_countdown_resolves_in_one_update() {
        let mut tracker = two_phase(60);
        tracker.begin_countdown().unwrap();
        assert!(tracker.update_countdown(StdDuration::from_secs(3_600)).unwrap());
        assert_eq!(tracker.phase(), Phase::Speaking);
    }

    #[test]
    fn skip_only_from_preparation() {
        let mut tracker = two_phase(60);
        tracker.skip().unwrap();
        assert_eq!(tracker.phase(), Phase::Speaking);
        assert!(tracker.skip().is_err());
    }

    #[test]
    fn recorded_then_restart() {
        let mut tracker = two_phase(45);
        tracker.skip().unwrap();
        tracker.capture_recorded();
        assert_eq!(tracker.phase(), Phase::Done);

        tracker.restart();
        assert_eq!(tracker.phase(), Phase::Preparation);
        assert_eq!(tracker.preparation_remaining_secs(), 45);
    }

    #[test]
    fn recorded_ignored_outside_speaking() {
        let mut tracker = two_phase(45);
        tracker.capture_recorded();
        assert_eq!(tracker.phase(), Phase::Preparation);
    }

    #[test]
    fn error_then_reset_returns_to_speaking() {
        let mut tracker = PhaseTracker::new(None);
        tracker.capture_failed();
        assert_eq!(tracker.phase(), Phase::Error);
        tracker.capture_reset();
        assert_eq!(tracker.phase(), Phase::Speaking);
    }

    #[test]
    fn invalid_transition_names_phase() {
        let mut tracker = PhaseTracker::new(None);
        let err = tracker.skip().unwrap_err();
        assert!(err.action.contains("speaking"));
    }
}
