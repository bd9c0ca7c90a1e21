//! Capture session state machine

use std::fmt;
use std::time::Duration as StdDuration;

use thiserror::Error;

use crate::domain::error::CaptureErrorKind;
use crate::domain::recording::{Artifact, Duration};

/// Capture states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CaptureState {
    #[default]
    Idle,
    RequestingDevice,
    Recording,
    Recorded,
    Error,
}

impl CaptureState {
    /// Get the string representation
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::RequestingDevice => "requesting_device",
            Self::Recording => "recording",
            Self::Recorded => "recorded",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error when an invalid state transition is attempted
#[derive(Debug, Clone, Error)]
#[error("Invalid state transition: cannot {action} while in {current_state} state")]
pub struct InvalidStateTransition {
    pub current_state: CaptureState,
    pub action: String,
}

/// Result of recomputing elapsed time on a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElapsedUpdate {
    pub elapsed_secs: u64,
    /// Whether the visible seconds value moved
    pub changed: bool,
    pub deadline_reached: bool,
}

/// One response attempt.
///
/// State machine:
///   IDLE -> REQUESTING_DEVICE (begin_request)
///   REQUESTING_DEVICE -> RECORDING (device_granted)
///   REQUESTING_DEVICE | RECORDING -> ERROR (fail)
///   RECORDING -> RECORDED (finish)
///   any but REQUESTING_DEVICE -> IDLE (reset)
///
/// RECORDED and ERROR may also `begin_request` again, except when the
/// policy forbids re-recording and a response has been recorded (locked).
#[derive(Debug, Clone)]
pub struct CaptureSession {
    state: CaptureState,
    elapsed_secs: u64,
    deadline: Option<Duration>,
    allow_re_record: bool,
    artifact: Option<Artifact>,
    error: Option<CaptureErrorKind>,
}

impl CaptureSession {
    /// Create a new session in idle state. The deadline is fixed for life.
    pub fn new(deadline: Option<Duration>, allow_re_record: bool) -> Self {
        Self {
            state: CaptureState::Idle,
            elapsed_secs: 0,
            deadline,
            allow_re_record,
            artifact: None,
            error: None,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed_secs
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    pub fn allow_re_record(&self) -> bool {
        self.allow_re_record
    }

    pub fn artifact(&self) -> Option<&Artifact> {
        self.artifact.as_ref()
    }

    pub fn error(&self) -> Option<&CaptureErrorKind> {
        self.error.as_ref()
    }

    /// A recorded response that policy forbids replacing
    pub fn is_locked(&self) -> bool {
        self.state == CaptureState::Recorded && !self.allow_re_record
    }

    /// Remaining seconds before the deadline, if there is one
    pub fn remaining_secs(&self) -> Option<u64> {
        self.deadline
            .map(|d| d.as_secs().saturating_sub(self.elapsed_secs))
    }

    fn invalid(&self, action: &str) -> InvalidStateTransition {
        InvalidStateTransition {
            current_state: self.state,
            action: action.to_string(),
        }
    }

    /// Transition into REQUESTING_DEVICE, clearing any prior attempt
    pub fn begin_request(&mut self) -> Result<(), InvalidStateTransition> {
        match self.state {
            CaptureState::Idle | CaptureState::Error => {}
            CaptureState::Recorded if self.allow_re_record => {}
            CaptureState::Recorded => return Err(self.invalid("start (response is locked)")),
            CaptureState::RequestingDevice | CaptureState::Recording => {
                return Err(self.invalid("start"))
            }
        }
        self.artifact = None;
        self.error = None;
        self.elapsed_secs = 0;
        self.state = CaptureState::RequestingDevice;
        Ok(())
    }

    /// Transition from REQUESTING_DEVICE to RECORDING
    pub fn device_granted(&mut self) -> Result<(), InvalidStateTransition> {
        if self.state != CaptureState::RequestingDevice {
            return Err(self.invalid("enter recording"));
        }
        self.elapsed_secs = 0;
        self.state = CaptureState::Recording;
        Ok(())
    }

    /// Recompute elapsed seconds from the time since capture began.
    ///
    /// Never moves backwards and never reports more than the deadline, so a
    /// long suspension is reconciled in a single update.
    pub fn update_elapsed(
        &mut self,
        since_start: StdDuration,
    ) -> Result<ElapsedUpdate, InvalidStateTransition> {
        if self.state != CaptureState::Recording {
            return Err(self.invalid("tick"));
        }

        let mut secs = since_start.as_secs().max(self.elapsed_secs);
        let mut deadline_reached = false;
        if let Some(deadline) = self.deadline {
            if secs >= deadline.as_secs() {
                secs = deadline.as_secs();
                deadline_reached = true;
            }
        }

        let changed = secs != self.elapsed_secs;
        self.elapsed_secs = secs;

        Ok(ElapsedUpdate {
            elapsed_secs: secs,
            changed,
            deadline_reached,
        })
    }

    /// Transition from RECORDING to RECORDED with the finished artifact
    pub fn finish(&mut self, artifact: Artifact) -> Result<(), InvalidStateTransition> {
        if self.state != CaptureState::Recording {
            return Err(self.invalid("finish recording"));
        }
        self.artifact = Some(artifact);
        self.state = CaptureState::Recorded;
        Ok(())
    }

    /// Transition from REQUESTING_DEVICE or RECORDING to ERROR.
    /// Any partial artifact is discarded.
    pub fn fail(&mut self, kind: CaptureErrorKind) -> Result<(), InvalidStateTransition> {
        match self.state {
            CaptureState::RequestingDevice | CaptureState::Recording => {
                self.artifact = None;
                self.error = Some(kind);
                self.state = CaptureState::Error;
                Ok(())
            }
            _ => Err(self.invalid("fail")),
        }
    }

    /// Return to IDLE from anything except REQUESTING_DEVICE
    pub fn reset(&mut self) -> Result<(), InvalidStateTransition> {
        if self.state == CaptureState::RequestingDevice {
            return Err(self.invalid("reset"));
        }
        self.artifact = None;
        self.error = None;
        self.elapsed_secs = 0;
        self.state = CaptureState::Idle;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::recording::AudioMimeType;

    fn artifact() -> Artifact {
        Artifact::new(vec![1, 2, 3], AudioMimeType::Pcm, 0)
    }

    fn recording(deadline: Option<u64>, allow_re_record: bool) -> CaptureSession {
        let mut session = CaptureSession::new(deadline.map(Duration::from_secs), allow_re_record);
        session.begin_request().unwrap();
        session.device_granted().unwrap();
        session
    }

    #[test]
    fn new_session_is_idle() {
        let session = CaptureSession::new(None, true);
        assert_eq!(session.state(), CaptureState::Idle);
        assert_eq!(session.elapsed_secs(), 0);
        assert!(session.artifact().is_none());
        assert!(session.error().is_none());
    }

    #[test]
    fn happy_path() {
        let mut session = recording(None, true);
        assert_eq!(session.state(), CaptureState::Recording);

        session.finish(artifact()).unwrap();
        assert_eq!(session.state(), CaptureState::Recorded);
        assert!(session.artifact().is_some());
    }

    #[test]
    fn start_while_requesting_or_recording_fails() {
        let mut session = CaptureSession::new(None, true);
        session.begin_request().unwrap();
        let err = session.begin_request().unwrap_err();
        assert_eq!(err.current_state, CaptureState::RequestingDevice);

        session.device_granted().unwrap();
        let err = session.begin_request().unwrap_err();
        assert_eq!(err.current_state, CaptureState::Recording);
    }

    #[test]
    fn locked_session_rejects_start() {
        let mut session = recording(Some(30), false);
        session.finish(artifact()).unwrap();
        assert!(session.is_locked());

        let before = session.artifact().unwrap().reference();
        let err = session.begin_request().unwrap_err();
        assert!(err.action.contains("locked"));
        assert_eq!(session.state(), CaptureState::Recorded);
        assert_eq!(session.artifact().unwrap().reference(), before);
    }

    #[test]
    fn re_record_clears_previous_attempt() {
        let mut session = recording(None, true);
        session.update_elapsed(StdDuration::from_secs(5)).unwrap();
        session.finish(artifact()).unwrap();

        session.begin_request().unwrap();
        assert_eq!(session.state(), CaptureState::RequestingDevice);
        assert!(session.artifact().is_none());
        assert_eq!(session.elapsed_secs(), 0);
    }

    #[test]
    fn elapsed_is_derived_and_monotonic() {
        let mut session = recording(None, true);
        let update = session.update_elapsed(StdDuration::from_millis(2_400)).unwrap();
        assert_eq!(update.elapsed_secs, 2);
        assert!(update.changed);

        let update = session.update_elapsed(StdDuration::from_millis(2_900)).unwrap();
        assert!(!update.changed);

        // A clock hiccup never moves the counter backwards
        let update = session.update_elapsed(StdDuration::from_secs(1)).unwrap();
        assert_eq!(update.elapsed_secs, 2);
    }

    #[test]
    fn deadline_clamps_after_suspension() {
        let mut session = recording(Some(30), true);
        let update = session.update_elapsed(StdDuration::from_secs(500)).unwrap();
        assert!(update.deadline_reached);
        assert_eq!(update.elapsed_secs, 30);
        assert_eq!(session.remaining_secs(), Some(0));
    }

    #[test]
    fn tick_outside_recording_fails() {
        let mut session = CaptureSession::new(None, true);
        assert!(session.update_elapsed(StdDuration::from_secs(1)).is_err());
    }

    #[test]
    fn fail_discards_and_records_kind() {
        let mut session = CaptureSession::new(None, true);
        session.begin_request().unwrap();
        session.fail(CaptureErrorKind::PermissionDenied).unwrap();
        assert_eq!(session.state(), CaptureState::Error);
        assert_eq!(session.error(), Some(&CaptureErrorKind::PermissionDenied));

        // Errors are recoverable with reset
        session.reset().unwrap();
        assert_eq!(session.state(), CaptureState::Idle);
        assert!(session.error().is_none());
    }

    #[test]
    fn fail_from_idle_is_invalid() {
        let mut session = CaptureSession::new(None, true);
        assert!(session.fail(CaptureErrorKind::DeviceNotFound).is_err());
    }

    #[test]
    fn reset_not_allowed_while_requesting() {
        let mut session = CaptureSession::new(None, true);
        session.begin_request().unwrap();
        let err = session.reset().unwrap_err();
        assert_eq!(err.current_state, CaptureState::RequestingDevice);
    }

    #[test]
    fn reset_unlocks_locked_session() {
        let mut session = recording(Some(30), false);
        session.finish(artifact()).unwrap();
        session.reset().unwrap();
        assert!(!session.is_locked());
        assert!(session.begin_request().is_ok());
    }

    #[test]
    fn state_display() {
        assert_eq!(CaptureState::RequestingDevice.to_string(), "requesting_device");
        assert_eq!(CaptureState::Recorded.to_string(), "recorded");
    }

    #[test]
    fn error_display() {
        let err = InvalidStateTransition {
            current_state: CaptureState::Recording,
            action: "reset".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("reset"));
        assert!(msg.contains("recording"));
    }
}
