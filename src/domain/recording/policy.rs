//! Recording policy value object

use super::duration::Duration;

/// Immutable timing and re-record rules for one question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordingPolicy {
    /// Whether a finished response may be discarded and recorded again
    pub allow_re_record: bool,
    /// Explicit speaking deadline
    pub time_limit: Option<Duration>,
    /// Silent preparation window; present only for two-phase questions
    pub preparation: Option<Duration>,
    /// Speaking deadline for two-phase questions without a `time_limit`
    pub speaking_default: Duration,
}

impl RecordingPolicy {
    /// Single-phase policy: record directly, optionally against a deadline.
    pub fn single_phase(allow_re_record: bool, time_limit: Option<Duration>) -> Self {
        Self {
            allow_re_record,
            time_limit,
            preparation: None,
            speaking_default: Duration::default_speaking(),
        }
    }

    /// Two-phase policy: a preparation window followed by a speaking window.
    pub fn two_phase(
        allow_re_record: bool,
        preparation: Duration,
        time_limit: Option<Duration>,
    ) -> Self {
        Self {
            allow_re_record,
            time_limit,
            preparation: Some(preparation),
            speaking_default: Duration::default_speaking(),
        }
    }

    /// Override the speaking default used when no explicit limit is set
    pub fn with_speaking_default(mut self, speaking_default: Duration) -> Self {
        self.speaking_default = speaking_default;
        self
    }

    pub fn is_two_phase(&self) -> bool {
        self.preparation.is_some()
    }

    /// Deadline handed to the capture engine.
    ///
    /// Single-phase questions use the explicit limit (or none); two-phase
    /// questions always have one, falling back to `speaking_default`.
    pub fn effective_deadline(&self) -> Option<Duration> {
        if self.is_two_phase() {
            Some(self.time_limit.unwrap_or(self.speaking_default))
        } else {
            self.time_limit
        }
    }
}

impl Default for RecordingPolicy {
    fn default() -> Self {
        Self::single_phase(true, None)
    }
}
