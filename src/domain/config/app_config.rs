//! Application configuration value object

use std::path::PathBuf;
use std::time::Duration as StdDuration;

use serde::{Deserialize, Serialize};

use crate::domain::recording::{Duration, RecordingPolicy};

/// Default elapsed/countdown tick in milliseconds
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 250;

/// Accepted tick range; the upper bound keeps the display within a quarter second
pub const TICK_INTERVAL_RANGE_MS: (u64, u64) = (10, 250);

/// Default amplitude buffer length
pub const DEFAULT_SAMPLE_BUFFER_LEN: usize = 256;

/// Accepted amplitude buffer lengths (powers of two in this range)
pub const SAMPLE_BUFFER_RANGE: (usize, usize) = (32, 32768);

/// Application configuration.
/// All fields are optional to support partial configs and merging.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub time_limit: Option<String>,
    pub preparation: Option<String>,
    pub speaking_default: Option<String>,
    pub allow_re_record: Option<bool>,
    pub tick_interval_ms: Option<u64>,
    pub sample_buffer_len: Option<usize>,
    pub output_dir: Option<String>,
}

impl AppConfig {
    /// Create config with default values
    pub fn defaults() -> Self {
        Self {
            time_limit: None,
            preparation: None,
            speaking_default: Some(Duration::default_speaking().to_string()),
            allow_re_record: Some(true),
            tick_interval_ms: Some(DEFAULT_TICK_INTERVAL_MS),
            sample_buffer_len: Some(DEFAULT_SAMPLE_BUFFER_LEN),
            output_dir: None,
        }
    }

    /// Create an empty config (all None)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Merge this config with another, where other takes precedence.
    /// Only non-None values from other will override this.
    pub fn merge(self, other: Self) -> Self {
        Self {
            time_limit: other.time_limit.or(self.time_limit),
            preparation: other.preparation.or(self.preparation),
            speaking_default: other.speaking_default.or(self.speaking_default),
            allow_re_record: other.allow_re_record.or(self.allow_re_record),
            tick_interval_ms: other.tick_interval_ms.or(self.tick_interval_ms),
            sample_buffer_len: other.sample_buffer_len.or(self.sample_buffer_len),
            output_dir: other.output_dir.or(self.output_dir),
        }
    }

    /// Parsed time limit; unset or invalid means no explicit limit
    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit.as_ref().and_then(|s| s.parse().ok())
    }

    /// Parsed preparation window; unset or invalid means single-phase
    pub fn preparation(&self) -> Option<Duration> {
        self.preparation.as_ref().and_then(|s| s.parse().ok())
    }

    pub fn speaking_default_or_default(&self) -> Duration {
        self.speaking_default
            .as_ref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(Duration::default_speaking)
    }

    pub fn allow_re_record_or_default(&self) -> bool {
        self.allow_re_record.unwrap_or(true)
    }

    /// Tick interval, clamped to the accepted range
    pub fn tick_interval_or_default(&self) -> StdDuration {
        let (min, max) = TICK_INTERVAL_RANGE_MS;
        let ms = self
            .tick_interval_ms
            .unwrap_or(DEFAULT_TICK_INTERVAL_MS)
            .clamp(min, max);
        StdDuration::from_millis(ms)
    }

    /// Amplitude buffer length; invalid values fall back to the default
    pub fn sample_buffer_len_or_default(&self) -> usize {
        match self.sample_buffer_len {
            Some(len) if is_valid_sample_buffer_len(len) => len,
            _ => DEFAULT_SAMPLE_BUFFER_LEN,
        }
    }

    pub fn output_dir_or_default(&self) -> PathBuf {
        self.output_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Build the recording policy this configuration describes
    pub fn policy(&self) -> RecordingPolicy {
        let allow = self.allow_re_record_or_default();
        let policy = match self.preparation() {
            Some(prep) => RecordingPolicy::two_phase(allow, prep, self.time_limit()),
            None => RecordingPolicy::single_phase(allow, self.time_limit()),
        };
        policy.with_speaking_default(self.speaking_default_or_default())
    }
}

/// Whether `len` is an accepted amplitude buffer length
pub fn is_valid_sample_buffer_len(len: usize) -> bool {
    let (min, max) = SAMPLE_BUFFER_RANGE;
    len.is_power_of_two() && (min..=max).contains(&len)
}
