//! Duration value object

use std::fmt;
use std::str::FromStr;
use std::time::Duration as StdDuration;

use crate::domain::error::DurationParseError;

/// Speaking window used by two-phase questions without an explicit limit
pub const DEFAULT_SPEAKING_SECS: u64 = 60;

/// Whole-second span used for deadlines, preparation windows and time limits.
/// Immutable and validated on creation (never zero when parsed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Duration {
    seconds: u64,
}

impl Duration {
    /// Create a Duration from seconds
    pub const fn from_secs(secs: u64) -> Self {
        Self { seconds: secs }
    }

    /// Default speaking window for two-phase questions
    pub const fn default_speaking() -> Self {
        Self::from_secs(DEFAULT_SPEAKING_SECS)
    }

    /// Get duration in seconds
    pub const fn as_secs(&self) -> u64 {
        self.seconds
    }

    /// Get duration in milliseconds
    pub const fn as_millis(&self) -> u64 {
        self.seconds * 1000
    }

    /// Convert to std::time::Duration
    pub const fn as_std(&self) -> StdDuration {
        StdDuration::from_secs(self.seconds)
    }

    fn invalid(input: &str) -> DurationParseError {
        DurationParseError {
            input: input.to_string(),
        }
    }
}

impl FromStr for Duration {
    type Err = DurationParseError;

    /// Parse "30s", "1m", "2m30s" or "90s".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim().to_lowercase();

        let mut minutes: Option<u64> = None;
        let mut seconds: Option<u64> = None;
        let mut digits = String::new();

        for ch in input.chars() {
            match ch {
                '0'..='9' => digits.push(ch),
                'm' if !digits.is_empty() && minutes.is_none() && seconds.is_none() => {
                    minutes = Some(digits.parse().map_err(|_| Self::invalid(s))?);
                    digits.clear();
                }
                's' if !digits.is_empty() && seconds.is_none() => {
                    seconds = Some(digits.parse().map_err(|_| Self::invalid(s))?);
                    digits.clear();
                }
                _ => return Err(Self::invalid(s)),
            }
        }

        if !digits.is_empty() || (minutes.is_none() && seconds.is_none()) {
            return Err(Self::invalid(s));
        }

        let total = minutes
            .unwrap_or(0)
            .checked_mul(60)
            .and_then(|m| m.checked_add(seconds.unwrap_or(0)))
            .ok_or_else(|| Self::invalid(s))?;

        if total == 0 {
            return Err(Self::invalid(s));
        }

        Ok(Self::from_secs(total))
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let minutes = self.seconds / 60;
        let seconds = self.seconds % 60;

        match (minutes, seconds) {
            (0, s) => write!(f, "{}s", s),
            (m, 0) => write!(f, "{}m", m),
            (m, s) => write!(f, "{}m{}s", m, s),
        }
    }
}

impl Default for Duration {
    fn default() -> Self {
        Self::default_speaking()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_seconds_only() {
        let d: Duration = "30s".parse().unwrap();
        assert_eq!(d.as_secs(), 30);
        assert_eq!(d.as_millis(), 30_000);
    }

    #[test]
    fn parse_minutes_and_seconds() {
        let d: Duration = "2m30s".parse().unwrap();
        assert_eq!(d.as_secs(), 150);
        let d: Duration = "1M".parse().unwrap();
        assert_eq!(d.as_secs(), 60);
    }

    #[test]
    fn parse_with_whitespace() {
        let d: Duration = "  45s ".parse().unwrap();
        assert_eq!(d.as_secs(), 45);
    }

    #[test]
    fn parse_rejects_zero_and_garbage() {
        assert!("".parse::<Duration>().is_err());
        assert!("0s".parse::<Duration>().is_err());
        assert!("0m0s".parse::<Duration>().is_err());
        assert!("30".parse::<Duration>().is_err());
        assert!("30x".parse::<Duration>().is_err());
        assert!("1s2m".parse::<Duration>().is_err());
        assert!("1m1m".parse::<Duration>().is_err());
    }

    #[test]
    fn display_forms() {
        assert_eq!(Duration::from_secs(30).to_string(), "30s");
        assert_eq!(Duration::from_secs(120).to_string(), "2m");
        assert_eq!(Duration::from_secs(150).to_string(), "2m30s");
    }

    #[test]
    fn default_is_speaking_window() {
        assert_eq!(Duration::default().as_secs(), DEFAULT_SPEAKING_SECS);
        assert_eq!(Duration::from_secs(3).as_std(), StdDuration::from_secs(3));
    }
}
