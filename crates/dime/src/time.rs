//! Time utilities for DiME.
//!
//! Timestamps are UTC with microsecond precision and are written as
//! RFC 3339 strings (`2024-01-01T12:00:00.000000Z`) inside claims.

use chrono::{DateTime, Datelike, SecondsFormat, SubsecRound, TimeDelta, Utc};

use crate::error::{DimeError, Result};

/// Return the current time, truncated to microseconds so that it survives
/// a round trip through the textual claim form unchanged.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Latest year a claim timestamp may carry.
const MAX_YEAR: i32 = 9999;

/// `time` moved by `seconds`, or `InvalidArgument` when the result leaves
/// the range a claim timestamp can hold.
pub fn offset(time: &DateTime<Utc>, seconds: i64) -> Result<DateTime<Utc>> {
    TimeDelta::try_seconds(seconds)
        .and_then(|delta| time.checked_add_signed(delta))
        .filter(|t| t.year() <= MAX_YEAR)
        .ok_or_else(|| {
            DimeError::InvalidArgument(format!("{seconds} seconds is out of range"))
        })
}

/// `time` moved by `seconds`, clamped to the representable range.
fn saturating_offset(time: &DateTime<Utc>, seconds: i64) -> DateTime<Utc> {
    TimeDelta::try_seconds(seconds)
        .and_then(|delta| time.checked_add_signed(delta))
        .unwrap_or(if seconds < 0 {
            DateTime::<Utc>::MIN_UTC
        } else {
            DateTime::<Utc>::MAX_UTC
        })
}

/// Format a timestamp the way it is stored in claims.
pub fn to_timestamp(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a claim timestamp.
pub fn from_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| DimeError::Format(format!("invalid timestamp '{value}': {e}")))
}

/// Clock-skew policy applied when checking validity windows.
///
/// `time_modifier` shifts "now" by a number of seconds (positive values move
/// the local clock forward). `grace_period` is the number of seconds an
/// expired (or not yet valid) timestamp is still tolerated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClockPolicy {
    pub time_modifier: i64,
    pub grace_period: i64,
}

impl ClockPolicy {
    pub fn new(time_modifier: i64, grace_period: i64) -> Self {
        Self {
            time_modifier,
            grace_period,
        }
    }

    /// The adjusted current time. Also used to stamp items issued under
    /// this policy, so stamping and checking agree.
    pub fn now(&self) -> DateTime<Utc> {
        saturating_offset(&now(), self.time_modifier)
    }

    /// Check that `now` falls inside `[issued_at, expires_at]`, widened on
    /// both ends by the grace period.
    pub fn check_validity(
        &self,
        issued_at: Option<&DateTime<Utc>>,
        expires_at: Option<&DateTime<Utc>>,
    ) -> Result<()> {
        let now = self.now();
        if let Some(iat) = issued_at {
            if *iat > saturating_offset(&now, self.grace_period) {
                return Err(DimeError::Expired(format!(
                    "issued at {} is in the future",
                    to_timestamp(iat)
                )));
            }
        }
        if let Some(exp) = expires_at {
            if now > saturating_offset(exp, self.grace_period) {
                return Err(DimeError::Expired(format!(
                    "expired at {}",
                    to_timestamp(exp)
                )));
            }
        }
        Ok(())
    }
}
