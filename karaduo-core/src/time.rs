//! Time and duration conversion utilities.
//!
//! Timestamps are `Duration` in memory and fractional seconds (`f64`) in
//! `manifest.json` / `alignment.json`; the serde helper modules here do the
//! conversion at the wire boundary.

use serde::{Deserialize, Deserializer, Serializer};
use std::time::Duration;

/// Extension trait for safe Duration conversions.
pub trait DurationExt {
    /// Convert duration to milliseconds as u64, saturating at `u64::MAX`.
    ///
    /// In practice, this is always safe because durations exceeding `u64::MAX`
    /// milliseconds would represent ~584 million years.
    fn as_millis_u64(&self) -> u64;
}

impl DurationExt for Duration {
    fn as_millis_u64(&self) -> u64 {
        u64::try_from(self.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Build a `Duration` from fractional seconds, clamping negative,
/// non-finite, and out-of-range input to zero.
///
/// Container metadata comes from untrusted archives, so a hostile
/// timestamp must never panic the loader.
#[must_use]
pub fn duration_from_secs(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
}

/// Serde adapter for required timestamps stored as seconds.
pub mod serde_secs {
    use super::{duration_from_secs, Deserialize, Deserializer, Duration, Serializer};

    /// # Errors
    ///
    /// Returns any error produced by the underlying serializer.
    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    /// # Errors
    ///
    /// Returns any error produced by the underlying deserializer.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Ok(duration_from_secs(secs))
    }
}

/// Serde adapter for optional timestamps stored as seconds.
///
/// Absence and `null` both map to `None`; a literal `0` is a real timestamp.
pub mod serde_opt_secs {
    use super::{duration_from_secs, Deserialize, Deserializer, Duration, Serializer};

    /// # Errors
    ///
    /// Returns any error produced by the underlying serializer.
    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&d.as_secs_f64()),
            None => serializer.serialize_none(),
        }
    }

    /// # Errors
    ///
    /// Returns any error produced by the underlying deserializer.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        let secs = Option::<f64>::deserialize(deserializer)?;
        Ok(secs.map(duration_from_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_millis_u64() {
        let duration = Duration::from_millis(1234);
        assert_eq!(duration.as_millis_u64(), 1234);
    }

    #[test]
    fn test_duration_from_secs() {
        assert_eq!(duration_from_secs(1.5), Duration::from_millis(1500));
        assert_eq!(duration_from_secs(0.0), Duration::ZERO);
    }

    #[test]
    fn test_duration_from_secs_negative_clamped() {
        assert_eq!(duration_from_secs(-3.0), Duration::ZERO);
    }

    #[test]
    fn test_duration_from_secs_non_finite_clamped() {
        assert_eq!(duration_from_secs(f64::NAN), Duration::ZERO);
        assert_eq!(duration_from_secs(f64::INFINITY), Duration::ZERO);
    }

    #[test]
    fn test_duration_from_secs_overflow_clamped() {
        assert_eq!(duration_from_secs(1e300), Duration::ZERO);
        assert_eq!(duration_from_secs(f64::MAX), Duration::ZERO);
    }
}
