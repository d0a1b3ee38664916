//! Send-rate pacing
//!
//! A messages-per-minute budget becomes a fixed pause between sends. The
//! runner pauses after every send except the last one.

use std::time::Duration;

/// Seconds to pause between sends, 0 when unlimited
pub fn delay_seconds(rate_per_minute: f64) -> f64 {
    if !rate_per_minute.is_finite() || rate_per_minute <= 0.0 {
        return 0.0;
    }
    60.0 / rate_per_minute
}

/// Pause between sends as a [`Duration`], saturating at [`Duration::MAX`]
pub fn send_delay(rate_per_minute: f64) -> Duration {
    Duration::try_from_secs_f64(delay_seconds(rate_per_minute)).unwrap_or(Duration::MAX)
}

/// Whether the pause for `rate_per_minute` fits in a [`Duration`]
pub fn is_representable(rate_per_minute: f64) -> bool {
    Duration::try_from_secs_f64(delay_seconds(rate_per_minute)).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlimited() {
        assert_eq!(delay_seconds(0.0), 0.0);
        assert_eq!(delay_seconds(-5.0), 0.0);
        assert_eq!(delay_seconds(f64::NAN), 0.0);
        assert_eq!(send_delay(0.0), Duration::ZERO);
    }

    #[test]
    fn test_rates() {
        assert_eq!(delay_seconds(60.0), 1.0);
        assert_eq!(delay_seconds(30.0), 2.0);
        assert_eq!(delay_seconds(120.0), 0.5);
        assert_eq!(send_delay(240.0), Duration::from_millis(250));
    }

    #[test]
    fn test_tiny_rate_saturates() {
        assert_eq!(send_delay(1e-300), Duration::MAX);
        assert!(!is_representable(1e-300));
        assert!(is_representable(0.001));
        assert!(is_representable(0.0));
    }
}
