//! Frame-rate to interval conversion and capture cadence tracking

use std::time::{Duration, Instant};

/// Convert a frame rate to a millisecond interval.
///
/// Rounds half-up to the nearest millisecond and never returns less than 1.
/// A rate of exactly zero maps to 0, meaning "pacing disabled"; callers that
/// must not be disabled reject zero before getting here.
pub fn fps_to_interval_ms(fps: f64) -> u64 {
    if fps == 0.0 {
        return 0;
    }
    // float to int `as` casts saturate at u64::MAX
    ((1000.0 / fps + 0.5).floor() as u64).max(1)
}

/// Tracks when the last capture was attempted.
#[derive(Debug, Default, Clone)]
pub struct Pacer {
    last_capture_at: Option<Instant>,
}

impl Pacer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `interval_ms` has elapsed since the last capture.
    ///
    /// Nothing captured yet counts as due. A zero interval is never due.
    pub fn is_due(&self, now: Instant, interval_ms: u64) -> bool {
        if interval_ms == 0 {
            return false;
        }
        match self.last_capture_at {
            None => true,
            Some(last) => {
                now.saturating_duration_since(last) >= Duration::from_millis(interval_ms)
            }
        }
    }

    pub fn mark(&mut self, now: Instant) {
        self.last_capture_at = Some(now);
    }

    pub fn last_capture_at(&self) -> Option<Instant> {
        self.last_capture_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_half_up() {
        assert_eq!(fps_to_interval_ms(15.0), 67);
        assert_eq!(fps_to_interval_ms(30.0), 33);
        assert_eq!(fps_to_interval_ms(60.0), 17);
        assert_eq!(fps_to_interval_ms(1.0), 1000);
        assert_eq!(fps_to_interval_ms(0.1), 10000);
        // 1000 / 400 = 2.5 rounds up
        assert_eq!(fps_to_interval_ms(400.0), 3);
    }

    #[test]
    fn clamps_to_one_millisecond() {
        assert_eq!(fps_to_interval_ms(5000.0), 1);
    }

    #[test]
    fn slow_rates_keep_full_interval() {
        assert_eq!(fps_to_interval_ms(1e-7), 10_000_000_000);
        assert_eq!(fps_to_interval_ms(1e-3), 1_000_000);
        assert_eq!(fps_to_interval_ms(f64::MIN_POSITIVE), u64::MAX);
    }

    #[test]
    fn zero_is_disabled() {
        assert_eq!(fps_to_interval_ms(0.0), 0);
    }

    #[test]
    fn pacer_due_after_interval() {
        let t0 = Instant::now();
        let mut pacer = Pacer::new();
        assert!(pacer.is_due(t0, 67));
        pacer.mark(t0);
        assert!(!pacer.is_due(t0 + Duration::from_millis(66), 67));
        assert!(pacer.is_due(t0 + Duration::from_millis(67), 67));
    }

    #[test]
    fn pacer_waits_out_long_intervals() {
        let t0 = Instant::now();
        let mut pacer = Pacer::new();
        pacer.mark(t0);
        let interval = 10_000_000_000;
        assert!(!pacer.is_due(t0 + Duration::from_millis(u32::MAX as u64 + 1), interval));
        assert!(pacer.is_due(t0 + Duration::from_millis(interval), interval));
    }

    #[test]
    fn zero_interval_never_due() {
        let pacer = Pacer::new();
        assert!(!pacer.is_due(Instant::now(), 0));
    }
}
