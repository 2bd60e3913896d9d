//! Progress aggregation for pipeline runs.
//!
//! Converts heterogeneous sub-task progress (seconds transcribed, bytes
//! downloaded) into a single monotonically non-decreasing percentage.
//! Arithmetic caps at 99; reaching 100 is an explicit act of the stage
//! driver, never a rounding artifact.

/// Tracks fractional progress of a single stage.
///
/// Pure apart from remembering the last emitted value, which it uses to
/// clamp output so it never decreases within a run.
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    last: u8,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update with cumulative processed duration over total duration.
    ///
    /// Returns an integer percentage in `[0, 99]`. If `total_seconds` is
    /// zero or unknown the previous value is returned unchanged (division
    /// by zero never propagates).
    pub fn update(&mut self, processed_seconds: f64, total_seconds: f64) -> u8 {
        if total_seconds <= 0.0 || !total_seconds.is_finite() {
            return self.last;
        }

        let ratio = (processed_seconds.max(0.0) / total_seconds).clamp(0.0, 1.0);
        let percent = ((ratio * 100.0) as u8).min(99);

        self.last = self.last.max(percent);
        self.last
    }
}

/// A stage's sub-range of the global 0–100 scale.
///
/// When stages are weighted (e.g. acquisition 0–10, transcription 10–90,
/// synthesis 90–100), a stage-local percentage maps into the global range
/// by linear interpolation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageSpan {
    pub start: u8,
    pub end: u8,
}

impl StageSpan {
    pub const fn new(start: u8, end: u8) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    /// Map a stage-local percentage (0–100) into this span.
    pub fn map(&self, local_percent: u8) -> u8 {
        let local = local_percent.min(100) as u32;
        let width = (self.end - self.start) as u32;
        self.start + (width * local / 100) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_and_capped() {
        let mut tracker = ProgressTracker::new();
        assert_eq!(tracker.update(30.0, 120.0), 25);
        assert_eq!(tracker.update(75.0, 120.0), 62);
        // Full duration processed still caps at 99; 100 is the driver's call.
        assert_eq!(tracker.update(120.0, 120.0), 99);
        // A late, smaller input never moves progress backwards.
        assert_eq!(tracker.update(10.0, 120.0), 99);
    }

    #[test]
    fn test_zero_total_returns_previous() {
        let mut tracker = ProgressTracker::new();
        assert_eq!(tracker.update(5.0, 0.0), 0);
        tracker.update(60.0, 120.0);
        assert_eq!(tracker.update(90.0, 0.0), 50);
        assert_eq!(tracker.update(90.0, f64::NAN), 50);
    }

    #[test]
    fn test_negative_and_overshoot_inputs_clamped() {
        let mut tracker = ProgressTracker::new();
        assert_eq!(tracker.update(-5.0, 120.0), 0);
        assert_eq!(tracker.update(500.0, 120.0), 99);
    }

    #[test]
    fn test_nondecreasing_over_sequence() {
        let mut tracker = ProgressTracker::new();
        let mut previous = 0;
        for i in 0..200 {
            let emitted = tracker.update(i as f64, 180.0);
            assert!(emitted >= previous);
            assert!(emitted <= 99);
            previous = emitted;
        }
    }

    #[test]
    fn test_span_interpolation() {
        let transcription = StageSpan::new(10, 90);
        assert_eq!(transcription.map(0), 10);
        assert_eq!(transcription.map(50), 50);
        assert_eq!(transcription.map(100), 90);
        assert_eq!(transcription.map(255), 90);

        let synthesis = StageSpan::new(90, 100);
        assert_eq!(synthesis.map(50), 95);
    }
}
