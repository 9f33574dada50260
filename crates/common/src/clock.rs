//! Output timeline clock.
//!
//! Every QuickEdit composition is laid out on a single output timeline
//! measured in seconds from zero. This module provides:
//! - Half-open time ranges on that timeline
//! - The fixed frame clock used for instruction timing granularity

use serde::{Deserialize, Serialize};

/// Frame rate of every rendered composition.
pub const OUTPUT_FPS: u32 = 30;

/// A half-open range `[start, start + duration)` in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Start of the range (seconds).
    pub start: f64,
    /// Length of the range (seconds).
    pub duration: f64,
}

impl TimeRange {
    pub fn new(start: f64, duration: f64) -> Self {
        Self { start, duration }
    }

    /// Exclusive end of the range.
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    /// Whether `t` falls inside `[start, end)`.
    pub fn contains(&self, t: f64) -> bool {
        t >= self.start && t < self.end()
    }

    /// Whether two ranges share any instant.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end() && other.start < self.end()
    }

    /// The same length, moved to begin at `start`.
    pub fn placed_at(&self, start: f64) -> TimeRange {
        TimeRange {
            start,
            duration: self.duration,
        }
    }
}

/// Converts between output time and frame indices at a fixed rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameClock {
    fps: u32,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new(OUTPUT_FPS)
    }
}

impl FrameClock {
    /// Create a clock ticking at `fps` frames per second (minimum 1).
    pub fn new(fps: u32) -> Self {
        Self { fps: fps.max(1) }
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    /// Presentation time of a frame.
    pub fn time_of(&self, frame: u64) -> f64 {
        frame as f64 / self.fps as f64
    }

    /// Number of frames needed to cover `duration_secs`. Also the index of
    /// the first frame presented at or after `duration_secs`.
    pub fn frame_count(&self, duration_secs: f64) -> u64 {
        (duration_secs.max(0.0) * self.fps as f64).ceil() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_range_is_half_open() {
        let range = TimeRange::new(1.0, 2.0);
        assert_eq!(range.end(), 3.0);
        assert!(range.contains(1.0));
        assert!(range.contains(2.999));
        assert!(!range.contains(3.0));
        assert!(!range.contains(0.999));
    }

    #[test]
    fn test_time_range_overlap() {
        let a = TimeRange::new(0.0, 5.0);
        assert!(a.overlaps(&TimeRange::new(4.0, 2.0)));
        assert!(!a.overlaps(&TimeRange::new(5.0, 1.0)));
        assert_eq!(a.placed_at(3.0), TimeRange::new(3.0, 5.0));
    }

    #[test]
    fn test_frame_clock_defaults_to_thirty_fps() {
        let clock = FrameClock::default();
        assert_eq!(clock.fps(), 30);
    }

    #[test]
    fn test_frame_clock_conversions() {
        let clock = FrameClock::new(30);
        assert_eq!(clock.frame_count(5.0), 150);
        assert_eq!(clock.frame_count(0.01), 1);
        assert_eq!(clock.frame_count(1.0), 30);
        assert_eq!(clock.frame_count(-2.0), 0);
        assert!((clock.time_of(45) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_frame_clock_rejects_zero_rate() {
        assert_eq!(FrameClock::new(0).fps(), 1);
    }
}
