//! Frame timing and FPS aggregation.

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Number of most-recent inter-frame intervals kept for the FPS average.
pub const FRAME_TIMING_CAPACITY: usize = 10;

pub const DEFAULT_FPS_REPORT_INTERVAL: Duration = Duration::from_millis(150);

/// Bounded FIFO of inter-frame intervals.
#[derive(Debug, Clone, Default)]
pub struct FrameTimingWindow {
    intervals: VecDeque<Duration>,
}

impl FrameTimingWindow {
    pub fn new() -> Self {
        Self {
            intervals: VecDeque::with_capacity(FRAME_TIMING_CAPACITY + 1),
        }
    }

    /// Appends `interval`, evicting the oldest entry once full.
    pub fn push(&mut self, interval: Duration) {
        self.intervals.push_back(interval);
        if self.intervals.len() > FRAME_TIMING_CAPACITY {
            self.intervals.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Duration> + '_ {
        self.intervals.iter().copied()
    }

    pub fn average(&self) -> Option<Duration> {
        if self.intervals.is_empty() {
            return None;
        }
        let total: Duration = self.intervals.iter().sum();
        Some(total / self.intervals.len() as u32)
    }

    /// `1000 / average_interval_ms`, or `None` before any interval was recorded.
    pub fn fps(&self) -> Option<f64> {
        let avg = self.average()?;
        if avg.is_zero() {
            return None;
        }
        Some(1.0 / avg.as_secs_f64())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FpsPrecision {
    /// Rounded to the nearest integer.
    #[default]
    Integer,
    OneDecimal,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FpsReading {
    pub fps: f64,
    pub precision: FpsPrecision,
}

impl fmt::Display for FpsReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.precision {
            FpsPrecision::Integer => write!(f, "{} fps", self.fps.round() as u64),
            FpsPrecision::OneDecimal => write!(f, "{:.1} fps", self.fps),
        }
    }
}

/// Samples frame start times and reports FPS on its own cadence, independent of frame cadence.
#[derive(Debug, Clone)]
pub struct FpsMeter {
    window: FrameTimingWindow,
    last_frame_start: Option<Duration>,
    report_interval: Duration,
    next_report: Option<Duration>,
    precision: FpsPrecision,
}

impl FpsMeter {
    pub fn new(report_interval: Duration, precision: FpsPrecision) -> Self {
        Self {
            window: FrameTimingWindow::new(),
            last_frame_start: None,
            report_interval,
            next_report: None,
            precision,
        }
    }

    pub fn window(&self) -> &FrameTimingWindow {
        &self.window
    }

    pub fn record_frame_start(&mut self, now: Duration) {
        if let Some(prev) = self.last_frame_start {
            self.window.push(now.saturating_sub(prev));
        }
        self.last_frame_start = Some(now);
    }

    pub fn reading(&self) -> Option<FpsReading> {
        self.window.fps().map(|fps| FpsReading {
            fps,
            precision: self.precision,
        })
    }

    /// Deadline of the next report, once the cadence has been anchored.
    pub fn next_report(&self) -> Option<Duration> {
        self.next_report
    }

    /// Returns a reading when a report is due and there is data to show.
    ///
    /// The first call anchors the cadence. Missed report slots are skipped, not replayed.
    pub fn poll_report(&mut self, now: Duration) -> Option<FpsReading> {
        let Some(mut next) = self.next_report else {
            self.next_report = Some(now + self.report_interval);
            return None;
        };
        if now < next {
            return None;
        }
        if self.report_interval.is_zero() {
            next = now;
        } else {
            while next <= now {
                next += self.report_interval;
            }
        }
        self.next_report = Some(next);
        self.reading()
    }
}

impl Default for FpsMeter {
    fn default() -> Self {
        Self::new(DEFAULT_FPS_REPORT_INTERVAL, FpsPrecision::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn window_evicts_oldest_after_capacity() {
        let mut window = FrameTimingWindow::new();
        for i in 1..=11 {
            window.push(ms(i));
        }
        assert_eq!(window.len(), FRAME_TIMING_CAPACITY);
        assert_eq!(window.iter().next(), Some(ms(2)));
        assert!(!window.iter().any(|d| d == ms(1)));
    }

    #[test]
    fn empty_window_has_no_fps() {
        let window = FrameTimingWindow::new();
        assert_eq!(window.average(), None);
        assert_eq!(window.fps(), None);
    }

    #[test]
    fn zero_intervals_have_no_fps() {
        let mut window = FrameTimingWindow::new();
        window.push(Duration::ZERO);
        assert_eq!(window.fps(), None);
    }

    #[test]
    fn reading_formats_per_precision() {
        let int = FpsReading {
            fps: 59.6,
            precision: FpsPrecision::Integer,
        };
        assert_eq!(int.to_string(), "60 fps");
        let dec = FpsReading {
            fps: 59.64,
            precision: FpsPrecision::OneDecimal,
        };
        assert_eq!(dec.to_string(), "59.6 fps");
    }

    #[test]
    fn meter_reports_on_its_own_cadence() {
        let mut meter = FpsMeter::new(ms(150), FpsPrecision::Integer);
        assert_eq!(meter.poll_report(ms(0)), None);

        // No frames yet: the report slot passes without a value.
        assert_eq!(meter.poll_report(ms(150)), None);
        assert_eq!(meter.next_report(), Some(ms(300)));

        for t in (200..=300).step_by(20) {
            meter.record_frame_start(ms(t));
        }
        assert_eq!(meter.poll_report(ms(299)), None);
        let reading = meter.poll_report(ms(300)).unwrap();
        assert_eq!(reading.to_string(), "50 fps");
        assert_eq!(meter.next_report(), Some(ms(450)));
    }

    #[test]
    fn meter_skips_missed_report_slots() {
        let mut meter = FpsMeter::new(ms(100), FpsPrecision::Integer);
        meter.poll_report(ms(0));
        meter.record_frame_start(ms(0));
        meter.record_frame_start(ms(10));
        assert!(meter.poll_report(ms(450)).is_some());
        assert_eq!(meter.next_report(), Some(ms(500)));
    }
}
