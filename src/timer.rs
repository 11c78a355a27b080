//! Frame rate measurement and profiling timers.

use std::{
    fmt,
    time::{Duration, Instant},
};

/// Derives the instantaneous frame rate from consecutive frame timestamps.
///
/// This is the value shown in the overlay. It lives for the whole capture loop and is never reset.
#[derive(Debug, Default)]
pub struct FpsTracker {
    last: Option<f64>,
}

impl FpsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a frame at `now` (in seconds) and returns the frame rate since the previous one.
    ///
    /// Returns `None` for the very first frame, and when `now` does not lie after the previous
    /// timestamp. The timestamp is recorded either way.
    pub fn tick(&mut self, now: f64) -> Option<f64> {
        let fps = match self.last {
            Some(last) if now > last => Some(1.0 / (now - last)),
            _ => None,
        };
        self.last = Some(now);
        fps
    }
}

/// Measures how long an operation takes, averaged over the frames since it was last displayed.
///
/// [`FpsCounter::tick_with`] logs the average and resets it.
pub struct Timer {
    name: &'static str,
    total: Duration,
    count: u32,
}

impl Timer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            total: Duration::ZERO,
            count: 0,
        }
    }

    /// Invokes `f`, recording the time it takes.
    pub fn time<T>(&mut self, f: impl FnOnce() -> T) -> T {
        let _guard = self.start();
        f()
    }

    /// Starts timing an operation. The time is recorded when the returned guard is dropped.
    pub fn start(&mut self) -> TimerGuard<'_> {
        TimerGuard {
            start: Instant::now(),
            timer: self,
        }
    }

    fn record(&mut self, duration: Duration) {
        self.total += duration;
        self.count += 1;
    }

    fn take(&mut self) -> Option<(u32, f32)> {
        if self.count == 0 {
            return None;
        }
        let avg_ms = self.total.as_secs_f32() * 1000.0 / self.count as f32;
        let count = self.count;
        self.total = Duration::ZERO;
        self.count = 0;
        Some((count, avg_ms))
    }
}

/// Guard returned by [`Timer::start`].
pub struct TimerGuard<'a> {
    start: Instant,
    timer: &'a mut Timer,
}

impl Drop for TimerGuard<'_> {
    fn drop(&mut self) {
        self.timer.record(self.start.elapsed());
    }
}

struct TimerSummary {
    name: &'static str,
    stats: Option<(u32, f32)>,
}

impl fmt::Display for TimerSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.stats {
            Some((count, avg_ms)) => write!(f, "{}: {count}x{avg_ms:.01}ms", self.name),
            None => write!(f, "{}: -", self.name),
        }
    }
}

/// Logs loop throughput once per second, along with a set of [`Timer`]s.
pub struct FpsCounter {
    name: String,
    frames: u32,
    start: Instant,
}

impl FpsCounter {
    pub fn new<N: Into<String>>(name: N) -> Self {
        Self {
            name: name.into(),
            frames: 0,
            start: Instant::now(),
        }
    }

    /// Counts a frame. Once a second, logs the frame rate and the averages of `timers`, which
    /// are reset afterwards.
    ///
    /// Returns whether a line was logged.
    pub fn tick_with(&mut self, timers: &mut [&mut Timer]) -> bool {
        self.frames += 1;
        if self.start.elapsed() < Duration::from_secs(1) {
            return false;
        }

        let summaries = timers
            .iter_mut()
            .map(|timer| TimerSummary {
                name: timer.name,
                stats: timer.take(),
            })
            .collect::<Vec<_>>();
        log::debug!(
            "{}: {} FPS ({})",
            self.name,
            self.frames,
            itertools::join(&summaries, ", ")
        );

        self.frames = 0;
        self.start = Instant::now();
        true
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn first_tick_has_no_rate() {
        let mut fps = FpsTracker::new();
        assert_eq!(fps.tick(9.0), None);
        assert_eq!(fps.tick(10.0), Some(1.0));
        assert_relative_eq!(fps.tick(10.25).unwrap(), 4.0);
    }

    #[test]
    fn non_increasing_timestamps() {
        let mut fps = FpsTracker::new();
        fps.tick(5.0);
        assert_eq!(fps.tick(5.0), None);
        assert_eq!(fps.tick(4.0), None);
        // The clock went backwards, and measurement continues from the new timestamp.
        assert_eq!(fps.tick(4.5), Some(2.0));
    }

    #[test]
    fn timer_averages_and_resets() {
        let mut timer = Timer::new("detect");
        timer.record(Duration::from_millis(10));
        timer.record(Duration::from_millis(20));
        let (count, avg) = timer.take().unwrap();
        assert_eq!(count, 2);
        assert_relative_eq!(avg, 15.0, epsilon = 0.01);
        assert!(timer.take().is_none());

        let value = timer.time(|| 42);
        assert_eq!(value, 42);
        assert_eq!(timer.take().unwrap().0, 1);
    }

    #[test]
    fn summary_format() {
        let summary = TimerSummary {
            name: "read",
            stats: Some((3, 1.26)),
        };
        assert_eq!(summary.to_string(), "read: 3x1.3ms");
        let empty = TimerSummary {
            name: "read",
            stats: None,
        };
        assert_eq!(empty.to_string(), "read: -");
    }

    #[test]
    fn counter_waits_a_second() {
        let mut counter = FpsCounter::new("test");
        let mut timer = Timer::new("t");
        assert!(!counter.tick_with(&mut [&mut timer]));
        assert_eq!(counter.frames, 1);
    }
}
