//! The capture loop: read a frame, detect landmarks, annotate, display, repeat.

use std::{
    num::NonZeroU32,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use anyhow::Context;

use crate::{
    annotate::Annotator,
    config::Config,
    detector::LandmarkDetector,
    display::DisplaySink,
    timer::{FpsCounter, FpsTracker, Timer},
    video::{FrameRead, FrameSource},
};

/// How long to wait for user input after showing a frame.
const POLL_TIMEOUT: Duration = Duration::from_millis(1);

/// A shareable flag that asks the capture loop to stop.
///
/// The loop checks it once per iteration, so it stops after finishing the current frame.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Why the capture loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The [`StopSignal`] was raised, either by a quit key or externally.
    Stopped,
    /// The frame source ran out of frames.
    Exhausted,
}

/// Statistics about a finished capture loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSummary {
    pub reason: StopReason,
    /// Number of frames that were annotated and displayed.
    pub frames: u64,
    /// Total number of failed frame reads.
    pub failed_reads: u64,
}

/// Drives frames from a [`FrameSource`] through a [`LandmarkDetector`] and an [`Annotator`] into a
/// [`DisplaySink`].
pub struct CaptureLoop {
    annotator: Annotator,
    window: String,
    max_consecutive_read_failures: Option<NonZeroU32>,
    stop: StopSignal,
}

impl CaptureLoop {
    pub fn new(window: impl Into<String>) -> Self {
        Self {
            annotator: Annotator::new(),
            window: window.into(),
            max_consecutive_read_failures: None,
            stop: StopSignal::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.window.clone())
            .max_consecutive_read_failures(config.max_consecutive_read_failures)
    }

    /// Sets the number of consecutive failed reads after which [`CaptureLoop::run`] fails.
    ///
    /// By default, failed reads are retried forever.
    pub fn max_consecutive_read_failures(mut self, max: Option<NonZeroU32>) -> Self {
        self.max_consecutive_read_failures = max;
        self
    }

    /// Returns a handle that stops the loop when raised.
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Runs the loop until it is stopped, the source is exhausted, or an error occurs.
    ///
    /// Failed frame reads are skipped. Detector and display errors end the loop with an error.
    pub fn run<S, D, O>(
        &mut self,
        source: &mut S,
        detector: &mut D,
        display: &mut O,
    ) -> anyhow::Result<LoopSummary>
    where
        S: FrameSource + ?Sized,
        D: LandmarkDetector + ?Sized,
        O: DisplaySink + ?Sized,
    {
        let start = Instant::now();
        let mut fps = FpsTracker::new();
        let mut fps_counter = FpsCounter::new("capture");
        let mut t_read = Timer::new("read");
        let mut t_detect = Timer::new("detect");
        let mut t_annotate = Timer::new("annotate");
        let mut t_display = Timer::new("display");

        let mut frames = 0;
        let mut failed_reads = 0;
        let mut failure_streak = 0;

        let reason = loop {
            if self.stop.is_stopped() {
                break StopReason::Stopped;
            }

            let mut image = match t_read.time(|| source.read_frame()) {
                FrameRead::Frame(image) => image,
                FrameRead::Exhausted => break StopReason::Exhausted,
                FrameRead::Failed(e) => {
                    failed_reads += 1;
                    failure_streak += 1;
                    if failure_streak == 1 {
                        log::warn!("failed to read frame: {e:#}");
                    } else {
                        log::trace!("failed to read frame ({failure_streak} in a row): {e:#}");
                    }
                    if let Some(max) = self.max_consecutive_read_failures {
                        if failure_streak >= max.get() {
                            return Err(e).context(format!(
                                "giving up after {failure_streak} consecutive failed frame reads"
                            ));
                        }
                    }
                    continue;
                }
            };
            if failure_streak > 1 {
                log::debug!("frame source recovered after {failure_streak} failed reads");
            }
            failure_streak = 0;

            let rate = fps.tick(start.elapsed().as_secs_f64());

            let detections = t_detect
                .time(|| detector.detect(&image))
                .context("landmark detection failed")?;
            t_annotate.time(|| self.annotator.annotate(&mut image, &detections, rate));
            t_display.time(|| display.show(&self.window, &image))?;
            frames += 1;

            if let Some(key) = display.poll_key(POLL_TIMEOUT)? {
                if key.is_quit() {
                    log::info!("{key:?} pressed, stopping");
                    self.stop.stop();
                }
            }

            fps_counter.tick_with(&mut [
                &mut t_read,
                &mut t_detect,
                &mut t_annotate,
                &mut t_display,
            ]);
        };

        log::info!("capture loop ended ({reason:?}) after {frames} frames");
        Ok(LoopSummary {
            reason,
            frames,
            failed_reads,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_signal_is_shared() {
        let capture = CaptureLoop::new("test");
        let signal = capture.stop_signal();
        assert!(!capture.stop.is_stopped());
        signal.stop();
        assert!(capture.stop.is_stopped());
    }

    #[test]
    fn from_config() {
        let config = Config {
            max_consecutive_read_failures: NonZeroU32::new(3),
            window: "Hands".into(),
            ..Config::default()
        };
        let capture = CaptureLoop::from_config(&config);
        assert_eq!(capture.window, "Hands");
        assert_eq!(capture.max_consecutive_read_failures, NonZeroU32::new(3));
    }
}
