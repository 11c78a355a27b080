//! Live hand and face landmark overlay with fingertip distance metrics.
//!
//! Frames are captured from a webcam, passed to an external landmark detector, and annotated with
//! the detected face mesh contours, hand skeletons, handedness labels, thumb-to-fingertip pixel
//! distances, and the current frame rate. The annotated frames are shown in a window.
//!
//! # Environment Variables
//!
//! * `FINGERSPAN_WEBCAM_NAME`: Card name of the webcam to open. If unset, the first device that
//!   supports a compatible image format will be used.
//! * `FINGERSPAN_STILL_IMAGE`: Path to a JPEG or PNG image to annotate instead of webcam frames.
//! * `FINGERSPAN_DETECTOR`: Command line of the landmark service (default: `landmark-service`).
//! * `FINGERSPAN_MIN_DETECTION_CONFIDENCE`, `FINGERSPAN_MIN_TRACKING_CONFIDENCE`: Confidence
//!   thresholds passed to the landmark service (default: 0.5).
//! * `FINGERSPAN_MAX_READ_FAILURES`: Give up after this many consecutive failed frame reads. If
//!   unset, failed reads are retried forever.
//! * `FINGERSPAN_WINDOW`: Title of the output window (default: `CamOutput`).
//! * `FINGERSPAN_JPEG_BACKEND`: JPEG decoder to use, `zune-jpeg` (the default) or `jpeg-decoder`.

use log::LevelFilter;

pub mod annotate;
pub mod config;
pub mod detector;
pub mod display;
pub mod face;
pub mod gui;
pub mod hand;
pub mod image;
pub mod landmark;
pub mod metrics;
pub mod pipeline;
pub mod resolution;
pub mod termination;
pub mod timer;
pub mod video;

/// macro-use only, not part of public API.
#[doc(hidden)]
pub fn init_logger(calling_crate: &'static str) {
    let log_level = LevelFilter::Debug;
    env_logger::Builder::new()
        .filter(Some(calling_crate), log_level)
        .filter(Some(env!("CARGO_PKG_NAME")), log_level)
        .filter(Some("wgpu"), LevelFilter::Warn)
        .parse_default_env()
        .try_init()
        .ok();
}

/// Initializes logging to *stderr*.
///
/// The calling crate and this crate log at *debug* level, `wgpu` logs at *warn* level. `RUST_LOG`
/// can override both.
///
/// If a global logger is already registered, this macro will do nothing.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}
