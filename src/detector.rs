//! Landmark detector interface.
//!
//! This crate does not perform any landmark inference itself. Detection is delegated to an
//! implementation of [`LandmarkDetector`], typically a [`subprocess::SubprocessDetector`] talking
//! to an external landmark service.

pub mod subprocess;

use anyhow::ensure;

use crate::{face::FaceLandmarks, hand::DetectedHand, image::Image};

/// Construction-time settings of a landmark detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorConfig {
    min_detection_confidence: f32,
    min_tracking_confidence: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_detection_confidence: 0.5,
            min_tracking_confidence: 0.5,
        }
    }
}

impl DetectorConfig {
    /// Creates a detector configuration.
    ///
    /// Both confidences must lie in range `[0, 1]`, otherwise an error is returned.
    pub fn new(min_detection_confidence: f32, min_tracking_confidence: f32) -> anyhow::Result<Self> {
        ensure!(
            (0.0..=1.0).contains(&min_detection_confidence),
            "minimum detection confidence {min_detection_confidence} is outside of [0, 1]"
        );
        ensure!(
            (0.0..=1.0).contains(&min_tracking_confidence),
            "minimum tracking confidence {min_tracking_confidence} is outside of [0, 1]"
        );
        Ok(Self {
            min_detection_confidence,
            min_tracking_confidence,
        })
    }

    /// Minimum confidence for a detection to be reported.
    pub fn min_detection_confidence(&self) -> f32 {
        self.min_detection_confidence
    }

    /// Minimum confidence for a tracked landmark set to be kept across frames.
    pub fn min_tracking_confidence(&self) -> f32 {
        self.min_tracking_confidence
    }
}

/// Everything detected in a single frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Detections {
    pub faces: Vec<FaceLandmarks>,
    pub hands: Vec<DetectedHand>,
}

impl Detections {
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty() && self.hands.is_empty()
    }
}

/// A hand and face landmark detector.
///
/// Both methods take an RGB(A) frame and return zero or more landmark sets with coordinates
/// normalized to the frame size. An empty result is not an error. Errors indicate that the
/// detector itself has failed and can not be used any longer.
pub trait LandmarkDetector {
    fn detect_hands(&mut self, image: &Image) -> anyhow::Result<Vec<DetectedHand>>;

    fn detect_faces(&mut self, image: &Image) -> anyhow::Result<Vec<FaceLandmarks>>;

    /// Runs face and hand detection on `image`.
    fn detect(&mut self, image: &Image) -> anyhow::Result<Detections> {
        let faces = self.detect_faces(image)?;
        let hands = self.detect_hands(image)?;
        Ok(Detections { faces, hands })
    }
}

impl<D: LandmarkDetector + ?Sized> LandmarkDetector for &mut D {
    fn detect_hands(&mut self, image: &Image) -> anyhow::Result<Vec<DetectedHand>> {
        (**self).detect_hands(image)
    }

    fn detect_faces(&mut self, image: &Image) -> anyhow::Result<Vec<FaceLandmarks>> {
        (**self).detect_faces(image)
    }
}

impl<D: LandmarkDetector + ?Sized> LandmarkDetector for Box<D> {
    fn detect_hands(&mut self, image: &Image) -> anyhow::Result<Vec<DetectedHand>> {
        (**self).detect_hands(image)
    }

    fn detect_faces(&mut self, image: &Image) -> anyhow::Result<Vec<FaceLandmarks>> {
        (**self).detect_faces(image)
    }
}
