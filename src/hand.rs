//! Hand landmark data as reported by a hand landmark detector.

use std::fmt;

use serde::Deserialize;

use crate::landmark::NormalizedPoint;

/// A single detected hand.
///
/// The handedness classification travels together with the landmarks it belongs to, so there is
/// no way for the two to get out of sync.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedHand {
    pub landmarks: HandLandmarks,
    pub handedness: Option<Handedness>,
}

/// The 21 landmarks of a hand, in [`LandmarkIdx`] order.
#[derive(Debug, Clone, PartialEq)]
pub struct HandLandmarks {
    positions: [NormalizedPoint; HandLandmarks::NUM_LANDMARKS],
}

impl HandLandmarks {
    pub const NUM_LANDMARKS: usize = 21;

    pub fn new(positions: [NormalizedPoint; Self::NUM_LANDMARKS]) -> Self {
        Self { positions }
    }

    /// Creates a landmark set from a list of points.
    ///
    /// Returns `None` if `points` does not contain exactly [`HandLandmarks::NUM_LANDMARKS`]
    /// points.
    pub fn from_points(points: Vec<NormalizedPoint>) -> Option<Self> {
        let positions = points.try_into().ok()?;
        Some(Self { positions })
    }

    #[inline]
    pub fn get(&self, idx: LandmarkIdx) -> NormalizedPoint {
        self.positions[idx as usize]
    }

    #[inline]
    pub fn positions(&self) -> &[NormalizedPoint] {
        &self.positions
    }
}

/// Left or right hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum HandLabel {
    Left,
    Right,
}

impl fmt::Display for HandLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HandLabel::Left => "Left",
            HandLabel::Right => "Right",
        })
    }
}

/// Handedness classification of a detected hand.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Handedness {
    pub label: HandLabel,
    /// Classification confidence, between 0.0 and 1.0.
    pub score: f32,
}

/// Formats as the label followed by the score, eg. `Right (0.92)`.
impl fmt::Display for Handedness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:.2})", self.label, self.score)
    }
}

/// Names for the hand pose landmarks.
///
/// # Terminology
///
/// - **CMC**: [Carpometacarpal joint], the lowest joint of the thumb, located near the wrist.
/// - **MCP**: [Metacarpophalangeal joint], the lower joint forming the knuckles near the palm of
///   the hand.
/// - **PIP**: Proximal Interphalangeal joint, the joint between the MCP and DIP.
/// - **DIP**: Distal Interphalangeal joint, the highest joint of a finger.
/// - **Tip**: This landmark is just placed on the tip of the finger, above the DIP.
///
/// [Carpometacarpal joint]: https://en.wikipedia.org/wiki/Carpometacarpal_joint
/// [Metacarpophalangeal joint]: https://en.wikipedia.org/wiki/Metacarpophalangeal_joint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandmarkIdx {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexFingerMcp,
    IndexFingerPip,
    IndexFingerDip,
    IndexFingerTip,
    MiddleFingerMcp,
    MiddleFingerPip,
    MiddleFingerDip,
    MiddleFingerTip,
    RingFingerMcp,
    RingFingerPip,
    RingFingerDip,
    RingFingerTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

/// The four non-thumb fingers, whose tips are measured against the thumb tip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finger {
    Index,
    Middle,
    Ring,
    Pinky,
}

impl Finger {
    pub const ALL: [Finger; 4] = [Finger::Index, Finger::Middle, Finger::Ring, Finger::Pinky];

    /// Returns the landmark at the tip of this finger.
    pub fn tip(self) -> LandmarkIdx {
        match self {
            Finger::Index => LandmarkIdx::IndexFingerTip,
            Finger::Middle => LandmarkIdx::MiddleFingerTip,
            Finger::Ring => LandmarkIdx::RingFingerTip,
            Finger::Pinky => LandmarkIdx::PinkyTip,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Finger::Index => "Index",
            Finger::Middle => "Middle",
            Finger::Ring => "Ring",
            Finger::Pinky => "Pinky",
        }
    }
}

impl fmt::Display for Finger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The standard hand skeleton, as pairs of connected landmarks.
pub const CONNECTIVITY: &[(LandmarkIdx, LandmarkIdx)] = {
    use LandmarkIdx::*;
    &[
        // Palm:
        (Wrist, ThumbCmc),
        (Wrist, IndexFingerMcp),
        (MiddleFingerMcp, RingFingerMcp),
        (RingFingerMcp, PinkyMcp),
        (IndexFingerMcp, MiddleFingerMcp),
        (Wrist, PinkyMcp),
        // Thumb:
        (ThumbCmc, ThumbMcp),
        (ThumbMcp, ThumbIp),
        (ThumbIp, ThumbTip),
        // Index:
        (IndexFingerMcp, IndexFingerPip),
        (IndexFingerPip, IndexFingerDip),
        (IndexFingerDip, IndexFingerTip),
        // Middle:
        (MiddleFingerMcp, MiddleFingerPip),
        (MiddleFingerPip, MiddleFingerDip),
        (MiddleFingerDip, MiddleFingerTip),
        // Ring:
        (RingFingerMcp, RingFingerPip),
        (RingFingerPip, RingFingerDip),
        (RingFingerDip, RingFingerTip),
        // Pinky:
        (PinkyMcp, PinkyPip),
        (PinkyPip, PinkyDip),
        (PinkyDip, PinkyTip),
    ]
};
