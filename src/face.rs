//! Face mesh landmarks.

use crate::landmark::NormalizedPoint;

/// The landmarks of a single detected face, in face mesh topology.
///
/// Apart from being drawn, the individual points carry no meaning in this crate.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceLandmarks {
    positions: Vec<NormalizedPoint>,
}

impl FaceLandmarks {
    /// Number of landmarks in the base face mesh. Detectors may append more (eg. iris landmarks).
    pub const MIN_LANDMARKS: usize = 468;

    /// Creates a face landmark set.
    ///
    /// Returns `None` if fewer than [`FaceLandmarks::MIN_LANDMARKS`] points are provided.
    pub fn from_points(positions: Vec<NormalizedPoint>) -> Option<Self> {
        if positions.len() < Self::MIN_LANDMARKS {
            return None;
        }
        Some(Self { positions })
    }

    #[inline]
    pub fn positions(&self) -> &[NormalizedPoint] {
        &self.positions
    }

    /// Returns the landmark at `index`, if the mesh has one.
    #[inline]
    pub fn get(&self, index: usize) -> Option<NormalizedPoint> {
        self.positions.get(index).copied()
    }
}

const LIPS: &[(u16, u16)] = &[
    (61, 146),
    (146, 91),
    (91, 181),
    (181, 84),
    (84, 17),
    (17, 314),
    (314, 405),
    (405, 321),
    (321, 375),
    (375, 291),
    (61, 185),
    (185, 40),
    (40, 39),
    (39, 37),
    (37, 0),
    (0, 267),
    (267, 269),
    (269, 270),
    (270, 409),
    (409, 291),
    (78, 95),
    (95, 88),
    (88, 178),
    (178, 87),
    (87, 14),
    (14, 317),
    (317, 402),
    (402, 318),
    (318, 324),
    (324, 308),
    (78, 191),
    (191, 80),
    (80, 81),
    (81, 82),
    (82, 13),
    (13, 312),
    (312, 311),
    (311, 310),
    (310, 415),
    (415, 308),
];

const LEFT_EYE: &[(u16, u16)] = &[
    (263, 249),
    (249, 390),
    (390, 373),
    (373, 374),
    (374, 380),
    (380, 381),
    (381, 382),
    (382, 362),
    (263, 466),
    (466, 388),
    (388, 387),
    (387, 386),
    (386, 385),
    (385, 384),
    (384, 398),
    (398, 362),
];

const LEFT_EYEBROW: &[(u16, u16)] = &[
    (276, 283),
    (283, 282),
    (282, 295),
    (295, 285),
    (300, 293),
    (293, 334),
    (334, 296),
    (296, 336),
];

const RIGHT_EYE: &[(u16, u16)] = &[
    (33, 7),
    (7, 163),
    (163, 144),
    (144, 145),
    (145, 153),
    (153, 154),
    (154, 155),
    (155, 133),
    (33, 246),
    (246, 161),
    (161, 160),
    (160, 159),
    (159, 158),
    (158, 157),
    (157, 173),
    (173, 133),
];

const RIGHT_EYEBROW: &[(u16, u16)] = &[
    (46, 53),
    (53, 52),
    (52, 65),
    (65, 55),
    (70, 63),
    (63, 105),
    (105, 66),
    (66, 107),
];

const FACE_OVAL: &[(u16, u16)] = &[
    (10, 338),
    (338, 297),
    (297, 332),
    (332, 284),
    (284, 251),
    (251, 389),
    (389, 356),
    (356, 454),
    (454, 323),
    (323, 361),
    (361, 288),
    (288, 397),
    (397, 365),
    (365, 379),
    (379, 378),
    (378, 400),
    (400, 377),
    (377, 152),
    (152, 148),
    (148, 176),
    (176, 149),
    (149, 150),
    (150, 136),
    (136, 172),
    (172, 58),
    (58, 132),
    (132, 93),
    (93, 234),
    (234, 127),
    (127, 162),
    (162, 21),
    (21, 54),
    (54, 103),
    (103, 67),
    (67, 109),
    (109, 10),
];

/// Face mesh contour groups: lips, both eyes, both eyebrows and the face oval.
pub const CONTOURS: &[&[(u16, u16)]] = &[
    LIPS,
    LEFT_EYE,
    LEFT_EYEBROW,
    RIGHT_EYE,
    RIGHT_EYEBROW,
    FACE_OVAL,
];

/// Iterates over all contour connections as pairs of landmark indices.
pub fn contour_connections() -> impl Iterator<Item = (usize, usize)> {
    CONTOURS
        .iter()
        .flat_map(|group| group.iter())
        .map(|&(a, b)| (usize::from(a), usize::from(b)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_full_mesh() {
        let points = |n| vec![NormalizedPoint::new(0.5, 0.5); n];
        assert!(FaceLandmarks::from_points(points(467)).is_none());
        assert!(FaceLandmarks::from_points(points(0)).is_none());
        assert_eq!(
            FaceLandmarks::from_points(points(468))
                .unwrap()
                .positions()
                .len(),
            468
        );
        // Refined meshes with iris landmarks are accepted as well.
        assert!(FaceLandmarks::from_points(points(478)).is_some());
    }

    #[test]
    fn contours_stay_within_base_mesh() {
        assert_eq!(contour_connections().count(), 124);
        for (a, b) in contour_connections() {
            assert!(a < FaceLandmarks::MIN_LANDMARKS);
            assert!(b < FaceLandmarks::MIN_LANDMARKS);
            assert_ne!(a, b);
        }
    }

    #[test]
    fn face_oval_is_closed() {
        assert_eq!(FACE_OVAL.first().unwrap().0, FACE_OVAL.last().unwrap().1);
        for pair in FACE_OVAL.windows(2) {
            assert_eq!(pair[0].1, pair[1].0);
        }
    }
}
