//! Landmark coordinates and their mapping into pixel space.
//!
//! Landmark detectors report positions as [`NormalizedPoint`]s, which are independent of the
//! resolution of the image they were computed on. Drawing requires [`PixelPoint`]s.

use std::fmt;

use serde::Deserialize;

use crate::resolution::Resolution;

/// A landmark position relative to the image size.
///
/// Both coordinates are nominally in range `[0, 1]`, where `(0, 0)` is the top left corner of the
/// image. Detectors may report slightly out-of-range values for landmarks close to the image
/// border; those are passed through as-is.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(from = "[f32; 2]")]
pub struct NormalizedPoint {
    pub x: f32,
    pub y: f32,
}

impl NormalizedPoint {
    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Returns whether both coordinates are finite numbers.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Maps this point into the pixel space of an image with the given resolution.
    ///
    /// Coordinates are scaled by the image size and then rounded down. Points outside of `[0, 1]`
    /// map to pixels outside of the image, which drawing operations will silently clip.
    pub fn to_pixel(&self, res: Resolution) -> PixelPoint {
        PixelPoint {
            x: (self.x * res.width() as f32).floor() as i32,
            y: (self.y * res.height() as f32).floor() as i32,
        }
    }
}

impl From<[f32; 2]> for NormalizedPoint {
    #[inline]
    fn from([x, y]: [f32; 2]) -> Self {
        Self { x, y }
    }
}

/// An integer pixel coordinate. May lie outside of the image it refers to.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PixelPoint {
    pub x: i32,
    pub y: i32,
}

impl PixelPoint {
    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Returns this point moved by `(dx, dy)`, saturating at the bounds of `i32`.
    #[inline]
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
        }
    }
}

impl fmt::Debug for PixelPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_corners() {
        let res = Resolution::new(640, 480);
        assert_eq!(
            NormalizedPoint::new(0.0, 0.0).to_pixel(res),
            PixelPoint::new(0, 0)
        );
        assert_eq!(
            NormalizedPoint::new(1.0, 1.0).to_pixel(res),
            PixelPoint::new(640, 480)
        );
        assert_eq!(
            NormalizedPoint::new(0.5, 0.25).to_pixel(res),
            PixelPoint::new(320, 120)
        );
    }

    #[test]
    fn rounds_down() {
        let res = Resolution::new(10, 10);
        assert_eq!(
            NormalizedPoint::new(0.19, 0.91).to_pixel(res),
            PixelPoint::new(1, 9)
        );
    }

    #[test]
    fn passes_out_of_range_through() {
        let res = Resolution::new(100, 100);
        let p = NormalizedPoint::new(-0.02, 1.05).to_pixel(res);
        assert_eq!(p, PixelPoint::new(-2, 105));
        assert!(!res.contains(p.x, p.y));
    }

    #[test]
    fn in_range_points_stay_in_frame() {
        for _ in 0..1000 {
            let res = Resolution::new(fastrand::u32(1..4000), fastrand::u32(1..4000));
            let point = NormalizedPoint::new(fastrand::f32(), fastrand::f32());
            let pixel = point.to_pixel(res);
            assert!((0..=res.width() as i32).contains(&pixel.x), "{point:?} -> {pixel:?}");
            assert!((0..=res.height() as i32).contains(&pixel.y), "{point:?} -> {pixel:?}");
            assert_eq!(pixel, point.to_pixel(res));
        }
    }

    #[test]
    fn deserializes_from_pair() {
        let point: NormalizedPoint = serde_json::from_str("[0.25, 0.75]").unwrap();
        assert_eq!(point, NormalizedPoint::new(0.25, 0.75));
    }

    #[test]
    fn offset() {
        assert_eq!(PixelPoint::new(3, 4).offset(-50, -20), PixelPoint::new(-47, -16));
    }

    #[test]
    fn infinite_coordinates_saturate() {
        let res = Resolution::new(640, 480);
        let p = NormalizedPoint::new(f32::INFINITY, f32::NEG_INFINITY).to_pixel(res);
        assert_eq!(p, PixelPoint::new(i32::MAX, i32::MIN));
        assert_eq!(p.offset(10, -10), PixelPoint::new(i32::MAX, i32::MIN));
        assert_eq!(p.offset(-50, 20), PixelPoint::new(i32::MAX - 50, i32::MIN + 20));
    }
}
