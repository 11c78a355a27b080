//! Metrics derived from hand landmarks.

use crate::{hand::Finger, landmark::PixelPoint};

/// Pixel distance between the thumb tip and one fingertip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FingerDistance {
    pub finger: Finger,
    /// Euclidean distance in pixels. Never negative.
    pub distance: f32,
}

/// Computes the Euclidean distance between two pixel coordinates.
///
/// Defined for all coordinates, including those far outside of any image.
pub fn distance(a: PixelPoint, b: PixelPoint) -> f32 {
    let dx = (i64::from(a.x) - i64::from(b.x)) as f64;
    let dy = (i64::from(a.y) - i64::from(b.y)) as f64;
    dx.hypot(dy) as f32
}

/// Computes the distance from `thumb` to every fingertip in `tips`.
///
/// The result contains one entry per input pair, in input order.
pub fn fingertip_distances<I>(thumb: PixelPoint, tips: I) -> Vec<FingerDistance>
where
    I: IntoIterator<Item = (Finger, PixelPoint)>,
{
    tips.into_iter()
        .map(|(finger, tip)| FingerDistance {
            finger,
            distance: distance(thumb, tip),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn random_point() -> PixelPoint {
        PixelPoint::new(fastrand::i32(-2000..2000), fastrand::i32(-2000..2000))
    }

    #[test]
    fn pythagorean_triple() {
        let d = fingertip_distances(
            PixelPoint::new(100, 100),
            [(Finger::Index, PixelPoint::new(103, 104))],
        );
        assert_eq!(d.len(), 1);
        assert_eq!(d[0].finger, Finger::Index);
        assert_eq!(d[0].distance, 5.0);
    }

    #[test]
    fn keeps_input_order() {
        let thumb = PixelPoint::new(0, 0);
        let tips = [
            (Finger::Pinky, PixelPoint::new(0, 4)),
            (Finger::Index, PixelPoint::new(3, 0)),
            (Finger::Ring, PixelPoint::new(0, 0)),
        ];
        let d = fingertip_distances(thumb, tips);
        let fingers = d.iter().map(|d| d.finger).collect::<Vec<_>>();
        assert_eq!(fingers, [Finger::Pinky, Finger::Index, Finger::Ring]);
        assert_eq!(d[0].distance, 4.0);
        assert_eq!(d[1].distance, 3.0);
        assert_eq!(d[2].distance, 0.0);
    }

    #[test]
    fn extreme_coordinates() {
        assert_relative_eq!(
            distance(PixelPoint::new(i32::MIN, 0), PixelPoint::new(10, 0)),
            2_147_483_658.0
        );
        let far = distance(
            PixelPoint::new(i32::MIN, i32::MIN),
            PixelPoint::new(i32::MAX, i32::MAX),
        );
        assert!(far.is_finite());
        assert_relative_eq!(far, u32::MAX as f32 * std::f32::consts::SQRT_2);
    }

    #[test]
    fn empty() {
        assert!(fingertip_distances(PixelPoint::new(1, 2), []).is_empty());
    }

    #[test]
    fn properties() {
        for _ in 0..1000 {
            let a = random_point();
            let b = random_point();
            let d = distance(a, b);

            assert!(d >= 0.0);
            assert_eq!(d, distance(b, a));
            assert_eq!(distance(a, a), 0.0);
            if a != b {
                assert!(d > 0.0);
            }

            let (dx, dy) = (fastrand::i32(-500..500), fastrand::i32(-500..500));
            assert_relative_eq!(d, distance(a.offset(dx, dy), b.offset(dx, dy)));
        }
    }
}
