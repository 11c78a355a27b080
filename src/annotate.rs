//! Frame annotation.
//!
//! The [`Annotator`] turns the detections of one frame into an [`Overlay`], an ordered list of
//! drawing [`Primitive`]s, and then draws that overlay onto the frame. Building the overlay does
//! not touch any pixels, so it can be inspected on its own.

use crate::{
    detector::Detections,
    face::{self, FaceLandmarks},
    hand::{self, DetectedHand, Finger, LandmarkIdx},
    image::{draw_circle, draw_line, draw_text, Color, FontSize, Image},
    landmark::PixelPoint,
    metrics::fingertip_distances,
    resolution::Resolution,
};

/// Baseline anchor of the FPS counter.
const FPS_ANCHOR: PixelPoint = PixelPoint::new(20, 70);
/// Offset of the handedness label from the wrist.
const HANDEDNESS_OFFSET: (i32, i32) = (-50, -20);
/// Offset of each distance label from its fingertip.
const DISTANCE_OFFSET: (i32, i32) = (10, -10);

/// What a text primitive shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextKind {
    Fps,
    Handedness,
    FingerDistance,
}

/// A single drawing operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Line {
        start: PixelPoint,
        end: PixelPoint,
        color: Color,
        stroke_width: u32,
    },
    /// A filled circle.
    Disc {
        center: PixelPoint,
        radius: u32,
        color: Color,
    },
    /// Text whose baseline starts at `anchor`.
    Text {
        kind: TextKind,
        anchor: PixelPoint,
        text: String,
        color: Color,
        size: FontSize,
    },
}

/// The drawing primitives for one frame, in drawing order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overlay {
    primitives: Vec<Primitive>,
}

impl Overlay {
    #[inline]
    pub fn primitives(&self) -> &[Primitive] {
        &self.primitives
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.primitives.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }

    /// Returns the anchors and contents of all text primitives of the given kind.
    pub fn texts(&self, kind: TextKind) -> impl Iterator<Item = (PixelPoint, &str)> + '_ {
        self.primitives.iter().filter_map(move |prim| match prim {
            Primitive::Text {
                kind: k,
                anchor,
                text,
                ..
            } if *k == kind => Some((*anchor, text.as_str())),
            _ => None,
        })
    }

    fn push(&mut self, primitive: Primitive) {
        self.primitives.push(primitive);
    }

    fn text(&mut self, kind: TextKind, anchor: PixelPoint, text: String, style: TextStyle) {
        self.push(Primitive::Text {
            kind,
            anchor,
            text,
            color: style.color,
            size: style.size,
        });
    }

    /// Draws all primitives onto `image`, in order.
    ///
    /// Anything outside of the image is clipped.
    pub fn draw(&self, image: &mut Image) {
        for prim in &self.primitives {
            match prim {
                Primitive::Line {
                    start,
                    end,
                    color,
                    stroke_width,
                } => {
                    draw_line(image, start.x, start.y, end.x, end.y)
                        .color(*color)
                        .stroke_width(*stroke_width);
                }
                Primitive::Disc {
                    center,
                    radius,
                    color,
                } => {
                    draw_circle(image, center.x, center.y, radius * 2 + 1)
                        .filled()
                        .color(*color);
                }
                Primitive::Text {
                    anchor,
                    text,
                    color,
                    size,
                    ..
                } => {
                    draw_text(image, anchor.x, anchor.y, text)
                        .align_left()
                        .align_baseline()
                        .size(*size)
                        .color(*color);
                }
            }
        }
    }
}

/// How landmark points are drawn.
#[derive(Debug, Clone, Copy)]
pub struct PointStyle {
    pub color: Color,
    pub radius: u32,
}

/// How landmark connections are drawn.
#[derive(Debug, Clone, Copy)]
pub struct LineStyle {
    pub color: Color,
    pub stroke_width: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct TextStyle {
    pub color: Color,
    pub size: FontSize,
}

/// Colors and sizes used by the [`Annotator`].
#[derive(Debug, Clone)]
pub struct Style {
    pub fps: TextStyle,
    pub face_point: PointStyle,
    pub face_contour: LineStyle,
    pub hand_point: PointStyle,
    pub hand_connection: LineStyle,
    pub handedness: TextStyle,
    pub thumb_tip: PointStyle,
    pub fingertip: PointStyle,
    pub distance: TextStyle,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            fps: TextStyle {
                color: Color::GREEN,
                size: FontSize::Large,
            },
            face_point: PointStyle {
                color: Color::GREEN,
                radius: 1,
            },
            face_contour: LineStyle {
                color: Color::BLUE,
                stroke_width: 1,
            },
            hand_point: PointStyle {
                color: Color::RED,
                radius: 2,
            },
            hand_connection: LineStyle {
                color: Color::from_rgb8(224, 224, 224),
                stroke_width: 2,
            },
            handedness: TextStyle {
                color: Color::CYAN,
                size: FontSize::Large,
            },
            thumb_tip: PointStyle {
                color: Color::BLUE,
                radius: 10,
            },
            fingertip: PointStyle {
                color: Color::GREEN,
                radius: 10,
            },
            distance: TextStyle {
                color: Color::YELLOW,
                size: FontSize::Small,
            },
        }
    }
}

/// Draws landmarks, handedness labels, fingertip distances and the frame rate onto frames.
#[derive(Debug, Clone, Default)]
pub struct Annotator {
    style: Style,
}

impl Annotator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Annotates `image` in place.
    ///
    /// `fps` is the current frame rate, or `None` if it is not known yet.
    pub fn annotate(&self, image: &mut Image, detections: &Detections, fps: Option<f64>) {
        self.overlay(image.resolution(), detections, fps).draw(image);
    }

    /// Computes the overlay for a frame of size `res` without drawing it.
    pub fn overlay(&self, res: Resolution, detections: &Detections, fps: Option<f64>) -> Overlay {
        let mut overlay = Overlay::default();

        let fps_text = match fps {
            Some(fps) => format!("FPS: {}", fps as u64),
            None => "FPS: --".to_string(),
        };
        overlay.text(TextKind::Fps, FPS_ANCHOR, fps_text, self.style.fps);

        for face in &detections.faces {
            self.face(&mut overlay, res, face);
        }
        for hand in &detections.hands {
            self.hand(&mut overlay, res, hand);
        }

        overlay
    }

    fn face(&self, overlay: &mut Overlay, res: Resolution, face: &FaceLandmarks) {
        let style = self.style.face_contour;
        for (a, b) in face::contour_connections() {
            let (Some(a), Some(b)) = (face.get(a), face.get(b)) else {
                continue;
            };
            overlay.push(Primitive::Line {
                start: a.to_pixel(res),
                end: b.to_pixel(res),
                color: style.color,
                stroke_width: style.stroke_width,
            });
        }

        let style = self.style.face_point;
        for point in face.positions() {
            overlay.push(Primitive::Disc {
                center: point.to_pixel(res),
                radius: style.radius,
                color: style.color,
            });
        }
    }

    fn hand(&self, overlay: &mut Overlay, res: Resolution, hand: &DetectedHand) {
        let lms = &hand.landmarks;
        let px = |idx: LandmarkIdx| lms.get(idx).to_pixel(res);

        let style = self.style.hand_connection;
        for &(a, b) in hand::CONNECTIVITY {
            overlay.push(Primitive::Line {
                start: px(a),
                end: px(b),
                color: style.color,
                stroke_width: style.stroke_width,
            });
        }
        let style = self.style.hand_point;
        for point in lms.positions() {
            overlay.push(Primitive::Disc {
                center: point.to_pixel(res),
                radius: style.radius,
                color: style.color,
            });
        }

        if let Some(handedness) = &hand.handedness {
            let (dx, dy) = HANDEDNESS_OFFSET;
            overlay.text(
                TextKind::Handedness,
                px(LandmarkIdx::Wrist).offset(dx, dy),
                handedness.to_string(),
                self.style.handedness,
            );
        }

        let thumb = px(LandmarkIdx::ThumbTip);
        overlay.push(Primitive::Disc {
            center: thumb,
            radius: self.style.thumb_tip.radius,
            color: self.style.thumb_tip.color,
        });

        let tips = Finger::ALL.map(|finger| (finger, px(finger.tip())));
        let distances = fingertip_distances(thumb, tips);
        for ((_, tip), dist) in tips.iter().zip(&distances) {
            overlay.push(Primitive::Disc {
                center: *tip,
                radius: self.style.fingertip.radius,
                color: self.style.fingertip.color,
            });
            let (dx, dy) = DISTANCE_OFFSET;
            overlay.text(
                TextKind::FingerDistance,
                tip.offset(dx, dy),
                format!("{}: {} px", dist.finger, dist.distance as u32),
                self.style.distance,
            );
        }
    }
}
