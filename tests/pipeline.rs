use std::{collections::VecDeque, num::NonZeroU32, time::Duration};

use anyhow::{anyhow, bail};
use fingerspan::{
    detector::{Detections, LandmarkDetector},
    display::{DisplaySink, Key},
    face::FaceLandmarks,
    hand::{DetectedHand, Finger, HandLandmarks, LandmarkIdx},
    image::{Color, Image},
    landmark::NormalizedPoint,
    pipeline::{CaptureLoop, StopReason, StopSignal},
    video,
};

fn frame() -> Image {
    let mut image = Image::new(128, 128);
    image.clear(Color::BLACK);
    image
}

/// Returns the same detections for every frame, or fails after `fail_after` calls.
#[derive(Default)]
struct Canned {
    detections: Detections,
    fail_after: Option<usize>,
    calls: usize,
}

impl LandmarkDetector for Canned {
    fn detect_hands(&mut self, _: &Image) -> anyhow::Result<Vec<DetectedHand>> {
        self.calls += 1;
        if self.fail_after.map_or(false, |n| self.calls > n) {
            bail!("landmark service exited");
        }
        Ok(self.detections.hands.clone())
    }

    fn detect_faces(&mut self, _: &Image) -> anyhow::Result<Vec<FaceLandmarks>> {
        Ok(self.detections.faces.clone())
    }
}

/// Records shown frames and replays scripted key presses, one per poll.
#[derive(Default)]
struct Recorder {
    shown: Vec<(String, Image)>,
    keys: VecDeque<Option<Key>>,
    stop_after: Option<(usize, StopSignal)>,
}

impl DisplaySink for Recorder {
    fn show(&mut self, window: &str, image: &Image) -> anyhow::Result<()> {
        self.shown.push((window.to_string(), image.clone()));
        if let Some((n, signal)) = &self.stop_after {
            if self.shown.len() >= *n {
                signal.stop();
            }
        }
        Ok(())
    }

    fn poll_key(&mut self, _: Duration) -> anyhow::Result<Option<Key>> {
        Ok(self.keys.pop_front().flatten())
    }
}

fn frames(n: usize) -> Vec<anyhow::Result<Image>> {
    (0..n).map(|_| Ok(frame())).collect()
}

#[test]
fn runs_until_exhausted() {
    let mut source = video::from_iter(frames(3));
    let mut display = Recorder::default();
    let summary = CaptureLoop::new("CamOutput")
        .run(&mut source, &mut Canned::default(), &mut display)
        .unwrap();

    assert_eq!(summary.reason, StopReason::Exhausted);
    assert_eq!(summary.frames, 3);
    assert_eq!(summary.failed_reads, 0);
    assert_eq!(display.shown.len(), 3);
    assert!(display.shown.iter().all(|(window, _)| window == "CamOutput"));
}

#[test]
fn failed_reads_are_skipped() {
    let mut source = video::from_iter([
        Ok(frame()),
        Err(anyhow!("select timeout")),
        Err(anyhow!("corrupt JPEG data")),
        Ok(frame()),
    ]);
    let mut display = Recorder::default();
    let summary = CaptureLoop::new("CamOutput")
        .run(&mut source, &mut Canned::default(), &mut display)
        .unwrap();

    assert_eq!(summary.reason, StopReason::Exhausted);
    assert_eq!(summary.frames, 2);
    assert_eq!(summary.failed_reads, 2);
    assert_eq!(display.shown.len(), 2);
}

#[test]
fn gives_up_after_consecutive_failures() {
    let mut reads = frames(1);
    reads.extend((0..3).map(|_| Err(anyhow!("device unplugged"))));
    reads.extend(frames(1));
    let mut source = video::from_iter(reads);
    let mut display = Recorder::default();

    let err = CaptureLoop::new("CamOutput")
        .max_consecutive_read_failures(NonZeroU32::new(3))
        .run(&mut source, &mut Canned::default(), &mut display)
        .unwrap_err();
    let msg = format!("{err:#}");
    assert!(msg.contains("3 consecutive failed frame reads"), "{msg}");
    assert!(msg.contains("device unplugged"), "{msg}");
    assert_eq!(display.shown.len(), 1);
}

#[test]
fn failure_streak_resets_on_success() {
    let mut reads = Vec::new();
    for _ in 0..3 {
        reads.push(Err(anyhow!("timeout")));
        reads.push(Err(anyhow!("timeout")));
        reads.push(Ok(frame()));
    }
    let mut source = video::from_iter(reads);

    let summary = CaptureLoop::new("CamOutput")
        .max_consecutive_read_failures(NonZeroU32::new(3))
        .run(&mut source, &mut Canned::default(), &mut Recorder::default())
        .unwrap();
    assert_eq!(summary.frames, 3);
    assert_eq!(summary.failed_reads, 6);
}

#[test]
fn quit_keys_stop_the_loop() {
    for key in [Key::Escape, Key::Char('q'), Key::Char('Q'), Key::WindowClosed] {
        let mut source = video::from_iter(frames(10));
        let mut display = Recorder {
            keys: [None, Some(Key::Char('x')), Some(key)].into(),
            ..Recorder::default()
        };
        let summary = CaptureLoop::new("CamOutput")
            .run(&mut source, &mut Canned::default(), &mut display)
            .unwrap();

        assert_eq!(summary.reason, StopReason::Stopped, "{key:?}");
        assert_eq!(summary.frames, 3, "{key:?}");
    }
}

#[test]
fn external_stop_signal() {
    let mut capture = CaptureLoop::new("CamOutput");
    let mut source = video::from_iter(frames(10));
    let mut display = Recorder {
        stop_after: Some((4, capture.stop_signal())),
        ..Recorder::default()
    };

    let summary = capture
        .run(&mut source, &mut Canned::default(), &mut display)
        .unwrap();
    assert_eq!(summary.reason, StopReason::Stopped);
    assert_eq!(summary.frames, 4);

    let mut source = video::from_iter(frames(10));
    let summary = capture
        .run(&mut source, &mut Canned::default(), &mut Recorder::default())
        .unwrap();
    assert_eq!(summary.frames, 0, "a raised stop signal stays raised");
}

#[test]
fn detector_errors_are_fatal() {
    let mut source = video::from_iter(frames(5));
    let mut detector = Canned {
        fail_after: Some(2),
        ..Canned::default()
    };
    let mut display = Recorder::default();

    let err = CaptureLoop::new("CamOutput")
        .run(&mut source, &mut detector, &mut display)
        .unwrap_err();
    let msg = format!("{err:#}");
    assert!(msg.contains("landmark detection failed"), "{msg}");
    assert!(msg.contains("landmark service exited"), "{msg}");
    assert_eq!(display.shown.len(), 2);
}

#[test]
fn frames_are_annotated() {
    let mut positions = [NormalizedPoint::new(0.5, 0.25); HandLandmarks::NUM_LANDMARKS];
    positions[LandmarkIdx::ThumbTip as usize] = NormalizedPoint::new(0.25, 0.75);
    for finger in Finger::ALL {
        positions[finger.tip() as usize] = NormalizedPoint::new(0.75, 0.75);
    }
    let mut detector = Canned {
        detections: Detections {
            faces: Vec::new(),
            hands: vec![DetectedHand {
                landmarks: HandLandmarks::new(positions),
                handedness: None,
            }],
        },
        ..Canned::default()
    };
    let mut source = video::from_iter(frames(1));
    let mut display = Recorder::default();

    CaptureLoop::new("CamOutput")
        .run(&mut source, &mut detector, &mut display)
        .unwrap();

    let (_, shown) = &display.shown[0];
    assert_eq!(shown.get(32, 96), Color::BLUE);
    assert_eq!(shown.get(96, 96), Color::GREEN);
    assert_eq!(shown.get(64, 32), Color::RED);
    assert_eq!(shown.get(127, 127), Color::BLACK);
    assert!(
        (0..shown.width()).any(|x| (40..70).any(|y| shown.get(x, y) == Color::GREEN)),
        "FPS text should be drawn"
    );
}
