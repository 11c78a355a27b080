//! Landmark detection through an external landmark service process.
//!
//! The service is spawned once and then serves one request per detection call:
//!
//! - The service is started with `--min-detection-confidence <f>` and
//!   `--min-tracking-confidence <f>` appended to its command line, and prints `READY` once it has
//!   loaded its models.
//! - A request is a kind byte (`H` for hands, `F` for faces), the frame width and height as
//!   little-endian `u32`s, and `width * height * 3` bytes of RGB pixel data.
//! - The response is a single line of JSON, either `{"hands":[...]}` or `{"faces":[...]}`. Each
//!   entry carries a `landmarks` list of `[x, y]` pairs; hands may also carry a `handedness`
//!   object. An `error` string indicates a recoverable problem on the service side.

use std::{
    io::{BufRead, BufReader, Write},
    process::{Child, ChildStdin, ChildStdout, Command, Stdio},
};

use anyhow::{bail, Context};
use serde::Deserialize;

use crate::{
    detector::{DetectorConfig, LandmarkDetector},
    face::FaceLandmarks,
    hand::{DetectedHand, HandLandmarks, Handedness},
    image::Image,
    landmark::NormalizedPoint,
};

const READY: &str = "READY";

#[derive(Debug, Clone, Copy)]
enum RequestKind {
    Hands,
    Faces,
}

impl RequestKind {
    fn tag(self) -> u8 {
        match self {
            RequestKind::Hands => b'H',
            RequestKind::Faces => b'F',
        }
    }
}

#[derive(Deserialize)]
struct Response {
    #[serde(default)]
    hands: Vec<HandRecord>,
    #[serde(default)]
    faces: Vec<FaceRecord>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct HandRecord {
    landmarks: Vec<NormalizedPoint>,
    #[serde(default)]
    handedness: Option<Handedness>,
}

#[derive(Deserialize)]
struct FaceRecord {
    landmarks: Vec<NormalizedPoint>,
}

fn parse_response(line: &str) -> anyhow::Result<Response> {
    let response: Response = serde_json::from_str(line)
        .with_context(|| format!("malformed response from landmark service: {}", line.trim()))?;
    if let Some(error) = &response.error {
        log::warn!("landmark service reported an error: {error}");
        return Ok(Response {
            hands: Vec::new(),
            faces: Vec::new(),
            error: None,
        });
    }
    Ok(response)
}

/// Returns whether all `landmarks` are finite, logging a warning if they are not.
fn check_finite(what: &str, landmarks: &[NormalizedPoint]) -> bool {
    match landmarks.iter().position(|p| !p.is_finite()) {
        Some(index) => {
            log::warn!(
                "skipping {what} with non-finite landmark {index}: {:?}",
                landmarks[index]
            );
            false
        }
        None => true,
    }
}

fn parse_hands(line: &str) -> anyhow::Result<Vec<DetectedHand>> {
    let response = parse_response(line)?;
    Ok(response
        .hands
        .into_iter()
        .filter(|record| check_finite("hand", &record.landmarks))
        .filter_map(|record| {
            let count = record.landmarks.len();
            match HandLandmarks::from_points(record.landmarks) {
                Some(landmarks) => Some(DetectedHand {
                    landmarks,
                    handedness: record.handedness,
                }),
                None => {
                    log::warn!(
                        "skipping hand with {count} landmarks (expected {})",
                        HandLandmarks::NUM_LANDMARKS
                    );
                    None
                }
            }
        })
        .collect())
}

fn parse_faces(line: &str) -> anyhow::Result<Vec<FaceLandmarks>> {
    let response = parse_response(line)?;
    Ok(response
        .faces
        .into_iter()
        .filter(|record| check_finite("face", &record.landmarks))
        .filter_map(|record| {
            let count = record.landmarks.len();
            let face = FaceLandmarks::from_points(record.landmarks);
            if face.is_none() {
                log::warn!(
                    "skipping face with {count} landmarks (expected at least {})",
                    FaceLandmarks::MIN_LANDMARKS
                );
            }
            face
        })
        .collect())
}

/// A [`LandmarkDetector`] backed by a landmark service child process.
///
/// The child process is killed when this is dropped.
pub struct SubprocessDetector {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    line: String,
}

impl SubprocessDetector {
    /// Spawns the landmark service and waits for it to become ready.
    ///
    /// `command` is the program to run, followed by any arguments.
    pub fn spawn(command: &[String], config: DetectorConfig) -> anyhow::Result<Self> {
        let Some((program, args)) = command.split_first() else {
            bail!("landmark service command is empty");
        };

        log::info!("starting landmark service `{}`", command.join(" "));
        let mut child = Command::new(program)
            .args(args)
            .arg("--min-detection-confidence")
            .arg(config.min_detection_confidence().to_string())
            .arg("--min-tracking-confidence")
            .arg(config.min_tracking_confidence().to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("failed to start landmark service `{program}`"))?;

        // `child` is killed by `Drop` if anything below fails.
        let stdin = child.stdin.take().context("landmark service has no stdin")?;
        let stdout = child.stdout.take().context("landmark service has no stdout")?;
        let mut this = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            line: String::new(),
        };

        this.read_line()
            .context("landmark service failed to start")?;
        if this.line.trim() != READY {
            bail!(
                "landmark service did not signal readiness, got '{}'",
                this.line.trim()
            );
        }

        log::info!("landmark service ready (pid {})", this.child.id());
        Ok(this)
    }

    fn read_line(&mut self) -> anyhow::Result<()> {
        self.line.clear();
        let n = self.stdout.read_line(&mut self.line)?;
        if n == 0 {
            bail!("landmark service exited unexpectedly");
        }
        Ok(())
    }

    fn request(&mut self, kind: RequestKind, image: &Image) -> anyhow::Result<&str> {
        let mut header = [0; 9];
        header[0] = kind.tag();
        header[1..5].copy_from_slice(&image.width().to_le_bytes());
        header[5..9].copy_from_slice(&image.height().to_le_bytes());

        self.stdin
            .write_all(&header)
            .and_then(|_| self.stdin.write_all(&image.to_rgb8()))
            .and_then(|_| self.stdin.flush())
            .context("failed to send frame to landmark service")?;
        self.read_line()?;
        Ok(self.line.as_str())
    }
}

impl LandmarkDetector for SubprocessDetector {
    fn detect_hands(&mut self, image: &Image) -> anyhow::Result<Vec<DetectedHand>> {
        let line = self.request(RequestKind::Hands, image)?;
        parse_hands(line)
    }

    fn detect_faces(&mut self, image: &Image) -> anyhow::Result<Vec<FaceLandmarks>> {
        let line = self.request(RequestKind::Faces, image)?;
        parse_faces(line)
    }
}

impl Drop for SubprocessDetector {
    fn drop(&mut self) {
        if let Err(e) = self.child.kill() {
            log::debug!("failed to kill landmark service: {e}");
        }
        match self.child.wait() {
            Ok(status) => log::debug!("landmark service exited with {status}"),
            Err(e) => log::warn!("failed to reap landmark service: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::hand::{HandLabel, LandmarkIdx};

    use super::*;

    fn points_json(n: usize) -> String {
        let points = (0..n)
            .map(|i| format!("[{}, 0.5]", i as f32 / 100.0))
            .collect::<Vec<_>>();
        format!("[{}]", points.join(","))
    }

    #[test]
    fn parses_hands() {
        let line = format!(
            r#"{{"hands":[{{"landmarks":{},"handedness":{{"label":"Right","score":0.92}}}},{{"landmarks":{}}}]}}"#,
            points_json(21),
            points_json(21),
        );
        let hands = parse_hands(&line).unwrap();
        assert_eq!(hands.len(), 2);
        assert_eq!(hands[0].handedness.unwrap().label, HandLabel::Right);
        assert_eq!(
            hands[0].landmarks.get(LandmarkIdx::ThumbTip),
            NormalizedPoint::new(0.04, 0.5)
        );
        assert!(hands[1].handedness.is_none());
    }

    #[test]
    fn skips_malformed_records() {
        let line = format!(
            r#"{{"hands":[{{"landmarks":{}}},{{"landmarks":{}}}]}}"#,
            points_json(20),
            points_json(21),
        );
        assert_eq!(parse_hands(&line).unwrap().len(), 1);

        let line = format!(
            r#"{{"faces":[{{"landmarks":{}}},{{"landmarks":{}}}]}}"#,
            points_json(10),
            points_json(478),
        );
        let faces = parse_faces(&line).unwrap();
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].positions().len(), 478);
    }

    #[test]
    fn skips_non_finite_records() {
        // 1e39 does not fit into an `f32` and turns into infinity.
        let mut points = vec!["[0.5, 0.5]"; 21];
        points[8] = "[1e39, 0.5]";
        let line = format!(
            r#"{{"hands":[{{"landmarks":[{}]}},{{"landmarks":{}}}]}}"#,
            points.join(","),
            points_json(21),
        );
        let hands = parse_hands(&line).unwrap();
        assert_eq!(hands.len(), 1);
        assert!(hands[0].landmarks.positions().iter().all(|p| p.is_finite()));
    }

    #[test]
    fn empty_and_error_responses() {
        assert!(parse_hands(r#"{"hands":[]}"#).unwrap().is_empty());
        assert!(parse_faces("{}").unwrap().is_empty());
        let line = format!(
            r#"{{"error":"model hiccup","faces":[{{"landmarks":{}}}]}}"#,
            points_json(468)
        );
        assert!(parse_faces(&line).unwrap().is_empty());
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(parse_hands("not json").is_err());
        assert!(parse_hands(r#"{"hands":[{"landmarks":[[0.5]]}]}"#).is_err());
    }

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".into(), "-c".into(), script.into(), "sh".into()]
    }

    #[test]
    fn serves_requests() {
        let mut detector = SubprocessDetector::spawn(
            &sh(r#"echo READY; echo '{"hands":[]}'; cat >/dev/null"#),
            DetectorConfig::default(),
        )
        .unwrap();
        let hands = detector.detect_hands(&Image::new(4, 4)).unwrap();
        assert!(hands.is_empty());
    }

    #[test]
    fn handshake_failures() {
        let err = SubprocessDetector::spawn(&sh("echo LOADING"), DetectorConfig::default())
            .err()
            .unwrap();
        assert!(err.to_string().contains("LOADING"), "{err}");

        assert!(SubprocessDetector::spawn(&sh("exit 1"), DetectorConfig::default()).is_err());
        assert!(SubprocessDetector::spawn(&[], DetectorConfig::default()).is_err());
        assert!(SubprocessDetector::spawn(
            &["/nonexistent/landmark-service".into()],
            DetectorConfig::default()
        )
        .is_err());
    }

    #[test]
    fn service_exit_is_fatal() {
        let mut detector =
            SubprocessDetector::spawn(&sh("echo READY"), DetectorConfig::default()).unwrap();
        assert!(detector.detect_faces(&Image::new(4, 4)).is_err());
    }
}
