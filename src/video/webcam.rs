//! V4L2 webcam capture.
//!
//! Only `VIDEO_CAPTURE` devices delivering JFIF JPEG or Motion JPEG frames are supported.

use std::cmp::Reverse;

use anyhow::bail;
use linuxvideo::{
    format::{FrameIntervals, FrameSizes, PixFormat, PixelFormat},
    stream::ReadStream,
    BufType, CapabilityFlags, Device, Fract,
};

use crate::{image::Image, resolution::Resolution};

use super::{FrameRead, FrameSource};

/// Minimum frame parameters. Resolution is favored over frame rate.
#[derive(Debug, Default, Clone, Copy)]
struct FramePrefs {
    resolution: Option<Resolution>,
    fps: Option<u32>,
}

impl FramePrefs {
    /// Drops the frame rate constraint, then the resolution constraint. Returns `false` if there
    /// was none left.
    fn relax(&mut self) -> bool {
        self.fps.take().is_some() || self.resolution.take().is_some()
    }
}

/// Settings for [`Webcam::open`].
#[derive(Debug, Default, Clone)]
pub struct WebcamOptions {
    name: Option<String>,
    frame: FramePrefs,
}

impl WebcamOptions {
    /// Only opens the webcam whose card name is `name`.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the minimum desired resolution.
    pub fn resolution(mut self, resolution: Resolution) -> Self {
        self.frame.resolution = Some(resolution);
        self
    }

    /// Sets the minimum desired frame rate.
    pub fn fps(mut self, fps: u32) -> Self {
        self.frame.fps = Some(fps);
        self
    }
}

#[derive(Clone, Copy)]
struct FrameFormat {
    resolution: Resolution,
    frame_interval: Fract,
}

impl FrameFormat {
    fn fps(&self) -> f32 {
        1.0 / self.frame_interval.as_f32()
    }
}

fn supported_formats(device: &Device) -> anyhow::Result<(PixelFormat, Vec<FrameFormat>)> {
    let mut pixel_format = None;
    for format in device.formats(BufType::VIDEO_CAPTURE) {
        let format = format?;
        if format.pixel_format() == PixelFormat::JPEG || format.pixel_format() == PixelFormat::MJPG {
            pixel_format = Some(format.pixel_format());
            break;
        }
    }
    let Some(pixel_format) = pixel_format else {
        bail!("device does not support JPEG or MJPG capture");
    };

    let FrameSizes::Discrete(sizes) = device.frame_sizes(pixel_format)? else {
        bail!("stepwise or continuous resolutions are not supported");
    };

    let mut formats = Vec::new();
    for size in sizes {
        let FrameIntervals::Discrete(intervals) =
            device.frame_intervals(pixel_format, size.width(), size.height())?
        else {
            bail!("stepwise or continuous frame rates are not supported");
        };
        formats.extend(intervals.iter().map(|interval| FrameFormat {
            resolution: Resolution::new(size.width(), size.height()),
            frame_interval: *interval.fract(),
        }));
    }

    Ok((pixel_format, formats))
}

/// Picks the best of `formats` satisfying `prefs`, relaxing them until something matches.
fn negotiate(formats: &[FrameFormat], mut prefs: FramePrefs) -> Option<FrameFormat> {
    loop {
        if let Some(format) = best_format(formats, prefs) {
            return Some(format);
        }
        log::debug!("no webcam format satisfies {:?}", prefs);
        if !prefs.relax() {
            return None;
        }
    }
}

fn best_format(formats: &[FrameFormat], prefs: FramePrefs) -> Option<FrameFormat> {
    let mut eligible = formats
        .iter()
        .filter(|fmt| {
            let res_ok = prefs.resolution.map_or(true, |res| {
                fmt.resolution.width() >= res.width() && fmt.resolution.height() >= res.height()
            });
            let fps_ok = prefs.fps.map_or(true, |fps| fmt.fps().round() >= fps as f32);
            res_ok && fps_ok
        })
        .copied()
        .collect::<Vec<_>>();
    eligible.sort_by_key(|fmt| (fmt.resolution.num_pixels(), Reverse(fmt.frame_interval)));
    eligible.last().copied()
}

/// A V4L2 webcam.
///
/// The capture stream is closed when this is dropped.
pub struct Webcam {
    stream: ReadStream,
    resolution: Resolution,
}

impl Webcam {
    /// Opens the first webcam matching `options`.
    ///
    /// This can block for a few hundred milliseconds while the camera initializes.
    pub fn open(options: WebcamOptions) -> anyhow::Result<Self> {
        for res in linuxvideo::list()? {
            match res {
                Ok(dev) => match Self::open_device(dev, &options) {
                    Ok(Some(webcam)) => return Ok(webcam),
                    Ok(None) => {}
                    Err(e) => log::debug!("skipping device: {e:#}"),
                },
                Err(e) => log::warn!("{e}"),
            }
        }

        match &options.name {
            Some(name) => bail!("no supported webcam named '{name}' found"),
            None => bail!("no supported webcam device found"),
        }
    }

    fn open_device(dev: Device, options: &WebcamOptions) -> anyhow::Result<Option<Self>> {
        let caps = dev.capabilities()?;
        if let Some(name) = &options.name {
            if caps.card() != name {
                return Ok(None);
            }
        }

        let flags = caps.device_capabilities();
        let path = dev.path()?;
        log::debug!(
            "device {} ({}) capabilities: {:?}",
            caps.card(),
            path.display(),
            flags,
        );
        if !flags.contains(CapabilityFlags::VIDEO_CAPTURE) {
            return Ok(None);
        }

        let (pixel_format, formats) = supported_formats(&dev)?;
        let Some(format) = negotiate(&formats, options.frame) else {
            bail!("failed to negotiate a format with {}", caps.card());
        };

        let capture = dev.video_capture(PixFormat::new(
            format.resolution.width(),
            format.resolution.height(),
            pixel_format,
        ))?;
        let actual = capture.format();
        let resolution = Resolution::new(actual.width(), actual.height());
        let interval = capture.set_frame_interval(format.frame_interval)?;

        log::info!(
            "opened {} ({}), {} @ {:.1}Hz",
            caps.card(),
            path.display(),
            resolution,
            1.0 / interval.as_f32(),
        );

        Ok(Some(Self {
            stream: capture.into_stream()?,
            resolution,
        }))
    }

    /// Returns the resolution of the captured frames.
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }
}

impl FrameSource for Webcam {
    /// Dequeues and decodes the next frame.
    ///
    /// Webcams occasionally deliver corrupted MJPG frames. Those are reported as
    /// [`FrameRead::Failed`], as is any error dequeuing the buffer.
    fn read_frame(&mut self) -> FrameRead {
        match self.stream.dequeue(|buf| Ok(Image::decode_jpeg(&buf))) {
            Ok(Ok(image)) => FrameRead::Frame(image),
            Ok(Err(e)) => FrameRead::Failed(e.context("failed to decode webcam frame")),
            Err(e) => FrameRead::Failed(anyhow::Error::new(e).context("failed to dequeue frame")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(width: u32, height: u32, fps: u32) -> FrameFormat {
        FrameFormat {
            resolution: Resolution::new(width, height),
            frame_interval: Fract::new(1, fps),
        }
    }

    fn pick(formats: &[FrameFormat], prefs: FramePrefs) -> Option<(Resolution, u32)> {
        negotiate(formats, prefs).map(|fmt| (fmt.resolution, fmt.fps().round() as u32))
    }

    fn formats() -> Vec<FrameFormat> {
        vec![
            format(640, 480, 30),
            format(640, 480, 60),
            format(1280, 720, 30),
            format(1920, 1080, 15),
        ]
    }

    #[test]
    fn largest_resolution_first() {
        let prefs = FramePrefs {
            resolution: Some(Resolution::new(1280, 720)),
            fps: Some(30),
        };
        assert_eq!(
            pick(&formats(), prefs),
            Some((Resolution::new(1280, 720), 30))
        );

        assert_eq!(
            pick(&formats(), FramePrefs::default()),
            Some((Resolution::new(1920, 1080), 15))
        );
    }

    #[test]
    fn fastest_at_equal_resolution() {
        let prefs = FramePrefs {
            resolution: Some(Resolution::new(640, 480)),
            fps: Some(60),
        };
        assert_eq!(
            pick(&formats(), prefs),
            Some((Resolution::new(640, 480), 60))
        );
    }

    #[test]
    fn relaxes_frame_rate_first() {
        // Nothing delivers 1080p at 30 FPS.
        let prefs = FramePrefs {
            resolution: Some(Resolution::new(1920, 1080)),
            fps: Some(30),
        };
        assert_eq!(
            pick(&formats(), prefs),
            Some((Resolution::new(1920, 1080), 15))
        );

        // Nothing delivers 4K at all.
        let prefs = FramePrefs {
            resolution: Some(Resolution::new(3840, 2160)),
            fps: Some(30),
        };
        assert_eq!(
            pick(&formats(), prefs),
            Some((Resolution::new(1920, 1080), 15))
        );
    }

    #[test]
    fn no_formats() {
        assert_eq!(pick(&[], FramePrefs::default()), None);
    }
}
