//! A frame source that repeats a single image.

use std::path::Path;

use anyhow::Context;

use crate::image::Image;

use super::{FrameRead, FrameSource};

/// Yields copies of one image forever.
///
/// Useful for running the annotation pipeline without a camera.
pub struct StillImage {
    image: Image,
}

impl StillImage {
    pub fn new(image: Image) -> Self {
        Self { image }
    }

    /// Loads the image at `path` (JPEG or PNG).
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let image = Image::load(path)
            .with_context(|| format!("failed to load still image '{}'", path.display()))?;
        log::info!("loaded still image '{}' ({:?})", path.display(), image);
        Ok(Self::new(image))
    }
}

impl FrameSource for StillImage {
    fn read_frame(&mut self) -> FrameRead {
        FrameRead::Frame(self.image.clone())
    }
}
