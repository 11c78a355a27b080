//! Frame sources.
//!
//! A [`FrameSource`] supplies the sequential frames the capture loop annotates. The main
//! implementations are [`webcam::Webcam`] for live V4L2 capture and [`still::StillImage`], which
//! repeats a single image.

pub mod still;
pub mod webcam;

use crate::image::Image;

/// Outcome of a single [`FrameSource::read_frame`] call.
#[derive(Debug)]
pub enum FrameRead {
    /// A frame was captured.
    Frame(Image),
    /// Reading this frame failed. The source may still yield frames on the next call.
    Failed(anyhow::Error),
    /// The source has ended and will not yield any more frames.
    Exhausted,
}

/// A source of sequential frames.
pub trait FrameSource {
    /// Reads the next frame, blocking until one is available.
    fn read_frame(&mut self) -> FrameRead;
}

impl<S: FrameSource + ?Sized> FrameSource for &mut S {
    fn read_frame(&mut self) -> FrameRead {
        (**self).read_frame()
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn read_frame(&mut self) -> FrameRead {
        (**self).read_frame()
    }
}

/// A [`FrameSource`] yielding the items of an iterator. Created by [`from_iter`].
pub struct IterSource<I> {
    iter: I,
}

/// Creates a [`FrameSource`] from an iterator over frame reads.
///
/// `Ok` items are yielded as frames and `Err` items as read failures. The source is exhausted
/// once the iterator ends.
pub fn from_iter<I>(iter: I) -> IterSource<I::IntoIter>
where
    I: IntoIterator<Item = anyhow::Result<Image>>,
{
    IterSource {
        iter: iter.into_iter(),
    }
}

impl<I> FrameSource for IterSource<I>
where
    I: Iterator<Item = anyhow::Result<Image>>,
{
    fn read_frame(&mut self) -> FrameRead {
        match self.iter.next() {
            Some(Ok(image)) => FrameRead::Frame(image),
            Some(Err(e)) => FrameRead::Failed(e),
            None => FrameRead::Exhausted,
        }
    }
}
