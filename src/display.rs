//! Display sinks, which show annotated frames and report user input.

use std::time::Duration;

use crate::{gui, image::Image};

/// User input relevant to the capture loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Escape,
    /// A printable character.
    Char(char),
    /// The user closed a window.
    WindowClosed,
}

impl Key {
    /// Returns whether this input should end the capture loop.
    ///
    /// That is the case for Escape, `q`/`Q` and closing the window.
    pub fn is_quit(self) -> bool {
        matches!(self, Key::Escape | Key::WindowClosed | Key::Char('q' | 'Q'))
    }
}

/// Shows frames to the user and polls for input.
pub trait DisplaySink {
    /// Shows `image` in the window titled `window`.
    fn show(&mut self, window: &str, image: &Image) -> anyhow::Result<()>;

    /// Waits up to `timeout` for user input.
    fn poll_key(&mut self, timeout: Duration) -> anyhow::Result<Option<Key>>;
}

impl<S: DisplaySink + ?Sized> DisplaySink for &mut S {
    fn show(&mut self, window: &str, image: &Image) -> anyhow::Result<()> {
        (**self).show(window, image)
    }

    fn poll_key(&mut self, timeout: Duration) -> anyhow::Result<Option<Key>> {
        (**self).poll_key(timeout)
    }
}

/// Displays frames in native windows via [`gui`].
///
/// Requires the calling code to run inside [`gui::run`].
#[derive(Debug, Default)]
pub struct GuiDisplay {
    _priv: (),
}

impl GuiDisplay {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DisplaySink for GuiDisplay {
    fn show(&mut self, window: &str, image: &Image) -> anyhow::Result<()> {
        gui::show_image(window, image)
    }

    fn poll_key(&mut self, timeout: Duration) -> anyhow::Result<Option<Key>> {
        gui::poll_key(timeout)
    }
}
