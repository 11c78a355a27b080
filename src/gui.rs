//! A minimal windowing layer for showing annotated frames.
//!
//! Most platforms require the windowing event loop to run on the main thread, so [`run`] takes
//! over the main thread and runs the application on a separate one. The application communicates
//! with the event loop through messages: frames are sent to it with [`show_image`], and key
//! presses come back through [`poll_key`].

mod renderer;

use std::{
    collections::{hash_map::Entry, HashMap, HashSet},
    convert::Infallible,
    panic::{catch_unwind, AssertUnwindSafe},
    rc::Rc,
    sync::{
        mpsc::{self, Receiver, RecvTimeoutError, Sender},
        Arc, Mutex, MutexGuard,
    },
    time::Duration,
};

use anyhow::anyhow;
use once_cell::sync::OnceCell;
use winit::{
    event::{ElementState, Event, KeyboardInput, VirtualKeyCode, WindowEvent},
    event_loop::{ControlFlow, EventLoopBuilder, EventLoopProxy, EventLoopWindowTarget},
    window::WindowId,
};

use crate::{display::Key, image::Image, resolution::Resolution, termination::Termination};

use self::renderer::{Gpu, Renderer, Window};

/// Exit code used when the application thread panics, matching libstd.
const PANIC_EXIT_CODE: i32 = 101;

#[derive(Debug)]
enum Msg {
    Image {
        key: String,
        res: Resolution,
        data: Vec<u8>,
    },
    Exit(i32),
}

/// Bookkeeping for frames in flight between [`show_image`] and the event loop.
#[derive(Debug, Default)]
struct FrameQueue {
    /// Windows with a frame that the event loop has not picked up yet.
    pending: HashSet<String>,
    /// Set once the event loop failed to display a frame.
    failure: Option<String>,
}

impl FrameQueue {
    /// Reserves the slot of window `key` for a new frame.
    ///
    /// Returns `Ok(false)` if a frame for that window is still pending, in which case the new one
    /// should be dropped. Fails once displaying a frame has failed.
    fn reserve(&mut self, key: &str) -> anyhow::Result<bool> {
        if let Some(failure) = &self.failure {
            return Err(anyhow!("failed to display image: {failure}"));
        }
        if self.pending.contains(key) {
            return Ok(false);
        }
        self.pending.insert(key.to_string());
        Ok(true)
    }

    /// Marks the frame for window `key` as picked up by the event loop.
    fn release(&mut self, key: &str) {
        self.pending.remove(key);
    }

    fn fail(&mut self, error: &anyhow::Error) {
        self.failure.get_or_insert_with(|| format!("{error:#}"));
    }
}

struct Gui {
    gpu: Rc<Gpu>,
    windows: HashMap<String, Renderer>,
    win_id_to_key: HashMap<WindowId, String>,
    keys: Sender<Key>,
    frames: Arc<Mutex<FrameQueue>>,
}

impl Gui {
    fn show(
        &mut self,
        target: &EventLoopWindowTarget<Msg>,
        key: String,
        res: Resolution,
        data: &[u8],
    ) -> anyhow::Result<()> {
        let renderer = match self.windows.entry(key) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                log::debug!("creating window '{}' at {res}", entry.key());
                let win = Window::open(target, entry.key(), res)?;
                self.win_id_to_key.insert(win.win.id(), entry.key().clone());
                entry.insert(Renderer::new(win, self.gpu.clone())?)
            }
        };

        renderer.update_texture(res, data);
        renderer.window().request_redraw();
        Ok(())
    }

    fn lock_frames(&self) -> MutexGuard<'_, FrameQueue> {
        self.frames.lock().expect("GUI frame queue mutex poisoned")
    }

    fn window_event(&mut self, event: WindowEvent<'_>) {
        let key = match event {
            WindowEvent::CloseRequested => Some(Key::WindowClosed),
            WindowEvent::KeyboardInput {
                input:
                    KeyboardInput {
                        state: ElementState::Pressed,
                        virtual_keycode: Some(VirtualKeyCode::Escape),
                        ..
                    },
                ..
            } => Some(Key::Escape),
            WindowEvent::ReceivedCharacter(c) if !c.is_control() => Some(Key::Char(c)),
            _ => None,
        };
        if let Some(key) = key {
            // The application may have stopped listening already.
            self.keys.send(key).ok();
        }
    }

    fn run(mut self, event_loop: winit::event_loop::EventLoop<Msg>) -> ! {
        event_loop.run(move |event, target, flow| {
            if let ControlFlow::ExitWithCode(_) = flow {
                return;
            }
            *flow = ControlFlow::Wait;
            match event {
                Event::UserEvent(Msg::Image { key, res, data }) => {
                    self.lock_frames().release(&key);
                    // The application finds out on its next `show_image` call and shuts down,
                    // releasing its resources before sending `Msg::Exit`.
                    if let Err(e) = self.show(target, key, res, &data) {
                        log::error!("failed to display image: {e:#}");
                        self.lock_frames().fail(&e);
                    }
                }
                Event::UserEvent(Msg::Exit(code)) => {
                    log::debug!("application exited with code {code}, closing windows");
                    *flow = ControlFlow::ExitWithCode(code);
                }
                Event::WindowEvent { event, .. } => self.window_event(event),
                Event::RedrawRequested(window) => {
                    if let Some(renderer) = self
                        .win_id_to_key
                        .get(&window)
                        .and_then(|key| self.windows.get_mut(key))
                    {
                        renderer.redraw();
                    }
                }
                _ => {}
            }
        });
    }
}

struct Connection {
    proxy: Mutex<EventLoopProxy<Msg>>,
    keys: Mutex<Receiver<Key>>,
    frames: Arc<Mutex<FrameQueue>>,
}

static CONNECTION: OnceCell<Connection> = OnceCell::new();

fn connection() -> anyhow::Result<&'static Connection> {
    CONNECTION
        .get()
        .ok_or_else(|| anyhow!("GUI is not running (use `gui::run`)"))
}

fn send(msg: Msg) -> anyhow::Result<()> {
    connection()?
        .proxy
        .lock()
        .expect("GUI event loop proxy mutex poisoned")
        .send_event(msg)
        .map_err(|_closed| anyhow!("GUI event loop has exited"))
}

/// Runs `app` on a background thread while the GUI event loop takes over the calling thread.
///
/// Once `app` returns, all windows are closed and the process exits with a status reflecting its
/// result. This function only returns if the GUI fails to initialize.
pub fn run<F, R>(app: F) -> anyhow::Result<Infallible>
where
    F: FnOnce() -> R + Send + 'static,
    R: Termination + Send,
{
    let event_loop = EventLoopBuilder::with_user_event().build();
    let gpu = pollster::block_on(Gpu::open())?;

    let (key_tx, key_rx) = mpsc::channel();
    let frames = Arc::new(Mutex::new(FrameQueue::default()));
    let connection = Connection {
        proxy: Mutex::new(event_loop.create_proxy()),
        keys: Mutex::new(key_rx),
        frames: frames.clone(),
    };
    if CONNECTION.set(connection).is_err() {
        anyhow::bail!("GUI is already running");
    }

    std::thread::spawn(move || {
        let code = match catch_unwind(AssertUnwindSafe(app)) {
            Ok(result) => result.exit_code(),
            // The panic hook has already printed the message.
            Err(_payload) => PANIC_EXIT_CODE,
        };
        if send(Msg::Exit(code)).is_err() {
            // The event loop is gone, so nothing is left to clean up.
            std::process::exit(code);
        }
    });

    let gui = Gui {
        gpu: Rc::new(gpu),
        windows: HashMap::new(),
        win_id_to_key: HashMap::new(),
        keys: key_tx,
        frames,
    };
    gui.run(event_loop)
}

/// Displays `image` in the window titled `key`, creating the window if necessary.
///
/// If the previous image for that window has not been displayed yet, `image` is dropped. Fails
/// once the GUI has failed to display an image.
pub fn show_image(key: impl Into<String>, image: &Image) -> anyhow::Result<()> {
    let key = key.into();
    let frames = &connection()?.frames;
    if !frames
        .lock()
        .expect("GUI frame queue mutex poisoned")
        .reserve(&key)?
    {
        log::trace!("window '{key}' is still busy, dropping frame");
        return Ok(());
    }

    let result = send(Msg::Image {
        key: key.clone(),
        res: image.resolution(),
        data: image.data().to_vec(),
    });
    if result.is_err() {
        frames
            .lock()
            .expect("GUI frame queue mutex poisoned")
            .release(&key);
    }
    result
}

/// Waits up to `timeout` for a key press in any window.
///
/// Returns [`Key::WindowClosed`] once the event loop has gone away.
pub fn poll_key(timeout: Duration) -> anyhow::Result<Option<Key>> {
    let keys = connection()?
        .keys
        .lock()
        .expect("GUI key channel mutex poisoned");
    match keys.recv_timeout(timeout) {
        Ok(key) => Ok(Some(key)),
        Err(RecvTimeoutError::Timeout) => Ok(None),
        Err(RecvTimeoutError::Disconnected) => Ok(Some(Key::WindowClosed)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_frames_while_one_is_pending() {
        let mut frames = FrameQueue::default();
        assert!(frames.reserve("CamOutput").unwrap());
        assert!(!frames.reserve("CamOutput").unwrap());
        assert!(frames.reserve("Debug").unwrap());

        frames.release("CamOutput");
        assert!(frames.reserve("CamOutput").unwrap());
    }

    #[test]
    fn display_failure_is_reported_to_the_app() {
        let mut frames = FrameQueue::default();
        assert!(frames.reserve("CamOutput").unwrap());
        frames.release("CamOutput");
        frames.fail(&anyhow!("surface lost"));
        frames.fail(&anyhow!("later error"));

        let err = frames.reserve("CamOutput").unwrap_err();
        assert_eq!(err.to_string(), "failed to display image: surface lost");
        assert!(frames.reserve("Debug").is_err());
    }
}
