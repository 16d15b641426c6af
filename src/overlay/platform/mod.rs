//! Seams between the overlay core and the windowing system.

pub mod headless;
#[cfg(windows)]
pub mod win32;

use crate::overlay::compositor::{RenderBackend, StrokeSettings};
use crate::overlay::error::{OverlayError, Result};
use crate::overlay::geometry::Point;
use crate::overlay::placement::SurfaceSize;
use std::sync::mpsc::SyncSender;

#[cfg(windows)]
pub type DefaultPlatform = win32::Win32Platform;
#[cfg(not(windows))]
pub type DefaultPlatform = headless::HeadlessPlatform;

/// Win32 message numbering, shared by every platform so input collaborators
/// see the same values everywhere.
pub mod message_kind {
    pub const WM_KEYUP: u32 = 0x0101;
    pub const WM_MOUSEMOVE: u32 = 0x0200;
    pub const WM_LBUTTONDOWN: u32 = 0x0201;
    pub const WM_LBUTTONUP: u32 = 0x0202;
    pub const WM_RBUTTONDOWN: u32 = 0x0204;

    pub const MK_LBUTTON: usize = 0x0001;
    pub const MK_SHIFT: usize = 0x0004;

    pub const VK_ESCAPE: usize = 0x1B;
}

/// A message the core does not interpret itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawMessage {
    pub kind: u32,
    pub wparam: usize,
    pub lparam: isize,
}

impl RawMessage {
    pub const fn new(kind: u32, wparam: usize, lparam: isize) -> Self {
        Self {
            kind,
            wparam,
            lparam,
        }
    }

    /// Mouse message carrying `point` in client coordinates.
    pub fn mouse(kind: u32, wparam: usize, point: Point) -> Self {
        let packed = ((point.y as u16 as u32) << 16) | (point.x as u16 as u32);
        Self::new(kind, wparam, packed as i32 as isize)
    }

    /// Client coordinates packed in `lparam`, sign-extended per word.
    pub fn point(&self) -> Point {
        let x = (self.lparam & 0xffff) as i16 as i32;
        let y = ((self.lparam >> 16) & 0xffff) as i16 as i32;
        Point::new(x, y)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowCommand {
    AddPoint {
        point: Point,
        render: bool,
        start_new_segment: bool,
    },
    AddPoints {
        points: Vec<Point>,
        start_new_segment: bool,
    },
    ClearPoints,
    Render,
}

pub type Reply = SyncSender<Result<()>>;

/// What other threads may post into a window's queue.
#[derive(Debug)]
pub enum HostMessage {
    Close,
    Command { command: WindowCommand, reply: Reply },
}

/// What the owning thread pulls out of its queue.
#[derive(Debug)]
pub enum WindowMessage {
    Command { command: WindowCommand, reply: Reply },
    Input(RawMessage),
}

/// Cross-thread handle to a window's queue.
pub trait WindowProxy: Clone + Send + 'static {
    /// Fails with [`OverlayError::ThreadCommunication`] once the window is gone.
    fn post(&self, message: HostMessage) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowOptions {
    pub title: String,
    /// When false the window is click-through.
    pub clickable: bool,
}

impl Default for WindowOptions {
    fn default() -> Self {
        Self {
            title: "Path Overlay".to_string(),
            clickable: false,
        }
    }
}

pub trait NativeWindow {
    type Proxy: WindowProxy;

    fn proxy(&self) -> Self::Proxy;

    /// Sizes the window over the virtual display for its monitor's DPI.
    fn place(&mut self) -> Result<()>;

    fn show(&mut self) -> Result<()>;

    fn client_size(&self) -> SurfaceSize;

    /// Screen position of the client area's top left corner.
    fn client_origin(&self) -> Point;

    /// Blocks for the next message. `Ok(None)` once the close signal has been
    /// processed and the native window destroyed.
    fn next_message(&mut self) -> Result<Option<WindowMessage>>;

    /// Platform fallback for an input message after collaborators saw it.
    fn default_handling(&self, message: RawMessage);

    fn request_close(&self) -> Result<()> {
        self.proxy().post(HostMessage::Close)
    }
}

/// Everything a window needs from the system it runs on.
pub trait Platform: 'static {
    type Window: NativeWindow;
    type Backend: RenderBackend<Target = Self::Window>;
    /// Per-thread setup, undone on drop.
    type ThreadScope;

    fn enter_thread(&self) -> Result<Self::ThreadScope>;

    /// Device-independent factory objects and stroke style.
    fn create_backend(&self, stroke: StrokeSettings) -> Result<Self::Backend>;

    fn create_window(&self, options: &WindowOptions) -> Result<Self::Window>;
}

pub(crate) fn send_reply(reply: Reply, result: Result<()>) {
    if reply.send(result).is_err() {
        tracing::debug!("command caller went away before the reply");
    }
}

pub(crate) fn disconnected(what: &str) -> OverlayError {
    OverlayError::ThreadCommunication(format!("{what}: overlay thread is gone"))
}
