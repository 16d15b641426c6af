pub mod compositor;
pub mod drawable;
pub mod error;
pub mod ffi;
pub mod geometry;
pub mod host;
pub mod placement;
pub mod platform;
pub mod raster;
pub mod state;
pub mod window;

pub use drawable::{ClosingCallback, DrawablePathWindow, StrokeRecorder};
pub use error::{OverlayError, Result};
pub use geometry::{MouseMovement, PathSegment, PathSet, Point};
pub use host::WindowHost;
pub use platform::{DefaultPlatform, Platform};
pub use state::WindowState;
pub use window::{HostedWindow, PathWindow};

use crate::settings::OverlaySettings;
use platform::{NativeWindow, WindowOptions};

/// Cross-thread handle type of a platform's windows.
pub type ProxyOf<P> = <<P as Platform>::Window as NativeWindow>::Proxy;

/// Host of an overlay on the platform this build targets.
pub type OverlayHost = WindowHost<ProxyOf<DefaultPlatform>>;

/// Starts a click-through overlay and, once it is shown, traces
/// `initial_points` as its first segment.
pub fn spawn_path_overlay<P>(
    platform: P,
    settings: &OverlaySettings,
    initial_points: &[Point],
) -> Result<WindowHost<ProxyOf<P>>>
where
    P: Platform + Send,
{
    let options = WindowOptions {
        title: settings.window_title.clone(),
        clickable: false,
    };
    let stroke = settings.stroke();
    let host = WindowHost::spawn(move || PathWindow::new(platform, options, stroke))?;
    if !initial_points.is_empty() {
        host.add_points(initial_points, true)?;
    }
    Ok(host)
}

/// Starts an overlay the user draws on. `on_closing` receives the recorded
/// path when the user presses Escape.
pub fn spawn_drawable_overlay<P>(
    platform: P,
    settings: &OverlaySettings,
    movements: Vec<MouseMovement>,
    on_closing: ClosingCallback,
) -> Result<WindowHost<ProxyOf<P>>>
where
    P: Platform + Send,
{
    let title = settings.window_title.clone();
    let stroke = settings.stroke();
    WindowHost::spawn(move || {
        DrawablePathWindow::new(platform, title, stroke, &movements, on_closing)
    })
}
