pub mod logging;
pub mod overlay;
pub mod settings;

pub use overlay::{
    spawn_drawable_overlay, spawn_path_overlay, OverlayError, OverlayHost, PathWindow, Point,
    WindowHost, WindowState,
};
pub use settings::OverlaySettings;
