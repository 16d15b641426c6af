//! Virtual display placement for the overlay window.

pub const BASE_DPI: u32 = 96;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScreenRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl ScreenRect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn size(&self) -> SurfaceSize {
        SurfaceSize {
            width: self.width.max(0) as u32,
            height: self.height.max(0) as u32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Bounds covering the whole virtual display, scaled for the DPI of the
/// monitor the window landed on. The DPI is only known once the window exists.
pub fn overlay_bounds(virtual_screen: ScreenRect, dpi: u32) -> ScreenRect {
    let dpi = if dpi == 0 { BASE_DPI } else { dpi };
    ScreenRect {
        x: virtual_screen.x,
        y: virtual_screen.y,
        width: scale(virtual_screen.width, dpi),
        height: scale(virtual_screen.height, dpi),
    }
}

fn scale(length: i32, dpi: u32) -> i32 {
    ((length as i64 * dpi as i64) / BASE_DPI as i64) as i32
}
