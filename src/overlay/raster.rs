//! Software stroke rasteriser producing premultiplied BGRA frames, the pixel
//! layout a layered window expects.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const TRANSPARENT: Self = Self::rgba(0, 0, 0, 0);
    /// Red at 70% opacity.
    pub const PATH_RED: Self = Self::rgba(255, 0, 0, 179);

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn to_premultiplied_bgra(self) -> [u8; 4] {
        [
            premultiply(self.b, self.a),
            premultiply(self.g, self.a),
            premultiply(self.r, self.a),
            self.a,
        ]
    }
}

fn premultiply(channel: u8, alpha: u8) -> u8 {
    ((channel as u32 * alpha as u32 + 127) / 255) as u8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PixelRect {
    x0: i32,
    y0: i32,
    x1: i32,
    y1: i32,
}

impl PixelRect {
    fn around(points: &[(f32, f32)], pad: f32, width: u32, height: u32) -> Option<Self> {
        let mut min_x = f32::MAX;
        let mut min_y = f32::MAX;
        let mut max_x = f32::MIN;
        let mut max_y = f32::MIN;
        for &(x, y) in points {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        // Clamped in f32 so far-off coordinates never overflow the cast.
        let x0 = (min_x - pad).floor().max(0.0) as i32;
        let y0 = (min_y - pad).floor().max(0.0) as i32;
        let x1 = ((max_x + pad).ceil() + 1.0).min(width as f32) as i32;
        let y1 = ((max_y + pad).ceil() + 1.0).min(height as f32) as i32;
        (x0 < x1 && y0 < y1).then_some(Self { x0, y0, x1, y1 })
    }
}

/// Premultiplied BGRA pixel buffer, top-down rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Frame {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0u8; (width as usize) * (height as usize) * 4],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        if x >= self.width || y >= self.height {
            return [0; 4];
        }
        let idx = ((y * self.width + x) * 4) as usize;
        [
            self.pixels[idx],
            self.pixels[idx + 1],
            self.pixels[idx + 2],
            self.pixels[idx + 3],
        ]
    }

    pub fn alpha(&self, x: u32, y: u32) -> u8 {
        self.pixel(x, y)[3]
    }

    /// True when no pixel carries any alpha.
    pub fn is_blank(&self) -> bool {
        self.pixels.chunks_exact(4).all(|px| px[3] == 0)
    }

    pub fn clear(&mut self) {
        self.pixels.fill(0);
    }

    /// Strokes an open polyline with flat ends and round joins. Pixel `(x, y)`
    /// samples the point `(x, y)`; coverage is binary and overlapping parts of
    /// one polyline are blended once.
    pub fn stroke_polyline(&mut self, points: &[(f32, f32)], stroke_width: f32, color: Rgba) {
        if points.len() < 2 || stroke_width <= 0.0 {
            return;
        }
        let radius = stroke_width / 2.0;
        let Some(bounds) = PixelRect::around(points, radius, self.width, self.height) else {
            return;
        };

        let joins = &points[1..points.len() - 1];
        let radius_sq = radius * radius;
        let src = color.to_premultiplied_bgra();
        for y in bounds.y0..bounds.y1 {
            for x in bounds.x0..bounds.x1 {
                let center = (x as f32, y as f32);
                let covered = points
                    .windows(2)
                    .any(|pair| within_flat_segment(center, pair[0], pair[1], radius_sq))
                    || joins
                        .iter()
                        .any(|&join| distance_sq(center, join) <= radius_sq);
                if covered {
                    self.blend_pixel(x as u32, y as u32, src);
                }
            }
        }
    }

    fn blend_pixel(&mut self, x: u32, y: u32, src: [u8; 4]) {
        let idx = ((y * self.width + x) * 4) as usize;
        let inverse = 255 - src[3] as u32;
        for channel in 0..4 {
            let dst = self.pixels[idx + channel] as u32;
            self.pixels[idx + channel] = (src[channel] as u32 + (dst * inverse + 127) / 255) as u8;
        }
    }
}

fn distance_sq(a: (f32, f32), b: (f32, f32)) -> f32 {
    let dx = a.0 - b.0;
    let dy = a.1 - b.1;
    dx * dx + dy * dy
}

fn within_flat_segment(
    point: (f32, f32),
    start: (f32, f32),
    end: (f32, f32),
    radius_sq: f32,
) -> bool {
    let vx = end.0 - start.0;
    let vy = end.1 - start.1;
    let length_sq = vx * vx + vy * vy;
    if length_sq <= f32::EPSILON {
        return false;
    }
    let t = ((point.0 - start.0) * vx + (point.1 - start.1) * vy) / length_sq;
    if !(0.0..=1.0).contains(&t) {
        return false;
    }
    let projected = (start.0 + vx * t, start.1 + vy * t);
    distance_sq(point, projected) <= radius_sq
}
