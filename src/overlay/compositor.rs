use crate::overlay::error::{OverlayError, Result};
use crate::overlay::geometry::{PathSet, Point};
use crate::overlay::raster::Rgba;

pub const DEFAULT_STROKE_WIDTH: f32 = 3.0;

/// Device-independent stroke parameters, fixed for the lifetime of a window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeSettings {
    pub width: f32,
    pub color: Rgba,
}

impl Default for StrokeSettings {
    fn default() -> Self {
        Self {
            width: DEFAULT_STROKE_WIDTH,
            color: Rgba::PATH_RED,
        }
    }
}

/// Device-independent half of a render pipeline: the factory objects and the
/// stroke style. Created once during window initialization.
pub trait RenderBackend {
    /// What frames are pushed to (the native window).
    type Target;
    type Resources: DeviceResources<Target = Self::Target>;

    /// Builds the surface, then the brush, then the interop handle, sized to
    /// the target's client area.
    fn create_device_resources(&self, target: &Self::Target) -> Result<Self::Resources>;
}

/// Device-dependent bundle. Dropped as a whole, never piecemeal.
pub trait DeviceResources {
    type Target;

    fn begin_draw(&mut self);

    /// Clears to fully transparent.
    fn clear(&mut self);

    /// Strokes an open, unfilled figure through `points` in order.
    fn stroke_polyline(&mut self, points: &[Point], width: f32) -> Result<()>;

    /// Pushes the current surface to the OS compositor with per-pixel alpha.
    /// The device context borrowed for the blend is released even when the
    /// blend fails.
    fn present(&mut self, target: &Self::Target) -> Result<()>;

    /// Closes the batch. [`OverlayError::DeviceLost`] means the bundle must be
    /// rebuilt.
    fn end_draw(&mut self) -> Result<()>;
}

/// Lazily built render pipeline for one window.
pub struct Compositor<B: RenderBackend> {
    backend: B,
    stroke: StrokeSettings,
    resources: Option<B::Resources>,
    generation: u64,
}

impl<B: RenderBackend> Compositor<B> {
    pub fn new(backend: B, stroke: StrokeSettings) -> Self {
        Self {
            backend,
            stroke,
            resources: None,
            generation: 0,
        }
    }

    pub fn stroke(&self) -> StrokeSettings {
        self.stroke
    }

    pub fn has_device_resources(&self) -> bool {
        self.resources.is_some()
    }

    /// Number of device resource bundles built so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn discard_device_resources(&mut self) {
        if self.resources.take().is_some() {
            tracing::debug!(generation = self.generation, "device resources discarded");
        }
    }

    /// Draws `paths`, given in screen coordinates, onto a surface whose top
    /// left corner sits at `origin` on screen.
    pub fn render(&mut self, target: &B::Target, paths: &PathSet, origin: Point) -> Result<()> {
        let mut resources = match self.resources.take() {
            Some(resources) => resources,
            None => {
                let resources = self.backend.create_device_resources(target)?;
                self.generation += 1;
                tracing::debug!(generation = self.generation, "device resources created");
                resources
            }
        };

        resources.begin_draw();
        resources.clear();

        let mut drawn = Ok(());
        for segment in paths.drawable_segments() {
            let points: Vec<Point> = segment
                .points()
                .iter()
                .map(|point| point.relative_to(origin))
                .collect();
            drawn = resources.stroke_polyline(&points, self.stroke.width);
            if drawn.is_err() {
                break;
            }
        }

        // A frame that failed to build is never pushed; the previous one stays
        // on screen.
        let presented = match drawn {
            Ok(()) => resources.present(target),
            Err(err) => Err(err),
        };

        match resources.end_draw() {
            Ok(()) => {
                self.resources = Some(resources);
                presented
            }
            Err(OverlayError::DeviceLost) => {
                tracing::warn!(
                    generation = self.generation,
                    "render target lost; rebuilding on next render"
                );
                drop(resources);
                presented
            }
            Err(err) => {
                self.resources = Some(resources);
                presented.and(Err(err))
            }
        }
    }
}
