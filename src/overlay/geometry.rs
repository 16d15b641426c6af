/// Screen coordinate in device-independent pixels.
///
/// `#[repr(C)]` so a caller can pass `POINT` arrays straight through the flat
/// C surface.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// This screen point in the coordinates of a surface at `origin`.
    pub fn relative_to(self, origin: Point) -> Self {
        Self::new(self.x.saturating_sub(origin.x), self.y.saturating_sub(origin.y))
    }

    /// Screen point of this position on a surface at `origin`.
    pub fn offset_by(self, origin: Point) -> Self {
        Self::new(self.x.saturating_add(origin.x), self.y.saturating_add(origin.y))
    }
}

impl From<(i32, i32)> for Point {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

/// A recorded cursor position together with the delay that preceded it.
///
/// A `delay_ns` of zero marks the first point of a stroke. The delay is carried
/// for the automation host and never consumed by rendering.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MouseMovement {
    pub position: Point,
    pub delay_ns: i64,
}

impl MouseMovement {
    pub const fn new(position: Point, delay_ns: i64) -> Self {
        Self { position, delay_ns }
    }

    pub fn starts_stroke(&self) -> bool {
        self.delay_ns == 0
    }
}

/// One continuous stroke. Fewer than two points draws nothing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PathSegment {
    points: Vec<Point>,
}

impl PathSegment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn is_drawable(&self) -> bool {
        self.points.len() >= 2
    }

    pub fn push(&mut self, point: Point) {
        self.points.push(point);
    }
}

impl FromIterator<Point> for PathSegment {
    fn from_iter<I: IntoIterator<Item = Point>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}

/// Ordered collection of segments; insertion order is render order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PathSet {
    segments: Vec<PathSegment>,
}

impl PathSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn point_count(&self) -> usize {
        self.segments.iter().map(PathSegment::len).sum()
    }

    /// Segments that contribute geometry to a frame.
    pub fn drawable_segments(&self) -> impl Iterator<Item = &PathSegment> {
        self.segments.iter().filter(|segment| segment.is_drawable())
    }

    /// Appends to the last segment, or opens a new one when asked to (or when
    /// there is no segment yet).
    pub fn push_point(&mut self, point: Point, start_new_segment: bool) {
        self.target_segment(start_new_segment).push(point);
    }

    pub fn extend_points(&mut self, points: &[Point], start_new_segment: bool) {
        let segment = self.target_segment(start_new_segment);
        segment.points.extend_from_slice(points);
    }

    pub fn clear(&mut self) {
        self.segments.clear();
    }

    fn target_segment(&mut self, start_new_segment: bool) -> &mut PathSegment {
        if start_new_segment || self.segments.is_empty() {
            self.segments.push(PathSegment::new());
        }
        let last = self.segments.len() - 1;
        &mut self.segments[last]
    }
}
