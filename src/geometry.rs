//! Bézier math and path iteration.
//!
//! Outlines are stored as a flat list of [`PathElement`]s. Consumers walk
//! them through [`Outline::segments`], which tracks the current point and the
//! subpath start so that `ClosePath` (and the implicit close a fill performs
//! on open subpaths) turns into an explicit line back to the start.

use lyon::geom::{CubicBezierSegment, LineSegment, QuadraticBezierSegment};
use lyon::math::{Box2D, Point, Vector};

/// Linear interpolation `a + t·(b - a)`.
#[must_use]
pub fn lerp(t: f32, a: Point, b: Point) -> Point {
    a + (b - a) * t
}

/// Point on a quadratic Bézier at `t`, by two nested lerps.
#[must_use]
pub fn quadratic_point(t: f32, p0: Point, p1: Point, p2: Point) -> Point {
    let ab = lerp(t, p0, p1);
    let bc = lerp(t, p1, p2);
    lerp(t, ab, bc)
}

/// Point on a cubic Bézier at `t`, by three levels of lerps.
#[must_use]
pub fn cubic_point(t: f32, p0: Point, p1: Point, p2: Point, p3: Point) -> Point {
    let ab = lerp(t, p0, p1);
    let bc = lerp(t, p1, p2);
    let cd = lerp(t, p2, p3);
    let abc = lerp(t, ab, bc);
    let bcd = lerp(t, bc, cd);
    lerp(t, abc, bcd)
}

/// Split a quadratic at `t` with de Casteljau's construction.
#[must_use]
pub fn split_quadratic(
    curve: &QuadraticBezierSegment<f32>,
    t: f32,
) -> (QuadraticBezierSegment<f32>, QuadraticBezierSegment<f32>) {
    let ab = lerp(t, curve.from, curve.ctrl);
    let bc = lerp(t, curve.ctrl, curve.to);
    let mid = lerp(t, ab, bc);
    (
        QuadraticBezierSegment {
            from: curve.from,
            ctrl: ab,
            to: mid,
        },
        QuadraticBezierSegment {
            from: mid,
            ctrl: bc,
            to: curve.to,
        },
    )
}

/// Split a cubic at `t` with de Casteljau's construction.
#[must_use]
pub fn split_cubic(
    curve: &CubicBezierSegment<f32>,
    t: f32,
) -> (CubicBezierSegment<f32>, CubicBezierSegment<f32>) {
    let ab = lerp(t, curve.from, curve.ctrl1);
    let bc = lerp(t, curve.ctrl1, curve.ctrl2);
    let cd = lerp(t, curve.ctrl2, curve.to);
    let abc = lerp(t, ab, bc);
    let bcd = lerp(t, bc, cd);
    let mid = lerp(t, abc, bcd);
    (
        CubicBezierSegment {
            from: curve.from,
            ctrl1: ab,
            ctrl2: abc,
            to: mid,
        },
        CubicBezierSegment {
            from: mid,
            ctrl1: bcd,
            ctrl2: cd,
            to: curve.to,
        },
    )
}

/// 2D cross product `a.x·b.y - a.y·b.x`.
#[must_use]
pub fn cross(a: Vector, b: Vector) -> f32 {
    a.x * b.y - a.y * b.x
}

/// Twice the signed area of triangle `abc`; positive when counter-clockwise
/// in a y-up frame.
#[must_use]
pub fn orient(a: Point, b: Point, c: Point) -> f32 {
    cross(b - a, c - a)
}

/// Signed area of a triangle (shoelace formula).
#[must_use]
pub fn triangle_area(a: Point, b: Point, c: Point) -> f32 {
    0.5 * orient(a, b, c)
}

/// Smallest box containing all `points`, or `None` for an empty iterator.
pub fn bounding_box(points: impl IntoIterator<Item = Point>) -> Option<Box2D> {
    let mut points = points.into_iter();
    let first = points.next()?;
    let mut bounds = Box2D::new(first, first);
    for p in points {
        bounds.min = bounds.min.min(p);
        bounds.max = bounds.max.max(p);
    }
    Some(bounds)
}

/// Round a box outward to whole pixels: floor the min corner, ceil the max.
#[must_use]
pub fn round_out(bounds: &Box2D) -> Box2D {
    Box2D::new(bounds.min.floor(), bounds.max.ceil())
}

/// Whether a box encloses no area.
#[must_use]
pub fn is_degenerate(bounds: &Box2D) -> bool {
    !(bounds.max.x > bounds.min.x && bounds.max.y > bounds.min.y)
}

/// One outline operator.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum PathElement {
    /// Start a new subpath.
    MoveTo(Point),
    /// Straight line from the current point.
    LineTo(Point),
    /// Quadratic curve: control point, end point.
    QuadraticTo(Point, Point),
    /// Cubic curve: first control, second control, end point.
    CubicTo(Point, Point, Point),
    /// Line back to the subpath start.
    ClosePath,
}

/// A drawable piece of an outline with its start point resolved.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Segment {
    /// Straight edge.
    Line(LineSegment<f32>),
    /// Quadratic Bézier.
    Quadratic(QuadraticBezierSegment<f32>),
    /// Cubic Bézier.
    Cubic(CubicBezierSegment<f32>),
}

impl Segment {
    /// Start point.
    #[must_use]
    pub fn from(&self) -> Point {
        match self {
            Segment::Line(s) => s.from,
            Segment::Quadratic(s) => s.from,
            Segment::Cubic(s) => s.from,
        }
    }

    /// End point.
    #[must_use]
    pub fn to(&self) -> Point {
        match self {
            Segment::Line(s) => s.to,
            Segment::Quadratic(s) => s.to,
            Segment::Cubic(s) => s.to,
        }
    }

    /// Point at parameter `t`.
    #[must_use]
    pub fn point_at(&self, t: f32) -> Point {
        match self {
            Segment::Line(s) => lerp(t, s.from, s.to),
            Segment::Quadratic(s) => quadratic_point(t, s.from, s.ctrl, s.to),
            Segment::Cubic(s) => cubic_point(t, s.from, s.ctrl1, s.ctrl2, s.to),
        }
    }
}

/// A glyph outline in the move/line/quad/cubic/close vocabulary.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Outline {
    elements: Vec<PathElement>,
}

impl Outline {
    /// An empty outline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an element.
    pub fn push(&mut self, element: PathElement) {
        self.elements.push(element);
    }

    /// The raw elements.
    #[must_use]
    pub fn elements(&self) -> &[PathElement] {
        &self.elements
    }

    /// Whether there are no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Iterate closed-fill segments, grouped per subpath.
    ///
    /// Every subpath is closed: an explicit `ClosePath` and the implicit close
    /// at the next `MoveTo` (or at the end) both produce a line back to the
    /// subpath start, unless the current point is already there. Drawing
    /// operators before any `MoveTo` start from the origin.
    #[must_use]
    pub fn segments(&self) -> Segments<'_> {
        Segments {
            elements: self.elements.iter(),
            current: Point::origin(),
            start: Point::origin(),
            open: false,
            pending: None,
        }
    }

    /// Control-point bounds, or `None` for an outline without points.
    #[must_use]
    pub fn control_bounds(&self) -> Option<Box2D> {
        let mut points = Vec::new();
        for element in &self.elements {
            match *element {
                PathElement::MoveTo(p) | PathElement::LineTo(p) => points.push(p),
                PathElement::QuadraticTo(c, p) => points.extend([c, p]),
                PathElement::CubicTo(c1, c2, p) => points.extend([c1, c2, p]),
                PathElement::ClosePath => {}
            }
        }
        bounding_box(points)
    }

    /// Flatten into closed polylines with `steps` lines per curve.
    ///
    /// Each returned polyline starts at its subpath start; the closing edge
    /// back to that start is implied.
    #[must_use]
    pub fn flatten(&self, steps: u32) -> Vec<Vec<Point>> {
        let steps = steps.max(1);
        let mut polylines: Vec<Vec<Point>> = Vec::new();
        let mut current: Vec<Point> = Vec::new();
        for event in self.segments() {
            match event {
                SegmentEvent::Begin(at) => {
                    current = vec![at];
                }
                SegmentEvent::Segment(segment) => match segment {
                    Segment::Line(line) => current.push(line.to),
                    Segment::Quadratic(_) | Segment::Cubic(_) => {
                        #[expect(clippy::cast_precision_loss)]
                        current.extend((1..=steps).map(|i| segment.point_at(i as f32 / steps as f32)));
                    }
                },
                SegmentEvent::End => {
                    if current.len() > 1 && current.last() == current.first() {
                        current.pop();
                    }
                    if current.len() > 1 {
                        polylines.push(std::mem::take(&mut current));
                    }
                }
            }
        }
        polylines
    }

    /// Signed area enclosed by the outline's flattened polygon.
    ///
    /// Positive for counter-clockwise contours in a y-up frame.
    #[must_use]
    pub fn signed_area(&self, steps: u32) -> f32 {
        self.flatten(steps)
            .iter()
            .map(|polyline| polygon_area(polyline))
            .sum()
    }
}

/// Signed area of a closed polygon by the shoelace formula.
#[must_use]
pub fn polygon_area(points: &[Point]) -> f32 {
    let Some(&last) = points.last() else {
        return 0.0;
    };
    let mut previous = last;
    let mut twice = 0.0;
    for &p in points {
        twice += cross(previous.to_vector(), p.to_vector());
        previous = p;
    }
    0.5 * twice
}

/// What [`Segments`] yields.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum SegmentEvent {
    /// A subpath starts at this point.
    Begin(Point),
    /// A drawable segment.
    Segment(Segment),
    /// The current subpath ended (after its closing line, if any).
    End,
}

/// Iterator returned by [`Outline::segments`].
#[derive(Clone, Debug)]
pub struct Segments<'a> {
    elements: std::slice::Iter<'a, PathElement>,
    current: Point,
    start: Point,
    open: bool,
    pending: Option<SegmentEvent>,
}

impl Segments<'_> {
    /// Close the open subpath: a line home if needed, then `End`.
    fn close(&mut self) -> Option<SegmentEvent> {
        if !self.open {
            return None;
        }
        self.open = false;
        if self.current == self.start {
            return Some(SegmentEvent::End);
        }
        let line = LineSegment {
            from: self.current,
            to: self.start,
        };
        self.current = self.start;
        self.pending = Some(SegmentEvent::End);
        Some(SegmentEvent::Segment(Segment::Line(line)))
    }

    /// Make sure a subpath is open before a drawing operator.
    fn ensure_open(&mut self) -> Option<SegmentEvent> {
        if self.open {
            return None;
        }
        self.open = true;
        self.start = self.current;
        Some(SegmentEvent::Begin(self.current))
    }
}

impl Iterator for Segments<'_> {
    type Item = SegmentEvent;

    fn next(&mut self) -> Option<SegmentEvent> {
        if let Some(event) = self.pending.take() {
            return Some(event);
        }
        loop {
            let Some(element) = self.elements.as_slice().first().copied() else {
                return self.close();
            };
            let from = self.current;
            let segment = match element {
                PathElement::MoveTo(p) => {
                    if let Some(event) = self.close() {
                        // Re-visit the move once the previous subpath is closed.
                        return Some(event);
                    }
                    self.elements.next();
                    self.current = p;
                    self.start = p;
                    continue;
                }
                PathElement::ClosePath => {
                    self.elements.next();
                    if let Some(event) = self.close() {
                        return Some(event);
                    }
                    // Closing an empty or already-closed subpath draws nothing.
                    continue;
                }
                PathElement::LineTo(to) => Segment::Line(LineSegment { from, to }),
                PathElement::QuadraticTo(ctrl, to) => {
                    Segment::Quadratic(QuadraticBezierSegment { from, ctrl, to })
                }
                PathElement::CubicTo(ctrl1, ctrl2, to) => Segment::Cubic(CubicBezierSegment {
                    from,
                    ctrl1,
                    ctrl2,
                    to,
                }),
            };
            if let Some(begin) = self.ensure_open() {
                return Some(begin);
            }
            self.elements.next();
            self.current = segment.to();
            return Some(SegmentEvent::Segment(segment));
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use lyon::math::point;

    fn assert_point_eq(actual: Point, expected: Point) {
        assert!(
            (actual - expected).length() < 1e-5,
            "expected {expected:?}, got {actual:?}",
        );
    }

    fn square() -> Outline {
        let mut outline = Outline::new();
        outline.push(PathElement::MoveTo(point(0.0, 0.0)));
        outline.push(PathElement::LineTo(point(2.0, 0.0)));
        outline.push(PathElement::LineTo(point(2.0, 2.0)));
        outline.push(PathElement::LineTo(point(0.0, 2.0)));
        outline.push(PathElement::ClosePath);
        outline
    }

    fn segments_of(outline: &Outline) -> Vec<Segment> {
        outline
            .segments()
            .filter_map(|event| match event {
                SegmentEvent::Segment(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn lerp_endpoints_and_midpoint() {
        let a = point(1.0, 2.0);
        let b = point(3.0, 6.0);
        assert_point_eq(lerp(0.0, a, b), a);
        assert_point_eq(lerp(1.0, a, b), b);
        assert_point_eq(lerp(0.5, a, b), point(2.0, 4.0));
    }

    #[test]
    fn quadratic_midpoint() {
        let p = quadratic_point(0.5, point(0.0, 0.0), point(1.0, 2.0), point(2.0, 0.0));
        assert_point_eq(p, point(1.0, 1.0));
    }

    #[test]
    fn cubic_matches_polynomial_form() {
        let (p0, p1, p2, p3) = (point(0.0, 0.0), point(1.0, 3.0), point(3.0, 3.0), point(4.0, 0.0));
        for i in 0..=10 {
            #[expect(clippy::cast_precision_loss)]
            let t = i as f32 / 10.0;
            let mt = 1.0 - t;
            let expected = (p0.to_vector() * (mt * mt * mt)
                + p1.to_vector() * (3.0 * mt * mt * t)
                + p2.to_vector() * (3.0 * mt * t * t)
                + p3.to_vector() * (t * t * t))
                .to_point();
            assert_point_eq(cubic_point(t, p0, p1, p2, p3), expected);
        }
    }

    #[test]
    fn split_cubic_halves_meet_on_the_curve() {
        let curve = CubicBezierSegment {
            from: point(0.0, 0.0),
            ctrl1: point(0.0, 4.0),
            ctrl2: point(4.0, 4.0),
            to: point(4.0, 0.0),
        };
        let (a, b) = split_cubic(&curve, 0.25);
        assert_point_eq(a.to, cubic_point(0.25, curve.from, curve.ctrl1, curve.ctrl2, curve.to));
        assert_point_eq(b.from, a.to);
        assert_point_eq(b.to, curve.to);
        // The second half at its midpoint is the original at t = 0.625.
        assert_point_eq(
            cubic_point(0.5, b.from, b.ctrl1, b.ctrl2, b.to),
            cubic_point(0.625, curve.from, curve.ctrl1, curve.ctrl2, curve.to),
        );
    }

    #[test]
    fn split_quadratic_preserves_endpoints() {
        let curve = QuadraticBezierSegment {
            from: point(0.0, 0.0),
            ctrl: point(1.0, 2.0),
            to: point(2.0, 0.0),
        };
        let (a, b) = split_quadratic(&curve, 0.5);
        assert_point_eq(a.from, curve.from);
        assert_point_eq(a.to, point(1.0, 1.0));
        assert_point_eq(b.to, curve.to);
    }

    #[test]
    fn close_path_emits_line_home() {
        let segments = segments_of(&square());
        assert_eq!(segments.len(), 4);
        assert_point_eq(segments[3].from(), point(0.0, 2.0));
        assert_point_eq(segments[3].to(), point(0.0, 0.0));
    }

    #[test]
    fn close_on_empty_subpath_is_a_no_op() {
        let mut outline = Outline::new();
        outline.push(PathElement::MoveTo(point(1.0, 1.0)));
        outline.push(PathElement::ClosePath);
        outline.push(PathElement::ClosePath);
        assert!(segments_of(&outline).is_empty());
        assert!(outline.flatten(4).is_empty());
    }

    #[test]
    fn repeated_moves_start_one_subpath_at_the_last_point() {
        let (a, b, c) = (point(0.0, 0.0), point(1.0, 0.0), point(1.0, 1.0));
        let mut outline = Outline::new();
        outline.push(PathElement::MoveTo(a));
        outline.push(PathElement::MoveTo(b));
        outline.push(PathElement::LineTo(c));
        outline.push(PathElement::ClosePath);
        let events: Vec<_> = outline.segments().collect();
        assert_eq!(
            events,
            [
                SegmentEvent::Begin(b),
                SegmentEvent::Segment(Segment::Line(LineSegment { from: b, to: c })),
                SegmentEvent::Segment(Segment::Line(LineSegment { from: c, to: b })),
                SegmentEvent::End,
            ]
        );
    }

    #[test]
    fn open_subpaths_are_closed_implicitly() {
        let mut outline = Outline::new();
        outline.push(PathElement::MoveTo(point(0.0, 0.0)));
        outline.push(PathElement::LineTo(point(1.0, 0.0)));
        outline.push(PathElement::LineTo(point(1.0, 1.0)));
        outline.push(PathElement::MoveTo(point(5.0, 5.0)));
        outline.push(PathElement::LineTo(point(6.0, 5.0)));
        outline.push(PathElement::LineTo(point(6.0, 6.0)));
        let events: Vec<SegmentEvent> = outline.segments().collect();
        let begins = events.iter().filter(|e| matches!(e, SegmentEvent::Begin(_))).count();
        let ends = events.iter().filter(|e| matches!(e, SegmentEvent::End)).count();
        assert_eq!((begins, ends), (2, 2));
        assert_eq!(segments_of(&outline).len(), 6);
    }

    #[test]
    fn square_area_is_positive_for_ccw() {
        assert!((square().signed_area(1) - 4.0).abs() < 1e-6);
    }

    #[test]
    fn flatten_uses_fixed_steps_per_curve() {
        let mut outline = Outline::new();
        outline.push(PathElement::MoveTo(point(0.0, 0.0)));
        outline.push(PathElement::QuadraticTo(point(1.0, 2.0), point(2.0, 0.0)));
        outline.push(PathElement::ClosePath);
        let polylines = outline.flatten(10);
        assert_eq!(polylines.len(), 1);
        // Start point plus ten curve samples; the closing edge is implied.
        assert_eq!(polylines[0].len(), 11);
    }

    #[test]
    fn round_out_floors_min_and_ceils_max() {
        let rounded = round_out(&Box2D::new(point(0.25, -1.5), point(3.1, 2.0)));
        assert_point_eq(rounded.min, point(0.0, -2.0));
        assert_point_eq(rounded.max, point(4.0, 2.0));
    }

    #[test]
    fn control_bounds_cover_all_points() {
        let mut outline = Outline::new();
        outline.push(PathElement::MoveTo(point(0.0, 0.0)));
        outline.push(PathElement::CubicTo(point(-1.0, 3.0), point(5.0, 4.0), point(2.0, 0.0)));
        let bounds = outline.control_bounds().unwrap();
        assert_point_eq(bounds.min, point(-1.0, 0.0));
        assert_point_eq(bounds.max, point(5.0, 4.0));
    }
}
