//! Loop–Blinn triangulation of glyph outlines.
//!
//! An outline is split into straight edges and convex curve pieces. Each
//! curve piece contributes its control hull, annotated with implicit
//! coefficients so the fragment stage can decide per pixel which side of the
//! curve it is on. The region enclosed by the chords is filled with solid
//! triangles, either as a signed fan counted through the stencil buffer or as
//! a lyon tessellation drawn in a single pass.
//!
//! # Sign convention
//!
//! Coefficients `(k, l, m)` are interpolated across a triangle and a
//! fragment is covered when `k³ - l·m < 0` (see [`Coefficient::implicit`]).
//! The classification table only fixes the curve up to sign, so every hull is
//! oriented after the fact by evaluating the implicit function at a point
//! known to lie between the chord and the curve. This makes the result
//! independent of the font's contour direction.

use lyon::geom::{CubicBezierSegment, QuadraticBezierSegment};
use lyon::math::Point;

use crate::geometry::{
    cubic_point, lerp, orient, quadratic_point, split_cubic, Outline, Segment, SegmentEvent,
};
use crate::outline::tessellate_polygons;
use crate::types::{Coefficient, GlyphMesh};

/// Control points closer than this (in pixels) to their chord are treated as
/// a straight edge.
const FLATNESS: f32 = 1e-3;

/// Limit on halving a cubic while looking for convex pieces.
const MAX_SUBDIVISION_DEPTH: u32 = 8;

/// Normalized discriminant terms below this magnitude count as zero.
const ROUND_TO_ZERO: f64 = 0.001;

/// Turns smaller than this are ignored by the convexity test.
const TURN_EPSILON: f32 = 1e-5;

/// Lines per curve when the fill side is estimated from the signed area.
const AREA_STEPS: u32 = 16;

/// Root pattern of a cubic's inflection polynomial.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CurveKind {
    /// Three distinct real inflection points.
    Serpentine,
    /// One real inflection point and a double point.
    Loop,
    /// A cusp, or an inflection at infinity.
    Cusp,
    /// A degree-elevated quadratic.
    Quadratic,
    /// All control points collinear or coincident.
    Line,
}

/// Result of [`classify`]: the curve kind and the coefficients at the four
/// control points, before orientation.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Classification {
    /// Root pattern.
    pub kind: CurveKind,
    /// Coefficients at `from`, `ctrl1`, `ctrl2`, `to`.
    pub coefficients: [Coefficient; 4],
}

/// Classify a cubic and compute its implicit coefficients.
///
/// Uses the determinants of the homogeneous control points to build the
/// inflection polynomial `d1, d2, d3`, normalizes it and looks up the
/// coefficient table for its root pattern.
#[must_use]
#[allow(clippy::float_cmp)]
pub fn classify(curve: &CubicBezierSegment<f32>) -> Classification {
    let points = [curve.from, curve.ctrl1, curve.ctrl2, curve.to];
    let b = points.map(|p| [f64::from(p.x), f64::from(p.y), 1.0]);

    let a1 = dot(b[0], cross(b[3], b[2]));
    let a2 = dot(b[1], cross(b[0], b[3]));
    let a3 = dot(b[2], cross(b[1], b[0]));

    let d = [a1 - 2.0 * a2 + 3.0 * a3, -a2 + 3.0 * a3, 3.0 * a3];
    let length = dot(d, d).sqrt();

    let all_same = points.iter().all(|&p| p == points[0]);
    if all_same || !length.is_normal() {
        return line_classification();
    }

    let [d1, d2, d3] = d.map(|x| round_to_zero(x / length));
    let discr = d1 * d1 * (3.0 * d2 * d2 - 4.0 * d1 * d3);

    let (kind, klm) = if d1 == 0.0 && d2 == 0.0 && d3 == 0.0 {
        return line_classification();
    } else if d1 == 0.0 && d2 == 0.0 {
        (CurveKind::Quadratic, quadratic_table())
    } else if discr > 0.0 || (discr == 0.0 && d1 != 0.0) {
        (CurveKind::Serpentine, serpentine_table(d1, d2, d3))
    } else if discr < 0.0 {
        (CurveKind::Loop, loop_table(d1, d2, d3))
    } else {
        (CurveKind::Cusp, cusp_table(d2, d3))
    };

    Classification {
        kind,
        coefficients: klm.map(to_coefficient),
    }
}

fn line_classification() -> Classification {
    Classification {
        kind: CurveKind::Line,
        coefficients: [Coefficient::default(); 4],
    }
}

/// Snap near-zero terms to exactly zero; table selection compares against it.
fn round_to_zero(x: f64) -> f64 {
    if x.abs() < ROUND_TO_ZERO {
        0.0
    } else {
        x
    }
}

fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

#[expect(clippy::cast_possible_truncation)]
fn to_coefficient([k, l, m]: [f64; 3]) -> Coefficient {
    Coefficient::new(k as f32, l as f32, m as f32)
}

fn quadratic_table() -> [[f64; 3]; 4] {
    [
        [0.0, 0.0, 0.0],
        [1.0 / 3.0, 0.0, 1.0 / 3.0],
        [2.0 / 3.0, 1.0 / 3.0, 2.0 / 3.0],
        [1.0, 1.0, 1.0],
    ]
}

fn serpentine_table(d1: f64, d2: f64, d3: f64) -> [[f64; 3]; 4] {
    let root = (9.0 * d2 * d2 - 12.0 * d1 * d3).max(0.0).sqrt();
    let ls = 3.0 * d2 - root;
    let lt = 6.0 * d1;
    let ms = 3.0 * d2 + root;
    let mt = 6.0 * d1;
    [
        [ls * ms, ls * ls * ls, ms * ms * ms],
        [
            (3.0 * ls * ms - ls * mt - lt * ms) / 3.0,
            ls * ls * (ls - lt),
            ms * ms * (ms - mt),
        ],
        [
            (lt * (mt - 2.0 * ms) + ls * (3.0 * ms - 2.0 * mt)) / 3.0,
            (lt - ls) * (lt - ls) * ls,
            (mt - ms) * (mt - ms) * ms,
        ],
        [
            (lt - ls) * (mt - ms),
            -(lt - ls) * (lt - ls) * (lt - ls),
            -(mt - ms) * (mt - ms) * (mt - ms),
        ],
    ]
}

fn loop_table(d1: f64, d2: f64, d3: f64) -> [[f64; 3]; 4] {
    let root = (4.0 * d1 * d3 - 3.0 * d2 * d2).max(0.0).sqrt();
    let ls = d2 - root;
    let lt = 2.0 * d1;
    let ms = d2 + root;
    let mt = 2.0 * d1;
    [
        [ls * ms, ls * ls * ms, ls * ms * ms],
        [
            (-ls * mt - lt * ms + 3.0 * ls * ms) / 3.0,
            -ls * (ls * (mt - 3.0 * ms) + 2.0 * lt * ms) / 3.0,
            -ms * (ls * (2.0 * mt - 3.0 * ms) + lt * ms) / 3.0,
        ],
        [
            (lt * (mt - 2.0 * ms) + ls * (3.0 * ms - 2.0 * mt)) / 3.0,
            (lt - ls) * (ls * (2.0 * mt - 3.0 * ms) + lt * ms) / 3.0,
            (mt - ms) * (ls * (mt - 3.0 * ms) + 2.0 * lt * ms) / 3.0,
        ],
        [
            (lt - ls) * (mt - ms),
            -(lt - ls) * (lt - ls) * (mt - ms),
            -(lt - ls) * (mt - ms) * (mt - ms),
        ],
    ]
}

fn cusp_table(d2: f64, d3: f64) -> [[f64; 3]; 4] {
    let ls = d3;
    let lt = 3.0 * d2;
    [
        [ls, ls * ls * ls, 1.0],
        [ls - lt / 3.0, ls * ls * (ls - lt), 1.0],
        [ls - 2.0 * lt / 3.0, (ls - lt) * (ls - lt) * ls, 1.0],
        [ls - lt, (ls - lt) * (ls - lt) * (ls - lt), 1.0],
    ]
}

/// How the region enclosed by the chords is filled.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum InteriorFill {
    /// A triangle fan from the glyph origin to every edge, in path order.
    ///
    /// Fan triangles overlap and carry signed winding, so the mesh must be
    /// drawn with a non-zero stencil count followed by a cover pass.
    StencilFan,
    /// The chord polygon tessellated with lyon's non-zero fill.
    ///
    /// Triangles never overlap and the mesh draws in a single pass.
    #[default]
    Tessellated,
}

/// Converts outlines to Loop–Blinn meshes.
#[derive(Copy, Clone, Debug, Default)]
pub struct Triangulator {
    interior: InteriorFill,
}

impl Triangulator {
    /// A triangulator using the given interior strategy.
    #[must_use]
    pub fn new(interior: InteriorFill) -> Self {
        Self { interior }
    }

    /// The interior strategy.
    #[must_use]
    pub fn interior(&self) -> InteriorFill {
        self.interior
    }

    /// Triangulate an outline relative to the glyph origin.
    ///
    /// An outline without any area yields an empty mesh.
    #[must_use]
    pub fn triangulate(&self, outline: &Outline) -> GlyphMesh<Coefficient> {
        let contours = contours(outline);
        match self.interior {
            InteriorFill::StencilFan => fan_mesh(&contours),
            InteriorFill::Tessellated => {
                let fill_left = outline.signed_area(AREA_STEPS) >= 0.0;
                tessellated_mesh(&contours, fill_left)
            }
        }
    }
}

/// One closed subpath broken into drawable pieces.
struct Contour {
    start: Point,
    pieces: Vec<Piece>,
}

enum Piece {
    Line { from: Point, to: Point },
    Curve(CurveHull),
}

/// Index triples into [`CurveHull::points`] for each hull shape.
const QUADRATIC_HULL: &[[usize; 3]] = &[[0, 1, 2]];
const CUBIC_HULL: &[[usize; 3]] = &[[0, 1, 2], [0, 2, 3]];

/// A convex curve piece with its control hull and coefficients.
#[derive(Clone, Debug)]
struct CurveHull {
    points: [Point; 4],
    coefficients: [Coefficient; 4],
    triangles: &'static [[usize; 3]],
    /// A point strictly between the chord and the curve.
    sample: Point,
}

impl CurveHull {
    fn quadratic(curve: &QuadraticBezierSegment<f32>) -> Self {
        let chord_mid = lerp(0.5, curve.from, curve.to);
        let on_curve = quadratic_point(0.5, curve.from, curve.ctrl, curve.to);
        Self {
            points: [curve.from, curve.ctrl, curve.to, curve.to],
            coefficients: [
                Coefficient::new(0.0, 0.0, 0.0),
                Coefficient::new(0.5, 0.0, 0.5),
                Coefficient::new(1.0, 1.0, 1.0),
                Coefficient::new(1.0, 1.0, 1.0),
            ],
            triangles: QUADRATIC_HULL,
            sample: lerp(0.5, chord_mid, on_curve),
        }
    }

    fn cubic(curve: &CubicBezierSegment<f32>, coefficients: [Coefficient; 4]) -> Self {
        let chord_mid = lerp(0.5, curve.from, curve.to);
        let on_curve = cubic_point(0.5, curve.from, curve.ctrl1, curve.ctrl2, curve.to);
        Self {
            points: [curve.from, curve.ctrl1, curve.ctrl2, curve.to],
            coefficients,
            triangles: CUBIC_HULL,
            sample: lerp(0.5, chord_mid, on_curve),
        }
    }

    fn from(&self) -> Point {
        self.points[0]
    }

    fn to(&self) -> Point {
        self.points[self.triangles.len() + 1]
    }

    /// The interior control points, in path order.
    fn controls(&self) -> &[Point] {
        &self.points[1..=self.triangles.len()]
    }

    /// Positive when the controls lie left of the chord `from → to`.
    fn control_side(&self) -> f32 {
        orient(self.from(), self.to(), self.points[1])
            + orient(self.from(), self.to(), self.points[self.triangles.len()])
    }

    fn implicit_at(&self, p: Point) -> Option<f32> {
        self.triangles.iter().find_map(|&[a, b, c]| {
            implicit_at(
                [self.points[a], self.points[b], self.points[c]],
                [
                    self.coefficients[a],
                    self.coefficients[b],
                    self.coefficients[c],
                ],
                p,
                -1e-4,
            )
        })
    }

    /// Orient the coefficients so the region between chord and curve is
    /// covered (`cap_inside`) or uncovered (`!cap_inside`).
    ///
    /// Returns `false` if the hull is too degenerate to decide.
    fn orient(&mut self, cap_inside: bool) -> bool {
        let Some(f) = self.implicit_at(self.sample) else {
            return false;
        };
        if !f.is_normal() {
            return false;
        }
        if (f < 0.0) != cap_inside {
            for coefficient in &mut self.coefficients {
                *coefficient = coefficient.flipped();
            }
        }
        true
    }

    fn emit(&self, mesh: &mut GlyphMesh<Coefficient>) {
        for &[a, b, c] in self.triangles {
            let points = [self.points[a], self.points[b], self.points[c]];
            if orient(points[0], points[1], points[2]) == 0.0 {
                continue;
            }
            mesh.push_triangle(
                points,
                [
                    self.coefficients[a],
                    self.coefficients[b],
                    self.coefficients[c],
                ],
            );
        }
    }
}

fn contours(outline: &Outline) -> Vec<Contour> {
    let mut contours = Vec::new();
    let mut current: Option<Contour> = None;
    for event in outline.segments() {
        match event {
            SegmentEvent::Begin(start) => {
                current = Some(Contour {
                    start,
                    pieces: Vec::new(),
                });
            }
            SegmentEvent::Segment(segment) => {
                if let Some(contour) = current.as_mut() {
                    push_pieces(&mut contour.pieces, &segment);
                }
            }
            SegmentEvent::End => contours.extend(current.take()),
        }
    }
    contours
}

fn push_pieces(pieces: &mut Vec<Piece>, segment: &Segment) {
    match segment {
        Segment::Line(line) => pieces.push(Piece::Line {
            from: line.from,
            to: line.to,
        }),
        Segment::Quadratic(curve) => {
            if distance_to_chord(curve.ctrl, curve.from, curve.to) <= FLATNESS {
                pieces.push(Piece::Line {
                    from: curve.from,
                    to: curve.to,
                });
            } else {
                pieces.push(Piece::Curve(CurveHull::quadratic(curve)));
            }
        }
        Segment::Cubic(curve) => push_cubic(pieces, curve, MAX_SUBDIVISION_DEPTH),
    }
}

/// Halve a cubic until every piece has a convex control polygon, so no piece
/// contains an inflection or a loop.
fn push_cubic(pieces: &mut Vec<Piece>, curve: &CubicBezierSegment<f32>, depth: u32) {
    let flat = distance_to_chord(curve.ctrl1, curve.from, curve.to) <= FLATNESS
        && distance_to_chord(curve.ctrl2, curve.from, curve.to) <= FLATNESS;
    if flat || depth == 0 {
        pieces.push(Piece::Line {
            from: curve.from,
            to: curve.to,
        });
        return;
    }
    if is_convex(curve) {
        let classification = classify(curve);
        if classification.kind == CurveKind::Line {
            pieces.push(Piece::Line {
                from: curve.from,
                to: curve.to,
            });
        } else {
            pieces.push(Piece::Curve(CurveHull::cubic(
                curve,
                classification.coefficients,
            )));
        }
        return;
    }
    let (head, tail) = split_cubic(curve, 0.5);
    push_cubic(pieces, &head, depth - 1);
    push_cubic(pieces, &tail, depth - 1);
}

fn distance_to_chord(p: Point, from: Point, to: Point) -> f32 {
    let length = (to - from).length();
    if length <= f32::EPSILON {
        (p - from).length()
    } else {
        orient(from, to, p).abs() / length
    }
}

/// Whether the control polygon, closed by the chord, is convex with both
/// controls on the same side of the chord. Coincident points are tolerated.
fn is_convex(curve: &CubicBezierSegment<f32>) -> bool {
    let [p0, p1, p2, p3] = [curve.from, curve.ctrl1, curve.ctrl2, curve.to];
    let turns = [
        orient(p0, p1, p2),
        orient(p1, p2, p3),
        orient(p2, p3, p0),
        orient(p3, p0, p1),
    ];
    let sides = [orient(p0, p3, p1), orient(p0, p3, p2)];
    consistent_sign(&turns) && consistent_sign(&sides)
}

fn consistent_sign(values: &[f32]) -> bool {
    let positive = values.iter().any(|&v| v > TURN_EPSILON);
    let negative = values.iter().any(|&v| v < -TURN_EPSILON);
    positive != negative
}

fn push_solid(mesh: &mut GlyphMesh<Coefficient>, points: [Point; 3]) {
    if orient(points[0], points[1], points[2]) != 0.0 {
        mesh.push_triangle(points, [Coefficient::SOLID; 3]);
    }
}

fn fan_mesh(contours: &[Contour]) -> GlyphMesh<Coefficient> {
    let origin = Point::origin();
    let mut mesh = GlyphMesh::empty();
    for contour in contours {
        for piece in &contour.pieces {
            match piece {
                Piece::Line { from, to } => push_solid(&mut mesh, [origin, *from, *to]),
                Piece::Curve(hull) => {
                    push_solid(&mut mesh, [origin, hull.from(), hull.to()]);
                    let mut hull = hull.clone();
                    if hull.orient(true) {
                        hull.emit(&mut mesh);
                    }
                }
            }
        }
    }
    mesh
}

fn tessellated_mesh(contours: &[Contour], fill_left: bool) -> GlyphMesh<Coefficient> {
    let mut polygons = Vec::with_capacity(contours.len());
    let mut curves = GlyphMesh::empty();
    for contour in contours {
        let mut polygon = vec![contour.start];
        for piece in &contour.pieces {
            match piece {
                Piece::Line { to, .. } => polygon.push(*to),
                Piece::Curve(hull) => {
                    let mut hull = hull.clone();
                    let bulges_into_fill = (hull.control_side() > 0.0) == fill_left;
                    if bulges_into_fill {
                        // Route the polygon around the hull and cover the
                        // part of the hull that is still inside.
                        if hull.orient(false) {
                            polygon.extend_from_slice(hull.controls());
                            hull.emit(&mut curves);
                        }
                    } else if hull.orient(true) {
                        hull.emit(&mut curves);
                    }
                    polygon.push(hull.to());
                }
            }
        }
        if polygon.len() > 1 && polygon.first() == polygon.last() {
            polygon.pop();
        }
        if polygon.len() >= 3 {
            polygons.push(polygon);
        }
    }

    let mut mesh = GlyphMesh::empty();
    if !polygons.is_empty() {
        for triangle in tessellate_polygons(&polygons).unwrap_or_default() {
            push_solid(&mut mesh, triangle);
        }
    }
    mesh.positions.extend(curves.positions);
    mesh.attributes.extend(curves.attributes);
    mesh
}

/// Barycentric weights of `p` in triangle `abc`, or `None` if the triangle
/// has no area.
fn barycentric([a, b, c]: [Point; 3], p: Point) -> Option<[f32; 3]> {
    let det = orient(a, b, c);
    if det == 0.0 {
        return None;
    }
    let wa = orient(p, b, c) / det;
    let wb = orient(a, p, c) / det;
    Some([wa, wb, 1.0 - wa - wb])
}

/// Evaluate the interpolated implicit function at `p`, if `p` lies inside
/// the triangle (weights above `tolerance`).
fn implicit_at(
    triangle: [Point; 3],
    coefficients: [Coefficient; 3],
    p: Point,
    tolerance: f32,
) -> Option<f32> {
    let weights = barycentric(triangle, p)?;
    if weights.iter().any(|&w| w < tolerance) {
        return None;
    }
    let mut klm = [0.0; 3];
    for (weight, coefficient) in weights.iter().zip(coefficients) {
        for (sum, value) in klm.iter_mut().zip(coefficient.klm) {
            *sum += weight * value;
        }
    }
    Some(Coefficient { klm }.implicit())
}

fn covering_triangles(
    mesh: &GlyphMesh<Coefficient>,
    p: Point,
) -> impl Iterator<Item = [Point; 3]> + '_ {
    mesh.positions
        .chunks_exact(3)
        .zip(mesh.attributes.chunks_exact(3))
        .filter_map(move |(positions, attributes)| {
            let triangle = [positions[0].point(), positions[1].point(), positions[2].point()];
            let f = implicit_at(
                triangle,
                [attributes[0], attributes[1], attributes[2]],
                p,
                1e-6,
            )?;
            (f < 0.0).then_some(triangle)
        })
}

/// Signed winding the stencil pass accumulates at `p`: every covering
/// triangle counts `+1` if counter-clockwise and `-1` if clockwise.
#[must_use]
pub fn winding_at(mesh: &GlyphMesh<Coefficient>, p: Point) -> i32 {
    covering_triangles(mesh, p)
        .map(|[a, b, c]| if orient(a, b, c) > 0.0 { 1 } else { -1 })
        .sum()
}

/// CPU rendition of the fragment stage: whether `p` ends up covered when the
/// mesh is drawn with the given interior strategy.
#[must_use]
pub fn coverage_at(mesh: &GlyphMesh<Coefficient>, p: Point, interior: InteriorFill) -> bool {
    match interior {
        InteriorFill::StencilFan => winding_at(mesh, p) != 0,
        InteriorFill::Tessellated => covering_triangles(mesh, p).next().is_some(),
    }
}

/// Triangle fan from the glyph origin over the outline flattened with
/// `steps` lines per curve. Winding is resolved by the stencil pass.
#[must_use]
pub fn stencil_fan(outline: &Outline, steps: u32) -> GlyphMesh<()> {
    let origin = Point::origin();
    let mut mesh = GlyphMesh::empty();
    for polyline in outline.flatten(steps) {
        let Some(&last) = polyline.last() else {
            continue;
        };
        let mut previous = last;
        for &p in &polyline {
            if orient(origin, previous, p) != 0.0 {
                mesh.push_triangle([origin, previous, p], [(); 3]);
            }
            previous = p;
        }
    }
    mesh
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::geometry::{polygon_area, triangle_area, PathElement};
    use crate::outline::OutlineBuilder;
    use lyon::math::point;

    /// Cubic approximation constant for a quarter circle.
    const KAPPA: f32 = 0.552_284_8;

    fn polygon(points: &[(f32, f32)]) -> Outline {
        let mut builder = OutlineBuilder::new();
        let (x, y) = points[0];
        builder.move_to(x, y);
        for &(x, y) in &points[1..] {
            builder.line_to(x, y);
        }
        builder.close();
        builder.finish().unwrap()
    }

    /// Circle of radius `r` around `(cx, cy)`, counter-clockwise unless
    /// `clockwise`.
    fn circle(cx: f32, cy: f32, r: f32, clockwise: bool) -> Outline {
        let k = r * KAPPA;
        let mut builder = OutlineBuilder::new();
        builder.move_to(cx + r, cy);
        if clockwise {
            builder.curve_to(cx + r, cy - k, cx + k, cy - r, cx, cy - r);
            builder.curve_to(cx - k, cy - r, cx - r, cy - k, cx - r, cy);
            builder.curve_to(cx - r, cy + k, cx - k, cy + r, cx, cy + r);
            builder.curve_to(cx + k, cy + r, cx + r, cy + k, cx + r, cy);
        } else {
            builder.curve_to(cx + r, cy + k, cx + k, cy + r, cx, cy + r);
            builder.curve_to(cx - k, cy + r, cx - r, cy + k, cx - r, cy);
            builder.curve_to(cx - r, cy - k, cx - k, cy - r, cx, cy - r);
            builder.curve_to(cx + k, cy - r, cx + r, cy - k, cx + r, cy);
        }
        builder.close();
        builder.finish().unwrap()
    }

    /// A 10×10 square whose top edge bulges up and whose bottom edge is
    /// pushed in, both by quadratic curves.
    fn pillow(reversed: bool) -> Outline {
        let mut outline = Outline::new();
        let mut elements = vec![
            PathElement::MoveTo(point(0.0, 0.0)),
            PathElement::QuadraticTo(point(5.0, 4.0), point(10.0, 0.0)),
            PathElement::LineTo(point(10.0, 10.0)),
            PathElement::QuadraticTo(point(5.0, 14.0), point(0.0, 10.0)),
            PathElement::ClosePath,
        ];
        if reversed {
            elements = vec![
                PathElement::MoveTo(point(0.0, 0.0)),
                PathElement::LineTo(point(0.0, 10.0)),
                PathElement::QuadraticTo(point(5.0, 14.0), point(10.0, 10.0)),
                PathElement::LineTo(point(10.0, 0.0)),
                PathElement::QuadraticTo(point(5.0, 4.0), point(0.0, 0.0)),
                PathElement::ClosePath,
            ];
        }
        for element in elements {
            outline.push(element);
        }
        outline
    }

    fn signed_area(mesh: &GlyphMesh<impl Copy>) -> f32 {
        mesh.positions
            .chunks_exact(3)
            .map(|t| triangle_area(t[0].point(), t[1].point(), t[2].point()))
            .sum()
    }

    fn unsigned_area(mesh: &GlyphMesh<Coefficient>) -> f32 {
        mesh.positions
            .chunks_exact(3)
            .map(|t| triangle_area(t[0].point(), t[1].point(), t[2].point()).abs())
            .sum()
    }

    fn assert_coverage(outline: &Outline, inside: &[Point], outside: &[Point]) {
        for interior in [InteriorFill::StencilFan, InteriorFill::Tessellated] {
            let mesh = Triangulator::new(interior).triangulate(outline);
            for &p in inside {
                assert!(coverage_at(&mesh, p, interior), "{interior:?}: {p:?} should be covered");
            }
            for &p in outside {
                assert!(!coverage_at(&mesh, p, interior), "{interior:?}: {p:?} should be empty");
            }
        }
    }

    #[test]
    fn fan_area_matches_polygon_area() {
        let points = [(1.0, 1.0), (9.0, 2.0), (7.0, 6.0), (4.0, 3.0), (2.0, 8.0)];
        let outline = polygon(&points);
        let expected = polygon_area(&points.map(|(x, y)| point(x, y)));
        let mesh = Triangulator::new(InteriorFill::StencilFan).triangulate(&outline);
        assert!((signed_area(&mesh) - expected).abs() < 1e-3);
        assert!(mesh.attributes.iter().all(|&c| c == Coefficient::SOLID));
    }

    #[test]
    fn tessellated_area_matches_polygon_area() {
        let points = [(1.0, 1.0), (9.0, 2.0), (7.0, 6.0), (4.0, 3.0), (2.0, 8.0)];
        let outline = polygon(&points);
        let expected = polygon_area(&points.map(|(x, y)| point(x, y))).abs();
        let mesh = Triangulator::new(InteriorFill::Tessellated).triangulate(&outline);
        assert!((unsigned_area(&mesh) - expected).abs() < 1e-2);
    }

    #[test]
    fn clockwise_polygon_area_is_preserved() {
        let points = [(0.0, 0.0), (0.0, 5.0), (5.0, 5.0), (5.0, 0.0)];
        let outline = polygon(&points);
        let fan = Triangulator::new(InteriorFill::StencilFan).triangulate(&outline);
        assert!((signed_area(&fan) + 25.0).abs() < 1e-3);
        let tessellated = Triangulator::new(InteriorFill::Tessellated).triangulate(&outline);
        assert!((unsigned_area(&tessellated) - 25.0).abs() < 1e-2);
    }

    #[test]
    fn empty_outline_yields_empty_mesh() {
        let mut outline = Outline::new();
        outline.push(PathElement::MoveTo(point(3.0, 3.0)));
        outline.push(PathElement::ClosePath);
        for interior in [InteriorFill::StencilFan, InteriorFill::Tessellated] {
            assert!(Triangulator::new(interior).triangulate(&outline).is_empty());
        }
    }

    #[test]
    fn quadratic_caps_follow_the_curve() {
        let inside = [point(4.0, 6.0), point(5.0, 11.5), point(1.0, 1.5)];
        let outside = [point(5.0, 1.5), point(5.0, 12.5), point(5.0, -0.5), point(11.0, 5.0)];
        assert_coverage(&pillow(false), &inside, &outside);
        assert_coverage(&pillow(true), &inside, &outside);
    }

    #[test]
    fn cubic_circle_coverage() {
        let diagonal = std::f32::consts::FRAC_1_SQRT_2;
        let at = |r: f32| point(20.0 + r * diagonal, 20.0 + r * diagonal);
        let inside = [point(20.0, 20.0), at(9.5), point(29.0, 22.0)];
        let outside = [at(10.5), point(31.0, 20.0), point(0.0, 0.0)];
        assert_coverage(&circle(20.0, 20.0, 10.0, false), &inside, &outside);
        assert_coverage(&circle(20.0, 20.0, 10.0, true), &inside, &outside);
    }

    #[test]
    fn ring_has_a_hole() {
        let mut outline = circle(20.0, 20.0, 10.0, false);
        for &element in circle(20.0, 20.0, 5.0, true).elements() {
            outline.push(element);
        }
        let diagonal = std::f32::consts::FRAC_1_SQRT_2;
        let at = |r: f32| point(20.0 + r * diagonal, 20.0 + r * diagonal);
        assert_coverage(
            &outline,
            &[at(7.5), at(9.6), at(5.4)],
            &[point(20.0, 20.0), at(4.6), at(10.4)],
        );
    }

    #[test]
    fn quadratic_curve_classifies_as_quadratic() {
        let quadratic = QuadraticBezierSegment {
            from: point(0.0, 0.0),
            ctrl: point(3.0, 6.0),
            to: point(6.0, 0.0),
        };
        let elevated = quadratic.to_cubic();
        assert_eq!(classify(&elevated).kind, CurveKind::Quadratic);
    }

    #[test]
    fn collinear_cubic_classifies_as_line() {
        let line = CubicBezierSegment {
            from: point(0.0, 0.0),
            ctrl1: point(1.0, 1.0),
            ctrl2: point(2.0, 2.0),
            to: point(3.0, 3.0),
        };
        assert_eq!(classify(&line).kind, CurveKind::Line);
    }

    #[test]
    fn s_curve_classifies_as_serpentine() {
        let s = CubicBezierSegment {
            from: point(0.0, 0.0),
            ctrl1: point(1.0, 3.0),
            ctrl2: point(2.0, -1.0),
            to: point(4.0, 0.0),
        };
        assert_eq!(classify(&s).kind, CurveKind::Serpentine);
    }

    #[test]
    fn crossed_controls_classify_as_loop() {
        let looped = CubicBezierSegment {
            from: point(0.0, 0.0),
            ctrl1: point(4.0, 4.0),
            ctrl2: point(-1.0, 4.0),
            to: point(3.0, 0.0),
        };
        assert_eq!(classify(&looped).kind, CurveKind::Loop);
    }

    #[test]
    fn serpentine_coefficients_vanish_on_the_curve() {
        let s = CubicBezierSegment {
            from: point(0.0, 0.0),
            ctrl1: point(1.0, 3.0),
            ctrl2: point(2.0, -1.0),
            to: point(4.0, 0.0),
        };
        let [c0, c1, c2, c3] = classify(&s).coefficients;
        for i in 0..=8 {
            #[expect(clippy::cast_precision_loss)]
            let t = i as f32 / 8.0;
            let mt = 1.0 - t;
            let weights = [mt * mt * mt, 3.0 * mt * mt * t, 3.0 * mt * t * t, t * t * t];
            let mut klm = [0.0; 3];
            for (w, c) in weights.iter().zip([c0, c1, c2, c3]) {
                for (sum, v) in klm.iter_mut().zip(c.klm) {
                    *sum += w * v;
                }
            }
            let f = Coefficient { klm }.implicit();
            assert!(f.abs() < 1e-3, "f({t}) = {f}");
        }
    }

    #[test]
    fn stencil_fan_area_matches_flattened_area() {
        let outline = circle(20.0, 20.0, 10.0, false);
        let mesh = stencil_fan(&outline, 10);
        assert!(mesh.attributes.len() == mesh.positions.len());
        assert!((signed_area(&mesh) - outline.signed_area(10)).abs() < 1e-2);
        // A circle of radius 10 flattened with 40 lines is close to 100π.
        assert!((signed_area(&mesh) - 100.0 * std::f32::consts::PI).abs() < 2.0);
    }
}
