//! Shared types: GPU vertex layouts, glyph identities, and the frame list
//! handed over by the external layout engine.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use lyon::math::{point, Box2D, Point};

use crate::geometry::Outline;

/// A vertex position, ready for the GPU.
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Vertex {
    /// Position in glyph-local or pixel space, depending on the stage.
    pub position: [f32; 2],
}

impl Vertex {
    /// Build a vertex from a point.
    #[must_use]
    pub fn new(point: Point) -> Self {
        Self {
            position: [point.x, point.y],
        }
    }

    /// The vertex as a point.
    #[must_use]
    pub fn point(self) -> Point {
        Point::new(self.position[0], self.position[1])
    }
}

/// Per-vertex implicit curve coefficients `(k, l, m)`.
///
/// Interpolated across a triangle, a fragment is inside when
/// `k³ - l·m < 0`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Coefficient {
    /// The `k`, `l` and `m` values at this vertex.
    pub klm: [f32; 3],
}

impl Coefficient {
    /// Coefficients of a solid triangle: the implicit test is `-1` everywhere.
    pub const SOLID: Self = Self {
        klm: [0.0, 1.0, 1.0],
    };

    /// Build coefficients from the three components.
    #[must_use]
    pub const fn new(k: f32, l: f32, m: f32) -> Self {
        Self { klm: [k, l, m] }
    }

    /// Evaluate the implicit function `k³ - l·m`.
    #[must_use]
    pub fn implicit(self) -> f32 {
        let [k, l, m] = self.klm;
        k * k * k - l * m
    }

    /// Flip which side of the curve counts as inside.
    #[must_use]
    pub fn flipped(self) -> Self {
        let [k, l, m] = self.klm;
        Self { klm: [-k, -l, m] }
    }
}

/// A texture coordinate in normalized `[0, 1]` atlas space.
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct TexCoord {
    /// `u`, `v`.
    pub uv: [f32; 2],
}

/// Triangle-list geometry for one glyph, local to the glyph origin.
///
/// `positions` and `attributes` are parallel arrays; their length is always a
/// multiple of three. Stencil meshes use `()` attributes and carry no
/// attribute stream at all.
#[derive(Clone, Debug, PartialEq)]
pub struct GlyphMesh<A> {
    /// Vertex positions, three per triangle.
    pub positions: Vec<Vertex>,
    /// One attribute per position.
    pub attributes: Vec<A>,
}

impl<A> GlyphMesh<A> {
    /// An empty mesh: the glyph draws nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            positions: Vec::new(),
            attributes: Vec::new(),
        }
    }

    /// Whether the mesh has no triangles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Number of triangles.
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.positions.len() / 3
    }

    /// Append one triangle.
    pub fn push_triangle(&mut self, points: [Point; 3], attributes: [A; 3]) {
        self.positions.extend(points.map(Vertex::new));
        self.attributes.extend(attributes);
    }
}

impl<A> Default for GlyphMesh<A> {
    fn default() -> Self {
        Self::empty()
    }
}

/// Index of a glyph in its font's glyph table.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GlyphId(pub u32);

/// Stable identity of a logical font.
///
/// Two handles to the same underlying font resource must report the same key,
/// regardless of how many wrapper objects exist. A content fingerprint works
/// well; pointer addresses do not.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FontKey(pub u64);

/// The font/outline provider consumed by the core.
///
/// Coordinates are in pixels at the font's size with y pointing up from the
/// baseline origin.
pub trait Font {
    /// Identity used for cache keys.
    fn key(&self) -> FontKey;

    /// Axis-aligned bounds of the glyph. May be empty (e.g. a space).
    fn glyph_bounds(&self, glyph: GlyphId) -> Box2D;

    /// The glyph outline, or `None` when the glyph has no path.
    fn glyph_outline(&self, glyph: GlyphId) -> Option<Outline>;
}

impl<T: Font + ?Sized> Font for Arc<T> {
    fn key(&self) -> FontKey {
        (**self).key()
    }

    fn glyph_bounds(&self, glyph: GlyphId) -> Box2D {
        (**self).glyph_bounds(glyph)
    }

    fn glyph_outline(&self, glyph: GlyphId) -> Option<Outline> {
        (**self).glyph_outline(glyph)
    }
}

impl<T: Font + ?Sized> Font for &T {
    fn key(&self) -> FontKey {
        (**self).key()
    }

    fn glyph_bounds(&self, glyph: GlyphId) -> Box2D {
        (**self).glyph_bounds(glyph)
    }

    fn glyph_outline(&self, glyph: GlyphId) -> Option<Outline> {
        (**self).glyph_outline(glyph)
    }
}

/// A font made of outlines supplied by the caller, for icons and for
/// driving the renderer without font files.
///
/// Bounds are the control-point bounds of each outline. Every
/// [`glyph_outline`](Font::glyph_outline) call is counted, so callers can
/// check how often the renderer went back to the font.
#[derive(Debug, Default)]
pub struct OutlineFont {
    key: FontKey,
    glyphs: HashMap<GlyphId, Outline>,
    requests: AtomicUsize,
}

impl OutlineFont {
    /// An empty font identified by `key`.
    #[must_use]
    pub fn new(key: FontKey) -> Self {
        Self {
            key,
            ..Self::default()
        }
    }

    /// Add or replace glyph `id`.
    #[must_use]
    pub fn with_glyph(mut self, id: u32, outline: Outline) -> Self {
        self.glyphs.insert(GlyphId(id), outline);
        self
    }

    /// Number of outlines handed out so far.
    pub fn outline_requests(&self) -> usize {
        self.requests.load(Ordering::Relaxed)
    }
}

impl Font for OutlineFont {
    fn key(&self) -> FontKey {
        self.key
    }

    fn glyph_bounds(&self, glyph: GlyphId) -> Box2D {
        self.glyphs
            .get(&glyph)
            .and_then(Outline::control_bounds)
            .unwrap_or_else(|| Box2D::new(point(0.0, 0.0), point(0.0, 0.0)))
    }

    fn glyph_outline(&self, glyph: GlyphId) -> Option<Outline> {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.glyphs.get(&glyph).cloned()
    }
}

/// A positioned glyph, as produced by the layout engine.
#[derive(Clone, Debug)]
pub struct Glyph<F> {
    /// Glyph index.
    pub id: GlyphId,
    /// Font handle.
    pub font: F,
    /// Absolute pixel position of the glyph origin.
    pub position: Point,
}

/// One viewport-sized page of laid-out glyphs, in paint order.
pub type Frame<F> = Vec<Glyph<F>>;

/// A looping sequence of frames.
///
/// Models the continuously cycling demo: after the last frame the cursor
/// restarts at frame 0.
#[derive(Clone, Debug)]
pub struct Document<F> {
    frames: Vec<Frame<F>>,
    cursor: usize,
}

impl<F> Document<F> {
    /// Wrap the layout engine's output.
    #[must_use]
    pub fn new(frames: Vec<Frame<F>>) -> Self {
        Self { frames, cursor: 0 }
    }

    /// Number of frames.
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether there is nothing to show.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Index of the frame the next call to [`next_frame`](Self::next_frame)
    /// returns.
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Return the current frame and advance, wrapping past the end.
    pub fn next_frame(&mut self) -> Option<(usize, &Frame<F>)> {
        if self.frames.is_empty() {
            return None;
        }
        if self.cursor >= self.frames.len() {
            self.cursor = 0;
        }
        let index = self.cursor;
        self.cursor = (index + 1) % self.frames.len();
        Some((index, &self.frames[index]))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn outline_font_counts_requests_and_bounds_missing_glyphs_as_empty() {
        let outline = crate::testing::rect(1.0, 2.0, 5.0, 8.0);
        let font = OutlineFont::new(FontKey(4)).with_glyph(1, outline.clone());
        assert_eq!(font.glyph_bounds(GlyphId(1)), Box2D::new(point(1.0, 2.0), point(5.0, 8.0)));
        assert!(font.glyph_bounds(GlyphId(2)).is_empty());
        assert_eq!(font.glyph_outline(GlyphId(1)), Some(outline));
        assert_eq!(font.glyph_outline(GlyphId(2)), None);
        assert_eq!(font.outline_requests(), 2);
    }

    #[test]
    fn solid_coefficients_are_inside() {
        assert!(Coefficient::SOLID.implicit() < 0.0);
    }

    #[test]
    fn flipping_negates_the_implicit_value() {
        let c = Coefficient::new(0.5, 0.1, 0.5);
        assert!((c.implicit() + c.flipped().implicit()).abs() < 1e-6);
    }

    #[test]
    fn document_cursor_wraps() {
        let mut doc: Document<()> = Document::new(vec![Vec::new(), Vec::new(), Vec::new()]);
        let order: Vec<usize> = (0..7).map(|_| doc.next_frame().unwrap().0).collect();
        assert_eq!(order, [0, 1, 2, 0, 1, 2, 0]);
        assert_eq!(doc.cursor(), 1);
    }

    #[test]
    fn empty_document_yields_nothing() {
        let mut doc: Document<()> = Document::new(Vec::new());
        assert!(doc.next_frame().is_none());
    }

    #[test]
    fn mesh_push_keeps_arrays_parallel() {
        let mut mesh = GlyphMesh::empty();
        mesh.push_triangle(
            [Point::new(0.0, 0.0), Point::new(1.0, 0.0), Point::new(0.0, 1.0)],
            [Coefficient::SOLID; 3],
        );
        assert_eq!(mesh.positions.len(), mesh.attributes.len());
        assert_eq!(mesh.triangle_count(), 1);
    }
}
