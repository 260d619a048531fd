//! Outline construction and lyon-backed polygon tessellation.

use lyon::math::{point, Point};
use lyon::path::Path as LyonPath;
use lyon::tessellation::{
    BuffersBuilder, FillOptions, FillRule, FillTessellator, FillVertex, VertexBuffers,
};

use crate::geometry::{Outline, PathElement};

/// Records outline operators in the order a font's glyph decoder emits them.
///
/// Mirrors the pen interface most outline sources expose, so adapters only
/// forward calls.
#[derive(Debug, Default)]
pub struct OutlineBuilder {
    outline: Outline,
}

impl OutlineBuilder {
    /// Start an empty outline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a new subpath at `(x, y)`.
    pub fn move_to(&mut self, x: f32, y: f32) {
        self.outline.push(PathElement::MoveTo(point(x, y)));
    }

    /// Straight line to `(x, y)`.
    pub fn line_to(&mut self, x: f32, y: f32) {
        self.outline.push(PathElement::LineTo(point(x, y)));
    }

    /// Quadratic curve with control `(x1, y1)` ending at `(x, y)`.
    pub fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        self.outline
            .push(PathElement::QuadraticTo(point(x1, y1), point(x, y)));
    }

    /// Cubic curve with controls `(x1, y1)`, `(x2, y2)` ending at `(x, y)`.
    pub fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        self.outline.push(PathElement::CubicTo(
            point(x1, y1),
            point(x2, y2),
            point(x, y),
        ));
    }

    /// Close the current subpath.
    pub fn close(&mut self) {
        self.outline.push(PathElement::ClosePath);
    }

    /// The finished outline, or `None` if nothing was drawn.
    #[must_use]
    pub fn finish(self) -> Option<Outline> {
        if self.outline.is_empty() {
            None
        } else {
            Some(self.outline)
        }
    }
}

/// Tessellate closed polygons into a triangle list using the non-zero rule.
///
/// Returns `None` when lyon rejects the input or produces no triangles.
pub fn tessellate_polygons(polygons: &[Vec<Point>]) -> Option<Vec<[Point; 3]>> {
    let mut builder = LyonPath::builder();
    for polygon in polygons {
        let Some((&first, rest)) = polygon.split_first() else {
            continue;
        };
        builder.begin(first);
        for &p in rest {
            builder.line_to(p);
        }
        builder.close();
    }
    let path = builder.build();

    let mut geometry: VertexBuffers<Point, u32> = VertexBuffers::new();
    let mut tessellator = FillTessellator::new();
    let result = tessellator.tessellate_path(
        &path,
        &FillOptions::tolerance(0.01).with_fill_rule(FillRule::NonZero),
        &mut BuffersBuilder::new(&mut geometry, |vertex: FillVertex| vertex.position()),
    );

    match result {
        Ok(()) if !geometry.indices.is_empty() => Some(
            geometry
                .indices
                .chunks_exact(3)
                .map(|tri| {
                    [
                        geometry.vertices[tri[0] as usize],
                        geometry.vertices[tri[1] as usize],
                        geometry.vertices[tri[2] as usize],
                    ]
                })
                .collect(),
        ),
        Ok(()) => None,
        Err(err) => {
            log::debug!("polygon tessellation failed: {err:?}");
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::geometry::triangle_area;

    #[test]
    fn builder_records_operators_in_order() {
        let mut builder = OutlineBuilder::new();
        builder.move_to(0.0, 0.0);
        builder.line_to(1.0, 0.0);
        builder.quad_to(1.5, 0.5, 1.0, 1.0);
        builder.curve_to(0.8, 1.2, 0.2, 1.2, 0.0, 1.0);
        builder.close();
        let outline = builder.finish().unwrap();
        assert_eq!(outline.elements().len(), 5);
        assert!(matches!(outline.elements()[2], PathElement::QuadraticTo(..)));
        assert_eq!(outline.elements()[4], PathElement::ClosePath);
    }

    #[test]
    fn empty_builder_finishes_to_none() {
        assert!(OutlineBuilder::new().finish().is_none());
    }

    #[test]
    fn tessellated_square_covers_its_area() {
        let square = vec![
            point(0.0, 0.0),
            point(3.0, 0.0),
            point(3.0, 3.0),
            point(0.0, 3.0),
        ];
        let triangles = tessellate_polygons(&[square]).unwrap();
        let area: f32 = triangles
            .iter()
            .map(|t| triangle_area(t[0], t[1], t[2]).abs())
            .sum();
        assert!((area - 9.0).abs() < 1e-3, "area {area}");
    }

    #[test]
    fn nonzero_rule_keeps_same_direction_overlap_single() {
        let outer = vec![
            point(0.0, 0.0),
            point(4.0, 0.0),
            point(4.0, 4.0),
            point(0.0, 4.0),
        ];
        let inner = vec![
            point(1.0, 1.0),
            point(3.0, 1.0),
            point(3.0, 3.0),
            point(1.0, 3.0),
        ];
        let triangles = tessellate_polygons(&[outer, inner]).unwrap();
        let area: f32 = triangles
            .iter()
            .map(|t| triangle_area(t[0], t[1], t[2]).abs())
            .sum();
        assert!((area - 16.0).abs() < 1e-3, "area {area}");
    }

    #[test]
    fn opposite_winding_cuts_a_hole() {
        let outer = vec![
            point(0.0, 0.0),
            point(4.0, 0.0),
            point(4.0, 4.0),
            point(0.0, 4.0),
        ];
        let hole = vec![
            point(1.0, 1.0),
            point(1.0, 3.0),
            point(3.0, 3.0),
            point(3.0, 1.0),
        ];
        let triangles = tessellate_polygons(&[outer, hole]).unwrap();
        let area: f32 = triangles
            .iter()
            .map(|t| triangle_area(t[0], t[1], t[2]).abs())
            .sum();
        assert!((area - 12.0).abs() < 1e-3, "area {area}");
    }

    #[test]
    fn degenerate_input_yields_none() {
        let line = vec![point(0.0, 0.0), point(1.0, 1.0)];
        assert!(tessellate_polygons(&[line]).is_none());
    }
}
