//! Fixtures shared by unit tests.

use crate::geometry::Outline;
use crate::outline::OutlineBuilder;

/// Axis-aligned rectangle, counter-clockwise.
pub(crate) fn rect(x0: f32, y0: f32, x1: f32, y1: f32) -> Outline {
    let mut builder = OutlineBuilder::new();
    builder.move_to(x0, y0);
    builder.line_to(x1, y0);
    builder.line_to(x1, y1);
    builder.line_to(x0, y1);
    builder.close();
    builder.finish().unwrap_or_default()
}

/// A glyph with a quadratic bowl on top of a rectangle.
pub(crate) fn bowl(width: f32, height: f32) -> Outline {
    let mut builder = OutlineBuilder::new();
    builder.move_to(0.0, 0.0);
    builder.line_to(width, 0.0);
    builder.line_to(width, height);
    builder.quad_to(width / 2.0, height * 1.5, 0.0, height);
    builder.close();
    builder.finish().unwrap_or_default()
}
