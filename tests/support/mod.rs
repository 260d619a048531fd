//! Outlines and placement helpers shared by the integration tests.

#![allow(dead_code)]

use glyph_streamer::{FontKey, Glyph, GlyphId, Outline, OutlineBuilder, OutlineFont};
use lyon::math::point;

pub fn place(font: &OutlineFont, id: u32, x: f32, y: f32) -> Glyph<&OutlineFont> {
    Glyph {
        id: GlyphId(id),
        font,
        position: point(x, y),
    }
}

pub fn rect(width: f32, height: f32) -> Outline {
    let mut builder = OutlineBuilder::new();
    builder.move_to(0.0, 0.0);
    builder.line_to(width, 0.0);
    builder.line_to(width, height);
    builder.line_to(0.0, height);
    builder.close();
    builder.finish().unwrap_or_default()
}

/// A rounded "o": two cubic rings of opposite direction.
pub fn ring(outer: f32, inner: f32) -> Outline {
    let mut builder = OutlineBuilder::new();
    circle(&mut builder, outer, outer, outer, true);
    circle(&mut builder, outer, outer, inner, false);
    builder.finish().unwrap_or_default()
}

fn circle(builder: &mut OutlineBuilder, cx: f32, cy: f32, r: f32, ccw: bool) {
    const KAPPA: f32 = 0.552_284_8;
    let k = r * KAPPA;
    let s = if ccw { 1.0 } else { -1.0 };
    builder.move_to(cx + r, cy);
    builder.curve_to(cx + r, cy + s * k, cx + k, cy + s * r, cx, cy + s * r);
    builder.curve_to(cx - k, cy + s * r, cx - r, cy + s * k, cx - r, cy);
    builder.curve_to(cx - r, cy - s * k, cx - k, cy - s * r, cx, cy - s * r);
    builder.curve_to(cx + k, cy - s * r, cx + r, cy - s * k, cx + r, cy);
    builder.close();
}

/// Three glyphs: two bars and a ring.
pub fn font() -> OutlineFont {
    OutlineFont::new(FontKey(11))
        .with_glyph(1, rect(6.0, 9.0))
        .with_glyph(2, ring(5.0, 3.0))
        .with_glyph(3, rect(3.0, 12.0))
}

/// A font with a single square glyph `1`.
pub fn square_font() -> OutlineFont {
    OutlineFont::new(FontKey(5)).with_glyph(1, rect(8.0, 8.0))
}
