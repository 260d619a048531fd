//! Font provider backed by [skrifa].
//!
//! Outlines are drawn unhinted at a fixed pixel size through skrifa's
//! [`OutlinePen`], straight into an [`OutlineBuilder`].

use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;

use lyon::math::{point, Box2D};
use skrifa::instance::{LocationRef, Size};
use skrifa::outline::{DrawSettings, OutlinePen};
use skrifa::{FontRef, MetadataProvider};

use crate::error::Result;
use crate::geometry::Outline;
use crate::outline::OutlineBuilder;
use crate::types::{Font, FontKey, GlyphId};

impl OutlinePen for OutlineBuilder {
    fn move_to(&mut self, x: f32, y: f32) {
        OutlineBuilder::move_to(self, x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        OutlineBuilder::line_to(self, x, y);
    }

    fn quad_to(&mut self, cx0: f32, cy0: f32, x: f32, y: f32) {
        OutlineBuilder::quad_to(self, cx0, cy0, x, y);
    }

    fn curve_to(&mut self, cx0: f32, cy0: f32, cx1: f32, cy1: f32, x: f32, y: f32) {
        OutlineBuilder::curve_to(self, cx0, cy0, cx1, cy1, x, y);
    }

    fn close(&mut self) {
        OutlineBuilder::close(self);
    }
}

/// One face of a font file at a fixed pixel size.
///
/// Cloning shares the font data. The [`FontKey`] is a fingerprint of the
/// data, face index and size, so independently loaded copies of the same
/// file share cache entries.
#[derive(Clone, Debug)]
pub struct SkrifaFont {
    data: Arc<[u8]>,
    index: u32,
    size: f32,
    key: FontKey,
}

impl SkrifaFont {
    /// Load face `index` of `data`, drawn at `size` pixels per em.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Font`](crate::Error::Font) if the data is not a font
    /// or has no such face.
    pub fn new(data: impl Into<Arc<[u8]>>, index: u32, size: f32) -> Result<Self> {
        let data = data.into();
        FontRef::from_index(&data, index)?;
        let mut hasher = DefaultHasher::new();
        data.hash(&mut hasher);
        index.hash(&mut hasher);
        size.to_bits().hash(&mut hasher);
        Ok(Self {
            data,
            index,
            size,
            key: FontKey(hasher.finish()),
        })
    }

    /// Pixels per em.
    #[must_use]
    pub fn size(&self) -> f32 {
        self.size
    }

    fn font_ref(&self) -> Option<FontRef<'_>> {
        FontRef::from_index(&self.data, self.index).ok()
    }
}

impl Font for SkrifaFont {
    fn key(&self) -> FontKey {
        self.key
    }

    fn glyph_bounds(&self, glyph: GlyphId) -> Box2D {
        self.glyph_outline(glyph)
            .and_then(|outline| outline.control_bounds())
            .unwrap_or_else(|| Box2D::new(point(0.0, 0.0), point(0.0, 0.0)))
    }

    fn glyph_outline(&self, glyph: GlyphId) -> Option<Outline> {
        let font = self.font_ref()?;
        let outline = font.outline_glyphs().get(skrifa::GlyphId::new(glyph.0))?;
        let settings = DrawSettings::unhinted(Size::new(self.size), LocationRef::default());
        let mut builder = OutlineBuilder::new();
        if let Err(err) = outline.draw(settings, &mut builder) {
            log::debug!("cannot draw {glyph:?}: {err}");
            return None;
        }
        builder.finish()
    }
}
