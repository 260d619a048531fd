//! Glyph rasterization into a single fixed-size coverage texture.
//!
//! Glyphs are drawn with tiny-skia into a scratch mask the size of the atlas,
//! centred so any glyph that fits the atlas also fits the scratch. Only the
//! pixels the glyph touched are uploaded to the packed location, and only
//! those pixels are cleared again afterwards.

use lyon::math::{point, vector, Box2D, Point};
use tiny_skia::{FillRule, Mask, PathBuilder, Transform};

use crate::cache::SubpixelOffset;
use crate::device::{Device, Region};
use crate::error::{Error, Result};
use crate::geometry::{is_degenerate, round_out, Outline, PathElement};
use crate::packer::ShelfPacker;
use crate::types::{Font, GlyphId};

/// Where a glyph landed in the atlas and how to draw it.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AtlasSlot {
    /// Texels occupied in the atlas texture.
    pub region: Region,
    /// `region` in normalized texture coordinates.
    pub uv: Box2D,
    /// Quad to draw, relative to the integer part of the glyph position.
    pub quad: Box2D,
}

impl AtlasSlot {
    /// The slot of a glyph with nothing to draw.
    pub const EMPTY: Self = Self {
        region: Region {
            x: 0,
            y: 0,
            width: 0,
            height: 0,
        },
        uv: Box2D {
            min: Point::new(0.0, 0.0),
            max: Point::new(0.0, 0.0),
        },
        quad: Box2D {
            min: Point::new(0.0, 0.0),
            max: Point::new(0.0, 0.0),
        },
    };

    /// Whether the glyph draws nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.region.is_empty()
    }
}

/// The atlas texture, its packer and the scratch raster.
pub struct GlyphAtlas<T> {
    texture: T,
    packer: ShelfPacker,
    scratch: Mask,
    size: u32,
}

impl<T: std::fmt::Debug> std::fmt::Debug for GlyphAtlas<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlyphAtlas")
            .field("texture", &self.texture)
            .field("packer", &self.packer)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

impl<T> GlyphAtlas<T> {
    /// Create a `size`×`size` atlas texture on `device`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for a zero size and propagates
    /// texture creation failures.
    pub fn new<D>(device: &mut D, size: u32) -> Result<Self>
    where
        D: Device<Texture = T>,
    {
        let scratch = Mask::new(size, size)
            .ok_or_else(|| Error::InvalidConfig(format!("cannot allocate a {size}x{size} atlas")))?;
        let texture = device.create_texture(size, size)?;
        Ok(Self {
            texture,
            packer: ShelfPacker::new(size, size),
            scratch,
            size,
        })
    }

    /// The backing texture.
    pub fn texture(&self) -> &T {
        &self.texture
    }

    /// Edge length in texels.
    #[must_use]
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Rows of the texture in use.
    #[must_use]
    pub fn used_rows(&self) -> u32 {
        self.packer.used_rows()
    }

    /// Rasterize `glyph` at the given subpixel phase and pack it.
    ///
    /// Glyphs without an outline or with empty bounds return
    /// [`AtlasSlot::EMPTY`]. The atlas does not deduplicate; every call
    /// consumes space.
    ///
    /// # Errors
    ///
    /// * [`Error::GlyphTooLarge`] if the glyph does not fit in the atlas at all.
    /// * [`Error::AtlasFull`] if the packer has no room left.
    /// * Device errors from the upload.
    #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn put<D, F>(
        &mut self,
        device: &mut D,
        font: &F,
        glyph: GlyphId,
        subpixel: SubpixelOffset,
    ) -> Result<AtlasSlot>
    where
        D: Device<Texture = T>,
        F: Font + ?Sized,
    {
        let bounds = font.glyph_bounds(glyph);
        if is_degenerate(&bounds) {
            return Ok(AtlasSlot::EMPTY);
        }
        let Some(outline) = font.glyph_outline(glyph).filter(|o| !o.is_empty()) else {
            return Ok(AtlasSlot::EMPTY);
        };

        #[expect(clippy::cast_precision_loss)]
        let size = self.size as f32;
        let origin = vector(
            ((size - bounds.width()) / 2.0 - bounds.min.x).floor(),
            ((size - bounds.height()) / 2.0 - bounds.min.y).floor(),
        );
        let placed = origin + subpixel.to_vector();
        let affected = round_out(&bounds.translate(placed));
        let width = affected.width() as u32;
        let height = affected.height() as u32;
        if affected.min.x < 0.0 || affected.min.y < 0.0 || affected.max.x > size || affected.max.y > size
        {
            return Err(Error::GlyphTooLarge { width, height });
        }

        let region = self
            .packer
            .find_location(width, height)
            .ok_or(Error::AtlasFull { width, height })?;

        if let Some(path) = tiny_skia_path(&outline) {
            self.scratch.fill_path(
                &path,
                FillRule::Winding,
                true,
                Transform::from_translate(placed.x, placed.y),
            );
        }

        let dirty = Region {
            x: affected.min.x as u32,
            y: affected.min.y as u32,
            width,
            height,
        };
        let stride = self.size as usize;
        let start = dirty.y as usize * stride + dirty.x as usize;
        let uploaded =
            device.upload_region(&self.texture, region, &self.scratch.data()[start..], stride);
        self.erase(dirty);
        uploaded?;

        log::trace!("packed {glyph:?} into {region:?}");
        Ok(AtlasSlot {
            region,
            uv: self.normalize(region),
            quad: affected.translate(-origin),
        })
    }

    #[expect(clippy::cast_precision_loss)]
    fn normalize(&self, region: Region) -> Box2D {
        let size = self.size as f32;
        Box2D::new(
            point(region.x as f32 / size, region.y as f32 / size),
            point(
                (region.x + region.width) as f32 / size,
                (region.y + region.height) as f32 / size,
            ),
        )
    }

    fn erase(&mut self, dirty: Region) {
        let stride = self.size as usize;
        let data = self.scratch.data_mut();
        for row in dirty.y..dirty.y + dirty.height {
            let start = row as usize * stride + dirty.x as usize;
            data[start..start + dirty.width as usize].fill(0);
        }
    }

    #[cfg(test)]
    fn scratch_is_clear(&self) -> bool {
        self.scratch.data().iter().all(|&value| value == 0)
    }
}

fn tiny_skia_path(outline: &Outline) -> Option<tiny_skia::Path> {
    let mut builder = PathBuilder::new();
    for element in outline.elements() {
        match *element {
            PathElement::MoveTo(p) => builder.move_to(p.x, p.y),
            PathElement::LineTo(p) => builder.line_to(p.x, p.y),
            PathElement::QuadraticTo(c, p) => builder.quad_to(c.x, c.y, p.x, p.y),
            PathElement::CubicTo(c1, c2, p) => builder.cubic_to(c1.x, c1.y, c2.x, c2.y, p.x, p.y),
            PathElement::ClosePath => builder.close(),
        }
    }
    builder.finish()
}
