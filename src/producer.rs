//! Rendering strategies plugged into the frame driver.
//!
//! A [`GeometryProducer`] turns positioned glyphs into meshes, memoizing
//! whatever it computes per glyph, and appends them to the frame encoder.
//! The driver loop, buffer pool and submission logic are shared by all of
//! them.

use std::convert::Infallible;

use lyon::math::{point, vector, Point};

use crate::atlas::{AtlasSlot, GlyphAtlas};
use crate::cache::{CacheStats, GlyphCache, GlyphCacheKey, GlyphIdentity};
use crate::device::{Device, Pipeline};
use crate::encoder::FrameEncoder;
use crate::error::Result;
use crate::geometry::is_degenerate;
use crate::triangulator::{stencil_fan, InteriorFill, Triangulator};
use crate::types::{Coefficient, Font, Glyph, GlyphMesh, TexCoord};

/// What happened to one glyph.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GlyphOutcome {
    /// Geometry was appended.
    Drawn {
        /// Triangles appended for the glyph.
        triangles: usize,
    },
    /// The glyph has nothing to draw.
    Empty,
}

/// A rendering strategy.
pub trait GeometryProducer<D: Device> {
    /// Select pipeline state at the start of a frame.
    ///
    /// # Errors
    ///
    /// Propagates encoder errors.
    fn begin_frame(&mut self, encoder: &mut FrameEncoder<'_, D>) -> Result<()>;

    /// Look up or compute the glyph's geometry and append it.
    ///
    /// # Errors
    ///
    /// Returns compute failures such as [`Error::AtlasFull`](crate::Error::AtlasFull)
    /// for the driver to decide on, and propagates encoder errors.
    fn encode_glyph<F: Font>(
        &mut self,
        encoder: &mut FrameEncoder<'_, D>,
        glyph: &Glyph<F>,
    ) -> Result<GlyphOutcome>;

    /// Append whatever closes the frame, such as a stencil cover pass.
    ///
    /// # Errors
    ///
    /// Propagates encoder errors.
    fn finish_frame(&mut self, _encoder: &mut FrameEncoder<'_, D>) -> Result<()> {
        Ok(())
    }

    /// Glyph cache counters.
    fn cache_stats(&self) -> CacheStats;
}

fn identity<F: Font>(glyph: &Glyph<F>) -> GlyphIdentity {
    GlyphIdentity {
        glyph: glyph.id,
        font: glyph.font.key(),
    }
}

fn quad<A: Copy>(min: Point, max: Point, corners: [A; 4]) -> GlyphMesh<A> {
    let [a, b, c, d] = corners;
    let mut mesh = GlyphMesh::empty();
    mesh.push_triangle([min, point(max.x, min.y), max], [a, b, c]);
    mesh.push_triangle([min, max, point(min.x, max.y)], [a, c, d]);
    mesh
}

fn cover_quad(viewport: [f32; 2]) -> GlyphMesh<()> {
    quad(point(0.0, 0.0), point(viewport[0], viewport[1]), [(); 4])
}

/// Blits pre-rasterized glyphs from the atlas texture.
///
/// Entries are keyed by subpixel phase, since the phase is baked into the
/// raster.
#[derive(Debug)]
pub struct AtlasProducer<T> {
    atlas: GlyphAtlas<T>,
    cache: GlyphCache<AtlasSlot>,
}

impl<T> AtlasProducer<T> {
    /// Create the atlas texture on `device`.
    ///
    /// # Errors
    ///
    /// Propagates atlas creation errors.
    pub fn new<D>(device: &mut D, atlas_size: u32) -> Result<Self>
    where
        D: Device<Texture = T>,
    {
        Ok(Self {
            atlas: GlyphAtlas::new(device, atlas_size)?,
            cache: GlyphCache::new(),
        })
    }

    /// The atlas.
    pub fn atlas(&self) -> &GlyphAtlas<T> {
        &self.atlas
    }
}

impl<D: Device> GeometryProducer<D> for AtlasProducer<D::Texture> {
    fn begin_frame(&mut self, encoder: &mut FrameEncoder<'_, D>) -> Result<()> {
        encoder.set_pipeline(Pipeline::Atlas, Some(self.atlas.texture().clone()))
    }

    fn encode_glyph<F: Font>(
        &mut self,
        encoder: &mut FrameEncoder<'_, D>,
        glyph: &Glyph<F>,
    ) -> Result<GlyphOutcome> {
        let key = GlyphCacheKey::with_subpixel(identity(glyph), glyph.position);
        let atlas = &mut self.atlas;
        let device = encoder.device_mut();
        let slot = *self.cache.get_or_try_insert_with(key, || {
            atlas.put(device, &glyph.font, glyph.id, key.subpixel)
        })?;
        if slot.is_empty() {
            return Ok(GlyphOutcome::Empty);
        }
        let uv = |p: Point| TexCoord { uv: [p.x, p.y] };
        let mesh = quad(
            slot.quad.min,
            slot.quad.max,
            [
                uv(slot.uv.min),
                uv(point(slot.uv.max.x, slot.uv.min.y)),
                uv(slot.uv.max),
                uv(point(slot.uv.min.x, slot.uv.max.y)),
            ],
        );
        let origin = glyph.position.floor();
        encoder.append_mesh(&mesh, origin.to_vector())?;
        Ok(GlyphOutcome::Drawn {
            triangles: mesh.triangle_count(),
        })
    }

    fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

/// Draws triangulated outlines with per-vertex implicit curve coefficients.
///
/// The geometry is translation invariant, so entries ignore the subpixel
/// phase and are reused at any position.
#[derive(Debug)]
pub struct LoopBlinnProducer {
    triangulator: Triangulator,
    cache: GlyphCache<GlyphMesh<Coefficient>>,
    cover: GlyphMesh<()>,
    counted: bool,
}

impl LoopBlinnProducer {
    /// A producer filling interiors with `interior`; `viewport` sizes the
    /// cover pass the stencil fan needs.
    #[must_use]
    pub fn new(interior: InteriorFill, viewport: [f32; 2]) -> Self {
        Self {
            triangulator: Triangulator::new(interior),
            cache: GlyphCache::new(),
            cover: cover_quad(viewport),
            counted: false,
        }
    }

    /// Pipeline the glyph meshes are drawn with.
    #[must_use]
    pub fn pipeline(&self) -> Pipeline {
        match self.triangulator.interior() {
            InteriorFill::StencilFan => Pipeline::LoopBlinnStencil,
            InteriorFill::Tessellated => Pipeline::LoopBlinn,
        }
    }
}

impl<D: Device> GeometryProducer<D> for LoopBlinnProducer {
    fn begin_frame(&mut self, encoder: &mut FrameEncoder<'_, D>) -> Result<()> {
        self.counted = false;
        encoder.set_pipeline(self.pipeline(), None)
    }

    fn encode_glyph<F: Font>(
        &mut self,
        encoder: &mut FrameEncoder<'_, D>,
        glyph: &Glyph<F>,
    ) -> Result<GlyphOutcome> {
        let key = GlyphCacheKey::new(identity(glyph));
        let triangulator = self.triangulator;
        let Ok(mesh) = self.cache.get_or_try_insert_with::<Infallible>(key, || {
            if is_degenerate(&glyph.font.glyph_bounds(glyph.id)) {
                return Ok(GlyphMesh::empty());
            }
            Ok(glyph
                .font
                .glyph_outline(glyph.id)
                .map(|outline| triangulator.triangulate(&outline))
                .unwrap_or_default())
        });
        if mesh.is_empty() {
            return Ok(GlyphOutcome::Empty);
        }
        encoder.append_mesh(mesh, glyph.position.to_vector())?;
        self.counted = true;
        Ok(GlyphOutcome::Drawn {
            triangles: mesh.triangle_count(),
        })
    }

    fn finish_frame(&mut self, encoder: &mut FrameEncoder<'_, D>) -> Result<()> {
        if self.counted && self.pipeline() == Pipeline::LoopBlinnStencil {
            encoder.set_pipeline(Pipeline::StencilCover, None)?;
            encoder.append_mesh(&self.cover, vector(0.0, 0.0))?;
        }
        Ok(())
    }

    fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

/// Flattens outlines into triangle fans counted in the stencil buffer, then
/// covers the viewport wherever the count is non-zero.
#[derive(Debug)]
pub struct StencilProducer {
    steps: u32,
    cache: GlyphCache<GlyphMesh<()>>,
    cover: GlyphMesh<()>,
    counted: bool,
}

impl StencilProducer {
    /// A producer flattening every curve into `steps` lines.
    #[must_use]
    pub fn new(steps: u32, viewport: [f32; 2]) -> Self {
        Self {
            steps,
            cache: GlyphCache::new(),
            cover: cover_quad(viewport),
            counted: false,
        }
    }
}

impl<D: Device> GeometryProducer<D> for StencilProducer {
    fn begin_frame(&mut self, encoder: &mut FrameEncoder<'_, D>) -> Result<()> {
        self.counted = false;
        encoder.set_pipeline(Pipeline::StencilCount, None)
    }

    fn encode_glyph<F: Font>(
        &mut self,
        encoder: &mut FrameEncoder<'_, D>,
        glyph: &Glyph<F>,
    ) -> Result<GlyphOutcome> {
        let key = GlyphCacheKey::new(identity(glyph));
        let steps = self.steps;
        let Ok(mesh) = self.cache.get_or_try_insert_with::<Infallible>(key, || {
            Ok(glyph
                .font
                .glyph_outline(glyph.id)
                .map(|outline| stencil_fan(&outline, steps))
                .unwrap_or_default())
        });
        if mesh.is_empty() {
            return Ok(GlyphOutcome::Empty);
        }
        encoder.append_mesh(mesh, glyph.position.to_vector())?;
        self.counted = true;
        Ok(GlyphOutcome::Drawn {
            triangles: mesh.triangle_count(),
        })
    }

    fn finish_frame(&mut self, encoder: &mut FrameEncoder<'_, D>) -> Result<()> {
        if self.counted {
            encoder.set_pipeline(Pipeline::StencilCover, None)?;
            encoder.append_mesh(&self.cover, vector(0.0, 0.0))?;
        }
        Ok(())
    }

    fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}
