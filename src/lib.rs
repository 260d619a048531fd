//! Streams glyph geometry to the GPU, frame after frame.
//!
//! This crate turns pre-laid-out text (positioned glyphs grouped into
//! frames) into draw calls, using one of three interchangeable strategies:
//!
//! - **Atlas**: glyphs are rasterized once per subpixel phase with
//!   [tiny-skia], shelf-packed into a single coverage texture and drawn as
//!   textured quads.
//! - **Loop–Blinn**: outlines are triangulated once into solid triangles
//!   plus curve hulls carrying implicit `(k, l, m)` coefficients, evaluated
//!   per fragment as `k³ - l·m < 0`. Interiors are either tessellated with
//!   [lyon] or drawn as a stencil fan.
//! - **Stencil**: outlines are flattened into triangle fans counted in the
//!   stencil buffer and resolved by a cover quad.
//!
//! Whatever the strategy, geometry is appended into fixed-size stream
//! buffers taken from a [`BufferPool`]. A full buffer is flushed as a draw
//! call and a fresh one rotated in; buffers return to the pool only once the
//! device signals that the frame using them has completed.
//!
//! # Features
//!
//! - **`glow`** (default): [`GlowDevice`], an OpenGL 3.2 backend.
//! - **`skrifa`**: [`SkrifaFont`], a font provider reading outlines from
//!   font files.
//!
//! Without a GPU, [`RecordingDevice`] records every submission in memory and
//! completes it on demand, which is how the tests drive the renderer.
//!
//! # Safety
//!
//! Creating a [`GlowDevice`] requires a valid, current OpenGL context, and
//! the context must stay current whenever the device is used.
//!
//! [tiny-skia]: https://docs.rs/tiny-skia
//! [lyon]: https://docs.rs/lyon

mod atlas;
mod cache;
mod config;
mod device;
mod encoder;
mod error;
#[cfg(feature = "skrifa")]
mod font;
pub mod geometry;
#[cfg(feature = "glow")]
mod gl;
mod outline;
mod packer;
mod pool;
mod producer;
mod render;
#[cfg(feature = "glow")]
pub mod shaders;
#[cfg(test)]
mod testing;
pub mod triangulator;
mod types;

pub use atlas::{AtlasSlot, GlyphAtlas};
pub use cache::{
    quantize_subpixel, CacheStats, GlyphCache, GlyphCacheKey, GlyphIdentity, SubpixelOffset,
    SUBPIXEL_STEPS,
};
pub use config::{RenderConfig, MIN_BUFFER_CAPACITY};
pub use device::{
    BufferKind, CommandList, Device, DrawCall, Fault, Pipeline, RecordedBuffer, RecordedDraw,
    RecordedSubmission, RecordedTexture, RecordingDevice, Region, SubmissionId,
};
pub use encoder::FrameEncoder;
pub use error::{Error, Result};
#[cfg(feature = "skrifa")]
pub use font::SkrifaFont;
pub use geometry::{Outline, PathElement};
#[cfg(feature = "glow")]
pub use gl::GlowDevice;
pub use outline::{tessellate_polygons, OutlineBuilder};
pub use packer::ShelfPacker;
pub use pool::{can_append, BufferPool, CompletionSignal, StreamBuffer};
pub use producer::{
    AtlasProducer, GeometryProducer, GlyphOutcome, LoopBlinnProducer, StencilProducer,
};
pub use render::{FrameReport, RenderCore};
pub use triangulator::{InteriorFill, Triangulator};
pub use types::{
    Coefficient, Document, Font, FontKey, Frame, Glyph, GlyphId, GlyphMesh, OutlineFont, TexCoord,
    Vertex,
};
