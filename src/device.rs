//! The GPU device capability consumed by the core, and a recording
//! implementation for headless use and tests.
//!
//! The core never talks to a graphics API directly. It allocates buffers and
//! textures, writes bytes into them and submits [`CommandList`]s through the
//! [`Device`] trait; the device fires the submission's
//! [`CompletionSignal`] once the GPU no longer reads any of its buffers.

use std::fmt;
use std::path::Path;

use bytemuck::Pod;
use image::{GrayImage, Luma};

use crate::error::{Error, Result};
use crate::pool::CompletionSignal;
use crate::types::{Coefficient, TexCoord, Vertex};

/// Identifies one GPU submission (one frame).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubmissionId(pub u64);

/// The two streams a draw call reads.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BufferKind {
    /// Vertex positions.
    Vertex,
    /// Per-vertex attributes: texture coordinates or curve coefficients.
    Attribute,
}

/// Fixed-function and shader state selected by a draw call.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Pipeline {
    /// Textured quads sampling the glyph atlas.
    Atlas,
    /// Loop–Blinn curves drawn directly to the color target.
    LoopBlinn,
    /// Loop–Blinn curves counted into the stencil buffer; needs a
    /// [`StencilCover`](Self::StencilCover) pass to become visible.
    LoopBlinnStencil,
    /// Flattened triangle fans counted into the stencil buffer.
    StencilCount,
    /// Fills wherever the stencil count is non-zero and resets it.
    StencilCover,
}

impl Pipeline {
    /// Bytes of attribute data per vertex; zero when the pipeline reads only
    /// positions.
    #[must_use]
    pub const fn attribute_stride(self) -> usize {
        match self {
            Pipeline::Atlas => size_of::<TexCoord>(),
            Pipeline::LoopBlinn | Pipeline::LoopBlinnStencil => size_of::<Coefficient>(),
            Pipeline::StencilCount | Pipeline::StencilCover => 0,
        }
    }

    /// Whether the pipeline samples the atlas texture.
    #[must_use]
    pub const fn samples_texture(self) -> bool {
        matches!(self, Pipeline::Atlas)
    }

    /// Whether the pipeline writes the stencil buffer instead of color.
    #[must_use]
    pub const fn counts_stencil(self) -> bool {
        matches!(self, Pipeline::LoopBlinnStencil | Pipeline::StencilCount)
    }
}

/// A rectangle of texels.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Region {
    /// Left edge.
    pub x: u32,
    /// Top edge (lowest row index).
    pub y: u32,
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
}

impl Region {
    /// Whether the region covers no texels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whether two regions share at least one texel.
    #[must_use]
    pub fn intersects(&self, other: &Region) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }
}

/// One draw call: a pipeline, its streams and how many vertices to draw.
///
/// Vertices are drawn from byte offset zero of each bound buffer.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawCall<B, T> {
    /// Pipeline state.
    pub pipeline: Pipeline,
    /// Position stream.
    pub vertex_buffer: B,
    /// Attribute stream, absent when the pipeline has no attributes.
    pub attribute_buffer: Option<B>,
    /// Texture to sample, for pipelines that sample one.
    pub texture: Option<T>,
    /// Number of vertices (three per triangle).
    pub vertex_count: u32,
}

/// The draw calls of one frame, in submission order.
#[derive(Clone, Debug, PartialEq)]
pub struct CommandList<B, T> {
    /// Draw calls in glyph order.
    pub draws: Vec<DrawCall<B, T>>,
}

impl<B, T> CommandList<B, T> {
    /// Whether the frame draws nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.draws.is_empty()
    }

    /// Number of draw calls.
    #[must_use]
    pub fn len(&self) -> usize {
        self.draws.len()
    }
}

impl<B, T> Default for CommandList<B, T> {
    fn default() -> Self {
        Self { draws: Vec::new() }
    }
}

/// What the core needs from a GPU.
pub trait Device {
    /// Handle to a GPU buffer.
    type Buffer: Clone + fmt::Debug;
    /// Handle to a single-channel texture.
    type Texture: Clone + PartialEq + fmt::Debug;

    /// Allocate a buffer of `size` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Device`] if the allocation fails.
    fn create_buffer(&mut self, kind: BufferKind, size: usize) -> Result<Self::Buffer>;

    /// Copy `data` into `buffer` at byte `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Device`] if the write falls outside the buffer.
    fn write_buffer(&mut self, buffer: &Self::Buffer, offset: usize, data: &[u8]) -> Result<()>;

    /// Allocate a zero-filled `width`×`height` 8-bit texture.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Device`] if the allocation fails.
    fn create_texture(&mut self, width: u32, height: u32) -> Result<Self::Texture>;

    /// Overwrite `region` of `texture`.
    ///
    /// `data` holds `region.height` rows of `region.width` bytes each; row
    /// `i` starts at byte `i * stride`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Device`] if the region lies outside the texture or
    /// `data` is too short.
    fn upload_region(
        &mut self,
        texture: &Self::Texture,
        region: Region,
        data: &[u8],
        stride: usize,
    ) -> Result<()>;

    /// Queue a frame's draw calls. `signal` must be fired once the GPU has
    /// finished with every buffer the commands reference.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Device`] if the commands cannot be queued.
    fn submit(
        &mut self,
        commands: CommandList<Self::Buffer, Self::Texture>,
        signal: CompletionSignal,
    ) -> Result<()>;

    /// Fire the signals of finished submissions. With `wait`, block until at
    /// least the oldest outstanding submission finished.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Device`] if the device was lost.
    fn poll(&mut self, wait: bool) -> Result<()>;
}

/// Buffer handle of a [`RecordingDevice`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct RecordedBuffer(usize);

/// Texture handle of a [`RecordingDevice`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct RecordedTexture(usize);

/// A draw call as the GPU would have seen it at submission time.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedDraw {
    /// Pipeline state.
    pub pipeline: Pipeline,
    /// Position stream handle.
    pub vertex_buffer: RecordedBuffer,
    /// Attribute stream handle.
    pub attribute_buffer: Option<RecordedBuffer>,
    /// Sampled texture.
    pub texture: Option<RecordedTexture>,
    /// Vertex count.
    pub vertex_count: u32,
    /// Snapshot of the positions drawn.
    pub vertices: Vec<Vertex>,
    /// Snapshot of the attribute bytes drawn.
    pub attributes: Vec<u8>,
}

impl RecordedDraw {
    /// Decode the attribute snapshot as `A`s.
    #[must_use]
    pub fn attributes_as<A: Pod>(&self) -> Vec<A> {
        let size = size_of::<A>();
        if size == 0 {
            return Vec::new();
        }
        self.attributes
            .chunks_exact(size)
            .map(bytemuck::pod_read_unaligned)
            .collect()
    }
}

/// A recorded frame.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedSubmission {
    /// Submission identity.
    pub id: SubmissionId,
    /// Draw calls in order.
    pub draws: Vec<RecordedDraw>,
}

/// A [`RecordingDevice`] operation that can be made to fail.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Fault {
    /// [`Device::write_buffer`].
    Write,
    /// [`Device::upload_region`].
    Upload,
    /// [`Device::submit`].
    Submit,
}

/// A fake GPU that keeps everything in memory.
///
/// Submissions stay pending until [`complete`](Self::complete) or
/// [`complete_all`](Self::complete_all) is called, or, for a device built
/// with [`auto_completing`](Self::auto_completing), until the next
/// [`poll`](Device::poll).
#[derive(Debug, Default)]
pub struct RecordingDevice {
    buffers: Vec<Vec<u8>>,
    textures: Vec<GrayImage>,
    submissions: Vec<RecordedSubmission>,
    pending: Vec<CompletionSignal>,
    auto_complete: bool,
    uploads: usize,
    faults: Vec<Fault>,
}

impl RecordingDevice {
    /// A device whose submissions complete only when asked to.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A device that completes every pending submission on `poll`.
    #[must_use]
    pub fn auto_completing() -> Self {
        Self {
            auto_complete: true,
            ..Self::default()
        }
    }

    /// Every submission so far, oldest first.
    #[must_use]
    pub fn submissions(&self) -> &[RecordedSubmission] {
        &self.submissions
    }

    /// Number of buffers ever allocated.
    #[must_use]
    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Number of `upload_region` calls.
    #[must_use]
    pub fn upload_count(&self) -> usize {
        self.uploads
    }

    /// Current contents of a buffer.
    #[must_use]
    pub fn buffer(&self, buffer: RecordedBuffer) -> Option<&[u8]> {
        self.buffers.get(buffer.0).map(Vec::as_slice)
    }

    /// Current contents of a texture.
    #[must_use]
    pub fn texture(&self, texture: RecordedTexture) -> Option<&GrayImage> {
        self.textures.get(texture.0)
    }

    /// Write a texture to disk as a PNG, for eyeballing the atlas.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Device`] for an unknown handle or a failed write.
    pub fn save_texture(&self, texture: RecordedTexture, path: impl AsRef<Path>) -> Result<()> {
        let image = self
            .texture(texture)
            .ok_or_else(|| Error::Device(format!("unknown texture {texture:?}")))?;
        image
            .save(path)
            .map_err(|err| Error::Device(format!("failed to save texture: {err}")))
    }

    /// Submissions not yet completed, oldest first.
    #[must_use]
    pub fn pending(&self) -> Vec<SubmissionId> {
        self.pending.iter().map(CompletionSignal::id).collect()
    }

    /// Fire the completion signal of one submission. Returns `false` if it
    /// is not pending.
    pub fn complete(&mut self, id: SubmissionId) -> bool {
        let Some(index) = self.pending.iter().position(|signal| signal.id() == id) else {
            return false;
        };
        self.pending.remove(index).complete();
        true
    }

    /// Fire every pending completion signal. Returns how many fired.
    pub fn complete_all(&mut self) -> usize {
        let count = self.pending.len();
        for signal in self.pending.drain(..) {
            signal.complete();
        }
        count
    }

    /// Make every later `fault` operation fail with [`Error::Device`], as a
    /// lost device would.
    pub fn inject(&mut self, fault: Fault) {
        if !self.faults.contains(&fault) {
            self.faults.push(fault);
        }
    }

    /// Let every operation succeed again.
    pub fn clear_faults(&mut self) {
        self.faults.clear();
    }

    fn check(&self, fault: Fault) -> Result<()> {
        if self.faults.contains(&fault) {
            return Err(Error::Device(format!("injected {fault:?} failure")));
        }
        Ok(())
    }

    fn buffer_mut(&mut self, buffer: &RecordedBuffer) -> Result<&mut Vec<u8>> {
        self.buffers
            .get_mut(buffer.0)
            .ok_or_else(|| Error::Device(format!("unknown buffer {buffer:?}")))
    }

    fn snapshot(&self, buffer: RecordedBuffer, len: usize) -> Result<&[u8]> {
        self.buffer(buffer)
            .and_then(|bytes| bytes.get(..len))
            .ok_or_else(|| Error::Device(format!("draw reads past the end of {buffer:?}")))
    }
}

impl Device for RecordingDevice {
    type Buffer = RecordedBuffer;
    type Texture = RecordedTexture;

    fn create_buffer(&mut self, _kind: BufferKind, size: usize) -> Result<RecordedBuffer> {
        self.buffers.push(vec![0; size]);
        Ok(RecordedBuffer(self.buffers.len() - 1))
    }

    fn write_buffer(&mut self, buffer: &RecordedBuffer, offset: usize, data: &[u8]) -> Result<()> {
        self.check(Fault::Write)?;
        let bytes = self.buffer_mut(buffer)?;
        let target = offset
            .checked_add(data.len())
            .and_then(|end| bytes.get_mut(offset..end))
            .ok_or_else(|| Error::Device(format!("write past the end of {buffer:?}")))?;
        target.copy_from_slice(data);
        Ok(())
    }

    fn create_texture(&mut self, width: u32, height: u32) -> Result<RecordedTexture> {
        self.textures.push(GrayImage::new(width, height));
        Ok(RecordedTexture(self.textures.len() - 1))
    }

    fn upload_region(
        &mut self,
        texture: &RecordedTexture,
        region: Region,
        data: &[u8],
        stride: usize,
    ) -> Result<()> {
        self.check(Fault::Upload)?;
        let image = self
            .textures
            .get_mut(texture.0)
            .ok_or_else(|| Error::Device(format!("unknown texture {texture:?}")))?;
        if region.x + region.width > image.width() || region.y + region.height > image.height() {
            return Err(Error::Device(format!(
                "region {region:?} outside {}x{} texture",
                image.width(),
                image.height()
            )));
        }
        let width = region.width as usize;
        for row in 0..region.height {
            let start = row as usize * stride;
            let source = data
                .get(start..start + width)
                .ok_or_else(|| Error::Device("upload data too short for region".into()))?;
            for (column, &value) in (0..region.width).zip(source) {
                image.put_pixel(region.x + column, region.y + row, Luma([value]));
            }
        }
        self.uploads += 1;
        Ok(())
    }

    fn submit(
        &mut self,
        commands: CommandList<RecordedBuffer, RecordedTexture>,
        signal: CompletionSignal,
    ) -> Result<()> {
        self.check(Fault::Submit)?;
        let mut draws = Vec::with_capacity(commands.len());
        for draw in commands.draws {
            let count = draw.vertex_count as usize;
            let vertices = self
                .snapshot(draw.vertex_buffer, count * size_of::<Vertex>())?
                .chunks_exact(size_of::<Vertex>())
                .map(bytemuck::pod_read_unaligned)
                .collect();
            let attributes = match draw.attribute_buffer {
                Some(buffer) => self
                    .snapshot(buffer, count * draw.pipeline.attribute_stride())?
                    .to_vec(),
                None => Vec::new(),
            };
            draws.push(RecordedDraw {
                pipeline: draw.pipeline,
                vertex_buffer: draw.vertex_buffer,
                attribute_buffer: draw.attribute_buffer,
                texture: draw.texture,
                vertex_count: draw.vertex_count,
                vertices,
                attributes,
            });
        }
        log::trace!("recorded {:?} with {} draws", signal.id(), draws.len());
        self.submissions.push(RecordedSubmission {
            id: signal.id(),
            draws,
        });
        self.pending.push(signal);
        Ok(())
    }

    fn poll(&mut self, _wait: bool) -> Result<()> {
        if self.auto_complete {
            self.complete_all();
        }
        Ok(())
    }
}
