//! Builds one frame's draw calls on top of the buffer pool.
//!
//! Geometry is appended triangle by triangle into the current vertex and
//! attribute stream buffers. When the next triangle would not fit, or the
//! pipeline changes, the pending geometry is flushed: the staging bytes are
//! written to the device, a [`DrawCall`] covering `[0, utilization)` is
//! recorded and both buffers are retired to the pool. Fresh buffers are
//! acquired when the next triangle arrives.

use bytemuck::Pod;
use lyon::math::Vector;

use crate::device::{BufferKind, CommandList, Device, DrawCall, Pipeline, SubmissionId};
use crate::error::{Error, Result};
use crate::pool::{BufferPool, StreamBuffer};
use crate::types::{GlyphMesh, Vertex};

const VERTICES_PER_TRIANGLE: usize = 3;

/// Draw-call builder for a single frame.
///
/// Finish with [`submit`](Self::submit) or throw the frame away with
/// [`abandon`](Self::abandon). Dropping the encoder returns buffers that
/// never held flushed geometry but leaves flushed ones in the pool's used
/// list for the next submission.
pub struct FrameEncoder<'a, D: Device> {
    device: &'a mut D,
    pool: &'a mut BufferPool<D::Buffer>,
    pipeline: Option<Pipeline>,
    texture: Option<D::Texture>,
    vertex: Option<StreamBuffer<D::Buffer>>,
    attribute: Option<StreamBuffer<D::Buffer>>,
    vertices: u32,
    draws: Vec<DrawCall<D::Buffer, D::Texture>>,
}

impl<'a, D: Device> FrameEncoder<'a, D> {
    /// Start a frame.
    pub fn new(device: &'a mut D, pool: &'a mut BufferPool<D::Buffer>) -> Self {
        Self {
            device,
            pool,
            pipeline: None,
            texture: None,
            vertex: None,
            attribute: None,
            vertices: 0,
            draws: Vec::new(),
        }
    }

    /// The device, for producers that upload resources while encoding.
    pub fn device_mut(&mut self) -> &mut D {
        &mut *self.device
    }

    /// The pipeline geometry is currently appended for.
    pub fn pipeline(&self) -> Option<Pipeline> {
        self.pipeline
    }

    /// Draw calls recorded so far.
    pub fn draw_count(&self) -> usize {
        self.draws.len()
    }

    /// Select the pipeline and texture for subsequent geometry, flushing
    /// whatever was appended with a different binding.
    ///
    /// # Errors
    ///
    /// Propagates device errors from the flush.
    pub fn set_pipeline(&mut self, pipeline: Pipeline, texture: Option<D::Texture>) -> Result<()> {
        if self.pipeline != Some(pipeline) {
            self.flush()?;
            self.release_held();
            self.pipeline = Some(pipeline);
        } else if self.texture != texture {
            self.flush()?;
        }
        self.texture = texture;
        Ok(())
    }

    /// Append every triangle of `mesh`, translated by `offset`.
    ///
    /// A mesh may be split across several draw calls; triangles are never
    /// split.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if no pipeline is set or a single
    /// triangle does not fit in an empty buffer, and propagates device errors.
    pub fn append_mesh<A: Pod>(&mut self, mesh: &GlyphMesh<A>, offset: Vector) -> Result<()> {
        let Some(pipeline) = self.pipeline else {
            return Err(Error::InvalidConfig("geometry appended before a pipeline was set".into()));
        };
        let stride = pipeline.attribute_stride();
        debug_assert!(
            stride == 0 || size_of::<A>() == stride,
            "{pipeline:?} expects {stride}-byte attributes"
        );

        let total = mesh.triangle_count();
        let mut done = 0;
        while done < total {
            self.ensure_buffers(stride)?;
            let fit = self.triangles_that_fit(stride);
            if fit == 0 {
                if self.vertices == 0 {
                    return Err(Error::InvalidConfig(format!(
                        "a {}-byte buffer cannot hold one {pipeline:?} triangle",
                        self.pool.capacity()
                    )));
                }
                self.flush()?;
                continue;
            }
            let count = fit.min(total - done);
            let range = done * VERTICES_PER_TRIANGLE..(done + count) * VERTICES_PER_TRIANGLE;
            if let Some(buffer) = self.vertex.as_mut() {
                for vertex in &mesh.positions[range.clone()] {
                    buffer.append(bytemuck::bytes_of(&Vertex::new(vertex.point() + offset)));
                }
            }
            if stride > 0 {
                if let Some(buffer) = self.attribute.as_mut() {
                    buffer.append(bytemuck::cast_slice(&mesh.attributes[range]));
                }
            }
            self.vertices += vertex_count(count)?;
            done += count;
        }
        Ok(())
    }

    /// Write pending geometry to the device and record a draw call for it.
    ///
    /// Does nothing when no geometry is pending.
    ///
    /// # Errors
    ///
    /// Propagates device write errors.
    pub fn flush(&mut self) -> Result<()> {
        if self.vertices == 0 {
            return Ok(());
        }
        let (Some(pipeline), Some(vertex)) = (self.pipeline, self.vertex.as_ref()) else {
            return Ok(());
        };
        // Both buffers stay held until their writes land.
        self.device.write_buffer(vertex.handle(), 0, vertex.contents())?;
        if let Some(attribute) = &self.attribute {
            self.device
                .write_buffer(attribute.handle(), 0, attribute.contents())?;
        }
        let Some(vertex) = self.vertex.take() else {
            return Ok(());
        };
        let attribute = self.attribute.take();
        log::trace!(
            "flush {pipeline:?}: {} vertices, {} vertex bytes",
            self.vertices,
            vertex.utilization()
        );
        self.draws.push(DrawCall {
            pipeline,
            vertex_buffer: vertex.handle().clone(),
            attribute_buffer: attribute.as_ref().map(|buffer| buffer.handle().clone()),
            texture: self.texture.clone(),
            vertex_count: self.vertices,
        });
        self.pool.retire(vertex);
        if let Some(attribute) = attribute {
            self.pool.retire(attribute);
        }
        self.vertices = 0;
        Ok(())
    }

    /// Flush, hand the frame to the device and park its buffers until the
    /// device signals completion.
    ///
    /// # Errors
    ///
    /// Propagates device errors from the flush and the submission. Either
    /// way the frame's buffers go back to the pool.
    pub fn submit(mut self) -> Result<SubmissionId> {
        if let Err(err) = self.flush() {
            self.abandon();
            return Err(err);
        }
        self.release_held();
        let commands = CommandList {
            draws: std::mem::take(&mut self.draws),
        };
        let signal = self.pool.begin_submission();
        let id = signal.id();
        if let Err(err) = self.device.submit(commands, signal) {
            // Nothing was queued, so the parked buffers are free again.
            self.pool.recycle(id);
            return Err(err);
        }
        Ok(id)
    }

    /// Throw the frame away, returning every buffer it touched to the pool.
    pub fn abandon(mut self) {
        self.vertices = 0;
        self.release_held();
        self.draws.clear();
        self.pool.abandon_frame();
    }

    fn ensure_buffers(&mut self, stride: usize) -> Result<()> {
        if self.vertex.is_none() {
            self.vertex = Some(self.pool.acquire(&mut *self.device, BufferKind::Vertex)?);
        }
        if stride > 0 && self.attribute.is_none() {
            self.attribute = Some(self.pool.acquire(&mut *self.device, BufferKind::Attribute)?);
        }
        Ok(())
    }

    fn triangles_that_fit(&self, stride: usize) -> usize {
        let positions = self.vertex.as_ref().map_or(0, |buffer| {
            buffer.remaining() / (VERTICES_PER_TRIANGLE * size_of::<Vertex>())
        });
        if stride == 0 {
            return positions;
        }
        let attributes = self.attribute.as_ref().map_or(0, |buffer| {
            buffer.remaining() / (VERTICES_PER_TRIANGLE * stride)
        });
        positions.min(attributes)
    }

    fn release_held(&mut self) {
        debug_assert_eq!(self.vertices, 0, "releasing buffers with pending geometry");
        if let Some(buffer) = self.vertex.take() {
            self.pool.release(buffer);
        }
        if let Some(buffer) = self.attribute.take() {
            self.pool.release(buffer);
        }
    }
}

impl<D: Device> Drop for FrameEncoder<'_, D> {
    fn drop(&mut self) {
        self.vertices = 0;
        self.release_held();
    }
}

fn vertex_count(triangles: usize) -> Result<u32> {
    u32::try_from(triangles * VERTICES_PER_TRIANGLE)
        .map_err(|_| Error::InvalidConfig("too many vertices for one draw".into()))
}
