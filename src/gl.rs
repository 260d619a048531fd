//! OpenGL implementation of [`Device`] via [glow].
//!
//! Stream buffers are plain array buffers refilled with `glBufferSubData`.
//! The atlas is a single `R8` texture updated with `glTexSubImage2D`, using
//! `GL_UNPACK_ROW_LENGTH` so the scratch bitmap's row stride can be handed
//! over without repacking. Every submission ends with a fence; [`poll`]
//! checks fences oldest first and fires the completion signals of those the
//! GPU has passed.
//!
//! Stencil pipelines count coverage with `INCR_WRAP` on front faces and
//! `DECR_WRAP` on back faces, then the cover pass paints wherever the count
//! is non-zero and resets it to zero.
//!
//! [`poll`]: Device::poll

use std::collections::VecDeque;
use std::sync::Arc;

use glow::{HasContext, PixelUnpackData};

use crate::device::{BufferKind, CommandList, Device, DrawCall, Pipeline, Region};
use crate::error::{Error, Result};
use crate::pool::CompletionSignal;
use crate::shaders::{self, ATTRIBUTE_LOCATION, POSITION_LOCATION};
use crate::types::Vertex;

/// GL internal format for single-channel 8-bit textures, pre-cast to the
/// `i32` that `tex_image_2d` expects.
#[expect(clippy::cast_possible_wrap)]
const R8_INTERNAL_FORMAT: i32 = glow::R8 as i32;

/// How long a blocking [`poll`](Device::poll) waits on one fence, in
/// nanoseconds.
const FENCE_WAIT_NS: i32 = 100_000_000;

/// Convert a `u32` to `i32` for GL API calls.
///
/// # Panics
///
/// Panics if `value > i32::MAX`. In practice, this is unreachable for
/// atlas sizes and vertex counts the core produces.
fn gl_size(value: u32) -> i32 {
    i32::try_from(value).expect("dimension exceeds i32::MAX")
}

fn gl_offset(value: usize) -> Result<i32> {
    i32::try_from(value).map_err(|_| Error::Device(format!("{value} exceeds GL's i32 range")))
}

/// A linked program with its uniform locations.
struct Program {
    program: glow::Program,
    /// `u_resolution` — viewport size in pixels.
    resolution: glow::UniformLocation,
    /// `u_color` — text color.
    color: glow::UniformLocation,
}

impl Program {
    /// Compile and look up the uniforms every program shares.
    ///
    /// # Panics
    ///
    /// Panics if a shared uniform is missing, which indicates a bug in the
    /// shader source.
    unsafe fn new(
        gl: &glow::Context,
        vertex_src: &str,
        fragment_src: &str,
        attribute: Option<&str>,
    ) -> Result<Self, String> {
        unsafe {
            let program = shaders::compile_program(gl, vertex_src, fragment_src, attribute)?;
            Ok(Self {
                program,
                resolution: gl
                    .get_uniform_location(program, "u_resolution")
                    .expect("u_resolution missing from shader"),
                color: gl
                    .get_uniform_location(program, "u_color")
                    .expect("u_color missing from shader"),
            })
        }
    }
}

/// Renders recorded frames with OpenGL 3.2+.
///
/// Buffers and textures are raw GL handles. The device remembers every
/// object it created and deletes them in [`destroy`](Self::destroy).
pub struct GlowDevice {
    /// The OpenGL context, shared via [`Arc`].
    gl: Arc<glow::Context>,

    /// Atlas quads.
    atlas: Program,
    /// `u_atlas` sampler of the atlas program.
    atlas_sampler: glow::UniformLocation,
    /// Loop–Blinn triangles.
    curve: Program,
    /// `u_stencil_mode` of the curve program.
    curve_stencil_mode: glow::UniformLocation,
    /// Stencil fans and cover quads.
    solid: Program,

    /// Attribute bindings are respecified per draw on this one VAO.
    vao: glow::VertexArray,

    buffers: Vec<glow::Buffer>,
    textures: Vec<glow::Texture>,
    /// Fences of submitted frames, oldest first.
    pending: VecDeque<(glow::Fence, CompletionSignal)>,

    viewport: [u32; 2],
    color: [f32; 4],
}

impl GlowDevice {
    /// Compile the programs and create the vertex array.
    ///
    /// # Safety
    ///
    /// The `gl` context must be current and valid, and stay current on this
    /// thread whenever the device is used. The caller must ensure that
    /// [`destroy`](Self::destroy) is called before the context is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Device`] if shader compilation, program linking, or
    /// GL resource creation fails.
    ///
    /// # Panics
    ///
    /// Panics if any shader uniform location cannot be found, which
    /// indicates a bug in the shader source code.
    pub unsafe fn new(gl: Arc<glow::Context>, viewport: [u32; 2]) -> Result<Self> {
        unsafe {
            let atlas = Program::new(
                &gl,
                shaders::ATLAS_VERTEX_SRC,
                shaders::ATLAS_FRAGMENT_SRC,
                Some("a_uv"),
            )?;
            let curve = Program::new(
                &gl,
                shaders::CURVE_VERTEX_SRC,
                shaders::CURVE_FRAGMENT_SRC,
                Some("a_klm"),
            )?;
            let solid = Program::new(
                &gl,
                shaders::SOLID_VERTEX_SRC,
                shaders::SOLID_FRAGMENT_SRC,
                None,
            )?;
            let atlas_sampler = gl
                .get_uniform_location(atlas.program, "u_atlas")
                .expect("u_atlas missing from atlas shader");
            let curve_stencil_mode = gl
                .get_uniform_location(curve.program, "u_stencil_mode")
                .expect("u_stencil_mode missing from curve shader");
            let vao = gl.create_vertex_array()?;
            gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);

            Ok(Self {
                gl,
                atlas,
                atlas_sampler,
                curve,
                curve_stencil_mode,
                solid,
                vao,
                buffers: Vec::new(),
                textures: Vec::new(),
                pending: VecDeque::new(),
                viewport,
                color: [0.0, 0.0, 0.0, 1.0],
            })
        }
    }

    /// Set the viewport size in pixels used to map positions to clip space.
    pub fn set_viewport(&mut self, viewport: [u32; 2]) {
        self.viewport = viewport;
    }

    /// Set the text color (straight alpha).
    pub fn set_color(&mut self, color: [f32; 4]) {
        self.color = color;
    }

    /// Number of submissions whose fence has not been seen signalled.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Clean up all GL resources owned by this device.
    ///
    /// Pending completion signals are fired after a `glFinish`.
    ///
    /// # Safety
    ///
    /// Must be called with the same GL context that was used to create the
    /// device, and must be called exactly once.
    pub unsafe fn destroy(&mut self) {
        let gl = &self.gl;
        unsafe {
            gl.finish();
            for (fence, signal) in self.pending.drain(..) {
                gl.delete_sync(fence);
                signal.complete();
            }
            gl.delete_program(self.atlas.program);
            gl.delete_program(self.curve.program);
            gl.delete_program(self.solid.program);
            gl.delete_vertex_array(self.vao);
            for buffer in self.buffers.drain(..) {
                gl.delete_buffer(buffer);
            }
            for texture in self.textures.drain(..) {
                gl.delete_texture(texture);
            }
        }
    }

    /// Set default texture filtering and wrapping parameters.
    unsafe fn set_default_tex_params(gl: &glow::Context) {
        // GL constant values are small enough that the cast is always safe.
        #[expect(clippy::cast_possible_wrap)]
        unsafe {
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MIN_FILTER,
                glow::LINEAR as i32,
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MAG_FILTER,
                glow::LINEAR as i32,
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_WRAP_S,
                glow::CLAMP_TO_EDGE as i32,
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_WRAP_T,
                glow::CLAMP_TO_EDGE as i32,
            );
        }
    }

    /// Select program, blending and stencil state for `pipeline`.
    unsafe fn apply_pipeline(&self, pipeline: Pipeline, texture: Option<glow::Texture>) {
        let gl = &self.gl;
        let program = match pipeline {
            Pipeline::Atlas => &self.atlas,
            Pipeline::LoopBlinn | Pipeline::LoopBlinnStencil => &self.curve,
            Pipeline::StencilCount | Pipeline::StencilCover => &self.solid,
        };
        #[expect(clippy::cast_precision_loss)]
        let resolution = [self.viewport[0] as f32, self.viewport[1] as f32];
        let [r, g, b, a] = self.color;

        unsafe {
            gl.use_program(Some(program.program));
            gl.uniform_2_f32(Some(&program.resolution), resolution[0], resolution[1]);
            gl.uniform_4_f32(Some(&program.color), r, g, b, a);

            match pipeline {
                Pipeline::Atlas => {
                    gl.active_texture(glow::TEXTURE0);
                    gl.bind_texture(glow::TEXTURE_2D, texture);
                    gl.uniform_1_i32(Some(&self.atlas_sampler), 0);
                }
                Pipeline::LoopBlinn | Pipeline::LoopBlinnStencil => {
                    let stencil = i32::from(pipeline == Pipeline::LoopBlinnStencil);
                    gl.uniform_1_i32(Some(&self.curve_stencil_mode), stencil);
                }
                Pipeline::StencilCount | Pipeline::StencilCover => {}
            }

            if pipeline.counts_stencil() {
                gl.disable(glow::BLEND);
                gl.color_mask(false, false, false, false);
                gl.enable(glow::STENCIL_TEST);
                gl.stencil_func(glow::ALWAYS, 0, 0xff);
                gl.stencil_op_separate(glow::FRONT, glow::KEEP, glow::KEEP, glow::INCR_WRAP);
                gl.stencil_op_separate(glow::BACK, glow::KEEP, glow::KEEP, glow::DECR_WRAP);
            } else {
                gl.enable(glow::BLEND);
                gl.blend_func(glow::ONE, glow::ONE_MINUS_SRC_ALPHA);
                gl.color_mask(true, true, true, true);
                if pipeline == Pipeline::StencilCover {
                    gl.enable(glow::STENCIL_TEST);
                    gl.stencil_func(glow::NOTEQUAL, 0, 0xff);
                    gl.stencil_op(glow::ZERO, glow::ZERO, glow::ZERO);
                } else {
                    gl.disable(glow::STENCIL_TEST);
                }
            }
        }
    }

    /// Bind the draw's streams and issue it.
    unsafe fn draw(&self, draw: &DrawCall<glow::Buffer, glow::Texture>) {
        let gl = &self.gl;
        let stride = draw.pipeline.attribute_stride();
        unsafe {
            self.apply_pipeline(draw.pipeline, draw.texture);

            gl.bind_buffer(glow::ARRAY_BUFFER, Some(draw.vertex_buffer));
            gl.enable_vertex_attrib_array(POSITION_LOCATION);
            gl.vertex_attrib_pointer_f32(
                POSITION_LOCATION,
                2,
                glow::FLOAT,
                false,
                // Vertex is 8 bytes, well within i32 range.
                #[expect(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
                {
                    size_of::<Vertex>() as i32
                },
                0,
            );

            match draw.attribute_buffer {
                Some(buffer) if stride > 0 => {
                    gl.bind_buffer(glow::ARRAY_BUFFER, Some(buffer));
                    gl.enable_vertex_attrib_array(ATTRIBUTE_LOCATION);
                    // Attributes are 8 or 12 bytes of f32s.
                    #[expect(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
                    gl.vertex_attrib_pointer_f32(
                        ATTRIBUTE_LOCATION,
                        (stride / size_of::<f32>()) as i32,
                        glow::FLOAT,
                        false,
                        stride as i32,
                        0,
                    );
                }
                _ => gl.disable_vertex_attrib_array(ATTRIBUTE_LOCATION),
            }

            gl.draw_arrays(glow::TRIANGLES, 0, gl_size(draw.vertex_count));
        }
    }
}

impl Device for GlowDevice {
    type Buffer = glow::Buffer;
    type Texture = glow::Texture;

    fn create_buffer(&mut self, _kind: BufferKind, size: usize) -> Result<glow::Buffer> {
        let size = gl_offset(size)?;
        let gl = &self.gl;
        // SAFETY: the context is current per the contract of `new`.
        let buffer = unsafe {
            let buffer = gl.create_buffer()?;
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(buffer));
            gl.buffer_data_size(glow::ARRAY_BUFFER, size, glow::STREAM_DRAW);
            gl.bind_buffer(glow::ARRAY_BUFFER, None);
            buffer
        };
        self.buffers.push(buffer);
        Ok(buffer)
    }

    fn write_buffer(&mut self, buffer: &glow::Buffer, offset: usize, data: &[u8]) -> Result<()> {
        let offset = gl_offset(offset)?;
        let gl = &self.gl;
        // SAFETY: the context is current per the contract of `new`.
        unsafe {
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(*buffer));
            gl.buffer_sub_data_u8_slice(glow::ARRAY_BUFFER, offset, data);
            gl.bind_buffer(glow::ARRAY_BUFFER, None);
        }
        Ok(())
    }

    fn create_texture(&mut self, width: u32, height: u32) -> Result<glow::Texture> {
        let zeros = vec![0_u8; width as usize * height as usize];
        let gl = &self.gl;
        // SAFETY: the context is current per the contract of `new`.
        let texture = unsafe {
            let texture = gl.create_texture()?;
            gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                R8_INTERNAL_FORMAT,
                gl_size(width),
                gl_size(height),
                0,
                glow::RED,
                glow::UNSIGNED_BYTE,
                PixelUnpackData::Slice(Some(&zeros)),
            );
            Self::set_default_tex_params(gl);
            gl.bind_texture(glow::TEXTURE_2D, None);
            texture
        };
        self.textures.push(texture);
        Ok(texture)
    }

    fn upload_region(
        &mut self,
        texture: &glow::Texture,
        region: Region,
        data: &[u8],
        stride: usize,
    ) -> Result<()> {
        if region.is_empty() {
            return Ok(());
        }
        let needed = (region.height as usize - 1) * stride + region.width as usize;
        if data.len() < needed {
            return Err(Error::Device(format!(
                "upload of {region:?} needs {needed} bytes, got {}",
                data.len()
            )));
        }
        let row_length = gl_offset(stride)?;
        let gl = &self.gl;
        // SAFETY: the context is current per the contract of `new`.
        unsafe {
            gl.bind_texture(glow::TEXTURE_2D, Some(*texture));
            gl.pixel_store_i32(glow::UNPACK_ROW_LENGTH, row_length);
            gl.tex_sub_image_2d(
                glow::TEXTURE_2D,
                0,
                gl_size(region.x),
                gl_size(region.y),
                gl_size(region.width),
                gl_size(region.height),
                glow::RED,
                glow::UNSIGNED_BYTE,
                PixelUnpackData::Slice(Some(&data[..needed])),
            );
            gl.pixel_store_i32(glow::UNPACK_ROW_LENGTH, 0);
            gl.bind_texture(glow::TEXTURE_2D, None);
        }
        Ok(())
    }

    fn submit(
        &mut self,
        commands: CommandList<glow::Buffer, glow::Texture>,
        signal: CompletionSignal,
    ) -> Result<()> {
        let gl = &self.gl;
        // SAFETY: the context is current per the contract of `new`.
        unsafe {
            gl.viewport(0, 0, gl_size(self.viewport[0]), gl_size(self.viewport[1]));
            gl.bind_vertex_array(Some(self.vao));
            for draw in &commands.draws {
                self.draw(draw);
            }
            gl.bind_vertex_array(None);
            gl.bind_texture(glow::TEXTURE_2D, None);

            match gl.fence_sync(glow::SYNC_GPU_COMMANDS_COMPLETE, 0) {
                Ok(fence) => self.pending.push_back((fence, signal)),
                Err(err) => {
                    log::warn!("no fence for {:?} ({err}), finishing synchronously", signal.id());
                    gl.finish();
                    signal.complete();
                }
            }
            gl.flush();
        }
        Ok(())
    }

    fn poll(&mut self, wait: bool) -> Result<()> {
        let gl = &self.gl;
        let mut block = wait;
        while let Some(&(fence, _)) = self.pending.front() {
            // SAFETY: the context is current per the contract of `new`.
            let status = unsafe {
                if block {
                    gl.client_wait_sync(fence, glow::SYNC_FLUSH_COMMANDS_BIT, FENCE_WAIT_NS)
                } else {
                    gl.get_sync_status(fence)
                }
            };
            match status {
                glow::SIGNALED | glow::ALREADY_SIGNALED | glow::CONDITION_SATISFIED => {}
                glow::WAIT_FAILED => {
                    return Err(Error::Device("glClientWaitSync failed".into()));
                }
                _ => break,
            }
            block = false;
            if let Some((fence, signal)) = self.pending.pop_front() {
                // SAFETY: the context is current per the contract of `new`.
                unsafe { gl.delete_sync(fence) };
                signal.complete();
            }
        }
        Ok(())
    }
}
