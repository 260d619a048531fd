//! Renderer configuration.

use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::{Coefficient, Vertex};

/// Bytes needed to hold one triangle in the widest vertex/attribute layout.
pub const MIN_BUFFER_CAPACITY: usize = 3 * max(size_of::<Vertex>(), size_of::<Coefficient>());

const fn max(a: usize, b: usize) -> usize {
    if a > b {
        a
    } else {
        b
    }
}

/// Tunables for [`RenderCore`](crate::RenderCore).
///
/// The defaults reproduce the reference demo: 1 MiB stream buffers, a
/// 4096×4096 atlas, at most three frames in flight and an 800×600 viewport.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderConfig {
    /// Size in bytes of every stream buffer.
    pub buffer_capacity: usize,
    /// Edge length in pixels of the square glyph atlas.
    pub atlas_size: u32,
    /// How many submitted frames may be outstanding before `tick` blocks.
    ///
    /// `None` disables the cap. The CPU can then run arbitrarily far ahead of
    /// the GPU and the pool grows without bound while it does.
    pub max_frames_in_flight: Option<usize>,
    /// How long `tick` waits for a completion when the cap is reached.
    pub completion_timeout: Duration,
    /// Lines per curve when flattening outlines for the stencil strategy.
    pub flatten_steps: u32,
    /// Viewport size in pixels, covered by the stencil resolve quad.
    pub viewport: [f32; 2],
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: 1024 * 1024,
            atlas_size: 4096,
            max_frames_in_flight: Some(3),
            completion_timeout: Duration::from_secs(1),
            flatten_steps: 10,
            viewport: [800.0, 600.0],
        }
    }
}

impl RenderConfig {
    /// Check that the configuration can drive a renderer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] when a buffer cannot hold a single
    /// triangle, the atlas is empty, the in-flight cap is zero, curves would
    /// be flattened into nothing, or the viewport has no area.
    pub fn validate(&self) -> Result<()> {
        if self.buffer_capacity < MIN_BUFFER_CAPACITY {
            return Err(Error::InvalidConfig(format!(
                "buffer capacity {} is below one triangle ({MIN_BUFFER_CAPACITY} bytes)",
                self.buffer_capacity
            )));
        }
        if self.atlas_size == 0 {
            return Err(Error::InvalidConfig("atlas size must be non-zero".into()));
        }
        if self.max_frames_in_flight == Some(0) {
            return Err(Error::InvalidConfig(
                "max frames in flight must be at least one".into(),
            ));
        }
        if self.flatten_steps == 0 {
            return Err(Error::InvalidConfig("flatten steps must be non-zero".into()));
        }
        if !(self.viewport[0] > 0.0 && self.viewport[1] > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "viewport {:?} has no area",
                self.viewport
            )));
        }
        Ok(())
    }
}
