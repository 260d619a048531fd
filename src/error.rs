//! Error taxonomy for the rendering core.
//!
//! Degenerate glyphs (empty outline, zero-area bounds) are deliberately not
//! represented here: producers return an empty mesh and the renderer skips
//! it. Overflowing a stream buffer is a programming error and panics inside
//! [`StreamBuffer::append`](crate::pool::StreamBuffer::append).

use thiserror::Error;

use crate::device::SubmissionId;

/// Errors that can occur while building or submitting frames.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The shelf packer has no room left for a glyph of this size.
    ///
    /// The atlas never evicts, so once this is returned every further glyph
    /// of at least this size will fail too.
    #[error("glyph atlas is full, no room for a {width}x{height} glyph")]
    AtlasFull {
        /// Width in pixels of the rejected glyph box.
        width: u32,
        /// Height in pixels of the rejected glyph box.
        height: u32,
    },

    /// A glyph's pixel box does not fit inside the scratch bitmap at all.
    #[error("glyph needs a {width}x{height} box, larger than the atlas")]
    GlyphTooLarge {
        /// Width in pixels of the glyph box.
        width: u32,
        /// Height in pixels of the glyph box.
        height: u32,
    },

    /// A [`RenderConfig`](crate::RenderConfig) value was rejected.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The GPU device failed to create or update a resource.
    #[error("device error: {0}")]
    Device(String),

    /// The in-flight cap was reached and no submission completed in time.
    #[error("timed out waiting for {submission:?} to complete")]
    CompletionTimeout {
        /// The oldest submission still in flight.
        submission: SubmissionId,
    },

    /// A font blob could not be parsed.
    #[cfg(feature = "skrifa")]
    #[error("failed to read font: {0}")]
    Font(#[from] skrifa::raw::ReadError),
}

impl From<String> for Error {
    fn from(message: String) -> Self {
        Self::Device(message)
    }
}

/// Shorthand for results carrying the crate [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;
