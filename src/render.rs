//! The frame driver: owns the device, buffer pool and rendering strategy,
//! and turns one document frame into one GPU submission per tick.

use crate::config::RenderConfig;
use crate::device::{Device, SubmissionId};
use crate::encoder::FrameEncoder;
use crate::error::{Error, Result};
use crate::pool::BufferPool;
use crate::producer::{
    AtlasProducer, GeometryProducer, GlyphOutcome, LoopBlinnProducer, StencilProducer,
};
use crate::triangulator::InteriorFill;
use crate::types::{Document, Font, Glyph};

/// What one [`tick`](RenderCore::tick) did.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FrameReport {
    /// Index of the document frame drawn, `None` for an empty document.
    pub frame: Option<usize>,
    /// The submission carrying the frame.
    pub submission: SubmissionId,
    /// Glyphs that appended geometry.
    pub drawn: usize,
    /// Glyphs with nothing to draw.
    pub empty: usize,
    /// Glyphs dropped because the atlas could not take them.
    pub skipped: usize,
    /// Triangles appended.
    pub triangles: usize,
    /// Draw calls submitted.
    pub draw_calls: usize,
}

/// Renders a looping [`Document`] one frame per tick.
///
/// The core owns everything with cross-frame state: the device, the stream
/// buffer pool and the producer with its glyph cache. Every tick starts by
/// polling the device and draining the completion signals it fired.
///
/// # Example
///
/// ```
/// use glyph_streamer::{Document, RecordingDevice, RenderConfig, RenderCore};
///
/// # fn main() -> glyph_streamer::Result<()> {
/// let device = RecordingDevice::auto_completing();
/// let mut core = RenderCore::stencil(device, RenderConfig::default())?;
/// let mut document = Document::<&dyn glyph_streamer::Font>::new(vec![Vec::new()]);
/// let report = core.tick(&mut document)?;
/// assert_eq!(report.draw_calls, 0);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct RenderCore<D: Device, P> {
    device: D,
    pool: BufferPool<D::Buffer>,
    producer: P,
    config: RenderConfig,
}

impl<D: Device, P: GeometryProducer<D>> RenderCore<D, P> {
    /// Assemble a core from its parts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `config` does not validate.
    pub fn new(device: D, producer: P, config: RenderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            device,
            pool: BufferPool::new(config.buffer_capacity),
            producer,
            config,
        })
    }

    /// Draw the document's next frame and submit it.
    ///
    /// Exactly one submission is made per successful tick, even for a frame
    /// without glyphs. Glyphs the atlas cannot take are logged and skipped;
    /// any other failure abandons the frame and returns its buffers to the
    /// pool without submitting.
    ///
    /// # Errors
    ///
    /// * [`Error::CompletionTimeout`] if the in-flight cap is reached and no
    ///   submission completes in time.
    /// * Device and encoder errors.
    pub fn tick<F: Font>(&mut self, document: &mut Document<F>) -> Result<FrameReport> {
        self.device.poll(false)?;
        self.pool.drain_completions();
        self.throttle()?;

        let (frame, glyphs) = match document.next_frame() {
            Some((index, glyphs)) => (Some(index), glyphs.as_slice()),
            None => (None, &[][..]),
        };
        let mut report = FrameReport {
            frame,
            submission: SubmissionId(0),
            drawn: 0,
            empty: 0,
            skipped: 0,
            triangles: 0,
            draw_calls: 0,
        };

        let mut encoder = FrameEncoder::new(&mut self.device, &mut self.pool);
        if let Err(err) = encode_frame(&mut self.producer, &mut encoder, glyphs, &mut report) {
            log::debug!("abandoning frame {frame:?}: {err}");
            encoder.abandon();
            return Err(err);
        }
        report.draw_calls = encoder.draw_count();
        report.submission = encoder.submit()?;

        let stats = self.producer.cache_stats();
        log::debug!(
            "frame {frame:?} as {:?}: {} drawn, {} empty, {} skipped, {} draws, cache {}/{}",
            report.submission,
            report.drawn,
            report.empty,
            report.skipped,
            report.draw_calls,
            stats.hits,
            stats.misses,
        );
        Ok(report)
    }

    /// Block until fewer than `max_frames_in_flight` submissions are
    /// outstanding.
    fn throttle(&mut self) -> Result<()> {
        let Some(cap) = self.config.max_frames_in_flight else {
            return Ok(());
        };
        while self.pool.in_flight() >= cap {
            self.device.poll(true)?;
            if self.pool.drain_completions() == 0 {
                self.pool
                    .wait_for_completion(self.config.completion_timeout)?;
            }
        }
        Ok(())
    }

    /// Let the device fire finished completions and recycle their buffers.
    /// Returns how many submissions completed.
    ///
    /// # Errors
    ///
    /// Propagates device errors.
    pub fn poll(&mut self) -> Result<usize> {
        self.device.poll(false)?;
        Ok(self.pool.drain_completions())
    }

    /// The device.
    pub fn device(&self) -> &D {
        &self.device
    }

    /// The device, mutably.
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// The rendering strategy.
    pub fn producer(&self) -> &P {
        &self.producer
    }

    /// The stream buffer pool.
    pub fn pool(&self) -> &BufferPool<D::Buffer> {
        &self.pool
    }

    /// The configuration.
    pub fn config(&self) -> &RenderConfig {
        &self.config
    }
}

impl<D: Device> RenderCore<D, AtlasProducer<D::Texture>> {
    /// A core blitting glyphs from a `config.atlas_size` atlas.
    ///
    /// # Errors
    ///
    /// Returns configuration and atlas creation errors.
    pub fn atlas(mut device: D, config: RenderConfig) -> Result<Self> {
        config.validate()?;
        let producer = AtlasProducer::new(&mut device, config.atlas_size)?;
        Self::new(device, producer, config)
    }
}

impl<D: Device> RenderCore<D, LoopBlinnProducer> {
    /// A core drawing Loop–Blinn meshes with the given interior strategy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `config` does not validate.
    pub fn loop_blinn(device: D, config: RenderConfig, interior: InteriorFill) -> Result<Self> {
        let producer = LoopBlinnProducer::new(interior, config.viewport);
        Self::new(device, producer, config)
    }
}

impl<D: Device> RenderCore<D, StencilProducer> {
    /// A core drawing flattened stencil fans.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `config` does not validate.
    pub fn stencil(device: D, config: RenderConfig) -> Result<Self> {
        let producer = StencilProducer::new(config.flatten_steps, config.viewport);
        Self::new(device, producer, config)
    }
}

fn encode_frame<D, P, F>(
    producer: &mut P,
    encoder: &mut FrameEncoder<'_, D>,
    glyphs: &[Glyph<F>],
    report: &mut FrameReport,
) -> Result<()>
where
    D: Device,
    P: GeometryProducer<D>,
    F: Font,
{
    producer.begin_frame(encoder)?;
    for glyph in glyphs {
        match producer.encode_glyph(encoder, glyph) {
            Ok(GlyphOutcome::Drawn { triangles }) => {
                report.drawn += 1;
                report.triangles += triangles;
            }
            Ok(GlyphOutcome::Empty) => report.empty += 1,
            Err(err @ (Error::AtlasFull { .. } | Error::GlyphTooLarge { .. })) => {
                log::warn!("skipping {:?}: {err}", glyph.id);
                report.skipped += 1;
            }
            Err(err) => return Err(err),
        }
    }
    producer.finish_frame(encoder)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::device::{Pipeline, RecordingDevice};
    use crate::testing::rect;
    use crate::types::{FontKey, GlyphId, OutlineFont};
    use lyon::math::point;
    use std::time::Duration;

    fn glyph(font: &OutlineFont, id: u32, x: f32) -> Glyph<&OutlineFont> {
        Glyph {
            id: GlyphId(id),
            font,
            position: point(x, 10.0),
        }
    }

    fn config() -> RenderConfig {
        RenderConfig {
            buffer_capacity: 4096,
            atlas_size: 32,
            completion_timeout: Duration::from_millis(5),
            ..RenderConfig::default()
        }
    }

    #[test]
    fn invalid_configuration_is_rejected() {
        let config = RenderConfig {
            buffer_capacity: 8,
            ..config()
        };
        assert!(matches!(
            RenderCore::stencil(RecordingDevice::new(), config),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn full_atlas_skips_glyphs_and_keeps_drawing() {
        let font = OutlineFont::new(FontKey(3))
            .with_glyph(1, rect(0.0, 0.0, 20.0, 20.0))
            .with_glyph(2, rect(0.0, 0.0, 20.0, 21.0))
            .with_glyph(3, rect(0.0, 0.0, 4.0, 4.0));
        let mut document = Document::new(vec![vec![
            glyph(&font, 1, 0.0),
            glyph(&font, 2, 30.0),
            glyph(&font, 3, 60.0),
        ]]);
        let mut core = RenderCore::atlas(RecordingDevice::auto_completing(), config()).unwrap();
        let report = core.tick(&mut document).unwrap();
        assert_eq!((report.drawn, report.skipped), (2, 1));
        let draws = &core.device().submissions()[0].draws;
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].pipeline, Pipeline::Atlas);
        assert_eq!(draws[0].vertex_count, 12);
    }

    #[test]
    fn empty_document_still_submits() {
        let mut core = RenderCore::stencil(RecordingDevice::new(), config()).unwrap();
        let mut document = Document::<&OutlineFont>::new(Vec::new());
        let report = core.tick(&mut document).unwrap();
        assert_eq!(report.frame, None);
        assert_eq!(core.device().submissions().len(), 1);
    }

    #[test]
    fn polling_recycles_completed_frames() {
        let font = OutlineFont::new(FontKey(3)).with_glyph(1, rect(0.0, 0.0, 5.0, 5.0));
        let mut document = Document::new(vec![vec![glyph(&font, 1, 0.0)]]);
        let mut core = RenderCore::stencil(RecordingDevice::new(), config()).unwrap();
        let report = core.tick(&mut document).unwrap();
        assert_eq!(core.pool().in_flight(), 1);
        assert!(core.device_mut().complete(report.submission));
        assert_eq!(core.poll().unwrap(), 1);
        assert_eq!(core.pool().in_flight(), 0);
    }
}
