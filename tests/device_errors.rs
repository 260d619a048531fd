#![allow(clippy::unwrap_used)]

mod support;

use std::time::Duration;

use glyph_streamer::{
    BufferKind, Document, Error, Fault, GeometryProducer, InteriorFill, RecordingDevice,
    RenderConfig, RenderCore,
};
use support::{font, place, square_font};

fn config() -> RenderConfig {
    RenderConfig {
        buffer_capacity: 64 * 1024,
        atlas_size: 256,
        max_frames_in_flight: Some(2),
        completion_timeout: Duration::from_millis(5),
        ..RenderConfig::default()
    }
}

/// Every buffer the pool ever allocated is back on a free list.
fn all_free<P: GeometryProducer<RecordingDevice>>(core: &RenderCore<RecordingDevice, P>) -> bool {
    let pool = core.pool();
    pool.in_flight() == 0
        && pool.free_count(BufferKind::Vertex) + pool.free_count(BufferKind::Attribute)
            == pool.allocated()
}

#[test]
fn failed_submissions_release_their_buffers() {
    let font = square_font();
    let mut document = Document::new(vec![vec![place(&font, 1, 0.0, 0.0)]]);
    let mut core = RenderCore::stencil(RecordingDevice::auto_completing(), config()).unwrap();
    core.device_mut().inject(Fault::Submit);

    let err = core.tick(&mut document).unwrap_err();
    assert!(matches!(err, Error::Device(_)));
    assert!(all_free(&core));
    let allocated = core.pool().allocated();

    // More failures than the in-flight cap never turn into timeouts.
    for _ in 0..3 {
        assert!(matches!(core.tick(&mut document), Err(Error::Device(_))));
    }
    assert!(all_free(&core));
    assert_eq!(core.pool().allocated(), allocated);
    assert!(core.device().submissions().is_empty());

    core.device_mut().clear_faults();
    let report = core.tick(&mut document).unwrap();
    assert_eq!(report.drawn, 1);
    assert_eq!(core.device().submissions().len(), 1);
    assert_eq!(core.pool().allocated(), allocated);
}

#[test]
fn failed_writes_abandon_the_frame() {
    let font = square_font();
    let frame = (0..23_u8)
        .map(|i| place(&font, 1, 12.0 * f32::from(i), 20.0))
        .collect();
    let mut document = Document::new(vec![frame]);
    let config = RenderConfig {
        buffer_capacity: 360,
        ..config()
    };
    let mut core = RenderCore::loop_blinn(
        RecordingDevice::auto_completing(),
        config,
        InteriorFill::Tessellated,
    )
    .unwrap();
    core.device_mut().inject(Fault::Write);

    assert!(matches!(core.tick(&mut document), Err(Error::Device(_))));
    assert!(core.device().submissions().is_empty());
    assert!(all_free(&core));
    assert!(core.pool().allocated() > 0);

    core.device_mut().clear_faults();
    let report = core.tick(&mut document).unwrap();
    assert_eq!(report.drawn, 23);
    assert!(report.draw_calls > 1);
}

#[test]
fn failed_uploads_are_not_cached() {
    let font = font();
    let mut document = Document::new(vec![vec![
        place(&font, 1, 10.0, 100.0),
        place(&font, 2, 30.0, 100.0),
        place(&font, 3, 50.0, 100.0),
    ]]);
    let mut core = RenderCore::atlas(RecordingDevice::auto_completing(), config()).unwrap();
    core.device_mut().inject(Fault::Upload);

    assert!(matches!(core.tick(&mut document), Err(Error::Device(_))));
    assert!(core.device().submissions().is_empty());
    assert_eq!(core.device().upload_count(), 0);
    assert!(all_free(&core));

    core.device_mut().clear_faults();
    let report = core.tick(&mut document).unwrap();
    assert_eq!((report.drawn, report.skipped), (3, 0));
    assert_eq!(core.device().upload_count(), 3);
}
