//! End-to-end engine flow against an in-process service fake: prompt,
//! composite, track, export.

use futures::stream;
use tokio::sync::mpsc;

use savi::{
    AddPointsRequest, Canvas, Engine, FRAME_SEPARATOR, Fps, FrameIndex, FrameResult, FrameRgba,
    MASK_ALPHA, MaskStream, NormPoint, ObjectMask, PointLabel, PromptMask, Rgba8, RleMask,
    SaviResult, SegmentationService, Session, SessionId, TrackingState, blend_px,
};

const WIDTH: u32 = 6;
const HEIGHT: u32 = 4;
const TOTAL_FRAMES: u64 = 10;

/// Mask covering raster column `col` of a HEIGHTxWIDTH raster: in the
/// column-major run walk, that column is the run of HEIGHT pixels starting
/// at position `col * HEIGHT`.
fn column_mask(col: u32) -> RleMask {
    RleMask {
        size: (HEIGHT, WIDTH),
        counts: vec![col * HEIGHT, HEIGHT],
    }
}

struct FakeService {
    export_blob: serde_json::Value,
}

impl FakeService {
    fn new() -> Self {
        Self {
            export_blob: serde_json::json!({
                "sessionId": "it-session",
                "frames": {"0": [{"objectId": 0, "mask": {"size": [4, 6], "counts": [0, 4]}}]}
            }),
        }
    }
}

impl SegmentationService for FakeService {
    async fn add_points(&self, req: &AddPointsRequest) -> SaviResult<Vec<PromptMask>> {
        assert_eq!(req.labels.len(), req.points.len());
        assert!(req.clear_old_points);
        Ok(vec![PromptMask {
            object_id: req.object_id,
            rle_mask: column_mask(0),
        }])
    }

    async fn propagate(&self, _: &SessionId, start: FrameIndex) -> SaviResult<MaskStream> {
        // One message per frame, the mask marching one column per frame,
        // delivered in deliberately awkward chunk sizes.
        let mut body = Vec::new();
        for frame in start.0..TOTAL_FRAMES {
            let fr = FrameResult {
                frame_index: frame,
                results: vec![ObjectMask {
                    object_id: 0,
                    mask: column_mask((frame % WIDTH as u64) as u32),
                }],
            };
            body.extend_from_slice(serde_json::to_string(&fr).unwrap().as_bytes());
            body.extend_from_slice(FRAME_SEPARATOR.as_bytes());
        }
        let chunks: Vec<SaviResult<bytes::Bytes>> = body
            .chunks(17)
            .map(|c| Ok(bytes::Bytes::from(c.to_vec())))
            .collect();
        Ok(Box::pin(stream::iter(chunks)))
    }

    async fn export_masks(&self, _: &SessionId) -> SaviResult<serde_json::Value> {
        Ok(self.export_blob.clone())
    }
}

fn session() -> Session {
    let frame = FrameRgba::filled(WIDTH, HEIGHT, Rgba8::new(0, 0, 0, 255));
    Session {
        id: SessionId("it-session".into()),
        canvas: Canvas {
            width: WIDTH,
            height: HEIGHT,
        },
        frames: vec![frame; TOTAL_FRAMES as usize],
    }
}

#[tokio::test]
async fn annotate_track_export() {
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let fake = FakeService::new();
    let expected_export = fake.export_blob.clone();
    let mut engine = Engine::new(fake, session(), Fps { num: 24, den: 1 }, events_tx);

    // Create an object and prompt it on frame 0.
    let id = engine.create_object().unwrap();
    engine
        .add_point(PointLabel::Positive, NormPoint::new(0.2, 0.3).unwrap())
        .await
        .unwrap();
    assert!(engine.tracking_eligible());

    // The prompt response produced a mask for frame 0; compositing shows the
    // object's palette color down column 0 and nowhere else.
    let color = engine.store().by_id(id).unwrap().color().rgba();
    let painted = blend_px([0, 0, 0, 255], color, MASK_ALPHA);
    let composited = engine.composite_current().unwrap();
    for y in 0..HEIGHT {
        assert_eq!(composited.pixel(0, y).unwrap(), painted);
        assert_eq!(composited.pixel(1, y).unwrap(), [0, 0, 0, 255]);
    }

    // Track: the stream delivers frames 0..TOTAL_FRAMES and the frame
    // pointer follows the server's progress.
    let delivered = engine.track(FrameIndex(0)).await.unwrap();
    assert_eq!(delivered, TOTAL_FRAMES);
    assert_eq!(engine.frame(), FrameIndex(TOTAL_FRAMES - 1));
    assert_eq!(engine.tracking(), TrackingState::Idle);
    assert!(engine.has_tracked());

    let object = engine.store().by_id(id).unwrap();
    for frame in 0..TOTAL_FRAMES {
        assert!(object.output_at(FrameIndex(frame)).is_some());
    }

    // Frame 9's mask marched to column 9 % 6 = 3.
    let last = engine.composite_current().unwrap();
    assert_eq!(last.pixel(3, 0).unwrap(), painted);
    assert_eq!(last.pixel(0, 0).unwrap(), [0, 0, 0, 255]);

    // Export hands back the server blob unchanged.
    let exported = engine.export().await.unwrap();
    assert_eq!(exported, expected_export);

    // Every stream message produced a redraw at its frame.
    let mut redraw_frames = Vec::new();
    while let Ok(ev) = events_rx.try_recv() {
        if let savi::EngineEvent::Redraw { frame } = ev {
            redraw_frames.push(frame.0);
        }
    }
    let streamed: Vec<u64> = redraw_frames
        .iter()
        .copied()
        .skip_while(|&f| f == 0)
        .collect();
    assert!(streamed.ends_with(&[TOTAL_FRAMES - 1]));
}

#[tokio::test]
async fn removing_the_last_prompt_invalidates_the_frames_mask() {
    let (events_tx, _events_rx) = mpsc::unbounded_channel();
    let mut engine = Engine::new(FakeService::new(), session(), Fps { num: 24, den: 1 }, events_tx);

    engine.create_object().unwrap();
    engine
        .add_point(PointLabel::Positive, NormPoint::new(0.2, 0.3).unwrap())
        .await
        .unwrap();
    assert!(engine.store().get(0).unwrap().output_at(FrameIndex(0)).is_some());

    engine.remove_point(0, 0).await.unwrap();
    let object = engine.store().get(0).unwrap();
    assert!(object.prompts_at(FrameIndex(0)).is_none());
    assert!(object.output_at(FrameIndex(0)).is_none());
    assert!(!engine.tracking_eligible());
}

#[tokio::test]
async fn removing_one_of_two_prompts_refreshes_the_mask() {
    let (events_tx, _events_rx) = mpsc::unbounded_channel();
    let mut engine = Engine::new(FakeService::new(), session(), Fps { num: 24, den: 1 }, events_tx);

    engine.create_object().unwrap();
    engine
        .add_point(PointLabel::Positive, NormPoint::new(0.2, 0.3).unwrap())
        .await
        .unwrap();
    engine
        .add_point(PointLabel::Negative, NormPoint::new(0.8, 0.8).unwrap())
        .await
        .unwrap();

    engine.remove_point(0, 0).await.unwrap();
    let object = engine.store().get(0).unwrap();
    assert_eq!(object.prompts_at(FrameIndex(0)).unwrap().len(), 1);
    // The re-request path wrote a fresh mask for the frame.
    assert!(object.output_at(FrameIndex(0)).is_some());
    assert!(engine.tracking_eligible());
}
