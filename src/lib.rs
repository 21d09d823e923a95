//! Savi is an interactive video object annotation and mask-streaming engine.
//!
//! A user places positive/negative point prompts on individual video frames;
//! a remote segmentation service turns those prompts into per-frame binary
//! masks and can propagate them across the whole clip. Savi owns everything
//! on the near side of that wire: the per-object annotation state and its
//! consistency rules, the run-length mask transport codec, the incremental
//! consumption of the streamed tracking response, and a frame-accurate
//! playback/seek scheduler that stays synchronized with decoded masks.
//!
//! # Pipeline overview
//!
//! 1. **Annotate**: prompts are recorded per object, per frame in the
//!    [`AnnotationStore`] and submitted to the service, which answers with an
//!    [`RleMask`] per affected object.
//! 2. **Decode**: [`RleMask::decode`] turns the column-major run-length
//!    encoding into a row-major [`BinaryMask`].
//! 3. **Composite**: [`composite_mask`] paints a decoded mask over the frame
//!    buffer with the object's palette color.
//! 4. **Track**: [`Engine::track`] drives the streamed propagation response,
//!    writing masks into the store frame-by-frame as messages complete.
//!
//! The key design constraints:
//!
//! - **No unsafe**: `unsafe` is forbidden in this crate.
//! - **Single-threaded cooperative execution**: every [`Engine`] mutation
//!   funnels through one owning actor; interleaving happens only at awaits.
//! - **Pure codec**: RLE decoding is idempotent and shares no state.
//! - **The engine never segments**: it encodes prompts, decodes results, and
//!   keeps local state consistent; inference stays on the remote service.
#![forbid(unsafe_code)]

mod annotation;
mod engine;
mod foundation;
mod mask;
mod playback;
mod session;
mod tracking;

pub use annotation::object::{ObjectId, PointLabel, PointPrompt, PromptRemoval, TrackedObject};
pub use annotation::palette::{ColorAllocator, ColorSlot, PALETTE, PaletteColor};
pub use annotation::store::AnnotationStore;
pub use engine::{Command, Engine, EngineEvent};
pub use foundation::core::{Canvas, Fps, FrameIndex, FrameRange, FrameRgba, NormPoint, Rgba8};
pub use foundation::error::{SaviError, SaviResult};
pub use mask::composite::{MASK_ALPHA, blend_px, composite_mask};
pub use mask::rle::{BinaryMask, RleMask};
pub use playback::scheduler::{FrameCadence, PlaybackState, REFRESH_INTERVAL};
pub use playback::timeline::{click_to_frame, format_timecode};
pub use session::client::{MaskStream, SegmentationService, ServiceConfig, SessionClient};
pub use session::frames::{decode_base64_jpeg, decode_frame};
pub use session::protocol::{
    AddPointsBody, AddPointsRequest, AddPointsResponse, CreateSessionRequest,
    CreateSessionResponse, FRAME_SEPARATOR, FrameResult, ObjectMask, PromptMask, PropagateRequest,
};
pub use session::{Session, SessionId};
pub use tracking::consumer::{TrackingState, drive_stream};
pub use tracking::parser::FrameStreamParser;

/// Version of savi.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
