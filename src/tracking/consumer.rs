//! Drives a propagation byte stream to completion.

use futures::StreamExt;

use crate::foundation::error::SaviResult;
use crate::session::client::MaskStream;
use crate::session::protocol::FrameResult;
use crate::tracking::parser::FrameStreamParser;

/// Lifecycle of one tracking run.
///
/// `Idle -> Requesting -> Streaming -> (Idle | Failed)`. While a run is
/// active the engine rejects conflicting annotation edits and forces
/// tracking eligibility off. There is no mid-stream cancellation: a run
/// ends at stream completion or transport error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TrackingState {
    #[default]
    Idle,
    Requesting,
    Streaming,
    Failed,
}

impl TrackingState {
    pub fn is_active(self) -> bool {
        matches!(self, Self::Requesting | Self::Streaming)
    }
}

/// Await chunks until the stream ends, handing every completed message to
/// `on_frame` as soon as it can be parsed. Returns the number of messages
/// delivered; a transport error aborts the run (messages already delivered
/// stay applied).
pub async fn drive_stream(
    mut stream: MaskStream,
    mut on_frame: impl FnMut(FrameResult),
) -> SaviResult<u64> {
    let mut parser = FrameStreamParser::new();
    let mut delivered = 0u64;
    while let Some(chunk) = stream.next().await {
        for frame in parser.push(&chunk?) {
            on_frame(frame);
            delivered += 1;
        }
    }
    parser.finish();
    Ok(delivered)
}
