//! HTTP client for the remote segmentation service.

use std::time::Duration;

use futures::TryStreamExt;
use futures::stream::BoxStream;
use tracing::{debug, info, instrument};

use crate::foundation::core::{Fps, FrameIndex};
use crate::foundation::error::{SaviError, SaviResult};
use crate::session::frames::decode_base64_jpeg;
use crate::session::protocol::{
    AddPointsRequest, AddPointsResponse, CreateSessionRequest, CreateSessionResponse, PromptMask,
    PropagateRequest,
};
use crate::session::{Session, SessionId};

/// Raw chunked bytes of a streamed propagation response. Chunk boundaries
/// are arbitrary; [`crate::FrameStreamParser`] reassembles messages.
pub type MaskStream = BoxStream<'static, SaviResult<bytes::Bytes>>;

/// The seam between the engine and the remote service. The engine only ever
/// talks through this trait, so tests drive it with an in-process fake.
pub trait SegmentationService {
    /// Submit the full prompt set for one object on one frame; returns one
    /// mask per affected object.
    fn add_points(
        &self,
        req: &AddPointsRequest,
    ) -> impl Future<Output = SaviResult<Vec<PromptMask>>>;

    /// Start propagation from `start` and return the raw response byte
    /// stream.
    fn propagate(
        &self,
        session: &SessionId,
        start: FrameIndex,
    ) -> impl Future<Output = SaviResult<MaskStream>>;

    /// Fetch the server's mask export for the session, verbatim.
    fn export_masks(
        &self,
        session: &SessionId,
    ) -> impl Future<Output = SaviResult<serde_json::Value>>;
}

/// Connection settings for the service. Deployments conventionally serve
/// 240 frames at 24 fps; fps is configuration here and the frame total
/// always comes from the session response.
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub base_url: String,
    pub fps: Fps,
    pub connect_timeout: Duration,
    /// Applied to non-streaming requests only; the propagation stream runs
    /// until the server closes it.
    pub request_timeout: Duration,
}

impl ServiceConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            fps: Fps { num: 24, den: 1 },
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(120),
        }
    }
}

/// Client for one segmentation service deployment.
pub struct SessionClient {
    http: reqwest::Client,
    config: ServiceConfig,
}

impl SessionClient {
    pub fn new(config: ServiceConfig) -> SaviResult<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .tcp_nodelay(true)
            .build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Bootstrap a session: upload the video link, receive the session id
    /// and every frame as base64 JPEG, and decode them into frame buffers.
    #[instrument(skip(self))]
    pub async fn create_session(&self, s3_link: &str) -> SaviResult<Session> {
        let resp: CreateSessionResponse = self
            .http
            .post(self.url("create_session/"))
            .timeout(self.config.request_timeout)
            .json(&CreateSessionRequest {
                s3_link: s3_link.to_string(),
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let frames = resp
            .frames
            .iter()
            .map(|f| decode_base64_jpeg(f))
            .collect::<SaviResult<Vec<_>>>()?;
        let canvas = frames
            .first()
            .map(|f| f.canvas())
            .ok_or_else(|| SaviError::protocol("session returned no frames"))?;
        if frames.iter().any(|f| f.canvas() != canvas) {
            return Err(SaviError::protocol("session frames differ in size"));
        }

        info!(
            session = %resp.session_id,
            frames = frames.len(),
            width = canvas.width,
            height = canvas.height,
            "session created"
        );
        Ok(Session {
            id: SessionId(resp.session_id),
            frames,
            canvas,
        })
    }
}

impl SegmentationService for SessionClient {
    async fn add_points(&self, req: &AddPointsRequest) -> SaviResult<Vec<PromptMask>> {
        debug!(
            object = req.object_id,
            frame = req.frame_index,
            points = req.points.len(),
            "submitting prompts"
        );
        let resp: AddPointsResponse = self
            .http
            .post(self.url("add_new_points/"))
            .timeout(self.config.request_timeout)
            .json(req)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(resp.add_points.rle_mask_list)
    }

    async fn propagate(&self, session: &SessionId, start: FrameIndex) -> SaviResult<MaskStream> {
        info!(session = %session, start = start.0, "starting propagation stream");
        let resp = self
            .http
            .post(self.url("propagate_in_video/"))
            .json(&PropagateRequest {
                session_id: session.0.clone(),
                start_frame_index: start.0,
            })
            .send()
            .await?
            .error_for_status()?;
        Ok(Box::pin(resp.bytes_stream().map_err(SaviError::from)))
    }

    async fn export_masks(&self, session: &SessionId) -> SaviResult<serde_json::Value> {
        let blob = self
            .http
            .get(self.url(&format!("masks/{session}")))
            .timeout(self.config.request_timeout)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(blob)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_join_without_double_slashes() {
        let client = SessionClient::new(ServiceConfig::new("http://host:8000/")).unwrap();
        assert_eq!(client.url("create_session/"), "http://host:8000/create_session/");
        assert_eq!(client.url("masks/abc"), "http://host:8000/masks/abc");
    }

    #[test]
    fn config_defaults_to_24_fps() {
        let config = ServiceConfig::new("http://host:8000");
        assert_eq!(config.fps, Fps { num: 24, den: 1 });
    }
}
