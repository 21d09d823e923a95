//! The owning actor for all annotation, playback, and tracking state.
//!
//! Every mutation funnels through `&mut Engine`, and [`Engine::run`]
//! processes queued [`Command`]s one at a time, so the three call sites that
//! touch the store (user edits, prompt responses, the tracking stream) are
//! serialized instead of racing. When a prompt response and a streamed
//! tracking update target the same `(object, frame)` pair, whichever command
//! completes later overwrites the earlier mask: last write wins, by
//! construction rather than by accident.

use std::time::Instant;

use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use crate::annotation::object::{ObjectId, PointLabel, PromptRemoval};
use crate::annotation::store::AnnotationStore;
use crate::foundation::core::{Fps, FrameIndex, FrameRgba, NormPoint};
use crate::foundation::error::{SaviError, SaviResult};
use crate::mask::composite::{MASK_ALPHA, composite_mask};
use crate::playback::scheduler::{FrameCadence, PlaybackState, REFRESH_INTERVAL};
use crate::playback::timeline::{click_to_frame, format_timecode};
use crate::session::Session;
use crate::session::client::SegmentationService;
use crate::session::protocol::{AddPointsRequest, FrameResult, PromptMask};
use crate::tracking::consumer::{TrackingState, drive_stream};

/// Requests accepted by [`Engine::run`]. Each maps 1:1 onto an engine
/// method; rejected commands are logged, not fatal.
#[derive(Debug)]
pub enum Command {
    CreateObject,
    RemoveObject {
        index: usize,
    },
    SelectObject {
        index: usize,
    },
    AddPoint {
        label: PointLabel,
        point: NormPoint,
    },
    RemovePoint {
        object_index: usize,
        point_index: usize,
    },
    Play,
    Pause,
    Seek {
        x_px: f64,
        width_px: f64,
    },
    Track {
        start: FrameIndex,
    },
    Export {
        reply: oneshot::Sender<SaviResult<serde_json::Value>>,
    },
}

/// Notifications out of the engine. Redraw consumers pull
/// [`Engine::composite_frame`] for pixels, so the frame pointer is read at
/// draw time rather than captured earlier; redraws stay idempotent and
/// order-independent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineEvent {
    Redraw { frame: FrameIndex },
    Timeline { frame: FrameIndex, timecode: String },
}

pub struct Engine<S> {
    service: S,
    session: Session,
    store: AnnotationStore,
    fps: Fps,
    /// The single global frame pointer: playback, seeking, and streaming
    /// progress all move this one value.
    frame: FrameIndex,
    playback: PlaybackState,
    cadence: FrameCadence,
    tracking: TrackingState,
    has_tracked: bool,
    events: mpsc::UnboundedSender<EngineEvent>,
}

impl<S: SegmentationService> Engine<S> {
    pub fn new(
        service: S,
        session: Session,
        fps: Fps,
        events: mpsc::UnboundedSender<EngineEvent>,
    ) -> Self {
        let store = AnnotationStore::new(session.frame_range());
        Self {
            service,
            session,
            store,
            fps,
            frame: FrameIndex(0),
            playback: PlaybackState::Stopped,
            cadence: FrameCadence::for_fps(fps),
            tracking: TrackingState::Idle,
            has_tracked: false,
            events,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn store(&self) -> &AnnotationStore {
        &self.store
    }

    pub fn frame(&self) -> FrameIndex {
        self.frame
    }

    pub fn total_frames(&self) -> u64 {
        self.session.total_frames()
    }

    pub fn playback(&self) -> PlaybackState {
        self.playback
    }

    pub fn tracking(&self) -> TrackingState {
        self.tracking
    }

    pub fn has_tracked(&self) -> bool {
        self.has_tracked
    }

    /// True when the track action may start: at least one prompt exists
    /// somewhere and no run is active.
    pub fn tracking_eligible(&self) -> bool {
        self.store.has_prompts() && !self.tracking.is_active()
    }

    pub fn can_create_object(&self) -> bool {
        !self.tracking.is_active() && self.store.can_create_object()
    }

    pub fn can_export(&self) -> bool {
        self.has_tracked && !self.tracking.is_active()
    }

    fn ensure_not_tracking(&self, what: &str) -> SaviResult<()> {
        if self.tracking.is_active() {
            return Err(SaviError::busy(format!("cannot {what} while tracking")));
        }
        Ok(())
    }

    pub fn create_object(&mut self) -> SaviResult<ObjectId> {
        self.ensure_not_tracking("create an object")?;
        self.store.create_object()
    }

    pub fn remove_object(&mut self, index: usize) -> SaviResult<()> {
        self.ensure_not_tracking("remove an object")?;
        self.store.remove_object(index)?;
        self.emit_redraw();
        Ok(())
    }

    pub fn select_object(&mut self, index: usize) -> SaviResult<()> {
        self.ensure_not_tracking("switch objects")?;
        self.store.set_active(index)
    }

    /// Record a prompt on the active object at the current frame, submit
    /// the frame's full prompt set to the service, and write every returned
    /// mask.
    ///
    /// On transport failure the prompt stays recorded and the error is
    /// reported; no flag is left stuck.
    pub async fn add_point(&mut self, label: PointLabel, point: NormPoint) -> SaviResult<()> {
        self.ensure_not_tracking("add prompts")?;
        let id = self
            .store
            .active_object()
            .ok_or_else(|| SaviError::invariant("no active object to prompt"))?
            .id();
        let frame = self.frame;
        self.store.add_point(id, frame, label, point)?;

        let req = self.prompt_request(id, frame, false)?;
        let masks = self.service.add_points(&req).await?;
        self.apply_prompt_masks(frame, masks);
        self.emit_redraw();
        Ok(())
    }

    /// Remove a prompt (label and point together) from an object at the
    /// current frame. Emptying the frame invalidates its mask output;
    /// otherwise the shrunken prompt set is re-submitted with the object's
    /// server-side state reset, and the fresh masks replace the stale ones.
    pub async fn remove_point(&mut self, object_index: usize, point_index: usize) -> SaviResult<()> {
        self.ensure_not_tracking("remove prompts")?;
        let id = self
            .store
            .get(object_index)
            .ok_or_else(|| {
                SaviError::invariant(format!("object index {object_index} out of range"))
            })?
            .id();
        let frame = self.frame;

        match self.store.remove_point(id, frame, point_index)? {
            PromptRemoval::FrameCleared => {}
            PromptRemoval::PromptsRemain => {
                let req = self.prompt_request(id, frame, true)?;
                let masks = self.service.add_points(&req).await?;
                self.apply_prompt_masks(frame, masks);
            }
        }
        self.emit_redraw();
        Ok(())
    }

    fn prompt_request(
        &self,
        id: ObjectId,
        frame: FrameIndex,
        reset_state: bool,
    ) -> SaviResult<AddPointsRequest> {
        let object = self
            .store
            .by_id(id)
            .ok_or_else(|| SaviError::invariant(format!("unknown object id {}", id.0)))?;
        Ok(AddPointsRequest {
            session_id: self.session.id.0.clone(),
            frame_index: frame.0,
            object_id: id.0,
            labels: object.labels_at(frame),
            points: object.points_at(frame),
            clear_old_points: true,
            reset_state,
        })
    }

    /// Write prompt-response masks by object id. An id the store does not
    /// know (e.g. the object was deleted while the request was in flight)
    /// is logged and skipped.
    fn apply_prompt_masks(&mut self, frame: FrameIndex, masks: Vec<PromptMask>) {
        for m in masks {
            if let Err(e) = self.store.set_output(ObjectId(m.object_id), frame, m.rle_mask) {
                warn!(object = m.object_id, frame = frame.0, error = %e, "dropping prompt mask");
            }
        }
    }

    pub fn play(&mut self) -> SaviResult<()> {
        self.ensure_not_tracking("play")?;
        self.cadence.reset();
        self.playback = PlaybackState::Playing;
        Ok(())
    }

    /// Cooperative stop: the flag is consulted at the top of the next tick;
    /// nothing in flight is interrupted.
    pub fn pause(&mut self) {
        self.playback = PlaybackState::Stopped;
    }

    /// One playback tick. Does nothing unless playing and the frame
    /// interval has elapsed; otherwise redraws the current frame and
    /// advances the pointer by one, wrapping to 0 so playback loops.
    /// Returns whether a frame was advanced.
    pub fn tick(&mut self, now: Instant) -> bool {
        if !self.playback.is_playing() {
            return false;
        }
        if !self.cadence.should_advance(now) {
            return false;
        }
        self.emit_redraw();
        let total = self.total_frames().max(1);
        self.frame = FrameIndex((self.frame.0 + 1) % total);
        true
    }

    /// Seek from a timeline click: set the frame pointer and force an
    /// immediate redraw, bypassing the playback cadence gate.
    pub fn seek(&mut self, x_px: f64, width_px: f64) -> SaviResult<FrameIndex> {
        self.ensure_not_tracking("seek")?;
        let frame = click_to_frame(x_px, width_px, self.total_frames());
        self.seek_to(frame);
        Ok(frame)
    }

    pub fn seek_to(&mut self, frame: FrameIndex) {
        self.frame = self.session.frame_range().clamp(frame);
        self.emit_redraw();
    }

    /// Run a full tracking pass: request propagation from `start`, then
    /// consume the streamed response message by message, writing every
    /// result mask and advancing the frame pointer to the server-reported
    /// frame so the display follows progress.
    ///
    /// While the run is active, tracking eligibility is off and conflicting
    /// edits are rejected. Stream completion returns to `Idle` and marks
    /// the session as tracked; transport failure lands in `Failed` with the
    /// UI re-enabled and no successful-track mark.
    pub async fn track(&mut self, start: FrameIndex) -> SaviResult<u64> {
        self.ensure_not_tracking("start tracking")?;
        if !self.store.has_prompts() {
            return Err(SaviError::capacity(
                "tracking requires at least one prompt",
            ));
        }

        self.tracking = TrackingState::Requesting;
        self.playback = PlaybackState::Stopped;
        self.frame = self.session.frame_range().clamp(start);

        let stream = match self.service.propagate(&self.session.id, start).await {
            Ok(stream) => stream,
            Err(e) => {
                self.tracking = TrackingState::Failed;
                return Err(e);
            }
        };

        self.tracking = TrackingState::Streaming;
        let outcome = drive_stream(stream, |frame| self.apply_stream_frame(frame)).await;
        match outcome {
            Ok(delivered) => {
                self.tracking = TrackingState::Idle;
                self.has_tracked = true;
                info!(frames = delivered, "tracking stream complete");
                Ok(delivered)
            }
            Err(e) => {
                self.tracking = TrackingState::Failed;
                Err(e)
            }
        }
    }

    /// Apply one streamed frame message: write every result mask, then move
    /// the frame pointer to the reported frame, so the pointer driving
    /// compositing and the consumer's reported progress stay identical.
    fn apply_stream_frame(&mut self, result: FrameResult) {
        let frame = FrameIndex(result.frame_index);
        if !self.session.frame_range().contains(frame) {
            warn!(frame = frame.0, "dropping result for out-of-range frame");
            return;
        }
        for r in result.results {
            if let Err(e) = self.store.set_output(ObjectId(r.object_id), frame, r.mask) {
                warn!(object = r.object_id, frame = frame.0, error = %e, "dropping stream mask");
            }
        }
        self.frame = frame;
        self.emit_redraw();
    }

    /// Fetch the server's mask export verbatim. Available once a tracking
    /// run has completed and none is active.
    pub async fn export(&self) -> SaviResult<serde_json::Value> {
        self.ensure_not_tracking("export")?;
        if !self.has_tracked {
            return Err(SaviError::capacity("nothing tracked yet; nothing to export"));
        }
        self.service.export_masks(&self.session.id).await
    }

    /// Composite one frame: the base video frame with every object's mask
    /// for that frame painted over it in the object's palette color.
    pub fn composite_frame(&self, frame: FrameIndex) -> SaviResult<FrameRgba> {
        let base = self.session.frame(frame).ok_or_else(|| {
            SaviError::invariant(format!("frame {} outside session", frame.0))
        })?;
        let mut out = base.clone();
        for object in self.store.objects() {
            if let Some(rle) = object.output_at(frame) {
                let mask = rle.decode()?;
                composite_mask(&mut out, &mask, object.color().rgba(), MASK_ALPHA)?;
            }
        }
        Ok(out)
    }

    pub fn composite_current(&self) -> SaviResult<FrameRgba> {
        self.composite_frame(self.frame)
    }

    fn emit_redraw(&self) {
        let _ = self.events.send(EngineEvent::Redraw { frame: self.frame });
        let _ = self.events.send(EngineEvent::Timeline {
            frame: self.frame,
            timecode: format_timecode(self.frame, self.fps),
        });
    }

    /// The actor loop: commands are processed strictly one at a time, and a
    /// display-refresh interval drives playback ticks between them. Returns
    /// when the command channel closes.
    pub async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        let mut refresh = tokio::time::interval(REFRESH_INTERVAL);
        refresh.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(cmd) => self.handle(cmd).await,
                    None => break,
                },
                _ = refresh.tick() => {
                    self.tick(Instant::now());
                }
            }
        }
    }

    async fn handle(&mut self, cmd: Command) {
        let outcome = match cmd {
            Command::CreateObject => self.create_object().map(drop),
            Command::RemoveObject { index } => self.remove_object(index),
            Command::SelectObject { index } => self.select_object(index),
            Command::AddPoint { label, point } => self.add_point(label, point).await,
            Command::RemovePoint {
                object_index,
                point_index,
            } => self.remove_point(object_index, point_index).await,
            Command::Play => self.play(),
            Command::Pause => {
                self.pause();
                Ok(())
            }
            Command::Seek { x_px, width_px } => self.seek(x_px, width_px).map(drop),
            Command::Track { start } => self.track(start).await.map(drop),
            Command::Export { reply } => {
                let _ = reply.send(self.export().await);
                Ok(())
            }
        };
        if let Err(e) = outcome {
            warn!(error = %e, "command rejected");
        }
    }
}
