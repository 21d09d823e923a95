//! A single trackable object: its prompts and its mask outputs.

use std::collections::BTreeMap;

use crate::annotation::palette::ColorSlot;
use crate::foundation::core::{FrameIndex, NormPoint};
use crate::foundation::error::{SaviError, SaviResult};
use crate::mask::rle::RleMask;

/// Identity of a trackable object. Ids are assigned monotonically by the
/// store and never reused, even after deletion.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct ObjectId(pub u32);

/// Whether a prompt marks the object (positive) or the background (negative).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointLabel {
    Negative,
    Positive,
}

impl PointLabel {
    /// Wire value: 0 = negative, 1 = positive.
    pub fn to_wire(self) -> u8 {
        match self {
            Self::Negative => 0,
            Self::Positive => 1,
        }
    }

    pub fn from_wire(v: u8) -> SaviResult<Self> {
        match v {
            0 => Ok(Self::Negative),
            1 => Ok(Self::Positive),
            other => Err(SaviError::protocol(format!("unknown point label {other}"))),
        }
    }
}

/// One labeled point prompt. Storing label and point together makes the
/// "labels and points lists stay equal length" rule structural instead of
/// enforced.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointPrompt {
    pub label: PointLabel,
    pub point: NormPoint,
}

/// Outcome of removing a prompt from a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PromptRemoval {
    /// The frame's last prompt was removed: its input entry is gone and any
    /// stale mask output for the frame has been invalidated.
    FrameCleared,
    /// Prompts remain on the frame; the caller must re-request a mask since
    /// the prompt set changed.
    PromptsRemain,
}

#[derive(Clone, Debug)]
pub struct TrackedObject {
    id: ObjectId,
    color: ColorSlot,
    /// Prompts per frame. An entry with zero prompts never exists: the map
    /// entry is deleted, not left empty.
    inputs: BTreeMap<FrameIndex, Vec<PointPrompt>>,
    /// One decoded-ready mask encoding per frame. May lag inputs (result
    /// pending) but never survives the frame's last input being removed.
    outputs: BTreeMap<FrameIndex, RleMask>,
}

impl TrackedObject {
    pub(crate) fn new(id: ObjectId, color: ColorSlot) -> Self {
        Self {
            id,
            color,
            inputs: BTreeMap::new(),
            outputs: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn color(&self) -> ColorSlot {
        self.color
    }

    pub fn has_prompts(&self) -> bool {
        !self.inputs.is_empty()
    }

    pub fn prompts_at(&self, frame: FrameIndex) -> Option<&[PointPrompt]> {
        self.inputs.get(&frame).map(Vec::as_slice)
    }

    /// Frames that currently carry prompts.
    pub fn input_frames(&self) -> impl Iterator<Item = FrameIndex> + '_ {
        self.inputs.keys().copied()
    }

    pub fn input_frame_count(&self) -> usize {
        self.inputs.len()
    }

    /// Parallel wire list of labels for a frame (0/1 per prompt).
    pub fn labels_at(&self, frame: FrameIndex) -> Vec<u8> {
        self.prompts_at(frame)
            .map(|ps| ps.iter().map(|p| p.label.to_wire()).collect())
            .unwrap_or_default()
    }

    /// Parallel wire list of normalized points for a frame.
    pub fn points_at(&self, frame: FrameIndex) -> Vec<[f64; 2]> {
        self.prompts_at(frame)
            .map(|ps| ps.iter().map(|p| p.point.as_array()).collect())
            .unwrap_or_default()
    }

    pub fn output_at(&self, frame: FrameIndex) -> Option<&RleMask> {
        self.outputs.get(&frame)
    }

    pub fn output_frame_count(&self) -> usize {
        self.outputs.len()
    }

    pub(crate) fn add_prompt(&mut self, frame: FrameIndex, prompt: PointPrompt) {
        self.inputs.entry(frame).or_default().push(prompt);
    }

    /// Remove the prompt at `index` on `frame`. Label and point go together.
    /// Emptying the frame deletes the input entry and invalidates the
    /// frame's mask output.
    pub(crate) fn remove_prompt(
        &mut self,
        frame: FrameIndex,
        index: usize,
    ) -> SaviResult<PromptRemoval> {
        let prompts = self.inputs.get_mut(&frame).ok_or_else(|| {
            SaviError::invariant(format!(
                "object {} has no prompts on frame {}",
                self.id.0, frame.0
            ))
        })?;
        if index >= prompts.len() {
            return Err(SaviError::invariant(format!(
                "prompt index {index} out of range for frame {} (len {})",
                frame.0,
                prompts.len()
            )));
        }
        prompts.remove(index);

        if prompts.is_empty() {
            self.inputs.remove(&frame);
            self.outputs.remove(&frame);
            return Ok(PromptRemoval::FrameCleared);
        }
        Ok(PromptRemoval::PromptsRemain)
    }

    pub(crate) fn set_output(&mut self, frame: FrameIndex, mask: RleMask) {
        self.outputs.insert(frame, mask);
    }

    pub(crate) fn clear_output(&mut self, frame: FrameIndex) {
        self.outputs.remove(&frame);
    }
}
