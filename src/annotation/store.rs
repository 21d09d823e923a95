//! The annotation store: owns every trackable object and enforces the
//! consistency rules between prompts, outputs, and the active selection.

use crate::annotation::object::{
    ObjectId, PointLabel, PointPrompt, PromptRemoval, TrackedObject,
};
use crate::annotation::palette::ColorAllocator;
use crate::foundation::core::{FrameIndex, FrameRange, NormPoint};
use crate::foundation::error::{SaviError, SaviResult};
use crate::mask::rle::RleMask;

/// Owns the set of trackable objects, their prompts, and their per-frame
/// mask outputs.
///
/// Rules held after every operation:
/// - object ids are strictly increasing and never reassigned;
/// - no object ever carries an empty per-frame prompt list;
/// - a new object cannot be created while the newest object has no prompts
///   (unless the list is empty), and never beyond the palette cap;
/// - outputs are only written for frames inside the session's frame range;
/// - the active index always references a valid object, or nothing when the
///   list is empty.
#[derive(Clone, Debug)]
pub struct AnnotationStore {
    objects: Vec<TrackedObject>,
    active: Option<usize>,
    next_id: u32,
    colors: ColorAllocator,
    frames: FrameRange,
}

impl AnnotationStore {
    pub fn new(frames: FrameRange) -> Self {
        Self {
            objects: Vec::new(),
            active: None,
            next_id: 0,
            colors: ColorAllocator::new(),
            frames,
        }
    }

    pub fn frames(&self) -> FrameRange {
        self.frames
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn objects(&self) -> &[TrackedObject] {
        &self.objects
    }

    pub fn get(&self, index: usize) -> Option<&TrackedObject> {
        self.objects.get(index)
    }

    pub fn by_id(&self, id: ObjectId) -> Option<&TrackedObject> {
        self.objects.iter().find(|o| o.id() == id)
    }

    fn by_id_mut(&mut self, id: ObjectId) -> SaviResult<&mut TrackedObject> {
        self.objects
            .iter_mut()
            .find(|o| o.id() == id)
            .ok_or_else(|| SaviError::invariant(format!("unknown object id {}", id.0)))
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    pub fn active_object(&self) -> Option<&TrackedObject> {
        self.active.and_then(|i| self.objects.get(i))
    }

    pub fn set_active(&mut self, index: usize) -> SaviResult<()> {
        if index >= self.objects.len() {
            return Err(SaviError::invariant(format!(
                "active index {index} out of range (len {})",
                self.objects.len()
            )));
        }
        self.active = Some(index);
        Ok(())
    }

    /// Pure eligibility check for [`create_object`](Self::create_object):
    /// true when the palette has a free slot and the newest object already
    /// carries at least one prompt (or the list is empty).
    pub fn can_create_object(&self) -> bool {
        !self.colors.is_exhausted()
            && self.objects.last().is_none_or(TrackedObject::has_prompts)
    }

    /// Append a new object with the next palette color and make it active.
    ///
    /// Rejected with no state change at the palette cap, or while the most
    /// recently created object still has zero prompts.
    pub fn create_object(&mut self) -> SaviResult<ObjectId> {
        if let Some(last) = self.objects.last()
            && !last.has_prompts()
        {
            return Err(SaviError::capacity(
                "the newest object needs at least one prompt before another can be created",
            ));
        }
        let Some(color) = self.colors.allocate() else {
            return Err(SaviError::capacity(format!(
                "object cap of {} reached",
                self.colors.capacity()
            )));
        };

        let id = ObjectId(self.next_id);
        self.next_id += 1;
        self.objects.push(TrackedObject::new(id, color));
        self.active = Some(self.objects.len() - 1);
        Ok(id)
    }

    /// Delete an object by list position, returning it. Its palette color
    /// becomes available again; the active index is clamped to the last
    /// valid index (or cleared when the list empties).
    pub fn remove_object(&mut self, index: usize) -> SaviResult<TrackedObject> {
        if index >= self.objects.len() {
            return Err(SaviError::invariant(format!(
                "remove index {index} out of range (len {})",
                self.objects.len()
            )));
        }
        let removed = self.objects.remove(index);
        self.colors.release(removed.color());

        self.active = match self.active {
            _ if self.objects.is_empty() => None,
            Some(a) if a >= self.objects.len() => Some(self.objects.len() - 1),
            other => other,
        };
        Ok(removed)
    }

    /// Record a prompt for `id` on `frame`.
    pub fn add_point(
        &mut self,
        id: ObjectId,
        frame: FrameIndex,
        label: PointLabel,
        point: NormPoint,
    ) -> SaviResult<()> {
        let range = self.frames;
        if !range.contains(frame) {
            return Err(SaviError::invariant(format!(
                "frame {} outside session range 0..{}",
                frame.0, range.end.0
            )));
        }
        self.by_id_mut(id)?
            .add_prompt(frame, PointPrompt { label, point });
        Ok(())
    }

    /// Remove the prompt (label and point together) at `point_index` on
    /// `frame`. When this empties the frame, its input entry and stale mask
    /// output are both deleted; otherwise the caller must re-request a mask
    /// for the frame.
    pub fn remove_point(
        &mut self,
        id: ObjectId,
        frame: FrameIndex,
        point_index: usize,
    ) -> SaviResult<PromptRemoval> {
        self.by_id_mut(id)?.remove_prompt(frame, point_index)
    }

    /// Write a decoded-ready mask output for `(id, frame)`. Last write wins.
    pub fn set_output(&mut self, id: ObjectId, frame: FrameIndex, mask: RleMask) -> SaviResult<()> {
        let range = self.frames;
        if !range.contains(frame) {
            return Err(SaviError::invariant(format!(
                "output frame {} outside session range 0..{}",
                frame.0, range.end.0
            )));
        }
        self.by_id_mut(id)?.set_output(frame, mask);
        Ok(())
    }

    pub fn clear_output(&mut self, id: ObjectId, frame: FrameIndex) -> SaviResult<()> {
        self.by_id_mut(id)?.clear_output(frame);
        Ok(())
    }

    /// True when any object carries any prompt anywhere; gates the track
    /// action.
    pub fn has_prompts(&self) -> bool {
        self.objects.iter().any(TrackedObject::has_prompts)
    }
}
