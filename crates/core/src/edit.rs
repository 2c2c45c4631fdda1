//! Editing operations on a session: selection, split, merge, copy/paste,
//! delete, pointer drags and typed field edits.
//!
//! Every operation either applies completely (then saves, reconciles playback
//! and notifies) or is rejected with an `EditError` and a notice, leaving the
//! timeline untouched.

use reel_project::seed_blocks;
use reel_transport::{Block, BlockId, BlockStatus, MAX_GAIN};
use tracing::info;

use crate::clip_ops::{self, DragMode, DragSession};
use crate::error::EditError;
use crate::events::Notice;
use crate::session::Session;

impl Session {
    pub fn select(&mut self, id: &BlockId) -> Result<(), EditError> {
        let result = match self.timeline.block(id) {
            Some(_) => Ok(()),
            None => Err(EditError::UnknownBlock(id.clone())),
        };
        self.surfaced(result)?;
        self.set_selection(Some(id.clone()));
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.set_selection(None);
    }

    /// Split the selected block at the playhead. Selection moves to the
    /// second part, whose id is returned.
    pub fn split(&mut self) -> Result<BlockId, EditError> {
        let result = self
            .editable_selection()
            .and_then(|block| clip_ops::split_at(&block, self.current_time()).map(|parts| (block, parts)));
        let (block, (first, second)) = self.surfaced(result)?;

        let second_id = second.id.clone();
        info!(block = %block.id, at = self.current_time(), "split block");
        self.timeline.replace_block(&block.id, vec![first, second]);
        self.blocks_changed();
        self.set_selection(Some(second_id.clone()));
        Ok(second_id)
    }

    /// Merge the selected block with every block on its track that touches
    /// or overlaps it.
    pub fn merge(&mut self) -> Result<BlockId, EditError> {
        let result = self
            .editable_selection()
            .and_then(|block| clip_ops::merge_adjacent(&block, self.timeline.blocks()));
        let (merged, absorbed) = self.surfaced(result)?;

        info!(block = %merged.id, absorbed = absorbed.len(), "merged blocks");
        for id in &absorbed {
            self.retire(id);
            if self.clipboard.as_ref() == Some(id) {
                self.clipboard = None;
            }
        }
        self.timeline.remove_blocks(&absorbed);
        let id = merged.id.clone();
        self.timeline.replace_block(&id, vec![merged]);
        self.blocks_changed();
        Ok(id)
    }

    /// Remember the selected block for a later paste.
    pub fn copy(&mut self) -> Result<(), EditError> {
        let result = self.selected_block().map(|b| b.id.clone());
        let id = self.surfaced(result)?;
        self.notify(Notice::info("Copied", format!("block {id} copied")));
        self.clipboard = Some(id);
        Ok(())
    }

    /// Paste a copy of the copied block at the playhead on the same track.
    /// The copy becomes the selection.
    pub fn paste(&mut self) -> Result<BlockId, EditError> {
        let result = self
            .clipboard
            .as_ref()
            .and_then(|id| self.timeline.block(id))
            .ok_or(EditError::ClipboardEmpty)
            .and_then(|source| {
                self.ensure_unlocked(source)?;
                Ok(clip_ops::paste_copy(source, self.current_time()))
            });
        let copy = self.surfaced(result)?;

        let id = copy.id.clone();
        info!(block = %id, at = copy.start_time, "pasted block");
        self.timeline.insert_block(copy);
        self.blocks_changed();
        self.set_selection(Some(id.clone()));
        Ok(id)
    }

    /// Remove the selected block. Its resource is stopped and released before
    /// anything else happens.
    pub fn delete(&mut self) -> Result<Block, EditError> {
        let result = self.editable_selection();
        let block = self.surfaced(result)?;

        self.retire(&block.id);
        let removed = self.timeline.remove_block(&block.id).unwrap_or(block);
        if self.clipboard.as_ref() == Some(&removed.id) {
            self.clipboard = None;
        }
        if self.drag.as_ref().is_some_and(|d| d.block_id == removed.id) {
            self.drag = None;
        }
        info!(block = %removed.id, "deleted block");
        self.blocks_changed();
        self.set_selection(None);
        Ok(removed)
    }

    /// Start a pointer drag on `id` at horizontal position `pointer_x`. The
    /// block becomes the selection.
    pub fn begin_drag(&mut self, id: &BlockId, mode: DragMode, pointer_x: f64) -> Result<(), EditError> {
        let result = self.editable_block(id);
        let block = self.surfaced(result)?;
        self.drag = Some(DragSession::new(&block, mode, pointer_x));
        self.set_selection(Some(block.id));
        Ok(())
    }

    /// Move the pointer of the current drag. Returns the block's new
    /// `(start, duration)`.
    pub fn drag_to(&mut self, pointer_x: f64) -> Result<(f64, f64), EditError> {
        let result = self.drag_target(pointer_x);
        let (id, start, duration) = self.surfaced(result)?;

        let block = self.timeline.block(&id);
        if block.is_some_and(|b| b.start_time == start && b.duration == duration) {
            return Ok((start, duration));
        }
        self.timeline.update_block(&id, |b| {
            b.start_time = start;
            b.duration = duration;
        });
        self.blocks_changed();
        Ok((start, duration))
    }

    pub fn end_drag(&mut self) -> Option<BlockId> {
        self.drag.take().map(|d| d.block_id)
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Typed start time. Floored at 0.
    pub fn set_block_start(&mut self, id: &BlockId, start: f64) -> Result<(), EditError> {
        let result = finite(start, "start time").and_then(|start| {
            self.editable_block(id)?;
            Ok(clip_ops::clamp_start(start))
        });
        let start = self.surfaced(result)?;
        self.timeline.update_block(id, |b| b.start_time = start);
        self.blocks_changed();
        Ok(())
    }

    /// Typed duration. Floored at one second.
    pub fn set_block_duration(&mut self, id: &BlockId, duration: f64) -> Result<(), EditError> {
        let result = finite(duration, "duration").and_then(|duration| {
            self.editable_block(id)?;
            Ok(clip_ops::clamp_duration(duration))
        });
        let duration = self.surfaced(result)?;
        self.timeline.update_block(id, |b| b.duration = duration);
        self.blocks_changed();
        Ok(())
    }

    pub fn set_block_title(&mut self, id: &BlockId, title: impl Into<String>) -> Result<(), EditError> {
        let title = title.into();
        self.edit_fields(id, |b| b.title = title)
    }

    pub fn set_block_language(&mut self, id: &BlockId, language: Option<String>) -> Result<(), EditError> {
        self.edit_fields(id, |b| b.language = language)
    }

    pub fn set_block_status(&mut self, id: &BlockId, status: BlockStatus) -> Result<(), EditError> {
        self.edit_fields(id, |b| b.status = status)
    }

    /// Per-block level, 0..=100.
    pub fn set_block_gain(&mut self, id: &BlockId, gain: u8) -> Result<(), EditError> {
        self.edit_fields(id, |b| b.gain = gain.min(MAX_GAIN))
    }

    /// Jump to the selected block's start and play from there.
    pub fn preview_selected(&mut self) -> Result<(), EditError> {
        let result = self.selected_block().map(|b| b.start_time);
        let start = self.surfaced(result)?;
        self.pause();
        self.seek(start);
        self.play();
        Ok(())
    }

    /// Throw away the stored timeline and start over from the seed set.
    pub fn reset_to_seed(&mut self) {
        self.pause();
        self.drag = None;
        self.clipboard = None;
        self.set_selection(None);
        self.clear_stored_blocks();
        self.timeline.set_blocks(seed_blocks());
        self.apply_block_change(false);
        self.seek(0.0);
        info!("timeline reset to seed set");
    }

    fn edit_fields<F>(&mut self, id: &BlockId, f: F) -> Result<(), EditError>
    where
        F: FnOnce(&mut Block),
    {
        let result = self
            .timeline
            .block(id)
            .map(|_| ())
            .ok_or_else(|| EditError::UnknownBlock(id.clone()));
        self.surfaced(result)?;
        self.timeline.update_block(id, f);
        self.blocks_changed();
        Ok(())
    }

    fn drag_target(&self, pointer_x: f64) -> Result<(BlockId, f64, f64), EditError> {
        let drag = self.drag.as_ref().ok_or(EditError::NoDrag)?;
        finite(pointer_x, "pointer position")?;
        // The track may have been locked since the drag began.
        self.editable_block(&drag.block_id)?;
        let (start, duration) = drag.target(pointer_x, &self.time);
        Ok((drag.block_id.clone(), start, duration))
    }

    pub(crate) fn selected_block(&self) -> Result<&Block, EditError> {
        let id = self.selection.as_ref().ok_or(EditError::NoSelection)?;
        self.timeline
            .block(id)
            .ok_or_else(|| EditError::UnknownBlock(id.clone()))
    }

    fn editable_selection(&self) -> Result<Block, EditError> {
        let block = self.selected_block()?;
        self.ensure_unlocked(block)?;
        Ok(block.clone())
    }

    fn editable_block(&self, id: &BlockId) -> Result<Block, EditError> {
        let block = self
            .timeline
            .block(id)
            .ok_or_else(|| EditError::UnknownBlock(id.clone()))?;
        self.ensure_unlocked(block)?;
        Ok(block.clone())
    }

    fn ensure_unlocked(&self, block: &Block) -> Result<(), EditError> {
        match self.timeline.track(&block.track_id) {
            Some(track) if track.locked => Err(EditError::TrackLocked(track.id.clone())),
            Some(_) => Ok(()),
            None => Err(EditError::UnknownTrack(block.track_id.clone())),
        }
    }
}

fn finite(value: f64, what: &str) -> Result<f64, EditError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(EditError::InvalidValue(format!("{what} must be a number")))
    }
}
