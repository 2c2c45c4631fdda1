//! Pure functions for block edits, testable without a session or audio backend.

use reel_transport::{Block, BlockId};

use crate::error::EditError;
use crate::time::TimeContext;

/// Shortest duration a drag, resize or typed edit may leave a block with.
pub const MIN_BLOCK_SECS: f64 = 1.0;

/// Split `block` at `time` into `[start, time)` and `[time, end)`.
///
/// The first part keeps the block's id; the second gets a fresh one. Every
/// other field is shared.
pub fn split_at(block: &Block, time: f64) -> Result<(Block, Block), EditError> {
    if !(block.start_time < time && time < block.end_time()) {
        return Err(EditError::PlayheadOutsideBlock {
            block: block.id.clone(),
            time,
        });
    }

    let end = block.end_time();

    let mut first = block.clone();
    first.duration = time - block.start_time;

    let mut second = block.clone();
    second.id = BlockId::generate();
    second.start_time = time;
    second.duration = end - time;

    Ok((first, second))
}

/// Blocks on the selected block's track that touch or overlap it.
///
/// Only direct neighbours count; a chain of touching blocks is not followed.
pub fn merge_candidates<'a>(selected: &Block, blocks: &'a [Block]) -> Vec<&'a Block> {
    blocks
        .iter()
        .filter(|b| b.id != selected.id && b.track_id == selected.track_id)
        .filter(|b| b.touches(selected))
        .collect()
}

/// Merge `selected` with its touching neighbours into one block spanning all
/// of them. The result keeps the selected block's id and non-temporal fields.
///
/// Returns the merged block and the ids of the absorbed blocks.
pub fn merge_adjacent(selected: &Block, blocks: &[Block]) -> Result<(Block, Vec<BlockId>), EditError> {
    let neighbours = merge_candidates(selected, blocks);
    if neighbours.is_empty() {
        return Err(EditError::NothingToMerge(selected.id.clone()));
    }

    let start = neighbours
        .iter()
        .map(|b| b.start_time)
        .fold(selected.start_time, f64::min);
    let end = neighbours
        .iter()
        .map(|b| b.end_time())
        .fold(selected.end_time(), f64::max);

    let mut merged = selected.clone();
    merged.start_time = start;
    merged.duration = end - start;

    let absorbed = neighbours.into_iter().map(|b| b.id.clone()).collect();
    Ok((merged, absorbed))
}

/// A copy of `source` under a new id, starting at `at`.
pub fn paste_copy(source: &Block, at: f64) -> Block {
    let mut copy = source.clone();
    copy.id = BlockId::generate();
    copy.start_time = at.max(0.0);
    copy
}

pub fn clamp_start(start: f64) -> f64 {
    start.max(0.0)
}

pub fn clamp_duration(duration: f64) -> f64 {
    duration.max(MIN_BLOCK_SECS)
}

/// New `(start, duration)` for moving the start edge to `target_start` while
/// the end stays at `end`.
pub fn resize_start(end: f64, target_start: f64) -> (f64, f64) {
    let start = clamp_start(target_start.min(end - MIN_BLOCK_SECS));
    (start, clamp_duration(end - start))
}

/// New duration for moving the end edge to `target_end`.
pub fn resize_end(start: f64, target_end: f64) -> f64 {
    clamp_duration(target_end - start)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragMode {
    Move,
    ResizeStart,
    ResizeEnd,
}

/// A pointer drag on one block.
///
/// Targets are always derived from the pointer position relative to where the
/// drag began, never accumulated from previous moves, so dropped or repeated
/// pointer events cannot make the block drift.
#[derive(Debug, Clone, PartialEq)]
pub struct DragSession {
    pub block_id: BlockId,
    pub mode: DragMode,
    origin_x: f64,
    origin_start: f64,
    origin_duration: f64,
}

impl DragSession {
    pub fn new(block: &Block, mode: DragMode, pointer_x: f64) -> Self {
        Self {
            block_id: block.id.clone(),
            mode,
            origin_x: pointer_x,
            origin_start: block.start_time,
            origin_duration: block.duration,
        }
    }

    /// `(start, duration)` the block should have with the pointer at `pointer_x`.
    pub fn target(&self, pointer_x: f64, ctx: &TimeContext) -> (f64, f64) {
        let delta = ctx.pixels_to_seconds(pointer_x - self.origin_x);
        let origin_end = self.origin_start + self.origin_duration;

        match self.mode {
            DragMode::Move => (
                clamp_start(ctx.snap(self.origin_start + delta)),
                self.origin_duration,
            ),
            DragMode::ResizeStart => resize_start(origin_end, ctx.snap(self.origin_start + delta)),
            DragMode::ResizeEnd => (
                self.origin_start,
                resize_end(self.origin_start, ctx.snap(origin_end + delta)),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_transport::TrackId;

    fn make_block(id: &str, track: &str, start: f64, duration: f64) -> Block {
        Block::new(BlockId::new(id), TrackId::new(track), id, start, duration)
            .with_media(format!("{id}.mp3"))
            .with_language("Hindi")
            .with_gain(70)
    }

    /// 10 px per second, no snapping.
    fn ctx() -> TimeContext {
        TimeContext::new(10.0, false)
    }

    #[test]
    fn test_split_inside_block() {
        // X: [10, 30), playhead at 15 -> [10, 15) and [15, 30)
        let block = make_block("x", "dialogue", 10.0, 20.0);

        let (first, second) = split_at(&block, 15.0).expect("split");

        assert_eq!((first.start_time, first.duration), (10.0, 5.0));
        assert_eq!((second.start_time, second.duration), (15.0, 15.0));
        assert_eq!(first.id, block.id);
        assert_ne!(second.id, block.id);
        assert_eq!(second.media_reference, block.media_reference);
        assert_eq!(second.language, block.language);
        assert_eq!(second.gain, block.gain);
    }

    #[test]
    fn test_split_rejects_playhead_on_or_outside_edges() {
        let block = make_block("x", "dialogue", 10.0, 20.0);

        for time in [10.0, 30.0, 5.0, 31.0] {
            assert!(
                matches!(split_at(&block, time), Err(EditError::PlayheadOutsideBlock { .. })),
                "split at {time} should be rejected"
            );
        }
    }

    #[test]
    fn test_merge_adjacent_pair() {
        // [0, 10) and [10, 25), merge from the first -> [0, 25)
        let blocks = vec![
            make_block("a", "dialogue", 0.0, 10.0),
            make_block("b", "dialogue", 10.0, 15.0),
        ];

        let (merged, absorbed) = merge_adjacent(&blocks[0], &blocks).expect("merge");

        assert_eq!((merged.start_time, merged.duration), (0.0, 25.0));
        assert_eq!(merged.id, BlockId::new("a"));
        assert_eq!(absorbed, vec![BlockId::new("b")]);
    }

    #[test]
    fn test_merge_ignores_other_tracks_and_gaps() {
        let blocks = vec![
            make_block("a", "dialogue", 0.0, 10.0),
            make_block("music", "music", 10.0, 15.0),
            make_block("far", "dialogue", 10.5, 2.0),
        ];

        assert_eq!(
            merge_adjacent(&blocks[0], &blocks),
            Err(EditError::NothingToMerge(BlockId::new("a")))
        );
    }

    #[test]
    fn test_merge_is_not_transitive() {
        // a touches b, b touches c; merging from a only absorbs b
        let blocks = vec![
            make_block("a", "dialogue", 0.0, 10.0),
            make_block("b", "dialogue", 10.0, 10.0),
            make_block("c", "dialogue", 20.0, 10.0),
        ];

        let (merged, absorbed) = merge_adjacent(&blocks[0], &blocks).expect("merge");

        assert_eq!(merged.end_time(), 20.0);
        assert_eq!(absorbed, vec![BlockId::new("b")]);
    }

    #[test]
    fn test_merge_overlapping_block_on_both_sides() {
        let blocks = vec![
            make_block("mid", "narration", 10.0, 10.0),
            make_block("left", "narration", 5.0, 6.0),
            make_block("right", "narration", 18.0, 7.0),
        ];

        let (merged, absorbed) = merge_adjacent(&blocks[0], &blocks).expect("merge");

        assert_eq!((merged.start_time, merged.end_time()), (5.0, 25.0));
        assert_eq!(absorbed.len(), 2);
    }

    #[test]
    fn test_split_then_merge_restores_span() {
        for (start, duration, at) in [(10.0, 20.0, 15.0), (0.0, 7.5, 0.1), (3.25, 100.0, 99.0)] {
            let block = make_block("x", "dialogue", start, duration);
            let (first, second) = split_at(&block, at).expect("split");
            let blocks = vec![first.clone(), second.clone()];

            let (from_second, _) = merge_adjacent(&second, &blocks).expect("merge");
            let (from_first, _) = merge_adjacent(&first, &blocks).expect("merge");

            for merged in [from_second, from_first] {
                assert_eq!(merged.start_time, block.start_time);
                assert!((merged.end_time() - block.end_time()).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_paste_copy_gets_new_id_at_playhead() {
        let source = make_block("a", "effects", 4.0, 2.0);
        let copy = paste_copy(&source, 42.5);

        assert_ne!(copy.id, source.id);
        assert_eq!(copy.start_time, 42.5);
        assert_eq!(copy.duration, 2.0);
        assert_eq!(copy.track_id, source.track_id);
    }

    #[test]
    fn test_drag_move_converts_pixels_and_floors_at_zero() {
        let block = make_block("a", "dialogue", 20.0, 30.0);
        let drag = DragSession::new(&block, DragMode::Move, 200.0);

        assert_eq!(drag.target(250.0, &ctx()), (25.0, 30.0));
        assert_eq!(drag.target(-1000.0, &ctx()), (0.0, 30.0));
    }

    #[test]
    fn test_drag_move_respects_zoom_and_snap() {
        let block = make_block("a", "dialogue", 20.0, 30.0);
        let drag = DragSession::new(&block, DragMode::Move, 0.0);
        let mut ctx = TimeContext::new(10.0, true);
        ctx.set_zoom(2.0);

        // 47 px at 20 px/s is 2.35 s, snapped to 22
        assert_eq!(drag.target(47.0, &ctx), (22.0, 30.0));
    }

    #[test]
    fn test_drag_targets_do_not_accumulate() {
        let block = make_block("a", "dialogue", 20.0, 30.0);
        let drag = DragSession::new(&block, DragMode::Move, 0.0);

        let first = drag.target(50.0, &ctx());
        let _ = drag.target(80.0, &ctx());
        assert_eq!(drag.target(50.0, &ctx()), first);
    }

    #[test]
    fn test_resize_start_keeps_end_fixed() {
        // [20, 50), start edge to 45 -> start 45, duration 5
        let block = make_block("a", "dialogue", 20.0, 30.0);
        let drag = DragSession::new(&block, DragMode::ResizeStart, 200.0);

        assert_eq!(drag.target(450.0, &ctx()), (45.0, 5.0));
        // Past 49 the duration clamps to 1
        assert_eq!(drag.target(495.0, &ctx()), (49.0, 1.0));
        assert_eq!(drag.target(900.0, &ctx()), (49.0, 1.0));
        // Never before 0
        assert_eq!(drag.target(-500.0, &ctx()), (0.0, 50.0));
    }

    #[test]
    fn test_resize_end_floors_duration() {
        let block = make_block("a", "dialogue", 20.0, 30.0);
        let drag = DragSession::new(&block, DragMode::ResizeEnd, 500.0);

        assert_eq!(drag.target(600.0, &ctx()), (20.0, 40.0));
        assert_eq!(drag.target(0.0, &ctx()), (20.0, 1.0));
    }

    #[test]
    fn test_drag_and_resize_bounds_hold_everywhere() {
        let block = make_block("a", "dialogue", 3.0, 2.5);
        let mut snapping = TimeContext::new(7.0, true);
        snapping.set_zoom(0.5);

        for mode in [DragMode::Move, DragMode::ResizeStart, DragMode::ResizeEnd] {
            let drag = DragSession::new(&block, mode, 100.0);
            for ctx in [ctx(), snapping] {
                for px in (-2000..2000).step_by(37) {
                    let (start, duration) = drag.target(px as f64, &ctx);
                    assert!(start >= 0.0, "{mode:?} at {px}px gave start {start}");
                    assert!(duration >= MIN_BLOCK_SECS, "{mode:?} at {px}px gave duration {duration}");
                }
            }
        }
    }
}
