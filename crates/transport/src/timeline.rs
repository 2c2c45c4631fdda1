use crate::{Block, BlockId, Track, TrackId, TrackKind, effective_gain};

/// `totalDuration` is rounded up to a multiple of this many seconds.
pub const DURATION_GRID_SECS: f64 = 10.0;

/// `totalDuration` never drops below this, even for an empty timeline.
pub const MIN_TOTAL_DURATION_SECS: f64 = 180.0;

/// Furthest block end, rounded up to the duration grid and floored at the minimum.
pub fn total_duration_of(blocks: &[Block]) -> f64 {
    let max_end = blocks
        .iter()
        .map(Block::end_time)
        .fold(0.0_f64, f64::max);
    let aligned = (max_end / DURATION_GRID_SECS).ceil() * DURATION_GRID_SECS;
    aligned.max(MIN_TOTAL_DURATION_SECS)
}

/// The track list plus every block placed on it.
///
/// `total_duration` is derived from the blocks and recomputed by every
/// mutating method, so it can never go stale.
#[derive(Debug, Clone)]
pub struct Timeline {
    tracks: Vec<Track>,
    blocks: Vec<Block>,
    total_duration: f64,
}

impl Timeline {
    pub fn new(tracks: Vec<Track>, blocks: Vec<Block>) -> Self {
        let total_duration = total_duration_of(&blocks);
        Self {
            tracks,
            blocks,
            total_duration,
        }
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn total_duration(&self) -> f64 {
        self.total_duration
    }

    pub fn track(&self, id: &TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| &t.id == id)
    }

    pub fn track_by_kind(&self, kind: TrackKind) -> Option<&Track> {
        self.tracks.iter().find(|t| t.kind == kind)
    }

    pub fn block(&self, id: &BlockId) -> Option<&Block> {
        self.blocks.iter().find(|b| &b.id == id)
    }

    /// The track that owns the given block.
    pub fn track_of(&self, block_id: &BlockId) -> Option<&Track> {
        self.block(block_id).and_then(|b| self.track(&b.track_id))
    }

    /// Blocks that should be producing sound at `time`: the owning track is
    /// visible, unlocked and unmuted, the block has media, and `time` falls
    /// inside `[start, end)`.
    pub fn active_blocks_at(&self, time: f64) -> Vec<&Block> {
        self.blocks
            .iter()
            .filter(|block| block.has_media() && block.contains(time))
            .filter(|block| self.track(&block.track_id).is_some_and(Track::is_audible))
            .collect()
    }

    /// Blocks on one track ordered by start time.
    pub fn blocks_on_track(&self, track_id: &TrackId) -> Vec<&Block> {
        let mut blocks: Vec<&Block> = self
            .blocks
            .iter()
            .filter(|b| &b.track_id == track_id)
            .collect();
        blocks.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
        blocks
    }

    /// Effective gain of a block on its owning track, 0 if the track is gone.
    pub fn effective_gain(&self, block: &Block) -> f32 {
        self.track(&block.track_id)
            .map(|track| effective_gain(block, track))
            .unwrap_or(0.0)
    }

    pub fn insert_block(&mut self, block: Block) {
        self.blocks.push(block);
        self.recompute_total_duration();
    }

    pub fn remove_block(&mut self, id: &BlockId) -> Option<Block> {
        let index = self.blocks.iter().position(|b| &b.id == id)?;
        let removed = self.blocks.remove(index);
        self.recompute_total_duration();
        Some(removed)
    }

    /// Swap one block for zero or more replacements at the same position in
    /// the block order.
    pub fn replace_block(&mut self, id: &BlockId, replacements: Vec<Block>) -> Option<Block> {
        let index = self.blocks.iter().position(|b| &b.id == id)?;
        let removed = self.blocks.splice(index..=index, replacements).next();
        self.recompute_total_duration();
        removed
    }

    /// Remove every block whose id is in `ids`, returning the removed blocks.
    pub fn remove_blocks(&mut self, ids: &[BlockId]) -> Vec<Block> {
        let (removed, kept): (Vec<Block>, Vec<Block>) = std::mem::take(&mut self.blocks)
            .into_iter()
            .partition(|b| ids.contains(&b.id));
        self.blocks = kept;
        self.recompute_total_duration();
        removed
    }

    pub fn update_block<F>(&mut self, id: &BlockId, f: F) -> Option<&Block>
    where
        F: FnOnce(&mut Block),
    {
        let index = self.blocks.iter().position(|b| &b.id == id)?;
        f(&mut self.blocks[index]);
        self.recompute_total_duration();
        Some(&self.blocks[index])
    }

    pub fn update_track<F>(&mut self, id: &TrackId, f: F) -> Option<&Track>
    where
        F: FnOnce(&mut Track),
    {
        let track = self.tracks.iter_mut().find(|t| &t.id == id)?;
        f(track);
        Some(track)
    }

    pub fn set_blocks(&mut self, blocks: Vec<Block>) {
        self.blocks = blocks;
        self.recompute_total_duration();
    }

    fn recompute_total_duration(&mut self) {
        self.total_duration = total_duration_of(&self.blocks);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(id: &str, track: &str, start: f64, duration: f64) -> Block {
        Block::new(BlockId::new(id), TrackId::new(track), id, start, duration)
            .with_media(format!("audio/{id}.mp3"))
    }

    fn timeline(blocks: Vec<Block>) -> Timeline {
        Timeline::new(Track::default_set(), blocks)
    }

    fn ids(blocks: &[&Block]) -> Vec<String> {
        blocks.iter().map(|b| b.id.0.clone()).collect()
    }

    #[test]
    fn test_total_duration_floor_and_grid() {
        assert_eq!(total_duration_of(&[]), MIN_TOTAL_DURATION_SECS);
        assert_eq!(total_duration_of(&[block("a", "music", 0.0, 90.0)]), 180.0);
        assert_eq!(total_duration_of(&[block("a", "music", 150.0, 51.0)]), 210.0);
        assert_eq!(total_duration_of(&[block("a", "music", 190.0, 10.0)]), 200.0);
    }

    #[test]
    fn test_total_duration_grows_when_block_added() {
        let mut tl = timeline(vec![block("a", "music", 0.0, 90.0)]);
        assert_eq!(tl.total_duration(), 180.0);

        tl.insert_block(block("b", "dialogue", 150.0, 50.0));
        assert_eq!(tl.total_duration(), 200.0);

        tl.update_block(&BlockId::new("b"), |b| b.duration = 52.5);
        assert_eq!(tl.total_duration(), 210.0);

        tl.remove_block(&BlockId::new("b"));
        assert_eq!(tl.total_duration(), 180.0);
    }

    #[test]
    fn test_active_blocks_at_filters_track_state_and_media() {
        let silent = Block::new(BlockId::new("silent"), TrackId::new("dialogue"), "S", 0.0, 30.0);
        let mut tl = timeline(vec![
            block("d", "dialogue", 0.0, 30.0),
            block("m", "music", 0.0, 60.0),
            block("fx", "effects", 5.0, 2.0),
            silent,
        ]);

        assert_eq!(ids(&tl.active_blocks_at(6.0)), vec!["d", "m", "fx"]);

        tl.update_track(&TrackId::new("music"), |t| t.muted = true);
        tl.update_track(&TrackId::new("effects"), |t| t.locked = true);
        assert_eq!(ids(&tl.active_blocks_at(6.0)), vec!["d"]);

        tl.update_track(&TrackId::new("dialogue"), |t| t.visible = false);
        assert!(tl.active_blocks_at(6.0).is_empty());
    }

    #[test]
    fn test_active_blocks_at_boundaries() {
        let tl = timeline(vec![block("a", "dialogue", 0.0, 10.0), block("b", "dialogue", 10.0, 15.0)]);

        assert_eq!(ids(&tl.active_blocks_at(0.0)), vec!["a"]);
        assert_eq!(ids(&tl.active_blocks_at(10.0)), vec!["b"]);
        assert!(tl.active_blocks_at(25.0).is_empty());
    }

    #[test]
    fn test_overlapping_blocks_are_both_active() {
        let tl = timeline(vec![block("a", "dialogue", 0.0, 20.0), block("b", "dialogue", 10.0, 20.0)]);
        assert_eq!(ids(&tl.active_blocks_at(15.0)), vec!["a", "b"]);
    }

    #[test]
    fn test_blocks_on_track_sorted_by_start() {
        let tl = timeline(vec![
            block("late", "dialogue", 50.0, 5.0),
            block("other", "music", 0.0, 5.0),
            block("early", "dialogue", 2.0, 5.0),
        ]);

        assert_eq!(ids(&tl.blocks_on_track(&TrackId::new("dialogue"))), vec!["early", "late"]);
    }

    #[test]
    fn test_replace_block_keeps_position() {
        let mut tl = timeline(vec![block("a", "dialogue", 0.0, 10.0), block("b", "music", 0.0, 10.0)]);

        let removed = tl.replace_block(
            &BlockId::new("a"),
            vec![block("a1", "dialogue", 0.0, 4.0), block("a2", "dialogue", 4.0, 6.0)],
        );

        assert_eq!(removed.map(|b| b.id), Some(BlockId::new("a")));
        let order: Vec<&str> = tl.blocks().iter().map(|b| b.id.as_str()).collect();
        assert_eq!(order, vec!["a1", "a2", "b"]);
    }

    #[test]
    fn test_remove_blocks() {
        let mut tl = timeline(vec![
            block("a", "dialogue", 0.0, 10.0),
            block("b", "dialogue", 10.0, 10.0),
            block("c", "dialogue", 20.0, 10.0),
        ]);

        let removed = tl.remove_blocks(&[BlockId::new("a"), BlockId::new("c")]);

        assert_eq!(removed.len(), 2);
        assert_eq!(tl.blocks().len(), 1);
        assert_eq!(tl.blocks()[0].id.as_str(), "b");
    }

    #[test]
    fn test_effective_gain_through_timeline() {
        let mut tl = timeline(vec![block("m", "music", 0.0, 60.0).with_gain(80)]);
        let m = tl.block(&BlockId::new("m")).cloned().expect("block");
        assert!((tl.effective_gain(&m) - 0.8).abs() < 1e-6);

        tl.update_track(&TrackId::new("music"), |t| t.muted = true);
        assert_eq!(tl.effective_gain(&m), 0.0);
    }

    #[test]
    fn test_track_of() {
        let tl = timeline(vec![block("m", "music", 0.0, 60.0)]);
        let track = tl.track_of(&BlockId::new("m")).expect("track");
        assert_eq!(track.kind, TrackKind::Music);
        assert!(tl.track_of(&BlockId::new("missing")).is_none());
    }
}
