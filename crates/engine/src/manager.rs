use std::collections::HashSet;

use reel_transport::{Block, BlockId, MAX_GAIN, Timeline};
use tracing::warn;

use crate::ResourceError;
use crate::pool::ResourcePool;
use crate::resource::ResourceBackend;

/// Keeps one playable resource per block that has media.
///
/// The manager reads block and track fields but never mutates the timeline.
pub struct AudioResourceManager {
    pool: ResourcePool,
}

impl AudioResourceManager {
    pub fn new(backend: impl ResourceBackend + 'static) -> Self {
        Self {
            pool: ResourcePool::new(backend),
        }
    }

    /// Reconcile resources with the block set: open resources for newly
    /// observed media blocks and retire those whose block is gone.
    ///
    /// Fresh resources start at `block.gain / 100`.
    pub fn sync(&mut self, timeline: &Timeline) -> Vec<ResourceError> {
        let live: HashSet<&BlockId> = timeline.blocks().iter().map(|b| &b.id).collect();
        let stale: Vec<BlockId> = self
            .pool
            .ids()
            .filter(|id| !live.contains(id))
            .cloned()
            .collect();
        for id in &stale {
            self.pool.release(id);
        }
        self.pool.retain_failures(|id| live.contains(id));

        let mut errors = Vec::new();
        for block in timeline.blocks() {
            let fresh = !self.is_current(block);
            match self.pool.acquire(block) {
                Ok(Some(resource)) if fresh => resource.set_volume(block_level(block)),
                Ok(_) => {}
                Err(e) => errors.push(e),
            }
        }
        errors
    }

    /// Synchronously stop and drop a block's resource.
    pub fn retire(&mut self, id: &BlockId) -> bool {
        self.pool.release(id)
    }

    pub fn set_volume(&mut self, id: &BlockId, effective_gain: f32) {
        if let Some(resource) = self.pool.get_mut(id) {
            resource.set_volume(effective_gain.clamp(0.0, 1.0));
        }
    }

    /// Start `block` at `offset_secs` into its media at the given volume.
    ///
    /// Silent placeholders succeed without doing anything.
    pub fn seek_and_play(
        &mut self,
        block: &Block,
        offset_secs: f64,
        volume: f32,
    ) -> Result<(), ResourceError> {
        let Some(resource) = self.pool.acquire(block)? else {
            return Ok(());
        };

        resource.set_volume(volume.clamp(0.0, 1.0));
        resource
            .seek(offset_secs.max(0.0))
            .map_err(|source| ResourceError::Seek {
                block: block.id.clone(),
                source,
            })?;
        resource.play().map_err(|source| {
            warn!(block = %block.id, "failed to start playback: {source:#}");
            ResourceError::Play {
                block: block.id.clone(),
                source,
            }
        })
    }

    pub fn pause(&mut self, id: &BlockId) {
        if let Some(resource) = self.pool.get_mut(id) {
            resource.pause();
        }
    }

    pub fn is_playing(&self, id: &BlockId) -> bool {
        self.pool.get(id).is_some_and(|r| r.is_playing())
    }

    /// Ids of every resource currently producing sound, sorted.
    pub fn playing_ids(&self) -> Vec<BlockId> {
        let mut ids: Vec<BlockId> = self
            .pool
            .ids()
            .filter(|id| self.is_playing(id))
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    pub fn has_resource(&self, id: &BlockId) -> bool {
        self.pool.contains(id)
    }

    pub fn resource_count(&self) -> usize {
        self.pool.len()
    }

    /// Media length reported by the block's resource, once loaded.
    pub fn duration_of(&self, id: &BlockId) -> Option<f64> {
        self.pool.get(id).and_then(|r| r.duration())
    }

    fn is_current(&self, block: &Block) -> bool {
        block
            .media_reference
            .as_deref()
            .is_some_and(|reference| self.pool.is_bound(&block.id, reference))
    }
}

fn block_level(block: &Block) -> f32 {
    block.gain as f32 / MAX_GAIN as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::virtual_backend::{VirtualBackend, VirtualCall};
    use reel_transport::{Track, TrackId};

    fn media_block(id: &str, gain: u8) -> Block {
        Block::new(BlockId::new(id), TrackId::new("music"), id, 0.0, 30.0)
            .with_media(format!("{id}.wav"))
            .with_gain(gain)
    }

    #[test]
    fn test_sync_creates_with_block_gain_and_retires_removed() {
        let backend = VirtualBackend::new();
        let monitor = backend.monitor();
        let mut manager = AudioResourceManager::new(backend);
        let placeholder = Block::new(BlockId::new("p"), TrackId::new("music"), "P", 0.0, 5.0);
        let mut timeline = Timeline::new(
            Track::default_set(),
            vec![media_block("a", 80), media_block("b", 100), placeholder],
        );

        assert!(manager.sync(&timeline).is_empty());
        assert_eq!(manager.resource_count(), 2);
        assert_eq!(monitor.last_volume("a.wav"), Some(0.8));

        timeline.remove_block(&BlockId::new("a"));
        manager.sync(&timeline);

        assert_eq!(manager.resource_count(), 1);
        assert!(!monitor.is_live("a.wav"));
        assert!(monitor.is_live("b.wav"));
    }

    #[test]
    fn test_sync_does_not_reset_volume_of_existing_resource() {
        let backend = VirtualBackend::new();
        let monitor = backend.monitor();
        let mut manager = AudioResourceManager::new(backend);
        let timeline = Timeline::new(Track::default_set(), vec![media_block("a", 50)]);

        manager.sync(&timeline);
        manager.set_volume(&BlockId::new("a"), 0.1);
        manager.sync(&timeline);

        assert_eq!(monitor.last_volume("a.wav"), Some(0.1));
        assert_eq!(monitor.loads("a.wav"), 1);
    }

    #[test]
    fn test_seek_and_play_orders_volume_seek_play() {
        let backend = VirtualBackend::new();
        let monitor = backend.monitor();
        let mut manager = AudioResourceManager::new(backend);
        let block = media_block("a", 100);

        manager.seek_and_play(&block, 4.5, 0.6).expect("play");

        assert!(manager.is_playing(&block.id));
        assert_eq!(
            monitor.calls_for("a.wav"),
            vec![
                VirtualCall::Load,
                VirtualCall::Volume(0.6),
                VirtualCall::Seek(4.5),
                VirtualCall::Play,
            ]
        );
    }

    #[test]
    fn test_play_failure_is_isolated_to_block() {
        let mut backend = VirtualBackend::new();
        backend.fail_to_play("bad.wav");
        let mut manager = AudioResourceManager::new(backend);

        let err = manager.seek_and_play(&media_block("bad", 100), 0.0, 1.0);
        assert!(matches!(err, Err(ResourceError::Play { .. })));

        manager.seek_and_play(&media_block("good", 100), 0.0, 1.0).expect("play");
        assert_eq!(manager.playing_ids(), vec![BlockId::new("good")]);
    }

    #[test]
    fn test_retire_stops_sounding_resource() {
        let backend = VirtualBackend::new();
        let monitor = backend.monitor();
        let mut manager = AudioResourceManager::new(backend);
        let block = media_block("a", 100);

        manager.seek_and_play(&block, 0.0, 1.0).expect("play");
        assert!(manager.retire(&block.id));

        assert!(!manager.is_playing(&block.id));
        assert!(!monitor.is_live("a.wav"));
    }

    #[test]
    fn test_sync_forgets_failures_of_removed_blocks() {
        let mut backend = VirtualBackend::new();
        backend.fail_to_load("broken.wav");
        let mut manager = AudioResourceManager::new(backend);
        let broken = Block::new(BlockId::new("broken"), TrackId::new("music"), "Broken", 0.0, 5.0)
            .with_media("broken.wav");
        let mut timeline = Timeline::new(Track::default_set(), vec![broken.clone()]);

        assert_eq!(manager.sync(&timeline).len(), 1);
        assert!(manager.sync(&timeline).is_empty());

        timeline.set_blocks(Vec::new());
        manager.sync(&timeline);
        assert!(!manager.pool.has_failed(&broken.id));

        timeline.set_blocks(vec![broken]);
        assert_eq!(manager.sync(&timeline).len(), 1);
    }

    #[test]
    fn test_volume_is_clamped() {
        let backend = VirtualBackend::new();
        let monitor = backend.monitor();
        let mut manager = AudioResourceManager::new(backend);
        let block = media_block("a", 100);

        manager.seek_and_play(&block, 0.0, 3.0).expect("play");
        assert_eq!(monitor.last_volume("a.wav"), Some(1.0));
    }
}
