use std::collections::HashMap;

use reel_transport::{Block, BlockId};
use tracing::{debug, warn};

use crate::ResourceError;
use crate::resource::{PlayableResource, ResourceBackend};

struct Slot {
    media_reference: String,
    resource: Box<dyn PlayableResource>,
}

/// One playable resource per block id.
///
/// `release` always runs before an id is bound to different media, so a
/// stale resource can never keep sounding under a reused id.
pub struct ResourcePool {
    backend: Box<dyn ResourceBackend>,
    slots: HashMap<BlockId, Slot>,
    /// Media that failed to load, so a broken block is reported once rather
    /// than on every tick.
    failed: HashMap<BlockId, String>,
}

impl ResourcePool {
    pub fn new(backend: impl ResourceBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
            slots: HashMap::new(),
            failed: HashMap::new(),
        }
    }

    /// Resource for `block`, created on first use.
    ///
    /// Returns `Ok(None)` for blocks without media and for blocks whose media
    /// already failed to load.
    pub fn acquire(
        &mut self,
        block: &Block,
    ) -> Result<Option<&mut dyn PlayableResource>, ResourceError> {
        let Some(reference) = block.media_reference.as_deref() else {
            self.release(&block.id);
            return Ok(None);
        };

        let rebind = self
            .slots
            .get(&block.id)
            .is_some_and(|slot| slot.media_reference != reference);
        if rebind {
            self.release(&block.id);
        }

        if self.failed.get(&block.id).is_some_and(|r| r == reference) {
            return Ok(None);
        }

        if !self.slots.contains_key(&block.id) {
            match self.backend.load(reference) {
                Ok(resource) => {
                    debug!(block = %block.id, reference, "acquired resource");
                    self.failed.remove(&block.id);
                    self.slots.insert(
                        block.id.clone(),
                        Slot {
                            media_reference: reference.to_string(),
                            resource,
                        },
                    );
                }
                Err(source) => {
                    warn!(block = %block.id, reference, "failed to load media: {source:#}");
                    self.failed.insert(block.id.clone(), reference.to_string());
                    return Err(ResourceError::Load {
                        block: block.id.clone(),
                        source,
                    });
                }
            }
        }

        Ok(self
            .slots
            .get_mut(&block.id)
            .map(|slot| slot.resource.as_mut() as &mut dyn PlayableResource))
    }

    /// Stop and drop the resource bound to `id`. Returns whether one existed.
    pub fn release(&mut self, id: &BlockId) -> bool {
        self.failed.remove(id);
        match self.slots.remove(id) {
            Some(mut slot) => {
                slot.resource.pause();
                debug!(block = %id, "released resource");
                true
            }
            None => false,
        }
    }

    /// Drop remembered load failures for ids `keep` rejects.
    pub fn retain_failures(&mut self, mut keep: impl FnMut(&BlockId) -> bool) {
        self.failed.retain(|id, _| keep(id));
    }

    pub fn has_failed(&self, id: &BlockId) -> bool {
        self.failed.contains_key(id)
    }

    pub fn get_mut(&mut self, id: &BlockId) -> Option<&mut dyn PlayableResource> {
        self.slots
            .get_mut(id)
            .map(|slot| slot.resource.as_mut() as &mut dyn PlayableResource)
    }

    pub fn get(&self, id: &BlockId) -> Option<&dyn PlayableResource> {
        self.slots.get(id).map(|slot| slot.resource.as_ref())
    }

    /// Whether `id` currently holds a resource opened from `reference`.
    pub fn is_bound(&self, id: &BlockId, reference: &str) -> bool {
        self.slots
            .get(id)
            .is_some_and(|slot| slot.media_reference == reference)
    }

    pub fn contains(&self, id: &BlockId) -> bool {
        self.slots.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &BlockId> {
        self.slots.keys()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::virtual_backend::{VirtualBackend, VirtualCall};
    use reel_transport::TrackId;

    fn block(id: &str, media: Option<&str>) -> Block {
        let block = Block::new(BlockId::new(id), TrackId::new("dialogue"), id, 0.0, 10.0);
        match media {
            Some(reference) => block.with_media(reference),
            None => block,
        }
    }

    #[test]
    fn test_acquire_is_lazy_and_reused() {
        let backend = VirtualBackend::new();
        let monitor = backend.monitor();
        let mut pool = ResourcePool::new(backend);
        let a = block("a", Some("a.wav"));

        assert!(pool.is_empty());
        assert!(pool.acquire(&a).unwrap().is_some());
        assert!(pool.acquire(&a).unwrap().is_some());

        assert_eq!(pool.len(), 1);
        assert_eq!(monitor.loads("a.wav"), 1);
    }

    #[test]
    fn test_block_without_media_gets_no_resource() {
        let mut pool = ResourcePool::new(VirtualBackend::new());
        assert!(pool.acquire(&block("silent", None)).unwrap().is_none());
        assert!(pool.is_empty());
    }

    #[test]
    fn test_changed_media_releases_before_rebinding() {
        let backend = VirtualBackend::new();
        let monitor = backend.monitor();
        let mut pool = ResourcePool::new(backend);

        let resource = pool.acquire(&block("a", Some("first.wav"))).unwrap().unwrap();
        resource.play().unwrap();

        pool.acquire(&block("a", Some("second.wav"))).unwrap();

        assert_eq!(pool.len(), 1);
        let calls = monitor.calls_for("first.wav");
        assert_eq!(calls.last(), Some(&VirtualCall::Dropped));
        assert!(calls.contains(&VirtualCall::Pause));
        assert_eq!(monitor.loads("second.wav"), 1);
    }

    #[test]
    fn test_load_failure_is_reported_once() {
        let mut backend = VirtualBackend::new();
        backend.fail_to_load("broken.wav");
        let mut pool = ResourcePool::new(backend);
        let broken = block("b", Some("broken.wav"));

        let first = pool.acquire(&broken);
        assert!(matches!(first, Err(ResourceError::Load { .. })));

        let second = pool.acquire(&broken);
        assert!(matches!(second, Ok(None)));
    }

    #[test]
    fn test_release_pauses_and_drops() {
        let backend = VirtualBackend::new();
        let monitor = backend.monitor();
        let mut pool = ResourcePool::new(backend);
        let a = block("a", Some("a.wav"));

        pool.acquire(&a).unwrap().unwrap().play().unwrap();
        assert!(pool.release(&a.id));
        assert!(!pool.release(&a.id));

        assert!(!pool.contains(&a.id));
        assert!(!monitor.is_live("a.wav"));
    }
}
