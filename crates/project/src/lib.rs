//! Persistence of the timeline's block array to a local key-value store.
//!
//! The whole array is written under a single key on every change. A missing,
//! unreadable or empty value is replaced by the built-in seed set. There is no
//! schema version; a future field addition needs an explicit migration.

mod load;
mod save;
mod seed;
mod store;

use reel_transport::{Block, Track};
use tracing::warn;

pub use load::{LoadedBlocks, SeedReason, load_blocks};
pub use save::save_blocks;
pub use seed::seed_blocks;
pub use store::{FileStore, KeyValueStore, MemoryStore};

/// Storage key for the serialized block array.
pub const BLOCKS_KEY: &str = "timeline-blocks";

#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupt timeline data: {0}")]
    Corrupt(String),
}

/// Best-effort persistence bound to one store and key.
pub struct Persistence {
    store: Box<dyn KeyValueStore>,
    key: String,
}

impl Persistence {
    pub fn new(store: impl KeyValueStore + 'static) -> Self {
        Self {
            store: Box::new(store),
            key: BLOCKS_KEY.to_string(),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn load(&self, tracks: &[Track]) -> LoadedBlocks {
        load_blocks(self.store.as_ref(), &self.key, tracks)
    }

    /// Write the block array. Failures are logged and reported as `false`;
    /// editing continues on in-memory state.
    pub fn save(&mut self, blocks: &[Block]) -> bool {
        match self.try_save(blocks) {
            Ok(()) => true,
            Err(e) => {
                warn!(key = %self.key, "failed to persist timeline: {e}");
                false
            }
        }
    }

    pub fn try_save(&mut self, blocks: &[Block]) -> Result<(), ProjectError> {
        save_blocks(self.store.as_mut(), &self.key, blocks)
    }

    /// Drop the stored value so the next load falls back to the seed set.
    pub fn clear(&mut self) -> Result<(), ProjectError> {
        self.store.remove(&self.key)
    }
}
