//! Audio resource management: one independently-timed playable resource per
//! block, opened lazily and retired with its block.

#[cfg(feature = "device")]
pub mod device;
mod manager;
mod pool;
mod resource;
pub mod virtual_backend;

use reel_transport::BlockId;

pub use manager::AudioResourceManager;
pub use pool::ResourcePool;
pub use resource::{PlayableResource, ResourceBackend};
pub use virtual_backend::{VirtualBackend, VirtualMonitor};

/// A failure confined to one block's resource. Playback of every other block
/// carries on.
#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("failed to load media for block {block}: {source}")]
    Load {
        block: BlockId,
        source: anyhow::Error,
    },

    #[error("failed to seek block {block}: {source}")]
    Seek {
        block: BlockId,
        source: anyhow::Error,
    },

    #[error("failed to play block {block}: {source}")]
    Play {
        block: BlockId,
        source: anyhow::Error,
    },
}

impl ResourceError {
    pub fn block(&self) -> &BlockId {
        match self {
            ResourceError::Load { block, .. }
            | ResourceError::Seek { block, .. }
            | ResourceError::Play { block, .. } => block,
        }
    }
}
