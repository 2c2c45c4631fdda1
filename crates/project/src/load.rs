use std::collections::HashSet;

use reel_transport::{Block, Track};
use tracing::{info, warn};

use crate::{KeyValueStore, ProjectError, seed_blocks};

#[derive(Debug, Clone, PartialEq)]
pub enum SeedReason {
    /// Nothing stored under the key (first run).
    Missing,
    /// A stored array with no blocks.
    Empty,
    /// The stored value could not be read or did not describe a valid timeline.
    Corrupt(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadedBlocks {
    Stored(Vec<Block>),
    Seeded { blocks: Vec<Block>, reason: SeedReason },
}

impl LoadedBlocks {
    pub fn is_seeded(&self) -> bool {
        matches!(self, LoadedBlocks::Seeded { .. })
    }

    pub fn blocks(&self) -> &[Block] {
        match self {
            LoadedBlocks::Stored(blocks) | LoadedBlocks::Seeded { blocks, .. } => blocks,
        }
    }

    pub fn into_blocks(self) -> Vec<Block> {
        match self {
            LoadedBlocks::Stored(blocks) | LoadedBlocks::Seeded { blocks, .. } => blocks,
        }
    }
}

/// Read the block array under `key`, falling back to the seed set when it is
/// missing, empty or corrupt. Never fails.
pub fn load_blocks(store: &dyn KeyValueStore, key: &str, tracks: &[Track]) -> LoadedBlocks {
    let reason = match read_blocks(store, key, tracks) {
        Ok(Some(blocks)) if !blocks.is_empty() => {
            info!(key, blocks = blocks.len(), "loaded timeline");
            return LoadedBlocks::Stored(blocks);
        }
        Ok(Some(_)) => SeedReason::Empty,
        Ok(None) => SeedReason::Missing,
        Err(e) => {
            warn!(key, "stored timeline unusable, using seed set: {e}");
            SeedReason::Corrupt(e.to_string())
        }
    };

    LoadedBlocks::Seeded {
        blocks: seed_blocks(),
        reason,
    }
}

fn read_blocks(
    store: &dyn KeyValueStore,
    key: &str,
    tracks: &[Track],
) -> Result<Option<Vec<Block>>, ProjectError> {
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };
    let blocks: Vec<Block> = serde_json::from_str(&raw)?;
    validate(&blocks, tracks)?;
    Ok(Some(blocks))
}

fn validate(blocks: &[Block], tracks: &[Track]) -> Result<(), ProjectError> {
    let mut seen = HashSet::new();
    for block in blocks {
        if !block.is_well_formed() {
            return Err(ProjectError::Corrupt(format!("block {} has an invalid span or gain", block.id)));
        }
        if !tracks.iter().any(|t| t.id == block.track_id) {
            return Err(ProjectError::Corrupt(format!(
                "block {} refers to unknown track {}",
                block.id, block.track_id
            )));
        }
        if !seen.insert(&block.id) {
            return Err(ProjectError::Corrupt(format!("duplicate block id {}", block.id)));
        }
    }
    Ok(())
}
