use reel_transport::Block;
use tracing::debug;

use crate::{KeyValueStore, ProjectError};

/// Serialize the whole block array and replace the value under `key`.
pub fn save_blocks(
    store: &mut dyn KeyValueStore,
    key: &str,
    blocks: &[Block],
) -> Result<(), ProjectError> {
    let json = serde_json::to_string(blocks)?;
    store.set(key, &json)?;
    debug!(key, blocks = blocks.len(), "saved timeline");
    Ok(())
}
