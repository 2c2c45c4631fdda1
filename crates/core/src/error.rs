use reel_transport::{BlockId, TrackId};

/// Why an editing operation was rejected. A rejected operation leaves the
/// timeline untouched.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EditError {
    #[error("no block selected")]
    NoSelection,

    #[error("block {0} does not exist")]
    UnknownBlock(BlockId),

    #[error("track {0} does not exist")]
    UnknownTrack(TrackId),

    #[error("track {0} is locked")]
    TrackLocked(TrackId),

    #[error("playhead at {time:.1}s is outside block {block}")]
    PlayheadOutsideBlock { block: BlockId, time: f64 },

    #[error("no adjacent block to merge with {0}")]
    NothingToMerge(BlockId),

    #[error("nothing has been copied")]
    ClipboardEmpty,

    #[error("no drag in progress")]
    NoDrag,

    #[error("invalid value: {0}")]
    InvalidValue(String),
}

impl EditError {
    /// Short heading for user-facing notices.
    pub fn title(&self) -> &'static str {
        match self {
            EditError::NoSelection | EditError::UnknownBlock(_) | EditError::UnknownTrack(_) => {
                "Nothing to edit"
            }
            EditError::TrackLocked(_) => "Track locked",
            EditError::PlayheadOutsideBlock { .. } => "Cannot split",
            EditError::NothingToMerge(_) => "Cannot merge",
            EditError::ClipboardEmpty => "Cannot paste",
            EditError::NoDrag => "Nothing to drag",
            EditError::InvalidValue(_) => "Invalid value",
        }
    }
}
