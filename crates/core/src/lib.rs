pub mod clip_ops;
pub mod config;
mod edit;
pub mod error;
pub mod events;
pub mod import;
mod mixer;
pub mod scheduler;
pub mod session;
pub mod time;

pub use clip_ops::{DragMode, DragSession, MIN_BLOCK_SECS};
pub use config::EditorConfig;
pub use error::EditError;
pub use events::{Notice, NoticeLevel, SessionEvent, SubscriptionId};
pub use import::{DurationProbe, GeneratedAudio, MediaProbe, bounded_duration};
pub use scheduler::{TickOutcome, TransportState};
pub use session::Session;
pub use time::{TimeContext, format_clock};

pub use reel_engine::{ResourceBackend, VirtualBackend};
pub use reel_project::{FileStore, KeyValueStore, MemoryStore, SeedReason};
pub use reel_transport::{Block, BlockId, BlockStatus, Timeline, Track, TrackId, TrackKind};

#[cfg(feature = "device")]
pub use reel_engine::device::DeviceBackend;
