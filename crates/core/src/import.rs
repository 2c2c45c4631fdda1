//! Adding audio produced outside the editor: generated dialogue and uploads.
//!
//! The true length of new media is probed with a bounded wait. Probing can be
//! done without holding the session (`bounded_duration`) so the transport
//! keeps ticking while media opens; the `import_*` methods are the one-call
//! versions.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reel_transport::{Block, BlockId, BlockStatus, TrackKind};
use tracing::{info, warn};

use crate::error::EditError;
use crate::events::Notice;
use crate::session::Session;

/// Output of the dialogue generator.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GeneratedAudio {
    pub media_reference: String,
    pub transcript_reference: Option<String>,
    /// Length reported by the generator; not always accurate.
    pub duration_hint: Option<f64>,
    pub title: Option<String>,
    pub language: Option<String>,
}

impl GeneratedAudio {
    pub fn new(media_reference: impl Into<String>) -> Self {
        Self {
            media_reference: media_reference.into(),
            ..Self::default()
        }
    }
}

/// Finds out how long a piece of media really is.
pub trait DurationProbe {
    fn probe(&self, reference: &str) -> impl Future<Output = anyhow::Result<f64>>;
}

/// Probes local files by decoding their headers on the blocking pool.
#[derive(Debug, Clone, Default)]
pub struct MediaProbe {
    media_root: Option<PathBuf>,
}

impl MediaProbe {
    pub fn new(media_root: Option<PathBuf>) -> Self {
        Self { media_root }
    }
}

impl DurationProbe for MediaProbe {
    async fn probe(&self, reference: &str) -> anyhow::Result<f64> {
        let path = reel_decode::resolve_media_path(reference, self.media_root.as_deref())
            .ok_or_else(|| anyhow::anyhow!("media not found: {reference}"))?;
        tokio::task::spawn_blocking(move || reel_decode::probe_duration(&path)).await?
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationSource {
    Probed,
    Hint,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbedDuration {
    pub secs: f64,
    pub source: DurationSource,
}

/// Probe `reference`, waiting at most `timeout`. On timeout or failure fall
/// back to `hint` when it is a positive number, else to `default_secs`.
pub async fn bounded_duration(
    probe: &impl DurationProbe,
    reference: &str,
    timeout: Duration,
    hint: Option<f64>,
    default_secs: f64,
) -> ProbedDuration {
    let reason = match tokio::time::timeout(timeout, probe.probe(reference)).await {
        Ok(Ok(secs)) if secs.is_finite() && secs > 0.0 => {
            return ProbedDuration {
                secs,
                source: DurationSource::Probed,
            };
        }
        Ok(Ok(secs)) => format!("probe reported unusable duration {secs}"),
        Ok(Err(e)) => format!("{e:#}"),
        Err(_) => format!("no duration after {}s", timeout.as_secs_f64()),
    };

    let fallback = match hint.filter(|h| h.is_finite() && *h > 0.0) {
        Some(secs) => ProbedDuration {
            secs,
            source: DurationSource::Hint,
        },
        None => ProbedDuration {
            secs: default_secs,
            source: DurationSource::Default,
        },
    };
    warn!(reference, fallback = fallback.secs, "duration probe failed: {reason}");
    fallback
}

impl Session {
    /// Append generated dialogue after the last block on the dialogue track.
    pub fn append_generated(&mut self, audio: &GeneratedAudio, duration: f64) -> Result<BlockId, EditError> {
        let result = self.creation_track(TrackKind::Dialogue).map(|track_id| {
            let start = self
                .timeline
                .blocks_on_track(&track_id)
                .iter()
                .map(|b| b.end_time())
                .fold(0.0, f64::max);
            let title = audio.title.clone().unwrap_or_else(|| "Generated Dialogue".to_string());
            let mut block = Block::new(BlockId::generate(), track_id, title, start, self.usable(duration))
                .with_media(audio.media_reference.clone())
                .with_status(BlockStatus::Ready);
            block.language = audio.language.clone();
            block
        });
        let block = self.surfaced(result)?;
        Ok(self.add_block(block, "Audio added to timeline"))
    }

    /// Place an uploaded file on the track of `kind` at the playhead.
    pub fn insert_upload(&mut self, reference: &str, kind: TrackKind, duration: f64) -> Result<BlockId, EditError> {
        let result = self.creation_track(kind).map(|track_id| {
            Block::new(
                BlockId::generate(),
                track_id,
                title_from_reference(reference),
                self.current_time(),
                self.usable(duration),
            )
            .with_media(reference)
            .with_status(BlockStatus::Ready)
        });
        let block = self.surfaced(result)?;
        Ok(self.add_block(block, "Upload added to timeline"))
    }

    /// Probe and append generated dialogue in one step.
    pub async fn import_generated(
        &mut self,
        audio: GeneratedAudio,
        probe: &impl DurationProbe,
    ) -> Result<BlockId, EditError> {
        let duration = bounded_duration(
            probe,
            &audio.media_reference,
            self.config.generated_probe_timeout(),
            audio.duration_hint,
            self.config.default_block_secs,
        )
        .await;
        self.append_generated(&audio, duration.secs)
    }

    /// Probe and place an upload in one step.
    pub async fn import_upload(
        &mut self,
        reference: &str,
        kind: TrackKind,
        probe: &impl DurationProbe,
    ) -> Result<BlockId, EditError> {
        let duration = bounded_duration(
            probe,
            reference,
            self.config.upload_probe_timeout(),
            None,
            self.config.default_block_secs,
        )
        .await;
        self.insert_upload(reference, kind, duration.secs)
    }

    fn creation_track(&self, kind: TrackKind) -> Result<reel_transport::TrackId, EditError> {
        let track = self
            .timeline
            .track_by_kind(kind)
            .ok_or_else(|| EditError::UnknownTrack(reel_transport::TrackId::new(kind.as_str())))?;
        if track.locked {
            return Err(EditError::TrackLocked(track.id.clone()));
        }
        Ok(track.id.clone())
    }

    fn usable(&self, duration: f64) -> f64 {
        if duration.is_finite() && duration > 0.0 {
            duration
        } else {
            self.config.default_block_secs
        }
    }

    fn add_block(&mut self, block: Block, title: &str) -> BlockId {
        let id = block.id.clone();
        info!(block = %id, track = %block.track_id, start = block.start_time, duration = block.duration, "added block");
        let message = format!("\"{}\" placed on {}", block.title, block.track_id);
        self.timeline.insert_block(block);
        self.blocks_changed();
        self.notify(Notice::info(title, message));
        id
    }
}

fn title_from_reference(reference: &str) -> String {
    let trimmed = reference.split(['?', '#']).next().unwrap_or(reference);
    Path::new(trimmed)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("Uploaded Audio")
        .to_string()
}
