//! Entity model for the multi-track timeline: tracks, blocks and the
//! `Timeline` aggregate that owns them.

mod timeline;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use timeline::{DURATION_GRID_SECS, MIN_TOTAL_DURATION_SECS, Timeline, total_duration_of};

/// Upper bound for block, track and master gain.
pub const MAX_GAIN: u8 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub String);

impl TrackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(pub String);

impl BlockId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A fresh, globally unique id for blocks produced by editing operations.
    pub fn generate() -> Self {
        Self(format!("block-{}", uuid::Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Semantic role of a track. Every timeline has exactly one track per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Dialogue,
    Narration,
    Music,
    Effects,
    Transitions,
}

impl TrackKind {
    pub const ALL: [TrackKind; 5] = [
        TrackKind::Dialogue,
        TrackKind::Narration,
        TrackKind::Music,
        TrackKind::Effects,
        TrackKind::Transitions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TrackKind::Dialogue => "dialogue",
            TrackKind::Narration => "narration",
            TrackKind::Music => "music",
            TrackKind::Effects => "effects",
            TrackKind::Transitions => "transitions",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            TrackKind::Dialogue => "Dialogue",
            TrackKind::Narration => "Narration",
            TrackKind::Music => "Background Music",
            TrackKind::Effects => "Sound Effects",
            TrackKind::Transitions => "Transitions",
        }
    }
}

impl std::str::FromStr for TrackKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TrackKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown track kind '{s}'"))
    }
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named lane. Locked tracks reject block mutations; muted, hidden and
/// locked tracks never produce sound.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub id: TrackId,
    pub name: String,
    pub kind: TrackKind,
    pub visible: bool,
    pub locked: bool,
    pub muted: bool,
    /// 0..=100
    pub gain: u8,
}

impl Track {
    pub fn new(id: TrackId, name: impl Into<String>, kind: TrackKind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            visible: true,
            locked: false,
            muted: false,
            gain: MAX_GAIN,
        }
    }

    /// The standard five-lane layout, one track per kind, keyed by the kind name.
    pub fn default_set() -> Vec<Track> {
        TrackKind::ALL
            .into_iter()
            .map(|kind| Track::new(TrackId::new(kind.as_str()), kind.display_name(), kind))
            .collect()
    }

    /// Whether blocks on this track are eligible for playback.
    pub fn is_audible(&self) -> bool {
        self.visible && !self.locked && !self.muted
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockStatus {
    Draft,
    Processing,
    Ready,
}

/// A placed audio clip. Times are in seconds of virtual timeline time.
///
/// Blocks on the same track may overlap; which one is audible is decided at
/// playback time, not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub id: BlockId,
    pub track_id: TrackId,
    pub title: String,
    pub start_time: f64,
    pub duration: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub status: BlockStatus,
    /// Locator for playable audio. Blocks without one are silent placeholders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_reference: Option<String>,
    /// 0..=100
    pub gain: u8,
}

impl Block {
    pub fn new(
        id: BlockId,
        track_id: TrackId,
        title: impl Into<String>,
        start_time: f64,
        duration: f64,
    ) -> Self {
        Self {
            id,
            track_id,
            title: title.into(),
            start_time,
            duration,
            language: None,
            status: BlockStatus::Draft,
            media_reference: None,
            gain: MAX_GAIN,
        }
    }

    pub fn with_media(mut self, reference: impl Into<String>) -> Self {
        self.media_reference = Some(reference.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_status(mut self, status: BlockStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_gain(mut self, gain: u8) -> Self {
        self.gain = gain.min(MAX_GAIN);
        self
    }

    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }

    /// Half-open containment: `[start, end)`.
    pub fn contains(&self, time: f64) -> bool {
        self.start_time <= time && time < self.end_time()
    }

    /// True if the spans overlap or share an edge.
    pub fn touches(&self, other: &Block) -> bool {
        other.start_time <= self.end_time() && other.end_time() >= self.start_time
    }

    pub fn has_media(&self) -> bool {
        self.media_reference.is_some()
    }

    /// Structural validity: finite, non-negative start, positive duration, gain in range.
    pub fn is_well_formed(&self) -> bool {
        self.start_time.is_finite()
            && self.duration.is_finite()
            && self.start_time >= 0.0
            && self.duration > 0.0
            && self.gain <= MAX_GAIN
    }
}

/// `(block.gain / 100) * (track.muted ? 0 : track.gain / 100)`
pub fn effective_gain(block: &Block, track: &Track) -> f32 {
    if track.muted {
        return 0.0;
    }
    (block.gain as f32 / MAX_GAIN as f32) * (track.gain as f32 / MAX_GAIN as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_end_and_containment_is_half_open() {
        let block = Block::new(BlockId::new("b"), TrackId::new("music"), "Bed", 10.0, 20.0);

        assert_eq!(block.end_time(), 30.0);
        assert!(block.contains(10.0));
        assert!(block.contains(29.9));
        assert!(!block.contains(30.0));
        assert!(!block.contains(9.99));
    }

    #[test]
    fn test_touches_includes_shared_edge() {
        let a = Block::new(BlockId::new("a"), TrackId::new("t"), "A", 0.0, 10.0);
        let b = Block::new(BlockId::new("b"), TrackId::new("t"), "B", 10.0, 15.0);
        let c = Block::new(BlockId::new("c"), TrackId::new("t"), "C", 26.0, 1.0);

        assert!(a.touches(&b));
        assert!(b.touches(&a));
        assert!(!a.touches(&c));
    }

    #[test]
    fn test_effective_gain_product_and_mute() {
        let block = Block::new(BlockId::new("m"), TrackId::new("music"), "M", 0.0, 60.0).with_gain(80);
        let mut track = Track::new(TrackId::new("music"), "Music", TrackKind::Music);
        track.gain = 50;

        assert!((effective_gain(&block, &track) - 0.4).abs() < 1e-6);

        track.muted = true;
        assert_eq!(effective_gain(&block, &track), 0.0);
    }

    #[test]
    fn test_with_gain_clamps() {
        let block = Block::new(BlockId::new("x"), TrackId::new("t"), "X", 0.0, 1.0).with_gain(250);
        assert_eq!(block.gain, MAX_GAIN);
    }

    #[test]
    fn test_block_serializes_camel_case() {
        let block = Block::new(BlockId::new("vo-1"), TrackId::new("narration"), "Hindi Narration", 0.0, 30.0)
            .with_language("Hindi")
            .with_media("audio/vo-1.mp3")
            .with_status(BlockStatus::Ready);

        let json = serde_json::to_value(&block).expect("serialize");

        assert_eq!(json["id"], "vo-1");
        assert_eq!(json["trackId"], "narration");
        assert_eq!(json["startTime"], 0.0);
        assert_eq!(json["mediaReference"], "audio/vo-1.mp3");
        assert_eq!(json["status"], "ready");
    }

    #[test]
    fn test_optional_fields_may_be_absent() {
        let json = r#"{"id":"b","trackId":"music","title":"T","startTime":1,"duration":2,"status":"draft","gain":70}"#;
        let block: Block = serde_json::from_str(json).expect("deserialize");

        assert_eq!(block.language, None);
        assert_eq!(block.media_reference, None);
        assert_eq!(block.gain, 70);
    }

    #[test]
    fn test_well_formed() {
        let mut block = Block::new(BlockId::new("b"), TrackId::new("t"), "B", 0.0, 5.0);
        assert!(block.is_well_formed());

        block.duration = 0.0;
        assert!(!block.is_well_formed());

        block.duration = 5.0;
        block.start_time = -1.0;
        assert!(!block.is_well_formed());

        block.start_time = f64::NAN;
        assert!(!block.is_well_formed());
    }

    #[test]
    fn test_track_kind_parse() {
        assert_eq!("Music".parse::<TrackKind>(), Ok(TrackKind::Music));
        assert!("video".parse::<TrackKind>().is_err());
    }

    #[test]
    fn test_default_track_set_covers_every_kind() {
        let tracks = Track::default_set();
        assert_eq!(tracks.len(), TrackKind::ALL.len());
        for (track, kind) in tracks.iter().zip(TrackKind::ALL) {
            assert_eq!(track.kind, kind);
            assert_eq!(track.id.as_str(), kind.as_str());
            assert!(track.is_audible());
            assert_eq!(track.gain, MAX_GAIN);
        }
    }

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(BlockId::generate(), BlockId::generate());
    }
}
