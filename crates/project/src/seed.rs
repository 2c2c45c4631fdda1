use reel_transport::{Block, BlockId, BlockStatus, TrackId, TrackKind};

fn seed(
    id: &str,
    kind: TrackKind,
    title: &str,
    start_time: f64,
    duration: f64,
    status: BlockStatus,
) -> Block {
    Block::new(BlockId::new(id), TrackId::new(kind.as_str()), title, start_time, duration)
        .with_status(status)
}

/// Example blocks for a fresh timeline: a four-part 160 s piece with
/// narration, a full-length music bed and a few short cues.
///
/// Seed blocks carry no media, so they stay silent until audio is attached.
pub fn seed_blocks() -> Vec<Block> {
    use BlockStatus::*;
    use TrackKind::*;

    vec![
        seed("block-1", Dialogue, "Introduction", 0.0, 30.0, Ready).with_language("Hindi"),
        seed("block-2", Dialogue, "Key Points", 30.0, 45.0, Processing).with_language("English"),
        seed("block-3", Dialogue, "Statistics", 75.0, 60.0, Draft).with_language("Bengali"),
        seed("block-4", Dialogue, "Conclusion", 135.0, 25.0, Ready).with_language("Tamil"),
        seed("vo-1", Narration, "Hindi Narration", 0.0, 30.0, Ready).with_language("Hindi"),
        seed("vo-2", Narration, "English Narration", 30.0, 45.0, Processing).with_language("English"),
        seed("music-1", Music, "Background Track", 0.0, 180.0, Ready),
        seed("fx-1", Effects, "Opening Sting", 0.0, 3.0, Ready),
        seed("tr-1", Transitions, "Section Wipe", 74.0, 2.0, Draft),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_transport::{Timeline, Track};
    use std::collections::HashSet;

    #[test]
    fn test_seed_covers_every_track() {
        let blocks = seed_blocks();
        for kind in TrackKind::ALL {
            assert!(
                blocks.iter().any(|b| b.track_id.as_str() == kind.as_str()),
                "no seed block on {kind}"
            );
        }
    }

    #[test]
    fn test_seed_is_well_formed() {
        let blocks = seed_blocks();
        let ids: HashSet<_> = blocks.iter().map(|b| &b.id).collect();

        assert_eq!(ids.len(), blocks.len());
        assert!(blocks.iter().all(Block::is_well_formed));
    }

    #[test]
    fn test_seed_timeline_spans_three_minutes() {
        let timeline = Timeline::new(Track::default_set(), seed_blocks());
        assert_eq!(timeline.total_duration(), 180.0);
    }
}
