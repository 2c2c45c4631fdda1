//! Track mixer controls: visibility, lock, mute and per-track gain.
//!
//! Changes take effect on a running transport immediately; a track that
//! stops being audible has its blocks paused, and gain changes refresh the
//! volume of every sounding block.

use reel_transport::{MAX_GAIN, Track, TrackId, TrackKind};
use tracing::info;

use crate::error::EditError;
use crate::session::Session;

impl Session {
    pub fn track(&self, id: &TrackId) -> Option<&Track> {
        self.timeline.track(id)
    }

    pub fn track_by_kind(&self, kind: TrackKind) -> Option<&Track> {
        self.timeline.track_by_kind(kind)
    }

    pub fn set_track_visible(&mut self, id: &TrackId, visible: bool) -> Result<(), EditError> {
        self.update_track(id, |t| t.visible = visible)
    }

    pub fn set_track_locked(&mut self, id: &TrackId, locked: bool) -> Result<(), EditError> {
        if locked && self.drag_track() == Some(id.clone()) {
            self.drag = None;
        }
        self.update_track(id, |t| t.locked = locked)
    }

    pub fn set_track_muted(&mut self, id: &TrackId, muted: bool) -> Result<(), EditError> {
        self.update_track(id, |t| t.muted = muted)
    }

    /// Per-track level, 0..=100.
    pub fn set_track_gain(&mut self, id: &TrackId, gain: u8) -> Result<(), EditError> {
        self.update_track(id, |t| t.gain = gain.min(MAX_GAIN))
    }

    pub fn toggle_track_visible(&mut self, id: &TrackId) -> Result<bool, EditError> {
        let visible = !self.track_flag(id, |t| t.visible)?;
        self.set_track_visible(id, visible)?;
        Ok(visible)
    }

    pub fn toggle_track_locked(&mut self, id: &TrackId) -> Result<bool, EditError> {
        let locked = !self.track_flag(id, |t| t.locked)?;
        self.set_track_locked(id, locked)?;
        Ok(locked)
    }

    pub fn toggle_track_muted(&mut self, id: &TrackId) -> Result<bool, EditError> {
        let muted = !self.track_flag(id, |t| t.muted)?;
        self.set_track_muted(id, muted)?;
        Ok(muted)
    }

    fn track_flag(&mut self, id: &TrackId, flag: fn(&Track) -> bool) -> Result<bool, EditError> {
        let result = self
            .timeline
            .track(id)
            .map(flag)
            .ok_or_else(|| EditError::UnknownTrack(id.clone()));
        self.surfaced(result)
    }

    fn update_track<F>(&mut self, id: &TrackId, f: F) -> Result<(), EditError>
    where
        F: FnOnce(&mut Track),
    {
        let updated = self.timeline.update_track(id, f).cloned();
        let track = self.surfaced(updated.ok_or_else(|| EditError::UnknownTrack(id.clone())))?;
        info!(
            track = %track.id,
            visible = track.visible,
            locked = track.locked,
            muted = track.muted,
            gain = track.gain,
            "track updated"
        );
        self.tracks_changed();
        Ok(())
    }

    fn drag_track(&self) -> Option<TrackId> {
        let drag = self.drag.as_ref()?;
        self.timeline.block(&drag.block_id).map(|b| b.track_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip_ops::DragMode;
    use crate::events::SessionEvent;
    use crate::session::tests::{media_block, record_events, session_with};
    use reel_transport::BlockId;

    fn music() -> TrackId {
        TrackId::new("music")
    }

    #[test]
    fn test_muting_track_silences_running_block() {
        // Music muted, M gain 80 on [0, 60); at 10 s it must not sound
        let (mut session, _monitor) = session_with(vec![media_block("m", "music", 0.0, 60.0).with_gain(80)]);
        session.seek(10.0);
        session.play();
        assert_eq!(session.playing_ids(), vec![BlockId::new("m")]);

        session.set_track_muted(&music(), true).expect("mute");

        assert!(session.playing_ids().is_empty());
        assert!(session.active_ids().is_empty());

        session.set_track_muted(&music(), false).expect("unmute");
        assert_eq!(session.playing_ids(), vec![BlockId::new("m")]);
    }

    #[test]
    fn test_muted_track_never_starts() {
        let (mut session, _monitor) = session_with(vec![media_block("m", "music", 0.0, 60.0).with_gain(80)]);
        session.set_track_muted(&music(), true).expect("mute");
        session.seek(10.0);

        session.play();
        session.tick();

        assert!(session.playing_ids().is_empty());
    }

    #[test]
    fn test_hidden_and_locked_tracks_are_silent() {
        let (mut session, _monitor) = session_with(vec![
            media_block("d", "dialogue", 0.0, 60.0),
            media_block("n", "narration", 0.0, 60.0),
        ]);
        session.set_track_visible(&TrackId::new("dialogue"), false).expect("hide");
        session.set_track_locked(&TrackId::new("narration"), true).expect("lock");

        session.play();

        assert!(session.playing_ids().is_empty());
    }

    #[test]
    fn test_track_gain_refreshes_volume() {
        let (mut session, monitor) = session_with(vec![media_block("m", "music", 0.0, 60.0).with_gain(80)]);
        session.play();

        session.set_track_gain(&music(), 50).expect("gain");

        assert_eq!(monitor.last_volume("m.wav"), Some(0.4));
        assert_eq!(session.track(&music()).expect("track").gain, 50);
    }

    #[test]
    fn test_toggles_and_events() {
        let (mut session, _monitor) = session_with(vec![]);
        let events = record_events(&mut session);

        assert_eq!(session.toggle_track_muted(&music()), Ok(true));
        assert_eq!(session.toggle_track_muted(&music()), Ok(false));
        assert_eq!(session.toggle_track_visible(&music()), Ok(false));
        assert_eq!(session.toggle_track_locked(&music()), Ok(true));

        let changes = events
            .borrow()
            .iter()
            .filter(|e| **e == SessionEvent::TracksChanged)
            .count();
        assert_eq!(changes, 4);
    }

    #[test]
    fn test_unknown_track() {
        let (mut session, _monitor) = session_with(vec![]);
        let video = TrackId::new("video");

        assert_eq!(session.set_track_gain(&video, 10), Err(EditError::UnknownTrack(video.clone())));
        assert!(session.toggle_track_muted(&video).is_err());
    }

    #[test]
    fn test_locking_cancels_drag_on_that_track() {
        let (mut session, _monitor) = session_with(vec![media_block("m", "music", 0.0, 60.0)]);
        session.begin_drag(&BlockId::new("m"), DragMode::Move, 0.0).expect("drag");

        session.set_track_locked(&music(), true).expect("lock");

        assert!(!session.is_dragging());
    }
}
