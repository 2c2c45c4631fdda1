use std::time::Duration;

use reel_engine::{AudioResourceManager, ResourceBackend, ResourceError};
use reel_project::{KeyValueStore, LoadedBlocks, Persistence, SeedReason};
use reel_transport::{Block, BlockId, MAX_GAIN, Timeline, Track};
use tracing::{debug, warn};

use crate::clip_ops::DragSession;
use crate::config::EditorConfig;
use crate::error::EditError;
use crate::events::{EventBus, Notice, SessionEvent, SubscriptionId};
use crate::scheduler::{Scheduler, TickOutcome, TransportState};
use crate::time::TimeContext;

/// One open timeline: the block/track aggregate, its playback scheduler, the
/// audio resources behind it and the persistence it is saved through.
///
/// All mutation goes through `Session` methods. Everything runs on one thread;
/// the only suspension point is waiting for the next tick.
pub struct Session {
    pub(crate) timeline: Timeline,
    pub(crate) scheduler: Scheduler,
    pub(crate) resources: AudioResourceManager,
    persistence: Persistence,
    pub(crate) time: TimeContext,
    pub(crate) selection: Option<BlockId>,
    pub(crate) clipboard: Option<BlockId>,
    pub(crate) drag: Option<DragSession>,
    master_volume: u8,
    events: EventBus,
    pub(crate) config: EditorConfig,
    seeded: Option<SeedReason>,
}

impl Session {
    /// Load the block set from `store` (or the seed set) onto the standard
    /// five tracks and open resources for every block with media.
    pub fn new(
        config: &EditorConfig,
        backend: impl ResourceBackend + 'static,
        store: impl KeyValueStore + 'static,
    ) -> Self {
        let persistence = Persistence::new(store);
        let tracks = Track::default_set();
        let loaded = persistence.load(&tracks);
        let seeded = match &loaded {
            LoadedBlocks::Seeded { reason, .. } => Some(reason.clone()),
            LoadedBlocks::Stored(_) => None,
        };
        let timeline = Timeline::new(tracks, loaded.into_blocks());

        let mut resources = AudioResourceManager::new(backend);
        for e in resources.sync(&timeline) {
            warn!(block = %e.block(), "{e}");
        }

        Self {
            timeline,
            scheduler: Scheduler::new(config.tick_period()),
            resources,
            persistence,
            time: TimeContext::new(config.pixels_per_second, config.snap_to_grid),
            selection: None,
            clipboard: None,
            drag: None,
            master_volume: MAX_GAIN,
            events: EventBus::default(),
            config: config.clone(),
            seeded,
        }
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn tracks(&self) -> &[Track] {
        self.timeline.tracks()
    }

    pub fn blocks(&self) -> &[Block] {
        self.timeline.blocks()
    }

    pub fn block(&self, id: &BlockId) -> Option<&Block> {
        self.timeline.block(id)
    }

    pub fn total_duration(&self) -> f64 {
        self.timeline.total_duration()
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Why the seed set was used at startup, if it was.
    pub fn seeded_from(&self) -> Option<&SeedReason> {
        self.seeded.as_ref()
    }

    pub fn time_context(&self) -> &TimeContext {
        &self.time
    }

    pub fn time_context_mut(&mut self) -> &mut TimeContext {
        &mut self.time
    }

    pub fn selection(&self) -> Option<&BlockId> {
        self.selection.as_ref()
    }

    pub fn clipboard(&self) -> Option<&BlockId> {
        self.clipboard.as_ref()
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&SessionEvent) + 'static) -> SubscriptionId {
        self.events.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    // Transport

    pub fn current_time(&self) -> f64 {
        self.scheduler.current_time()
    }

    pub fn transport_state(&self) -> TransportState {
        self.scheduler.state()
    }

    pub fn is_playing(&self) -> bool {
        self.scheduler.is_running()
    }

    /// Blocks the scheduler has started and not yet stopped.
    pub fn active_ids(&self) -> Vec<BlockId> {
        self.scheduler.active_ids()
    }

    /// Blocks whose resource is currently producing sound.
    pub fn playing_ids(&self) -> Vec<BlockId> {
        self.resources.playing_ids()
    }

    pub fn has_resource(&self, id: &BlockId) -> bool {
        self.resources.has_resource(id)
    }

    pub fn master_volume(&self) -> u8 {
        self.master_volume
    }

    /// Preview level, 0..=100, applied on top of every block's effective gain.
    pub fn set_master_volume(&mut self, volume: u8) {
        self.master_volume = volume.min(MAX_GAIN);
        self.refresh_playback();
    }

    fn master_gain(&self) -> f32 {
        self.master_volume as f32 / MAX_GAIN as f32
    }

    pub fn play(&mut self) {
        let master = self.master_gain();
        if let Some(errors) = self.scheduler.play(&self.timeline, &mut self.resources, master) {
            self.report(errors);
            self.emit_transport();
        }
    }

    pub fn pause(&mut self) {
        let was_running = self.scheduler.is_running();
        self.scheduler.pause(&mut self.resources);
        if was_running {
            self.emit_transport();
        }
    }

    pub fn toggle_playback(&mut self) {
        if self.is_playing() {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Pause and return the playhead to the start.
    pub fn stop(&mut self) {
        self.scheduler.pause(&mut self.resources);
        let master = self.master_gain();
        self.scheduler.seek(0.0, &self.timeline, &mut self.resources, master);
        self.emit_transport();
    }

    pub fn seek(&mut self, time: f64) {
        let master = self.master_gain();
        let errors = self.scheduler.seek(time, &self.timeline, &mut self.resources, master);
        self.report(errors);
        self.emit_transport();
    }

    pub fn skip(&mut self, delta_secs: f64) {
        self.seek(self.current_time() + delta_secs);
    }

    pub fn skip_forward(&mut self) {
        self.skip(self.config.skip_secs);
    }

    pub fn skip_backward(&mut self) {
        self.skip(-self.config.skip_secs);
    }

    /// One scheduler step. Normally driven by `run`.
    pub fn tick(&mut self) -> TickOutcome {
        let master = self.master_gain();
        let (outcome, errors) = self.scheduler.tick(&self.timeline, &mut self.resources, master);
        self.report(errors);
        if outcome != TickOutcome::Idle {
            self.emit_transport();
        }
        outcome
    }

    /// Wait for the next tick of the running transport. Resolves to `false`
    /// at once when stopped. Cancel-safe, for use in `tokio::select!`.
    pub async fn wait_tick(&mut self) -> bool {
        self.scheduler.wait_tick().await
    }

    /// Drive ticks until playback stops.
    pub async fn run(&mut self) {
        while self.wait_tick().await {
            self.tick();
        }
    }

    /// Drive ticks for at most `duration`, returning whether still playing.
    pub async fn run_for(&mut self, duration: Duration) -> bool {
        let _ = tokio::time::timeout(duration, self.run()).await;
        self.is_playing()
    }

    // Change plumbing

    /// Bring resources, persistence and playback in line after the block set
    /// changed, then notify.
    pub(crate) fn blocks_changed(&mut self) {
        self.apply_block_change(true);
    }

    pub(crate) fn apply_block_change(&mut self, persist: bool) {
        let mut errors = self.resources.sync(&self.timeline);

        if persist && !self.persistence.save(self.timeline.blocks()) {
            self.notify(Notice::warning(
                "Changes not saved",
                "the timeline could not be written to storage; edits are kept in memory",
            ));
        }

        let master = self.master_gain();
        errors.extend(self.scheduler.refresh(&self.timeline, &mut self.resources, master));
        self.report(errors);

        let total_duration = self.timeline.total_duration();
        debug!(blocks = self.timeline.blocks().len(), total_duration, "blocks changed");
        self.events.emit(SessionEvent::BlocksChanged { total_duration });
    }

    pub(crate) fn tracks_changed(&mut self) {
        self.refresh_playback();
        self.events.emit(SessionEvent::TracksChanged);
    }

    fn refresh_playback(&mut self) {
        let master = self.master_gain();
        let errors = self.scheduler.refresh(&self.timeline, &mut self.resources, master);
        self.report(errors);
    }

    /// Stop and release a block's resource right away, even mid-tick.
    pub(crate) fn retire(&mut self, id: &BlockId) {
        self.resources.retire(id);
        self.scheduler.forget(id);
    }

    pub(crate) fn set_selection(&mut self, selection: Option<BlockId>) {
        if self.selection != selection {
            self.selection = selection.clone();
            self.events.emit(SessionEvent::SelectionChanged(selection));
        }
    }

    pub(crate) fn notify(&mut self, notice: Notice) {
        self.events.emit(SessionEvent::Notice(notice));
    }

    /// Surface a rejected edit as a notice and hand the result back.
    pub(crate) fn surfaced<T>(&mut self, result: Result<T, EditError>) -> Result<T, EditError> {
        if let Err(e) = &result {
            debug!("edit rejected: {e}");
            self.notify(Notice::from(e));
        }
        result
    }

    fn report(&mut self, errors: Vec<ResourceError>) {
        for e in errors {
            warn!(block = %e.block(), "{e}");
            self.notify(Notice::error("Playback problem", e.to_string()));
        }
    }

    fn emit_transport(&mut self) {
        self.events.emit(SessionEvent::Transport {
            state: self.scheduler.state(),
            current_time: self.scheduler.current_time(),
        });
    }

    pub(crate) fn clear_stored_blocks(&mut self) {
        if let Err(e) = self.persistence.clear() {
            warn!("failed to clear stored timeline: {e}");
        }
    }
}
