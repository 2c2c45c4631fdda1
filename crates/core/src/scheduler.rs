//! The playback scheduler: a virtual clock plus a reconciliation loop that
//! decides which block resources should be sounding and at what offset.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use reel_engine::{AudioResourceManager, ResourceError};
use reel_transport::{BlockId, Timeline};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Stopped,
    Running,
}

impl TransportState {
    pub fn is_running(&self) -> bool {
        matches!(self, TransportState::Running)
    }
}

/// A cancellable repeating timer. At most one is armed at a time.
///
/// The underlying interval is created on the first `wait`, inside whatever
/// runtime drives the session, and dropped on `cancel`.
#[derive(Debug)]
pub struct TickTimer {
    period: Duration,
    armed: bool,
    interval: Option<Interval>,
}

impl TickTimer {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            armed: false,
            interval: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Returns `false` if the timer was already armed.
    pub fn arm(&mut self) -> bool {
        if self.armed {
            return false;
        }
        self.armed = true;
        true
    }

    pub fn cancel(&mut self) {
        self.armed = false;
        self.interval = None;
    }

    /// Wait for the next tick. Resolves to `false` immediately when the timer
    /// is not armed.
    pub async fn wait(&mut self) -> bool {
        if !self.armed {
            return false;
        }
        let period = self.period;
        let interval = self.interval.get_or_insert_with(|| {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });
        interval.tick().await;
        true
    }
}

/// What a tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not running; nothing happened.
    Idle,
    Advanced,
    /// The clock reached the end of the timeline and playback stopped.
    Finished,
}

/// Playback state machine over a `Timeline`.
///
/// The scheduler only reads the timeline. It tracks which blocks it has
/// started ("active") together with the start time each was started at, so a
/// block moved while sounding can be reseeked.
#[derive(Debug)]
pub struct Scheduler {
    state: TransportState,
    current_time: f64,
    active: HashMap<BlockId, f64>,
    timer: TickTimer,
}

impl Scheduler {
    pub fn new(period: Duration) -> Self {
        Self {
            state: TransportState::Stopped,
            current_time: 0.0,
            active: HashMap::new(),
            timer: TickTimer::new(period),
        }
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn timer(&self) -> &TickTimer {
        &self.timer
    }

    /// Blocks currently started by the scheduler, sorted.
    pub fn active_ids(&self) -> Vec<BlockId> {
        let mut ids: Vec<BlockId> = self.active.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn is_active(&self, id: &BlockId) -> bool {
        self.active.contains_key(id)
    }

    /// Stopped -> Running. Starting at or past the end rewinds to 0 first.
    ///
    /// Returns `None` if already running.
    pub fn play(
        &mut self,
        timeline: &Timeline,
        resources: &mut AudioResourceManager,
        master: f32,
    ) -> Option<Vec<ResourceError>> {
        if self.is_running() || !self.timer.arm() {
            return None;
        }
        if self.current_time >= timeline.total_duration() {
            self.current_time = 0.0;
        }
        self.state = TransportState::Running;
        info!(time = self.current_time, "playback started");
        Some(self.reconcile(timeline, resources, master, false))
    }

    /// Running -> Stopped. Pauses every active resource and cancels the tick.
    pub fn pause(&mut self, resources: &mut AudioResourceManager) {
        for id in self.active.keys() {
            resources.pause(id);
        }
        self.active.clear();
        self.timer.cancel();
        if self.is_running() {
            info!(time = self.current_time, "playback paused");
        }
        self.state = TransportState::Stopped;
    }

    /// Advance the clock by one period and reconcile.
    pub fn tick(
        &mut self,
        timeline: &Timeline,
        resources: &mut AudioResourceManager,
        master: f32,
    ) -> (TickOutcome, Vec<ResourceError>) {
        if !self.is_running() {
            return (TickOutcome::Idle, Vec::new());
        }

        // Whole milliseconds, so repeated 0.1 s steps land on exact values.
        let advanced = self.current_time + self.timer.period().as_secs_f64();
        self.current_time = (advanced * 1000.0).round() / 1000.0;

        let total = timeline.total_duration();
        if self.current_time >= total {
            self.current_time = total;
            self.pause(resources);
            info!(time = total, "reached end of timeline");
            return (TickOutcome::Finished, Vec::new());
        }

        let errors = self.reconcile(timeline, resources, master, false);
        (TickOutcome::Advanced, errors)
    }

    /// Move the playhead to `time`, clamped to `[0, total_duration]`. While
    /// running, resources are reconciled immediately; blocks that stay active
    /// are reseeked because the clock jumped.
    pub fn seek(
        &mut self,
        time: f64,
        timeline: &Timeline,
        resources: &mut AudioResourceManager,
        master: f32,
    ) -> Vec<ResourceError> {
        let time = if time.is_finite() { time } else { 0.0 };
        self.current_time = time.clamp(0.0, timeline.total_duration());
        debug!(time = self.current_time, "seek");

        if self.is_running() {
            self.reconcile(timeline, resources, master, true)
        } else {
            Vec::new()
        }
    }

    /// Re-run reconciliation after the timeline changed underneath a running
    /// transport. The playhead is clamped if the timeline got shorter.
    pub fn refresh(
        &mut self,
        timeline: &Timeline,
        resources: &mut AudioResourceManager,
        master: f32,
    ) -> Vec<ResourceError> {
        self.current_time = self.current_time.min(timeline.total_duration());
        if self.is_running() {
            self.reconcile(timeline, resources, master, false)
        } else {
            Vec::new()
        }
    }

    /// Drop a block from the active set without touching its resource. Used
    /// when the resource has already been retired.
    pub fn forget(&mut self, id: &BlockId) -> bool {
        self.active.remove(id).is_some()
    }

    /// Wait for the next tick of the armed timer.
    pub async fn wait_tick(&mut self) -> bool {
        self.timer.wait().await
    }

    fn reconcile(
        &mut self,
        timeline: &Timeline,
        resources: &mut AudioResourceManager,
        master: f32,
        jumped: bool,
    ) -> Vec<ResourceError> {
        let time = self.current_time;
        let wanted = timeline.active_blocks_at(time);
        let wanted_ids: HashSet<&BlockId> = wanted.iter().map(|b| &b.id).collect();

        let leaving: Vec<BlockId> = self
            .active
            .keys()
            .filter(|id| !wanted_ids.contains(id))
            .cloned()
            .collect();
        for id in leaving {
            resources.pause(&id);
            self.active.remove(&id);
            debug!(block = %id, time, "block left range");
        }

        let mut errors = Vec::new();
        for block in wanted {
            let volume = timeline.effective_gain(block) * master;
            let anchored = self
                .active
                .get(&block.id)
                .is_some_and(|start| *start == block.start_time);

            if anchored && !jumped {
                resources.set_volume(&block.id, volume);
                continue;
            }

            self.active.insert(block.id.clone(), block.start_time);
            let offset = time - block.start_time;
            debug!(block = %block.id, time, offset, "starting block");
            if let Err(e) = resources.seek_and_play(block, offset, volume) {
                errors.push(e);
            }
        }
        errors
    }
}
