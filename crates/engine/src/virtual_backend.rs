//! A backend that produces no sound and records every call made to its
//! resources. Used for headless sessions and for asserting scheduler
//! behavior.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::rc::Rc;

use crate::resource::{PlayableResource, ResourceBackend};

#[derive(Debug, Clone, PartialEq)]
pub enum VirtualCall {
    Load,
    Play,
    Pause,
    Seek(f64),
    Volume(f32),
    Dropped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VirtualEvent {
    pub resource: u64,
    pub reference: String,
    pub call: VirtualCall,
}

#[derive(Default)]
struct MonitorState {
    events: Vec<VirtualEvent>,
    live: HashMap<u64, String>,
}

/// Shared view of everything a `VirtualBackend` and its resources did.
#[derive(Clone, Default)]
pub struct VirtualMonitor(Rc<RefCell<MonitorState>>);

impl VirtualMonitor {
    fn record(&self, resource: u64, reference: &str, call: VirtualCall) {
        let mut state = self.0.borrow_mut();
        match call {
            VirtualCall::Load => {
                state.live.insert(resource, reference.to_string());
            }
            VirtualCall::Dropped => {
                state.live.remove(&resource);
            }
            _ => {}
        }
        state.events.push(VirtualEvent {
            resource,
            reference: reference.to_string(),
            call,
        });
    }

    pub fn events(&self) -> Vec<VirtualEvent> {
        self.0.borrow().events.clone()
    }

    pub fn calls_for(&self, reference: &str) -> Vec<VirtualCall> {
        self.0
            .borrow()
            .events
            .iter()
            .filter(|e| e.reference == reference)
            .map(|e| e.call.clone())
            .collect()
    }

    pub fn loads(&self, reference: &str) -> usize {
        self.calls_for(reference)
            .iter()
            .filter(|c| **c == VirtualCall::Load)
            .count()
    }

    pub fn seeks(&self, reference: &str) -> Vec<f64> {
        self.calls_for(reference)
            .into_iter()
            .filter_map(|c| match c {
                VirtualCall::Seek(offset) => Some(offset),
                _ => None,
            })
            .collect()
    }

    /// Last volume set on any resource for `reference`.
    pub fn last_volume(&self, reference: &str) -> Option<f32> {
        self.calls_for(reference).into_iter().rev().find_map(|c| match c {
            VirtualCall::Volume(v) => Some(v),
            _ => None,
        })
    }

    /// Whether a resource for `reference` is still held by someone.
    pub fn is_live(&self, reference: &str) -> bool {
        self.0.borrow().live.values().any(|r| r == reference)
    }

    pub fn clear(&self) {
        self.0.borrow_mut().events.clear();
    }
}

#[derive(Default)]
pub struct VirtualBackend {
    monitor: VirtualMonitor,
    next_id: u64,
    media_root: Option<PathBuf>,
    failing_loads: HashSet<String>,
    failing_plays: HashSet<String>,
}

impl VirtualBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Probe local media under `root` so resources can report a duration.
    pub fn with_media_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.media_root = Some(root.into());
        self
    }

    pub fn monitor(&self) -> VirtualMonitor {
        self.monitor.clone()
    }

    pub fn fail_to_load(&mut self, reference: impl Into<String>) {
        self.failing_loads.insert(reference.into());
    }

    pub fn fail_to_play(&mut self, reference: impl Into<String>) {
        self.failing_plays.insert(reference.into());
    }
}

impl ResourceBackend for VirtualBackend {
    fn load(&mut self, reference: &str) -> anyhow::Result<Box<dyn PlayableResource>> {
        if self.failing_loads.contains(reference) {
            anyhow::bail!("media unavailable: {reference}");
        }

        let duration = reel_decode::resolve_media_path(reference, self.media_root.as_deref())
            .and_then(|path| reel_decode::probe_duration(&path).ok());

        let id = self.next_id;
        self.next_id += 1;
        self.monitor.record(id, reference, VirtualCall::Load);

        Ok(Box::new(VirtualResource {
            id,
            reference: reference.to_string(),
            monitor: self.monitor.clone(),
            playing: false,
            offset: 0.0,
            volume: 1.0,
            duration,
            fail_play: self.failing_plays.contains(reference),
        }))
    }
}

pub struct VirtualResource {
    id: u64,
    reference: String,
    monitor: VirtualMonitor,
    playing: bool,
    offset: f64,
    volume: f32,
    duration: Option<f64>,
    fail_play: bool,
}

impl VirtualResource {
    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }
}

impl PlayableResource for VirtualResource {
    fn play(&mut self) -> anyhow::Result<()> {
        if self.fail_play {
            anyhow::bail!("playback refused for {}", self.reference);
        }
        self.playing = true;
        self.monitor.record(self.id, &self.reference, VirtualCall::Play);
        Ok(())
    }

    fn pause(&mut self) {
        self.playing = false;
        self.monitor.record(self.id, &self.reference, VirtualCall::Pause);
    }

    fn seek(&mut self, offset_secs: f64) -> anyhow::Result<()> {
        self.offset = offset_secs;
        self.monitor
            .record(self.id, &self.reference, VirtualCall::Seek(offset_secs));
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
        self.monitor
            .record(self.id, &self.reference, VirtualCall::Volume(volume));
    }

    fn duration(&self) -> Option<f64> {
        self.duration
    }

    fn is_playing(&self) -> bool {
        self.playing
    }
}

impl Drop for VirtualResource {
    fn drop(&mut self) {
        self.monitor.record(self.id, &self.reference, VirtualCall::Dropped);
    }
}
