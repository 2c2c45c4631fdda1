//! Resources that play through the default output device.
//!
//! Every resource is a voice inside one cpal output stream. The main thread
//! talks to the audio callback only through a lock-free command queue; decoded
//! audio crosses over as `basedrop::Shared` so it is never freed on the audio
//! thread.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Instant;

use basedrop::{Collector, Handle, Shared};
use cpal::{
    FromSample, SizedSample,
    traits::{DeviceTrait, HostTrait, StreamTrait},
};
use reel_decode::AudioArc;
use tracing::{error, warn};

use crate::resource::{PlayableResource, ResourceBackend};

const COMMAND_CAPACITY: usize = 1024;

type VoiceId = u64;

enum VoiceCommand {
    Insert { voice: VoiceId, audio: Shared<AudioArc> },
    Play(VoiceId),
    Pause(VoiceId),
    Seek { voice: VoiceId, frame: usize },
    Volume { voice: VoiceId, gain: f32 },
    Remove(VoiceId),
}

struct Voice {
    id: VoiceId,
    audio: Shared<AudioArc>,
    frame: usize,
    gain: f32,
    playing: bool,
}

// `_stream` is declared first so the callback, and the voices it owns, are
// dropped before the collector.
struct MixerLink {
    _stream: cpal::Stream,
    commands: RefCell<rtrb::Producer<VoiceCommand>>,
    collector: RefCell<Collector>,
    handle: Handle,
    next_voice: Cell<VoiceId>,
    sample_rate: u32,
}

impl MixerLink {
    fn send(&self, command: VoiceCommand) {
        if self.commands.borrow_mut().push(command).is_err() {
            warn!("voice command queue full, dropping command");
        }
    }

    fn collect(&self) {
        self.collector.borrow_mut().collect();
    }
}

pub struct DeviceBackend {
    link: Rc<MixerLink>,
    media_root: Option<PathBuf>,
    /// Decoded media by resolved path, so pasted copies share samples.
    cache: HashMap<PathBuf, AudioArc>,
}

impl DeviceBackend {
    /// Open the default output device and start its (initially silent) stream.
    pub fn open(media_root: Option<PathBuf>) -> anyhow::Result<Self> {
        let collector = Collector::new();
        let handle = collector.handle();
        let (command_tx, command_rx) = rtrb::RingBuffer::<VoiceCommand>::new(COMMAND_CAPACITY);

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| anyhow::anyhow!("no output device found"))?;
        let config = device.default_output_config()?;
        let sample_rate = config.sample_rate().0;

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config.into(), command_rx)?,
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config.into(), command_rx)?,
            sample_format => anyhow::bail!("unsupported sample format '{sample_format}'"),
        };
        stream.play()?;

        Ok(Self {
            link: Rc::new(MixerLink {
                _stream: stream,
                commands: RefCell::new(command_tx),
                collector: RefCell::new(collector),
                handle,
                next_voice: Cell::new(0),
                sample_rate,
            }),
            media_root,
            cache: HashMap::new(),
        })
    }

    fn decoded(&mut self, path: PathBuf) -> anyhow::Result<AudioArc> {
        if let Some(audio) = self.cache.get(&path) {
            return Ok(audio.clone());
        }
        let audio = reel_decode::decode_file(&path)?.resample(self.link.sample_rate)?;
        self.cache.insert(path, audio.clone());
        Ok(audio)
    }
}

impl ResourceBackend for DeviceBackend {
    fn load(&mut self, reference: &str) -> anyhow::Result<Box<dyn PlayableResource>> {
        let path = reel_decode::resolve_media_path(reference, self.media_root.as_deref())
            .ok_or_else(|| anyhow::anyhow!("media not found: {reference}"))?;
        let audio = self.decoded(path)?;
        let duration = audio.duration_secs();

        let voice = self.link.next_voice.get();
        self.link.next_voice.set(voice + 1);
        self.link.send(VoiceCommand::Insert {
            voice,
            audio: Shared::new(&self.link.handle, audio.clone()),
        });
        self.link.collect();

        Ok(Box::new(DeviceResource {
            voice,
            link: Rc::clone(&self.link),
            audio,
            head: PlayHead::new(duration),
        }))
    }
}

/// Main-thread mirror of a voice's position. The audio thread stops a voice
/// at the end of its media without reporting back, so the end is derived
/// from elapsed time instead.
#[derive(Debug, Clone, Copy)]
struct PlayHead {
    duration: f64,
    offset: f64,
    started: Option<Instant>,
}

impl PlayHead {
    fn new(duration: f64) -> Self {
        Self {
            duration,
            offset: 0.0,
            started: None,
        }
    }

    fn position(&self, now: Instant) -> f64 {
        let elapsed = self
            .started
            .map_or(0.0, |at| now.saturating_duration_since(at).as_secs_f64());
        (self.offset + elapsed).min(self.duration)
    }

    fn play(&mut self, now: Instant) {
        if self.started.is_none() {
            self.started = Some(now);
        }
    }

    fn pause(&mut self, now: Instant) {
        self.offset = self.position(now);
        self.started = None;
    }

    fn seek(&mut self, offset: f64, now: Instant) {
        self.offset = offset.max(0.0).min(self.duration);
        if self.started.is_some() {
            self.started = Some(now);
        }
    }

    fn is_sounding(&self, now: Instant) -> bool {
        self.started.is_some() && self.position(now) < self.duration
    }
}

pub struct DeviceResource {
    voice: VoiceId,
    link: Rc<MixerLink>,
    audio: AudioArc,
    head: PlayHead,
}

impl PlayableResource for DeviceResource {
    fn play(&mut self) -> anyhow::Result<()> {
        self.link.send(VoiceCommand::Play(self.voice));
        self.head.play(Instant::now());
        Ok(())
    }

    fn pause(&mut self) {
        self.link.send(VoiceCommand::Pause(self.voice));
        self.head.pause(Instant::now());
    }

    fn seek(&mut self, offset_secs: f64) -> anyhow::Result<()> {
        let frame = self.audio.frame_at(offset_secs);
        self.link.send(VoiceCommand::Seek {
            voice: self.voice,
            frame,
        });
        self.head.seek(offset_secs, Instant::now());
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) {
        self.link.send(VoiceCommand::Volume {
            voice: self.voice,
            gain: volume,
        });
    }

    fn duration(&self) -> Option<f64> {
        Some(self.head.duration)
    }

    fn is_playing(&self) -> bool {
        self.head.is_sounding(Instant::now())
    }
}

impl Drop for DeviceResource {
    fn drop(&mut self) {
        self.link.send(VoiceCommand::Remove(self.voice));
        self.link.collect();
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut command_rx: rtrb::Consumer<VoiceCommand>,
) -> anyhow::Result<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let output_channels = config.channels as usize;
    let mut voices: Vec<Voice> = Vec::with_capacity(64);

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            while let Ok(command) = command_rx.pop() {
                apply(&mut voices, command);
            }

            for frame in data.chunks_mut(output_channels) {
                for (ch, sample) in frame.iter_mut().enumerate() {
                    let mixed: f32 = voices
                        .iter()
                        .filter(|v| v.playing)
                        .map(|v| v.audio.sample(v.frame, ch) * v.gain)
                        .sum();
                    *sample = T::from_sample(mixed);
                }

                for voice in voices.iter_mut().filter(|v| v.playing) {
                    voice.frame += 1;
                    if voice.frame >= voice.audio.frames() {
                        voice.playing = false;
                    }
                }
            }
        },
        |err| error!("output stream error: {err}"),
        None,
    )?;

    Ok(stream)
}

fn apply(voices: &mut Vec<Voice>, command: VoiceCommand) {
    match command {
        VoiceCommand::Insert { voice, audio } => voices.push(Voice {
            id: voice,
            audio,
            frame: 0,
            gain: 1.0,
            playing: false,
        }),
        VoiceCommand::Remove(id) => voices.retain(|v| v.id != id),
        VoiceCommand::Play(id) => {
            if let Some(v) = voice_mut(voices, id) {
                v.playing = v.frame < v.audio.frames();
            }
        }
        VoiceCommand::Pause(id) => {
            if let Some(v) = voice_mut(voices, id) {
                v.playing = false;
            }
        }
        VoiceCommand::Seek { voice, frame } => {
            if let Some(v) = voice_mut(voices, voice) {
                v.frame = frame;
            }
        }
        VoiceCommand::Volume { voice, gain } => {
            if let Some(v) = voice_mut(voices, voice) {
                v.gain = gain;
            }
        }
    }
}

fn voice_mut(voices: &mut [Voice], id: VoiceId) -> Option<&mut Voice> {
    voices.iter_mut().find(|v| v.id == id)
}
