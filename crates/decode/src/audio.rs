use std::sync::Arc;

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

/// Decoded, immutable interleaved samples.
///
/// Cloning only bumps the reference count on the sample slice, so one decoded
/// file can back several playable resources (a block and its pasted copies).
#[derive(Clone)]
pub struct AudioArc {
    samples: Arc<[f32]>,
    sample_rate: u32,
    channels: u16,
}

impl AudioArc {
    /// # Panics
    ///
    /// Panics if `channels` is 0 or if `samples.len()` is not divisible by `channels`.
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        assert!(channels > 0, "channels must be greater than 0");
        assert_eq!(
            samples.len() % channels as usize,
            0,
            "samples.len() must be divisible by channels"
        );
        Self {
            samples: Arc::from(samples),
            sample_rate,
            channels,
        }
    }

    #[inline]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn samples_arc(&self) -> &Arc<[f32]> {
        &self.samples
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline]
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Samples per channel.
    #[inline]
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Frame index for an offset in seconds, clamped to the end of the audio.
    pub fn frame_at(&self, offset_secs: f64) -> usize {
        let frame = (offset_secs.max(0.0) * self.sample_rate as f64) as usize;
        frame.min(self.frames())
    }

    /// Sample for `channel` at `frame`, folding extra output channels onto the
    /// available ones. Out-of-range frames read as silence.
    #[inline]
    pub fn sample(&self, frame: usize, channel: usize) -> f32 {
        let channels = self.channels as usize;
        self.samples
            .get(frame * channels + channel % channels)
            .copied()
            .unwrap_or(0.0)
    }

    /// Resample to `target_sample_rate`; a same-rate call is a cheap clone.
    pub fn resample(&self, target_sample_rate: u32) -> anyhow::Result<Self> {
        if self.sample_rate == target_sample_rate {
            return Ok(self.clone());
        }
        resample_audio(self, target_sample_rate)
    }
}

impl std::fmt::Debug for AudioArc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioArc")
            .field("frames", &self.frames())
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .finish()
    }
}

fn resample_audio(audio: &AudioArc, target_sample_rate: u32) -> anyhow::Result<AudioArc> {
    let channels = audio.channels as usize;
    let input_frames = audio.frames();
    if input_frames == 0 {
        return Ok(AudioArc::new(Vec::new(), target_sample_rate, audio.channels));
    }

    let ratio = target_sample_rate as f64 / audio.sample_rate as f64;

    // rubato works on one Vec per channel
    let mut input = vec![Vec::with_capacity(input_frames); channels];
    for frame in audio.samples.chunks_exact(channels) {
        for (ch, sample) in frame.iter().enumerate() {
            input[ch].push(*sample);
        }
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, input_frames, channels)?;
    let output = resampler.process(&input, None)?;

    let output_frames = output.first().map_or(0, Vec::len);
    let mut samples = Vec::with_capacity(output_frames * channels);
    for frame in 0..output_frames {
        for channel in &output {
            samples.push(channel[frame]);
        }
    }

    Ok(AudioArc::new(samples, target_sample_rate, audio.channels))
}
