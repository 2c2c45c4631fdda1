//! Media resolution, duration probing and decoding.

mod audio;

use std::fs::File;
use std::path::{Path, PathBuf};

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

pub use audio::AudioArc;

/// Resolve a block's media reference to a local file.
///
/// Accepts plain paths, `file://` locators and paths relative to `media_root`
/// (a leading `/` is tolerated, so server-style `/audio/x.mp3` references map
/// into the root). Remote locators resolve to `None`.
pub fn resolve_media_path(reference: &str, media_root: Option<&Path>) -> Option<PathBuf> {
    if reference.starts_with("http://") || reference.starts_with("https://") {
        return None;
    }
    let reference = reference.strip_prefix("file://").unwrap_or(reference);

    let direct = Path::new(reference);
    if direct.is_file() {
        return Some(direct.to_path_buf());
    }

    let root = media_root?;
    let joined = root.join(reference.trim_start_matches('/'));
    joined.is_file().then_some(joined)
}

fn open_format(path: &Path) -> anyhow::Result<Box<dyn FormatReader>> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    Ok(probed.format)
}

fn is_end_of_stream(err: &SymphoniaError) -> bool {
    matches!(err, SymphoniaError::IoError(e) if e.kind() == std::io::ErrorKind::UnexpectedEof)
}

/// Length of a media file in seconds.
///
/// Uses the container's frame count when it has one and otherwise walks the
/// packets without decoding them.
pub fn probe_duration(path: &Path) -> anyhow::Result<f64> {
    let mut format = open_format(path)?;

    let track = format
        .default_track()
        .ok_or_else(|| anyhow::anyhow!("no default track in {}", path.display()))?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| anyhow::anyhow!("unknown sample rate in {}", path.display()))?;

    if let Some(frames) = track.codec_params.n_frames {
        return Ok(frames as f64 / sample_rate as f64);
    }

    let mut frames = 0u64;
    loop {
        match format.next_packet() {
            Ok(packet) if packet.track_id() == track_id => frames += packet.dur(),
            Ok(_) => {}
            Err(e) if is_end_of_stream(&e) => break,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(frames as f64 / sample_rate as f64)
}

/// Decode a whole file to interleaved f32 samples.
pub fn decode_file(path: &Path) -> anyhow::Result<AudioArc> {
    let mut format = open_format(path)?;

    let track = format
        .default_track()
        .ok_or_else(|| anyhow::anyhow!("no default track in {}", path.display()))?;
    let sample_rate = track.codec_params.sample_rate.unwrap_or(44100);
    let mut channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(2) as u16;
    let track_id = track.id;

    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut samples = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(e) if is_end_of_stream(&e) => break,
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // a corrupt packet is skipped, the rest of the stream is still usable
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(e) => return Err(e.into()),
        };
        let spec = *decoded.spec();
        channels = spec.channels.count() as u16;

        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);
        samples.extend_from_slice(buffer.samples());
    }

    Ok(AudioArc::new(samples, sample_rate, channels))
}
