use std::time::Duration;

use anyhow::{Context, Result};
use reel_core::{
    BlockId, GeneratedAudio, MediaProbe, NoticeLevel, Session, SessionEvent, TrackKind,
    format_clock,
};

/// Echo notices raised by the session to stderr.
pub fn print_notices(session: &mut Session) {
    session.subscribe(|event| {
        if let SessionEvent::Notice(notice) = event {
            let tag = match notice.level {
                NoticeLevel::Info => "info",
                NoticeLevel::Warning => "warning",
                NoticeLevel::Error => "error",
            };
            eprintln!("[{tag}] {}: {}", notice.title, notice.message);
        }
    });
}

pub fn show(session: &Session) -> Result<()> {
    println!(
        "timeline {} / {}",
        format_clock(session.current_time()),
        format_clock(session.total_duration())
    );
    for track in session.tracks() {
        let mut flags = Vec::new();
        if !track.visible {
            flags.push("hidden");
        }
        if track.locked {
            flags.push("locked");
        }
        if track.muted {
            flags.push("muted");
        }
        println!("\n{} ({}) gain {} {}", track.name, track.id, track.gain, flags.join(" "));

        for block in session.timeline().blocks_on_track(&track.id) {
            let marker = if session.selection() == Some(&block.id) { "*" } else { " " };
            println!(
                "{marker} {:<24} {}-{}  {:<28} {:?} gain {}{}",
                block.id.as_str(),
                format_clock(block.start_time),
                format_clock(block.end_time()),
                block.title,
                block.status,
                block.gain,
                block
                    .media_reference
                    .as_deref()
                    .map(|m| format!("  <{m}>"))
                    .unwrap_or_default(),
            );
        }
    }
    Ok(())
}

pub async fn play(session: &mut Session, from: f64, duration: Option<f64>) -> Result<()> {
    let window = duration.map(play_window).transpose()?;
    session.seek(from);
    session.play();
    println!("playing from {}", format_clock(session.current_time()));

    match window {
        Some(window) => {
            session.run_for(window).await;
            session.pause();
        }
        None => session.run().await,
    }

    println!("stopped at {}", format_clock(session.current_time()));
    Ok(())
}

pub fn split(session: &mut Session, block: &str, at: f64) -> Result<()> {
    session.select(&BlockId::new(block))?;
    session.seek(at);
    let second = session.split()?;
    println!("split {block} at {}; new block {second}", format_clock(at));
    Ok(())
}

pub fn merge(session: &mut Session, block: &str) -> Result<()> {
    session.select(&BlockId::new(block))?;
    let merged = session.merge()?;
    report_span(session, &merged);
    Ok(())
}

pub fn delete(session: &mut Session, block: &str) -> Result<()> {
    session.select(&BlockId::new(block))?;
    let removed = session.delete()?;
    println!("deleted {} \"{}\"", removed.id, removed.title);
    Ok(())
}

pub fn move_block(session: &mut Session, block: &str, start: f64) -> Result<()> {
    let id = BlockId::new(block);
    session.set_block_start(&id, start)?;
    report_span(session, &id);
    Ok(())
}

pub fn resize(session: &mut Session, block: &str, duration: f64) -> Result<()> {
    let id = BlockId::new(block);
    session.set_block_duration(&id, duration)?;
    report_span(session, &id);
    Ok(())
}

pub async fn import_upload(session: &mut Session, reference: &str, track: TrackKind, at: f64) -> Result<()> {
    let probe = MediaProbe::new(session.config().media_root.clone());
    session.seek(at);
    let id = session.import_upload(reference, track, &probe).await?;
    report_span(session, &id);
    Ok(())
}

pub async fn import_generated(
    session: &mut Session,
    reference: String,
    hint: Option<f64>,
    title: Option<String>,
    language: Option<String>,
) -> Result<()> {
    let probe = MediaProbe::new(session.config().media_root.clone());
    let audio = GeneratedAudio {
        duration_hint: hint,
        title,
        language,
        ..GeneratedAudio::new(reference)
    };
    let id = session.import_generated(audio, &probe).await?;
    report_span(session, &id);
    Ok(())
}

/// Wall-clock play length; negative values play nothing.
fn play_window(secs: f64) -> Result<Duration> {
    let secs = if secs < 0.0 { 0.0 } else { secs };
    Duration::try_from_secs_f64(secs)
        .with_context(|| format!("cannot play for {secs} seconds"))
}

fn report_span(session: &Session, id: &BlockId) {
    match session.block(id) {
        Some(block) => println!(
            "{id}: {}-{} ({:.1}s)",
            format_clock(block.start_time),
            format_clock(block.end_time()),
            block.duration
        ),
        None => println!("{id}: gone"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_play_window_bounds() {
        assert_eq!(play_window(2.5).unwrap(), Duration::from_millis(2500));
        assert_eq!(play_window(-3.0).unwrap(), Duration::ZERO);
        assert!(play_window(f64::INFINITY).is_err());
        assert!(play_window(f64::NAN).is_err());
        assert!(play_window(1e300).is_err());
    }
}
