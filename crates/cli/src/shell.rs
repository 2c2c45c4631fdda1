//! Line-oriented interactive session. Playback keeps ticking while the shell
//! waits for input.

use anyhow::{Context, Result, bail};
use reel_core::{BlockId, Session, TickOutcome, TrackId, TrackKind, format_clock};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::commands;

const HELP: &str = "\
play | pause | stop | seek <secs> | ff | rew
select <block> | split | merge | copy | paste | delete
move <block> <secs> | resize <block> <secs>
mute|lock|hide <track> | gain <track> <0-100> | volume <0-100>
zoom in|out | show | help | quit";

pub async fn run(session: &mut Session) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut last_second = None;

    println!("{HELP}");
    loop {
        tokio::select! {
            ticked = session.wait_tick(), if session.is_playing() => {
                if !ticked {
                    continue;
                }
                let outcome = session.tick();
                let second = session.current_time().floor() as u64;
                if last_second != Some(second) || outcome == TickOutcome::Finished {
                    last_second = Some(second);
                    println!("{} {}", format_clock(session.current_time()), playing_summary(session));
                }
                if outcome == TickOutcome::Finished {
                    println!("end of timeline");
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match execute(session, line.trim()) {
                    Ok(true) => break,
                    Ok(false) => {}
                    Err(err) => eprintln!("{err:#}"),
                }
            }
        }
    }

    session.pause();
    Ok(())
}

fn playing_summary(session: &Session) -> String {
    let ids = session.playing_ids();
    if ids.is_empty() {
        return String::from("(silence)");
    }
    ids.iter().map(BlockId::as_str).collect::<Vec<_>>().join(" ")
}

/// Run one shell line. Returns `true` when the shell should exit.
fn execute(session: &mut Session, line: &str) -> Result<bool> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(false);
    };
    let args: Vec<&str> = words.collect();

    match (command, args.as_slice()) {
        ("quit" | "exit" | "q", []) => return Ok(true),
        ("help" | "?", []) => println!("{HELP}"),
        ("show" | "ls", []) => commands::show(session)?,

        ("play", []) => session.play(),
        ("pause", []) => session.pause(),
        ("stop", []) => session.stop(),
        ("seek", [secs]) => session.seek(number(secs)?),
        ("ff", []) => session.skip_forward(),
        ("rew", []) => session.skip_backward(),

        ("select", [block]) => session.select(&BlockId::new(*block))?,
        ("split", []) => {
            let id = session.split()?;
            println!("new block {id}");
        }
        ("merge", []) => {
            let id = session.merge()?;
            println!("merged into {id}");
        }
        ("copy", []) => session.copy()?,
        ("paste", []) => {
            let id = session.paste()?;
            println!("pasted {id} at {}", format_clock(session.current_time()));
        }
        ("delete", []) => {
            let block = session.delete()?;
            println!("deleted {}", block.id);
        }
        ("move", [block, secs]) => session.set_block_start(&BlockId::new(*block), number(secs)?)?,
        ("resize", [block, secs]) => session.set_block_duration(&BlockId::new(*block), number(secs)?)?,

        ("mute", [track]) => {
            let muted = session.toggle_track_muted(&track_id(session, track)?)?;
            println!("{track} {}", if muted { "muted" } else { "unmuted" });
        }
        ("lock", [track]) => {
            let locked = session.toggle_track_locked(&track_id(session, track)?)?;
            println!("{track} {}", if locked { "locked" } else { "unlocked" });
        }
        ("hide", [track]) => {
            let visible = session.toggle_track_visible(&track_id(session, track)?)?;
            println!("{track} {}", if visible { "shown" } else { "hidden" });
        }
        ("gain", [track, value]) => session.set_track_gain(&track_id(session, track)?, level(value)?)?,
        ("volume", [value]) => session.set_master_volume(level(value)?),

        ("zoom", ["in"]) => println!("zoom {:.1}", session.time_context_mut().zoom_in()),
        ("zoom", ["out"]) => println!("zoom {:.1}", session.time_context_mut().zoom_out()),

        _ => bail!("unrecognised command '{line}' (try 'help')"),
    }
    Ok(false)
}

/// Accept either a track id or a track kind name.
fn track_id(session: &Session, name: &str) -> Result<TrackId> {
    let id = TrackId::new(name);
    if session.track(&id).is_some() {
        return Ok(id);
    }
    let kind: TrackKind = name.parse().map_err(anyhow::Error::msg)?;
    session
        .track_by_kind(kind)
        .map(|track| track.id.clone())
        .with_context(|| format!("no {kind} track"))
}

fn number(text: &str) -> Result<f64> {
    text.parse().with_context(|| format!("'{text}' is not a number"))
}

fn level(text: &str) -> Result<u8> {
    let value: u16 = text.parse().with_context(|| format!("'{text}' is not a level"))?;
    Ok(value.min(100) as u8)
}
