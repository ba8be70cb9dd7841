use nocturne::events::{Level, PlayerEvent};
use nocturne::model::{Theme, duration_label};
use nocturne::output::{AudioOutput, NullOutput, RodioOutput};
use nocturne::session::Session;
use nocturne::storage::Storage;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default)]
struct CliArgs {
    data_dir: Option<PathBuf>,
    null_audio: bool,
    stations: Option<usize>,
}

fn main() -> anyhow::Result<()> {
    let args = parse_args(std::env::args().skip(1).collect())?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let storage = match &args.data_dir {
        Some(dir) => Storage::open(dir.clone())?,
        None => Storage::open_default()?,
    };

    let audio: Box<dyn AudioOutput> = if args.null_audio {
        Box::new(NullOutput::new())
    } else {
        match RodioOutput::new() {
            Ok(output) => Box::new(output),
            Err(err) => {
                eprintln!("no audio device available ({err:#}), running silent");
                Box::new(NullOutput::new())
            }
        }
    };

    let mut session = Session::new(storage, audio);
    session.subscribe(print_event);

    if let Some(limit) = args.stations {
        session.load_stations(limit);
    }

    println!("nocturne — type 'help' for commands");

    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });

    let mut last_second = Instant::now();
    loop {
        session.pump();
        if last_second.elapsed() >= Duration::from_secs(1) {
            session.tick_second();
            last_second = Instant::now();
        }

        match rx.recv_timeout(Duration::from_millis(250)) {
            Ok(line) => {
                if !run_command(&mut session, line.trim()) {
                    break;
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    Ok(())
}

fn parse_args(args: Vec<String>) -> anyhow::Result<CliArgs> {
    let mut out = CliArgs::default();
    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--data-dir" => {
                index += 1;
                let Some(value) = args.get(index) else {
                    anyhow::bail!("--data-dir requires a path");
                };
                out.data_dir = Some(PathBuf::from(value));
            }
            "--null-audio" => out.null_audio = true,
            "--stations" => {
                index += 1;
                let Some(value) = args.get(index) else {
                    anyhow::bail!("--stations requires a count");
                };
                out.stations = Some(value.parse().map_err(|_| {
                    anyhow::anyhow!("--stations requires a number, got {value}")
                })?);
            }
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            other => anyhow::bail!("unknown argument {other}"),
        }
        index += 1;
    }
    Ok(out)
}

fn print_help() {
    println!("nocturne");
    println!("  --data-dir PATH   Settings directory (default: platform config dir)");
    println!("  --null-audio      Run without a sound device");
    println!("  --stations N      Load the top N radio stations on startup");
}

fn print_event(event: &PlayerEvent) {
    match event {
        PlayerEvent::Notification { level, message } => {
            let tag = match level {
                Level::Info => "info",
                Level::Success => "ok",
                Level::Warning => "warn",
                Level::Error => "error",
            };
            println!("[{tag}] {message}");
        }
        PlayerEvent::TrackStarted { track, .. } => {
            println!("Playing: {} - {}", track.title, track.artist);
        }
        PlayerEvent::PlaybackPaused => println!("Paused"),
        PlayerEvent::PlaybackResumed => println!("Resumed"),
        PlayerEvent::ThemeChanged { old, new } => println!("Theme: {old:?} -> {new:?}"),
        _ => {}
    }
}

/// Returns false when the session should end.
fn run_command(session: &mut Session, raw: &str) -> bool {
    let mut parts = raw.splitn(2, ' ');
    let command = parts.next().unwrap_or_default();
    let rest = parts.next().unwrap_or("").trim();

    match command {
        "" => {}
        "help" => print_command_help(),
        "add" => {
            if rest.is_empty() {
                println!("usage: add <file>");
            } else {
                session.add_local_file(PathBuf::from(rest).as_path());
            }
        }
        "url" => {
            let mut pieces = rest.splitn(3, ' ');
            match (pieces.next(), pieces.next()) {
                (Some(url), Some(title)) if !url.is_empty() => {
                    let artist = pieces.next().unwrap_or("Unknown Artist");
                    session.add_remote_url(url, title, artist);
                }
                _ => println!("usage: url <link> <title> [artist]"),
            }
        }
        "stations" => {
            let limit = rest.parse().unwrap_or(20);
            session.load_stations(limit);
        }
        "list" => print_playlist(session),
        "find" => session.set_filter(rest),
        "play" => match rest.parse::<usize>() {
            Ok(index) => session.play_index(index),
            Err(_) => session.play(),
        },
        "pause" => session.pause(),
        "toggle" | "p" => session.toggle_play(),
        "next" | "n" => session.next(),
        "prev" => session.previous(),
        "vol" => match rest {
            "up" => session.nudge_volume(true),
            "down" => session.nudge_volume(false),
            value => match value.parse::<i64>() {
                Ok(volume) => session.set_volume(volume.clamp(0, 100) as u8),
                Err(_) => println!("usage: vol <0-100> | vol up | vol down"),
            },
        },
        "mute" => session.toggle_mute(),
        "shuffle" => session.toggle_shuffle(),
        "repeat" => session.toggle_repeat(),
        "seek" => match rest.parse::<u64>() {
            Ok(seconds) => session.seek(Duration::from_secs(seconds)),
            Err(_) => println!("usage: seek <seconds>"),
        },
        "timer" => {
            let mut pieces = rest.split_whitespace();
            match pieces.next() {
                Some("cancel") => session.cancel_sleep_timer(),
                Some("extend") => match pieces.next().and_then(|v| v.parse().ok()) {
                    Some(minutes) => session.extend_sleep_timer(minutes),
                    None => println!("usage: timer extend <minutes>"),
                },
                Some(value) => match value.parse() {
                    Ok(minutes) => session.set_sleep_timer(minutes),
                    Err(_) => println!("usage: timer <minutes> | timer cancel | timer extend <minutes>"),
                },
                None => {
                    let snapshot = session.timer_snapshot();
                    if snapshot.is_active {
                        let remaining = snapshot.remaining_seconds;
                        println!("Timer: {}:{:02} remaining", remaining / 60, remaining % 60);
                    } else {
                        println!("No timer set");
                    }
                }
            }
        }
        "theme" => match rest {
            "light" => session.set_theme(Theme::Light),
            "dark" => session.set_theme(Theme::Dark),
            _ => session.toggle_theme(),
        },
        "remove" => match rest.parse() {
            Ok(index) => session.remove_track(index),
            Err(_) => println!("usage: remove <index>"),
        },
        "move" => {
            let mut pieces = rest.split_whitespace();
            match (
                pieces.next().and_then(|v| v.parse().ok()),
                pieces.next().and_then(|v| v.parse().ok()),
            ) {
                (Some(from), Some(to)) => session.move_track(from, to),
                _ => println!("usage: move <from> <to>"),
            }
        }
        "clear" => session.clear_playlist(),
        "export" => {
            if rest.is_empty() {
                println!("usage: export <file>");
            } else {
                session.export_playlist(PathBuf::from(rest).as_path());
            }
        }
        "import" => {
            if rest.is_empty() {
                println!("usage: import <file>");
            } else {
                session.import_playlist(PathBuf::from(rest).as_path());
            }
        }
        "status" => print_status(session),
        "quit" | "exit" | "q" => return false,
        other => println!("Unknown command: {other} (try 'help')"),
    }

    true
}

fn print_command_help() {
    println!("  add <file>                 Add a local audio file");
    println!("  url <link> <title> [artist] Add a stream URL");
    println!("  stations [n]               Load top radio stations");
    println!("  list / find <text>         Show or filter the playlist");
    println!("  play [n] / pause / toggle  Playback control");
    println!("  next / prev                Track navigation");
    println!("  vol <0-100|up|down> / mute Volume control");
    println!("  shuffle / repeat           Toggle play order modes");
    println!("  seek <seconds>             Seek within the current track");
    println!("  timer <min>|cancel|extend  Sleep timer");
    println!("  theme [light|dark]         Switch theme");
    println!("  remove <n> / move <a> <b>  Edit the playlist");
    println!("  export <file> / import <file>");
    println!("  clear / status / quit");
}

fn print_playlist(session: &Session) {
    let playlist = session.playlist();
    let visible = playlist.visible();
    if visible.is_empty() {
        if playlist.filter().is_empty() {
            println!("Playlist is empty");
        } else {
            println!("No tracks match \"{}\"", playlist.filter());
        }
        return;
    }

    for (index, track) in visible {
        let marker = if playlist.active() == Some(index) { ">" } else { " " };
        println!(
            "{marker} {index:3}  {} - {}  [{}]",
            track.title, track.artist, track.duration_label
        );
    }
}

fn print_status(session: &Session) {
    let snapshot = session.playback_snapshot();
    let state = if snapshot.is_playing { "playing" } else { "paused" };
    let position = snapshot
        .position
        .map(duration_label)
        .unwrap_or_else(|| String::from("-"));
    let total = snapshot
        .duration
        .map(duration_label)
        .unwrap_or_else(|| String::from("-"));

    println!(
        "{state} | track {} | {position}/{total} | vol {}% | shuffle {} | repeat {} | theme {:?}",
        snapshot.index,
        snapshot.volume,
        if snapshot.shuffle_enabled { "on" } else { "off" },
        snapshot.repeat.label(),
        session.theme(),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_args_reads_flags() {
        let args = parse_args(vec![
            String::from("--data-dir"),
            String::from("/tmp/x"),
            String::from("--null-audio"),
            String::from("--stations"),
            String::from("10"),
        ])
        .expect("parse");

        assert_eq!(args.data_dir, Some(PathBuf::from("/tmp/x")));
        assert!(args.null_audio);
        assert_eq!(args.stations, Some(10));
    }

    #[test]
    fn parse_args_rejects_unknown_flags() {
        assert!(parse_args(vec![String::from("--wat")]).is_err());
        assert!(parse_args(vec![String::from("--stations"), String::from("x")]).is_err());
    }
}
