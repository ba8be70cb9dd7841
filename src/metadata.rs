use crate::model::{duration_label, unknown_duration_label};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use lofty::file::{AudioFile, TaggedFileExt};
use lofty::prelude::Accessor;
use lofty::probe::Probe;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::warn;

/// A stalled probe resolves with defaults after this long instead of holding
/// the track hostage.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// What a tag probe resolved for a local file. Unreadable fields stay None
/// so the caller keeps whatever the user entered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration_label: String,
}

impl Default for LocalMetadata {
    fn default() -> Self {
        Self {
            title: None,
            artist: None,
            album: None,
            duration_label: unknown_duration_label(),
        }
    }
}

struct PendingProbe {
    path: PathBuf,
    started: Instant,
    rx: mpsc::Receiver<LocalMetadata>,
}

/// At most one probe runs at a time: starting a new one abandons the old
/// receiver, and the abandoned worker's late send lands in a closed channel.
#[derive(Default)]
pub struct MetadataProbe {
    pending: Option<PendingProbe>,
}

impl MetadataProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_flight(&self) -> Option<&Path> {
        self.pending.as_ref().map(|pending| pending.path.as_path())
    }

    pub fn start(&mut self, path: PathBuf) {
        let (tx, rx) = mpsc::channel();
        let worker_path = path.clone();
        thread::spawn(move || {
            let _ = tx.send(probe_file(&worker_path));
        });

        if self.pending.is_some() {
            warn!(path = %path.display(), "abandoning previous metadata probe");
        }
        self.pending = Some(PendingProbe {
            path,
            started: Instant::now(),
            rx,
        });
    }

    /// Non-blocking: returns the resolved metadata once available, or
    /// defaults once the timeout passes. None while still in flight.
    pub fn poll(&mut self) -> Option<(PathBuf, LocalMetadata)> {
        let pending = self.pending.as_ref()?;

        match pending.rx.try_recv() {
            Ok(metadata) => {
                let pending = self.pending.take()?;
                Some((pending.path, metadata))
            }
            Err(mpsc::TryRecvError::Empty) => {
                if pending.started.elapsed() < PROBE_TIMEOUT {
                    return None;
                }
                let pending = self.pending.take()?;
                warn!(path = %pending.path.display(), "metadata probe timed out, using defaults");
                Some((pending.path, LocalMetadata::default()))
            }
            Err(mpsc::TryRecvError::Disconnected) => {
                let pending = self.pending.take()?;
                warn!(path = %pending.path.display(), "metadata probe died, using defaults");
                Some((pending.path, LocalMetadata::default()))
            }
        }
    }
}

/// Reads tags and duration from a local file. Never errors: anything
/// unreadable resolves to the defaults.
pub fn probe_file(path: &Path) -> LocalMetadata {
    let tagged = match Probe::open(path).and_then(|probe| probe.read()) {
        Ok(tagged) => tagged,
        Err(err) => {
            warn!(path = %path.display(), %err, "failed to read tags");
            return LocalMetadata::default();
        }
    };

    let duration = tagged.properties().duration();
    let label = if duration.is_zero() {
        unknown_duration_label()
    } else {
        duration_label(duration)
    };

    let tag = tagged.primary_tag().or_else(|| tagged.first_tag());
    LocalMetadata {
        title: tag.and_then(|tag| tag.title().map(|value| value.to_string())),
        artist: tag.and_then(|tag| tag.artist().map(|value| value.to_string())),
        album: tag.and_then(|tag| tag.album().map(|value| value.to_string())),
        duration_label: label,
    }
}

/// Inlines file bytes as a `data:` source locator so local tracks need no
/// filesystem access at playback time.
pub fn embedded_source(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path.extension().and_then(OsStr::to_str).unwrap_or_default();
    match ext.to_ascii_lowercase().as_str() {
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" | "opus" => "audio/ogg",
        "flac" => "audio/flac",
        "m4a" | "aac" => "audio/mp4",
        _ => "application/octet-stream",
    }
}

/// A usable title from a file name: strips brackets, years, and separator
/// noise, keeps the first few words in title case.
pub fn title_from_file_name(path: &Path) -> String {
    let stem = path
        .file_stem()
        .and_then(OsStr::to_str)
        .unwrap_or("unknown");

    let cleaned: String = stem
        .chars()
        .map(|ch| match ch {
            '[' | ']' | '(' | ')' | '{' | '}' => ' ',
            '-' | '_' | ',' => ' ',
            other => other,
        })
        .collect();

    let words: Vec<String> = cleaned
        .split_whitespace()
        .filter(|word| !word.chars().all(|ch| ch.is_ascii_digit()))
        .take(4)
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect();

    if words.is_empty() {
        stem.to_string()
    } else {
        words.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SourceKind;
    use std::fs;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn unreadable_file_resolves_with_defaults() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("not-audio.mp3");
        fs::write(&path, b"definitely not audio").expect("write");

        let metadata = probe_file(&path);
        assert_eq!(metadata, LocalMetadata::default());
    }

    #[test]
    fn probe_resolves_without_blocking_the_caller() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("missing.flac");

        let mut probe = MetadataProbe::new();
        probe.start(path.clone());

        let deadline = Instant::now() + Duration::from_secs(5);
        let resolved = loop {
            if let Some(resolved) = probe.poll() {
                break resolved;
            }
            assert!(Instant::now() < deadline, "probe never resolved");
            thread::sleep(Duration::from_millis(10));
        };

        assert_eq!(resolved.0, path);
        assert!(probe.in_flight().is_none());
    }

    #[test]
    fn starting_a_new_probe_abandons_the_old_one() {
        let mut probe = MetadataProbe::new();
        probe.start(PathBuf::from("first.mp3"));
        probe.start(PathBuf::from("second.mp3"));

        assert_eq!(probe.in_flight(), Some(Path::new("second.mp3")));
    }

    #[test]
    fn embedded_source_parses_back_as_embedded() {
        let source = embedded_source("audio/mpeg", b"\x00\x01\x02");
        match SourceKind::parse(&source) {
            SourceKind::Embedded { mime, payload } => {
                assert_eq!(mime, "audio/mpeg");
                assert_eq!(STANDARD.decode(payload).expect("decode"), vec![0, 1, 2]);
            }
            other => panic!("unexpected source kind: {other:?}"),
        }
    }

    #[test]
    fn mime_is_derived_from_the_extension() {
        assert_eq!(mime_for_path(Path::new("a.MP3")), "audio/mpeg");
        assert_eq!(mime_for_path(Path::new("a.flac")), "audio/flac");
        assert_eq!(mime_for_path(Path::new("a")), "application/octet-stream");
    }

    #[test]
    fn title_from_file_name_strips_noise() {
        assert_eq!(
            title_from_file_name(Path::new("epic_cinematic-2023 (final).mp3")),
            "Epic Cinematic Final"
        );
        assert_eq!(title_from_file_name(Path::new("song.mp3")), "Song");
    }
}
