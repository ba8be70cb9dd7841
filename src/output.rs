use crate::model::{SourceKind, Track};
use anyhow::{Context, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink, Source};
use std::fs::File;
use std::io::{Cursor, Read};
use std::time::{Duration, Instant};
use tracing::warn;

/// Remote sources are buffered up to this window before decoding; endless
/// live streams hit the fetch deadline and play whatever arrived.
const STREAM_WINDOW_BYTES: u64 = 8 * 1024 * 1024;
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// The single audio sink. Only the playback engine drives this; everything
/// else goes through the engine's operations.
pub trait AudioOutput {
    fn play(&mut self, track: &Track) -> Result<()>;
    fn pause(&mut self);
    fn resume(&mut self);
    fn stop(&mut self);
    fn is_paused(&self) -> bool;
    fn is_finished(&self) -> bool;
    fn position(&self) -> Option<Duration>;
    fn duration(&self) -> Option<Duration>;
    fn seek_to(&mut self, position: Duration) -> Result<()>;
    fn volume(&self) -> f32;
    fn set_volume(&mut self, volume: f32);
    fn output_name(&self) -> Option<String>;
}

pub struct RodioOutput {
    stream: OutputStream,
    sink: Sink,
    current: Option<String>,
    track_duration: Option<Duration>,
    volume: f32,
}

impl RodioOutput {
    pub fn new() -> Result<Self> {
        let mut stream = OutputStreamBuilder::from_default_device()
            .context("failed to open default system output stream")?
            .with_error_callback(|_| {})
            .open_stream_or_fallback()
            .context("failed to start output stream")?;
        stream.log_on_drop(false);
        let sink = Sink::connect_new(stream.mixer());

        Ok(Self {
            stream,
            sink,
            current: None,
            track_duration: None,
            volume: 1.0,
        })
    }

    fn append_bytes(&mut self, bytes: Vec<u8>, label: &str) -> Result<()> {
        let source = Decoder::new(Cursor::new(bytes))
            .with_context(|| format!("failed to decode {label}"))?;
        self.track_duration = source.total_duration();
        self.sink.append(source);
        Ok(())
    }
}

impl AudioOutput for RodioOutput {
    fn play(&mut self, track: &Track) -> Result<()> {
        self.sink.stop();
        self.sink = Sink::connect_new(self.stream.mixer());
        self.track_duration = None;

        match track.source_kind() {
            SourceKind::File(path) => {
                let file = File::open(&path)
                    .with_context(|| format!("failed to open track {}", path.display()))?;
                let source = Decoder::try_from(file)
                    .with_context(|| format!("failed to decode {}", path.display()))?;
                self.track_duration = source.total_duration();
                self.sink.append(source);
            }
            SourceKind::Embedded { payload, .. } => {
                let bytes = STANDARD
                    .decode(payload)
                    .context("embedded audio payload is not valid base64")?;
                self.append_bytes(bytes, &track.title)?;
            }
            SourceKind::Remote(url) => {
                let bytes = fetch_stream_window(&url)?;
                self.append_bytes(bytes, &url)?;
            }
        }

        self.sink.set_volume(self.volume);
        self.current = Some(track.source.clone());
        Ok(())
    }

    fn pause(&mut self) {
        self.sink.pause();
    }

    fn resume(&mut self) {
        self.sink.play();
    }

    fn stop(&mut self) {
        self.sink.stop();
        self.current = None;
        self.track_duration = None;
    }

    fn is_paused(&self) -> bool {
        self.sink.is_paused()
    }

    fn is_finished(&self) -> bool {
        self.current.is_some() && !self.sink.is_paused() && self.sink.empty()
    }

    fn position(&self) -> Option<Duration> {
        self.current.as_ref()?;
        Some(self.sink.get_pos())
    }

    fn duration(&self) -> Option<Duration> {
        self.track_duration
    }

    fn seek_to(&mut self, position: Duration) -> Result<()> {
        if self.current.is_none() {
            return Err(anyhow::anyhow!("no active track"));
        }
        self.sink
            .try_seek(position)
            .map_err(|err| anyhow::anyhow!("failed to seek current track: {err:?}"))
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        self.sink.set_volume(self.volume);
    }

    fn output_name(&self) -> Option<String> {
        Some(String::from("System default output"))
    }
}

fn fetch_stream_window(url: &str) -> Result<Vec<u8>> {
    let client = reqwest::blocking::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()
        .context("failed to build HTTP client")?;
    let response = client
        .get(url)
        .send()
        .with_context(|| format!("failed to reach {url}"))?
        .error_for_status()
        .with_context(|| format!("stream request rejected for {url}"))?;

    let mut buffer = Vec::new();
    if let Err(err) = response.take(STREAM_WINDOW_BYTES).read_to_end(&mut buffer) {
        // endless streams run into the fetch deadline mid-read; the bytes
        // buffered so far are still playable
        if buffer.is_empty() {
            return Err(err).with_context(|| format!("no audio data received from {url}"));
        }
        warn!(url, buffered = buffer.len(), %err, "stream read cut short");
    }

    anyhow::ensure!(!buffer.is_empty(), "no audio data received from {url}");
    Ok(buffer)
}

/// Headless fallback: keeps a logical playback clock so position, pause,
/// and auto-advance behave without a sound device.
pub struct NullOutput {
    paused: bool,
    current: Option<String>,
    volume: f32,
    started_at: Option<Instant>,
    position_offset: Duration,
    track_duration: Option<Duration>,
}

impl NullOutput {
    pub fn new() -> Self {
        Self {
            paused: false,
            current: None,
            volume: 1.0,
            started_at: None,
            position_offset: Duration::ZERO,
            track_duration: None,
        }
    }

    fn estimate_duration(track: &Track) -> Option<Duration> {
        match track.source_kind() {
            SourceKind::File(path) => {
                let file = File::open(path).ok()?;
                let source = Decoder::try_from(file).ok()?;
                source.total_duration().filter(|duration| !duration.is_zero())
            }
            SourceKind::Embedded { payload, .. } => {
                let bytes = STANDARD.decode(payload).ok()?;
                let source = Decoder::new(Cursor::new(bytes)).ok()?;
                source.total_duration().filter(|duration| !duration.is_zero())
            }
            SourceKind::Remote(_) => None,
        }
    }

    fn current_position(&self) -> Duration {
        let mut position = self.position_offset;
        if !self.paused
            && self.current.is_some()
            && let Some(started_at) = self.started_at
        {
            position = position.saturating_add(started_at.elapsed());
        }
        if let Some(duration) = self.track_duration {
            return position.min(duration);
        }
        position
    }
}

impl Default for NullOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioOutput for NullOutput {
    fn play(&mut self, track: &Track) -> Result<()> {
        self.paused = false;
        self.current = Some(track.source.clone());
        self.started_at = Some(Instant::now());
        self.position_offset = Duration::ZERO;
        self.track_duration = Self::estimate_duration(track);
        Ok(())
    }

    fn pause(&mut self) {
        self.position_offset = self.current_position();
        self.started_at = None;
        self.paused = true;
    }

    fn resume(&mut self) {
        if self.current.is_some() {
            self.started_at = Some(Instant::now());
        }
        self.paused = false;
    }

    fn stop(&mut self) {
        self.current = None;
        self.paused = false;
        self.started_at = None;
        self.position_offset = Duration::ZERO;
        self.track_duration = None;
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn is_finished(&self) -> bool {
        let Some(duration) = self.track_duration else {
            return false;
        };
        self.current.is_some() && !self.paused && self.current_position() >= duration
    }

    fn position(&self) -> Option<Duration> {
        self.current.as_ref()?;
        Some(self.current_position())
    }

    fn duration(&self) -> Option<Duration> {
        self.track_duration
    }

    fn seek_to(&mut self, position: Duration) -> Result<()> {
        if self.current.is_none() {
            return Err(anyhow::anyhow!("no active track"));
        }

        self.position_offset = self
            .track_duration
            .map_or(position, |duration| position.min(duration));
        self.started_at = if self.paused {
            None
        } else {
            Some(Instant::now())
        };
        Ok(())
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    fn output_name(&self) -> Option<String> {
        Some(String::from("Null audio output"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TrackOrigin;
    use std::thread;

    fn remote_track(source: &str) -> Track {
        Track::new(
            source.to_string(),
            String::from("t"),
            String::from("a"),
            TrackOrigin::RemoteUrl,
        )
    }

    #[test]
    fn null_output_position_advances_while_playing() {
        let mut output = NullOutput::new();
        output
            .play(&remote_track("https://example.com/live"))
            .expect("play");
        let before = output.position().expect("position");
        thread::sleep(Duration::from_millis(20));
        let after = output.position().expect("position");
        assert!(after > before);
    }

    #[test]
    fn null_output_pause_freezes_position() {
        let mut output = NullOutput::new();
        output
            .play(&remote_track("https://example.com/live"))
            .expect("play");
        thread::sleep(Duration::from_millis(20));

        output.pause();
        let paused = output.position().expect("position");
        thread::sleep(Duration::from_millis(20));
        assert_eq!(output.position().expect("position"), paused);

        output.resume();
        thread::sleep(Duration::from_millis(20));
        assert!(output.position().expect("position") > paused);
    }

    #[test]
    fn null_output_unknown_duration_never_finishes() {
        let mut output = NullOutput::new();
        output
            .play(&remote_track("https://example.com/live"))
            .expect("play");
        assert_eq!(output.duration(), None);

        thread::sleep(Duration::from_millis(30));
        assert!(!output.is_finished());
    }

    #[test]
    fn null_output_seek_moves_the_logical_clock() {
        let mut output = NullOutput::new();
        output
            .play(&remote_track("https://example.com/live"))
            .expect("play");

        let target = Duration::from_secs(12);
        output.seek_to(target).expect("seek");
        assert!(output.position().expect("position") >= target);
    }

    #[test]
    fn null_output_volume_clamps_to_unit_range() {
        let mut output = NullOutput::new();
        output.set_volume(3.0);
        assert_eq!(output.volume(), 1.0);
        output.set_volume(-1.0);
        assert_eq!(output.volume(), 0.0);
    }
}
