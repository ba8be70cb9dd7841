use crate::error::PlayerError;
use crate::events::{EventBus, Level, PlayerEvent};
use crate::metadata::{self, MetadataProbe};
use crate::model::{Theme, Track, TrackOrigin};
use crate::output::AudioOutput;
use crate::player::{EndedOutcome, PlaybackSnapshot, Player};
use crate::playlist::Playlist;
use crate::radio::StationDirectory;
use crate::storage::Storage;
use crate::theme::ThemeController;
use crate::timer::{SleepTimer, TimerSnapshot, TimerTick};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::error;

/// Local files above this size are refused instead of inlined.
const MAX_LOCAL_FILE_BYTES: usize = 50 * 1024 * 1024;

/// Owns every component and wires them together: intents come in, typed
/// events go out, and every failure is caught at the operation boundary and
/// converted to a notification instead of reaching the caller.
pub struct Session {
    bus: EventBus,
    playlist: Playlist,
    player: Player,
    timer: SleepTimer,
    theme: ThemeController,
    probe: MetadataProbe,
    directory: StationDirectory,
    audio: Box<dyn AudioOutput>,
    probe_target: Option<String>,
}

impl Session {
    pub fn new(storage: Storage, mut audio: Box<dyn AudioOutput>) -> Self {
        let mut playlist = Playlist::new(storage.clone());
        let mut player = Player::new(storage.clone());
        player.restore_active(&mut playlist);
        audio.set_volume(f32::from(player.volume()) / 100.0);

        Self {
            bus: EventBus::new(),
            playlist,
            player,
            timer: SleepTimer::new(),
            theme: ThemeController::new(storage, None),
            probe: MetadataProbe::new(),
            directory: StationDirectory::new(),
            audio,
            probe_target: None,
        }
    }

    pub fn with_directory(mut self, directory: StationDirectory) -> Self {
        self.directory = directory;
        self
    }

    pub fn subscribe(&mut self, subscriber: impl FnMut(&PlayerEvent) + 'static) {
        self.bus.subscribe(subscriber);
    }

    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    pub fn playback_snapshot(&self) -> PlaybackSnapshot {
        self.player.snapshot(&*self.audio)
    }

    pub fn timer_snapshot(&self) -> TimerSnapshot {
        self.timer.snapshot()
    }

    pub fn theme(&self) -> Theme {
        self.theme.current()
    }

    fn report(&mut self, err: PlayerError) {
        error!(%err, "operation failed");
        self.bus.notify(Level::Error, err.to_string());
    }

    /// Reads the file into an embedded source locator so playback never
    /// depends on the path staying around, then probes tags in the
    /// background.
    pub fn add_local_file(&mut self, path: &Path) {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) => {
                self.report(PlayerError::PlaylistIo {
                    path: path.to_path_buf(),
                    source: err,
                });
                return;
            }
        };
        if bytes.len() > MAX_LOCAL_FILE_BYTES {
            self.bus.notify(
                Level::Warning,
                format!(
                    "\"{}\" is too large ({} MB), maximum is 50 MB",
                    path.display(),
                    bytes.len() / 1024 / 1024
                ),
            );
            return;
        }

        let source = metadata::embedded_source(metadata::mime_for_path(path), &bytes);
        let track = Track::new(
            source,
            metadata::title_from_file_name(path),
            String::from("Unknown Artist"),
            TrackOrigin::Local,
        );
        let id = track.id.clone();
        let title = track.title.clone();

        match self.playlist.add(track) {
            Ok(_) => {
                self.probe.start(path.to_path_buf());
                self.probe_target = Some(id);
                self.bus.publish(PlayerEvent::PlaylistChanged);
                self.bus
                    .notify(Level::Success, format!("Added \"{title}\" to the playlist"));
            }
            Err(err) => self.report(err),
        }
    }

    pub fn add_remote_url(&mut self, url: &str, title: &str, artist: &str) {
        let lowered = url.to_ascii_lowercase();
        if !lowered.starts_with("http://") && !lowered.starts_with("https://") {
            self.report(PlayerError::InvalidUrl {
                input: url.to_string(),
            });
            return;
        }

        let track = Track::new(
            url.to_string(),
            title.to_string(),
            artist.to_string(),
            TrackOrigin::RemoteUrl,
        );
        let title = track.title.clone();
        match self.playlist.add(track) {
            Ok(_) => {
                self.bus.publish(PlayerEvent::PlaylistChanged);
                self.bus
                    .notify(Level::Success, format!("Added \"{title}\" to the playlist"));
            }
            Err(err) => self.report(err),
        }
    }

    /// Fetches the top stations and appends the ones not already present.
    /// A directory failure applies nothing.
    pub fn load_stations(&mut self, limit: usize) {
        let tracks = match self.directory.top_stations(limit) {
            Ok(tracks) => tracks,
            Err(err) => {
                self.report(err);
                return;
            }
        };

        let mut added = 0usize;
        for track in tracks {
            if self.playlist.add(track).is_ok() {
                added += 1;
            }
        }

        if added > 0 {
            self.bus.publish(PlayerEvent::PlaylistChanged);
        }
        self.bus
            .notify(Level::Success, format!("Added {added} radio stations"));
    }

    pub fn play_index(&mut self, index: usize) {
        match self
            .player
            .play_track(index, &mut self.playlist, &mut *self.audio)
        {
            Ok(track) => self.bus.publish(PlayerEvent::TrackStarted { index, track }),
            Err(err) => self.report(err),
        }
    }

    pub fn play(&mut self) {
        match self.player.play(&mut self.playlist, &mut *self.audio) {
            Ok(Some(track)) => {
                let index = self.player.current_index();
                self.bus.publish(PlayerEvent::TrackStarted { index, track });
            }
            Ok(None) => {
                if self.player.is_playing() {
                    self.bus.publish(PlayerEvent::PlaybackResumed);
                }
            }
            Err(err) => self.report(err),
        }
    }

    pub fn pause(&mut self) {
        if self.player.pause(&mut *self.audio) {
            self.bus.publish(PlayerEvent::PlaybackPaused);
        }
    }

    pub fn toggle_play(&mut self) {
        if self.player.is_playing() {
            self.pause();
        } else {
            self.play();
        }
    }

    pub fn next(&mut self) {
        match self.player.next(&mut self.playlist, &mut *self.audio) {
            Ok(track) => {
                let index = self.player.current_index();
                self.bus.publish(PlayerEvent::TrackStarted { index, track });
            }
            Err(err) => self.report(err),
        }
    }

    pub fn previous(&mut self) {
        match self.player.previous(&mut self.playlist, &mut *self.audio) {
            Ok(track) => {
                let index = self.player.current_index();
                self.bus.publish(PlayerEvent::TrackStarted { index, track });
            }
            Err(err) => self.report(err),
        }
    }

    pub fn seek(&mut self, position: Duration) {
        if let Err(err) = self.player.seek(position, &mut *self.audio) {
            self.report(err);
        }
    }

    pub fn set_volume(&mut self, volume: u8) {
        self.player.set_volume(volume, &mut *self.audio);
    }

    pub fn nudge_volume(&mut self, up: bool) {
        let volume = self.player.nudge_volume(up, &mut *self.audio);
        self.bus.notify(Level::Info, format!("Volume: {volume}%"));
    }

    pub fn toggle_mute(&mut self) {
        let volume = self.player.toggle_mute(&mut *self.audio);
        let message = if volume == 0 {
            String::from("Muted")
        } else {
            format!("Volume: {volume}%")
        };
        self.bus.notify(Level::Info, message);
    }

    pub fn toggle_shuffle(&mut self) {
        let enabled = self.player.toggle_shuffle(self.playlist.len());
        let message = if enabled { "Shuffle on" } else { "Shuffle off" };
        self.bus.notify(Level::Info, message);
    }

    pub fn toggle_repeat(&mut self) {
        let mode = self.player.toggle_repeat();
        self.bus
            .notify(Level::Info, format!("Repeat: {}", mode.label()));
    }

    pub fn remove_track(&mut self, index: usize) {
        if let Some(removed) = self.playlist.remove(index) {
            self.bus.publish(PlayerEvent::PlaylistChanged);
            self.bus
                .notify(Level::Info, format!("Removed \"{}\"", removed.title));
        }
    }

    pub fn move_track(&mut self, from: usize, to: usize) {
        if self.playlist.move_track(from, to) {
            self.bus.publish(PlayerEvent::PlaylistChanged);
        }
    }

    pub fn set_filter(&mut self, query: &str) {
        self.playlist.set_filter(query);
        self.bus.publish(PlayerEvent::PlaylistChanged);
    }

    pub fn clear_playlist(&mut self) {
        if self.playlist.is_empty() {
            self.bus.notify(Level::Info, "Playlist is already empty");
            return;
        }
        self.playlist.clear();
        self.bus.publish(PlayerEvent::PlaylistChanged);
        self.bus.notify(Level::Info, "Playlist cleared");
    }

    pub fn export_playlist(&mut self, path: &Path) {
        match self.playlist.export_to(path) {
            Ok(()) => self.bus.notify(
                Level::Success,
                format!("Playlist exported to {}", path.display()),
            ),
            Err(err) => self.report(err),
        }
    }

    pub fn import_playlist(&mut self, path: &Path) {
        match self.playlist.import_from(path) {
            Ok(count) => {
                self.bus.publish(PlayerEvent::PlaylistChanged);
                self.bus
                    .notify(Level::Success, format!("Imported {count} tracks"));
            }
            Err(err) => self.report(err),
        }
    }

    pub fn set_sleep_timer(&mut self, minutes: u32) {
        self.timer.set(minutes);
        self.bus.publish(PlayerEvent::TimerArmed {
            minutes: u64::from(minutes),
        });
        self.bus
            .notify(Level::Info, format!("Sleep timer set for {minutes} minutes"));
    }

    /// The cancellation notice only goes out when a countdown was running.
    pub fn cancel_sleep_timer(&mut self) {
        if self.timer.cancel() {
            self.bus.publish(PlayerEvent::TimerCancelled);
            self.bus.notify(Level::Info, "Sleep timer cancelled");
        }
    }

    pub fn extend_sleep_timer(&mut self, minutes: u32) {
        if self.timer.extend(minutes) {
            self.bus.publish(PlayerEvent::TimerExtended {
                minutes: u64::from(minutes),
            });
            self.bus
                .notify(Level::Info, format!("Sleep timer extended by {minutes} minutes"));
        } else {
            self.bus.notify(Level::Warning, "No active sleep timer");
        }
    }

    pub fn toggle_theme(&mut self) {
        let (old, new) = self.theme.toggle();
        self.bus.publish(PlayerEvent::ThemeChanged { old, new });
    }

    pub fn set_theme(&mut self, theme: Theme) {
        if let Some((old, new)) = self.theme.set(theme) {
            self.bus.publish(PlayerEvent::ThemeChanged { old, new });
        }
    }

    pub fn system_theme_changed(&mut self, theme: Theme) {
        if let Some((old, new)) = self.theme.system_preference_changed(theme) {
            self.bus.publish(PlayerEvent::ThemeChanged { old, new });
        }
    }

    /// Frequent housekeeping: advances past finished tracks and collects
    /// resolved metadata probes. Safe to call as often as the host loop
    /// spins.
    pub fn pump(&mut self) {
        if self.player.is_playing() && self.audio.is_finished() {
            match self
                .player
                .on_track_ended(&mut self.playlist, &mut *self.audio)
            {
                Ok(EndedOutcome::Replayed(track) | EndedOutcome::Advanced(track)) => {
                    let index = self.player.current_index();
                    self.bus.publish(PlayerEvent::TrackStarted { index, track });
                }
                Ok(EndedOutcome::Stopped) => {
                    self.bus.publish(PlayerEvent::PlaybackPaused);
                    self.bus.notify(Level::Info, "End of playlist");
                }
                Err(err) => self.report(err),
            }
        }

        if let Some((path, resolved)) = self.probe.poll() {
            if let Some(id) = self.probe_target.take()
                && self.playlist.update_metadata(
                    &id,
                    resolved.title.as_deref(),
                    resolved.artist.as_deref(),
                    resolved.album.as_deref(),
                    &resolved.duration_label,
                )
            {
                self.bus.publish(PlayerEvent::PlaylistChanged);
            }
            self.bus.publish(PlayerEvent::MetadataResolved {
                path,
                metadata: resolved,
            });
        }
    }

    /// One-second housekeeping: the sleep countdown and the expiry fade.
    pub fn tick_second(&mut self) {
        match self.timer.tick_second() {
            TimerTick::Warning { remaining: 60 } => {
                self.bus.notify(Level::Warning, "Music stops in 1 minute");
            }
            TimerTick::Warning { .. } => {
                self.bus.notify(Level::Warning, "Music stops in 30 seconds");
            }
            TimerTick::Expired => {
                if self.player.pause(&mut *self.audio) {
                    self.bus.publish(PlayerEvent::PlaybackPaused);
                }
                self.player.begin_sleep_fade();
                self.bus.publish(PlayerEvent::TimerExpired);
                self.bus
                    .notify(Level::Success, "Sleep timer expired, music paused");
            }
            TimerTick::Idle | TimerTick::Running { .. } => {}
        }

        self.player.tick_sleep_fade(&mut *self.audio);
    }
}
