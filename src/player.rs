use crate::error::PlayerError;
use crate::model::{RepeatMode, Track};
use crate::output::AudioOutput;
use crate::playlist::Playlist;
use crate::storage::{self, Storage};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_VOLUME: u8 = 70;

/// Sleep-timer fade: volume steps to zero over this many one-second ticks,
/// then restores this many ticks later.
const SLEEP_FADE_STEPS: u8 = 2;
const SLEEP_FADE_RESTORE_TICKS: u8 = 2;

/// What handling a track-end event did, for the caller's event publishing.
#[derive(Debug, Clone)]
pub enum EndedOutcome {
    Replayed(Track),
    Advanced(Track),
    Stopped,
}

#[derive(Debug, Clone)]
pub struct PlaybackSnapshot {
    pub index: usize,
    pub is_playing: bool,
    pub volume: u8,
    pub shuffle_enabled: bool,
    pub repeat: RepeatMode,
    pub position: Option<Duration>,
    pub duration: Option<Duration>,
}

#[derive(Debug)]
struct SleepFade {
    steps_left: u8,
    restore_in: u8,
    restore_volume: u8,
}

/// The playback state machine: current index, shuffle order, repeat mode,
/// and volume. Holds only an index into the playlist, never track identity;
/// every operation re-validates against the playlist it is handed.
pub struct Player {
    storage: Storage,
    current: usize,
    loaded: bool,
    is_playing: bool,
    volume: u8,
    shuffle_enabled: bool,
    shuffle_order: Vec<usize>,
    repeat: RepeatMode,
    muted_previous: Option<u8>,
    fade: Option<SleepFade>,
    rng: SmallRng,
}

impl Player {
    pub fn new(storage: Storage) -> Self {
        let volume = storage.load(storage::KEY_VOLUME, DEFAULT_VOLUME).min(100);
        let shuffle_enabled = storage.load(storage::KEY_SHUFFLE, false);
        let repeat = storage.load(storage::KEY_REPEAT, RepeatMode::None);
        let current = storage.load(storage::KEY_CURRENT_INDEX, 0usize);

        Self {
            storage,
            current,
            loaded: false,
            is_playing: false,
            volume,
            shuffle_enabled,
            shuffle_order: Vec::new(),
            repeat,
            muted_previous: None,
            fade: None,
            rng: SmallRng::from_os_rng(),
        }
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn shuffle_enabled(&self) -> bool {
        self.shuffle_enabled
    }

    pub fn repeat(&self) -> RepeatMode {
        self.repeat
    }

    pub fn snapshot(&self, audio: &dyn AudioOutput) -> PlaybackSnapshot {
        PlaybackSnapshot {
            index: self.current,
            is_playing: self.is_playing,
            volume: self.volume,
            shuffle_enabled: self.shuffle_enabled,
            repeat: self.repeat,
            position: audio.position(),
            duration: audio.duration(),
        }
    }

    /// Marks the persisted track as active again after a restart, without
    /// starting playback. Returns the saved snapshot when it still lines up
    /// with the playlist.
    pub fn restore_active(&mut self, playlist: &mut Playlist) -> Option<Track> {
        let snapshot: Option<Track> = self.storage.load(storage::KEY_CURRENT_TRACK, None);
        let snapshot = snapshot?;
        if self.current >= playlist.len() {
            return None;
        }
        playlist.set_active(Some(self.current));
        Some(snapshot)
    }

    /// Loads and starts the track at `index`, persists the position, and
    /// marks it active in the playlist. A backend failure reverts to a
    /// non-playing state instead of leaving it ambiguous.
    pub fn play_track(
        &mut self,
        index: usize,
        playlist: &mut Playlist,
        audio: &mut dyn AudioOutput,
    ) -> Result<Track, PlayerError> {
        let len = playlist.len();
        if len == 0 {
            return Err(PlayerError::EmptyPlaylist);
        }
        let Some(track) = playlist.get(index).cloned() else {
            return Err(PlayerError::IndexOutOfRange { index, len });
        };

        if let Err(err) = audio.play(&track) {
            warn!(title = %track.title, err = %format!("{err:#}"), "playback failed");
            audio.stop();
            self.loaded = false;
            self.is_playing = false;
            return Err(PlayerError::Playback {
                reason: format!("{err:#}"),
            });
        }

        audio.set_volume(f32::from(self.volume) / 100.0);
        self.current = index;
        self.loaded = true;
        self.is_playing = true;

        self.storage.save(storage::KEY_CURRENT_INDEX, &index);
        self.storage.save(storage::KEY_CURRENT_TRACK, &track);
        playlist.set_active(Some(index));

        info!(title = %track.title, artist = %track.artist, index, "playing");
        Ok(track)
    }

    /// Resumes the loaded source, or starts the first track when nothing is
    /// loaded yet. An empty playlist is a quiet no-op.
    pub fn play(
        &mut self,
        playlist: &mut Playlist,
        audio: &mut dyn AudioOutput,
    ) -> Result<Option<Track>, PlayerError> {
        if self.loaded {
            audio.resume();
            self.is_playing = true;
            return Ok(None);
        }
        if playlist.is_empty() {
            return Ok(None);
        }
        self.play_track(0, playlist, audio).map(Some)
    }

    /// Returns whether anything changed; pausing while stopped is a no-op.
    pub fn pause(&mut self, audio: &mut dyn AudioOutput) -> bool {
        if !self.is_playing {
            return false;
        }
        audio.pause();
        self.is_playing = false;
        true
    }

    pub fn next(
        &mut self,
        playlist: &mut Playlist,
        audio: &mut dyn AudioOutput,
    ) -> Result<Track, PlayerError> {
        if playlist.is_empty() {
            return Err(PlayerError::EmptyPlaylist);
        }
        let index = self.step(playlist.len(), true);
        self.play_track(index, playlist, audio)
    }

    pub fn previous(
        &mut self,
        playlist: &mut Playlist,
        audio: &mut dyn AudioOutput,
    ) -> Result<Track, PlayerError> {
        if playlist.is_empty() {
            return Err(PlayerError::EmptyPlaylist);
        }
        let index = self.step(playlist.len(), false);
        self.play_track(index, playlist, audio)
    }

    /// Adjacent index in play order: the neighbor within the shuffle order
    /// when shuffling, otherwise ±1 modulo length. Wraps at both ends.
    fn step(&mut self, len: usize, forward: bool) -> usize {
        if self.shuffle_enabled {
            self.ensure_shuffle_order(len);
            let order = &self.shuffle_order;
            let pos = order
                .iter()
                .position(|idx| *idx == self.current)
                .unwrap_or(0);
            let next = if forward {
                (pos + 1) % order.len()
            } else {
                (pos + order.len() - 1) % order.len()
            };
            order[next]
        } else if forward {
            (self.current + 1) % len
        } else {
            (self.current + len - 1) % len
        }
    }

    /// Track-end handling: One replays, All advances, None advances until
    /// the last track and then stops. With shuffle on there is no last
    /// track, so None keeps advancing.
    pub fn on_track_ended(
        &mut self,
        playlist: &mut Playlist,
        audio: &mut dyn AudioOutput,
    ) -> Result<EndedOutcome, PlayerError> {
        match self.repeat {
            RepeatMode::One => self
                .play_track(self.current, playlist, audio)
                .map(EndedOutcome::Replayed),
            RepeatMode::All => self.next(playlist, audio).map(EndedOutcome::Advanced),
            RepeatMode::None => {
                if self.shuffle_enabled || self.current + 1 < playlist.len() {
                    self.next(playlist, audio).map(EndedOutcome::Advanced)
                } else {
                    self.pause(audio);
                    Ok(EndedOutcome::Stopped)
                }
            }
        }
    }

    /// Flips shuffle; enabling it deals a fresh permutation of the playlist
    /// indices. Returns the new state.
    pub fn toggle_shuffle(&mut self, playlist_len: usize) -> bool {
        self.shuffle_enabled = !self.shuffle_enabled;
        if self.shuffle_enabled {
            self.regenerate_shuffle_order(playlist_len);
        }
        self.storage.save(storage::KEY_SHUFFLE, &self.shuffle_enabled);
        info!(enabled = self.shuffle_enabled, "shuffle toggled");
        self.shuffle_enabled
    }

    fn ensure_shuffle_order(&mut self, len: usize) {
        if self.shuffle_order.len() != len {
            self.regenerate_shuffle_order(len);
        }
    }

    fn regenerate_shuffle_order(&mut self, len: usize) {
        self.shuffle_order = (0..len).collect();
        self.shuffle_order.shuffle(&mut self.rng);
    }

    #[cfg(test)]
    fn shuffle_order(&self) -> &[usize] {
        &self.shuffle_order
    }

    pub fn toggle_repeat(&mut self) -> RepeatMode {
        self.repeat = self.repeat.next();
        self.storage.save(storage::KEY_REPEAT, &self.repeat);
        info!(mode = self.repeat.label(), "repeat toggled");
        self.repeat
    }

    pub fn set_volume(&mut self, volume: u8, audio: &mut dyn AudioOutput) {
        self.volume = volume.min(100);
        audio.set_volume(f32::from(self.volume) / 100.0);
        self.storage.save(storage::KEY_VOLUME, &self.volume);
    }

    /// Five-point volume step for key bindings.
    pub fn nudge_volume(&mut self, up: bool, audio: &mut dyn AudioOutput) -> u8 {
        let next = if up {
            self.volume.saturating_add(5).min(100)
        } else {
            self.volume.saturating_sub(5)
        };
        self.set_volume(next, audio);
        self.volume
    }

    /// Mutes by remembering the current level; muting again restores it,
    /// falling back to the default when nothing was remembered.
    pub fn toggle_mute(&mut self, audio: &mut dyn AudioOutput) -> u8 {
        if self.volume > 0 {
            self.muted_previous = Some(self.volume);
            self.set_volume(0, audio);
        } else {
            let restore = self.muted_previous.take().unwrap_or(DEFAULT_VOLUME);
            self.set_volume(restore, audio);
        }
        self.volume
    }

    pub fn seek(
        &mut self,
        position: Duration,
        audio: &mut dyn AudioOutput,
    ) -> Result<(), PlayerError> {
        audio.seek_to(position).map_err(|err| PlayerError::Playback {
            reason: format!("{err:#}"),
        })
    }

    /// Starts the post-expiry fade: output volume steps linearly to zero,
    /// then the pre-fade level is restored shortly after. The stored volume
    /// setting is untouched throughout.
    pub fn begin_sleep_fade(&mut self) {
        self.fade = Some(SleepFade {
            steps_left: SLEEP_FADE_STEPS,
            restore_in: SLEEP_FADE_RESTORE_TICKS,
            restore_volume: self.volume,
        });
    }

    pub fn sleep_fade_active(&self) -> bool {
        self.fade.is_some()
    }

    /// Advances the fade by one tick; returns whether it is still running.
    pub fn tick_sleep_fade(&mut self, audio: &mut dyn AudioOutput) -> bool {
        let Some(fade) = &mut self.fade else {
            return false;
        };

        if fade.steps_left > 0 {
            fade.steps_left -= 1;
            let gain = f32::from(fade.restore_volume) * f32::from(fade.steps_left)
                / f32::from(SLEEP_FADE_STEPS)
                / 100.0;
            audio.set_volume(gain);
            return true;
        }

        if fade.restore_in > 1 {
            fade.restore_in -= 1;
            return true;
        }

        let restore = f32::from(fade.restore_volume) / 100.0;
        audio.set_volume(restore);
        self.fade = None;
        false
    }
}
