use crate::error::PlayerError;
use crate::model::{PlaylistDocument, Track, TrackOrigin, locator_id, unknown_duration_label};
use crate::storage::{self, Storage};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::info;
use unicode_normalization::UnicodeNormalization;

/// Track fields that survive a restart. Embedded local payloads are
/// memory-resident and excluded on save, so everything that loads back is a
/// plain remote source.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedTrack {
    source: String,
    title: String,
    artist: String,
    duration_label: String,
    #[serde(default)]
    artwork: Option<String>,
}

/// Ordered track collection with a single active slot and a non-mutating
/// filter view. Every mutation keeps the active index valid and persists the
/// storable subset of the playlist.
pub struct Playlist {
    storage: Storage,
    tracks: Vec<Track>,
    active: Option<usize>,
    filter: String,
}

impl Playlist {
    pub fn new(storage: Storage) -> Self {
        let persisted: Vec<PersistedTrack> = storage.load(storage::KEY_PLAYLIST, Vec::new());
        let tracks = persisted
            .into_iter()
            .map(|saved| Track {
                id: locator_id(&saved.source),
                source: saved.source,
                title: saved.title,
                artist: saved.artist,
                album: None,
                duration_label: saved.duration_label,
                artwork: saved.artwork,
                origin: TrackOrigin::RemoteUrl,
            })
            .collect();

        Self {
            storage,
            tracks,
            active: None,
            filter: String::new(),
        }
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn active(&self) -> Option<usize> {
        self.active
    }

    /// Appends a track, rejecting source locators already present. The id is
    /// derived from the locator when the caller left it empty.
    pub fn add(&mut self, mut track: Track) -> Result<usize, PlayerError> {
        if self.tracks.iter().any(|existing| existing.source == track.source) {
            return Err(PlayerError::DuplicateTrack {
                title: track.title.clone(),
            });
        }

        if track.id.is_empty() {
            track.id = locator_id(&track.source);
        }

        info!(title = %track.title, artist = %track.artist, "track added");
        self.tracks.push(track);
        self.persist();
        Ok(self.tracks.len() - 1)
    }

    /// Out-of-range indices are a no-op. Removing the active track unsets the
    /// active slot; removing an earlier track shifts it down by one.
    pub fn remove(&mut self, index: usize) -> Option<Track> {
        if index >= self.tracks.len() {
            return None;
        }

        let removed = self.tracks.remove(index);
        self.active = match self.active {
            Some(active) if index == active => None,
            Some(active) if index < active => Some(active - 1),
            other => other,
        };

        info!(title = %removed.title, "track removed");
        self.persist();
        Some(removed)
    }

    /// Reorders by remove-then-reinsert. The active slot tracks the moved
    /// item, or shifts by one when the move crosses it.
    pub fn move_track(&mut self, from: usize, to: usize) -> bool {
        if from == to || from >= self.tracks.len() || to >= self.tracks.len() {
            return false;
        }

        let track = self.tracks.remove(from);
        self.tracks.insert(to, track);

        if let Some(active) = self.active {
            self.active = if from == active {
                Some(to)
            } else if from < active && to >= active {
                Some(active - 1)
            } else if from > active && to <= active {
                Some(active + 1)
            } else {
                Some(active)
            };
        }

        self.persist();
        true
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
        self.active = None;
        self.persist();
    }

    /// Out-of-range indices clear the active slot rather than leaving a
    /// dangling reference.
    pub fn set_active(&mut self, index: Option<usize>) {
        self.active = index.filter(|idx| *idx < self.tracks.len());
    }

    pub fn set_filter(&mut self, query: &str) {
        self.filter = query.trim().to_string();
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// The displayed view: original indices plus tracks whose title or artist
    /// contains the filter, case-insensitively. An empty filter shows all.
    pub fn visible(&self) -> Vec<(usize, &Track)> {
        let needle = normalize_for_search(&self.filter);
        self.tracks
            .iter()
            .enumerate()
            .filter(|(_, track)| {
                needle.is_empty()
                    || normalize_for_search(&track.title).contains(&needle)
                    || normalize_for_search(&track.artist).contains(&needle)
            })
            .collect()
    }

    /// Applies probed metadata to the track with the given id. Fields the
    /// probe could not resolve are left as entered.
    pub fn update_metadata(
        &mut self,
        id: &str,
        title: Option<&str>,
        artist: Option<&str>,
        album: Option<&str>,
        duration_label: &str,
    ) -> bool {
        let Some(track) = self.tracks.iter_mut().find(|track| track.id == id) else {
            return false;
        };

        if let Some(title) = title {
            track.title = title.to_string();
        }
        if let Some(artist) = artist {
            track.artist = artist.to_string();
        }
        if let Some(album) = album {
            track.album = Some(album.to_string());
        }
        if duration_label != unknown_duration_label() {
            track.duration_label = duration_label.to_string();
        }

        self.persist();
        true
    }

    /// Saves the storable subset: local tracks carry their payload inline and
    /// would not survive a reload, so they are skipped.
    pub fn persist(&self) {
        let storable: Vec<PersistedTrack> = self
            .tracks
            .iter()
            .filter(|track| track.origin != TrackOrigin::Local)
            .map(|track| PersistedTrack {
                source: track.source.clone(),
                title: track.title.clone(),
                artist: track.artist.clone(),
                duration_label: track.duration_label.clone(),
                artwork: track.artwork.clone(),
            })
            .collect();
        self.storage.save(storage::KEY_PLAYLIST, &storable);
    }

    pub fn export_document(&self) -> PlaylistDocument {
        let now = OffsetDateTime::now_utc();
        let created = now.format(&Rfc3339).unwrap_or_default();
        let name = format!(
            "Playlist_{:04}-{:02}-{:02}",
            now.year(),
            u8::from(now.month()),
            now.day()
        );

        PlaylistDocument {
            name,
            created,
            songs: self.tracks.clone(),
        }
    }

    pub fn export_to(&self, path: &Path) -> Result<(), PlayerError> {
        let document = self.export_document();
        let json = serde_json::to_string_pretty(&document).map_err(|err| {
            PlayerError::MalformedPlaylist {
                reason: err.to_string(),
            }
        })?;
        fs::write(path, json).map_err(|source| PlayerError::PlaylistIo {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), songs = self.tracks.len(), "playlist exported");
        Ok(())
    }

    /// Replaces the playlist with the document's songs. A document without a
    /// `songs` array is rejected as malformed.
    pub fn import_from(&mut self, path: &Path) -> Result<usize, PlayerError> {
        let raw = fs::read_to_string(path).map_err(|source| PlayerError::PlaylistIo {
            path: path.to_path_buf(),
            source,
        })?;
        let document: PlaylistDocument =
            serde_json::from_str(&raw).map_err(|err| PlayerError::MalformedPlaylist {
                reason: err.to_string(),
            })?;

        self.tracks = document.songs;
        for track in &mut self.tracks {
            if track.id.is_empty() {
                track.id = locator_id(&track.source);
            }
        }
        self.active = None;
        self.persist();
        info!(path = %path.display(), songs = self.tracks.len(), "playlist imported");
        Ok(self.tracks.len())
    }
}

fn normalize_for_search(value: &str) -> String {
    value.nfc().collect::<String>().to_lowercase()
}
