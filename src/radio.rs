use crate::error::PlayerError;
use crate::model::{LIVE_DURATION_LABEL, Track, TrackOrigin, locator_id};
use serde::Deserialize;
use std::time::Duration;
use tracing::info;

pub const DEFAULT_DIRECTORY_URL: &str = "https://de1.api.radio-browser.info/json/stations/topvote";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// One station descriptor as the directory reports it. Every field defaults
/// so a sparse record deserializes instead of failing the whole batch.
#[derive(Debug, Clone, Deserialize)]
pub struct StationRecord {
    #[serde(default)]
    pub stationuuid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url_resolved: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub favicon: String,
    #[serde(default)]
    pub bitrate: u32,
}

/// Read-only client for the remote station directory.
pub struct StationDirectory {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl StationDirectory {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_DIRECTORY_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Fetches up to `limit` top-voted stations as live-stream tracks.
    pub fn top_stations(&self, limit: usize) -> Result<Vec<Track>, PlayerError> {
        let url = format!("{}/{limit}", self.base_url);
        let records: Vec<StationRecord> = self
            .client
            .get(&url)
            .send()?
            .error_for_status()?
            .json()?;

        let tracks = stations_to_tracks(records);
        info!(count = tracks.len(), "station directory fetched");
        Ok(tracks)
    }
}

impl Default for StationDirectory {
    fn default() -> Self {
        Self::new()
    }
}

/// Records without a resolved stream URL are unplayable and dropped before
/// they become tracks.
pub fn stations_to_tracks(records: Vec<StationRecord>) -> Vec<Track> {
    records
        .into_iter()
        .filter(|record| !record.url_resolved.is_empty())
        .enumerate()
        .map(|(index, record)| {
            let id = if record.stationuuid.is_empty() {
                locator_id(&record.url_resolved)
            } else {
                format!("radio-{}", record.stationuuid)
            };
            let title = if record.name.trim().is_empty() {
                format!("Radio Station {}", index + 1)
            } else {
                record.name.trim().to_string()
            };
            let artist = if record.country.is_empty() {
                String::from("Unknown Country")
            } else {
                record.country
            };
            let tags = if record.tags.is_empty() {
                String::from("Radio")
            } else {
                record.tags
            };
            let language = if record.language.is_empty() {
                String::from("Various")
            } else {
                record.language
            };

            Track {
                id,
                source: record.url_resolved,
                title,
                artist,
                album: Some(format!("{tags} \u{2022} {language}")),
                duration_label: String::from(LIVE_DURATION_LABEL),
                artwork: (!record.favicon.is_empty()).then_some(record.favicon),
                origin: TrackOrigin::RadioStream,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_records() -> Vec<StationRecord> {
        serde_json::from_str(
            r#"[
                {
                    "stationuuid": "abc-123",
                    "name": "Jazz FM",
                    "url_resolved": "https://stream.example/jazz",
                    "country": "Germany",
                    "tags": "jazz,smooth",
                    "language": "german",
                    "favicon": "https://stream.example/icon.png",
                    "bitrate": 128
                },
                {
                    "stationuuid": "def-456",
                    "name": "Silent FM",
                    "url_resolved": "",
                    "country": "Nowhere"
                },
                {
                    "stationuuid": "ghi-789",
                    "name": "  ",
                    "url_resolved": "https://stream.example/mystery"
                }
            ]"#,
        )
        .expect("sample records parse")
    }

    #[test]
    fn stations_without_a_stream_url_are_dropped() {
        let tracks = stations_to_tracks(sample_records());
        assert_eq!(tracks.len(), 2);
        assert!(tracks.iter().all(|track| !track.source.is_empty()));
    }

    #[test]
    fn station_fields_map_onto_the_track() {
        let tracks = stations_to_tracks(sample_records());
        let jazz = &tracks[0];

        assert_eq!(jazz.id, "radio-abc-123");
        assert_eq!(jazz.title, "Jazz FM");
        assert_eq!(jazz.artist, "Germany");
        assert_eq!(jazz.album.as_deref(), Some("jazz,smooth \u{2022} german"));
        assert_eq!(jazz.duration_label, LIVE_DURATION_LABEL);
        assert_eq!(jazz.origin, TrackOrigin::RadioStream);
        assert_eq!(jazz.artwork.as_deref(), Some("https://stream.example/icon.png"));
    }

    #[test]
    fn missing_fields_fall_back_to_placeholders() {
        let tracks = stations_to_tracks(sample_records());
        let mystery = &tracks[1];

        assert_eq!(mystery.title, "Radio Station 2");
        assert_eq!(mystery.artist, "Unknown Country");
        assert_eq!(mystery.album.as_deref(), Some("Radio \u{2022} Various"));
        assert!(mystery.artwork.is_none());
    }

    #[test]
    fn sparse_record_deserializes_with_defaults() {
        let record: StationRecord = serde_json::from_str(r#"{"name":"X"}"#).expect("parse");
        assert_eq!(record.name, "X");
        assert!(record.url_resolved.is_empty());
        assert_eq!(record.bitrate, 0);
    }
}
