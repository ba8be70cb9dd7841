use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::time::Duration;

/// Duration label used for endless live streams.
pub const LIVE_DURATION_LABEL: &str = "∞ LIVE";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackOrigin {
    /// Added from a local file; the payload is embedded in the source
    /// locator and does not survive a restart.
    Local,
    RemoteUrl,
    RadioStream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RepeatMode {
    #[default]
    None,
    All,
    One,
}

impl RepeatMode {
    pub fn next(self) -> Self {
        match self {
            Self::None => Self::All,
            Self::All => Self::One,
            Self::One => Self::None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::None => "off",
            Self::All => "all",
            Self::One => "one",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Track {
    pub id: String,
    /// Opaque source locator: a URL, a `data:` payload, or a file path.
    pub source: String,
    pub title: String,
    pub artist: String,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default = "unknown_duration_label")]
    pub duration_label: String,
    #[serde(default)]
    pub artwork: Option<String>,
    pub origin: TrackOrigin,
}

impl Track {
    pub fn new(source: String, title: String, artist: String, origin: TrackOrigin) -> Self {
        Self {
            id: locator_id(&source),
            source,
            title,
            artist,
            album: None,
            duration_label: unknown_duration_label(),
            artwork: None,
            origin,
        }
    }

    pub fn source_kind(&self) -> SourceKind {
        SourceKind::parse(&self.source)
    }
}

pub fn unknown_duration_label() -> String {
    String::from("0:00")
}

/// Stable id derived from the source locator.
pub fn locator_id(source: &str) -> String {
    let digest = Sha256::digest(source.as_bytes());
    let mut id = String::with_capacity(16);
    for byte in digest.iter().take(8) {
        id.push_str(&format!("{byte:02x}"));
    }
    id
}

/// Where a source locator actually points. Only the output backend needs
/// this; the rest of the player treats locators as opaque strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    Embedded { mime: String, payload: String },
    Remote(String),
    File(PathBuf),
}

impl SourceKind {
    pub fn parse(source: &str) -> Self {
        if let Some(rest) = source.strip_prefix("data:") {
            if let Some((mime, payload)) = rest.split_once(";base64,") {
                return Self::Embedded {
                    mime: mime.to_string(),
                    payload: payload.to_string(),
                };
            }
        }

        let lowered = source.to_ascii_lowercase();
        if lowered.starts_with("http://") || lowered.starts_with("https://") {
            return Self::Remote(source.to_string());
        }

        Self::File(PathBuf::from(source))
    }
}

/// On-disk playlist document produced by export and accepted by import.
/// Only `songs` is required; the other fields default when absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistDocument {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub created: String,
    pub songs: Vec<Track>,
}

pub fn duration_label(duration: Duration) -> String {
    let total = duration.as_secs();
    format!("{}:{:02}", total / 60, total % 60)
}
