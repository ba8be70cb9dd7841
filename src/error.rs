use std::path::PathBuf;
use thiserror::Error;

/// Failures surfaced by player operations. Every public operation catches
/// these at its boundary and turns them into a user-facing notification;
/// storage write failures are logged and swallowed instead of reported here.
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("track index {index} is out of range (playlist has {len} tracks)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("the playlist is empty")]
    EmptyPlaylist,

    #[error("\"{title}\" is already in the playlist")]
    DuplicateTrack { title: String },

    #[error("not a valid URL: {input}")]
    InvalidUrl { input: String },

    #[error("not a playlist file: {reason}")]
    MalformedPlaylist { reason: String },

    #[error("failed to access playlist file {path}")]
    PlaylistIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("playback failed: {reason}")]
    Playback { reason: String },

    #[error("station directory request failed")]
    Directory(#[from] reqwest::Error),
}
