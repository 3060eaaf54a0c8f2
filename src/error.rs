use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to create store directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write store {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode store document: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
#[error("file handle for {path} no longer resolves: {source}")]
pub struct HandleError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("\"{name}\" cannot be played; select the file again")]
    Unplayable { name: String },

    #[error("playback failed: {0}")]
    Playback(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UserError {
    #[error("you must have at least one playlist")]
    LastPlaylist,

    #[error("please enter a playlist name")]
    EmptyName,

    #[error("no valid audio files found")]
    NoValidAudio,

    #[error("selected file is not an image")]
    NotAnImage,
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    User(#[from] UserError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
