use crate::error::HandleError;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

pub const DEFAULT_PLAYLIST_NAME: &str = "My Playlist";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHandle {
    pub path: PathBuf,
}

impl FileHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Re-acquires the file. Fails when the file was moved, deleted or made unreadable.
    pub fn resolve(&self) -> Result<ResolvedFile, HandleError> {
        let file = File::open(&self.path).map_err(|source| HandleError {
            path: self.path.clone(),
            source,
        })?;
        let metadata = file.metadata().map_err(|source| HandleError {
            path: self.path.clone(),
            source,
        })?;
        Ok(ResolvedFile {
            path: self.path.clone(),
            size_bytes: metadata.len(),
            last_modified: metadata
                .modified()
                .ok()
                .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
                .map(|elapsed| elapsed.as_millis() as i64)
                .unwrap_or(0),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub last_modified: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackSource {
    Resolved(ResolvedFile),
    Stub,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackRef {
    pub name: String,
    pub size_bytes: u64,
    pub mime_type: String,
    /// Unix milliseconds.
    pub last_modified: i64,
    pub handle: Option<FileHandle>,
}

impl TrackRef {
    pub fn is_stub(&self) -> bool {
        self.handle.is_none()
    }

    pub fn handle_path(&self) -> Option<&Path> {
        self.handle.as_ref().map(|handle| handle.path.as_path())
    }

    pub fn source(&self) -> Result<TrackSource, HandleError> {
        match &self.handle {
            Some(handle) => handle.resolve().map(TrackSource::Resolved),
            None => Ok(TrackSource::Stub),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    pub tracks: Vec<TrackRef>,
    pub album_art: Option<String>,
}

impl Playlist {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            tracks: Vec::new(),
            album_art: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    #[serde(default = "default_volume")]
    pub volume: f32,
    #[serde(default = "default_seek_step_seconds")]
    pub seek_step_seconds: u16,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_volume() -> f32 {
    0.7
}

fn default_seek_step_seconds() -> u16 {
    10
}

fn default_log_filter() -> String {
    String::from("info")
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            volume: default_volume(),
            seek_step_seconds: default_seek_step_seconds(),
            log_filter: default_log_filter(),
        }
    }
}
