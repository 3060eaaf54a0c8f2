use crate::error::StoreError;
use crate::model::{FileHandle, Playlist, TrackRef};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;

const STORE_VERSION: u32 = 1;
const CURRENT_RECORD_ID: &str = "current";

pub trait PlaylistStore {
    fn save_all(&self, playlists: &[Playlist], current_id: Option<&str>)
    -> Result<(), StoreError>;
    fn load_all(&self) -> LoadedCatalog;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadedCatalog {
    pub playlists: Vec<Playlist>,
    pub current_id: Option<String>,
}

impl LoadedCatalog {
    pub fn is_empty(&self) -> bool {
        self.playlists.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrackRecord {
    name: String,
    size: u64,
    #[serde(rename = "type")]
    mime_type: String,
    last_modified: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistRecord {
    id: String,
    name: String,
    files: Vec<TrackRecord>,
    #[serde(default)]
    handles: Vec<Option<FileHandle>>,
    #[serde(default)]
    album_art: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CurrentRecord {
    id: String,
    playlist_id: String,
}

#[derive(Debug, Serialize)]
struct StoreDocument {
    version: u32,
    playlists: Vec<PlaylistRecord>,
    current: Option<CurrentRecord>,
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(default)]
    playlists: Vec<serde_json::Value>,
    #[serde(default)]
    current: Option<serde_json::Value>,
}

impl PlaylistRecord {
    fn from_playlist(playlist: &Playlist) -> Self {
        Self {
            id: playlist.id.clone(),
            name: playlist.name.clone(),
            files: playlist
                .tracks
                .iter()
                .map(|track| TrackRecord {
                    name: track.name.clone(),
                    size: track.size_bytes,
                    mime_type: track.mime_type.clone(),
                    last_modified: track.last_modified,
                })
                .collect(),
            handles: playlist
                .tracks
                .iter()
                .map(|track| track.handle.clone())
                .collect(),
            album_art: playlist.album_art.clone(),
        }
    }

    fn into_playlist(self) -> Playlist {
        let mut handles = self.handles.into_iter();
        let tracks = self
            .files
            .into_iter()
            .map(|file| {
                let handle = handles.next().flatten();
                restore_track(file, handle)
            })
            .collect();

        Playlist {
            id: self.id,
            name: self.name,
            tracks,
            album_art: self.album_art,
        }
    }
}

fn restore_track(file: TrackRecord, handle: Option<FileHandle>) -> TrackRef {
    let mut track = TrackRef {
        name: file.name,
        size_bytes: file.size,
        mime_type: file.mime_type,
        last_modified: file.last_modified,
        handle: None,
    };

    let Some(handle) = handle else {
        return track;
    };

    match handle.resolve() {
        Ok(resolved) => {
            track.size_bytes = resolved.size_bytes;
            track.last_modified = resolved.last_modified;
            track.handle = Some(handle);
        }
        Err(err) => {
            tracing::warn!(track = %track.name, "could not restore file handle: {err}");
        }
    }
    track
}

pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn backup_path(&self) -> PathBuf {
        self.path.with_extension("json.bak")
    }

    fn temp_path(&self) -> PathBuf {
        self.path.with_extension("json.tmp")
    }

    fn write_atomically(&self, json: &str) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        if self.path.exists() {
            let backup = self.backup_path();
            if let Err(err) = fs::copy(&self.path, &backup) {
                tracing::warn!(backup = %backup.display(), "could not back up playlist store: {err}");
            }
        }

        let temp = self.temp_path();
        let write_err = |source| StoreError::Write {
            path: temp.clone(),
            source,
        };
        let mut file = File::create(&temp).map_err(write_err)?;
        file.write_all(json.as_bytes()).map_err(write_err)?;
        file.sync_all().map_err(write_err)?;
        drop(file);

        fs::rename(&temp, &self.path).map_err(|source| StoreError::Write {
            path: self.path.clone(),
            source,
        })
    }

    fn read_document(&self) -> Option<RawDocument> {
        if !self.path.exists() {
            return None;
        }

        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::error!(path = %self.path.display(), "failed to read playlist store: {err}");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(document) => Some(document),
            Err(err) => {
                tracing::error!(path = %self.path.display(), "failed to parse playlist store: {err}");
                None
            }
        }
    }
}

impl PlaylistStore for JsonFileStore {
    fn save_all(
        &self,
        playlists: &[Playlist],
        current_id: Option<&str>,
    ) -> Result<(), StoreError> {
        let document = StoreDocument {
            version: STORE_VERSION,
            playlists: playlists.iter().map(PlaylistRecord::from_playlist).collect(),
            current: current_id.map(|id| CurrentRecord {
                id: String::from(CURRENT_RECORD_ID),
                playlist_id: id.to_string(),
            }),
        };
        let json = serde_json::to_string_pretty(&document)?;
        self.write_atomically(&json)?;
        tracing::debug!(playlists = playlists.len(), "playlist store saved");
        Ok(())
    }

    fn load_all(&self) -> LoadedCatalog {
        let Some(document) = self.read_document() else {
            return LoadedCatalog::default();
        };

        let mut seen = HashSet::new();
        let mut playlists = Vec::with_capacity(document.playlists.len());
        for (position, value) in document.playlists.into_iter().enumerate() {
            let record = match serde_json::from_value::<PlaylistRecord>(value) {
                Ok(record) => record,
                Err(err) => {
                    tracing::warn!(position, "skipping malformed playlist record: {err}");
                    continue;
                }
            };
            if record.id.is_empty() || record.name.trim().is_empty() {
                tracing::warn!(position, "skipping playlist record without id or name");
                continue;
            }
            if !seen.insert(record.id.clone()) {
                tracing::warn!(id = %record.id, "skipping duplicate playlist record");
                continue;
            }
            playlists.push(record.into_playlist());
        }

        let current_id = document
            .current
            .and_then(|value| serde_json::from_value::<CurrentRecord>(value).ok())
            .map(|record| record.playlist_id)
            .filter(|id| seen.contains(id));

        LoadedCatalog {
            playlists,
            current_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn track(name: &str, handle: Option<PathBuf>) -> TrackRef {
        TrackRef {
            name: name.to_string(),
            size_bytes: 10,
            mime_type: String::from("audio/mpeg"),
            last_modified: 1_700_000_000_000,
            handle: handle.map(FileHandle::new),
        }
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempdir().expect("tempdir");
        let audio = dir.path().join("a.mp3");
        fs::write(&audio, b"abc").expect("write");
        let store = JsonFileStore::new(dir.path().join("playlists.json"));

        let mut first = Playlist::new("p1", "Morning");
        first.tracks = vec![track("a.mp3", Some(audio.clone())), track("b.mp3", None)];
        first.album_art = Some(String::from("data:image/png;base64,AAAA"));
        let second = Playlist::new("p2", "Evening");

        store
            .save_all(&[first, second], Some("p2"))
            .expect("save");
        let loaded = store.load_all();

        let names: Vec<&str> = loaded.playlists.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Morning", "Evening"]);
        let tracks: Vec<&str> = loaded.playlists[0]
            .tracks
            .iter()
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(tracks, vec!["a.mp3", "b.mp3"]);
        assert_eq!(loaded.playlists[0].tracks[0].handle_path(), Some(audio.as_path()));
        assert_eq!(loaded.playlists[0].tracks[0].size_bytes, 3);
        assert!(loaded.playlists[0].tracks[1].is_stub());
        assert_eq!(
            loaded.playlists[0].album_art.as_deref(),
            Some("data:image/png;base64,AAAA")
        );
        assert_eq!(loaded.current_id.as_deref(), Some("p2"));
    }

    #[test]
    fn revoked_handle_degrades_to_stub() {
        let dir = tempdir().expect("tempdir");
        let audio = dir.path().join("gone.mp3");
        fs::write(&audio, b"abc").expect("write");
        let store = JsonFileStore::new(dir.path().join("playlists.json"));

        let mut playlist = Playlist::new("p1", "Mix");
        playlist.tracks = vec![track("gone.mp3", Some(audio.clone()))];
        store.save_all(&[playlist], Some("p1")).expect("save");
        fs::remove_file(&audio).expect("remove");

        let loaded = store.load_all();
        assert_eq!(loaded.playlists[0].tracks.len(), 1);
        assert!(loaded.playlists[0].tracks[0].is_stub());
        assert_eq!(loaded.playlists[0].tracks[0].size_bytes, 10);
    }

    #[test]
    fn failed_backup_does_not_block_the_save() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("playlists.json");
        let store = JsonFileStore::new(&path);
        store
            .save_all(&[Playlist::new("p1", "Old")], Some("p1"))
            .expect("first save");
        fs::create_dir(path.with_extension("json.bak")).expect("block backup");

        store
            .save_all(&[Playlist::new("p2", "New")], Some("p2"))
            .expect("save without backup");

        let loaded = store.load_all();
        assert_eq!(loaded.playlists[0].name, "New");
        assert!(path.with_extension("json.bak").is_dir());
    }

    #[test]
    fn missing_store_is_empty() {
        let dir = tempdir().expect("tempdir");
        let store = JsonFileStore::new(dir.path().join("playlists.json"));
        assert!(store.load_all().is_empty());
    }

    #[test]
    fn unparseable_store_is_empty() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("playlists.json");
        fs::write(&path, "{ not json").expect("write");
        assert_eq!(JsonFileStore::new(path).load_all(), LoadedCatalog::default());
    }

    #[test]
    fn malformed_record_only_drops_itself() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("playlists.json");
        fs::write(
            &path,
            r#"{
                "version": 1,
                "playlists": [
                    { "id": "bad", "name": 42 },
                    { "id": "ok", "name": "Good", "files": [
                        { "name": "x.mp3", "size": 1, "type": "audio/mpeg", "lastModified": 0 }
                    ] },
                    { "id": "", "name": "No id", "files": [] }
                ],
                "current": { "id": "current", "playlistId": "bad" }
            }"#,
        )
        .expect("write");

        let loaded = JsonFileStore::new(path).load_all();
        assert_eq!(loaded.playlists.len(), 1);
        assert_eq!(loaded.playlists[0].id, "ok");
        assert!(loaded.playlists[0].tracks[0].is_stub());
        assert_eq!(loaded.current_id, None);
    }

    #[test]
    fn save_replaces_previous_records_and_keeps_backup() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("playlists.json");
        let store = JsonFileStore::new(&path);

        store
            .save_all(
                &[Playlist::new("p1", "One"), Playlist::new("p2", "Two")],
                Some("p1"),
            )
            .expect("first save");
        store
            .save_all(&[Playlist::new("p2", "Two")], None)
            .expect("second save");

        let loaded = store.load_all();
        assert_eq!(loaded.playlists.len(), 1);
        assert_eq!(loaded.playlists[0].id, "p2");
        assert_eq!(loaded.current_id, None);
        assert!(path.with_extension("json.bak").exists());
        assert!(!path.with_extension("json.tmp").exists());
    }
}
