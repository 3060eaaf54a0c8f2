use crate::config;
use crate::model::{FileHandle, TrackRef};
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use walkdir::WalkDir;

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg", "m4a", "flac", "aac"];
const UNKNOWN_ARTIST: &str = "Unknown Artist";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackLabels {
    pub title: String,
    pub artist: String,
}

pub fn track_labels(file_name: &str) -> TrackLabels {
    let stem = strip_extension(file_name);
    let parts: Vec<&str> = stem.split(" - ").collect();
    if parts.len() > 1 {
        TrackLabels {
            title: parts[1].to_string(),
            artist: parts[0].to_string(),
        }
    } else {
        TrackLabels {
            title: stem.to_string(),
            artist: String::from(UNKNOWN_ARTIST),
        }
    }
}

fn strip_extension(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(dot) if dot + 1 < file_name.len() => &file_name[..dot],
        _ => file_name,
    }
}

pub fn is_audio_track(track: &TrackRef) -> bool {
    track.mime_type.starts_with("audio/") || has_audio_extension(Path::new(&track.name))
}

fn has_audio_extension(path: &Path) -> bool {
    let ext = path.extension().and_then(OsStr::to_str).unwrap_or_default();
    AUDIO_EXTENSIONS
        .iter()
        .any(|supported| ext.eq_ignore_ascii_case(supported))
}

pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(OsStr::to_str)
        .unwrap_or_default()
        .to_ascii_lowercase();
    match ext.as_str() {
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" | "oga" => "audio/ogg",
        "opus" => "audio/opus",
        "m4a" => "audio/mp4",
        "flac" => "audio/flac",
        "aac" => "audio/aac",
        _ => "application/octet-stream",
    }
}

/// Builds track references for the given files and folders.
///
/// Folders are walked recursively and only contribute audio files. Explicit
/// files are returned as-is so the caller's audio filter decides on them.
/// Unreadable paths are skipped.
pub fn selection_from_paths(paths: &[PathBuf]) -> Vec<TrackRef> {
    let mut selected = Vec::new();

    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path)
                .follow_links(true)
                .into_iter()
                .filter_map(Result::ok)
            {
                if entry.file_type().is_file() && has_audio_extension(entry.path()) {
                    selected.extend(track_for_file(entry.path()));
                }
            }
        } else {
            selected.extend(track_for_file(path));
        }
    }

    selected
}

fn track_for_file(path: &Path) -> Option<TrackRef> {
    let metadata = match fs::metadata(path) {
        Ok(metadata) if metadata.is_file() => metadata,
        Ok(_) => return None,
        Err(err) => {
            tracing::warn!(path = %path.display(), "skipping unreadable selection: {err}");
            return None;
        }
    };

    let name = path.file_name()?.to_string_lossy().to_string();
    let last_modified = metadata
        .modified()
        .ok()
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0);

    Some(TrackRef {
        mime_type: mime_for_path(path).to_string(),
        size_bytes: metadata.len(),
        last_modified,
        handle: Some(FileHandle::new(config::normalize_path(path))),
        name,
    })
}
