use crate::library;
use crate::model::TrackRef;
use crate::transport::TransportState;
use anyhow::{Context, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use crossbeam::channel::{self, Receiver, Sender};
use souvlaki::{
    MediaControlEvent, MediaMetadata, MediaPlayback, MediaPosition, PlatformConfig, SeekDirection,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    Playing,
    Paused,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NowPlaying {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub artwork: Option<String>,
}

impl NowPlaying {
    pub fn for_track(track: &TrackRef, playlist_name: &str, artwork: Option<&str>) -> Self {
        let labels = library::track_labels(&track.name);
        Self {
            title: labels.title,
            artist: labels.artist,
            album: playlist_name.to_string(),
            artwork: artwork.map(ToOwned::to_owned),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionState {
    pub status: PlaybackStatus,
    pub duration_secs: Option<f64>,
    pub position_secs: f64,
    pub rate: f64,
}

impl PositionState {
    pub fn from_transport(state: &TransportState, loaded: bool) -> Self {
        let status = match (loaded, state.playing) {
            (false, _) => PlaybackStatus::Stopped,
            (true, true) => PlaybackStatus::Playing,
            (true, false) => PlaybackStatus::Paused,
        };
        Self {
            status,
            duration_secs: state.duration_secs,
            position_secs: state.position_secs,
            rate: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MediaIntent {
    Play,
    Pause,
    Toggle,
    Next,
    Previous,
    /// Relative seek in seconds; negative rewinds.
    SeekBy(f64),
    SeekTo(f64),
}

pub trait MediaControls {
    fn set_metadata(&mut self, now_playing: &NowPlaying);
    fn set_position(&mut self, position: &PositionState);
    fn clear(&mut self);
}

#[derive(Debug, Default)]
pub struct LogMediaControls {
    last_status: Option<PlaybackStatus>,
}

impl MediaControls for LogMediaControls {
    fn set_metadata(&mut self, now_playing: &NowPlaying) {
        tracing::info!(
            title = %now_playing.title,
            artist = %now_playing.artist,
            album = %now_playing.album,
            artwork = now_playing.artwork.is_some(),
            "now playing"
        );
    }

    fn set_position(&mut self, position: &PositionState) {
        if self.last_status != Some(position.status) {
            tracing::debug!(status = ?position.status, "media playback state");
            self.last_status = Some(position.status);
        }
        tracing::trace!(
            position = position.position_secs,
            duration = ?position.duration_secs,
            rate = position.rate,
            "media position"
        );
    }

    fn clear(&mut self) {
        self.last_status = Some(PlaybackStatus::Stopped);
        tracing::debug!("media session cleared");
    }
}

pub struct OsMediaControls {
    controls: souvlaki::MediaControls,
    cover_dir: PathBuf,
    now_playing: Option<NowPlaying>,
    cover_url: Option<String>,
    duration: Option<Duration>,
}

impl OsMediaControls {
    /// OS events are translated to [`MediaIntent`]s and sent on `intents`
    /// from the binding's own thread.
    pub fn attach(intents: Sender<MediaIntent>, seek_step_secs: f64, cover_dir: PathBuf) -> Result<Self> {
        let mut controls = souvlaki::MediaControls::new(PlatformConfig {
            dbus_name: "tunelist",
            display_name: "TuneList",
            hwnd: None,
        })
        .map_err(|err| anyhow::anyhow!("media session unavailable: {err:?}"))?;

        controls
            .attach(move |event: MediaControlEvent| {
                let Some(intent) = intent_for_event(event, seek_step_secs) else {
                    return;
                };
                if intents.send(intent).is_err() {
                    tracing::debug!(?intent, "player loop gone, media intent dropped");
                }
            })
            .map_err(|err| anyhow::anyhow!("could not attach media handler: {err:?}"))?;

        tracing::info!("media session attached");
        Ok(Self {
            controls,
            cover_dir,
            now_playing: None,
            cover_url: None,
            duration: None,
        })
    }

    fn push_metadata(&mut self) {
        let Some(now_playing) = &self.now_playing else {
            return;
        };
        let metadata = MediaMetadata {
            title: Some(&now_playing.title),
            artist: Some(&now_playing.artist),
            album: Some(&now_playing.album),
            cover_url: self.cover_url.as_deref(),
            duration: self.duration,
        };
        if let Err(err) = self.controls.set_metadata(metadata) {
            tracing::warn!("media metadata rejected: {err:?}");
        }
    }
}

impl MediaControls for OsMediaControls {
    fn set_metadata(&mut self, now_playing: &NowPlaying) {
        self.cover_url = now_playing.artwork.as_deref().and_then(|artwork| {
            match write_cover(&self.cover_dir, artwork) {
                Ok(path) => Some(format!("file://{}", path.display())),
                Err(err) => {
                    tracing::debug!("artwork not exported: {err:#}");
                    None
                }
            }
        });
        self.now_playing = Some(now_playing.clone());
        self.duration = None;
        self.push_metadata();
    }

    fn set_position(&mut self, position: &PositionState) {
        let duration = position
            .duration_secs
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            .map(Duration::from_secs_f64);
        if duration != self.duration {
            self.duration = duration;
            self.push_metadata();
        }
        if let Err(err) = self.controls.set_playback(playback_for(position)) {
            tracing::warn!("media playback state rejected: {err:?}");
        }
    }

    fn clear(&mut self) {
        self.now_playing = None;
        self.cover_url = None;
        self.duration = None;
        if let Err(err) = self.controls.set_playback(MediaPlayback::Stopped) {
            tracing::warn!("media playback state rejected: {err:?}");
        }
    }
}

fn playback_for(position: &PositionState) -> MediaPlayback {
    let progress = Some(position.position_secs)
        .filter(|secs| secs.is_finite())
        .map(|secs| MediaPosition(Duration::from_secs_f64(secs.max(0.0))));
    match position.status {
        PlaybackStatus::Playing => MediaPlayback::Playing { progress },
        PlaybackStatus::Paused => MediaPlayback::Paused { progress },
        PlaybackStatus::Stopped => MediaPlayback::Stopped,
    }
}

/// Stop maps to pause so the track stays bound. Events with no player
/// counterpart map to `None`.
fn intent_for_event(event: MediaControlEvent, seek_step_secs: f64) -> Option<MediaIntent> {
    let signed = |direction: SeekDirection, secs: f64| match direction {
        SeekDirection::Forward => secs,
        SeekDirection::Backward => -secs,
    };
    match event {
        MediaControlEvent::Play => Some(MediaIntent::Play),
        MediaControlEvent::Pause | MediaControlEvent::Stop => Some(MediaIntent::Pause),
        MediaControlEvent::Toggle => Some(MediaIntent::Toggle),
        MediaControlEvent::Next => Some(MediaIntent::Next),
        MediaControlEvent::Previous => Some(MediaIntent::Previous),
        MediaControlEvent::Seek(direction) => {
            Some(MediaIntent::SeekBy(signed(direction, seek_step_secs)))
        }
        MediaControlEvent::SeekBy(direction, amount) => {
            Some(MediaIntent::SeekBy(signed(direction, amount.as_secs_f64())))
        }
        MediaControlEvent::SetPosition(MediaPosition(target)) => {
            Some(MediaIntent::SeekTo(target.as_secs_f64()))
        }
        _ => None,
    }
}

/// OS sessions only take artwork by URL, so the data URL is decoded to
/// `cover.<ext>` under `dir`.
fn write_cover(dir: &Path, data_url: &str) -> Result<PathBuf> {
    let (header, payload) = data_url
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(";base64,"))
        .context("artwork is not a base64 data URL")?;
    let extension = match header {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        other => anyhow::bail!("unsupported artwork type {other}"),
    };
    let bytes = STANDARD.decode(payload).context("artwork payload is not base64")?;

    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let path = dir.join(format!("cover.{extension}"));
    fs::write(&path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

pub fn media_intent_channel() -> (Sender<MediaIntent>, Receiver<MediaIntent>) {
    channel::unbounded()
}
