use crate::audio::AudioEngine;
use crate::catalog::{Catalog, PlaylistRow};
use crate::error::{CoreError, CoreResult, UserError};
use crate::events::{EventBus, PlayerEvent};
use crate::library;
use crate::media::{MediaControls, MediaIntent, NowPlaying, PositionState};
use crate::model::{Playlist, Settings, TrackRef};
use crate::queue::{PlayQueue, Removal};
use crate::store::PlaylistStore;
use crate::transport::{Transport, TransportEvent};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use crossbeam::channel::Receiver;

pub struct PlayerCore {
    catalog: Catalog,
    queue: PlayQueue,
    transport: Transport,
    store: Box<dyn PlaylistStore>,
    media: Box<dyn MediaControls>,
    events: EventBus,
    settings: Settings,
    last_progress_second: Option<u64>,
}

impl PlayerCore {
    /// Loads the catalog, falling back to one empty "My Playlist", and
    /// stages the current playlist in the queue without starting playback.
    pub fn bootstrap(
        store: Box<dyn PlaylistStore>,
        engine: Box<dyn AudioEngine>,
        media: Box<dyn MediaControls>,
        settings: Settings,
    ) -> Self {
        let loaded = store.load_all();
        let fresh = loaded.is_empty();
        let catalog = Catalog::from_loaded(loaded);

        let mut queue = PlayQueue::new();
        if let Some(playlist) = catalog.current() {
            queue.load(playlist.tracks.clone());
        }

        let mut transport = Transport::new(engine);
        transport.set_volume(settings.volume);

        let mut core = Self {
            catalog,
            queue,
            transport,
            store,
            media,
            events: EventBus::new(),
            settings,
            last_progress_second: None,
        };

        if fresh {
            core.persist();
        }
        tracing::info!(
            playlists = core.catalog.len(),
            tracks = core.queue.len(),
            output = core.transport.output_name().unwrap_or_default(),
            "player ready"
        );
        core
    }

    pub fn shutdown(mut self) -> Settings {
        self.transport.stop();
        self.media.clear();
        self.persist();
        tracing::info!("player shut down");
        self.settings
    }

    pub fn subscribe(&mut self) -> Receiver<PlayerEvent> {
        self.events.subscribe()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn queue(&self) -> &PlayQueue {
        &self.queue
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn list_playlists(&self) -> Vec<PlaylistRow> {
        self.catalog.rows()
    }

    pub fn current_playlist(&self) -> Option<&Playlist> {
        self.catalog.current()
    }

    pub fn create_playlist(&mut self, name: &str) -> CoreResult<String> {
        let id = self.catalog.create(name).map_err(|err| self.surface(err))?;
        self.persist();
        self.events.emit(PlayerEvent::PlaylistListChanged);
        self.set_status(format!("Created playlist \"{}\"", name.trim()));
        Ok(id)
    }

    pub fn rename_playlist(&mut self, id: &str, name: &str) -> CoreResult<()> {
        let renamed = self
            .catalog
            .rename(id, name)
            .map_err(|err| self.surface(err))?;
        if !renamed {
            return Ok(());
        }

        self.persist();
        self.events.emit(PlayerEvent::PlaylistListChanged);
        if id == self.catalog.current_id() {
            self.publish_now_playing();
        }
        self.set_status(format!("Renamed playlist to \"{}\"", name.trim()));
        Ok(())
    }

    pub fn delete_playlist(&mut self, id: &str) -> CoreResult<()> {
        if self.catalog.len() <= 1 {
            return Err(self.surface(UserError::LastPlaylist));
        }
        if !self.catalog.contains(id) {
            return Ok(());
        }

        if id == self.catalog.current_id()
            && let Some(other) = self.catalog.first_other_id(id)
        {
            self.switch_playlist(&other);
        }

        let removed = self.catalog.remove(id).map_err(|err| self.surface(err))?;
        self.persist();
        self.events.emit(PlayerEvent::PlaylistListChanged);
        if let Some(playlist) = removed {
            self.set_status(format!("Deleted playlist \"{}\"", playlist.name));
        }
        Ok(())
    }

    pub fn switch_playlist(&mut self, id: &str) {
        if id == self.catalog.current_id() || !self.catalog.contains(id) {
            return;
        }

        self.flush_queue_to_catalog();
        self.stop_playback();
        self.catalog.set_current(id);
        let tracks = self
            .catalog
            .current()
            .map(|playlist| playlist.tracks.clone())
            .unwrap_or_default();
        self.queue.load(tracks);
        self.persist();

        self.events.emit(PlayerEvent::PlaylistListChanged);
        self.events.emit(PlayerEvent::QueueChanged);
        let name = self
            .catalog
            .current()
            .map(|playlist| playlist.name.clone())
            .unwrap_or_default();
        tracing::debug!(%id, "switched playlist");
        self.set_status(format!("Switched to \"{name}\""));
    }

    /// An empty selection is a cancelled pick and changes nothing.
    pub fn handle_files(&mut self, selection: Vec<TrackRef>) -> CoreResult<usize> {
        let Some(accepted) = self.accept_audio(selection)? else {
            return Ok(0);
        };
        let count = accepted.len();

        self.stop_playback();
        self.queue.replace_tracks(accepted);
        self.persist();
        self.events.emit(PlayerEvent::QueueChanged);
        self.set_status(format!("Loaded {count} tracks"));
        Ok(count)
    }

    pub fn add_files(&mut self, selection: Vec<TrackRef>) -> CoreResult<usize> {
        let Some(accepted) = self.accept_audio(selection)? else {
            return Ok(0);
        };
        let count = accepted.len();

        self.queue.add_tracks(accepted);
        self.persist();
        self.events.emit(PlayerEvent::QueueChanged);
        self.set_status(format!("Added {count} tracks"));
        Ok(count)
    }

    pub fn remove_track(&mut self, index: usize) -> CoreResult<()> {
        let outcome = self.queue.remove_at(index);
        if outcome == Removal::OutOfRange {
            return Ok(());
        }

        self.persist();
        self.events.emit(PlayerEvent::QueueChanged);

        match outcome {
            Removal::CurrentReplaced(_) => {
                self.stop_playback();
                self.play_current()
            }
            Removal::Emptied => {
                self.stop_playback();
                self.media.clear();
                Ok(())
            }
            Removal::Other | Removal::OutOfRange => Ok(()),
        }
    }

    pub fn select_index(&mut self, index: usize) -> CoreResult<()> {
        if self.queue.select(index).is_none() {
            return Ok(());
        }
        self.play_current()
    }

    pub fn next(&mut self) -> CoreResult<()> {
        if self.queue.advance_next().is_none() {
            return Ok(());
        }
        self.play_current()
    }

    pub fn previous(&mut self) -> CoreResult<()> {
        if self.queue.advance_previous().is_none() {
            return Ok(());
        }
        self.play_current()
    }

    /// With nothing bound, (re)starts the selected track, or the first one.
    pub fn toggle_play_pause(&mut self) -> CoreResult<()> {
        if !self.transport.is_loaded() {
            if self.queue.is_empty() {
                return Ok(());
            }
            let index = self.queue.current_index().unwrap_or(0);
            return self.select_index(index);
        }

        let result = self.transport.toggle_pause();
        let playing = self.transport.is_playing();
        self.events
            .emit(PlayerEvent::PlaybackStateChanged { playing });
        self.publish_position();
        result.map(|_| ()).map_err(|err| self.surface(err))
    }

    pub fn toggle_shuffle(&mut self) -> bool {
        let enabled = self.queue.toggle_shuffle();
        self.emit_mode();
        self.set_status(if enabled { "Shuffle on" } else { "Shuffle off" });
        enabled
    }

    pub fn toggle_repeat_one(&mut self) -> bool {
        let enabled = self.queue.toggle_repeat_one();
        self.emit_mode();
        self.set_status(if enabled {
            "Repeat one on"
        } else {
            "Repeat one off"
        });
        enabled
    }

    pub fn set_shuffle_order(&mut self, order: Vec<usize>) -> bool {
        let accepted = self.queue.set_shuffle_order(order);
        if accepted {
            self.events.emit(PlayerEvent::QueueChanged);
        }
        accepted
    }

    pub fn seek_to_fraction(&mut self, fraction: f64) -> CoreResult<()> {
        self.transport
            .seek_to_fraction(fraction)
            .map_err(|err| self.surface(err))?;
        self.after_seek();
        Ok(())
    }

    pub fn seek_by(&mut self, offset_secs: f64) -> CoreResult<()> {
        self.transport
            .seek_by(offset_secs)
            .map_err(|err| self.surface(err))?;
        self.after_seek();
        Ok(())
    }

    pub fn seek_step_secs(&self) -> f64 {
        f64::from(self.settings.seek_step_seconds)
    }

    pub fn set_volume(&mut self, fraction: f32) -> f32 {
        let volume = self.transport.set_volume(fraction);
        self.settings.volume = volume;
        self.events.emit(PlayerEvent::VolumeChanged { volume });
        volume
    }

    pub fn set_album_art(&mut self, bytes: &[u8]) -> CoreResult<()> {
        let format = image::guess_format(bytes).map_err(|err| {
            tracing::debug!("artwork rejected: {err}");
            self.surface(UserError::NotAnImage)
        })?;
        let data_url = format!(
            "data:{};base64,{}",
            format.to_mime_type(),
            STANDARD.encode(bytes)
        );

        if let Some(playlist) = self.catalog.current_mut() {
            playlist.album_art = Some(data_url);
        }
        self.persist();
        self.events.emit(PlayerEvent::PlaylistListChanged);
        self.publish_now_playing();
        self.set_status("Album art updated");
        Ok(())
    }

    pub fn tick(&mut self) -> CoreResult<()> {
        match self.transport.poll() {
            None => Ok(()),
            Some(TransportEvent::Ended) => {
                tracing::debug!("track ended");
                self.events
                    .emit(PlayerEvent::PlaybackStateChanged { playing: false });
                self.next()
            }
            Some(TransportEvent::Progress { position, duration }) => {
                let second = position.as_secs();
                if self.last_progress_second != Some(second) {
                    self.last_progress_second = Some(second);
                    self.events.emit(PlayerEvent::ProgressTick {
                        position_secs: position.as_secs_f64(),
                        duration_secs: duration.map(|total| total.as_secs_f64()),
                    });
                    if self.transport.is_playing() {
                        self.publish_position();
                    }
                }
                Ok(())
            }
        }
    }

    pub fn handle_media_intent(&mut self, intent: MediaIntent) -> CoreResult<()> {
        tracing::debug!(?intent, "media intent");
        match intent {
            MediaIntent::Play if self.transport.is_playing() => Ok(()),
            MediaIntent::Pause if !self.transport.is_playing() => Ok(()),
            MediaIntent::Play | MediaIntent::Pause | MediaIntent::Toggle => {
                self.toggle_play_pause()
            }
            MediaIntent::Next => self.next(),
            MediaIntent::Previous => self.previous(),
            MediaIntent::SeekBy(offset) => self.seek_by(offset),
            MediaIntent::SeekTo(target) => {
                let Some(position) = self.transport.position() else {
                    return Ok(());
                };
                self.seek_by(target - position.as_secs_f64())
            }
        }
    }

    pub fn flush_queue_to_catalog(&mut self) {
        let tracks = self.queue.tracks().to_vec();
        if let Some(playlist) = self.catalog.current_mut() {
            playlist.tracks = tracks;
        }
    }

    pub fn persist(&mut self) {
        self.flush_queue_to_catalog();
        let current_id = self.catalog.current_id().to_string();
        if let Err(err) = self
            .store
            .save_all(self.catalog.playlists(), Some(current_id.as_str()))
        {
            tracing::warn!("failed to save playlists: {err}");
            self.set_status(format!("Could not save playlists: {err}"));
        }
    }

    fn accept_audio(&mut self, selection: Vec<TrackRef>) -> CoreResult<Option<Vec<TrackRef>>> {
        if selection.is_empty() {
            return Ok(None);
        }
        let offered = selection.len();
        let accepted: Vec<TrackRef> = selection
            .into_iter()
            .filter(library::is_audio_track)
            .collect();
        if accepted.is_empty() {
            return Err(self.surface(UserError::NoValidAudio));
        }
        if accepted.len() < offered {
            tracing::debug!(
                skipped = offered - accepted.len(),
                "ignored non-audio selections"
            );
        }
        Ok(Some(accepted))
    }

    fn play_current(&mut self) -> CoreResult<()> {
        let Some((index, track)) = self
            .queue
            .current_index()
            .zip(self.queue.current_track().cloned())
        else {
            return Ok(());
        };

        let result = self.transport.load(&track);
        self.last_progress_second = None;
        let labels = library::track_labels(&track.name);
        self.events.emit(PlayerEvent::TrackChanged {
            index,
            title: labels.title,
            artist: labels.artist,
        });
        self.events.emit(PlayerEvent::PlaybackStateChanged {
            playing: self.transport.is_playing(),
        });

        match result {
            Ok(()) => {
                self.publish_now_playing();
                self.publish_position();
                Ok(())
            }
            Err(err) => Err(self.surface(err)),
        }
    }

    fn stop_playback(&mut self) {
        let was_playing = self.transport.is_playing();
        self.transport.stop();
        self.last_progress_second = None;
        if was_playing {
            self.events
                .emit(PlayerEvent::PlaybackStateChanged { playing: false });
        }
    }

    fn after_seek(&mut self) {
        self.last_progress_second = None;
        self.publish_position();
    }

    fn publish_now_playing(&mut self) {
        if !self.transport.is_loaded() {
            return;
        }
        let Some(track) = self.queue.current_track() else {
            return;
        };
        let (album, artwork) = self
            .catalog
            .current()
            .map(|playlist| (playlist.name.as_str(), playlist.album_art.as_deref()))
            .unwrap_or_default();
        let now_playing = NowPlaying::for_track(track, album, artwork);
        self.media.set_metadata(&now_playing);
    }

    fn publish_position(&mut self) {
        let state = self.transport.state();
        let position = PositionState::from_transport(&state, self.transport.is_loaded());
        self.media.set_position(&position);
    }

    fn emit_mode(&mut self) {
        self.events.emit(PlayerEvent::ModeChanged {
            shuffle: self.queue.is_shuffled(),
            repeat_one: self.queue.repeat_one(),
        });
    }

    fn set_status(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(status = %message);
        self.events.emit(PlayerEvent::Status(message));
    }

    fn surface(&mut self, err: impl Into<CoreError>) -> CoreError {
        let err = err.into();
        self.events.emit(PlayerEvent::Error(err.to_string()));
        err
    }
}
