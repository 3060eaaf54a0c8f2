use crate::audio::{AudioEngine, NullAudioEngine, RodioAudioEngine};
use crate::config::{self, Paths};
use crate::core::PlayerCore;
use crate::error::CoreResult;
use crate::events::PlayerEvent;
use crate::library;
use crate::logging;
use crate::media::{self, LogMediaControls, MediaControls, MediaIntent, OsMediaControls};
use crate::store::JsonFileStore;
use anyhow::{Context, Result};
use crossbeam::channel::{Receiver, Sender};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MediaKeyCode};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::fs;
use std::io::stdout;
use std::path::PathBuf;
use std::time::{Duration, Instant};

const VOLUME_STEP: f32 = 0.05;

#[derive(Debug, Default)]
pub struct AppStartupOptions {
    pub config_dir: Option<PathBuf>,
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Playlists,
    Queue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PendingConfirm {
    DeletePlaylist { id: String, name: String },
    RemoveTrack { index: usize, name: String },
}

#[derive(Debug)]
pub struct AppState {
    pub focus: Focus,
    pub playlist_cursor: usize,
    pub queue_cursor: usize,
    pub command_mode: bool,
    pub command_buffer: String,
    pub status: String,
    pub status_is_error: bool,
    pending: Option<PendingConfirm>,
    dirty: bool,
    quit: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            focus: Focus::Queue,
            playlist_cursor: 0,
            queue_cursor: 0,
            command_mode: false,
            command_buffer: String::new(),
            status: String::from("Type :help for commands"),
            status_is_error: false,
            pending: None,
            dirty: true,
            quit: false,
        }
    }

    pub fn confirm_prompt(&self) -> Option<String> {
        match self.pending.as_ref()? {
            PendingConfirm::DeletePlaylist { name, .. } => {
                Some(format!("Delete playlist \"{name}\"?"))
            }
            PendingConfirm::RemoveTrack { name, .. } => {
                Some(format!("Remove \"{name}\" from the playlist?"))
            }
        }
    }

    fn set_status(&mut self, message: impl Into<String>) {
        self.status = message.into();
        self.status_is_error = false;
        self.dirty = true;
    }

    fn set_error(&mut self, message: impl Into<String>) {
        self.status = message.into();
        self.status_is_error = true;
        self.dirty = true;
    }

    fn apply_event(&mut self, core: &PlayerCore, event: PlayerEvent) {
        match event {
            PlayerEvent::Status(message) => self.set_status(message),
            PlayerEvent::Error(message) => self.set_error(message),
            PlayerEvent::VolumeChanged { volume } => {
                self.set_status(format!("Volume: {}%", (volume * 100.0).round() as u16));
            }
            PlayerEvent::TrackChanged { index, .. } => self.queue_cursor = index,
            PlayerEvent::QueueChanged => {
                self.queue_cursor = self
                    .queue_cursor
                    .min(core.queue().len().saturating_sub(1));
            }
            PlayerEvent::PlaylistListChanged => {
                self.playlist_cursor = self
                    .playlist_cursor
                    .min(core.catalog().len().saturating_sub(1));
            }
            PlayerEvent::ProgressTick { .. }
            | PlayerEvent::PlaybackStateChanged { .. }
            | PlayerEvent::ModeChanged { .. } => {}
        }
        self.dirty = true;
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

pub fn run_with_startup(options: AppStartupOptions) -> Result<()> {
    let paths = Paths::resolve(options.config_dir)?;
    paths.ensure_root()?;
    let settings = config::load_settings(&paths)?;
    let _log_guard = logging::init(&paths, &settings.log_filter)?;
    tracing::info!(root = %paths.root.display(), "starting tunelist");

    let engine: Box<dyn AudioEngine> = match RodioAudioEngine::new() {
        Ok(engine) => Box::new(engine),
        Err(err) => {
            tracing::warn!("no audio output, running silent: {err:#}");
            Box::new(NullAudioEngine::new())
        }
    };
    let (intent_sender, intents) = media::media_intent_channel();
    let seek_step = f64::from(settings.seek_step_seconds);
    let media_controls: Box<dyn MediaControls> =
        match OsMediaControls::attach(intent_sender.clone(), seek_step, paths.root.join("artwork")) {
            Ok(controls) => Box::new(controls),
            Err(err) => {
                tracing::warn!("no OS media session, logging only: {err:#}");
                Box::new(LogMediaControls::default())
            }
        };
    let store = Box::new(JsonFileStore::new(paths.store_path()));
    let mut core = PlayerCore::bootstrap(store, engine, media_controls, settings);
    let events = core.subscribe();
    let mut state = AppState::new();

    if !options.paths.is_empty() {
        let selection = library::selection_from_paths(&options.paths);
        report(core.add_files(selection));
    }

    enable_raw_mode()?;
    let mut out = stdout();
    execute!(out, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(out);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let mut last_draw = Instant::now();

    let result: Result<()> = loop {
        pump(&mut core, &mut state, &events, &intents);

        if state.dirty || last_draw.elapsed() > Duration::from_millis(250) {
            terminal.draw(|frame| crate::ui::draw(frame, &core, &state))?;
            state.dirty = false;
            last_draw = Instant::now();
        }

        if !event::poll(Duration::from_millis(33))? {
            continue;
        }

        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        handle_key(&mut core, &mut state, key, &intent_sender);
        if state.quit {
            break Ok(());
        }
    };

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    let settings = core.shutdown();
    let save_result = config::save_settings(&paths, &settings);
    result?;
    save_result?;
    Ok(())
}

fn pump(
    core: &mut PlayerCore,
    state: &mut AppState,
    events: &Receiver<PlayerEvent>,
    intents: &Receiver<MediaIntent>,
) {
    for intent in intents.try_iter() {
        report(core.handle_media_intent(intent));
    }
    report(core.tick());
    for event in events.try_iter() {
        state.apply_event(core, event);
    }
}

fn report<T>(result: CoreResult<T>) {
    if let Err(err) = result {
        tracing::debug!("intent rejected: {err}");
    }
}

fn handle_key(
    core: &mut PlayerCore,
    state: &mut AppState,
    key: KeyEvent,
    intents: &Sender<MediaIntent>,
) {
    if state.command_mode {
        match key.code {
            KeyCode::Esc => {
                state.command_mode = false;
                state.command_buffer.clear();
                state.dirty = true;
            }
            KeyCode::Enter => {
                let command = std::mem::take(&mut state.command_buffer);
                state.command_mode = false;
                run_command(core, state, &command);
            }
            KeyCode::Backspace => {
                state.command_buffer.pop();
                state.dirty = true;
            }
            KeyCode::Char(ch) => {
                state.command_buffer.push(ch);
                state.dirty = true;
            }
            _ => {}
        }
        return;
    }

    if let Some(pending) = state.pending.take() {
        if key.code == KeyCode::Char('y') {
            match pending {
                PendingConfirm::DeletePlaylist { id, .. } => report(core.delete_playlist(&id)),
                PendingConfirm::RemoveTrack { index, .. } => report(core.remove_track(index)),
            }
        } else {
            state.set_status("Cancelled");
        }
        state.dirty = true;
        return;
    }

    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => state.quit = true,
        KeyCode::Tab => {
            state.focus = match state.focus {
                Focus::Playlists => Focus::Queue,
                Focus::Queue => Focus::Playlists,
            };
            state.dirty = true;
        }
        KeyCode::Down => move_cursor(core, state, 1),
        KeyCode::Up => move_cursor(core, state, -1),
        KeyCode::Enter => activate_cursor(core, state),
        KeyCode::Char(' ') => report(core.toggle_play_pause()),
        KeyCode::Char('n') => report(core.next()),
        KeyCode::Char('p') => report(core.previous()),
        KeyCode::Right => report(core.seek_by(core.seek_step_secs())),
        KeyCode::Left => report(core.seek_by(-core.seek_step_secs())),
        KeyCode::Char('s') => {
            core.toggle_shuffle();
        }
        KeyCode::Char('r') => {
            core.toggle_repeat_one();
        }
        KeyCode::Char('+') | KeyCode::Char('=') => {
            let next = core.settings().volume + VOLUME_STEP;
            core.set_volume(next);
        }
        KeyCode::Char('-') => {
            let next = core.settings().volume - VOLUME_STEP;
            core.set_volume(next);
        }
        KeyCode::Char('d') | KeyCode::Delete => request_delete(core, state),
        KeyCode::Char(':') => {
            state.command_mode = true;
            state.dirty = true;
        }
        KeyCode::Media(media_key) => {
            if let Some(intent) = media_key_intent(media_key, core.seek_step_secs()) {
                // Same path an OS media-control callback would take.
                if intents.send(intent).is_err() {
                    tracing::warn!("media intent channel closed");
                }
            }
        }
        _ => {}
    }
}

fn media_key_intent(key: MediaKeyCode, seek_step: f64) -> Option<MediaIntent> {
    match key {
        MediaKeyCode::Play => Some(MediaIntent::Play),
        MediaKeyCode::Pause => Some(MediaIntent::Pause),
        MediaKeyCode::PlayPause => Some(MediaIntent::Toggle),
        MediaKeyCode::TrackNext => Some(MediaIntent::Next),
        MediaKeyCode::TrackPrevious => Some(MediaIntent::Previous),
        MediaKeyCode::FastForward => Some(MediaIntent::SeekBy(seek_step)),
        MediaKeyCode::Rewind => Some(MediaIntent::SeekBy(-seek_step)),
        _ => None,
    }
}

fn move_cursor(core: &PlayerCore, state: &mut AppState, delta: isize) {
    let (cursor, len) = match state.focus {
        Focus::Playlists => (&mut state.playlist_cursor, core.catalog().len()),
        Focus::Queue => (&mut state.queue_cursor, core.queue().len()),
    };
    if len == 0 {
        *cursor = 0;
    } else {
        *cursor = cursor.saturating_add_signed(delta).min(len - 1);
    }
    state.dirty = true;
}

fn activate_cursor(core: &mut PlayerCore, state: &mut AppState) {
    match state.focus {
        Focus::Playlists => {
            let id = core
                .catalog()
                .playlists()
                .get(state.playlist_cursor)
                .map(|playlist| playlist.id.clone());
            if let Some(id) = id {
                core.switch_playlist(&id);
                state.queue_cursor = 0;
            }
        }
        Focus::Queue => report(core.select_index(state.queue_cursor)),
    }
}

fn request_delete(core: &PlayerCore, state: &mut AppState) {
    state.pending = match state.focus {
        Focus::Playlists => core
            .catalog()
            .playlists()
            .get(state.playlist_cursor)
            .map(|playlist| PendingConfirm::DeletePlaylist {
                id: playlist.id.clone(),
                name: playlist.name.clone(),
            }),
        Focus::Queue => core
            .queue()
            .tracks()
            .get(state.queue_cursor)
            .map(|track| PendingConfirm::RemoveTrack {
                index: state.queue_cursor,
                name: track.name.clone(),
            }),
    };
    state.dirty = true;
}

fn run_command(core: &mut PlayerCore, state: &mut AppState, raw: &str) {
    let input = raw.trim();
    if input.is_empty() {
        state.set_status("No command");
        return;
    }

    let mut command_split = input.splitn(2, char::is_whitespace);
    let command = command_split.next().unwrap_or_default();
    let rest = command_split.next().unwrap_or("").trim();

    match command {
        "help" => state.set_status(
            "Commands: add <path> | load <path> | playlist <new|rename|switch|delete> [name] | art <image> | volume <0-100> | seek <0-100>% | save",
        ),
        "add" | "load" => {
            if rest.is_empty() {
                state.set_status(format!("Usage: {command} <path>"));
                return;
            }
            let selection = library::selection_from_paths(&[PathBuf::from(rest)]);
            if command == "add" {
                report(core.add_files(selection));
            } else {
                report(core.handle_files(selection));
            }
        }
        "playlist" => run_playlist_command(core, state, rest),
        "art" => {
            if rest.is_empty() {
                state.set_status("Usage: art <image path>");
                return;
            }
            match fs::read(rest).with_context(|| format!("failed to read {rest}")) {
                Ok(bytes) => report(core.set_album_art(&bytes)),
                Err(err) => state.set_error(format!("{err:#}")),
            }
        }
        "volume" => match rest.parse::<u8>() {
            Ok(percent) => {
                core.set_volume(f32::from(percent) / 100.0);
            }
            Err(_) => state.set_status("Usage: volume <0-100>"),
        },
        "seek" => match rest.trim_end_matches('%').parse::<f64>() {
            Ok(percent) if (0.0..=100.0).contains(&percent) => {
                report(core.seek_to_fraction(percent / 100.0));
            }
            _ => state.set_status("Usage: seek <0-100>%"),
        },
        "save" => {
            core.persist();
            state.set_status("Saved");
        }
        _ => state.set_error("Unknown command. Use :help"),
    }
}

fn run_playlist_command(core: &mut PlayerCore, state: &mut AppState, rest: &str) {
    let mut playlist_split = rest.splitn(2, char::is_whitespace);
    let action = playlist_split.next().unwrap_or_default();
    let name = playlist_split.next().unwrap_or("").trim();

    match action {
        "new" => {
            if let Ok(id) = core.create_playlist(name) {
                core.switch_playlist(&id);
            }
        }
        "rename" => {
            let id = core.catalog().current_id().to_string();
            report(core.rename_playlist(&id, name));
        }
        "switch" => match find_playlist(core, name) {
            Some(id) => core.switch_playlist(&id),
            None => state.set_error(format!("No playlist named \"{name}\"")),
        },
        "delete" => {
            let target = if name.is_empty() {
                Some(core.catalog().current_id().to_string())
            } else {
                find_playlist(core, name)
            };
            match target.and_then(|id| core.catalog().get(&id).cloned()) {
                Some(playlist) => {
                    state.pending = Some(PendingConfirm::DeletePlaylist {
                        id: playlist.id,
                        name: playlist.name,
                    });
                    state.dirty = true;
                }
                None => state.set_error(format!("No playlist named \"{name}\"")),
            }
        }
        _ => state.set_status("Usage: playlist <new|rename|switch|delete> [name]"),
    }
}

/// Matches a playlist by name, ignoring case, or by its 1-based list position.
fn find_playlist(core: &PlayerCore, needle: &str) -> Option<String> {
    let playlists = core.catalog().playlists();
    if let Some(playlist) = playlists
        .iter()
        .find(|playlist| playlist.name.eq_ignore_ascii_case(needle))
    {
        return Some(playlist.id.clone());
    }
    needle
        .parse::<usize>()
        .ok()
        .and_then(|position| position.checked_sub(1))
        .and_then(|index| playlists.get(index))
        .map(|playlist| playlist.id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::tests::write_test_wav;
    use crate::model::Settings;
    use std::path::Path;
    use tempfile::{TempDir, tempdir};

    struct Fixture {
        dir: TempDir,
        core: PlayerCore,
        state: AppState,
        events: Receiver<PlayerEvent>,
        intent_sender: Sender<MediaIntent>,
        intents: Receiver<MediaIntent>,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempdir().expect("tempdir");
            let store = JsonFileStore::new(dir.path().join("playlists.json"));
            let mut core = PlayerCore::bootstrap(
                Box::new(store),
                Box::new(NullAudioEngine::new()),
                Box::new(LogMediaControls::default()),
                Settings::default(),
            );
            let events = core.subscribe();
            let (intent_sender, intents) = media::media_intent_channel();
            Self {
                dir,
                core,
                state: AppState::new(),
                events,
                intent_sender,
                intents,
            }
        }

        fn music_folder(&self, names: &[&str]) -> PathBuf {
            let folder = self.dir.path().join("Music Folder");
            fs::create_dir_all(&folder).expect("folder");
            for name in names {
                write_test_wav(&folder.join(name), 5_000);
            }
            folder
        }

        fn command(&mut self, raw: &str) {
            run_command(&mut self.core, &mut self.state, raw);
            self.pump();
        }

        fn key(&mut self, code: KeyCode) {
            handle_key(
                &mut self.core,
                &mut self.state,
                KeyEvent::new(code, KeyModifiers::NONE),
                &self.intent_sender,
            );
            self.pump();
        }

        fn pump(&mut self) {
            pump(&mut self.core, &mut self.state, &self.events, &self.intents);
        }
    }

    fn playlist_names(core: &PlayerCore) -> Vec<String> {
        core.list_playlists().into_iter().map(|row| row.name).collect()
    }

    #[test]
    fn unknown_command_is_reported() {
        let mut fixture = Fixture::new();
        fixture.command("wat");
        assert!(fixture.state.status.contains("Unknown command"));
        assert!(fixture.state.status_is_error);
    }

    #[test]
    fn add_command_accepts_paths_with_spaces() {
        let mut fixture = Fixture::new();
        let folder = fixture.music_folder(&["b.wav", "a.wav"]);

        fixture.command(&format!("add {}", folder.display()));

        let names: Vec<&str> = fixture
            .core
            .queue()
            .tracks()
            .iter()
            .map(|track| track.name.as_str())
            .collect();
        assert_eq!(names, vec!["a.wav", "b.wav"]);
        assert_eq!(fixture.state.status, "Added 2 tracks");
    }

    #[test]
    fn add_command_with_nothing_playable_surfaces_an_error() {
        let mut fixture = Fixture::new();
        let notes = fixture.dir.path().join("notes.txt");
        fs::write(&notes, b"not music").expect("write");

        fixture.command(&format!("add {}", notes.display()));

        assert!(fixture.core.queue().is_empty());
        assert!(fixture.state.status_is_error);
        assert!(fixture.state.status.contains("no valid audio"));
    }

    #[test]
    fn playlist_new_creates_and_switches() {
        let mut fixture = Fixture::new();
        fixture.command("playlist new Road Trip");

        assert_eq!(playlist_names(&fixture.core), vec!["My Playlist", "Road Trip"]);
        assert_eq!(
            fixture.core.current_playlist().map(|p| p.name.as_str()),
            Some("Road Trip")
        );
    }

    #[test]
    fn blank_playlist_name_is_rejected() {
        let mut fixture = Fixture::new();
        fixture.command("playlist new");

        assert_eq!(fixture.core.catalog().len(), 1);
        assert!(fixture.state.status_is_error);
    }

    #[test]
    fn playlist_switch_by_position_or_name() {
        let mut fixture = Fixture::new();
        fixture.command("playlist new Road Trip");
        fixture.command("playlist switch 1");
        assert_eq!(
            fixture.core.current_playlist().map(|p| p.name.as_str()),
            Some("My Playlist")
        );

        fixture.command("playlist switch road trip");
        assert_eq!(
            fixture.core.current_playlist().map(|p| p.name.as_str()),
            Some("Road Trip")
        );

        fixture.command("playlist switch Nowhere");
        assert!(fixture.state.status_is_error);
    }

    #[test]
    fn deleting_a_playlist_requires_confirmation() {
        let mut fixture = Fixture::new();
        fixture.command("playlist new Road Trip");
        fixture.key(KeyCode::Tab);
        assert_eq!(fixture.state.focus, Focus::Playlists);

        fixture.key(KeyCode::Down);
        fixture.key(KeyCode::Char('d'));
        assert_eq!(
            fixture.state.confirm_prompt().as_deref(),
            Some("Delete playlist \"Road Trip\"?")
        );
        fixture.key(KeyCode::Char('x'));
        assert_eq!(fixture.state.status, "Cancelled");
        assert_eq!(fixture.core.catalog().len(), 2);

        fixture.key(KeyCode::Char('d'));
        fixture.key(KeyCode::Char('y'));
        assert_eq!(playlist_names(&fixture.core), vec!["My Playlist"]);
        assert_eq!(fixture.state.playlist_cursor, 0);
    }

    #[test]
    fn deleting_the_last_playlist_is_refused() {
        let mut fixture = Fixture::new();
        fixture.command("playlist delete");
        fixture.key(KeyCode::Char('y'));

        assert_eq!(fixture.core.catalog().len(), 1);
        assert!(fixture.state.status.contains("at least one playlist"));
    }

    #[test]
    fn enter_plays_the_track_under_the_cursor() {
        let mut fixture = Fixture::new();
        let folder = fixture.music_folder(&["a.wav", "b.wav", "c.wav"]);
        fixture.command(&format!("add {}", folder.display()));

        fixture.key(KeyCode::Down);
        fixture.key(KeyCode::Down);
        fixture.key(KeyCode::Enter);

        assert_eq!(fixture.core.queue().current_index(), Some(2));
        assert!(fixture.core.transport().is_playing());
        assert_eq!(
            fixture.core.transport().bound_track(),
            Some("c.wav")
        );
    }

    #[test]
    fn media_keys_travel_through_the_intent_channel() {
        let mut fixture = Fixture::new();
        let folder = fixture.music_folder(&["a.wav", "b.wav"]);
        fixture.command(&format!("add {}", folder.display()));
        fixture.key(KeyCode::Char(' '));
        assert_eq!(fixture.core.queue().current_index(), Some(0));

        fixture.key(KeyCode::Media(MediaKeyCode::TrackNext));
        assert_eq!(fixture.core.queue().current_index(), Some(1));
        assert_eq!(fixture.state.queue_cursor, 1);

        fixture.key(KeyCode::Media(MediaKeyCode::Pause));
        assert!(!fixture.core.transport().is_playing());
        fixture.key(KeyCode::Media(MediaKeyCode::Pause));
        assert!(!fixture.core.transport().is_playing());
    }

    #[test]
    fn volume_command_and_keys_update_settings() {
        let mut fixture = Fixture::new();
        fixture.command("volume 40");
        assert!((fixture.core.settings().volume - 0.4).abs() < f32::EPSILON);
        assert_eq!(fixture.state.status, "Volume: 40%");

        fixture.key(KeyCode::Char('+'));
        assert!((fixture.core.settings().volume - 0.45).abs() < 1e-6);

        fixture.command("volume loud");
        assert_eq!(fixture.state.status, "Usage: volume <0-100>");
    }

    #[test]
    fn art_command_rejects_non_images() {
        let mut fixture = Fixture::new();
        let path = fixture.dir.path().join("cover.txt");
        fs::write(&path, b"plain text").expect("write");

        fixture.command(&format!("art {}", path.display()));
        assert!(fixture.state.status_is_error);
        assert_eq!(
            fixture.core.current_playlist().and_then(|p| p.album_art.clone()),
            None
        );

        fixture.command(&format!("art {}", Path::new("/definitely/missing.png").display()));
        assert!(fixture.state.status.contains("failed to read"));
    }

    #[test]
    fn command_mode_collects_and_runs_input() {
        let mut fixture = Fixture::new();
        fixture.key(KeyCode::Char(':'));
        assert!(fixture.state.command_mode);
        for ch in "savx".chars() {
            fixture.key(KeyCode::Char(ch));
        }
        fixture.key(KeyCode::Backspace);
        fixture.key(KeyCode::Char('e'));
        fixture.key(KeyCode::Enter);

        assert!(!fixture.state.command_mode);
        assert_eq!(fixture.state.status, "Saved");
        assert!(fixture.dir.path().join("playlists.json").exists());
    }
}
