use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{TempDir, tempdir};
use tunelist::audio::NullAudioEngine;
use tunelist::core::PlayerCore;
use tunelist::error::{CoreError, TransportError, UserError};
use tunelist::events::PlayerEvent;
use tunelist::library;
use tunelist::media::LogMediaControls;
use tunelist::model::Settings;
use tunelist::store::JsonFileStore;

struct Session {
    dir: TempDir,
}

impl Session {
    fn new() -> Self {
        Self {
            dir: tempdir().expect("tempdir"),
        }
    }

    fn store_path(&self) -> PathBuf {
        self.dir.path().join("config").join("playlists.json")
    }

    fn boot(&self) -> PlayerCore {
        PlayerCore::bootstrap(
            Box::new(JsonFileStore::new(self.store_path())),
            Box::new(NullAudioEngine::new()),
            Box::new(LogMediaControls::default()),
            Settings::default(),
        )
    }

    fn song(&self, name: &str) -> PathBuf {
        let folder = self.dir.path().join("music");
        fs::create_dir_all(&folder).expect("music dir");
        let path = folder.join(name);
        fs::write(&path, name.as_bytes()).expect("song");
        path
    }
}

fn names(core: &PlayerCore) -> Vec<String> {
    core.queue()
        .tracks()
        .iter()
        .map(|track| track.name.clone())
        .collect()
}

fn handle_file_name(path: Option<&Path>) -> Option<String> {
    path.and_then(Path::file_name)
        .map(|name| name.to_string_lossy().to_string())
}

#[test]
fn fresh_start_creates_and_saves_the_default_playlist() {
    let session = Session::new();
    let core = session.boot();

    let rows = core.list_playlists();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name, "My Playlist");
    assert!(rows[0].is_current);
    assert!(session.store_path().exists());
}

#[test]
fn added_tracks_are_sorted_and_keep_their_handles() {
    let session = Session::new();
    let mut core = session.boot();
    let b = session.song("b.mp3");
    let a = session.song("a.mp3");

    let added = core
        .add_files(library::selection_from_paths(&[b, a]))
        .expect("add");

    assert_eq!(added, 2);
    assert_eq!(names(&core), vec!["a.mp3", "b.mp3"]);
    for track in core.queue().tracks() {
        assert_eq!(
            handle_file_name(track.handle_path()).as_deref(),
            Some(track.name.as_str())
        );
    }
}

#[test]
fn repeat_one_restarts_the_current_track() {
    let session = Session::new();
    let mut core = session.boot();
    let songs: Vec<PathBuf> = ["a.mp3", "b.mp3", "c.mp3"]
        .iter()
        .map(|name| session.song(name))
        .collect();
    core.add_files(library::selection_from_paths(&songs))
        .expect("add");

    core.select_index(2).expect("select");
    core.toggle_repeat_one();
    core.next().expect("next");

    assert_eq!(core.queue().current_index(), Some(2));
    assert_eq!(core.transport().bound_track(), Some("c.mp3"));
    assert!(core.transport().position().expect("position").as_secs() < 1);
}

#[test]
fn shuffle_walks_the_installed_order_and_wraps() {
    let session = Session::new();
    let mut core = session.boot();
    let songs: Vec<PathBuf> = ["a.mp3", "b.mp3", "c.mp3"]
        .iter()
        .map(|name| session.song(name))
        .collect();
    core.add_files(library::selection_from_paths(&songs))
        .expect("add");

    assert!(core.toggle_shuffle());
    assert!(core.set_shuffle_order(vec![2, 0, 1]));
    core.select_index(0).expect("select");

    let mut visited = Vec::new();
    for _ in 0..3 {
        core.next().expect("next");
        visited.push(core.queue().current_index());
    }
    assert_eq!(visited, vec![Some(1), Some(2), Some(0)]);

    assert!(!core.toggle_shuffle());
    assert_eq!(names(&core), vec!["a.mp3", "b.mp3", "c.mp3"]);
    assert_eq!(core.queue().current_index(), Some(0));
}

#[test]
fn restart_restores_playlists_tracks_and_current_selection() {
    let session = Session::new();
    let mut core = session.boot();
    let first = session.song("Artist - One.mp3");
    let second = session.song("two.flac");
    core.add_files(library::selection_from_paths(&[first]))
        .expect("add");

    let road_trip = core.create_playlist("Road Trip").expect("create");
    core.switch_playlist(&road_trip);
    core.add_files(library::selection_from_paths(&[second]))
        .expect("add");
    core.shutdown();

    let restarted = session.boot();
    let rows = restarted.list_playlists();
    let row_names: Vec<&str> = rows.iter().map(|row| row.name.as_str()).collect();
    assert_eq!(row_names, vec!["My Playlist", "Road Trip"]);
    assert_eq!(restarted.catalog().current_id(), road_trip);
    assert_eq!(names(&restarted), vec!["two.flac"]);
    assert!(restarted.queue().tracks().iter().all(|track| !track.is_stub()));

    let my_playlist = restarted
        .catalog()
        .playlists()
        .iter()
        .find(|playlist| playlist.name == "My Playlist")
        .expect("default playlist");
    assert_eq!(my_playlist.tracks.len(), 1);
    assert_eq!(my_playlist.tracks[0].name, "Artist - One.mp3");
}

#[test]
fn moved_files_come_back_as_stubs_until_reselected() {
    let session = Session::new();
    let mut core = session.boot();
    let kept = session.song("kept.mp3");
    let moved = session.song("moved.mp3");
    core.add_files(library::selection_from_paths(&[kept, moved.clone()]))
        .expect("add");
    core.shutdown();

    let parked = session.dir.path().join("parked.mp3");
    fs::rename(&moved, &parked).expect("move away");

    let mut restarted = session.boot();
    let events = restarted.subscribe();
    assert_eq!(names(&restarted), vec!["kept.mp3", "moved.mp3"]);
    assert!(restarted.queue().tracks()[1].is_stub());

    let err = restarted.select_index(1).expect_err("stub cannot play");
    assert!(matches!(
        err,
        CoreError::Transport(TransportError::Unplayable { .. })
    ));
    assert!(!restarted.transport().is_loaded());
    assert!(
        events
            .try_iter()
            .any(|event| matches!(event, PlayerEvent::Error(message) if message.contains("moved.mp3")))
    );

    fs::rename(&parked, &moved).expect("move back");
    restarted
        .add_files(library::selection_from_paths(&[moved]))
        .expect("re-add");
    assert_eq!(
        names(&restarted),
        vec!["kept.mp3", "moved.mp3", "moved.mp3"]
    );
    assert!(restarted.queue().tracks().iter().all(|track| !track.is_stub()));
    restarted.select_index(1).expect("playable again");
    assert!(restarted.transport().is_playing());
}

#[test]
fn removing_the_only_track_stops_playback() {
    let session = Session::new();
    let mut core = session.boot();
    let only = session.song("only.mp3");
    core.add_files(library::selection_from_paths(&[only]))
        .expect("add");
    core.select_index(0).expect("play");

    core.remove_track(0).expect("remove");

    assert!(core.queue().is_empty());
    assert_eq!(core.queue().current_index(), None);
    assert!(!core.transport().is_loaded());
}

#[test]
fn the_last_playlist_cannot_be_deleted() {
    let session = Session::new();
    let mut core = session.boot();
    let id = core.catalog().current_id().to_string();

    let err = core.delete_playlist(&id).expect_err("must refuse");
    assert!(matches!(err, CoreError::User(UserError::LastPlaylist)));
    assert_eq!(core.catalog().len(), 1);
}

#[test]
fn loading_non_audio_files_leaves_the_queue_alone() {
    let session = Session::new();
    let mut core = session.boot();
    let song = session.song("keep.mp3");
    core.add_files(library::selection_from_paths(&[song]))
        .expect("add");

    let notes = session.dir.path().join("notes.txt");
    fs::write(&notes, b"todo").expect("notes");
    let err = core
        .handle_files(library::selection_from_paths(&[notes]))
        .expect_err("nothing playable");

    assert!(matches!(err, CoreError::User(UserError::NoValidAudio)));
    assert_eq!(names(&core), vec!["keep.mp3"]);
    assert_eq!(core.handle_files(Vec::new()).expect("cancelled pick"), 0);
}
