use crate::error::UserError;
use crate::model::{DEFAULT_PLAYLIST_NAME, Playlist};
use crate::store::LoadedCatalog;
use rand::RngExt;
use std::time::{SystemTime, UNIX_EPOCH};

const ID_SUFFIX_LEN: usize = 9;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistRow {
    pub id: String,
    pub name: String,
    pub is_current: bool,
    pub track_count: usize,
}

#[derive(Debug, Clone)]
pub struct Catalog {
    playlists: Vec<Playlist>,
    current_id: String,
}

impl Catalog {
    pub fn from_loaded(loaded: LoadedCatalog) -> Self {
        let LoadedCatalog {
            mut playlists,
            current_id,
        } = loaded;

        if playlists.is_empty() {
            playlists.push(Playlist::new(generate_id(), DEFAULT_PLAYLIST_NAME));
        }

        let current_id = current_id
            .filter(|id| playlists.iter().any(|playlist| &playlist.id == id))
            .unwrap_or_else(|| playlists[0].id.clone());

        Self {
            playlists,
            current_id,
        }
    }

    pub fn len(&self) -> usize {
        self.playlists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.playlists.is_empty()
    }

    pub fn playlists(&self) -> &[Playlist] {
        &self.playlists
    }

    pub fn current_id(&self) -> &str {
        &self.current_id
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    pub fn get(&self, id: &str) -> Option<&Playlist> {
        self.playlists.iter().find(|playlist| playlist.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Playlist> {
        self.playlists.iter_mut().find(|playlist| playlist.id == id)
    }

    pub fn current(&self) -> Option<&Playlist> {
        self.get(&self.current_id)
    }

    pub fn current_mut(&mut self) -> Option<&mut Playlist> {
        let id = self.current_id.clone();
        self.get_mut(&id)
    }

    pub fn rows(&self) -> Vec<PlaylistRow> {
        self.playlists
            .iter()
            .map(|playlist| PlaylistRow {
                id: playlist.id.clone(),
                name: playlist.name.clone(),
                is_current: playlist.id == self.current_id,
                track_count: playlist.tracks.len(),
            })
            .collect()
    }

    pub fn create(&mut self, name: &str) -> Result<String, UserError> {
        let name = validated_name(name)?;
        let id = generate_id();
        self.playlists.push(Playlist::new(id.clone(), name));
        tracing::debug!(%id, "playlist created");
        Ok(id)
    }

    pub fn rename(&mut self, id: &str, name: &str) -> Result<bool, UserError> {
        let name = validated_name(name)?;
        let Some(playlist) = self.get_mut(id) else {
            return Ok(false);
        };
        playlist.name = name;
        Ok(true)
    }

    pub fn set_current(&mut self, id: &str) -> bool {
        if id == self.current_id || !self.contains(id) {
            return false;
        }
        self.current_id = id.to_string();
        true
    }

    pub fn first_other_id(&self, id: &str) -> Option<String> {
        self.playlists
            .iter()
            .find(|playlist| playlist.id != id)
            .map(|playlist| playlist.id.clone())
    }

    /// Refuses to drop the last playlist. Unknown ids remove nothing.
    ///
    /// Callers switch away from the current playlist first so its queue is
    /// flushed; if they did not, the pointer moves to the first remaining one.
    pub fn remove(&mut self, id: &str) -> Result<Option<Playlist>, UserError> {
        if self.playlists.len() <= 1 {
            return Err(UserError::LastPlaylist);
        }
        let Some(pos) = self.position(id) else {
            return Ok(None);
        };

        let removed = self.playlists.remove(pos);
        if removed.id == self.current_id {
            self.current_id = self.playlists[0].id.clone();
        }
        Ok(Some(removed))
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.playlists.iter().position(|playlist| playlist.id == id)
    }
}

fn validated_name(name: &str) -> Result<String, UserError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(UserError::EmptyName);
    }
    Ok(trimmed.to_string())
}

/// `playlist_<unix millis>_<9 base36 chars>`
pub fn generate_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or(0);
    let mut rng = rand::rng();
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| char::from(BASE36[rng.random_range(0..BASE36.len())]))
        .collect();
    format!("playlist_{millis}_{suffix}")
}
