use crate::model::{FileHandle, TrackRef};
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    OutOfRange,
    Other,
    /// The current track was removed and this index now holds its replacement.
    CurrentReplaced(usize),
    Emptied,
}

#[derive(Debug, Clone)]
pub struct PlayQueue {
    tracks: Vec<TrackRef>,
    current_index: Option<usize>,
    shuffle_enabled: bool,
    shuffle_order: Vec<usize>,
    repeat_one: bool,
    rng: SmallRng,
}

impl Default for PlayQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl PlayQueue {
    pub fn new() -> Self {
        Self::with_rng(rand::make_rng())
    }

    pub fn with_rng(rng: SmallRng) -> Self {
        Self {
            tracks: Vec::new(),
            current_index: None,
            shuffle_enabled: false,
            shuffle_order: Vec::new(),
            repeat_one: false,
            rng,
        }
    }

    pub fn tracks(&self) -> &[TrackRef] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    pub fn current_track(&self) -> Option<&TrackRef> {
        self.current_index.and_then(|idx| self.tracks.get(idx))
    }

    pub fn is_shuffled(&self) -> bool {
        self.shuffle_enabled
    }

    pub fn shuffle_order(&self) -> &[usize] {
        &self.shuffle_order
    }

    pub fn repeat_one(&self) -> bool {
        self.repeat_one
    }

    /// Replaces the working copy with another playlist's tracks.
    ///
    /// The selection and permutation are dropped; the shuffle flag survives,
    /// so traversal stays sequential until shuffle is toggled again.
    pub fn load(&mut self, tracks: Vec<TrackRef>) {
        self.tracks = tracks;
        self.current_index = None;
        self.shuffle_order.clear();
    }

    pub fn replace_tracks(&mut self, mut tracks: Vec<TrackRef>) {
        sort_by_name(&mut tracks);
        self.load(tracks);
    }

    pub fn select(&mut self, index: usize) -> Option<&TrackRef> {
        if index >= self.tracks.len() {
            return None;
        }
        self.current_index = Some(index);
        self.tracks.get(index)
    }

    pub fn next_index(&self) -> Option<usize> {
        let len = self.tracks.len();
        if len == 0 {
            return None;
        }
        if self.repeat_one && self.current_index.is_some() {
            return self.current_index;
        }

        if self.uses_shuffle_order() {
            let next_slot = match self.current_slot() {
                Some(slot) if slot + 1 < self.shuffle_order.len() => slot + 1,
                _ => 0,
            };
            return self.shuffle_order.get(next_slot).copied();
        }

        Some(match self.current_index {
            Some(current) if current + 1 < len => current + 1,
            _ => 0,
        })
    }

    /// Predecessor of the current track. Repeat-one does not pin this direction.
    pub fn previous_index(&self) -> Option<usize> {
        let len = self.tracks.len();
        if len == 0 {
            return None;
        }

        if self.uses_shuffle_order() {
            let last = self.shuffle_order.len() - 1;
            let prev_slot = match self.current_slot() {
                Some(slot) if slot > 0 => slot - 1,
                _ => last,
            };
            return self.shuffle_order.get(prev_slot).copied();
        }

        Some(match self.current_index {
            Some(current) if current > 0 && current < len => current - 1,
            _ => len - 1,
        })
    }

    pub fn advance_next(&mut self) -> Option<usize> {
        let next = self.next_index()?;
        self.current_index = Some(next);
        Some(next)
    }

    pub fn advance_previous(&mut self) -> Option<usize> {
        let previous = self.previous_index()?;
        self.current_index = Some(previous);
        Some(previous)
    }

    pub fn toggle_shuffle(&mut self) -> bool {
        self.shuffle_enabled = !self.shuffle_enabled;
        if self.shuffle_enabled {
            self.rebuild_shuffle_order();
        } else {
            self.shuffle_order.clear();
        }
        self.shuffle_enabled
    }

    pub fn toggle_repeat_one(&mut self) -> bool {
        self.repeat_one = !self.repeat_one;
        self.repeat_one
    }

    /// Rejected unless shuffle is on and `order` covers every index exactly once.
    pub fn set_shuffle_order(&mut self, order: Vec<usize>) -> bool {
        if !self.shuffle_enabled || !is_permutation(&order, self.tracks.len()) {
            return false;
        }
        self.shuffle_order = order;
        true
    }

    pub fn remove_at(&mut self, index: usize) -> Removal {
        if index >= self.tracks.len() {
            return Removal::OutOfRange;
        }
        self.tracks.remove(index);

        self.shuffle_order.retain(|slot| *slot != index);
        for slot in &mut self.shuffle_order {
            if *slot > index {
                *slot -= 1;
            }
        }

        match self.current_index {
            Some(current) if current == index => {
                if self.tracks.is_empty() {
                    self.current_index = None;
                    Removal::Emptied
                } else {
                    let replacement = index.min(self.tracks.len() - 1);
                    self.current_index = Some(replacement);
                    Removal::CurrentReplaced(replacement)
                }
            }
            Some(current) if index < current => {
                self.current_index = Some(current - 1);
                Removal::Other
            }
            _ => Removal::Other,
        }
    }

    /// Appends `incoming`, re-sorts by name and re-attaches handles by name.
    ///
    /// Two entries sharing a file name end up with the same handle: the one
    /// registered last wins.
    pub fn add_tracks(&mut self, incoming: Vec<TrackRef>) {
        let current_name = self.current_track().map(|track| track.name.clone());

        self.tracks.extend(incoming);
        let mut handles: HashMap<String, FileHandle> = HashMap::new();
        for track in &self.tracks {
            if let Some(handle) = &track.handle {
                handles.insert(track.name.clone(), handle.clone());
            }
        }

        sort_by_name(&mut self.tracks);
        for track in &mut self.tracks {
            track.handle = handles.get(&track.name).cloned();
        }

        self.current_index = current_name
            .and_then(|name| self.tracks.iter().position(|track| track.name == name));
        if self.shuffle_enabled {
            self.rebuild_shuffle_order();
        }
    }

    fn uses_shuffle_order(&self) -> bool {
        self.shuffle_enabled && !self.shuffle_order.is_empty()
    }

    fn current_slot(&self) -> Option<usize> {
        let current = self.current_index?;
        self.shuffle_order.iter().position(|idx| *idx == current)
    }

    fn rebuild_shuffle_order(&mut self) {
        self.shuffle_order = (0..self.tracks.len()).collect();
        self.shuffle_order.shuffle(&mut self.rng);
    }
}

pub fn sort_by_name(tracks: &mut [TrackRef]) {
    tracks.sort_by_cached_key(|track| track.name.to_lowercase());
}

fn is_permutation(order: &[usize], len: usize) -> bool {
    if order.len() != len {
        return false;
    }
    let mut seen = vec![false; len];
    for idx in order {
        match seen.get_mut(*idx) {
            Some(slot) if !*slot => *slot = true,
            _ => return false,
        }
    }
    true
}
