use crossbeam::channel::{self, Receiver, Sender};

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    PlaylistListChanged,
    QueueChanged,
    TrackChanged {
        index: usize,
        title: String,
        artist: String,
    },
    ProgressTick {
        position_secs: f64,
        duration_secs: Option<f64>,
    },
    PlaybackStateChanged {
        playing: bool,
    },
    VolumeChanged {
        volume: f32,
    },
    ModeChanged {
        shuffle: bool,
        repeat_one: bool,
    },
    Status(String),
    Error(String),
}

#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Vec<Sender<PlayerEvent>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> Receiver<PlayerEvent> {
        let (sender, receiver) = channel::unbounded();
        self.subscribers.push(sender);
        receiver
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Subscribers whose receiver was dropped are pruned here.
    pub fn emit(&mut self, event: PlayerEvent) {
        tracing::trace!(?event, "emit");
        self.subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }
}
