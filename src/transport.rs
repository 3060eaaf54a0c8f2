use crate::audio::AudioEngine;
use crate::error::TransportError;
use crate::model::{TrackRef, TrackSource};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransportEvent {
    Progress {
        position: Duration,
        duration: Option<Duration>,
    },
    /// The bound track played to its end. Reported once, then the binding is released.
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransportState {
    pub playing: bool,
    pub volume: f32,
    pub position_secs: f64,
    pub duration_secs: Option<f64>,
}

pub struct Transport {
    engine: Box<dyn AudioEngine>,
    playing: bool,
    bound: Option<String>,
}

impl Transport {
    pub fn new(engine: Box<dyn AudioEngine>) -> Self {
        Self {
            engine,
            playing: false,
            bound: None,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_loaded(&self) -> bool {
        self.bound.is_some()
    }

    pub fn bound_track(&self) -> Option<&str> {
        self.bound.as_deref()
    }

    pub fn volume(&self) -> f32 {
        self.engine.volume()
    }

    pub fn position(&self) -> Option<Duration> {
        self.bound.as_ref()?;
        self.engine.position()
    }

    pub fn duration(&self) -> Option<Duration> {
        self.bound.as_ref()?;
        self.engine.duration()
    }

    pub fn output_name(&self) -> Option<String> {
        self.engine.output_name()
    }

    pub fn state(&self) -> TransportState {
        TransportState {
            playing: self.playing,
            volume: self.volume(),
            position_secs: self.position().unwrap_or_default().as_secs_f64(),
            duration_secs: self.duration().map(|total| total.as_secs_f64()),
        }
    }

    /// Binds `track` and starts it.
    ///
    /// A stub or revoked handle fails before the current binding is touched.
    /// A rejected play attempt leaves the transport unbound and not playing.
    pub fn load(&mut self, track: &TrackRef) -> Result<(), TransportError> {
        let file = match track.source() {
            Ok(TrackSource::Resolved(file)) => file,
            Ok(TrackSource::Stub) => {
                return Err(TransportError::Unplayable {
                    name: track.name.clone(),
                });
            }
            Err(err) => {
                tracing::warn!("{err}");
                return Err(TransportError::Unplayable {
                    name: track.name.clone(),
                });
            }
        };

        self.release();
        match self.engine.play(&file.path) {
            Ok(()) => {
                self.bound = Some(track.name.clone());
                self.playing = true;
                tracing::debug!(track = %track.name, "track bound");
                Ok(())
            }
            Err(err) => {
                tracing::error!(track = %track.name, "playback rejected: {err:#}");
                Err(TransportError::Playback(format!("{err:#}")))
            }
        }
    }

    pub fn toggle_pause(&mut self) -> Result<bool, TransportError> {
        if self.bound.is_none() {
            return Ok(false);
        }

        if self.playing {
            self.engine.pause();
            self.playing = false;
            return Ok(false);
        }

        match self.engine.resume() {
            Ok(()) => {
                self.playing = true;
                Ok(true)
            }
            Err(err) => {
                tracing::error!("resume rejected: {err:#}");
                self.playing = false;
                Err(TransportError::Playback(format!("{err:#}")))
            }
        }
    }

    /// No-op while nothing is bound or the duration is unknown.
    pub fn seek_to_fraction(&mut self, fraction: f64) -> Result<(), TransportError> {
        let Some(total) = self.duration() else {
            return Ok(());
        };
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.seek(total.mul_f64(fraction))
    }

    pub fn seek_by(&mut self, offset_secs: f64) -> Result<(), TransportError> {
        let Some(position) = self.position() else {
            return Ok(());
        };
        let mut target = (position.as_secs_f64() + offset_secs).max(0.0);
        if let Some(total) = self.duration() {
            target = target.min(total.as_secs_f64());
        }
        if !target.is_finite() {
            return Ok(());
        }
        self.seek(Duration::from_secs_f64(target))
    }

    fn seek(&mut self, target: Duration) -> Result<(), TransportError> {
        self.engine.seek_to(target).map_err(|err| {
            tracing::warn!("seek rejected: {err:#}");
            TransportError::Playback(format!("{err:#}"))
        })
    }

    pub fn set_volume(&mut self, fraction: f32) -> f32 {
        let fraction = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        self.engine.set_volume(fraction);
        self.engine.volume()
    }

    pub fn stop(&mut self) {
        self.release();
    }

    pub fn poll(&mut self) -> Option<TransportEvent> {
        self.bound.as_ref()?;

        if self.engine.is_finished() {
            self.release();
            return Some(TransportEvent::Ended);
        }

        Some(TransportEvent::Progress {
            position: self.engine.position().unwrap_or_default(),
            duration: self.engine.duration(),
        })
    }

    fn release(&mut self) {
        if let Some(previous) = self.bound.take() {
            tracing::debug!(track = %previous, "track released");
        }
        self.engine.stop();
        self.playing = false;
    }
}
