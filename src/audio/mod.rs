use anyhow::{Context, Result};
use rodio::Source;
use rodio::cpal::traits::{DeviceTrait, HostTrait};
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink};
#[cfg(unix)]
use std::ffi::CString;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// One decodable stream at a time. Volume is a fraction in `[0, 1]`.
pub trait AudioEngine {
    fn play(&mut self, path: &Path) -> Result<()>;
    fn pause(&mut self);
    fn resume(&mut self) -> Result<()>;
    fn stop(&mut self);
    fn position(&self) -> Option<Duration>;
    fn duration(&self) -> Option<Duration>;
    fn seek_to(&mut self, position: Duration) -> Result<()>;
    fn volume(&self) -> f32;
    fn set_volume(&mut self, volume: f32);
    fn output_name(&self) -> Option<String>;
    fn is_finished(&self) -> bool;
}

pub struct RodioAudioEngine {
    stream: OutputStream,
    sink: Sink,
    output_name: String,
    current: Option<PathBuf>,
    track_duration: Option<Duration>,
    volume: f32,
}

impl RodioAudioEngine {
    pub fn new() -> Result<Self> {
        let (mut stream, output_name) = with_silenced_stderr(open_output_stream)?;
        stream.log_on_drop(false);
        let sink = Sink::connect_new(stream.mixer());

        Ok(Self {
            stream,
            sink,
            output_name,
            current: None,
            track_duration: None,
            volume: 1.0,
        })
    }
}

fn open_output_stream() -> Result<(OutputStream, String)> {
    let default_attempt = OutputStreamBuilder::from_default_device()
        .context("failed to open default system output device")
        .and_then(|builder| {
            builder
                .with_error_callback(|err| tracing::warn!("audio stream error: {err}"))
                .open_stream_or_fallback()
                .context("failed to start default output stream")
        });

    let default_err = match default_attempt {
        Ok(stream) => return Ok((stream, String::from("System default output"))),
        Err(err) => err,
    };
    tracing::warn!("{default_err:#}; trying other output devices");

    let host = rodio::cpal::default_host();
    let mut devices: Vec<(u8, String, rodio::cpal::Device)> = host
        .output_devices()
        .context("failed to enumerate output devices")?
        .filter_map(|device| {
            let name = device.name().ok()?;
            let lower = name.to_ascii_lowercase();
            let rank = if lower.contains("pulse") {
                0
            } else if lower.contains("pipewire") {
                1
            } else if lower.contains("default") {
                2
            } else {
                3
            };
            Some((rank, name, device))
        })
        .collect();
    devices.sort_by(|left, right| (left.0, &left.1).cmp(&(right.0, &right.1)));

    for (_, name, device) in devices {
        let opened = OutputStreamBuilder::from_device(device)
            .map_err(anyhow::Error::from)
            .and_then(|builder| {
                builder
                    .with_error_callback(|err| tracing::warn!("audio stream error: {err}"))
                    .open_stream_or_fallback()
                    .map_err(anyhow::Error::from)
            });
        match opened {
            Ok(stream) => return Ok((stream, name)),
            Err(err) => tracing::debug!(device = %name, "output device rejected: {err:#}"),
        }
    }

    Err(default_err).context("unable to start any audio output stream")
}

impl AudioEngine for RodioAudioEngine {
    fn play(&mut self, path: &Path) -> Result<()> {
        self.stop();

        let file =
            File::open(path).with_context(|| format!("failed to open track {}", path.display()))?;
        let source = Decoder::try_from(file)
            .with_context(|| format!("failed to decode {}", path.display()))?;

        self.sink = Sink::connect_new(self.stream.mixer());
        self.track_duration = source.total_duration().filter(|total| !total.is_zero());
        self.sink.append(source);
        self.sink.set_volume(self.volume);
        self.sink.play();
        self.current = Some(path.to_path_buf());
        Ok(())
    }

    fn pause(&mut self) {
        self.sink.pause();
    }

    fn resume(&mut self) -> Result<()> {
        if self.current.is_none() {
            anyhow::bail!("no track loaded");
        }
        self.sink.play();
        Ok(())
    }

    fn stop(&mut self) {
        self.sink.stop();
        self.current = None;
        self.track_duration = None;
    }

    fn position(&self) -> Option<Duration> {
        self.current.as_ref()?;
        Some(self.sink.get_pos())
    }

    fn duration(&self) -> Option<Duration> {
        self.track_duration
    }

    fn seek_to(&mut self, position: Duration) -> Result<()> {
        if self.current.is_none() {
            anyhow::bail!("no active track");
        }
        self.sink
            .try_seek(position)
            .map_err(|err| anyhow::anyhow!("failed to seek current track: {err:?}"))
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        self.sink.set_volume(self.volume);
    }

    fn output_name(&self) -> Option<String> {
        Some(format!(
            "{} ({} Hz)",
            self.output_name,
            self.stream.config().sample_rate()
        ))
    }

    fn is_finished(&self) -> bool {
        self.current.is_some() && !self.sink.is_paused() && self.sink.empty()
    }
}

/// ALSA and JACK write device-scan noise straight to fd 2, which would tear the TUI.
#[cfg(unix)]
fn with_silenced_stderr<T>(operation: impl FnOnce() -> T) -> T {
    let saved = unsafe { libc::dup(libc::STDERR_FILENO) };
    if saved < 0 {
        return operation();
    }

    let devnull = CString::new("/dev/null")
        .ok()
        .map(|path| unsafe { libc::open(path.as_ptr(), libc::O_WRONLY) })
        .unwrap_or(-1);
    if devnull >= 0 {
        unsafe {
            libc::dup2(devnull, libc::STDERR_FILENO);
            libc::close(devnull);
        }
    }

    let result = operation();

    unsafe {
        libc::dup2(saved, libc::STDERR_FILENO);
        libc::close(saved);
    }
    result
}

#[cfg(not(unix))]
fn with_silenced_stderr<T>(operation: impl FnOnce() -> T) -> T {
    operation()
}

pub struct NullAudioEngine {
    paused: bool,
    current: Option<PathBuf>,
    volume: f32,
    started_at: Option<Instant>,
    position_offset: Duration,
    track_duration: Option<Duration>,
}

impl NullAudioEngine {
    pub fn new() -> Self {
        Self {
            paused: false,
            current: None,
            volume: 1.0,
            started_at: None,
            position_offset: Duration::ZERO,
            track_duration: None,
        }
    }

    fn read_duration(path: &Path) -> Option<Duration> {
        let file = File::open(path).ok()?;
        Decoder::try_from(file)
            .ok()?
            .total_duration()
            .filter(|total| !total.is_zero())
    }

    fn current_position(&self) -> Duration {
        let mut position = self.position_offset;
        if !self.paused
            && self.current.is_some()
            && let Some(started_at) = self.started_at
        {
            position = position.saturating_add(started_at.elapsed());
        }
        match self.track_duration {
            Some(total) => position.min(total),
            None => position,
        }
    }
}

impl Default for NullAudioEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioEngine for NullAudioEngine {
    fn play(&mut self, path: &Path) -> Result<()> {
        self.paused = false;
        self.current = Some(path.to_path_buf());
        self.started_at = Some(Instant::now());
        self.position_offset = Duration::ZERO;
        self.track_duration = Self::read_duration(path);
        Ok(())
    }

    fn pause(&mut self) {
        self.position_offset = self.current_position();
        self.started_at = None;
        self.paused = true;
    }

    fn resume(&mut self) -> Result<()> {
        if self.current.is_none() {
            anyhow::bail!("no track loaded");
        }
        self.started_at = Some(Instant::now());
        self.paused = false;
        Ok(())
    }

    fn stop(&mut self) {
        self.current = None;
        self.paused = false;
        self.started_at = None;
        self.position_offset = Duration::ZERO;
        self.track_duration = None;
    }

    fn position(&self) -> Option<Duration> {
        self.current.as_ref()?;
        Some(self.current_position())
    }

    fn duration(&self) -> Option<Duration> {
        self.track_duration
    }

    fn seek_to(&mut self, position: Duration) -> Result<()> {
        if self.current.is_none() {
            anyhow::bail!("no active track");
        }
        self.position_offset = self
            .track_duration
            .map_or(position, |total| position.min(total));
        self.started_at = (!self.paused).then(Instant::now);
        Ok(())
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    fn output_name(&self) -> Option<String> {
        Some(String::from("Null audio engine"))
    }

    fn is_finished(&self) -> bool {
        let Some(total) = self.track_duration else {
            return false;
        };
        self.current.is_some() && !self.paused && self.current_position() >= total
    }
}
