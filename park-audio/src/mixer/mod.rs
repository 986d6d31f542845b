//! Audio mixer: device lifecycle, channel control and source caches
//!
//! [`Mixer`] is driven from the game thread. It shares a [`MixState`] with
//! the device callback through `Arc<Mutex<_>>`; every operation that reads
//! or writes channel state takes the lock, and the callback takes it for the
//! length of one tick. Decoding always happens before the lock is taken.

mod metrics;
mod state;


pub use metrics::MixerMetrics;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use self::state::MixState;
use crate::backend::{BackendError, CpalBackend, OutputBackend, RenderFn};
use crate::channel::{Channel, ChannelHandle, Looping, MixerGroup};
use crate::config::{AudioPaths, AudioSettings, SoundConfig};
use crate::format::AudioFormat;
use crate::source::{AudioSource, NullSource, SoundBank, create_memory_from_wav};
use crate::{BUFFER_FRAMES, MIXER_VOLUME_MAX, SOUND_COUNT};

/// Errors from opening the mixer's output
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MixerError {
    #[error("audio output unavailable: {0}")]
    Backend(#[from] BackendError),
}

/// Settings for a new channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayOptions {
    pub looping: Looping,
    /// Evict the channel once its source is exhausted
    pub delete_on_done: bool,
    /// Release the channel's source once it is exhausted
    pub delete_source_on_done: bool,
    /// 0..=MIXER_VOLUME_MAX
    pub volume: i32,
    /// 0.0 (left) ..= 1.0 (right)
    pub pan: f32,
    pub rate: f64,
    pub group: MixerGroup,
}

impl Default for PlayOptions {
    fn default() -> Self {
        Self {
            looping: Looping::Once,
            delete_on_done: true,
            delete_source_on_done: false,
            volume: MIXER_VOLUME_MAX,
            pan: 0.5,
            rate: 1.0,
            group: MixerGroup::Sound,
        }
    }
}

/// Snapshot of a channel's observable state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelStatus {
    pub done: bool,
    pub stopping: bool,
    pub volume: i32,
    pub pan: f32,
    pub rate: f64,
    pub group: MixerGroup,
    /// Cursor position in source bytes
    pub offset: u64,
    /// Source bytes delivered since the channel started, across loops
    pub bytes_played: u64,
}

impl ChannelStatus {
    fn of(channel: &Channel) -> Self {
        Self {
            done: channel.is_done(),
            stopping: channel.is_stopping(),
            volume: channel.volume(),
            pan: channel.pan(),
            rate: channel.rate(),
            group: channel.group(),
            offset: channel.offset(),
            bytes_played: channel.bytes_played(),
        }
    }
}

struct MusicSlot {
    source: Arc<dyn AudioSource>,
    attempted: bool,
}

/// The audio mixer
pub struct Mixer {
    backend: Box<dyn OutputBackend>,
    state: Arc<Mutex<MixState>>,
    sounds: Vec<Arc<dyn AudioSource>>,
    music: Vec<MusicSlot>,
    paths: AudioPaths,
    open: bool,
}

fn lock(state: &Mutex<MixState>) -> MutexGuard<'_, MixState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Mixer {
    /// Create a closed mixer that will output through cpal
    pub fn new(settings: AudioSettings) -> Self {
        Self::with_backend(Box::new(CpalBackend::new()), settings)
    }

    /// Create a closed mixer on a custom output backend
    pub fn with_backend(backend: Box<dyn OutputBackend>, settings: AudioSettings) -> Self {
        let format = AudioFormat::TARGET;
        let null = NullSource::shared(format);
        let music = settings
            .paths
            .music
            .iter()
            .map(|_| MusicSlot {
                source: Arc::clone(&null),
                attempted: false,
            })
            .collect();

        Self {
            backend,
            state: Arc::new(Mutex::new(MixState::new(format, settings.sound))),
            sounds: vec![null; SOUND_COUNT],
            music,
            paths: settings.paths,
            open: false,
        }
    }

    // =============================================================
    // Device lifecycle
    // =============================================================

    /// Open the output device, or the default one when `device_name` is `None`.
    ///
    /// Any open device is closed first. On failure the mixer stays closed and
    /// every other call keeps working silently. Returns whether a device opened.
    pub fn init(&mut self, device_name: Option<&str>) -> bool {
        match self.try_init(device_name) {
            Ok(_) => true,
            Err(e) => {
                warn!("Failed to open audio output: {}. Audio disabled.", e);
                false
            }
        }
    }

    /// Open the output device, returning the negotiated format
    pub fn try_init(&mut self, device_name: Option<&str>) -> Result<AudioFormat, MixerError> {
        self.close();

        let state = Arc::clone(&self.state);
        let render: RenderFn = Box::new(move |dst: &mut [u8]| lock(&state).mix(dst));
        let format = self
            .backend
            .open(device_name, AudioFormat::TARGET, BUFFER_FRAMES, render)?;

        lock(&self.state).set_format(format, BUFFER_FRAMES as usize);
        self.load_all_sounds(format);

        if let Err(e) = self.backend.resume() {
            self.close();
            return Err(e.into());
        }

        self.open = true;
        debug!("Audio mixer opened: {:?}", format);
        Ok(format)
    }

    /// Stop the device and release every channel, cached source and scratch buffer.
    ///
    /// Blocks until the device callback has stopped.
    pub fn close(&mut self) {
        self.backend.close();
        lock(&self.state).clear();

        let null = NullSource::shared(self.format());
        self.sounds.fill(Arc::clone(&null));
        for slot in &mut self.music {
            slot.source = Arc::clone(&null);
            slot.attempted = false;
        }

        if self.open {
            debug!("Audio mixer closed");
        }
        self.open = false;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Format the mixer renders in
    pub fn format(&self) -> AudioFormat {
        lock(&self.state).format
    }

    fn load_all_sounds(&mut self, format: AudioFormat) {
        let null = NullSource::shared(format);
        let bank = match SoundBank::open(&self.paths.sound_bank) {
            Ok(bank) => bank,
            Err(e) => {
                warn!(
                    "Failed to open sound bank {:?}: {}. Sound effects disabled.",
                    self.paths.sound_bank, e
                );
                self.sounds.fill(null);
                return;
            }
        };

        for (id, slot) in self.sounds.iter_mut().enumerate() {
            *slot = match bank.load(id).and_then(|s| s.convert_to(&format)) {
                Ok(source) => Arc::new(source),
                Err(e) => {
                    warn!("Failed to load sound {}: {}", id, e);
                    Arc::clone(&null)
                }
            };
        }
        debug!(
            "Loaded {} sounds from {:?}",
            bank.len().min(SOUND_COUNT),
            self.paths.sound_bank
        );
    }

    // =============================================================
    // Channels
    // =============================================================

    /// Start playing `source` and return a handle to the new channel
    pub fn play(
        &self,
        source: Arc<dyn AudioSource>,
        looping: Looping,
        delete_on_done: bool,
        delete_source_on_done: bool,
    ) -> ChannelHandle {
        self.play_with(
            source,
            PlayOptions {
                looping,
                delete_on_done,
                delete_source_on_done,
                ..PlayOptions::default()
            },
        )
    }

    /// Start playing `source` with the given channel settings.
    ///
    /// Channels only advance when a buffer is mixed. While the mixer is closed
    /// and [`mix`](Self::mix) is not being called, unfinished channels
    /// accumulate until `init` or `close` clears them; stopped and finished
    /// ones are evicted here.
    pub fn play_with(&self, source: Arc<dyn AudioSource>, options: PlayOptions) -> ChannelHandle {
        let mut channel = Channel::new(Arc::clone(&source));
        channel.set_volume(options.volume);
        channel.set_pan(options.pan);
        channel.set_rate(options.rate);
        channel.set_group(options.group);
        channel.set_delete_on_done(options.delete_on_done);
        channel.set_delete_source_on_done(options.delete_source_on_done);
        channel.play(source, options.looping);

        let mut state = lock(&self.state);
        if !self.open {
            state.evict_finished();
        }
        state.insert(channel)
    }

    /// Play sound-bank effect `id`.
    ///
    /// Returns `None` when effects are disabled or `id` is not a sound id.
    pub fn play_effect(&self, id: usize, options: PlayOptions) -> Option<ChannelHandle> {
        if id >= SOUND_COUNT || !lock(&self.state).config.sound_enabled {
            return None;
        }
        let source = Arc::clone(&self.sounds[id]);
        Some(self.play_with(
            source,
            PlayOptions {
                group: MixerGroup::Sound,
                ..options
            },
        ))
    }

    /// Ask a channel to fade out; it is removed by the next tick
    pub fn stop(&self, handle: ChannelHandle) {
        if let Some(channel) = lock(&self.state).channel_mut(handle) {
            channel.set_stopping(true);
        }
    }

    /// Remove a channel immediately. Returns whether it existed.
    pub fn remove(&self, handle: ChannelHandle) -> bool {
        lock(&self.state).remove(handle).is_some()
    }

    fn with_channel(&self, handle: ChannelHandle, f: impl FnOnce(&mut Channel)) -> bool {
        match lock(&self.state).channel_mut(handle) {
            Some(channel) => {
                f(channel);
                true
            }
            None => false,
        }
    }

    /// Set a channel's volume (0..=MIXER_VOLUME_MAX). Returns false for a stale handle.
    pub fn set_channel_volume(&self, handle: ChannelHandle, volume: i32) -> bool {
        self.with_channel(handle, |c| c.set_volume(volume))
    }

    /// Set a channel's pan (0.0 left, 1.0 right). Returns false for a stale handle.
    pub fn set_channel_pan(&self, handle: ChannelHandle, pan: f32) -> bool {
        self.with_channel(handle, |c| c.set_pan(pan))
    }

    /// Set a channel's playback rate. Returns false for a stale handle.
    pub fn set_channel_rate(&self, handle: ChannelHandle, rate: f64) -> bool {
        self.with_channel(handle, |c| c.set_rate(rate))
    }

    pub fn set_channel_group(&self, handle: ChannelHandle, group: MixerGroup) -> bool {
        self.with_channel(handle, |c| c.set_group(group))
    }

    /// Move a channel's cursor to `offset` source bytes. Returns false for a stale handle.
    pub fn set_channel_offset(&self, handle: ChannelHandle, offset: u64) -> bool {
        self.with_channel(handle, |c| c.set_offset(offset))
    }

    /// Current state of a channel, or `None` once it has been evicted
    pub fn channel_status(&self, handle: ChannelHandle) -> Option<ChannelStatus> {
        lock(&self.state).channel(handle).map(ChannelStatus::of)
    }

    /// Live channel count
    pub fn channel_count(&self) -> usize {
        lock(&self.state).channels.len()
    }

    // =============================================================
    // Volume and settings
    // =============================================================

    /// Set the output-wide volume multiplier (1.0 is unity)
    pub fn set_volume(&self, volume: f32) {
        let volume = if volume.is_finite() { volume.max(0.0) } else { 0.0 };
        lock(&self.state).volume = volume;
    }

    pub fn volume(&self) -> f32 {
        lock(&self.state).volume
    }

    /// Replace the settings read by the mix tick
    pub fn set_sound_config(&self, config: SoundConfig) {
        lock(&self.state).config = config;
    }

    pub fn sound_config(&self) -> SoundConfig {
        lock(&self.state).config.clone()
    }

    // =============================================================
    // Sources
    // =============================================================

    /// Cached sound-bank effect `id`; the null source until a device is open
    pub fn sound_source(&self, id: usize) -> Arc<dyn AudioSource> {
        debug_assert!(id < SOUND_COUNT, "sound id {} out of range", id);
        match self.sounds.get(id) {
            Some(source) => Arc::clone(source),
            None => NullSource::shared(self.format()),
        }
    }

    /// Cached music track `id`; the null source until [`load_music`](Self::load_music) succeeds
    pub fn music_source(&self, id: usize) -> Arc<dyn AudioSource> {
        debug_assert!(id < self.music.len(), "music id {} out of range", id);
        match self.music.get(id) {
            Some(slot) => Arc::clone(&slot.source),
            None => NullSource::shared(self.format()),
        }
    }

    /// Decode and cache music track `id` on first use.
    ///
    /// Returns whether the slot holds a real source. A failed load is not retried.
    pub fn load_music(&mut self, id: usize) -> bool {
        debug_assert!(id < self.music.len(), "music id {} out of range", id);
        let format = self.format();
        let (Some(slot), Some(path)) = (self.music.get_mut(id), self.paths.music.get(id)) else {
            return false;
        };

        if !slot.attempted {
            slot.source = create_memory_from_wav(path, &format);
            slot.attempted = true;
        }
        !slot.source.is_null()
    }

    pub fn paths(&self) -> &AudioPaths {
        &self.paths
    }

    // =============================================================
    // Rendering
    // =============================================================

    /// Run one mix tick into `dst`, exactly as the device callback does
    pub fn mix(&self, dst: &mut [u8]) {
        lock(&self.state).mix(dst);
    }

    pub fn metrics(&self) -> MixerMetrics {
        lock(&self.state).metrics.clone()
    }
}

impl Drop for Mixer {
    fn drop(&mut self) {
        self.close();
    }
}
