//! Park audio - real-time mixing engine for the park simulation
//!
//! The engine owns an output device, a list of live playback channels and
//! per-id caches of sound-bank effects and music tracks. The device thread
//! pulls each buffer through [`Mixer`]'s render callback while the game thread
//! issues `play`/`stop`/volume calls against the same locked state.
//!
//! Layout, leaf-first:
//! - [`format`] - PCM stream shape ([`AudioFormat`], [`SampleEncoding`])
//! - [`sample`] - per-encoding sample kernels and aligned scratch storage
//! - [`source`] - [`AudioSource`] providers (null, memory, WAV, sound bank)
//! - [`convert`], [`resample`], [`effects`] - buffer DSP
//! - [`channel`] - per-playback state
//! - [`mixer`] - the control plane and the per-tick mix
//! - [`backend`] - output device seam and the cpal implementation
//! - [`config`] - user sound settings and asset paths

pub mod backend;
pub mod channel;
pub mod config;
pub mod convert;
pub mod effects;
pub mod format;
pub mod mixer;
pub mod resample;
pub mod sample;
pub mod source;

pub use channel::{ChannelHandle, Looping, MixerGroup};
pub use config::{AudioPaths, AudioSettings, SoundConfig};
pub use format::{AudioFormat, SampleEncoding};
pub use mixer::{ChannelStatus, Mixer, MixerError, MixerMetrics, PlayOptions};
pub use source::{AudioSource, MemorySource, NullSource, SourceError};

/// Maximum per-channel volume (unity gain when mixing).
pub const MIXER_VOLUME_MAX: i32 = 128;

/// Frames per device buffer requested when opening the output.
pub const BUFFER_FRAMES: u32 = 2048;

/// Number of effects stored in the sound bank.
pub const SOUND_COUNT: usize = 63;
