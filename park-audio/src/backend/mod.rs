//! Output device seam
//!
//! The mixer talks to the device only through [`OutputBackend`]: open at a
//! desired format and learn the negotiated one, start pulling, stop. The
//! device thread calls the [`RenderFn`] for every buffer it needs.

mod output;

pub use output::CpalBackend;

use crate::format::AudioFormat;

/// Pull callback invoked on the device thread with the bytes to fill
pub type RenderFn = Box<dyn FnMut(&mut [u8]) + Send + 'static>;

/// Errors from opening or driving an output device
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("No audio output device available")]
    NoDevice,
    #[error("Audio device '{0}' not found")]
    DeviceNotFound(String),
    #[error("Failed to query output devices: {0}")]
    Devices(String),
    #[error("Failed to get output config: {0}")]
    Config(String),
    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),
    #[error("Failed to build audio stream: {0}")]
    Build(String),
    #[error("Failed to play audio stream: {0}")]
    Play(String),
    #[error("Audio device is not open")]
    NotOpen,
}

/// An audio output device.
pub trait OutputBackend {
    /// Open `device_name` (or the default device) asking for `desired`.
    ///
    /// The stream must not call `render` until [`resume`](Self::resume).
    /// Returns the format the device actually accepted, which may differ
    /// from `desired` in every field.
    fn open(
        &mut self,
        device_name: Option<&str>,
        desired: AudioFormat,
        buffer_frames: u32,
        render: RenderFn,
    ) -> Result<AudioFormat, BackendError>;

    /// Start pulling buffers
    fn resume(&mut self) -> Result<(), BackendError>;

    /// Stop the device and release it. Blocks until the callback can no longer run.
    fn close(&mut self);

    fn is_open(&self) -> bool;
}
