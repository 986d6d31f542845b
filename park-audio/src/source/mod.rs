//! PCM data providers
//!
//! A source knows its [`AudioFormat`] and can copy bytes from any offset. It
//! holds no playback position; channels own the cursor. Load helpers never
//! fail outward: a missing or corrupt asset becomes a [`NullSource`].

mod bank;
mod wav;

#[cfg(test)]
pub(crate) mod tests;

pub use bank::{SoundBank, SoundBankEntry};
pub use wav::{decode_wav, load_wav};

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::convert::{self, ConvertError};
use crate::format::{AudioFormat, SampleEncoding};
use crate::resample::resample_linear;
use crate::sample::{ScratchBuffer, fill_silence};

/// Errors raised while decoding or converting a source
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("WAV decode error: {0}")]
    Wav(#[from] hound::Error),
    #[error("unsupported WAV layout: {bits}-bit {format}, {channels} channels")]
    UnsupportedWav {
        bits: u16,
        format: &'static str,
        channels: u16,
    },
    #[error("sound {index} out of range (bank holds {count})")]
    BankIndexOutOfRange { index: usize, count: usize },
    #[error("unsupported sample layout: {0}")]
    InvalidFormat(String),
    #[error("conversion failed: {0}")]
    Convert(#[from] ConvertError),
}

/// A provider of raw PCM bytes.
pub trait AudioSource: Send + Sync {
    /// Native format of the data
    fn format(&self) -> AudioFormat;

    /// Total length in bytes, or `None` for an unbounded source
    fn len_bytes(&self) -> Option<u64>;

    /// Copy bytes starting at `offset` into `dst`.
    ///
    /// Returns the number of bytes written; fewer than `dst.len()` means the
    /// end of the data was reached.
    fn read(&self, offset: u64, dst: &mut [u8]) -> usize;

    /// Whether this is a silent stand-in for a missing asset
    fn is_null(&self) -> bool {
        false
    }
}

/// Silent, unbounded source used wherever a real one is unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NullSource {
    format: AudioFormat,
}

impl NullSource {
    pub fn new(format: AudioFormat) -> Self {
        Self { format }
    }

    /// Shared null source for `format`
    pub fn shared(format: AudioFormat) -> Arc<dyn AudioSource> {
        Arc::new(Self::new(format))
    }
}

impl AudioSource for NullSource {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn len_bytes(&self) -> Option<u64> {
        None
    }

    fn read(&self, _offset: u64, dst: &mut [u8]) -> usize {
        fill_silence(dst, self.format.encoding());
        dst.len()
    }

    fn is_null(&self) -> bool {
        true
    }
}

/// Decoded PCM held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemorySource {
    format: AudioFormat,
    data: Vec<u8>,
}

impl MemorySource {
    /// Wrap PCM bytes. A trailing partial frame is dropped.
    pub fn new(format: AudioFormat, mut data: Vec<u8>) -> Self {
        let whole = data.len() - data.len() % format.bytes_per_frame();
        data.truncate(whole);
        Self { format, data }
    }

    /// Wrap native-endian 16-bit samples
    pub fn from_i16(format: AudioFormat, samples: &[i16]) -> Self {
        debug_assert_eq!(format.encoding(), SampleEncoding::S16);
        Self::new(format, bytemuck::cast_slice(samples).to_vec())
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Length in whole frames
    pub fn frames(&self) -> usize {
        self.data.len() / self.format.bytes_per_frame()
    }

    /// Convert to `target`'s encoding, channel count and sample rate.
    pub fn convert_to(self, target: &AudioFormat) -> Result<Self, SourceError> {
        if self.format == *target {
            return Ok(self);
        }

        // Layout first, at the source rate
        let layout = target.with_sample_rate(self.format.sample_rate());
        let mut staged = ScratchBuffer::new();
        let data = if self.format.same_layout(target) {
            self.data
        } else {
            let mut input = ScratchBuffer::new();
            input.bytes_mut(self.data.len()).copy_from_slice(&self.data);
            let len = convert::converted_len(&self.format, &layout, self.data.len());
            let written = convert::convert_layout(
                &self.format,
                input.bytes_mut(self.data.len()),
                &layout,
                staged.bytes_mut(len),
            )?;
            staged.bytes_mut(written).to_vec()
        };

        if layout.sample_rate() == target.sample_rate() {
            return Ok(Self::new(*target, data));
        }

        let ratio = layout.sample_rate() as f64 / target.sample_rate() as f64;
        let channels = target.channels() as usize;
        let len = data.len();
        staged.bytes_mut(len).copy_from_slice(&data);
        let resampled = match target.encoding() {
            SampleEncoding::U8 => {
                let input = staged.samples_mut::<u8>(len).map_err(cast_err)?;
                resample_linear::<u8>(input, channels, ratio)
            }
            SampleEncoding::S16 => {
                let input = staged.samples_mut::<i16>(len).map_err(cast_err)?;
                let out = resample_linear::<i16>(input, channels, ratio);
                bytemuck::cast_slice(&out).to_vec()
            }
        };
        Ok(Self::new(*target, resampled))
    }
}

fn cast_err(e: bytemuck::PodCastError) -> SourceError {
    SourceError::Convert(ConvertError::Cast(e))
}

impl AudioSource for MemorySource {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn len_bytes(&self) -> Option<u64> {
        Some(self.data.len() as u64)
    }

    fn read(&self, offset: u64, dst: &mut [u8]) -> usize {
        let len = self.data.len() as u64;
        if offset >= len {
            return 0;
        }
        let start = offset as usize;
        let n = dst.len().min(self.data.len() - start);
        dst[..n].copy_from_slice(&self.data[start..start + n]);
        n
    }
}

/// Decode a WAV file into `target`'s format, or a null source on failure.
pub fn create_memory_from_wav(path: &Path, target: &AudioFormat) -> Arc<dyn AudioSource> {
    match load_wav(path).and_then(|source| source.convert_to(target)) {
        Ok(source) => {
            debug!("Loaded {:?}: {} frames", path, source.frames());
            Arc::new(source)
        }
        Err(e) => {
            warn!("Failed to load WAV {:?}: {}", path, e);
            NullSource::shared(*target)
        }
    }
}

/// Decode entry `index` of a sound bank into `target`'s format, or a null source on failure.
pub fn create_memory_from_bank(
    path: &Path,
    index: usize,
    target: &AudioFormat,
) -> Arc<dyn AudioSource> {
    let loaded = SoundBank::open(path)
        .and_then(|bank| bank.load(index))
        .and_then(|source| source.convert_to(target));
    match loaded {
        Ok(source) => Arc::new(source),
        Err(e) => {
            warn!("Failed to load sound {} from {:?}: {}", index, path, e);
            NullSource::shared(*target)
        }
    }
}
