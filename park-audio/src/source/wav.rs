//! RIFF/WAV decoding via hound

use std::io::Read;
use std::path::Path;

use hound::{SampleFormat, WavReader};

use super::{MemorySource, SourceError};
use crate::format::{AudioFormat, SampleEncoding};

/// Decode a WAV file from disk
pub fn load_wav(path: &Path) -> Result<MemorySource, SourceError> {
    decode(WavReader::open(path)?)
}

/// Decode a WAV stream
pub fn decode_wav<R: Read>(reader: R) -> Result<MemorySource, SourceError> {
    decode(WavReader::new(reader)?)
}

/// 8-bit PCM stays unsigned 8-bit; every other depth is reduced to 16-bit.
fn decode<R: Read>(mut reader: WavReader<R>) -> Result<MemorySource, SourceError> {
    let spec = reader.spec();
    let unsupported = || SourceError::UnsupportedWav {
        bits: spec.bits_per_sample,
        format: match spec.sample_format {
            SampleFormat::Int => "int",
            SampleFormat::Float => "float",
        },
        channels: spec.channels,
    };

    let encoding = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Int, 8) => SampleEncoding::U8,
        (SampleFormat::Int, 16 | 24 | 32) | (SampleFormat::Float, 32) => SampleEncoding::S16,
        _ => return Err(unsupported()),
    };
    let format =
        AudioFormat::new(encoding, spec.channels, spec.sample_rate).ok_or_else(unsupported)?;

    let data: Vec<u8> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Int, 8) => reader
            .samples::<i8>()
            .map(|s| s.map(|v| (v as i16 + 128) as u8))
            .collect::<Result<_, _>>()?,
        (SampleFormat::Int, 16) => {
            let samples = reader.samples::<i16>().collect::<Result<Vec<_>, _>>()?;
            bytemuck::cast_slice(&samples).to_vec()
        }
        (SampleFormat::Int, bits) => {
            let shift = bits - 16;
            let samples = reader
                .samples::<i32>()
                .map(|s| s.map(|v| (v >> shift) as i16))
                .collect::<Result<Vec<_>, _>>()?;
            bytemuck::cast_slice(&samples).to_vec()
        }
        (SampleFormat::Float, _) => {
            let samples = reader
                .samples::<f32>()
                .map(|s| s.map(|v| (v * 32767.0).clamp(-32768.0, 32767.0) as i16))
                .collect::<Result<Vec<_>, _>>()?;
            bytemuck::cast_slice(&samples).to_vec()
        }
    };

    Ok(MemorySource::new(format, data))
}
