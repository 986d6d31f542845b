//! Sample encoding and channel-count conversion
//!
//! Rate conversion lives in [`crate::resample`]; this module only changes the
//! layout of each frame.

use crate::format::{AudioFormat, SampleEncoding};
use crate::sample::Sample;

/// Errors from buffer conversion
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConvertError {
    /// Destination cannot hold the converted frames
    #[error("output buffer too small: need {needed} bytes, have {available}")]
    OutputTooSmall { needed: usize, available: usize },
    /// Byte buffer could not be viewed as samples
    #[error("sample buffer cast failed: {0:?}")]
    Cast(bytemuck::PodCastError),
}

/// Bytes produced by converting `src_len` bytes of `src` into `dst`'s layout.
///
/// Sample rate is ignored; trailing partial frames are dropped.
pub fn converted_len(src: &AudioFormat, dst: &AudioFormat, src_len: usize) -> usize {
    (src_len / src.bytes_per_frame()) * dst.bytes_per_frame()
}

/// Convert whole frames from `src_format` to `dst_format`'s encoding and channel count.
///
/// Returns the number of bytes written to `dst`.
pub fn convert_layout(
    src_format: &AudioFormat,
    src: &[u8],
    dst_format: &AudioFormat,
    dst: &mut [u8],
) -> Result<usize, ConvertError> {
    let frames = src.len() / src_format.bytes_per_frame();
    let needed = frames * dst_format.bytes_per_frame();
    if dst.len() < needed {
        return Err(ConvertError::OutputTooSmall {
            needed,
            available: dst.len(),
        });
    }

    let src = &src[..frames * src_format.bytes_per_frame()];
    let dst = &mut dst[..needed];
    let src_ch = src_format.channels() as usize;
    let dst_ch = dst_format.channels() as usize;

    use SampleEncoding::*;
    match (src_format.encoding(), dst_format.encoding()) {
        (U8, U8) => convert_frames::<u8, u8>(src, src_ch, dst, dst_ch),
        (U8, S16) => convert_frames::<u8, i16>(src, src_ch, cast_mut(dst)?, dst_ch),
        (S16, U8) => convert_frames::<i16, u8>(cast(src)?, src_ch, dst, dst_ch),
        (S16, S16) => convert_frames::<i16, i16>(cast(src)?, src_ch, cast_mut(dst)?, dst_ch),
    }
    Ok(needed)
}

fn cast<S: Sample>(bytes: &[u8]) -> Result<&[S], ConvertError> {
    bytemuck::try_cast_slice(bytes).map_err(ConvertError::Cast)
}

fn cast_mut<S: Sample>(bytes: &mut [u8]) -> Result<&mut [S], ConvertError> {
    bytemuck::try_cast_slice_mut(bytes).map_err(ConvertError::Cast)
}

/// Convert interleaved frames between sample types and channel counts.
///
/// Mono to stereo duplicates, stereo to mono averages.
pub fn convert_frames<S: Sample, D: Sample>(
    src: &[S],
    src_channels: usize,
    dst: &mut [D],
    dst_channels: usize,
) {
    let frames = (src.len() / src_channels).min(dst.len() / dst_channels);
    let src_frames = src.chunks_exact(src_channels).take(frames);
    let dst_frames = dst.chunks_exact_mut(dst_channels);

    for (input, output) in src_frames.zip(dst_frames) {
        match (src_channels, dst_channels) {
            (1, 2) => {
                let v = D::from_i32(input[0].to_i32());
                output[0] = v;
                output[1] = v;
            }
            (2, 1) => {
                output[0] = D::from_i32((input[0].to_i32() + input[1].to_i32()) / 2);
            }
            _ => {
                for (o, s) in output.iter_mut().zip(input) {
                    *o = D::from_i32(s.to_i32());
                }
            }
        }
    }
}
