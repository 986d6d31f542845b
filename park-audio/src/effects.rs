//! Buffer effects: stereo panning, volume fades and saturating mix
//!
//! All functions work on interleaved samples in place and keep no state.
//! Interpolated effects take the previous and current settings so a change
//! is spread across one buffer instead of stepping at its start.

use crate::MIXER_VOLUME_MAX;
use crate::sample::Sample;

/// Left/right gains for a pan position in `[0, 1]` (0.5 is centre).
///
/// The near side stays at unity; the far side drops by up to 100 dB at the extremes.
pub fn pan_gains(pan: f32) -> (f32, f32) {
    let pan = pan.clamp(0.0, 1.0);
    let decibels = (pan - 0.5).abs() * 2.0 * 100.0;
    let attenuation = 10f32.powf(decibels / 20.0);
    if pan <= 0.5 {
        (1.0, 1.0 / attenuation)
    } else {
        (1.0 / attenuation, 1.0)
    }
}

/// Scale interleaved stereo frames, moving linearly from `from` to `to` gains.
pub fn apply_pan<S: Sample>(buffer: &mut [S], from: (f32, f32), to: (f32, f32)) {
    let frames = buffer.len() / 2;
    if frames == 0 {
        return;
    }

    let (d_left, d_right) = (to.0 - from.0, to.1 - from.1);
    for (i, frame) in buffer.chunks_exact_mut(2).enumerate() {
        let t = i as f32 / frames as f32;
        let left = from.0 + d_left * t;
        let right = from.1 + d_right * t;
        frame[0] = S::from_i32((frame[0].to_i32() as f32 * left) as i32);
        frame[1] = S::from_i32((frame[1].to_i32() as f32 * right) as i32);
    }
}

/// Gain at frame `index` of a `frames`-long fade between two mixer volumes
#[inline]
pub fn fade_gain(index: usize, frames: usize, start_volume: i32, end_volume: i32) -> f32 {
    let start = start_volume as f32 / MIXER_VOLUME_MAX as f32;
    let end = end_volume as f32 / MIXER_VOLUME_MAX as f32;
    let t = index as f32 / frames.max(1) as f32;
    start + (end - start) * t
}

/// Fade interleaved frames from `start_volume` to `end_volume` (mixer volume units).
pub fn apply_fade<S: Sample>(
    buffer: &mut [S],
    channels: usize,
    start_volume: i32,
    end_volume: i32,
) {
    let channels = channels.max(1);
    let frames = buffer.len() / channels;
    for (i, frame) in buffer.chunks_exact_mut(channels).enumerate() {
        let gain = fade_gain(i, frames, start_volume, end_volume);
        for sample in frame {
            *sample = S::from_i32((sample.to_i32() as f32 * gain) as i32);
        }
    }
}

/// Add `src` scaled by `volume / MIXER_VOLUME_MAX` onto `dst`, saturating.
pub fn mix_into<S: Sample>(dst: &mut [S], src: &[S], volume: i32) {
    let volume = volume.clamp(0, MIXER_VOLUME_MAX);
    if volume == 0 {
        return;
    }
    for (d, s) in dst.iter_mut().zip(src) {
        let scaled = s.to_i32() * volume / MIXER_VOLUME_MAX;
        *d = S::from_i32(d.to_i32() + scaled);
    }
}
