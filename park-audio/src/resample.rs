//! Linear-interpolation resampling
//!
//! [`Resampler`] is the streaming variant owned by a channel: it keeps the
//! last two input frames and the fractional playhead between calls, so
//! consecutive buffers join without a phase jump. [`resample_linear`] is the
//! one-shot variant used when converting a whole source at load time.

use crate::sample::Sample;

/// Largest channel count a resampler handles
pub const MAX_CHANNELS: usize = 2;

/// Errors from [`Resampler::process`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResampleError {
    #[error("resampler needs {needed} input frames, got {got}")]
    ShortInput { needed: usize, got: usize },
}

/// Streaming linear resampler.
///
/// Input frames are treated as a sequence prefixed by two frames of history.
/// Output frame `k` samples that sequence at `pos + k * ratio`.
///
/// The history starts as silence, so a fresh stream lags its source by two
/// input frames. The last two frames consumed stay in the history and are
/// only heard if more input follows; nothing flushes them.
#[derive(Debug, Clone)]
pub struct Resampler {
    channels: usize,
    ratio: f64,
    /// Fractional playhead relative to the first history frame, in [0, 1)
    pos: f64,
    history: [[i32; MAX_CHANNELS]; 2],
}

impl Resampler {
    /// Create a resampler consuming `ratio` input frames per output frame
    pub fn new(channels: usize, ratio: f64) -> Self {
        Self {
            channels: channels.clamp(1, MAX_CHANNELS),
            ratio: sanitize_ratio(ratio),
            pos: 0.0,
            history: [[0; MAX_CHANNELS]; 2],
        }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    /// Change the ratio without disturbing phase or history
    pub fn set_ratio(&mut self, ratio: f64) {
        self.ratio = sanitize_ratio(ratio);
    }

    /// Return to silence history and zero phase
    pub fn reset(&mut self) {
        self.pos = 0.0;
        self.history = [[0; MAX_CHANNELS]; 2];
    }

    /// Input frames consumed when producing `output_frames` frames
    pub fn input_frames_for(&self, output_frames: usize) -> usize {
        (self.pos + output_frames as f64 * self.ratio).floor() as usize
    }

    /// Resample interleaved `input` into `output`.
    ///
    /// `output.len() / channels` frames are produced and exactly
    /// [`input_frames_for`](Self::input_frames_for) input frames are consumed.
    pub fn process<S: Sample>(
        &mut self,
        input: &[S],
        output: &mut [S],
    ) -> Result<usize, ResampleError> {
        let ch = self.channels;
        let out_frames = output.len() / ch;
        let needed = self.input_frames_for(out_frames);
        let got = input.len() / ch;
        if got < needed {
            return Err(ResampleError::ShortInput { needed, got });
        }

        let history = self.history;
        let value = |index: usize, c: usize| -> i32 {
            if index < 2 {
                history[index][c]
            } else {
                input[(index - 2) * ch + c].to_i32()
            }
        };

        for (k, frame) in output.chunks_exact_mut(ch).enumerate() {
            let t = self.pos + k as f64 * self.ratio;
            let index = t.floor() as usize;
            let frac = t - index as f64;
            for (c, out) in frame.iter_mut().enumerate() {
                let a = value(index, c);
                let b = value(index + 1, c);
                *out = S::from_i32(a + ((b - a) as f64 * frac).round() as i32);
            }
        }

        let end = self.pos + out_frames as f64 * self.ratio;
        let consumed = end.floor() as usize;
        let mut next = [[0; MAX_CHANNELS]; 2];
        for c in 0..ch {
            next[0][c] = value(consumed, c);
            next[1][c] = value(consumed + 1, c);
        }
        self.history = next;
        self.pos = end - consumed as f64;

        Ok(out_frames)
    }
}

fn sanitize_ratio(ratio: f64) -> f64 {
    if ratio.is_finite() && ratio > 0.0 {
        ratio
    } else {
        1.0
    }
}

/// Resample a complete interleaved buffer by `ratio` input frames per output frame.
///
/// Frames past the end of the input repeat the last frame.
pub fn resample_linear<S: Sample>(input: &[S], channels: usize, ratio: f64) -> Vec<S> {
    let channels = channels.max(1);
    let ratio = sanitize_ratio(ratio);
    let in_frames = input.len() / channels;
    if in_frames == 0 {
        return Vec::new();
    }

    let out_frames = (in_frames as f64 / ratio).floor() as usize;
    let mut output = Vec::with_capacity(out_frames * channels);

    for k in 0..out_frames {
        let t = k as f64 * ratio;
        let index = (t as usize).min(in_frames - 1);
        let next = (index + 1).min(in_frames - 1);
        let frac = t - index as f64;
        for c in 0..channels {
            let a = input[index * channels + c].to_i32();
            let b = input[next * channels + c].to_i32();
            output.push(S::from_i32(a + ((b - a) as f64 * frac).round() as i32));
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(len: usize) -> Vec<i16> {
        (0..len as i16).map(|i| i * 100).collect()
    }

    #[test]
    fn test_input_frames_for_tracks_ratio() {
        let r = Resampler::new(1, 2.0);
        assert_eq!(r.input_frames_for(10), 20);
        let r = Resampler::new(1, 0.5);
        assert_eq!(r.input_frames_for(10), 5);
    }

    #[test]
    fn test_invalid_ratio_falls_back_to_unity() {
        assert_eq!(Resampler::new(2, 0.0).ratio(), 1.0);
        assert_eq!(Resampler::new(2, f64::NAN).ratio(), 1.0);
    }

    #[test]
    fn test_short_input_is_error() {
        let mut r = Resampler::new(1, 2.0);
        let input = [0i16; 4];
        let mut output = [0i16; 4];
        assert_eq!(
            r.process(&input, &mut output),
            Err(ResampleError::ShortInput { needed: 8, got: 4 })
        );
    }

    #[test]
    fn test_downsample_picks_every_other_frame() {
        let mut r = Resampler::new(1, 2.0);
        let input = ramp(8);
        let mut output = [0i16; 4];
        r.process(&input, &mut output).unwrap();
        // Two frames of silent history lead the stream
        assert_eq!(output, [0, 0, 200, 400]);
    }

    #[test]
    fn test_phase_continuity_across_calls() {
        let input = ramp(40);

        let mut whole = Resampler::new(1, 0.75);
        let mut expected = [0i16; 40];
        let used = whole.input_frames_for(40);
        whole.process(&input[..used], &mut expected).unwrap();

        let mut split = Resampler::new(1, 0.75);
        let mut first = [0i16; 13];
        let n1 = split.input_frames_for(13);
        split.process(&input[..n1], &mut first).unwrap();
        let mut second = [0i16; 27];
        let n2 = split.input_frames_for(27);
        split.process(&input[n1..n1 + n2], &mut second).unwrap();

        assert_eq!(n1 + n2, used);
        assert_eq!(&expected[..13], &first);
        assert_eq!(&expected[13..], &second);
    }

    #[test]
    fn test_stereo_channels_independent() {
        let mut r = Resampler::new(2, 0.5);
        let input = [1000i16, -1000, 2000, -2000];
        let mut output = [0i16; 8];
        r.process(&input, &mut output).unwrap();
        for frame in output.chunks_exact(2) {
            assert_eq!(frame[0], -frame[1]);
        }
    }

    #[test]
    fn test_resample_linear_halves_length() {
        let input = ramp(10);
        let output = resample_linear(&input, 1, 2.0);
        assert_eq!(output, vec![0, 200, 400, 600, 800]);
    }

    #[test]
    fn test_resample_linear_upsample_interpolates() {
        let input = [0i16, 100];
        let output = resample_linear(&input, 1, 0.5);
        assert_eq!(output, vec![0, 50, 100, 100]);
    }

    #[test]
    fn test_resample_linear_empty() {
        assert!(resample_linear::<i16>(&[], 2, 1.5).is_empty());
    }
}
