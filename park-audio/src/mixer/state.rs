//! Shared mixer state and the per-tick mix
//!
//! Everything the device callback touches lives in [`MixState`], guarded by
//! one mutex that the control plane also takes for every channel operation.

use std::time::Instant;

use tracing::trace;

use super::metrics::MixerMetrics;
use crate::MIXER_VOLUME_MAX;
use crate::channel::{Channel, ChannelHandle, MixerGroup};
use crate::config::{SoundConfig, volume_curve};
use crate::convert::{self, ConvertError};
use crate::effects::{apply_fade, apply_pan, mix_into};
use crate::format::{AudioFormat, SampleEncoding};
use crate::resample::ResampleError;
use crate::sample::{Sample, ScratchBuffer, fill_silence};

/// Effect volume ceiling while the title sequence plays
const TITLE_SEQUENCE_SOUND_CAP: f32 = 0.75;

/// Most source frames a channel may consume per output frame
const MAX_STEP_RATIO: f64 = 64.0;

/// Why a channel contributed nothing to a tick
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub(crate) enum TickError {
    #[error(transparent)]
    Convert(#[from] ConvertError),
    #[error(transparent)]
    Resample(#[from] ResampleError),
    #[error("channel consumes too many source frames per output frame")]
    StepTooLarge,
}

impl From<bytemuck::PodCastError> for TickError {
    fn from(e: bytemuck::PodCastError) -> Self {
        TickError::Convert(ConvertError::Cast(e))
    }
}

pub(crate) struct MixState {
    pub format: AudioFormat,
    pub channels: Vec<(ChannelHandle, Channel)>,
    next_handle: u64,
    /// Output-wide multiplier
    pub volume: f32,
    pub config: SoundConfig,
    /// Category volumes the curves were last computed for
    applied_volumes: Option<(u8, u8)>,
    sound_curve: f32,
    music_curve: f32,
    read_buf: ScratchBuffer,
    convert_buf: ScratchBuffer,
    effect_buf: ScratchBuffer,
    out_buf: ScratchBuffer,
    pub metrics: MixerMetrics,
}

impl MixState {
    pub fn new(format: AudioFormat, config: SoundConfig) -> Self {
        Self {
            format,
            channels: Vec::new(),
            next_handle: 1,
            volume: 1.0,
            config,
            applied_volumes: None,
            sound_curve: 1.0,
            music_curve: 1.0,
            read_buf: ScratchBuffer::new(),
            convert_buf: ScratchBuffer::new(),
            effect_buf: ScratchBuffer::new(),
            out_buf: ScratchBuffer::new(),
            metrics: MixerMetrics::new(),
        }
    }

    /// Adopt a negotiated format and size the scratch buffers for `frames`-long ticks
    pub fn set_format(&mut self, format: AudioFormat, frames: usize) {
        self.format = format;
        let bytes = frames * format.bytes_per_frame();
        for buf in [
            &mut self.read_buf,
            &mut self.convert_buf,
            &mut self.effect_buf,
            &mut self.out_buf,
        ] {
            buf.bytes_mut(bytes);
        }
    }

    pub fn insert(&mut self, channel: Channel) -> ChannelHandle {
        let handle = ChannelHandle(self.next_handle);
        self.next_handle += 1;
        self.channels.push((handle, channel));
        handle
    }

    pub fn channel(&self, handle: ChannelHandle) -> Option<&Channel> {
        self.channels
            .iter()
            .find(|(h, _)| *h == handle)
            .map(|(_, c)| c)
    }

    pub fn channel_mut(&mut self, handle: ChannelHandle) -> Option<&mut Channel> {
        self.channels
            .iter_mut()
            .find(|(h, _)| *h == handle)
            .map(|(_, c)| c)
    }

    pub fn remove(&mut self, handle: ChannelHandle) -> Option<Channel> {
        let index = self.channels.iter().position(|(h, _)| *h == handle)?;
        Some(self.channels.remove(index).1)
    }

    /// Evict channels the next tick would evict
    pub fn evict_finished(&mut self) {
        let before = self.channels.len();
        self.channels.retain(|(_, channel)| !channel.is_evictable());
        self.metrics.channels_evicted += (before - self.channels.len()) as u64;
    }

    /// Drop every channel and release scratch memory
    pub fn clear(&mut self) {
        self.channels.clear();
        for buf in [
            &mut self.read_buf,
            &mut self.convert_buf,
            &mut self.effect_buf,
            &mut self.out_buf,
        ] {
            buf.release();
        }
    }

    /// Recompute category curves when a category volume changed
    fn update_adjusted_sound(&mut self) {
        let current = (self.config.sound_volume, self.config.ride_music_volume);
        if self.applied_volumes != Some(current) {
            self.sound_curve = volume_curve(current.0);
            self.music_curve = volume_curve(current.1);
            self.applied_volumes = Some(current);
            self.metrics.curve_updates += 1;
        }
    }

    /// Gain applied on top of a channel's own volume
    fn volume_adjust(&self, group: MixerGroup) -> f32 {
        let adjust = self.volume * self.config.master_gain();
        match group {
            MixerGroup::Sound => {
                let adjust = adjust * self.sound_curve;
                if self.config.title_sequence {
                    adjust.min(TITLE_SEQUENCE_SOUND_CAP)
                } else {
                    adjust
                }
            }
            MixerGroup::RideMusic => adjust * self.music_curve,
        }
    }

    /// Produce one device buffer.
    ///
    /// `dst` is filled completely; trailing bytes that do not form a whole
    /// frame are set to silence.
    pub fn mix(&mut self, dst: &mut [u8]) {
        let started = Instant::now();
        self.update_adjusted_sound();

        let encoding = self.format.encoding();
        let frame_bytes = self.format.bytes_per_frame();
        let len = dst.len() - dst.len() % frame_bytes;
        fill_silence(self.out_buf.bytes_mut(len), encoding);

        let mut index = 0;
        while index < self.channels.len() {
            let handle = self.channels[index].0;
            let group = self.channels[index].1.group();
            let audible = (group != MixerGroup::Sound || self.config.sound_enabled)
                && self.config.master_audible();

            if audible {
                let adjust = self.volume_adjust(group);
                match self.mix_channel(index, len, adjust) {
                    Ok(()) => self.metrics.channels_mixed += 1,
                    Err(e) => {
                        self.metrics.dsp_skips += 1;
                        trace!("Channel {} skipped this tick: {}", handle.id(), e);
                    }
                }
            }

            if self.channels[index].1.is_evictable() {
                self.channels.remove(index);
                self.metrics.channels_evicted += 1;
            } else {
                index += 1;
            }
        }

        dst[..len].copy_from_slice(self.out_buf.bytes_mut(len));
        fill_silence(&mut dst[len..], encoding);

        self.metrics
            .record_tick(len / frame_bytes, self.channels.len(), started.elapsed());
        self.metrics.maybe_log();
    }

    /// Read, convert, resample, pan, fade and mix one channel onto `out_buf`
    fn mix_channel(&mut self, index: usize, len: usize, adjust: f32) -> Result<(), TickError> {
        let Self {
            format,
            channels,
            read_buf,
            convert_buf,
            effect_buf,
            out_buf,
            ..
        } = self;
        let out_format = *format;
        let channel = &mut channels[index].1;

        let out_channels = out_format.channels() as usize;
        let frames = len / out_format.bytes_per_frame();
        let src_format = channel.source().format();
        let ratio =
            channel.rate() * src_format.sample_rate() as f64 / out_format.sample_rate() as f64;
        if ratio > MAX_STEP_RATIO {
            return Err(TickError::StepTooLarge);
        }
        let resampling = (ratio - 1.0).abs() > f64::EPSILON;

        let in_frames = if resampling {
            channel
                .resampler(out_channels, ratio)
                .input_frames_for(frames)
        } else {
            frames
        };

        let read_len = in_frames * src_format.bytes_per_frame();
        channel.read(read_buf.bytes_mut(read_len));

        let (buf, buf_len) = if src_format.same_layout(&out_format) {
            (read_buf, read_len)
        } else {
            let needed = convert::converted_len(&src_format, &out_format, read_len);
            let written = convert::convert_layout(
                &src_format,
                read_buf.bytes_mut(read_len),
                &out_format,
                convert_buf.bytes_mut(needed),
            )?;
            (convert_buf, written)
        };

        let (buf, buf_len) = if resampling {
            let resampler = channel.resampler(out_channels, ratio);
            match out_format.encoding() {
                SampleEncoding::U8 => {
                    resampler.process::<u8>(
                        buf.samples_mut(buf_len)?,
                        effect_buf.samples_mut(len)?,
                    )?
                }
                SampleEncoding::S16 => {
                    resampler.process::<i16>(
                        buf.samples_mut(buf_len)?,
                        effect_buf.samples_mut(len)?,
                    )?
                }
            };
            (effect_buf, len)
        } else {
            (buf, buf_len)
        };

        match out_format.encoding() {
            SampleEncoding::U8 => apply_effects::<u8>(
                channel,
                buf.samples_mut(buf_len)?,
                out_buf.samples_mut(len)?,
                out_channels,
                adjust,
            ),
            SampleEncoding::S16 => apply_effects::<i16>(
                channel,
                buf.samples_mut(buf_len)?,
                out_buf.samples_mut(len)?,
                out_channels,
                adjust,
            ),
        }

        channel.update_old_volume();
        Ok(())
    }
}

/// Pan, fade and mix a processed channel buffer onto `out`
fn apply_effects<S: Sample>(
    channel: &Channel,
    buf: &mut [S],
    out: &mut [S],
    out_channels: usize,
    adjust: f32,
) {
    let centre = (1.0, 1.0);
    let (old_gains, gains) = (channel.old_volume_gains(), channel.volume_gains());
    if out_channels == 2 && (gains != centre || old_gains != centre) {
        apply_pan(buf, old_gains, gains);
    }

    let start_volume = (channel.old_volume() as f32 * adjust) as i32;
    let end_volume = if channel.is_stopping() {
        0
    } else {
        (channel.volume() as f32 * adjust) as i32
    };

    let mut mix_volume = end_volume;
    if start_volume != end_volume {
        // The fade carries the gain
        mix_volume = MIXER_VOLUME_MAX;
        apply_fade(buf, out_channels, start_volume, end_volume);
    }

    mix_into(out, buf, mix_volume);
}
