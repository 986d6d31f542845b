//! Playback channel state
//!
//! A [`Channel`] is one playing instance of a source: it owns the read
//! cursor, the loop counter, the target and previous pan/volume used for
//! per-buffer interpolation, and an optional resampler.

use std::sync::Arc;

use crate::MIXER_VOLUME_MAX;
use crate::effects::pan_gains;
use crate::resample::Resampler;
use crate::sample::fill_silence;
use crate::source::{AudioSource, NullSource};

/// Fastest playback speed a channel accepts
pub const MAX_RATE: f64 = 16.0;

/// Stable identifier for a channel owned by the mixer.
///
/// Handles are never reused, so a handle to an evicted channel misses on lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelHandle(pub(crate) u64);

impl ChannelHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Volume category a channel belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MixerGroup {
    /// Sound effects (gated by the sound-enabled setting)
    #[default]
    Sound,
    /// Ride music
    RideMusic,
}

/// How many times a channel plays its source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Looping {
    /// Play once
    #[default]
    Once,
    /// Play `n` times in total (0 plays once)
    Times(u32),
    /// Repeat until stopped
    Infinite,
}

impl Looping {
    /// Restarts left after the first play; `None` means unbounded
    fn restarts(self) -> Option<u32> {
        match self {
            Looping::Once => Some(0),
            Looping::Times(n) => Some(n.saturating_sub(1)),
            Looping::Infinite => None,
        }
    }
}

/// One active playback instance
pub struct Channel {
    source: Arc<dyn AudioSource>,
    offset: u64,
    looping: Looping,
    restarts_left: Option<u32>,
    bytes_played: u64,

    rate: f64,
    resampler: Option<Resampler>,

    pan: f32,
    volume_l: f32,
    volume_r: f32,
    old_volume_l: f32,
    old_volume_r: f32,

    volume: i32,
    old_volume: i32,

    group: MixerGroup,
    stopping: bool,
    done: bool,
    delete_on_done: bool,
    delete_source_on_done: bool,
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("format", &self.source.format())
            .field("offset", &self.offset)
            .field("looping", &self.looping)
            .field("rate", &self.rate)
            .field("pan", &self.pan)
            .field("volume", &self.volume)
            .field("group", &self.group)
            .field("stopping", &self.stopping)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl Channel {
    /// Create an idle channel holding `source`; call [`play`](Self::play) to start it
    pub fn new(source: Arc<dyn AudioSource>) -> Self {
        Self {
            source,
            offset: 0,
            looping: Looping::Once,
            restarts_left: Some(0),
            bytes_played: 0,
            rate: 1.0,
            resampler: None,
            pan: 0.5,
            volume_l: 1.0,
            volume_r: 1.0,
            old_volume_l: 1.0,
            old_volume_r: 1.0,
            volume: MIXER_VOLUME_MAX,
            old_volume: 0,
            group: MixerGroup::Sound,
            stopping: false,
            done: true,
            delete_on_done: true,
            delete_source_on_done: false,
        }
    }

    /// Start `source` from the beginning. The first mixed buffer fades in from silence.
    pub fn play(&mut self, source: Arc<dyn AudioSource>, looping: Looping) {
        self.source = source;
        self.looping = looping;
        self.restarts_left = looping.restarts();
        self.offset = 0;
        self.bytes_played = 0;
        self.done = false;
        self.stopping = false;
        self.old_volume = 0;
        self.old_volume_l = self.volume_l;
        self.old_volume_r = self.volume_r;
        self.resampler = None;
    }

    pub fn source(&self) -> &Arc<dyn AudioSource> {
        &self.source
    }

    pub fn looping(&self) -> Looping {
        self.looping
    }

    /// Byte position of the cursor in the source
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Move the cursor to the frame containing `offset`; clears `done` if
    /// the new position is inside the source
    pub fn set_offset(&mut self, offset: u64) {
        let frame = self.source.format().bytes_per_frame() as u64;
        let offset = offset - offset % frame;
        self.offset = offset;
        if self.source.len_bytes().is_none_or(|len| offset < len) {
            self.done = false;
        }
    }

    /// Source bytes delivered since `play`, across all loops
    pub fn bytes_played(&self) -> u64 {
        self.bytes_played
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Set playback speed, capped at [`MAX_RATE`]; non-positive or non-finite values are ignored
    pub fn set_rate(&mut self, rate: f64) {
        if rate.is_finite() && rate > 0.0 {
            self.rate = rate.min(MAX_RATE);
        }
    }

    pub fn pan(&self) -> f32 {
        self.pan
    }

    /// Set the target pan; the previous gains are kept for interpolation
    pub fn set_pan(&mut self, pan: f32) {
        self.pan = pan.clamp(0.0, 1.0);
        (self.volume_l, self.volume_r) = pan_gains(self.pan);
    }

    pub fn volume_gains(&self) -> (f32, f32) {
        (self.volume_l, self.volume_r)
    }

    pub fn old_volume_gains(&self) -> (f32, f32) {
        (self.old_volume_l, self.old_volume_r)
    }

    pub fn volume(&self) -> i32 {
        self.volume
    }

    pub fn old_volume(&self) -> i32 {
        self.old_volume
    }

    /// Set the target volume (clamped to `0..=MIXER_VOLUME_MAX`)
    pub fn set_volume(&mut self, volume: i32) {
        self.volume = volume.clamp(0, MIXER_VOLUME_MAX);
    }

    pub fn group(&self) -> MixerGroup {
        self.group
    }

    pub fn set_group(&mut self, group: MixerGroup) {
        self.group = group;
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping
    }

    pub fn set_stopping(&mut self, stopping: bool) {
        self.stopping = stopping;
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn delete_on_done(&self) -> bool {
        self.delete_on_done
    }

    pub fn set_delete_on_done(&mut self, value: bool) {
        self.delete_on_done = value;
    }

    pub fn delete_source_on_done(&self) -> bool {
        self.delete_source_on_done
    }

    pub fn set_delete_source_on_done(&mut self, value: bool) {
        self.delete_source_on_done = value;
    }

    /// Whether the channel should leave the mixer's list
    pub fn is_evictable(&self) -> bool {
        (self.done && self.delete_on_done) || self.stopping
    }

    /// Resampler for `channels`-wide output at `ratio`, created on first use
    pub fn resampler(&mut self, channels: usize, ratio: f64) -> &mut Resampler {
        if self
            .resampler
            .as_ref()
            .is_some_and(|r| r.channels() != channels)
        {
            self.resampler = None;
        }
        let resampler = self
            .resampler
            .get_or_insert_with(|| Resampler::new(channels, ratio));
        resampler.set_ratio(ratio);
        resampler
    }

    pub fn has_resampler(&self) -> bool {
        self.resampler.is_some()
    }

    /// Drop the resampler state
    pub fn clear_resampler(&mut self) {
        self.resampler = None;
    }

    /// Snapshot target volume and pan as the interpolation start for the next buffer
    pub fn update_old_volume(&mut self) {
        self.old_volume = self.volume;
        self.old_volume_l = self.volume_l;
        self.old_volume_r = self.volume_r;
    }

    /// Fill `dst` from the source, honouring the loop count.
    ///
    /// Returns the number of source bytes written. Once the last loop ends the
    /// channel is marked done and the rest of `dst` is filled with silence.
    pub fn read(&mut self, dst: &mut [u8]) -> usize {
        let mut written = 0;
        while written < dst.len() && !self.done {
            let n = self.source.read(self.offset, &mut dst[written..]);
            written += n;
            self.offset += n as u64;
            self.bytes_played += n as u64;

            if written < dst.len() {
                // End of stream; an empty source can never make progress
                let empty = n == 0 && self.offset == 0;
                match &mut self.restarts_left {
                    _ if empty => self.done = true,
                    Some(0) => self.done = true,
                    Some(left) => {
                        *left -= 1;
                        self.offset = 0;
                    }
                    None => self.offset = 0,
                }
            }
        }

        fill_silence(&mut dst[written..], self.source.format().encoding());

        if self.done && self.delete_source_on_done && !self.source.is_null() {
            self.source = NullSource::shared(self.source.format());
        }

        written
    }
}
