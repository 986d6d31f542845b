//! PCM stream shape

/// Sample encoding of a PCM stream.
///
/// The set is closed: every DSP kernel dispatches over these variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleEncoding {
    /// Unsigned 8-bit, silence at 0x80
    U8,
    /// Signed 16-bit, native endian
    S16,
}

impl SampleEncoding {
    /// Size of one sample in bytes
    pub const fn bytes_per_sample(self) -> usize {
        match self {
            SampleEncoding::U8 => 1,
            SampleEncoding::S16 => 2,
        }
    }

    /// Byte value that encodes silence
    pub const fn silence_byte(self) -> u8 {
        match self {
            SampleEncoding::U8 => 0x80,
            SampleEncoding::S16 => 0,
        }
    }
}

/// Shape of a PCM stream: encoding, channel count and sample rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AudioFormat {
    encoding: SampleEncoding,
    channels: u16,
    sample_rate: u32,
}

impl AudioFormat {
    /// Format the mixer asks the device for: 22050 Hz, S16, stereo
    pub const TARGET: AudioFormat = AudioFormat {
        encoding: SampleEncoding::S16,
        channels: 2,
        sample_rate: 22_050,
    };

    /// Create a format. Returns `None` unless `channels` is 1 or 2 and the rate is non-zero.
    pub fn new(encoding: SampleEncoding, channels: u16, sample_rate: u32) -> Option<Self> {
        if !(1..=2).contains(&channels) || sample_rate == 0 {
            return None;
        }
        Some(Self {
            encoding,
            channels,
            sample_rate,
        })
    }

    pub fn encoding(&self) -> SampleEncoding {
        self.encoding
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn bytes_per_sample(&self) -> usize {
        self.encoding.bytes_per_sample()
    }

    /// Bytes in one frame (one sample per channel)
    pub fn bytes_per_frame(&self) -> usize {
        self.channels as usize * self.encoding.bytes_per_sample()
    }

    /// Same shape with a different sample rate
    pub fn with_sample_rate(&self, sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            ..*self
        }
    }

    /// Whether two formats share encoding and channel count (rate may differ)
    pub fn same_layout(&self, other: &AudioFormat) -> bool {
        self.encoding == other.encoding && self.channels == other.channels
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::TARGET
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_format() {
        let f = AudioFormat::TARGET;
        assert_eq!(f.sample_rate(), 22_050);
        assert_eq!(f.channels(), 2);
        assert_eq!(f.encoding(), SampleEncoding::S16);
        assert_eq!(f.bytes_per_frame(), 4);
    }

    #[test]
    fn test_new_rejects_bad_channel_counts() {
        assert!(AudioFormat::new(SampleEncoding::S16, 0, 22_050).is_none());
        assert!(AudioFormat::new(SampleEncoding::S16, 3, 22_050).is_none());
        assert!(AudioFormat::new(SampleEncoding::U8, 1, 0).is_none());
        let mono = AudioFormat::new(SampleEncoding::U8, 1, 11_025).unwrap();
        assert_eq!(mono.bytes_per_frame(), 1);
    }

    #[test]
    fn test_equality_and_layout() {
        let a = AudioFormat::new(SampleEncoding::S16, 2, 44_100).unwrap();
        let b = AudioFormat::TARGET;
        assert_ne!(a, b);
        assert!(a.same_layout(&b));
        assert_eq!(a.with_sample_rate(22_050), b);
    }

    #[test]
    fn test_silence_bytes() {
        assert_eq!(SampleEncoding::U8.silence_byte(), 0x80);
        assert_eq!(SampleEncoding::S16.silence_byte(), 0);
    }
}
