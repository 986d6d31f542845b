//! Per-encoding sample kernels and aligned scratch storage
//!
//! DSP code is written once against [`Sample`] and instantiated for each
//! [`SampleEncoding`](crate::SampleEncoding). All arithmetic happens on a
//! centred `i32` at 16-bit scale so 8-bit and 16-bit streams share one path.

use bytemuck::Pod;

/// A PCM sample type the mixer can process.
pub trait Sample: Pod + Copy + Send + 'static {
    /// Value that encodes silence
    const SILENCE: Self;

    /// Centred value at 16-bit scale
    fn to_i32(self) -> i32;

    /// Convert a centred 16-bit scale value back, saturating at the type's range
    fn from_i32(value: i32) -> Self;
}

impl Sample for u8 {
    const SILENCE: Self = 0x80;

    #[inline]
    fn to_i32(self) -> i32 {
        (self as i32 - 128) << 8
    }

    #[inline]
    fn from_i32(value: i32) -> Self {
        ((value.clamp(i16::MIN as i32, i16::MAX as i32) >> 8) + 128) as u8
    }
}

impl Sample for i16 {
    const SILENCE: Self = 0;

    #[inline]
    fn to_i32(self) -> i32 {
        self as i32
    }

    #[inline]
    fn from_i32(value: i32) -> Self {
        value.clamp(i16::MIN as i32, i16::MAX as i32) as i16
    }
}

/// Growable byte buffer that can be viewed as any [`Sample`] slice.
///
/// Storage is `i16`-backed so the byte view is always aligned for 16-bit
/// samples. Capacity only grows; once sized for the device buffer the mix
/// tick performs no further allocation.
#[derive(Debug, Default)]
pub struct ScratchBuffer {
    data: Vec<i16>,
}

impl ScratchBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn reserve_bytes(&mut self, len: usize) {
        let words = len.div_ceil(2);
        if self.data.len() < words {
            self.data.resize(words, 0);
        }
    }

    /// First `len` bytes, growing the buffer if needed
    pub fn bytes_mut(&mut self, len: usize) -> &mut [u8] {
        self.reserve_bytes(len);
        &mut bytemuck::cast_slice_mut::<i16, u8>(&mut self.data)[..len]
    }

    /// First `len` bytes viewed as samples of type `S`
    ///
    /// Fails when `len` is not a whole number of samples.
    pub fn samples_mut<S: Sample>(
        &mut self,
        len: usize,
    ) -> Result<&mut [S], bytemuck::PodCastError> {
        let bytes = self.bytes_mut(len);
        bytemuck::try_cast_slice_mut::<u8, S>(bytes)
    }

    /// Bytes currently reserved
    pub fn capacity_bytes(&self) -> usize {
        self.data.len() * 2
    }

    /// Drop the backing storage
    pub fn release(&mut self) {
        self.data = Vec::new();
    }
}

/// Fill a byte buffer with silence for `encoding`.
pub fn fill_silence(dst: &mut [u8], encoding: crate::SampleEncoding) {
    dst.fill(encoding.silence_byte());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u8_centering() {
        assert_eq!(u8::SILENCE.to_i32(), 0);
        assert_eq!(255u8.to_i32(), 127 << 8);
        assert_eq!(0u8.to_i32(), -32768);
        assert_eq!(u8::from_i32(0), 0x80);
        assert_eq!(u8::from_i32(100_000), 255);
        assert_eq!(u8::from_i32(-100_000), 0);
    }

    #[test]
    fn test_i16_saturates() {
        assert_eq!(i16::from_i32(40_000), i16::MAX);
        assert_eq!(i16::from_i32(-40_000), i16::MIN);
        assert_eq!(i16::from_i32(1234), 1234);
    }

    #[test]
    fn test_scratch_grows_and_views() {
        let mut buf = ScratchBuffer::new();
        buf.bytes_mut(8).fill(0);
        assert_eq!(buf.capacity_bytes(), 8);

        let samples = buf.samples_mut::<i16>(8).unwrap();
        assert_eq!(samples.len(), 4);
        samples[1] = -2;

        let bytes = buf.bytes_mut(8);
        assert_eq!(&bytes[2..4], &(-2i16).to_ne_bytes());
    }

    #[test]
    fn test_scratch_odd_length_is_not_i16() {
        let mut buf = ScratchBuffer::new();
        assert!(buf.samples_mut::<i16>(3).is_err());
        assert_eq!(buf.samples_mut::<u8>(3).unwrap().len(), 3);
    }

    #[test]
    fn test_scratch_release() {
        let mut buf = ScratchBuffer::new();
        buf.bytes_mut(4096);
        buf.release();
        assert_eq!(buf.capacity_bytes(), 0);
    }
}
