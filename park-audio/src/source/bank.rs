//! Sound bank container (`css1.dat` layout)
//!
//! Little-endian. A `u32` entry count is followed by one `u32` absolute
//! offset per entry. Each entry starts with a `u32` PCM length, then an
//! 18-byte WAVEFORMATEX header, then the PCM bytes.

use std::io::{self, Cursor, Read};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};

use super::{MemorySource, SourceError};
use crate::format::{AudioFormat, SampleEncoding};

/// Size of the WAVEFORMATEX header that precedes each entry's PCM
const WAVEFORMATEX_SIZE: usize = 18;

/// Location and format of one bank entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoundBankEntry {
    pub format: AudioFormat,
    pub pcm_offset: usize,
    pub pcm_len: usize,
}

/// A parsed sound bank held in memory
#[derive(Debug, Clone)]
pub struct SoundBank {
    data: Vec<u8>,
    offsets: Vec<u32>,
}

impl SoundBank {
    /// Read and index a bank file
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        Self::from_bytes(std::fs::read(path)?)
    }

    /// Index a bank already in memory
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, SourceError> {
        let mut cursor = Cursor::new(data.as_slice());
        let count = cursor.read_u32::<LittleEndian>()? as usize;
        if count.saturating_mul(4) > data.len() - 4 {
            return Err(SourceError::InvalidFormat(format!(
                "offset table for {} entries exceeds {} bytes",
                count,
                data.len()
            )));
        }

        let offsets = (0..count)
            .map(|_| cursor.read_u32::<LittleEndian>())
            .collect::<io::Result<Vec<_>>>()?;

        Ok(Self { data, offsets })
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Parse the header of entry `index`
    pub fn entry(&self, index: usize) -> Result<SoundBankEntry, SourceError> {
        let offset = *self
            .offsets
            .get(index)
            .ok_or(SourceError::BankIndexOutOfRange {
                index,
                count: self.offsets.len(),
            })? as usize;

        let mut reader = self
            .data
            .get(offset..)
            .ok_or_else(|| {
                SourceError::InvalidFormat(format!("entry {} offset {} past end", index, offset))
            })?;

        let pcm_len = reader.read_u32::<LittleEndian>()? as usize;
        let mut header = [0u8; WAVEFORMATEX_SIZE];
        reader.read_exact(&mut header)?;

        let mut header = Cursor::new(&header[..]);
        let _format_tag = header.read_u16::<LittleEndian>()?;
        let channels = header.read_u16::<LittleEndian>()?;
        let sample_rate = header.read_u32::<LittleEndian>()?;
        let _avg_bytes_per_sec = header.read_u32::<LittleEndian>()?;
        let _block_align = header.read_u16::<LittleEndian>()?;
        let bits = header.read_u16::<LittleEndian>()?;

        let encoding = if bits == 8 {
            SampleEncoding::U8
        } else {
            SampleEncoding::S16
        };
        let format = AudioFormat::new(encoding, channels, sample_rate).ok_or_else(|| {
            SourceError::InvalidFormat(format!(
                "entry {}: {} channels at {} Hz",
                index, channels, sample_rate
            ))
        })?;

        let pcm_offset = offset + 4 + WAVEFORMATEX_SIZE;
        if pcm_offset + pcm_len > self.data.len() {
            return Err(SourceError::InvalidFormat(format!(
                "entry {}: {} PCM bytes at {} exceed bank size {}",
                index,
                pcm_len,
                pcm_offset,
                self.data.len()
            )));
        }

        Ok(SoundBankEntry {
            format,
            pcm_offset,
            pcm_len,
        })
    }

    /// Decode entry `index` into native-endian PCM
    pub fn load(&self, index: usize) -> Result<MemorySource, SourceError> {
        let entry = self.entry(index)?;
        let pcm = &self.data[entry.pcm_offset..entry.pcm_offset + entry.pcm_len];

        let data = match entry.format.encoding() {
            SampleEncoding::U8 => pcm.to_vec(),
            SampleEncoding::S16 => pcm
                .chunks_exact(2)
                .flat_map(|b| i16::from_le_bytes([b[0], b[1]]).to_ne_bytes())
                .collect(),
        };

        Ok(MemorySource::new(entry.format, data))
    }
}
