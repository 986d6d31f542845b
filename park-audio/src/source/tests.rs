use super::*;

use byteorder::{LittleEndian, WriteBytesExt};

fn s16_stereo() -> AudioFormat {
    AudioFormat::TARGET
}

fn u8_mono(rate: u32) -> AudioFormat {
    AudioFormat::new(SampleEncoding::U8, 1, rate).unwrap()
}

fn as_i16(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|b| i16::from_ne_bytes([b[0], b[1]]))
        .collect()
}

// ===== Null source =====

#[test]
fn test_null_source_fills_requested_length() {
    for len in [0usize, 1, 7, 4096] {
        let null = NullSource::new(s16_stereo());
        let mut buf = vec![0xAAu8; len];
        assert_eq!(null.read(12345, &mut buf), len);
        assert!(buf.iter().all(|&b| b == 0));
    }
}

#[test]
fn test_null_source_u8_silence() {
    let null = NullSource::new(u8_mono(22_050));
    let mut buf = [0u8; 16];
    assert_eq!(null.read(0, &mut buf), 16);
    assert!(buf.iter().all(|&b| b == 0x80));
    assert!(null.is_null());
    assert_eq!(null.len_bytes(), None);
}

// ===== Memory source =====

#[test]
fn test_memory_source_short_read_signals_end() {
    let source = MemorySource::new(u8_mono(22_050), vec![1, 2, 3, 4, 5]);
    let mut buf = [0u8; 4];
    assert_eq!(source.read(0, &mut buf), 4);
    assert_eq!(buf, [1, 2, 3, 4]);
    assert_eq!(source.read(4, &mut buf), 1);
    assert_eq!(buf[0], 5);
    assert_eq!(source.read(5, &mut buf), 0);
    assert_eq!(source.read(100, &mut buf), 0);
}

#[test]
fn test_memory_source_drops_partial_frame() {
    let source = MemorySource::new(s16_stereo(), vec![0; 10]);
    assert_eq!(source.len_bytes(), Some(8));
    assert_eq!(source.frames(), 2);
}

#[test]
fn test_convert_to_target_layout_and_rate() {
    let source = MemorySource::new(u8_mono(11_025), vec![0x80, 0xC0, 0x80, 0x40]);
    let converted = source.convert_to(&AudioFormat::TARGET).unwrap();
    assert_eq!(converted.format(), AudioFormat::TARGET);
    // Doubling the rate doubles the frame count
    assert_eq!(converted.frames(), 8);
}

#[test]
fn test_convert_to_same_format_is_identity() {
    let source = MemorySource::from_i16(s16_stereo(), &[1, 2, 3, 4]);
    let converted = source.clone().convert_to(&s16_stereo()).unwrap();
    assert_eq!(converted, source);
}

// ===== WAV =====

fn write_wav(path: &Path, channels: u16, rate: u32, samples: &[i16]) {
    let spec = hound::WavSpec {
        channels,
        sample_rate: rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for &s in samples {
        writer.write_sample(s).unwrap();
    }
    writer.finalize().unwrap();
}

#[test]
fn test_load_wav_16bit() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tone.wav");
    write_wav(&path, 2, 22_050, &[100, -100, 200, -200]);

    let source = load_wav(&path).unwrap();
    assert_eq!(source.format(), AudioFormat::TARGET);
    assert_eq!(source.frames(), 2);
    assert_eq!(as_i16(source.data()), vec![100, -100, 200, -200]);
}

#[test]
fn test_load_wav_8bit_stays_unsigned() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("click.wav");
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 11_025,
        bits_per_sample: 8,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for s in [0i8, 64, -64] {
        writer.write_sample(s).unwrap();
    }
    writer.finalize().unwrap();

    let source = load_wav(&path).unwrap();
    assert_eq!(source.format().encoding(), SampleEncoding::U8);
    assert_eq!(source.data(), &[0x80, 0xC0, 0x40]);
}

#[test]
fn test_load_wav_rejects_many_channels() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("surround.wav");
    write_wav(&path, 4, 22_050, &[0; 8]);
    assert!(matches!(
        load_wav(&path),
        Err(SourceError::UnsupportedWav { channels: 4, .. })
    ));
}

#[test]
fn test_create_memory_from_wav_converts() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mono.wav");
    write_wav(&path, 1, 22_050, &[500, 600]);

    let source = create_memory_from_wav(&path, &AudioFormat::TARGET);
    assert!(!source.is_null());
    assert_eq!(source.format(), AudioFormat::TARGET);

    let mut buf = [0u8; 8];
    assert_eq!(source.read(0, &mut buf), 8);
    assert_eq!(as_i16(&buf), vec![500, 500, 600, 600]);
}

#[test]
fn test_create_memory_from_missing_wav_is_null() {
    let source = create_memory_from_wav(Path::new("/nonexistent/ride.wav"), &AudioFormat::TARGET);
    assert!(source.is_null());
    assert_eq!(source.format(), AudioFormat::TARGET);
}

#[test]
fn test_decode_wav_garbage_is_error() {
    assert!(decode_wav(&b"not a wav file"[..]).is_err());
}

// ===== Sound bank =====

/// Build a bank from (channels, rate, bits, pcm) entries
pub(crate) fn build_bank(entries: &[(u16, u32, u16, Vec<u8>)]) -> Vec<u8> {
    let mut offsets = Vec::new();
    let mut body = Vec::new();
    let table_end = 4 + 4 * entries.len();

    for (channels, rate, bits, pcm) in entries {
        offsets.push((table_end + body.len()) as u32);
        let block_align = channels * bits / 8;
        body.write_u32::<LittleEndian>(pcm.len() as u32).unwrap();
        body.write_u16::<LittleEndian>(1).unwrap();
        body.write_u16::<LittleEndian>(*channels).unwrap();
        body.write_u32::<LittleEndian>(*rate).unwrap();
        body.write_u32::<LittleEndian>(rate * block_align as u32).unwrap();
        body.write_u16::<LittleEndian>(block_align).unwrap();
        body.write_u16::<LittleEndian>(*bits).unwrap();
        body.write_u16::<LittleEndian>(0).unwrap();
        body.extend_from_slice(pcm);
    }

    let mut out = Vec::new();
    out.write_u32::<LittleEndian>(entries.len() as u32).unwrap();
    for offset in offsets {
        out.write_u32::<LittleEndian>(offset).unwrap();
    }
    out.extend(body);
    out
}

#[test]
fn test_bank_entries() {
    let pcm16: Vec<u8> = [1000i16, -1000].iter().flat_map(|s| s.to_le_bytes()).collect();
    let bank = SoundBank::from_bytes(build_bank(&[
        (1, 22_050, 16, pcm16),
        (1, 11_025, 8, vec![0x80, 0xFF, 0x00]),
    ]))
    .unwrap();
    assert_eq!(bank.len(), 2);

    let first = bank.load(0).unwrap();
    assert_eq!(first.format(), AudioFormat::new(SampleEncoding::S16, 1, 22_050).unwrap());
    assert_eq!(as_i16(first.data()), vec![1000, -1000]);

    let second = bank.load(1).unwrap();
    assert_eq!(second.format(), u8_mono(11_025));
    assert_eq!(second.data(), &[0x80, 0xFF, 0x00]);
}

#[test]
fn test_bank_index_out_of_range() {
    let bank = SoundBank::from_bytes(build_bank(&[(1, 22_050, 8, vec![0x80])])).unwrap();
    assert!(matches!(
        bank.load(5),
        Err(SourceError::BankIndexOutOfRange { index: 5, count: 1 })
    ));
}

#[test]
fn test_bank_truncated_pcm() {
    let mut bytes = build_bank(&[(1, 22_050, 8, vec![0x80; 16])]);
    bytes.truncate(bytes.len() - 4);
    let bank = SoundBank::from_bytes(bytes).unwrap();
    assert!(matches!(bank.load(0), Err(SourceError::InvalidFormat(_))));
}

#[test]
fn test_bank_truncated_table() {
    let mut bytes = Vec::new();
    bytes.write_u32::<LittleEndian>(1000).unwrap();
    assert!(SoundBank::from_bytes(bytes).is_err());
    assert!(SoundBank::from_bytes(vec![1, 2]).is_err());
}

#[test]
fn test_create_memory_from_bank_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("css1.dat");
    std::fs::write(&path, build_bank(&[(1, 22_050, 8, vec![0x80, 0x90])])).unwrap();

    let source = create_memory_from_bank(&path, 0, &AudioFormat::TARGET);
    assert!(!source.is_null());
    assert_eq!(source.len_bytes(), Some(8));

    let missing = create_memory_from_bank(&path, 3, &AudioFormat::TARGET);
    assert!(missing.is_null());
}
