//! Audio output using cpal
//!
//! The mixer renders 16-bit (or 8-bit) PCM with at most two channels. Devices
//! that take that layout get the callback buffer passed straight through;
//! anything else is rendered into a pre-allocated buffer and converted.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample};
use tracing::{debug, error, warn};

use super::{BackendError, OutputBackend, RenderFn};
use crate::format::{AudioFormat, SampleEncoding};

/// cpal output device
pub struct CpalBackend {
    host: cpal::Host,
    stream: Option<cpal::Stream>,
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CpalBackend {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
            stream: None,
        }
    }

    /// Names of the host's output devices
    pub fn output_device_names(&self) -> Vec<String> {
        match self.host.output_devices() {
            Ok(devices) => devices.filter_map(|d| d.name().ok()).collect(),
            Err(e) => {
                warn!("Failed to enumerate output devices: {}", e);
                Vec::new()
            }
        }
    }

    fn find_device(&self, device_name: Option<&str>) -> Result<cpal::Device, BackendError> {
        match device_name {
            Some(name) => self
                .host
                .output_devices()
                .map_err(|e| BackendError::Devices(e.to_string()))?
                .find(|d| d.name().is_ok_and(|n| n == name))
                .ok_or_else(|| BackendError::DeviceNotFound(name.to_string())),
            None => self
                .host
                .default_output_device()
                .ok_or(BackendError::NoDevice),
        }
    }
}

impl OutputBackend for CpalBackend {
    fn open(
        &mut self,
        device_name: Option<&str>,
        desired: AudioFormat,
        buffer_frames: u32,
        render: RenderFn,
    ) -> Result<AudioFormat, BackendError> {
        self.close();

        let device = self.find_device(device_name)?;
        let (config, sample_format) = choose_config(&device, desired, buffer_frames)?;
        let format = negotiated_format(sample_format, config.channels, config.sample_rate.0)?;

        let stream = build_stream(&device, &config, sample_format, format, render)?;
        // Some hosts start streams on creation
        if let Err(e) = stream.pause() {
            debug!("Audio stream could not be paused before start: {}", e);
        }

        debug!(
            "Audio device opened: {:?} {} ch @ {} Hz (mixing {:?})",
            sample_format, config.channels, config.sample_rate.0, format
        );
        self.stream = Some(stream);
        Ok(format)
    }

    fn resume(&mut self) -> Result<(), BackendError> {
        let stream = self.stream.as_ref().ok_or(BackendError::NotOpen)?;
        stream
            .play()
            .map_err(|e| BackendError::Play(e.to_string()))?;
        debug!("Audio stream started");
        Ok(())
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                debug!("Failed to pause audio stream: {}", e);
            }
            drop(stream);
            debug!("Audio stream closed");
        }
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }
}

/// Prefer a config matching `desired` exactly; otherwise take the device default.
fn choose_config(
    device: &cpal::Device,
    desired: AudioFormat,
    buffer_frames: u32,
) -> Result<(cpal::StreamConfig, cpal::SampleFormat), BackendError> {
    let wanted = match desired.encoding() {
        SampleEncoding::S16 => cpal::SampleFormat::I16,
        SampleEncoding::U8 => cpal::SampleFormat::U8,
    };
    let rate = cpal::SampleRate(desired.sample_rate());

    let exact = device.supported_output_configs().ok().and_then(|mut ranges| {
        ranges.find(|range| {
            range.sample_format() == wanted
                && range.channels() == desired.channels()
                && range.min_sample_rate() <= rate
                && rate <= range.max_sample_rate()
        })
    });

    let supported = match exact {
        Some(range) => range.with_sample_rate(rate),
        None => device
            .default_output_config()
            .map_err(|e| BackendError::Config(e.to_string()))?,
    };

    let mut config = supported.config();
    if let cpal::SupportedBufferSize::Range { min, max } = supported.buffer_size()
        && (*min..=*max).contains(&buffer_frames)
    {
        config.buffer_size = cpal::BufferSize::Fixed(buffer_frames);
    }

    Ok((config, supported.sample_format()))
}

/// Format the mixer renders for a device configuration.
///
/// 8-bit and 16-bit devices with one or two channels are rendered natively;
/// everything else is mixed as 16-bit with up to two channels.
pub(crate) fn negotiated_format(
    sample_format: cpal::SampleFormat,
    channels: u16,
    sample_rate: u32,
) -> Result<AudioFormat, BackendError> {
    let encoding = match sample_format {
        cpal::SampleFormat::U8 if channels <= 2 => SampleEncoding::U8,
        cpal::SampleFormat::I16
        | cpal::SampleFormat::U8
        | cpal::SampleFormat::U16
        | cpal::SampleFormat::I32
        | cpal::SampleFormat::F32 => SampleEncoding::S16,
        other => return Err(BackendError::UnsupportedFormat(format!("{:?}", other))),
    };

    AudioFormat::new(encoding, channels.clamp(1, 2), sample_rate).ok_or_else(|| {
        BackendError::UnsupportedFormat(format!("{} channels at {} Hz", channels, sample_rate))
    })
}

fn build_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    format: AudioFormat,
    mut render: RenderFn,
) -> Result<cpal::Stream, BackendError> {
    let native = config.channels == format.channels();
    let stream = match sample_format {
        cpal::SampleFormat::I16 if native => device.build_output_stream(
            config,
            move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                render(bytemuck::cast_slice_mut(data));
            },
            |err| error!("Audio stream error: {}", err),
            None,
        ),
        cpal::SampleFormat::U8 if native => device.build_output_stream(
            config,
            move |data: &mut [u8], _: &cpal::OutputCallbackInfo| render(data),
            |err| error!("Audio stream error: {}", err),
            None,
        ),
        cpal::SampleFormat::I16 => build_converting::<i16>(device, config, format, render),
        cpal::SampleFormat::U8 => build_converting::<u8>(device, config, format, render),
        cpal::SampleFormat::U16 => build_converting::<u16>(device, config, format, render),
        cpal::SampleFormat::I32 => build_converting::<i32>(device, config, format, render),
        cpal::SampleFormat::F32 => build_converting::<f32>(device, config, format, render),
        other => return Err(BackendError::UnsupportedFormat(format!("{:?}", other))),
    };
    stream.map_err(|e| BackendError::Build(e.to_string()))
}

/// Stream that renders 16-bit PCM into a temp buffer and converts it to `T`.
fn build_converting<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    format: AudioFormat,
    mut render: RenderFn,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample + FromSample<i16>,
{
    let device_channels = config.channels as usize;
    let mix_channels = format.channels() as usize;
    // Pre-allocate for the usual buffer size
    let mut temp_buffer: Vec<i16> = vec![0; 4096];

    device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            let frames = data.len() / device_channels;
            let needed = frames * mix_channels;
            if temp_buffer.len() < needed {
                temp_buffer.resize(needed, 0);
            }
            let mixed = &mut temp_buffer[..needed];
            render(bytemuck::cast_slice_mut(mixed));
            expand_frames(mixed, mix_channels, data, device_channels);
        },
        |err| error!("Audio stream error: {}", err),
        None,
    )
}

/// Convert mixed frames to device samples, duplicating mono and silencing extra channels.
pub(crate) fn expand_frames<T>(
    mixed: &[i16],
    mix_channels: usize,
    out: &mut [T],
    device_channels: usize,
)
where
    T: SizedSample + FromSample<i16>,
{
    let frames = mixed.chunks_exact(mix_channels);
    for (out_frame, frame) in out.chunks_exact_mut(device_channels).zip(frames) {
        for (c, sample) in out_frame.iter_mut().enumerate() {
            *sample = if c < mix_channels {
                T::from_sample(frame[c])
            } else if mix_channels == 1 && c == 1 {
                T::from_sample(frame[0])
            } else {
                T::EQUILIBRIUM
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negotiated_native_formats() {
        let f = negotiated_format(cpal::SampleFormat::I16, 2, 22_050).unwrap();
        assert_eq!(f, AudioFormat::TARGET);

        let f = negotiated_format(cpal::SampleFormat::U8, 1, 11_025).unwrap();
        assert_eq!(f.encoding(), SampleEncoding::U8);
        assert_eq!(f.channels(), 1);
    }

    #[test]
    fn test_negotiated_float_and_surround() {
        let f = negotiated_format(cpal::SampleFormat::F32, 6, 48_000).unwrap();
        assert_eq!(f.encoding(), SampleEncoding::S16);
        assert_eq!(f.channels(), 2);
        assert_eq!(f.sample_rate(), 48_000);

        let f = negotiated_format(cpal::SampleFormat::U8, 4, 44_100).unwrap();
        assert_eq!(f.encoding(), SampleEncoding::S16);
    }

    #[test]
    fn test_negotiated_rejects_zero_rate() {
        assert!(negotiated_format(cpal::SampleFormat::I16, 2, 0).is_err());
    }

    #[test]
    fn test_expand_stereo_to_f32() {
        let mixed = [i16::MAX, 0, i16::MIN, 16384];
        let mut out = [1.0f32; 4];
        expand_frames(&mixed, 2, &mut out, 2);
        assert!((out[0] - 1.0).abs() < 1e-3);
        assert_eq!(out[1], 0.0);
        assert_eq!(out[2], -1.0);
        assert!((out[3] - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_expand_to_surround_silences_extra_channels() {
        let mixed = [1000i16, -1000];
        let mut out = [7i16; 6];
        expand_frames(&mixed, 2, &mut out, 6);
        assert_eq!(out, [1000, -1000, 0, 0, 0, 0]);
    }

    #[test]
    fn test_expand_mono_duplicates() {
        let mixed = [1200i16, -300];
        let mut out = [0i16; 6];
        expand_frames(&mixed, 1, &mut out, 3);
        assert_eq!(out, [1200, 1200, 0, -300, -300, 0]);
    }

    #[test]
    fn test_unknown_device_name_fails() {
        let mut backend = CpalBackend::new();
        let render: RenderFn = Box::new(|dst| dst.fill(0));
        let result = backend.open(
            Some("park-audio-test-device-that-does-not-exist"),
            AudioFormat::TARGET,
            2048,
            render,
        );
        assert!(result.is_err());
        assert!(!backend.is_open());
    }
}
