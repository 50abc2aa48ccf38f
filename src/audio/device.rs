use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Host, SampleFormat, StreamConfig};
use log::{error, info, warn};
use std::sync::Arc;

use super::{AudioHost, OutputConfig, OutputStream, Renderer};
use crate::error::AudioError;

/// Mix scratch reserved per stream when the device reports no usable bound
const MAX_CALLBACK_FRAMES: usize = 8192;

/// Audio host backed by the system's default cpal host
pub struct CpalHost {
    host: Host,
    device: Device,
    device_name: String,
}

impl CpalHost {
    /// Open the preferred output device, falling back to the default device
    pub fn new(preferred_device: Option<&str>) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = Self::select_device_with_fallback(&host, preferred_device)?;
        let device_name = device
            .name()
            .map_err(|e| AudioError::InitializationFailed(format!("Failed to get device name: {}", e)))?;

        info!("Using audio output device '{}'", device_name);
        Ok(Self {
            host,
            device,
            device_name,
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Names of all output devices on this host
    pub fn list_devices(&self) -> Result<Vec<String>, AudioError> {
        let devices = self
            .host
            .output_devices()
            .map_err(|e| AudioError::InitializationFailed(format!("Failed to enumerate devices: {}", e)))?;

        Ok(devices.filter_map(|device| device.name().ok()).collect())
    }

    fn select_device_with_fallback(host: &Host, preferred: Option<&str>) -> Result<Device, AudioError> {
        if let Some(name) = preferred {
            match Self::find_device(host, name) {
                Ok(device) => return Ok(device),
                Err(e) => warn!("{}; falling back to the default output device", e),
            }
        }

        host.default_output_device()
            .ok_or_else(|| AudioError::InitializationFailed("No default output device available".to_string()))
    }

    fn find_device(host: &Host, name: &str) -> Result<Device, AudioError> {
        let mut devices = host
            .output_devices()
            .map_err(|e| AudioError::InitializationFailed(format!("Failed to enumerate devices: {}", e)))?;

        devices
            .find(|device| device.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| AudioError::DeviceNotFound {
                device: name.to_string(),
            })
    }

    fn build_stream<T>(
        &self,
        config: &StreamConfig,
        max_frames: usize,
        renderer: Arc<Renderer>,
    ) -> Result<cpal::Stream, AudioError>
    where
        T: cpal::SizedSample + cpal::FromSample<f32> + Send + 'static,
    {
        let data_renderer = Arc::clone(&renderer);
        let error_renderer = renderer;
        // Sized up front; the callback only grows it if the device exceeds its advertised maximum
        let mut mix: Vec<f32> = vec![0.0; max_frames * config.channels as usize];

        self.device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    if mix.len() < data.len() {
                        mix.resize(data.len(), 0.0);
                    }
                    let mix = &mut mix[..data.len()];
                    data_renderer.render(mix);

                    for (sample, value) in data.iter_mut().zip(mix.iter()) {
                        *sample = cpal::Sample::from_sample(*value);
                    }
                },
                move |err| match err {
                    cpal::StreamError::DeviceNotAvailable => {
                        error!("Audio output device disappeared; closing context");
                        error_renderer.close();
                    }
                    other => error!("Audio stream error: {}", other),
                },
                None,
            )
            .map_err(|e| AudioError::StreamError(format!("Failed to build output stream: {}", e)))
    }
}

impl AudioHost for CpalHost {
    fn output_config(&self) -> Result<OutputConfig, AudioError> {
        let config = self
            .device
            .default_output_config()
            .map_err(|e| AudioError::InitializationFailed(format!("Failed to get default config: {}", e)))?;

        Ok(OutputConfig {
            sample_rate: config.sample_rate().0,
            channels: config.channels(),
        })
    }

    fn open_output(&self, renderer: Arc<Renderer>) -> Result<Box<dyn OutputStream>, AudioError> {
        let supported = self
            .device
            .default_output_config()
            .map_err(|e| AudioError::InitializationFailed(format!("Failed to get default config: {}", e)))?;

        let config = StreamConfig {
            channels: renderer.channels(),
            sample_rate: cpal::SampleRate(renderer.sample_rate()),
            buffer_size: cpal::BufferSize::Default,
        };

        let max_frames = callback_frames(supported.buffer_size());

        let stream = match supported.sample_format() {
            SampleFormat::F32 => self.build_stream::<f32>(&config, max_frames, renderer)?,
            SampleFormat::I16 => self.build_stream::<i16>(&config, max_frames, renderer)?,
            SampleFormat::U16 => self.build_stream::<u16>(&config, max_frames, renderer)?,
            sample_format => {
                return Err(AudioError::UnsupportedFormat {
                    format: format!("{:?}", sample_format),
                })
            }
        };

        Ok(Box::new(CpalStream { stream }))
    }
}

struct CpalStream {
    stream: cpal::Stream,
}

impl OutputStream for CpalStream {
    fn play(&self) -> Result<(), AudioError> {
        self.stream
            .play()
            .map_err(|e| AudioError::StreamError(format!("Failed to start stream: {}", e)))
    }

    fn pause(&self) -> Result<(), AudioError> {
        self.stream
            .pause()
            .map_err(|e| AudioError::StreamError(format!("Failed to stop stream: {}", e)))
    }
}

/// Largest block the output callback is expected to request
fn callback_frames(size: &cpal::SupportedBufferSize) -> usize {
    match size {
        cpal::SupportedBufferSize::Range { max, .. } => (*max as usize).clamp(1, MAX_CALLBACK_FRAMES),
        cpal::SupportedBufferSize::Unknown => MAX_CALLBACK_FRAMES,
    }
}
