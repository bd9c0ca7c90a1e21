//! Microphone capture using cpal
//!
//! The cpal stream lives on a dedicated thread because `cpal::Stream` is not
//! `Send`. Frames cross to the engine over an unbounded channel as mono i16
//! at the device rate; the encoder resamples.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, StreamConfig};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use crate::application::ports::{
    AudioFrame, CaptureConstraints, CaptureDevice, CaptureStream, FrameReceiver, StreamFormat,
};
use crate::domain::error::CaptureErrorKind;

type FrameSender = mpsc::UnboundedSender<Result<AudioFrame, CaptureErrorKind>>;

/// How often the capture thread checks whether it was released
const RELEASE_POLL: StdDuration = StdDuration::from_millis(50);

/// Capture device backed by the host's default (or named) audio input
#[derive(Debug, Default)]
pub struct CpalCaptureDevice;

impl CpalCaptureDevice {
    pub fn new() -> Self {
        Self
    }

    /// Names of the available input devices
    pub fn input_device_names() -> Vec<String> {
        let host = cpal::default_host();
        match host.input_devices() {
            Ok(devices) => devices.filter_map(|d| d.name().ok()).collect(),
            Err(e) => {
                debug!("Failed to enumerate input devices: {}", e);
                Vec::new()
            }
        }
    }

    fn input_device(name: Option<&str>) -> Result<cpal::Device, CaptureErrorKind> {
        let host = cpal::default_host();
        match name {
            None => host
                .default_input_device()
                .ok_or(CaptureErrorKind::DeviceNotFound),
            Some(name) => host
                .input_devices()
                .map_err(|e| CaptureErrorKind::DeviceFailure(e.to_string()))?
                .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                .ok_or(CaptureErrorKind::DeviceNotFound),
        }
    }

    /// Pick an i16/f32 config, preferring fewer channels and one that covers
    /// the preferred rate.
    fn input_config(
        device: &cpal::Device,
        preferred_rate: u32,
    ) -> Result<(StreamConfig, SampleFormat), CaptureErrorKind> {
        let supported = device
            .supported_input_configs()
            .map_err(|e| classify(&e.to_string()))?;

        let covers = |c: &cpal::SupportedStreamConfigRange| {
            c.min_sample_rate().0 <= preferred_rate && c.max_sample_rate().0 >= preferred_rate
        };

        let mut best: Option<cpal::SupportedStreamConfigRange> = None;
        for config in supported {
            if !matches!(config.sample_format(), SampleFormat::I16 | SampleFormat::F32) {
                continue;
            }
            let is_better = match &best {
                None => true,
                Some(current) => {
                    config.channels() < current.channels() || (covers(&config) && !covers(current))
                }
            };
            if is_better {
                best = Some(config);
            }
        }

        let range = best.ok_or_else(|| {
            CaptureErrorKind::DeviceFailure("no supported input configuration".to_string())
        })?;

        let sample_rate = if covers(&range) {
            SampleRate(preferred_rate)
        } else {
            range.min_sample_rate()
        };

        Ok((
            StreamConfig {
                channels: range.channels(),
                sample_rate,
                buffer_size: cpal::BufferSize::Default,
            },
            range.sample_format(),
        ))
    }

    /// Open the device, start the stream, and park until released. Runs on
    /// the capture thread.
    fn run_capture(
        constraints: CaptureConstraints,
        frames: FrameSender,
        active: Arc<AtomicBool>,
        ready: oneshot::Sender<Result<StreamFormat, CaptureErrorKind>>,
    ) {
        let opened = Self::input_device(constraints.device.as_deref()).and_then(|device| {
            let (config, sample_format) =
                Self::input_config(&device, constraints.preferred_sample_rate)?;
            let stream = build_stream(&device, &config, sample_format, frames, &active)?;
            stream
                .play()
                .map_err(|e| CaptureErrorKind::DeviceFailure(e.to_string()))?;
            let format = StreamFormat {
                sample_rate: config.sample_rate.0,
                channels: 1,
            };
            Ok((stream, format))
        });

        let stream = match opened {
            Ok((stream, format)) => {
                if ready.send(Ok(format)).is_err() {
                    // Requester went away before the grant
                    return;
                }
                stream
            }
            Err(kind) => {
                let _ = ready.send(Err(kind));
                return;
            }
        };

        while active.load(Ordering::SeqCst) {
            std::thread::sleep(RELEASE_POLL);
        }
        drop(stream);
        debug!("Capture thread exited");
    }
}

#[async_trait]
impl CaptureDevice for CpalCaptureDevice {
    async fn request_capture(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<Box<dyn CaptureStream>, CaptureErrorKind> {
        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = oneshot::channel();
        let active = Arc::new(AtomicBool::new(true));

        let thread_active = Arc::clone(&active);
        let constraints = constraints.clone();
        std::thread::Builder::new()
            .name("viva-capture".to_string())
            .spawn(move || Self::run_capture(constraints, frame_tx, thread_active, ready_tx))
            .map_err(|e| CaptureErrorKind::DeviceFailure(e.to_string()))?;

        let format = match ready_rx.await {
            Ok(Ok(format)) => format,
            Ok(Err(kind)) => return Err(kind),
            Err(_) => {
                return Err(CaptureErrorKind::Unknown(
                    "capture thread exited before opening the device".to_string(),
                ))
            }
        };
        info!("Opened input device at {} Hz", format.sample_rate);

        Ok(Box::new(CpalStream {
            format,
            frames: Some(frame_rx),
            active,
        }))
    }

    fn name(&self) -> &str {
        "cpal"
    }
}

/// Live cpal input; dropping it releases the device
pub struct CpalStream {
    format: StreamFormat,
    frames: Option<FrameReceiver>,
    active: Arc<AtomicBool>,
}

impl CaptureStream for CpalStream {
    fn format(&self) -> StreamFormat {
        self.format
    }

    fn take_frames(&mut self) -> Option<FrameReceiver> {
        self.frames.take()
    }

    fn release(&mut self) {
        if self.active.swap(false, Ordering::SeqCst) {
            debug!("Released input device");
        }
    }

    fn is_released(&self) -> bool {
        !self.active.load(Ordering::SeqCst)
    }
}

impl Drop for CpalStream {
    fn drop(&mut self) {
        self.release();
    }
}

fn build_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    sample_format: SampleFormat,
    frames: FrameSender,
    active: &Arc<AtomicBool>,
) -> Result<cpal::Stream, CaptureErrorKind> {
    let channels = config.channels;
    let sample_rate = config.sample_rate.0;
    let error_tx = frames.clone();
    let on_error = move |err: cpal::StreamError| {
        error!("Audio stream error: {}", err);
        let _ = error_tx.send(Err(CaptureErrorKind::DeviceFailure(err.to_string())));
    };

    let mut forwarder = FrameForwarder {
        frames,
        active: Arc::clone(active),
        channels,
        sample_rate,
        sent: 0,
    };

    let stream = match sample_format {
        SampleFormat::I16 => device.build_input_stream(
            config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| forwarder.forward(data),
            on_error,
            None,
        ),
        SampleFormat::F32 => device.build_input_stream(
            config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let samples: Vec<i16> = data.iter().map(|&s| (s * 32767.0) as i16).collect();
                forwarder.forward(&samples)
            },
            on_error,
            None,
        ),
        other => {
            return Err(CaptureErrorKind::DeviceFailure(format!(
                "unsupported sample format {:?}",
                other
            )))
        }
    };

    stream.map_err(|e| match e {
        cpal::BuildStreamError::DeviceNotAvailable => CaptureErrorKind::DeviceNotFound,
        other => classify(&other.to_string()),
    })
}

/// Converts callback buffers into mono frames for the engine
struct FrameForwarder {
    frames: FrameSender,
    active: Arc<AtomicBool>,
    channels: u16,
    sample_rate: u32,
    sent: u64,
}

impl FrameForwarder {
    fn forward(&mut self, data: &[i16]) {
        if !self.active.load(Ordering::SeqCst) {
            return;
        }
        let samples = to_mono(data, self.channels);
        let timestamp_ms = self.sent * 1000 / self.sample_rate.max(1) as u64;
        self.sent += samples.len() as u64;
        let _ = self.frames.send(Ok(AudioFrame {
            samples,
            sample_rate: self.sample_rate,
            timestamp_ms,
        }));
    }
}

/// Average interleaved channels down to mono
pub(crate) fn to_mono(samples: &[i16], channels: u16) -> Vec<i16> {
    if channels <= 1 {
        return samples.to_vec();
    }

    samples
        .chunks(channels as usize)
        .map(|chunk| {
            let sum: i32 = chunk.iter().map(|&s| s as i32).sum();
            (sum / chunk.len() as i32) as i16
        })
        .collect()
}

/// Map a backend error message onto the capture error taxonomy
fn classify(message: &str) -> CaptureErrorKind {
    let lower = message.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("not authorized")
    {
        CaptureErrorKind::PermissionDenied
    } else if lower.contains("no such device") || lower.contains("not found") {
        CaptureErrorKind::DeviceNotFound
    } else {
        CaptureErrorKind::DeviceFailure(message.to_string())
    }
}
