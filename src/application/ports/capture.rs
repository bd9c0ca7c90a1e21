//! Capture device port interfaces

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::error::CaptureErrorKind;

/// PCM frame delivered by a capture stream (mono, 16-bit)
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Milliseconds since the stream started
    pub timestamp_ms: u64,
}

/// Format of the frames a granted stream produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

/// What the caller would like from the input device.
/// Devices treat the sample rate as a hint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConstraints {
    pub preferred_sample_rate: u32,
    /// Input device name; `None` picks the host default
    pub device: Option<String>,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            preferred_sample_rate: 16000,
            device: None,
        }
    }
}

/// Frames from a live stream; an `Err` item reports a mid-capture failure.
pub type FrameReceiver = mpsc::UnboundedReceiver<Result<AudioFrame, CaptureErrorKind>>;

/// A granted capture device handle.
pub trait CaptureStream: Send {
    fn format(&self) -> StreamFormat;

    /// Hand out the frame receiver. Only the first call returns `Some`.
    fn take_frames(&mut self) -> Option<FrameReceiver>;

    /// Close the underlying device. Idempotent.
    fn release(&mut self);

    fn is_released(&self) -> bool;
}

/// Port for acquiring the host's audio input.
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    /// Ask the host for an input stream. May take arbitrarily long (the host
    /// could be showing a permission prompt).
    ///
    /// # Returns
    /// A live stream, or `PermissionDenied` / `DeviceNotFound` /
    /// `DeviceFailure` / `Unknown`
    async fn request_capture(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<Box<dyn CaptureStream>, CaptureErrorKind>;

    /// Backend name for logging
    fn name(&self) -> &str;
}
