//! Synthetic capture device
//!
//! Produces a sine tone on a tokio interval. Used for `record --synthetic`
//! and for exercising the full capture path without audio hardware.

use std::f32::consts::PI;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use tracing::debug;

use crate::application::ports::{
    AudioFrame, CaptureConstraints, CaptureDevice, CaptureStream, FrameReceiver, StreamFormat,
};
use crate::domain::error::CaptureErrorKind;

/// Tone generator standing in for a microphone
#[derive(Debug, Clone)]
pub struct SyntheticCaptureDevice {
    frequency_hz: f32,
    /// Peak amplitude in 0.0..=1.0
    amplitude: f32,
    frame_duration: StdDuration,
    grant_delay: StdDuration,
    refusal: Option<CaptureErrorKind>,
}

impl Default for SyntheticCaptureDevice {
    fn default() -> Self {
        Self {
            frequency_hz: 440.0,
            amplitude: 0.3,
            frame_duration: StdDuration::from_millis(20),
            grant_delay: StdDuration::ZERO,
            refusal: None,
        }
    }
}

impl SyntheticCaptureDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tone(mut self, frequency_hz: f32, amplitude: f32) -> Self {
        self.frequency_hz = frequency_hz;
        self.amplitude = amplitude.clamp(0.0, 1.0);
        self
    }

    /// Simulate a slow permission prompt
    pub fn with_grant_delay(mut self, delay: StdDuration) -> Self {
        self.grant_delay = delay;
        self
    }

    /// Refuse every request with `kind`
    pub fn refusing(mut self, kind: CaptureErrorKind) -> Self {
        self.refusal = Some(kind);
        self
    }
}

#[async_trait]
impl CaptureDevice for SyntheticCaptureDevice {
    async fn request_capture(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<Box<dyn CaptureStream>, CaptureErrorKind> {
        if !self.grant_delay.is_zero() {
            time::sleep(self.grant_delay).await;
        }
        if let Some(kind) = &self.refusal {
            return Err(kind.clone());
        }

        let sample_rate = constraints.preferred_sample_rate.max(1);
        let (tx, rx) = mpsc::unbounded_channel();
        let active = Arc::new(AtomicBool::new(true));

        let generator = ToneGenerator {
            frequency_hz: self.frequency_hz,
            amplitude: self.amplitude,
            sample_rate,
            position: 0,
        };
        tokio::spawn(generate(
            generator,
            self.frame_duration,
            tx,
            Arc::clone(&active),
        ));

        Ok(Box::new(SyntheticStream {
            format: StreamFormat {
                sample_rate,
                channels: 1,
            },
            frames: Some(rx),
            active,
        }))
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}

struct ToneGenerator {
    frequency_hz: f32,
    amplitude: f32,
    sample_rate: u32,
    position: u64,
}

impl ToneGenerator {
    fn next_frame(&mut self, frame_duration: StdDuration) -> AudioFrame {
        let count = (self.sample_rate as u128 * frame_duration.as_millis() / 1000) as usize;
        let timestamp_ms = self.position * 1000 / self.sample_rate as u64;
        let samples = (0..count)
            .map(|i| {
                let t = (self.position + i as u64) as f32 / self.sample_rate as f32;
                (f32::sin(2.0 * PI * self.frequency_hz * t) * self.amplitude * 32767.0) as i16
            })
            .collect();
        self.position += count as u64;
        AudioFrame {
            samples,
            sample_rate: self.sample_rate,
            timestamp_ms,
        }
    }
}

async fn generate(
    mut generator: ToneGenerator,
    frame_duration: StdDuration,
    frames: mpsc::UnboundedSender<Result<AudioFrame, CaptureErrorKind>>,
    active: Arc<AtomicBool>,
) {
    let mut ticker = time::interval(frame_duration);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        if !active.load(Ordering::SeqCst) {
            break;
        }
        if frames.send(Ok(generator.next_frame(frame_duration))).is_err() {
            break;
        }
    }
    debug!("Synthetic capture stopped");
}

struct SyntheticStream {
    format: StreamFormat,
    frames: Option<FrameReceiver>,
    active: Arc<AtomicBool>,
}

impl CaptureStream for SyntheticStream {
    fn format(&self) -> StreamFormat {
        self.format
    }

    fn take_frames(&mut self) -> Option<FrameReceiver> {
        self.frames.take()
    }

    fn release(&mut self) {
        self.active.store(false, Ordering::SeqCst);
    }

    fn is_released(&self) -> bool {
        !self.active.load(Ordering::SeqCst)
    }
}

impl Drop for SyntheticStream {
    fn drop(&mut self) {
        self.release();
    }
}
