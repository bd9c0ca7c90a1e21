//! Fake capture device and encoder shared by the integration tests.
//!
//! Both count what they hand out and what gets released, so tests can
//! check that every acquired resource is let go exactly once.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Notify};

use viva_recorder::application::ports::{
    AudioEncoder, AudioFrame, CaptureConstraints, CaptureDevice, CaptureStream, ChunkHandler,
    EncoderFactory, FrameReceiver, StreamFormat,
};
use viva_recorder::application::SessionOptions;
use viva_recorder::domain::error::CaptureErrorKind;
use viva_recorder::domain::recording::AudioMimeType;

/// Payload every fake encoder emits on finalize
pub const FAKE_PAYLOAD: &[u8] = b"fake";

#[derive(Debug, Default)]
pub struct Counters {
    requests: AtomicUsize,
    releases: AtomicUsize,
    opens: AtomicUsize,
    closes: AtomicUsize,
}

impl Counters {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

pub struct FakeStream {
    counters: Arc<Counters>,
    frames: Option<FrameReceiver>,
    // Keeps the frame channel open for the life of the stream
    _tx: mpsc::UnboundedSender<Result<AudioFrame, CaptureErrorKind>>,
    released: bool,
}

impl CaptureStream for FakeStream {
    fn format(&self) -> StreamFormat {
        StreamFormat {
            sample_rate: 16000,
            channels: 1,
        }
    }

    fn take_frames(&mut self) -> Option<FrameReceiver> {
        self.frames.take()
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.counters.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn is_released(&self) -> bool {
        self.released
    }
}

/// Capture device double. Grants immediately unless gated or refusing.
pub struct FakeDevice {
    counters: Arc<Counters>,
    refusal: Option<CaptureErrorKind>,
    gate: Option<Arc<Notify>>,
    frame: Option<Vec<i16>>,
    failure: Option<CaptureErrorKind>,
}

impl FakeDevice {
    pub fn new(counters: &Arc<Counters>) -> Self {
        Self {
            counters: Arc::clone(counters),
            refusal: None,
            gate: None,
            frame: None,
            failure: None,
        }
    }

    /// Every request fails with `kind`
    pub fn refusing(mut self, kind: CaptureErrorKind) -> Self {
        self.refusal = Some(kind);
        self
    }

    /// Requests stay pending until `gate` is notified
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Each granted stream delivers `samples` once
    pub fn with_frame(mut self, samples: Vec<i16>) -> Self {
        self.frame = Some(samples);
        self
    }

    /// Each granted stream reports `kind` right after the grant
    pub fn failing_mid_capture(mut self, kind: CaptureErrorKind) -> Self {
        self.failure = Some(kind);
        self
    }
}

#[async_trait]
impl CaptureDevice for FakeDevice {
    async fn request_capture(
        &self,
        _constraints: &CaptureConstraints,
    ) -> Result<Box<dyn CaptureStream>, CaptureErrorKind> {
        self.counters.requests.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if let Some(kind) = &self.refusal {
            return Err(kind.clone());
        }

        let (tx, rx) = mpsc::unbounded_channel();
        if let Some(samples) = &self.frame {
            let _ = tx.send(Ok(AudioFrame {
                samples: samples.clone(),
                sample_rate: 16000,
                timestamp_ms: 0,
            }));
        }
        if let Some(kind) = &self.failure {
            let _ = tx.send(Err(kind.clone()));
        }

        Ok(Box::new(FakeStream {
            counters: Arc::clone(&self.counters),
            frames: Some(rx),
            _tx: tx,
            released: false,
        }))
    }

    fn name(&self) -> &str {
        "fake"
    }
}

pub struct FakeEncoder {
    counters: Arc<Counters>,
    handler: Option<ChunkHandler>,
    finalize_error: Option<CaptureErrorKind>,
    closed: bool,
}

#[async_trait]
impl AudioEncoder for FakeEncoder {
    fn mime_type(&self) -> AudioMimeType {
        AudioMimeType::Pcm
    }

    fn on_chunk(&mut self, handler: ChunkHandler) {
        self.handler = Some(handler);
    }

    fn write(&mut self, _frame: &AudioFrame) -> Result<(), CaptureErrorKind> {
        Ok(())
    }

    async fn finalize(&mut self) -> Result<(), CaptureErrorKind> {
        if let Some(kind) = &self.finalize_error {
            return Err(kind.clone());
        }
        if let Some(handler) = self.handler.as_mut() {
            handler(FAKE_PAYLOAD.to_vec());
        }
        Ok(())
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.counters.closes.fetch_add(1, Ordering::SeqCst);
        }
    }
}

pub struct FakeEncoders {
    counters: Arc<Counters>,
    finalize_error: Option<CaptureErrorKind>,
}

impl FakeEncoders {
    pub fn new(counters: &Arc<Counters>) -> Self {
        Self {
            counters: Arc::clone(counters),
            finalize_error: None,
        }
    }

    /// Every encoder fails with `kind` when finalized
    pub fn failing_finalize(mut self, kind: CaptureErrorKind) -> Self {
        self.finalize_error = Some(kind);
        self
    }
}

impl EncoderFactory for FakeEncoders {
    fn open(&self, _format: StreamFormat) -> Result<Box<dyn AudioEncoder>, CaptureErrorKind> {
        self.counters.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeEncoder {
            counters: Arc::clone(&self.counters),
            handler: None,
            finalize_error: self.finalize_error.clone(),
            closed: false,
        }))
    }
}

pub fn options() -> SessionOptions {
    SessionOptions::default()
}
