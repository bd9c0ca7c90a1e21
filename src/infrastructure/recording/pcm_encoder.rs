//! Raw PCM encoder
//!
//! Streams little-endian 16-bit mono samples as they arrive, one chunk per
//! frame, at the device sample rate.

use async_trait::async_trait;

use crate::application::ports::{
    AudioEncoder, AudioFrame, ChunkHandler, EncoderFactory, StreamFormat,
};
use crate::domain::error::CaptureErrorKind;
use crate::domain::recording::AudioMimeType;

use super::flac_encoder::EncodingError;

#[derive(Debug, Default, Clone, Copy)]
pub struct PcmEncoderFactory;

impl PcmEncoderFactory {
    pub fn new() -> Self {
        Self
    }
}

impl EncoderFactory for PcmEncoderFactory {
    fn open(&self, _format: StreamFormat) -> Result<Box<dyn AudioEncoder>, CaptureErrorKind> {
        Ok(Box::new(PcmEncoder::default()))
    }
}

#[derive(Default)]
pub struct PcmEncoder {
    handler: Option<ChunkHandler>,
    unsent: Vec<Vec<u8>>,
    closed: bool,
}

#[async_trait]
impl AudioEncoder for PcmEncoder {
    fn mime_type(&self) -> AudioMimeType {
        AudioMimeType::Pcm
    }

    fn on_chunk(&mut self, mut handler: ChunkHandler) {
        for chunk in self.unsent.drain(..) {
            handler(chunk);
        }
        self.handler = Some(handler);
    }

    fn write(&mut self, frame: &AudioFrame) -> Result<(), CaptureErrorKind> {
        if self.closed {
            return Err(EncodingError::Closed.into());
        }
        if frame.samples.is_empty() {
            return Ok(());
        }
        let chunk: Vec<u8> = frame.samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        match self.handler.as_mut() {
            Some(handler) => handler(chunk),
            None => self.unsent.push(chunk),
        }
        Ok(())
    }

    async fn finalize(&mut self) -> Result<(), CaptureErrorKind> {
        if self.closed {
            return Err(EncodingError::Closed.into());
        }
        self.closed = true;
        Ok(())
    }

    fn close(&mut self) {
        self.closed = true;
        self.unsent.clear();
    }
}
