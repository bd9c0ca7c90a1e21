//! Encoder port interfaces

use async_trait::async_trait;

use crate::domain::error::CaptureErrorKind;
use crate::domain::recording::AudioMimeType;

use super::capture::{AudioFrame, StreamFormat};

/// Receives encoded chunks in order
pub type ChunkHandler = Box<dyn FnMut(Vec<u8>) + Send>;

/// An open encoder bound to one capture stream.
#[async_trait]
pub trait AudioEncoder: Send {
    /// Encoding of the chunks this encoder emits
    fn mime_type(&self) -> AudioMimeType;

    /// Install the chunk handler. Chunks emitted before a handler is set are
    /// kept and delivered when it is installed.
    fn on_chunk(&mut self, handler: ChunkHandler);

    /// Feed captured PCM
    fn write(&mut self, frame: &AudioFrame) -> Result<(), CaptureErrorKind>;

    /// Flush everything still buffered through the chunk handler and close.
    /// May be slow; implementations should move heavy work off the runtime.
    async fn finalize(&mut self) -> Result<(), CaptureErrorKind>;

    /// Drop buffered data without emitting it. Idempotent.
    fn close(&mut self);
}

/// Port for opening encoders on granted streams
pub trait EncoderFactory: Send + Sync {
    fn open(&self, format: StreamFormat) -> Result<Box<dyn AudioEncoder>, CaptureErrorKind>;
}
