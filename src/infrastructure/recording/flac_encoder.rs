//! FLAC encoder for finished responses
//!
//! FLAC is lossless and still compresses speech to roughly 40% of WAV.
//!
//! Settings:
//! - 16kHz sample rate (speech-optimized)
//! - Mono channel
//! - 16-bit samples

use async_trait::async_trait;
use flacenc::bitsink::ByteSink;
use flacenc::component::BitRepr;
use flacenc::config;
use flacenc::error::Verify;
use flacenc::source::MemSource;
use rubato::{FftFixedIn, Resampler};
use tracing::{debug, warn};

use crate::application::ports::{
    AudioEncoder, AudioFrame, ChunkHandler, EncoderFactory, StreamFormat,
};
use crate::domain::error::CaptureErrorKind;
use crate::domain::recording::AudioMimeType;

/// Target sample rate for speech-optimized encoding
pub const TARGET_SAMPLE_RATE: u32 = 16000;

/// Bits per sample (16-bit audio)
const BITS_PER_SAMPLE: usize = 16;

/// Number of channels (mono)
const CHANNELS: usize = 1;

/// Encode PCM samples to FLAC format
///
/// Input: mono i16 samples at 16kHz
/// Output: FLAC bytes
pub fn encode_to_flac(pcm_samples: &[i16]) -> Result<Vec<u8>, EncodingError> {
    let samples_i32: Vec<i32> = pcm_samples.iter().map(|&s| s as i32).collect();

    let config = config::Encoder::default()
        .into_verified()
        .map_err(|(_, e)| EncodingError::Config(format!("{:?}", e)))?;

    let source = MemSource::from_samples(
        &samples_i32,
        CHANNELS,
        BITS_PER_SAMPLE,
        TARGET_SAMPLE_RATE as usize,
    );

    let flac_stream = flacenc::encode_with_fixed_block_size(&config, source, config.block_size)
        .map_err(|e| EncodingError::Encode(format!("{:?}", e)))?;

    let mut sink = ByteSink::new();
    flac_stream
        .write(&mut sink)
        .map_err(|e| EncodingError::Write(e.to_string()))?;

    Ok(sink.into_inner())
}

/// Resample mono audio to [`TARGET_SAMPLE_RATE`]
pub fn resample_to_target(samples: &[i16], source_rate: u32) -> Result<Vec<i16>, EncodingError> {
    if source_rate == TARGET_SAMPLE_RATE || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let samples_f32: Vec<f32> = samples.iter().map(|&s| s as f32 / 32768.0).collect();
    let ratio = TARGET_SAMPLE_RATE as f64 / source_rate as f64;
    let output_len = (samples_f32.len() as f64 * ratio).ceil() as usize;

    let mut resampler = FftFixedIn::<f32>::new(
        source_rate as usize,
        TARGET_SAMPLE_RATE as usize,
        1024, // Chunk size
        2,    // Sub-chunks
        1,    // Mono
    )
    .map_err(|e| EncodingError::Resample(e.to_string()))?;

    let mut output = Vec::with_capacity(output_len);
    let mut input_pos = 0;

    while input_pos < samples_f32.len() {
        let frames_needed = resampler.input_frames_next();
        let end_pos = (input_pos + frames_needed).min(samples_f32.len());
        let mut chunk = samples_f32[input_pos..end_pos].to_vec();
        // Pad the final partial chunk
        chunk.resize(frames_needed, 0.0);

        let resampled = resampler
            .process(&[chunk], None)
            .map_err(|e| EncodingError::Resample(e.to_string()))?;

        output.extend(resampled[0].iter().map(|&s| (s * 32767.0) as i16));
        input_pos = end_pos;
    }

    output.truncate(output_len);
    Ok(output)
}

/// FLAC encoding errors
#[derive(Debug, thiserror::Error)]
pub enum EncodingError {
    #[error("FLAC config error: {0}")]
    Config(String),

    #[error("FLAC encoding failed: {0}")]
    Encode(String),

    #[error("FLAC write failed: {0}")]
    Write(String),

    #[error("Resampling failed: {0}")]
    Resample(String),

    #[error("Encoder is closed")]
    Closed,
}

/// Encoder failures count as device failures of the running capture
impl From<EncodingError> for CaptureErrorKind {
    fn from(e: EncodingError) -> Self {
        CaptureErrorKind::DeviceFailure(e.to_string())
    }
}

/// Opens a [`FlacEncoder`] per stream
#[derive(Debug, Default, Clone, Copy)]
pub struct FlacEncoderFactory;

impl FlacEncoderFactory {
    pub fn new() -> Self {
        Self
    }
}

impl EncoderFactory for FlacEncoderFactory {
    fn open(&self, format: StreamFormat) -> Result<Box<dyn AudioEncoder>, CaptureErrorKind> {
        if format.sample_rate == 0 {
            return Err(CaptureErrorKind::DeviceFailure(
                "stream reported a zero sample rate".to_string(),
            ));
        }
        Ok(Box::new(FlacEncoder::new(format)))
    }
}

/// Buffers PCM for one capture and encodes it when finalized.
///
/// FLAC's stream header carries the total sample count, so the payload is
/// emitted as a single chunk.
pub struct FlacEncoder {
    format: StreamFormat,
    samples: Vec<i16>,
    handler: Option<ChunkHandler>,
    unsent: Vec<Vec<u8>>,
    closed: bool,
}

impl FlacEncoder {
    pub fn new(format: StreamFormat) -> Self {
        Self {
            format,
            samples: Vec::new(),
            handler: None,
            unsent: Vec::new(),
            closed: false,
        }
    }

    fn emit(&mut self, chunk: Vec<u8>) {
        match self.handler.as_mut() {
            Some(handler) => handler(chunk),
            None => self.unsent.push(chunk),
        }
    }
}

#[async_trait]
impl AudioEncoder for FlacEncoder {
    fn mime_type(&self) -> AudioMimeType {
        AudioMimeType::Flac
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
        self.samples.extend_from_slice(&frame.samples);
        Ok(())
    }

    async fn finalize(&mut self) -> Result<(), CaptureErrorKind> {
        if self.closed {
            return Err(EncodingError::Closed.into());
        }
        self.closed = true;

        let samples = std::mem::take(&mut self.samples);
        if samples.is_empty() {
            warn!("No audio captured; producing an empty recording");
            return Ok(());
        }

        let source_rate = self.format.sample_rate;
        debug!("Encoding {} samples at {} Hz", samples.len(), source_rate);
        let encoded = tokio::task::spawn_blocking(move || {
            let resampled = resample_to_target(&samples, source_rate)?;
            encode_to_flac(&resampled)
        })
        .await
        .map_err(|e| CaptureErrorKind::DeviceFailure(format!("encode task failed: {}", e)))??;

        self.emit(encoded);
        Ok(())
    }

    fn close(&mut self) {
        self.closed = true;
        self.samples = Vec::new();
        self.unsent.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn sine(len: usize, rate: u32) -> Vec<i16> {
        (0..len)
            .map(|i| {
                let t = i as f32 / rate as f32;
                (f32::sin(2.0 * std::f32::consts::PI * 440.0 * t) * 16000.0) as i16
            })
            .collect()
    }

    fn frame(samples: Vec<i16>, sample_rate: u32) -> AudioFrame {
        AudioFrame {
            samples,
            sample_rate,
            timestamp_ms: 0,
        }
    }

    #[test]
    fn encode_silence() {
        let silence = vec![0i16; TARGET_SAMPLE_RATE as usize];
        let flac_data = encode_to_flac(&silence).unwrap();
        assert!(flac_data.len() > 50);
        // FLAC magic number: "fLaC"
        assert_eq!(&flac_data[0..4], b"fLaC");
    }

    #[test]
    fn encode_with_signal_compresses() {
        let samples = sine(TARGET_SAMPLE_RATE as usize, TARGET_SAMPLE_RATE);
        let flac_data = encode_to_flac(&samples).unwrap();
        assert!(flac_data.len() < samples.len() * 2);
    }

    #[test]
    fn resample_passthrough_at_target_rate() {
        let samples = vec![1i16, 2, 3];
        assert_eq!(resample_to_target(&samples, TARGET_SAMPLE_RATE).unwrap(), samples);
    }

    #[test]
    fn resample_from_48k_shrinks_by_three() {
        let samples = sine(48000, 48000);
        let resampled = resample_to_target(&samples, 48000).unwrap();
        assert!(resampled.len() <= 16000 && resampled.len() > 15000);
    }

    #[tokio::test]
    async fn finalize_emits_one_flac_chunk() {
        let mut encoder = FlacEncoderFactory::new()
            .open(StreamFormat {
                sample_rate: 48000,
                channels: 1,
            })
            .unwrap();

        let chunks = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&chunks);
        encoder.on_chunk(Box::new(move |chunk| sink.lock().unwrap().push(chunk)));

        encoder.write(&frame(sine(24000, 48000), 48000)).unwrap();
        encoder.write(&frame(sine(24000, 48000), 48000)).unwrap();
        encoder.finalize().await.unwrap();

        let chunks = chunks.lock().unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(&chunks[0][0..4], b"fLaC");
        assert_eq!(encoder.mime_type(), AudioMimeType::Flac);
    }

    #[tokio::test]
    async fn closed_encoder_rejects_input() {
        let mut encoder = FlacEncoder::new(StreamFormat {
            sample_rate: 16000,
            channels: 1,
        });
        encoder.close();
        encoder.close();
        assert!(encoder.write(&frame(vec![0; 10], 16000)).is_err());
        assert!(matches!(
            encoder.finalize().await,
            Err(CaptureErrorKind::DeviceFailure(_))
        ));
    }

    #[test]
    fn encoding_errors_are_device_failures() {
        let kind = CaptureErrorKind::from(EncodingError::Encode("boom".to_string()));
        assert_eq!(
            kind,
            CaptureErrorKind::DeviceFailure("FLAC encoding failed: boom".to_string())
        );
    }

    #[tokio::test]
    async fn empty_recording_emits_nothing() {
        let mut encoder = FlacEncoder::new(StreamFormat {
            sample_rate: 16000,
            channels: 1,
        });
        encoder.finalize().await.unwrap();
        assert!(encoder.unsent.is_empty());
    }

    #[test]
    fn zero_rate_stream_is_rejected() {
        let result = FlacEncoderFactory::new().open(StreamFormat {
            sample_rate: 0,
            channels: 1,
        });
        assert!(result.is_err());
    }
}
