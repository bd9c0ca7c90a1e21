//! Recording infrastructure module
//!
//! Capture devices (cpal microphone, synthetic tone) and encoders
//! (FLAC for finished responses, raw PCM for streaming).

mod cpal_device;
mod flac_encoder;
mod pcm_encoder;
mod synthetic;

pub use cpal_device::{CpalCaptureDevice, CpalStream};
pub use flac_encoder::{
    encode_to_flac, resample_to_target, EncodingError, FlacEncoder, FlacEncoderFactory,
    TARGET_SAMPLE_RATE,
};
pub use pcm_encoder::{PcmEncoder, PcmEncoderFactory};
pub use synthetic::SyntheticCaptureDevice;
