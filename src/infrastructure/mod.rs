//! Infrastructure layer - Adapter implementations
//!
//! Contains concrete implementations of the port interfaces:
//! audio input via cpal, FLAC/PCM encoders, and XDG config storage.

pub mod config;
pub mod recording;

// Re-export adapters
pub use config::XdgConfigStore;
pub use recording::{
    CpalCaptureDevice, FlacEncoderFactory, PcmEncoderFactory, SyntheticCaptureDevice,
};
