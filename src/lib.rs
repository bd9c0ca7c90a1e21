//! VivaRecorder - timed spoken-response capture
//!
//! This crate records one spoken response per question from the microphone,
//! against an optional deadline and an optional preparation countdown, and
//! hands back the finished audio as an immutable artifact.
//!
//! # Architecture
//!
//! The crate follows hexagonal (ports & adapters) architecture:
//!
//! - **Domain**: Capture and phase state machines, value objects, and errors
//! - **Application**: The capture engine, phased session, and port interfaces (traits)
//! - **Infrastructure**: Adapter implementations (cpal, FLAC, synthetic tone, XDG config)
//! - **CLI**: Command-line interface, argument parsing, and interrupt handling

pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
