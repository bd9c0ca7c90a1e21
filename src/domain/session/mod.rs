//! Session entities: the capture state machine and its phase wrapper

mod capture;
mod phase;

pub use capture::{CaptureSession, CaptureState, ElapsedUpdate, InvalidStateTransition};
pub use phase::{Phase, PhaseTracker};
