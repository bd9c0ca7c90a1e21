//! Application layer
//!
//! Ports (traits) for external systems and the session components that
//! drive them.

pub mod analyser;
pub mod capture_engine;
pub mod phased_session;
pub mod ports;
pub mod question_registry;

pub use analyser::{AmplitudeTap, Analyser};
pub use capture_engine::{CaptureEngine, SessionEvent, SessionOptions, SessionSnapshot};
pub use phased_session::{PhaseEvent, PhaseSnapshot, PhasedSession};
pub use question_registry::QuestionSessions;
