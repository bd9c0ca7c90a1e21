//! Recording value objects

mod artifact;
mod duration;
mod policy;

pub use artifact::{Artifact, ArtifactRef, AudioMimeType};
pub use duration::{Duration, DEFAULT_SPEAKING_SECS};
pub use policy::RecordingPolicy;
