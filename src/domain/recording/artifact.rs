//! Finished audio artifact value object

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

/// Encodings an artifact may carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AudioMimeType {
    #[default]
    Flac,
    /// Raw little-endian 16-bit mono PCM
    Pcm,
}

impl AudioMimeType {
    /// Get the MIME type string
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Flac => "audio/flac",
            Self::Pcm => "audio/L16",
        }
    }

    /// Get the file extension
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Flac => "flac",
            Self::Pcm => "pcm",
        }
    }
}

impl fmt::Display for AudioMimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Resolvable reference to a finished artifact (`artifact:<uuid>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArtifactRef(Uuid);

impl ArtifactRef {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn id(&self) -> Uuid {
        self.0
    }
}

impl Default for ArtifactRef {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "artifact:{}", self.0)
    }
}

/// The finished, immutable audio payload of one capture session.
///
/// Cloning is cheap: the bytes are shared.
#[derive(Debug, Clone)]
pub struct Artifact {
    reference: ArtifactRef,
    data: Arc<[u8]>,
    mime_type: AudioMimeType,
    recorded_secs: u64,
}

impl Artifact {
    /// Assemble an artifact from encoder output
    pub fn new(data: Vec<u8>, mime_type: AudioMimeType, recorded_secs: u64) -> Self {
        Self {
            reference: ArtifactRef::new(),
            data: data.into(),
            mime_type,
            recorded_secs,
        }
    }

    /// Assemble from the ordered chunks an encoder emitted
    pub fn from_chunks(chunks: Vec<Vec<u8>>, mime_type: AudioMimeType, recorded_secs: u64) -> Self {
        Self::new(chunks.concat(), mime_type, recorded_secs)
    }

    pub fn reference(&self) -> ArtifactRef {
        self.reference
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn mime_type(&self) -> AudioMimeType {
        self.mime_type
    }

    /// Elapsed seconds at the moment capture stopped
    pub fn recorded_secs(&self) -> u64 {
        self.recorded_secs
    }

    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }

    /// Get human-readable size
    pub fn human_readable_size(&self) -> String {
        let bytes = self.size_bytes();
        if bytes < 1024 {
            format!("{} B", bytes)
        } else if bytes < 1024 * 1024 {
            format!("{:.1} KB", bytes as f64 / 1024.0)
        } else {
            format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
        }
    }

    /// Suggested file name: `<stem>.<ext>`
    pub fn file_name(&self, stem: &str) -> String {
        format!("{}.{}", stem, self.mime_type.extension())
    }
}
