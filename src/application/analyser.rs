//! Live amplitude buffer fed from the capture path.
//!
//! The engine owns an [`Analyser`] for the lifetime of one recording and hands
//! callers an [`AmplitudeTap`]. Detaching the analyser invalidates every tap.

use std::sync::{Arc, Mutex, MutexGuard};

use super::ports::AudioFrame;

/// Byte value of a silent sample in the time-domain buffer
pub const SILENCE: u8 = 128;

/// Floor reported for an empty or silent buffer
pub const SILENCE_DB: f32 = -96.0;

#[derive(Debug)]
struct Shared {
    attached: bool,
    samples: Vec<u8>,
    level_db: f32,
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(|e| e.into_inner())
}

/// Map a signed sample onto the unsigned time-domain scale (128 = silence)
fn to_byte(sample: i16) -> u8 {
    ((sample >> 8) as i32 + 128) as u8
}

/// RMS level of a block of samples in dBFS
pub fn rms_db(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return SILENCE_DB;
    }
    let sum_sq: f64 = samples
        .iter()
        .map(|&s| {
            let v = s as f64 / 32768.0;
            v * v
        })
        .sum();
    let rms = (sum_sq / samples.len() as f64).sqrt();
    if rms <= 0.0 {
        return SILENCE_DB;
    }
    ((20.0 * rms.log10()) as f32).max(SILENCE_DB)
}

/// Owner side of the amplitude buffer
#[derive(Debug)]
pub struct Analyser {
    shared: Arc<Mutex<Shared>>,
    len: usize,
}

impl Analyser {
    pub fn new(len: usize) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                attached: true,
                samples: vec![SILENCE; len],
                level_db: SILENCE_DB,
            })),
            len,
        }
    }

    /// Push the newest frame; the buffer keeps the last `len` samples.
    pub fn push(&self, frame: &AudioFrame) {
        if self.len == 0 {
            return;
        }
        let mut shared = lock(&self.shared);
        if !shared.attached {
            return;
        }

        let tail = &frame.samples[frame.samples.len().saturating_sub(self.len)..];
        let n = tail.len();
        shared.samples.rotate_left(n);
        let start = self.len - n;
        for (slot, &sample) in shared.samples[start..].iter_mut().zip(tail) {
            *slot = to_byte(sample);
        }
        shared.level_db = rms_db(&frame.samples);
    }

    pub fn tap(&self) -> AmplitudeTap {
        AmplitudeTap {
            shared: Arc::clone(&self.shared),
            len: self.len,
        }
    }

    /// Stop accepting samples and invalidate outstanding taps. Idempotent.
    pub fn detach(&self) -> bool {
        let mut shared = lock(&self.shared);
        let was_attached = shared.attached;
        shared.attached = false;
        shared.samples.fill(SILENCE);
        shared.level_db = SILENCE_DB;
        was_attached
    }

    pub fn is_attached(&self) -> bool {
        lock(&self.shared).attached
    }
}

/// Read side of the amplitude buffer, valid only while recording
#[derive(Debug, Clone)]
pub struct AmplitudeTap {
    shared: Arc<Mutex<Shared>>,
    len: usize,
}

impl AmplitudeTap {
    /// Number of samples a read produces
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_valid(&self) -> bool {
        lock(&self.shared).attached
    }

    /// Copy the current time-domain buffer into `out`.
    /// Returns `false` once the capture has stopped.
    pub fn read_into(&self, out: &mut [u8]) -> bool {
        let shared = lock(&self.shared);
        if !shared.attached {
            return false;
        }
        let n = out.len().min(shared.samples.len());
        out[..n].copy_from_slice(&shared.samples[..n]);
        true
    }

    pub fn read(&self) -> Option<Vec<u8>> {
        let shared = lock(&self.shared);
        shared.attached.then(|| shared.samples.clone())
    }

    /// Level of the most recent frame in dBFS
    pub fn level_db(&self) -> Option<f32> {
        let shared = lock(&self.shared);
        shared.attached.then_some(shared.level_db)
    }
}
