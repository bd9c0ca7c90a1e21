//! Interrupt handling for interactive recording

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

/// Delivers one message per Ctrl-C.
///
/// The recorder gives each press a meaning based on where it is: skip the
/// preparation, stop the recording, or abort.
pub struct Interrupts {
    receiver: mpsc::UnboundedReceiver<()>,
    count: Arc<AtomicU32>,
}

impl Interrupts {
    /// Start listening for Ctrl-C
    pub fn listen() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let count = Arc::new(AtomicU32::new(0));

        let task_count = Arc::clone(&count);
        tokio::spawn(async move {
            loop {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    debug!("Ctrl-C handler unavailable: {}", e);
                    break;
                }
                task_count.fetch_add(1, Ordering::SeqCst);
                if tx.send(()).is_err() {
                    break;
                }
            }
        });

        Self::from_channel(rx, count)
    }

    fn from_channel(receiver: mpsc::UnboundedReceiver<()>, count: Arc<AtomicU32>) -> Self {
        Self { receiver, count }
    }

    /// Wait for the next press. Pends forever once the listener is gone.
    pub async fn next(&mut self) {
        if self.receiver.recv().await.is_none() {
            std::future::pending::<()>().await;
        }
    }

    /// Presses seen so far
    pub fn count(&self) -> u32 {
        self.count.load(Ordering::SeqCst)
    }
}
