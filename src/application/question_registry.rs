//! One live session per question.

use std::fmt::Debug;
use std::sync::Arc;

use tracing::info;

use crate::domain::recording::RecordingPolicy;

use super::capture_engine::SessionOptions;
use super::phased_session::PhasedSession;
use super::ports::{CaptureDevice, EncoderFactory};

/// Keeps at most one [`PhasedSession`] alive, keyed by question id.
///
/// Moving to another question disposes the previous session (releasing its
/// device even mid-capture) before the next one is created.
pub struct QuestionSessions<K> {
    device: Arc<dyn CaptureDevice>,
    encoders: Arc<dyn EncoderFactory>,
    options: SessionOptions,
    current: Option<(K, PhasedSession)>,
}

impl<K> QuestionSessions<K>
where
    K: Eq + Clone + Debug,
{
    pub fn new(
        device: Arc<dyn CaptureDevice>,
        encoders: Arc<dyn EncoderFactory>,
        options: SessionOptions,
    ) -> Self {
        Self {
            device,
            encoders,
            options,
            current: None,
        }
    }

    /// Session for `question`, creating a fresh one if it is not the
    /// current question. Re-opening the current question returns the live
    /// session unchanged.
    pub async fn open(&mut self, question: K, policy: RecordingPolicy) -> PhasedSession {
        if let Some((key, session)) = &self.current {
            if *key == question {
                return session.clone();
            }
        }

        self.close().await;

        info!("Opening session for question {:?}", question);
        let session = PhasedSession::new(
            policy,
            self.options.clone(),
            Arc::clone(&self.device),
            Arc::clone(&self.encoders),
        );
        self.current = Some((question, session.clone()));
        session
    }

    pub fn current(&self) -> Option<&PhasedSession> {
        self.current.as_ref().map(|(_, session)| session)
    }

    pub fn current_question(&self) -> Option<&K> {
        self.current.as_ref().map(|(key, _)| key)
    }

    /// Dispose the current session, if any
    pub async fn close(&mut self) {
        if let Some((key, session)) = self.current.take() {
            info!("Closing session for question {:?}", key);
            session.dispose().await;
        }
    }
}
