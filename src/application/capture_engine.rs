//! Capture engine: one response attempt, driven by a single task.
//!
//! [`CaptureEngine`] is a cheap handle. Commands are queued to the engine
//! task, which owns the [`CaptureSession`] state machine and every resource
//! acquired while recording. State changes go out on a broadcast channel in
//! the order they happen; the latest [`SessionSnapshot`] is always readable.

use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::domain::config::{
    is_valid_sample_buffer_len, AppConfig, DEFAULT_SAMPLE_BUFFER_LEN, TICK_INTERVAL_RANGE_MS,
};
use crate::domain::error::CaptureErrorKind;
use crate::domain::recording::{Artifact, Duration, RecordingPolicy};
use crate::domain::session::{CaptureSession, CaptureState};

use super::analyser::{AmplitudeTap, Analyser};
use super::ports::{
    AudioEncoder, AudioFrame, CaptureConstraints, CaptureDevice, CaptureStream, EncoderFactory,
    FrameReceiver,
};

/// Buffered events per subscriber before it starts lagging
pub const EVENT_CAPACITY: usize = 256;

/// Timing and capture options shared by every session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    /// How often elapsed time is recomputed while recording
    pub tick_interval: StdDuration,
    /// Length of the amplitude buffer
    pub sample_buffer_len: usize,
    pub constraints: CaptureConstraints,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from_config(&AppConfig::defaults())
    }
}

impl SessionOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            tick_interval: config.tick_interval_or_default(),
            sample_buffer_len: config.sample_buffer_len_or_default(),
            constraints: CaptureConstraints::default(),
        }
    }

    /// Clamp the tick into the accepted range and replace an invalid
    /// buffer length with the default. Engines only run normalized options.
    pub fn normalized(mut self) -> Self {
        let (min, max) = TICK_INTERVAL_RANGE_MS;
        self.tick_interval = self
            .tick_interval
            .clamp(StdDuration::from_millis(min), StdDuration::from_millis(max));
        if !is_valid_sample_buffer_len(self.sample_buffer_len) {
            self.sample_buffer_len = DEFAULT_SAMPLE_BUFFER_LEN;
        }
        self
    }
}

/// Notifications emitted by the engine, in order
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StateChanged(CaptureState),
    /// Visible elapsed seconds moved
    Elapsed(u64),
    /// The deadline stopped the capture; follows `StateChanged(Recorded)`
    TimeUp,
    Disposed,
}

/// Point-in-time view of the engine
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    pub state: CaptureState,
    pub elapsed_secs: u64,
    pub deadline: Option<Duration>,
    pub allow_re_record: bool,
    /// A recorded response that cannot be replaced
    pub locked: bool,
    pub error: Option<CaptureErrorKind>,
    pub artifact: Option<Artifact>,
    /// Present only while recording
    pub amplitude: Option<AmplitudeTap>,
    pub disposed: bool,
}

impl SessionSnapshot {
    fn of(session: &CaptureSession, amplitude: Option<AmplitudeTap>) -> Self {
        Self {
            state: session.state(),
            elapsed_secs: session.elapsed_secs(),
            deadline: session.deadline(),
            allow_re_record: session.allow_re_record(),
            locked: session.is_locked(),
            error: session.error().cloned(),
            artifact: session.artifact().cloned(),
            amplitude,
            disposed: false,
        }
    }

    pub fn remaining_secs(&self) -> Option<u64> {
        self.deadline
            .map(|d| d.as_secs().saturating_sub(self.elapsed_secs))
    }
}

#[derive(Debug)]
enum Command {
    Start,
    Stop,
    Reset,
    Resync,
    Dispose,
}

/// Handle to a running capture engine.
///
/// Clones share the same engine. Dropping every handle disposes it.
#[derive(Clone)]
pub struct CaptureEngine {
    commands: mpsc::UnboundedSender<Command>,
    events: broadcast::Sender<SessionEvent>,
    snapshot: watch::Receiver<SessionSnapshot>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl CaptureEngine {
    /// Spawn a new engine in the idle state. Must be called inside a tokio
    /// runtime. The deadline is taken from the policy and fixed for life.
    pub fn new(
        policy: &RecordingPolicy,
        options: SessionOptions,
        device: Arc<dyn CaptureDevice>,
        encoders: Arc<dyn EncoderFactory>,
    ) -> Self {
        let options = options.normalized();
        let session = CaptureSession::new(policy.effective_deadline(), policy.allow_re_record);
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (snapshot_tx, snapshot) = watch::channel(SessionSnapshot::of(&session, None));

        let actor = EngineActor {
            session,
            options,
            device,
            encoders,
            pending: None,
            active: None,
            events: events.clone(),
            snapshot: snapshot_tx,
        };
        let task = tokio::spawn(actor.run(command_rx));

        Self {
            commands,
            events,
            snapshot,
            task: Arc::new(Mutex::new(Some(task))),
        }
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!("Capture engine already disposed");
        }
    }

    /// Request the device and begin recording.
    /// Ignored while a capture is pending or running, or when locked.
    pub fn start(&self) {
        self.send(Command::Start);
    }

    /// Stop recording and produce the artifact. No-op unless recording.
    pub fn stop(&self) {
        self.send(Command::Stop);
    }

    /// Release everything and return to idle. Ignored while the device
    /// request is outstanding.
    pub fn reset(&self) {
        self.send(Command::Reset);
    }

    /// Recompute elapsed time now, e.g. after the host resumes from
    /// suspension. Enforces the deadline if it passed in the meantime.
    pub fn resync(&self) {
        self.send(Command::Resync);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.clone()
    }

    pub fn state(&self) -> CaptureState {
        self.snapshot.borrow().state
    }

    /// Amplitude buffer of the running capture, if recording
    pub fn amplitude_tap(&self) -> Option<AmplitudeTap> {
        self.snapshot.borrow().amplitude.clone()
    }

    /// Wait until the published snapshot satisfies `predicate`.
    /// Returns `None` if the engine goes away first.
    pub async fn wait_until(
        &self,
        mut predicate: impl FnMut(&SessionSnapshot) -> bool,
    ) -> Option<SessionSnapshot> {
        let mut rx = self.snapshot.clone();
        let snapshot = rx.wait_for(|s| predicate(s)).await.ok().map(|s| s.clone());
        snapshot
    }

    pub fn is_disposed(&self) -> bool {
        self.snapshot.borrow().disposed || self.commands.is_closed()
    }

    /// Tear the engine down, releasing any device, encoder, and analyser,
    /// and wait for the engine task to finish.
    pub async fn dispose(&self) {
        self.send(Command::Dispose);
        let task = self
            .task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                error!("Capture engine task failed: {}", e);
            }
        }
    }
}

type Grant = Result<Box<dyn CaptureStream>, CaptureErrorKind>;

/// Resources held while recording. Exists exactly when the state is
/// RECORDING.
struct ActiveCapture {
    stream: Box<dyn CaptureStream>,
    frames: FrameReceiver,
    encoder: Box<dyn AudioEncoder>,
    chunks: mpsc::UnboundedReceiver<Vec<u8>>,
    analyser: Analyser,
    started_at: Instant,
    ticker: Interval,
}

enum Activity {
    Frame(Option<Result<AudioFrame, CaptureErrorKind>>),
    Tick,
}

impl ActiveCapture {
    async fn next(&mut self) -> Activity {
        tokio::select! {
            frame = self.frames.recv() => Activity::Frame(frame),
            _ = self.ticker.tick() => Activity::Tick,
        }
    }

    /// Device, then encoder, then analyser
    fn release(&mut self) {
        self.stream.release();
        self.encoder.close();
        self.analyser.detach();
    }
}

async fn next_grant(
    pending: &mut Option<oneshot::Receiver<Grant>>,
) -> Result<Grant, oneshot::error::RecvError> {
    match pending {
        Some(rx) => rx.await,
        None => std::future::pending().await,
    }
}

async fn next_activity(active: &mut Option<ActiveCapture>) -> Activity {
    match active {
        Some(active) => active.next().await,
        None => std::future::pending().await,
    }
}

struct EngineActor {
    session: CaptureSession,
    options: SessionOptions,
    device: Arc<dyn CaptureDevice>,
    encoders: Arc<dyn EncoderFactory>,
    pending: Option<oneshot::Receiver<Grant>>,
    active: Option<ActiveCapture>,
    events: broadcast::Sender<SessionEvent>,
    snapshot: watch::Sender<SessionSnapshot>,
}

impl EngineActor {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Dispose) | None => break,
                    Some(command) => self.handle(command).await,
                },
                grant = next_grant(&mut self.pending) => {
                    self.pending = None;
                    self.on_grant(grant);
                }
                activity = next_activity(&mut self.active) => match activity {
                    Activity::Frame(frame) => self.on_frame(frame),
                    Activity::Tick => self.on_tick().await,
                },
            }
        }
        self.teardown();
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Start => self.start(),
            Command::Stop => self.stop(false).await,
            Command::Reset => self.reset(),
            Command::Resync => self.on_tick().await,
            Command::Dispose => {}
        }
    }

    fn publish(&self, event: SessionEvent) {
        self.refresh();
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn refresh(&self) {
        let amplitude = self.active.as_ref().map(|a| a.analyser.tap());
        self.snapshot
            .send_replace(SessionSnapshot::of(&self.session, amplitude));
    }

    fn start(&mut self) {
        if let Err(e) = self.session.begin_request() {
            warn!("Ignoring start: {}", e);
            return;
        }
        info!("Requesting capture device ({})", self.device.name());

        let (tx, rx) = oneshot::channel();
        let device = Arc::clone(&self.device);
        let constraints = self.options.constraints.clone();
        tokio::spawn(async move {
            let grant = device.request_capture(&constraints).await;
            if let Err(Ok(mut stream)) = tx.send(grant) {
                warn!("Capture device granted after the session went away; releasing it");
                stream.release();
            }
        });

        self.pending = Some(rx);
        self.publish(SessionEvent::StateChanged(CaptureState::RequestingDevice));
    }

    fn on_grant(&mut self, grant: Result<Grant, oneshot::error::RecvError>) {
        let stream = match grant {
            Ok(Ok(stream)) => stream,
            Ok(Err(kind)) => return self.fail(kind),
            Err(_) => {
                return self.fail(CaptureErrorKind::Unknown(
                    "device request was abandoned".to_string(),
                ))
            }
        };

        let mut active = match self.open_capture(stream) {
            Ok(active) => active,
            Err(kind) => return self.fail(kind),
        };

        if let Err(e) = self.session.device_granted() {
            warn!("Discarding capture device: {}", e);
            active.release();
            return;
        }

        info!(
            "Recording started ({} Hz)",
            active.stream.format().sample_rate
        );
        self.active = Some(active);
        self.publish(SessionEvent::StateChanged(CaptureState::Recording));
    }

    /// Wire encoder and analyser to a granted stream. On failure the
    /// stream is released before returning.
    fn open_capture(
        &self,
        mut stream: Box<dyn CaptureStream>,
    ) -> Result<ActiveCapture, CaptureErrorKind> {
        let Some(frames) = stream.take_frames() else {
            stream.release();
            return Err(CaptureErrorKind::DeviceFailure(
                "capture stream has no frame source".to_string(),
            ));
        };

        let mut encoder = match self.encoders.open(stream.format()) {
            Ok(encoder) => encoder,
            Err(kind) => {
                stream.release();
                return Err(kind);
            }
        };

        let (chunk_tx, chunks) = mpsc::unbounded_channel();
        encoder.on_chunk(Box::new(move |chunk| {
            let _ = chunk_tx.send(chunk);
        }));

        let started_at = Instant::now();
        let tick = self.options.tick_interval;
        let mut ticker = time::interval_at(started_at + tick, tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        Ok(ActiveCapture {
            stream,
            frames,
            encoder,
            chunks,
            analyser: Analyser::new(self.options.sample_buffer_len),
            started_at,
            ticker,
        })
    }

    fn on_frame(&mut self, frame: Option<Result<AudioFrame, CaptureErrorKind>>) {
        match frame {
            Some(Ok(frame)) => {
                let Some(active) = self.active.as_mut() else {
                    return;
                };
                if let Err(kind) = active.encoder.write(&frame) {
                    return self.fail(kind);
                }
                active.analyser.push(&frame);
            }
            Some(Err(kind)) => self.fail(kind),
            None => self.fail(CaptureErrorKind::DeviceFailure(
                "capture stream ended unexpectedly".to_string(),
            )),
        }
    }

    async fn on_tick(&mut self) {
        let Some(active) = self.active.as_ref() else {
            return;
        };
        let since_start = active.started_at.elapsed();

        let update = match self.session.update_elapsed(since_start) {
            Ok(update) => update,
            Err(e) => {
                debug!("Skipping tick: {}", e);
                return;
            }
        };

        if update.changed {
            self.publish(SessionEvent::Elapsed(update.elapsed_secs));
        }
        if update.deadline_reached {
            info!("Time limit reached after {}s", update.elapsed_secs);
            self.stop(true).await;
        }
    }

    /// Stop recording: release the device, flush what it already delivered,
    /// finalize the encoder, detach the analyser, then publish RECORDED.
    async fn stop(&mut self, deadline: bool) {
        let Some(mut active) = self.active.take() else {
            debug!("Ignoring stop while {}", self.session.state());
            return;
        };

        active.stream.release();

        let mut write_error = None;
        while let Ok(item) = active.frames.try_recv() {
            let Ok(frame) = item else { break };
            if let Err(kind) = active.encoder.write(&frame) {
                write_error = Some(kind);
                break;
            }
            active.analyser.push(&frame);
        }

        let mut time_up = deadline;
        if let Ok(update) = self.session.update_elapsed(active.started_at.elapsed()) {
            time_up |= update.deadline_reached;
            if update.changed {
                self.publish(SessionEvent::Elapsed(update.elapsed_secs));
            }
        }

        let finalized = match write_error {
            Some(kind) => Err(kind),
            None => active.encoder.finalize().await,
        };
        active.encoder.close();
        active.analyser.detach();

        if let Err(kind) = finalized {
            error!("Encoder failed to finalize: {}", kind);
            if self.session.fail(kind).is_ok() {
                self.publish(SessionEvent::StateChanged(CaptureState::Error));
            }
            return;
        }

        let mut chunks = Vec::new();
        while let Ok(chunk) = active.chunks.try_recv() {
            chunks.push(chunk);
        }
        let artifact = Artifact::from_chunks(
            chunks,
            active.encoder.mime_type(),
            self.session.elapsed_secs(),
        );
        info!(
            "Recorded {} in {}s as {}",
            artifact.human_readable_size(),
            artifact.recorded_secs(),
            artifact.reference()
        );

        if let Err(e) = self.session.finish(artifact) {
            warn!("Dropping recording: {}", e);
            return;
        }
        self.publish(SessionEvent::StateChanged(CaptureState::Recorded));
        if time_up {
            self.publish(SessionEvent::TimeUp);
        }
    }

    fn reset(&mut self) {
        let previous = self.session.state();
        if previous == CaptureState::RequestingDevice {
            warn!("Ignoring reset while the device request is outstanding");
            return;
        }
        self.release_active();
        if let Err(e) = self.session.reset() {
            warn!("Ignoring reset: {}", e);
            return;
        }
        if previous == CaptureState::Idle {
            self.refresh();
        } else {
            self.publish(SessionEvent::StateChanged(CaptureState::Idle));
        }
    }

    fn fail(&mut self, kind: CaptureErrorKind) {
        self.release_active();
        error!("Capture failed: {}", kind);
        match self.session.fail(kind) {
            Ok(()) => self.publish(SessionEvent::StateChanged(CaptureState::Error)),
            Err(e) => debug!("Not entering error state: {}", e),
        }
    }

    /// Release whatever the current capture holds. Returns whether anything
    /// was held; calling it again is a no-op.
    fn release_active(&mut self) -> bool {
        match self.active.take() {
            Some(mut active) => {
                active.release();
                true
            }
            None => false,
        }
    }

    fn teardown(mut self) {
        if let Some(mut pending) = self.pending.take() {
            // A grant arriving after this is released by the request task
            pending.close();
            if let Ok(Ok(mut stream)) = pending.try_recv() {
                stream.release();
            }
        }
        if self.release_active() {
            info!("Released capture resources on dispose");
        }

        let mut snapshot = SessionSnapshot::of(&self.session, None);
        snapshot.disposed = true;
        self.snapshot.send_replace(snapshot);
        let _ = self.events.send(SessionEvent::Disposed);
        debug!("Capture engine disposed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::recording::AudioMimeType;
    use crate::application::ports::{ChunkHandler, StreamFormat};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counters {
        requests: AtomicUsize,
        releases: AtomicUsize,
        closes: AtomicUsize,
    }

    struct MockStream {
        counters: Arc<Counters>,
        frames: Option<FrameReceiver>,
        // Keeps the frame channel open
        _tx: mpsc::UnboundedSender<Result<AudioFrame, CaptureErrorKind>>,
        released: bool,
    }

    impl CaptureStream for MockStream {
        fn format(&self) -> StreamFormat {
            StreamFormat {
                sample_rate: 16000,
                channels: 1,
            }
        }

        fn take_frames(&mut self) -> Option<FrameReceiver> {
            self.frames.take()
        }

        fn release(&mut self) {
            if !self.released {
                self.released = true;
                self.counters.releases.fetch_add(1, Ordering::SeqCst);
            }
        }

        fn is_released(&self) -> bool {
            self.released
        }
    }

    struct MockDevice {
        counters: Arc<Counters>,
        deny: bool,
    }

    #[async_trait]
    impl CaptureDevice for MockDevice {
        async fn request_capture(
            &self,
            _constraints: &CaptureConstraints,
        ) -> Result<Box<dyn CaptureStream>, CaptureErrorKind> {
            self.counters.requests.fetch_add(1, Ordering::SeqCst);
            if self.deny {
                return Err(CaptureErrorKind::PermissionDenied);
            }
            let (tx, rx) = mpsc::unbounded_channel();
            Ok(Box::new(MockStream {
                counters: Arc::clone(&self.counters),
                frames: Some(rx),
                _tx: tx,
                released: false,
            }))
        }

        fn name(&self) -> &str {
            "mock"
        }
    }

    struct MockEncoder {
        counters: Arc<Counters>,
        handler: Option<ChunkHandler>,
        closed: bool,
    }

    #[async_trait]
    impl AudioEncoder for MockEncoder {
        fn mime_type(&self) -> AudioMimeType {
            AudioMimeType::Pcm
        }

        fn on_chunk(&mut self, handler: ChunkHandler) {
            self.handler = Some(handler);
        }

        fn write(&mut self, _frame: &AudioFrame) -> Result<(), CaptureErrorKind> {
            Ok(())
        }

        async fn finalize(&mut self) -> Result<(), CaptureErrorKind> {
            if let Some(handler) = self.handler.as_mut() {
                handler(vec![7, 7]);
            }
            Ok(())
        }

        fn close(&mut self) {
            if !self.closed {
                self.closed = true;
                self.counters.closes.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    struct MockEncoders {
        counters: Arc<Counters>,
    }

    impl EncoderFactory for MockEncoders {
        fn open(&self, _format: StreamFormat) -> Result<Box<dyn AudioEncoder>, CaptureErrorKind> {
            Ok(Box::new(MockEncoder {
                counters: Arc::clone(&self.counters),
                handler: None,
                closed: false,
            }))
        }
    }

    fn engine(deadline: Option<u64>, deny: bool) -> (CaptureEngine, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let policy = RecordingPolicy::single_phase(true, deadline.map(Duration::from_secs));
        let engine = CaptureEngine::new(
            &policy,
            SessionOptions::default(),
            Arc::new(MockDevice {
                counters: Arc::clone(&counters),
                deny,
            }),
            Arc::new(MockEncoders {
                counters: Arc::clone(&counters),
            }),
        );
        (engine, counters)
    }

    #[test]
    fn options_are_normalized() {
        let zero = SessionOptions {
            tick_interval: StdDuration::ZERO,
            sample_buffer_len: 0,
            ..SessionOptions::default()
        }
        .normalized();
        assert_eq!(zero.tick_interval, StdDuration::from_millis(10));
        assert_eq!(zero.sample_buffer_len, DEFAULT_SAMPLE_BUFFER_LEN);

        let slow = SessionOptions {
            tick_interval: StdDuration::from_secs(2),
            sample_buffer_len: 1024,
            ..SessionOptions::default()
        }
        .normalized();
        assert_eq!(slow.tick_interval, StdDuration::from_millis(250));
        assert_eq!(slow.sample_buffer_len, 1024);
    }

    #[tokio::test(start_paused = true)]
    async fn start_then_stop_produces_artifact() {
        let (engine, counters) = engine(None, false);
        engine.start();
        engine
            .wait_until(|s| s.state == CaptureState::Recording)
            .await
            .unwrap();
        assert!(engine.amplitude_tap().is_some());

        time::sleep(StdDuration::from_secs(3)).await;
        engine.stop();
        let snapshot = engine
            .wait_until(|s| s.state == CaptureState::Recorded)
            .await
            .unwrap();

        let artifact = snapshot.artifact.unwrap();
        assert_eq!(artifact.data(), &[7, 7]);
        assert_eq!(snapshot.elapsed_secs, 3);
        assert!(snapshot.amplitude.is_none());
        assert_eq!(counters.releases.load(Ordering::SeqCst), 1);
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn permission_denied_enters_error() {
        let (engine, counters) = engine(None, true);
        engine.start();
        let snapshot = engine
            .wait_until(|s| s.state == CaptureState::Error)
            .await
            .unwrap();
        assert_eq!(snapshot.error, Some(CaptureErrorKind::PermissionDenied));
        assert_eq!(counters.releases.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_reset_releases_once() {
        let (engine, counters) = engine(None, false);
        engine.start();
        engine
            .wait_until(|s| s.state == CaptureState::Recording)
            .await
            .unwrap();

        engine.reset();
        engine.reset();
        engine
            .wait_until(|s| s.state == CaptureState::Idle)
            .await
            .unwrap();
        engine.dispose().await;

        assert_eq!(counters.releases.load(Ordering::SeqCst), 1);
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
        assert!(engine.is_disposed());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_when_idle_is_noop() {
        let (engine, counters) = engine(None, false);
        engine.stop();
        engine.resync();
        time::sleep(StdDuration::from_millis(10)).await;
        assert_eq!(engine.state(), CaptureState::Idle);
        assert_eq!(counters.requests.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn dispose_publishes_final_snapshot() {
        let (engine, _) = engine(None, false);
        let mut events = engine.subscribe();
        engine.dispose().await;
        assert!(engine.snapshot().disposed);
        assert_eq!(events.recv().await.unwrap(), SessionEvent::Disposed);
    }
}
