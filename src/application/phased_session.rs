//! Phased session: preparation countdown followed by a speaking window.
//!
//! Wraps one [`CaptureEngine`]. The countdown runs independently of the
//! engine's elapsed timer; once speaking, the engine's own deadline applies.

use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::domain::recording::RecordingPolicy;
use crate::domain::session::{CaptureState, Phase, PhaseTracker};

use super::capture_engine::{
    CaptureEngine, SessionEvent, SessionOptions, SessionSnapshot, EVENT_CAPACITY,
};
use super::ports::{CaptureDevice, EncoderFactory};

/// Notifications emitted by a phased session, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseEvent {
    PhaseChanged(Phase),
    /// Visible preparation countdown moved
    PreparationRemaining(u64),
    Disposed,
}

/// Point-in-time view of a phased session
#[derive(Debug, Clone)]
pub struct PhaseSnapshot {
    pub phase: Phase,
    /// Full preparation window, for two-phase questions
    pub preparation_secs: Option<u64>,
    pub preparation_remaining_secs: u64,
    pub countdown_running: bool,
    pub allow_re_record: bool,
    /// The wrapped engine as of the last phase update
    pub capture: SessionSnapshot,
    pub disposed: bool,
}

#[derive(Debug)]
enum Command {
    BeginCountdown,
    Skip,
    Start,
    Stop,
    ReRecord,
    Dispose,
}

/// Handle to a running phased session. Clones share the same session.
#[derive(Clone)]
pub struct PhasedSession {
    commands: mpsc::UnboundedSender<Command>,
    events: broadcast::Sender<PhaseEvent>,
    snapshot: watch::Receiver<PhaseSnapshot>,
    engine: CaptureEngine,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl PhasedSession {
    /// Spawn a session and its engine. Two-phase policies start in
    /// PREPARATION with a full countdown, single-phase ones in SPEAKING.
    /// Must be called inside a tokio runtime.
    pub fn new(
        policy: RecordingPolicy,
        options: SessionOptions,
        device: Arc<dyn CaptureDevice>,
        encoders: Arc<dyn EncoderFactory>,
    ) -> Self {
        let options = options.normalized();
        let tick_interval = options.tick_interval;
        let engine = CaptureEngine::new(&policy, options, device, encoders);
        let engine_events = engine.subscribe();
        let tracker = PhaseTracker::new(policy.preparation);

        let (commands, command_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (snapshot_tx, snapshot) =
            watch::channel(snapshot_of(&policy, &tracker, engine.snapshot()));

        let actor = PhaseActor {
            policy,
            tracker,
            engine: engine.clone(),
            engine_events,
            countdown: None,
            tick_interval,
            events: events.clone(),
            snapshot: snapshot_tx,
        };
        let task = tokio::spawn(actor.run(command_rx));

        Self {
            commands,
            events,
            snapshot,
            engine,
            task: Arc::new(Mutex::new(Some(task))),
        }
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!("Phased session already disposed");
        }
    }

    /// Start the preparation countdown. Two-phase only.
    pub fn begin_preparation_countdown(&self) {
        self.send(Command::BeginCountdown);
    }

    /// End preparation now and enter SPEAKING
    pub fn skip_preparation(&self) {
        self.send(Command::Skip);
    }

    /// Start recording. Ignored during preparation.
    pub fn start(&self) {
        self.send(Command::Start);
    }

    pub fn stop(&self) {
        self.send(Command::Stop);
    }

    /// Discard the recorded response and go back to the start of the
    /// question. Only when re-recording is allowed and a response exists.
    pub fn re_record(&self) {
        self.send(Command::ReRecord);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PhaseEvent> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> PhaseSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn phase(&self) -> Phase {
        self.snapshot.borrow().phase
    }

    /// The wrapped capture engine
    pub fn engine(&self) -> &CaptureEngine {
        &self.engine
    }

    pub async fn wait_until(
        &self,
        mut predicate: impl FnMut(&PhaseSnapshot) -> bool,
    ) -> Option<PhaseSnapshot> {
        let mut rx = self.snapshot.clone();
        let snapshot = rx.wait_for(|s| predicate(s)).await.ok().map(|s| s.clone());
        snapshot
    }

    /// Tear down the countdown and the wrapped engine, then wait for both
    /// tasks to finish.
    pub async fn dispose(&self) {
        self.send(Command::Dispose);
        let task = self
            .task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                error!("Phased session task failed: {}", e);
            }
        }
        // Covers an actor that exited without reaching its own teardown
        self.engine.dispose().await;
    }
}

fn snapshot_of(
    policy: &RecordingPolicy,
    tracker: &PhaseTracker,
    capture: SessionSnapshot,
) -> PhaseSnapshot {
    PhaseSnapshot {
        phase: tracker.phase(),
        preparation_secs: policy.preparation.map(|d| d.as_secs()),
        preparation_remaining_secs: tracker.preparation_remaining_secs(),
        countdown_running: tracker.is_countdown_running(),
        allow_re_record: policy.allow_re_record,
        capture,
        disposed: false,
    }
}

struct Countdown {
    started_at: Instant,
    ticker: Interval,
}

async fn next_countdown_tick(countdown: &mut Option<Countdown>) {
    match countdown {
        Some(countdown) => {
            countdown.ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

struct PhaseActor {
    policy: RecordingPolicy,
    tracker: PhaseTracker,
    engine: CaptureEngine,
    engine_events: broadcast::Receiver<SessionEvent>,
    countdown: Option<Countdown>,
    tick_interval: StdDuration,
    events: broadcast::Sender<PhaseEvent>,
    snapshot: watch::Sender<PhaseSnapshot>,
}

impl PhaseActor {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Dispose) | None => break,
                    Some(command) => self.handle(command),
                },
                event = self.engine_events.recv() => match event {
                    Ok(SessionEvent::Disposed) | Err(RecvError::Closed) => break,
                    Ok(SessionEvent::StateChanged(state)) => self.on_capture_state(state),
                    Ok(_) => self.refresh(),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Phased session missed {} engine events; resyncing", skipped);
                        let state = self.engine.state();
                        self.on_capture_state(state);
                    }
                },
                _ = next_countdown_tick(&mut self.countdown) => self.on_countdown_tick(),
            }
        }
        self.teardown().await;
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::BeginCountdown => self.begin_countdown(),
            Command::Skip => self.skip(),
            Command::Start => self.start(),
            Command::Stop => self.engine.stop(),
            Command::ReRecord => self.re_record(),
            Command::Dispose => {}
        }
    }

    fn refresh(&self) {
        self.snapshot.send_replace(snapshot_of(
            &self.policy,
            &self.tracker,
            self.engine.snapshot(),
        ));
    }

    fn publish(&self, event: PhaseEvent) {
        self.refresh();
        let _ = self.events.send(event);
    }

    fn begin_countdown(&mut self) {
        if let Err(e) = self.tracker.begin_countdown() {
            warn!("Ignoring countdown: {}", e);
            return;
        }
        let started_at = Instant::now();
        let mut ticker = time::interval_at(started_at + self.tick_interval, self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.countdown = Some(Countdown { started_at, ticker });

        info!(
            "Preparation started ({}s)",
            self.tracker.preparation_remaining_secs()
        );
        self.publish(PhaseEvent::PreparationRemaining(
            self.tracker.preparation_remaining_secs(),
        ));
    }

    fn on_countdown_tick(&mut self) {
        let Some(countdown) = self.countdown.as_ref() else {
            return;
        };
        let since_start = countdown.started_at.elapsed();
        let before = self.tracker.preparation_remaining_secs();

        match self.tracker.update_countdown(since_start) {
            Ok(true) => {
                self.countdown = None;
                info!("Preparation over");
                self.publish(PhaseEvent::PreparationRemaining(0));
                self.publish(PhaseEvent::PhaseChanged(Phase::Speaking));
            }
            Ok(false) => {
                let remaining = self.tracker.preparation_remaining_secs();
                if remaining != before {
                    self.publish(PhaseEvent::PreparationRemaining(remaining));
                }
            }
            Err(e) => {
                debug!("Dropping countdown: {}", e);
                self.countdown = None;
            }
        }
    }

    fn skip(&mut self) {
        if let Err(e) = self.tracker.skip() {
            warn!("Ignoring skip: {}", e);
            return;
        }
        self.countdown = None;
        info!("Preparation skipped");
        self.publish(PhaseEvent::PreparationRemaining(0));
        self.publish(PhaseEvent::PhaseChanged(Phase::Speaking));
    }

    fn start(&mut self) {
        match self.tracker.phase() {
            Phase::Preparation => warn!("Ignoring start during preparation"),
            Phase::Done if self.policy.is_two_phase() => {
                warn!("Ignoring start after the response was recorded; use re-record")
            }
            Phase::Speaking | Phase::Done | Phase::Error => self.engine.start(),
        }
    }

    fn re_record(&mut self) {
        if !self.policy.allow_re_record {
            warn!("Ignoring re-record: response is locked");
            return;
        }
        if self.tracker.phase() != Phase::Done {
            warn!("Ignoring re-record during {} phase", self.tracker.phase());
            return;
        }

        self.engine.reset();
        self.countdown = None;
        self.tracker.restart();
        info!("Re-recording from {} phase", self.tracker.phase());
        self.publish(PhaseEvent::PhaseChanged(self.tracker.phase()));
    }

    fn on_capture_state(&mut self, state: CaptureState) {
        let before = self.tracker.phase();
        match state {
            CaptureState::Recorded => self.tracker.capture_recorded(),
            CaptureState::Error => {
                self.countdown = None;
                self.tracker.capture_failed();
            }
            CaptureState::Idle | CaptureState::RequestingDevice => self.tracker.capture_reset(),
            CaptureState::Recording => {}
        }

        let after = self.tracker.phase();
        if after != before {
            self.publish(PhaseEvent::PhaseChanged(after));
        } else {
            self.refresh();
        }
    }

    async fn teardown(mut self) {
        self.countdown = None;
        self.engine.dispose().await;

        let mut snapshot = snapshot_of(&self.policy, &self.tracker, self.engine.snapshot());
        snapshot.disposed = true;
        self.snapshot.send_replace(snapshot);
        let _ = self.events.send(PhaseEvent::Disposed);
        debug!("Phased session disposed");
    }
}
