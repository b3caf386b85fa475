//! Voice interaction orchestrator.
//!
//! Owns the session state and sequences capture -> resolve -> speak:
//!
//! ```text
//! Idle --start_listening--> Listening --result--> Resolving --reply--> Speaking --ended--> Idle
//!                               |                      |                   |
//!                               +--error--> Error      +--clear ack--> Idle +--error--> Error
//! Error --reported--> Idle
//! ```
//!
//! Commands and collaborator callbacks are processed one at a time on a
//! single task. Resolving and speaking run as spawned tasks that report back
//! through the event channel, so commands that arrive meanwhile are rejected
//! rather than queued.

mod state;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

use crate::capture::{CaptureEvent, CaptureSink, SpeechCapture};
use crate::error::{
    CaptureError, CaptureErrorKind, ErrorInfo, ErrorKind, PlaybackError, Rejected, SpeakError,
};
use crate::history::{ConversationEntry, CONTEXT_WINDOW};
use crate::playback::PlaybackCoordinator;
use crate::resolver::{Resolution, ResponseResolver};

pub use state::{Phase, SessionSnapshot, SessionState};

/// Commands from the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    StartListening,
    Stop,
    Clear,
    RepeatLast,
    AcknowledgeError,
}

/// Collaborator callbacks, delivered to the orchestrator loop.
#[derive(Debug)]
pub enum Event {
    Capture { attempt: u64, event: CaptureEvent },
    CaptureTimeout { attempt: u64 },
    /// `Err` carries the failure of the resolver task itself.
    Resolved {
        turn: u64,
        outcome: Result<Resolution, String>,
    },
    Playback { turn: u64, event: PlaybackEvent },
}

#[derive(Debug)]
pub enum PlaybackEvent {
    StateChanged(bool),
    Finished(Result<(), SpeakError>),
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Upper bound on one listening attempt.
    pub speech_timeout: Option<Duration>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            speech_timeout: Some(Duration::from_secs(10)),
        }
    }
}

pub struct VoiceOrchestrator {
    state: SessionState,
    capture: Box<dyn SpeechCapture>,
    resolver: Arc<ResponseResolver>,
    playback: Arc<PlaybackCoordinator>,
    config: OrchestratorConfig,
    events_tx: mpsc::UnboundedSender<Event>,
    events_rx: mpsc::UnboundedReceiver<Event>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    /// Id of the current capture attempt. Bumped to invalidate stale callbacks.
    attempt: u64,
    /// Id of the current resolve or speak operation.
    turn: u64,
}

impl VoiceOrchestrator {
    pub fn new(
        capture: Box<dyn SpeechCapture>,
        resolver: Arc<ResponseResolver>,
        playback: Arc<PlaybackCoordinator>,
        config: OrchestratorConfig,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let state = SessionState::default();
        let (snapshot_tx, _) = watch::channel(state.snapshot());
        Self {
            state,
            capture,
            resolver,
            playback,
            config,
            events_tx,
            events_rx,
            snapshot_tx,
            attempt: 0,
            turn: 0,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Move the orchestrator onto its own task and return a handle to it.
    pub fn spawn(self) -> OrchestratorHandle {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let snapshots = self.subscribe();
        tokio::spawn(self.run(commands_rx));
        OrchestratorHandle {
            commands: commands_tx,
            snapshots,
        }
    }

    /// Process commands and collaborator events until every handle is dropped.
    pub async fn run(mut self, mut commands: mpsc::UnboundedReceiver<CommandRequest>) {
        info!("Orchestrator running");
        loop {
            tokio::select! {
                request = commands.recv() => match request {
                    Some(CommandRequest { command, reply }) => {
                        let outcome = self.handle_command(command);
                        let _ = reply.send(outcome);
                    }
                    None => break,
                },
                Some(event) = self.events_rx.recv() => self.handle_event(event),
            }
        }

        info!("Command channel closed, orchestrator shutting down");
        if self.state.phase == Phase::Listening {
            self.capture.stop();
        }
        self.playback.stop();
    }

    /// Wait for the next collaborator event and apply it.
    pub async fn process_next_event(&mut self) {
        if let Some(event) = self.events_rx.recv().await {
            self.handle_event(event);
        }
    }

    // ── Commands ────────────────────────────────────────────────────

    /// Apply a presentation command. Commands that would break mutual
    /// exclusion are rejected, never queued.
    pub fn handle_command(&mut self, command: Command) -> Result<(), Rejected> {
        let outcome = match command {
            Command::StartListening => self.start_listening(),
            Command::Stop => self.stop(),
            Command::Clear => self.clear(),
            Command::RepeatLast => self.repeat_last(),
            Command::AcknowledgeError => self.acknowledge_error(),
        };
        if let Err(reason) = outcome {
            debug!(?command, phase = %self.state.phase, %reason, "Command rejected");
        }
        outcome
    }

    fn start_listening(&mut self) -> Result<(), Rejected> {
        if self.state.phase != Phase::Idle {
            return Err(Rejected::Busy);
        }
        if self.state.error_pending() {
            return Err(Rejected::ErrorPending);
        }
        if !self.capture.is_available() {
            return Err(Rejected::CaptureUnavailable);
        }

        self.state.reset_turn();
        self.attempt += 1;
        let attempt = self.attempt;
        let sink = CaptureSink::new(attempt, self.events_tx.clone());
        if let Err(err) = self.capture.start(sink) {
            warn!(error = %err, "Speech capture failed to start");
            self.fail(ErrorInfo::from(&err));
            return Ok(());
        }

        info!(attempt, "Listening");
        self.set_phase(Phase::Listening);
        self.arm_capture_timeout(attempt);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), Rejected> {
        if self.state.phase != Phase::Listening {
            return Err(Rejected::NotListening);
        }
        info!(attempt = self.attempt, "Listening cancelled");
        self.capture.stop();
        self.attempt += 1;
        self.set_phase(Phase::Idle);
        Ok(())
    }

    fn clear(&mut self) -> Result<(), Rejected> {
        if self.state.phase != Phase::Idle {
            return Err(Rejected::Busy);
        }
        info!(cleared = self.state.history.len(), "History cleared");
        self.state.history.clear();
        self.state.reset_turn();
        self.publish();
        Ok(())
    }

    fn repeat_last(&mut self) -> Result<(), Rejected> {
        if self.state.phase != Phase::Idle {
            return Err(Rejected::Busy);
        }
        if self.state.last_response.is_empty() {
            return Err(Rejected::NothingToRepeat);
        }
        let text = self.state.last_response.clone();
        self.begin_speaking(text);
        Ok(())
    }

    fn acknowledge_error(&mut self) -> Result<(), Rejected> {
        if self.state.phase != Phase::Idle {
            return Err(Rejected::Busy);
        }
        if self.state.last_error.take().is_some() {
            self.publish();
        }
        Ok(())
    }

    // ── Events ──────────────────────────────────────────────────────

    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::Capture { attempt, event } => self.on_capture(attempt, event),
            Event::CaptureTimeout { attempt } => self.on_capture_timeout(attempt),
            Event::Resolved { turn, outcome } => self.on_resolved(turn, outcome),
            Event::Playback { turn, event } => self.on_playback(turn, event),
        }
    }

    fn on_capture(&mut self, attempt: u64, event: CaptureEvent) {
        if attempt != self.attempt || self.state.phase != Phase::Listening {
            debug!(attempt, ?event, phase = %self.state.phase, "Ignoring stale capture event");
            return;
        }

        match event {
            CaptureEvent::Result(text) => {
                let text = text.trim().to_string();
                if text.is_empty() {
                    self.fail(ErrorInfo::from(&CaptureError::from(CaptureErrorKind::NoMatch)));
                    return;
                }
                info!(transcript = %text, "Transcription received");
                self.state.transcript = text.clone();
                self.begin_resolving(text);
            }
            CaptureEvent::End => {
                debug!(attempt, "Capture ended without a result");
                self.set_phase(Phase::Idle);
            }
            CaptureEvent::Error(kind) => {
                warn!(attempt, %kind, "Speech capture error");
                self.fail(ErrorInfo::from(&CaptureError::from(kind)));
            }
        }
    }

    fn on_capture_timeout(&mut self, attempt: u64) {
        if attempt != self.attempt || self.state.phase != Phase::Listening {
            return;
        }
        warn!(attempt, "Listening timed out");
        self.capture.stop();
        self.attempt += 1;
        self.fail(ErrorInfo::from(&CaptureError::new(
            CaptureErrorKind::NoMatch,
            "listening timed out",
        )));
    }

    fn on_resolved(&mut self, turn: u64, outcome: Result<Resolution, String>) {
        if turn != self.turn || self.state.phase != Phase::Resolving {
            debug!(turn, phase = %self.state.phase, "Ignoring stale resolution");
            return;
        }

        match outcome {
            Ok(resolution) => self.complete_turn(resolution),
            Err(reason) => {
                error!(%reason, "Resolver failed, using fallback responder");
                let resolution = self.resolver.fallback(&self.state.transcript, None);
                self.complete_turn(resolution);
                self.state.last_error = Some(ErrorInfo::notice(
                    ErrorKind::Internal,
                    format!("Using fallback response ({})", reason),
                ));
                self.publish();
            }
        }
    }

    fn on_playback(&mut self, turn: u64, event: PlaybackEvent) {
        if turn != self.turn || self.state.phase != Phase::Speaking {
            debug!(turn, ?event, phase = %self.state.phase, "Ignoring stale playback event");
            return;
        }

        match event {
            PlaybackEvent::StateChanged(playing) => {
                self.state.audio_playing = playing;
                self.publish();
            }
            PlaybackEvent::Finished(Ok(())) => {
                self.state.audio_playing = false;
                self.set_phase(Phase::Idle);
            }
            PlaybackEvent::Finished(Err(err)) => {
                warn!(error = %err, "Reply could not be spoken");
                self.state.audio_playing = false;
                self.fail(ErrorInfo::from(&err));
            }
        }
    }

    // ── Transitions ─────────────────────────────────────────────────

    fn begin_resolving(&mut self, text: String) {
        self.turn += 1;
        self.set_phase(Phase::Resolving);

        if let Some(resolution) = self
            .resolver
            .intercept_command(&text, &mut self.state.history)
        {
            self.complete_turn(resolution);
            return;
        }

        let context = self.state.history.recent_window(CONTEXT_WINDOW).to_vec();
        let resolver = Arc::clone(&self.resolver);
        let events = self.events_tx.clone();
        let turn = self.turn;
        tokio::spawn(async move {
            let task = tokio::spawn(async move { resolver.reply(&text, &context).await });
            let outcome = task.await.map_err(|e| e.to_string());
            let _ = events.send(Event::Resolved { turn, outcome });
        });
    }

    /// Record the reply, then speak it unless it only acknowledges a clear.
    fn complete_turn(&mut self, resolution: Resolution) {
        self.state.last_response = resolution.text.clone();
        if let Some(notice) = &resolution.notice {
            self.state.last_error = Some(ErrorInfo::from(notice));
        }

        if resolution.is_clear_ack() {
            self.set_phase(Phase::Idle);
            return;
        }

        self.state.history.append(ConversationEntry::voice(
            self.state.transcript.clone(),
            resolution.text.clone(),
        ));
        info!(
            source = ?resolution.source,
            history = self.state.history.len(),
            "Turn recorded"
        );
        self.begin_speaking(resolution.text);
    }

    fn begin_speaking(&mut self, text: String) {
        self.turn += 1;
        self.set_phase(Phase::Speaking);

        let playback = Arc::clone(&self.playback);
        let events = self.events_tx.clone();
        let turn = self.turn;
        tokio::spawn(async move {
            let state_events = events.clone();
            let task = tokio::spawn(async move {
                playback
                    .speak(&text, move |playing| {
                        let _ = state_events.send(Event::Playback {
                            turn,
                            event: PlaybackEvent::StateChanged(playing),
                        });
                    })
                    .await
            });
            let result = match task.await {
                Ok(result) => result,
                Err(e) => Err(SpeakError::Playback(PlaybackError::Failed(e.to_string()))),
            };
            let _ = events.send(Event::Playback {
                turn,
                event: PlaybackEvent::Finished(result),
            });
        });
    }

    fn arm_capture_timeout(&self, attempt: u64) {
        let Some(timeout) = self.config.speech_timeout else {
            return;
        };
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = events.send(Event::CaptureTimeout { attempt });
        });
    }

    /// Report a failure and return to Idle.
    fn fail(&mut self, info: ErrorInfo) {
        self.state.last_error = Some(info);
        self.set_phase(Phase::Error);
        self.set_phase(Phase::Idle);
    }

    fn set_phase(&mut self, phase: Phase) {
        debug!(from = %self.state.phase, to = %phase, "Phase change");
        self.state.phase = phase;
        self.publish();
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.state.snapshot());
    }
}

// ── Handle ──────────────────────────────────────────────────────────

/// A command plus the channel its outcome is reported on.
pub struct CommandRequest {
    command: Command,
    reply: oneshot::Sender<Result<(), Rejected>>,
}

/// Outcome of a command, available once the orchestrator has processed it.
pub struct CommandReceipt {
    rx: oneshot::Receiver<Result<(), Rejected>>,
}

impl CommandReceipt {
    pub async fn outcome(self) -> Result<(), Rejected> {
        self.rx.await.unwrap_or(Err(Rejected::Closed))
    }
}

/// Cloneable, non-blocking front end to a spawned orchestrator.
#[derive(Clone)]
pub struct OrchestratorHandle {
    commands: mpsc::UnboundedSender<CommandRequest>,
    snapshots: watch::Receiver<SessionSnapshot>,
}

impl OrchestratorHandle {
    /// Queue `command` and return immediately.
    pub fn send(&self, command: Command) -> CommandReceipt {
        let (reply, rx) = oneshot::channel();
        // On a closed channel the request (and `reply`) is dropped, so the
        // receipt resolves to `Rejected::Closed`.
        let _ = self.commands.send(CommandRequest { command, reply });
        CommandReceipt { rx }
    }

    pub fn start_listening(&self) -> CommandReceipt {
        self.send(Command::StartListening)
    }

    pub fn stop(&self) -> CommandReceipt {
        self.send(Command::Stop)
    }

    pub fn clear(&self) -> CommandReceipt {
        self.send(Command::Clear)
    }

    pub fn repeat_last(&self) -> CommandReceipt {
        self.send(Command::RepeatLast)
    }

    pub fn acknowledge_error(&self) -> CommandReceipt {
        self.send(Command::AcknowledgeError)
    }

    /// Latest published state.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }
}
