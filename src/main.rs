//! Jarvis voice assistant: host process entry point.
//!
//! Communicates with the host UI via JSON-line IPC on stdin/stdout. The host
//! owns the speech recognizer and forwards its callbacks as `capture_*`
//! commands; everything else (resolving, speaking, history) runs here.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use jarvis_voice::capture::{CaptureEvent, IpcCapture, IpcCaptureFeed};
use jarvis_voice::config::paths::get_log_dir;
use jarvis_voice::config::load_assistant_config;
use jarvis_voice::ipc::bridge::{emit_event, spawn_stdin_reader, spawn_stdout_writer};
use jarvis_voice::ipc::{VoiceCommand, VoiceEvent};
use jarvis_voice::orchestrator::{
    CommandReceipt, OrchestratorConfig, OrchestratorHandle, VoiceOrchestrator,
};
use jarvis_voice::playback::{OpenAiSpeech, PlaybackCoordinator, RodioOutput, VoiceParams};
use jarvis_voice::resolver::openai::OpenAiChat;
use jarvis_voice::resolver::ResponseResolver;
use jarvis_voice::{logging, ResponseGenerator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Emit starting event immediately so the host knows we're alive.
    emit_event(&VoiceEvent::Starting {});

    // The debug flag lives in the config, so read it first and report any
    // problems with it once logging is up.
    let (config, config_problems) = load_assistant_config();
    if let Err(e) = logging::init(&get_log_dir(), config.app.debug_mode) {
        eprintln!("Logging unavailable: {e:#}");
    }
    for problem in &config_problems {
        warn!("{}", problem);
    }
    info!(
        name = %config.app.name,
        model = %config.openai.model,
        configured = config.is_configured(),
        "Configuration loaded"
    );

    let events = spawn_stdout_writer();

    // Response resolution
    let chat = OpenAiChat::from_config(&config.openai)?;
    info!(provider = %chat.name(), model = %chat.model(), "Response service initialized");
    let resolver = Arc::new(ResponseResolver::new(Box::new(chat)));
    let provider_configured = resolver.provider_configured();
    if !provider_configured {
        warn!("No API key configured, replies will come from the offline responder");
    }

    // Playback
    let voice = VoiceParams {
        model: config.openai.tts_model.clone(),
        voice: config.openai.tts_voice.clone(),
        speed: config.openai.tts_speed,
    };
    let playback = Arc::new(PlaybackCoordinator::new(
        Box::new(OpenAiSpeech::from_config(&config.openai)?),
        Box::new(RodioOutput::new(config.openai.tts_volume)),
        voice,
    ));

    // Capture: unavailable until the host reports a recognizer.
    let (capture, feed) = IpcCapture::new(false, events.clone());

    let orchestrator = VoiceOrchestrator::new(
        Box::new(capture),
        resolver,
        Arc::clone(&playback),
        OrchestratorConfig {
            speech_timeout: config.speech_timeout(),
        },
    );
    let handle = orchestrator.spawn();
    spawn_state_forwarder(&handle, events.clone());

    let mut cmd_rx = spawn_stdin_reader();

    let _ = events.send(VoiceEvent::Ready {
        name: config.app.name.clone(),
        provider_configured,
    });
    info!("Voice assistant ready");

    // Main loop: process commands from the host
    loop {
        match cmd_rx.recv().await {
            Some(command) => {
                if !handle_command(command, &handle, &feed, &events) {
                    break; // Shutdown command received
                }
            }
            None => {
                // stdin closed, parent process gone
                info!("stdin closed, shutting down");
                break;
            }
        }
    }

    info!("Voice assistant shutting down");
    // The runtime waits for blocking tasks, so cut any reply short.
    playback.stop();
    Ok(())
}

/// Handle a single command from the host.
/// Returns `false` if the main loop should exit.
fn handle_command(
    cmd: VoiceCommand,
    handle: &OrchestratorHandle,
    feed: &IpcCaptureFeed,
    events: &mpsc::UnboundedSender<VoiceEvent>,
) -> bool {
    let name = cmd.name();
    match cmd {
        VoiceCommand::Ping {} => {
            let _ = events.send(VoiceEvent::Pong {});
        }

        VoiceCommand::Shutdown {} => {
            // Written directly so it lands before the process exits.
            emit_event(&VoiceEvent::Stopping {});
            return false;
        }

        VoiceCommand::StartListening {} => report_rejection(name, handle.start_listening(), events),
        VoiceCommand::StopListening {} => report_rejection(name, handle.stop(), events),
        VoiceCommand::Clear {} => report_rejection(name, handle.clear(), events),
        VoiceCommand::RepeatLast {} => report_rejection(name, handle.repeat_last(), events),
        VoiceCommand::AcknowledgeError {} => {
            report_rejection(name, handle.acknowledge_error(), events)
        }

        VoiceCommand::CaptureAvailable { available } => {
            info!(available, "Host recognizer availability changed");
            feed.set_available(available);
        }
        VoiceCommand::CaptureResult { attempt, text } => {
            feed.deliver(attempt, CaptureEvent::Result(text));
        }
        VoiceCommand::CaptureEnd { attempt } => {
            feed.deliver(attempt, CaptureEvent::End);
        }
        VoiceCommand::CaptureError { attempt, kind } => {
            feed.deliver(attempt, CaptureEvent::Error(kind));
        }
    }
    true
}

/// Emit a `rejected` event if the orchestrator turns the command down.
fn report_rejection(
    command: &'static str,
    receipt: CommandReceipt,
    events: &mpsc::UnboundedSender<VoiceEvent>,
) {
    let events = events.clone();
    tokio::spawn(async move {
        if let Err(reason) = receipt.outcome().await {
            let _ = events.send(VoiceEvent::Rejected {
                command: command.to_string(),
                reason,
            });
        }
    });
}

/// Forward every published session snapshot to the host.
fn spawn_state_forwarder(handle: &OrchestratorHandle, events: mpsc::UnboundedSender<VoiceEvent>) {
    let mut snapshots = handle.subscribe();
    tokio::spawn(async move {
        loop {
            let snapshot = snapshots.borrow_and_update().clone();
            if events.send(VoiceEvent::State { snapshot }).is_err() {
                break;
            }
            if snapshots.changed().await.is_err() {
                info!("Orchestrator stopped publishing state");
                break;
            }
        }
    });
}
