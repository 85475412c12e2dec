use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use streamtools_core::audio::{
    output_device_names, AlertSoundPlayer, CommandSpeechRenderer, RodioAudioOutput, SoundStretch,
};
use streamtools_core::auth::CredentialManager;
use streamtools_core::cache::{ChatLog, TrimPolicy};
use streamtools_core::chat::{parse_alert_line, parse_console_line, ChatHub};
use streamtools_core::config::{default_chat_log_path, default_config_path, ConfigStore};
use streamtools_core::eventbus::{AppEvent, EventBus};
use streamtools_core::platforms::twitch_helix::HelixIdentityApi;
use streamtools_core::playback::PlaybackDeps;
use streamtools_core::services::{SessionContext, SessionSupervisor};
use streamtools_core::tasks::{spawn_credential_check_task, spawn_session_reconcile_task};

#[derive(Parser, Debug, Clone)]
#[command(name = "streamtools")]
#[command(author, version, about = "Speaks Twitch chat aloud, one queue per channel")]
struct Args {
    /// Path to config.json. Defaults to the per-user config directory.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Read chat lines of the form "#channel User: message" from stdin.
    /// "!alert <file> [volume]" lines queue an alert sound instead.
    #[arg(long)]
    stdin_chat: bool,

    /// Print the audio output device names and exit.
    #[arg(long)]
    list_devices: bool,
}

fn init_tracing() {
    if let Err(e) = tracing_log::LogTracer::init() {
        eprintln!("log bridge unavailable: {e}");
    }
    let filter = EnvFilter::from_default_env()
        .add_directive("streamtools=info".parse().unwrap_or_default())
        .add_directive("streamtools_core=info".parse().unwrap_or_default());
    let sub = fmt().with_env_filter(filter).finish();
    if let Err(e) = tracing::subscriber::set_global_default(sub) {
        eprintln!("could not set global subscriber: {e}");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();

    if args.list_devices {
        for name in output_device_names() {
            println!("{name}");
        }
        return Ok(());
    }

    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    info!("streamtools starting. config={}", config_path.display());
    let config = Arc::new(ConfigStore::load(config_path));
    let settings = config.snapshot();

    let bus = EventBus::new();
    let hub = Arc::new(ChatHub::new());

    let log_path = settings
        .chat_log
        .path
        .as_deref()
        .map(PathBuf::from)
        .unwrap_or_else(default_chat_log_path);
    let chat_log = Arc::new(ChatLog::open(log_path, TrimPolicy::from(&settings.chat_log)));

    let output = Arc::new(RodioAudioOutput::new());
    // queued from the stdin console; speech waits while one plays
    let alerts = Arc::new(AlertSoundPlayer::start(output.clone())?);
    let deps = PlaybackDeps {
        renderer: Arc::new(CommandSpeechRenderer::new(config.clone())),
        effects: Some(Arc::new(SoundStretch::new(config.clone()))),
        output,
        alerts: Some(alerts.clone()),
    };

    let ctx = SessionContext::new(config.clone(), hub.clone(), chat_log, deps).with_bus(bus.clone());
    let supervisor = Arc::new(SessionSupervisor::new(ctx));

    let api = Arc::new(HelixIdentityApi::new(config.clone()));
    let credentials = Arc::new(CredentialManager::new(config.clone(), api, bus.clone()));

    let cancel = CancellationToken::new();
    let logger_handle = spawn_event_logger(&bus);
    let reconcile_handle = spawn_session_reconcile_task(
        supervisor.clone(),
        Duration::from_millis(settings.reconcile_interval_millis.max(1)),
        cancel.clone(),
    );
    let credential_handle = spawn_credential_check_task(
        credentials,
        Duration::from_secs(settings.credential_check_interval_secs.max(1)),
        cancel.clone(),
    );

    if args.stdin_chat {
        spawn_stdin_chat(hub.clone(), alerts.clone(), cancel.clone());
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {e:?}");
    }
    info!("Ctrl-C detected; shutting down...");
    cancel.cancel();

    for (name, handle) in [("reconcile", reconcile_handle), ("credentials", credential_handle)] {
        if let Err(e) = handle.await {
            warn!("{name} task ended abnormally => {e}");
        }
    }

    hub.clear_all();
    alerts.shutdown();
    bus.shutdown();
    logger_handle.abort();
    info!("streamtools stopped.");
    Ok(())
}

fn spawn_event_logger(bus: &EventBus) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match &event {
                AppEvent::NowSpeaking { channel, user } => info!("[#{channel}] speaking for {user}"),
                AppEvent::CredentialsStatusChanged(valid) => info!("Twitch credentials valid: {valid}"),
                other => info!("event: {}", other.event_type()),
            }
        }
    })
}

fn spawn_stdin_chat(
    hub: Arc<ChatHub>,
    alerts: Arc<AlertSoundPlayer>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let line = tokio::select! {
                _ = cancel.cancelled() => break,
                line = lines.next_line() => line,
            };
            match line {
                Ok(Some(line)) => {
                    if let Some(alert) = parse_alert_line(&line) {
                        if !alerts.queue_sound(&alert.file, None, alert.volume, None) {
                            warn!("alert {:?} was not queued", alert.file);
                        }
                        continue;
                    }
                    match parse_console_line(&line) {
                        Some(evt) => {
                            if hub.dispatch(&evt) == 0 {
                                warn!("no session listening on #{}", evt.channel);
                            }
                        }
                        None => warn!("expected \"#channel User: message\", got {line:?}"),
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    error!("stdin read failed => {e}");
                    break;
                }
            }
        }
    })
}
