// streamtools-core/src/playback/engine.rs
//
// One engine per channel session: an unbounded FIFO of utterances drained by
// a dedicated thread that renders, post-processes and plays them strictly one
// at a time. Controls (pause/resume/skip) may be called from any thread.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tempfile::TempPath;
use tracing::{debug, error, info, warn};

use super::signal::CompletionSignal;
use crate::config::ConfigStore;
use crate::eventbus::{AppEvent, EventBus};
use crate::models::{ChannelConfig, PlaybackRequest};
use crate::traits::{AlertMonitor, AudioEffects, AudioOutput, PlaybackStream, SpeechRenderer};
use crate::Error;

/// How long `shutdown` waits for the playback thread before abandoning it.
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

const ALERT_POLL_INTERVAL: Duration = Duration::from_millis(100);
const ALERT_WAIT_LIMIT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Rendering,
    Playing,
    /// Terminal; the playback thread has exited.
    Stopped,
}

/// Collaborators the playback thread drives.
#[derive(Clone)]
pub struct PlaybackDeps {
    pub renderer: Arc<dyn SpeechRenderer>,
    pub effects: Option<Arc<dyn AudioEffects>>,
    pub output: Arc<dyn AudioOutput>,
    pub alerts: Option<Arc<dyn AlertMonitor>>,
}

enum QueueItem {
    Utterance(PlaybackRequest),
    Shutdown,
}

struct Shared {
    channel: String,
    config: Arc<ConfigStore>,
    deps: PlaybackDeps,
    bus: Option<EventBus>,

    stop: AtomicBool,
    skip_count: AtomicUsize,
    state: Mutex<EngineState>,
    current_speaker: Mutex<String>,

    // Lock order: `stream` before `signal`.
    stream: Mutex<Option<Box<dyn PlaybackStream>>>,
    signal: Mutex<Option<Arc<CompletionSignal>>>,
}

pub struct PlaybackEngine {
    shared: Arc<Shared>,
    queue: Sender<QueueItem>,
    done: Receiver<()>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl PlaybackEngine {
    /// Spawns the playback thread for `channel`. Voice, volume and device are
    /// looked up in `config` for every utterance.
    pub fn start(
        channel: &str,
        config: Arc<ConfigStore>,
        deps: PlaybackDeps,
        bus: Option<EventBus>,
    ) -> Result<Self, Error> {
        let (queue_tx, queue_rx) = unbounded();
        let (done_tx, done_rx) = bounded::<()>(1);

        let shared = Arc::new(Shared {
            channel: channel.to_string(),
            config,
            deps,
            bus,
            stop: AtomicBool::new(false),
            skip_count: AtomicUsize::new(0),
            state: Mutex::new(EngineState::Idle),
            current_speaker: Mutex::new(String::new()),
            stream: Mutex::new(None),
            signal: Mutex::new(None),
        });

        let worker = shared.clone();
        let handle = thread::Builder::new()
            .name(format!("tts-{channel}"))
            .spawn(move || {
                worker.consume(queue_rx);
                let _ = done_tx.send(());
            })?;

        Ok(Self {
            shared,
            queue: queue_tx,
            done: done_rx,
            thread: Mutex::new(Some(handle)),
        })
    }

    pub fn channel(&self) -> &str {
        &self.shared.channel
    }

    /// Appends to the queue. Never blocks.
    pub fn enqueue(&self, request: PlaybackRequest) {
        if self.shared.stop.load(Ordering::SeqCst) {
            debug!("(PlaybackEngine) #{} stopped; dropping '{}'", self.shared.channel, request.text);
            return;
        }
        if self.queue.send(QueueItem::Utterance(request)).is_err() {
            warn!("(PlaybackEngine) #{} playback thread is gone", self.shared.channel);
        }
    }

    /// Number of utterances waiting (not counting the one playing).
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn state(&self) -> EngineState {
        *self.shared.state.lock()
    }

    /// Login of the sender whose message is playing, or empty.
    pub fn current_speaker(&self) -> String {
        self.shared.current_speaker.lock().clone()
    }

    pub fn pause(&self) {
        let mut stream = self.shared.stream.lock();
        if let Some(s) = stream.as_mut() {
            if let Err(e) = s.pause() {
                warn!("(PlaybackEngine) #{} pause failed => {e}", self.shared.channel);
            }
        }
    }

    pub fn resume(&self) {
        let mut stream = self.shared.stream.lock();
        if let Some(s) = stream.as_mut() {
            if let Err(e) = s.resume() {
                warn!("(PlaybackEngine) #{} resume failed => {e}", self.shared.channel);
            }
        }
    }

    /// Stops the utterance that is playing; the next queued one follows.
    pub fn skip_current(&self) {
        self.shared.stop_stream(false);
    }

    /// Discards everything queued right now, and stops the current utterance.
    /// Requests enqueued afterwards play normally.
    pub fn skip_all(&self) {
        let pending = self.queue.len();
        self.shared.skip_count.store(pending, Ordering::SeqCst);
        info!("(PlaybackEngine) #{} skipping {pending} queued message(s)", self.shared.channel);
        self.shared.stop_stream(false);
    }

    /// Stops the thread and waits up to `timeout` for it to exit. Returns
    /// false if it had to be abandoned.
    pub fn shutdown(&self, timeout: Duration) -> bool {
        let Some(handle) = self.thread.lock().take() else {
            return true;
        };
        self.signal_stop();

        match self.done.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if handle.join().is_err() {
                    error!("(PlaybackEngine) #{} playback thread panicked", self.shared.channel);
                }
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    "(PlaybackEngine) #{} playback thread did not exit within {:?}; abandoning it",
                    self.shared.channel, timeout
                );
                false
            }
        }
    }

    fn signal_stop(&self) {
        self.shared.stop.store(true, Ordering::SeqCst);
        let _ = self.queue.send(QueueItem::Shutdown);
        self.shared.stop_stream(true);
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        if self.thread.lock().is_some() {
            self.signal_stop();
        }
    }
}

impl Shared {
    fn consume(&self, queue: Receiver<QueueItem>) {
        debug!("(PlaybackEngine) #{} playback thread started", self.channel);

        while let Ok(item) = queue.recv() {
            if self.stop.load(Ordering::SeqCst) {
                break;
            }
            let request = match item {
                QueueItem::Utterance(r) => r,
                QueueItem::Shutdown => break,
            };

            if self.take_skip() {
                info!("(PlaybackEngine) #{} skipped: {} says {}", self.channel, request.user_login, request.text);
                continue;
            }

            match catch_unwind(AssertUnwindSafe(|| self.speak(&request))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!("(PlaybackEngine) #{} could not speak '{}' => {e}", self.channel, request.text);
                }
                Err(_) => {
                    error!("(PlaybackEngine) #{} panicked while speaking '{}'", self.channel, request.text);
                }
            }
            self.finish_item();
        }

        self.set_state(EngineState::Stopped);
        debug!("(PlaybackEngine) #{} playback thread exiting", self.channel);
    }

    fn take_skip(&self) -> bool {
        self.skip_count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    /// Render, post-process, wait out alerts, then block until playback ends.
    /// Working files are removed when this returns, on every path.
    fn speak(&self, request: &PlaybackRequest) -> Result<(), Error> {
        self.set_state(EngineState::Rendering);

        let cfg = self
            .config
            .channel(&self.channel)
            .unwrap_or_else(|| ChannelConfig::new(&self.channel));
        let volume = cfg.tts_volume.min(100);
        let device = cfg.output_device.as_deref();

        let rendered = temp_wav()?;
        self.deps.renderer.render(&request.text, cfg.tts_voice.as_deref(), volume, &rendered)?;

        let processed = temp_wav()?;
        let use_processed = match &self.deps.effects {
            Some(fx) => fx.process(&rendered, &processed).unwrap_or_else(|e| {
                warn!("(PlaybackEngine) #{} effects failed => {e}", self.channel);
                false
            }),
            None => false,
        };
        let file: &Path = if use_processed { &processed } else { &rendered };

        self.wait_for_alerts();

        let signal = Arc::new(CompletionSignal::new());
        {
            let mut stream_slot = self.stream.lock();
            let mut signal_slot = self.signal.lock();
            if self.stop.load(Ordering::SeqCst) {
                return Ok(());
            }

            let mut stream = self.deps.output.open(file, device, volume)?;
            // speaker and state are visible before any audio starts
            *self.current_speaker.lock() = request.user_login.clone();
            self.set_state(EngineState::Playing);

            let done = signal.clone();
            if let Err(e) = stream.play(Box::new(move || done.set())) {
                self.current_speaker.lock().clear();
                self.set_state(EngineState::Rendering);
                return Err(e);
            }

            *stream_slot = Some(stream);
            *signal_slot = Some(signal.clone());
        }
        self.publish(AppEvent::NowSpeaking {
            channel: self.channel.clone(),
            user: request.user_login.clone(),
        });

        signal.wait();
        Ok(())
    }

    fn finish_item(&self) {
        let was_speaking = {
            let mut stream_slot = self.stream.lock();
            let mut signal_slot = self.signal.lock();
            *stream_slot = None;
            *signal_slot = None;
            let mut speaker = self.current_speaker.lock();
            !std::mem::take(&mut *speaker).is_empty()
        };
        if was_speaking {
            self.publish(AppEvent::DoneSpeaking { channel: self.channel.clone() });
        }
        if !self.stop.load(Ordering::SeqCst) {
            self.set_state(EngineState::Idle);
        }
    }

    /// Stops the active stream and releases the waiting loop. With `release`
    /// the stream is also dropped.
    fn stop_stream(&self, release: bool) {
        let mut stream_slot = self.stream.lock();
        let signal_slot = self.signal.lock();
        if let Some(stream) = stream_slot.as_mut() {
            if let Err(e) = stream.stop() {
                warn!("(PlaybackEngine) #{} stop failed => {e}", self.channel);
            }
        }
        if release {
            *stream_slot = None;
        }
        if let Some(sig) = signal_slot.as_ref() {
            sig.set();
        }
    }

    fn wait_for_alerts(&self) {
        let Some(alerts) = &self.deps.alerts else {
            return;
        };
        let deadline = Instant::now() + ALERT_WAIT_LIMIT;
        while alerts.is_playing() && !self.stop.load(Ordering::SeqCst) {
            if Instant::now() >= deadline {
                warn!("(PlaybackEngine) #{} alert sound still playing; speaking anyway", self.channel);
                break;
            }
            thread::sleep(ALERT_POLL_INTERVAL);
        }
    }

    fn set_state(&self, state: EngineState) {
        *self.state.lock() = state;
    }

    fn publish(&self, event: AppEvent) {
        if let Some(bus) = &self.bus {
            bus.publish(event);
        }
    }
}

fn temp_wav() -> Result<TempPath, Error> {
    Ok(tempfile::Builder::new()
        .prefix("streamtools-tts-")
        .suffix(".wav")
        .tempfile()?
        .into_temp_path())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AppConfig;
    use crate::test_utils::fakes::{
        wait_for, FakeAlerts, FakeEffects, FakeRenderer, GatedOutput, InstantOutput,
    };

    const WAIT: Duration = Duration::from_secs(3);

    fn config() -> Arc<ConfigStore> {
        let mut cfg = AppConfig::default();
        cfg.twitch_chats = vec![ChannelConfig::new("alice")];
        Arc::new(ConfigStore::in_memory(cfg))
    }

    fn request(text: &str) -> PlaybackRequest {
        PlaybackRequest {
            text: text.into(),
            channel: "alice".into(),
            user_login: format!("u_{text}"),
        }
    }

    fn engine_with(
        renderer: Arc<FakeRenderer>,
        output: Arc<dyn AudioOutput>,
        effects: Option<Arc<dyn AudioEffects>>,
        alerts: Option<Arc<dyn AlertMonitor>>,
    ) -> PlaybackEngine {
        let deps = PlaybackDeps { renderer, effects, output, alerts };
        PlaybackEngine::start("alice", config(), deps, None).unwrap()
    }

    fn gated() -> (PlaybackEngine, GatedOutput, Arc<FakeRenderer>) {
        let output = GatedOutput::new();
        let renderer = Arc::new(FakeRenderer::new());
        let engine = engine_with(renderer.clone(), Arc::new(output.clone()), None, None);
        (engine, output, renderer)
    }

    #[test]
    fn test_plays_in_fifo_order_one_at_a_time() {
        let (engine, output, _) = gated();
        for t in ["a", "b", "c"] {
            engine.enqueue(request(t));
        }

        assert!(output.wait_started(1, WAIT));
        assert_eq!(engine.current_speaker(), "u_a");
        assert_eq!(engine.state(), EngineState::Playing);
        // nothing else starts while "a" is playing
        thread::sleep(Duration::from_millis(50));
        assert_eq!(output.started(), 1);

        assert!(output.finish_current());
        assert!(output.wait_started(2, WAIT));
        assert_eq!(engine.current_speaker(), "u_b");
        assert!(output.finish_current());
        assert!(output.wait_started(3, WAIT));
        assert!(output.finish_current());

        assert!(wait_for(WAIT, || engine.state() == EngineState::Idle));
        assert_eq!(engine.current_speaker(), "");
        assert_eq!(output.played(), vec!["a", "b", "c"]);
        assert!(engine.shutdown(WAIT));
    }

    #[test]
    fn test_skip_all_discards_exactly_the_queued_items() {
        let (engine, output, renderer) = gated();
        engine.enqueue(request("first"));
        assert!(output.wait_started(1, WAIT));

        for t in ["x", "y", "z"] {
            engine.enqueue(request(t));
        }
        assert_eq!(engine.queue_len(), 3);
        engine.skip_all();
        engine.enqueue(request("after"));

        assert!(output.wait_started(2, WAIT));
        assert_eq!(output.played(), vec!["first", "after"]);
        assert_eq!(renderer.rendered(), vec!["first", "after"]);
        assert!(output.finish_current());
        assert!(engine.shutdown(WAIT));
    }

    #[test]
    fn test_skip_current_advances_without_discarding() {
        let (engine, output, _) = gated();
        engine.enqueue(request("one"));
        engine.enqueue(request("two"));
        assert!(output.wait_started(1, WAIT));

        engine.skip_current();
        assert!(output.wait_started(2, WAIT));
        assert_eq!(output.played(), vec!["one", "two"]);
        assert_eq!(output.events(), vec!["stop"]);
        assert!(output.finish_current());
        assert!(engine.shutdown(WAIT));
    }

    #[test]
    fn test_pause_and_resume_reach_the_playing_stream_only() {
        let (engine, output, _) = gated();
        // nothing playing: no effect
        engine.pause();
        assert!(output.events().is_empty());

        engine.enqueue(request("one"));
        assert!(output.wait_started(1, WAIT));
        engine.pause();
        engine.resume();
        assert_eq!(output.events(), vec!["pause", "resume"]);
        assert!(output.finish_current());
        assert!(engine.shutdown(WAIT));
    }

    #[test]
    fn test_synthesis_failure_moves_on() {
        let output = InstantOutput::new();
        let renderer = Arc::new(FakeRenderer::new());
        renderer.fail_on("bad");
        let engine = engine_with(renderer, Arc::new(output.clone()), None, None);

        engine.enqueue(request("bad"));
        engine.enqueue(request("good"));
        assert!(wait_for(WAIT, || output.played() == vec!["good".to_string()]));
        assert!(engine.shutdown(WAIT));
    }

    #[test]
    fn test_device_failure_moves_on() {
        let (engine, output, renderer) = gated();
        output.set_fail_open(true);
        engine.enqueue(request("lost"));
        assert!(wait_for(WAIT, || {
            renderer.rendered().len() == 1 && engine.state() == EngineState::Idle
        }));

        output.set_fail_open(false);
        engine.enqueue(request("heard"));
        assert!(output.wait_started(1, WAIT));
        assert_eq!(output.played(), vec!["heard"]);
        assert!(output.finish_current());
        assert!(engine.shutdown(WAIT));
    }

    #[test]
    fn test_failed_start_clears_speaker_without_announcing() {
        let output = GatedOutput::new();
        let renderer = Arc::new(FakeRenderer::new());
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let deps = PlaybackDeps {
            renderer: renderer.clone(),
            effects: None,
            output: Arc::new(output.clone()),
            alerts: None,
        };
        let engine = PlaybackEngine::start("alice", config(), deps, Some(bus)).unwrap();

        output.set_fail_play(true);
        engine.enqueue(request("muted"));
        assert!(wait_for(WAIT, || {
            renderer.rendered().len() == 1 && engine.state() == EngineState::Idle
        }));
        assert_eq!(engine.current_speaker(), "");
        assert!(rx.try_recv().is_err());

        output.set_fail_play(false);
        engine.enqueue(request("heard"));
        assert!(output.wait_started(1, WAIT));
        assert_eq!(engine.current_speaker(), "u_heard");
        assert!(output.finish_current());
        assert!(wait_for(WAIT, || engine.state() == EngineState::Idle));

        let mut events = Vec::new();
        while let Ok(evt) = rx.try_recv() {
            events.push(evt);
        }
        assert_eq!(
            events,
            vec![
                AppEvent::NowSpeaking { channel: "alice".into(), user: "u_heard".into() },
                AppEvent::DoneSpeaking { channel: "alice".into() },
            ]
        );
        assert!(engine.shutdown(WAIT));
    }

    #[test]
    fn test_effects_output_is_played_when_applied() {
        let output = InstantOutput::new();
        let fx = Arc::new(FakeEffects::new(true));
        let engine = engine_with(Arc::new(FakeRenderer::new()), Arc::new(output.clone()), Some(fx.clone()), None);
        engine.enqueue(request("hello"));
        assert!(wait_for(WAIT, || output.played() == vec!["HELLO".to_string()]));
        assert_eq!(fx.calls.load(Ordering::SeqCst), 1);
        assert!(engine.shutdown(WAIT));
    }

    #[test]
    fn test_unmodified_audio_when_effects_decline() {
        let output = InstantOutput::new();
        let fx = Arc::new(FakeEffects::new(false));
        let engine = engine_with(Arc::new(FakeRenderer::new()), Arc::new(output.clone()), Some(fx), None);
        engine.enqueue(request("hello"));
        assert!(wait_for(WAIT, || output.played() == vec!["hello".to_string()]));
        assert!(engine.shutdown(WAIT));
    }

    #[test]
    fn test_working_files_are_removed() {
        let output = InstantOutput::new();
        let renderer = Arc::new(FakeRenderer::new());
        let engine = engine_with(renderer.clone(), Arc::new(output.clone()), None, None);
        engine.enqueue(request("tidy"));
        assert!(wait_for(WAIT, || engine.state() == EngineState::Idle && !output.played().is_empty()));
        assert!(wait_for(WAIT, || renderer.paths().iter().all(|p| !p.exists())));
        assert!(engine.shutdown(WAIT));
    }

    #[test]
    fn test_waits_for_alert_sound() {
        let output = GatedOutput::new();
        let alerts = Arc::new(FakeAlerts::default());
        alerts.playing.store(true, Ordering::SeqCst);
        let engine = engine_with(Arc::new(FakeRenderer::new()), Arc::new(output.clone()), None, Some(alerts.clone()));

        engine.enqueue(request("later"));
        thread::sleep(Duration::from_millis(250));
        assert_eq!(output.started(), 0);

        alerts.playing.store(false, Ordering::SeqCst);
        assert!(output.wait_started(1, WAIT));
        assert!(output.finish_current());
        assert!(engine.shutdown(WAIT));
    }

    #[test]
    fn test_shutdown_while_playing() {
        let (engine, output, _) = gated();
        engine.enqueue(request("long"));
        engine.enqueue(request("never"));
        assert!(output.wait_started(1, WAIT));

        assert!(engine.shutdown(WAIT));
        assert_eq!(engine.state(), EngineState::Stopped);
        assert_eq!(output.played(), vec!["long"]);

        // further requests are ignored
        let pending = engine.queue_len();
        engine.enqueue(request("ignored"));
        assert_eq!(engine.queue_len(), pending);
        assert!(engine.shutdown(WAIT));
    }
}
