// File: streamtools-core/src/test_utils/fakes.rs
//
// In-memory stand-ins for the speech, effects, output and alert collaborators.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::traits::{
    AlertMonitor, AudioEffects, AudioOutput, PlaybackStream, SpeechRenderer, StoppedCallback,
};
use crate::Error;

/// Polls `cond` every 10ms until it holds or `timeout` elapses.
pub fn wait_for(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if cond() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
}

/// Writes the text itself into the "wav" so outputs can tell what they play.
#[derive(Default)]
pub struct FakeRenderer {
    pub rendered: Mutex<Vec<String>>,
    pub paths: Mutex<Vec<PathBuf>>,
    fail_on: Mutex<HashSet<String>>,
}

impl FakeRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(&self, text: &str) {
        self.fail_on.lock().insert(text.to_string());
    }

    pub fn rendered(&self) -> Vec<String> {
        self.rendered.lock().clone()
    }

    /// Files the renderer was asked to write.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.paths.lock().clone()
    }
}

impl SpeechRenderer for FakeRenderer {
    fn render(&self, text: &str, _voice: Option<&str>, _volume: u32, output: &Path)
        -> Result<(), Error> {
        if self.fail_on.lock().contains(text) {
            return Err(Error::Synthesis(format!("refusing to render '{text}'")));
        }
        fs::write(output, text)?;
        self.rendered.lock().push(text.to_string());
        self.paths.lock().push(output.to_path_buf());
        Ok(())
    }
}

/// Upper-cases the "audio" and reports success, or reports "use unmodified".
pub struct FakeEffects {
    pub apply: bool,
    pub calls: AtomicUsize,
}

impl FakeEffects {
    pub fn new(apply: bool) -> Self {
        Self { apply, calls: AtomicUsize::new(0) }
    }
}

impl AudioEffects for FakeEffects {
    fn process(&self, input: &Path, output: &Path) -> Result<bool, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.apply {
            return Ok(false);
        }
        let raw = fs::read_to_string(input)?;
        fs::write(output, raw.to_uppercase())?;
        Ok(true)
    }
}

#[derive(Default)]
pub struct FakeAlerts {
    pub playing: AtomicBool,
}

impl AlertMonitor for FakeAlerts {
    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct GateState {
    played: Mutex<Vec<String>>,
    events: Mutex<Vec<String>>,
    current: Mutex<Option<(usize, StoppedCallback)>>,
    started: Mutex<usize>,
    started_cv: Condvar,
    fail_open: AtomicBool,
    fail_play: AtomicBool,
    next_id: AtomicUsize,
}

impl GateState {
    fn fire(&self, id: Option<usize>) -> bool {
        let cb = {
            let mut cur = self.current.lock();
            let is_target = match (cur.as_ref(), id) {
                (Some((cur_id, _)), Some(id)) => *cur_id == id,
                (Some(_), None) => true,
                (None, _) => false,
            };
            if is_target { cur.take().map(|(_, cb)| cb) } else { None }
        };
        match cb {
            Some(cb) => {
                cb();
                true
            }
            None => false,
        }
    }
}

/// Output whose streams play until `finish_current` is called or they are
/// stopped, so tests control exactly when an utterance ends.
#[derive(Clone, Default)]
pub struct GatedOutput {
    state: Arc<GateState>,
}

impl GatedOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Contents of every file that started playing, in order.
    pub fn played(&self) -> Vec<String> {
        self.state.played.lock().clone()
    }

    /// "pause", "resume", "stop" calls in order.
    pub fn events(&self) -> Vec<String> {
        self.state.events.lock().clone()
    }

    pub fn started(&self) -> usize {
        *self.state.started.lock()
    }

    pub fn set_fail_open(&self, fail: bool) {
        self.state.fail_open.store(fail, Ordering::SeqCst);
    }

    /// Streams open fine but refuse to start.
    pub fn set_fail_play(&self, fail: bool) {
        self.state.fail_play.store(fail, Ordering::SeqCst);
    }

    /// Completes the stream that is currently playing. Returns false if none is.
    pub fn finish_current(&self) -> bool {
        self.state.fire(None)
    }

    /// Waits until at least `n` streams have started.
    pub fn wait_started(&self, n: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut started = self.state.started.lock();
        while *started < n {
            if self.state.started_cv.wait_until(&mut started, deadline).timed_out() {
                return *started >= n;
            }
        }
        true
    }
}

impl AudioOutput for GatedOutput {
    fn open(&self, file: &Path, _device: Option<&str>, _volume: u32)
        -> Result<Box<dyn PlaybackStream>, Error> {
        if self.state.fail_open.load(Ordering::SeqCst) {
            return Err(Error::Playback("device unavailable".into()));
        }
        let content = read_label(file);
        Ok(Box::new(GatedStream {
            id: self.state.next_id.fetch_add(1, Ordering::SeqCst),
            content,
            state: self.state.clone(),
        }))
    }
}

struct GatedStream {
    id: usize,
    content: String,
    state: Arc<GateState>,
}

impl PlaybackStream for GatedStream {
    fn play(&mut self, on_stopped: StoppedCallback) -> Result<(), Error> {
        if self.state.fail_play.load(Ordering::SeqCst) {
            return Err(Error::Playback("stream refused to start".into()));
        }
        *self.state.current.lock() = Some((self.id, on_stopped));
        self.state.played.lock().push(self.content.clone());
        let mut started = self.state.started.lock();
        *started += 1;
        self.state.started_cv.notify_all();
        Ok(())
    }

    fn pause(&mut self) -> Result<(), Error> {
        self.state.events.lock().push("pause".into());
        Ok(())
    }

    fn resume(&mut self) -> Result<(), Error> {
        self.state.events.lock().push("resume".into());
        Ok(())
    }

    fn stop(&mut self) -> Result<(), Error> {
        self.state.events.lock().push("stop".into());
        self.state.fire(Some(self.id));
        Ok(())
    }
}

/// Output whose streams finish as soon as they start.
#[derive(Clone, Default)]
pub struct InstantOutput {
    played: Arc<Mutex<Vec<String>>>,
}

impl InstantOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn played(&self) -> Vec<String> {
        self.played.lock().clone()
    }
}

impl AudioOutput for InstantOutput {
    fn open(&self, file: &Path, _device: Option<&str>, _volume: u32)
        -> Result<Box<dyn PlaybackStream>, Error> {
        let content = read_label(file);
        Ok(Box::new(InstantStream { content, played: self.played.clone() }))
    }
}

struct InstantStream {
    content: String,
    played: Arc<Mutex<Vec<String>>>,
}

impl PlaybackStream for InstantStream {
    fn play(&mut self, on_stopped: StoppedCallback) -> Result<(), Error> {
        self.played.lock().push(self.content.clone());
        on_stopped();
        Ok(())
    }

    fn pause(&mut self) -> Result<(), Error> {
        Ok(())
    }

    fn resume(&mut self) -> Result<(), Error> {
        Ok(())
    }

    fn stop(&mut self) -> Result<(), Error> {
        Ok(())
    }
}

/// File contents, or the file name when it cannot be read.
fn read_label(file: &Path) -> String {
    fs::read_to_string(file).unwrap_or_else(|_| file.to_string_lossy().into_owned())
}
