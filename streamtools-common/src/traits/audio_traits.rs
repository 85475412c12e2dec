use std::path::Path;

use crate::error::Error;

/// Converts text to a waveform file. Blocking; called from a playback thread.
pub trait SpeechRenderer: Send + Sync {
    fn render(&self, text: &str, voice: Option<&str>, volume: u32, output: &Path)
        -> Result<(), Error>;
}

/// Optional reshaping of a rendered waveform.
pub trait AudioEffects: Send + Sync {
    /// Returns `Ok(true)` when `output` holds the processed file and should be
    /// played instead of `input`.
    fn process(&self, input: &Path, output: &Path) -> Result<bool, Error>;
}

/// Callback fired exactly once when a stream finishes or is stopped.
pub type StoppedCallback = Box<dyn FnOnce() + Send + 'static>;

/// A started-or-startable output stream for a single waveform.
pub trait PlaybackStream: Send {
    fn play(&mut self, on_stopped: StoppedCallback) -> Result<(), Error>;
    fn pause(&mut self) -> Result<(), Error>;
    fn resume(&mut self) -> Result<(), Error>;
    fn stop(&mut self) -> Result<(), Error>;
}

/// Opens a waveform on an output device.
pub trait AudioOutput: Send + Sync {
    fn open(
        &self,
        file: &Path,
        device: Option<&str>,
        volume: u32,
    ) -> Result<Box<dyn PlaybackStream>, Error>;
}

/// Reports whether an unrelated alert sound is currently audible.
pub trait AlertMonitor: Send + Sync {
    fn is_playing(&self) -> bool;
}
