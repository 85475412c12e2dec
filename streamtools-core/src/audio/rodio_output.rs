// streamtools-core/src/audio/rodio_output.rs
//
// In-process playback on a rodio `Sink`. The cpal output stream is not `Send`,
// so each utterance gets a thread that owns it for the life of the sound.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use crossbeam_channel::bounded;
use rodio::cpal::traits::{DeviceTrait, HostTrait};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use tracing::{debug, warn};

use crate::traits::{AudioOutput, PlaybackStream, StoppedCallback};
use crate::Error;

type FileSource = Decoder<BufReader<File>>;

/// Index of the device called `wanted`, compared case-insensitively after
/// trimming. `None` for a blank name or no match.
pub fn match_device_name(names: &[String], wanted: &str) -> Option<usize> {
    let wanted = wanted.trim();
    if wanted.is_empty() {
        return None;
    }
    names.iter().position(|n| n.trim().eq_ignore_ascii_case(wanted))
}

/// Names of the output devices on the default host.
pub fn output_device_names() -> Vec<String> {
    let host = rodio::cpal::default_host();
    match host.output_devices() {
        Ok(devices) => devices.filter_map(|d| d.name().ok()).collect(),
        Err(e) => {
            warn!("(RodioAudioOutput) could not list output devices => {e}");
            Vec::new()
        }
    }
}

/// Opens the named device, or the default one when no name is given or the
/// name matches nothing.
fn open_device(device: Option<&str>) -> Result<(OutputStream, OutputStreamHandle), Error> {
    if let Some(wanted) = device.map(str::trim).filter(|d| !d.is_empty()) {
        let host = rodio::cpal::default_host();
        let devices: Vec<_> = host
            .output_devices()
            .map_err(|e| Error::Playback(format!("could not list output devices: {e}")))?
            .collect();
        let names: Vec<String> = devices
            .iter()
            .map(|d| d.name().unwrap_or_default())
            .collect();

        match match_device_name(&names, wanted) {
            Some(idx) => {
                debug!("(RodioAudioOutput) using output device '{}'", names[idx]);
                return OutputStream::try_from_device(&devices[idx])
                    .map_err(|e| Error::Playback(format!("could not open '{wanted}': {e}")));
            }
            None => warn!("(RodioAudioOutput) no output device named '{wanted}'; using the default"),
        }
    }

    OutputStream::try_default()
        .map_err(|e| Error::Playback(format!("could not open the default output device: {e}")))
}

/// Plays decoded files through rodio on a cpal output device.
#[derive(Debug, Default, Clone)]
pub struct RodioAudioOutput;

impl RodioAudioOutput {
    pub fn new() -> Self {
        Self
    }
}

impl AudioOutput for RodioAudioOutput {
    /// Decodes up front so a bad file fails here instead of on the device thread.
    fn open(
        &self,
        file: &Path,
        device: Option<&str>,
        volume: u32,
    ) -> Result<Box<dyn PlaybackStream>, Error> {
        let reader = File::open(file)
            .map_err(|e| Error::Playback(format!("cannot open {}: {e}", file.display())))?;
        let source = Decoder::new(BufReader::new(reader))
            .map_err(|e| Error::Playback(format!("cannot decode {}: {e}", file.display())))?;

        Ok(Box::new(RodioPlaybackStream {
            source: Some(source),
            device: device.map(str::to_string),
            volume: volume.min(100),
            sink: None,
        }))
    }
}

pub struct RodioPlaybackStream {
    source: Option<FileSource>,
    device: Option<String>,
    volume: u32,
    sink: Option<Arc<Sink>>,
}

impl PlaybackStream for RodioPlaybackStream {
    fn play(&mut self, on_stopped: StoppedCallback) -> Result<(), Error> {
        let source = self
            .source
            .take()
            .ok_or_else(|| Error::Playback("stream was already started".into()))?;
        let device = self.device.clone();
        let volume = self.volume as f32 / 100.0;
        let (ready_tx, ready_rx) = bounded::<Result<Arc<Sink>, Error>>(1);

        thread::Builder::new()
            .name("tts-output".into())
            .spawn(move || {
                let (_stream, handle) = match open_device(device.as_deref()) {
                    Ok(pair) => pair,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let sink = match Sink::try_new(&handle) {
                    Ok(sink) => Arc::new(sink),
                    Err(e) => {
                        let _ = ready_tx.send(Err(Error::Playback(format!("could not create sink: {e}"))));
                        return;
                    }
                };
                sink.set_volume(volume);
                sink.append(source);
                if ready_tx.send(Ok(sink.clone())).is_err() {
                    sink.stop();
                    return;
                }

                sink.sleep_until_end();
                debug!("(RodioPlaybackStream) finished");
                on_stopped();
            })?;

        match ready_rx.recv() {
            Ok(Ok(sink)) => {
                self.sink = Some(sink);
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(Error::Playback("output thread exited before playback began".into())),
        }
    }

    fn pause(&mut self) -> Result<(), Error> {
        if let Some(sink) = &self.sink {
            sink.pause();
        }
        Ok(())
    }

    fn resume(&mut self) -> Result<(), Error> {
        if let Some(sink) = &self.sink {
            sink.play();
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), Error> {
        if let Some(sink) = &self.sink {
            sink.stop();
        }
        Ok(())
    }
}

impl Drop for RodioPlaybackStream {
    fn drop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
    }
}
