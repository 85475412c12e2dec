// streamtools-core/src/audio/alerts.rs
//
// Queue for non-chat alert sounds (follows, raids, ...). The playback engine
// consults `is_playing` so speech never talks over an alert.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, warn};

use crate::traits::{AlertMonitor, AudioOutput};
use crate::Error;

pub type AlertCallback = Box<dyn FnOnce() + Send + 'static>;

enum AlertItem {
    Play {
        file: PathBuf,
        device: Option<String>,
        volume: u32,
        callback: Option<AlertCallback>,
    },
    Exit,
}

/// Plays alert sounds one at a time on its own thread. The binary feeds it
/// from `!alert` console lines.
pub struct AlertSoundPlayer {
    queue: Sender<AlertItem>,
    playing: Arc<AtomicBool>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl AlertSoundPlayer {
    pub fn start(output: Arc<dyn AudioOutput>) -> Result<Self, Error> {
        let (tx, rx) = unbounded();
        let playing = Arc::new(AtomicBool::new(false));
        let flag = playing.clone();
        let handle = thread::Builder::new()
            .name("alert-sounds".into())
            .spawn(move || alert_loop(rx, output, flag))?;
        Ok(Self {
            queue: tx,
            playing,
            thread: Mutex::new(Some(handle)),
        })
    }

    /// Queues a sound. Returns false (and queues nothing) for an empty file
    /// name, an empty device name, or a volume outside 0-100.
    pub fn queue_sound(
        &self,
        file: &str,
        device: Option<&str>,
        volume: u32,
        callback: Option<AlertCallback>,
    ) -> bool {
        if file.trim().is_empty() || device.is_some_and(|d| d.trim().is_empty()) || volume > 100 {
            warn!("(AlertSoundPlayer) rejected sound '{file}' (device {device:?}, volume {volume})");
            return false;
        }
        let item = AlertItem::Play {
            file: PathBuf::from(file),
            device: device.map(str::to_string),
            volume,
            callback,
        };
        self.queue.send(item).is_ok()
    }

    pub fn shutdown(&self) {
        let _ = self.queue.send(AlertItem::Exit);
        if let Some(handle) = self.thread.lock().take() {
            if handle.join().is_err() {
                error!("(AlertSoundPlayer) thread panicked");
            }
        }
    }
}

impl AlertMonitor for AlertSoundPlayer {
    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }
}

impl Drop for AlertSoundPlayer {
    fn drop(&mut self) {
        let _ = self.queue.send(AlertItem::Exit);
    }
}

fn alert_loop(rx: Receiver<AlertItem>, output: Arc<dyn AudioOutput>, playing: Arc<AtomicBool>) {
    while let Ok(item) = rx.recv() {
        let AlertItem::Play { file, device, volume, callback } = item else {
            break;
        };

        playing.store(true, Ordering::SeqCst);
        if let Err(e) = play_blocking(output.as_ref(), &file, device.as_deref(), volume) {
            error!("(AlertSoundPlayer) failed to play {} => {e}", file.display());
        }
        playing.store(false, Ordering::SeqCst);

        if let Some(cb) = callback {
            if let Err(e) = thread::Builder::new().name("alert-callback".into()).spawn(cb) {
                error!("(AlertSoundPlayer) could not run callback => {e}");
            }
        }
    }
    debug!("(AlertSoundPlayer) exiting");
}

fn play_blocking(
    output: &dyn AudioOutput,
    file: &std::path::Path,
    device: Option<&str>,
    volume: u32,
) -> Result<(), Error> {
    let mut stream = output.open(file, device, volume)?;
    let (done_tx, done_rx) = bounded::<()>(1);
    stream.play(Box::new(move || {
        let _ = done_tx.send(());
    }))?;
    // Err means the callback was dropped without firing; either way we're done.
    let _ = done_rx.recv();
    Ok(())
}
