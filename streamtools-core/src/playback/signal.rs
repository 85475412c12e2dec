// streamtools-core/src/playback/signal.rs

use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// One-shot completion flag the playback thread blocks on until the current
/// waveform ends or is stopped.
#[derive(Default)]
pub struct CompletionSignal {
    done: Mutex<bool>,
    cv: Condvar,
}

impl CompletionSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        let mut done = self.done.lock();
        *done = true;
        self.cv.notify_all();
    }

    pub fn is_set(&self) -> bool {
        *self.done.lock()
    }

    pub fn wait(&self) {
        let mut done = self.done.lock();
        while !*done {
            self.cv.wait(&mut done);
        }
    }

    /// Returns true if the signal was set before `timeout` elapsed.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut done = self.done.lock();
        if !*done {
            self.cv.wait_while_for(&mut done, |d| !*d, timeout);
        }
        *done
    }
}
