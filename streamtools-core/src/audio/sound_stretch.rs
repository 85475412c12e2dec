// streamtools-core/src/audio/sound_stretch.rs

use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::ConfigStore;
use crate::traits::AudioEffects;
use crate::Error;

/// Runs `soundstretch <in> <out> [args]` with the configured arguments.
pub struct SoundStretch {
    program: String,
    config: Arc<ConfigStore>,
}

impl SoundStretch {
    pub fn new(config: Arc<ConfigStore>) -> Self {
        Self::with_program("soundstretch", config)
    }

    pub fn with_program(program: &str, config: Arc<ConfigStore>) -> Self {
        Self {
            program: program.to_string(),
            config,
        }
    }

    /// None when no effect argument is configured.
    pub fn build_args(&self, input: &Path, output: &Path) -> Option<Vec<String>> {
        let effect_args = self
            .config
            .read(|c| c.sound_stretch_args.as_ref().map(|a| a.to_args()))
            .filter(|a| !a.is_empty())?;

        let mut args = vec![
            input.to_string_lossy().into_owned(),
            output.to_string_lossy().into_owned(),
        ];
        args.extend(effect_args);
        Some(args)
    }
}

impl AudioEffects for SoundStretch {
    fn process(&self, input: &Path, output: &Path) -> Result<bool, Error> {
        let Some(args) = self.build_args(input, output) else {
            return Ok(false);
        };

        let status = Command::new(&self.program)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match status {
            Ok(s) if s.success() => Ok(true),
            Ok(s) => {
                debug!("(SoundStretch) exited with {s}; playing unmodified audio");
                Ok(false)
            }
            Err(e) => {
                warn!("(SoundStretch) failed to start {} => {e}", self.program);
                Ok(false)
            }
        }
    }
}
