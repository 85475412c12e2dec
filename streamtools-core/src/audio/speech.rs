// streamtools-core/src/audio/speech.rs

use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use tracing::debug;

use super::expand_args;
use crate::config::ConfigStore;
use crate::traits::SpeechRenderer;
use crate::Error;

/// Renders speech by running an external synthesizer (espeak-ng by default)
/// that writes a wav file.
pub struct CommandSpeechRenderer {
    config: Arc<ConfigStore>,
}

impl CommandSpeechRenderer {
    pub fn new(config: Arc<ConfigStore>) -> Self {
        Self { config }
    }

    /// Program and argument list for one utterance.
    pub fn build_command(
        &self,
        text: &str,
        voice: Option<&str>,
        volume: u32,
        output: &Path,
    ) -> (String, Vec<String>) {
        let speech = self.config.read(|c| c.speech.clone());
        let volume = volume.min(100);
        let volume_str = volume.to_string();
        let amplitude = (volume * 2).to_string();
        let output_str = output.to_string_lossy();
        let voice = voice.map(str::trim).filter(|v| !v.is_empty());

        let vars = [
            ("text", text),
            ("voice", voice.unwrap_or_default()),
            ("volume", volume_str.as_str()),
            ("amplitude", amplitude.as_str()),
            ("output", output_str.as_ref()),
        ];

        let mut args = Vec::new();
        if voice.is_some() {
            args.extend(expand_args(&speech.voice_args, &vars));
        }
        args.extend(expand_args(&with_option_terminator(&speech.args), &vars));
        (speech.program, args)
    }
}

/// Puts `--` ahead of a standalone `{text}` argument unless the template
/// already ends option parsing earlier.
fn with_option_terminator(template: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(template.len() + 1);
    for arg in template {
        if arg == "{text}" && !out.iter().any(|a| a == "--") {
            out.push("--".to_string());
        }
        out.push(arg.clone());
    }
    out
}

impl SpeechRenderer for CommandSpeechRenderer {
    fn render(
        &self,
        text: &str,
        voice: Option<&str>,
        volume: u32,
        output: &Path,
    ) -> Result<(), Error> {
        let (program, args) = self.build_command(text, voice, volume, output);
        debug!("(CommandSpeechRenderer) {program} {:?}", args);

        let out = Command::new(&program)
            .args(&args)
            .output()
            .map_err(|e| Error::Synthesis(format!("failed to start {program}: {e}")))?;

        if !out.status.success() {
            return Err(Error::Synthesis(format!(
                "{program} exited with {}: {}",
                out.status,
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }
        Ok(())
    }
}
