//! Adapters for speech synthesis and effects (external programs), in-process
//! playback through rodio, and the alert sound queue.

pub mod alerts;
pub mod rodio_output;
pub mod sound_stretch;
pub mod speech;

pub use alerts::AlertSoundPlayer;
pub use rodio_output::{output_device_names, RodioAudioOutput, RodioPlaybackStream};
pub use sound_stretch::SoundStretch;
pub use speech::CommandSpeechRenderer;

/// Substitutes `{name}` placeholders in every argument.
pub(crate) fn expand_args(template: &[String], vars: &[(&str, &str)]) -> Vec<String> {
    template
        .iter()
        .map(|arg| {
            vars.iter().fold(arg.clone(), |acc, (name, value)| {
                acc.replace(&format!("{{{name}}}"), value)
            })
        })
        .collect()
}
