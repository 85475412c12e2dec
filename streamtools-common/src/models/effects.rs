use serde::{Deserialize, Serialize};

/// Optional tempo/pitch/rate reshaping applied to rendered speech.
///
/// Every field is optional; an absent field contributes no argument.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SoundStretchArgs {
    /// Tempo change in percent.
    pub tempo: Option<i32>,
    /// Pitch change in semitones.
    pub pitch: Option<i32>,
    /// Playback rate change in percent.
    pub rate: Option<i32>,
    pub bpm: Option<i32>,
    pub quick: bool,
    pub anti_alias_off: bool,
    pub speech: bool,
}

impl SoundStretchArgs {
    /// Arguments passed after the input/output file names.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(t) = self.tempo {
            args.push(format!("-tempo={}", signed(t)));
        }
        if let Some(p) = self.pitch {
            args.push(format!("-pitch={}", signed(p)));
        }
        if let Some(r) = self.rate {
            args.push(format!("-rate={}", signed(r)));
        }
        if let Some(b) = self.bpm {
            args.push(format!("-bpm={b}"));
        }
        if self.quick {
            args.push("-quick".to_string());
        }
        if self.anti_alias_off {
            args.push("-naa".to_string());
        }
        if self.speech {
            args.push("-speech".to_string());
        }
        args
    }

    pub fn is_empty(&self) -> bool {
        self.to_args().is_empty()
    }
}

fn signed(v: i32) -> String {
    if v > 0 { format!("+{v}") } else { v.to_string() }
}
