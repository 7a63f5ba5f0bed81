use super::error::SpeechError;
use super::params::ControlParams;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Emotional tone a request can ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Happy,
    Sad,
    Angry,
    Excited,
    Calm,
    Whisper,
}

/// Parameter overrides plus the text annotation for one emotion
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EmotionPreset {
    pub temperature: f32,
    pub speed: f32,
    pub top_p: f32,
    pub prefix: &'static str,
}

const HAPPY: EmotionPreset = EmotionPreset {
    temperature: 0.85,
    speed: 1.1,
    top_p: 0.9,
    prefix: "**excited** ",
};

const SAD: EmotionPreset = EmotionPreset {
    temperature: 0.65,
    speed: 0.9,
    top_p: 0.75,
    prefix: "**sadly** ",
};

const ANGRY: EmotionPreset = EmotionPreset {
    temperature: 0.95,
    speed: 1.15,
    top_p: 0.95,
    prefix: "**angrily** ",
};

const EXCITED: EmotionPreset = EmotionPreset {
    temperature: 0.95,
    speed: 1.2,
    top_p: 0.95,
    prefix: "**very excited** ",
};

const CALM: EmotionPreset = EmotionPreset {
    temperature: 0.6,
    speed: 0.95,
    top_p: 0.7,
    prefix: "**calmly** ",
};

const WHISPER: EmotionPreset = EmotionPreset {
    temperature: 0.5,
    speed: 0.85,
    top_p: 0.6,
    prefix: "**whispers** ",
};

impl Emotion {
    pub const ALL: [Emotion; 6] = [
        Emotion::Happy,
        Emotion::Sad,
        Emotion::Angry,
        Emotion::Excited,
        Emotion::Calm,
        Emotion::Whisper,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Happy => "happy",
            Emotion::Sad => "sad",
            Emotion::Angry => "angry",
            Emotion::Excited => "excited",
            Emotion::Calm => "calm",
            Emotion::Whisper => "whisper",
        }
    }

    pub fn preset(&self) -> &'static EmotionPreset {
        match self {
            Emotion::Happy => &HAPPY,
            Emotion::Sad => &SAD,
            Emotion::Angry => &ANGRY,
            Emotion::Excited => &EXCITED,
            Emotion::Calm => &CALM,
            Emotion::Whisper => &WHISPER,
        }
    }

    pub fn names() -> Vec<&'static str> {
        Emotion::ALL.iter().map(Emotion::as_str).collect()
    }
}

impl std::fmt::Display for Emotion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Emotion {
    type Err = SpeechError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        let normalized = tag.trim().to_lowercase();
        Emotion::ALL
            .into_iter()
            .find(|emotion| emotion.as_str() == normalized)
            .ok_or_else(|| SpeechError::UnknownPreset(tag.to_string()))
    }
}

impl EmotionPreset {
    /// Overlay the preset onto `base`; fields the preset does not name are kept
    pub fn apply(&self, base: ControlParams) -> ControlParams {
        ControlParams {
            temperature: self.temperature,
            speed: self.speed,
            top_p: self.top_p,
            ..base
        }
    }

    pub fn annotate(&self, text: &str) -> String {
        format!("{}{}", self.prefix, text)
    }
}

/// Expand an emotion tag into concrete parameters and annotated text.
///
/// Overrides are merged onto the defaults, never onto caller input, so the
/// result depends only on the arguments.
pub fn resolve_preset(tag: &str, base_text: &str) -> Result<(ControlParams, String), SpeechError> {
    let emotion: Emotion = tag.parse()?;
    Ok(resolve_emotion(emotion, base_text))
}

pub fn resolve_emotion(emotion: Emotion, base_text: &str) -> (ControlParams, String) {
    let preset = emotion.preset();
    (preset.apply(ControlParams::default()), preset.annotate(base_text))
}
