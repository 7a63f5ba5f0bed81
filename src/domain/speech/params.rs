use super::error::SpeechError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Documented range and default of one voice-control parameter
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ParamSpec {
    pub name: &'static str,
    pub min: f64,
    pub max: f64,
    pub default: f64,
    pub description: &'static str,
}

impl ParamSpec {
    fn check(&self, value: f64) -> Result<f64, SpeechError> {
        if !value.is_finite() || value < self.min || value > self.max {
            return Err(SpeechError::invalid_parameter(
                self.name,
                format!("{} is outside [{}, {}]", value, self.min, self.max),
            ));
        }
        Ok(value)
    }

    /// Human-readable summary, e.g. `0.5 to 2.0 (default: 1.0)`
    pub fn summary(&self) -> String {
        format!("{:?} to {:?} (default: {:?})", self.min, self.max, self.default)
    }
}

pub const SPEED: ParamSpec = ParamSpec {
    name: "speed",
    min: 0.5,
    max: 2.0,
    default: 1.0,
    description: "slower to faster",
};

pub const TEMPERATURE: ParamSpec = ParamSpec {
    name: "temperature",
    min: 0.1,
    max: 1.0,
    default: 0.75,
    description: "more consistent to more varied",
};

pub const LENGTH_PENALTY: ParamSpec = ParamSpec {
    name: "length_penalty",
    min: 0.5,
    max: 2.0,
    default: 1.0,
    description: "controls speech length",
};

pub const REPETITION_PENALTY: ParamSpec = ParamSpec {
    name: "repetition_penalty",
    min: 1.0,
    max: 10.0,
    default: 5.0,
    description: "reduces repetition",
};

pub const TOP_K: ParamSpec = ParamSpec {
    name: "top_k",
    min: 1.0,
    max: 100.0,
    default: 50.0,
    description: "lower is more focused",
};

pub const TOP_P: ParamSpec = ParamSpec {
    name: "top_p",
    min: 0.1,
    max: 1.0,
    default: 0.85,
    description: "nucleus sampling, lower is more consistent",
};

pub const PARAM_SPECS: [ParamSpec; 6] = [
    SPEED,
    TEMPERATURE,
    LENGTH_PENALTY,
    REPETITION_PENALTY,
    TOP_K,
    TOP_P,
];

/// Validated voice-control parameters. Every field is always present and
/// within its documented range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlParams {
    pub speed: f32,
    pub temperature: f32,
    pub length_penalty: f32,
    pub repetition_penalty: f32,
    pub top_k: u32,
    pub top_p: f32,
}

impl Default for ControlParams {
    fn default() -> Self {
        Self {
            speed: SPEED.default as f32,
            temperature: TEMPERATURE.default as f32,
            length_penalty: LENGTH_PENALTY.default as f32,
            repetition_penalty: REPETITION_PENALTY.default as f32,
            top_k: TOP_K.default as u32,
            top_p: TOP_P.default as f32,
        }
    }
}

/// Parameters as they arrive over the wire. Values stay untyped so that a
/// non-numeric value can be reported against its field name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawControlParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length_penalty: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repetition_penalty: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<Value>,
}

/// Validate raw parameters on top of the defaults.
///
/// Out-of-range values are rejected with `InvalidParameter`, never clamped.
pub fn validate(raw: &RawControlParams) -> Result<ControlParams, SpeechError> {
    validate_over(ControlParams::default(), raw)
}

/// Validate raw parameters on top of an already valid base (e.g. a preset)
pub fn validate_over(
    base: ControlParams,
    raw: &RawControlParams,
) -> Result<ControlParams, SpeechError> {
    let mut params = base;

    if let Some(value) = &raw.speed {
        params.speed = float_field(&SPEED, value)?;
    }
    if let Some(value) = &raw.temperature {
        params.temperature = float_field(&TEMPERATURE, value)?;
    }
    if let Some(value) = &raw.length_penalty {
        params.length_penalty = float_field(&LENGTH_PENALTY, value)?;
    }
    if let Some(value) = &raw.repetition_penalty {
        params.repetition_penalty = float_field(&REPETITION_PENALTY, value)?;
    }
    if let Some(value) = &raw.top_k {
        params.top_k = integer_field(&TOP_K, value)?;
    }
    if let Some(value) = &raw.top_p {
        params.top_p = float_field(&TOP_P, value)?;
    }

    Ok(params)
}

/// Normalize request text: trim and collapse whitespace, then enforce
/// non-emptiness and the character limit.
pub fn validate_text(text: Option<&str>, max_chars: usize) -> Result<String, SpeechError> {
    let text = text.ok_or_else(|| SpeechError::invalid_parameter("text", "text is required"))?;
    let normalized = WHITESPACE.replace_all(text, " ").trim().to_string();

    if normalized.is_empty() {
        return Err(SpeechError::invalid_parameter("text", "text cannot be empty"));
    }

    let char_count = normalized.chars().count();
    if char_count > max_chars {
        return Err(SpeechError::invalid_parameter(
            "text",
            format!("text must be {} characters or less, got {}", max_chars, char_count),
        ));
    }

    Ok(normalized)
}

fn numeric(spec: &ParamSpec, value: &Value) -> Result<f64, SpeechError> {
    value
        .as_f64()
        .ok_or_else(|| SpeechError::invalid_parameter(spec.name, format!("expected a number, got {}", value)))
}

fn float_field(spec: &ParamSpec, value: &Value) -> Result<f32, SpeechError> {
    let value = spec.check(numeric(spec, value)?)?;
    Ok(value as f32)
}

fn integer_field(spec: &ParamSpec, value: &Value) -> Result<u32, SpeechError> {
    let value = numeric(spec, value)?;
    if value.fract() != 0.0 {
        return Err(SpeechError::invalid_parameter(
            spec.name,
            format!("expected an integer, got {}", value),
        ));
    }
    Ok(spec.check(value)? as u32)
}
