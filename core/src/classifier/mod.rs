//! Classifier adapter: turns complaint text into a classification.
//!
//! RULE: The desk never talks to a model directly. It holds a
//! `Box<dyn Classifier>` handed to it at construction, so tests can swap in
//! a deterministic stub. Adapters never retry; the caller decides.

mod gemini;

pub use gemini::GeminiClassifier;

use crate::{
    complaint::Sentiment,
    config::{ClassifierConfig, ClassifierProvider},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const DEFAULT_TYPE: &str = "General";
pub const DEFAULT_ISSUE: &str = "Uncategorized";
pub const DEFAULT_PRIORITY: u8 = 3;
pub const MIN_PRIORITY: u8 = 1;
pub const MAX_PRIORITY: u8 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    #[serde(rename = "type")]
    pub complaint_type: String,
    pub issue: String,
    pub priority_score: u8,
    pub sentiment: Sentiment,
}

impl Default for Classification {
    fn default() -> Self {
        Self {
            complaint_type: DEFAULT_TYPE.to_string(),
            issue: DEFAULT_ISSUE.to_string(),
            priority_score: DEFAULT_PRIORITY,
            sentiment: Sentiment::Neutral,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassifierError {
    /// The model answered, but not with something we can read.
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    /// The model could not be reached or refused the request.
    #[error("classifier unavailable: {0}")]
    Unavailable(String),
}

impl ClassifierError {
    pub fn status_code(&self) -> u16 {
        match self {
            ClassifierError::InvalidFormat(_) => 400,
            ClassifierError::Unavailable(_) => 502,
        }
    }
}

pub trait Classifier: Send + Sync {
    /// Stable adapter name, used in log lines.
    fn name(&self) -> &'static str;

    fn classify(&self, text: &str) -> Result<Classification, ClassifierError>;
}

/// Returns the same classification for every complaint.
/// Used for offline runs and as a test stub.
#[derive(Debug, Clone, Default)]
pub struct FixedClassifier {
    classification: Classification,
}

impl FixedClassifier {
    pub fn new(classification: Classification) -> Self {
        Self { classification }
    }
}

impl Classifier for FixedClassifier {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn classify(&self, _text: &str) -> Result<Classification, ClassifierError> {
        Ok(self.classification.clone())
    }
}

/// Build the adapter named by the configuration.
pub fn from_config(config: &ClassifierConfig) -> anyhow::Result<Box<dyn Classifier>> {
    match config.provider {
        ClassifierProvider::Fixed => Ok(Box::new(FixedClassifier::new(config.fixed.clone()))),
        ClassifierProvider::Gemini => {
            let api_key = std::env::var(&config.api_key_env).map_err(|_| {
                anyhow::anyhow!("Environment variable {} is not set", config.api_key_env)
            })?;
            Ok(Box::new(GeminiClassifier::new(config, api_key)?))
        }
    }
}

/// Parse raw model output into a classification.
///
/// Models wrap JSON in Markdown fences and sprinkle newlines; both are
/// stripped before parsing. Anything that still is not a JSON object with
/// a 1-5 priority and a known sentiment is `InvalidFormat`.
pub fn parse_model_output(raw: &str) -> Result<Classification, ClassifierError> {
    let cleaned = raw
        .replace("```json", "")
        .replace("```", "")
        .replace(['\n', '\r'], "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return Err(ClassifierError::InvalidFormat("empty model response".into()));
    }

    let value: Value = serde_json::from_str(cleaned)
        .map_err(|e| ClassifierError::InvalidFormat(format!("not JSON: {e}")))?;
    let Value::Object(fields) = value else {
        return Err(ClassifierError::InvalidFormat("expected a JSON object".into()));
    };

    let text_field = |key: &str, default: &str| -> String {
        fields
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(default)
            .to_string()
    };

    Ok(Classification {
        complaint_type: text_field("type", DEFAULT_TYPE),
        issue: text_field("issue", DEFAULT_ISSUE),
        priority_score: parse_priority(fields.get("priorityScore"))?,
        sentiment: parse_sentiment(fields.get("sentiment"))?,
    })
}

fn parse_priority(value: Option<&Value>) -> Result<u8, ClassifierError> {
    let score = match value {
        None | Some(Value::Null) => return Ok(DEFAULT_PRIORITY),
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
        Some(_) => None,
    };
    match score {
        Some(s) if (MIN_PRIORITY as u64..=MAX_PRIORITY as u64).contains(&s) => Ok(s as u8),
        _ => Err(ClassifierError::InvalidFormat(format!(
            "priorityScore must be an integer {MIN_PRIORITY}-{MAX_PRIORITY}, got {}",
            value.map(Value::to_string).unwrap_or_default()
        ))),
    }
}

fn parse_sentiment(value: Option<&Value>) -> Result<Sentiment, ClassifierError> {
    match value {
        None | Some(Value::Null) => Ok(Sentiment::Neutral),
        Some(Value::String(s)) => s
            .parse()
            .map_err(|_| ClassifierError::InvalidFormat(format!("unknown sentiment '{s}'"))),
        Some(other) => Err(ClassifierError::InvalidFormat(format!(
            "sentiment must be a string, got {other}"
        ))),
    }
}
