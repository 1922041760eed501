use thiserror::Error;

/// Accepted inputs for start-date extraction, listed in format errors
pub const ACCEPTED_FORMATS: &str =
    "YYYY-MM-DD, YYYY-MM-DD HH:MM, YYYY-MM-DD HH:MM:SS, or a range of these joined by 至";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimelineError {
    #[error("malformed date expression {input:?}: expected {expected}")]
    Format { input: String, expected: &'static str },

    #[error("invalid range: start {start} is after end {end}")]
    Range { start: String, end: String },
}

impl TimelineError {
    pub(crate) fn format(input: &str, expected: &'static str) -> Self {
        TimelineError::Format {
            input: input.to_string(),
            expected,
        }
    }
}

/// Model output that could not be turned into the structure a stage expects
#[derive(Debug, Error)]
#[error("stage {stage}: unparseable model output: {source}")]
pub struct DecodeError {
    pub stage: String,
    #[source]
    pub source: serde_json::Error,
}

pub type Result<T> = std::result::Result<T, TimelineError>;
