use daylife_timeline::{DecodeError, TimelineError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MindError {
    #[error(transparent)]
    Timeline(#[from] TimelineError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("{service} call failed: {source:#}")]
    ExternalCall {
        service: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to {what}: {source:#}")]
    Persistence {
        what: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("model output for {stage} is missing field {field}")]
    MissingField { stage: &'static str, field: &'static str },
}

impl MindError {
    pub fn external(service: &'static str, source: anyhow::Error) -> Self {
        MindError::ExternalCall { service, source }
    }

    pub fn persistence(what: impl Into<String>, source: anyhow::Error) -> Self {
        MindError::Persistence {
            what: what.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, MindError>;
