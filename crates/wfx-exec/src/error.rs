use thiserror::Error;
use wfx_core::HandlerError;
use wfx_model::ModelError;

/// Malformed resource declaration, detected before any backend call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SpecError {
    #[error("task name is required")]
    MissingName,

    #[error("container image is required")]
    MissingImage,

    #[error("command is required")]
    MissingCommand,

    #[error("invalid label: {0}")]
    Label(String),
}

impl From<ModelError> for SpecError {
    fn from(e: ModelError) -> Self {
        SpecError::Label(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("invalid specification: {0}")]
    InvalidSpec(#[from] SpecError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("'{program}' failed: {reason}")]
    Command { program: String, reason: String },

    #[error("unexpected backend output: {0}")]
    Parse(String),

    #[error("backend api error: {0}")]
    Api(String),

    #[error("not submitted yet")]
    NotSubmitted,
}

impl From<SpecError> for HandlerError {
    fn from(e: SpecError) -> Self {
        HandlerError::InvalidTaskSpec(e.to_string())
    }
}

impl From<ExecError> for HandlerError {
    fn from(e: ExecError) -> Self {
        match e {
            ExecError::InvalidSpec(spec) => spec.into(),
            ExecError::Io(io) => HandlerError::Io(io.to_string()),
            ExecError::Command { .. } => HandlerError::Rejected(e.to_string()),
            ExecError::Api(reason) => HandlerError::BackendUnavailable(reason),
            ExecError::Parse(_) | ExecError::NotSubmitted => HandlerError::Fatal(e.to_string()),
        }
    }
}
