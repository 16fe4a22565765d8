use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("unknown task status: {0}")]
    UnknownStatus(String),

    #[error("invalid task id: {0}")]
    InvalidTaskId(String),

    #[error("invalid label '{key}': {reason}")]
    InvalidLabel { key: String, reason: &'static str },

    #[error("invalid model: {0}")]
    Invalid(String),
}

pub type ModelResult<T> = Result<T, ModelError>;
