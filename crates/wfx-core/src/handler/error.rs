use thiserror::Error;

/// Error returned by a [`crate::TaskHandler`] operation.
#[derive(Debug, Clone, Error)]
pub enum HandlerError {
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("rejected by backend: {0}")]
    Rejected(String),

    #[error("invalid task spec: {0}")]
    InvalidTaskSpec(String),

    #[error("transient error: {0}")]
    Transient(String),

    #[error("fatal backend error: {0}")]
    Fatal(String),

    #[error("handler panicked: {0}")]
    Panicked(String),

    #[error("io error: {0}")]
    Io(String),
}

impl HandlerError {
    /// Whether retrying the same call later may succeed.
    ///
    /// Status checks failing with a transient error are retried on the next poll cycle.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            HandlerError::BackendUnavailable(_) | HandlerError::Transient(_) | HandlerError::Io(_)
        )
    }

    /// Low-cardinality label used for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            HandlerError::BackendUnavailable(_) => "backend_unavailable",
            HandlerError::Rejected(_) => "rejected",
            HandlerError::InvalidTaskSpec(_) => "invalid_task_spec",
            HandlerError::Transient(_) => "transient",
            HandlerError::Fatal(_) => "fatal",
            HandlerError::Panicked(_) => "panicked",
            HandlerError::Io(_) => "io",
        }
    }
}

impl From<std::io::Error> for HandlerError {
    fn from(e: std::io::Error) -> Self {
        HandlerError::Io(e.to_string())
    }
}
