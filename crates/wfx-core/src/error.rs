use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("scheduler '{0}' is closed")]
    SchedulerClosed(String),

    #[error("scheduler '{0}' is already started")]
    AlreadyStarted(String),

    #[error("invalid scheduler config: {0}")]
    InvalidConfig(String),
}
