use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("the scheduler is closed")]
    Closed,

    #[error("the task is duplicated: {0}")]
    Duplicate(String),

    #[error("invalid cron expression: {0}")]
    Parse(#[from] cron::error::Error),
}
