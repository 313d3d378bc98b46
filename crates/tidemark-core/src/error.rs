use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// Series identity admits scalar entity values only.
    #[error("unsupported entity value kind: {0}")]
    UnsupportedEntityValue(&'static str),
}
