use thiserror::Error;

/// Errors surfaced by the driver. Each variant corresponds to one of the
/// distinct error kinds named in the specification; none are recovered
/// from silently by the caller-facing API.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("malformed app handle `{0}`")]
    MalformedAppHandle(String),

    #[error("invalid run config: {0}")]
    InvalidRunConfig(String),

    #[error("{0}")]
    ValueError(String),

    #[error("{0}")]
    TypeError(String),

    #[error("capacity exceeded: {0}")]
    CapacityExceeded(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type DriverResult<T> = Result<T, DriverError>;
