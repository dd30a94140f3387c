//! Error types for the data channel.

/// Errors produced by the data channel.
#[derive(Debug, thiserror::Error)]
pub enum DataChannelError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("data connection timed out")]
    Timeout,

    #[error("cancelled")]
    Cancelled,

    #[error("data connection closed")]
    Closed,
}
