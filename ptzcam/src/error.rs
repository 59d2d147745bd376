use std::io::Error as IoError;
use thiserror::Error;

/// Error types
#[derive(Debug, Error)]
pub enum Error {
    #[cfg(test)]
    #[error(transparent)]
    FromHexError(#[from] hex::FromHexError),

    #[error(transparent)]
    IoError(#[from] IoError),

    #[error("serial port error: {0}")]
    SerialError(#[from] tokio_serial::Error),

    #[error(transparent)]
    Protocol(#[from] crate::protocol::Error),

    #[error("channel unavailable, likely dropped")]
    ChannelUnavailable,

    #[error("internal error")]
    Internal,

    #[error("disconnected")]
    Disconnected,
}
