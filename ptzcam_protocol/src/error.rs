use std::io::Error as IoError;
use thiserror::Error;

/// Error types.
#[derive(Debug, Error)]
pub enum Error {
    #[cfg(test)]
    #[error(transparent)]
    FromHexError(#[from] hex::FromHexError),

    #[error(transparent)]
    IoError(#[from] IoError),

    /// A command parameter was outside of its valid domain.
    #[error("parameter out of valid range")]
    ParameterOutOfRange,

    /// The destination buffer can't hold the packet.
    ///
    /// The buffer may contain a partially-written body.
    #[error("buffer too small")]
    BufferTooSmall,

    /// The byte stream ended before a complete packet was read.
    #[error("stream closed before end of packet")]
    StreamClosed,

    #[error("invalid length")]
    InvalidLength,

    #[error("invalid command")]
    InvalidCommand,

    #[error("data parse error: {0}")]
    BinRwError(#[from] binrw::Error),
}
