//! Error types for partitioned vectors and their inner encodings.

use std::io;

use thiserror::Error;

/// Error variants for building, querying and loading partitioned vectors.
#[derive(Debug, Error)]
pub enum Error {
    /// Construction was attempted on a sequence with no elements.
    #[error("cannot build from an empty sequence")]
    EmptyInput,

    /// An index outside `0..len` was requested.
    #[error("index {index} out of range for length {len}")]
    OutOfRange { index: usize, len: usize },

    /// Serialized data was truncated or its counts do not agree with each other.
    #[error("corrupt serialized state: {0}")]
    CorruptSerializedState(String),

    /// An inner encoding rejected the values of a partition.
    #[error("encoding failure: {0}")]
    EncodingFailure(String),

    /// An I/O error unrelated to the content of the serialized data.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        Error::CorruptSerializedState(msg.into())
    }

    pub(crate) fn encoding(msg: impl Into<String>) -> Self {
        Error::EncodingFailure(msg.into())
    }

    // `simple-sds` reports malformed input as `InvalidData`, and a short read
    // surfaces as `UnexpectedEof`. Both mean the stream cannot be trusted.
    pub(crate) fn from_load(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => Error::corrupt(format!("truncated stream: {err}")),
            io::ErrorKind::InvalidData => Error::corrupt(err.to_string()),
            _ => Error::Io(err),
        }
    }
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

// Used by `Serialize::load` implementations, which must report through `io::Error`.
pub(crate) fn invalid_data(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}
