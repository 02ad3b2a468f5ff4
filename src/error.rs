//! Error types for the FastCGI client.

use std::io;
use thiserror::Error;

/// Everything that can go wrong while talking to a FastCGI application.
///
/// None of these are retried; each one ends the request it happened in.
#[derive(Debug, Error)]
pub enum FastcgiError {
    /// I/O failure on the underlying stream.
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    /// Record header carried a version other than 1.
    #[error("unexpected FastCGI version {0}")]
    ProtocolVersion(u8),

    #[error("unexpected record type {got} (was expecting {expected})")]
    UnexpectedRecordType { got: u8, expected: String },

    /// A parameter length that doesn't fit in 31 bits.
    #[error("un-encodable name-value pair length: {0:#x}")]
    MalformedLength(u64),

    #[error("{0} byte payload does not fit in one record")]
    RecordTooLong(usize),

    /// The stream ended in the middle of a record or name-value pair.
    #[error("stream ended before a complete record was read")]
    IncompleteRead,

    #[error("stdin writer went away without reporting its result")]
    BodyWriterLost,

    /// An earlier request on this client failed, so the connection can't carry another one.
    #[error("connection is unusable after a failed request")]
    ConnectionLost,
}

pub type Result<T> = std::result::Result<T, FastcgiError>;
