//! Error types shared by the server and the client.
//!
//! Errors are contained per connection: a session error ends that session
//! only, and a client error ends the client process with a non-zero status.

use std::io;
use thiserror::Error;

/// Wire-level decoding and validation failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("message is not valid UTF-8")]
    InvalidUtf8,

    #[error("invalid number: {0:?}")]
    InvalidNumber(String),

    #[error("name must not contain line breaks")]
    NameContainsNewline,

    #[error("sum of {client} and {server} overflows")]
    Overflow { client: i64, server: i64 },

    #[error("message exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error("connection closed in the middle of a message")]
    Truncated,
}

/// Failures while reading one framed message from a stream.
#[derive(Error, Debug)]
pub enum ReadError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Failures while serving one accepted connection.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("connection error: {0}")]
    Io(#[from] io::Error),

    #[error("peer closed the connection without sending a request")]
    Closed,

    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("malformed request: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("client name is empty")]
    EmptyName,
}

/// Failures reported by the client.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("failed to resolve {address}: {source}")]
    Resolve {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("connection error: {0}")]
    Io(#[from] io::Error),

    #[error("timed out waiting for the server after {0:?}")]
    Timeout(std::time::Duration),

    #[error("server closed the connection without a response")]
    ClosedWithoutResponse,

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl From<ReadError> for SessionError {
    fn from(err: ReadError) -> Self {
        match err {
            ReadError::Io(e) => SessionError::Io(e),
            ReadError::Protocol(e) => SessionError::Protocol(e),
        }
    }
}

impl From<ReadError> for ClientError {
    fn from(err: ReadError) -> Self {
        match err {
            ReadError::Io(e) => ClientError::Io(e),
            ReadError::Protocol(e) => ClientError::Protocol(e),
        }
    }
}

impl ClientError {
    /// True when the server could not be reached at all.
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, ClientError::Connect { .. } | ClientError::Resolve { .. })
    }
}
