//! Error types for the blueprint pipeline.
//!
//! # Design
//! Each failure kind gets its own variant so callers can pattern-match
//! instead of inspecting messages. Response-classified failures
//! (`Unauthenticated`, `NotFound`, `Client`, `Server`) carry the full
//! `ResponseError` so the status, headers and raw body stay inspectable.
//!
//! Two conditions never show up here: a pre-send validation failure comes
//! back as `Outcome::Invalid`, and a malformed response body is absorbed by
//! the parser.

use crate::http::TransportError;

/// The parts of a rejected response kept for the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseError {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

/// Errors returned by blueprint, collection and runner operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A collection or blueprint declaration is malformed.
    #[error("invalid definition: {0}")]
    Definition(String),

    /// A build was attempted without a target type.
    #[error("cannot build: {0}")]
    Builder(String),

    /// The target type rejected the attributes it was given.
    #[error("failed to construct {target}: {message}")]
    Construct { target: String, message: String },

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("request timed out")]
    Timeout,

    /// The server returned 401.
    #[error("unauthenticated (HTTP {})", .0.status)]
    Unauthenticated(ResponseError),

    /// The server returned 404.
    #[error("resource not found (HTTP {})", .0.status)]
    NotFound(ResponseError),

    /// The server returned any other status in 402..=499.
    #[error("client error (HTTP {})", .0.status)]
    Client(ResponseError),

    /// The server returned a status in 500..=599.
    #[error("server error (HTTP {})", .0.status)]
    Server(ResponseError),

    /// No registry entry exists under this name.
    #[error("`{0}` is not registered with the runner")]
    NotRegistered(String),

    #[error("unsupported HTTP method `{0}`")]
    UnsupportedMethod(String),

    /// A request payload could not be serialized.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The transport failed in a way that is neither a timeout nor a
    /// connection failure.
    #[error("transport error: {0}")]
    Transport(String),
}

impl Error {
    /// The HTTP status for response-classified errors.
    pub fn status(&self) -> Option<u16> {
        self.response().map(|response| response.status)
    }

    /// The rejected response for response-classified errors.
    pub fn response(&self) -> Option<&ResponseError> {
        match self {
            Error::Unauthenticated(response)
            | Error::NotFound(response)
            | Error::Client(response)
            | Error::Server(response) => Some(response),
            _ => None,
        }
    }
}

impl From<TransportError> for Error {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::ConnectionFailed(msg) => Error::ConnectionFailed(msg),
            TransportError::Timeout => Error::Timeout,
            TransportError::Other(msg) => Error::Transport(msg),
        }
    }
}
