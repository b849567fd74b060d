//! Typed error taxonomy for the wire codec, transport, and crypto pipeline.

use thiserror::Error;

/// Everything that can go wrong below the session driver.
///
/// `#[non_exhaustive]` so new wire-level failure modes can be added without
/// breaking callers that match on this enum.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("config error: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    FileIo(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected size for {what}: expected {expected}, got {actual}")]
    CryptoSize {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("crypto operation failed: {0}")]
    CryptoOp(String),

    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("server refused registration")]
    RegistrationRefused,

    #[error("server denied reconnection")]
    ReconnectDenied,

    #[error("server reported a generic error")]
    ServerGenericError,
}

impl From<std::io::Error> for ProtocolError {
    fn from(err: std::io::Error) -> Self {
        ProtocolError::Transport(format!("{} ({:?})", err, err.kind()))
    }
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
