//! Error types for the voice net core

use thiserror::Error;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum Error {
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Permission error: {0}")]
    Permission(#[from] PermissionError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Configuration error: {0}")]
    Config(String),

    /// A connect attempt finished after the session was told to disconnect
    #[error("Connect superseded by disconnect")]
    Superseded,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error ends the current session
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::Permission(_) | Error::Decode(_))
    }
}

/// Credential fetch/validation errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Token service returned HTTP {0}")]
    Status(u16),

    #[error("Token request failed: {0}")]
    Request(String),

    #[error("No credential issued for room {0}")]
    MissingCredential(String),

    #[error("Malformed token response: {0}")]
    MalformedResponse(String),

    #[error("Credential rejected: {0}")]
    Rejected(String),
}

/// Transport errors
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Handshake failed: {0}")]
    HandshakeFailed(String),

    #[error("Not connected")]
    NotConnected,
}

/// Role-gated action refused
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Role {role:?} may not perform {action}")]
pub struct PermissionError {
    pub role: String,
    pub action: String,
}

/// Inbound message decoding errors
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Payload is not UTF-8")]
    InvalidUtf8,

    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Message has no string \"type\" field")]
    MissingType,

    #[error("Malformed {kind} message: {reason}")]
    Malformed { kind: String, reason: String },
}

/// Audio graph errors
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Unsupported track {track_id}: {reason}")]
    UnsupportedTrack { track_id: String, reason: String },

    #[error("Track not found: {0}")]
    TrackNotFound(String),

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Output buffer overflow")]
    BufferOverflow,
}

/// Result type alias for the crate
pub type Result<T> = std::result::Result<T, Error>;
