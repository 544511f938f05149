//! Central error types (thiserror-based).

use thiserror::Error;

use crate::codec::VideoCodec;

/// Errors that can occur when loading the vendor codec library.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Codec library not found: {0}")]
    LibraryNotFound(String),

    #[error("Required symbol not found: {0}")]
    SymbolNotFound(String),
}

/// Hardware codec session errors.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Codec library unavailable: {0}")]
    Load(#[from] LoadError),

    #[error("Hardware decode disabled for {0:?}")]
    Unsupported(VideoCodec),

    #[error("Codec bring-up failed in {call}: status {status}")]
    Init { call: &'static str, status: i32 },

    #[error("{call} failed with status {status}")]
    Protocol { call: &'static str, status: i32 },

    #[error("Malformed display event: expected {expected} bytes, got {got}")]
    MalformedCallback { expected: usize, got: usize },

    #[error("{op} is not valid while the decoder is {state}")]
    StateViolation { op: &'static str, state: &'static str },

    #[error("Decoder session is no longer usable")]
    Unusable,

    #[error("Decode worker failure: {0}")]
    Worker(String),
}

/// Convenience Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Display device errors.
#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("No writable HDMI display node found")]
    NoDisplayNode,

    #[error("Display mode change refused while HDMI 3D output is active")]
    ModeLocked3d,

    #[error("Invalid display mode: {0}")]
    InvalidMode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Settings loading errors.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid settings file: {0}")]
    Parse(#[from] serde_json::Error),
}
