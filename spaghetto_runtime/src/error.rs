//! Error types for the Spaghetto runtime.
//!
//! Library code uses [`RuntimeError`] via `thiserror`.
//! The `spaghetto` binary wraps it with `color-eyre` for reports.

use std::path::PathBuf;

use spaghetto_engine::EngineError;

use crate::snapshot_codec::SnapshotError;

/// Top-level error type for runtime operations.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The engine rejected an event.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Save file encoding, decoding or validation failed.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Event log contents could not be used.
    #[error("event log error: {0}")]
    EventLog(String),

    /// A game name that cannot be used as a save directory.
    #[error("invalid game name {0:?}")]
    InvalidGame(String),

    /// Two replays of the same log disagreed.
    #[error("determinism failure: replays hashed {first} and {second}")]
    Determinism { first: String, second: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the runtime.
pub type Result<T> = std::result::Result<T, RuntimeError>;

impl RuntimeError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create an event log error from any displayable message.
    pub fn event_log(msg: impl Into<String>) -> Self {
        Self::EventLog(msg.into())
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
