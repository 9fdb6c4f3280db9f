//! Error types for the engine binary.
//!
//! [`EngineError`] wraps every failure mode of a run so `main` can
//! propagate with `?`.

use std::path::PathBuf;

/// Top-level error for the engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The game configuration could not be loaded.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: gamelens_core::config::ConfigError,
    },

    /// A registry refused a generator or a harvest failed.
    #[error("registry error: {source}")]
    Registry {
        /// The underlying registry error.
        #[from]
        source: gamelens_core::error::RegistryError,
    },

    /// The events file could not be read.
    #[error("failed to read events from {path}: {source}")]
    EventsIo {
        /// Path of the events file.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A line of the events file is not a valid event.
    #[error("invalid event on line {line}: {source}")]
    Event {
        /// 1-based line number.
        line: usize,
        /// The underlying parse error.
        source: serde_json::Error,
    },

    /// A unit's output could not be serialized.
    #[error("output serialization failed: {source}")]
    Output {
        /// The underlying serialization error.
        #[from]
        source: serde_json::Error,
    },

    /// Writing to stdout failed.
    #[error("output write failed: {source}")]
    Write {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },
}
