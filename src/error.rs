// src/error.rs
//! Error types for package construction and serialization

use std::path::PathBuf;
use thiserror::Error;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building packages
#[derive(Error, Debug)]
pub enum Error {
    /// Required environment inputs were not provided
    #[error("missing required environment variables: {}", .0.join(", "))]
    MissingEnvironment(Vec<&'static str>),

    /// Input mapping could not be parsed
    #[error("invalid input mapping '{0}'")]
    InvalidInput(String),

    /// Input source does not exist
    #[error("input not found: {}", .0.display())]
    InputNotFound(PathBuf),

    /// No executable found to wrap as a service
    #[error("no program found to run as a service in package '{0}'")]
    NoServiceProgram(String),

    /// Refusing to overwrite an existing output file
    #[error("output file already exists: {}", .0.display())]
    OutputExists(PathBuf),

    /// Package staging directory was already released
    #[error("package '{0}' has already been cleaned up")]
    CleanedUp(String),

    /// Artifact could not be read back
    #[error("malformed {format} package: {reason}")]
    Malformed { format: &'static str, reason: String },

    /// Artifact format could not be detected
    #[error("unable to detect package format for: {}", .0.display())]
    UnknownFormat(PathBuf),

    /// IO error during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Staging tree traversal failed
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// RPM construction or parsing failed
    #[error("RPM error: {0}")]
    Rpm(#[from] rpm::Error),

    /// Recipe file could not be parsed
    #[error("failed to parse recipe: {0}")]
    Recipe(#[from] toml::de::Error),
}

impl Error {
    /// Create a malformed-package error with a message
    pub fn malformed(format: &'static str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            format,
            reason: reason.into(),
        }
    }
}
