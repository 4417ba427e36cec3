// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::{
    fmt, io,
    path::{Path, PathBuf},
};

use crate::ValidationError;

/// Error type returned by the host-supplied collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A chunk file could not be written.
///
/// The records of the chunk are still buffered when this is returned, so a later flush can write
/// them.
#[derive(Debug)]
pub struct PersistenceError {
    path: PathBuf,
    attempts: u32,
    source: io::Error,
}

impl PersistenceError {
    /// Create a new [PersistenceError] for a write to `path` that failed `attempts` times, the last time
    /// with `source`.
    pub fn new(path: impl Into<PathBuf>, attempts: u32, source: io::Error) -> Self {
        Self {
            path: path.into(),
            attempts,
            source,
        }
    }

    /// The file that couldn't be written
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// How many times the write was attempted
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// The kind of the last IO error
    pub fn kind(&self) -> io::ErrorKind {
        self.source.kind()
    }
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "couldn't write `{}` after {} attempt(s): {}",
            self.path.display(),
            self.attempts,
            self.source
        )
    }
}

impl std::error::Error for PersistenceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// The artifact registry rejected the history artifact. Chunk files already written stay valid.
#[derive(Debug)]
pub struct RegistrationError {
    artifact: String,
    source: BoxError,
}

impl RegistrationError {
    /// Create a new [RegistrationError] for `artifact`
    pub fn new(artifact: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            artifact: artifact.into(),
            source: source.into(),
        }
    }

    /// Name of the artifact that couldn't be registered
    pub fn artifact(&self) -> &str {
        &self.artifact
    }
}

impl fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "couldn't register artifact `{}`: {}",
            self.artifact, self.source
        )
    }
}

impl std::error::Error for RegistrationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&*self.source)
    }
}

/// The logger was already finalized, so it accepts neither records nor a second finalize.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlreadyFinalizedError;

impl fmt::Display for AlreadyFinalizedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("the logger has already been finalized")
    }
}

impl std::error::Error for AlreadyFinalizedError {}

/// The logger configuration is invalid.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigError(String);

impl ConfigError {
    /// Record a configuration failure with a reason string.
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid logger configuration: {}", self.0)
    }
}

impl std::error::Error for ConfigError {}

/// The error cases of the logger entry points.
#[derive(Debug)]
pub enum LogError {
    /// The record was rejected. This is a bug in the caller.
    Validation(ValidationError),
    /// A chunk file couldn't be written. Buffered records were kept.
    Persistence(PersistenceError),
    /// The history artifact couldn't be registered.
    Registration(RegistrationError),
    /// The logger was already finalized.
    AlreadyFinalized(AlreadyFinalizedError),
    /// The logger couldn't be constructed.
    Config(ConfigError),
}

impl fmt::Display for LogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(err) => fmt::Display::fmt(err, f),
            Self::Persistence(err) => fmt::Display::fmt(err, f),
            Self::Registration(err) => fmt::Display::fmt(err, f),
            Self::AlreadyFinalized(err) => fmt::Display::fmt(err, f),
            Self::Config(err) => fmt::Display::fmt(err, f),
        }
    }
}

impl std::error::Error for LogError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Persistence(err) => Some(err),
            Self::Registration(err) => Some(err),
            Self::AlreadyFinalized(err) => Some(err),
            Self::Config(err) => Some(err),
        }
    }
}

impl From<ValidationError> for LogError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<PersistenceError> for LogError {
    fn from(value: PersistenceError) -> Self {
        Self::Persistence(value)
    }
}

impl From<RegistrationError> for LogError {
    fn from(value: RegistrationError) -> Self {
        Self::Registration(value)
    }
}

impl From<AlreadyFinalizedError> for LogError {
    fn from(value: AlreadyFinalizedError) -> Self {
        Self::AlreadyFinalized(value)
    }
}

impl From<ConfigError> for LogError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn persistence_error_keeps_source() {
        let err = PersistenceError::new(
            "history/run/history-000000000000.json.gz",
            3,
            io::Error::new(io::ErrorKind::PermissionDenied, "read-only"),
        );
        assert_eq!(err.attempts(), 3);
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
        let message = err.to_string();
        assert!(message.contains("history-000000000000.json.gz"), "{message}");
        assert!(message.contains("3 attempt(s)"), "{message}");
        assert!(err.source().is_some());
    }

    #[test]
    fn log_error_delegates_display() {
        let err = LogError::from(ValidationError::invalid("bad record"));
        assert_eq!(err.to_string(), "bad record");
        assert!(matches!(
            LogError::from(AlreadyFinalizedError),
            LogError::AlreadyFinalized(_)
        ));

        let err = LogError::from(RegistrationError::new("run-history-abc", "service down"));
        assert!(err.to_string().contains("run-history-abc"));
        assert!(err.to_string().contains("service down"));
    }
}
