// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::path::{Path, PathBuf};

use crate::ConfigError;

/// Identifies the job that owns a logger: its id and name, where its chunk files go, and the name
/// of the artifact they are registered under.
///
/// ```
/// # use sampled_log_core::RunContext;
/// # use std::path::Path;
/// let run = RunContext::new("3kd9x", "resnet-sweep-4").with_storage_root("/data");
/// assert_eq!(run.storage_dir(), Path::new("/data/history/3kd9x"));
/// assert_eq!(run.artifact_name(), "run-history-3kd9x");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    id: String,
    name: String,
    storage_dir: PathBuf,
    artifact_name: String,
}

impl RunContext {
    /// Create a context for run `id`, storing chunks under `history/<id>` relative to the working
    /// directory.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            storage_dir: Path::new("history").join(&id),
            artifact_name: format!("run-history-{id}"),
            name: name.into(),
            id,
        }
    }

    /// Store chunks under `<root>/history/<id>`
    pub fn with_storage_root(mut self, root: impl AsRef<Path>) -> Self {
        self.storage_dir = root.as_ref().join("history").join(&self.id);
        self
    }

    /// Store chunks directly in `dir`
    pub fn with_storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage_dir = dir.into();
        self
    }

    /// Register the history under `name` instead of `run-history-<id>`
    pub fn with_artifact_name(mut self, name: impl Into<String>) -> Self {
        self.artifact_name = name.into();
        self
    }

    /// Unique id of the run
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Human-readable name of the run
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory holding the run's chunk files
    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// Name the history artifact is registered under
    pub fn artifact_name(&self) -> &str {
        &self.artifact_name
    }

    /// Check that the run id can be used as a directory name and the artifact has a name.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.id.is_empty() {
            return Err(ConfigError::invalid("run id must not be empty"));
        }
        if self.id.contains(['/', '\\']) || self.id == "." || self.id == ".." {
            return Err(ConfigError::invalid(format!(
                "run id `{}` can't be used as a directory name",
                self.id
            )));
        }
        if self.artifact_name.is_empty() {
            return Err(ConfigError::invalid("artifact name must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_layout_from_id() {
        let run = RunContext::new("abc123", "my-run");
        assert_eq!(run.storage_dir(), Path::new("history/abc123"));
        assert_eq!(run.artifact_name(), "run-history-abc123");
        assert_eq!(run.name(), "my-run");
        assert!(run.validate().is_ok());
    }

    #[test]
    fn overrides() {
        let run = RunContext::new("abc123", "my-run")
            .with_storage_dir("/tmp/somewhere")
            .with_artifact_name("custom");
        assert_eq!(run.storage_dir(), Path::new("/tmp/somewhere"));
        assert_eq!(run.artifact_name(), "custom");
    }

    #[test]
    fn rejects_ids_that_escape_the_history_dir() {
        assert!(RunContext::new("", "x").validate().is_err());
        assert!(RunContext::new("../etc", "x").validate().is_err());
        assert!(RunContext::new("..", "x").validate().is_err());
        assert!(RunContext::new("a\\b", "x").validate().is_err());
    }
}
