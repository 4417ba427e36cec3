// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Contains the [`ArtifactRegistry`] trait, through which the finished history is registered with
//! the external tracking service.

use std::path::PathBuf;

use crate::BoxError;

/// Type tag of the artifact holding a run's chunk files.
pub const HISTORY_ARTIFACT_KIND: &str = "history";

/// A request to register one artifact version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSpec {
    /// Artifact name, `run-history-<run-id>` by default
    pub name: String,
    /// Artifact type tag, always [`HISTORY_ARTIFACT_KIND`] for the logger
    pub kind: &'static str,
    /// The directory the artifact references
    pub directory: PathBuf,
    /// The chunk files in `directory`, in step order
    pub files: Vec<PathBuf>,
}

/// Registers artifacts with the external tracking service.
///
/// Any `Fn(&ArtifactSpec) -> Result<(), BoxError>` closure implements this trait.
pub trait ArtifactRegistry {
    /// Register a new version of `artifact`.
    fn register_artifact(&self, artifact: &ArtifactSpec) -> Result<(), BoxError>;
}

impl<F: Fn(&ArtifactSpec) -> Result<(), BoxError>> ArtifactRegistry for F {
    fn register_artifact(&self, artifact: &ArtifactSpec) -> Result<(), BoxError> {
        self(artifact)
    }
}
