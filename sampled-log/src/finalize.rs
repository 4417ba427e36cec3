// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The finalizer, which runs once at job end.
//!
//! It writes the last partial chunk, lists every chunk file in the run's storage directory and
//! registers them as one version of the run's history artifact. If any step fails, nothing is
//! marked as finalized and the whole sequence can be run again: the buffer is only cleared once
//! its chunk is on disk, and chunk files are never rewritten.

use std::path::PathBuf;

use sampled_log_core::{
    ArtifactRegistry, ArtifactSpec, HISTORY_ARTIFACT_KIND, LogError, PersistenceError,
    RegistrationError,
};

use crate::{
    buffer::ChunkBuffer,
    chunk::{ChunkWriter, WrittenChunk},
};

/// Drains the buffer and registers the history artifact.
pub struct Finalizer<'a> {
    writer: &'a ChunkWriter,
    registry: &'a dyn ArtifactRegistry,
    artifact_name: &'a str,
}

/// What [`Finalizer::run`] did.
#[derive(Debug)]
pub struct Finalized {
    /// The chunk written from the remaining buffer, if it wasn't empty
    pub last_chunk: Option<WrittenChunk>,
    /// The artifact that was registered
    pub artifact: ArtifactSpec,
}

impl<'a> Finalizer<'a> {
    /// Create a finalizer registering the chunk files of `writer` as `artifact_name`
    pub fn new(
        writer: &'a ChunkWriter,
        registry: &'a dyn ArtifactRegistry,
        artifact_name: &'a str,
    ) -> Self {
        Self {
            writer,
            registry,
            artifact_name,
        }
    }

    /// Flush `buffer`, list the chunk files and register them.
    ///
    /// `on_chunk` sees the last chunk as soon as it is on disk, even if registration then fails.
    pub fn run(
        &self,
        buffer: &mut ChunkBuffer,
        mut on_chunk: impl FnMut(&WrittenChunk),
    ) -> Result<Finalized, LogError> {
        let last_chunk = self.writer.flush(buffer)?;
        if let Some(chunk) = &last_chunk {
            on_chunk(chunk);
        }
        let files = self
            .writer
            .list()
            .map_err(|err| PersistenceError::new(self.writer.dir(), 1, err))?;
        let artifact = ArtifactSpec {
            name: self.artifact_name.to_owned(),
            kind: HISTORY_ARTIFACT_KIND,
            directory: self.writer.dir().to_owned(),
            files,
        };
        self.registry
            .register_artifact(&artifact)
            .map_err(|err| RegistrationError::new(self.artifact_name, err))?;
        Ok(Finalized {
            last_chunk,
            artifact,
        })
    }
}

/// Summary of a successful [`SampledLogger::finalize`].
///
/// [`SampledLogger::finalize`]: crate::SampledLogger::finalize
#[derive(Debug, Clone, PartialEq)]
pub struct FinalizeReport {
    /// Name of the registered artifact
    pub artifact: String,
    /// The chunk files the artifact references, in step order
    pub chunk_files: Vec<PathBuf>,
    /// Records written to chunk files over the logger's lifetime
    pub records_written: u64,
    /// Records successfully forwarded to the live backend
    pub live_forwarded: u64,
}
