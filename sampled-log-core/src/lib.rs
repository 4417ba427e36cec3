// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

#![doc = include_str!("../README.md")]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub use crate::artifact::{ArtifactRegistry, ArtifactSpec, HISTORY_ARTIFACT_KIND};
pub use crate::error::{
    AlreadyFinalizedError, BoxError, ConfigError, LogError, PersistenceError, RegistrationError,
};
pub use crate::format::ChunkFormat;
pub use crate::forward::{LiveForward, NoForward};
pub use crate::record::{Record, Scalar, StampedRecord, Step};
pub use crate::run::RunContext;
pub use crate::teardown::{RegisterTeardown, Teardown, TeardownFailure, TeardownHook};
pub use crate::time::{Clock, Time};
pub use crate::validate::{ValidationError, ValidationErrorBuilder};

pub(crate) type CowStr = std::borrow::Cow<'static, str>;

pub mod artifact;
mod error;
pub mod format;
pub mod forward;
pub mod record;
mod run;
pub mod teardown;
pub mod time;
pub mod validate;
