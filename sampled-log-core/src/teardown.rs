// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Teardown hooks.
//!
//! The host job's lifecycle manager owns an ordered list of callbacks that it runs exactly once
//! when the job finishes. The logger registers its finalize callback there, so that the last
//! partial chunk is written and the history artifact registered before the run becomes unusable.
//!
//! Hosts that already have such a mechanism implement [`RegisterTeardown`] for it. [`Teardown`] is
//! a ready-made list for hosts that don't.

use std::{
    borrow::Cow,
    fmt,
    sync::{Mutex, PoisonError},
};

use crate::BoxError;

/// A callback run once at job teardown.
pub type TeardownHook = Box<dyn FnOnce() -> Result<(), BoxError> + Send + 'static>;

/// Something a teardown hook can be registered with.
pub trait RegisterTeardown {
    /// Register `hook` under `name`. Hooks run in registration order.
    fn register_teardown(
        &self,
        name: Cow<'static, str>,
        hook: TeardownHook,
    ) -> Result<(), BoxError>;
}

/// A hook that returned an error while [`Teardown::run`] was running it.
#[derive(Debug)]
pub struct TeardownFailure {
    /// Name the hook was registered under
    pub hook: Cow<'static, str>,
    /// The error the hook returned
    pub error: BoxError,
}

impl fmt::Display for TeardownFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "teardown hook `{}` failed: {}", self.hook, self.error)
    }
}

impl std::error::Error for TeardownFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&*self.error)
    }
}

/// An explicit, ordered list of teardown hooks that runs exactly once.
///
/// ```
/// # use sampled_log_core::{BoxError, RegisterTeardown, Teardown};
/// # use std::sync::{Arc, Mutex};
/// let order = Arc::new(Mutex::new(vec![]));
/// let teardown = Teardown::new();
/// for name in ["flush-history", "close-run"] {
///     let order = order.clone();
///     teardown
///         .register_teardown(name.into(), Box::new(move || -> Result<(), BoxError> {
///             order.lock().unwrap().push(name);
///             Ok(())
///         }))
///         .unwrap();
/// }
///
/// assert!(teardown.run().is_empty());
/// // a second run does nothing
/// assert!(teardown.run().is_empty());
/// assert_eq!(*order.lock().unwrap(), ["flush-history", "close-run"]);
/// ```
pub struct Teardown {
    // None once the hooks have been run
    hooks: Mutex<Option<Vec<(Cow<'static, str>, TeardownHook)>>>,
}

impl fmt::Debug for Teardown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hooks = self.hooks.lock().unwrap_or_else(PoisonError::into_inner);
        match &*hooks {
            Some(hooks) => f
                .debug_struct("Teardown")
                .field("hooks", &hooks.iter().map(|(n, _)| n).collect::<Vec<_>>())
                .finish(),
            None => f.debug_struct("Teardown").field("ran", &true).finish(),
        }
    }
}

impl Default for Teardown {
    fn default() -> Self {
        Self::new()
    }
}

impl Teardown {
    /// Create an empty teardown list
    pub fn new() -> Self {
        Self {
            hooks: Mutex::new(Some(Vec::new())),
        }
    }

    /// Number of hooks waiting to run
    pub fn len(&self) -> usize {
        self.hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(0, Vec::len)
    }

    /// True if no hooks are waiting to run
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True once [`Teardown::run`] has been called
    pub fn has_run(&self) -> bool {
        self.hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Run every registered hook once, in registration order, and return the failures.
    ///
    /// A failing hook doesn't stop later hooks from running. Calling `run` again does nothing.
    pub fn run(&self) -> Vec<TeardownFailure> {
        let hooks = self
            .hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .unwrap_or_default();
        // the lock is released here, so hooks may inspect the list
        hooks
            .into_iter()
            .filter_map(|(name, hook)| {
                hook()
                    .err()
                    .map(|error| TeardownFailure { hook: name, error })
            })
            .collect()
    }
}

impl RegisterTeardown for Teardown {
    fn register_teardown(
        &self,
        name: Cow<'static, str>,
        hook: TeardownHook,
    ) -> Result<(), BoxError> {
        match &mut *self.hooks.lock().unwrap_or_else(PoisonError::into_inner) {
            Some(hooks) => {
                hooks.push((name, hook));
                Ok(())
            }
            None => Err(format!("can't register `{name}`, teardown already ran").into()),
        }
    }
}
