// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The record validator.
//!
//! Every record passes through here before the logger samples or buffers it. A record that fails
//! validation is a bug in the calling job, so validation failures are returned to the caller
//! immediately and never retried.
//!
//! The rules are:
//! 1. untyped input must be a mapping (a JSON object);
//! 2. every value must be a scalar: a number, a string or a boolean;
//! 3. metric names must be non-empty and must not start with `_`, which is reserved for the
//!    columns the logger adds itself (`_step`, `_timestamp`, `_runtime`);
//! 4. floating point values must be finite.
//!
//! All failures found in a record are reported together.

use std::fmt;

use crate::{Record, Scalar, Step};

/// Prefix reserved for the columns the logger adds to every record.
pub const RESERVED_PREFIX: char = '_';

/// An error type that describes why a record isn't valid.
///
/// Unlike the happy-case path, errors are free to allocate. We won't bend over backwards to ensure fast performance in
/// reporting why records are invalid!
#[derive(Clone)]
pub struct ValidationError(Vec<String>);

impl ValidationError {
    /// Create a builder that can be used to compose multiple validation failures into a single [`ValidationError`].
    /// Note that if no validation failures are added to the builder, [`ValidationErrorBuilder::build()`] will return
    /// [`Ok`].
    pub fn builder() -> ValidationErrorBuilder {
        ValidationErrorBuilder::default()
    }

    /// Extend this error with all of the validation failures recorded in `other`.
    pub fn extend(&mut self, other: Self) {
        self.0.extend(other.0);
    }

    /// Add the field `name` context for all of the validation failures reported in `self`.
    pub fn for_field(mut self, name: &str) -> Self {
        for err in self.0.iter_mut() {
            *err = format!("for `{name}`: {err}");
        }
        self
    }

    /// Record a generic validation failure with a reason string.
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self(vec![reason.into()])
    }

    /// The individual failure messages
    pub fn reasons(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl fmt::Debug for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.0).finish()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(", "))
    }
}

impl std::error::Error for ValidationError {}

/// Builder to record validation failures over time and bundle them into a single [`ValidationError`].
#[derive(Debug, Clone, Default)]
pub struct ValidationErrorBuilder(Vec<String>);

impl ValidationErrorBuilder {
    /// Returns [`Ok`] if no validation failures were recorded, otherwise [`Err`] [`ValidationError`] containing all of
    /// the recorded validation failures.
    pub fn build(self) -> Result<(), ValidationError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(ValidationError(self.0))
        }
    }

    /// Record a generic validation failure with a reason string.
    pub fn invalid(mut self, reason: impl Into<String>) -> Self {
        self.invalid_mut(reason);
        self
    }

    /// Record a generic validation failure with a reason string, but only require `&mut Self`.
    pub fn invalid_mut(&mut self, reason: impl Into<String>) -> &mut Self {
        self.0.push(reason.into());
        self
    }

    /// Extend this error with all of the validation failures recorded in `error`.
    pub fn extend(mut self, error: ValidationError) -> Self {
        self.extend_mut(error);
        self
    }

    /// Extend this error with all of the validation failures recorded in `error`, but only require `&mut Self`.
    pub fn extend_mut(&mut self, error: ValidationError) -> &mut Self {
        self.0.extend(error.0);
        self
    }
}

/// Check that `name` may be used as a metric name.
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        Err(ValidationError::invalid("metric name must not be empty"))
    } else if name.starts_with(RESERVED_PREFIX) {
        Err(ValidationError::invalid(format!(
            "names starting with `{RESERVED_PREFIX}` are reserved"
        )))
    } else {
        Ok(())
    }
}

/// Check that `value` can be persisted.
pub fn validate_scalar(value: &Scalar) -> Result<(), ValidationError> {
    match value {
        Scalar::Float(f) if !f.is_finite() => Err(ValidationError::invalid(format!(
            "floating point values must be finite, got {f}"
        ))),
        _ => Ok(()),
    }
}

/// Check every name and value of `record`, reporting all failures at once.
pub fn validate_record(record: &Record) -> Result<(), ValidationError> {
    let mut errors = ValidationError::builder();
    for (name, value) in record.iter() {
        if let Err(err) = validate_name(name).and(validate_scalar(value)) {
            errors.extend_mut(err.for_field(name));
        }
    }
    errors.build()
}

/// Check that an explicitly requested step comes after the last accepted one.
pub fn validate_step(requested: Step, last: Option<Step>) -> Result<(), ValidationError> {
    match last {
        Some(last) if requested <= last => Err(ValidationError::invalid(format!(
            "step {requested} must be greater than the last logged step {last}"
        ))),
        _ => Ok(()),
    }
}

/// Convert untyped input into a [`Record`], checking that it is a mapping of scalars.
///
/// Key order is preserved. The resulting record is also checked with [`validate_record`].
///
/// ```
/// # use sampled_log_core::Record;
/// let record = Record::from_json(serde_json::json!({"loss": 0.5, "phase": "eval"})).unwrap();
/// assert_eq!(record.len(), 2);
///
/// let err = Record::from_json(serde_json::json!([1, 2, 3])).unwrap_err();
/// assert!(err.to_string().contains("must be a mapping"));
/// ```
pub fn record_from_json(value: serde_json::Value) -> Result<Record, ValidationError> {
    use serde_json::Value;

    let map = match value {
        Value::Object(map) => map,
        other => {
            return Err(ValidationError::invalid(format!(
                "record must be a mapping, got {}",
                json_kind(&other)
            )));
        }
    };

    let mut errors = ValidationError::builder();
    let mut record = Record::with_capacity(map.len());
    for (name, value) in map {
        let scalar = match value {
            Value::Bool(b) => Scalar::Bool(b),
            Value::String(s) => Scalar::Str(s),
            Value::Number(n) => {
                if let Some(v) = n.as_i64() {
                    Scalar::Int(v)
                } else if let Some(v) = n.as_u64() {
                    Scalar::UInt(v)
                } else if let Some(v) = n.as_f64() {
                    Scalar::Float(v)
                } else {
                    errors.invalid_mut(format!("for `{name}`: unrepresentable number {n}"));
                    continue;
                }
            }
            other => {
                errors.invalid_mut(format!(
                    "for `{name}`: values must be scalars, got {}",
                    json_kind(&other)
                ));
                continue;
            }
        };
        record.insert(name, scalar);
    }
    if let Err(err) = validate_record(&record) {
        errors.extend_mut(err);
    }
    errors.build().map(|()| record)
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    use serde_json::Value;
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "a mapping",
    }
}
