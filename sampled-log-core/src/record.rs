// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! This module contains [Record], the unit of data handed to the logger, and [StampedRecord],
//! a record together with the step and times it was logged at.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{CowStr, ValidationError, validate};

/// The step index of a record. Steps increase strictly within a run.
pub type Step = u64;

/// A scalar metric value.
///
/// Integers that fit in an `i64` are always stored as [`Scalar::Int`], so that a value survives a
/// round trip through a chunk file unchanged. [`Scalar::UInt`] only holds values above `i64::MAX`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// A boolean flag
    Bool(bool),
    /// A signed integer
    Int(i64),
    /// An unsigned integer larger than `i64::MAX`
    UInt(u64),
    /// A floating point value. Must be finite to pass validation.
    Float(f64),
    /// A string property
    Str(String),
}

impl Scalar {
    /// Returns the value as an `f64` if it is numeric. Booleans count as `0.0` or `1.0`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Scalar::Int(v) => Some(*v as f64),
            Scalar::UInt(v) => Some(*v as f64),
            Scalar::Float(v) => Some(*v),
            Scalar::Str(_) => None,
        }
    }

    /// Returns the value as a string slice if it is a string property.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(v) => fmt::Display::fmt(v, f),
            Scalar::Int(v) => fmt::Display::fmt(v, f),
            Scalar::UInt(v) => fmt::Display::fmt(v, f),
            Scalar::Float(v) => fmt::Display::fmt(v, f),
            Scalar::Str(v) => fmt::Display::fmt(v, f),
        }
    }
}

macro_rules! signed {
    ($t:ty) => {
        impl From<$t> for Scalar {
            #[inline]
            fn from(value: $t) -> Self {
                Scalar::Int(value.into())
            }
        }
    };
}

macro_rules! unsigned {
    ($t:ty) => {
        impl From<$t> for Scalar {
            #[inline]
            fn from(value: $t) -> Self {
                match i64::try_from(value) {
                    Ok(v) => Scalar::Int(v),
                    Err(_) => Scalar::UInt(value as u64),
                }
            }
        }
    };
}

signed!(i64);
signed!(i32);
signed!(i16);
signed!(i8);
unsigned!(u64);
unsigned!(u32);
unsigned!(u16);
unsigned!(u8);
unsigned!(usize);

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Float(value)
    }
}

impl From<f32> for Scalar {
    fn from(value: f32) -> Self {
        Scalar::Float(value.into())
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Str(value.to_owned())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Str(value)
    }
}

/// One metric record: an ordered mapping from metric name to [`Scalar`] value.
///
/// Names are unique. Inserting a name that is already present replaces its value but keeps the
/// original position.
///
/// Equality ignores field order: two records are equal if they hold the same names with the same
/// values.
///
/// ```
/// # use sampled_log_core::{Record, Scalar};
/// let record = Record::new()
///     .with("loss", 0.25)
///     .with("epoch", 3u32)
///     .with("phase", "train");
///
/// assert_eq!(record.get("epoch"), Some(&Scalar::Int(3)));
/// assert!(record.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Record {
    fields: Vec<(CowStr, Scalar)>,
}

impl Record {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty record with room for `capacity` fields
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: Vec::with_capacity(capacity),
        }
    }

    /// Builder-style [`Record::insert`]
    pub fn with(mut self, name: impl Into<CowStr>, value: impl Into<Scalar>) -> Self {
        self.insert(name, value);
        self
    }

    /// Set `name` to `value`, returning the previous value if the name was already present.
    pub fn insert(&mut self, name: impl Into<CowStr>, value: impl Into<Scalar>) -> Option<Scalar> {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.fields.push((name, value));
                None
            }
        }
    }

    /// Look up the value of `name`
    pub fn get(&self, name: &str) -> Option<&Scalar> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Number of metrics in the record
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True if the record holds no metrics
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate over `(name, value)` pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Scalar)> {
        self.fields.iter().map(|(n, v)| (&**n, v))
    }

    /// Check the record against the validation rules. See [`validate::validate_record`].
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate::validate_record(self)
    }

    /// Build a record from an untyped JSON value. See [`validate::record_from_json`].
    pub fn from_json(value: serde_json::Value) -> Result<Self, ValidationError> {
        validate::record_from_json(value)
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(n, v)| other.get(n) == Some(v))
    }
}

impl<K: Into<CowStr>, V: Into<Scalar>> FromIterator<(K, V)> for Record {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

impl<K: Into<CowStr>, V: Into<Scalar>> Extend<(K, V)> for Record {
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl TryFrom<serde_json::Value> for Record {
    type Error = ValidationError;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        validate::record_from_json(value)
    }
}

/// A [`Record`] as accepted by the logger, augmented with its step, the wall-clock time it was
/// logged at and the time elapsed since the run started.
#[derive(Debug, Clone, PartialEq)]
pub struct StampedRecord {
    /// The step of this record, unique within the run
    pub step: Step,
    /// Seconds since the UNIX epoch
    pub timestamp: f64,
    /// Seconds since the logger was created
    pub runtime: f64,
    /// The metrics
    pub record: Record,
}
