// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! [ParquetGzip]: one Parquet file per chunk, holding a single row group.
//!
//! `_step` is a non-null `UInt64` column. `_timestamp` and `_runtime` are non-null `Float64`
//! columns. Each metric becomes a nullable column typed after the values it holds:
//!
//! | values in the chunk                          | column type |
//! |----------------------------------------------|-------------|
//! | booleans                                     | `Boolean`   |
//! | signed integers                              | `Int64`     |
//! | non-negative integers, some above `i64::MAX` | `UInt64`    |
//! | floats                                       | `Float64`   |
//! | strings                                      | `Utf8`      |
//! | anything else                                | `Utf8`, one JSON value per cell, field metadata [ENCODING_KEY] = `json` |

use std::{collections::HashMap, fs::File, io, path::Path, sync::Arc};

use arrow::{
    array::{
        Array, ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray, UInt64Array,
    },
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use parquet::{
    arrow::{ArrowWriter, arrow_reader::ParquetRecordBatchReaderBuilder},
    basic::{Compression, GzipLevel},
    file::properties::WriterProperties,
};
use sampled_log_core::{ChunkFormat, ConfigError, Record, Scalar, StampedRecord};

use super::{
    MetricColumn, PARQUET_EXTENSION, RUNTIME_COLUMN, STEP_COLUMN, TIMESTAMP_COLUMN,
    check_gzip_level, invalid_data, metric_columns,
};

/// Field metadata key naming how a metric column's cells are encoded.
pub const ENCODING_KEY: &str = "sampled_log.encoding";
const JSON_ENCODING: &str = "json";

const DEFAULT_GZIP_LEVEL: u32 = 6;

/// Parquet with GZIP-compressed column chunks.
#[derive(Debug, Clone, Copy)]
pub struct ParquetGzip {
    level: u32,
}

impl Default for ParquetGzip {
    fn default() -> Self {
        Self {
            level: DEFAULT_GZIP_LEVEL,
        }
    }
}

impl ParquetGzip {
    /// Create the format with the default compression level
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the gzip compression level, from 0 (none) to 9 (best)
    pub fn with_level(mut self, level: u32) -> Result<Self, ConfigError> {
        self.level = check_gzip_level(level)?;
        Ok(self)
    }

    fn properties(&self) -> io::Result<WriterProperties> {
        let level = GzipLevel::try_new(self.level).map_err(io::Error::other)?;
        Ok(WriterProperties::builder()
            .set_compression(Compression::GZIP(level))
            .build())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Boolean,
    Int64,
    UInt64,
    Float64,
    Utf8,
    Json,
}

impl ColumnKind {
    fn of(values: &[Option<&Scalar>]) -> Self {
        let present = || values.iter().flatten();
        if present().all(|v| matches!(v, Scalar::Bool(_))) {
            Self::Boolean
        } else if present().all(|v| matches!(v, Scalar::Int(_))) {
            Self::Int64
        } else if present().all(|v| matches!(v, Scalar::UInt(_) | Scalar::Int(0..))) {
            Self::UInt64
        } else if present().all(|v| matches!(v, Scalar::Float(_))) {
            Self::Float64
        } else if present().all(|v| matches!(v, Scalar::Str(_))) {
            Self::Utf8
        } else {
            Self::Json
        }
    }

    fn data_type(self) -> DataType {
        match self {
            Self::Boolean => DataType::Boolean,
            Self::Int64 => DataType::Int64,
            Self::UInt64 => DataType::UInt64,
            Self::Float64 => DataType::Float64,
            Self::Utf8 | Self::Json => DataType::Utf8,
        }
    }
}

fn metric_field(column: &MetricColumn<'_>, kind: ColumnKind) -> Field {
    let field = Field::new(column.name, kind.data_type(), true);
    if kind == ColumnKind::Json {
        field.with_metadata(HashMap::from([(
            ENCODING_KEY.to_owned(),
            JSON_ENCODING.to_owned(),
        )]))
    } else {
        field
    }
}

fn metric_array(column: &MetricColumn<'_>, kind: ColumnKind) -> io::Result<ArrayRef> {
    let values = column.values.iter();
    Ok(match kind {
        ColumnKind::Boolean => Arc::new(
            values
                .map(|v| match v {
                    Some(Scalar::Bool(b)) => Some(*b),
                    _ => None,
                })
                .collect::<BooleanArray>(),
        ),
        ColumnKind::Int64 => Arc::new(
            values
                .map(|v| match v {
                    Some(Scalar::Int(i)) => Some(*i),
                    _ => None,
                })
                .collect::<Int64Array>(),
        ),
        ColumnKind::UInt64 => Arc::new(
            values
                .map(|v| match v {
                    Some(Scalar::Int(i)) => u64::try_from(*i).ok(),
                    Some(Scalar::UInt(u)) => Some(*u),
                    _ => None,
                })
                .collect::<UInt64Array>(),
        ),
        ColumnKind::Float64 => Arc::new(
            values
                .map(|v| match v {
                    Some(Scalar::Float(f)) => Some(*f),
                    _ => None,
                })
                .collect::<Float64Array>(),
        ),
        ColumnKind::Utf8 => Arc::new(
            values
                .map(|v| v.and_then(|v| v.as_str()))
                .collect::<StringArray>(),
        ),
        ColumnKind::Json => {
            let cells = values
                .map(|v| v.map(serde_json::to_string).transpose())
                .collect::<Result<Vec<Option<String>>, _>>()?;
            Arc::new(StringArray::from(cells))
        }
    })
}

fn to_batch(records: &[StampedRecord]) -> io::Result<RecordBatch> {
    let mut fields = vec![
        Field::new(STEP_COLUMN, DataType::UInt64, false),
        Field::new(TIMESTAMP_COLUMN, DataType::Float64, false),
        Field::new(RUNTIME_COLUMN, DataType::Float64, false),
    ];
    let mut columns: Vec<ArrayRef> = vec![
        Arc::new(UInt64Array::from_iter_values(records.iter().map(|r| r.step))),
        Arc::new(Float64Array::from_iter_values(records.iter().map(|r| r.timestamp))),
        Arc::new(Float64Array::from_iter_values(records.iter().map(|r| r.runtime))),
    ];
    for column in metric_columns(records) {
        let kind = ColumnKind::of(&column.values);
        fields.push(metric_field(&column, kind));
        columns.push(metric_array(&column, kind)?);
    }
    RecordBatch::try_new(Arc::new(Schema::new(fields)), columns).map_err(io::Error::other)
}

impl ChunkFormat for ParquetGzip {
    fn extension(&self) -> &str {
        PARQUET_EXTENSION
    }

    fn write_chunk(
        &self,
        records: &[StampedRecord],
        output: &mut dyn io::Write,
    ) -> io::Result<()> {
        let batch = to_batch(records)?;
        let mut buf = Vec::new();
        let mut writer = ArrowWriter::try_new(&mut buf, batch.schema(), Some(self.properties()?))
            .map_err(io::Error::other)?;
        writer.write(&batch).map_err(io::Error::other)?;
        writer.close().map_err(io::Error::other)?;
        output.write_all(&buf)
    }
}

fn corrupt(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, err)
}

fn downcast<'a, T: Array + 'static>(field: &Field, array: &'a ArrayRef) -> io::Result<&'a T> {
    array.as_any().downcast_ref::<T>().ok_or_else(|| {
        invalid_data(format!(
            "column `{}` has unsupported type {}",
            field.name(),
            field.data_type()
        ))
    })
}

fn implicit<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> io::Result<&'a T> {
    let array = batch
        .column_by_name(name)
        .and_then(|array| array.as_any().downcast_ref::<T>())
        .ok_or_else(|| invalid_data(format!("chunk has no usable `{name}` column")))?;
    if array.null_count() > 0 {
        return Err(invalid_data(format!("column `{name}` has null values")));
    }
    Ok(array)
}

fn metric_values(field: &Field, array: &ArrayRef) -> io::Result<Vec<Option<Scalar>>> {
    Ok(match field.data_type() {
        DataType::Boolean => downcast::<BooleanArray>(field, array)?
            .iter()
            .map(|v| v.map(Scalar::Bool))
            .collect(),
        DataType::Int64 => downcast::<Int64Array>(field, array)?
            .iter()
            .map(|v| v.map(Scalar::Int))
            .collect(),
        DataType::UInt64 => downcast::<UInt64Array>(field, array)?
            .iter()
            .map(|v| v.map(Scalar::from))
            .collect(),
        DataType::Float64 => downcast::<Float64Array>(field, array)?
            .iter()
            .map(|v| v.map(Scalar::Float))
            .collect(),
        DataType::Utf8 => {
            let strings = downcast::<StringArray>(field, array)?;
            let json = field
                .metadata()
                .get(ENCODING_KEY)
                .is_some_and(|encoding| encoding == JSON_ENCODING);
            if json {
                strings
                    .iter()
                    .map(|v| v.map(serde_json::from_str::<Scalar>).transpose())
                    .collect::<Result<_, _>>()?
            } else {
                strings.iter().map(|v| v.map(Scalar::from)).collect()
            }
        }
        other => {
            return Err(invalid_data(format!(
                "column `{}` has unsupported type {other}",
                field.name()
            )));
        }
    })
}

fn from_batch(batch: &RecordBatch) -> io::Result<Vec<StampedRecord>> {
    let steps = implicit::<UInt64Array>(batch, STEP_COLUMN)?;
    let timestamps = implicit::<Float64Array>(batch, TIMESTAMP_COLUMN)?;
    let runtimes = implicit::<Float64Array>(batch, RUNTIME_COLUMN)?;
    let mut records: Vec<StampedRecord> = (0..batch.num_rows())
        .map(|row| StampedRecord {
            step: steps.value(row),
            timestamp: timestamps.value(row),
            runtime: runtimes.value(row),
            record: Record::new(),
        })
        .collect();

    let schema = batch.schema();
    for (field, array) in schema.fields().iter().zip(batch.columns()) {
        let name = field.name();
        if [STEP_COLUMN, TIMESTAMP_COLUMN, RUNTIME_COLUMN].contains(&name.as_str()) {
            continue;
        }
        for (stamped, value) in records.iter_mut().zip(metric_values(field, array)?) {
            if let Some(value) = value {
                stamped.record.insert(name.clone(), value);
            }
        }
    }
    Ok(records)
}

pub(super) fn read(path: &Path) -> io::Result<Vec<StampedRecord>> {
    let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(path)?)
        .map_err(corrupt)?
        .build()
        .map_err(corrupt)?;
    let mut records = vec![];
    for batch in reader {
        records.extend(from_batch(&batch.map_err(corrupt)?)?);
    }
    Ok(records)
}
