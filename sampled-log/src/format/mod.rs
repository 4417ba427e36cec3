// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Chunk file formats, and readers for the files they produce.
//!
//! Two formats are provided. Both store the implicit columns `_step`, `_timestamp` and
//! `_runtime` first, then one column per metric in order of first appearance within the chunk,
//! with a null wherever a row lacks that metric.
//!
//! - [ParquetGzip], the default: a Parquet file with GZIP-compressed column chunks, readable by
//!   any Parquet reader.
//! - [ColumnarGzip]: a gzip-compressed JSON document, for consumers without a Parquet reader.
//!
//! [read_chunk] and [read_history] read either format back into records.

use std::{
    io,
    path::{Path, PathBuf},
};

use ahash::AHashMap;
use sampled_log_core::{ConfigError, Scalar, StampedRecord, Step};
use serde::Deserialize;

use crate::chunk::list_chunks;

mod json_gzip;
mod parquet_gzip;

pub use json_gzip::{ColumnarGzip, FORMAT_NAME, FORMAT_VERSION};
pub use parquet_gzip::{ENCODING_KEY, ParquetGzip};

/// File name suffix of [ParquetGzip] chunk files.
pub const PARQUET_EXTENSION: &str = "parquet";
/// File name suffix of [ColumnarGzip] chunk files.
pub const JSON_EXTENSION: &str = "json.gz";
/// Highest accepted gzip compression level.
pub const MAX_GZIP_LEVEL: u32 = 9;

pub(crate) const STEP_COLUMN: &str = "_step";
pub(crate) const TIMESTAMP_COLUMN: &str = "_timestamp";
pub(crate) const RUNTIME_COLUMN: &str = "_runtime";

/// The built-in chunk formats, as named in a configuration file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkFormatKind {
    /// [ParquetGzip]
    #[default]
    Parquet,
    /// [ColumnarGzip]
    Json,
}

impl ChunkFormatKind {
    /// File name suffix of the chunk files this format writes
    pub fn extension(self) -> &'static str {
        match self {
            Self::Parquet => PARQUET_EXTENSION,
            Self::Json => JSON_EXTENSION,
        }
    }
}

pub(crate) fn check_gzip_level(level: u32) -> Result<u32, ConfigError> {
    if level > MAX_GZIP_LEVEL {
        return Err(ConfigError::invalid(format!(
            "gzip level must be between 0 and {MAX_GZIP_LEVEL}, got {level}"
        )));
    }
    Ok(level)
}

pub(crate) fn invalid_data(message: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.into())
}

/// One metric column of a chunk: its name and one value per row.
pub(crate) struct MetricColumn<'a> {
    pub(crate) name: &'a str,
    pub(crate) values: Vec<Option<&'a Scalar>>,
}

/// Splits `records` into metric columns, in order of first appearance.
pub(crate) fn metric_columns(records: &[StampedRecord]) -> Vec<MetricColumn<'_>> {
    let rows = records.len();
    let mut index: AHashMap<&str, usize> = AHashMap::new();
    let mut columns: Vec<MetricColumn<'_>> = vec![];
    for (row, stamped) in records.iter().enumerate() {
        for (name, value) in stamped.record.iter() {
            let column = *index.entry(name).or_insert_with(|| {
                columns.push(MetricColumn {
                    name,
                    values: vec![None; rows],
                });
                columns.len() - 1
            });
            columns[column].values[row] = Some(value);
        }
    }
    columns
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.strip_suffix(extension))
        .is_some_and(|stem| stem.ends_with('.'))
}

/// Read the records of one chunk file, in step order. The format is chosen by file extension.
pub fn read_chunk(path: impl AsRef<Path>) -> io::Result<Vec<StampedRecord>> {
    let path = path.as_ref();
    if has_extension(path, PARQUET_EXTENSION) {
        parquet_gzip::read(path)
    } else if has_extension(path, JSON_EXTENSION) {
        json_gzip::read(path)
    } else {
        Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("`{}` is not a known chunk file type", path.display()),
        ))
    }
}

/// Read every chunk file in `dir`, in step order, and concatenate their records.
///
/// This is how a consumer reassembles a run's full history from a downloaded artifact.
pub fn read_history(dir: impl AsRef<Path>) -> io::Result<Vec<StampedRecord>> {
    let dir = dir.as_ref();
    let mut chunks: Vec<(Step, PathBuf)> = vec![];
    for extension in [PARQUET_EXTENSION, JSON_EXTENSION] {
        chunks.extend(list_chunks(dir, extension)?);
    }
    chunks.sort_by_key(|(step, _)| *step);

    let mut records = vec![];
    for (_, path) in chunks {
        records.extend(read_chunk(&path)?);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use sampled_log_core::{ChunkFormat, Record};

    use super::*;

    fn stamped(step: Step, record: Record) -> StampedRecord {
        StampedRecord {
            step,
            timestamp: 1_700_000_000.0 + step as f64,
            runtime: step as f64,
            record,
        }
    }

    #[test]
    fn columns_follow_first_appearance() {
        let records = [
            stamped(0, Record::new().with("b", 1)),
            stamped(1, Record::new().with("a", 2).with("b", 3)),
        ];
        let columns = metric_columns(&records);
        let names: Vec<_> = columns.iter().map(|c| c.name).collect();
        assert_eq!(names, ["b", "a"]);
        assert_eq!(columns[1].values, [None, Some(&Scalar::Int(2))]);
    }

    #[test]
    fn history_merges_formats_in_step_order() {
        let dir = tempfile::tempdir().unwrap();
        let write = |format: &dyn ChunkFormat, records: &[StampedRecord]| {
            let name = crate::chunk::chunk_file_name(records[0].step, format.extension());
            let mut file = std::fs::File::create(dir.path().join(name)).unwrap();
            format.write_chunk(records, &mut file).unwrap();
        };
        write(&ParquetGzip::new(), &[stamped(2, Record::new().with("x", 2))]);
        write(&ColumnarGzip::new(), &[stamped(0, Record::new().with("x", 0))]);
        write(&ParquetGzip::new(), &[stamped(1, Record::new().with("x", 1))]);

        let steps: Vec<_> = read_history(dir.path())
            .unwrap()
            .iter()
            .map(|r| r.step)
            .collect();
        assert_eq!(steps, [0, 1, 2]);
    }

    #[test]
    fn unknown_files_are_rejected() {
        let err = read_chunk("history-000000000000.csv").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn gzip_level_is_bounded() {
        assert_eq!(check_gzip_level(0).unwrap(), 0);
        assert_eq!(check_gzip_level(9).unwrap(), 9);
        assert!(check_gzip_level(10).is_err());
        assert!(ParquetGzip::new().with_level(12).is_err());
        assert!(ColumnarGzip::new().with_level(12).is_err());
    }
}
