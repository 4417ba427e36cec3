// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! [ColumnarGzip]: one gzip stream holding one JSON document.
//!
//! ```json
//! {
//!   "format": "sampled-log/columnar",
//!   "version": 1,
//!   "start_step": 0,
//!   "rows": 3,
//!   "_step": [0, 1, 2],
//!   "_timestamp": [1700000000.5, 1700000000.6, 1700000000.7],
//!   "_runtime": [0.0, 0.1, 0.2],
//!   "columns": [{"name": "loss", "values": [0.5, null, 0.25]}]
//! }
//! ```

use std::{
    fs::File,
    io::{self, BufReader},
    path::Path,
};

use flate2::{Compression, read::GzDecoder, write::GzEncoder};
use sampled_log_core::{ChunkFormat, ConfigError, Record, Scalar, StampedRecord, Step};
use serde::{Deserialize, Serialize};

use super::{JSON_EXTENSION, MetricColumn, check_gzip_level, invalid_data, metric_columns};

/// Value of the `format` field of every chunk document.
pub const FORMAT_NAME: &str = "sampled-log/columnar";
/// Version of the chunk document layout.
pub const FORMAT_VERSION: u32 = 1;

/// Columnar JSON compressed with gzip.
#[derive(Debug, Clone, Copy)]
pub struct ColumnarGzip {
    level: Compression,
}

impl Default for ColumnarGzip {
    fn default() -> Self {
        Self {
            level: Compression::default(),
        }
    }
}

impl ColumnarGzip {
    /// Create the format with the default compression level
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the gzip compression level, from 0 (none) to 9 (best)
    pub fn with_level(mut self, level: u32) -> Result<Self, ConfigError> {
        self.level = Compression::new(check_gzip_level(level)?);
        Ok(self)
    }
}

#[derive(Serialize)]
struct ChunkDocumentRef<'a> {
    format: &'static str,
    version: u32,
    start_step: Step,
    rows: usize,
    #[serde(rename = "_step")]
    steps: Vec<Step>,
    #[serde(rename = "_timestamp")]
    timestamps: Vec<f64>,
    #[serde(rename = "_runtime")]
    runtimes: Vec<f64>,
    columns: Vec<MetricColumn<'a>>,
}

impl Serialize for MetricColumn<'_> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;

        let mut column = serializer.serialize_struct("Column", 2)?;
        column.serialize_field("name", self.name)?;
        column.serialize_field("values", &self.values)?;
        column.end()
    }
}

#[derive(Deserialize)]
struct ChunkDocument {
    format: String,
    version: u32,
    start_step: Step,
    rows: usize,
    #[serde(rename = "_step")]
    steps: Vec<Step>,
    #[serde(rename = "_timestamp")]
    timestamps: Vec<f64>,
    #[serde(rename = "_runtime")]
    runtimes: Vec<f64>,
    columns: Vec<Column>,
}

#[derive(Deserialize)]
struct Column {
    name: String,
    values: Vec<Option<Scalar>>,
}

impl ChunkFormat for ColumnarGzip {
    fn extension(&self) -> &str {
        JSON_EXTENSION
    }

    fn write_chunk(
        &self,
        records: &[StampedRecord],
        output: &mut dyn io::Write,
    ) -> io::Result<()> {
        let document = ChunkDocumentRef {
            format: FORMAT_NAME,
            version: FORMAT_VERSION,
            start_step: records.first().map_or(0, |r| r.step),
            rows: records.len(),
            steps: records.iter().map(|r| r.step).collect(),
            timestamps: records.iter().map(|r| r.timestamp).collect(),
            runtimes: records.iter().map(|r| r.runtime).collect(),
            columns: metric_columns(records),
        };
        let mut encoder = GzEncoder::new(output, self.level);
        serde_json::to_writer(&mut encoder, &document)?;
        encoder.finish()?;
        Ok(())
    }
}

fn from_columns(document: ChunkDocument) -> io::Result<Vec<StampedRecord>> {
    if document.format != FORMAT_NAME || document.version != FORMAT_VERSION {
        return Err(invalid_data(format!(
            "unsupported chunk format {} version {}",
            document.format, document.version
        )));
    }
    let rows = document.rows;
    if document.steps.len() != rows
        || document.timestamps.len() != rows
        || document.runtimes.len() != rows
    {
        return Err(invalid_data(format!(
            "implicit columns don't have {rows} rows"
        )));
    }
    if let Some(column) = document.columns.iter().find(|c| c.values.len() != rows) {
        return Err(invalid_data(format!(
            "column `{}` has {} values, expected {rows}",
            column.name,
            column.values.len()
        )));
    }
    if rows > 0 && document.steps[0] != document.start_step {
        return Err(invalid_data(format!(
            "chunk starts at step {} but its first row is step {}",
            document.start_step, document.steps[0]
        )));
    }

    let mut records: Vec<StampedRecord> = document
        .steps
        .into_iter()
        .zip(document.timestamps)
        .zip(document.runtimes)
        .map(|((step, timestamp), runtime)| StampedRecord {
            step,
            timestamp,
            runtime,
            record: Record::new(),
        })
        .collect();
    for column in document.columns {
        for (stamped, value) in records.iter_mut().zip(column.values) {
            if let Some(value) = value {
                stamped.record.insert(column.name.clone(), value);
            }
        }
    }
    Ok(records)
}

pub(super) fn read(path: &Path) -> io::Result<Vec<StampedRecord>> {
    let file = File::open(path)?;
    let decoder = GzDecoder::new(BufReader::new(file));
    let document: ChunkDocument = serde_json::from_reader(BufReader::new(decoder))?;
    from_columns(document)
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use serde_json::json;

    use super::*;
    use crate::format::read_chunk;

    fn stamped(step: Step, record: Record) -> StampedRecord {
        StampedRecord {
            step,
            timestamp: 1_700_000_000.5 + step as f64,
            runtime: step as f64 * 0.25,
            record,
        }
    }

    fn decode(bytes: &[u8]) -> serde_json::Value {
        let mut json = String::new();
        GzDecoder::new(bytes).read_to_string(&mut json).unwrap();
        serde_json::from_str(&json).unwrap()
    }

    #[test]
    fn writes_columns_in_first_appearance_order() {
        let records = vec![
            stamped(10, Record::new().with("loss", 0.5).with("phase", "train")),
            stamped(11, Record::new().with("phase", "eval")),
            stamped(12, Record::new().with("acc", 1).with("loss", 0.25)),
        ];
        let mut bytes = vec![];
        ColumnarGzip::new()
            .write_chunk(&records, &mut bytes)
            .unwrap();

        assert_eq!(
            decode(&bytes),
            json!({
                "format": "sampled-log/columnar",
                "version": 1,
                "start_step": 10,
                "rows": 3,
                "_step": [10, 11, 12],
                "_timestamp": [1_700_000_010.5, 1_700_000_011.5, 1_700_000_012.5],
                "_runtime": [2.5, 2.75, 3.0],
                "columns": [
                    {"name": "loss", "values": [0.5, null, 0.25]},
                    {"name": "phase", "values": ["train", "eval", null]},
                    {"name": "acc", "values": [null, null, 1]},
                ],
            })
        );
    }

    #[test]
    fn reads_back_what_it_wrote() {
        let dir = tempfile::tempdir().unwrap();
        let records = vec![
            stamped(0, Record::new().with("loss", 0.1 + 0.2).with("big", u64::MAX)),
            stamped(1, Record::new()),
            stamped(2, Record::new().with("done", true).with("loss", 2.0)),
        ];
        let path = dir.path().join("history-000000000000.json.gz");
        let mut file = File::create(&path).unwrap();
        ColumnarGzip::new()
            .with_level(9)
            .unwrap()
            .write_chunk(&records, &mut file)
            .unwrap();
        drop(file);

        let back = read_chunk(&path).unwrap();
        assert_eq!(back, records);
        assert_eq!(back[0].record.get("loss"), Some(&Scalar::Float(0.1 + 0.2)));
        assert_eq!(back[2].record.get("loss"), Some(&Scalar::Float(2.0)));
    }

    #[test]
    fn rejects_mismatched_columns() {
        let document = ChunkDocument {
            format: FORMAT_NAME.into(),
            version: FORMAT_VERSION,
            start_step: 0,
            rows: 2,
            steps: vec![0, 1],
            timestamps: vec![0.0, 0.0],
            runtimes: vec![0.0, 0.0],
            columns: vec![Column {
                name: "loss".into(),
                values: vec![None],
            }],
        };
        let err = from_columns(document).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(err.to_string().contains("`loss`"));
    }

    #[test]
    fn rejects_foreign_documents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history-000000000000.json.gz");
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::fast());
        serde_json::to_writer(
            &mut encoder,
            &json!({
                "format": "something-else", "version": 1, "start_step": 0, "rows": 0,
                "_step": [], "_timestamp": [], "_runtime": [], "columns": [],
            }),
        )
        .unwrap();
        encoder.finish().unwrap();

        assert_eq!(
            read_chunk(&path).unwrap_err().kind(),
            io::ErrorKind::InvalidData
        );
    }
}
