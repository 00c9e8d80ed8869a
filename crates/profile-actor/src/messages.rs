// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Messages accepted by the profile actor and the request payloads they carry.
//!
//! Producers enqueue raw request bodies as they arrive; decoding and
//! validation happen on the actor task so the ingestion path stays cheap.
//!
//! # Tabular requests
//!
//! ```json
//! {"datasetId": "model-1", "timestamp": 1677022075123,
//!  "multiple": {"columns": ["a", "b"], "data": [[1, "x"], [2, "y"]]}}
//! ```
//!
//! `single` (`{"a": 1, "b": "x"}`) may replace `multiple` for one row.
//!
//! # Embedding requests
//!
//! ```json
//! {"datasetId": "model-1", "embeddings": {"vec": [[0.1, 0.2], [0.3, 0.4]]}}
//! ```
//!
//! A missing `timestamp` defaults to the time the request was received.

use std::collections::{BTreeMap, HashSet};

use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::actor::ActorMessage;
use crate::errors::DecodeError;
use crate::request_aggregator::DatasetRequest;
use crate::type_batcher::Kinded;
use crate::util::current_time_ms;

/// A scalar cell of tabular data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DataValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

/// Named columns and the rows under them. Every row is as wide as `columns`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TabularData {
    columns: Vec<String>,
    rows: Vec<Vec<DataValue>>,
}

impl TabularData {
    /// Validates that column names are unique and every row matches their count.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<DataValue>>) -> Result<Self, DecodeError> {
        let mut seen = HashSet::with_capacity(columns.len());
        if let Some(duplicate) = columns.iter().find(|column| !seen.insert(column.as_str())) {
            return Err(DecodeError::DuplicateColumn(duplicate.clone()));
        }

        if let Some((row, values)) = rows
            .iter()
            .enumerate()
            .find(|(_, values)| values.len() != columns.len())
        {
            return Err(DecodeError::RowWidth {
                row,
                expected: columns.len(),
                found: values.len(),
            });
        }

        Ok(Self { columns, rows })
    }

    /// One row built from a column-to-value map, in column name order.
    pub fn from_single(single: BTreeMap<String, DataValue>) -> Self {
        let (columns, row): (Vec<String>, Vec<DataValue>) = single.into_iter().unzip();
        Self {
            columns,
            rows: vec![row],
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<DataValue>] {
        &self.rows
    }

    pub(crate) fn rows_mut(&mut self) -> &mut Vec<Vec<DataValue>> {
        &mut self.rows
    }

    pub(crate) fn into_parts(self) -> (Vec<String>, Vec<Vec<DataValue>>) {
        (self.columns, self.rows)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Embedding vectors keyed by column name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbeddingData {
    columns: BTreeMap<String, Vec<Vec<f64>>>,
}

impl EmbeddingData {
    pub fn new(columns: BTreeMap<String, Vec<Vec<f64>>>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &BTreeMap<String, Vec<Vec<f64>>> {
        &self.columns
    }

    pub(crate) fn columns_mut(&mut self) -> &mut BTreeMap<String, Vec<Vec<f64>>> {
        &mut self.columns
    }

    pub(crate) fn into_columns(self) -> BTreeMap<String, Vec<Vec<f64>>> {
        self.columns
    }

    /// Total vectors across all columns.
    pub fn vector_count(&self) -> usize {
        self.columns.values().map(Vec::len).sum()
    }
}

/// What a dataset logger receives: one merged payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogPayload {
    Tabular(TabularData),
    Embeddings(EmbeddingData),
}

#[derive(Deserialize)]
struct MultipleWire {
    columns: Vec<String>,
    data: Vec<Vec<DataValue>>,
}

#[derive(Deserialize)]
struct LogRequestWire {
    #[serde(rename = "datasetId")]
    dataset_id: Option<String>,
    timestamp: Option<i64>,
    single: Option<BTreeMap<String, DataValue>>,
    multiple: Option<MultipleWire>,
}

#[derive(Deserialize)]
struct LogEmbeddingsRequestWire {
    #[serde(rename = "datasetId")]
    dataset_id: Option<String>,
    timestamp: Option<i64>,
    embeddings: Option<serde_json::Value>,
}

/// Undecoded tabular logging request.
#[derive(Debug, Clone, PartialEq)]
pub struct RawLogMessage {
    pub request: Vec<u8>,
    /// Epoch millis the request was received; the default event time.
    pub request_time: i64,
}

impl RawLogMessage {
    pub fn new(request: impl Into<Vec<u8>>, request_time: i64) -> Self {
        Self {
            request: request.into(),
            request_time,
        }
    }

    /// A request received just now.
    pub fn received_now(request: impl Into<Vec<u8>>) -> Self {
        Self::new(request, current_time_ms())
    }

    pub fn decode(&self) -> Result<DatasetRequest<TabularData>, DecodeError> {
        let wire: LogRequestWire = serde_json::from_slice(&self.request)?;
        let dataset_id = wire.dataset_id.ok_or(DecodeError::MissingDatasetId)?;

        let data = match (wire.single, wire.multiple) {
            (Some(single), _) => TabularData::from_single(single),
            (None, Some(multiple)) => TabularData::new(multiple.columns, multiple.data)?,
            (None, None) => return Err(DecodeError::MissingData),
        };

        Ok(DatasetRequest {
            dataset_id,
            timestamp: wire.timestamp.unwrap_or(self.request_time),
            payload: data,
        })
    }
}

/// Undecoded embeddings logging request.
#[derive(Debug, Clone, PartialEq)]
pub struct RawLogEmbeddingsMessage {
    pub request: Vec<u8>,
    pub request_time: i64,
}

impl RawLogEmbeddingsMessage {
    pub fn new(request: impl Into<Vec<u8>>, request_time: i64) -> Self {
        Self {
            request: request.into(),
            request_time,
        }
    }

    pub fn received_now(request: impl Into<Vec<u8>>) -> Self {
        Self::new(request, current_time_ms())
    }

    pub fn decode(&self) -> Result<DatasetRequest<EmbeddingData>, DecodeError> {
        let wire: LogEmbeddingsRequestWire = serde_json::from_slice(&self.request)?;
        let dataset_id = wire.dataset_id.ok_or(DecodeError::MissingDatasetId)?;

        let embeddings = match wire.embeddings {
            None | Some(serde_json::Value::Null) => return Err(DecodeError::MissingEmbeddings),
            Some(serde_json::Value::Object(map)) => map,
            Some(other) => {
                return Err(DecodeError::InvalidEmbeddings(format!(
                    "got {other} instead of an object"
                )))
            }
        };

        let mut columns = BTreeMap::new();
        for (name, vectors) in embeddings {
            let vectors: Vec<Vec<f64>> = serde_json::from_value(vectors)
                .map_err(|e| DecodeError::InvalidEmbeddings(format!("column {name}: {e}")))?;
            columns.insert(name, vectors);
        }

        Ok(DatasetRequest {
            dataset_id,
            timestamp: wire.timestamp.unwrap_or(self.request_time),
            payload: EmbeddingData::new(columns),
        })
    }
}

#[derive(Debug, Clone, Copy, Display, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Log,
    LogEmbeddings,
    Publish,
    Debug,
    Close,
}

/// Everything the profile actor accepts.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileMessage {
    Log(RawLogMessage),
    LogEmbeddings(RawLogEmbeddingsMessage),
    /// Force every dataset logger to publish what it has buffered.
    Publish,
    /// Log the buffered state of every dataset logger.
    Debug,
    Close,
}

impl Kinded for ProfileMessage {
    type Kind = MessageKind;

    fn kind(&self) -> MessageKind {
        match self {
            ProfileMessage::Log(_) => MessageKind::Log,
            ProfileMessage::LogEmbeddings(_) => MessageKind::LogEmbeddings,
            ProfileMessage::Publish => MessageKind::Publish,
            ProfileMessage::Debug => MessageKind::Debug,
            ProfileMessage::Close => MessageKind::Close,
        }
    }
}

impl ActorMessage for ProfileMessage {
    fn close() -> Self {
        ProfileMessage::Close
    }

    fn is_close(&self) -> bool {
        matches!(self, ProfileMessage::Close)
    }
}
