// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Error types shared across the actor, the request decoders and the sink seam.

/// Failure to turn a raw request body into a typed request.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Request body is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Request missing dataset id")]
    MissingDatasetId,

    #[error("Request has neither single nor multiple field")]
    MissingData,

    #[error("Request has no embeddings field")]
    MissingEmbeddings,

    #[error("Expected embeddings of the form {{\"column_name\": [[...], ...]}}: {0}")]
    InvalidEmbeddings(String),

    #[error("Row {row} has {found} values but {expected} columns were declared")]
    RowWidth {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Column {0} appears more than once")]
    DuplicateColumn(String),
}

/// Errors reported by a sink implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    #[error("Failed to create logger for dataset {dataset_id}: {reason}")]
    Create { dataset_id: String, reason: String },

    #[error("Failed to write to sink: {0}")]
    Write(String),

    #[error("Logger for dataset {0} is already closed")]
    Closed(String),
}

/// Errors surfaced by the actor and its handle.
#[derive(Debug, thiserror::Error)]
pub enum ActorError {
    #[error("Queue stayed full after {attempts} send attempts")]
    SendTimeout { attempts: u32 },

    #[error("Actor stopped before draining its queue")]
    Stopped,

    #[error("Batch of kind {expected} contained a message of kind {found}")]
    KindMismatch { expected: String, found: String },

    #[error("{failed} of {total} merged payloads could not be logged: {source}")]
    Sink {
        failed: usize,
        total: usize,
        #[source]
        source: SinkError,
    },
}

/// Errors raised while building the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to read dataset options from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse dataset options from {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("No dataset options configured and FAIL_STARTUP_WITHOUT_CONFIG is set")]
    MissingDatasetOptions,
}
