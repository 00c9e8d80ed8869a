// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The seam between the actor and whatever stores profiles.
//!
//! A [`Sink`] creates one [`DatasetLogger`] per dataset; the
//! [`SinkRegistry`] creates them lazily on first use and owns them for the
//! lifetime of the actor.

use std::collections::btree_map::{self, BTreeMap};

use async_trait::async_trait;
use derive_more::Display;
use serde::Deserialize;
use tracing::info;

use crate::errors::SinkError;
use crate::messages::LogPayload;
use crate::util::TimeGranularity;

/// Unit of the upload schedule.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UploadGranularity {
    #[display("minute")]
    Minute,
    #[display("hour")]
    Hour,
    #[display("day")]
    Day,
}

/// How often a logger ships what it buffered: every `interval` `granularity`s.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Deserialize)]
#[display("every {interval} {granularity}")]
pub struct UploadSchedule {
    pub granularity: UploadGranularity,
    pub interval: u32,
}

/// Everything a sink needs to know to create a dataset's logger.
#[derive(Clone, Debug, PartialEq)]
pub struct LoggerSettings {
    /// Window profiles are aggregated in.
    pub aggregate_by: TimeGranularity,
    pub upload_schedule: UploadSchedule,
    /// Opaque to the actor; passed through to the sink.
    pub schema: Option<serde_json::Value>,
}

/// Creates per-dataset loggers.
#[async_trait]
pub trait Sink: Send {
    type Logger: DatasetLogger;

    async fn create_logger(
        &mut self,
        dataset_id: &str,
        settings: &LoggerSettings,
    ) -> Result<Self::Logger, SinkError>;
}

/// Receives merged payloads for a single dataset.
#[async_trait]
pub trait DatasetLogger: Send {
    /// Logs `payload` at `timestamp_ms`. With `sync` set the call returns
    /// only once the payload is part of the logger's state.
    async fn log(
        &mut self,
        payload: LogPayload,
        timestamp_ms: i64,
        sync: bool,
    ) -> Result<(), SinkError>;

    /// Ships everything buffered so far.
    async fn flush(&mut self) -> Result<(), SinkError>;

    async fn close(&mut self) -> Result<(), SinkError>;

    /// Human readable summary of what is buffered. Only used for debug logging.
    fn buffered_state(&self) -> String;
}

/// Lazily created loggers keyed by dataset id.
pub struct SinkRegistry<S: Sink> {
    sink: S,
    loggers: BTreeMap<String, S::Logger>,
}

impl<S: Sink> SinkRegistry<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            loggers: BTreeMap::new(),
        }
    }

    /// Returns the dataset's logger, creating it with the settings from
    /// `resolve` if this is the first time the dataset is seen.
    pub async fn get_or_create<F>(
        &mut self,
        dataset_id: &str,
        resolve: F,
    ) -> Result<&mut S::Logger, SinkError>
    where
        F: FnOnce(&str) -> LoggerSettings + Send,
    {
        match self.loggers.entry(dataset_id.to_owned()) {
            btree_map::Entry::Occupied(entry) => Ok(entry.into_mut()),
            btree_map::Entry::Vacant(entry) => {
                let settings = resolve(dataset_id);
                info!(
                    "Creating logger for dataset {} aggregated by {}, uploading {}",
                    dataset_id, settings.aggregate_by, settings.upload_schedule
                );
                let logger = self.sink.create_logger(dataset_id, &settings).await?;
                Ok(entry.insert(logger))
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &S::Logger)> {
        self.loggers.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut S::Logger)> {
        self.loggers.iter_mut()
    }

    /// Removes and returns every logger, leaving the registry empty.
    pub fn take_all(&mut self) -> BTreeMap<String, S::Logger> {
        std::mem::take(&mut self.loggers)
    }

    pub fn len(&self) -> usize {
        self.loggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loggers.is_empty()
    }
}
