// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! In-memory sink that records every call made by the profile actor

use profile_actor::errors::SinkError;
use profile_actor::messages::LogPayload;
use profile_actor::sink::{DatasetLogger, LoggerSettings, Sink};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    Created {
        dataset_id: String,
        settings: LoggerSettings,
    },
    Logged {
        dataset_id: String,
        timestamp_ms: i64,
        payload: LogPayload,
    },
    Flushed(String),
    Closed(String),
}

/// Shared view of everything a [`RecordingSink`] saw
#[derive(Clone, Default)]
pub struct Recorded(Arc<Mutex<Vec<SinkEvent>>>);

impl Recorded {
    fn push(&self, event: SinkEvent) {
        self.0.lock().expect("lock poisoned").push(event);
    }

    pub fn events(&self) -> Vec<SinkEvent> {
        self.0.lock().expect("lock poisoned").clone()
    }

    /// Every `log` call as (dataset id, timestamp, payload)
    pub fn logged(&self) -> Vec<(String, i64, LogPayload)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SinkEvent::Logged {
                    dataset_id,
                    timestamp_ms,
                    payload,
                } => Some((dataset_id, timestamp_ms, payload)),
                _ => None,
            })
            .collect()
    }

    /// Total tabular rows and embedding vectors logged
    pub fn logged_rows(&self) -> usize {
        self.logged()
            .iter()
            .map(|(_, _, payload)| match payload {
                LogPayload::Tabular(data) => data.len(),
                LogPayload::Embeddings(data) => data.vector_count(),
            })
            .sum()
    }
}

pub struct RecordingSink {
    recorded: Recorded,
}

impl RecordingSink {
    pub fn new() -> (Self, Recorded) {
        let recorded = Recorded::default();
        (
            Self {
                recorded: recorded.clone(),
            },
            recorded,
        )
    }
}

pub struct RecordingLogger {
    dataset_id: String,
    recorded: Recorded,
    buffered: usize,
}

#[async_trait::async_trait]
impl Sink for RecordingSink {
    type Logger = RecordingLogger;

    async fn create_logger(
        &mut self,
        dataset_id: &str,
        settings: &LoggerSettings,
    ) -> Result<RecordingLogger, SinkError> {
        self.recorded.push(SinkEvent::Created {
            dataset_id: dataset_id.to_string(),
            settings: settings.clone(),
        });
        Ok(RecordingLogger {
            dataset_id: dataset_id.to_string(),
            recorded: self.recorded.clone(),
            buffered: 0,
        })
    }
}

#[async_trait::async_trait]
impl DatasetLogger for RecordingLogger {
    async fn log(
        &mut self,
        payload: LogPayload,
        timestamp_ms: i64,
        _sync: bool,
    ) -> Result<(), SinkError> {
        self.buffered += 1;
        self.recorded.push(SinkEvent::Logged {
            dataset_id: self.dataset_id.clone(),
            timestamp_ms,
            payload,
        });
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        self.buffered = 0;
        self.recorded.push(SinkEvent::Flushed(self.dataset_id.clone()));
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        self.recorded.push(SinkEvent::Closed(self.dataset_id.clone()));
        Ok(())
    }

    fn buffered_state(&self) -> String {
        format!("{} payloads since last flush", self.buffered)
    }
}
