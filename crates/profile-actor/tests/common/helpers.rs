// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Request builders and configuration shared by the integration tests

use profile_actor::config::ContainerConfig;
use profile_actor::messages::{ProfileMessage, RawLogEmbeddingsMessage, RawLogMessage};
use std::sync::Arc;
use std::time::Duration;

/// 2023-03-12T22:10:50Z
pub const TEN_PM: i64 = 1_678_659_050_000;
pub const HOUR_MS: i64 = 3_600_000;

/// Config with a short idle window so tests do not wait on the default.
pub fn test_config() -> Arc<ContainerConfig> {
    let mut config = ContainerConfig::default();
    config.actor.poll_wait = Duration::from_millis(10);
    config.actor.idle_window = Duration::from_millis(20);
    Arc::new(config)
}

/// A `multiple` log request; `columns` and `rows` are JSON arrays.
pub fn log_request(dataset_id: &str, timestamp: i64, columns: &str, rows: &str) -> ProfileMessage {
    let body = format!(
        r#"{{"datasetId":"{dataset_id}","timestamp":{timestamp},
            "multiple":{{"columns":{columns},"data":{rows}}}}}"#
    );
    ProfileMessage::Log(RawLogMessage::new(body, TEN_PM))
}

/// A `single` log request without a timestamp, so it falls back to the request time.
pub fn single_request(dataset_id: &str, single: &str) -> ProfileMessage {
    let body = format!(r#"{{"datasetId":"{dataset_id}","single":{single}}}"#);
    ProfileMessage::Log(RawLogMessage::new(body, TEN_PM))
}

pub fn embeddings_request(dataset_id: &str, timestamp: i64, embeddings: &str) -> ProfileMessage {
    let body = format!(
        r#"{{"datasetId":"{dataset_id}","timestamp":{timestamp},"embeddings":{embeddings}}}"#
    );
    ProfileMessage::LogEmbeddings(RawLogEmbeddingsMessage::new(body, TEN_PM))
}
