// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The batch processor behind the profile container.
//!
//! Logging requests are decoded, merged by dataset, time bucket and column
//! set, and handed to one lazily created logger per dataset. Control
//! messages act on all loggers at once; a run of several `Publish` or
//! `Debug` messages acts only once.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::actor::{ActorHandle, ActorService, BatchProcessor};
use crate::config::ContainerConfig;
use crate::errors::{ActorError, ConfigError, SinkError};
use crate::messages::{LogPayload, MessageKind, ProfileMessage};
use crate::request_aggregator::{aggregate, DatasetRequest, Mergeable, MergedRequest};
use crate::sink::{DatasetLogger, Sink, SinkRegistry};
use crate::type_batcher::Kinded;

/// Owns the dataset loggers and handles every batch the actor hands over.
pub struct ProfileActor<S: Sink> {
    config: Arc<ContainerConfig>,
    loggers: SinkRegistry<S>,
}

impl<S: Sink> ProfileActor<S> {
    pub fn new(sink: S, config: Arc<ContainerConfig>) -> Self {
        Self {
            config,
            loggers: SinkRegistry::new(sink),
        }
    }

    async fn process_log(&mut self, batch: Vec<ProfileMessage>) -> Result<(), ActorError> {
        debug!("Processing {} log requests", batch.len());

        let mut requests = Vec::with_capacity(batch.len());
        for message in batch {
            match message {
                ProfileMessage::Log(raw) => match raw.decode() {
                    Ok(request) => requests.push(request),
                    Err(e) => error!("Skipping malformed log request: {e}"),
                },
                other => return Err(kind_mismatch(MessageKind::Log, &other)),
            }
        }

        self.log_requests(requests, LogPayload::Tabular).await
    }

    async fn process_embeddings(&mut self, batch: Vec<ProfileMessage>) -> Result<(), ActorError> {
        debug!("Processing {} embeddings requests", batch.len());

        let mut requests = Vec::with_capacity(batch.len());
        for message in batch {
            match message {
                ProfileMessage::LogEmbeddings(raw) => match raw.decode() {
                    Ok(request) => requests.push(request),
                    Err(e) => error!("Skipping malformed embeddings request: {e}"),
                },
                other => return Err(kind_mismatch(MessageKind::LogEmbeddings, &other)),
            }
        }

        self.log_requests(requests, LogPayload::Embeddings).await
    }

    /// Merges `requests` and logs each merged payload. Every group is
    /// attempted; the first failure is reported once all of them ran.
    async fn log_requests<P>(
        &mut self,
        requests: Vec<DatasetRequest<P>>,
        into_payload: fn(P) -> LogPayload,
    ) -> Result<(), ActorError>
    where
        P: Mergeable + Send,
    {
        let config = Arc::clone(&self.config);
        let merged = aggregate(requests, |dataset_id| config.cadence_for(dataset_id));
        let total = merged.len();

        let mut failures = Failures::default();
        for request in merged {
            let MergedRequest {
                dataset_id,
                bucket_timestamp,
                payload,
                merged: count,
                ..
            } = request;

            let result = match self
                .loggers
                .get_or_create(&dataset_id, |id| config.resolve(id))
                .await
            {
                Ok(logger) => logger.log(into_payload(payload), bucket_timestamp, true).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(()) => debug!(
                    "Logged {} requests to dataset {} at {}",
                    count, dataset_id, bucket_timestamp
                ),
                Err(e) => {
                    warn!("Failed to log {count} requests to dataset {dataset_id}: {e}");
                    failures.record(e);
                }
            }
        }

        failures.into_result(total)
    }

    async fn process_publish(&mut self) -> Result<(), ActorError> {
        if self.loggers.is_empty() {
            debug!("No profiles to publish");
            return Ok(());
        }

        debug!("Force publishing profiles");
        let total = self.loggers.len();
        let mut failures = Failures::default();
        for (dataset_id, logger) in self.loggers.iter_mut() {
            info!("Force rolling dataset {}", dataset_id);
            if let Err(e) = logger.flush().await {
                warn!("Failed to publish dataset {dataset_id}: {e}");
                failures.record(e);
            }
        }
        failures.into_result(total)
    }

    fn process_debug(&self) {
        for (dataset_id, logger) in self.loggers.iter() {
            info!("{}: {}", dataset_id, logger.buffered_state());
        }
    }

    async fn process_close(&mut self) -> Result<(), ActorError> {
        info!("Running pre shutdown operations");
        let loggers = self.loggers.take_all();
        info!("Closing down {} loggers", loggers.len());

        let total = loggers.len();
        let mut failures = Failures::default();
        for (dataset_id, mut logger) in loggers {
            debug!("Closing logger for dataset {}", dataset_id);
            if let Err(e) = logger.close().await {
                warn!("Failed to close logger for dataset {dataset_id}: {e}");
                failures.record(e);
            }
        }
        failures.into_result(total)
    }
}

#[async_trait]
impl<S: Sink> BatchProcessor<ProfileMessage> for ProfileActor<S> {
    async fn process_batch(
        &mut self,
        batch: Vec<ProfileMessage>,
        kind: MessageKind,
    ) -> Result<(), ActorError> {
        match kind {
            MessageKind::Log => self.process_log(batch).await,
            MessageKind::LogEmbeddings => self.process_embeddings(batch).await,
            MessageKind::Publish => self.process_publish().await,
            MessageKind::Debug => {
                self.process_debug();
                Ok(())
            }
            MessageKind::Close => self.process_close().await,
        }
    }
}

/// Spawns a profile actor on the current runtime.
///
/// Returns the handle producers send through and the task running the
/// actor loop. Fails if the actor tuning in `config` is invalid.
pub fn start_profile_actor<S>(
    sink: S,
    config: Arc<ContainerConfig>,
    cancel_token: CancellationToken,
) -> Result<(ActorHandle<ProfileMessage>, JoinHandle<()>), ConfigError>
where
    S: Sink + 'static,
    S::Logger: 'static,
{
    let actor_config = config.actor.clone();
    let processor = ProfileActor::new(sink, config);
    let (service, handle) = ActorService::new(processor, actor_config, cancel_token)?;
    let task = tokio::spawn(service.run());
    Ok((handle, task))
}

fn kind_mismatch(expected: MessageKind, found: &ProfileMessage) -> ActorError {
    ActorError::KindMismatch {
        expected: expected.to_string(),
        found: found.kind().to_string(),
    }
}

#[derive(Default)]
struct Failures {
    count: usize,
    first: Option<SinkError>,
}

impl Failures {
    fn record(&mut self, error: SinkError) {
        self.count += 1;
        if self.first.is_none() {
            self.first = Some(error);
        }
    }

    fn into_result(self, total: usize) -> Result<(), ActorError> {
        match self.first {
            Some(source) => Err(ActorError::Sink {
                failed: self.count,
                total,
                source,
            }),
            None => Ok(()),
        }
    }
}
