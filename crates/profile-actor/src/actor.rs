// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Single-consumer actor that batches its inbox before handing work to a processor.
//!
//! ```text
//!    ┌──────────────┐
//!    │   Handles    │ (many producers, cloneable)
//!    └──────┬───────┘
//!           │ send() with backoff while full
//!           v
//!    ┌──────────────┐
//!    │    Queue     │ (bounded, closable)
//!    └──────┬───────┘
//!           │ accumulate: recv_many + idle window + size cap
//!           v
//!    ┌──────────────┐
//!    │   Service    │ (one task, one batch in flight)
//!    └──────┬───────┘
//!           │ type_batched_items
//!           v
//!    ┌──────────────┐
//!    │  Processor   │ (one call per same-kind run)
//!    └──────────────┘
//! ```
//!
//! The service moves through `Running -> Draining -> Done`. It drains once a
//! close message is read or once a stop request is honored between cycles,
//! and is done when the queue is closed and empty. The completion signal
//! flips exactly once, on that last transition.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use async_trait::async_trait;
use derive_more::Display;
use futures_util::FutureExt;
use tokio::sync::watch;
use tokio::time::{sleep, timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::constants::{
    DEFAULT_QUEUE_CAPACITY, IDLE_WINDOW, MAX_BATCH_SIZE, MAX_MESSAGES_PER_POLL,
    MAX_SEND_BACKOFF, POLL_WAIT, SEND_ATTEMPTS, SEND_BACKOFF,
};
use crate::errors::{ActorError, ConfigError};
use crate::queue::{self, QueueReceiver, QueueSender, TryPutError};
use crate::type_batcher::{type_batched_items, Kinded};

/// A message the actor can carry. One variant must act as the close sentinel.
pub trait ActorMessage: Kinded + Send + 'static {
    /// Builds the close sentinel.
    fn close() -> Self;

    fn is_close(&self) -> bool;
}

/// Handles one same-kind batch at a time on the actor task.
#[async_trait]
pub trait BatchProcessor<M: ActorMessage>: Send {
    async fn process_batch(&mut self, batch: Vec<M>, kind: M::Kind) -> Result<(), ActorError>;
}

/// Timing and sizing knobs of the actor loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorConfig {
    /// Inbox slots.
    pub queue_capacity: usize,
    /// Items taken by one receive.
    pub max_messages_per_poll: usize,
    /// Accumulation stops at this many messages.
    pub max_batch_size: usize,
    /// Bounded wait of one receive on an empty inbox.
    pub poll_wait: Duration,
    /// Accumulation stops after this long without a successful receive.
    pub idle_window: Duration,
    /// Enqueue attempts while the inbox is full.
    pub send_attempts: u32,
    /// First retry delay, doubled on each retry up to a fixed ceiling.
    pub send_backoff: Duration,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_messages_per_poll: MAX_MESSAGES_PER_POLL,
            max_batch_size: MAX_BATCH_SIZE,
            poll_wait: POLL_WAIT,
            idle_window: IDLE_WINDOW,
            send_attempts: SEND_ATTEMPTS,
            send_backoff: SEND_BACKOFF,
        }
    }
}

impl ActorConfig {
    /// Rejects values that would panic the inbox or keep the loop from ever yielding.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("Queue capacity", self.queue_capacity),
            ("Messages per poll", self.max_messages_per_poll),
            ("Max batch size", self.max_batch_size),
            ("Send attempts", self.send_attempts as usize),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidConfig(format!(
                    "{name} must be greater than 0"
                )));
            }
        }
        if self.poll_wait.is_zero() {
            return Err(ConfigError::InvalidConfig(
                "Poll wait must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Display, PartialEq, Eq)]
pub enum ActorState {
    Running,
    Draining,
    Done,
}

/// Producer-side handle: enqueue messages and request shutdown.
pub struct ActorHandle<M> {
    tx: QueueSender<M>,
    done_rx: watch::Receiver<bool>,
    send_attempts: u32,
    send_backoff: Duration,
}

impl<M> Clone for ActorHandle<M> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            done_rx: self.done_rx.clone(),
            send_attempts: self.send_attempts,
            send_backoff: self.send_backoff,
        }
    }
}

impl<M: ActorMessage> ActorHandle<M> {
    /// Enqueues a message, backing off while the inbox is full.
    ///
    /// A message sent after the inbox closed is dropped with a warning and
    /// still returns `Ok(())`. Sending the close sentinel closes the inbox.
    pub async fn send(&self, message: M) -> Result<(), ActorError> {
        let closes = message.is_close();
        let mut message = message;
        let mut backoff = self.send_backoff;

        for attempt in 1..=self.send_attempts {
            match self.tx.try_put(message, closes) {
                Ok(()) => return Ok(()),
                Err(TryPutError::Closed(rejected)) => {
                    warn!(
                        "Queue is closed, dropping {:?} message",
                        rejected.kind()
                    );
                    return Ok(());
                }
                Err(TryPutError::Full(rejected)) => {
                    message = rejected;
                    if attempt < self.send_attempts {
                        trace!("Queue full on attempt {attempt}, retrying in {backoff:?}");
                        sleep(backoff).await;
                        backoff = (backoff * 2).min(MAX_SEND_BACKOFF);
                    }
                }
            }
        }

        Err(ActorError::SendTimeout {
            attempts: self.send_attempts,
        })
    }

    /// Sends the close sentinel and waits until everything queued before it was handled.
    pub async fn shutdown(&self) -> Result<(), ActorError> {
        debug!("Requesting actor shutdown");
        self.send(M::close()).await?;
        self.wait_until_done().await
    }

    /// Waits for the completion signal without sending anything.
    pub async fn wait_until_done(&self) -> Result<(), ActorError> {
        let mut done_rx = self.done_rx.clone();
        done_rx
            .wait_for(|done| *done)
            .await
            .map(|_| ())
            .map_err(|_| ActorError::Stopped)
    }

    pub fn is_done(&self) -> bool {
        *self.done_rx.borrow()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer side. Spawn [`ActorService::run`] on its own task.
pub struct ActorService<M: ActorMessage, P> {
    rx: QueueReceiver<M>,
    processor: P,
    config: ActorConfig,
    cancel_token: CancellationToken,
    done_tx: watch::Sender<bool>,
    state: ActorState,
    close_seen: bool,
}

impl<M, P> ActorService<M, P>
where
    M: ActorMessage,
    P: BatchProcessor<M>,
{
    /// Creates the service and its first handle.
    ///
    /// Cancelling `cancel_token` asks the service to stop; it is honored
    /// between cycles and leads to a full drain. Fails if `config` does not
    /// pass [`ActorConfig::validate`].
    pub fn new(
        processor: P,
        config: ActorConfig,
        cancel_token: CancellationToken,
    ) -> Result<(Self, ActorHandle<M>), ConfigError> {
        config.validate()?;
        let (tx, rx) = queue::bounded(config.queue_capacity);
        let (done_tx, done_rx) = watch::channel(false);

        let handle = ActorHandle {
            tx,
            done_rx,
            send_attempts: config.send_attempts,
            send_backoff: config.send_backoff,
        };
        let service = Self {
            rx,
            processor,
            config,
            cancel_token,
            done_tx,
            state: ActorState::Running,
            close_seen: false,
        };

        Ok((service, handle))
    }

    /// Runs accumulate/dispatch cycles until the inbox is closed and drained.
    pub async fn run(mut self) {
        debug!("Actor service started");

        while self.state != ActorState::Done {
            if self.state == ActorState::Running && self.cancel_token.is_cancelled() {
                info!(
                    "Stop requested, draining {} queued messages",
                    self.rx.len()
                );
                self.rx.close();
                self.state = ActorState::Draining;
            }
            self.run_cycle().await;
        }

        self.done_tx.send_replace(true);
        debug!("Actor service stopped");
    }

    async fn run_cycle(&mut self) {
        let batch = self.accumulate().await;
        if batch.is_empty() {
            return;
        }

        debug!("Dispatching {} accumulated messages", batch.len());
        for (sub_batch, kind) in type_batched_items(batch) {
            debug!("Processing batch of {} {:?}", sub_batch.len(), kind);
            let outcome = AssertUnwindSafe(self.processor.process_batch(sub_batch, kind))
                .catch_unwind()
                .await;
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Failed to process batch of {kind:?}: {e}"),
                Err(panic) => error!(
                    "Batch processor panicked on batch of {kind:?}: {}",
                    panic_message(panic.as_ref())
                ),
            }
        }
    }

    /// Collects messages until the size cap, the idle window, or a closed and empty inbox.
    async fn accumulate(&mut self) -> Vec<M> {
        let mut batch = Vec::new();
        let mut buffer = Vec::new();
        let mut last_receive = Instant::now();

        while batch.len() < self.config.max_batch_size {
            let limit = self
                .config
                .max_messages_per_poll
                .min(self.config.max_batch_size - batch.len());

            let received =
                timeout(self.config.poll_wait, self.rx.recv_many(&mut buffer, limit)).await;
            match received {
                Ok(0) => {
                    if !self.close_seen {
                        debug!("Queue closed without a close message");
                        batch.push(M::close());
                        self.close_seen = true;
                    }
                    self.state = ActorState::Done;
                    break;
                }
                Ok(_) => {
                    last_receive = Instant::now();
                    self.take_received(&mut buffer, &mut batch);
                }
                Err(_elapsed) => {
                    if last_receive.elapsed() >= self.config.idle_window {
                        break;
                    }
                }
            }
        }

        batch
    }

    /// Moves received messages into `batch`, stopping after a close message.
    fn take_received(&mut self, buffer: &mut Vec<M>, batch: &mut Vec<M>) {
        let mut received = buffer.drain(..);
        for message in received.by_ref() {
            let closes = message.is_close();
            batch.push(message);
            if closes {
                self.close_seen = true;
                break;
            }
        }
        let discarded = received.count();

        // The producer side may already have flipped the shared flag; the
        // channel itself still needs closing for `recv_many` to report empty.
        if self.close_seen {
            self.rx.close();
        }
        if self.close_seen && self.state == ActorState::Running {
            debug!("Close message received, draining");
            self.state = ActorState::Draining;
        }
        if discarded > 0 {
            warn!("Discarded {discarded} messages received after close");
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::sync::Notify;
    use tracing_test::traced_test;

    #[derive(Debug, Clone, PartialEq)]
    enum TestMessage {
        Value(u32),
        Other(u32),
        Close,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum TestKind {
        Value,
        Other,
        Close,
    }

    impl Kinded for TestMessage {
        type Kind = TestKind;

        fn kind(&self) -> TestKind {
            match self {
                TestMessage::Value(_) => TestKind::Value,
                TestMessage::Other(_) => TestKind::Other,
                TestMessage::Close => TestKind::Close,
            }
        }
    }

    impl ActorMessage for TestMessage {
        fn close() -> Self {
            TestMessage::Close
        }

        fn is_close(&self) -> bool {
            matches!(self, TestMessage::Close)
        }
    }

    type Seen = Arc<Mutex<Vec<(Vec<TestMessage>, TestKind)>>>;

    #[derive(Default)]
    struct Recorder {
        seen: Seen,
        fail_on: Option<u32>,
        panic_on: Option<u32>,
        delay: Option<Duration>,
        started: Option<Arc<Notify>>,
    }

    #[async_trait]
    impl BatchProcessor<TestMessage> for Recorder {
        async fn process_batch(
            &mut self,
            batch: Vec<TestMessage>,
            kind: TestKind,
        ) -> Result<(), ActorError> {
            if let Some(started) = &self.started {
                started.notify_one();
            }
            if let Some(delay) = self.delay {
                sleep(delay).await;
            }
            let fails = self.fail_on.is_some_and(|n| batch.contains(&TestMessage::Value(n)));
            let panics = self
                .panic_on
                .is_some_and(|n| batch.contains(&TestMessage::Value(n)));
            self.seen.lock().unwrap().push((batch, kind));
            if panics {
                panic!("boom");
            }
            if fails {
                return Err(ActorError::KindMismatch {
                    expected: "Value".to_string(),
                    found: "Other".to_string(),
                });
            }
            Ok(())
        }
    }

    fn test_config() -> ActorConfig {
        ActorConfig {
            queue_capacity: 1_000,
            poll_wait: Duration::from_millis(10),
            idle_window: Duration::from_millis(20),
            ..ActorConfig::default()
        }
    }

    fn spawn_actor(
        recorder: Recorder,
        config: ActorConfig,
    ) -> (ActorHandle<TestMessage>, CancellationToken, tokio::task::JoinHandle<()>) {
        let cancel_token = CancellationToken::new();
        let (service, handle) = ActorService::new(recorder, config, cancel_token.clone()).unwrap();
        let task = tokio::spawn(service.run());
        (handle, cancel_token, task)
    }

    fn flatten(seen: &Seen) -> Vec<TestMessage> {
        seen.lock()
            .unwrap()
            .iter()
            .flat_map(|(batch, _)| batch.clone())
            .collect()
    }

    #[tokio::test]
    async fn test_shutdown_drains_everything_sent_before_close() {
        let seen = Seen::default();
        let (handle, _, task) = spawn_actor(
            Recorder {
                seen: Arc::clone(&seen),
                ..Default::default()
            },
            test_config(),
        );

        for i in 0..500 {
            handle.send(TestMessage::Value(i)).await.unwrap();
        }
        handle.shutdown().await.unwrap();

        assert!(handle.is_done());
        assert!(handle.is_closed());
        let mut expected: Vec<TestMessage> = (0..500).map(TestMessage::Value).collect();
        expected.push(TestMessage::Close);
        assert_eq!(flatten(&seen), expected);
        task.await.expect("actor task failed");
    }

    #[tokio::test]
    async fn test_shutdown_returns_while_other_handles_are_alive() {
        let seen = Seen::default();
        let (handle, _, task) = spawn_actor(
            Recorder {
                seen: Arc::clone(&seen),
                ..Default::default()
            },
            test_config(),
        );
        let producer = handle.clone();

        producer.send(TestMessage::Value(1)).await.unwrap();
        timeout(Duration::from_secs(5), handle.shutdown())
            .await
            .expect("shutdown did not return")
            .unwrap();
        timeout(Duration::from_secs(5), task)
            .await
            .expect("actor task did not finish")
            .expect("actor task failed");

        assert!(producer.is_done());
        assert_eq!(
            flatten(&seen),
            vec![TestMessage::Value(1), TestMessage::Close]
        );
    }

    #[test]
    fn test_zero_sized_config_is_rejected() {
        let configs = [
            ActorConfig {
                queue_capacity: 0,
                ..test_config()
            },
            ActorConfig {
                max_messages_per_poll: 0,
                ..test_config()
            },
            ActorConfig {
                max_batch_size: 0,
                ..test_config()
            },
            ActorConfig {
                send_attempts: 0,
                ..test_config()
            },
            ActorConfig {
                poll_wait: Duration::ZERO,
                ..test_config()
            },
        ];

        for config in configs {
            let result = ActorService::<TestMessage, Recorder>::new(
                Recorder::default(),
                config.clone(),
                CancellationToken::new(),
            );
            assert!(
                matches!(result, Err(ConfigError::InvalidConfig(_))),
                "{config:?} should be rejected"
            );
        }
        assert!(ActorConfig::default().validate().is_ok());
    }

    #[tokio::test]
    async fn test_batches_follow_kind_runs() {
        let seen = Seen::default();
        let recorder = Recorder {
            seen: Arc::clone(&seen),
            ..Default::default()
        };
        let cancel_token = CancellationToken::new();
        let (service, handle) = ActorService::new(recorder, test_config(), cancel_token).unwrap();

        // Queue everything before the service starts so it lands in one cycle.
        for message in [
            TestMessage::Value(1),
            TestMessage::Value(2),
            TestMessage::Other(3),
            TestMessage::Value(4),
        ] {
            handle.send(message).await.unwrap();
        }
        handle.send(TestMessage::Close).await.unwrap();
        tokio::spawn(service.run());
        handle.wait_until_done().await.unwrap();

        let kinds: Vec<(usize, TestKind)> = seen
            .lock()
            .unwrap()
            .iter()
            .map(|(batch, kind)| (batch.len(), *kind))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (2, TestKind::Value),
                (1, TestKind::Other),
                (1, TestKind::Value),
                (1, TestKind::Close),
            ]
        );
    }

    #[tokio::test]
    async fn test_size_cap_splits_accumulation() {
        let seen = Seen::default();
        let recorder = Recorder {
            seen: Arc::clone(&seen),
            ..Default::default()
        };
        let config = ActorConfig {
            max_batch_size: 4,
            ..test_config()
        };
        let (service, handle) =
            ActorService::new(recorder, config, CancellationToken::new()).unwrap();

        for i in 0..10 {
            handle.send(TestMessage::Value(i)).await.unwrap();
        }
        handle.send(TestMessage::Close).await.unwrap();
        tokio::spawn(service.run());
        handle.wait_until_done().await.unwrap();

        let sizes: Vec<usize> = seen
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, kind)| *kind == TestKind::Value)
            .map(|(batch, _)| batch.len())
            .collect();
        assert_eq!(sizes, vec![4, 4, 2]);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_send_after_close_is_dropped() {
        let seen = Seen::default();
        let (handle, _, _task) = spawn_actor(
            Recorder {
                seen: Arc::clone(&seen),
                ..Default::default()
            },
            test_config(),
        );

        handle.send(TestMessage::Value(1)).await.unwrap();
        handle.shutdown().await.unwrap();
        handle.send(TestMessage::Value(2)).await.unwrap();

        assert!(logs_contain("Queue is closed, dropping Value message"));
        assert_eq!(
            flatten(&seen),
            vec![TestMessage::Value(1), TestMessage::Close]
        );
    }

    #[tokio::test]
    async fn test_second_shutdown_returns_immediately() {
        let (handle, _, _task) = spawn_actor(Recorder::default(), test_config());

        handle.shutdown().await.unwrap();
        handle.shutdown().await.unwrap();
        assert!(handle.is_done());
    }

    #[tokio::test]
    #[traced_test]
    async fn test_processor_error_does_not_stop_loop() {
        let seen = Seen::default();
        let (handle, _, _task) = spawn_actor(
            Recorder {
                seen: Arc::clone(&seen),
                fail_on: Some(1),
                ..Default::default()
            },
            test_config(),
        );

        handle.send(TestMessage::Value(1)).await.unwrap();
        sleep(Duration::from_millis(60)).await;
        handle.send(TestMessage::Value(2)).await.unwrap();
        handle.shutdown().await.unwrap();

        assert!(logs_contain("Failed to process batch of Value"));
        assert_eq!(
            flatten(&seen),
            vec![
                TestMessage::Value(1),
                TestMessage::Value(2),
                TestMessage::Close
            ]
        );
    }

    #[tokio::test]
    #[traced_test]
    async fn test_processor_panic_does_not_stop_loop() {
        let seen = Seen::default();
        let (handle, _, task) = spawn_actor(
            Recorder {
                seen: Arc::clone(&seen),
                panic_on: Some(7),
                ..Default::default()
            },
            test_config(),
        );

        handle.send(TestMessage::Value(7)).await.unwrap();
        handle.send(TestMessage::Other(8)).await.unwrap();
        handle.shutdown().await.unwrap();

        assert!(logs_contain("Batch processor panicked on batch of Value: boom"));
        assert_eq!(
            flatten(&seen),
            vec![
                TestMessage::Value(7),
                TestMessage::Other(8),
                TestMessage::Close
            ]
        );
        task.await.expect("actor task failed");
    }

    #[tokio::test]
    async fn test_full_queue_times_out() {
        let config = ActorConfig {
            queue_capacity: 1,
            send_attempts: 3,
            send_backoff: Duration::from_millis(1),
            ..test_config()
        };
        // Service never runs, so nothing drains the queue.
        let (_service, handle) =
            ActorService::new(Recorder::default(), config, CancellationToken::new()).unwrap();

        handle.send(TestMessage::Value(1)).await.unwrap();
        let result = handle.send(TestMessage::Value(2)).await;

        assert!(matches!(result, Err(ActorError::SendTimeout { attempts: 3 })));
    }

    #[tokio::test]
    async fn test_backpressure_waits_for_consumer() {
        let seen = Seen::default();
        let config = ActorConfig {
            queue_capacity: 2,
            send_attempts: 50,
            ..test_config()
        };
        let (handle, _, _task) = spawn_actor(
            Recorder {
                seen: Arc::clone(&seen),
                delay: Some(Duration::from_millis(2)),
                ..Default::default()
            },
            config,
        );

        for i in 0..20 {
            handle.send(TestMessage::Value(i)).await.unwrap();
        }
        handle.shutdown().await.unwrap();

        let mut expected: Vec<TestMessage> = (0..20).map(TestMessage::Value).collect();
        expected.push(TestMessage::Close);
        assert_eq!(flatten(&seen), expected);
    }

    #[tokio::test]
    async fn test_cancellation_drains_and_closes() {
        let seen = Seen::default();
        let (handle, cancel_token, task) = spawn_actor(
            Recorder {
                seen: Arc::clone(&seen),
                ..Default::default()
            },
            test_config(),
        );

        handle.send(TestMessage::Value(1)).await.unwrap();
        handle.send(TestMessage::Other(2)).await.unwrap();
        cancel_token.cancel();
        task.await.expect("actor task failed");

        assert!(handle.is_done());
        assert!(handle.is_closed());
        assert_eq!(
            flatten(&seen),
            vec![
                TestMessage::Value(1),
                TestMessage::Other(2),
                TestMessage::Close
            ]
        );
    }

    #[tokio::test]
    async fn test_idle_window_ends_accumulation() {
        let seen = Seen::default();
        let (handle, _, _task) = spawn_actor(
            Recorder {
                seen: Arc::clone(&seen),
                ..Default::default()
            },
            test_config(),
        );

        handle.send(TestMessage::Value(1)).await.unwrap();
        sleep(test_config().idle_window * 4).await;
        handle.send(TestMessage::Value(2)).await.unwrap();
        handle.shutdown().await.unwrap();

        let value_batches: Vec<Vec<TestMessage>> = seen
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, kind)| *kind == TestKind::Value)
            .map(|(batch, _)| batch.clone())
            .collect();
        assert_eq!(
            value_batches,
            vec![vec![TestMessage::Value(1)], vec![TestMessage::Value(2)]]
        );
    }

    #[tokio::test]
    async fn test_cancellation_waits_for_batch_in_flight() {
        let seen = Seen::default();
        let started = Arc::new(Notify::new());
        let (handle, cancel_token, task) = spawn_actor(
            Recorder {
                seen: Arc::clone(&seen),
                delay: Some(Duration::from_millis(50)),
                started: Some(Arc::clone(&started)),
                ..Default::default()
            },
            test_config(),
        );

        handle.send(TestMessage::Value(1)).await.unwrap();
        started.notified().await;
        handle.send(TestMessage::Other(2)).await.unwrap();
        handle.send(TestMessage::Other(3)).await.unwrap();
        cancel_token.cancel();
        timeout(Duration::from_secs(5), task)
            .await
            .expect("actor task did not finish")
            .expect("actor task failed");

        assert!(handle.is_done());
        let batches: Vec<(Vec<TestMessage>, TestKind)> = seen.lock().unwrap().clone();
        assert_eq!(
            batches,
            vec![
                (vec![TestMessage::Value(1)], TestKind::Value),
                (
                    vec![TestMessage::Other(2), TestMessage::Other(3)],
                    TestKind::Other
                ),
                (vec![TestMessage::Close], TestKind::Close),
            ]
        );
    }

    #[tokio::test]
    async fn test_dropping_every_handle_finishes_service() {
        let seen = Seen::default();
        let (handle, _, task) = spawn_actor(
            Recorder {
                seen: Arc::clone(&seen),
                ..Default::default()
            },
            test_config(),
        );

        handle.send(TestMessage::Value(1)).await.unwrap();
        drop(handle);
        task.await.expect("actor task failed");

        assert_eq!(
            flatten(&seen),
            vec![TestMessage::Value(1), TestMessage::Close]
        );
    }

    #[tokio::test]
    async fn test_wait_fails_when_service_is_dropped() {
        let (service, handle) = ActorService::<TestMessage, Recorder>::new(
            Recorder::default(),
            test_config(),
            CancellationToken::new(),
        )
        .unwrap();
        drop(service);

        assert!(matches!(
            handle.wait_until_done().await,
            Err(ActorError::Stopped)
        ));
        assert!(!handle.is_done());
    }
}
