// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Bounded, closable inbox between producers and the actor task.
//!
//! A thin layer over a bounded tokio `mpsc` channel that adds a one-way
//! closed state shared by both ends. Producers close it by enqueueing a
//! close sentinel; the consumer closes it when it stops accepting work. The
//! closed check, the enqueue and the state change happen under one lock, so
//! no put can land behind an accepted sentinel.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

/// Why a non-blocking put did not enqueue. The rejected item is handed back.
#[derive(Debug, PartialEq, Eq)]
pub enum TryPutError<T> {
    Full(T),
    Closed(T),
}

/// Producer end. Cheap to clone.
#[derive(Debug)]
pub struct QueueSender<T> {
    tx: mpsc::Sender<T>,
    closed: Arc<Mutex<bool>>,
}

impl<T> Clone for QueueSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            closed: Arc::clone(&self.closed),
        }
    }
}

/// Consumer end. Exactly one exists per queue.
#[derive(Debug)]
pub struct QueueReceiver<T> {
    rx: mpsc::Receiver<T>,
    closed: Arc<Mutex<bool>>,
}

/// Creates a queue holding at most `capacity` items.
///
/// # Panics
///
/// Panics if `capacity` is zero, like the underlying channel.
pub fn bounded<T>(capacity: usize) -> (QueueSender<T>, QueueReceiver<T>) {
    let (tx, rx) = mpsc::channel(capacity);
    let closed = Arc::new(Mutex::new(false));
    (
        QueueSender {
            tx,
            closed: Arc::clone(&closed),
        },
        QueueReceiver { rx, closed },
    )
}

impl<T> QueueSender<T> {
    /// Enqueues without waiting.
    ///
    /// When `closes` is set and the item is accepted, the queue transitions
    /// to closed in the same critical section.
    pub fn try_put(&self, item: T, closes: bool) -> Result<(), TryPutError<T>> {
        #[allow(clippy::expect_used)]
        let mut closed = self.closed.lock().expect("lock poisoned");
        if *closed {
            return Err(TryPutError::Closed(item));
        }

        match self.tx.try_send(item) {
            Ok(()) => {
                if closes {
                    *closed = true;
                }
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(item)) => Err(TryPutError::Full(item)),
            Err(mpsc::error::TrySendError::Closed(item)) => {
                *closed = true;
                Err(TryPutError::Closed(item))
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        #[allow(clippy::expect_used)]
        let closed = self.closed.lock().expect("lock poisoned");
        *closed
    }
}

impl<T> QueueReceiver<T> {
    /// Receives up to `limit` items into `buffer`, waiting while the queue is empty.
    ///
    /// Returns `0` only once the queue is closed and fully drained (or when
    /// `limit` is zero). Cancel safe.
    pub async fn recv_many(&mut self, buffer: &mut Vec<T>, limit: usize) -> usize {
        self.rx.recv_many(buffer, limit).await
    }

    /// Rejects all further puts. Items already queued can still be received.
    pub fn close(&mut self) {
        #[allow(clippy::expect_used)]
        let mut closed = self.closed.lock().expect("lock poisoned");
        *closed = true;
        self.rx.close();
    }

    pub fn is_closed(&self) -> bool {
        #[allow(clippy::expect_used)]
        let closed = self.closed.lock().expect("lock poisoned");
        *closed
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
