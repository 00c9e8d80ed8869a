// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Tuning defaults for the actor loop and its inbox.
//!
//! Every value here can be overridden through [`crate::actor::ActorConfig`];
//! the configuration layer only falls back to these when the environment is
//! silent.

use std::time::Duration;

/// Number of slots in the actor inbox before producers start backing off.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100_000;

/// Upper bound on messages pulled from the inbox by a single receive.
pub const MAX_MESSAGES_PER_POLL: usize = 10_000;

/// Accumulation stops once a working batch reaches this many messages.
pub const MAX_BATCH_SIZE: usize = 50_000;

/// Bounded wait of one receive attempt on an empty inbox.
pub const POLL_WAIT: Duration = Duration::from_millis(100);

/// Accumulation stops once nothing has arrived for this long.
pub const IDLE_WINDOW: Duration = Duration::from_millis(100);

/// Attempts made by `send` while the inbox is full.
pub const SEND_ATTEMPTS: u32 = 10;

/// First backoff between full-inbox retries. Doubles on every retry.
pub const SEND_BACKOFF: Duration = Duration::from_millis(10);

/// Ceiling for the doubling send backoff.
pub const MAX_SEND_BACKOFF: Duration = Duration::from_millis(320);

/// Joins sorted column names before hashing. Unit separator, never part of a real column name.
pub(crate) const SIGNATURE_SEPARATOR: char = '\u{1f}';

pub(crate) const MILLIS_PER_HOUR: i64 = 60 * 60 * 1_000;
pub(crate) const MILLIS_PER_DAY: i64 = 24 * MILLIS_PER_HOUR;
