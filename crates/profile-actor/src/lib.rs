// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Batching actor that merges data-logging requests before they reach a
//! profiling sink.
//!
//! Producers send [`messages::ProfileMessage`]s through a cloneable
//! [`actor::ActorHandle`]. A single task drains the inbox in batches, splits
//! them into same-kind runs and hands each run to the
//! [`profile_actor::ProfileActor`], which merges requests per dataset, time
//! bucket and column set before logging them through a [`sink::Sink`].

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod actor;
pub mod config;
pub mod constants;
pub mod errors;
pub mod messages;
pub mod profile_actor;
pub mod queue;
pub mod request_aggregator;
pub mod sink;
pub mod type_batcher;
pub mod util;
