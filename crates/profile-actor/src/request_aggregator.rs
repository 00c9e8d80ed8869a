// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Merges small logging requests into one payload per dataset, time bucket and schema.
//!
//! Building the sink's columnar structure has a large fixed cost, so many
//! small requests are far cheaper to log as one. A batch is walked once:
//!
//! 1. contiguous runs of the same dataset id are taken together (runs of the
//!    same dataset that are not adjacent stay separate);
//! 2. inside a run, each request lands in the bucket of its timestamp
//!    truncated to the dataset's cadence;
//! 3. inside a bucket, requests merge only when their column-name sets are
//!    equal. The order-invariant signature picks the slot and an exact set
//!    comparison confirms it, so a signature collision never mixes schemas.
//!
//! Groups come out in order of first appearance and keep arrival order inside.

use std::collections::HashMap;

use fnv::FnvBuildHasher;
use tracing::{debug, warn};

use crate::messages::{DataValue, EmbeddingData, TabularData};
use crate::util::{signature, truncate_time_ms, TimeGranularity};

/// A decoded request for one dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetRequest<P> {
    pub dataset_id: String,
    /// Event time in epoch millis.
    pub timestamp: i64,
    pub payload: P,
}

/// All requests of one (dataset, bucket, column set) group reduced to one payload.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedRequest<P> {
    pub dataset_id: String,
    /// Start of the bucket; the logical event time of the merged payload.
    pub bucket_timestamp: i64,
    pub signature: u64,
    pub payload: P,
    /// Number of requests folded into `payload`.
    pub merged: usize,
}

/// A payload that can absorb another payload with the same column set.
pub trait Mergeable {
    fn column_names(&self) -> Vec<&str>;

    /// Appends `other` after `self`. Both hold exactly the same column names.
    fn merge(&mut self, other: Self);
}

impl Mergeable for TabularData {
    fn column_names(&self) -> Vec<&str> {
        self.columns().iter().map(String::as_str).collect()
    }

    fn merge(&mut self, other: Self) {
        let (columns, rows) = other.into_parts();
        if columns == self.columns() {
            self.rows_mut().extend(rows);
            return;
        }

        // Same set, different order: rewrite incoming rows into our column order.
        let positions: HashMap<&str, usize> = columns
            .iter()
            .enumerate()
            .map(|(i, column)| (column.as_str(), i))
            .collect();
        let order: Vec<usize> = self
            .columns()
            .iter()
            .filter_map(|column| positions.get(column.as_str()).copied())
            .collect();

        let reordered: Vec<_> = rows
            .into_iter()
            .map(|row| {
                let mut cells: Vec<_> = row.into_iter().map(Some).collect();
                order
                    .iter()
                    .map(|&i| cells[i].take().unwrap_or(DataValue::Null))
                    .collect()
            })
            .collect();
        self.rows_mut().extend(reordered);
    }
}

impl Mergeable for EmbeddingData {
    fn column_names(&self) -> Vec<&str> {
        self.columns().keys().map(String::as_str).collect()
    }

    fn merge(&mut self, other: Self) {
        let columns = self.columns_mut();
        for (name, vectors) in other.into_columns() {
            columns.entry(name).or_default().extend(vectors);
        }
    }
}

/// Groups and merges `requests`, resolving each dataset's bucket width
/// through `granularity_for`.
pub fn aggregate<P, F>(
    requests: Vec<DatasetRequest<P>>,
    mut granularity_for: F,
) -> Vec<MergedRequest<P>>
where
    P: Mergeable,
    F: FnMut(&str) -> TimeGranularity,
{
    let total = requests.len();
    let mut merged = Vec::new();
    let mut requests = requests.into_iter().peekable();

    while let Some(first) = requests.next() {
        let granularity = granularity_for(&first.dataset_id);
        let mut run = DatasetRun::new(first.dataset_id.clone(), granularity);
        run.push(first);
        while let Some(next) = requests.next_if(|r| r.dataset_id == run.dataset_id) {
            run.push(next);
        }
        merged.extend(run.finish());
    }

    debug!("Merged {} requests into {} payloads", total, merged.len());
    merged
}

struct Group<P> {
    bucket: i64,
    signature: u64,
    /// Sorted column names, compared exactly on every merge.
    columns: Vec<String>,
    payload: P,
    merged: usize,
}

struct DatasetRun<P> {
    dataset_id: String,
    granularity: TimeGranularity,
    groups: Vec<Group<P>>,
    slots: hashbrown::HashMap<(i64, u64), Vec<usize>, FnvBuildHasher>,
}

impl<P: Mergeable> DatasetRun<P> {
    fn new(dataset_id: String, granularity: TimeGranularity) -> Self {
        Self {
            dataset_id,
            granularity,
            groups: Vec::new(),
            slots: hashbrown::HashMap::default(),
        }
    }

    fn push(&mut self, request: DatasetRequest<P>) {
        let bucket = truncate_time_ms(request.timestamp, self.granularity);
        let names = request.payload.column_names();
        let signature = signature(&names);
        let mut columns: Vec<String> = names.into_iter().map(str::to_owned).collect();
        columns.sort_unstable();

        self.insert(bucket, signature, columns, request.payload);
    }

    fn insert(&mut self, bucket: i64, signature: u64, columns: Vec<String>, payload: P) {
        let slot = self.slots.entry((bucket, signature)).or_default();

        if let Some(&i) = slot.iter().find(|&&i| self.groups[i].columns == columns) {
            let group = &mut self.groups[i];
            group.payload.merge(payload);
            group.merged += 1;
            return;
        }

        if !slot.is_empty() {
            warn!(
                "Column set signature {} collides in dataset {}, keeping schemas apart",
                signature, self.dataset_id
            );
        }
        slot.push(self.groups.len());
        self.groups.push(Group {
            bucket,
            signature,
            columns,
            payload,
            merged: 1,
        });
    }

    fn finish(self) -> impl Iterator<Item = MergedRequest<P>> {
        let dataset_id = self.dataset_id;
        self.groups.into_iter().map(move |group| MergedRequest {
            dataset_id: dataset_id.clone(),
            bucket_timestamp: group.bucket,
            signature: group.signature,
            payload: group.payload,
            merged: group.merged,
        })
    }
}
